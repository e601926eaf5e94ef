use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{IntGauge, IntGaugeVec, Opts};

use crate::resolve::redact_uri;

/// Feature flags controlling which optional metric groups a collector
/// gathers. Set once at startup and applied identically to every request.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CollectorFlags {
    /// Enable collection of database metrics.
    pub database: bool,
    /// Enable collection of collection metrics.
    pub collection: bool,
    /// Enable collection of table top metrics.
    pub top_metrics: bool,
    /// Enable collection of per-index usage stats.
    pub index_usage: bool,
    /// Enable collection of connection pool stats.
    pub conn_pool_stats: bool,
}

impl CollectorFlags {
    fn groups(&self) -> [(&'static str, bool); 5] {
        [
            ("database", self.database),
            ("collection", self.collection),
            ("topmetrics", self.top_metrics),
            ("indexusage", self.index_usage),
            ("connpoolstats", self.conn_pool_stats),
        ]
    }
}

/// Connection parameters for one collector: the fully qualified target URI
/// combined with the process-wide feature flags.
#[derive(Clone, Debug)]
pub struct CollectorOptions {
    /// Fully qualified connection URI for the instance to gather from.
    pub uri: String,
    /// Optional metric groups to gather.
    pub flags: CollectorFlags,
}

/// Builds a fresh, independent collector per scrape.
///
/// Implementations must be cheap to call, must not share mutable state
/// between the collectors they build, and must be safe to invoke
/// concurrently from multiple requests.
pub trait CollectorFactory: Send + Sync {
    /// Builds a collector bound to the given connection parameters.
    fn build(&self, options: CollectorOptions) -> Box<dyn Collector>;
}

/// The production [`CollectorFactory`], building a [`MongodbCollector`]
/// per scrape.
#[derive(Clone, Copy, Debug, Default)]
pub struct MongodbCollectorFactory;

impl CollectorFactory for MongodbCollectorFactory {
    fn build(&self, options: CollectorOptions) -> Box<dyn Collector> {
        Box::new(MongodbCollector::new(options))
    }
}

/// Per-target metrics-gathering unit, built fresh for every scrape and
/// discarded with it.
///
/// Owns the target-scoped descriptor set: which instance this scrape is
/// bound to and which optional metric groups were enabled for it. The
/// session-based gatherers for individual server commands plug in here.
/// Credentials never appear in emitted label values.
pub struct MongodbCollector {
    target_info: IntGauge,
    group_enabled: IntGaugeVec,
}

impl MongodbCollector {
    /// Builds a collector bound to the given connection parameters.
    pub fn new(options: CollectorOptions) -> Self {
        let target_info = IntGauge::with_opts(
            Opts::new(
                "mongodb_exporter_target_info",
                "Connection target used for this scrape, with credentials removed.",
            )
            .const_label("target", redact_uri(&options.uri)),
        )
        .expect("target info metric options are statically valid");
        target_info.set(1);

        let group_enabled = IntGaugeVec::new(
            Opts::new(
                "mongodb_exporter_metric_group_enabled",
                "Optional metric groups enabled for this scrape (1 enabled, 0 disabled).",
            ),
            &["group"],
        )
        .expect("metric group options are statically valid");
        for (group, enabled) in options.flags.groups() {
            group_enabled.with_label_values(&[group]).set(i64::from(enabled));
        }

        MongodbCollector { target_info, group_enabled }
    }
}

impl Collector for MongodbCollector {
    fn desc(&self) -> Vec<&Desc> {
        let mut descs = self.target_info.desc();
        descs.extend(self.group_enabled.desc());
        descs
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let mut families = self.target_info.collect();
        families.extend(self.group_enabled.collect());
        families
    }
}
