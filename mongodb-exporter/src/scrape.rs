use prometheus::core::Collector;
use prometheus::{Registry, TextEncoder};
use tracing::warn;

/// A composed, read-only view over the process-wide default metrics and the
/// single collector built for one scrape.
///
/// Created inside the request-handling scope, rendered once, and dropped
/// with the request; neither the backing registry nor the view is ever
/// shared with another request.
pub struct MergedScrape {
    registry: Registry,
    default_gatherer: Registry,
}

/// Creates a fresh, isolated registry holding exactly the given collector
/// and composes it with the process-wide default metrics source.
///
/// A collector whose descriptors fail to register is logged and skipped:
/// the scrape still serves the default metrics rather than aborting.
pub fn compose(collector: Box<dyn Collector>, default_gatherer: Registry) -> MergedScrape {
    let registry = Registry::new();
    if let Err(err) = registry.register(collector) {
        warn!("Failed to register scrape collector, serving default metrics only. Error: {:?}", err);
    }

    MergedScrape { registry, default_gatherer }
}

impl MergedScrape {
    /// Renders the composed view in the Prometheus text exposition format:
    /// all families reachable from the default metrics source, followed by
    /// all families from this scrape's registry.
    ///
    /// A family that fails to encode is logged and skipped; it never stops
    /// emission of the remaining families.
    pub fn render(&self) -> String {
        let mut families = self.default_gatherer.gather();
        families.extend(self.registry.gather());

        let encoder = TextEncoder::new();
        let mut buffer = String::new();
        for family in &families {
            if let Err(err) = encoder.encode_utf8(std::slice::from_ref(family), &mut buffer) {
                warn!(
                    "Skipping metric family {} that failed to encode. Error: {:?}",
                    family.get_name(),
                    err
                );
            }
        }

        buffer
    }
}
