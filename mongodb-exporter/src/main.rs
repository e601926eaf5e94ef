use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};

use exporter_shared::{run_server, ServerOpts};
use mongodb_exporter::{
    register_build_info, CollectorFlags, ModuleRegistry, MongodbCollectorFactory, ScrapeHandler,
    PROGRAM,
};

#[derive(Debug, Parser)]
#[command(name = PROGRAM, version, about = "Exports various MongoDB metrics in Prometheus format.")]
struct Args {
    /// Address to listen on for web interface and telemetry.
    #[arg(long = "web.listen-address", default_value = "0.0.0.0:9216")]
    listen_address: SocketAddr,

    /// Path under which to expose metrics.
    #[arg(long = "web.telemetry-path", default_value = "/metrics")]
    telemetry_path: String,

    /// MongoDB connection URI used when a scrape names no explicit target.
    #[arg(
        long = "mongodb.uri",
        env = "MONGODB_URI",
        default_value = "mongodb://localhost:27017"
    )]
    mongodb_uri: String,

    /// Path to the module credential configuration.
    #[arg(long = "config", default_value = "conf/conf.yml")]
    config: PathBuf,

    /// Enable collection of Database metrics.
    #[arg(long = "collect.database")]
    collect_database: bool,

    /// Enable collection of Collection metrics.
    #[arg(long = "collect.collection")]
    collect_collection: bool,

    /// Enable collection of table top metrics.
    #[arg(long = "collect.topmetrics")]
    collect_top_metrics: bool,

    /// Enable collection of per index usage stats.
    #[arg(long = "collect.indexusage")]
    collect_index_usage: bool,

    /// Collect MongoDB connpoolstats.
    #[arg(long = "collect.connpoolstats")]
    collect_conn_pool_stats: bool,
}

impl Args {
    fn collector_flags(&self) -> CollectorFlags {
        CollectorFlags {
            database: self.collect_database,
            collection: self.collect_collection,
            top_metrics: self.collect_top_metrics,
            index_usage: self.collect_index_usage,
            conn_pool_stats: self.collect_conn_pool_stats,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().init();

    let args = Args::parse();

    // A missing configuration file only matters once a scrape names a
    // module, so it degrades to an empty registry instead of refusing to
    // start; an invalid file is still fatal.
    let modules = match ModuleRegistry::load(&args.config) {
        Ok(modules) => modules,
        Err(err) if err.is_read() => {
            warn!("{}; continuing without modules", err);
            ModuleRegistry::default()
        }
        Err(err) => return Err(err.into()),
    };
    info!("Loaded {} scrape module(s)", modules.len());

    register_build_info(prometheus::default_registry())?;

    let handler = ScrapeHandler::new(
        modules,
        &args.mongodb_uri,
        args.collector_flags(),
        Box::new(MongodbCollectorFactory),
        prometheus::default_registry().clone(),
    );

    let opts = ServerOpts {
        service_name: "MongoDB".to_owned(),
        listen_address: args.listen_address,
        telemetry_path: args.telemetry_path,
    };

    info!("Starting {} {}", PROGRAM, env!("CARGO_PKG_VERSION"));
    run_server(opts, move |req| handler.call(req)).await?;

    Ok(())
}
