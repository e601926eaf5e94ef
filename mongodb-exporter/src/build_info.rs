use prometheus::{IntGauge, Opts, Registry};

/// Program name, used as the metric namespace of the exporter's own series.
pub const PROGRAM: &str = "mongodb_exporter";

/// Registers the constant `mongodb_exporter_build_info` series into the
/// given registry.
///
/// This is the process-wide default-gatherer series every merged scrape
/// response carries, regardless of which target the scrape was bound to.
///
/// # Errors
///
/// Returns an error if a build-info series is already registered, which
/// means this was called twice for the same registry.
pub fn register_build_info(registry: &Registry) -> Result<(), prometheus::Error> {
    let build_info = IntGauge::with_opts(
        Opts::new(
            format!("{PROGRAM}_build_info"),
            "Build information for this exporter binary.",
        )
        .const_label("version", env!("CARGO_PKG_VERSION"))
        .const_label("revision", option_env!("BUILD_REVISION").unwrap_or("unknown"))
        .const_label("branch", option_env!("BUILD_BRANCH").unwrap_or("unknown")),
    )?;
    build_info.set(1);

    registry.register(Box::new(build_info))
}
