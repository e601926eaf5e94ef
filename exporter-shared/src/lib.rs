//! Shared serving layer for Prometheus-style exporters.
//!
//! Owns the listener loop and routing that every exporter binary needs:
//! a telemetry path delegated to the exporter's own scrape handler, a
//! small landing page at the root, and 404s for everything else.
#![deny(missing_docs)]
mod http_listener;
pub use self::http_listener::{run_server, ServeError, ServerOpts};
