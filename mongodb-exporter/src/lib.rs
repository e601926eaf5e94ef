//! Multi-target MongoDB metrics exporter.
//!
//! A scrape request may name a different MongoDB instance than the
//! exporter's default: credentials for that instance are resolved from the
//! module configuration, a fresh collector is bound to the resolved target,
//! merged with the process-wide default metrics, and served in the
//! Prometheus exposition format.
#![deny(missing_docs)]
mod config;
pub use self::config::{ConfigError, ModuleCredential, ModuleRegistry};

mod resolve;
pub use self::resolve::{resolve, ResolvedTarget, TargetError, MONGODB_SCHEME};

mod collector;
pub use self::collector::{
    CollectorFactory, CollectorFlags, CollectorOptions, MongodbCollector, MongodbCollectorFactory,
};

mod scrape;
pub use self::scrape::{compose, MergedScrape};

mod handler;
pub use self::handler::{ScrapeHandler, TARGET_FAIL_PREFIX};

mod build_info;
pub use self::build_info::{register_build_info, PROGRAM};
