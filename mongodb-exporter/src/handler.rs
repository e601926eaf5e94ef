use std::sync::Arc;

use http_body_util::Full;
use hyper::{body::Bytes, header::CONTENT_TYPE, Request, Response, StatusCode};
use prometheus::Registry;
use tracing::debug;

use crate::collector::{CollectorFactory, CollectorFlags, CollectorOptions};
use crate::config::ModuleRegistry;
use crate::resolve::{normalize_target, redact_uri, resolve};
use crate::scrape::compose;

/// Prefix of the plain-text body returned when target resolution fails.
pub const TARGET_FAIL_PREFIX: &str = "get exporter target fail: ";

/// Orchestrates one scrape per request: query extraction, target
/// resolution, collector construction, registry composition, and
/// serialization.
///
/// All state behind the handler is injected at startup and immutable
/// afterwards, so a single handler is shared across any number of
/// concurrent requests; everything per-request is owned by the request.
#[derive(Clone)]
pub struct ScrapeHandler {
    inner: Arc<Inner>,
}

struct Inner {
    modules: ModuleRegistry,
    default_uri: String,
    flags: CollectorFlags,
    factory: Box<dyn CollectorFactory>,
    default_gatherer: Registry,
}

impl ScrapeHandler {
    /// Creates a handler over the given module registry, default connection
    /// target, feature flags, collector factory, and default metrics
    /// source.
    ///
    /// The default target is normalized to carry the scheme prefix here, so
    /// the per-request path never has to.
    pub fn new(
        modules: ModuleRegistry,
        default_uri: &str,
        flags: CollectorFlags,
        factory: Box<dyn CollectorFactory>,
        default_gatherer: Registry,
    ) -> Self {
        ScrapeHandler {
            inner: Arc::new(Inner {
                modules,
                default_uri: normalize_target(default_uri),
                flags,
                factory,
                default_gatherer,
            }),
        }
    }

    /// Serves one scrape request.
    pub fn call<B>(&self, req: &Request<B>) -> Response<Full<Bytes>> {
        let (status, content_type, body) = self.scrape(req.uri().query());

        // This unwrap should not fail because the header name and value are
        // statically known to be valid.
        Response::builder()
            .status(status)
            .header(CONTENT_TYPE, content_type)
            .body(body.into())
            .unwrap()
    }

    /// Runs the per-request flow for the given query string.
    ///
    /// When the query names no `target`, the statically configured default
    /// target is used unchanged and `module` is ignored. A failed target
    /// resolution ends the request with a plain-text error body; it never
    /// affects other in-flight requests.
    fn scrape(&self, query: Option<&str>) -> (StatusCode, &'static str, String) {
        let (target, module) = scrape_params(query);

        let uri = if target.is_empty() {
            self.inner.default_uri.clone()
        } else {
            match resolve(&target, &module, &self.inner.modules) {
                Ok(resolved) => resolved.into_string(),
                Err(err) => {
                    debug!(
                        "Target resolution failed for target={} module={}. Error: {}",
                        target, module, err
                    );
                    return (
                        StatusCode::BAD_REQUEST,
                        PLAIN_TEXT,
                        format!("{TARGET_FAIL_PREFIX}{err}"),
                    );
                }
            }
        };

        debug!("Scraping {}", redact_uri(&uri));

        let options = CollectorOptions { uri, flags: self.inner.flags };
        let collector = self.inner.factory.build(options);
        let merged = compose(collector, self.inner.default_gatherer.clone());

        (StatusCode::OK, prometheus::TEXT_FORMAT, merged.render())
    }
}

const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

fn scrape_params(query: Option<&str>) -> (String, String) {
    let mut target = None;
    let mut module = None;

    if let Some(query) = query {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "target" if target.is_none() => target = Some(value.into_owned()),
                "module" if module.is_none() => module = Some(value.into_owned()),
                _ => {}
            }
        }
    }

    (target.unwrap_or_default(), module.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::{scrape_params, ScrapeHandler, TARGET_FAIL_PREFIX};
    use crate::collector::{CollectorFactory, CollectorFlags, CollectorOptions};
    use crate::config::{ModuleCredential, ModuleRegistry};

    use hyper::StatusCode;
    use prometheus::core::Collector;
    use prometheus::{IntGauge, Opts, Registry};

    // Emits one gauge labelled with the URI the factory was handed, so
    // tests can tell which target a scrape was bound to.
    struct UriEchoFactory;

    impl CollectorFactory for UriEchoFactory {
        fn build(&self, options: CollectorOptions) -> Box<dyn Collector> {
            let gauge = IntGauge::with_opts(
                Opts::new("scrape_target_echo", "Target this scrape was bound to.")
                    .const_label("uri", options.uri),
            )
            .unwrap();
            gauge.set(1);
            Box::new(gauge)
        }
    }

    fn handler() -> ScrapeHandler {
        let modules = ModuleRegistry::from_modules(vec![
            ModuleCredential {
                name: "foo".to_owned(),
                user: "u1".to_owned(),
                password: "p1".to_owned(),
            },
            ModuleCredential {
                name: "bar".to_owned(),
                user: "u2".to_owned(),
                password: "p2".to_owned(),
            },
        ])
        .unwrap();

        let default_gatherer = Registry::new();
        let default_series = IntGauge::with_opts(Opts::new(
            "exporter_default_series",
            "Process-wide default series.",
        ))
        .unwrap();
        default_series.set(1);
        default_gatherer.register(Box::new(default_series)).unwrap();

        ScrapeHandler::new(
            modules,
            "localhost:27017",
            CollectorFlags::default(),
            Box::new(UriEchoFactory),
            default_gatherer,
        )
    }

    fn get(handler: &ScrapeHandler, query: Option<&str>) -> (StatusCode, String) {
        let (status, _, body) = handler.scrape(query);
        (status, body)
    }

    #[test]
    fn absent_target_uses_normalized_default_and_ignores_module() {
        let handler = handler();
        let (status, body) = get(&handler, Some("module=does-not-exist"));

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("uri=\"mongodb://localhost:27017\""));
    }

    #[test]
    fn present_target_is_resolved_through_the_module_registry() {
        let handler = handler();
        let (status, body) = get(&handler, Some("target=10.0.0.1:27017&module=foo"));

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("uri=\"mongodb://u1:p1@10.0.0.1:27017\""));
    }

    #[test]
    fn unknown_module_yields_the_legacy_error_body() {
        let handler = handler();
        let (status, body) = get(&handler, Some("target=10.0.0.1:27017&module=nope"));

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, format!("{TARGET_FAIL_PREFIX}not found module in conf.yml"));
    }

    #[test]
    fn malformed_target_yields_the_legacy_error_body() {
        let handler = handler();
        let (status, body) = get(&handler, Some("target=10.0.0.1&module=foo"));

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, format!("{TARGET_FAIL_PREFIX}target error"));
    }

    #[test]
    fn missing_module_yields_the_legacy_error_body() {
        let handler = handler();
        let (status, body) = get(&handler, Some("target=10.0.0.1:27017"));

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, format!("{TARGET_FAIL_PREFIX}uri error, not found module"));
    }

    #[test]
    fn merged_response_always_contains_the_default_series() {
        let handler = handler();

        let (_, with_default) = get(&handler, None);
        let (_, with_target) = get(&handler, Some("target=10.0.0.1:27017&module=foo"));

        assert!(with_default.contains("exporter_default_series 1"));
        assert!(with_target.contains("exporter_default_series 1"));
    }

    #[test]
    fn scrapes_for_different_modules_never_observe_each_other() {
        let handler = handler();

        let (_, body_foo) = get(&handler, Some("target=10.0.0.1:27017&module=foo"));
        let (_, body_bar) = get(&handler, Some("target=10.0.0.2:27017&module=bar"));

        assert!(body_foo.contains("mongodb://u1:p1@10.0.0.1:27017"));
        assert!(!body_foo.contains("u2:p2"));
        assert!(body_bar.contains("mongodb://u2:p2@10.0.0.2:27017"));
        assert!(!body_bar.contains("u1:p1"));
    }

    #[test]
    fn hyper_response_carries_the_exposition_content_type() {
        let handler = handler();
        let req = hyper::Request::builder()
            .uri("/metrics?target=10.0.0.1:27017&module=foo")
            .body(())
            .unwrap();

        let response = handler.call(&req);

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get(hyper::header::CONTENT_TYPE).unwrap();
        assert_eq!(content_type, prometheus::TEXT_FORMAT);
    }

    #[test]
    fn first_query_parameter_occurrence_wins() {
        let (target, module) = scrape_params(Some("target=a:1&target=b:2&module=m1&module=m2"));

        assert_eq!(target, "a:1");
        assert_eq!(module, "m1");
    }

    #[test]
    fn absent_query_yields_empty_params() {
        assert_eq!(scrape_params(None), (String::new(), String::new()));
    }
}
