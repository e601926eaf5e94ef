use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;

use http_body_util::Full;
use hyper::{
    body::{Bytes, Incoming},
    header::CONTENT_TYPE,
    server::conn::http1::Builder as HyperHttpBuilder,
    service::service_fn,
    Request, Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Errors that could occur while serving the scrape endpoint.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Binding/listening to the given address did not succeed.
    #[error("failed to bind to given listen address: {0}")]
    FailedToBind(#[from] io::Error),
}

/// Options for the exporter HTTP server.
#[derive(Clone, Debug)]
pub struct ServerOpts {
    /// Human-readable name of the monitored system, used on the landing page.
    pub service_name: String,
    /// Address to listen on for web interface and telemetry.
    pub listen_address: SocketAddr,
    /// Path under which metrics are exposed.
    pub telemetry_path: String,
}

/// Runs the exporter HTTP server until the process exits.
///
/// Requests for the telemetry path are delegated to `handler`; requests for
/// `/` receive a landing page linking the telemetry path; anything else gets
/// a 404. Accept and per-connection errors are logged and do not stop the
/// listener.
///
/// # Errors
///
/// Returns an error if the listen address cannot be bound.
pub async fn run_server<H>(opts: ServerOpts, handler: H) -> Result<(), ServeError>
where
    H: Fn(&Request<Incoming>) -> Response<Full<Bytes>> + Clone + Send + Sync + 'static,
{
    let listener = TcpListener::bind(opts.listen_address).await?;
    info!("{} exporter listening on http://{}{}", opts.service_name, opts.listen_address, opts.telemetry_path);

    loop {
        let stream = match listener.accept().await {
            Ok((stream, _)) => stream,
            Err(e) => {
                warn!("Error accepting connection. Ignoring request. Error: {:?}", e);
                continue;
            }
        };

        let opts = opts.clone();
        let handler = handler.clone();
        tokio::task::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let opts = opts.clone();
                let handler = handler.clone();
                async move { Ok::<_, Infallible>(route(&opts, &handler, &req)) }
            });

            if let Err(err) =
                HyperHttpBuilder::new().serve_connection(TokioIo::new(stream), service).await
            {
                warn!("Error serving connection. Error: {:?}", err);
            }
        });
    }
}

fn route<B, H>(opts: &ServerOpts, handler: &H, req: &Request<B>) -> Response<Full<Bytes>>
where
    H: Fn(&Request<B>) -> Response<Full<Bytes>>,
{
    let path = req.uri().path();
    if path == opts.telemetry_path {
        handler(req)
    } else if path == "/" {
        landing_page(opts)
    } else {
        not_found()
    }
}

fn landing_page(opts: &ServerOpts) -> Response<Full<Bytes>> {
    let body = format!(
        "<html>\n<head><title>{name} exporter</title></head>\n<body>\n<h1>{name} exporter</h1>\n<p><a href=\"{path}\">Metrics</a></p>\n</body>\n</html>\n",
        name = opts.service_name,
        path = opts.telemetry_path,
    );

    // This unwrap should not fail because the header name and value are
    // statically known to be valid.
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/html; charset=utf-8")
        .body(body.into())
        .unwrap()
}

fn not_found() -> Response<Full<Bytes>> {
    // This unwrap should not fail because we don't set any header on the
    // response builder.
    Response::builder().status(StatusCode::NOT_FOUND).body(Full::<Bytes>::default()).unwrap()
}
