use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    Router,
    extract::{Request, connect_info::ConnectInfo},
    http::HeaderMap,
    middleware::{Next, from_fn},
    response::Response,
    routing::{MethodRouter, get},
    serve,
};
use opentelemetry::{global, propagation::Extractor};
use tower_http::compression::CompressionLayer;
use tracing::{Instrument, error, info};
use tracing_opentelemetry::OpenTelemetrySpanExt;

const HEALTHCHECK_PATH: &str = "/healthz";

/// Registers `method_router` at `path`, wrapped in a request span and an access log line.
pub fn add_http_route<S>(app: Router<S>, path: &'static str, method_router: MethodRouter<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    app.route(
        path,
        method_router.layer(from_fn(move |req: Request, next: Next| {
            trace_request(path, req, next)
        })),
    )
}

// Path parameters carry tokens, so only the route template is recorded.
async fn trace_request(route: &'static str, req: Request, next: Next) -> Response {
    let parent_cx =
        global::get_text_map_propagator(|propagator| propagator.extract(&Headers(req.headers())));

    let method = req.method().clone();
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned());

    let span = tracing::info_span!(
        "http_server_request",
        otel.name = format!("{method} {route}"),
        otel.kind = "Server",
        http.request.method = method.as_str(),
        http.route = route,
    );
    span.set_parent(parent_cx);

    let start = Instant::now();
    let response = next.run(req).instrument(span.clone()).await;
    let status = response.status().as_u16();

    span.set_attribute("http.response.status_code", i64::from(status));
    span.in_scope(|| {
        info!(
            client.address = client,
            http.response.latency_ms = start.elapsed().as_millis() as u64,
            http.response.status_code = status,
            "[{status}] {method} {route}",
        )
    });

    response
}

struct Headers<'a>(&'a HeaderMap);

impl Extractor for Headers<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

/// Serves `app` plus `/healthz` until Ctrl-C.
pub async fn serve_http(app: Router, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("server listening on {}", addr);

    let app = app
        .layer(CompressionLayer::new())
        .route(HEALTHCHECK_PATH, get(|| async { "ok" }));

    serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error.message = %err, "could not install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
