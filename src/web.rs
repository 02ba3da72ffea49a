use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use log::{error, info};
use prometheus::TEXT_FORMAT;
use tokio::net::TcpListener;

use crate::exporter::Exporter;

#[derive(Clone)]
struct AppState {
    exporter: Arc<Exporter>,
    telemetry_path: Arc<str>,
}

pub struct WebService {
    listener: TcpListener,
    state: AppState,
}

impl WebService {
    /// Bind the listener. `address` is `host:port`; host names are resolved here.
    pub async fn bind_to_address(
        address: &str,
        exporter: Arc<Exporter>,
        telemetry_path: String,
    ) -> Result<Self> {
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("failed to bind to tcp socket at {address}"))?;

        Ok(Self {
            listener,
            state: AppState {
                exporter,
                telemetry_path: telemetry_path.into(),
            },
        })
    }

    pub fn bind_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = router(self.state);

        axum::serve(self.listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("Web service shutting down");
            })
            .await?;

        info!("Web service shutdown gracefully");
        Ok(())
    }
}

fn router(state: AppState) -> Router {
    let telemetry_path = Arc::clone(&state.telemetry_path);

    Router::new()
        .route("/", get(landing_page_handler))
        .route(&telemetry_path, get(metrics_handler))
        .with_state(state)
}

/// Every request runs a fresh scrape. Scrape failures still render the
/// counters; only encoding problems turn into a 500.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.exporter.render().await {
        Ok(body) => ([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

async fn landing_page_handler(State(state): State<AppState>) -> Html<String> {
    Html(landing_page(&state.telemetry_path))
}

fn landing_page(telemetry_path: &str) -> String {
    format!(
        r#"<html>
<head><title>Buildkite Exporter</title></head>
<body>
<h1>Buildkite Exporter</h1>
<p><a href='{path}'>Metrics</a></p>
</body>
</html>
"#,
        path = escape_html(telemetry_path)
    )
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
