//! Scrape and liveness HTTP surface
//!
//! `GET /metrics` renders the supervisor state table in the text
//! exposition format; `GET /health` answers 200 while no node is
//! unhealthy, 503 otherwise. State comes through a stats provider
//! callback so the server stays decoupled from the supervisor's
//! internals; an optional extra provider appends additional
//! exposition text.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tracing::info;

use chainwarden_monitor::{MonitorStats, NodeSupervisor};

use crate::error::Result;
use crate::render::render_metrics;

pub type StatsProvider = Arc<dyn Fn() -> MonitorStats + Send + Sync>;
pub type ExpositionProvider = Arc<dyn Fn() -> String + Send + Sync>;

/// HTTP server exposing supervisor state to scrapers.
pub struct MetricsServer {
    bind_address: String,
    provider: StatsProvider,
    extra: Option<ExpositionProvider>,
}

#[derive(Clone)]
struct AppState {
    provider: StatsProvider,
    extra: Option<ExpositionProvider>,
}

impl MetricsServer {
    pub fn new(bind_address: &str, provider: StatsProvider) -> Self {
        Self {
            bind_address: bind_address.to_string(),
            provider,
            extra: None,
        }
    }

    /// Convenience constructor reading straight from a supervisor
    /// handle.
    pub fn for_supervisor(bind_address: &str, supervisor: NodeSupervisor) -> Self {
        Self::new(bind_address, Arc::new(move || supervisor.stats()))
    }

    /// Append extra exposition text (e.g. pool-side metrics) to every
    /// scrape.
    pub fn with_extra_provider(mut self, extra: ExpositionProvider) -> Self {
        self.extra = Some(extra);
        self
    }

    /// The router, for embedding or serving on a caller-owned
    /// listener.
    pub fn into_router(self) -> Router {
        let state = AppState {
            provider: self.provider,
            extra: self.extra,
        };
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .with_state(state)
    }

    /// Bind and serve until the task is cancelled.
    pub async fn run(self) -> Result<()> {
        let bind_address = self.bind_address.clone();
        let app = self.into_router();

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!("📊 Metrics server listening on http://{}", bind_address);
        axum::serve(listener, app).await?;
        Ok(())
    }
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    let stats = (state.provider)();
    let extra = state.extra.as_ref().map(|provider| provider());
    let body = render_metrics(&stats, extra.as_deref());
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
        .into_response()
}

async fn health_handler(State(state): State<AppState>) -> Response {
    let stats = (state.provider)();
    let unhealthy = stats.unhealthy_count();
    let status = if unhealthy == 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = serde_json::json!({
        "status": if unhealthy == 0 { "healthy" } else { "unhealthy" },
        "nodes": stats.nodes_monitored,
    });
    (status, Json(body)).into_response()
}
