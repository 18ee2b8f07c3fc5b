//! The small `/debug/routes` and `/metrics` surface, grounded on
//! `ando-admin`'s axum-based admin API shape, trimmed to the two read-only
//! endpoints this spec actually names.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use baker_core::RoutingIndex;
use baker_observability::metrics::MetricsCollector;
use baker_observability::prometheus_exporter::render_metrics;
use serde::Serialize;

#[derive(Clone)]
pub struct DebugState {
    pub index: Arc<RoutingIndex>,
    pub collector: Arc<MetricsCollector>,
}

#[derive(Serialize)]
struct RouteEntry {
    domain: String,
    pattern: String,
    backends: Vec<String>,
}

async fn routes(State(state): State<DebugState>) -> impl IntoResponse {
    let entries: Vec<RouteEntry> = state
        .index
        .snapshot()
        .into_iter()
        .map(|(domain, pattern, backends)| RouteEntry {
            domain,
            pattern,
            backends: backends.into_iter().map(|b| b.container.id).collect(),
        })
        .collect();
    Json(entries)
}

async fn metrics(State(state): State<DebugState>) -> impl IntoResponse {
    (axum::http::StatusCode::OK, render_metrics(&state.collector))
}

pub fn router(index: Arc<RoutingIndex>, collector: Arc<MetricsCollector>) -> Router {
    let state = DebugState { index, collector };
    Router::new()
        .route("/debug/routes", get(routes))
        .route("/metrics", get(metrics))
        .with_state(state)
}
