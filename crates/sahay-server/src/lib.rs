//! HTTP server assembly for the Sahay platform.
//!
//! Mounts the [`sahay_api`] router behind a request-trace layer and a
//! root welcome route. Store and notifier implementations are chosen by
//! the binary.

pub mod notify;

use std::{path::PathBuf, sync::Arc};

use axum::{Json, Router, response::IntoResponse, routing::get};
use sahay_core::{notify::Notifier, store::PlatformStore};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<S, N>(store: Arc<S>, notifier: Arc<N>) -> Router
where
  S: PlatformStore + 'static,
  N: Notifier + 'static,
{
  Router::new()
    .route("/", get(welcome))
    .merge(sahay_api::api_router(store, notifier))
    .layer(TraceLayer::new_for_http())
}

async fn welcome() -> impl IntoResponse {
  Json(json!({ "message": "Welcome to the Sahay community platform!" }))
}
