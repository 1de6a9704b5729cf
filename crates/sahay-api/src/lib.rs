//! JSON REST API for the Sahay platform.
//!
//! Exposes an axum [`Router`] backed by any
//! [`sahay_core::store::PlatformStore`] and
//! [`sahay_core::notify::Notifier`]. Auth, TLS, and transport concerns are
//! the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .merge(sahay_api::api_router(store.clone(), notifier.clone()))
//! ```

pub mod beneficiaries;
pub mod donations;
pub mod error;
pub mod export;
pub mod surveys;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, patch, post, put},
};
use sahay_core::{
  notify::{NotificationEvent, Notifier},
  store::PlatformStore,
};

pub use error::ApiError;

// ─── State ───────────────────────────────────────────────────────────────────

/// Shared state threaded through all API handlers.
pub struct ApiState<S, N> {
  pub store:    Arc<S>,
  pub notifier: Arc<N>,
}

impl<S, N> Clone for ApiState<S, N> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      notifier: Arc::clone(&self.notifier),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `store` and `notifier`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, N>(store: Arc<S>, notifier: Arc<N>) -> Router<()>
where
  S: PlatformStore + 'static,
  N: Notifier + 'static,
{
  let state = ApiState { store, notifier };

  Router::new()
    // Donations
    .route("/donate/make-donation", post(donations::make::<S, N>))
    .route(
      "/donate/donations/{id}",
      get(donations::for_beneficiary::<S, N>),
    )
    .route(
      "/donate/donations/{id}/fulfill",
      put(donations::fulfill_one::<S, N>),
    )
    // Beneficiaries
    .route("/beneficiary/create", post(beneficiaries::create::<S, N>))
    .route(
      "/beneficiary/beneficiaries",
      get(beneficiaries::list::<S, N>),
    )
    .route(
      "/beneficiary/approved-beneficiaries",
      get(beneficiaries::list_approved::<S, N>),
    )
    .route(
      "/beneficiary/verify-beneficiary/{id}",
      put(beneficiaries::verify::<S, N>),
    )
    .route(
      "/beneficiary/make-fulfill/{id}",
      put(beneficiaries::make_fulfill::<S, N>),
    )
    .route(
      "/beneficiary/{id}/details",
      get(beneficiaries::details::<S, N>),
    )
    // Surveys
    .route("/forum/create-survey", post(surveys::create::<S, N>))
    .route("/forum/surveys", get(surveys::list::<S, N>))
    .route(
      "/forum/publish_Campaign/{id}",
      patch(surveys::publish::<S, N>),
    )
    .route("/forum/toogle-status/{id}", put(surveys::toggle_status::<S, N>))
    .route("/forum/renew-request/{id}", post(surveys::renew_request::<S, N>))
    .route("/forum/{id}/respond", post(surveys::respond::<S, N>))
    .route("/forum/{id}/results", get(surveys::results::<S, N>))
    .route("/forum/{id}/export", get(export::survey_csv::<S, N>))
    .route(
      "/forum/{id}/questions/{question_id}/export",
      get(export::question_csv::<S, N>),
    )
    .route(
      "/forum/{id}",
      get(surveys::get_one::<S, N>).delete(surveys::delete::<S, N>),
    )
    .with_state(state)
}

// ─── Notification dispatch ───────────────────────────────────────────────────

/// Fire-and-log dispatch: a failing notifier never fails the request that
/// triggered it.
pub(crate) async fn dispatch<N: Notifier>(
  notifier: &N,
  event: NotificationEvent,
) {
  if let Err(e) = notifier.notify(event).await {
    tracing::warn!(error = %e, "notification dispatch failed");
  }
}

// ─── Integration tests ───────────────────────────────────────────────────────
