//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every failure body carries a human-readable `message`; validation
//! failures additionally name the offending `field` so clients can
//! re-prompt without guessing.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use sahay_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {message}")]
  BadRequest {
    message: String,
    field:   Option<&'static str>,
  },

  #[error("not found: {0}")]
  NotFound(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("conflict: {0}")]
  Conflict(String),

  /// A storage transaction aborted; nothing was persisted.
  #[error("transaction failed: {0}")]
  TransactionFailed(String),
}

impl ApiError {
  pub fn bad_request(message: impl Into<String>) -> Self {
    Self::BadRequest { message: message.into(), field: None }
  }
}

impl From<CoreError> for ApiError {
  fn from(e: CoreError) -> Self {
    match e {
      CoreError::UserNotFound(_)
      | CoreError::BeneficiaryNotFound(_)
      | CoreError::DonationNotFound(_)
      | CoreError::SurveyNotFound(_)
      | CoreError::QuestionNotFound(_) => Self::NotFound(e.to_string()),

      CoreError::InvalidAmount { field } => {
        Self::BadRequest { message: e.to_string(), field: Some(field) }
      }
      CoreError::MissingField(field) => {
        Self::BadRequest { message: e.to_string(), field: Some(field) }
      }
      CoreError::InvalidDonationType(_)
      | CoreError::SurveyNotActive(_)
      | CoreError::Validation(_)
      | CoreError::Serialization(_) => {
        Self::BadRequest { message: e.to_string(), field: None }
      }

      CoreError::DuplicateResponse(_)
      | CoreError::TrialAlreadyUsed
      | CoreError::ApplicationInProgress(_) => Self::Conflict(e.to_string()),

      CoreError::Forbidden(_) => Self::Forbidden(e.to_string()),

      CoreError::Storage(_) => Self::TransactionFailed(e.to_string()),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message, field) = match self {
      ApiError::BadRequest { message, field } => {
        (StatusCode::BAD_REQUEST, message, field)
      }
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m, None),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m, None),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m, None),
      ApiError::TransactionFailed(m) => {
        (StatusCode::INTERNAL_SERVER_ERROR, m, None)
      }
    };

    let body = match field {
      Some(field) => json!({ "message": message, "field": field }),
      None => json!({ "message": message }),
    };
    (status, Json(body)).into_response()
  }
}

/// Convert a store error through the core taxonomy.
pub(crate) fn store_err<E: Into<CoreError>>(e: E) -> ApiError {
  ApiError::from(e.into())
}
