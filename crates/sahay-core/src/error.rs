//! Error types for `sahay-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  #[error("beneficiary not found: {0}")]
  BeneficiaryNotFound(Uuid),

  #[error("donation not found: {0}")]
  DonationNotFound(Uuid),

  #[error("survey not found: {0}")]
  SurveyNotFound(Uuid),

  #[error("question not found: {0}")]
  QuestionNotFound(Uuid),

  #[error("invalid donation type: {0:?}")]
  InvalidDonationType(String),

  #[error("invalid amount for field {field}")]
  InvalidAmount { field: &'static str },

  #[error("missing required field {0}")]
  MissingField(&'static str),

  #[error("survey {0} is not accepting responses")]
  SurveyNotActive(Uuid),

  #[error("a response to survey {0} already exists for this respondent")]
  DuplicateResponse(Uuid),

  #[error("trial campaign already used")]
  TrialAlreadyUsed,

  #[error("user {0} already has an open beneficiary application")]
  ApplicationInProgress(Uuid),

  #[error("forbidden: {0}")]
  Forbidden(&'static str),

  #[error("validation failed: {0}")]
  Validation(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// A storage-layer failure that aborted the enclosing transaction.
  #[error("storage failure: {0}")]
  Storage(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
