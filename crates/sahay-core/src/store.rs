//! The `PlatformStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `sahay-store-sqlite`).
//! Higher layers (`sahay-api`, `sahay-server`) depend on this abstraction,
//! not on any concrete backend.
//!
//! Multi-document mutations — donation reconciliation, the closeout,
//! archive-and-delete — must be atomic: either every touched record reflects
//! the operation or none does.

use std::future::Future;

use uuid::Uuid;

use crate::{
  beneficiary::{
    Beneficiary, BeneficiaryView, CloseoutOutcome, NewBeneficiary,
    VerificationStatus,
  },
  donation::{Donation, NewDonation},
  survey::{
    ArchivedSurvey, NewSurvey, RenewalRequest, RespondentIdentity, Survey,
    SurveyResponse,
  },
  user::{NewUser, User},
};

/// Abstraction over the platform's document store.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`). Errors must
/// convert into [`crate::Error`] so callers can map them onto the HTTP
/// error taxonomy.
pub trait PlatformStore: Send + Sync {
  type Error: std::error::Error
    + Into<crate::Error>
    + Send
    + Sync
    + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  // ── Beneficiaries ─────────────────────────────────────────────────────

  /// Submit a need application. Marks the owning user as a beneficiary.
  /// Fails if the user already has an application that is not yet
  /// fulfilled.
  fn create_beneficiary(
    &self,
    input: NewBeneficiary,
  ) -> impl Future<Output = Result<Beneficiary, Self::Error>> + Send + '_;

  fn get_beneficiary(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Beneficiary>, Self::Error>> + Send + '_;

  /// List beneficiaries with their view-time donation status, optionally
  /// restricted to one verification state.
  fn list_beneficiaries(
    &self,
    verification: Option<VerificationStatus>,
  ) -> impl Future<Output = Result<Vec<BeneficiaryView>, Self::Error>> + Send + '_;

  /// Verifier review: set the verification status and an optional note.
  fn set_verification(
    &self,
    id: Uuid,
    status: VerificationStatus,
    note: Option<String>,
  ) -> impl Future<Output = Result<Beneficiary, Self::Error>> + Send + '_;

  /// Administrative closeout: mark the beneficiary and every one of its
  /// donations fulfilled, clear the owner's beneficiary flag, and bump the
  /// owner's lifetime benefited counter — once. Calling it again is an
  /// acknowledged no-op.
  fn mark_fulfilled(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<CloseoutOutcome, Self::Error>> + Send + '_;

  // ── Donations ─────────────────────────────────────────────────────────

  /// Record a contribution and reconcile the beneficiary's aggregate state
  /// under one transaction. Returns both records as persisted.
  fn record_donation(
    &self,
    input: NewDonation,
  ) -> impl Future<Output = Result<(Donation, Beneficiary), Self::Error>> + Send + '_;

  fn donations_for_beneficiary(
    &self,
    beneficiary_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Donation>, Self::Error>> + Send + '_;

  /// Admin spot action: mark one donation fulfilled.
  fn fulfill_donation(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Donation, Self::Error>> + Send + '_;

  // ── Surveys ───────────────────────────────────────────────────────────

  fn create_survey(
    &self,
    input: NewSurvey,
  ) -> impl Future<Output = Result<Survey, Self::Error>> + Send + '_;

  fn get_survey(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Survey>, Self::Error>> + Send + '_;

  fn list_surveys(
    &self,
  ) -> impl Future<Output = Result<Vec<Survey>, Self::Error>> + Send + '_;

  /// Owner-only: draft → active with a fresh window, consuming the
  /// owner's trial and clearing their payment slip.
  fn publish_survey(
    &self,
    survey_id: Uuid,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<Survey, Self::Error>> + Send + '_;

  /// Append one response. The active window is checked and the per-survey
  /// respondent uniqueness is enforced by the storage layer itself.
  fn add_response(
    &self,
    survey_id: Uuid,
    respondent: RespondentIdentity,
    answers: serde_json::Value,
  ) -> impl Future<Output = Result<SurveyResponse, Self::Error>> + Send + '_;

  fn responses_for_survey(
    &self,
    survey_id: Uuid,
  ) -> impl Future<Output = Result<Vec<SurveyResponse>, Self::Error>> + Send + '_;

  /// Admin-created surveys only: flip active ↔ completed. On
  /// re-activation the window is recomputed from now and the budget and
  /// duration are overwritten when supplied.
  fn toggle_admin_status(
    &self,
    survey_id: Uuid,
    budget: Option<f64>,
    duration_days: Option<u32>,
  ) -> impl Future<Output = Result<Survey, Self::Error>> + Send + '_;

  /// Owner-only: record a renewal request. Never mutates the survey.
  fn record_renewal_request(
    &self,
    survey_id: Uuid,
    requested_by: Uuid,
    budget: f64,
    duration_days: u32,
  ) -> impl Future<Output = Result<RenewalRequest, Self::Error>> + Send + '_;

  /// Owner-only: archive a denormalised summary onto the owning user,
  /// then delete the survey and its responses, atomically.
  fn delete_survey(
    &self,
    survey_id: Uuid,
    requested_by: Uuid,
  ) -> impl Future<Output = Result<ArchivedSurvey, Self::Error>> + Send + '_;
}
