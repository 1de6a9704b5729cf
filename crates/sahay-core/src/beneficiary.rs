//! Beneficiary — a need application and its cumulative funding state.
//!
//! The record is created when an applicant submits a need request and is
//! mutated by donation reconciliation, verifier review, and the
//! administrative closeout. `funding_status` is never set arbitrarily; it is
//! computed by [`crate::reconcile`] or written by the explicit closeout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Status enums ────────────────────────────────────────────────────────────

/// Verifier decision on an application. Gates public visibility.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
  #[default]
  Pending,
  Approved,
  Rejected,
}

/// Aggregate funding state of a beneficiary. Wire spellings follow the
/// established client contract.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
pub enum FundingStatus {
  #[default]
  #[serde(rename = "Not-Started")]
  NotStarted,
  #[serde(rename = "in-progress")]
  InProgress,
  #[serde(rename = "start received")]
  StartReceived,
  #[serde(rename = "fulfilled")]
  Fulfilled,
}

impl FundingStatus {
  pub fn is_fulfilled(&self) -> bool { matches!(self, Self::Fulfilled) }
}

// ─── Beneficiary ─────────────────────────────────────────────────────────────

/// A need application with its funding counters. Wire field names follow
/// the established client contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Beneficiary {
  pub beneficiary_id:      Uuid,
  /// Owning account. Relation only; the user record is not embedded.
  pub user_id:             Uuid,
  pub full_name:           Option<String>,
  /// Need category the applicant applied under (e.g. "Fundraising").
  #[serde(rename = "applyFor")]
  pub applied_for:         String,
  pub description_of_need: Option<String>,
  pub note_by_verifier:    Option<String>,
  /// Target funding amount. May be 0 until the verifier quantifies it.
  #[serde(rename = "expectedAmountOfMoney")]
  pub expected_amount:     f64,
  /// Cumulative amount received; monotonically non-decreasing.
  pub fund_raised:         f64,
  #[serde(rename = "bloodGroupUnitNeed")]
  pub blood_units_needed:   u32,
  #[serde(rename = "bloodGroupUnitReceived")]
  pub blood_units_received: u32,
  pub verification_status: VerificationStatus,
  #[serde(rename = "donationStatus")]
  pub funding_status:      FundingStatus,
  pub created_at:          DateTime<Utc>,
}

/// Input to [`crate::store::PlatformStore::create_beneficiary`].
/// Identity, counters, and statuses are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewBeneficiary {
  pub user_id:             Uuid,
  pub full_name:           Option<String>,
  pub applied_for:         String,
  pub description_of_need: Option<String>,
  pub expected_amount:     f64,
  pub blood_units_needed:  u32,
}

// ─── Read model ──────────────────────────────────────────────────────────────

/// A beneficiary paired with its view-time funding status, derived from the
/// donation scan (see [`crate::reconcile::derive_listing_status`]). Never
/// stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeneficiaryView {
  pub beneficiary:    Beneficiary,
  /// Derived status; the stored field wins once explicitly `fulfilled`.
  pub donation_status: FundingStatus,
}

/// Outcome of the administrative closeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseoutOutcome {
  pub beneficiary:       Beneficiary,
  /// Number of donation records moved to `fulfilled`.
  pub donations_updated: usize,
  /// The beneficiary was already fulfilled; nothing was changed and the
  /// benefited counter was not incremented again.
  pub already_fulfilled: bool,
}
