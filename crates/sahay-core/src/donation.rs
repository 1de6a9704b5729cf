//! Donation — one recorded contribution event tied to exactly one
//! beneficiary. Ledger entries are append-only; only `status` is updated in
//! place, by reconciliation and by the closeout.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Donation kind ───────────────────────────────────────────────────────────

/// The closed set of contribution categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DonationKind {
  Books,
  #[serde(rename = "Learning Material")]
  LearningMaterial,
  #[serde(rename = "Learning Gadgets")]
  LearningGadgets,
  Mentorship,
  Medications,
  #[serde(rename = "Hospital Assistance")]
  HospitalAssistance,
  Blood,
  Clothes,
  Food,
  #[serde(rename = "Quality Education")]
  QualityEducation,
  Shelter,
  Employment,
  Volunteering,
  Fundraising,
}

impl DonationKind {
  /// Canonical wire/storage spelling. Must match the serde renames above.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Books => "Books",
      Self::LearningMaterial => "Learning Material",
      Self::LearningGadgets => "Learning Gadgets",
      Self::Mentorship => "Mentorship",
      Self::Medications => "Medications",
      Self::HospitalAssistance => "Hospital Assistance",
      Self::Blood => "Blood",
      Self::Clothes => "Clothes",
      Self::Food => "Food",
      Self::QualityEducation => "Quality Education",
      Self::Shelter => "Shelter",
      Self::Employment => "Employment",
      Self::Volunteering => "Volunteering",
      Self::Fundraising => "Fundraising",
    }
  }
}

impl FromStr for DonationKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "Books" => Ok(Self::Books),
      "Learning Material" => Ok(Self::LearningMaterial),
      "Learning Gadgets" => Ok(Self::LearningGadgets),
      "Mentorship" => Ok(Self::Mentorship),
      "Medications" => Ok(Self::Medications),
      "Hospital Assistance" => Ok(Self::HospitalAssistance),
      "Blood" => Ok(Self::Blood),
      "Clothes" => Ok(Self::Clothes),
      "Food" => Ok(Self::Food),
      "Quality Education" => Ok(Self::QualityEducation),
      "Shelter" => Ok(Self::Shelter),
      "Employment" => Ok(Self::Employment),
      "Volunteering" => Ok(Self::Volunteering),
      "Fundraising" => Ok(Self::Fundraising),
      other => Err(Error::InvalidDonationType(other.to_owned())),
    }
  }
}

// ─── Contribution mode ───────────────────────────────────────────────────────

/// What the donor intends to cover. A closed enum at the API boundary; the
/// amount-reconciliation rule applies to the first two variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionMode {
  /// Cover the full expected amount.
  FullAmount,
  /// Cover a partial amount of the expected total.
  PartialAmount,
  /// Acknowledge the need and start the process without a quantified
  /// amount.
  AcknowledgeOnly,
}

impl ContributionMode {
  /// The amount-reconciliation rule applies to this mode.
  pub fn bears_amount(&self) -> bool {
    matches!(self, Self::FullAmount | Self::PartialAmount)
  }
}

// ─── Donation status ─────────────────────────────────────────────────────────

/// Per-donation fulfilment state. Mirrors — but is stored independently of —
/// the beneficiary's aggregate status at the time of write.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
pub enum DonationStatus {
  #[default]
  #[serde(rename = "pending")]
  Pending,
  #[serde(rename = "in-progress")]
  InProgress,
  #[serde(rename = "start received")]
  StartReceived,
  #[serde(rename = "fulfilled")]
  Fulfilled,
}

// ─── Donation ────────────────────────────────────────────────────────────────

/// One contribution event in the ledger. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
  pub donation_id:    Uuid,
  /// Registered donor, if any.
  pub donor_id:       Uuid,
  /// Free-text donor name for unregistered contributors.
  pub donor_name:     Option<String>,
  pub beneficiary_id: Uuid,
  pub kind:           DonationKind,
  /// Broad grouping the client sends alongside the kind (e.g.
  /// "monetarySupport"); recorded verbatim, never branched on.
  pub category:       Option<String>,
  pub mode:           ContributionMode,
  /// Set only when `kind == Fundraising` or the mode bears an amount.
  pub amount:         Option<f64>,
  /// Set only when `kind == Blood`.
  pub blood_units:    Option<u32>,
  pub description:    Option<String>,
  pub status:         DonationStatus,
  pub recorded_at:    DateTime<Utc>,
}

// ─── NewDonation ─────────────────────────────────────────────────────────────

/// Input to [`crate::store::PlatformStore::record_donation`].
/// `donation_id`, `status`, and `recorded_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewDonation {
  pub donor_id:       Uuid,
  pub donor_name:     Option<String>,
  pub beneficiary_id: Uuid,
  pub kind:           DonationKind,
  pub category:       Option<String>,
  pub mode:           ContributionMode,
  pub amount:         Option<f64>,
  pub blood_units:    Option<u32>,
  pub description:    Option<String>,
}

impl NewDonation {
  /// Field-level validation, applied before any storage work.
  ///
  /// - `Fundraising` requires a positive, finite amount.
  /// - `Blood` requires a positive unit count.
  /// - Any other kind with an amount-bearing mode requires a positive,
  ///   finite amount (the amount rule will be applied to it).
  pub fn validate(&self) -> Result<()> {
    let amount_ok =
      self.amount.is_some_and(|a| a.is_finite() && a > 0.0);

    match self.kind {
      DonationKind::Fundraising if !amount_ok => {
        Err(Error::InvalidAmount { field: "amount" })
      }
      DonationKind::Blood
        if !self.blood_units.is_some_and(|u| u > 0) =>
      {
        Err(Error::InvalidAmount { field: "bloodUnitsDonated" })
      }
      DonationKind::Blood | DonationKind::Mentorship => Ok(()),
      _ if self.mode.bears_amount() && !amount_ok => {
        Err(Error::InvalidAmount { field: "amount" })
      }
      _ => Ok(()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn donation(kind: DonationKind, mode: ContributionMode) -> NewDonation {
    NewDonation {
      donor_id:       Uuid::new_v4(),
      donor_name:     None,
      beneficiary_id: Uuid::new_v4(),
      kind,
      category:       None,
      mode,
      amount:         None,
      blood_units:    None,
      description:    None,
    }
  }

  #[test]
  fn fundraising_requires_positive_amount() {
    let mut d =
      donation(DonationKind::Fundraising, ContributionMode::FullAmount);
    assert!(d.validate().is_err());

    d.amount = Some(0.0);
    assert!(d.validate().is_err());

    d.amount = Some(250.0);
    assert!(d.validate().is_ok());
  }

  #[test]
  fn blood_requires_positive_units() {
    let mut d =
      donation(DonationKind::Blood, ContributionMode::AcknowledgeOnly);
    assert!(d.validate().is_err());

    d.blood_units = Some(2);
    assert!(d.validate().is_ok());
  }

  #[test]
  fn amount_bearing_mode_requires_amount_for_other_kinds() {
    let mut d =
      donation(DonationKind::Books, ContributionMode::PartialAmount);
    assert!(d.validate().is_err());

    d.amount = Some(100.0);
    assert!(d.validate().is_ok());
  }

  #[test]
  fn acknowledge_only_needs_no_amount() {
    let d = donation(DonationKind::Shelter, ContributionMode::AcknowledgeOnly);
    assert!(d.validate().is_ok());
  }

  #[test]
  fn kind_spellings_round_trip() {
    for kind in [
      DonationKind::Books,
      DonationKind::LearningMaterial,
      DonationKind::HospitalAssistance,
      DonationKind::QualityEducation,
      DonationKind::Fundraising,
    ] {
      assert_eq!(kind.as_str().parse::<DonationKind>().unwrap(), kind);
    }
    assert!("Cryptocurrency".parse::<DonationKind>().is_err());
  }
}
