//! Donation reconciliation — the canonical status derivation.
//!
//! [`reconcile`] is the single place where a contribution's effect on the
//! beneficiary's aggregate state is decided. The store calls it at write
//! time inside the reconciliation transaction; the beneficiary listing calls
//! [`derive_listing_status`] at read time over the donation scan. Neither
//! path duplicates the rules of the other.

use crate::{
  beneficiary::{Beneficiary, FundingStatus},
  donation::{Donation, DonationKind, DonationStatus, NewDonation},
};

// ─── Write-time reconciliation ───────────────────────────────────────────────

/// The state both records must take after one contribution is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
  pub funding_status:       FundingStatus,
  pub donation_status:      DonationStatus,
  pub fund_raised:          f64,
  pub blood_units_received: u32,
}

/// Apply one validated contribution to a beneficiary's aggregate state.
///
/// Pure: the caller persists both sides under one transaction. Once a
/// beneficiary is `fulfilled`, no contribution moves it back to an earlier
/// state; the donation itself still records its own computed status.
pub fn reconcile(beneficiary: &Beneficiary, input: &NewDonation) -> Reconciled {
  let mut next = Reconciled {
    funding_status:       beneficiary.funding_status,
    donation_status:      DonationStatus::Pending,
    fund_raised:          beneficiary.fund_raised,
    blood_units_received: beneficiary.blood_units_received,
  };

  match input.kind {
    DonationKind::Blood => {
      next.blood_units_received += input.blood_units.unwrap_or(0);
      if next.blood_units_received >= beneficiary.blood_units_needed {
        next.funding_status = FundingStatus::InProgress;
        next.donation_status = DonationStatus::InProgress;
      } else {
        // Partial blood progress does not change the aggregate status.
        next.donation_status = DonationStatus::StartReceived;
      }
    }
    // Non-quantifiable need: acknowledged immediately.
    DonationKind::Mentorship => {
      next.funding_status = FundingStatus::InProgress;
      next.donation_status = DonationStatus::InProgress;
    }
    DonationKind::Fundraising => {
      apply_amount_rule(beneficiary, input.amount.unwrap_or(0.0), &mut next);
    }
    _ => {
      if input.mode.bears_amount() {
        apply_amount_rule(
          beneficiary,
          input.amount.unwrap_or(0.0),
          &mut next,
        );
      } else {
        next.funding_status = FundingStatus::InProgress;
        next.donation_status = DonationStatus::InProgress;
      }
    }
  }

  // Fulfilled is terminal for the aggregate; only the explicit closeout
  // writes it and nothing un-writes it.
  if beneficiary.funding_status.is_fulfilled() {
    next.funding_status = FundingStatus::Fulfilled;
  }

  next
}

/// Shared amount rule: accumulate, then compare against the target. Meeting
/// the target yields `in-progress`, not `fulfilled` — closeout is a separate
/// manual verification gate.
fn apply_amount_rule(
  beneficiary: &Beneficiary,
  amount: f64,
  next: &mut Reconciled,
) {
  next.fund_raised = beneficiary.fund_raised + amount;
  if next.fund_raised >= beneficiary.expected_amount {
    next.funding_status = FundingStatus::InProgress;
    next.donation_status = DonationStatus::InProgress;
  } else {
    next.funding_status = FundingStatus::StartReceived;
    next.donation_status = DonationStatus::StartReceived;
  }
}

// ─── Read-time derivation ────────────────────────────────────────────────────

/// View-time status for a beneficiary listing, derived from its donation
/// scan. The stored field wins once explicitly `fulfilled`; otherwise any
/// fulfilled donation marks the whole record fulfilled, any donation at all
/// marks it in progress, and an empty ledger falls back to the stored value.
pub fn derive_listing_status(
  stored: FundingStatus,
  donations: &[Donation],
) -> FundingStatus {
  if stored.is_fulfilled() {
    return FundingStatus::Fulfilled;
  }
  if donations
    .iter()
    .any(|d| d.status == DonationStatus::Fulfilled)
  {
    return FundingStatus::Fulfilled;
  }
  if !donations.is_empty() {
    return FundingStatus::InProgress;
  }
  stored
}
