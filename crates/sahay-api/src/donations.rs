//! Handlers for `/donate` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/donate/make-donation` | Body: [`MakeDonationBody`]; runs reconciliation |
//! | `GET`  | `/donate/donations/:id` | Donations recorded against one beneficiary |
//! | `PUT`  | `/donate/donations/:id/fulfill` | Admin spot action on one donation |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use sahay_core::{
  Error as CoreError,
  donation::{ContributionMode, DonationKind, NewDonation},
  notify::Notifier,
  store::PlatformStore,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
  ApiState,
  error::{ApiError, store_err},
};

// ─── Make donation ───────────────────────────────────────────────────────────

/// JSON body accepted by `POST /donate/make-donation`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakeDonationBody {
  pub donor_id:            Uuid,
  pub beneficiary_id:      Uuid,
  /// Contribution category; validated against the closed kind set.
  #[serde(rename = "type")]
  pub kind:                String,
  /// Broad client-side grouping, recorded verbatim.
  pub donation_type:       Option<String>,
  pub donate_via:          Option<ContributionMode>,
  pub amount:              Option<f64>,
  pub blood_units_donated: Option<u32>,
  pub description:         Option<String>,
  pub donor_name:          Option<String>,
}

/// `POST /donate/make-donation` — 201 with the reconciled donation.
pub async fn make<S, N>(
  State(state): State<ApiState<S, N>>,
  Json(body): Json<MakeDonationBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  N: Notifier,
{
  let kind: DonationKind = body.kind.parse().map_err(ApiError::from)?;
  let mode = body
    .donate_via
    .ok_or(CoreError::MissingField("donateVia"))?;

  let input = NewDonation {
    donor_id:       body.donor_id,
    donor_name:     body.donor_name,
    beneficiary_id: body.beneficiary_id,
    kind,
    category:       body.donation_type,
    mode,
    amount:         body.amount,
    blood_units:    body.blood_units_donated,
    description:    body.description,
  };

  let (donation, _beneficiary) =
    state.store.record_donation(input).await.map_err(store_err)?;

  Ok((
    StatusCode::CREATED,
    Json(json!({
      "message": "Donation recorded successfully",
      "donation": donation,
    })),
  ))
}

// ─── Donations per beneficiary ───────────────────────────────────────────────

/// `GET /donate/donations/:id` — the ledger entries for one beneficiary.
pub async fn for_beneficiary<S, N>(
  State(state): State<ApiState<S, N>>,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  N: Notifier,
{
  let donations = state
    .store
    .donations_for_beneficiary(id)
    .await
    .map_err(store_err)?;
  Ok(Json(json!({ "donations": donations })))
}

// ─── Fulfill one ─────────────────────────────────────────────────────────────

/// `PUT /donate/donations/:id/fulfill`
pub async fn fulfill_one<S, N>(
  State(state): State<ApiState<S, N>>,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  N: Notifier,
{
  let donation =
    state.store.fulfill_donation(id).await.map_err(store_err)?;
  Ok(Json(json!({
    "message": "Donation marked as fulfilled",
    "donation": donation,
  })))
}
