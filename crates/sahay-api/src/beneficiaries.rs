//! Handlers for `/beneficiary` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/beneficiary/create` | Submit a need application |
//! | `GET`  | `/beneficiary/beneficiaries` | All records with derived donation status |
//! | `GET`  | `/beneficiary/approved-beneficiaries` | Verifier-approved only |
//! | `GET`  | `/beneficiary/:id/details` | Single record |
//! | `PUT`  | `/beneficiary/verify-beneficiary/:id` | Verifier decision |
//! | `PUT`  | `/beneficiary/make-fulfill/:id` | Administrative closeout |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use sahay_core::{
  beneficiary::{BeneficiaryView, NewBeneficiary, VerificationStatus},
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

// ─── Create ──────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /beneficiary/create`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBeneficiaryBody {
  pub user_id:              Uuid,
  pub full_name:            Option<String>,
  #[serde(rename = "applyFor")]
  pub applied_for:          String,
  pub description_of_need:  Option<String>,
  #[serde(default)]
  pub expected_amount_of_money: f64,
  #[serde(default)]
  pub blood_group_unit_need: u32,
}

/// `POST /beneficiary/create` — 201 with the pending application.
pub async fn create<S, N>(
  State(state): State<ApiState<S, N>>,
  Json(body): Json<CreateBeneficiaryBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  N: Notifier,
{
  if body.applied_for.trim().is_empty() {
    return Err(ApiError::BadRequest {
      message: "applyFor must not be empty".to_owned(),
      field:   Some("applyFor"),
    });
  }

  let beneficiary = state
    .store
    .create_beneficiary(NewBeneficiary {
      user_id:             body.user_id,
      full_name:           body.full_name,
      applied_for:         body.applied_for,
      description_of_need: body.description_of_need,
      expected_amount:     body.expected_amount_of_money,
      blood_units_needed:  body.blood_group_unit_need,
    })
    .await
    .map_err(store_err)?;

  Ok((
    StatusCode::CREATED,
    Json(json!({
      "message": "Application submitted successfully",
      "beneficiary": beneficiary,
    })),
  ))
}

// ─── Listings ────────────────────────────────────────────────────────────────

/// `GET /beneficiary/beneficiaries` — every record, each with its
/// view-time donation status derived from the donation scan.
pub async fn list<S, N>(
  State(state): State<ApiState<S, N>>,
) -> Result<Json<Vec<BeneficiaryView>>, ApiError>
where
  S: PlatformStore,
  N: Notifier,
{
  let views =
    state.store.list_beneficiaries(None).await.map_err(store_err)?;
  Ok(Json(views))
}

/// `GET /beneficiary/approved-beneficiaries`
pub async fn list_approved<S, N>(
  State(state): State<ApiState<S, N>>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  N: Notifier,
{
  let views = state
    .store
    .list_beneficiaries(Some(VerificationStatus::Approved))
    .await
    .map_err(store_err)?;
  Ok(Json(json!({ "approvedBeneficiaries": views })))
}

/// `GET /beneficiary/:id/details`
pub async fn details<S, N>(
  State(state): State<ApiState<S, N>>,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  N: Notifier,
{
  let beneficiary = state
    .store
    .get_beneficiary(id)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("beneficiary {id} not found")))?;
  Ok(Json(json!({ "beneficiary": beneficiary })))
}

// ─── Verification ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyBody {
  pub status: VerificationStatus,
  pub note:   Option<String>,
}

/// `PUT /beneficiary/verify-beneficiary/:id` — verifier decision.
pub async fn verify<S, N>(
  State(state): State<ApiState<S, N>>,
  Path(id): Path<Uuid>,
  Json(body): Json<VerifyBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  N: Notifier,
{
  let beneficiary = state
    .store
    .set_verification(id, body.status, body.note)
    .await
    .map_err(store_err)?;
  Ok(Json(json!({
    "message": "Verification updated",
    "beneficiary": beneficiary,
  })))
}

// ─── Closeout ────────────────────────────────────────────────────────────────

/// `PUT /beneficiary/make-fulfill/:id` — close out a beneficiary and all of
/// its donations. Repeating the call acknowledges without changing anything.
pub async fn make_fulfill<S, N>(
  State(state): State<ApiState<S, N>>,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  N: Notifier,
{
  let outcome = state.store.mark_fulfilled(id).await.map_err(store_err)?;

  let message = if outcome.already_fulfilled {
    "Support was already marked as fulfilled"
  } else {
    "Support marked as fulfilled and user updated"
  };
  Ok(Json(json!({
    "message": message,
    "beneficiary": outcome.beneficiary,
    "donationsUpdated": outcome.donations_updated,
  })))
}
