//! Handlers for `/forum` survey endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/forum/create-survey` | Campaigner draft or admin live survey |
//! | `GET`  | `/forum/surveys` | Dashboard listing |
//! | `GET`  | `/forum/:id` | Single survey |
//! | `PATCH`| `/forum/publish_Campaign/:id` | Owner publish |
//! | `POST` | `/forum/:id/respond` | Collect one response |
//! | `PUT`  | `/forum/toogle-status/:id` | Admin active ⇄ completed |
//! | `POST` | `/forum/renew-request/:id` | Record a renewal request |
//! | `GET`  | `/forum/:id/results` | Aggregate or single-question tally |
//! | `DELETE`| `/forum/:id` | Archive summary, then delete |
//!
//! Notification dispatch never fails the primary mutation; failures are
//! logged and swallowed.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use sahay_core::{
  Error as CoreError,
  notify::{NotificationEvent, Notifier},
  store::PlatformStore,
  survey::{
    NewSurvey, RespondentIdentity, compute_question_results, compute_results,
    parse_questions,
  },
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
  ApiState, dispatch,
  error::{ApiError, store_err},
};

// ─── Create ──────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /forum/create-survey`.
///
/// `questions` may be a JSON array or — from multipart clients — a
/// JSON-encoded string; `durationDays` tolerates numeric strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSurveyBody {
  pub created_by:      Uuid,
  pub title:           String,
  pub org_name:        Option<String>,
  #[serde(default)]
  pub budget:          f64,
  pub duration_days:   Option<serde_json::Value>,
  #[serde(default)]
  pub admin_created:   bool,
  #[serde(default = "default_allow_anonymous")]
  pub allow_anonymous: bool,
  #[serde(default)]
  pub is_trial:        bool,
  #[serde(default)]
  pub questions:       serde_json::Value,
  pub start_date:      Option<DateTime<Utc>>,
  pub end_date:        Option<DateTime<Utc>>,
}

fn default_allow_anonymous() -> bool { true }

/// Accept a duration as a JSON number or a numeric string.
fn coerce_duration(value: Option<&serde_json::Value>) -> Result<u32, ApiError> {
  let Some(value) = value else { return Ok(0) };
  match value {
    serde_json::Value::Number(n) => {
      n.as_u64().map(|d| d as u32).ok_or_else(|| ApiError::BadRequest {
        message: "durationDays must be a non-negative integer".to_owned(),
        field:   Some("durationDays"),
      })
    }
    serde_json::Value::String(s) => {
      s.trim().parse::<u32>().map_err(|_| ApiError::BadRequest {
        message: format!("durationDays is not numeric: {s:?}"),
        field:   Some("durationDays"),
      })
    }
    _ => Err(ApiError::BadRequest {
      message: "durationDays is not numeric".to_owned(),
      field:   Some("durationDays"),
    }),
  }
}

/// `POST /forum/create-survey` — 201 with the stored survey.
pub async fn create<S, N>(
  State(state): State<ApiState<S, N>>,
  Json(body): Json<CreateSurveyBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  N: Notifier,
{
  let duration_days = coerce_duration(body.duration_days.as_ref())?;
  let questions = match body.questions {
    serde_json::Value::Null => Vec::new(),
    other => parse_questions(other).map_err(ApiError::from)?,
  };

  let survey = state
    .store
    .create_survey(NewSurvey {
      created_by: body.created_by,
      title: body.title,
      org_name: body.org_name,
      budget: body.budget,
      duration_days,
      admin_created: body.admin_created,
      allow_anonymous: body.allow_anonymous,
      is_trial: body.is_trial,
      questions,
      start_date: body.start_date,
      end_date: body.end_date,
    })
    .await
    .map_err(store_err)?;

  Ok((StatusCode::CREATED, Json(json!({ "survey": survey }))))
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// `GET /forum/surveys`
pub async fn list<S, N>(
  State(state): State<ApiState<S, N>>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  N: Notifier,
{
  let surveys = state.store.list_surveys().await.map_err(store_err)?;
  Ok(Json(json!({ "surveys": surveys })))
}

/// `GET /forum/:id`
pub async fn get_one<S, N>(
  State(state): State<ApiState<S, N>>,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  N: Notifier,
{
  let survey = fetch_survey(&state, id).await?;
  Ok(Json(json!({ "survey": survey })))
}

// ─── Publish ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishBody {
  pub owner_id: Uuid,
}

/// `PATCH /forum/publish_Campaign/:id` — owner-only go-live.
pub async fn publish<S, N>(
  State(state): State<ApiState<S, N>>,
  Path(id): Path<Uuid>,
  Json(body): Json<PublishBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  N: Notifier,
{
  let survey = state
    .store
    .publish_survey(id, body.owner_id)
    .await
    .map_err(store_err)?;
  Ok(Json(json!({ "survey": survey })))
}

// ─── Respond ─────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /forum/:id/respond`. Exactly one of
/// `userId` and `anonymousId` identifies the respondent.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondBody {
  pub user_id:      Option<Uuid>,
  pub anonymous_id: Option<String>,
  pub answers:      serde_json::Value,
}

/// `POST /forum/:id/respond` — 201 with the response id and the resolved
/// respondent display name.
pub async fn respond<S, N>(
  State(state): State<ApiState<S, N>>,
  Path(id): Path<Uuid>,
  Json(body): Json<RespondBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  N: Notifier,
{
  // Registered identity takes precedence when a client sends both.
  let respondent = match (body.user_id, body.anonymous_id) {
    (Some(user_id), _) => RespondentIdentity::Registered(user_id),
    (None, Some(session)) => RespondentIdentity::Anonymous(session),
    (None, None) => {
      return Err(ApiError::from(CoreError::MissingField(
        "userId or anonymousId",
      )));
    }
  };

  let response = state
    .store
    .add_response(id, respondent, body.answers)
    .await
    .map_err(store_err)?;

  Ok((
    StatusCode::CREATED,
    Json(json!({
      "responseId": response.response_id,
      "respondentName": response.respondent_name,
    })),
  ))
}

// ─── Admin toggle ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleBody {
  pub budget:        Option<f64>,
  pub duration_days: Option<u32>,
}

/// `PUT /forum/toogle-status/:id` — flip an admin-created survey between
/// active and completed, then tell the owning campaigner.
pub async fn toggle_status<S, N>(
  State(state): State<ApiState<S, N>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ToggleBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  N: Notifier,
{
  let survey = state
    .store
    .toggle_admin_status(id, body.budget, body.duration_days)
    .await
    .map_err(store_err)?;

  let owner_email = owner_email(&state, survey.created_by).await;
  dispatch(
    state.notifier.as_ref(),
    NotificationEvent::SurveyStatusChanged {
      survey_id:   survey.survey_id,
      title:       survey.title.clone(),
      owner_email,
      status:      survey.status,
      end_date:    survey.end_date,
    },
  )
  .await;

  Ok(Json(json!({ "survey": survey })))
}

// ─── Renewal ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewRequestBody {
  pub requester_id: Uuid,
  pub budget:       f64,
  pub days:         u32,
}

/// `POST /forum/renew-request/:id` — record the request and notify
/// administrators and the campaigner. The survey itself is untouched.
pub async fn renew_request<S, N>(
  State(state): State<ApiState<S, N>>,
  Path(id): Path<Uuid>,
  Json(body): Json<RenewRequestBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  N: Notifier,
{
  let survey = fetch_survey(&state, id).await?;

  let request = state
    .store
    .record_renewal_request(id, body.requester_id, body.budget, body.days)
    .await
    .map_err(store_err)?;

  dispatch(
    state.notifier.as_ref(),
    NotificationEvent::RenewalRequested {
      survey_id:     id,
      title:         survey.title,
      requested_by:  body.requester_id,
      budget:        body.budget,
      duration_days: body.days,
    },
  )
  .await;

  Ok(Json(json!({
    "message": "Renewal request received",
    "request": request,
  })))
}

// ─── Results ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ResultsParams {
  /// Restrict to one question's tally and matching responses.
  pub question: Option<Uuid>,
}

/// `GET /forum/:id/results[?question=<id>]`
pub async fn results<S, N>(
  State(state): State<ApiState<S, N>>,
  Path(id): Path<Uuid>,
  Query(params): Query<ResultsParams>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  N: Notifier,
{
  let survey = fetch_survey(&state, id).await?;
  let responses = state
    .store
    .responses_for_survey(id)
    .await
    .map_err(store_err)?;

  match params.question {
    Some(question_id) => {
      let single =
        compute_question_results(&survey, question_id, &responses)
          .map_err(ApiError::from)?;
      Ok(Json(json!(single)))
    }
    None => Ok(Json(json!(compute_results(&survey, &responses)))),
  }
}

// ─── Delete ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
  pub requester: Uuid,
}

/// `DELETE /forum/:id?requester=<id>` — archive a summary onto the owning
/// user, notify them, then delete the survey for good.
pub async fn delete<S, N>(
  State(state): State<ApiState<S, N>>,
  Path(id): Path<Uuid>,
  Query(params): Query<DeleteParams>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  N: Notifier,
{
  let survey = fetch_survey(&state, id).await?;
  let owner_email = owner_email(&state, survey.created_by).await;

  let archive = state
    .store
    .delete_survey(id, params.requester)
    .await
    .map_err(store_err)?;

  dispatch(
    state.notifier.as_ref(),
    NotificationEvent::SurveyDeleted {
      survey_id: id,
      title: survey.title,
      owner_email,
    },
  )
  .await;

  Ok(Json(json!({
    "message": "Survey deleted successfully",
    "archive": archive,
  })))
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

async fn fetch_survey<S, N>(
  state: &ApiState<S, N>,
  id: Uuid,
) -> Result<sahay_core::survey::Survey, ApiError>
where
  S: PlatformStore,
  N: Notifier,
{
  state
    .store
    .get_survey(id)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("survey {id} not found")))
}

/// Best-effort owner email lookup for notification payloads.
async fn owner_email<S, N>(
  state: &ApiState<S, N>,
  owner_id: Uuid,
) -> Option<String>
where
  S: PlatformStore,
  N: Notifier,
{
  match state.store.get_user(owner_id).await {
    Ok(user) => user.and_then(|u| u.email),
    Err(e) => {
      tracing::warn!(error = %e, "owner lookup for notification failed");
      None
    }
  }
}
