//! CSV export for survey responses.
//!
//! Column order is deterministic: `Response ID`, `Respondent`, one column
//! per question (`Q{n}: {text}` in declaration order), `Response Date`.
//! A blank-separated `Chart Data` section follows with one row per declared
//! option per question — zero-count options included.

use axum::{
  extract::{Path, State},
  http::{StatusCode, header},
  response::{IntoResponse, Response},
};
use sahay_core::{
  notify::Notifier,
  store::PlatformStore,
  survey::{Question, Survey, SurveyResponse, tally_options},
};
use uuid::Uuid;

use crate::{
  ApiState,
  error::{ApiError, store_err},
};

// ─── Handlers ────────────────────────────────────────────────────────────────

/// `GET /forum/:id/export` — the full survey as a CSV attachment.
pub async fn survey_csv<S, N>(
  State(state): State<ApiState<S, N>>,
  Path(id): Path<Uuid>,
) -> Result<Response, ApiError>
where
  S: PlatformStore,
  N: Notifier,
{
  let (survey, responses) = load(&state, id).await?;
  let body = render(&survey, &survey.questions, &responses)?;
  Ok(attachment(format!("survey-{id}.csv"), body))
}

/// `GET /forum/:id/questions/:question_id/export` — one question only.
pub async fn question_csv<S, N>(
  State(state): State<ApiState<S, N>>,
  Path((id, question_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ApiError>
where
  S: PlatformStore,
  N: Notifier,
{
  let (survey, responses) = load(&state, id).await?;
  let question = survey
    .question(question_id)
    .ok_or_else(|| {
      ApiError::NotFound(format!("question {question_id} not found"))
    })?
    .clone();
  let body = render(&survey, std::slice::from_ref(&question), &responses)?;
  Ok(attachment(format!("survey-{id}-question-{question_id}.csv"), body))
}

async fn load<S, N>(
  state: &ApiState<S, N>,
  id: Uuid,
) -> Result<(Survey, Vec<SurveyResponse>), ApiError>
where
  S: PlatformStore,
  N: Notifier,
{
  let survey = state
    .store
    .get_survey(id)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("survey {id} not found")))?;
  let responses = state
    .store
    .responses_for_survey(id)
    .await
    .map_err(store_err)?;
  Ok((survey, responses))
}

// ─── Rendering ───────────────────────────────────────────────────────────────

fn render(
  survey: &Survey,
  questions: &[Question],
  responses: &[SurveyResponse],
) -> Result<String, ApiError> {
  let table = response_table(survey, questions, responses)?;
  let chart = chart_data(questions, responses)?;
  Ok(format!("{table}\nChart Data\n{chart}"))
}

/// One row per response, in submission order.
fn response_table(
  survey: &Survey,
  questions: &[Question],
  responses: &[SurveyResponse],
) -> Result<String, ApiError> {
  let mut wtr = csv::Writer::from_writer(Vec::new());

  let mut header = vec!["Response ID".to_owned(), "Respondent".to_owned()];
  for question in questions {
    // Number questions by their position in the survey, not the export.
    let number = survey
      .questions
      .iter()
      .position(|q| q.question_id == question.question_id)
      .map_or(0, |i| i + 1);
    header.push(format!("Q{number}: {}", question.text));
  }
  header.push("Response Date".to_owned());
  wtr.write_record(&header).map_err(csv_err)?;

  for response in responses {
    let mut row =
      vec![response.response_id.to_string(), response.respondent_name.clone()];
    for question in questions {
      row.push(
        response
          .answers
          .get(&question.question_id)
          .map(answer_cell)
          .unwrap_or_default(),
      );
    }
    row.push(response.responded_at.to_rfc3339());
    wtr.write_record(&row).map_err(csv_err)?;
  }

  finish(wtr)
}

/// Option tallies per question; every declared option appears even when
/// nobody picked it. Free-text questions declare no options and contribute
/// no rows.
fn chart_data(
  questions: &[Question],
  responses: &[SurveyResponse],
) -> Result<String, ApiError> {
  let mut wtr = csv::Writer::from_writer(Vec::new());
  wtr
    .write_record(["Question", "Response", "Count"])
    .map_err(csv_err)?;

  for question in questions {
    for tally in tally_options(question, responses) {
      wtr
        .write_record([
          question.text.as_str(),
          tally.option.as_str(),
          &tally.count.to_string(),
        ])
        .map_err(csv_err)?;
    }
  }

  finish(wtr)
}

/// Render a stored answer into one cell: multiple choices join with "; ".
fn answer_cell(answer: &serde_json::Value) -> String {
  match answer {
    serde_json::Value::String(s) => s.clone(),
    serde_json::Value::Array(items) => items
      .iter()
      .map(|v| v.as_str().map(str::to_owned).unwrap_or_else(|| v.to_string()))
      .collect::<Vec<_>>()
      .join("; "),
    other => other.to_string(),
  }
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, ApiError> {
  let bytes = wtr
    .into_inner()
    .map_err(|e| ApiError::TransactionFailed(e.to_string()))?;
  String::from_utf8(bytes)
    .map_err(|e| ApiError::TransactionFailed(e.to_string()))
}

fn csv_err(e: csv::Error) -> ApiError {
  ApiError::TransactionFailed(e.to_string())
}

fn attachment(filename: String, body: String) -> Response {
  (
    StatusCode::OK,
    [
      (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
      (
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{filename}\""),
      ),
    ],
    body,
  )
    .into_response()
}
