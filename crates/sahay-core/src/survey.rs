//! Survey — a campaigner- or admin-owned questionnaire with a bounded
//! active window and collected responses.
//!
//! The temporal rules (active window, renewal) and the response-shape
//! normalisation live here; persistence and the duplicate-respondent
//! constraint live in the store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Survey lifecycle state. `draft → active → completed`, with
/// `active ⇄ paused` and `completed → active` (renewal) as extra edges.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SurveyStatus {
  #[default]
  Draft,
  Active,
  Completed,
  Paused,
}

// ─── Questions ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
  /// Free-text answer.
  Text,
  /// One choice from the declared options.
  Single,
  /// Any number of choices from the declared options.
  Multiple,
}

/// Reference to media already uploaded by the external media service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
  pub url:        String,
  /// "image" or "video".
  pub media_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  pub question_id: Uuid,
  pub text:        String,
  pub kind:        QuestionKind,
  #[serde(default)]
  pub options:     Vec<String>,
  pub attachment:  Option<Attachment>,
}

/// Question payload accepted at survey creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
  pub text:       String,
  pub kind:       QuestionKind,
  #[serde(default)]
  pub options:    Vec<String>,
  #[serde(default)]
  pub attachment: Option<Attachment>,
}

/// Parse the `questions` creation payload, which arrives either as a JSON
/// array or — from multipart clients — as a JSON-encoded string.
pub fn parse_questions(value: serde_json::Value) -> Result<Vec<NewQuestion>> {
  let value = match value {
    serde_json::Value::String(raw) => serde_json::from_str(&raw)
      .map_err(|e| Error::Validation(format!("unparseable question JSON: {e}")))?,
    other => other,
  };
  serde_json::from_value(value)
    .map_err(|e| Error::Validation(format!("malformed questions: {e}")))
}

// ─── Survey ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Survey {
  pub survey_id:     Uuid,
  pub created_by:    Uuid,
  pub title:         String,
  pub org_name:      Option<String>,
  pub budget:        f64,
  pub duration_days: u32,
  pub start_date:    Option<DateTime<Utc>>,
  pub end_date:      Option<DateTime<Utc>>,
  pub status:        SurveyStatus,
  pub admin_created: bool,
  pub allow_anonymous: bool,
  /// Created under the owner's one free trial.
  pub is_trial:      bool,
  pub questions:     Vec<Question>,
  pub created_at:    DateTime<Utc>,
}

impl Survey {
  /// Responses are accepted only while active and inside [start, end).
  pub fn accepting_responses(&self, now: DateTime<Utc>) -> bool {
    if self.status != SurveyStatus::Active {
      return false;
    }
    match (self.start_date, self.end_date) {
      (Some(start), Some(end)) => start <= now && now < end,
      _ => false,
    }
  }

  pub fn question(&self, id: Uuid) -> Option<&Question> {
    self.questions.iter().find(|q| q.question_id == id)
  }
}

/// Input to [`crate::store::PlatformStore::create_survey`].
///
/// An administrator-created survey goes live immediately; the window
/// defaults to `now .. now + duration_days` but may be supplied explicitly.
/// A campaigner-created survey starts as a draft with no window.
#[derive(Debug, Clone)]
pub struct NewSurvey {
  pub created_by:      Uuid,
  pub title:           String,
  pub org_name:        Option<String>,
  pub budget:          f64,
  pub duration_days:   u32,
  pub admin_created:   bool,
  pub allow_anonymous: bool,
  pub is_trial:        bool,
  pub questions:       Vec<NewQuestion>,
  pub start_date:      Option<DateTime<Utc>>,
  pub end_date:        Option<DateTime<Utc>>,
}

// ─── Responses ───────────────────────────────────────────────────────────────

/// Who answered: a registered account or an anonymous session. Exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RespondentIdentity {
  Registered(Uuid),
  Anonymous(String),
}

impl RespondentIdentity {
  /// Stable key used for the per-survey uniqueness constraint.
  pub fn key(&self) -> String {
    match self {
      Self::Registered(id) => format!("user:{id}"),
      Self::Anonymous(session) => format!("anon:{session}"),
    }
  }

  pub fn is_anonymous(&self) -> bool { matches!(self, Self::Anonymous(_)) }
}

/// One collected response: a flat `question id → answer` mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyResponse {
  pub response_id:     Uuid,
  pub survey_id:       Uuid,
  pub respondent:      RespondentIdentity,
  /// Resolved at submission time; see
  /// [`crate::user::User::display_name`].
  pub respondent_name: String,
  pub answers:         BTreeMap<Uuid, serde_json::Value>,
  pub responded_at:    DateTime<Utc>,
}

/// Normalise an incoming answer payload to the flat mapping.
///
/// Some clients wrap the mapping in a single-element array; exactly one
/// level is unwrapped. Keys must be question ids.
pub fn normalize_answers(
  raw: serde_json::Value,
) -> Result<BTreeMap<Uuid, serde_json::Value>> {
  let raw = match raw {
    serde_json::Value::Array(mut items) if items.len() == 1 => items.remove(0),
    other => other,
  };

  let serde_json::Value::Object(map) = raw else {
    return Err(Error::Validation(
      "answers must be an object keyed by question id".to_owned(),
    ));
  };

  let mut answers = BTreeMap::new();
  for (key, value) in map {
    let question_id = key.parse::<Uuid>().map_err(|_| {
      Error::Validation(format!("answer key {key:?} is not a question id"))
    })?;
    answers.insert(question_id, value);
  }
  Ok(answers)
}

/// Whether a stored answer selects `option` — direct match for single
/// answers, membership for multiple-choice arrays.
pub fn answer_selects(answer: &serde_json::Value, option: &str) -> bool {
  match answer {
    serde_json::Value::String(s) => s == option,
    serde_json::Value::Array(items) => {
      items.iter().any(|v| v.as_str() == Some(option))
    }
    _ => false,
  }
}

// ─── Derived statistics ──────────────────────────────────────────────────────

/// Per-question response count for the full-survey results view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionTally {
  pub question_id:    Uuid,
  pub text:           String,
  pub response_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyResults {
  pub survey_id:       Uuid,
  pub total_responses: usize,
  pub questions:       Vec<QuestionTally>,
}

/// One answer to one question, as returned by the single-question view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnswer {
  pub response_id:     Uuid,
  pub respondent_name: String,
  pub answer:          serde_json::Value,
  pub responded_at:    DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResults {
  pub question:       Question,
  pub response_count: usize,
  pub responses:      Vec<QuestionAnswer>,
}

/// Count of one declared option, including zero-count options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionCount {
  pub option: String,
  pub count:  usize,
}

/// Aggregate every question's response count plus the survey total.
pub fn compute_results(
  survey: &Survey,
  responses: &[SurveyResponse],
) -> SurveyResults {
  let questions = survey
    .questions
    .iter()
    .map(|q| QuestionTally {
      question_id:    q.question_id,
      text:           q.text.clone(),
      response_count: responses
        .iter()
        .filter(|r| r.answers.contains_key(&q.question_id))
        .count(),
    })
    .collect();

  SurveyResults {
    survey_id:       survey.survey_id,
    total_responses: responses.len(),
    questions,
  }
}

/// The single-question tally with the matching responses.
pub fn compute_question_results(
  survey: &Survey,
  question_id: Uuid,
  responses: &[SurveyResponse],
) -> Result<QuestionResults> {
  let question = survey
    .question(question_id)
    .ok_or(Error::QuestionNotFound(question_id))?;

  let matching: Vec<QuestionAnswer> = responses
    .iter()
    .filter_map(|r| {
      r.answers.get(&question_id).map(|answer| QuestionAnswer {
        response_id:     r.response_id,
        respondent_name: r.respondent_name.clone(),
        answer:          answer.clone(),
        responded_at:    r.responded_at,
      })
    })
    .collect();

  Ok(QuestionResults {
    question:       question.clone(),
    response_count: matching.len(),
    responses:      matching,
  })
}

/// Tally each declared option of a question over the collected responses.
/// Every declared option appears, in declaration order, even at zero.
pub fn tally_options(
  question: &Question,
  responses: &[SurveyResponse],
) -> Vec<OptionCount> {
  question
    .options
    .iter()
    .map(|option| OptionCount {
      option: option.clone(),
      count:  responses
        .iter()
        .filter_map(|r| r.answers.get(&question.question_id))
        .filter(|answer| answer_selects(answer, option))
        .count(),
    })
    .collect()
}

// ─── Renewal requests ────────────────────────────────────────────────────────

/// A campaigner's request to re-run a completed survey. Recording one never
/// changes the survey; an administrator acts on it separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalRequest {
  pub request_id:    Uuid,
  pub survey_id:     Uuid,
  pub requested_by:  Uuid,
  pub budget:        f64,
  pub duration_days: u32,
  pub requested_at:  DateTime<Utc>,
}

// ─── Archive ─────────────────────────────────────────────────────────────────

/// Denormalised summary kept on the owning user after a survey is deleted.
/// The summary survives; the raw survey and response data do not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedSurvey {
  pub user_id:          Uuid,
  pub title:            String,
  pub org_name:         Option<String>,
  pub question_count:   usize,
  pub respondent_count: usize,
  pub start_date:       Option<DateTime<Utc>>,
  pub end_date:         Option<DateTime<Utc>>,
  pub archived_at:      DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use chrono::Duration;
  use serde_json::json;

  use super::*;
  use crate::user::GUEST_NAME;

  fn question(text: &str, options: &[&str]) -> Question {
    Question {
      question_id: Uuid::new_v4(),
      text:        text.to_owned(),
      kind:        if options.is_empty() {
        QuestionKind::Text
      } else {
        QuestionKind::Single
      },
      options:     options.iter().map(|s| s.to_string()).collect(),
      attachment:  None,
    }
  }

  fn survey_with_questions(questions: Vec<Question>) -> Survey {
    let now = Utc::now();
    Survey {
      survey_id:       Uuid::new_v4(),
      created_by:      Uuid::new_v4(),
      title:           "Community priorities".to_owned(),
      org_name:        None,
      budget:          500.0,
      duration_days:   7,
      start_date:      Some(now - Duration::days(1)),
      end_date:        Some(now + Duration::days(6)),
      status:          SurveyStatus::Active,
      admin_created:   false,
      allow_anonymous: true,
      is_trial:        false,
      questions,
      created_at:      now,
    }
  }

  fn response(
    survey: &Survey,
    answers: Vec<(Uuid, serde_json::Value)>,
  ) -> SurveyResponse {
    SurveyResponse {
      response_id:     Uuid::new_v4(),
      survey_id:       survey.survey_id,
      respondent:      RespondentIdentity::Anonymous(
        Uuid::new_v4().to_string(),
      ),
      respondent_name: GUEST_NAME.to_owned(),
      answers:         answers.into_iter().collect(),
      responded_at:    Utc::now(),
    }
  }

  // ── Window ──────────────────────────────────────────────────────────────

  #[test]
  fn active_inside_window_accepts() {
    let s = survey_with_questions(vec![]);
    assert!(s.accepting_responses(Utc::now()));
  }

  #[test]
  fn active_past_end_date_rejects() {
    let mut s = survey_with_questions(vec![]);
    s.end_date = Some(Utc::now() - Duration::hours(1));
    assert!(!s.accepting_responses(Utc::now()));
  }

  #[test]
  fn draft_rejects_even_inside_window() {
    let mut s = survey_with_questions(vec![]);
    s.status = SurveyStatus::Draft;
    assert!(!s.accepting_responses(Utc::now()));
  }

  #[test]
  fn active_without_window_rejects() {
    let mut s = survey_with_questions(vec![]);
    s.start_date = None;
    s.end_date = None;
    assert!(!s.accepting_responses(Utc::now()));
  }

  // ── Answer normalisation ────────────────────────────────────────────────

  fn answer_object(question_id: Uuid) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    map.insert(question_id.to_string(), json!("Yes"));
    serde_json::Value::Object(map)
  }

  #[test]
  fn answers_unwrap_exactly_one_array_level() {
    let q = Uuid::new_v4();
    let wrapped = json!([answer_object(q)]);
    let answers = normalize_answers(wrapped).unwrap();
    assert_eq!(answers.get(&q), Some(&json!("Yes")));
  }

  #[test]
  fn answers_two_level_wrap_is_rejected() {
    let q = Uuid::new_v4();
    let wrapped = json!([[answer_object(q)]]);
    assert!(normalize_answers(wrapped).is_err());
  }

  #[test]
  fn answers_non_uuid_key_is_rejected() {
    let wrapped = json!({ "first": "Yes" });
    assert!(normalize_answers(wrapped).is_err());
  }

  // ── Question parsing ────────────────────────────────────────────────────

  #[test]
  fn questions_parse_from_json_string() {
    let raw = json!(
      r#"[{"text":"Favourite meal?","kind":"single","options":["Rice","Dal"]}]"#
    );
    let questions = parse_questions(raw).unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].options, vec!["Rice", "Dal"]);
  }

  #[test]
  fn unparseable_question_json_is_a_validation_error() {
    let raw = json!("not json at all {{");
    assert!(matches!(
      parse_questions(raw),
      Err(Error::Validation(_))
    ));
  }

  // ── Tallies ─────────────────────────────────────────────────────────────

  #[test]
  fn tally_includes_zero_count_options() {
    let q = question("Pick one", &["A", "B", "C"]);
    let qid = q.question_id;
    let s = survey_with_questions(vec![q]);
    let responses = vec![
      response(&s, vec![(qid, json!("A"))]),
      response(&s, vec![(qid, json!("A"))]),
    ];

    let tally = tally_options(&s.questions[0], &responses);
    assert_eq!(tally.len(), 3);
    assert_eq!(tally[0], OptionCount { option: "A".into(), count: 2 });
    assert_eq!(tally[1], OptionCount { option: "B".into(), count: 0 });
    assert_eq!(tally[2], OptionCount { option: "C".into(), count: 0 });
  }

  #[test]
  fn tally_counts_multiple_choice_membership() {
    let mut q = question("Pick any", &["A", "B"]);
    q.kind = QuestionKind::Multiple;
    let qid = q.question_id;
    let s = survey_with_questions(vec![q]);
    let responses = vec![response(&s, vec![(qid, json!(["A", "B"]))])];

    let tally = tally_options(&s.questions[0], &responses);
    assert_eq!(tally[0].count, 1);
    assert_eq!(tally[1].count, 1);
  }

  #[test]
  fn results_count_only_answered_questions() {
    let q1 = question("One", &[]);
    let q2 = question("Two", &[]);
    let (id1, id2) = (q1.question_id, q2.question_id);
    let s = survey_with_questions(vec![q1, q2]);
    let responses = vec![
      response(&s, vec![(id1, json!("yes")), (id2, json!("no"))]),
      response(&s, vec![(id1, json!("maybe"))]),
    ];

    let results = compute_results(&s, &responses);
    assert_eq!(results.total_responses, 2);
    assert_eq!(results.questions[0].response_count, 2);
    assert_eq!(results.questions[1].response_count, 1);
  }

  #[test]
  fn question_results_unknown_question_errors() {
    let s = survey_with_questions(vec![question("Only", &[])]);
    let err =
      compute_question_results(&s, Uuid::new_v4(), &[]).unwrap_err();
    assert!(matches!(err, Error::QuestionNotFound(_)));
  }
}
