//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Status enums are stored
//! under their wire spellings. Structured fields (question options,
//! attachments, answer maps) are stored as compact JSON. UUIDs are stored as
//! hyphenated lowercase strings.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sahay_core::{
  beneficiary::{Beneficiary, FundingStatus, VerificationStatus},
  donation::{ContributionMode, Donation, DonationKind, DonationStatus},
  survey::{
    Attachment, Question, QuestionKind, RespondentIdentity, Survey,
    SurveyResponse, SurveyStatus,
  },
  user::User,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_dt_opt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── Status enums ────────────────────────────────────────────────────────────

pub fn encode_verification(v: VerificationStatus) -> &'static str {
  match v {
    VerificationStatus::Pending => "pending",
    VerificationStatus::Approved => "approved",
    VerificationStatus::Rejected => "rejected",
  }
}

pub fn decode_verification(s: &str) -> Result<VerificationStatus> {
  match s {
    "pending" => Ok(VerificationStatus::Pending),
    "approved" => Ok(VerificationStatus::Approved),
    "rejected" => Ok(VerificationStatus::Rejected),
    other => Err(Error::DateParse(format!(
      "unknown verification status: {other:?}"
    ))),
  }
}

pub fn encode_funding_status(s: FundingStatus) -> &'static str {
  match s {
    FundingStatus::NotStarted => "Not-Started",
    FundingStatus::InProgress => "in-progress",
    FundingStatus::StartReceived => "start received",
    FundingStatus::Fulfilled => "fulfilled",
  }
}

pub fn decode_funding_status(s: &str) -> Result<FundingStatus> {
  match s {
    "Not-Started" => Ok(FundingStatus::NotStarted),
    "in-progress" => Ok(FundingStatus::InProgress),
    "start received" => Ok(FundingStatus::StartReceived),
    "fulfilled" => Ok(FundingStatus::Fulfilled),
    other => {
      Err(Error::DateParse(format!("unknown funding status: {other:?}")))
    }
  }
}

pub fn encode_donation_status(s: DonationStatus) -> &'static str {
  match s {
    DonationStatus::Pending => "pending",
    DonationStatus::InProgress => "in-progress",
    DonationStatus::StartReceived => "start received",
    DonationStatus::Fulfilled => "fulfilled",
  }
}

pub fn decode_donation_status(s: &str) -> Result<DonationStatus> {
  match s {
    "pending" => Ok(DonationStatus::Pending),
    "in-progress" => Ok(DonationStatus::InProgress),
    "start received" => Ok(DonationStatus::StartReceived),
    "fulfilled" => Ok(DonationStatus::Fulfilled),
    other => {
      Err(Error::DateParse(format!("unknown donation status: {other:?}")))
    }
  }
}

pub fn encode_mode(m: ContributionMode) -> &'static str {
  match m {
    ContributionMode::FullAmount => "full_amount",
    ContributionMode::PartialAmount => "partial_amount",
    ContributionMode::AcknowledgeOnly => "acknowledge_only",
  }
}

pub fn decode_mode(s: &str) -> Result<ContributionMode> {
  match s {
    "full_amount" => Ok(ContributionMode::FullAmount),
    "partial_amount" => Ok(ContributionMode::PartialAmount),
    "acknowledge_only" => Ok(ContributionMode::AcknowledgeOnly),
    other => Err(Error::DateParse(format!(
      "unknown contribution mode: {other:?}"
    ))),
  }
}

pub fn encode_survey_status(s: SurveyStatus) -> &'static str {
  match s {
    SurveyStatus::Draft => "draft",
    SurveyStatus::Active => "active",
    SurveyStatus::Completed => "completed",
    SurveyStatus::Paused => "paused",
  }
}

pub fn decode_survey_status(s: &str) -> Result<SurveyStatus> {
  match s {
    "draft" => Ok(SurveyStatus::Draft),
    "active" => Ok(SurveyStatus::Active),
    "completed" => Ok(SurveyStatus::Completed),
    "paused" => Ok(SurveyStatus::Paused),
    other => {
      Err(Error::DateParse(format!("unknown survey status: {other:?}")))
    }
  }
}

pub fn encode_question_kind(k: QuestionKind) -> &'static str {
  match k {
    QuestionKind::Text => "text",
    QuestionKind::Single => "single",
    QuestionKind::Multiple => "multiple",
  }
}

pub fn decode_question_kind(s: &str) -> Result<QuestionKind> {
  match s {
    "text" => Ok(QuestionKind::Text),
    "single" => Ok(QuestionKind::Single),
    "multiple" => Ok(QuestionKind::Multiple),
    other => {
      Err(Error::DateParse(format!("unknown question kind: {other:?}")))
    }
  }
}

/// Donation kinds use their canonical wire spellings directly.
pub fn decode_donation_kind(s: &str) -> Result<DonationKind> {
  Ok(s.parse::<DonationKind>()?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw columns of a `users` row.
pub struct RawUser {
  pub user_id:        String,
  pub username:       Option<String>,
  pub full_name:      Option<String>,
  pub email:          Option<String>,
  pub is_campaigner:  bool,
  pub is_trial_used:  bool,
  pub is_beneficiary: bool,
  pub got_benefited:  i64,
  pub payment_slip:   Option<String>,
  pub created_at:     String,
}

impl RawUser {
  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:        decode_uuid(&self.user_id)?,
      username:       self.username,
      full_name:      self.full_name,
      email:          self.email,
      is_campaigner:  self.is_campaigner,
      is_trial_used:  self.is_trial_used,
      is_beneficiary: self.is_beneficiary,
      got_benefited:  self.got_benefited as u32,
      payment_slip:   self.payment_slip,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

/// Raw columns of a `beneficiaries` row.
pub struct RawBeneficiary {
  pub beneficiary_id:       String,
  pub user_id:              String,
  pub full_name:            Option<String>,
  pub applied_for:          String,
  pub description_of_need:  Option<String>,
  pub note_by_verifier:     Option<String>,
  pub expected_amount:      f64,
  pub fund_raised:          f64,
  pub blood_units_needed:   i64,
  pub blood_units_received: i64,
  pub verification_status:  String,
  pub funding_status:       String,
  pub created_at:           String,
}

impl RawBeneficiary {
  pub fn into_beneficiary(self) -> Result<Beneficiary> {
    Ok(Beneficiary {
      beneficiary_id:       decode_uuid(&self.beneficiary_id)?,
      user_id:              decode_uuid(&self.user_id)?,
      full_name:            self.full_name,
      applied_for:          self.applied_for,
      description_of_need:  self.description_of_need,
      note_by_verifier:     self.note_by_verifier,
      expected_amount:      self.expected_amount,
      fund_raised:          self.fund_raised,
      blood_units_needed:   self.blood_units_needed as u32,
      blood_units_received: self.blood_units_received as u32,
      verification_status:  decode_verification(&self.verification_status)?,
      funding_status:       decode_funding_status(&self.funding_status)?,
      created_at:           decode_dt(&self.created_at)?,
    })
  }
}

/// Raw columns of a `donations` row.
pub struct RawDonation {
  pub donation_id:    String,
  pub donor_id:       String,
  pub donor_name:     Option<String>,
  pub beneficiary_id: String,
  pub kind:           String,
  pub category:       Option<String>,
  pub mode:           String,
  pub amount:         Option<f64>,
  pub blood_units:    Option<i64>,
  pub description:    Option<String>,
  pub status:         String,
  pub recorded_at:    String,
}

impl RawDonation {
  pub fn into_donation(self) -> Result<Donation> {
    Ok(Donation {
      donation_id:    decode_uuid(&self.donation_id)?,
      donor_id:       decode_uuid(&self.donor_id)?,
      donor_name:     self.donor_name,
      beneficiary_id: decode_uuid(&self.beneficiary_id)?,
      kind:           decode_donation_kind(&self.kind)?,
      category:       self.category,
      mode:           decode_mode(&self.mode)?,
      amount:         self.amount,
      blood_units:    self.blood_units.map(|u| u as u32),
      description:    self.description,
      status:         decode_donation_status(&self.status)?,
      recorded_at:    decode_dt(&self.recorded_at)?,
    })
  }
}

/// Raw columns of a `surveys` row, paired with its question rows.
pub struct RawSurvey {
  pub survey_id:       String,
  pub created_by:      String,
  pub title:           String,
  pub org_name:        Option<String>,
  pub budget:          f64,
  pub duration_days:   i64,
  pub start_date:      Option<String>,
  pub end_date:        Option<String>,
  pub status:          String,
  pub admin_created:   bool,
  pub allow_anonymous: bool,
  pub is_trial:        bool,
  pub created_at:      String,
}

impl RawSurvey {
  pub fn into_survey(self, questions: Vec<RawQuestion>) -> Result<Survey> {
    Ok(Survey {
      survey_id:       decode_uuid(&self.survey_id)?,
      created_by:      decode_uuid(&self.created_by)?,
      title:           self.title,
      org_name:        self.org_name,
      budget:          self.budget,
      duration_days:   self.duration_days as u32,
      start_date:      decode_dt_opt(self.start_date.as_deref())?,
      end_date:        decode_dt_opt(self.end_date.as_deref())?,
      status:          decode_survey_status(&self.status)?,
      admin_created:   self.admin_created,
      allow_anonymous: self.allow_anonymous,
      is_trial:        self.is_trial,
      questions:       questions
        .into_iter()
        .map(RawQuestion::into_question)
        .collect::<Result<_>>()?,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw columns of a `survey_questions` row.
pub struct RawQuestion {
  pub question_id: String,
  pub text:        String,
  pub kind:        String,
  pub options:     String,
  pub attachment:  Option<String>,
}

impl RawQuestion {
  pub fn into_question(self) -> Result<Question> {
    let attachment: Option<Attachment> = self
      .attachment
      .as_deref()
      .map(serde_json::from_str)
      .transpose()?;

    Ok(Question {
      question_id: decode_uuid(&self.question_id)?,
      text:        self.text,
      kind:        decode_question_kind(&self.kind)?,
      options:     serde_json::from_str(&self.options)?,
      attachment,
    })
  }
}

/// Raw columns of a `survey_responses` row.
pub struct RawResponse {
  pub response_id:     String,
  pub survey_id:       String,
  pub respondent_id:   Option<String>,
  pub anonymous_id:    Option<String>,
  pub respondent_name: String,
  pub answers:         String,
  pub responded_at:    String,
}

impl RawResponse {
  pub fn into_response(self) -> Result<SurveyResponse> {
    let respondent = match (self.respondent_id, self.anonymous_id) {
      (Some(id), _) => RespondentIdentity::Registered(decode_uuid(&id)?),
      (None, Some(session)) => RespondentIdentity::Anonymous(session),
      (None, None) => {
        return Err(Error::DateParse(
          "response row carries no respondent identity".to_owned(),
        ));
      }
    };

    let answers: BTreeMap<Uuid, serde_json::Value> =
      serde_json::from_str(&self.answers)?;

    Ok(SurveyResponse {
      response_id: decode_uuid(&self.response_id)?,
      survey_id: decode_uuid(&self.survey_id)?,
      respondent,
      respondent_name: self.respondent_name,
      answers,
      responded_at: decode_dt(&self.responded_at)?,
    })
  }
}
