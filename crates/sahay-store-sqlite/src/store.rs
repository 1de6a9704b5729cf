//! [`SqliteStore`] — the SQLite implementation of [`PlatformStore`].

use std::path::Path;

use chrono::{Duration, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use sahay_core::{
  Error as CoreError,
  beneficiary::{
    Beneficiary, BeneficiaryView, CloseoutOutcome, NewBeneficiary,
    VerificationStatus,
  },
  donation::{Donation, NewDonation},
  reconcile::{derive_listing_status, reconcile},
  store::PlatformStore,
  survey::{
    ArchivedSurvey, NewSurvey, Question, RenewalRequest, RespondentIdentity,
    Survey, SurveyResponse, SurveyStatus, normalize_answers,
  },
  user::{GUEST_NAME, NewUser, User, resolve_display_name},
};

use crate::{
  Error, Result,
  encode::{
    RawBeneficiary, RawDonation, RawQuestion, RawResponse, RawSurvey,
    RawUser, encode_donation_status, encode_dt, encode_funding_status,
    encode_mode, encode_question_kind, encode_survey_status, encode_uuid,
    encode_verification,
  },
  schema::SCHEMA,
};

// ─── Column lists ────────────────────────────────────────────────────────────

const USER_COLS: &str = "user_id, username, full_name, email, is_campaigner, \
   is_trial_used, is_beneficiary, got_benefited, payment_slip, created_at";

const BENEFICIARY_COLS: &str = "beneficiary_id, user_id, full_name, \
   applied_for, description_of_need, note_by_verifier, expected_amount, \
   fund_raised, blood_units_needed, blood_units_received, \
   verification_status, funding_status, created_at";

const DONATION_COLS: &str = "donation_id, donor_id, donor_name, \
   beneficiary_id, kind, category, mode, amount, blood_units, description, \
   status, recorded_at";

const SURVEY_COLS: &str = "survey_id, created_by, title, org_name, budget, \
   duration_days, start_date, end_date, status, admin_created, \
   allow_anonymous, is_trial, created_at";

const QUESTION_COLS: &str = "question_id, text, kind, options, attachment";

const RESPONSE_COLS: &str = "response_id, survey_id, respondent_id, \
   anonymous_id, respondent_name, answers, responded_at";

// ─── Row mappers ─────────────────────────────────────────────────────────────

fn user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawUser> {
  Ok(RawUser {
    user_id:        row.get(0)?,
    username:       row.get(1)?,
    full_name:      row.get(2)?,
    email:          row.get(3)?,
    is_campaigner:  row.get(4)?,
    is_trial_used:  row.get(5)?,
    is_beneficiary: row.get(6)?,
    got_benefited:  row.get(7)?,
    payment_slip:   row.get(8)?,
    created_at:     row.get(9)?,
  })
}

fn beneficiary_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawBeneficiary> {
  Ok(RawBeneficiary {
    beneficiary_id:       row.get(0)?,
    user_id:              row.get(1)?,
    full_name:            row.get(2)?,
    applied_for:          row.get(3)?,
    description_of_need:  row.get(4)?,
    note_by_verifier:     row.get(5)?,
    expected_amount:      row.get(6)?,
    fund_raised:          row.get(7)?,
    blood_units_needed:   row.get(8)?,
    blood_units_received: row.get(9)?,
    verification_status:  row.get(10)?,
    funding_status:       row.get(11)?,
    created_at:           row.get(12)?,
  })
}

fn donation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDonation> {
  Ok(RawDonation {
    donation_id:    row.get(0)?,
    donor_id:       row.get(1)?,
    donor_name:     row.get(2)?,
    beneficiary_id: row.get(3)?,
    kind:           row.get(4)?,
    category:       row.get(5)?,
    mode:           row.get(6)?,
    amount:         row.get(7)?,
    blood_units:    row.get(8)?,
    description:    row.get(9)?,
    status:         row.get(10)?,
    recorded_at:    row.get(11)?,
  })
}

fn survey_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSurvey> {
  Ok(RawSurvey {
    survey_id:       row.get(0)?,
    created_by:      row.get(1)?,
    title:           row.get(2)?,
    org_name:        row.get(3)?,
    budget:          row.get(4)?,
    duration_days:   row.get(5)?,
    start_date:      row.get(6)?,
    end_date:        row.get(7)?,
    status:          row.get(8)?,
    admin_created:   row.get(9)?,
    allow_anonymous: row.get(10)?,
    is_trial:        row.get(11)?,
    created_at:      row.get(12)?,
  })
}

fn question_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawQuestion> {
  Ok(RawQuestion {
    question_id: row.get(0)?,
    text:        row.get(1)?,
    kind:        row.get(2)?,
    options:     row.get(3)?,
    attachment:  row.get(4)?,
  })
}

fn response_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawResponse> {
  Ok(RawResponse {
    response_id:     row.get(0)?,
    survey_id:       row.get(1)?,
    respondent_id:   row.get(2)?,
    anonymous_id:    row.get(3)?,
    respondent_name: row.get(4)?,
    answers:         row.get(5)?,
    responded_at:    row.get(6)?,
  })
}

/// Carry a domain or decode error out of a `conn.call` closure.
fn wrap<E>(e: E) -> tokio_rusqlite::Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  tokio_rusqlite::Error::Other(Box::new(e))
}

fn questions_for(
  conn: &rusqlite::Connection,
  survey_id: &str,
) -> rusqlite::Result<Vec<RawQuestion>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {QUESTION_COLS} FROM survey_questions \
     WHERE survey_id = ?1 ORDER BY position"
  ))?;
  stmt
    .query_map(rusqlite::params![survey_id], question_row)?
    .collect()
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Sahay platform store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
  /// Test hook: abort the reconciliation transaction after the donation
  /// insert but before the beneficiary update.
  #[cfg(test)]
  pub(crate) fail_before_beneficiary_update:
    std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self::from_conn(conn);
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self::from_conn(conn);
    store.init_schema().await?;
    Ok(store)
  }

  fn from_conn(conn: tokio_rusqlite::Connection) -> Self {
    Self {
      conn,
      #[cfg(test)]
      fail_before_beneficiary_update: Default::default(),
    }
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── PlatformStore impl ──────────────────────────────────────────────────────

impl PlatformStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(&self, input: NewUser) -> Result<User> {
    let user = User {
      user_id:        Uuid::new_v4(),
      username:       input.username,
      full_name:      input.full_name,
      email:          input.email,
      is_campaigner:  input.is_campaigner,
      is_trial_used:  false,
      is_beneficiary: false,
      got_benefited:  0,
      payment_slip:   None,
      created_at:     Utc::now(),
    };

    let id_str   = encode_uuid(user.user_id);
    let at_str   = encode_dt(user.created_at);
    let username = user.username.clone();
    let fullname = user.full_name.clone();
    let email    = user.email.clone();
    let is_camp  = user.is_campaigner;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO users ({USER_COLS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, 0, NULL, ?6)"
          ),
          rusqlite::params![id_str, username, fullname, email, is_camp, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLS} FROM users WHERE user_id = ?1"),
              rusqlite::params![id_str],
              user_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  // ── Beneficiaries ─────────────────────────────────────────────────────────

  async fn create_beneficiary(
    &self,
    input: NewBeneficiary,
  ) -> Result<Beneficiary> {
    let beneficiary = Beneficiary {
      beneficiary_id:       Uuid::new_v4(),
      user_id:              input.user_id,
      full_name:            input.full_name,
      applied_for:          input.applied_for,
      description_of_need:  input.description_of_need,
      note_by_verifier:     None,
      expected_amount:      input.expected_amount,
      fund_raised:          0.0,
      blood_units_needed:   input.blood_units_needed,
      blood_units_received: 0,
      verification_status:  VerificationStatus::Pending,
      funding_status:       sahay_core::beneficiary::FundingStatus::NotStarted,
      created_at:           Utc::now(),
    };

    let user_id     = input.user_id;
    let id_str      = encode_uuid(beneficiary.beneficiary_id);
    let user_id_str = encode_uuid(user_id);
    let fullname    = beneficiary.full_name.clone();
    let applied     = beneficiary.applied_for.clone();
    let need_desc   = beneficiary.description_of_need.clone();
    let expected    = beneficiary.expected_amount;
    let blood_need  = beneficiary.blood_units_needed;
    let at_str      = encode_dt(beneficiary.created_at);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let user_exists: bool = tx
          .query_row(
            "SELECT 1 FROM users WHERE user_id = ?1",
            rusqlite::params![user_id_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !user_exists {
          return Err(wrap(CoreError::UserNotFound(user_id)));
        }

        let open: bool = tx
          .query_row(
            "SELECT 1 FROM beneficiaries \
             WHERE user_id = ?1 AND funding_status != 'fulfilled' LIMIT 1",
            rusqlite::params![user_id_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if open {
          return Err(wrap(CoreError::ApplicationInProgress(user_id)));
        }

        tx.execute(
          &format!(
            "INSERT INTO beneficiaries ({BENEFICIARY_COLS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, 0, ?7, 0, \
                     'pending', 'Not-Started', ?8)"
          ),
          rusqlite::params![
            id_str, user_id_str, fullname, applied, need_desc, expected,
            blood_need, at_str,
          ],
        )?;
        tx.execute(
          "UPDATE users SET is_beneficiary = 1 WHERE user_id = ?1",
          rusqlite::params![user_id_str],
        )?;

        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(beneficiary)
  }

  async fn get_beneficiary(&self, id: Uuid) -> Result<Option<Beneficiary>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawBeneficiary> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {BENEFICIARY_COLS} FROM beneficiaries \
                 WHERE beneficiary_id = ?1"
              ),
              rusqlite::params![id_str],
              beneficiary_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawBeneficiary::into_beneficiary).transpose()
  }

  async fn list_beneficiaries(
    &self,
    verification: Option<VerificationStatus>,
  ) -> Result<Vec<BeneficiaryView>> {
    let filter = verification.map(encode_verification).map(str::to_owned);

    let raws: Vec<(RawBeneficiary, Vec<RawDonation>)> = self
      .conn
      .call(move |conn| {
        let rows: Vec<RawBeneficiary> = if let Some(v) = filter {
          let mut stmt = conn.prepare(&format!(
            "SELECT {BENEFICIARY_COLS} FROM beneficiaries \
             WHERE verification_status = ?1"
          ))?;
          stmt
            .query_map(rusqlite::params![v], beneficiary_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn
            .prepare(&format!("SELECT {BENEFICIARY_COLS} FROM beneficiaries"))?;
          stmt
            .query_map([], beneficiary_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut dstmt = conn.prepare(&format!(
          "SELECT {DONATION_COLS} FROM donations WHERE beneficiary_id = ?1"
        ))?;

        let mut out = Vec::with_capacity(rows.len());
        for raw in rows {
          let donations = dstmt
            .query_map(
              rusqlite::params![raw.beneficiary_id.clone()],
              donation_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          out.push((raw, donations));
        }
        Ok(out)
      })
      .await?;

    raws
      .into_iter()
      .map(|(raw_b, raw_d)| {
        let beneficiary = raw_b.into_beneficiary()?;
        let donations = raw_d
          .into_iter()
          .map(RawDonation::into_donation)
          .collect::<Result<Vec<_>>>()?;
        let donation_status =
          derive_listing_status(beneficiary.funding_status, &donations);
        Ok(BeneficiaryView { beneficiary, donation_status })
      })
      .collect()
  }

  async fn set_verification(
    &self,
    id: Uuid,
    status: VerificationStatus,
    note: Option<String>,
  ) -> Result<Beneficiary> {
    let id_str     = encode_uuid(id);
    let status_str = encode_verification(status).to_owned();

    let raw: RawBeneficiary = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE beneficiaries \
           SET verification_status = ?1, \
               note_by_verifier = COALESCE(?2, note_by_verifier) \
           WHERE beneficiary_id = ?3",
          rusqlite::params![status_str, note, id_str],
        )?;
        if changed == 0 {
          return Err(wrap(CoreError::BeneficiaryNotFound(id)));
        }
        Ok(conn.query_row(
          &format!(
            "SELECT {BENEFICIARY_COLS} FROM beneficiaries \
             WHERE beneficiary_id = ?1"
          ),
          rusqlite::params![id_str],
          beneficiary_row,
        )?)
      })
      .await?;

    raw.into_beneficiary()
  }

  async fn mark_fulfilled(&self, id: Uuid) -> Result<CloseoutOutcome> {
    let id_str = encode_uuid(id);

    let (raw, updated, already): (RawBeneficiary, usize, bool) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let mut raw = tx
          .query_row(
            &format!(
              "SELECT {BENEFICIARY_COLS} FROM beneficiaries \
               WHERE beneficiary_id = ?1"
            ),
            rusqlite::params![id_str],
            beneficiary_row,
          )
          .optional()?
          .ok_or_else(|| wrap(CoreError::BeneficiaryNotFound(id)))?;

        // Idempotency guard: a second closeout acknowledges without
        // touching any record or counter.
        if raw.funding_status == "fulfilled" {
          return Ok((raw, 0, true));
        }

        tx.execute(
          "UPDATE beneficiaries SET funding_status = 'fulfilled' \
           WHERE beneficiary_id = ?1",
          rusqlite::params![id_str],
        )?;
        let updated = tx.execute(
          "UPDATE donations SET status = 'fulfilled' \
           WHERE beneficiary_id = ?1",
          rusqlite::params![id_str],
        )?;
        let owner_rows = tx.execute(
          "UPDATE users \
           SET is_beneficiary = 0, got_benefited = got_benefited + 1 \
           WHERE user_id = ?1",
          rusqlite::params![raw.user_id.clone()],
        )?;
        if owner_rows == 0 {
          let owner =
            Uuid::parse_str(&raw.user_id).map_err(wrap)?;
          return Err(wrap(CoreError::UserNotFound(owner)));
        }

        tx.commit()?;
        raw.funding_status = "fulfilled".to_owned();
        Ok((raw, updated, false))
      })
      .await?;

    Ok(CloseoutOutcome {
      beneficiary:       raw.into_beneficiary()?,
      donations_updated: updated,
      already_fulfilled: already,
    })
  }

  // ── Donations ─────────────────────────────────────────────────────────────

  async fn record_donation(
    &self,
    input: NewDonation,
  ) -> Result<(Donation, Beneficiary)> {
    input.validate().map_err(Error::Core)?;

    let donation_id    = Uuid::new_v4();
    let recorded_at    = Utc::now();
    let beneficiary_id = input.beneficiary_id;

    #[cfg(test)]
    let inject_fault = self
      .fail_before_beneficiary_update
      .load(std::sync::atomic::Ordering::SeqCst);
    #[cfg(not(test))]
    let inject_fault = false;

    let pair: (Donation, Beneficiary) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let raw = tx
          .query_row(
            &format!(
              "SELECT {BENEFICIARY_COLS} FROM beneficiaries \
               WHERE beneficiary_id = ?1"
            ),
            rusqlite::params![encode_uuid(beneficiary_id)],
            beneficiary_row,
          )
          .optional()?
          .ok_or_else(|| wrap(CoreError::BeneficiaryNotFound(beneficiary_id)))?;
        let beneficiary = raw.into_beneficiary().map_err(wrap)?;

        let next = reconcile(&beneficiary, &input);

        tx.execute(
          &format!(
            "INSERT INTO donations ({DONATION_COLS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
          ),
          rusqlite::params![
            encode_uuid(donation_id),
            encode_uuid(input.donor_id),
            input.donor_name.clone(),
            encode_uuid(beneficiary_id),
            input.kind.as_str(),
            input.category.clone(),
            encode_mode(input.mode),
            input.amount,
            input.blood_units,
            input.description.clone(),
            encode_donation_status(next.donation_status),
            encode_dt(recorded_at),
          ],
        )?;

        if inject_fault {
          return Err(wrap(CoreError::Storage(
            "injected fault before beneficiary update".to_owned(),
          )));
        }

        tx.execute(
          "UPDATE beneficiaries \
           SET fund_raised = ?1, blood_units_received = ?2, \
               funding_status = ?3 \
           WHERE beneficiary_id = ?4",
          rusqlite::params![
            next.fund_raised,
            next.blood_units_received,
            encode_funding_status(next.funding_status),
            encode_uuid(beneficiary_id),
          ],
        )?;

        tx.commit()?;

        let donation = Donation {
          donation_id,
          donor_id: input.donor_id,
          donor_name: input.donor_name,
          beneficiary_id,
          kind: input.kind,
          category: input.category,
          mode: input.mode,
          amount: input.amount,
          blood_units: input.blood_units,
          description: input.description,
          status: next.donation_status,
          recorded_at,
        };
        let updated = Beneficiary {
          fund_raised: next.fund_raised,
          blood_units_received: next.blood_units_received,
          funding_status: next.funding_status,
          ..beneficiary
        };
        Ok((donation, updated))
      })
      .await?;

    Ok(pair)
  }

  async fn donations_for_beneficiary(
    &self,
    beneficiary_id: Uuid,
  ) -> Result<Vec<Donation>> {
    let id_str = encode_uuid(beneficiary_id);

    let raws: Vec<RawDonation> = self
      .conn
      .call(move |conn| {
        let exists: bool = conn
          .query_row(
            "SELECT 1 FROM beneficiaries WHERE beneficiary_id = ?1",
            rusqlite::params![id_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Err(wrap(CoreError::BeneficiaryNotFound(beneficiary_id)));
        }

        let mut stmt = conn.prepare(&format!(
          "SELECT {DONATION_COLS} FROM donations \
           WHERE beneficiary_id = ?1 ORDER BY recorded_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], donation_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDonation::into_donation).collect()
  }

  async fn fulfill_donation(&self, id: Uuid) -> Result<Donation> {
    let id_str = encode_uuid(id);

    let raw: RawDonation = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE donations SET status = 'fulfilled' WHERE donation_id = ?1",
          rusqlite::params![id_str],
        )?;
        if changed == 0 {
          return Err(wrap(CoreError::DonationNotFound(id)));
        }
        Ok(conn.query_row(
          &format!(
            "SELECT {DONATION_COLS} FROM donations WHERE donation_id = ?1"
          ),
          rusqlite::params![id_str],
          donation_row,
        )?)
      })
      .await?;

    raw.into_donation()
  }

  // ── Surveys ───────────────────────────────────────────────────────────────

  async fn create_survey(&self, input: NewSurvey) -> Result<Survey> {
    let now       = Utc::now();
    let survey_id = Uuid::new_v4();
    let creator   = input.created_by;

    // Administrator surveys go live immediately; campaigner surveys wait
    // in draft for an explicit publish.
    let (status, start_date, end_date) = if input.admin_created {
      let start = input.start_date.unwrap_or(now);
      let end = input
        .end_date
        .unwrap_or(start + Duration::days(i64::from(input.duration_days)));
      (SurveyStatus::Active, Some(start), Some(end))
    } else {
      (SurveyStatus::Draft, None, None)
    };

    let questions: Vec<Question> = input
      .questions
      .into_iter()
      .map(|q| Question {
        question_id: Uuid::new_v4(),
        text:        q.text,
        kind:        q.kind,
        options:     q.options,
        attachment:  q.attachment,
      })
      .collect();

    let survey = Survey {
      survey_id,
      created_by: creator,
      title: input.title,
      org_name: input.org_name,
      budget: input.budget,
      duration_days: input.duration_days,
      start_date,
      end_date,
      status,
      admin_created: input.admin_created,
      allow_anonymous: input.allow_anonymous,
      is_trial: input.is_trial,
      questions,
      created_at: now,
    };

    // Pre-encode question rows so the closure only moves plain strings.
    let question_rows: Vec<(String, i64, String, &'static str, String, Option<String>)> =
      survey
        .questions
        .iter()
        .enumerate()
        .map(|(position, q)| {
          Ok((
            encode_uuid(q.question_id),
            position as i64,
            q.text.clone(),
            encode_question_kind(q.kind),
            serde_json::to_string(&q.options)?,
            q.attachment
              .as_ref()
              .map(serde_json::to_string)
              .transpose()?,
          ))
        })
        .collect::<Result<_>>()?;

    let id_str      = encode_uuid(survey_id);
    let creator_str = encode_uuid(creator);
    let title       = survey.title.clone();
    let org_name    = survey.org_name.clone();
    let budget      = survey.budget;
    let duration    = survey.duration_days;
    let start_str   = survey.start_date.map(encode_dt);
    let end_str     = survey.end_date.map(encode_dt);
    let status_str  = encode_survey_status(survey.status).to_owned();
    let admin       = survey.admin_created;
    let anon        = survey.allow_anonymous;
    let is_trial    = survey.is_trial;
    let at_str      = encode_dt(survey.created_at);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let owner = tx
          .query_row(
            "SELECT is_campaigner, is_trial_used FROM users WHERE user_id = ?1",
            rusqlite::params![creator_str],
            |row| Ok((row.get::<_, bool>(0)?, row.get::<_, bool>(1)?)),
          )
          .optional()?;
        let (is_campaigner, is_trial_used) = match owner {
          Some(flags) => flags,
          None => return Err(wrap(CoreError::UserNotFound(creator))),
        };
        if !admin && !is_campaigner {
          return Err(wrap(CoreError::Forbidden(
            "only campaigners can create surveys",
          )));
        }
        if is_trial && is_trial_used {
          return Err(wrap(CoreError::TrialAlreadyUsed));
        }

        tx.execute(
          &format!(
            "INSERT INTO surveys ({SURVEY_COLS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
          ),
          rusqlite::params![
            id_str, creator_str, title, org_name, budget, duration,
            start_str, end_str, status_str, admin, anon, is_trial, at_str,
          ],
        )?;

        {
          let mut stmt = tx.prepare(
            "INSERT INTO survey_questions \
             (question_id, survey_id, position, text, kind, options, attachment) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          )?;
          for (qid, position, text, kind, options, attachment) in &question_rows
          {
            stmt.execute(rusqlite::params![
              qid, id_str, position, text, kind, options, attachment
            ])?;
          }
        }

        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(survey)
  }

  async fn get_survey(&self, id: Uuid) -> Result<Option<Survey>> {
    let id_str = encode_uuid(id);

    let raw: Option<(RawSurvey, Vec<RawQuestion>)> = self
      .conn
      .call(move |conn| {
        let survey = conn
          .query_row(
            &format!("SELECT {SURVEY_COLS} FROM surveys WHERE survey_id = ?1"),
            rusqlite::params![id_str],
            survey_row,
          )
          .optional()?;
        match survey {
          Some(s) => {
            let questions = questions_for(conn, &id_str)?;
            Ok(Some((s, questions)))
          }
          None => Ok(None),
        }
      })
      .await?;

    raw
      .map(|(s, questions)| s.into_survey(questions))
      .transpose()
  }

  async fn list_surveys(&self) -> Result<Vec<Survey>> {
    let raws: Vec<(RawSurvey, Vec<RawQuestion>)> = self
      .conn
      .call(move |conn| {
        let surveys: Vec<RawSurvey> = {
          let mut stmt = conn.prepare(&format!(
            "SELECT {SURVEY_COLS} FROM surveys ORDER BY created_at"
          ))?;
          stmt
            .query_map([], survey_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut out = Vec::with_capacity(surveys.len());
        for s in surveys {
          let questions = questions_for(conn, &s.survey_id)?;
          out.push((s, questions));
        }
        Ok(out)
      })
      .await?;

    raws
      .into_iter()
      .map(|(s, questions)| s.into_survey(questions))
      .collect()
  }

  async fn publish_survey(
    &self,
    survey_id: Uuid,
    owner_id: Uuid,
  ) -> Result<Survey> {
    let id_str    = encode_uuid(survey_id);
    let owner_str = encode_uuid(owner_id);
    let now       = Utc::now();

    let raw: (RawSurvey, Vec<RawQuestion>) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let mut raw = tx
          .query_row(
            &format!("SELECT {SURVEY_COLS} FROM surveys WHERE survey_id = ?1"),
            rusqlite::params![id_str],
            survey_row,
          )
          .optional()?
          .ok_or_else(|| wrap(CoreError::SurveyNotFound(survey_id)))?;

        if raw.created_by != owner_str {
          return Err(wrap(CoreError::Forbidden("not the survey owner")));
        }

        let start = now;
        let end = now + Duration::days(raw.duration_days);
        tx.execute(
          "UPDATE surveys \
           SET status = 'active', start_date = ?1, end_date = ?2 \
           WHERE survey_id = ?3",
          rusqlite::params![encode_dt(start), encode_dt(end), id_str],
        )?;

        // Going live consumes the owner's trial and clears the payment
        // slip for the next billing cycle.
        tx.execute(
          "UPDATE users SET is_trial_used = 1, payment_slip = NULL \
           WHERE user_id = ?1",
          rusqlite::params![owner_str],
        )?;

        let questions = questions_for(&tx, &id_str)?;
        tx.commit()?;

        raw.status = "active".to_owned();
        raw.start_date = Some(encode_dt(start));
        raw.end_date = Some(encode_dt(end));
        Ok((raw, questions))
      })
      .await?;

    raw.0.into_survey(raw.1)
  }

  async fn add_response(
    &self,
    survey_id: Uuid,
    respondent: RespondentIdentity,
    answers: serde_json::Value,
  ) -> Result<SurveyResponse> {
    let answers = normalize_answers(answers).map_err(Error::Core)?;
    let answers_json = serde_json::to_string(&answers)?;

    let response_id  = Uuid::new_v4();
    let now          = Utc::now();
    let id_str       = encode_uuid(survey_id);
    let key          = respondent.key();
    let registered   = match &respondent {
      RespondentIdentity::Registered(id) => Some(*id),
      RespondentIdentity::Anonymous(_) => None,
    };
    let registered_str = registered.map(encode_uuid);
    let anonymous_id = match &respondent {
      RespondentIdentity::Registered(_) => None,
      RespondentIdentity::Anonymous(session) => Some(session.clone()),
    };
    let is_anonymous = respondent.is_anonymous();

    let respondent_name: String = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let raw = tx
          .query_row(
            &format!("SELECT {SURVEY_COLS} FROM surveys WHERE survey_id = ?1"),
            rusqlite::params![id_str],
            survey_row,
          )
          .optional()?
          .ok_or_else(|| wrap(CoreError::SurveyNotFound(survey_id)))?;
        let survey = raw.into_survey(Vec::new()).map_err(wrap)?;

        if !survey.accepting_responses(now) {
          return Err(wrap(CoreError::SurveyNotActive(survey_id)));
        }
        if is_anonymous && !survey.allow_anonymous {
          return Err(wrap(CoreError::Forbidden(
            "survey does not accept anonymous responses",
          )));
        }

        let respondent_name = match &registered {
          Some(user_id) => {
            let names = tx
              .query_row(
                "SELECT full_name, username, email FROM users \
                 WHERE user_id = ?1",
                rusqlite::params![encode_uuid(*user_id)],
                |row| {
                  Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                  ))
                },
              )
              .optional()?
              .ok_or_else(|| wrap(CoreError::UserNotFound(*user_id)))?;
            resolve_display_name(
              names.0.as_deref(),
              names.1.as_deref(),
              names.2.as_deref(),
            )
          }
          None => GUEST_NAME.to_owned(),
        };

        let inserted = tx.execute(
          &format!(
            "INSERT INTO survey_responses \
             ({RESPONSE_COLS}, respondent_key) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
          ),
          rusqlite::params![
            encode_uuid(response_id),
            id_str,
            registered_str,
            anonymous_id,
            respondent_name,
            answers_json,
            encode_dt(now),
            key,
          ],
        );
        match inserted {
          Ok(_) => {}
          Err(rusqlite::Error::SqliteFailure(f, _))
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
          {
            return Err(wrap(CoreError::DuplicateResponse(survey_id)));
          }
          Err(e) => return Err(e.into()),
        }

        tx.commit()?;
        Ok(respondent_name)
      })
      .await?;

    Ok(SurveyResponse {
      response_id,
      survey_id,
      respondent,
      respondent_name,
      answers,
      responded_at: now,
    })
  }

  async fn responses_for_survey(
    &self,
    survey_id: Uuid,
  ) -> Result<Vec<SurveyResponse>> {
    let id_str = encode_uuid(survey_id);

    let raws: Vec<RawResponse> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RESPONSE_COLS} FROM survey_responses \
           WHERE survey_id = ?1 ORDER BY responded_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], response_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawResponse::into_response).collect()
  }

  async fn toggle_admin_status(
    &self,
    survey_id: Uuid,
    budget: Option<f64>,
    duration_days: Option<u32>,
  ) -> Result<Survey> {
    let id_str = encode_uuid(survey_id);
    let now    = Utc::now();

    let raw: (RawSurvey, Vec<RawQuestion>) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let mut raw = tx
          .query_row(
            &format!("SELECT {SURVEY_COLS} FROM surveys WHERE survey_id = ?1"),
            rusqlite::params![id_str],
            survey_row,
          )
          .optional()?
          .ok_or_else(|| wrap(CoreError::SurveyNotFound(survey_id)))?;

        if !raw.admin_created {
          return Err(wrap(CoreError::Forbidden(
            "survey is not administrator-managed",
          )));
        }

        if raw.status == "active" {
          tx.execute(
            "UPDATE surveys SET status = 'completed' WHERE survey_id = ?1",
            rusqlite::params![id_str],
          )?;
          raw.status = "completed".to_owned();
        } else {
          // Re-activation recomputes the window from now and overwrites
          // the budget and duration when supplied.
          let new_duration =
            duration_days.map_or(raw.duration_days, i64::from);
          let new_budget = budget.unwrap_or(raw.budget);
          let start = now;
          let end = now + Duration::days(new_duration);
          tx.execute(
            "UPDATE surveys \
             SET status = 'active', budget = ?1, duration_days = ?2, \
                 start_date = ?3, end_date = ?4 \
             WHERE survey_id = ?5",
            rusqlite::params![
              new_budget,
              new_duration,
              encode_dt(start),
              encode_dt(end),
              id_str,
            ],
          )?;
          raw.status = "active".to_owned();
          raw.budget = new_budget;
          raw.duration_days = new_duration;
          raw.start_date = Some(encode_dt(start));
          raw.end_date = Some(encode_dt(end));
        }

        let questions = questions_for(&tx, &id_str)?;
        tx.commit()?;
        Ok((raw, questions))
      })
      .await?;

    raw.0.into_survey(raw.1)
  }

  async fn record_renewal_request(
    &self,
    survey_id: Uuid,
    requested_by: Uuid,
    budget: f64,
    duration_days: u32,
  ) -> Result<RenewalRequest> {
    let request = RenewalRequest {
      request_id: Uuid::new_v4(),
      survey_id,
      requested_by,
      budget,
      duration_days,
      requested_at: Utc::now(),
    };

    let id_str        = encode_uuid(survey_id);
    let request_str   = encode_uuid(request.request_id);
    let requester_str = encode_uuid(requested_by);
    let at_str        = encode_dt(request.requested_at);

    self
      .conn
      .call(move |conn| {
        let created_by: Option<String> = conn
          .query_row(
            "SELECT created_by FROM surveys WHERE survey_id = ?1",
            rusqlite::params![id_str],
            |row| row.get(0),
          )
          .optional()?;
        let created_by = created_by
          .ok_or_else(|| wrap(CoreError::SurveyNotFound(survey_id)))?;
        if created_by != requester_str {
          return Err(wrap(CoreError::Forbidden("not the survey owner")));
        }

        conn.execute(
          "INSERT INTO renewal_requests \
           (request_id, survey_id, requested_by, budget, duration_days, \
            requested_at) \
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            request_str,
            id_str,
            requester_str,
            budget,
            duration_days,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(request)
  }

  async fn delete_survey(
    &self,
    survey_id: Uuid,
    requested_by: Uuid,
  ) -> Result<ArchivedSurvey> {
    let id_str        = encode_uuid(survey_id);
    let requester_str = encode_uuid(requested_by);
    let archive_id    = Uuid::new_v4();
    let archived_at   = Utc::now();

    let raw: (RawSurvey, usize, usize) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let raw = tx
          .query_row(
            &format!("SELECT {SURVEY_COLS} FROM surveys WHERE survey_id = ?1"),
            rusqlite::params![id_str],
            survey_row,
          )
          .optional()?
          .ok_or_else(|| wrap(CoreError::SurveyNotFound(survey_id)))?;

        if raw.created_by != requester_str {
          return Err(wrap(CoreError::Forbidden("not the survey owner")));
        }

        let question_count: i64 = tx.query_row(
          "SELECT COUNT(*) FROM survey_questions WHERE survey_id = ?1",
          rusqlite::params![id_str],
          |row| row.get(0),
        )?;
        let respondent_count: i64 = tx.query_row(
          "SELECT COUNT(*) FROM survey_responses WHERE survey_id = ?1",
          rusqlite::params![id_str],
          |row| row.get(0),
        )?;

        tx.execute(
          "INSERT INTO archived_surveys \
           (archive_id, user_id, title, org_name, question_count, \
            respondent_count, start_date, end_date, archived_at) \
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            encode_uuid(archive_id),
            raw.created_by.clone(),
            raw.title.clone(),
            raw.org_name.clone(),
            question_count,
            respondent_count,
            raw.start_date.clone(),
            raw.end_date.clone(),
            encode_dt(archived_at),
          ],
        )?;

        tx.execute(
          "DELETE FROM survey_responses WHERE survey_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.execute(
          "DELETE FROM survey_questions WHERE survey_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.execute(
          "DELETE FROM surveys WHERE survey_id = ?1",
          rusqlite::params![id_str],
        )?;

        tx.commit()?;
        Ok((raw, question_count as usize, respondent_count as usize))
      })
      .await?;

    let (raw, question_count, respondent_count) = raw;
    Ok(ArchivedSurvey {
      user_id:          crate::encode::decode_uuid(&raw.created_by)?,
      title:            raw.title,
      org_name:         raw.org_name,
      question_count,
      respondent_count,
      start_date:       raw
        .start_date
        .as_deref()
        .map(crate::encode::decode_dt)
        .transpose()?,
      end_date:         raw
        .end_date
        .as_deref()
        .map(crate::encode::decode_dt)
        .transpose()?,
      archived_at,
    })
  }
}
