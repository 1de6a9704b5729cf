//! Integration tests for `SqliteStore` against an in-memory database.

use sahay_core::{
  Error as CoreError,
  beneficiary::{FundingStatus, NewBeneficiary, VerificationStatus},
  donation::{ContributionMode, DonationKind, DonationStatus, NewDonation},
  store::PlatformStore,
  survey::{
    NewQuestion, NewSurvey, QuestionKind, RespondentIdentity, SurveyStatus,
  },
  user::NewUser,
};
use serde_json::json;
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn as_core(err: Error) -> CoreError { err.into() }

async fn plain_user(s: &SqliteStore) -> Uuid {
  s.create_user(NewUser {
    username: Some("asha".into()),
    full_name: Some("Asha Rao".into()),
    email: Some("asha@example.com".into()),
    is_campaigner: false,
  })
  .await
  .unwrap()
  .user_id
}

async fn campaigner(s: &SqliteStore) -> Uuid {
  s.create_user(NewUser {
    username: Some("vikram".into()),
    full_name: Some("Vikram Shah".into()),
    email: Some("vikram@example.com".into()),
    is_campaigner: true,
  })
  .await
  .unwrap()
  .user_id
}

async fn beneficiary_with(
  s: &SqliteStore,
  expected: f64,
  blood_needed: u32,
) -> Uuid {
  let owner = plain_user(s).await;
  s.create_beneficiary(NewBeneficiary {
    user_id:             owner,
    full_name:           Some("Asha Rao".into()),
    applied_for:         "Fundraising".into(),
    description_of_need: None,
    expected_amount:     expected,
    blood_units_needed:  blood_needed,
  })
  .await
  .unwrap()
  .beneficiary_id
}

fn fundraising(beneficiary_id: Uuid, amount: f64) -> NewDonation {
  NewDonation {
    donor_id:       Uuid::new_v4(),
    donor_name:     None,
    beneficiary_id,
    kind:           DonationKind::Fundraising,
    category:       Some("monetarySupport".into()),
    mode:           ContributionMode::PartialAmount,
    amount:         Some(amount),
    blood_units:    None,
    description:    None,
  }
}

fn blood(beneficiary_id: Uuid, units: u32) -> NewDonation {
  NewDonation {
    donor_id:       Uuid::new_v4(),
    donor_name:     None,
    beneficiary_id,
    kind:           DonationKind::Blood,
    category:       Some("healthCare".into()),
    mode:           ContributionMode::AcknowledgeOnly,
    amount:         None,
    blood_units:    Some(units),
    description:    None,
  }
}

fn yes_no_question(text: &str) -> NewQuestion {
  NewQuestion {
    text:       text.to_owned(),
    kind:       QuestionKind::Single,
    options:    vec!["Yes".into(), "No".into()],
    attachment: None,
  }
}

async fn active_survey(s: &SqliteStore, creator: Uuid) -> Uuid {
  s.create_survey(NewSurvey {
    created_by:      creator,
    title:           "Community priorities".into(),
    org_name:        None,
    budget:          500.0,
    duration_days:   7,
    admin_created:   true,
    allow_anonymous: true,
    is_trial:        false,
    questions:       vec![yes_no_question("Do you support the plan?")],
    start_date:      None,
    end_date:        None,
  })
  .await
  .unwrap()
  .survey_id
}

fn answers_for(survey_question: Uuid, answer: &str) -> serde_json::Value {
  let mut map = serde_json::Map::new();
  map.insert(survey_question.to_string(), json!(answer));
  serde_json::Value::Object(map)
}

// ─── Users and beneficiaries ─────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_user() {
  let s = store().await;
  let id = plain_user(&s).await;

  let fetched = s.get_user(id).await.unwrap().unwrap();
  assert_eq!(fetched.user_id, id);
  assert_eq!(fetched.display_name(), "Asha Rao");
  assert!(!fetched.is_beneficiary);
}

#[tokio::test]
async fn get_user_missing_returns_none() {
  let s = store().await;
  assert!(s.get_user(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn create_beneficiary_marks_owner() {
  let s = store().await;
  let owner = plain_user(&s).await;

  let b = s
    .create_beneficiary(NewBeneficiary {
      user_id:             owner,
      full_name:           None,
      applied_for:         "Blood".into(),
      description_of_need: Some("surgery scheduled".into()),
      expected_amount:     0.0,
      blood_units_needed:  4,
    })
    .await
    .unwrap();

  assert_eq!(b.verification_status, VerificationStatus::Pending);
  assert_eq!(b.funding_status, FundingStatus::NotStarted);

  let owner = s.get_user(owner).await.unwrap().unwrap();
  assert!(owner.is_beneficiary);
}

#[tokio::test]
async fn second_open_application_is_rejected() {
  let s = store().await;
  let owner = plain_user(&s).await;

  let input = NewBeneficiary {
    user_id:             owner,
    full_name:           None,
    applied_for:         "Fundraising".into(),
    description_of_need: None,
    expected_amount:     1000.0,
    blood_units_needed:  0,
  };
  s.create_beneficiary(input.clone()).await.unwrap();

  let err = s.create_beneficiary(input).await.unwrap_err();
  assert!(matches!(
    as_core(err),
    CoreError::ApplicationInProgress(id) if id == owner
  ));
}

#[tokio::test]
async fn verification_sets_status_and_note() {
  let s = store().await;
  let id = beneficiary_with(&s, 1000.0, 0).await;

  let b = s
    .set_verification(
      id,
      VerificationStatus::Approved,
      Some("documents checked".into()),
    )
    .await
    .unwrap();
  assert_eq!(b.verification_status, VerificationStatus::Approved);
  assert_eq!(b.note_by_verifier.as_deref(), Some("documents checked"));
}

// ─── Donation reconciliation ─────────────────────────────────────────────────

#[tokio::test]
async fn fund_raised_equals_sum_of_recorded_amounts() {
  let s = store().await;
  let id = beneficiary_with(&s, 10_000.0, 0).await;

  for amount in [250.0, 125.5, 1000.0] {
    s.record_donation(fundraising(id, amount)).await.unwrap();
  }

  let b = s.get_beneficiary(id).await.unwrap().unwrap();
  assert_eq!(b.fund_raised, 250.0 + 125.5 + 1000.0);
}

#[tokio::test]
async fn blood_donation_under_target() {
  let s = store().await;
  let id = beneficiary_with(&s, 0.0, 4).await;

  let (donation, beneficiary) =
    s.record_donation(blood(id, 2)).await.unwrap();

  assert_eq!(beneficiary.blood_units_received, 2);
  assert_eq!(beneficiary.funding_status, FundingStatus::NotStarted);
  assert_eq!(donation.status, DonationStatus::StartReceived);
}

#[tokio::test]
async fn blood_donation_meets_target() {
  let s = store().await;
  let id = beneficiary_with(&s, 0.0, 4).await;

  s.record_donation(blood(id, 2)).await.unwrap();
  let (donation, beneficiary) =
    s.record_donation(blood(id, 2)).await.unwrap();

  assert_eq!(beneficiary.blood_units_received, 4);
  assert_eq!(beneficiary.funding_status, FundingStatus::InProgress);
  assert_eq!(donation.status, DonationStatus::InProgress);
}

#[tokio::test]
async fn fundraising_reaching_target_is_in_progress() {
  let s = store().await;
  let id = beneficiary_with(&s, 1000.0, 0).await;

  let (_, beneficiary) =
    s.record_donation(fundraising(id, 1200.0)).await.unwrap();

  assert_eq!(beneficiary.fund_raised, 1200.0);
  assert_eq!(beneficiary.funding_status, FundingStatus::InProgress);
}

#[tokio::test]
async fn donation_to_unknown_beneficiary_errors() {
  let s = store().await;
  let err = s
    .record_donation(fundraising(Uuid::new_v4(), 100.0))
    .await
    .unwrap_err();
  assert!(matches!(as_core(err), CoreError::BeneficiaryNotFound(_)));
}

#[tokio::test]
async fn invalid_amount_is_rejected_before_any_write() {
  let s = store().await;
  let id = beneficiary_with(&s, 1000.0, 0).await;

  let mut input = fundraising(id, 100.0);
  input.amount = Some(-5.0);
  let err = s.record_donation(input).await.unwrap_err();
  assert!(matches!(as_core(err), CoreError::InvalidAmount { .. }));

  assert!(
    s.donations_for_beneficiary(id).await.unwrap().is_empty(),
    "rejected donation must not reach the ledger"
  );
}

#[tokio::test]
async fn fulfilled_status_survives_later_donations() {
  let s = store().await;
  let id = beneficiary_with(&s, 1000.0, 0).await;

  s.record_donation(fundraising(id, 1000.0)).await.unwrap();
  s.mark_fulfilled(id).await.unwrap();

  let (_, beneficiary) =
    s.record_donation(fundraising(id, 50.0)).await.unwrap();
  assert_eq!(beneficiary.funding_status, FundingStatus::Fulfilled);
}

// ─── Closeout ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn closeout_updates_donations_and_owner() {
  let s = store().await;
  let owner = plain_user(&s).await;
  let b = s
    .create_beneficiary(NewBeneficiary {
      user_id:             owner,
      full_name:           None,
      applied_for:         "Fundraising".into(),
      description_of_need: None,
      expected_amount:     500.0,
      blood_units_needed:  0,
    })
    .await
    .unwrap();

  s.record_donation(fundraising(b.beneficiary_id, 200.0))
    .await
    .unwrap();
  s.record_donation(fundraising(b.beneficiary_id, 300.0))
    .await
    .unwrap();

  let outcome = s.mark_fulfilled(b.beneficiary_id).await.unwrap();
  assert!(!outcome.already_fulfilled);
  assert_eq!(outcome.donations_updated, 2);
  assert!(outcome.beneficiary.funding_status.is_fulfilled());

  let donations =
    s.donations_for_beneficiary(b.beneficiary_id).await.unwrap();
  assert!(
    donations
      .iter()
      .all(|d| d.status == DonationStatus::Fulfilled)
  );

  let owner = s.get_user(owner).await.unwrap().unwrap();
  assert!(!owner.is_beneficiary);
  assert_eq!(owner.got_benefited, 1);
}

#[tokio::test]
async fn closeout_is_idempotent() {
  let s = store().await;
  let owner = plain_user(&s).await;
  let b = s
    .create_beneficiary(NewBeneficiary {
      user_id:             owner,
      full_name:           None,
      applied_for:         "Fundraising".into(),
      description_of_need: None,
      expected_amount:     500.0,
      blood_units_needed:  0,
    })
    .await
    .unwrap();

  s.mark_fulfilled(b.beneficiary_id).await.unwrap();
  let second = s.mark_fulfilled(b.beneficiary_id).await.unwrap();
  assert!(second.already_fulfilled);

  // The benefited counter moved exactly once.
  let owner = s.get_user(owner).await.unwrap().unwrap();
  assert_eq!(owner.got_benefited, 1);
}

// ─── Transactional atomicity ─────────────────────────────────────────────────

#[tokio::test]
async fn failed_beneficiary_update_rolls_back_the_donation() {
  let s = store().await;
  let id = beneficiary_with(&s, 1000.0, 0).await;

  s.fail_before_beneficiary_update
    .store(true, std::sync::atomic::Ordering::SeqCst);
  let err = s.record_donation(fundraising(id, 400.0)).await.unwrap_err();
  assert!(matches!(as_core(err), CoreError::Storage(_)));
  s.fail_before_beneficiary_update
    .store(false, std::sync::atomic::Ordering::SeqCst);

  // Neither document reflects the attempted change.
  let b = s.get_beneficiary(id).await.unwrap().unwrap();
  assert_eq!(b.fund_raised, 0.0);
  assert!(s.donations_for_beneficiary(id).await.unwrap().is_empty());
}

// ─── Listing derivation ──────────────────────────────────────────────────────

#[tokio::test]
async fn listing_derives_status_from_donation_scan() {
  let s = store().await;
  let with_donation = beneficiary_with(&s, 10_000.0, 0).await;
  let untouched = beneficiary_with(&s, 500.0, 0).await;

  s.record_donation(fundraising(with_donation, 50.0))
    .await
    .unwrap();

  let views = s.list_beneficiaries(None).await.unwrap();
  let by_id = |id: Uuid| {
    views
      .iter()
      .find(|v| v.beneficiary.beneficiary_id == id)
      .unwrap()
  };

  assert_eq!(by_id(with_donation).donation_status, FundingStatus::InProgress);
  assert_eq!(by_id(untouched).donation_status, FundingStatus::NotStarted);
}

#[tokio::test]
async fn listing_filters_by_verification() {
  let s = store().await;
  let approved = beneficiary_with(&s, 500.0, 0).await;
  beneficiary_with(&s, 500.0, 0).await;

  s.set_verification(approved, VerificationStatus::Approved, None)
    .await
    .unwrap();

  let views = s
    .list_beneficiaries(Some(VerificationStatus::Approved))
    .await
    .unwrap();
  assert_eq!(views.len(), 1);
  assert_eq!(views[0].beneficiary.beneficiary_id, approved);
}

// ─── Surveys ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn campaigner_survey_starts_as_draft() {
  let s = store().await;
  let creator = campaigner(&s).await;

  let survey = s
    .create_survey(NewSurvey {
      created_by:      creator,
      title:           "Neighbourhood needs".into(),
      org_name:        Some("Sahay Trust".into()),
      budget:          300.0,
      duration_days:   14,
      admin_created:   false,
      allow_anonymous: true,
      is_trial:        true,
      questions:       vec![yes_no_question("Is water supply reliable?")],
      start_date:      None,
      end_date:        None,
    })
    .await
    .unwrap();

  assert_eq!(survey.status, SurveyStatus::Draft);
  assert!(survey.start_date.is_none());
  assert_eq!(survey.questions.len(), 1);
}

#[tokio::test]
async fn admin_survey_goes_live_immediately() {
  let s = store().await;
  let creator = campaigner(&s).await;
  let id = active_survey(&s, creator).await;

  let survey = s.get_survey(id).await.unwrap().unwrap();
  assert_eq!(survey.status, SurveyStatus::Active);
  assert!(survey.accepting_responses(chrono::Utc::now()));
}

#[tokio::test]
async fn non_campaigner_cannot_create_survey() {
  let s = store().await;
  let creator = plain_user(&s).await;

  let err = s
    .create_survey(NewSurvey {
      created_by:      creator,
      title:           "Nope".into(),
      org_name:        None,
      budget:          0.0,
      duration_days:   7,
      admin_created:   false,
      allow_anonymous: true,
      is_trial:        false,
      questions:       vec![],
      start_date:      None,
      end_date:        None,
    })
    .await
    .unwrap_err();
  assert!(matches!(as_core(err), CoreError::Forbidden(_)));
}

#[tokio::test]
async fn trial_cannot_be_used_twice() {
  let s = store().await;
  let creator = campaigner(&s).await;

  let trial_survey = |title: &str| NewSurvey {
    created_by:      creator,
    title:           title.to_owned(),
    org_name:        None,
    budget:          0.0,
    duration_days:   7,
    admin_created:   false,
    allow_anonymous: true,
    is_trial:        true,
    questions:       vec![],
    start_date:      None,
    end_date:        None,
  };

  let first = s.create_survey(trial_survey("First")).await.unwrap();
  // Publishing consumes the trial.
  s.publish_survey(first.survey_id, creator).await.unwrap();

  let err = s.create_survey(trial_survey("Second")).await.unwrap_err();
  assert!(matches!(as_core(err), CoreError::TrialAlreadyUsed));
}

#[tokio::test]
async fn publish_sets_window_and_consumes_trial() {
  let s = store().await;
  let creator = campaigner(&s).await;

  let draft = s
    .create_survey(NewSurvey {
      created_by:      creator,
      title:           "Draft".into(),
      org_name:        None,
      budget:          100.0,
      duration_days:   10,
      admin_created:   false,
      allow_anonymous: true,
      is_trial:        true,
      questions:       vec![yes_no_question("Q1?")],
      start_date:      None,
      end_date:        None,
    })
    .await
    .unwrap();

  let published =
    s.publish_survey(draft.survey_id, creator).await.unwrap();
  assert_eq!(published.status, SurveyStatus::Active);
  let (start, end) =
    (published.start_date.unwrap(), published.end_date.unwrap());
  assert_eq!(end - start, chrono::Duration::days(10));

  let owner = s.get_user(creator).await.unwrap().unwrap();
  assert!(owner.is_trial_used);
  assert!(owner.payment_slip.is_none());
}

#[tokio::test]
async fn publish_by_non_owner_is_forbidden() {
  let s = store().await;
  let creator = campaigner(&s).await;
  let stranger = plain_user(&s).await;
  let id = active_survey(&s, creator).await;

  let err = s.publish_survey(id, stranger).await.unwrap_err();
  assert!(matches!(as_core(err), CoreError::Forbidden(_)));
}

// ─── Responses ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn respond_resolves_registered_display_name() {
  let s = store().await;
  let creator = campaigner(&s).await;
  let respondent = plain_user(&s).await;
  let id = active_survey(&s, creator).await;
  let question = s.get_survey(id).await.unwrap().unwrap().questions[0]
    .question_id;

  let response = s
    .add_response(
      id,
      RespondentIdentity::Registered(respondent),
      answers_for(question, "Yes"),
    )
    .await
    .unwrap();

  assert_eq!(response.respondent_name, "Asha Rao");
  assert_eq!(response.answers.len(), 1);
}

#[tokio::test]
async fn duplicate_response_is_rejected_without_growing_the_list() {
  let s = store().await;
  let creator = campaigner(&s).await;
  let respondent = plain_user(&s).await;
  let id = active_survey(&s, creator).await;
  let question = s.get_survey(id).await.unwrap().unwrap().questions[0]
    .question_id;

  s.add_response(
    id,
    RespondentIdentity::Registered(respondent),
    answers_for(question, "Yes"),
  )
  .await
  .unwrap();

  let err = s
    .add_response(
      id,
      RespondentIdentity::Registered(respondent),
      answers_for(question, "No"),
    )
    .await
    .unwrap_err();
  assert!(matches!(as_core(err), CoreError::DuplicateResponse(_)));

  assert_eq!(s.responses_for_survey(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_anonymous_session_is_rejected() {
  let s = store().await;
  let creator = campaigner(&s).await;
  let id = active_survey(&s, creator).await;
  let question = s.get_survey(id).await.unwrap().unwrap().questions[0]
    .question_id;

  let session = "session-7181".to_owned();
  let first = s
    .add_response(
      id,
      RespondentIdentity::Anonymous(session.clone()),
      answers_for(question, "Yes"),
    )
    .await
    .unwrap();
  assert_eq!(first.respondent_name, "Guest User");

  let err = s
    .add_response(
      id,
      RespondentIdentity::Anonymous(session),
      answers_for(question, "Yes"),
    )
    .await
    .unwrap_err();
  assert!(matches!(as_core(err), CoreError::DuplicateResponse(_)));
}

#[tokio::test]
async fn respond_outside_window_is_rejected() {
  let s = store().await;
  let creator = campaigner(&s).await;
  let now = chrono::Utc::now();

  // Status still active but the window already closed.
  let expired = s
    .create_survey(NewSurvey {
      created_by:      creator,
      title:           "Expired".into(),
      org_name:        None,
      budget:          0.0,
      duration_days:   7,
      admin_created:   true,
      allow_anonymous: true,
      is_trial:        false,
      questions:       vec![yes_no_question("Too late?")],
      start_date:      Some(now - chrono::Duration::days(10)),
      end_date:        Some(now - chrono::Duration::days(3)),
    })
    .await
    .unwrap();
  let question = expired.questions[0].question_id;

  let err = s
    .add_response(
      expired.survey_id,
      RespondentIdentity::Anonymous("s1".into()),
      answers_for(question, "Yes"),
    )
    .await
    .unwrap_err();
  assert!(matches!(as_core(err), CoreError::SurveyNotActive(_)));
}

// ─── Admin toggle and renewal ────────────────────────────────────────────────

#[tokio::test]
async fn toggle_flips_active_to_completed_and_back() {
  let s = store().await;
  let creator = campaigner(&s).await;
  let id = active_survey(&s, creator).await;

  let completed = s.toggle_admin_status(id, None, None).await.unwrap();
  assert_eq!(completed.status, SurveyStatus::Completed);

  let renewed = s
    .toggle_admin_status(id, Some(900.0), Some(21))
    .await
    .unwrap();
  assert_eq!(renewed.status, SurveyStatus::Active);
  assert_eq!(renewed.budget, 900.0);
  assert_eq!(renewed.duration_days, 21);
  let (start, end) =
    (renewed.start_date.unwrap(), renewed.end_date.unwrap());
  assert_eq!(end - start, chrono::Duration::days(21));
}

#[tokio::test]
async fn toggle_rejects_campaigner_surveys() {
  let s = store().await;
  let creator = campaigner(&s).await;

  let survey = s
    .create_survey(NewSurvey {
      created_by:      creator,
      title:           "Owned".into(),
      org_name:        None,
      budget:          0.0,
      duration_days:   7,
      admin_created:   false,
      allow_anonymous: true,
      is_trial:        false,
      questions:       vec![],
      start_date:      None,
      end_date:        None,
    })
    .await
    .unwrap();

  let err = s
    .toggle_admin_status(survey.survey_id, None, None)
    .await
    .unwrap_err();
  assert!(matches!(as_core(err), CoreError::Forbidden(_)));
}

#[tokio::test]
async fn renewal_request_records_without_changing_the_survey() {
  let s = store().await;
  let creator = campaigner(&s).await;
  let id = active_survey(&s, creator).await;

  let request = s
    .record_renewal_request(id, creator, 750.0, 30)
    .await
    .unwrap();
  assert_eq!(request.survey_id, id);
  assert_eq!(request.duration_days, 30);

  let survey = s.get_survey(id).await.unwrap().unwrap();
  assert_eq!(survey.status, SurveyStatus::Active);
}

#[tokio::test]
async fn renewal_request_by_stranger_is_forbidden() {
  let s = store().await;
  let creator = campaigner(&s).await;
  let stranger = plain_user(&s).await;
  let id = active_survey(&s, creator).await;

  let err = s
    .record_renewal_request(id, stranger, 100.0, 7)
    .await
    .unwrap_err();
  assert!(matches!(as_core(err), CoreError::Forbidden(_)));
}

// ─── Archive and delete ──────────────────────────────────────────────────────

#[tokio::test]
async fn delete_archives_summary_then_removes_survey() {
  let s = store().await;
  let creator = campaigner(&s).await;
  let id = active_survey(&s, creator).await;
  let question = s.get_survey(id).await.unwrap().unwrap().questions[0]
    .question_id;

  s.add_response(
    id,
    RespondentIdentity::Anonymous("s1".into()),
    answers_for(question, "Yes"),
  )
  .await
  .unwrap();

  let archive = s.delete_survey(id, creator).await.unwrap();
  assert_eq!(archive.user_id, creator);
  assert_eq!(archive.question_count, 1);
  assert_eq!(archive.respondent_count, 1);

  assert!(s.get_survey(id).await.unwrap().is_none());
  assert!(s.responses_for_survey(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_by_stranger_is_forbidden() {
  let s = store().await;
  let creator = campaigner(&s).await;
  let stranger = plain_user(&s).await;
  let id = active_survey(&s, creator).await;

  let err = s.delete_survey(id, stranger).await.unwrap_err();
  assert!(matches!(as_core(err), CoreError::Forbidden(_)));

  assert!(s.get_survey(id).await.unwrap().is_some());
}
