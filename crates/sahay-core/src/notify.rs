//! The `Notifier` trait — the boundary to the external messaging/email
//! collaborator.
//!
//! Dispatch failures must never abort the mutation that triggered them;
//! callers log and continue. The server installs a tracing-backed
//! implementation; tests use a recording one.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::survey::SurveyStatus;

/// A status change worth telling somebody about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotificationEvent {
  /// An administrator toggled a survey; the owning campaigner is told.
  SurveyStatusChanged {
    survey_id:   Uuid,
    title:       String,
    owner_email: Option<String>,
    status:      SurveyStatus,
    end_date:    Option<DateTime<Utc>>,
  },
  /// A campaigner asked to renew; administrators review, the campaigner
  /// gets an acknowledgment.
  RenewalRequested {
    survey_id:     Uuid,
    title:         String,
    requested_by:  Uuid,
    budget:        f64,
    duration_days: u32,
  },
  /// A survey was archived and deleted; the owner is told.
  SurveyDeleted {
    survey_id:   Uuid,
    title:       String,
    owner_email: Option<String>,
  },
}

#[derive(Debug, Error)]
#[error("notification dispatch failed: {0}")]
pub struct NotifyError(pub String);

/// Fan-out of change notifications to interested parties.
pub trait Notifier: Send + Sync {
  fn notify(
    &self,
    event: NotificationEvent,
  ) -> impl Future<Output = Result<(), NotifyError>> + Send + '_;
}
