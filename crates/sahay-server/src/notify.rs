//! Tracing-backed [`Notifier`] — the stand-in for the external email and
//! pub/sub transport, which is out of scope for this service.

use sahay_core::notify::{NotificationEvent, Notifier, NotifyError};

/// Logs every event instead of delivering it. Swap for a real transport by
/// implementing [`Notifier`] against the same events.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
  async fn notify(&self, event: NotificationEvent) -> Result<(), NotifyError> {
    match &event {
      NotificationEvent::SurveyStatusChanged {
        survey_id,
        title,
        owner_email,
        status,
        end_date,
      } => {
        tracing::info!(
          %survey_id,
          title = %title,
          owner_email = owner_email.as_deref().unwrap_or("<none>"),
          status = ?status,
          end_date = ?end_date,
          "campaign status updated; notifying campaigner"
        );
      }
      NotificationEvent::RenewalRequested {
        survey_id,
        title,
        requested_by,
        budget,
        duration_days,
      } => {
        tracing::info!(
          %survey_id,
          title = %title,
          requested_by = %requested_by,
          budget = %budget,
          duration_days = %duration_days,
          "campaign renew request; notifying administrators and campaigner"
        );
      }
      NotificationEvent::SurveyDeleted { survey_id, title, owner_email } => {
        tracing::info!(
          %survey_id,
          title = %title,
          owner_email = owner_email.as_deref().unwrap_or("<none>"),
          "survey deleted; notifying campaigner"
        );
      }
    }
    Ok(())
  }
}
