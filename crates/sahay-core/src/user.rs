//! User — the platform account entity.
//!
//! Authentication, sessions, and password state belong to an external
//! service. The core only reads and mutates the flags that beneficiary and
//! survey transitions touch as side effects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A platform account, reduced to the fields the core consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub user_id:       Uuid,
  pub username:      Option<String>,
  pub full_name:     Option<String>,
  pub email:         Option<String>,
  /// Approved to run survey campaigns.
  pub is_campaigner: bool,
  /// The one free trial campaign has been consumed.
  pub is_trial_used: bool,
  /// Has an open beneficiary application.
  pub is_beneficiary: bool,
  /// Lifetime count of closed-out beneficiary applications.
  pub got_benefited:  u32,
  /// Reference to an uploaded payment slip; cleared when a campaign goes
  /// live (billing cycle reset).
  pub payment_slip:   Option<String>,
  pub created_at:     DateTime<Utc>,
}

impl User {
  /// Preferred display name: full name, then username, then email.
  /// Falls back to the anonymous label when the account carries none.
  pub fn display_name(&self) -> String {
    resolve_display_name(
      self.full_name.as_deref(),
      self.username.as_deref(),
      self.email.as_deref(),
    )
  }
}

/// Display name used for anonymous respondents and nameless accounts.
pub const GUEST_NAME: &str = "Guest User";

/// The canonical display-name priority chain. Kept as a free function so
/// the store can resolve names from raw columns without building a [`User`].
pub fn resolve_display_name(
  full_name: Option<&str>,
  username: Option<&str>,
  email: Option<&str>,
) -> String {
  full_name
    .or(username)
    .or(email)
    .map(str::to_owned)
    .unwrap_or_else(|| GUEST_NAME.to_owned())
}

/// Input to [`crate::store::PlatformStore::create_user`].
/// `user_id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
  pub username:      Option<String>,
  pub full_name:     Option<String>,
  pub email:         Option<String>,
  pub is_campaigner: bool,
}
