//! Error type for `sahay-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] sahay_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

/// Domain errors raised inside a `conn.call` closure travel out wrapped in
/// [`tokio_rusqlite::Error::Other`]; this conversion unwraps them so callers
/// see the original taxonomy variant rather than an opaque storage failure.
impl From<Error> for sahay_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(core) => core,
      Error::Database(tokio_rusqlite::Error::Other(boxed)) => {
        match boxed.downcast::<sahay_core::Error>() {
          Ok(core) => *core,
          Err(other) => sahay_core::Error::Storage(other.to_string()),
        }
      }
      other => sahay_core::Error::Storage(other.to_string()),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
