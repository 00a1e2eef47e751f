//! Error type for `leadhive-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("column decode error: {0}")]
  Decode(String),

  #[error("session not found: {0}")]
  SessionNotFound(uuid::Uuid),

  #[error("lead not found: {0}")]
  LeadNotFound(uuid::Uuid),

  /// An insert raced another writer for the same dedup key. Callers holding
  /// the per-key merge lock never see this.
  #[error("dedup key collision: {0}")]
  DedupCollision(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
