//! Scrape sessions and their append-only audit trail.
//!
//! A session represents one execution of the ingestion pipeline. Counters are
//! incremented while the run is live; once the status transitions to a
//! terminal state the row is never mutated again. Every processed record
//! leaves a [`ScrapeResult`] behind, linking the session to the lead it
//! affected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle status of a session: `started` → `completed` | `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
  Started,
  Completed,
  Failed,
}

impl SessionStatus {
  pub fn is_terminal(&self) -> bool { !matches!(self, Self::Started) }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// One ingestion run, with its running counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSession {
  pub session_id: Uuid,

  /// Source label; `all_sources` for a combined run.
  pub source: String,
  pub status: SessionStatus,

  pub total_scraped: u32,
  pub new_leads:     u32,
  pub updated_leads: u32,
  pub errors_count:  u32,

  pub started_at:       DateTime<Utc>,
  pub completed_at:     Option<DateTime<Utc>>,
  /// Whole seconds between start and completion; set at finalisation.
  pub duration_seconds: Option<i64>,

  pub error_message: Option<String>,
}

// ─── Result rows ─────────────────────────────────────────────────────────────

/// What the merge engine did with one candidate record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeAction {
  Created,
  Updated,
  /// The record was seen but not persisted (e.g. a store error mid-merge).
  Skipped,
}

/// Write-once audit row linking a session to the lead one record affected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResult {
  pub result_id:  Uuid,
  pub session_id: Uuid,
  pub lead_id:    Uuid,
  pub action:     MergeAction,
  /// Names of the lead fields the merge filled or refreshed, if any.
  pub changes:    Vec<String>,
  pub created_at: DateTime<Utc>,
}
