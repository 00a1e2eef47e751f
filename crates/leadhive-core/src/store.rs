//! The `LeadStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `leadhive-store-sqlite`).
//! Higher layers (`leadhive-ingest`, `leadhive-api`) depend on this
//! abstraction, not on any concrete backend.
//!
//! Ownership during a run: the merge engine is the only writer of lead rows,
//! the session accountant the only writer of session and result rows. The
//! read side (`list_leads`, `stats`, `latest_session`) serves the bot/export
//! collaborator and never mutates anything.

use std::future::Future;

use uuid::Uuid;

use crate::{
  lead::{Category, Lead, LeadUpdate, NewLead},
  session::{MergeAction, ScrapeResult, ScrapeSession, SessionStatus},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`LeadStore::list_leads`].
#[derive(Debug, Clone, Default)]
pub struct LeadQuery {
  /// Restrict to one category key.
  pub category:         Option<String>,
  /// Restrict to one city (exact match).
  pub city:             Option<String>,
  /// Include soft-deactivated leads. Defaults to active-only.
  pub include_inactive: bool,
  pub limit:            Option<usize>,
  pub offset:           Option<usize>,
}

/// Aggregate read model over the lead table, for status reporting.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StoreStats {
  pub total_active: u32,
  /// Active lead counts per category key.
  pub by_category:  Vec<(String, u32)>,
  /// Active lead counts per source label.
  pub by_source:    Vec<(String, u32)>,
  pub with_phone:   u32,
  pub with_email:   u32,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a lead store backend.
///
/// Lookup-by-dedup-key followed by insert-or-update is the pipeline's
/// identity mechanism; the store only has to answer those two operations
/// consistently. Serialising concurrent merges on the same key is the merge
/// engine's job, not the store's.
///
/// All methods return `Send` futures so the trait can be used from
/// multi-threaded async runtimes.
pub trait LeadStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Leads ─────────────────────────────────────────────────────────────

  /// Persist a new lead; the store assigns its UUID and timestamps.
  fn insert_lead(
    &self,
    lead: NewLead,
  ) -> impl Future<Output = Result<Lead, Self::Error>> + Send + '_;

  /// Find the lead carrying this deduplication key, if any.
  fn find_by_dedup_key<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<Lead>, Self::Error>> + Send + 'a;

  /// Apply a field-level patch and refresh `updated_at`/`last_scraped_at`.
  fn apply_update(
    &self,
    lead_id: Uuid,
    update: LeadUpdate,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Retrieve one lead by UUID. Returns `None` if not found.
  fn get_lead(
    &self,
    lead_id: Uuid,
  ) -> impl Future<Output = Result<Option<Lead>, Self::Error>> + Send + '_;

  /// List leads matching `query`, newest first.
  fn list_leads<'a>(
    &'a self,
    query: &'a LeadQuery,
  ) -> impl Future<Output = Result<Vec<Lead>, Self::Error>> + Send + 'a;

  // ── Categories (read-only reference data) ─────────────────────────────

  /// Resolve a category key. Returns `None` for unknown keys.
  fn get_category<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<Category>, Self::Error>> + Send + 'a;

  fn list_categories(
    &self,
  ) -> impl Future<Output = Result<Vec<Category>, Self::Error>> + Send + '_;

  // ── Sessions and audit trail ──────────────────────────────────────────

  /// Create a session with status `started` and the start time set to now.
  fn create_session<'a>(
    &'a self,
    source: &'a str,
  ) -> impl Future<Output = Result<ScrapeSession, Self::Error>> + Send + 'a;

  /// Append one audit row and bump the session counters for `action` in a
  /// single transaction: total always, created/updated/skipped per action.
  fn record_result<'a>(
    &'a self,
    session_id: Uuid,
    lead_id: Uuid,
    action: MergeAction,
    changes: &'a [String],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Bump only the session error counter (adapter or category failure with
  /// no lead to attach a result row to).
  fn record_session_error(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Transition a session to a terminal status, setting the completion time
  /// and duration. Returns `false` without touching the row if the session
  /// is already terminal — finalisation is idempotent.
  fn finish_session(
    &self,
    session_id: Uuid,
    status: SessionStatus,
    error_message: Option<String>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn get_session(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Option<ScrapeSession>, Self::Error>> + Send + '_;

  /// Audit rows for one session, in processing order.
  fn list_results(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ScrapeResult>, Self::Error>> + Send + '_;

  /// The most recently started session regardless of outcome, so operators
  /// can see partial progress and failure reasons.
  fn latest_session(
    &self,
  ) -> impl Future<Output = Result<Option<ScrapeSession>, Self::Error>> + Send + '_;

  // ── Aggregates ────────────────────────────────────────────────────────

  fn stats(
    &self,
  ) -> impl Future<Output = Result<StoreStats, Self::Error>> + Send + '_;
}
