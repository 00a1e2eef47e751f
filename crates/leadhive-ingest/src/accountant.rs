//! The session accountant — one run's lifecycle and counters.
//!
//! Bookkeeping is diagnostic, not business-critical: a counter that fails to
//! increment is logged and swallowed so it can never abort an otherwise
//! successful run. Only session *lifecycle* failures (cannot create or
//! finalise the session row) propagate to the caller.

use std::sync::Arc;

use uuid::Uuid;

use leadhive_core::{
  session::{MergeAction, ScrapeSession, SessionStatus},
  store::LeadStore,
};

/// The single writer of session and result rows during a run.
pub struct SessionAccountant<S> {
  store: Arc<S>,
}

impl<S: LeadStore> SessionAccountant<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Create a session with status `started`. Failure here is fatal to the
  /// run and propagates.
  pub async fn begin(&self, source: &str) -> Result<ScrapeSession, S::Error> {
    let session = self.store.create_session(source).await?;
    tracing::info!(session_id = %session.session_id, source, "scrape session started");
    Ok(session)
  }

  /// Record what the merge engine did with one record: bump the total and
  /// per-action counters, append the audit row. Never raises.
  pub async fn record_outcome(
    &self,
    session_id: Uuid,
    lead_id: Uuid,
    action: MergeAction,
    changes: &[String],
  ) {
    if let Err(e) = self
      .store
      .record_result(session_id, lead_id, action, changes)
      .await
    {
      tracing::warn!(%session_id, %lead_id, error = %e, "failed to record outcome");
    }
  }

  /// Count an adapter- or category-level failure with no lead to attach a
  /// result row to. Never raises.
  pub async fn record_error(&self, session_id: Uuid) {
    if let Err(e) = self.store.record_session_error(session_id).await {
      tracing::warn!(%session_id, error = %e, "failed to record session error");
    }
  }

  /// Transition the session to a terminal status. Idempotent: a repeated
  /// finish is a logged no-op. A store failure here propagates — a run whose
  /// session cannot be finalised is a failed run.
  pub async fn finish(
    &self,
    session_id: Uuid,
    status: SessionStatus,
    error_message: Option<String>,
  ) -> Result<(), S::Error> {
    let updated = self
      .store
      .finish_session(session_id, status, error_message)
      .await?;

    if updated {
      tracing::info!(%session_id, ?status, "scrape session finished");
    } else {
      tracing::debug!(%session_id, "session already finalised; finish ignored");
    }
    Ok(())
  }
}
