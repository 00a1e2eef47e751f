//! The ingestion coordinator — the only component that knows the pipeline
//! order.
//!
//! For each registered adapter and each requested category: fetch raw
//! records, normalize, drop nameless ones, resolve identity, merge, account.
//! Failures are data, not control flow: an adapter or category that fails is
//! logged and counted against the session, and the run moves on. Only a
//! session that cannot be created or finalised fails the run as a whole.

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use uuid::Uuid;

use leadhive_core::{
  adapter::{AdapterStats, SourceAdapter},
  record::{NormalizedRecord, RawRecord, dedup_key},
  session::{ScrapeSession, SessionStatus},
  store::LeadStore,
};

use crate::{accountant::SessionAccountant, merge::MergeEngine};

/// Per-call result cap passed to adapters when none is configured.
pub const DEFAULT_PER_CATEGORY_LIMIT: usize = 100;

/// Session source label for a run over more than one adapter.
const ALL_SOURCES: &str = "all_sources";

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// What happened to one candidate record, threaded back to the caller as a
/// value so failure counting is a data-flow concern.
enum RecordOutcome {
  Merged,
  /// No usable name; dropped at the normalizer boundary. Counted in the
  /// adapter's failed tally, not against the session.
  DroppedNameless,
  /// The store refused the merge; the record is skipped for this run and
  /// the session error counter bumped.
  StoreError,
}

/// The result of one full run.
#[derive(Debug)]
pub struct RunSummary {
  /// Final session state, re-read after finalisation.
  pub session:       ScrapeSession,
  /// Per-adapter found/successful/failed tallies, in registration order.
  pub adapter_stats: Vec<(String, AdapterStats)>,
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

pub struct IngestCoordinator<S> {
  store:      Arc<S>,
  merge:      MergeEngine<S>,
  accountant: SessionAccountant<S>,
  adapters:   Vec<Box<dyn SourceAdapter>>,

  city:               Option<String>,
  per_category_limit: usize,
  cancel:             Arc<AtomicBool>,
}

impl<S: LeadStore> IngestCoordinator<S> {
  pub fn new(store: Arc<S>, adapters: Vec<Box<dyn SourceAdapter>>) -> Self {
    Self {
      merge: MergeEngine::new(Arc::clone(&store)),
      accountant: SessionAccountant::new(Arc::clone(&store)),
      store,
      adapters,
      city: None,
      per_category_limit: DEFAULT_PER_CATEGORY_LIMIT,
      cancel: Arc::new(AtomicBool::new(false)),
    }
  }

  pub fn with_city(mut self, city: Option<String>) -> Self {
    self.city = city;
    self
  }

  pub fn with_per_category_limit(mut self, limit: usize) -> Self {
    self.per_category_limit = limit;
    self
  }

  /// Flag checked between category steps; set it to stop the run early.
  /// Leads already merged stay merged; the session finishes as `failed`
  /// with a cancellation message.
  pub fn cancellation_handle(&self) -> Arc<AtomicBool> {
    Arc::clone(&self.cancel)
  }

  /// Execute one full run over the given category keys.
  ///
  /// Adapters run sequentially in registration order, so for the
  /// freshness-wins fields the last-registered adapter to yield a given
  /// identity key wins deterministically.
  pub async fn run(&self, categories: &[String]) -> Result<RunSummary, S::Error> {
    let source_label = match self.adapters.as_slice() {
      [single] => single.source_name().to_owned(),
      _ => ALL_SOURCES.to_owned(),
    };

    let session = self.accountant.begin(&source_label).await?;
    let session_id = session.session_id;

    let mut adapter_stats = Vec::with_capacity(self.adapters.len());
    let mut cancelled = false;

    'adapters: for adapter in &self.adapters {
      let mut stats = AdapterStats::default();

      for category in categories {
        if self.cancel.load(Ordering::Relaxed) {
          cancelled = true;
          adapter_stats.push((adapter.source_name().to_owned(), stats));
          break 'adapters;
        }

        self
          .ingest_category(session_id, adapter.as_ref(), category, &mut stats)
          .await;
      }

      adapter_stats.push((adapter.source_name().to_owned(), stats));
    }

    let (status, message) = if cancelled {
      (SessionStatus::Failed, Some("run cancelled".to_owned()))
    } else {
      (SessionStatus::Completed, None)
    };
    self.accountant.finish(session_id, status, message).await?;

    let session = self
      .store
      .get_session(session_id)
      .await?
      .unwrap_or(session);

    for (source, stats) in &adapter_stats {
      tracing::info!(
        source,
        found = stats.total_found,
        successful = stats.successful,
        failed = stats.failed,
        "adapter finished"
      );
    }

    Ok(RunSummary { session, adapter_stats })
  }

  /// One adapter × category step. All failures are contained here.
  async fn ingest_category(
    &self,
    session_id: Uuid,
    adapter: &dyn SourceAdapter,
    category: &str,
    stats: &mut AdapterStats,
  ) {
    match self.store.get_category(category).await {
      Ok(Some(_)) => {}
      Ok(None) => {
        tracing::warn!(category, "unknown category; skipping");
        self.accountant.record_error(session_id).await;
        return;
      }
      Err(e) => {
        tracing::error!(category, error = %e, "category lookup failed");
        self.accountant.record_error(session_id).await;
        return;
      }
    }

    let records = match adapter
      .fetch(category, self.city.as_deref(), self.per_category_limit)
      .await
    {
      Ok(records) => records,
      Err(e) => {
        tracing::error!(
          source = adapter.source_name(),
          category,
          error = %e,
          "adapter fetch failed"
        );
        self.accountant.record_error(session_id).await;
        return;
      }
    };

    tracing::info!(
      source = adapter.source_name(),
      category,
      found = records.len(),
      "fetched records"
    );
    stats.total_found += records.len() as u32;

    for raw in &records {
      match self.process_record(session_id, category, raw).await {
        RecordOutcome::Merged => stats.successful += 1,
        RecordOutcome::DroppedNameless | RecordOutcome::StoreError => {
          stats.failed += 1;
        }
      }
    }
  }

  async fn process_record(
    &self,
    session_id: Uuid,
    category: &str,
    raw: &RawRecord,
  ) -> RecordOutcome {
    let Some(record) = NormalizedRecord::from_raw(raw) else {
      tracing::debug!(category, "dropping record without a usable name");
      return RecordOutcome::DroppedNameless;
    };

    let key = dedup_key(&record);

    match self.merge.apply(&record, &key, category).await {
      Ok((lead_id, action, changes)) => {
        self
          .accountant
          .record_outcome(session_id, lead_id, action, &changes)
          .await;
        RecordOutcome::Merged
      }
      Err(e) => {
        tracing::warn!(
          category,
          name = %record.name,
          error = %e,
          "merge failed; record skipped for this run"
        );
        self.accountant.record_error(session_id).await;
        RecordOutcome::StoreError
      }
    }
  }
}
