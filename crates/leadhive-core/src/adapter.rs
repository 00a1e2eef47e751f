//! The `SourceAdapter` contract and per-adapter run statistics.
//!
//! An adapter wraps one public data source (a map API, a classifieds site,
//! the government registry, …) and produces raw candidate records for a
//! category query. Retrieval details — HTTP, rate limiting, selectors — live
//! entirely behind this trait; the pipeline only sees [`RawRecord`] maps.

use async_trait::async_trait;

use crate::record::RawRecord;

/// Errors crossing the adapter boundary are opaque to the pipeline; they are
/// logged and counted, never matched on.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One pluggable data source.
///
/// Unlike the store trait this one is object-safe (via `async_trait`): the
/// coordinator holds a heterogeneous list of registered adapters.
///
/// Adapters may fail transiently (network, rate limits); the coordinator
/// catches the error, counts it against the session, and moves on. A failing
/// adapter never aborts the run.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
  /// Stable label identifying this source, e.g. `yandex_maps`.
  fn source_name(&self) -> &str;

  /// Produce up to `limit` raw records for `category`, optionally filtered
  /// to one city. Records are yielded in source order.
  async fn fetch(
    &self,
    category: &str,
    city: Option<&str>,
    limit: usize,
  ) -> Result<Vec<RawRecord>, BoxError>;
}

/// Per-adapter accounting for one run, reported in the run summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterStats {
  /// Records the adapter yielded.
  pub total_found: u32,
  /// Records that survived normalization and were merged.
  pub successful:  u32,
  /// Records dropped at the normalizer boundary or lost to store errors.
  pub failed:      u32,
}
