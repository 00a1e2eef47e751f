//! In-tree source adapters.
//!
//! The site-specific scrapers (map APIs, classifieds, the government
//! registry) live outside this repository; they only have to implement
//! [`SourceAdapter`]. The one adapter shipped here reads records from a JSON
//! file — the manual-import and testing path.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use leadhive_core::{
  adapter::{BoxError, SourceAdapter},
  record::RawRecord,
};

/// Reads raw records from a JSON file containing an array of objects.
///
/// A record carrying a `category` field is only yielded for that category;
/// records without one apply to every requested category. A missing `source`
/// field is filled with this adapter's label so the identity fallback has
/// something to work with.
pub struct JsonFileAdapter {
  path:   PathBuf,
  source: String,
}

impl JsonFileAdapter {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into(), source: "json_import".to_owned() }
  }

  /// Override the source label (e.g. to re-import an export from a named
  /// scraper).
  pub fn with_source(mut self, source: impl Into<String>) -> Self {
    self.source = source.into();
    self
  }
}

#[async_trait]
impl SourceAdapter for JsonFileAdapter {
  fn source_name(&self) -> &str { &self.source }

  async fn fetch(
    &self,
    category: &str,
    _city: Option<&str>,
    limit: usize,
  ) -> Result<Vec<RawRecord>, BoxError> {
    let bytes = tokio::fs::read(&self.path).await?;
    let parsed: Vec<RawRecord> = serde_json::from_slice(&bytes)?;

    let records = parsed
      .into_iter()
      .filter(|record| {
        match record.get("category").and_then(Value::as_str) {
          Some(c) => c == category,
          None => true,
        }
      })
      .take(limit)
      .map(|mut record| {
        record
          .entry("source".to_owned())
          .or_insert_with(|| Value::String(self.source.clone()));
        record
      })
      .collect();

    Ok(records)
  }
}
