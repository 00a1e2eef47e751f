//! Lead — the canonical business record aggregated from one or more sources.
//!
//! A lead is created the first time an identity key is sighted and mutated in
//! place on every later sighting that carries previously-missing fields or
//! fresher rating data. The pipeline never hard-deletes; `is_active` exists
//! for out-of-band deactivation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Category ────────────────────────────────────────────────────────────────

/// One of the ten fixed service niches. Static reference data, seeded at
/// schema initialisation and read-only at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
  /// Stable internal key, e.g. `auto_service`.
  pub key:     String,
  /// Russian display name shown to operators.
  pub name_ru: String,
}

// ─── Lead ────────────────────────────────────────────────────────────────────

/// The persisted, canonical business record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
  pub lead_id: Uuid,

  pub name:     String,
  pub address:  Option<String>,
  pub city:     Option<String>,
  pub district: Option<String>,

  pub phone:   Option<String>,
  pub email:   Option<String>,
  pub website: Option<String>,

  pub instagram: Option<String>,
  pub facebook:  Option<String>,
  pub vk:        Option<String>,
  pub telegram:  Option<String>,

  /// Category key the original search was performed for. Fixed at creation;
  /// merges never reassign it.
  pub category: String,

  pub latitude:  Option<f64>,
  pub longitude: Option<f64>,

  pub rating:        Option<f64>,
  pub reviews_count: u32,

  /// Which adapter produced (or last touched) this lead.
  pub source:     Option<String>,
  pub source_id:  Option<String>,
  pub source_url: Option<String>,

  /// Opaque snapshot of the raw payload the lead was created from.
  pub raw_data: Option<serde_json::Value>,

  /// Content-addressed identity fingerprint; at most one active lead per
  /// value. See [`crate::record::dedup_key`].
  pub dedup_key: String,

  pub is_active:       bool,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
  pub last_scraped_at: Option<DateTime<Utc>>,
}

/// Input for creating a lead. Identity and timestamps are assigned by the
/// store.
#[derive(Debug, Clone)]
pub struct NewLead {
  pub name:     String,
  pub address:  Option<String>,
  pub city:     Option<String>,
  pub district: Option<String>,

  pub phone:   Option<String>,
  pub email:   Option<String>,
  pub website: Option<String>,

  pub instagram: Option<String>,
  pub facebook:  Option<String>,
  pub vk:        Option<String>,
  pub telegram:  Option<String>,

  pub category: String,

  pub latitude:  Option<f64>,
  pub longitude: Option<f64>,

  pub rating:        Option<f64>,
  pub reviews_count: u32,

  pub source:     Option<String>,
  pub source_id:  Option<String>,
  pub source_url: Option<String>,

  pub raw_data:  Option<serde_json::Value>,
  pub dedup_key: String,
}

/// A field-level patch applied to an existing lead during a merge.
///
/// `Some` means "write this value"; `None` means "leave the column alone".
/// The timestamps are unconditional — every merge refreshes them whether or
/// not any content field changed.
#[derive(Debug, Clone, Default)]
pub struct LeadUpdate {
  pub phone:     Option<String>,
  pub email:     Option<String>,
  pub website:   Option<String>,
  pub instagram: Option<String>,

  pub rating:        Option<f64>,
  pub reviews_count: Option<u32>,
}

impl LeadUpdate {
  /// Names of the fields this patch writes, for the audit trail.
  pub fn changed_fields(&self) -> Vec<String> {
    let mut fields = Vec::new();
    if self.phone.is_some() {
      fields.push("phone".to_owned());
    }
    if self.email.is_some() {
      fields.push("email".to_owned());
    }
    if self.website.is_some() {
      fields.push("website".to_owned());
    }
    if self.instagram.is_some() {
      fields.push("instagram".to_owned());
    }
    if self.rating.is_some() {
      fields.push("rating".to_owned());
    }
    if self.reviews_count.is_some() {
      fields.push("reviews_count".to_owned());
    }
    fields
  }
}
