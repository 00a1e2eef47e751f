//! The merge engine — create-or-update decisions against the lead store.
//!
//! Given a normalized record and its deduplication key, look up the existing
//! lead for that identity and either create a fresh lead or fold the record
//! into the stored one. Field policy on update:
//!
//! - phone, email, website, instagram: **fill missing** — written only when
//!   the stored value is absent and the record supplies one;
//! - rating, reviews_count: **freshness wins** — always replaced when the
//!   record carries a value, since they legitimately change over time;
//! - `updated_at` / `last_scraped_at`: refreshed on every merge;
//! - category: fixed at creation, never reassigned.
//!
//! The lookup-then-write for one key is a critical section: two concurrent
//! merges on the same key would otherwise race to create two leads for one
//! identity. A per-key async lock serialises them; merges for distinct keys
//! proceed concurrently.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use leadhive_core::{
  lead::{LeadUpdate, NewLead},
  record::NormalizedRecord,
  session::MergeAction,
  store::LeadStore,
};

// ─── Per-key locking ─────────────────────────────────────────────────────────

/// Lazily-populated map of identity key → lock. Entries are never removed;
/// a run touches at most a few thousand keys and the map dies with the
/// engine.
#[derive(Default)]
struct KeyLocks {
  inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLocks {
  async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
    let lock = {
      let mut map = self.inner.lock().await;
      Arc::clone(map.entry(key.to_owned()).or_default())
    };
    lock.lock_owned().await
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// The single writer of lead rows during ingestion.
pub struct MergeEngine<S> {
  store: Arc<S>,
  locks: KeyLocks,
}

impl<S: LeadStore> MergeEngine<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store, locks: KeyLocks::default() }
  }

  /// Merge one record under its identity key.
  ///
  /// Returns the affected lead, the action taken, and the names of the
  /// fields an update actually wrote (empty for a creation).
  pub async fn apply(
    &self,
    record: &NormalizedRecord,
    key: &str,
    category: &str,
  ) -> Result<(Uuid, MergeAction, Vec<String>), S::Error> {
    let _guard = self.locks.acquire(key).await;

    match self.store.find_by_dedup_key(key).await? {
      None => {
        let lead = self
          .store
          .insert_lead(new_lead_from(record, key, category))
          .await?;
        tracing::debug!(lead_id = %lead.lead_id, key, "created lead");
        Ok((lead.lead_id, MergeAction::Created, Vec::new()))
      }
      Some(existing) => {
        let update = merge_policy(&existing, record);
        let changes = update.changed_fields();
        self.store.apply_update(existing.lead_id, update).await?;
        tracing::debug!(
          lead_id = %existing.lead_id,
          key,
          changed = changes.len(),
          "updated lead"
        );
        Ok((existing.lead_id, MergeAction::Updated, changes))
      }
    }
  }
}

// ─── Policy ──────────────────────────────────────────────────────────────────

fn is_missing(value: &Option<String>) -> bool {
  value.as_deref().is_none_or(|s| s.trim().is_empty())
}

/// Compute the field-level patch for folding `record` into `existing`.
fn merge_policy(
  existing: &leadhive_core::lead::Lead,
  record: &NormalizedRecord,
) -> LeadUpdate {
  let fill = |current: &Option<String>, incoming: &Option<String>| {
    if is_missing(current) { incoming.clone() } else { None }
  };

  LeadUpdate {
    phone: fill(&existing.phone, &record.phone),
    email: fill(&existing.email, &record.email),
    website: fill(&existing.website, &record.website),
    instagram: fill(&existing.instagram, &record.socials.instagram),
    rating: record.rating,
    reviews_count: record.reviews_count,
  }
}

fn new_lead_from(
  record: &NormalizedRecord,
  key: &str,
  category: &str,
) -> NewLead {
  NewLead {
    name: record.name.clone(),
    address: record.address.clone(),
    city: record.city.clone(),
    district: record.district.clone(),
    phone: record.phone.clone(),
    email: record.email.clone(),
    website: record.website.clone(),
    instagram: record.socials.instagram.clone(),
    facebook: record.socials.facebook.clone(),
    vk: record.socials.vk.clone(),
    telegram: record.socials.telegram.clone(),
    category: category.to_owned(),
    latitude: record.latitude,
    longitude: record.longitude,
    rating: record.rating,
    reviews_count: record.reviews_count.unwrap_or(0),
    source: record.source.clone(),
    source_id: record.source_id.clone(),
    source_url: record.source_url.clone(),
    raw_data: Some(record.raw.clone()),
    dedup_key: key.to_owned(),
  }
}
