//! Pipeline tests against an in-memory SQLite store and scripted adapters.

use std::{
  collections::HashMap,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
  },
};

use async_trait::async_trait;
use serde_json::{Value, json};
use uuid::Uuid;

use leadhive_core::{
  adapter::{BoxError, SourceAdapter},
  lead::{Category, Lead, LeadUpdate, NewLead},
  record::{NormalizedRecord, RawRecord, dedup_key},
  session::{MergeAction, ScrapeResult, ScrapeSession, SessionStatus},
  store::{LeadQuery, LeadStore, StoreStats},
};
use leadhive_store_sqlite::SqliteStore;

use crate::{IngestCoordinator, JsonFileAdapter, MergeEngine};

async fn store() -> Arc<SqliteStore> {
  Arc::new(SqliteStore::open_in_memory().await.expect("in-memory store"))
}

fn raw(value: Value) -> RawRecord {
  value.as_object().expect("object literal").clone()
}

// ─── Scripted adapters ───────────────────────────────────────────────────────

/// Yields canned records per category, in order.
struct MockAdapter {
  name:    &'static str,
  records: HashMap<String, Vec<RawRecord>>,
}

impl MockAdapter {
  fn new(name: &'static str, per_category: Vec<(&str, Vec<Value>)>) -> Self {
    let records = per_category
      .into_iter()
      .map(|(category, values)| {
        (category.to_owned(), values.into_iter().map(raw).collect())
      })
      .collect();
    Self { name, records }
  }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
  fn source_name(&self) -> &str { self.name }

  async fn fetch(
    &self,
    category: &str,
    _city: Option<&str>,
    limit: usize,
  ) -> Result<Vec<RawRecord>, BoxError> {
    let mut records = self.records.get(category).cloned().unwrap_or_default();
    records.truncate(limit);
    Ok(records)
  }
}

/// Yields one record and raises the shared cancel flag during its fetch, so
/// the cancellation check fires between categories with work already done.
struct CancellingAdapter {
  cancel: Arc<Mutex<Option<Arc<AtomicBool>>>>,
}

#[async_trait]
impl SourceAdapter for CancellingAdapter {
  fn source_name(&self) -> &str { "yandex_maps" }

  async fn fetch(
    &self,
    _category: &str,
    _city: Option<&str>,
    _limit: usize,
  ) -> Result<Vec<RawRecord>, BoxError> {
    if let Some(flag) = self.cancel.lock().unwrap().as_ref() {
      flag.store(true, Ordering::Relaxed);
    }
    Ok(vec![raw(json!({ "name": "A", "phone": "291234567" }))])
  }
}

/// Fails every fetch, simulating a source that is down for the whole run.
struct FailingAdapter;

#[async_trait]
impl SourceAdapter for FailingAdapter {
  fn source_name(&self) -> &str { "broken_source" }

  async fn fetch(
    &self,
    _category: &str,
    _city: Option<&str>,
    _limit: usize,
  ) -> Result<Vec<RawRecord>, BoxError> {
    Err("simulated network failure".into())
  }
}

// ─── Flaky store ─────────────────────────────────────────────────────────────

/// Delegates to a real store but fails selected write operations, simulating
/// persistence trouble in the middle of a run.
struct FlakyStore {
  inner:        Arc<SqliteStore>,
  fail_updates: bool,
  fail_results: bool,
}

impl LeadStore for FlakyStore {
  type Error = leadhive_store_sqlite::Error;

  async fn insert_lead(&self, lead: NewLead) -> Result<Lead, Self::Error> {
    self.inner.insert_lead(lead).await
  }

  async fn find_by_dedup_key(&self, key: &str) -> Result<Option<Lead>, Self::Error> {
    self.inner.find_by_dedup_key(key).await
  }

  async fn apply_update(
    &self,
    lead_id: Uuid,
    update: LeadUpdate,
  ) -> Result<(), Self::Error> {
    if self.fail_updates {
      return Err(leadhive_store_sqlite::Error::LeadNotFound(lead_id));
    }
    self.inner.apply_update(lead_id, update).await
  }

  async fn get_lead(&self, lead_id: Uuid) -> Result<Option<Lead>, Self::Error> {
    self.inner.get_lead(lead_id).await
  }

  async fn list_leads(&self, query: &LeadQuery) -> Result<Vec<Lead>, Self::Error> {
    self.inner.list_leads(query).await
  }

  async fn get_category(&self, key: &str) -> Result<Option<Category>, Self::Error> {
    self.inner.get_category(key).await
  }

  async fn list_categories(&self) -> Result<Vec<Category>, Self::Error> {
    self.inner.list_categories().await
  }

  async fn create_session(&self, source: &str) -> Result<ScrapeSession, Self::Error> {
    self.inner.create_session(source).await
  }

  async fn record_result(
    &self,
    session_id: Uuid,
    lead_id: Uuid,
    action: MergeAction,
    changes: &[String],
  ) -> Result<(), Self::Error> {
    if self.fail_results {
      return Err(leadhive_store_sqlite::Error::SessionNotFound(session_id));
    }
    self
      .inner
      .record_result(session_id, lead_id, action, changes)
      .await
  }

  async fn record_session_error(&self, session_id: Uuid) -> Result<(), Self::Error> {
    self.inner.record_session_error(session_id).await
  }

  async fn finish_session(
    &self,
    session_id: Uuid,
    status: SessionStatus,
    error_message: Option<String>,
  ) -> Result<bool, Self::Error> {
    self
      .inner
      .finish_session(session_id, status, error_message)
      .await
  }

  async fn get_session(
    &self,
    session_id: Uuid,
  ) -> Result<Option<ScrapeSession>, Self::Error> {
    self.inner.get_session(session_id).await
  }

  async fn list_results(
    &self,
    session_id: Uuid,
  ) -> Result<Vec<ScrapeResult>, Self::Error> {
    self.inner.list_results(session_id).await
  }

  async fn latest_session(&self) -> Result<Option<ScrapeSession>, Self::Error> {
    self.inner.latest_session().await
  }

  async fn stats(&self) -> Result<StoreStats, Self::Error> {
    self.inner.stats().await
  }
}

// ─── Merge engine ────────────────────────────────────────────────────────────

#[tokio::test]
async fn merge_creates_then_updates_never_duplicates() {
  let s = store().await;
  let engine = MergeEngine::new(Arc::clone(&s));

  let record = NormalizedRecord::from_raw(&raw(json!({
    "name": "Клининг Люкс", "phone": "80291234567",
  })))
  .unwrap();
  let key = dedup_key(&record);

  let (id1, action1, _) = engine.apply(&record, &key, "cleaning").await.unwrap();
  let (id2, action2, _) = engine.apply(&record, &key, "cleaning").await.unwrap();

  assert_eq!(id1, id2);
  assert_eq!(action1, MergeAction::Created);
  assert_eq!(action2, MergeAction::Updated);

  let all = s.list_leads(&LeadQuery::default()).await.unwrap();
  assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn merge_fills_missing_but_never_overwrites() {
  let s = store().await;
  let engine = MergeEngine::new(Arc::clone(&s));

  let first = NormalizedRecord::from_raw(&raw(json!({
    "name": "Company X", "phone": "291234567",
  })))
  .unwrap();
  let key = dedup_key(&first);
  engine.apply(&first, &key, "legal").await.unwrap();

  // Second sighting supplies an email: filled.
  let second = NormalizedRecord::from_raw(&raw(json!({
    "name": "Company X", "phone": "291234567", "email": "x@example.by",
  })))
  .unwrap();
  let (lead_id, _, changes) =
    engine.apply(&second, &dedup_key(&second), "legal").await.unwrap();
  assert!(changes.contains(&"email".to_owned()));

  // Third sighting carries a different email: the stored one stands.
  let third = NormalizedRecord::from_raw(&raw(json!({
    "name": "Company X", "phone": "291234567", "email": "other@example.by",
  })))
  .unwrap();
  let (_, _, changes) =
    engine.apply(&third, &dedup_key(&third), "legal").await.unwrap();
  assert!(!changes.contains(&"email".to_owned()));

  let lead = s.get_lead(lead_id).await.unwrap().unwrap();
  assert_eq!(lead.email.as_deref(), Some("x@example.by"));
}

#[tokio::test]
async fn merge_freshness_wins_for_rating_and_reviews() {
  let s = store().await;
  let engine = MergeEngine::new(Arc::clone(&s));

  let first = NormalizedRecord::from_raw(&raw(json!({
    "name": "Фитнес Клуб", "phone": "291234567",
    "rating": 4.2, "reviews_count": 10,
  })))
  .unwrap();
  let key = dedup_key(&first);
  engine.apply(&first, &key, "fitness").await.unwrap();

  let fresher = NormalizedRecord::from_raw(&raw(json!({
    "name": "Фитнес Клуб", "phone": "291234567",
    "rating": 3.9, "reviews_count": 25,
  })))
  .unwrap();
  let (lead_id, _, _) = engine.apply(&fresher, &key, "fitness").await.unwrap();

  let lead = s.get_lead(lead_id).await.unwrap().unwrap();
  assert_eq!(lead.rating, Some(3.9));
  assert_eq!(lead.reviews_count, 25);
}

#[tokio::test]
async fn merge_never_reassigns_category() {
  let s = store().await;
  let engine = MergeEngine::new(Arc::clone(&s));

  let record = NormalizedRecord::from_raw(&raw(json!({
    "name": "Универсал", "phone": "291234567",
  })))
  .unwrap();
  let key = dedup_key(&record);

  let (lead_id, _, _) = engine.apply(&record, &key, "handyman").await.unwrap();
  engine.apply(&record, &key, "cleaning").await.unwrap();

  let lead = s.get_lead(lead_id).await.unwrap().unwrap();
  assert_eq!(lead.category, "handyman");
}

#[tokio::test]
async fn concurrent_merges_on_one_key_create_one_lead() {
  let s = store().await;
  let engine = Arc::new(MergeEngine::new(Arc::clone(&s)));

  let record = NormalizedRecord::from_raw(&raw(json!({
    "name": "Race Target", "phone": "291234567",
  })))
  .unwrap();
  let key = dedup_key(&record);

  let mut handles = Vec::new();
  for _ in 0..8 {
    let engine = Arc::clone(&engine);
    let record = record.clone();
    let key = key.clone();
    handles.push(tokio::spawn(async move {
      engine.apply(&record, &key, "legal").await
    }));
  }
  for handle in handles {
    handle.await.unwrap().unwrap();
  }

  let all = s.list_leads(&LeadQuery::default()).await.unwrap();
  assert_eq!(all.len(), 1);
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

fn categories(keys: &[&str]) -> Vec<String> {
  keys.iter().map(|k| (*k).to_owned()).collect()
}

#[tokio::test]
async fn end_to_end_two_adapters_merge_one_identity() {
  // Two sources list the same business: same phone, different addresses,
  // only the second knows the email.
  let s = store().await;

  let a = MockAdapter::new("yandex_maps", vec![("cleaning", vec![json!({
    "name": "Company X",
    "phone": "80291234567",
    "address": "ул. Ленина 1, Минск",
  })])]);
  let b = MockAdapter::new("twogis", vec![("cleaning", vec![json!({
    "name": "Company X",
    "phone": "+375 29 123-45-67",
    "address": "пр. Независимости 50, Минск",
    "email": "x@example.by",
  })])]);

  let coordinator =
    IngestCoordinator::new(Arc::clone(&s), vec![Box::new(a), Box::new(b)]);
  let summary = coordinator.run(&categories(&["cleaning"])).await.unwrap();

  assert_eq!(summary.session.status, SessionStatus::Completed);
  assert_eq!(summary.session.total_scraped, 2);
  assert_eq!(summary.session.new_leads, 1);
  assert_eq!(summary.session.updated_leads, 1);
  assert_eq!(summary.session.errors_count, 0);
  assert_eq!(summary.session.source, "all_sources");

  let all = s.list_leads(&LeadQuery::default()).await.unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].name, "Company X");
  assert_eq!(all[0].phone.as_deref(), Some("+375291234567"));
  assert_eq!(all[0].email.as_deref(), Some("x@example.by"));
}

#[tokio::test]
async fn failing_adapter_does_not_abort_the_run() {
  let s = store().await;

  let good = MockAdapter::new("yandex_maps", vec![
    ("cleaning", vec![json!({ "name": "A", "phone": "291234567" })]),
    ("tattoo", vec![json!({ "name": "B", "phone": "297654321" })]),
  ]);

  let coordinator = IngestCoordinator::new(
    Arc::clone(&s),
    vec![Box::new(FailingAdapter), Box::new(good)],
  );
  let summary = coordinator
    .run(&categories(&["cleaning", "tattoo"]))
    .await
    .unwrap();

  // The broken source cost two errors (one per category) but the good
  // adapter still processed everything and the run completed.
  assert_eq!(summary.session.status, SessionStatus::Completed);
  assert_eq!(summary.session.errors_count, 2);
  assert_eq!(summary.session.new_leads, 2);

  let all = s.list_leads(&LeadQuery::default()).await.unwrap();
  assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn nameless_records_are_dropped_not_counted_as_session_errors() {
  let s = store().await;

  let adapter = MockAdapter::new("yandex_maps", vec![("cleaning", vec![
    json!({ "phone": "291234567" }),
    json!({ "name": "Named", "phone": "297654321" }),
  ])]);

  let coordinator = IngestCoordinator::new(Arc::clone(&s), vec![Box::new(adapter)]);
  let summary = coordinator.run(&categories(&["cleaning"])).await.unwrap();

  assert_eq!(summary.session.errors_count, 0);
  assert_eq!(summary.session.new_leads, 1);
  assert_eq!(summary.session.total_scraped, 1);

  let (source, stats) = &summary.adapter_stats[0];
  assert_eq!(source, "yandex_maps");
  assert_eq!(stats.total_found, 2);
  assert_eq!(stats.successful, 1);
  assert_eq!(stats.failed, 1);
}

#[tokio::test]
async fn unknown_category_is_counted_and_skipped() {
  let s = store().await;

  let adapter = MockAdapter::new("yandex_maps", vec![("cleaning", vec![
    json!({ "name": "A", "phone": "291234567" }),
  ])]);

  let coordinator = IngestCoordinator::new(Arc::clone(&s), vec![Box::new(adapter)]);
  let summary = coordinator
    .run(&categories(&["no_such_niche", "cleaning"]))
    .await
    .unwrap();

  assert_eq!(summary.session.status, SessionStatus::Completed);
  assert_eq!(summary.session.errors_count, 1);
  assert_eq!(summary.session.new_leads, 1);
}

#[tokio::test]
async fn single_adapter_run_uses_its_source_label() {
  let s = store().await;
  let adapter = MockAdapter::new("twogis", vec![]);

  let coordinator = IngestCoordinator::new(Arc::clone(&s), vec![Box::new(adapter)]);
  let summary = coordinator.run(&categories(&["cleaning"])).await.unwrap();

  assert_eq!(summary.session.source, "twogis");
}

#[tokio::test]
async fn cancelled_run_finishes_failed_and_keeps_merged_leads() {
  let s = store().await;

  let adapter = MockAdapter::new("yandex_maps", vec![("cleaning", vec![
    json!({ "name": "A", "phone": "291234567" }),
  ])]);

  let coordinator = IngestCoordinator::new(Arc::clone(&s), vec![Box::new(adapter)]);
  coordinator
    .cancellation_handle()
    .store(true, Ordering::Relaxed);

  let summary = coordinator.run(&categories(&["cleaning"])).await.unwrap();

  assert_eq!(summary.session.status, SessionStatus::Failed);
  assert_eq!(summary.session.error_message.as_deref(), Some("run cancelled"));
  // Nothing was processed before the flag was observed.
  assert_eq!(summary.session.total_scraped, 0);
}

#[tokio::test]
async fn cancellation_mid_run_keeps_already_merged_leads() {
  let s = store().await;

  let cancel = Arc::new(Mutex::new(None));
  let adapter = CancellingAdapter { cancel: Arc::clone(&cancel) };

  let coordinator = IngestCoordinator::new(Arc::clone(&s), vec![Box::new(adapter)]);
  *cancel.lock().unwrap() = Some(coordinator.cancellation_handle());

  // The flag goes up while the first category is being fetched, so its
  // record is fully processed and the second category is never reached.
  let summary = coordinator
    .run(&categories(&["cleaning", "tattoo"]))
    .await
    .unwrap();

  assert_eq!(summary.session.status, SessionStatus::Failed);
  assert_eq!(summary.session.error_message.as_deref(), Some("run cancelled"));
  assert_eq!(summary.session.total_scraped, 1);
  assert_eq!(summary.session.new_leads, 1);

  // No rollback of partial progress.
  let all = s.list_leads(&LeadQuery::default()).await.unwrap();
  assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn merge_store_error_is_counted_and_run_completes() {
  let inner = store().await;
  let s = Arc::new(FlakyStore {
    inner:        Arc::clone(&inner),
    fail_updates: true,
    fail_results: false,
  });

  // Same identity twice: the create succeeds, the follow-up update hits the
  // failing store and must be skipped and counted, not abort the run.
  let adapter = MockAdapter::new("yandex_maps", vec![("cleaning", vec![
    json!({ "name": "A", "phone": "291234567" }),
    json!({ "name": "A", "phone": "291234567", "email": "a@example.by" }),
  ])]);

  let coordinator = IngestCoordinator::new(Arc::clone(&s), vec![Box::new(adapter)]);
  let summary = coordinator.run(&categories(&["cleaning"])).await.unwrap();

  assert_eq!(summary.session.status, SessionStatus::Completed);
  assert_eq!(summary.session.new_leads, 1);
  assert_eq!(summary.session.errors_count, 1);
  assert_eq!(summary.session.total_scraped, 1);

  let (_, stats) = &summary.adapter_stats[0];
  assert_eq!(stats.successful, 1);
  assert_eq!(stats.failed, 1);

  // The created lead survives; the failed update left it untouched.
  let all = inner.list_leads(&LeadQuery::default()).await.unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].email, None);
}

#[tokio::test]
async fn bookkeeping_failure_never_aborts_the_run() {
  let inner = store().await;
  let s = Arc::new(FlakyStore {
    inner:        Arc::clone(&inner),
    fail_updates: false,
    fail_results: true,
  });

  let adapter = MockAdapter::new("yandex_maps", vec![("cleaning", vec![
    json!({ "name": "A", "phone": "291234567" }),
  ])]);

  let coordinator = IngestCoordinator::new(Arc::clone(&s), vec![Box::new(adapter)]);
  let summary = coordinator.run(&categories(&["cleaning"])).await.unwrap();

  // The counter bump was lost, not the run and not the lead.
  assert_eq!(summary.session.status, SessionStatus::Completed);
  assert_eq!(summary.session.total_scraped, 0);

  let (_, stats) = &summary.adapter_stats[0];
  assert_eq!(stats.successful, 1);

  let all = inner.list_leads(&LeadQuery::default()).await.unwrap();
  assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn per_category_limit_is_passed_to_adapters() {
  let s = store().await;

  let adapter = MockAdapter::new("yandex_maps", vec![("cleaning", vec![
    json!({ "name": "A", "phone": "291111111" }),
    json!({ "name": "B", "phone": "292222222" }),
    json!({ "name": "C", "phone": "293333333" }),
  ])]);

  let coordinator = IngestCoordinator::new(Arc::clone(&s), vec![Box::new(adapter)])
    .with_per_category_limit(2);
  let summary = coordinator.run(&categories(&["cleaning"])).await.unwrap();

  assert_eq!(summary.session.total_scraped, 2);
}

// ─── JsonFileAdapter ─────────────────────────────────────────────────────────

#[tokio::test]
async fn json_file_adapter_filters_and_labels() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("import.json");
  tokio::fs::write(
    &path,
    serde_json::to_vec(&json!([
      { "name": "A", "category": "cleaning", "phone": "291111111" },
      { "name": "B", "category": "tattoo", "phone": "292222222" },
      { "name": "C", "phone": "293333333" },
      { "name": "D", "category": "cleaning", "source": "manual" },
    ]))
    .unwrap(),
  )
  .await
  .unwrap();

  let adapter = JsonFileAdapter::new(&path);
  let records = adapter.fetch("cleaning", None, 100).await.unwrap();

  // A (matching), C (uncategorised) and D; B belongs to another niche.
  assert_eq!(records.len(), 3);
  assert_eq!(
    records[0].get("source").and_then(Value::as_str),
    Some("json_import")
  );
  // An explicit source is left alone.
  assert_eq!(
    records[2].get("source").and_then(Value::as_str),
    Some("manual")
  );

  let limited = adapter.fetch("cleaning", None, 1).await.unwrap();
  assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn json_file_adapter_missing_file_errors() {
  let adapter = JsonFileAdapter::new("/definitely/not/here.json");
  assert!(adapter.fetch("cleaning", None, 10).await.is_err());
}
