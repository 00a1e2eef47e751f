//! Integration tests for `SqliteStore` against an in-memory database.

use leadhive_core::{
  lead::{LeadUpdate, NewLead},
  session::{MergeAction, SessionStatus},
  store::{LeadQuery, LeadStore},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_lead(name: &str, dedup_key: &str) -> NewLead {
  NewLead {
    name: name.to_owned(),
    address: Some("ул. Тестовая 1, Минск".to_owned()),
    city: Some("Минск".to_owned()),
    district: None,
    phone: Some("+375291234567".to_owned()),
    email: None,
    website: None,
    instagram: None,
    facebook: None,
    vk: None,
    telegram: None,
    category: "cleaning".to_owned(),
    latitude: Some(53.9006),
    longitude: Some(27.5590),
    rating: Some(4.5),
    reviews_count: 50,
    source: Some("yandex_maps".to_owned()),
    source_id: Some("y-1".to_owned()),
    source_url: None,
    raw_data: Some(serde_json::json!({ "name": name })),
    dedup_key: dedup_key.to_owned(),
  }
}

// ─── Categories ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn categories_are_seeded() {
  let s = store().await;

  let all = s.list_categories().await.unwrap();
  assert_eq!(all.len(), 10);

  let tattoo = s.get_category("tattoo").await.unwrap();
  assert!(tattoo.is_some());
  assert_eq!(tattoo.unwrap().name_ru, "Тату/перманент/пирсинг");

  assert!(s.get_category("nonsense").await.unwrap().is_none());
}

// ─── Leads ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_find_by_dedup_key() {
  let s = store().await;

  let lead = s.insert_lead(new_lead("Клининг Люкс", "key-1")).await.unwrap();
  assert!(lead.is_active);
  assert!(lead.last_scraped_at.is_some());

  let found = s.find_by_dedup_key("key-1").await.unwrap();
  assert!(found.is_some());
  assert_eq!(found.unwrap().lead_id, lead.lead_id);

  assert!(s.find_by_dedup_key("key-2").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_dedup_key_is_rejected() {
  let s = store().await;
  s.insert_lead(new_lead("A", "key-1")).await.unwrap();

  let err = s.insert_lead(new_lead("B", "key-1")).await.unwrap_err();
  assert!(matches!(err, Error::DedupCollision(k) if k == "key-1"));
}

#[tokio::test]
async fn raw_data_round_trips() {
  let s = store().await;
  let lead = s.insert_lead(new_lead("X", "key-1")).await.unwrap();

  let fetched = s.get_lead(lead.lead_id).await.unwrap().unwrap();
  assert_eq!(fetched.raw_data, Some(serde_json::json!({ "name": "X" })));
}

#[tokio::test]
async fn apply_update_writes_only_supplied_fields() {
  let s = store().await;
  let lead = s.insert_lead(new_lead("X", "key-1")).await.unwrap();

  s.apply_update(lead.lead_id, LeadUpdate {
    email: Some("x@example.by".to_owned()),
    rating: Some(4.9),
    ..Default::default()
  })
  .await
  .unwrap();

  let updated = s.get_lead(lead.lead_id).await.unwrap().unwrap();
  assert_eq!(updated.email.as_deref(), Some("x@example.by"));
  assert_eq!(updated.rating, Some(4.9));
  // Untouched fields keep their values.
  assert_eq!(updated.phone, lead.phone);
  assert_eq!(updated.reviews_count, lead.reviews_count);
  // Timestamps always refresh.
  assert!(updated.updated_at >= lead.updated_at);
  assert!(updated.last_scraped_at >= lead.last_scraped_at);
}

#[tokio::test]
async fn apply_update_missing_lead_errors() {
  let s = store().await;
  let err = s
    .apply_update(Uuid::new_v4(), LeadUpdate::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::LeadNotFound(_)));
}

#[tokio::test]
async fn list_leads_filters_by_category() {
  let s = store().await;
  s.insert_lead(new_lead("A", "key-1")).await.unwrap();

  let mut other = new_lead("B", "key-2");
  other.category = "tattoo".to_owned();
  s.insert_lead(other).await.unwrap();

  let cleaning = s
    .list_leads(&LeadQuery {
      category: Some("cleaning".to_owned()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(cleaning.len(), 1);
  assert_eq!(cleaning[0].name, "A");

  let all = s.list_leads(&LeadQuery::default()).await.unwrap();
  assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn list_leads_respects_limit_and_offset() {
  let s = store().await;
  for i in 0..5 {
    s.insert_lead(new_lead(&format!("L{i}"), &format!("key-{i}")))
      .await
      .unwrap();
  }

  let page = s
    .list_leads(&LeadQuery {
      limit: Some(2),
      offset: Some(2),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(page.len(), 2);
}

// ─── Sessions ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_session_starts_at_zero() {
  let s = store().await;
  let session = s.create_session("all_sources").await.unwrap();

  assert_eq!(session.status, SessionStatus::Started);
  assert_eq!(session.total_scraped, 0);

  let fetched = s.get_session(session.session_id).await.unwrap().unwrap();
  assert_eq!(fetched.source, "all_sources");
  assert_eq!(fetched.status, SessionStatus::Started);
}

#[tokio::test]
async fn record_result_bumps_counters_and_appends_audit_row() {
  let s = store().await;
  let session = s.create_session("test").await.unwrap();
  let lead = s.insert_lead(new_lead("X", "key-1")).await.unwrap();

  s.record_result(session.session_id, lead.lead_id, MergeAction::Created, &[])
    .await
    .unwrap();
  s.record_result(
    session.session_id,
    lead.lead_id,
    MergeAction::Updated,
    &["email".to_owned()],
  )
  .await
  .unwrap();

  let fetched = s.get_session(session.session_id).await.unwrap().unwrap();
  assert_eq!(fetched.total_scraped, 2);
  assert_eq!(fetched.new_leads, 1);
  assert_eq!(fetched.updated_leads, 1);
  assert_eq!(fetched.errors_count, 0);

  let results = s.list_results(session.session_id).await.unwrap();
  assert_eq!(results.len(), 2);
  assert_eq!(results[0].action, MergeAction::Created);
  assert_eq!(results[1].changes, vec!["email".to_owned()]);
}

#[tokio::test]
async fn skipped_results_count_as_errors() {
  let s = store().await;
  let session = s.create_session("test").await.unwrap();
  let lead = s.insert_lead(new_lead("X", "key-1")).await.unwrap();

  s.record_result(session.session_id, lead.lead_id, MergeAction::Skipped, &[])
    .await
    .unwrap();

  let fetched = s.get_session(session.session_id).await.unwrap().unwrap();
  assert_eq!(fetched.total_scraped, 1);
  assert_eq!(fetched.errors_count, 1);
}

#[tokio::test]
async fn finish_session_is_idempotent() {
  let s = store().await;
  let session = s.create_session("test").await.unwrap();

  let first = s
    .finish_session(session.session_id, SessionStatus::Completed, None)
    .await
    .unwrap();
  assert!(first);

  let fetched = s.get_session(session.session_id).await.unwrap().unwrap();
  assert_eq!(fetched.status, SessionStatus::Completed);
  assert!(fetched.completed_at.is_some());
  assert!(fetched.duration_seconds.is_some());

  // A second finish is a no-op and must not overwrite the terminal state.
  let second = s
    .finish_session(
      session.session_id,
      SessionStatus::Failed,
      Some("late failure".to_owned()),
    )
    .await
    .unwrap();
  assert!(!second);

  let fetched = s.get_session(session.session_id).await.unwrap().unwrap();
  assert_eq!(fetched.status, SessionStatus::Completed);
  assert_eq!(fetched.error_message, None);
}

#[tokio::test]
async fn finish_session_missing_errors() {
  let s = store().await;
  let err = s
    .finish_session(Uuid::new_v4(), SessionStatus::Completed, None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SessionNotFound(_)));
}

#[tokio::test]
async fn latest_session_survives_failure() {
  let s = store().await;
  s.create_session("first").await.unwrap();
  let second = s.create_session("second").await.unwrap();
  s.record_session_error(second.session_id).await.unwrap();
  s.finish_session(
    second.session_id,
    SessionStatus::Failed,
    Some("boom".to_owned()),
  )
  .await
  .unwrap();

  let latest = s.latest_session().await.unwrap().unwrap();
  assert_eq!(latest.session_id, second.session_id);
  assert_eq!(latest.status, SessionStatus::Failed);
  assert_eq!(latest.errors_count, 1);
  assert_eq!(latest.error_message.as_deref(), Some("boom"));
}

// ─── Aggregates ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn stats_aggregates_active_leads() {
  let s = store().await;

  s.insert_lead(new_lead("A", "key-1")).await.unwrap();

  let mut b = new_lead("B", "key-2");
  b.category = "tattoo".to_owned();
  b.phone = None;
  b.email = Some("b@example.by".to_owned());
  b.source = Some("twogis".to_owned());
  s.insert_lead(b).await.unwrap();

  let stats = s.stats().await.unwrap();
  assert_eq!(stats.total_active, 2);
  assert_eq!(stats.with_phone, 1);
  assert_eq!(stats.with_email, 1);
  assert!(stats.by_category.contains(&("cleaning".to_owned(), 1)));
  assert!(stats.by_category.contains(&("tattoo".to_owned(), 1)));
  assert!(stats.by_source.contains(&("yandex_maps".to_owned(), 1)));
  assert!(stats.by_source.contains(&("twogis".to_owned(), 1)));
}
