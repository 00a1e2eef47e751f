//! Handlers for `/sessions` — run status for operators.
//!
//! The latest session stays readable after a failed run so partial progress
//! and the failure reason are always visible.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use leadhive_core::{
  session::{ScrapeResult, ScrapeSession},
  store::LeadStore,
};
use uuid::Uuid;

use crate::error::ApiError;

/// `GET /sessions/latest`
pub async fn latest<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<ScrapeSession>, ApiError>
where
  S: LeadStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  store
    .latest_session()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound("no sessions yet".to_owned()))
}

/// `GET /sessions/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ScrapeSession>, ApiError>
where
  S: LeadStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  store
    .get_session(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("session {id}")))
}

/// `GET /sessions/:id/results` — the session's audit trail.
pub async fn results<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<ScrapeResult>>, ApiError>
where
  S: LeadStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let results = store
    .list_results(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(results))
}
