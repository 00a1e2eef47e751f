//! Handler for `/stats` — aggregate lead counts.

use std::sync::Arc;

use axum::{Json, extract::State};
use leadhive_core::store::{LeadStore, StoreStats};

use crate::error::ApiError;

/// `GET /stats`
pub async fn handler<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<StoreStats>, ApiError>
where
  S: LeadStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let stats = store
    .stats()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(stats))
}
