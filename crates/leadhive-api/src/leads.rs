//! Handlers for `/leads` and `/categories`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/leads` | `?category=`, `?city=`, `?limit=`, `?offset=` |
//! | `GET`  | `/leads/:id` | 404 if not found |
//! | `GET`  | `/categories` | The ten seeded niches |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use leadhive_core::{
  lead::{Category, Lead},
  store::{LeadQuery, LeadStore},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub category: Option<String>,
  pub city:     Option<String>,
  pub limit:    Option<usize>,
  pub offset:   Option<usize>,
}

/// `GET /leads` — active leads, newest first.
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Lead>>, ApiError>
where
  S: LeadStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let query = LeadQuery {
    category: params.category,
    city: params.city,
    include_inactive: false,
    limit: params.limit,
    offset: params.offset,
  };

  let leads = store
    .list_leads(&query)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(leads))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /leads/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Lead>, ApiError>
where
  S: LeadStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  store
    .get_lead(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("lead {id}")))
}

// ─── Categories ──────────────────────────────────────────────────────────────

/// `GET /categories`
pub async fn list_categories<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Category>>, ApiError>
where
  S: LeadStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let categories = store
    .list_categories()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(categories))
}
