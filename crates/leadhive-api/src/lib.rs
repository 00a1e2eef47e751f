//! Read-only JSON API over the lead store.
//!
//! Exposes an axum [`Router`] backed by any [`leadhive_core::store::LeadStore`].
//! This is the surface the bot/export collaborator consumes: active leads,
//! the most recent session, aggregate stats. The pipeline is the only
//! writer; nothing here mutates anything.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", leadhive_api::api_router(store.clone()))
//! ```

pub mod error;
pub mod leads;
pub mod sessions;
pub mod stats;

use std::sync::Arc;

use axum::{Router, routing::get};
use leadhive_core::store::LeadStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: LeadStore + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    // Leads
    .route("/leads", get(leads::list::<S>))
    .route("/leads/{id}", get(leads::get_one::<S>))
    // Categories
    .route("/categories", get(leads::list_categories::<S>))
    // Sessions
    .route("/sessions/latest", get(sessions::latest::<S>))
    .route("/sessions/{id}", get(sessions::get_one::<S>))
    .route("/sessions/{id}/results", get(sessions::results::<S>))
    // Aggregates
    .route("/stats", get(stats::handler::<S>))
    .with_state(store)
}
