//! [`SqliteStore`] — the SQLite implementation of [`LeadStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use leadhive_core::{
  lead::{Category, Lead, LeadUpdate, NewLead},
  session::{MergeAction, ScrapeResult, ScrapeSession, SessionStatus},
  store::{LeadQuery, LeadStore, StoreStats},
};

use crate::{
  Error, Result,
  encode::{
    LEAD_COLUMNS, RawLead, RawResult, RawSession, SESSION_COLUMNS,
    encode_action, encode_dt, encode_status, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A lead store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation,
  /// including the category seed.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Whether a database error is a UNIQUE-constraint violation on insert.
fn is_unique_violation(err: &Error) -> bool {
  matches!(
    err,
    Error::Database(tokio_rusqlite::Error::Rusqlite(
      rusqlite::Error::SqliteFailure(e, _),
    )) if e.code == rusqlite::ErrorCode::ConstraintViolation
  )
}

// ─── LeadStore impl ──────────────────────────────────────────────────────────

impl LeadStore for SqliteStore {
  type Error = Error;

  // ── Leads ─────────────────────────────────────────────────────────────────

  async fn insert_lead(&self, input: NewLead) -> Result<Lead> {
    let now = Utc::now();
    let lead = Lead {
      lead_id:         Uuid::new_v4(),
      name:            input.name,
      address:         input.address,
      city:            input.city,
      district:        input.district,
      phone:           input.phone,
      email:           input.email,
      website:         input.website,
      instagram:       input.instagram,
      facebook:        input.facebook,
      vk:              input.vk,
      telegram:        input.telegram,
      category:        input.category,
      latitude:        input.latitude,
      longitude:       input.longitude,
      rating:          input.rating,
      reviews_count:   input.reviews_count,
      source:          input.source,
      source_id:       input.source_id,
      source_url:      input.source_url,
      raw_data:        input.raw_data,
      dedup_key:       input.dedup_key,
      is_active:       true,
      created_at:      now,
      updated_at:      now,
      last_scraped_at: Some(now),
    };

    let row = lead.clone();
    let raw_data_str = row
      .raw_data
      .as_ref()
      .map(serde_json::to_string)
      .transpose()?;

    let result: Result<()> = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO leads (
             lead_id, name, address, city, district,
             phone, email, website, instagram, facebook, vk, telegram,
             category, latitude, longitude, rating, reviews_count,
             source, source_id, source_url, raw_data, dedup_key,
             is_active, created_at, updated_at, last_scraped_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                     ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22,
                     ?23, ?24, ?25, ?26)",
          rusqlite::params![
            encode_uuid(row.lead_id),
            row.name,
            row.address,
            row.city,
            row.district,
            row.phone,
            row.email,
            row.website,
            row.instagram,
            row.facebook,
            row.vk,
            row.telegram,
            row.category,
            row.latitude,
            row.longitude,
            row.rating,
            row.reviews_count,
            row.source,
            row.source_id,
            row.source_url,
            raw_data_str,
            row.dedup_key,
            row.is_active,
            encode_dt(row.created_at),
            encode_dt(row.updated_at),
            row.last_scraped_at.map(encode_dt),
          ],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::from);

    match result {
      Ok(()) => Ok(lead),
      Err(e) if is_unique_violation(&e) => {
        Err(Error::DedupCollision(lead.dedup_key))
      }
      Err(e) => Err(e),
    }
  }

  async fn find_by_dedup_key(&self, key: &str) -> Result<Option<Lead>> {
    let key = key.to_owned();

    let raw: Option<RawLead> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {LEAD_COLUMNS} FROM leads
                 WHERE dedup_key = ?1 AND is_active = 1"
              ),
              rusqlite::params![key],
              RawLead::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawLead::into_lead).transpose()
  }

  async fn apply_update(&self, lead_id: Uuid, update: LeadUpdate) -> Result<()> {
    let id_str = encode_uuid(lead_id);
    let now_str = encode_dt(Utc::now());

    let rows: usize = self
      .conn
      .call(move |conn| {
        // The SET list is assembled dynamically; only supplied fields are
        // written, timestamps always are.
        let mut sets: Vec<&'static str> =
          vec!["updated_at = ?", "last_scraped_at = ?"];
        let mut values: Vec<Box<dyn rusqlite::ToSql>> =
          vec![Box::new(now_str.clone()), Box::new(now_str)];

        if let Some(v) = update.phone {
          sets.push("phone = ?");
          values.push(Box::new(v));
        }
        if let Some(v) = update.email {
          sets.push("email = ?");
          values.push(Box::new(v));
        }
        if let Some(v) = update.website {
          sets.push("website = ?");
          values.push(Box::new(v));
        }
        if let Some(v) = update.instagram {
          sets.push("instagram = ?");
          values.push(Box::new(v));
        }
        if let Some(v) = update.rating {
          sets.push("rating = ?");
          values.push(Box::new(v));
        }
        if let Some(v) = update.reviews_count {
          sets.push("reviews_count = ?");
          values.push(Box::new(v));
        }

        values.push(Box::new(id_str));

        let sql = format!(
          "UPDATE leads SET {} WHERE lead_id = ?",
          sets.join(", ")
        );
        let rows = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(rows)
      })
      .await?;

    if rows == 0 {
      return Err(Error::LeadNotFound(lead_id));
    }
    Ok(())
  }

  async fn get_lead(&self, lead_id: Uuid) -> Result<Option<Lead>> {
    let id_str = encode_uuid(lead_id);

    let raw: Option<RawLead> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE lead_id = ?1"),
              rusqlite::params![id_str],
              RawLead::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawLead::into_lead).transpose()
  }

  async fn list_leads(&self, query: &LeadQuery) -> Result<Vec<Lead>> {
    let category = query.category.clone();
    let city = query.city.clone();
    let include_inactive = query.include_inactive;
    let limit_val = query.limit.unwrap_or(100) as i64;
    let offset_val = query.offset.unwrap_or(0) as i64;

    let raws: Vec<RawLead> = self
      .conn
      .call(move |conn| {
        // Fixed parameter positions; a missing filter simply leaves its
        // placeholder unreferenced.
        let mut conds: Vec<&'static str> = vec![];
        if category.is_some() {
          conds.push("category = ?1");
        }
        if city.is_some() {
          conds.push("city = ?2");
        }
        if !include_inactive {
          conds.push("is_active = 1");
        }

        let where_clause = if conds.is_empty() {
          String::new()
        } else {
          format!("WHERE {}", conds.join(" AND "))
        };

        let sql = format!(
          "SELECT {LEAD_COLUMNS} FROM leads
           {where_clause}
           ORDER BY created_at DESC
           LIMIT ?3 OFFSET ?4"
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![
              category.as_deref(),
              city.as_deref(),
              limit_val,
              offset_val,
            ],
            RawLead::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLead::into_lead).collect()
  }

  // ── Categories ────────────────────────────────────────────────────────────

  async fn get_category(&self, key: &str) -> Result<Option<Category>> {
    let key = key.to_owned();

    let category = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT key, name_ru FROM categories WHERE key = ?1",
              rusqlite::params![key],
              |row| {
                Ok(Category { key: row.get(0)?, name_ru: row.get(1)? })
              },
            )
            .optional()?,
        )
      })
      .await?;

    Ok(category)
  }

  async fn list_categories(&self) -> Result<Vec<Category>> {
    let categories = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT key, name_ru FROM categories ORDER BY key")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(Category { key: row.get(0)?, name_ru: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(categories)
  }

  // ── Sessions and audit trail ──────────────────────────────────────────────

  async fn create_session(&self, source: &str) -> Result<ScrapeSession> {
    let session = ScrapeSession {
      session_id:       Uuid::new_v4(),
      source:           source.to_owned(),
      status:           SessionStatus::Started,
      total_scraped:    0,
      new_leads:        0,
      updated_leads:    0,
      errors_count:     0,
      started_at:       Utc::now(),
      completed_at:     None,
      duration_seconds: None,
      error_message:    None,
    };

    let id_str = encode_uuid(session.session_id);
    let source_str = session.source.clone();
    let status_str = encode_status(session.status).to_owned();
    let at_str = encode_dt(session.started_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO scrape_sessions (session_id, source, status, started_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, source_str, status_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(session)
  }

  async fn record_result(
    &self,
    session_id: Uuid,
    lead_id: Uuid,
    action: MergeAction,
    changes: &[String],
  ) -> Result<()> {
    let result_id_str = encode_uuid(Uuid::new_v4());
    let session_id_str = encode_uuid(session_id);
    let lead_id_str = encode_uuid(lead_id);
    let action_str = encode_action(action).to_owned();
    let changes_str = serde_json::to_string(changes)?;
    let at_str = encode_dt(Utc::now());

    let counter = match action {
      MergeAction::Created => "new_leads",
      MergeAction::Updated => "updated_leads",
      MergeAction::Skipped => "errors_count",
    };

    self
      .conn
      .call(move |conn| {
        // Result row and counter bump commit together so the final totals
        // always agree with the audit trail.
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO scrape_results
             (result_id, session_id, lead_id, action, changes, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            result_id_str,
            session_id_str,
            lead_id_str,
            action_str,
            changes_str,
            at_str,
          ],
        )?;
        tx.execute(
          &format!(
            "UPDATE scrape_sessions
             SET total_scraped = total_scraped + 1,
                 {counter} = {counter} + 1
             WHERE session_id = ?1"
          ),
          rusqlite::params![session_id_str],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn record_session_error(&self, session_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(session_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE scrape_sessions
           SET errors_count = errors_count + 1
           WHERE session_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn finish_session(
    &self,
    session_id: Uuid,
    status: SessionStatus,
    error_message: Option<String>,
  ) -> Result<bool> {
    let id_str = encode_uuid(session_id);
    let status_str = encode_status(status).to_owned();
    let now = Utc::now();
    let now_str = encode_dt(now);

    let (exists, updated): (bool, bool) = self
      .conn
      .call(move |conn| {
        let started_at: Option<String> = conn
          .query_row(
            "SELECT started_at FROM scrape_sessions WHERE session_id = ?1",
            rusqlite::params![id_str],
            |row| row.get(0),
          )
          .optional()?;

        let Some(started_at) = started_at else {
          return Ok((false, false));
        };

        let duration = chrono::DateTime::parse_from_rfc3339(&started_at)
          .map(|start| (now - start.with_timezone(&Utc)).num_seconds())
          .unwrap_or(0);

        // Guarded transition: a second finish matches zero rows and is a
        // no-op. Terminal sessions are never mutated.
        let rows = conn.execute(
          "UPDATE scrape_sessions
           SET status = ?2, completed_at = ?3, duration_seconds = ?4,
               error_message = ?5
           WHERE session_id = ?1 AND status = 'started'",
          rusqlite::params![id_str, status_str, now_str, duration, error_message],
        )?;

        Ok((true, rows > 0))
      })
      .await?;

    if !exists {
      return Err(Error::SessionNotFound(session_id));
    }
    Ok(updated)
  }

  async fn get_session(&self, session_id: Uuid) -> Result<Option<ScrapeSession>> {
    let id_str = encode_uuid(session_id);

    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SESSION_COLUMNS} FROM scrape_sessions
                 WHERE session_id = ?1"
              ),
              rusqlite::params![id_str],
              RawSession::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSession::into_session).transpose()
  }

  async fn list_results(&self, session_id: Uuid) -> Result<Vec<ScrapeResult>> {
    let id_str = encode_uuid(session_id);

    let raws: Vec<RawResult> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT result_id, session_id, lead_id, action, changes, created_at
           FROM scrape_results
           WHERE session_id = ?1
           ORDER BY created_at",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawResult::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawResult::into_result).collect()
  }

  async fn latest_session(&self) -> Result<Option<ScrapeSession>> {
    let raw: Option<RawSession> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SESSION_COLUMNS} FROM scrape_sessions
                 ORDER BY started_at DESC LIMIT 1"
              ),
              [],
              RawSession::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSession::into_session).transpose()
  }

  // ── Aggregates ────────────────────────────────────────────────────────────

  async fn stats(&self) -> Result<StoreStats> {
    let stats = self
      .conn
      .call(|conn| {
        let total_active: u32 = conn.query_row(
          "SELECT COUNT(*) FROM leads WHERE is_active = 1",
          [],
          |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
          "SELECT category, COUNT(*) FROM leads
           WHERE is_active = 1 GROUP BY category ORDER BY COUNT(*) DESC",
        )?;
        let by_category = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<(String, u32)>>>()?;

        let mut stmt = conn.prepare(
          "SELECT source, COUNT(*) FROM leads
           WHERE is_active = 1 AND source IS NOT NULL
           GROUP BY source ORDER BY COUNT(*) DESC",
        )?;
        let by_source = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<(String, u32)>>>()?;

        let with_phone: u32 = conn.query_row(
          "SELECT COUNT(*) FROM leads WHERE is_active = 1 AND phone IS NOT NULL",
          [],
          |row| row.get(0),
        )?;
        let with_email: u32 = conn.query_row(
          "SELECT COUNT(*) FROM leads WHERE is_active = 1 AND email IS NOT NULL",
          [],
          |row| row.get(0),
        )?;

        Ok(StoreStats {
          total_active,
          by_category,
          by_source,
          with_phone,
          with_email,
        })
      })
      .await?;

    Ok(stats)
  }
}
