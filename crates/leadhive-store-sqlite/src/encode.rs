//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. The raw payload snapshot
//! and the per-result changes list are stored as compact JSON. UUIDs are
//! stored as hyphenated lowercase strings.

use chrono::{DateTime, Utc};
use leadhive_core::{
  lead::Lead,
  session::{MergeAction, ScrapeResult, ScrapeSession, SessionStatus},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── SessionStatus ───────────────────────────────────────────────────────────

pub fn encode_status(s: SessionStatus) -> &'static str {
  match s {
    SessionStatus::Started => "started",
    SessionStatus::Completed => "completed",
    SessionStatus::Failed => "failed",
  }
}

pub fn decode_status(s: &str) -> Result<SessionStatus> {
  match s {
    "started" => Ok(SessionStatus::Started),
    "completed" => Ok(SessionStatus::Completed),
    "failed" => Ok(SessionStatus::Failed),
    other => Err(Error::Decode(format!("unknown session status: {other:?}"))),
  }
}

// ─── MergeAction ─────────────────────────────────────────────────────────────

pub fn encode_action(a: MergeAction) -> &'static str {
  match a {
    MergeAction::Created => "created",
    MergeAction::Updated => "updated",
    MergeAction::Skipped => "skipped",
  }
}

pub fn decode_action(s: &str) -> Result<MergeAction> {
  match s {
    "created" => Ok(MergeAction::Created),
    "updated" => Ok(MergeAction::Updated),
    "skipped" => Ok(MergeAction::Skipped),
    other => Err(Error::Decode(format!("unknown merge action: {other:?}"))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `leads` row.
pub struct RawLead {
  pub lead_id:         String,
  pub name:            String,
  pub address:         Option<String>,
  pub city:            Option<String>,
  pub district:        Option<String>,
  pub phone:           Option<String>,
  pub email:           Option<String>,
  pub website:         Option<String>,
  pub instagram:       Option<String>,
  pub facebook:        Option<String>,
  pub vk:              Option<String>,
  pub telegram:        Option<String>,
  pub category:        String,
  pub latitude:        Option<f64>,
  pub longitude:       Option<f64>,
  pub rating:          Option<f64>,
  pub reviews_count:   u32,
  pub source:          Option<String>,
  pub source_id:       Option<String>,
  pub source_url:      Option<String>,
  pub raw_data:        Option<String>,
  pub dedup_key:       String,
  pub is_active:       bool,
  pub created_at:      String,
  pub updated_at:      String,
  pub last_scraped_at: Option<String>,
}

impl RawLead {
  /// Read all lead columns, in [`LEAD_COLUMNS`] order, starting at index 0.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      lead_id:         row.get(0)?,
      name:            row.get(1)?,
      address:         row.get(2)?,
      city:            row.get(3)?,
      district:        row.get(4)?,
      phone:           row.get(5)?,
      email:           row.get(6)?,
      website:         row.get(7)?,
      instagram:       row.get(8)?,
      facebook:        row.get(9)?,
      vk:              row.get(10)?,
      telegram:        row.get(11)?,
      category:        row.get(12)?,
      latitude:        row.get(13)?,
      longitude:       row.get(14)?,
      rating:          row.get(15)?,
      reviews_count:   row.get(16)?,
      source:          row.get(17)?,
      source_id:       row.get(18)?,
      source_url:      row.get(19)?,
      raw_data:        row.get(20)?,
      dedup_key:       row.get(21)?,
      is_active:       row.get(22)?,
      created_at:      row.get(23)?,
      updated_at:      row.get(24)?,
      last_scraped_at: row.get(25)?,
    })
  }

  pub fn into_lead(self) -> Result<Lead> {
    let raw_data = self
      .raw_data
      .as_deref()
      .map(serde_json::from_str)
      .transpose()?;

    Ok(Lead {
      lead_id: decode_uuid(&self.lead_id)?,
      name: self.name,
      address: self.address,
      city: self.city,
      district: self.district,
      phone: self.phone,
      email: self.email,
      website: self.website,
      instagram: self.instagram,
      facebook: self.facebook,
      vk: self.vk,
      telegram: self.telegram,
      category: self.category,
      latitude: self.latitude,
      longitude: self.longitude,
      rating: self.rating,
      reviews_count: self.reviews_count,
      source: self.source,
      source_id: self.source_id,
      source_url: self.source_url,
      raw_data,
      dedup_key: self.dedup_key,
      is_active: self.is_active,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      last_scraped_at: self
        .last_scraped_at
        .as_deref()
        .map(decode_dt)
        .transpose()?,
    })
  }
}

/// Column list matching [`RawLead::from_row`]; keep the two in sync.
pub const LEAD_COLUMNS: &str = "lead_id, name, address, city, district, \
   phone, email, website, instagram, facebook, vk, telegram, category, \
   latitude, longitude, rating, reviews_count, source, source_id, \
   source_url, raw_data, dedup_key, is_active, created_at, updated_at, \
   last_scraped_at";

/// Raw strings read directly from a `scrape_sessions` row.
pub struct RawSession {
  pub session_id:       String,
  pub source:           String,
  pub status:           String,
  pub total_scraped:    u32,
  pub new_leads:        u32,
  pub updated_leads:    u32,
  pub errors_count:     u32,
  pub started_at:       String,
  pub completed_at:     Option<String>,
  pub duration_seconds: Option<i64>,
  pub error_message:    Option<String>,
}

impl RawSession {
  /// Read all session columns, in [`SESSION_COLUMNS`] order.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      session_id:       row.get(0)?,
      source:           row.get(1)?,
      status:           row.get(2)?,
      total_scraped:    row.get(3)?,
      new_leads:        row.get(4)?,
      updated_leads:    row.get(5)?,
      errors_count:     row.get(6)?,
      started_at:       row.get(7)?,
      completed_at:     row.get(8)?,
      duration_seconds: row.get(9)?,
      error_message:    row.get(10)?,
    })
  }

  pub fn into_session(self) -> Result<ScrapeSession> {
    Ok(ScrapeSession {
      session_id: decode_uuid(&self.session_id)?,
      source: self.source,
      status: decode_status(&self.status)?,
      total_scraped: self.total_scraped,
      new_leads: self.new_leads,
      updated_leads: self.updated_leads,
      errors_count: self.errors_count,
      started_at: decode_dt(&self.started_at)?,
      completed_at: self.completed_at.as_deref().map(decode_dt).transpose()?,
      duration_seconds: self.duration_seconds,
      error_message: self.error_message,
    })
  }
}

/// Column list matching [`RawSession::from_row`]; keep the two in sync.
pub const SESSION_COLUMNS: &str = "session_id, source, status, \
   total_scraped, new_leads, updated_leads, errors_count, started_at, \
   completed_at, duration_seconds, error_message";

/// Raw strings read directly from a `scrape_results` row.
pub struct RawResult {
  pub result_id:  String,
  pub session_id: String,
  pub lead_id:    String,
  pub action:     String,
  pub changes:    String,
  pub created_at: String,
}

impl RawResult {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      result_id:  row.get(0)?,
      session_id: row.get(1)?,
      lead_id:    row.get(2)?,
      action:     row.get(3)?,
      changes:    row.get(4)?,
      created_at: row.get(5)?,
    })
  }

  pub fn into_result(self) -> Result<ScrapeResult> {
    Ok(ScrapeResult {
      result_id:  decode_uuid(&self.result_id)?,
      session_id: decode_uuid(&self.session_id)?,
      lead_id:    decode_uuid(&self.lead_id)?,
      action:     decode_action(&self.action)?,
      changes:    serde_json::from_str(&self.changes)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
