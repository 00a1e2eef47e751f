//! Raw-record normalization and identity resolution.
//!
//! Source adapters emit loosely-typed [`RawRecord`] maps; nothing outside
//! this module ever sees that heterogeneity. [`NormalizedRecord::from_raw`]
//! maps a raw record into the canonical shape, [`dedup_key`] computes the
//! content-addressed identity fingerprint used to merge sightings of the
//! same real-world business.
//!
//! Everything here is pure computation — no I/O, no clock.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Belarus country calling code.
const COUNTRY_CODE: &str = "375";
/// Domestic trunk prefix replaced by the country code.
const TRUNK_PREFIX: &str = "80";

/// The permissive per-source record shape. Adapters may put anything here;
/// the normalizer reads fields best-effort.
pub type RawRecord = serde_json::Map<String, Value>;

// ─── Phone normalization ─────────────────────────────────────────────────────

/// Canonicalise a phone number to `+375…` format, best-effort.
///
/// Strips all non-digit characters, then:
/// - digits starting with `375` get a `+` prefix;
/// - digits starting with the trunk prefix `80` have it replaced by `+375`;
/// - exactly nine digits (a bare subscriber number) are prefixed `+375`;
/// - anything else is returned unchanged. Never fails.
pub fn normalize_phone(phone: &str) -> String {
  let digits: String = phone.chars().filter(char::is_ascii_digit).collect();

  if digits.starts_with(COUNTRY_CODE) {
    format!("+{digits}")
  } else if let Some(rest) = digits.strip_prefix(TRUNK_PREFIX) {
    format!("+{COUNTRY_CODE}{rest}")
  } else if digits.len() == 9 {
    format!("+{COUNTRY_CODE}{digits}")
  } else {
    phone.to_owned()
  }
}

// ─── Social-link extraction ──────────────────────────────────────────────────

/// Social handles pulled out of a raw record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SocialLinks {
  pub instagram: Option<String>,
  pub facebook:  Option<String>,
  pub vk:        Option<String>,
  pub telegram:  Option<String>,
}

/// Scan all string-valued fields and classify them by platform.
///
/// Explicitly-named fields (`instagram`, `facebook`, `vk`, `telegram`) win;
/// remaining platforms are filled by a heuristic scan over every other
/// string value — a platform's distinctive URL fragment, or a leading `@`
/// for a bare Instagram handle. First match per platform wins.
///
/// Known limitation: the scan can mis-classify fields (a website column
/// pointing at instagram.com becomes the instagram handle, a `@handle` in
/// any field is taken as Instagram). That is accepted behaviour inherited
/// from the sources' own messiness, not something to silently correct.
pub fn extract_social_links(raw: &RawRecord) -> SocialLinks {
  let mut socials = SocialLinks {
    instagram: get_str(raw, "instagram"),
    facebook:  get_str(raw, "facebook"),
    vk:        get_str(raw, "vk"),
    telegram:  get_str(raw, "telegram"),
  };

  for (key, value) in raw {
    if matches!(key.as_str(), "instagram" | "facebook" | "vk" | "telegram") {
      continue;
    }
    let Some(value) = value.as_str() else { continue };
    let lower = value.to_lowercase();

    if socials.instagram.is_none()
      && (lower.contains("instagram.com") || lower.starts_with('@'))
    {
      socials.instagram = Some(value.to_owned());
    } else if socials.facebook.is_none()
      && (lower.contains("facebook.com") || lower.contains("fb.com"))
    {
      socials.facebook = Some(value.to_owned());
    } else if socials.vk.is_none() && lower.contains("vk.com") {
      socials.vk = Some(value.to_owned());
    } else if socials.telegram.is_none()
      && (lower.contains("t.me") || lower.contains("telegram"))
    {
      socials.telegram = Some(value.to_owned());
    }
  }

  socials
}

// ─── Normalized record ───────────────────────────────────────────────────────

/// The canonical record shape every adapter output is reduced to before it
/// touches identity resolution or the merge engine.
#[derive(Debug, Clone)]
pub struct NormalizedRecord {
  pub name:     String,
  pub address:  Option<String>,
  pub city:     Option<String>,
  pub district: Option<String>,

  pub phone:   Option<String>,
  pub email:   Option<String>,
  pub website: Option<String>,

  pub socials: SocialLinks,

  pub latitude:  Option<f64>,
  pub longitude: Option<f64>,

  pub rating:        Option<f64>,
  pub reviews_count: Option<u32>,

  pub source:     Option<String>,
  pub source_id:  Option<String>,
  pub source_url: Option<String>,

  /// Opaque copy of the original payload, retained for audit.
  pub raw: Value,
}

impl NormalizedRecord {
  /// Normalize one raw record, or `None` if it carries no usable name.
  ///
  /// Callers must drop the `None` case before identity resolution — an
  /// unnamed record must never create a lead.
  pub fn from_raw(raw: &RawRecord) -> Option<Self> {
    let name = get_str(raw, "name")?;

    Some(Self {
      name,
      address: get_str(raw, "address"),
      city: get_str(raw, "city"),
      district: get_str(raw, "district"),
      phone: get_str(raw, "phone").map(|p| normalize_phone(&p)),
      email: get_str(raw, "email"),
      website: get_str(raw, "website"),
      socials: extract_social_links(raw),
      latitude: get_f64(raw, "latitude"),
      longitude: get_f64(raw, "longitude"),
      rating: get_f64(raw, "rating"),
      reviews_count: get_u32(raw, "reviews_count"),
      source: get_str(raw, "source"),
      source_id: get_str(raw, "source_id"),
      source_url: get_str(raw, "source_url"),
      raw: Value::Object(raw.clone()),
    })
  }
}

// ─── Identity resolution ─────────────────────────────────────────────────────

/// Compute the deduplication key for a normalized record.
///
/// Priority order, first satisfied branch wins:
/// 1. normalized phone number;
/// 2. lower-cased, trimmed name + address (both required);
/// 3. source label + source-native identifier;
/// 4. the empty string — a known degenerate case in which every
///    component-less record collapses into one identity. Kept as-is; the
///    branch logs a warning when taken.
///
/// The key is the lowercase hex SHA-256 of the pipe-joined components, so
/// identical inputs always produce identical keys. Like any fingerprint of
/// partial data it can over-merge (a phone number shared by two businesses)
/// and under-merge (one business with a different number per source); both
/// are documented behaviour.
pub fn dedup_key(record: &NormalizedRecord) -> String {
  let components: Vec<String> = if let Some(phone) = &record.phone {
    vec![phone.clone()]
  } else if let Some(address) = &record.address {
    // Name is guaranteed non-empty by `NormalizedRecord::from_raw`, so this
    // branch only gates on the address.
    vec![
      record.name.trim().to_lowercase(),
      address.trim().to_lowercase(),
    ]
  } else if record.source.is_some() || record.source_id.is_some() {
    vec![
      record.source.clone().unwrap_or_default(),
      record.source_id.clone().unwrap_or_default(),
    ]
  } else {
    tracing::warn!(
      name = %record.name,
      "record has no phone, address, or source id; using degenerate identity key"
    );
    vec![]
  };

  let mut hasher = Sha256::new();
  hasher.update(components.join("|").as_bytes());
  hex::encode(hasher.finalize())
}

// ─── Field accessors ─────────────────────────────────────────────────────────

fn get_str(raw: &RawRecord, key: &str) -> Option<String> {
  raw
    .get(key)
    .and_then(Value::as_str)
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_owned)
}

fn get_f64(raw: &RawRecord, key: &str) -> Option<f64> {
  raw.get(key).and_then(Value::as_f64)
}

fn get_u32(raw: &RawRecord, key: &str) -> Option<u32> {
  raw
    .get(key)
    .and_then(Value::as_u64)
    .and_then(|n| u32::try_from(n).ok())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
