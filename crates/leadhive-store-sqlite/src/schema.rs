//! SQL schema for the leadhive SQLite store.
//!
//! Executed once at connection startup; idempotent thanks to
//! `CREATE TABLE IF NOT EXISTS` and `INSERT OR IGNORE`. Future migrations
//! will be gated on `PRAGMA user_version`.

/// Full schema DDL plus the seeded category reference data.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- The ten fixed service niches. Reference data; never mutated at runtime.
CREATE TABLE IF NOT EXISTS categories (
    key      TEXT PRIMARY KEY,
    name_ru  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS leads (
    lead_id         TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    address         TEXT,
    city            TEXT,
    district        TEXT,
    phone           TEXT,
    email           TEXT,
    website         TEXT,
    instagram       TEXT,
    facebook        TEXT,
    vk              TEXT,
    telegram        TEXT,
    category        TEXT NOT NULL REFERENCES categories(key),
    latitude        REAL,
    longitude       REAL,
    rating          REAL,
    reviews_count   INTEGER NOT NULL DEFAULT 0,
    source          TEXT,
    source_id       TEXT,
    source_url      TEXT,
    raw_data        TEXT,            -- JSON snapshot of the raw payload
    dedup_key       TEXT NOT NULL,   -- SHA-256 hex identity fingerprint
    is_active       INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL,   -- ISO 8601 UTC; server-assigned
    updated_at      TEXT NOT NULL,
    last_scraped_at TEXT
);

CREATE TABLE IF NOT EXISTS scrape_sessions (
    session_id       TEXT PRIMARY KEY,
    source           TEXT NOT NULL,
    status           TEXT NOT NULL DEFAULT 'started',  -- started | completed | failed
    total_scraped    INTEGER NOT NULL DEFAULT 0,
    new_leads        INTEGER NOT NULL DEFAULT 0,
    updated_leads    INTEGER NOT NULL DEFAULT 0,
    errors_count     INTEGER NOT NULL DEFAULT 0,
    started_at       TEXT NOT NULL,
    completed_at     TEXT,
    duration_seconds INTEGER,
    error_message    TEXT
);

-- Append-only audit trail. No UPDATE or DELETE is ever issued here.
CREATE TABLE IF NOT EXISTS scrape_results (
    result_id   TEXT PRIMARY KEY,
    session_id  TEXT NOT NULL REFERENCES scrape_sessions(session_id),
    lead_id     TEXT NOT NULL REFERENCES leads(lead_id),
    action      TEXT NOT NULL,            -- created | updated | skipped
    changes     TEXT NOT NULL DEFAULT '[]',
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS leads_name_idx     ON leads(name);
CREATE INDEX IF NOT EXISTS leads_phone_idx    ON leads(phone);
CREATE INDEX IF NOT EXISTS leads_category_idx ON leads(category);
CREATE INDEX IF NOT EXISTS leads_city_idx     ON leads(city);
CREATE INDEX IF NOT EXISTS leads_source_idx   ON leads(source);

-- At most one active lead per identity key.
CREATE UNIQUE INDEX IF NOT EXISTS leads_dedup_idx
    ON leads(dedup_key) WHERE is_active = 1;

CREATE INDEX IF NOT EXISTS sessions_source_idx  ON scrape_sessions(source);
CREATE INDEX IF NOT EXISTS sessions_status_idx  ON scrape_sessions(status);
CREATE INDEX IF NOT EXISTS sessions_started_idx ON scrape_sessions(started_at);

CREATE INDEX IF NOT EXISTS results_session_idx ON scrape_results(session_id);
CREATE INDEX IF NOT EXISTS results_lead_idx    ON scrape_results(lead_id);

INSERT OR IGNORE INTO categories (key, name_ru) VALUES
    ('auto_service', 'СТО/детейлинг/шиномонтаж'),
    ('handyman',     'Мастер на час / электрик / сантехник'),
    ('cleaning',     'Клининговые услуги'),
    ('moving',       'Грузоперевозки/переезды'),
    ('education',    'Учителя/репетиторы/курсы'),
    ('fitness',      'Фитнес/йога/танцы/ЕМС-студии'),
    ('photo_video',  'Фото/видео-студии, фотографы'),
    ('legal',        'Нотариус/юристы/консалтинг'),
    ('psychology',   'Психологи/коучи'),
    ('tattoo',       'Тату/перманент/пирсинг');

PRAGMA user_version = 1;
";
