//! SQL schema for the newsdesk SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS sources (
    source_id     TEXT PRIMARY KEY,
    topic         TEXT NOT NULL,        -- 'ecom' | 'it' | 'o&g'
    url           TEXT NOT NULL UNIQUE,
    domain        TEXT,
    title         TEXT NOT NULL,
    excerpt       TEXT,
    content       TEXT,
    published_at  TEXT,
    event_at      TEXT,
    language      TEXT,
    author        TEXT,
    fetched_at    TEXT NOT NULL,
    title_hash    TEXT,
    content_hash  TEXT,
    simhash       TEXT,
    normalized_at TEXT
);

CREATE TABLE IF NOT EXISTS facts (
    fact_id     TEXT PRIMARY KEY,
    source_id   TEXT NOT NULL REFERENCES sources(source_id) ON DELETE CASCADE,
    position    INTEGER NOT NULL,
    quote       TEXT NOT NULL,
    claim       TEXT,
    entities    TEXT NOT NULL DEFAULT '{}',
    confidence  REAL NOT NULL CHECK (confidence >= 0 AND confidence <= 1)
);

CREATE TABLE IF NOT EXISTS analyses (
    analysis_id   TEXT PRIMARY KEY,
    topic         TEXT NOT NULL,
    items         TEXT NOT NULL,        -- {\"source_ids\": [...]}
    thesis        TEXT,
    impact_market TEXT,
    winners       TEXT,
    losers        TEXT,
    scenarios     TEXT NOT NULL DEFAULT '[]',
    risks         TEXT NOT NULL DEFAULT '[]',
    confidence    REAL,
    created_at    TEXT NOT NULL
);

-- At most one verification per analysis; rows are never updated.
CREATE TABLE IF NOT EXISTS verifications (
    verification_id   TEXT PRIMARY KEY,
    analysis_id       TEXT NOT NULL UNIQUE
                      REFERENCES analyses(analysis_id) ON DELETE CASCADE,
    checks            TEXT NOT NULL,
    reliability_score REAL NOT NULL
                      CHECK (reliability_score >= 0 AND reliability_score <= 100),
    issues            TEXT NOT NULL DEFAULT '[]',
    status            TEXT NOT NULL,    -- 'passed' | 'flagged' | 'failed'
    created_at        TEXT NOT NULL
);

-- At most one post per analysis.
CREATE TABLE IF NOT EXISTS posts (
    post_id           TEXT PRIMARY KEY,
    analysis_id       TEXT NOT NULL UNIQUE REFERENCES analyses(analysis_id),
    slug              TEXT NOT NULL UNIQUE,
    topic             TEXT NOT NULL,
    title             TEXT NOT NULL,
    body_html         TEXT NOT NULL,
    summary           TEXT NOT NULL,
    seo               TEXT NOT NULL,
    sources           TEXT NOT NULL DEFAULT '[]',
    reliability_score REAL NOT NULL,
    status            TEXT NOT NULL,    -- 'draft' | 'in_review' | 'approved' | 'published'
    cms_id            TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

-- Append-only; rows disappear only with their post.
CREATE TABLE IF NOT EXISTS audit_log (
    audit_id TEXT PRIMARY KEY,
    post_id  TEXT NOT NULL REFERENCES posts(post_id) ON DELETE CASCADE,
    actor    TEXT NOT NULL,
    action   TEXT NOT NULL,
    diff     TEXT NOT NULL DEFAULT '{}',
    at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS sources_topic_fetched_idx ON sources(topic, fetched_at);
CREATE INDEX IF NOT EXISTS facts_source_idx          ON facts(source_id, position);
CREATE INDEX IF NOT EXISTS posts_status_created_idx  ON posts(status, created_at);
CREATE INDEX IF NOT EXISTS audit_post_idx            ON audit_log(post_id, at);

PRAGMA user_version = 1;
";
