//! SQL schema for the Refuge SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Each row stores the full record as JSON. The other columns duplicate the
/// fields list queries filter on.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS residents (
    resident_id   TEXT PRIMARY KEY,
    variant       TEXT NOT NULL,               -- 'human' | 'cat' | 'dog'
    is_archived   INTEGER NOT NULL DEFAULT 0,
    family_id     TEXT,
    registered_at TEXT NOT NULL,               -- RFC 3339 UTC
    data_json     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS labels (
    label_id  TEXT PRIMARY KEY,
    automatic INTEGER NOT NULL,
    data_json TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS residents_variant_idx  ON residents(variant);
CREATE INDEX IF NOT EXISTS residents_archived_idx ON residents(is_archived);
CREATE INDEX IF NOT EXISTS residents_family_idx   ON residents(family_id);

PRAGMA user_version = 1;
";
