//! SQL schema for the Memora SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Memorials are immutable once inserted.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS memorials (
    memorial_id       TEXT PRIMARY KEY,
    owner_id          TEXT NOT NULL,
    first_name        TEXT NOT NULL,
    last_name         TEXT NOT NULL,
    first_name_norm   TEXT NOT NULL,   -- normalize(first_name); candidate search
    last_name_norm    TEXT NOT NULL,   -- normalize(last_name); candidate search
    birth_date        TEXT,            -- YYYY-MM-DD
    death_date        TEXT NOT NULL,   -- YYYY-MM-DD
    birth_place       TEXT,
    death_place       TEXT,
    father_name       TEXT,
    mother_name       TEXT,
    living_profile_id TEXT UNIQUE,     -- at most one memorial per living profile
    created_at        TEXT NOT NULL    -- ISO 8601 UTC; server-assigned
);

CREATE TABLE IF NOT EXISTS living_profiles (
    profile_id          TEXT PRIMARY KEY,
    owner_id            TEXT NOT NULL UNIQUE,
    first_name          TEXT NOT NULL,
    last_name           TEXT NOT NULL,
    birth_date          TEXT NOT NULL,
    birth_place         TEXT,
    father_name         TEXT,
    mother_name         TEXT,
    biography           TEXT,
    images              TEXT NOT NULL DEFAULT '[]',
    status              TEXT NOT NULL DEFAULT 'draft'
                        CHECK (status IN ('draft', 'active', 'converted')),
    family_members      TEXT NOT NULL DEFAULT '[]',   -- JSON array
    activation_settings TEXT NOT NULL DEFAULT '{}',   -- JSON object

    -- Written once, on conversion.
    memorial_id         TEXT,
    death_date          TEXT,
    activated_at        TEXT,
    activated_by        TEXT,

    -- Activation claim; never part of the aggregate.
    activation_claim    TEXT,
    claimed_at          INTEGER,                      -- unix millis

    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL,
    version             INTEGER NOT NULL DEFAULT 0,

    CHECK ((status = 'converted') = (memorial_id IS NOT NULL))
);

CREATE INDEX IF NOT EXISTS memorials_first_norm_idx ON memorials(first_name_norm);
CREATE INDEX IF NOT EXISTS memorials_last_norm_idx  ON memorials(last_name_norm);

PRAGMA user_version = 1;
";
