//! SQL schema for the Leadline SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Members of each organization. Owned by the account layer; read here for
-- membership checks and the reporting hierarchy.
CREATE TABLE IF NOT EXISTS users (
    id          TEXT PRIMARY KEY,
    org_id      TEXT NOT NULL,
    name        TEXT NOT NULL,
    role        TEXT NOT NULL,     -- 'admin' | 'manager' | 'sales'
    reports_to  TEXT,
    is_active   INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS integrations (
    id            TEXT PRIMARY KEY,
    org_id        TEXT NOT NULL,
    platform      TEXT NOT NULL,
    credentials   TEXT NOT NULL DEFAULT '{}',   -- JSON token blob
    config        TEXT NOT NULL,                -- JSON IntegrationConfig
    is_active     INTEGER NOT NULL DEFAULT 1,
    sync_status   TEXT NOT NULL DEFAULT 'idle', -- 'idle' | 'syncing' | 'error'
    last_sync_at  TEXT,
    error_message TEXT,
    created_by    TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS leads (
    id             TEXT PRIMARY KEY,
    org_id         TEXT NOT NULL,
    external_id    TEXT,
    name           TEXT NOT NULL,
    phone          TEXT,
    phone_digits   TEXT,             -- digits of phone; dedupe prefilter only
    email          TEXT,
    company        TEXT,
    source         TEXT NOT NULL,
    integration_id TEXT REFERENCES integrations(id) ON DELETE SET NULL,
    assigned_to    TEXT,
    created_by     TEXT,
    status         TEXT NOT NULL DEFAULT 'new',
    metadata       TEXT NOT NULL DEFAULT '{\"kind\":\"empty\"}',
    custom_fields  TEXT NOT NULL DEFAULT '{}',
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS leads_org_external_idx
    ON leads(org_id, external_id) WHERE external_id IS NOT NULL;
CREATE INDEX IF NOT EXISTS leads_org_created_idx ON leads(org_id, created_at);
CREATE INDEX IF NOT EXISTS leads_assigned_idx    ON leads(assigned_to);

-- Last write wins per natural key.
CREATE TABLE IF NOT EXISTS assignment_rules (
    id             TEXT PRIMARY KEY,
    org_id         TEXT NOT NULL,
    integration_id TEXT NOT NULL REFERENCES integrations(id) ON DELETE CASCADE,
    external_id    TEXT NOT NULL,
    assigned_to    TEXT NOT NULL,
    is_active      INTEGER NOT NULL DEFAULT 1,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    UNIQUE (org_id, integration_id, external_id)
);

-- Append-only. No UPDATE is ever issued against this table.
CREATE TABLE IF NOT EXISTS sync_logs (
    id             TEXT PRIMARY KEY,
    integration_id TEXT NOT NULL REFERENCES integrations(id) ON DELETE CASCADE,
    sync_type      TEXT NOT NULL,
    status         TEXT NOT NULL,
    leads_created  INTEGER NOT NULL,
    leads_updated  INTEGER NOT NULL,
    error_message  TEXT,
    errors         TEXT NOT NULL DEFAULT '[]',
    created_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS sync_logs_integration_idx
    ON sync_logs(integration_id, created_at);

CREATE TABLE IF NOT EXISTS call_logs (
    id            TEXT PRIMARY KEY,
    org_id        TEXT NOT NULL,
    user_id       TEXT NOT NULL,
    lead_id       TEXT REFERENCES leads(id) ON DELETE SET NULL,
    phone         TEXT NOT NULL,
    direction     TEXT NOT NULL,
    started_at    TEXT NOT NULL,
    duration_secs INTEGER NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS call_logs_window_idx
    ON call_logs(user_id, phone, started_at);

PRAGMA user_version = 1;
";
