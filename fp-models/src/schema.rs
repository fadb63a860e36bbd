//! Database schema definitions and table creation.
//!
//! Amounts are stored as TEXT decimals so no precision is lost; timestamps are
//! stored in UTC and dates as `YYYY-MM-DD`.

use rusqlite::Connection;
use fp_core::error::{FpError, FpResult};
use tracing::info;

/// Create all database tables and indexes if they do not exist.
pub fn create_tables(conn: &Connection) -> FpResult<()> {
    conn.execute_batch(SCHEMA_SQL)
        .map_err(|e| FpError::Database(format!("failed to create schema: {e}")))?;
    info!("database schema verified");
    Ok(())
}

/// Drop all tables (used for database reset).
pub fn drop_tables(conn: &Connection) -> FpResult<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys=OFF;
         DROP TABLE IF EXISTS bank_transactions;
         DROP TABLE IF EXISTS bank_accounts;
         DROP TABLE IF EXISTS staff_members;
         DROP TABLE IF EXISTS sms_logs;
         DROP TABLE IF EXISTS automation_campaigns;
         DROP TABLE IF EXISTS payments;
         DROP TABLE IF EXISTS job_boms;
         DROP TABLE IF EXISTS jobs;
         DROP TABLE IF EXISTS quotes;
         DROP TABLE IF EXISTS leads;
         DROP TABLE IF EXISTS clients;
         DROP TABLE IF EXISTS schema_version;
         PRAGMA foreign_keys=ON;",
    )
    .map_err(|e| FpError::Database(format!("failed to drop tables: {e}")))?;
    Ok(())
}

/// Complete SQL schema for all tables.
const SCHEMA_SQL: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS clients (
    id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    name                    TEXT NOT NULL,
    first_name              TEXT,
    phone                   TEXT,
    email                   TEXT,
    address                 TEXT,
    client_type             TEXT NOT NULL DEFAULT 'public' CHECK (client_type IN ('public', 'trade')),
    trade_discount_percent  REAL,
    notes                   TEXT,
    created_at              TEXT NOT NULL,
    updated_at              TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_clients_name ON clients(name COLLATE NOCASE);

CREATE TABLE IF NOT EXISTS leads (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    phone           TEXT,
    email           TEXT,
    address         TEXT,
    source          TEXT,
    status          TEXT NOT NULL DEFAULT 'new',
    client_type     TEXT NOT NULL DEFAULT 'public' CHECK (client_type IN ('public', 'trade')),
    client_id       INTEGER REFERENCES clients(id) ON DELETE SET NULL,
    notes           TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_leads_status ON leads(status);

CREATE TABLE IF NOT EXISTS quotes (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    quote_number    TEXT NOT NULL UNIQUE,
    client_id       INTEGER NOT NULL REFERENCES clients(id),
    lead_id         INTEGER REFERENCES leads(id) ON DELETE SET NULL,
    status          TEXT NOT NULL DEFAULT 'draft',
    description     TEXT,
    total_amount    TEXT NOT NULL DEFAULT '0',
    sent_at         TEXT,
    valid_until     TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_quotes_status ON quotes(status);

CREATE TABLE IF NOT EXISTS jobs (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    job_number          TEXT NOT NULL UNIQUE,
    quote_id            INTEGER REFERENCES quotes(id) ON DELETE SET NULL,
    client_id           INTEGER NOT NULL REFERENCES clients(id),
    status              TEXT NOT NULL DEFAULT 'scheduled',
    install_address     TEXT,
    scheduled_date      TEXT,
    installer           TEXT,
    posts_complete      INTEGER NOT NULL DEFAULT 0,
    rails_complete      INTEGER NOT NULL DEFAULT 0,
    panels_complete     INTEGER NOT NULL DEFAULT 0,
    gates_complete      INTEGER NOT NULL DEFAULT 0,
    cleanup_complete    INTEGER NOT NULL DEFAULT 0,
    notes               TEXT,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);

CREATE TABLE IF NOT EXISTS job_boms (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id      INTEGER NOT NULL UNIQUE REFERENCES jobs(id) ON DELETE CASCADE,
    items       TEXT NOT NULL DEFAULT '[]',
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS payments (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    client_id       INTEGER NOT NULL REFERENCES clients(id),
    job_id          INTEGER REFERENCES jobs(id) ON DELETE SET NULL,
    invoice_number  TEXT,
    amount          TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'pending',
    due_date        TEXT NOT NULL,
    paid_at         TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_payments_status ON payments(status);

CREATE TABLE IF NOT EXISTS automation_campaigns (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    name                TEXT NOT NULL,
    trigger_type        TEXT NOT NULL CHECK (trigger_type IN ('payment_due', 'quote_sent', 'new_lead')),
    delay_days          INTEGER NOT NULL DEFAULT 0,
    delay_hours         INTEGER NOT NULL DEFAULT 0,
    send_window         TEXT,
    message_template    TEXT NOT NULL,
    client_type         TEXT,
    is_active           INTEGER NOT NULL DEFAULT 1,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sms_logs (
    id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    direction               TEXT NOT NULL CHECK (direction IN ('outbound', 'inbound')),
    status                  TEXT NOT NULL,
    to_number               TEXT NOT NULL,
    from_number             TEXT,
    body                    TEXT NOT NULL,
    provider_message_id     TEXT,
    error_message           TEXT,
    entity_type             TEXT,
    entity_id               INTEGER,
    campaign_id             INTEGER REFERENCES automation_campaigns(id) ON DELETE SET NULL,
    created_at              TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sms_logs_entity ON sms_logs(entity_type, entity_id, direction);
CREATE INDEX IF NOT EXISTS idx_sms_logs_created_at ON sms_logs(created_at);

CREATE TABLE IF NOT EXISTS staff_members (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    phone           TEXT,
    card_numbers    TEXT NOT NULL DEFAULT '',
    is_active       INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS bank_accounts (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id     TEXT NOT NULL UNIQUE,
    name            TEXT NOT NULL,
    institution     TEXT,
    account_mask    TEXT,
    balance         TEXT,
    currency        TEXT NOT NULL DEFAULT 'AUD',
    last_synced_at  TEXT
);

CREATE TABLE IF NOT EXISTS bank_transactions (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    bank_account_id     INTEGER REFERENCES bank_accounts(id) ON DELETE SET NULL,
    external_id         TEXT UNIQUE,
    posted_on           TEXT NOT NULL,
    description         TEXT NOT NULL,
    amount              TEXT NOT NULL,
    direction           TEXT NOT NULL CHECK (direction IN ('credit', 'debit')),
    card_number         TEXT,
    source              TEXT NOT NULL,
    staff_member_id     INTEGER REFERENCES staff_members(id) ON DELETE SET NULL,
    allocation_status   TEXT NOT NULL DEFAULT 'unallocated',
    created_at          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_bank_transactions_posted_on ON bank_transactions(posted_on);
CREATE INDEX IF NOT EXISTS idx_bank_transactions_staff ON bank_transactions(staff_member_id);
"#;
