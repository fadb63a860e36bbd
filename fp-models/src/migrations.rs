//! Versioned data migrations.
//!
//! Tables are created by [`crate::schema`]; the steps here move data and seed
//! rows. Each step runs inside its own savepoint and bumps `schema_version`
//! only when it commits.

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::info;

use fp_core::constants::DB_SCHEMA_VERSION;
use fp_core::error::{FpError, FpResult};

struct Migration {
    version: i32,
    description: &'static str,
    apply: fn(&Connection) -> FpResult<()>,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "seed default campaigns",
    apply: seed_default_campaigns,
}];

/// Apply every step newer than the stored version.
pub fn run_migrations(conn: &Connection) -> FpResult<()> {
    let from = schema_version(conn)?;
    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|m| m.version > from && m.version <= DB_SCHEMA_VERSION)
        .collect();

    if pending.is_empty() {
        info!("database schema is up to date (version {from})");
        return Ok(());
    }

    for step in pending {
        info!("migration {}: {}", step.version, step.description);
        let tx = conn.unchecked_transaction().map_err(migration_err)?;
        (step.apply)(&tx)?;
        tx.execute("DELETE FROM schema_version", []).map_err(migration_err)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [step.version])
            .map_err(migration_err)?;
        tx.commit().map_err(migration_err)?;
    }

    info!("schema at version {}", schema_version(conn)?);
    Ok(())
}

/// Stored schema version; 0 for a database no step has touched.
pub fn schema_version(conn: &Connection) -> FpResult<i32> {
    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| row.get(0))
        .map_err(migration_err)
}

fn migration_err(e: rusqlite::Error) -> FpError {
    FpError::Migration(e.to_string())
}

/// Campaigns start switched off so nothing is texted until the office has
/// reviewed the wording.
fn seed_default_campaigns(conn: &Connection) -> FpResult<()> {
    let existing: i64 = conn
        .query_row("SELECT COUNT(*) FROM automation_campaigns", [], |row| row.get(0))
        .map_err(migration_err)?;
    if existing > 0 {
        return Ok(());
    }

    let now = Utc::now();
    let mut insert = conn
        .prepare(
            "INSERT INTO automation_campaigns (
                name, trigger_type, delay_days, delay_hours, send_window,
                message_template, client_type, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, 0, ?7, ?7)",
        )
        .map_err(migration_err)?;
    for seed in DEFAULT_CAMPAIGNS {
        insert
            .execute(params![
                seed.name,
                seed.trigger,
                seed.delay_days,
                seed.delay_hours,
                seed.window,
                seed.template,
                now
            ])
            .map_err(migration_err)?;
    }

    info!("seeded {} default campaigns", DEFAULT_CAMPAIGNS.len());
    Ok(())
}

struct CampaignSeed {
    name: &'static str,
    trigger: &'static str,
    delay_days: i64,
    delay_hours: i64,
    window: &'static str,
    template: &'static str,
}

const DEFAULT_CAMPAIGNS: &[CampaignSeed] = &[
    CampaignSeed {
        name: "Payment reminder",
        trigger: "payment_due",
        delay_days: 1,
        delay_hours: 0,
        window: "09:00-17:00",
        template: "Hi {firstName}, a friendly reminder that invoice {invoiceNumber} for {amount} was due on {dueDate}. Thanks, {companyName}",
    },
    CampaignSeed {
        name: "Quote follow-up",
        trigger: "quote_sent",
        delay_days: 3,
        delay_hours: 0,
        window: "09:00-17:00",
        template: "Hi {firstName}, just checking in on quote {quoteNumber} for {amount}. Any questions, reply here. {companyName}",
    },
    CampaignSeed {
        name: "New lead welcome",
        trigger: "new_lead",
        delay_days: 0,
        delay_hours: 1,
        window: "08:00-18:00",
        template: "Hi {firstName}, thanks for your enquiry with {companyName}. We'll be in touch shortly to book a measure and quote.",
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    fn fresh() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        conn
    }

    #[test]
    fn test_fresh_db_reaches_latest_version() {
        let conn = fresh();
        assert_eq!(schema_version(&conn).unwrap(), 0);
        run_migrations(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), DB_SCHEMA_VERSION);

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let conn = fresh();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        let campaigns: i64 = conn
            .query_row("SELECT COUNT(*) FROM automation_campaigns", [], |row| row.get(0))
            .unwrap();
        assert_eq!(campaigns, 3);
    }

    #[test]
    fn test_default_campaigns_seeded_inactive() {
        let conn = fresh();
        run_migrations(&conn).unwrap();

        let (total, active): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(is_active), 0) FROM automation_campaigns",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(active, 0);
    }

    #[test]
    fn test_steps_are_ordered_and_within_latest() {
        let versions: Vec<i32> = MIGRATIONS.iter().map(|m| m.version).collect();
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(versions.last().copied(), Some(DB_SCHEMA_VERSION));
    }
}
