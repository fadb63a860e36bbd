//! Integration tests for the data layer.
//!
//! Tests database creation, WAL mode, schema and seed data, constraint
//! mapping, transactions, reset and integrity checks.

mod common;

use rust_decimal_macros::dec;

use fp_core::constants::DB_SCHEMA_VERSION;
use fp_core::error::FpError;
use fp_models::{Campaign, Client, Payment, Quote};

// ---- Initialization ----

#[test]
fn database_init_creates_file_and_wal_mode() {
    let (db, dir) = common::create_test_db();
    assert!(dir.path().join("test.db").exists());

    let conn = db.conn().unwrap();
    let journal_mode: String = conn
        .query_row("PRAGMA journal_mode", [], |row| row.get(0))
        .unwrap();
    assert_eq!(journal_mode.to_lowercase(), "wal");

    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 1);
}

#[test]
fn database_init_creates_all_tables() {
    let (db, _dir) = common::create_test_db();
    let conn = db.conn().unwrap();

    for table in [
        "schema_version",
        "clients",
        "leads",
        "quotes",
        "jobs",
        "job_boms",
        "payments",
        "automation_campaigns",
        "sms_logs",
        "staff_members",
        "bank_accounts",
        "bank_transactions",
    ] {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1, "table {table} should exist");
    }

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, DB_SCHEMA_VERSION);
}

#[test]
fn seeded_campaigns_start_disabled() {
    let (db, _dir) = common::create_test_db();
    let conn = db.conn().unwrap();

    let campaigns = Campaign::load_all(&conn).unwrap();
    assert_eq!(campaigns.len(), 3);
    assert!(campaigns.iter().all(|c| !c.is_active));
    assert!(Campaign::load_active(&conn).unwrap().is_empty());
}

#[test]
fn reopening_does_not_reseed() {
    let (db, dir) = common::create_test_db();
    drop(db);

    let db = fp_models::Database::init(
        &dir.path().join("test.db"),
        &fp_core::config::DatabaseConfig::default(),
    )
    .unwrap();
    assert_eq!(db.stats().unwrap().campaigns, 3);
}

// ---- Constraints ----

#[test]
fn deleting_a_client_with_quotes_is_rejected() {
    let (db, _dir) = common::create_test_db();
    let client_id = common::seed_client(&db, "Jane Citizen", Some("0412 000 001"), "public");
    let conn = db.conn().unwrap();
    Quote::new(client_id, dec!(4850)).save(&conn).unwrap();

    let err = Client::delete(&conn, client_id).unwrap_err();
    assert!(matches!(err, FpError::Validation(_)), "got {err:?}");
    assert!(Client::get(&conn, client_id).is_ok());
}

#[test]
fn duplicate_quote_number_is_a_conflict() {
    let (db, _dir) = common::create_test_db();
    let client_id = common::seed_client(&db, "Jane Citizen", None, "public");
    let conn = db.conn().unwrap();

    let mut first = Quote::new(client_id, dec!(100));
    first.quote_number = "Q-00042".into();
    first.save(&conn).unwrap();

    let mut second = Quote::new(client_id, dec!(200));
    second.quote_number = "Q-00042".into();
    let err = second.save(&conn).unwrap_err();
    assert!(matches!(err, FpError::Conflict(_)), "got {err:?}");
}

// ---- Transactions ----

#[test]
fn failed_transaction_rolls_back() {
    let (db, _dir) = common::create_test_db();
    let client_id = common::seed_client(&db, "Jane Citizen", None, "public");

    let result: Result<(), FpError> = db.transaction(|conn| {
        Payment::new(client_id, dec!(500), chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
            .save(conn)?;
        Err(FpError::Validation("abort".into()))
    });
    assert!(result.is_err());
    assert_eq!(db.stats().unwrap().payments, 0);
}

// ---- Lifecycle ----

#[test]
fn reset_clears_data_and_reseeds() {
    let (db, _dir) = common::create_test_db();
    common::seed_client(&db, "Jane Citizen", None, "public");
    assert_eq!(db.stats().unwrap().clients, 1);

    db.reset().unwrap();

    let stats = db.stats().unwrap();
    assert_eq!(stats.clients, 0);
    assert_eq!(stats.campaigns, 3);
}

#[test]
fn integrity_check_passes_on_fresh_db() {
    let (db, _dir) = common::create_test_db();
    db.run_integrity_check().unwrap();
}

#[test]
fn stats_rows_cover_every_business_table() {
    let (db, _dir) = common::create_test_db();
    let rows = db.stats().unwrap().rows();
    assert_eq!(rows.len(), 9);
    assert!(rows.iter().any(|(name, _)| *name == "bank_transactions"));
}
