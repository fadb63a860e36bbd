//! SQLite pool and database lifecycle.
//!
//! Every pooled connection runs with foreign keys on and, unless disabled in
//! config, WAL journaling so the scheduler can write while the API reads.

use std::path::Path;
use std::sync::Arc;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{error, info, warn};

use fp_core::config::DatabaseConfig;
use fp_core::error::{FpError, FpResult};

use crate::migrations;
use crate::schema;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Cheaply cloneable handle to the business database.
#[derive(Clone)]
pub struct Database {
    pool: Arc<DbPool>,
}

impl Database {
    /// Open (or create) the database file, then bring the schema and seed
    /// data up to date.
    pub fn init(db_path: &Path, config: &DatabaseConfig) -> FpResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!(path = %db_path.display(), pool_size = config.pool_size, "opening database");

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_customizer(Box::new(Pragmas { wal: config.wal_mode }))
            .build(SqliteConnectionManager::file(db_path))
            .map_err(|e| FpError::Pool(e.to_string()))?;
        let db = Self { pool: Arc::new(pool) };

        if config.integrity_check_on_startup {
            db.run_integrity_check()?;
        }
        db.prepare_schema()?;
        Ok(db)
    }

    fn prepare_schema(&self) -> FpResult<()> {
        let conn = self.conn()?;
        schema::create_tables(&conn)?;
        migrations::run_migrations(&conn)
    }

    pub fn conn(&self) -> FpResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| FpError::Pool(e.to_string()))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// `PRAGMA integrity_check`; anything other than "ok" is an error.
    pub fn run_integrity_check(&self) -> FpResult<()> {
        let result: String = self
            .conn()?
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))
            .map_err(db_err)?;
        if result != "ok" {
            error!("database integrity check failed: {result}");
            return Err(FpError::IntegrityCheck(result));
        }
        info!("database integrity check passed");
        Ok(())
    }

    /// Rows that reference a missing parent, as "table row N -> parent".
    pub fn foreign_key_violations(&self) -> FpResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("PRAGMA foreign_key_check").map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                let table: String = row.get(0)?;
                let rowid: Option<i64> = row.get(1)?;
                let parent: String = row.get(2)?;
                Ok(match rowid {
                    Some(id) => format!("{table} row {id} -> {parent}"),
                    None => format!("{table} -> {parent}"),
                })
            })
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    pub fn journal_mode(&self) -> FpResult<String> {
        self.conn()?
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .map_err(db_err)
    }

    pub fn schema_version(&self) -> FpResult<i32> {
        migrations::schema_version(&*self.conn()?)
    }

    /// Run `f` in a transaction; an `Err` from `f` rolls everything back.
    pub fn transaction<T, F>(&self, f: F) -> FpResult<T>
    where
        F: FnOnce(&Connection) -> FpResult<T>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        let value = f(&tx)?;
        tx.commit().map_err(db_err)?;
        Ok(value)
    }

    pub fn stats(&self) -> FpResult<DatabaseStats> {
        let conn = self.conn()?;
        let count = |table: &str| -> FpResult<i64> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
                .map_err(db_err)
        };

        Ok(DatabaseStats {
            clients: count("clients")?,
            leads: count("leads")?,
            quotes: count("quotes")?,
            jobs: count("jobs")?,
            payments: count("payments")?,
            campaigns: count("automation_campaigns")?,
            sms_logs: count("sms_logs")?,
            staff_members: count("staff_members")?,
            bank_transactions: count("bank_transactions")?,
        })
    }

    /// Drop every table and start again from an empty, seeded schema.
    pub fn reset(&self) -> FpResult<()> {
        warn!("resetting database; all business data will be deleted");
        schema::drop_tables(&*self.conn()?)?;
        self.prepare_schema()?;
        info!("database reset complete");
        Ok(())
    }
}

fn db_err(e: rusqlite::Error) -> FpError {
    FpError::Database(e.to_string())
}

/// Row counts for the business tables.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub clients: i64,
    pub leads: i64,
    pub quotes: i64,
    pub jobs: i64,
    pub payments: i64,
    pub campaigns: i64,
    pub sms_logs: i64,
    pub staff_members: i64,
    pub bank_transactions: i64,
}

impl DatabaseStats {
    /// (table, count) in display order.
    pub fn rows(&self) -> Vec<(&'static str, i64)> {
        vec![
            ("clients", self.clients),
            ("leads", self.leads),
            ("quotes", self.quotes),
            ("jobs", self.jobs),
            ("payments", self.payments),
            ("automation_campaigns", self.campaigns),
            ("sms_logs", self.sms_logs),
            ("staff_members", self.staff_members),
            ("bank_transactions", self.bank_transactions),
        ]
    }
}

impl std::fmt::Display for DatabaseStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (name, count)) in self.rows().into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={count}")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Pragmas {
    wal: bool,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for Pragmas {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        if self.wal {
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        }
        conn.execute_batch(
            "PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;
             PRAGMA synchronous=NORMAL;",
        )
    }
}
