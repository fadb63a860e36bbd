//! Payment (invoice instalment) entity model.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use rusqlite::{params, Connection, Row};
use fp_core::constants::entity;
use fp_core::error::{FpError, FpResult};

use crate::sql::{db_err, get_decimal, optional};

/// Payment status values.
pub mod status {
    pub const PENDING: &str = "pending";
    pub const PAID: &str = "paid";
    pub const OVERDUE: &str = "overdue";
    pub const CANCELLED: &str = "cancelled";

    pub const ALL: &[&str] = &[PENDING, PAID, OVERDUE, CANCELLED];
}

/// An amount owed by a client, typically a deposit or final invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(default)]
    pub id: Option<i64>,
    pub client_id: i64,
    #[serde(default)]
    pub job_id: Option<i64>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    pub amount: Decimal,
    #[serde(default = "default_status")]
    pub status: String,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_status() -> String {
    status::PENDING.to_string()
}

impl Payment {
    /// Create a new pending payment.
    pub fn new(client_id: i64, amount: Decimal, due_date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            client_id,
            job_id: None,
            invoice_number: None,
            amount,
            status: default_status(),
            due_date,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Construct a Payment from a database row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            client_id: row.get("client_id")?,
            job_id: row.get("job_id")?,
            invoice_number: row.get("invoice_number")?,
            amount: get_decimal(row, "amount")?,
            status: row.get("status")?,
            due_date: row.get("due_date")?,
            paid_at: row.get("paid_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Find a payment by its database ID.
    pub fn find_by_id(conn: &Connection, id: i64) -> FpResult<Option<Self>> {
        optional(conn.query_row("SELECT * FROM payments WHERE id = ?1", [id], Self::from_row))
    }

    /// Find a payment by its database ID, failing with `NotFound`.
    pub fn get(conn: &Connection, id: i64) -> FpResult<Self> {
        Self::find_by_id(conn, id)?.ok_or_else(|| FpError::not_found(entity::PAYMENT, id))
    }

    /// Load payments ordered by due date, optionally filtered by status.
    pub fn load_all(conn: &Connection, status_filter: Option<&str>) -> FpResult<Vec<Self>> {
        let mut stmt = conn
            .prepare(
                "SELECT * FROM payments
                 WHERE (?1 IS NULL OR status = ?1)
                 ORDER BY due_date, id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map([status_filter], Self::from_row)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    /// Delete a payment by ID.
    pub fn delete(conn: &Connection, id: i64) -> FpResult<bool> {
        let changed = conn
            .execute("DELETE FROM payments WHERE id = ?1", [id])
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Record a payment as received.
    pub fn mark_paid(conn: &Connection, id: i64, at: DateTime<Utc>) -> FpResult<Self> {
        let payment = Self::get(conn, id)?;
        if payment.status == status::CANCELLED {
            return Err(FpError::Validation(format!("payment {id} is cancelled")));
        }
        conn.execute(
            "UPDATE payments SET status = ?1, paid_at = ?2, updated_at = ?2 WHERE id = ?3",
            params![status::PAID, at, id],
        )
        .map_err(db_err)?;
        Self::get(conn, id)
    }

    /// Whether the payment is unpaid past its due date.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        matches!(self.status.as_str(), status::PENDING | status::OVERDUE) && self.due_date < today
    }

    /// Check field values before writing.
    pub fn validate(&self) -> FpResult<()> {
        if !status::ALL.contains(&self.status.as_str()) {
            return Err(FpError::Validation(format!("invalid payment status '{}'", self.status)));
        }
        if self.amount <= Decimal::ZERO {
            return Err(FpError::Validation("payment amount must be positive".into()));
        }
        Ok(())
    }

    /// Insert or update this payment. Returns the database ID.
    pub fn save(&mut self, conn: &Connection) -> FpResult<i64> {
        self.validate()?;
        self.updated_at = Utc::now();

        if let Some(id) = self.id {
            let changed = conn
                .execute(
                    "UPDATE payments SET
                        client_id = ?1, job_id = ?2, invoice_number = ?3, amount = ?4,
                        status = ?5, due_date = ?6, paid_at = ?7, updated_at = ?8
                    WHERE id = ?9",
                    params![
                        self.client_id,
                        self.job_id,
                        self.invoice_number,
                        self.amount.to_string(),
                        self.status,
                        self.due_date,
                        self.paid_at,
                        self.updated_at,
                        id,
                    ],
                )
                .map_err(db_err)?;
            if changed == 0 {
                return Err(FpError::not_found(entity::PAYMENT, id));
            }
            return Ok(id);
        }

        conn.execute(
            "INSERT INTO payments (
                client_id, job_id, invoice_number, amount, status, due_date,
                paid_at, created_at, updated_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
            params![
                self.client_id,
                self.job_id,
                self.invoice_number,
                self.amount.to_string(),
                self.status,
                self.due_date,
                self.paid_at,
                self.created_at,
                self.updated_at,
            ],
        )
        .map_err(db_err)?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }
}
