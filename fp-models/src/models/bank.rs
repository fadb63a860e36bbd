//! Bank account and bank transaction entity models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, Row};
use fp_core::error::{FpError, FpResult};

use crate::sql::{db_err, get_decimal, get_opt_decimal, optional};

/// Where a transaction came from.
pub mod source {
    pub const OPEN_BANKING: &str = "open_banking";
    pub const CSV: &str = "csv";
}

/// How a transaction was assigned to a staff member.
pub mod allocation {
    pub const UNALLOCATED: &str = "unallocated";
    pub const AUTO: &str = "auto";
    pub const MANUAL: &str = "manual";

    pub const ALL: &[&str] = &[UNALLOCATED, AUTO, MANUAL];
}

/// Money into (credit) or out of (debit) the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Credit,
    Debit,
}

impl Direction {
    /// Negative amounts are debits; zero and positive are credits.
    pub fn from_amount(amount: Decimal) -> Self {
        if amount.is_sign_negative() && !amount.is_zero() {
            Direction::Debit
        } else {
            Direction::Credit
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Credit => "credit",
            Direction::Debit => "debit",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = FpError;

    /// Accepts the stored names and the usual bank export spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "credit" | "cr" | "c" | "in" | "deposit" => Ok(Direction::Credit),
            "debit" | "dr" | "d" | "out" | "withdrawal" | "payment" => Ok(Direction::Debit),
            other => Err(FpError::Validation(format!("unknown transaction direction '{other}'"))),
        }
    }
}

impl ToSql for Direction {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Direction {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        s.parse().map_err(|e: FpError| FromSqlError::Other(e.to_string().into()))
    }
}

// ─── Accounts ──────────────────────────────────────────────────────────────

/// A bank account known to the Open Banking aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    pub id: Option<i64>,
    pub external_id: String,
    pub name: String,
    pub institution: Option<String>,
    pub account_mask: Option<String>,
    pub balance: Option<Decimal>,
    pub currency: String,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl BankAccount {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            external_id: row.get("external_id")?,
            name: row.get("name")?,
            institution: row.get("institution")?,
            account_mask: row.get("account_mask")?,
            balance: get_opt_decimal(row, "balance")?,
            currency: row.get("currency")?,
            last_synced_at: row.get("last_synced_at")?,
        })
    }

    pub fn find_by_external_id(conn: &Connection, external_id: &str) -> FpResult<Option<Self>> {
        optional(conn.query_row(
            "SELECT * FROM bank_accounts WHERE external_id = ?1",
            [external_id],
            Self::from_row,
        ))
    }

    pub fn load_all(conn: &Connection) -> FpResult<Vec<Self>> {
        let mut stmt = conn
            .prepare("SELECT * FROM bank_accounts ORDER BY name COLLATE NOCASE")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], Self::from_row)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    /// Upsert by external ID. Returns the local database ID.
    pub fn save(&mut self, conn: &Connection) -> FpResult<i64> {
        conn.execute(
            "INSERT INTO bank_accounts (
                external_id, name, institution, account_mask, balance, currency, last_synced_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7)
            ON CONFLICT(external_id) DO UPDATE SET
                name = excluded.name,
                institution = COALESCE(excluded.institution, institution),
                account_mask = COALESCE(excluded.account_mask, account_mask),
                balance = COALESCE(excluded.balance, balance),
                currency = excluded.currency,
                last_synced_at = COALESCE(excluded.last_synced_at, last_synced_at)",
            params![
                self.external_id,
                self.name,
                self.institution,
                self.account_mask,
                self.balance.map(|b| b.to_string()),
                self.currency,
                self.last_synced_at,
            ],
        )
        .map_err(db_err)?;

        // last_insert_rowid() is stale after ON CONFLICT DO UPDATE.
        let id: i64 = conn
            .query_row(
                "SELECT id FROM bank_accounts WHERE external_id = ?1",
                [&self.external_id],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        self.id = Some(id);
        Ok(id)
    }
}

// ─── Transactions ──────────────────────────────────────────────────────────

/// A single line on a bank statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankTransaction {
    pub id: Option<i64>,
    pub bank_account_id: Option<i64>,
    /// Aggregator transaction ID; `None` for CSV uploads.
    pub external_id: Option<String>,
    pub posted_on: NaiveDate,
    pub description: String,
    /// Signed: negative for money out.
    pub amount: Decimal,
    pub direction: Direction,
    pub card_number: Option<String>,
    pub source: String,
    pub staff_member_id: Option<i64>,
    pub allocation_status: String,
    pub created_at: DateTime<Utc>,
}

/// Filters for listing transactions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub allocation_status: Option<String>,
    pub staff_member_id: Option<i64>,
    pub limit: Option<i64>,
}

impl BankTransaction {
    /// Build a transaction whose direction follows the amount's sign.
    pub fn new(
        posted_on: NaiveDate,
        description: impl Into<String>,
        amount: Decimal,
        source: &str,
    ) -> Self {
        Self {
            id: None,
            bank_account_id: None,
            external_id: None,
            posted_on,
            description: description.into(),
            amount,
            direction: Direction::from_amount(amount),
            card_number: None,
            source: source.to_string(),
            staff_member_id: None,
            allocation_status: allocation::UNALLOCATED.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            bank_account_id: row.get("bank_account_id")?,
            external_id: row.get("external_id")?,
            posted_on: row.get("posted_on")?,
            description: row.get("description")?,
            amount: get_decimal(row, "amount")?,
            direction: row.get("direction")?,
            card_number: row.get("card_number")?,
            source: row.get("source")?,
            staff_member_id: row.get("staff_member_id")?,
            allocation_status: row.get("allocation_status")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> FpResult<Option<Self>> {
        optional(conn.query_row(
            "SELECT * FROM bank_transactions WHERE id = ?1",
            [id],
            Self::from_row,
        ))
    }

    pub fn get(conn: &Connection, id: i64) -> FpResult<Self> {
        Self::find_by_id(conn, id)?.ok_or_else(|| FpError::not_found("bank transaction", id))
    }

    /// Transactions newest first, narrowed by the filter.
    pub fn load_filtered(conn: &Connection, filter: &TransactionFilter) -> FpResult<Vec<Self>> {
        let mut stmt = conn
            .prepare(
                "SELECT * FROM bank_transactions
                 WHERE (?1 IS NULL OR posted_on >= ?1)
                   AND (?2 IS NULL OR posted_on <= ?2)
                   AND (?3 IS NULL OR allocation_status = ?3)
                   AND (?4 IS NULL OR staff_member_id = ?4)
                 ORDER BY posted_on DESC, id DESC
                 LIMIT ?5",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![
                    filter.from,
                    filter.to,
                    filter.allocation_status,
                    filter.staff_member_id,
                    filter.limit.unwrap_or(500),
                ],
                Self::from_row,
            )
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    /// Debits not yet assigned to anyone.
    pub fn load_unallocated_debits(conn: &Connection) -> FpResult<Vec<Self>> {
        let mut stmt = conn
            .prepare(
                "SELECT * FROM bank_transactions
                 WHERE allocation_status = ?1 AND direction = ?2
                 ORDER BY posted_on, id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![allocation::UNALLOCATED, Direction::Debit],
                Self::from_row,
            )
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    /// Most recent posting date from one source, if any rows exist.
    pub fn latest_posted_on(conn: &Connection, source: &str) -> FpResult<Option<NaiveDate>> {
        conn.query_row(
            "SELECT MAX(posted_on) FROM bank_transactions WHERE source = ?1",
            [source],
            |row| row.get(0),
        )
        .map_err(db_err)
    }

    /// Insert a new transaction. Returns the database ID.
    pub fn insert(&mut self, conn: &Connection) -> FpResult<i64> {
        conn.execute(
            "INSERT INTO bank_transactions (
                bank_account_id, external_id, posted_on, description, amount, direction,
                card_number, source, staff_member_id, allocation_status, created_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
            params![
                self.bank_account_id,
                self.external_id,
                self.posted_on,
                self.description,
                self.amount.to_string(),
                self.direction,
                self.card_number,
                self.source,
                self.staff_member_id,
                self.allocation_status,
                self.created_at,
            ],
        )
        .map_err(db_err)?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Insert, or refresh the statement fields of an existing row with the
    /// same external ID. Allocation is left untouched on refresh.
    /// Returns true when a new row was created.
    pub fn upsert_external(&mut self, conn: &Connection) -> FpResult<bool> {
        let external_id = self
            .external_id
            .clone()
            .ok_or_else(|| FpError::Validation("upsert requires an external id".into()))?;

        let existing: Option<i64> = optional(conn.query_row(
            "SELECT id FROM bank_transactions WHERE external_id = ?1",
            [&external_id],
            |row| row.get(0),
        ))?;

        match existing {
            Some(id) => {
                conn.execute(
                    "UPDATE bank_transactions SET
                        bank_account_id = ?1, posted_on = ?2, description = ?3,
                        amount = ?4, direction = ?5, card_number = COALESCE(?6, card_number)
                    WHERE id = ?7",
                    params![
                        self.bank_account_id,
                        self.posted_on,
                        self.description,
                        self.amount.to_string(),
                        self.direction,
                        self.card_number,
                        id,
                    ],
                )
                .map_err(db_err)?;
                self.id = Some(id);
                Ok(false)
            }
            None => {
                self.insert(conn)?;
                Ok(true)
            }
        }
    }

    /// Assign a transaction to a staff member.
    pub fn allocate(conn: &Connection, id: i64, staff_member_id: i64, how: &str) -> FpResult<Self> {
        if how != allocation::AUTO && how != allocation::MANUAL {
            return Err(FpError::Validation(format!("invalid allocation status '{how}'")));
        }
        let changed = conn
            .execute(
                "UPDATE bank_transactions SET staff_member_id = ?1, allocation_status = ?2 WHERE id = ?3",
                params![staff_member_id, how, id],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(FpError::not_found("bank transaction", id));
        }
        Self::get(conn, id)
    }

    /// Clear any staff assignment.
    pub fn unallocate(conn: &Connection, id: i64) -> FpResult<Self> {
        let changed = conn
            .execute(
                "UPDATE bank_transactions SET staff_member_id = NULL, allocation_status = ?1 WHERE id = ?2",
                params![allocation::UNALLOCATED, id],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(FpError::not_found("bank transaction", id));
        }
        Self::get(conn, id)
    }
}
