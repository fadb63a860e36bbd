//! Quote entity model.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use rusqlite::{params, Connection, OptionalExtension, Row};
use fp_core::constants::{document_number, entity, QUOTE_NUMBER_PREFIX};
use fp_core::error::{FpError, FpResult};

use crate::models::client::Client;
use crate::models::job::Job;
use crate::models::lead::{self, Lead};
use crate::sql::{db_err, get_decimal, optional};

/// Quote status values.
pub mod status {
    pub const DRAFT: &str = "draft";
    pub const SENT: &str = "sent";
    pub const APPROVED: &str = "approved";
    pub const DECLINED: &str = "declined";
    pub const EXPIRED: &str = "expired";

    pub const ALL: &[&str] = &[DRAFT, SENT, APPROVED, DECLINED, EXPIRED];
}

/// A priced proposal sent to a client. Numbers are `Q-00001` style and
/// unique across the table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    #[serde(default)]
    pub id: Option<i64>,
    /// Assigned on first save when empty.
    #[serde(default)]
    pub quote_number: String,
    pub client_id: i64,
    #[serde(default)]
    pub lead_id: Option<i64>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub total_amount: Decimal,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_status() -> String {
    status::DRAFT.to_string()
}

impl Quote {
    /// Create a new draft quote for a client.
    pub fn new(client_id: i64, total_amount: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            quote_number: String::new(),
            client_id,
            lead_id: None,
            status: default_status(),
            description: None,
            total_amount,
            sent_at: None,
            valid_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Construct a Quote from a database row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            quote_number: row.get("quote_number")?,
            client_id: row.get("client_id")?,
            lead_id: row.get("lead_id")?,
            status: row.get("status")?,
            description: row.get("description")?,
            total_amount: get_decimal(row, "total_amount")?,
            sent_at: row.get("sent_at")?,
            valid_until: row.get("valid_until")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Find a quote by its database ID.
    pub fn find_by_id(conn: &Connection, id: i64) -> FpResult<Option<Self>> {
        optional(conn.query_row("SELECT * FROM quotes WHERE id = ?1", [id], Self::from_row))
    }

    /// Find a quote by its database ID, failing with `NotFound`.
    pub fn get(conn: &Connection, id: i64) -> FpResult<Self> {
        Self::find_by_id(conn, id)?.ok_or_else(|| FpError::not_found(entity::QUOTE, id))
    }

    /// Load quotes, newest first, optionally filtered by status.
    pub fn load_all(conn: &Connection, status_filter: Option<&str>) -> FpResult<Vec<Self>> {
        let mut stmt = conn
            .prepare(
                "SELECT * FROM quotes
                 WHERE (?1 IS NULL OR status = ?1)
                 ORDER BY created_at DESC, id DESC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map([status_filter], Self::from_row)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    /// Delete a quote by ID.
    pub fn delete(conn: &Connection, id: i64) -> FpResult<bool> {
        let changed = conn
            .execute("DELETE FROM quotes WHERE id = ?1", [id])
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Next free quote number. Counts existing rows, then steps past any
    /// number already taken (rows may have been deleted).
    pub fn next_number(conn: &Connection) -> FpResult<String> {
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM quotes", [], |row| row.get(0))
            .map_err(db_err)?;
        let mut seq = count + 1;
        loop {
            let candidate = document_number(QUOTE_NUMBER_PREFIX, seq);
            let taken = conn
                .query_row(
                    "SELECT 1 FROM quotes WHERE quote_number = ?1",
                    [&candidate],
                    |_| Ok(()),
                )
                .optional()
                .map_err(db_err)?
                .is_some();
            if !taken {
                return Ok(candidate);
            }
            seq += 1;
        }
    }

    /// Mark a quote as sent to the client, stamping `sent_at`.
    pub fn mark_sent(conn: &Connection, id: i64, at: DateTime<Utc>) -> FpResult<Self> {
        let quote = Self::get(conn, id)?;
        if quote.status != status::DRAFT && quote.status != status::SENT {
            return Err(FpError::Validation(format!(
                "quote {} is {} and cannot be sent",
                quote.quote_number, quote.status
            )));
        }
        conn.execute(
            "UPDATE quotes SET status = ?1, sent_at = ?2, updated_at = ?2 WHERE id = ?3",
            params![status::SENT, at, id],
        )
        .map_err(db_err)?;
        Self::get(conn, id)
    }

    /// Approve a quote and open its job. The job takes the client's address
    /// as the install address; a quote tied to a lead marks the lead won.
    /// Run inside a transaction.
    pub fn accept(conn: &Connection, id: i64) -> FpResult<Job> {
        let quote = Self::get(conn, id)?;
        if let Some(existing) = Job::find_by_quote(conn, id)? {
            return Err(FpError::Conflict(format!(
                "quote {} already has job {}",
                quote.quote_number, existing.job_number
            )));
        }
        if quote.status != status::DRAFT && quote.status != status::SENT {
            return Err(FpError::Validation(format!(
                "quote {} is {} and cannot be accepted",
                quote.quote_number, quote.status
            )));
        }

        Self::set_status(conn, id, status::APPROVED)?;
        if let Some(lead_id) = quote.lead_id {
            Lead::set_status(conn, lead_id, lead::status::WON)?;
        }

        let client = Client::get(conn, quote.client_id)?;
        let mut job = Job::new(quote.client_id);
        job.quote_id = Some(id);
        job.install_address = client.address;
        job.notes = quote.description;
        job.save(conn)?;
        Ok(job)
    }

    /// Set the status of a quote.
    pub fn set_status(conn: &Connection, id: i64, new_status: &str) -> FpResult<()> {
        if !status::ALL.contains(&new_status) {
            return Err(FpError::Validation(format!("invalid quote status '{new_status}'")));
        }
        let changed = conn
            .execute(
                "UPDATE quotes SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![new_status, Utc::now(), id],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(FpError::not_found(entity::QUOTE, id));
        }
        Ok(())
    }

    /// Check field values before writing.
    pub fn validate(&self) -> FpResult<()> {
        if !status::ALL.contains(&self.status.as_str()) {
            return Err(FpError::Validation(format!("invalid quote status '{}'", self.status)));
        }
        if self.total_amount.is_sign_negative() {
            return Err(FpError::Validation("quote total cannot be negative".into()));
        }
        Ok(())
    }

    /// Insert or update this quote. Returns the database ID.
    pub fn save(&mut self, conn: &Connection) -> FpResult<i64> {
        self.validate()?;
        self.updated_at = Utc::now();

        if let Some(id) = self.id {
            let changed = conn
                .execute(
                    "UPDATE quotes SET
                        client_id = ?1, lead_id = ?2, status = ?3, description = ?4,
                        total_amount = ?5, sent_at = ?6, valid_until = ?7, updated_at = ?8
                    WHERE id = ?9",
                    params![
                        self.client_id,
                        self.lead_id,
                        self.status,
                        self.description,
                        self.total_amount.to_string(),
                        self.sent_at,
                        self.valid_until,
                        self.updated_at,
                        id,
                    ],
                )
                .map_err(db_err)?;
            if changed == 0 {
                return Err(FpError::not_found(entity::QUOTE, id));
            }
            return Ok(id);
        }

        if self.quote_number.trim().is_empty() {
            self.quote_number = Self::next_number(conn)?;
        }

        conn.execute(
            "INSERT INTO quotes (
                quote_number, client_id, lead_id, status, description,
                total_amount, sent_at, valid_until, created_at, updated_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                self.quote_number,
                self.client_id,
                self.lead_id,
                self.status,
                self.description,
                self.total_amount.to_string(),
                self.sent_at,
                self.valid_until,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use rust_decimal_macros::dec;

    fn setup() -> (Connection, i64) {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        let client_id = Client::new("Jane Citizen").save(&conn).unwrap();
        (conn, client_id)
    }

    #[test]
    fn test_numbers_are_sequential() {
        let (conn, client_id) = setup();
        let mut a = Quote::new(client_id, dec!(1500));
        a.save(&conn).unwrap();
        let mut b = Quote::new(client_id, dec!(2500.50));
        b.save(&conn).unwrap();
        assert_eq!(a.quote_number, "Q-00001");
        assert_eq!(b.quote_number, "Q-00002");
    }

    #[test]
    fn test_number_skips_taken_after_delete() {
        let (conn, client_id) = setup();
        let mut a = Quote::new(client_id, dec!(1));
        let a_id = a.save(&conn).unwrap();
        let mut b = Quote::new(client_id, dec!(1));
        b.save(&conn).unwrap();
        Quote::delete(&conn, a_id).unwrap();

        let mut c = Quote::new(client_id, dec!(1));
        c.save(&conn).unwrap();
        assert_eq!(c.quote_number, "Q-00003");
    }

    #[test]
    fn test_duplicate_number_is_conflict() {
        let (conn, client_id) = setup();
        let mut a = Quote::new(client_id, dec!(1));
        a.quote_number = "Q-00099".into();
        a.save(&conn).unwrap();
        let mut b = Quote::new(client_id, dec!(1));
        b.quote_number = "Q-00099".into();
        assert!(matches!(b.save(&conn), Err(FpError::Conflict(_))));
    }

    #[test]
    fn test_amount_round_trips_exactly() {
        let (conn, client_id) = setup();
        let mut q = Quote::new(client_id, dec!(1234.56));
        let id = q.save(&conn).unwrap();
        assert_eq!(Quote::get(&conn, id).unwrap().total_amount, dec!(1234.56));
    }

    #[test]
    fn test_mark_sent_stamps_time() {
        let (conn, client_id) = setup();
        let id = Quote::new(client_id, dec!(10)).save(&conn).unwrap();
        let at = Utc::now();
        let sent = Quote::mark_sent(&conn, id, at).unwrap();
        assert_eq!(sent.status, status::SENT);
        assert_eq!(sent.sent_at.map(|t| t.timestamp()), Some(at.timestamp()));

        Quote::set_status(&conn, id, status::APPROVED).unwrap();
        assert!(Quote::mark_sent(&conn, id, at).is_err());
    }

    #[test]
    fn test_accept_opens_job_once() {
        let (conn, client_id) = setup();
        let mut lead = Lead::new("Jane Citizen");
        let lead_id = lead.save(&conn).unwrap();
        let mut q = Quote::new(client_id, dec!(4850));
        q.lead_id = Some(lead_id);
        q.description = Some("Colorbond 1.8m".into());
        let id = q.save(&conn).unwrap();

        let job = Quote::accept(&conn, id).unwrap();
        assert_eq!(job.quote_id, Some(id));
        assert_eq!(job.client_id, client_id);
        assert_eq!(job.job_number, "J-00001");
        assert_eq!(Quote::get(&conn, id).unwrap().status, status::APPROVED);
        assert_eq!(Lead::get(&conn, lead_id).unwrap().status, lead::status::WON);

        assert!(matches!(Quote::accept(&conn, id), Err(FpError::Conflict(_))));
    }

    #[test]
    fn test_declined_quote_cannot_be_accepted() {
        let (conn, client_id) = setup();
        let id = Quote::new(client_id, dec!(10)).save(&conn).unwrap();
        Quote::set_status(&conn, id, status::DECLINED).unwrap();
        assert!(matches!(Quote::accept(&conn, id), Err(FpError::Validation(_))));
    }
}
