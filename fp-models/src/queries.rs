//! Join queries for the batch processors and dashboards.
//!
//! The campaign evaluator needs each trigger entity together with the
//! contact details of whoever should receive the message; these queries
//! return both in one round trip. Amount totals are summed in Rust since
//! amounts are stored as decimal text.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use rusqlite::{params, Connection, Row};
use fp_core::error::FpResult;

use crate::models::bank::{allocation, Direction};
use crate::models::job::status as job_status;
use crate::models::lead::{status as lead_status, Lead};
use crate::models::payment::{status as payment_status, Payment};
use crate::models::quote::{status as quote_status, Quote};
use crate::models::sms_log::{direction as sms_direction, status as sms_status};
use crate::sql::{db_err, get_decimal};

// ─── Campaign candidates ───────────────────────────────────────────────────

/// Who a campaign message would go to.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub name: String,
    pub first_name: String,
    pub phone: Option<String>,
    pub client_type: String,
}

impl Recipient {
    /// Phone number with surrounding whitespace removed, `None` when blank.
    pub fn usable_phone(&self) -> Option<&str> {
        self.phone.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }

    fn from_client_columns(row: &Row<'_>) -> rusqlite::Result<Self> {
        let name: String = row.get("client_name")?;
        let first: Option<String> = row.get("client_first_name")?;
        let first_name = match first.as_deref().map(str::trim) {
            Some(f) if !f.is_empty() => f.to_string(),
            _ => name.split_whitespace().next().unwrap_or_default().to_string(),
        };
        Ok(Self {
            name,
            first_name,
            phone: row.get("client_phone")?,
            client_type: row.get("client_client_type")?,
        })
    }
}

/// A pending payment and the client who owes it.
#[derive(Debug, Clone)]
pub struct PaymentCandidate {
    pub payment: Payment,
    pub job_number: Option<String>,
    pub recipient: Recipient,
}

/// A sent quote and the client it went to.
#[derive(Debug, Clone)]
pub struct QuoteCandidate {
    pub quote: Quote,
    pub recipient: Recipient,
}

/// A new lead; leads carry their own contact details.
#[derive(Debug, Clone)]
pub struct LeadCandidate {
    pub lead: Lead,
    pub recipient: Recipient,
}

const CLIENT_COLUMNS: &str = "c.name AS client_name, c.first_name AS client_first_name,
     c.phone AS client_phone, c.client_type AS client_client_type";

/// All payments with status `pending`, earliest due first.
pub fn pending_payment_candidates(conn: &Connection) -> FpResult<Vec<PaymentCandidate>> {
    let sql = format!(
        "SELECT p.*, j.job_number AS job_number, {CLIENT_COLUMNS}
         FROM payments p
         JOIN clients c ON c.id = p.client_id
         LEFT JOIN jobs j ON j.id = p.job_id
         WHERE p.status = ?1
         ORDER BY p.due_date, p.id"
    );
    let mut stmt = conn.prepare(&sql).map_err(db_err)?;
    let rows = stmt
        .query_map([payment_status::PENDING], |row| {
            Ok(PaymentCandidate {
                payment: Payment::from_row(row)?,
                job_number: row.get("job_number")?,
                recipient: Recipient::from_client_columns(row)?,
            })
        })
        .map_err(db_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(rows)
}

/// All quotes with status `sent`, oldest sent first.
pub fn sent_quote_candidates(conn: &Connection) -> FpResult<Vec<QuoteCandidate>> {
    let sql = format!(
        "SELECT q.*, {CLIENT_COLUMNS}
         FROM quotes q
         JOIN clients c ON c.id = q.client_id
         WHERE q.status = ?1
         ORDER BY q.sent_at, q.id"
    );
    let mut stmt = conn.prepare(&sql).map_err(db_err)?;
    let rows = stmt
        .query_map([quote_status::SENT], |row| {
            Ok(QuoteCandidate {
                quote: Quote::from_row(row)?,
                recipient: Recipient::from_client_columns(row)?,
            })
        })
        .map_err(db_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(rows)
}

/// All leads with status `new`, oldest first.
pub fn new_lead_candidates(conn: &Connection) -> FpResult<Vec<LeadCandidate>> {
    let mut stmt = conn
        .prepare("SELECT * FROM leads WHERE status = ?1 ORDER BY created_at, id")
        .map_err(db_err)?;
    let rows = stmt
        .query_map([lead_status::NEW], Lead::from_row)
        .map_err(db_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(db_err)?;

    Ok(rows
        .into_iter()
        .map(|lead| {
            let recipient = Recipient {
                name: lead.name.clone(),
                first_name: lead.first_name(),
                phone: lead.phone.clone(),
                client_type: lead.client_type.clone(),
            };
            LeadCandidate { lead, recipient }
        })
        .collect())
}

// ─── Dashboard ─────────────────────────────────────────────────────────────

/// Headline counts for the office dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub open_leads: i64,
    pub quotes_sent: i64,
    pub jobs_in_production: i64,
    pub pending_payments: i64,
    pub pending_payments_total: Decimal,
    pub overdue_payments: i64,
    pub unallocated_debits: i64,
    pub sms_sent_since: i64,
}

/// Build the dashboard summary. `today` decides overdue; `sms_since` bounds
/// the sent-message count.
pub fn dashboard_summary(
    conn: &Connection,
    today: NaiveDate,
    sms_since: DateTime<Utc>,
) -> FpResult<DashboardSummary> {
    let count_in = |table: &str, column: &str, values: &[&str]| -> FpResult<i64> {
        let list = values
            .iter()
            .map(|v| format!("'{v}'"))
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE {column} IN ({list})");
        conn.query_row(&sql, [], |row| row.get(0)).map_err(db_err)
    };

    let open_leads = count_in("leads", "status", lead_status::OPEN)?;
    let quotes_sent = count_in("quotes", "status", &[quote_status::SENT])?;
    let jobs_in_production = count_in("jobs", "status", job_status::PRODUCTION)?;

    let mut stmt = conn
        .prepare("SELECT amount, due_date FROM payments WHERE status = ?1")
        .map_err(db_err)?;
    let pending: Vec<(Decimal, NaiveDate)> = stmt
        .query_map([payment_status::PENDING], |row| {
            Ok((get_decimal(row, "amount")?, row.get("due_date")?))
        })
        .map_err(db_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(db_err)?;

    let pending_payments_total = pending.iter().map(|(amount, _)| *amount).sum();
    let overdue_pending = pending.iter().filter(|(_, due)| *due < today).count() as i64;
    let overdue_flagged = count_in("payments", "status", &[payment_status::OVERDUE])?;

    let unallocated_debits: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM bank_transactions WHERE allocation_status = ?1 AND direction = ?2",
            params![allocation::UNALLOCATED, Direction::Debit],
            |row| row.get(0),
        )
        .map_err(db_err)?;

    let sms_sent_since: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sms_logs WHERE direction = ?1 AND status = ?2 AND created_at >= ?3",
            params![sms_direction::OUTBOUND, sms_status::SENT, sms_since],
            |row| row.get(0),
        )
        .map_err(db_err)?;

    Ok(DashboardSummary {
        open_leads,
        quotes_sent,
        jobs_in_production,
        pending_payments: pending.len() as i64,
        pending_payments_total,
        overdue_payments: overdue_pending + overdue_flagged,
        unallocated_debits,
        sms_sent_since,
    })
}

// ─── Staff expenses ────────────────────────────────────────────────────────

/// Debits allocated to one staff member.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffExpense {
    pub staff_member_id: i64,
    pub name: String,
    pub transaction_count: i64,
    /// Money spent, as a positive number.
    pub total: Decimal,
}

/// Per-staff count and total of allocated debits, optionally bounded by
/// posting date. Staff with no spending are included with zero totals.
pub fn staff_expense_summary(
    conn: &Connection,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> FpResult<Vec<StaffExpense>> {
    let mut summary: Vec<StaffExpense> = {
        let mut stmt = conn
            .prepare("SELECT id, name FROM staff_members ORDER BY name COLLATE NOCASE")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StaffExpense {
                    staff_member_id: row.get(0)?,
                    name: row.get(1)?,
                    transaction_count: 0,
                    total: Decimal::ZERO,
                })
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        rows
    };

    let mut stmt = conn
        .prepare(
            "SELECT staff_member_id, amount FROM bank_transactions
             WHERE staff_member_id IS NOT NULL AND direction = ?1
               AND (?2 IS NULL OR posted_on >= ?2)
               AND (?3 IS NULL OR posted_on <= ?3)",
        )
        .map_err(db_err)?;
    let spent: Vec<(i64, Decimal)> = stmt
        .query_map(params![Direction::Debit, from, to], |row| {
            Ok((row.get("staff_member_id")?, get_decimal(row, "amount")?))
        })
        .map_err(db_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(db_err)?;

    for (staff_id, amount) in spent {
        if let Some(entry) = summary.iter_mut().find(|s| s.staff_member_id == staff_id) {
            entry.transaction_count += 1;
            entry.total += amount.abs();
        }
    }

    Ok(summary)
}
