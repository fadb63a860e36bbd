//! Bank transaction reconciliation.
//!
//! Transactions arrive from the Open Banking feed or a manual CSV upload.
//! Amounts are normalised to signed decimals, direction follows the sign
//! unless the source states it, and debits can be assigned to the staff
//! member whose card paid for them.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use fp_api::{BankFeed, FeedTransaction};
use fp_core::error::{FpError, FpResult};
use fp_models::models::bank::{allocation, source, TransactionFilter};
use fp_models::queries::{self, StaffExpense};
use fp_models::{BankAccount, BankTransaction, Database, Direction, StaffMember};

use crate::allocation::{CardMatch, CardMatcher};
use crate::event_bus::{AppEvent, EventBus};
use crate::importer::{parse_date, RowError};
use crate::service::{Service, ServiceState};

/// Days re-fetched before the newest synced transaction, so late-posting
/// items are picked up.
const SYNC_OVERLAP_DAYS: u64 = 7;

// ─── Amounts and direction ─────────────────────────────────────────────────

/// Parse a bank-style amount string.
///
/// Currency symbols, letters, spaces and thousands separators are dropped.
/// Parentheses or a leading minus mean negative. Returns `None` when no
/// number is left.
///
/// `"$1,234.56"` is `1234.56` and `"(123.45)"` is `-123.45`.
pub fn normalize_amount(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parenthesised = trimmed.starts_with('(') && trimmed.ends_with(')');
    let mut negative = parenthesised;
    let mut digits = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        match c {
            '0'..='9' | '.' => digits.push(c),
            '-' | '\u{2212}' if digits.is_empty() => negative = true,
            _ => {}
        }
    }

    if !digits.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let value = Decimal::from_str(&digits).ok()?;
    Some(if negative { -value } else { value })
}

/// Direction of a transaction: the explicit value when it parses,
/// otherwise the amount's sign.
pub fn resolve_direction(amount: Decimal, explicit: Option<&str>) -> Direction {
    explicit
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .and_then(|d| d.parse::<Direction>().ok())
        .unwrap_or_else(|| Direction::from_amount(amount))
}

/// Make the amount's sign agree with its direction.
fn signed_amount(amount: Decimal, direction: Direction) -> Decimal {
    match direction {
        Direction::Debit => -amount.abs(),
        Direction::Credit => amount.abs(),
    }
}

// ─── CSV upload ────────────────────────────────────────────────────────────

/// Which columns of an uploaded bank statement hold what. Header names are
/// matched case-insensitively. Either `amount` or at least one of
/// `debit` / `credit` must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CsvColumnMapping {
    pub date: String,
    pub description: String,
    pub amount: Option<String>,
    pub debit: Option<String>,
    pub credit: Option<String>,
    pub direction: Option<String>,
    pub card: Option<String>,
}

impl Default for CsvColumnMapping {
    fn default() -> Self {
        Self {
            date: "Date".into(),
            description: "Description".into(),
            amount: Some("Amount".into()),
            debit: None,
            credit: None,
            direction: None,
            card: None,
        }
    }
}

/// Column indexes resolved against a header row.
struct ResolvedColumns {
    date: usize,
    description: usize,
    amount: Option<usize>,
    debit: Option<usize>,
    credit: Option<usize>,
    direction: Option<usize>,
    card: Option<usize>,
}

impl CsvColumnMapping {
    fn resolve(&self, headers: &StringRecord) -> FpResult<ResolvedColumns> {
        let index: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_lowercase(), i))
            .collect();
        let find = |name: &str| -> FpResult<usize> {
            index
                .get(&name.trim().to_lowercase())
                .copied()
                .ok_or_else(|| FpError::Import(format!("column '{name}' not found in file")))
        };
        let find_opt = |name: &Option<String>| -> FpResult<Option<usize>> {
            match name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                Some(n) => find(n).map(Some),
                None => Ok(None),
            }
        };

        let resolved = ResolvedColumns {
            date: find(&self.date)?,
            description: find(&self.description)?,
            amount: find_opt(&self.amount)?,
            debit: find_opt(&self.debit)?,
            credit: find_opt(&self.credit)?,
            direction: find_opt(&self.direction)?,
            card: find_opt(&self.card)?,
        };
        if resolved.amount.is_none() && resolved.debit.is_none() && resolved.credit.is_none() {
            return Err(FpError::Validation(
                "mapping needs an amount column or debit/credit columns".into(),
            ));
        }
        Ok(resolved)
    }
}

fn cell<'r>(record: &'r StringRecord, idx: Option<usize>) -> Option<&'r str> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Classify one statement row.
fn parse_bank_row(record: &StringRecord, cols: &ResolvedColumns) -> Result<BankTransaction, String> {
    let raw_date = cell(record, Some(cols.date)).ok_or("missing date")?;
    let posted_on = parse_date(raw_date).ok_or_else(|| format!("date '{raw_date}' is not a date"))?;
    let description = cell(record, Some(cols.description)).unwrap_or_default();

    let explicit = cell(record, cols.direction);
    let (amount, direction) = match cell(record, cols.amount) {
        Some(raw) => {
            let amount = normalize_amount(raw).ok_or_else(|| format!("amount '{raw}' is not a number"))?;
            let direction = resolve_direction(amount, explicit);
            (signed_amount(amount, direction), direction)
        }
        None => {
            let debit = cell(record, cols.debit);
            let credit = cell(record, cols.credit);
            match (debit, credit) {
                (Some(raw), Some(_)) if normalize_amount(raw).is_some_and(|d| !d.is_zero()) => {
                    let v = normalize_amount(raw).unwrap_or_default();
                    (-v.abs(), Direction::Debit)
                }
                (_, Some(raw)) => {
                    let v = normalize_amount(raw).ok_or_else(|| format!("credit '{raw}' is not a number"))?;
                    (v.abs(), Direction::Credit)
                }
                (Some(raw), None) => {
                    let v = normalize_amount(raw).ok_or_else(|| format!("debit '{raw}' is not a number"))?;
                    (-v.abs(), Direction::Debit)
                }
                (None, None) => return Err("no amount".into()),
            }
        }
    };

    let mut tx = BankTransaction::new(posted_on, description, amount, source::CSV);
    tx.direction = direction;
    tx.card_number = cell(record, cols.card).map(str::to_string);
    Ok(tx)
}

/// Parse an uploaded statement. Each row is classified on its own; bad
/// rows are returned as errors alongside the good ones.
pub fn parse_bank_csv(
    data: &str,
    mapping: &CsvColumnMapping,
) -> FpResult<(Vec<(u64, BankTransaction)>, Vec<RowError>)> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(data.as_bytes());
    let headers = reader.headers()?.clone();
    let cols = mapping.resolve(&headers)?;

    let mut rows = Vec::new();
    let mut errors = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let fallback_row = idx as u64 + 2;
        match result {
            Ok(record) => {
                let row = record.position().map(|p| p.line()).unwrap_or(fallback_row);
                match parse_bank_row(&record, &cols) {
                    Ok(tx) => rows.push((row, tx)),
                    Err(reason) => errors.push(RowError { row, reason }),
                }
            }
            Err(e) => {
                let row = e.position().map(|p| p.line()).unwrap_or(fallback_row);
                errors.push(RowError { row, reason: e.to_string() });
            }
        }
    }
    Ok((rows, errors))
}

// ─── Reports ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub accounts: usize,
    pub inserted: usize,
    pub updated: usize,
    pub since: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub batch_id: String,
    pub imported: usize,
    pub errors: Vec<RowError>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationReport {
    pub considered: usize,
    pub allocated: usize,
    pub ambiguous: usize,
    pub unmatched: usize,
}

// ─── Service ───────────────────────────────────────────────────────────────

/// Service for bank feeds, statement uploads and staff allocation.
pub struct ReconciliationService {
    state: ServiceState,
    database: Database,
    event_bus: EventBus,
    feed: Option<Arc<dyn BankFeed>>,
}

impl ReconciliationService {
    pub fn new(database: Database, event_bus: EventBus, feed: Option<Arc<dyn BankFeed>>) -> Self {
        Self {
            state: ServiceState::Created,
            database,
            event_bus,
            feed,
        }
    }

    pub fn has_feed(&self) -> bool {
        self.feed.is_some()
    }

    /// Pull accounts and transactions from the Open Banking feed and upsert
    /// them by external ID. Without `since`, fetching starts a week before
    /// the newest transaction already synced.
    pub async fn sync_open_banking(&self, since: Option<NaiveDate>) -> FpResult<SyncReport> {
        let feed = self
            .feed
            .clone()
            .ok_or_else(|| FpError::MissingConfig("no Open Banking provider configured".into()))?;

        let since = match since {
            Some(d) => Some(d),
            None => {
                let conn = self.database.conn()?;
                BankTransaction::latest_posted_on(&conn, source::OPEN_BANKING)?
                    .and_then(|d| d.checked_sub_days(Days::new(SYNC_OVERLAP_DAYS)))
            }
        };

        let accounts = feed.accounts().await?;
        let transactions = feed.transactions(since).await?;
        let synced_at = Utc::now();

        let report = self.database.transaction(|conn| {
            let mut report = SyncReport {
                since,
                ..SyncReport::default()
            };
            let mut account_ids = HashMap::new();
            for a in &accounts {
                let mut account = BankAccount {
                    id: None,
                    external_id: a.external_id.clone(),
                    name: a.name.clone(),
                    institution: a.institution.clone(),
                    account_mask: a.account_mask.clone(),
                    balance: a.balance,
                    currency: a.currency.clone(),
                    last_synced_at: Some(synced_at),
                };
                let id = account.save(conn)?;
                account_ids.insert(a.external_id.clone(), id);
                report.accounts += 1;
            }

            for feed_tx in &transactions {
                let mut tx = from_feed(feed_tx);
                tx.bank_account_id = feed_tx
                    .account_external_id
                    .as_ref()
                    .and_then(|ext| account_ids.get(ext).copied());
                if tx.upsert_external(conn)? {
                    report.inserted += 1;
                } else {
                    report.updated += 1;
                }
            }
            Ok(report)
        })?;

        info!(
            "bank sync: {} accounts, {} new and {} refreshed transactions",
            report.accounts, report.inserted, report.updated
        );
        self.event_bus.emit(AppEvent::BankSyncCompleted {
            accounts: report.accounts,
            inserted: report.inserted,
            updated: report.updated,
        });
        Ok(report)
    }

    /// Import a statement CSV. Valid rows are inserted together.
    pub fn import_csv(&self, data: &str, mapping: &CsvColumnMapping) -> FpResult<UploadReport> {
        if data.trim().is_empty() {
            return Err(FpError::Import("file is empty".into()));
        }
        let (rows, mut errors) = parse_bank_csv(data, mapping)?;
        let imported = self.database.transaction(|conn| {
            let mut imported = 0;
            for (row, mut tx) in rows {
                match tx.insert(conn) {
                    Ok(_) => imported += 1,
                    Err(e) => errors.push(RowError { row, reason: e.to_string() }),
                }
            }
            Ok(imported)
        })?;
        errors.sort_by_key(|e| e.row);

        let report = UploadReport {
            batch_id: Uuid::new_v4().to_string(),
            imported,
            errors,
        };
        info!(
            "bank statement upload: {} imported, {} rejected (batch {})",
            report.imported,
            report.errors.len(),
            report.batch_id
        );
        self.event_bus.emit(AppEvent::ImportCompleted {
            entity: "bank_transactions".into(),
            batch_id: report.batch_id.clone(),
            imported: report.imported,
            rejected: report.errors.len(),
        });
        Ok(report)
    }

    /// Assign unallocated debits to staff by card number. Transactions that
    /// match more than one staff member are left alone.
    pub fn auto_allocate(&self) -> FpResult<AllocationReport> {
        let conn = self.database.conn()?;
        let staff = StaffMember::load_all(&conn, true)?;
        let matcher = CardMatcher::new(&staff);
        let pending = BankTransaction::load_unallocated_debits(&conn)?;

        let mut report = AllocationReport {
            considered: pending.len(),
            ..AllocationReport::default()
        };
        if matcher.is_empty() {
            debug!("no staff card numbers configured, nothing to allocate");
            report.unmatched = pending.len();
            return Ok(report);
        }

        for tx in &pending {
            let Some(id) = tx.id else { continue };
            match matcher.match_transaction(tx) {
                CardMatch::Staff(staff_id) => {
                    match BankTransaction::allocate(&conn, id, staff_id, allocation::AUTO) {
                        Ok(_) => report.allocated += 1,
                        Err(e) => error!("failed to allocate transaction {id}: {e}"),
                    }
                }
                CardMatch::Ambiguous(ids) => {
                    debug!("transaction {id} matches staff {ids:?}, leaving for review");
                    report.ambiguous += 1;
                }
                CardMatch::NoMatch => report.unmatched += 1,
            }
        }

        info!(
            "auto allocation: {} of {} debits allocated, {} ambiguous",
            report.allocated, report.considered, report.ambiguous
        );
        self.event_bus.emit(AppEvent::TransactionsAllocated {
            allocated: report.allocated,
            ambiguous: report.ambiguous,
        });
        Ok(report)
    }

    /// Manually assign a transaction to a staff member.
    pub fn allocate(&self, transaction_id: i64, staff_member_id: i64) -> FpResult<BankTransaction> {
        let conn = self.database.conn()?;
        StaffMember::get(&conn, staff_member_id)?;
        BankTransaction::allocate(&conn, transaction_id, staff_member_id, allocation::MANUAL)
    }

    pub fn unallocate(&self, transaction_id: i64) -> FpResult<BankTransaction> {
        let conn = self.database.conn()?;
        BankTransaction::unallocate(&conn, transaction_id)
    }

    pub fn accounts(&self) -> FpResult<Vec<BankAccount>> {
        let conn = self.database.conn()?;
        BankAccount::load_all(&conn)
    }

    pub fn transactions(&self, filter: &TransactionFilter) -> FpResult<Vec<BankTransaction>> {
        if let Some(status) = filter.allocation_status.as_deref() {
            if !allocation::ALL.contains(&status) {
                return Err(FpError::Validation(format!("invalid allocation status '{status}'")));
            }
        }
        let conn = self.database.conn()?;
        BankTransaction::load_filtered(&conn, filter)
    }

    /// Count and total of debits per staff member.
    pub fn staff_summary(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> FpResult<Vec<StaffExpense>> {
        let conn = self.database.conn()?;
        queries::staff_expense_summary(&conn, from, to)
    }
}

fn from_feed(feed_tx: &FeedTransaction) -> BankTransaction {
    let direction = resolve_direction(feed_tx.amount, feed_tx.direction.as_deref());
    let mut tx = BankTransaction::new(
        feed_tx.posted_on,
        feed_tx.description.clone(),
        signed_amount(feed_tx.amount, direction),
        source::OPEN_BANKING,
    );
    tx.direction = direction;
    tx.external_id = Some(feed_tx.external_id.clone());
    if feed_tx.direction.is_some() && tx.direction != Direction::from_amount(feed_tx.amount) {
        warn!(
            "transaction {} sign disagrees with its direction, trusting direction",
            feed_tx.external_id
        );
    }
    tx
}

impl Service for ReconciliationService {
    fn name(&self) -> &str {
        "reconciliation"
    }

    fn state(&self) -> ServiceState {
        self.state
    }

    fn init(&mut self) -> FpResult<()> {
        if self.feed.is_some() {
            self.state = ServiceState::Running;
            info!("reconciliation service initialized");
        } else {
            self.state = ServiceState::Degraded;
            warn!("reconciliation service has no Open Banking provider; CSV upload only");
        }
        Ok(())
    }

    fn degraded_reason(&self) -> Option<&str> {
        self.feed.is_none().then_some("no Open Banking provider configured")
    }

    fn shutdown(&mut self) -> FpResult<()> {
        self.state = ServiceState::Stopped;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_normalize_amount() {
        assert_eq!(normalize_amount("$1,234.56"), Some(dec!(1234.56)));
        assert_eq!(normalize_amount("(123.45)"), Some(dec!(-123.45)));
        assert_eq!(normalize_amount("-$80.00"), Some(dec!(-80.00)));
        assert_eq!(normalize_amount("$-80"), Some(dec!(-80)));
        assert_eq!(normalize_amount(" AUD 12 "), Some(dec!(12)));
        assert_eq!(normalize_amount(""), None);
        assert_eq!(normalize_amount("n/a"), None);
        assert_eq!(normalize_amount("1.2.3"), None);
    }

    #[test]
    fn test_resolve_direction() {
        assert_eq!(resolve_direction(dec!(-5), None), Direction::Debit);
        assert_eq!(resolve_direction(dec!(5), None), Direction::Credit);
        assert_eq!(resolve_direction(dec!(5), Some("DR")), Direction::Debit);
        assert_eq!(resolve_direction(dec!(-5), Some("???")), Direction::Debit);
    }

    #[test]
    fn test_parse_single_amount_column() {
        let data = "Date,Description,Amount,Card\n\
                    14/05/2024,BUNNINGS 4821,\"-$1,204.10\",\n\
                    15/05/2024,DEPOSIT,$500.00,\n\
                    bad,FUEL,-20,\n\
                    16/05/2024,FUEL,,\n";
        let mapping = CsvColumnMapping {
            card: Some("card".into()),
            ..CsvColumnMapping::default()
        };
        let (rows, errors) = parse_bank_csv(data, &mapping).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].1.amount, dec!(-1204.10));
        assert_eq!(rows[0].1.direction, Direction::Debit);
        assert_eq!(rows[1].1.direction, Direction::Credit);
        assert_eq!(errors.iter().map(|e| e.row).collect::<Vec<_>>(), vec![4, 5]);
    }

    #[test]
    fn test_parse_split_columns_and_direction() {
        let data = "Posted,Details,Debit,Credit,Type\n\
                    2024-05-14,SHELL 9034,72.15,,\n\
                    2024-05-15,TRANSFER IN,,1000,\n";
        let mapping = CsvColumnMapping {
            date: "posted".into(),
            description: "details".into(),
            amount: None,
            debit: Some("Debit".into()),
            credit: Some("Credit".into()),
            direction: Some("Type".into()),
            card: None,
        };
        let (rows, errors) = parse_bank_csv(data, &mapping).unwrap();
        assert!(errors.is_empty());
        assert_eq!(rows[0].1.amount, dec!(-72.15));
        assert_eq!(rows[1].1.amount, dec!(1000));
        assert_eq!(rows[1].1.direction, Direction::Credit);
    }

    #[test]
    fn test_explicit_direction_sets_sign() {
        let data = "Date,Description,Amount,Dir\n2024-05-14,FEE,4.50,DR\n";
        let mapping = CsvColumnMapping {
            direction: Some("Dir".into()),
            ..CsvColumnMapping::default()
        };
        let (rows, _) = parse_bank_csv(data, &mapping).unwrap();
        assert_eq!(rows[0].1.amount, dec!(-4.50));
        assert_eq!(rows[0].1.direction, Direction::Debit);
    }

    #[test]
    fn test_mapping_missing_column() {
        let data = "When,What,HowMuch\n2024-05-14,x,1\n";
        let err = parse_bank_csv(data, &CsvColumnMapping::default()).unwrap_err();
        assert!(matches!(err, FpError::Import(_)));
    }
}
