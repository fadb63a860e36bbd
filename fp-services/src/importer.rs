//! CSV import for clients, leads, quotes, jobs, payments and staff.
//!
//! Headers are normalised through an alias table that also understands
//! ServiceM8 export column names. Every row is validated on its own; bad
//! rows are reported with their line number in the file and the rest are
//! inserted together in one transaction.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{FixedOffset, NaiveDate};
use csv::{ReaderBuilder, StringRecord, Trim};
use lazy_static::lazy_static;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use fp_core::constants::{client_type, PERTH_UTC_OFFSET_HOURS};
use fp_core::error::{FpError, FpResult};
use fp_models::models::{job, lead, payment, quote};
use fp_models::{Client, Database, Job, Lead, Payment, Quote, StaffMember};

use crate::event_bus::{AppEvent, EventBus};
use crate::reconciliation::normalize_amount;
use crate::send_window::{business_offset, local_midnight};
use crate::service::{Service, ServiceState};

// ─── Entities and templates ────────────────────────────────────────────────

/// What a CSV file is being imported as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportEntity {
    Clients,
    Leads,
    Quotes,
    Jobs,
    Payments,
    Staff,
}

impl ImportEntity {
    pub const ALL: [ImportEntity; 6] = [
        ImportEntity::Clients,
        ImportEntity::Leads,
        ImportEntity::Quotes,
        ImportEntity::Jobs,
        ImportEntity::Payments,
        ImportEntity::Staff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportEntity::Clients => "clients",
            ImportEntity::Leads => "leads",
            ImportEntity::Quotes => "quotes",
            ImportEntity::Jobs => "jobs",
            ImportEntity::Payments => "payments",
            ImportEntity::Staff => "staff",
        }
    }

    /// Columns that must be present and non-empty on every row.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            ImportEntity::Clients | ImportEntity::Leads | ImportEntity::Staff => &[field::NAME],
            ImportEntity::Quotes => &[field::CLIENT_NAME, field::AMOUNT],
            ImportEntity::Jobs => &[field::CLIENT_NAME],
            ImportEntity::Payments => &[field::CLIENT_NAME, field::AMOUNT, field::DUE_DATE],
        }
    }

    /// Rows reference an existing client by name.
    fn resolves_client(&self) -> bool {
        matches!(self, ImportEntity::Quotes | ImportEntity::Jobs | ImportEntity::Payments)
    }

    /// Documented header row and one example row.
    pub fn template(&self) -> ImportTemplate {
        let (headers, example): (&[&str], &[&str]) = match self {
            ImportEntity::Clients => (
                &["name", "first_name", "phone", "email", "address", "client_type", "trade_discount_percent", "notes"],
                &["Acme Landscaping", "Sam", "0412 345 678", "sam@acme.com.au", "12 Hay St, Perth WA 6000", "trade", "10", "Pays on 14 day terms"],
            ),
            ImportEntity::Leads => (
                &["name", "phone", "email", "address", "source", "client_type", "notes"],
                &["Jo Citizen", "0498 765 432", "jo@example.com", "4 Beach Rd, Scarborough WA 6019", "website", "public", "Colorbond side fence, 25m"],
            ),
            ImportEntity::Quotes => (
                &["quote_number", "client_name", "amount", "status", "description", "sent_date", "valid_until"],
                &["", "Acme Landscaping", "$4,850.00", "sent", "1.8m Colorbond, 30m", "2024-05-01", "2024-05-31"],
            ),
            ImportEntity::Jobs => (
                &["job_number", "client_name", "status", "install_address", "scheduled_date", "installer", "notes"],
                &["", "Acme Landscaping", "scheduled", "12 Hay St, Perth WA 6000", "14/06/2024", "Crew A", ""],
            ),
            ImportEntity::Payments => (
                &["client_name", "invoice_number", "amount", "due_date", "status"],
                &["Acme Landscaping", "INV-1042", "2425.00", "30/06/2024", "pending"],
            ),
            ImportEntity::Staff => (
                &["name", "phone", "card_numbers"],
                &["Chris Installer", "0400 111 222", "4821,9034"],
            ),
        };
        ImportTemplate {
            entity: *self,
            headers: headers.iter().map(|h| h.to_string()).collect(),
            example: example.iter().map(|v| v.to_string()).collect(),
        }
    }
}

impl fmt::Display for ImportEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportEntity {
    type Err = FpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clients" | "client" | "customers" => Ok(ImportEntity::Clients),
            "leads" | "lead" | "enquiries" => Ok(ImportEntity::Leads),
            "quotes" | "quote" => Ok(ImportEntity::Quotes),
            "jobs" | "job" => Ok(ImportEntity::Jobs),
            "payments" | "payment" | "invoices" => Ok(ImportEntity::Payments),
            "staff" | "staff_members" => Ok(ImportEntity::Staff),
            other => Err(FpError::Validation(format!("unknown import type '{other}'"))),
        }
    }
}

/// Header row plus example row for one entity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportTemplate {
    pub entity: ImportEntity,
    pub headers: Vec<String>,
    pub example: Vec<String>,
}

impl ImportTemplate {
    /// The template as a two-line CSV file.
    pub fn to_csv(&self) -> FpResult<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        writer.write_record(&self.example)?;
        let bytes = writer
            .into_inner()
            .map_err(|e| FpError::Import(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| FpError::Import(e.to_string()))
    }
}

// ─── Header normalisation ──────────────────────────────────────────────────

/// Canonical field names.
pub mod field {
    pub const NAME: &str = "name";
    pub const FIRST_NAME: &str = "first_name";
    pub const PHONE: &str = "phone";
    pub const EMAIL: &str = "email";
    pub const ADDRESS: &str = "address";
    pub const CLIENT_TYPE: &str = "client_type";
    pub const TRADE_DISCOUNT: &str = "trade_discount_percent";
    pub const NOTES: &str = "notes";
    pub const SOURCE: &str = "source";
    pub const STATUS: &str = "status";
    pub const CLIENT_NAME: &str = "client_name";
    pub const QUOTE_NUMBER: &str = "quote_number";
    pub const JOB_NUMBER: &str = "job_number";
    pub const INVOICE_NUMBER: &str = "invoice_number";
    pub const AMOUNT: &str = "amount";
    pub const DESCRIPTION: &str = "description";
    pub const SENT_DATE: &str = "sent_date";
    pub const VALID_UNTIL: &str = "valid_until";
    pub const DUE_DATE: &str = "due_date";
    pub const SCHEDULED_DATE: &str = "scheduled_date";
    pub const INSTALLER: &str = "installer";
    pub const CARD_NUMBERS: &str = "card_numbers";
}

lazy_static! {
    /// Header aliases keyed by their squashed form (lowercase, letters and
    /// digits only). Includes ServiceM8 export names.
    static ref HEADER_ALIASES: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        let table: &[(&str, &[&str])] = &[
            (field::NAME, &["name", "fullname", "contactname", "customername", "companyname", "company"]),
            (field::FIRST_NAME, &["firstname", "givenname", "contactfirst", "contactfirstname"]),
            (field::PHONE, &["phone", "mobile", "mobilephone", "phonenumber", "contactmobile", "contactphone"]),
            (field::EMAIL, &["email", "emailaddress", "contactemail"]),
            (field::ADDRESS, &["address", "streetaddress", "billingaddress", "jobaddress", "siteaddress", "installaddress"]),
            (field::CLIENT_TYPE, &["clienttype", "customertype", "type"]),
            (field::TRADE_DISCOUNT, &["tradediscountpercent", "tradediscount", "discount", "discountpercent"]),
            (field::NOTES, &["notes", "note", "comments"]),
            (field::SOURCE, &["source", "leadsource", "referral"]),
            (field::STATUS, &["status", "jobstatus", "quotestatus", "paymentstatus"]),
            (field::CLIENT_NAME, &["clientname", "client", "customer"]),
            (field::QUOTE_NUMBER, &["quotenumber", "quoteno", "quote"]),
            (field::JOB_NUMBER, &["jobnumber", "jobno", "jobid", "generatedjobid"]),
            (field::INVOICE_NUMBER, &["invoicenumber", "invoiceno", "invoice"]),
            (field::AMOUNT, &["amount", "total", "totalamount", "quotetotal", "totalinvoiceamount", "value"]),
            (field::DESCRIPTION, &["description", "jobdescription", "workdescription"]),
            (field::SENT_DATE, &["sentdate", "datesent", "sentat", "quotedate"]),
            (field::VALID_UNTIL, &["validuntil", "expirydate", "expires"]),
            (field::DUE_DATE, &["duedate", "paymentduedate", "invoiceduedate", "due"]),
            (field::SCHEDULED_DATE, &["scheduleddate", "installdate", "startdate", "workorderdate"]),
            (field::INSTALLER, &["installer", "assignedto", "crew", "staff"]),
            (field::CARD_NUMBERS, &["cardnumbers", "cards", "cardnumber"]),
        ];
        for (canonical, aliases) in table {
            for alias in *aliases {
                m.insert(*alias, *canonical);
            }
        }
        m
    };
}

fn squash(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Canonical field name for a header, in the context of one entity.
pub fn normalize_header(header: &str, entity: ImportEntity) -> Option<&'static str> {
    let canonical = *HEADER_ALIASES.get(squash(header).as_str())?;
    // "Name" on a quote export is the client's name, and vice versa.
    Some(match (canonical, entity.resolves_client()) {
        (field::NAME, true) => field::CLIENT_NAME,
        (field::CLIENT_NAME, false) => field::NAME,
        _ => canonical,
    })
}

// ─── Value parsing ─────────────────────────────────────────────────────────

/// Parse `YYYY-MM-DD` or `DD/MM/YYYY`. A trailing time part is ignored.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let date_part = raw.split(|c| c == ' ' || c == 'T').next().unwrap_or(raw);
    ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Map a status as written in the file to one of the allowed values,
/// accepting ServiceM8 spellings.
fn normalize_status(raw: &str, entity: ImportEntity, allowed: &[&str]) -> Result<String, String> {
    let s = raw.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    let mapped = match (entity, s.as_str()) {
        (ImportEntity::Jobs, "work_order") => job::status::SCHEDULED,
        (ImportEntity::Jobs, "unsuccessful") => job::status::CANCELLED,
        (ImportEntity::Quotes, "quote") => quote::status::SENT,
        (ImportEntity::Quotes, "unsuccessful") => quote::status::DECLINED,
        (ImportEntity::Quotes, "work_order" | "accepted") => quote::status::APPROVED,
        (ImportEntity::Payments, "unpaid" | "outstanding") => payment::status::PENDING,
        _ => s.as_str(),
    };
    if allowed.contains(&mapped) {
        Ok(mapped.to_string())
    } else {
        Err(format!("invalid status '{}'", raw.trim()))
    }
}

// ─── Reports ───────────────────────────────────────────────────────────────

/// One rejected row. Row numbers count the header as row 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    pub row: u64,
    pub reason: String,
}

/// Outcome of an import.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub entity: ImportEntity,
    pub batch_id: String,
    pub imported: usize,
    pub errors: Vec<RowError>,
}

// ─── Parsing ───────────────────────────────────────────────────────────────

/// A CSV row keyed by canonical field name.
struct Fields<'a> {
    record: &'a StringRecord,
    columns: &'a HashMap<&'static str, usize>,
}

impl Fields<'_> {
    fn get(&self, name: &str) -> Option<&str> {
        let idx = *self.columns.get(name)?;
        self.record.get(idx).map(str::trim).filter(|v| !v.is_empty())
    }

    fn owned(&self, name: &str) -> Option<String> {
        self.get(name).map(str::to_string)
    }

    fn required(&self, name: &str) -> Result<&str, String> {
        self.get(name).ok_or_else(|| format!("missing required field '{name}'"))
    }

    fn date(&self, name: &str) -> Result<Option<NaiveDate>, String> {
        match self.get(name) {
            None => Ok(None),
            Some(v) => parse_date(v)
                .map(Some)
                .ok_or_else(|| format!("{name} '{v}' is not a date (use YYYY-MM-DD or DD/MM/YYYY)")),
        }
    }

    fn client_type(&self) -> Result<String, String> {
        match self.get(field::CLIENT_TYPE) {
            None => Ok(client_type::PUBLIC.to_string()),
            Some(v) => {
                let t = v.to_ascii_lowercase();
                if client_type::ALL.contains(&t.as_str()) {
                    Ok(t)
                } else {
                    Err(format!("client type must be public or trade, got '{v}'"))
                }
            }
        }
    }
}

/// A validated row ready to insert.
enum ImportRow {
    Client(Client),
    Lead(Lead),
    Quote(Quote),
    Job(Job),
    Payment(Payment),
    Staff(StaffMember),
}

impl ImportRow {
    fn insert(&mut self, conn: &Connection) -> FpResult<i64> {
        match self {
            ImportRow::Client(c) => c.save(conn),
            ImportRow::Lead(l) => l.save(conn),
            ImportRow::Quote(q) => q.save(conn),
            ImportRow::Job(j) => j.save(conn),
            ImportRow::Payment(p) => p.save(conn),
            ImportRow::Staff(s) => s.save(conn),
        }
    }
}

/// Resolves client names to IDs, remembering earlier lookups.
struct ClientLookup<'c> {
    conn: &'c Connection,
    cache: HashMap<String, Option<i64>>,
}

impl<'c> ClientLookup<'c> {
    fn new(conn: &'c Connection) -> Self {
        Self { conn, cache: HashMap::new() }
    }

    fn resolve(&mut self, name: &str) -> Result<i64, String> {
        let key = name.trim().to_lowercase();
        if !self.cache.contains_key(&key) {
            let found = Client::find_by_name(self.conn, name)
                .map_err(|e| e.to_string())?
                .and_then(|c| c.id);
            self.cache.insert(key.clone(), found);
        }
        match self.cache.get(&key) {
            Some(Some(id)) => Ok(*id),
            _ => Err(format!("unknown client '{}'", name.trim())),
        }
    }
}

fn build_row(
    entity: ImportEntity,
    f: &Fields<'_>,
    clients: &mut ClientLookup<'_>,
    offset: FixedOffset,
) -> Result<ImportRow, String> {
    for name in entity.required_fields() {
        f.required(name)?;
    }

    let row = match entity {
        ImportEntity::Clients => {
            let mut c = Client::new(f.required(field::NAME)?);
            c.first_name = f.owned(field::FIRST_NAME);
            c.phone = f.owned(field::PHONE);
            c.email = f.owned(field::EMAIL);
            c.address = f.owned(field::ADDRESS);
            c.client_type = f.client_type()?;
            c.notes = f.owned(field::NOTES);
            if let Some(raw) = f.get(field::TRADE_DISCOUNT) {
                let pct: f64 = raw
                    .trim_end_matches('%')
                    .trim()
                    .parse()
                    .map_err(|_| format!("trade discount '{raw}' is not a number"))?;
                c.trade_discount_percent = Some(pct);
            }
            c.validate().map_err(|e| e.to_string())?;
            ImportRow::Client(c)
        }
        ImportEntity::Leads => {
            let mut l = Lead::new(f.required(field::NAME)?);
            l.phone = f.owned(field::PHONE);
            l.email = f.owned(field::EMAIL);
            l.address = f.owned(field::ADDRESS);
            l.source = f.owned(field::SOURCE);
            l.client_type = f.client_type()?;
            l.notes = f.owned(field::NOTES);
            if let Some(s) = f.get(field::STATUS) {
                l.status = normalize_status(s, entity, lead::status::ALL)?;
            }
            l.validate().map_err(|e| e.to_string())?;
            ImportRow::Lead(l)
        }
        ImportEntity::Quotes => {
            let client_id = clients.resolve(f.required(field::CLIENT_NAME)?)?;
            let amount = parse_amount(f.required(field::AMOUNT)?)?;
            let mut q = Quote::new(client_id, amount);
            q.quote_number = f.owned(field::QUOTE_NUMBER).unwrap_or_default();
            q.description = f.owned(field::DESCRIPTION);
            q.valid_until = f.date(field::VALID_UNTIL)?;
            q.sent_at = f.date(field::SENT_DATE)?.map(|d| local_midnight(d, offset));
            if let Some(s) = f.get(field::STATUS) {
                q.status = normalize_status(s, entity, quote::status::ALL)?;
            } else if q.sent_at.is_some() {
                q.status = quote::status::SENT.to_string();
            }
            if q.status == quote::status::SENT && q.sent_at.is_none() {
                return Err("a sent quote needs a sent_date".into());
            }
            q.validate().map_err(|e| e.to_string())?;
            ImportRow::Quote(q)
        }
        ImportEntity::Jobs => {
            let client_id = clients.resolve(f.required(field::CLIENT_NAME)?)?;
            let mut j = Job::new(client_id);
            j.job_number = f.owned(field::JOB_NUMBER).unwrap_or_default();
            j.install_address = f.owned(field::ADDRESS);
            j.scheduled_date = f.date(field::SCHEDULED_DATE)?;
            j.installer = f.owned(field::INSTALLER);
            j.notes = f.owned(field::NOTES).or_else(|| f.owned(field::DESCRIPTION));
            if let Some(s) = f.get(field::STATUS) {
                j.status = normalize_status(s, entity, job::status::ALL)?;
            }
            j.validate().map_err(|e| e.to_string())?;
            ImportRow::Job(j)
        }
        ImportEntity::Payments => {
            let client_id = clients.resolve(f.required(field::CLIENT_NAME)?)?;
            let amount = parse_amount(f.required(field::AMOUNT)?)?;
            let due = f
                .date(field::DUE_DATE)?
                .ok_or_else(|| "missing required field 'due_date'".to_string())?;
            let mut p = Payment::new(client_id, amount, due);
            p.invoice_number = f.owned(field::INVOICE_NUMBER);
            if let Some(s) = f.get(field::STATUS) {
                p.status = normalize_status(s, entity, payment::status::ALL)?;
            }
            p.validate().map_err(|e| e.to_string())?;
            ImportRow::Payment(p)
        }
        ImportEntity::Staff => {
            let mut s = StaffMember::new(
                f.required(field::NAME)?,
                f.owned(field::CARD_NUMBERS).unwrap_or_default(),
            );
            s.phone = f.owned(field::PHONE);
            s.validate().map_err(|e| e.to_string())?;
            ImportRow::Staff(s)
        }
    };
    Ok(row)
}

fn parse_amount(raw: &str) -> Result<rust_decimal::Decimal, String> {
    normalize_amount(raw).ok_or_else(|| format!("amount '{raw}' is not a number"))
}

/// Read the header row and map canonical fields to column indexes.
/// A required column missing from the file fails the whole import.
fn map_columns(
    headers: &StringRecord,
    entity: ImportEntity,
) -> FpResult<HashMap<&'static str, usize>> {
    let mut columns = HashMap::new();
    for (idx, header) in headers.iter().enumerate() {
        match normalize_header(header, entity) {
            // First matching column wins.
            Some(canonical) => {
                columns.entry(canonical).or_insert(idx);
            }
            None => debug!("ignoring unknown {entity} column '{header}'"),
        }
    }
    for required in entity.required_fields() {
        if !columns.contains_key(required) {
            return Err(FpError::Import(format!(
                "{entity} file has no '{required}' column"
            )));
        }
    }
    Ok(columns)
}

/// Parse and insert a CSV file inside an open connection. Valid rows are
/// inserted in the caller's transaction; a row whose insert fails (for
/// example a duplicate quote number) becomes a row error.
/// Parse and insert `data` as `entity`. Dates are business-local days in
/// `offset`.
pub fn import_csv(
    conn: &Connection,
    entity: ImportEntity,
    data: &str,
    offset: FixedOffset,
) -> FpResult<ImportReport> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(data.as_bytes());
    let headers = reader.headers()?.clone();
    let columns = map_columns(&headers, entity)?;

    let mut report = ImportReport {
        entity,
        batch_id: Uuid::new_v4().to_string(),
        imported: 0,
        errors: Vec::new(),
    };

    let mut rows = Vec::new();
    let mut clients = ClientLookup::new(conn);
    for (idx, result) in reader.records().enumerate() {
        let fallback_row = idx as u64 + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                let row = e.position().map(|p| p.line()).unwrap_or(fallback_row);
                report.errors.push(RowError { row, reason: e.to_string() });
                continue;
            }
        };
        let row_number = record.position().map(|p| p.line()).unwrap_or(fallback_row);
        let fields = Fields { record: &record, columns: &columns };
        match build_row(entity, &fields, &mut clients, offset) {
            Ok(row) => rows.push((row_number, row)),
            Err(reason) => report.errors.push(RowError { row: row_number, reason }),
        }
    }

    for (row_number, mut row) in rows {
        match row.insert(conn) {
            Ok(_) => report.imported += 1,
            Err(e) => report.errors.push(RowError { row: row_number, reason: e.to_string() }),
        }
    }
    report.errors.sort_by_key(|e| e.row);

    Ok(report)
}

// ─── Service ───────────────────────────────────────────────────────────────

/// Service for CSV imports.
pub struct ImportService {
    state: ServiceState,
    database: Database,
    event_bus: EventBus,
    offset: FixedOffset,
}

impl ImportService {
    pub fn new(database: Database, event_bus: EventBus) -> Self {
        Self {
            state: ServiceState::Created,
            database,
            event_bus,
            offset: business_offset(PERTH_UTC_OFFSET_HOURS),
        }
    }

    /// Business timezone for imported calendar dates.
    pub fn with_utc_offset(mut self, utc_offset_hours: i32) -> Self {
        self.offset = business_offset(utc_offset_hours);
        self
    }

    /// Import a CSV file as `entity`. All accepted rows commit together.
    pub fn import(&self, entity: ImportEntity, data: &str) -> FpResult<ImportReport> {
        if data.trim().is_empty() {
            return Err(FpError::Import("file is empty".into()));
        }
        let offset = self.offset;
        let report = self.database.transaction(|conn| import_csv(conn, entity, data, offset))?;

        if report.errors.is_empty() {
            info!("imported {} {entity} (batch {})", report.imported, report.batch_id);
        } else {
            warn!(
                "imported {} {entity}, rejected {} rows (batch {})",
                report.imported,
                report.errors.len(),
                report.batch_id
            );
        }
        self.event_bus.emit(AppEvent::ImportCompleted {
            entity: entity.as_str().to_string(),
            batch_id: report.batch_id.clone(),
            imported: report.imported,
            rejected: report.errors.len(),
        });
        Ok(report)
    }

    pub fn template(&self, entity: ImportEntity) -> ImportTemplate {
        entity.template()
    }
}

impl Service for ImportService {
    fn name(&self) -> &str {
        "import"
    }

    fn state(&self) -> ServiceState {
        self.state
    }

    fn init(&mut self) -> FpResult<()> {
        self.state = ServiceState::Running;
        info!("import service initialized");
        Ok(())
    }

    fn shutdown(&mut self) -> FpResult<()> {
        self.state = ServiceState::Stopped;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_header_aliases() {
        assert_eq!(normalize_header("Mobile", ImportEntity::Clients), Some(field::PHONE));
        assert_eq!(normalize_header(" E-mail Address ", ImportEntity::Leads), Some(field::EMAIL));
        assert_eq!(normalize_header("generated_job_id", ImportEntity::Jobs), Some(field::JOB_NUMBER));
        assert_eq!(normalize_header("total_invoice_amount", ImportEntity::Payments), Some(field::AMOUNT));
        assert_eq!(normalize_header("colour", ImportEntity::Jobs), None);
    }

    #[test]
    fn test_name_means_client_on_quotes() {
        assert_eq!(normalize_header("company_name", ImportEntity::Quotes), Some(field::CLIENT_NAME));
        assert_eq!(normalize_header("company_name", ImportEntity::Clients), Some(field::NAME));
        assert_eq!(normalize_header("Client", ImportEntity::Clients), Some(field::NAME));
    }

    #[test]
    fn test_parse_date_formats() {
        let d = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        assert_eq!(parse_date("2024-06-30"), Some(d));
        assert_eq!(parse_date("30/06/2024"), Some(d));
        assert_eq!(parse_date("2024-06-30 09:15:00"), Some(d));
        assert_eq!(parse_date("06/30/2024"), None);
        assert_eq!(parse_date("soon"), None);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            normalize_status("Work Order", ImportEntity::Jobs, job::status::ALL).unwrap(),
            "scheduled"
        );
        assert!(normalize_status("bogus", ImportEntity::Jobs, job::status::ALL).is_err());
    }

    #[test]
    fn test_entity_parse() {
        assert_eq!("Clients".parse::<ImportEntity>().unwrap(), ImportEntity::Clients);
        assert_eq!("staff".parse::<ImportEntity>().unwrap(), ImportEntity::Staff);
        assert!("widgets".parse::<ImportEntity>().is_err());
    }

    #[test]
    fn test_templates_cover_required_fields() {
        for entity in ImportEntity::ALL {
            let template = entity.template();
            assert_eq!(template.headers.len(), template.example.len(), "{entity}");
            for required in entity.required_fields() {
                let present = template
                    .headers
                    .iter()
                    .any(|h| normalize_header(h, entity) == Some(*required));
                assert!(present, "{entity} template lacks {required}");
            }
        }
    }

    #[test]
    fn test_template_csv() {
        let csv = ImportEntity::Staff.template().to_csv().unwrap();
        assert_eq!(csv, "name,phone,card_numbers\nChris Installer,0400 111 222,\"4821,9034\"\n");
    }
}
