//! Job (installation) entity model, with per-section progress and the bill
//! of materials.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use rusqlite::{params, Connection, OptionalExtension, Row};
use fp_core::constants::{document_number, entity, JOB_NUMBER_PREFIX};
use fp_core::error::{FpError, FpResult};

use crate::sql::{db_err, optional};

/// Job status values.
pub mod status {
    pub const SCHEDULED: &str = "scheduled";
    pub const MATERIALS_ORDERED: &str = "materials_ordered";
    pub const IN_PRODUCTION: &str = "in_production";
    pub const READY_TO_INSTALL: &str = "ready_to_install";
    pub const INSTALLING: &str = "installing";
    pub const COMPLETED: &str = "completed";
    pub const CANCELLED: &str = "cancelled";

    pub const ALL: &[&str] = &[
        SCHEDULED,
        MATERIALS_ORDERED,
        IN_PRODUCTION,
        READY_TO_INSTALL,
        INSTALLING,
        COMPLETED,
        CANCELLED,
    ];

    /// Statuses counted as "in production" on the dashboard.
    pub const PRODUCTION: &[&str] = &[MATERIALS_ORDERED, IN_PRODUCTION, READY_TO_INSTALL, INSTALLING];
}

/// An installation section that an installer signs off on site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSection {
    Posts,
    Rails,
    Panels,
    Gates,
    Cleanup,
}

impl JobSection {
    pub const ALL: [JobSection; 5] = [
        JobSection::Posts,
        JobSection::Rails,
        JobSection::Panels,
        JobSection::Gates,
        JobSection::Cleanup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobSection::Posts => "posts",
            JobSection::Rails => "rails",
            JobSection::Panels => "panels",
            JobSection::Gates => "gates",
            JobSection::Cleanup => "cleanup",
        }
    }

    /// Column holding this section's completion flag.
    fn column(&self) -> &'static str {
        match self {
            JobSection::Posts => "posts_complete",
            JobSection::Rails => "rails_complete",
            JobSection::Panels => "panels_complete",
            JobSection::Gates => "gates_complete",
            JobSection::Cleanup => "cleanup_complete",
        }
    }
}

impl fmt::Display for JobSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobSection {
    type Err = FpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobSection::ALL
            .into_iter()
            .find(|section| section.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FpError::Validation(format!("unknown job section '{s}'")))
    }
}

/// A fencing installation job, usually created from an approved quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(default)]
    pub id: Option<i64>,
    /// Assigned on first save when empty.
    #[serde(default)]
    pub job_number: String,
    #[serde(default)]
    pub quote_id: Option<i64>,
    pub client_id: i64,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub install_address: Option<String>,
    #[serde(default)]
    pub scheduled_date: Option<NaiveDate>,
    #[serde(default)]
    pub installer: Option<String>,
    #[serde(default)]
    pub posts_complete: bool,
    #[serde(default)]
    pub rails_complete: bool,
    #[serde(default)]
    pub panels_complete: bool,
    #[serde(default)]
    pub gates_complete: bool,
    #[serde(default)]
    pub cleanup_complete: bool,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_status() -> String {
    status::SCHEDULED.to_string()
}

impl Job {
    /// Create a new scheduled job for a client.
    pub fn new(client_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            job_number: String::new(),
            quote_id: None,
            client_id,
            status: default_status(),
            install_address: None,
            scheduled_date: None,
            installer: None,
            posts_complete: false,
            rails_complete: false,
            panels_complete: false,
            gates_complete: false,
            cleanup_complete: false,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Construct a Job from a database row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            job_number: row.get("job_number")?,
            quote_id: row.get("quote_id")?,
            client_id: row.get("client_id")?,
            status: row.get("status")?,
            install_address: row.get("install_address")?,
            scheduled_date: row.get("scheduled_date")?,
            installer: row.get("installer")?,
            posts_complete: row.get::<_, i32>("posts_complete")? != 0,
            rails_complete: row.get::<_, i32>("rails_complete")? != 0,
            panels_complete: row.get::<_, i32>("panels_complete")? != 0,
            gates_complete: row.get::<_, i32>("gates_complete")? != 0,
            cleanup_complete: row.get::<_, i32>("cleanup_complete")? != 0,
            notes: row.get("notes")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    // ─── Static finders ──────────────────────────────────────────────────

    /// Find a job by its database ID.
    pub fn find_by_id(conn: &Connection, id: i64) -> FpResult<Option<Self>> {
        optional(conn.query_row("SELECT * FROM jobs WHERE id = ?1", [id], Self::from_row))
    }

    /// Find a job by its database ID, failing with `NotFound`.
    pub fn get(conn: &Connection, id: i64) -> FpResult<Self> {
        Self::find_by_id(conn, id)?.ok_or_else(|| FpError::not_found(entity::JOB, id))
    }

    /// Find the job created from a quote, if any.
    pub fn find_by_quote(conn: &Connection, quote_id: i64) -> FpResult<Option<Self>> {
        optional(conn.query_row(
            "SELECT * FROM jobs WHERE quote_id = ?1 ORDER BY id LIMIT 1",
            [quote_id],
            Self::from_row,
        ))
    }

    /// Load jobs ordered by scheduled date, optionally filtered by status.
    pub fn load_all(conn: &Connection, status_filter: Option<&str>) -> FpResult<Vec<Self>> {
        let mut stmt = conn
            .prepare(
                "SELECT * FROM jobs
                 WHERE (?1 IS NULL OR status = ?1)
                 ORDER BY scheduled_date IS NULL, scheduled_date, id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map([status_filter], Self::from_row)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    /// Delete a job by ID. Its BOM goes with it.
    pub fn delete(conn: &Connection, id: i64) -> FpResult<bool> {
        let changed = conn
            .execute("DELETE FROM jobs WHERE id = ?1", [id])
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Next free job number, same scheme as quote numbers.
    pub fn next_number(conn: &Connection) -> FpResult<String> {
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))
            .map_err(db_err)?;
        let mut seq = count + 1;
        loop {
            let candidate = document_number(JOB_NUMBER_PREFIX, seq);
            let taken = conn
                .query_row("SELECT 1 FROM jobs WHERE job_number = ?1", [&candidate], |_| Ok(()))
                .optional()
                .map_err(db_err)?
                .is_some();
            if !taken {
                return Ok(candidate);
            }
            seq += 1;
        }
    }

    /// Mark one installation section complete. Completing the last open
    /// section moves the job to `completed`.
    pub fn complete_section(conn: &Connection, id: i64, section: JobSection) -> FpResult<Self> {
        let sql = format!(
            "UPDATE jobs SET {} = 1, updated_at = ?1 WHERE id = ?2",
            section.column()
        );
        let changed = conn.execute(&sql, params![Utc::now(), id]).map_err(db_err)?;
        if changed == 0 {
            return Err(FpError::not_found(entity::JOB, id));
        }

        let job = Self::get(conn, id)?;
        if job.all_sections_complete() && job.status != status::COMPLETED {
            conn.execute(
                "UPDATE jobs SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status::COMPLETED, Utc::now(), id],
            )
            .map_err(db_err)?;
            return Self::get(conn, id);
        }
        Ok(job)
    }

    // ─── Computed properties ─────────────────────────────────────────────

    /// Whether the job is between ordering materials and finishing install.
    pub fn is_in_production(&self) -> bool {
        status::PRODUCTION.contains(&self.status.as_str())
    }

    /// Whether a given section has been signed off.
    pub fn section_complete(&self, section: JobSection) -> bool {
        match section {
            JobSection::Posts => self.posts_complete,
            JobSection::Rails => self.rails_complete,
            JobSection::Panels => self.panels_complete,
            JobSection::Gates => self.gates_complete,
            JobSection::Cleanup => self.cleanup_complete,
        }
    }

    pub fn all_sections_complete(&self) -> bool {
        JobSection::ALL.iter().all(|s| self.section_complete(*s))
    }

    /// Completed sections as a whole-number percentage.
    pub fn progress_percent(&self) -> u8 {
        let done = JobSection::ALL.iter().filter(|s| self.section_complete(**s)).count();
        (done * 100 / JobSection::ALL.len()) as u8
    }

    /// Check field values before writing.
    pub fn validate(&self) -> FpResult<()> {
        if !status::ALL.contains(&self.status.as_str()) {
            return Err(FpError::Validation(format!("invalid job status '{}'", self.status)));
        }
        Ok(())
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    /// Insert or update this job. Returns the database ID.
    pub fn save(&mut self, conn: &Connection) -> FpResult<i64> {
        self.validate()?;
        self.updated_at = Utc::now();

        if let Some(id) = self.id {
            let changed = conn
                .execute(
                    "UPDATE jobs SET
                        quote_id = ?1, client_id = ?2, status = ?3, install_address = ?4,
                        scheduled_date = ?5, installer = ?6, posts_complete = ?7,
                        rails_complete = ?8, panels_complete = ?9, gates_complete = ?10,
                        cleanup_complete = ?11, notes = ?12, updated_at = ?13
                    WHERE id = ?14",
                    params![
                        self.quote_id,
                        self.client_id,
                        self.status,
                        self.install_address,
                        self.scheduled_date,
                        self.installer,
                        self.posts_complete,
                        self.rails_complete,
                        self.panels_complete,
                        self.gates_complete,
                        self.cleanup_complete,
                        self.notes,
                        self.updated_at,
                        id,
                    ],
                )
                .map_err(db_err)?;
            if changed == 0 {
                return Err(FpError::not_found(entity::JOB, id));
            }
            return Ok(id);
        }

        if self.job_number.trim().is_empty() {
            self.job_number = Self::next_number(conn)?;
        }

        conn.execute(
            "INSERT INTO jobs (
                job_number, quote_id, client_id, status, install_address,
                scheduled_date, installer, posts_complete, rails_complete,
                panels_complete, gates_complete, cleanup_complete, notes,
                created_at, updated_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
            params![
                self.job_number,
                self.quote_id,
                self.client_id,
                self.status,
                self.install_address,
                self.scheduled_date,
                self.installer,
                self.posts_complete,
                self.rails_complete,
                self.panels_complete,
                self.gates_complete,
                self.cleanup_complete,
                self.notes,
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

// ─── Bill of materials ──────────────────────────────────────────────────────

/// One line of a job's bill of materials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BomItem {
    pub description: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub unit_cost: Option<Decimal>,
}

impl BomItem {
    /// Quantity times unit cost, zero when the cost is unknown.
    pub fn line_total(&self) -> Decimal {
        self.unit_cost.map(|c| c * self.quantity).unwrap_or_default()
    }
}

/// The bill of materials for a job. At most one per job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobBom {
    pub id: Option<i64>,
    pub job_id: i64,
    pub items: Vec<BomItem>,
    pub updated_at: DateTime<Utc>,
}

impl JobBom {
    /// Construct a JobBom from a database row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let raw: String = row.get("items")?;
        let items = serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            items,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Load the BOM for a job, if one has been recorded.
    pub fn find_for_job(conn: &Connection, job_id: i64) -> FpResult<Option<Self>> {
        optional(conn.query_row(
            "SELECT * FROM job_boms WHERE job_id = ?1",
            [job_id],
            Self::from_row,
        ))
    }

    /// Replace the BOM for a job, creating it on first write.
    pub fn upsert(conn: &Connection, job_id: i64, items: Vec<BomItem>) -> FpResult<Self> {
        if let Some(bad) = items.iter().find(|i| i.description.trim().is_empty()) {
            return Err(FpError::Validation(format!(
                "BOM item with quantity {} has no description",
                bad.quantity
            )));
        }
        // Surfaces a NotFound rather than a foreign key failure.
        Job::get(conn, job_id)?;

        let json = serde_json::to_string(&items)?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO job_boms (job_id, items, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(job_id) DO UPDATE SET items = excluded.items, updated_at = excluded.updated_at",
            params![job_id, json, now],
        )
        .map_err(db_err)?;

        Self::find_for_job(conn, job_id)?
            .ok_or_else(|| FpError::Internal(format!("BOM for job {job_id} vanished after write")))
    }

    /// Sum of all line totals.
    pub fn total_cost(&self) -> Decimal {
        self.items.iter().map(BomItem::line_total).sum()
    }
}
