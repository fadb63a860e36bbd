//! Lead (sales enquiry) entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use rusqlite::{params, Connection, Row};
use fp_core::constants::{client_type, entity};
use fp_core::error::{FpError, FpResult};

use crate::sql::{db_err, optional};

/// Lead status values.
pub mod status {
    pub const NEW: &str = "new";
    pub const CONTACTED: &str = "contacted";
    pub const QUOTED: &str = "quoted";
    pub const WON: &str = "won";
    pub const LOST: &str = "lost";

    pub const ALL: &[&str] = &[NEW, CONTACTED, QUOTED, WON, LOST];

    /// Statuses that still need sales attention.
    pub const OPEN: &[&str] = &[NEW, CONTACTED, QUOTED];
}

/// An enquiry that has not necessarily become a client yet. Carries its own
/// contact details so the welcome campaign can reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_client_type")]
    pub client_type: String,
    #[serde(default)]
    pub client_id: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_status() -> String {
    status::NEW.to_string()
}

fn default_client_type() -> String {
    client_type::PUBLIC.to_string()
}

impl Lead {
    /// Create a new lead in `new` status.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name: name.into(),
            phone: None,
            email: None,
            address: None,
            source: None,
            status: default_status(),
            client_type: default_client_type(),
            client_id: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Construct a Lead from a database row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            phone: row.get("phone")?,
            email: row.get("email")?,
            address: row.get("address")?,
            source: row.get("source")?,
            status: row.get("status")?,
            client_type: row.get("client_type")?,
            client_id: row.get("client_id")?,
            notes: row.get("notes")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Find a lead by its database ID.
    pub fn find_by_id(conn: &Connection, id: i64) -> FpResult<Option<Self>> {
        optional(conn.query_row("SELECT * FROM leads WHERE id = ?1", [id], Self::from_row))
    }

    /// Find a lead by its database ID, failing with `NotFound`.
    pub fn get(conn: &Connection, id: i64) -> FpResult<Self> {
        Self::find_by_id(conn, id)?.ok_or_else(|| FpError::not_found(entity::LEAD, id))
    }

    /// Load leads, newest first, optionally filtered by status.
    pub fn load_all(conn: &Connection, status_filter: Option<&str>) -> FpResult<Vec<Self>> {
        let mut stmt = conn
            .prepare(
                "SELECT * FROM leads
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

    /// Delete a lead by ID.
    pub fn delete(conn: &Connection, id: i64) -> FpResult<bool> {
        let changed = conn
            .execute("DELETE FROM leads WHERE id = ?1", [id])
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Set the status of a lead.
    pub fn set_status(conn: &Connection, id: i64, new_status: &str) -> FpResult<()> {
        if !status::ALL.contains(&new_status) {
            return Err(FpError::Validation(format!("invalid lead status '{new_status}'")));
        }
        let changed = conn
            .execute(
                "UPDATE leads SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![new_status, Utc::now(), id],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(FpError::not_found(entity::LEAD, id));
        }
        Ok(())
    }

    /// First word of the lead's name, used in greetings.
    pub fn first_name(&self) -> String {
        self.name.split_whitespace().next().unwrap_or_default().to_string()
    }

    /// Whether the lead still needs sales attention.
    pub fn is_open(&self) -> bool {
        status::OPEN.contains(&self.status.as_str())
    }

    /// Check field values before writing.
    pub fn validate(&self) -> FpResult<()> {
        if self.name.trim().is_empty() {
            return Err(FpError::Validation("lead name is required".into()));
        }
        if !status::ALL.contains(&self.status.as_str()) {
            return Err(FpError::Validation(format!("invalid lead status '{}'", self.status)));
        }
        if !client_type::ALL.contains(&self.client_type.as_str()) {
            return Err(FpError::Validation(format!(
                "invalid client type '{}'",
                self.client_type
            )));
        }
        Ok(())
    }

    /// Insert or update this lead. Returns the database ID.
    pub fn save(&mut self, conn: &Connection) -> FpResult<i64> {
        self.validate()?;
        self.updated_at = Utc::now();

        if let Some(id) = self.id {
            let changed = conn
                .execute(
                    "UPDATE leads SET
                        name = ?1, phone = ?2, email = ?3, address = ?4, source = ?5,
                        status = ?6, client_type = ?7, client_id = ?8, notes = ?9,
                        updated_at = ?10
                    WHERE id = ?11",
                    params![
                        self.name,
                        self.phone,
                        self.email,
                        self.address,
                        self.source,
                        self.status,
                        self.client_type,
                        self.client_id,
                        self.notes,
                        self.updated_at,
                        id,
                    ],
                )
                .map_err(db_err)?;
            if changed == 0 {
                return Err(FpError::not_found(entity::LEAD, id));
            }
            return Ok(id);
        }

        conn.execute(
            "INSERT INTO leads (
                name, phone, email, address, source, status, client_type,
                client_id, notes, created_at, updated_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
            params![
                self.name,
                self.phone,
                self.email,
                self.address,
                self.source,
                self.status,
                self.client_type,
                self.client_id,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        conn
    }

    #[test]
    fn test_lead_defaults_to_new() {
        let lead = Lead::new("Sam Jones");
        assert_eq!(lead.status, status::NEW);
        assert!(lead.is_open());
        assert_eq!(lead.first_name(), "Sam");
    }

    #[test]
    fn test_status_filter() {
        let conn = conn();
        Lead::new("A").save(&conn).unwrap();
        let mut won = Lead::new("B");
        won.status = status::WON.into();
        won.save(&conn).unwrap();

        assert_eq!(Lead::load_all(&conn, None).unwrap().len(), 2);
        let new_only = Lead::load_all(&conn, Some(status::NEW)).unwrap();
        assert_eq!(new_only.len(), 1);
        assert_eq!(new_only[0].name, "A");
    }

    #[test]
    fn test_set_status_rejects_unknown() {
        let conn = conn();
        let id = Lead::new("A").save(&conn).unwrap();
        assert!(Lead::set_status(&conn, id, "maybe").is_err());
        Lead::set_status(&conn, id, status::CONTACTED).unwrap();
        assert_eq!(Lead::get(&conn, id).unwrap().status, status::CONTACTED);
    }

    #[test]
    fn test_deserialize_camel_case() {
        let lead: Lead = serde_json::from_value(serde_json::json!({
            "name": "Pat",
            "clientType": "trade",
            "phone": "0400 000 000"
        }))
        .unwrap();
        assert_eq!(lead.client_type, "trade");
        assert_eq!(lead.status, "new");
        assert!(lead.id.is_none());
    }
}
