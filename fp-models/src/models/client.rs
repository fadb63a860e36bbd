//! Client (customer) entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use rusqlite::{params, Connection, Row};
use fp_core::constants::{client_type, entity};
use fp_core::error::{FpError, FpResult};

use crate::sql::{db_err, optional};

/// A customer of the business, either a member of the public or a trade
/// account (builders, landscapers) that receives a standing discount.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_client_type")]
    pub client_type: String,
    #[serde(default)]
    pub trade_discount_percent: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_client_type() -> String {
    client_type::PUBLIC.to_string()
}

impl Client {
    /// Create a new public client with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name: name.into(),
            first_name: None,
            phone: None,
            email: None,
            address: None,
            client_type: default_client_type(),
            trade_discount_percent: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Construct a Client from a database row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            first_name: row.get("first_name")?,
            phone: row.get("phone")?,
            email: row.get("email")?,
            address: row.get("address")?,
            client_type: row.get("client_type")?,
            trade_discount_percent: row.get("trade_discount_percent")?,
            notes: row.get("notes")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    // ─── Static finders ──────────────────────────────────────────────────

    /// Find a client by its database ID.
    pub fn find_by_id(conn: &Connection, id: i64) -> FpResult<Option<Self>> {
        optional(conn.query_row("SELECT * FROM clients WHERE id = ?1", [id], Self::from_row))
    }

    /// Find a client by its database ID, failing with `NotFound`.
    pub fn get(conn: &Connection, id: i64) -> FpResult<Self> {
        Self::find_by_id(conn, id)?.ok_or_else(|| FpError::not_found(entity::CLIENT, id))
    }

    /// Find a client by exact name, ignoring case.
    pub fn find_by_name(conn: &Connection, name: &str) -> FpResult<Option<Self>> {
        optional(conn.query_row(
            "SELECT * FROM clients WHERE name = ?1 COLLATE NOCASE ORDER BY id LIMIT 1",
            [name.trim()],
            Self::from_row,
        ))
    }

    /// Load all clients ordered by name.
    pub fn load_all(conn: &Connection) -> FpResult<Vec<Self>> {
        let mut stmt = conn
            .prepare("SELECT * FROM clients ORDER BY name COLLATE NOCASE")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], Self::from_row)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    /// Delete a client by ID.
    pub fn delete(conn: &Connection, id: i64) -> FpResult<bool> {
        let changed = conn
            .execute("DELETE FROM clients WHERE id = ?1", [id])
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    // ─── Computed properties ─────────────────────────────────────────────

    /// First name for message greetings. Falls back to the first word of the
    /// full name.
    pub fn greeting_name(&self) -> String {
        match self.first_name.as_deref().map(str::trim) {
            Some(first) if !first.is_empty() => first.to_string(),
            _ => self
                .name
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }

    /// Whether this is a trade account.
    pub fn is_trade(&self) -> bool {
        self.client_type == client_type::TRADE
    }

    /// Check field values before writing.
    pub fn validate(&self) -> FpResult<()> {
        if self.name.trim().is_empty() {
            return Err(FpError::Validation("client name is required".into()));
        }
        if !client_type::ALL.contains(&self.client_type.as_str()) {
            return Err(FpError::Validation(format!(
                "invalid client type '{}'",
                self.client_type
            )));
        }
        if let Some(pct) = self.trade_discount_percent {
            if !(0.0..=100.0).contains(&pct) {
                return Err(FpError::Validation(format!(
                    "trade discount must be between 0 and 100, got {pct}"
                )));
            }
        }
        Ok(())
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    /// Insert or update this client. Returns the database ID.
    pub fn save(&mut self, conn: &Connection) -> FpResult<i64> {
        self.validate()?;
        self.updated_at = Utc::now();

        if let Some(id) = self.id {
            let changed = conn
                .execute(
                    "UPDATE clients SET
                        name = ?1, first_name = ?2, phone = ?3, email = ?4,
                        address = ?5, client_type = ?6, trade_discount_percent = ?7,
                        notes = ?8, updated_at = ?9
                    WHERE id = ?10",
                    params![
                        self.name,
                        self.first_name,
                        self.phone,
                        self.email,
                        self.address,
                        self.client_type,
                        self.trade_discount_percent,
                        self.notes,
                        self.updated_at,
                        id,
                    ],
                )
                .map_err(db_err)?;
            if changed == 0 {
                return Err(FpError::not_found(entity::CLIENT, id));
            }
            return Ok(id);
        }

        conn.execute(
            "INSERT INTO clients (
                name, first_name, phone, email, address, client_type,
                trade_discount_percent, notes, created_at, updated_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                self.name,
                self.first_name,
                self.phone,
                self.email,
                self.address,
                self.client_type,
                self.trade_discount_percent,
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
