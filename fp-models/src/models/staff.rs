//! Staff member entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use rusqlite::{params, Connection, Row};
use fp_core::error::{FpError, FpResult};

use crate::sql::{db_err, optional};

/// An employee holding one or more company cards. Card numbers are stored
/// comma separated (usually the last four digits).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub card_numbers: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl StaffMember {
    pub fn new(name: impl Into<String>, card_numbers: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            phone: None,
            card_numbers: card_numbers.into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// Construct a StaffMember from a database row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            phone: row.get("phone")?,
            card_numbers: row.get("card_numbers")?,
            is_active: row.get::<_, i32>("is_active")? != 0,
            created_at: row.get("created_at")?,
        })
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> FpResult<Option<Self>> {
        optional(conn.query_row(
            "SELECT * FROM staff_members WHERE id = ?1",
            [id],
            Self::from_row,
        ))
    }

    pub fn get(conn: &Connection, id: i64) -> FpResult<Self> {
        Self::find_by_id(conn, id)?.ok_or_else(|| FpError::not_found("staff member", id))
    }

    /// Load staff members ordered by name.
    pub fn load_all(conn: &Connection, active_only: bool) -> FpResult<Vec<Self>> {
        let sql = if active_only {
            "SELECT * FROM staff_members WHERE is_active = 1 ORDER BY name COLLATE NOCASE"
        } else {
            "SELECT * FROM staff_members ORDER BY name COLLATE NOCASE"
        };
        let mut stmt = conn.prepare(sql).map_err(db_err)?;
        let rows = stmt
            .query_map([], Self::from_row)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    pub fn delete(conn: &Connection, id: i64) -> FpResult<bool> {
        let changed = conn
            .execute("DELETE FROM staff_members WHERE id = ?1", [id])
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Individual card numbers, trimmed, blanks dropped.
    pub fn cards(&self) -> Vec<&str> {
        self.card_numbers
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect()
    }

    pub fn validate(&self) -> FpResult<()> {
        if self.name.trim().is_empty() {
            return Err(FpError::Validation("staff name is required".into()));
        }
        Ok(())
    }

    /// Insert or update this staff member. Returns the database ID.
    pub fn save(&mut self, conn: &Connection) -> FpResult<i64> {
        self.validate()?;
        // Normalise "1234 , 5678," to "1234,5678".
        self.card_numbers = self.cards().join(",");

        if let Some(id) = self.id {
            let changed = conn
                .execute(
                    "UPDATE staff_members SET name = ?1, phone = ?2, card_numbers = ?3, is_active = ?4
                     WHERE id = ?5",
                    params![self.name, self.phone, self.card_numbers, self.is_active, id],
                )
                .map_err(db_err)?;
            if changed == 0 {
                return Err(FpError::not_found("staff member", id));
            }
            return Ok(id);
        }

        conn.execute(
            "INSERT INTO staff_members (name, phone, card_numbers, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![self.name, self.phone, self.card_numbers, self.is_active, self.created_at],
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

    #[test]
    fn test_cards_split() {
        let s = StaffMember::new("Alex", " 1234, 5678 ,,");
        assert_eq!(s.cards(), vec!["1234", "5678"]);
    }

    #[test]
    fn test_save_normalises_cards() {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        let mut s = StaffMember::new("Alex", "1234 , 5678,");
        let id = s.save(&conn).unwrap();
        let loaded = StaffMember::get(&conn, id).unwrap();
        assert_eq!(loaded.card_numbers, "1234,5678");
        assert!(loaded.is_active);
    }

    #[test]
    fn test_active_filter() {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        StaffMember::new("A", "1").save(&conn).unwrap();
        let mut gone = StaffMember::new("B", "2");
        gone.is_active = false;
        gone.save(&conn).unwrap();
        assert_eq!(StaffMember::load_all(&conn, true).unwrap().len(), 1);
        assert_eq!(StaffMember::load_all(&conn, false).unwrap().len(), 2);
    }
}
