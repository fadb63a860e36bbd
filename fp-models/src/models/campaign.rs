//! Automation campaign entity model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, Row};
use fp_core::constants::client_type;
use fp_core::error::{FpError, FpResult};

use crate::sql::{db_err, optional};

/// Ten years.
pub const MAX_DELAY_DAYS: i64 = 3650;
/// One year.
pub const MAX_DELAY_HOURS: i64 = 8760;

/// The business event a campaign reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// A pending payment reached its due date.
    PaymentDue,
    /// A quote was sent and has not been answered.
    QuoteSent,
    /// A lead arrived and is still `new`.
    NewLead,
}

impl TriggerType {
    pub const ALL: [TriggerType; 3] = [TriggerType::PaymentDue, TriggerType::QuoteSent, TriggerType::NewLead];

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::PaymentDue => "payment_due",
            TriggerType::QuoteSent => "quote_sent",
            TriggerType::NewLead => "new_lead",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerType {
    type Err = FpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TriggerType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| FpError::Validation(format!("unknown trigger type '{s}'")))
    }
}

impl ToSql for TriggerType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TriggerType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        s.parse().map_err(|e: FpError| FromSqlError::Other(e.to_string().into()))
    }
}

/// A rule that sends an SMS some delay after a trigger event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub delay_days: i64,
    #[serde(default)]
    pub delay_hours: i64,
    /// `HH:MM-HH:MM` in business local time; `None` means any time.
    #[serde(default)]
    pub send_window: Option<String>,
    pub message_template: String,
    /// Restrict to `public` or `trade` recipients; `None` targets both.
    #[serde(default)]
    pub client_type: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Campaign {
    /// Create a new active campaign.
    pub fn new(name: impl Into<String>, trigger_type: TriggerType, template: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name: name.into(),
            trigger_type,
            delay_days: 0,
            delay_hours: 0,
            send_window: None,
            message_template: template.into(),
            client_type: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Construct a Campaign from a database row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            trigger_type: row.get("trigger_type")?,
            delay_days: row.get("delay_days")?,
            delay_hours: row.get("delay_hours")?,
            send_window: row.get("send_window")?,
            message_template: row.get("message_template")?,
            client_type: row.get("client_type")?,
            is_active: row.get::<_, i32>("is_active")? != 0,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Find a campaign by its database ID.
    pub fn find_by_id(conn: &Connection, id: i64) -> FpResult<Option<Self>> {
        optional(conn.query_row(
            "SELECT * FROM automation_campaigns WHERE id = ?1",
            [id],
            Self::from_row,
        ))
    }

    /// Find a campaign by its database ID, failing with `NotFound`.
    pub fn get(conn: &Connection, id: i64) -> FpResult<Self> {
        Self::find_by_id(conn, id)?.ok_or_else(|| FpError::not_found("campaign", id))
    }

    /// Load all campaigns.
    pub fn load_all(conn: &Connection) -> FpResult<Vec<Self>> {
        Self::load_where(conn, "1 = 1")
    }

    /// Load the campaigns the scheduler should evaluate, in ID order.
    pub fn load_active(conn: &Connection) -> FpResult<Vec<Self>> {
        Self::load_where(conn, "is_active = 1")
    }

    fn load_where(conn: &Connection, filter: &str) -> FpResult<Vec<Self>> {
        let sql = format!("SELECT * FROM automation_campaigns WHERE {filter} ORDER BY id");
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map([], Self::from_row)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    /// Delete a campaign by ID. Existing SMS logs keep their rows.
    pub fn delete(conn: &Connection, id: i64) -> FpResult<bool> {
        let changed = conn
            .execute("DELETE FROM automation_campaigns WHERE id = ?1", [id])
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Switch a campaign on or off.
    pub fn set_active(conn: &Connection, id: i64, active: bool) -> FpResult<()> {
        let changed = conn
            .execute(
                "UPDATE automation_campaigns SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
                params![active, Utc::now(), id],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(FpError::not_found("campaign", id));
        }
        Ok(())
    }

    /// Total delay between the trigger event and the message. `None` when
    /// the stored values do not fit in a duration.
    pub fn delay(&self) -> Option<Duration> {
        Duration::try_days(self.delay_days)?.checked_add(&Duration::try_hours(self.delay_hours)?)
    }

    /// When a trigger that happened at `base` becomes due.
    pub fn due_at(&self, base: DateTime<Utc>) -> Option<DateTime<Utc>> {
        base.checked_add_signed(self.delay()?)
    }

    /// Whether a recipient of the given client type is targeted.
    pub fn targets_client_type(&self, recipient_type: &str) -> bool {
        match self.client_type.as_deref() {
            None | Some("") => true,
            Some(wanted) => wanted == recipient_type,
        }
    }

    /// Check field values before writing.
    pub fn validate(&self) -> FpResult<()> {
        if self.name.trim().is_empty() {
            return Err(FpError::Validation("campaign name is required".into()));
        }
        if self.message_template.trim().is_empty() {
            return Err(FpError::Validation("campaign message template is required".into()));
        }
        if self.delay_days < 0 || self.delay_hours < 0 {
            return Err(FpError::Validation("campaign delays cannot be negative".into()));
        }
        if self.delay_days > MAX_DELAY_DAYS || self.delay_hours > MAX_DELAY_HOURS {
            return Err(FpError::Validation(format!(
                "campaign delay too long (at most {MAX_DELAY_DAYS} days and {MAX_DELAY_HOURS} hours)"
            )));
        }
        if let Some(ct) = self.client_type.as_deref() {
            if !ct.is_empty() && !client_type::ALL.contains(&ct) {
                return Err(FpError::Validation(format!("invalid client type '{ct}'")));
            }
        }
        Ok(())
    }

    /// Insert or update this campaign. Returns the database ID.
    pub fn save(&mut self, conn: &Connection) -> FpResult<i64> {
        self.validate()?;
        self.updated_at = Utc::now();

        if let Some(id) = self.id {
            let changed = conn
                .execute(
                    "UPDATE automation_campaigns SET
                        name = ?1, trigger_type = ?2, delay_days = ?3, delay_hours = ?4,
                        send_window = ?5, message_template = ?6, client_type = ?7,
                        is_active = ?8, updated_at = ?9
                    WHERE id = ?10",
                    params![
                        self.name,
                        self.trigger_type,
                        self.delay_days,
                        self.delay_hours,
                        self.send_window,
                        self.message_template,
                        self.client_type,
                        self.is_active,
                        self.updated_at,
                        id,
                    ],
                )
                .map_err(db_err)?;
            if changed == 0 {
                return Err(FpError::not_found("campaign", id));
            }
            return Ok(id);
        }

        conn.execute(
            "INSERT INTO automation_campaigns (
                name, trigger_type, delay_days, delay_hours, send_window,
                message_template, client_type, is_active, created_at, updated_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                self.name,
                self.trigger_type,
                self.delay_days,
                self.delay_hours,
                self.send_window,
                self.message_template,
                self.client_type,
                self.is_active,
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
    fn test_trigger_round_trip_through_db() {
        let conn = conn();
        let mut c = Campaign::new("Follow up", TriggerType::QuoteSent, "Hi {firstName}");
        c.delay_days = 3;
        let id = c.save(&conn).unwrap();
        let loaded = Campaign::get(&conn, id).unwrap();
        assert_eq!(loaded.trigger_type, TriggerType::QuoteSent);
        assert_eq!(loaded.delay(), Some(Duration::hours(72)));
    }

    #[test]
    fn test_load_active_only() {
        let conn = conn();
        Campaign::new("A", TriggerType::NewLead, "x").save(&conn).unwrap();
        let mut off = Campaign::new("B", TriggerType::NewLead, "y");
        off.is_active = false;
        off.save(&conn).unwrap();

        let active = Campaign::load_active(&conn).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "A");
        assert_eq!(Campaign::load_all(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_targets_client_type() {
        let mut c = Campaign::new("A", TriggerType::PaymentDue, "x");
        assert!(c.targets_client_type("public"));
        assert!(c.targets_client_type("trade"));
        c.client_type = Some("trade".into());
        assert!(!c.targets_client_type("public"));
        assert!(c.targets_client_type("trade"));
    }

    #[test]
    fn test_deserialize_api_payload() {
        let c: Campaign = serde_json::from_value(serde_json::json!({
            "name": "Reminder",
            "triggerType": "payment_due",
            "delayDays": 1,
            "sendWindow": "09:00-17:00",
            "messageTemplate": "Hi {clientName}"
        }))
        .unwrap();
        assert_eq!(c.trigger_type, TriggerType::PaymentDue);
        assert_eq!(c.delay_days, 1);
        assert!(c.is_active);
    }

    #[test]
    fn test_validate_rejects_negative_delay() {
        let mut c = Campaign::new("A", TriggerType::NewLead, "x");
        c.delay_hours = -1;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_delay_beyond_ten_years() {
        let mut c = Campaign::new("A", TriggerType::QuoteSent, "x");
        c.delay_days = MAX_DELAY_DAYS;
        c.delay_hours = MAX_DELAY_HOURS;
        assert!(c.validate().is_ok());

        c.delay_days = 100_000_000;
        let err = c.validate().unwrap_err();
        assert!(matches!(err, FpError::Validation(ref m) if m.contains("too long")));

        c.delay_days = 0;
        c.delay_hours = MAX_DELAY_HOURS + 1;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_due_at_overflow_is_none() {
        let base = Utc::now();
        let mut c = Campaign::new("A", TriggerType::QuoteSent, "x");
        c.delay_days = 1;
        assert_eq!(c.due_at(base), Some(base + Duration::days(1)));

        c.delay_days = 100_000_000;
        assert!(c.due_at(base).is_none());
        c.delay_days = i64::MAX;
        assert!(c.delay().is_none());
    }
}
