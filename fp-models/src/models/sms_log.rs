//! SMS log entity model. Every outbound attempt and inbound message is
//! recorded here; the campaign evaluator uses these rows to avoid sending
//! twice to the same entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use rusqlite::{params, Connection, Row};
use fp_core::error::{FpError, FpResult};

use crate::sql::{db_err, optional};

/// Message direction values.
pub mod direction {
    pub const OUTBOUND: &str = "outbound";
    pub const INBOUND: &str = "inbound";
}

/// Delivery status values.
pub mod status {
    pub const SENT: &str = "sent";
    pub const FAILED: &str = "failed";
    pub const RECEIVED: &str = "received";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsLog {
    pub id: Option<i64>,
    pub direction: String,
    pub status: String,
    pub to_number: String,
    pub from_number: Option<String>,
    pub body: String,
    pub provider_message_id: Option<String>,
    pub error_message: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub campaign_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl SmsLog {
    /// An outbound message accepted by the provider.
    pub fn sent(to: &str, body: &str, provider_message_id: Option<String>) -> Self {
        Self::outbound(to, body, status::SENT, provider_message_id, None)
    }

    /// An outbound message the provider rejected or never received.
    pub fn failed(to: &str, body: &str, error: impl Into<String>) -> Self {
        Self::outbound(to, body, status::FAILED, None, Some(error.into()))
    }

    /// A message received from a client.
    pub fn received(from: &str, to: &str, body: &str, provider_message_id: Option<String>) -> Self {
        Self {
            id: None,
            direction: direction::INBOUND.to_string(),
            status: status::RECEIVED.to_string(),
            to_number: to.to_string(),
            from_number: Some(from.to_string()),
            body: body.to_string(),
            provider_message_id,
            error_message: None,
            entity_type: None,
            entity_id: None,
            campaign_id: None,
            created_at: Utc::now(),
        }
    }

    fn outbound(
        to: &str,
        body: &str,
        status: &str,
        provider_message_id: Option<String>,
        error_message: Option<String>,
    ) -> Self {
        Self {
            id: None,
            direction: direction::OUTBOUND.to_string(),
            status: status.to_string(),
            to_number: to.to_string(),
            from_number: None,
            body: body.to_string(),
            provider_message_id,
            error_message,
            entity_type: None,
            entity_id: None,
            campaign_id: None,
            created_at: Utc::now(),
        }
    }

    /// Attach the entity (and optionally the campaign) this message is about.
    pub fn for_entity(mut self, entity_type: &str, entity_id: i64, campaign_id: Option<i64>) -> Self {
        self.entity_type = Some(entity_type.to_string());
        self.entity_id = Some(entity_id);
        self.campaign_id = campaign_id;
        self
    }

    /// Construct an SmsLog from a database row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            direction: row.get("direction")?,
            status: row.get("status")?,
            to_number: row.get("to_number")?,
            from_number: row.get("from_number")?,
            body: row.get("body")?,
            provider_message_id: row.get("provider_message_id")?,
            error_message: row.get("error_message")?,
            entity_type: row.get("entity_type")?,
            entity_id: row.get("entity_id")?,
            campaign_id: row.get("campaign_id")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Find a log row by ID.
    pub fn find_by_id(conn: &Connection, id: i64) -> FpResult<Option<Self>> {
        optional(conn.query_row("SELECT * FROM sms_logs WHERE id = ?1", [id], Self::from_row))
    }

    /// Whether any outbound message, sent or failed, has been logged for an
    /// entity. The campaign that produced it is not considered.
    pub fn has_outbound_for(conn: &Connection, entity_type: &str, entity_id: i64) -> FpResult<bool> {
        conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sms_logs
                WHERE entity_type = ?1 AND entity_id = ?2 AND direction = ?3
            )",
            params![entity_type, entity_id, direction::OUTBOUND],
            |row| row.get::<_, bool>(0),
        )
        .map_err(db_err)
    }

    /// Most recent logs first, optionally narrowed to one entity.
    pub fn load_recent(
        conn: &Connection,
        limit: i64,
        entity: Option<(&str, i64)>,
    ) -> FpResult<Vec<Self>> {
        let (entity_type, entity_id) = match entity {
            Some((t, id)) => (Some(t), Some(id)),
            None => (None, None),
        };
        let mut stmt = conn
            .prepare(
                "SELECT * FROM sms_logs
                 WHERE (?1 IS NULL OR entity_type = ?1) AND (?2 IS NULL OR entity_id = ?2)
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?3",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![entity_type, entity_id, limit], Self::from_row)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    /// Insert this log row. Returns the database ID.
    pub fn insert(&mut self, conn: &Connection) -> FpResult<i64> {
        if self.to_number.trim().is_empty() {
            return Err(FpError::Validation("sms log requires a destination number".into()));
        }
        conn.execute(
            "INSERT INTO sms_logs (
                direction, status, to_number, from_number, body, provider_message_id,
                error_message, entity_type, entity_id, campaign_id, created_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
            params![
                self.direction,
                self.status,
                self.to_number,
                self.from_number,
                self.body,
                self.provider_message_id,
                self.error_message,
                self.entity_type,
                self.entity_id,
                self.campaign_id,
                self.created_at,
            ],
        )
        .map_err(db_err)?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn is_outbound(&self) -> bool {
        self.direction == direction::OUTBOUND
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
    fn test_has_outbound_counts_failures() {
        let conn = conn();
        assert!(!SmsLog::has_outbound_for(&conn, "quote", 7).unwrap());
        SmsLog::failed("+61400000000", "hi", "timeout")
            .for_entity("quote", 7, None)
            .insert(&conn)
            .unwrap();
        assert!(SmsLog::has_outbound_for(&conn, "quote", 7).unwrap());
        assert!(!SmsLog::has_outbound_for(&conn, "payment", 7).unwrap());
    }

    #[test]
    fn test_inbound_does_not_suppress() {
        let conn = conn();
        SmsLog::received("+61400000000", "+61800000000", "yes please", None)
            .for_entity("lead", 3, None)
            .insert(&conn)
            .unwrap();
        assert!(!SmsLog::has_outbound_for(&conn, "lead", 3).unwrap());
    }

    #[test]
    fn test_load_recent_filters_entity() {
        let conn = conn();
        SmsLog::sent("+61400000000", "a", Some("SM1".into()))
            .for_entity("lead", 1, None)
            .insert(&conn)
            .unwrap();
        SmsLog::sent("+61400000000", "b", Some("SM2".into()))
            .for_entity("lead", 2, None)
            .insert(&conn)
            .unwrap();
        assert_eq!(SmsLog::load_recent(&conn, 50, None).unwrap().len(), 2);
        let one = SmsLog::load_recent(&conn, 50, Some(("lead", 2))).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].body, "b");
    }

    #[test]
    fn test_insert_requires_number() {
        let conn = conn();
        assert!(SmsLog::sent(" ", "x", None).insert(&conn).is_err());
    }
}
