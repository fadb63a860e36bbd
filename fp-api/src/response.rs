//! Provider response types.
//!
//! Only the fields Fencepost reads are modelled; everything else in the
//! provider payloads is ignored.

use serde::{Deserialize, Serialize};

/// A message resource returned by the Twilio Messages API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwilioMessage {
    /// Message SID, e.g. `SM...`.
    pub sid: String,
    /// Delivery state: `queued`, `accepted`, `sent`, `failed`, ...
    pub status: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl TwilioMessage {
    /// Twilio can accept a request and still mark the message failed.
    pub fn is_failed(&self) -> bool {
        matches!(self.status.as_str(), "failed" | "undelivered" | "canceled")
    }
}

/// Response from `POST /token`.
#[derive(Debug, Clone, Deserialize)]
pub struct BasiqToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds.
    #[serde(default = "default_expiry")]
    pub expires_in: u64,
}

fn default_expiry() -> u64 {
    3600
}

/// Basiq list envelope with cursor links.
#[derive(Debug, Clone, Deserialize)]
pub struct BasiqList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub links: Option<BasiqLinks>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BasiqLinks {
    #[serde(default)]
    pub next: Option<String>,
}

impl<T> BasiqList<T> {
    pub fn next_link(&self) -> Option<&str> {
        self.links.as_ref().and_then(|l| l.next.as_deref())
    }
}

/// An account resource.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasiqAccount {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub account_no: Option<String>,
    #[serde(default)]
    pub balance: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub institution: Option<String>,
}

/// A transaction resource. Amounts arrive as signed decimal strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasiqTransaction {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub description: String,
    pub amount: String,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub post_date: Option<String>,
    #[serde(default)]
    pub transaction_date: Option<String>,
}

impl BasiqTransaction {
    /// Pending card authorisations are not final and are skipped on sync.
    pub fn is_posted(&self) -> bool {
        self.status.as_deref().map_or(true, |s| s == "posted")
    }
}
