//! Provider seams used by the batch processors.
//!
//! The campaign evaluator only needs "send this text to this number" and the
//! bank sync only needs "give me accounts and transactions". Real clients
//! implement these against Twilio and Basiq; tests plug in fakes.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use fp_core::error::FpResult;

/// Result of a successful send.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub provider_message_id: String,
    pub status: String,
}

/// Anything that can deliver a text message.
#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Send `body` to `to`. One attempt, no retry.
    async fn send_sms(&self, to: &str, body: &str) -> FpResult<SentMessage>;

    /// Number messages are sent from, when known.
    fn from_number(&self) -> Option<String> {
        None
    }
}

/// An account as reported by a bank feed.
#[derive(Debug, Clone)]
pub struct FeedAccount {
    pub external_id: String,
    pub name: String,
    pub institution: Option<String>,
    pub account_mask: Option<String>,
    pub balance: Option<Decimal>,
    pub currency: String,
}

/// A posted transaction as reported by a bank feed.
#[derive(Debug, Clone)]
pub struct FeedTransaction {
    pub external_id: String,
    pub account_external_id: Option<String>,
    pub posted_on: NaiveDate,
    pub description: String,
    /// Signed: negative for money out.
    pub amount: Decimal,
    /// Explicit direction from the feed, if it sends one.
    pub direction: Option<String>,
}

/// A source of bank accounts and transactions.
#[async_trait]
pub trait BankFeed: Send + Sync {
    async fn accounts(&self) -> FpResult<Vec<FeedAccount>>;

    /// Posted transactions, optionally only those on or after `since`.
    async fn transactions(&self, since: Option<NaiveDate>) -> FpResult<Vec<FeedTransaction>>;
}
