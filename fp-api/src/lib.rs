//! Fencepost API - outbound HTTP clients.
//!
//! Typed clients for the two external services the back office talks to:
//! the Twilio Messages API for SMS and the Basiq Open Banking API for bank
//! feeds. Both sit behind small async traits so the batch processors can run
//! against in-memory fakes.

pub mod client;
pub mod endpoints;
pub mod provider;
pub mod response;

// Re-export key types
pub use client::HttpClient;
pub use endpoints::basiq::BasiqClient;
pub use endpoints::twilio::TwilioClient;
pub use provider::{BankFeed, FeedAccount, FeedTransaction, SentMessage, SmsSender};
