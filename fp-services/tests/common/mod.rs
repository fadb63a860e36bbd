//! Shared test utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use fp_api::{BankFeed, FeedAccount, FeedTransaction, SentMessage, SmsSender};
use fp_core::config::{AppConfig, AutomationConfig, CompanyConfig, ConfigHandle, DatabaseConfig};
use fp_core::error::{FpError, FpResult};
use fp_models::{Campaign, Client, Database, TriggerType};
use fp_services::automation::AutomationService;
use fp_services::event_bus::EventBus;
use fp_services::reconciliation::ReconciliationService;
use tempfile::TempDir;

/// Create a temporary database with full schema and migrations applied.
/// Returns the Database and the TempDir (must be held alive for the duration of the test).
pub fn create_test_db() -> (Database, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = dir.path().join("test.db");
    let config = DatabaseConfig::default();
    let db = Database::init(&path, &config).expect("failed to init test database");
    (db, dir)
}

/// Create a ConfigHandle wrapping a default config.
pub fn create_test_config_handle() -> ConfigHandle {
    ConfigHandle::new(AppConfig::default())
}

/// Create an EventBus with a small buffer suitable for tests.
pub fn create_test_event_bus() -> EventBus {
    EventBus::new(64)
}

pub fn test_company() -> CompanyConfig {
    CompanyConfig {
        name: "Southside Fencing".into(),
        phone: "08 9000 0000".into(),
        ..CompanyConfig::default()
    }
}

// ─── Fake SMS provider ─────────────────────────────────────────────────────

/// In-memory SMS provider. Messages to numbers in `failing` are rejected.
#[derive(Default)]
pub struct FakeSms {
    pub sent: Mutex<Vec<(String, String)>>,
    pub failing: Mutex<HashSet<String>>,
}

impl FakeSms {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_for(&self, number: &str) {
        self.failing.lock().unwrap().insert(number.to_string());
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, b)| b.clone()).collect()
    }
}

#[async_trait]
impl SmsSender for FakeSms {
    async fn send_sms(&self, to: &str, body: &str) -> FpResult<SentMessage> {
        if self.failing.lock().unwrap().contains(to) {
            return Err(FpError::SendFailed(format!("unreachable number {to}")));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((to.to_string(), body.to_string()));
        Ok(SentMessage {
            provider_message_id: format!("SM{:04}", sent.len()),
            status: "queued".into(),
        })
    }

    fn from_number(&self) -> Option<String> {
        Some("+61800000000".into())
    }
}

/// AutomationService wired to a fake provider, already initialized.
pub fn automation_with(db: &Database, sms: Arc<FakeSms>) -> AutomationService {
    use fp_services::service::Service;
    let mut svc = AutomationService::new(
        db.clone(),
        create_test_event_bus(),
        Some(sms),
        test_company(),
        &AutomationConfig::default(),
    );
    svc.init().expect("init automation");
    svc
}

// ─── Fake bank feed ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeFeed {
    pub accounts: Vec<FeedAccount>,
    pub transactions: Mutex<Vec<FeedTransaction>>,
    pub requested_since: Mutex<Vec<Option<NaiveDate>>>,
}

#[async_trait]
impl BankFeed for FakeFeed {
    async fn accounts(&self) -> FpResult<Vec<FeedAccount>> {
        Ok(self.accounts.clone())
    }

    async fn transactions(&self, since: Option<NaiveDate>) -> FpResult<Vec<FeedTransaction>> {
        self.requested_since.lock().unwrap().push(since);
        Ok(self.transactions.lock().unwrap().clone())
    }
}

pub fn reconciliation_with(db: &Database, feed: Option<Arc<FakeFeed>>) -> ReconciliationService {
    use fp_services::service::Service;
    let feed = feed.map(|f| f as Arc<dyn BankFeed>);
    let mut svc = ReconciliationService::new(db.clone(), create_test_event_bus(), feed);
    svc.init().expect("init reconciliation");
    svc
}

pub fn feed_tx(id: &str, day: u32, description: &str, amount: Decimal) -> FeedTransaction {
    FeedTransaction {
        external_id: id.to_string(),
        account_external_id: Some("acc-1".into()),
        posted_on: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
        description: description.to_string(),
        amount,
        direction: None,
    }
}

// ─── Seed helpers ──────────────────────────────────────────────────────────

/// Insert a client and return its ID.
pub fn seed_client(db: &Database, name: &str, phone: Option<&str>, client_type: &str) -> i64 {
    let conn = db.conn().expect("conn");
    let mut client = Client::new(name);
    client.phone = phone.map(str::to_string);
    client.client_type = client_type.to_string();
    client.save(&conn).expect("save client")
}

/// Insert an active campaign and return its ID.
pub fn seed_campaign(
    db: &Database,
    trigger: TriggerType,
    delay_days: i64,
    delay_hours: i64,
    window: Option<&str>,
    template: &str,
) -> i64 {
    let conn = db.conn().expect("conn");
    let mut campaign = Campaign::new(format!("{} test", trigger.as_str()), trigger, template);
    campaign.delay_days = delay_days;
    campaign.delay_hours = delay_hours;
    campaign.send_window = window.map(str::to_string);
    campaign.save(&conn).expect("save campaign")
}
