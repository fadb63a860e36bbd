//! Notifications from the batch processors.
//!
//! The automation, import and reconciliation services publish what they did
//! here; the server logs it and tests assert on it.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Application-level events emitted by the services.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// An outbound SMS was accepted by the provider.
    SmsSent {
        entity_type: Option<String>,
        entity_id: Option<i64>,
        campaign_id: Option<i64>,
        to: String,
        provider_message_id: String,
    },
    /// An outbound SMS could not be sent. The attempt is still logged.
    SmsFailed {
        entity_type: Option<String>,
        entity_id: Option<i64>,
        campaign_id: Option<i64>,
        to: String,
        error: String,
    },
    /// A client replied.
    SmsReceived {
        from: String,
        body: String,
    },
    /// One scheduler pass over all active campaigns finished.
    AutomationPassCompleted {
        campaigns: usize,
        sent: usize,
        failed: usize,
    },
    /// A CSV import finished.
    ImportCompleted {
        entity: String,
        batch_id: String,
        imported: usize,
        rejected: usize,
    },
    /// Open Banking sync finished.
    BankSyncCompleted {
        accounts: usize,
        inserted: usize,
        updated: usize,
    },
    /// Card-number auto allocation finished.
    TransactionsAllocated {
        allocated: usize,
        ambiguous: usize,
    },
}

impl AppEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            AppEvent::SmsSent { .. } => "sms_sent",
            AppEvent::SmsFailed { .. } => "sms_failed",
            AppEvent::SmsReceived { .. } => "sms_received",
            AppEvent::AutomationPassCompleted { .. } => "automation_pass_completed",
            AppEvent::ImportCompleted { .. } => "import_completed",
            AppEvent::BankSyncCompleted { .. } => "bank_sync_completed",
            AppEvent::TransactionsAllocated { .. } => "transactions_allocated",
        }
    }
}

/// Fan-out of [`AppEvent`]s to whoever subscribed.
///
/// Emitting never blocks and never fails. A subscriber that falls more than
/// `capacity` events behind gets `RecvError::Lagged` and skips ahead.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<AppEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender: Arc::new(sender) }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: AppEvent) {
        let kind = event.kind();
        let receivers = self.sender.send(event).unwrap_or(0);
        debug!(event = kind, receivers, "event emitted");
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
