//! SMS automation: evaluates active campaigns against their trigger
//! entities and sends the messages that are due.
//!
//! One pass walks every active campaign in order. For each campaign the
//! candidates for its trigger type are loaded, filtered by delay, prior
//! outbound messages, phone and client type, then rendered and sent one at
//! a time. A provider failure is logged against the entity and the pass
//! moves on.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use fp_api::SmsSender;
use fp_core::config::{AutomationConfig, CompanyConfig};
use fp_core::constants::entity;
use fp_core::error::{FpError, FpResult};
use fp_models::queries::{self, Recipient};
use fp_models::{Campaign, Database, SmsLog, TriggerType};

use crate::event_bus::{AppEvent, EventBus};
use crate::send_window::{business_offset, is_within_send_window_at, local_midnight, SendWindow};
use crate::service::{Service, ServiceState};
use crate::template::{self, placeholder, RenderContext};

// ─── Reports ───────────────────────────────────────────────────────────────

/// Outcome of one campaign within a pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignReport {
    pub campaign_id: Option<i64>,
    pub campaign_name: String,
    pub trigger_type: String,
    /// The whole campaign was skipped because it is outside its send window.
    pub skipped_window: bool,
    pub considered: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped_not_due: usize,
    pub skipped_already_sent: usize,
    pub skipped_no_phone: usize,
    pub skipped_client_type: usize,
    /// The trigger time plus the campaign delay is out of range.
    pub skipped_bad_delay: usize,
    /// Set when candidates could not be loaded at all.
    pub error: Option<String>,
}

/// Outcome of one full pass over the active campaigns.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub ran_at: DateTime<Utc>,
    pub campaigns: Vec<CampaignReport>,
}

impl PassReport {
    pub fn sent(&self) -> usize {
        self.campaigns.iter().map(|c| c.sent).sum()
    }

    pub fn failed(&self) -> usize {
        self.campaigns.iter().map(|c| c.failed).sum()
    }
}

/// A one-off message typed by staff.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualSms {
    pub to: String,
    pub body: String,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub entity_id: Option<i64>,
}

/// A message that would go out for one trigger entity.
struct Outgoing {
    entity_type: &'static str,
    entity_id: i64,
    base_time: DateTime<Utc>,
    recipient: Recipient,
    context: RenderContext,
}

// ─── Service ───────────────────────────────────────────────────────────────

/// Service that runs SMS automation campaigns.
pub struct AutomationService {
    state: ServiceState,
    database: Database,
    event_bus: EventBus,
    sender: Option<Arc<dyn SmsSender>>,
    company: CompanyConfig,
    offset: FixedOffset,
}

impl AutomationService {
    /// Create a new AutomationService. Without a sender the service runs
    /// degraded: campaigns can be managed but not sent.
    pub fn new(
        database: Database,
        event_bus: EventBus,
        sender: Option<Arc<dyn SmsSender>>,
        company: CompanyConfig,
        automation: &AutomationConfig,
    ) -> Self {
        Self {
            state: ServiceState::Created,
            database,
            event_bus,
            sender,
            company,
            offset: business_offset(automation.utc_offset_hours),
        }
    }

    /// Whether an SMS provider is configured.
    pub fn can_send(&self) -> bool {
        self.sender.is_some()
    }

    fn sender(&self) -> FpResult<Arc<dyn SmsSender>> {
        self.sender
            .clone()
            .ok_or_else(|| FpError::MissingConfig("no SMS provider configured".into()))
    }

    /// Evaluate every active campaign once.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> FpResult<PassReport> {
        let sender = self.sender()?;
        let campaigns = {
            let conn = self.database.conn()?;
            Campaign::load_active(&conn)?
        };
        debug!("automation pass over {} active campaigns", campaigns.len());

        let mut report = PassReport {
            ran_at: now,
            campaigns: Vec::with_capacity(campaigns.len()),
        };
        for campaign in &campaigns {
            let result = self.run_campaign(campaign, sender.as_ref(), now).await;
            report.campaigns.push(result);
        }

        let (sent, failed) = (report.sent(), report.failed());
        if sent > 0 || failed > 0 {
            info!("automation pass: {sent} sent, {failed} failed across {} campaigns", campaigns.len());
        }
        self.event_bus.emit(AppEvent::AutomationPassCompleted {
            campaigns: campaigns.len(),
            sent,
            failed,
        });
        Ok(report)
    }

    async fn run_campaign(
        &self,
        campaign: &Campaign,
        sender: &dyn SmsSender,
        now: DateTime<Utc>,
    ) -> CampaignReport {
        let mut report = CampaignReport {
            campaign_id: campaign.id,
            campaign_name: campaign.name.clone(),
            trigger_type: campaign.trigger_type.as_str().to_string(),
            ..CampaignReport::default()
        };

        if !is_within_send_window_at(campaign.send_window.as_deref(), now, self.offset) {
            debug!("campaign '{}' outside send window", campaign.name);
            report.skipped_window = true;
            return report;
        }

        let candidates = match self.load_candidates(campaign.trigger_type) {
            Ok(c) => c,
            Err(e) => {
                error!("campaign '{}': failed to load candidates: {e}", campaign.name);
                report.error = Some(e.to_string());
                return report;
            }
        };

        for candidate in candidates {
            report.considered += 1;

            let Some(due_at) = campaign.due_at(candidate.base_time) else {
                warn!(
                    "campaign '{}': delay of {}d {}h overflows for {} {}",
                    campaign.name, campaign.delay_days, campaign.delay_hours,
                    candidate.entity_type, candidate.entity_id
                );
                report.skipped_bad_delay += 1;
                continue;
            };
            if now < due_at {
                report.skipped_not_due += 1;
                continue;
            }

            let already_sent = {
                let conn = match self.database.conn() {
                    Ok(c) => c,
                    Err(e) => {
                        error!("campaign '{}': {e}", campaign.name);
                        report.error = Some(e.to_string());
                        return report;
                    }
                };
                SmsLog::has_outbound_for(&conn, candidate.entity_type, candidate.entity_id)
            };
            match already_sent {
                Ok(true) => {
                    report.skipped_already_sent += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        "campaign '{}': could not check history for {} {}: {e}",
                        campaign.name, candidate.entity_type, candidate.entity_id
                    );
                    report.failed += 1;
                    continue;
                }
            }

            let Some(phone) = candidate.recipient.usable_phone().map(str::to_string) else {
                report.skipped_no_phone += 1;
                continue;
            };
            if !campaign.targets_client_type(&candidate.recipient.client_type) {
                report.skipped_client_type += 1;
                continue;
            }

            let body = template::render(&campaign.message_template, &candidate.context);
            let delivered = self
                .deliver(
                    sender,
                    &phone,
                    &body,
                    Some((candidate.entity_type, candidate.entity_id)),
                    campaign.id,
                )
                .await;
            if delivered.is_ok() {
                report.sent += 1;
            } else {
                report.failed += 1;
            }
        }

        report
    }

    /// Load the trigger entities for a campaign and prepare their message
    /// context. The connection is released before anything is sent.
    fn load_candidates(&self, trigger: TriggerType) -> FpResult<Vec<Outgoing>> {
        let conn = self.database.conn()?;
        let out = match trigger {
            TriggerType::PaymentDue => queries::pending_payment_candidates(&conn)?
                .into_iter()
                .filter_map(|c| {
                    let id = c.payment.id?;
                    let context = self
                        .base_context(&c.recipient)
                        .amount(c.payment.amount)
                        .due_date(c.payment.due_date)
                        .set_opt(placeholder::INVOICE_NUMBER, c.payment.invoice_number.clone())
                        .set_opt(placeholder::JOB_NUMBER, c.job_number.clone());
                    Some(Outgoing {
                        entity_type: entity::PAYMENT,
                        entity_id: id,
                        base_time: local_midnight(c.payment.due_date, self.offset),
                        recipient: c.recipient,
                        context,
                    })
                })
                .collect(),
            TriggerType::QuoteSent => queries::sent_quote_candidates(&conn)?
                .into_iter()
                .filter_map(|c| {
                    let id = c.quote.id?;
                    let Some(sent_at) = c.quote.sent_at else {
                        warn!("quote {} is sent but has no sent_at, skipping", c.quote.quote_number);
                        return None;
                    };
                    let context = self
                        .base_context(&c.recipient)
                        .set(placeholder::QUOTE_NUMBER, c.quote.quote_number.clone())
                        .amount(c.quote.total_amount);
                    Some(Outgoing {
                        entity_type: entity::QUOTE,
                        entity_id: id,
                        base_time: sent_at,
                        recipient: c.recipient,
                        context,
                    })
                })
                .collect(),
            TriggerType::NewLead => queries::new_lead_candidates(&conn)?
                .into_iter()
                .filter_map(|c| {
                    let id = c.lead.id?;
                    let context = self
                        .base_context(&c.recipient)
                        .set(placeholder::LEAD_NAME, c.lead.name.clone());
                    Some(Outgoing {
                        entity_type: entity::LEAD,
                        entity_id: id,
                        base_time: c.lead.created_at,
                        recipient: c.recipient,
                        context,
                    })
                })
                .collect(),
        };
        Ok(out)
    }

    fn base_context(&self, recipient: &Recipient) -> RenderContext {
        RenderContext::new()
            .set(placeholder::CLIENT_NAME, recipient.name.clone())
            .set(placeholder::FIRST_NAME, recipient.first_name.clone())
            .set(placeholder::COMPANY_NAME, self.company.name.clone())
            .set(placeholder::COMPANY_PHONE, self.company.phone.clone())
    }

    /// Send one message and log the attempt either way.
    async fn deliver(
        &self,
        sender: &dyn SmsSender,
        to: &str,
        body: &str,
        entity: Option<(&str, i64)>,
        campaign_id: Option<i64>,
    ) -> FpResult<SmsLog> {
        let result = sender.send_sms(to, body).await;

        let mut log = match &result {
            Ok(sent) => SmsLog::sent(to, body, Some(sent.provider_message_id.clone())),
            Err(e) => {
                warn!("sms to {to} failed: {e}");
                SmsLog::failed(to, body, e.to_string())
            }
        };
        log.from_number = sender.from_number();
        if let Some((entity_type, entity_id)) = entity {
            log = log.for_entity(entity_type, entity_id, campaign_id);
        }

        let conn = self.database.conn()?;
        if let Err(e) = log.insert(&conn) {
            error!("failed to log sms to {to}: {e}");
            return Err(e);
        }

        let (entity_type, entity_id) = match entity {
            Some((t, id)) => (Some(t.to_string()), Some(id)),
            None => (None, None),
        };
        match result {
            Ok(sent) => {
                self.event_bus.emit(AppEvent::SmsSent {
                    entity_type,
                    entity_id,
                    campaign_id,
                    to: to.to_string(),
                    provider_message_id: sent.provider_message_id,
                });
                Ok(log)
            }
            Err(e) => {
                self.event_bus.emit(AppEvent::SmsFailed {
                    entity_type,
                    entity_id,
                    campaign_id,
                    to: to.to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Send a one-off message. The attempt is logged like a campaign send,
    /// so a manual message to an entity also suppresses its campaigns.
    pub async fn send_manual(&self, request: &ManualSms) -> FpResult<SmsLog> {
        let to = request.to.trim();
        if to.is_empty() {
            return Err(FpError::Validation("recipient number is required".into()));
        }
        if request.body.trim().is_empty() {
            return Err(FpError::Validation("message body is required".into()));
        }
        let sender = self.sender()?;
        let entity = match (request.entity_type.as_deref(), request.entity_id) {
            (Some(t), Some(id)) => Some((t, id)),
            _ => None,
        };
        self.deliver(sender.as_ref(), to, &request.body, entity, None).await
    }

    /// Record a message received from a client.
    pub fn record_inbound(
        &self,
        from: &str,
        to: &str,
        body: &str,
        provider_message_id: Option<String>,
    ) -> FpResult<SmsLog> {
        if from.trim().is_empty() {
            return Err(FpError::Validation("inbound message has no sender".into()));
        }
        let mut log = SmsLog::received(from.trim(), to.trim(), body, provider_message_id);
        let conn = self.database.conn()?;
        log.insert(&conn)?;
        info!("received sms from {from}");
        self.event_bus.emit(AppEvent::SmsReceived {
            from: from.to_string(),
            body: body.to_string(),
        });
        Ok(log)
    }

    /// Recent SMS log rows, optionally for one entity.
    pub fn recent_logs(&self, limit: i64, entity: Option<(&str, i64)>) -> FpResult<Vec<SmsLog>> {
        let conn = self.database.conn()?;
        SmsLog::load_recent(&conn, limit, entity)
    }

    // ─── Campaign management ─────────────────────────────────────────────

    pub fn campaigns(&self) -> FpResult<Vec<Campaign>> {
        let conn = self.database.conn()?;
        Campaign::load_all(&conn)
    }

    /// Validate and store a campaign. Returns the placeholder names in its
    /// template that the renderer does not know; those are sent verbatim.
    pub fn save_campaign(&self, campaign: &mut Campaign) -> FpResult<Vec<String>> {
        let unknown = check_campaign(campaign)?;
        if !unknown.is_empty() {
            warn!(
                "campaign '{}' uses unknown placeholders: {}",
                campaign.name,
                unknown.join(", ")
            );
        }
        let conn = self.database.conn()?;
        campaign.save(&conn)?;
        Ok(unknown)
    }

    pub fn set_campaign_active(&self, id: i64, active: bool) -> FpResult<Campaign> {
        let conn = self.database.conn()?;
        Campaign::set_active(&conn, id, active)?;
        info!("campaign {id} {}", if active { "enabled" } else { "disabled" });
        Campaign::get(&conn, id)
    }
}

/// Checks that need the renderer or the window parser: the send window
/// must parse when set. Returns unknown placeholder names.
pub fn check_campaign(campaign: &Campaign) -> FpResult<Vec<String>> {
    campaign.validate()?;
    if let Some(window) = campaign.send_window.as_deref().map(str::trim) {
        if !window.is_empty() {
            window.parse::<SendWindow>()?;
        }
    }
    Ok(template::unknown_placeholders(&campaign.message_template))
}

impl Service for AutomationService {
    fn name(&self) -> &str {
        "automation"
    }

    fn state(&self) -> ServiceState {
        self.state
    }

    fn init(&mut self) -> FpResult<()> {
        if self.sender.is_some() {
            self.state = ServiceState::Running;
            info!("automation service initialized");
        } else {
            self.state = ServiceState::Degraded;
            warn!("automation service has no SMS provider; campaigns will not send");
        }
        Ok(())
    }

    fn degraded_reason(&self) -> Option<&str> {
        self.sender.is_none().then_some("no SMS provider configured")
    }

    fn shutdown(&mut self) -> FpResult<()> {
        self.state = ServiceState::Stopped;
        info!("automation service shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_report_totals() {
        let report = PassReport {
            ran_at: Utc::now(),
            campaigns: vec![
                CampaignReport { sent: 2, failed: 1, ..Default::default() },
                CampaignReport { sent: 3, ..Default::default() },
            ],
        };
        assert_eq!(report.sent(), 5);
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn test_check_campaign_rejects_bad_window() {
        let mut c = Campaign::new("Follow up", TriggerType::QuoteSent, "Hi {firstName} {frstName}");
        assert_eq!(check_campaign(&c).unwrap(), vec!["frstName".to_string()]);

        c.send_window = Some("9am-5pm".into());
        assert!(matches!(check_campaign(&c), Err(FpError::Validation(_))));

        c.send_window = Some("  ".into());
        assert!(check_campaign(&c).is_ok());
    }
}
