//! Integration tests for campaign evaluation against a real database.
//!
//! Covers delay timing, send windows, duplicate suppression, recipient
//! filters, provider failures and the scheduler loop.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;
use tokio::sync::RwLock;

use fp_core::constants::{client_type, entity};
use fp_models::models::sms_log::{direction, status};
use fp_models::{Lead, Payment, Quote, SmsLog, TriggerType};
use fp_services::automation::ManualSms;
use fp_services::event_bus::AppEvent;
use fp_services::scheduler::AutomationScheduler;
use fp_services::service::Service;

use common::{automation_with, create_test_db, seed_campaign, seed_client, FakeSms};

/// A fixed instant: Monday 3 June 2024, 10:00 in Perth.
fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 2, 0, 0).unwrap()
}

fn seed_sent_quote(db: &fp_models::Database, client_id: i64, sent_at: DateTime<Utc>) -> i64 {
    let conn = db.conn().unwrap();
    let mut quote = Quote::new(client_id, dec!(4850));
    let id = quote.save(&conn).unwrap();
    Quote::mark_sent(&conn, id, sent_at).unwrap();
    id
}

// ---- Delay timing ----

#[tokio::test]
async fn quote_follow_up_fires_exactly_at_delay() {
    let (db, _dir) = create_test_db();
    let sms = FakeSms::new();
    let svc = automation_with(&db, sms.clone());

    let client_id = seed_client(&db, "Jane Citizen", Some("0412 000 001"), client_type::PUBLIC);
    let quote_id = seed_sent_quote(&db, client_id, t0());
    seed_campaign(&db, TriggerType::QuoteSent, 3, 0, None, "Hi {firstName}, any questions on {quoteNumber}?");

    let just_before = t0() + ChronoDuration::hours(72) - ChronoDuration::seconds(1);
    let report = svc.run_pass(just_before).await.unwrap();
    assert_eq!(report.sent(), 0);
    assert_eq!(report.campaigns[0].skipped_not_due, 1);
    assert_eq!(sms.sent_count(), 0);

    let report = svc.run_pass(t0() + ChronoDuration::hours(72)).await.unwrap();
    assert_eq!(report.sent(), 1);
    assert_eq!(sms.sent_count(), 1);
    assert_eq!(sms.bodies()[0], "Hi Jane, any questions on Q-00001?");

    let conn = db.conn().unwrap();
    let logs = SmsLog::load_recent(&conn, 10, Some((entity::QUOTE, quote_id))).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].direction, direction::OUTBOUND);
    assert_eq!(logs[0].status, status::SENT);
    assert_eq!(logs[0].provider_message_id.as_deref(), Some("SM0001"));
    assert_eq!(logs[0].from_number.as_deref(), Some("+61800000000"));
}

#[tokio::test]
async fn running_twice_sends_no_duplicate() {
    let (db, _dir) = create_test_db();
    let sms = FakeSms::new();
    let svc = automation_with(&db, sms.clone());

    let client_id = seed_client(&db, "Jane Citizen", Some("0412 000 001"), client_type::PUBLIC);
    seed_sent_quote(&db, client_id, t0());
    seed_campaign(&db, TriggerType::QuoteSent, 0, 1, None, "Following up");

    let later = t0() + ChronoDuration::hours(2);
    svc.run_pass(later).await.unwrap();
    let second = svc.run_pass(later).await.unwrap();

    assert_eq!(sms.sent_count(), 1);
    assert_eq!(second.campaigns[0].skipped_already_sent, 1);
    assert_eq!(second.sent(), 0);
}

#[tokio::test]
async fn payment_reminder_counts_from_start_of_due_day() {
    let (db, _dir) = create_test_db();
    let sms = FakeSms::new();
    let svc = automation_with(&db, sms.clone());

    let client_id = seed_client(&db, "Acme Landscaping", Some("0400 111 222"), client_type::TRADE);
    {
        let conn = db.conn().unwrap();
        let mut payment = Payment::new(client_id, dec!(2425), NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());
        payment.invoice_number = Some("INV-1042".into());
        payment.save(&conn).unwrap();
    }
    seed_campaign(
        &db,
        TriggerType::PaymentDue,
        1,
        0,
        None,
        "{companyName}: invoice {invoiceNumber} for {amount} was due {dueDate}.",
    );

    // Due 2 June Perth midnight, plus one day is 3 June 00:00 Perth.
    let before = Utc.with_ymd_and_hms(2024, 6, 2, 15, 59, 0).unwrap();
    assert_eq!(svc.run_pass(before).await.unwrap().sent(), 0);

    let at = Utc.with_ymd_and_hms(2024, 6, 2, 16, 0, 0).unwrap();
    assert_eq!(svc.run_pass(at).await.unwrap().sent(), 1);
    assert_eq!(
        sms.bodies()[0],
        "Southside Fencing: invoice INV-1042 for $2,425.00 was due 02/06/2024."
    );
}

#[tokio::test]
async fn new_lead_welcome_uses_lead_contact() {
    let (db, _dir) = create_test_db();
    let sms = FakeSms::new();
    let svc = automation_with(&db, sms.clone());

    let created = {
        let conn = db.conn().unwrap();
        let mut lead = Lead::new("Sam Brown");
        lead.phone = Some("0498 765 432".into());
        lead.save(&conn).unwrap();
        lead.created_at
    };
    seed_campaign(&db, TriggerType::NewLead, 0, 1, None, "Thanks {firstName}, call {companyPhone}. {unknownToken}");

    assert_eq!(svc.run_pass(created).await.unwrap().sent(), 0);
    let report = svc.run_pass(created + ChronoDuration::hours(1)).await.unwrap();
    assert_eq!(report.sent(), 1);
    assert_eq!(sms.bodies()[0], "Thanks Sam, call 08 9000 0000. {unknownToken}");
}

#[tokio::test]
async fn oversized_delay_is_rejected_on_save() {
    let (db, _dir) = create_test_db();
    let svc = automation_with(&db, FakeSms::new());

    let mut campaign = fp_models::Campaign::new("Far future", TriggerType::QuoteSent, "Hi");
    campaign.delay_days = 100_000_000;
    let err = svc.save_campaign(&mut campaign).unwrap_err();
    assert!(matches!(err, fp_core::error::FpError::Validation(_)), "got {err:?}");
}

#[tokio::test]
async fn overflowing_stored_delay_skips_instead_of_panicking() {
    let (db, _dir) = create_test_db();
    let sms = FakeSms::new();
    let svc = automation_with(&db, sms.clone());

    let client_id = seed_client(&db, "Jane Citizen", Some("0412 000 001"), client_type::PUBLIC);
    seed_sent_quote(&db, client_id, t0());
    let id = seed_campaign(&db, TriggerType::QuoteSent, 0, 1, None, "Following up");
    // Rows written before the upper bound existed.
    db.conn()
        .unwrap()
        .execute(
            "UPDATE automation_campaigns SET delay_days = 100000000 WHERE id = ?1",
            [id],
        )
        .unwrap();

    let report = svc.run_pass(t0() + ChronoDuration::days(1)).await.unwrap();
    assert_eq!(report.campaigns[0].considered, 1);
    assert_eq!(report.campaigns[0].skipped_bad_delay, 1);
    assert_eq!(report.sent(), 0);
    assert_eq!(sms.sent_count(), 0);
}

// ---- Send window ----

#[tokio::test]
async fn campaign_outside_window_is_skipped_entirely() {
    let (db, _dir) = create_test_db();
    let sms = FakeSms::new();
    let svc = automation_with(&db, sms.clone());

    let client_id = seed_client(&db, "Jane Citizen", Some("0412 000 001"), client_type::PUBLIC);
    seed_sent_quote(&db, client_id, t0());
    seed_campaign(&db, TriggerType::QuoteSent, 0, 0, Some("09:00-17:00"), "Hello");

    // 18:00 Perth.
    let evening = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();
    let report = svc.run_pass(evening).await.unwrap();
    assert!(report.campaigns[0].skipped_window);
    assert_eq!(report.campaigns[0].considered, 0);
    assert_eq!(sms.sent_count(), 0);

    // 17:00 Perth is still inside.
    let five_pm = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
    assert_eq!(svc.run_pass(five_pm).await.unwrap().sent(), 1);
}

// ---- Suppression and filters ----

#[tokio::test]
async fn prior_outbound_from_another_campaign_suppresses() {
    let (db, _dir) = create_test_db();
    let sms = FakeSms::new();
    let svc = automation_with(&db, sms.clone());

    let client_id = seed_client(&db, "Jane Citizen", Some("0412 000 001"), client_type::PUBLIC);
    seed_sent_quote(&db, client_id, t0());
    seed_campaign(&db, TriggerType::QuoteSent, 1, 0, None, "First");
    seed_campaign(&db, TriggerType::QuoteSent, 3, 0, None, "Second");

    svc.run_pass(t0() + ChronoDuration::days(1)).await.unwrap();
    let report = svc.run_pass(t0() + ChronoDuration::days(3)).await.unwrap();

    assert_eq!(sms.bodies(), vec!["First".to_string()]);
    assert_eq!(report.campaigns[1].skipped_already_sent, 1);
}

#[tokio::test]
async fn recipients_without_phone_or_wrong_type_are_skipped() {
    let (db, _dir) = create_test_db();
    let sms = FakeSms::new();
    let svc = automation_with(&db, sms.clone());

    let no_phone = seed_client(&db, "No Phone", None, client_type::TRADE);
    let public = seed_client(&db, "Public Person", Some("0412 000 002"), client_type::PUBLIC);
    let trade = seed_client(&db, "Trade Co", Some("0412 000 003"), client_type::TRADE);
    for id in [no_phone, public, trade] {
        seed_sent_quote(&db, id, t0());
    }
    let campaign_id = seed_campaign(&db, TriggerType::QuoteSent, 0, 0, None, "Trade pricing attached");
    {
        let conn = db.conn().unwrap();
        let mut campaign = fp_models::Campaign::get(&conn, campaign_id).unwrap();
        campaign.client_type = Some(client_type::TRADE.into());
        campaign.save(&conn).unwrap();
    }

    let report = svc.run_pass(t0()).await.unwrap();
    let c = &report.campaigns[0];
    assert_eq!(c.considered, 3);
    assert_eq!(c.skipped_no_phone, 1);
    assert_eq!(c.skipped_client_type, 1);
    assert_eq!(c.sent, 1);
    assert_eq!(sms.sent.lock().unwrap()[0].0, "0412 000 003");
}

// ---- Provider failures ----

#[tokio::test]
async fn failure_is_logged_and_batch_continues() {
    let (db, _dir) = create_test_db();
    let sms = FakeSms::new();
    sms.fail_for("0412 000 001");
    let bus = common::create_test_event_bus();
    let mut events = bus.subscribe();
    let mut svc = fp_services::AutomationService::new(
        db.clone(),
        bus,
        Some(sms.clone()),
        common::test_company(),
        &fp_core::config::AutomationConfig::default(),
    );
    svc.init().unwrap();

    let bad = seed_client(&db, "Bad Number", Some("0412 000 001"), client_type::PUBLIC);
    let good = seed_client(&db, "Good Number", Some("0412 000 002"), client_type::PUBLIC);
    let bad_quote = seed_sent_quote(&db, bad, t0());
    seed_sent_quote(&db, good, t0());
    seed_campaign(&db, TriggerType::QuoteSent, 0, 0, None, "Hello");

    let report = svc.run_pass(t0()).await.unwrap();
    assert_eq!(report.failed(), 1);
    assert_eq!(report.sent(), 1);

    let conn = db.conn().unwrap();
    let logs = SmsLog::load_recent(&conn, 10, Some((entity::QUOTE, bad_quote))).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, status::FAILED);
    assert!(logs[0].error_message.as_deref().unwrap().contains("unreachable"));
    drop(conn);

    // A failed attempt counts as prior outbound; no retry on the next pass.
    let again = svc.run_pass(t0()).await.unwrap();
    assert_eq!(again.failed(), 0);
    assert_eq!(again.campaigns[0].skipped_already_sent, 2);

    let mut saw_failed = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, AppEvent::SmsFailed { .. }) {
            saw_failed = true;
        }
    }
    assert!(saw_failed);
}

// ---- Manual and inbound ----

#[tokio::test]
async fn manual_send_suppresses_campaign_for_entity() {
    let (db, _dir) = create_test_db();
    let sms = FakeSms::new();
    let svc = automation_with(&db, sms.clone());

    let client_id = seed_client(&db, "Jane Citizen", Some("0412 000 001"), client_type::PUBLIC);
    let quote_id = seed_sent_quote(&db, client_id, t0());
    seed_campaign(&db, TriggerType::QuoteSent, 0, 0, None, "Automated");

    let log = svc
        .send_manual(&ManualSms {
            to: "0412 000 001".into(),
            body: "Called you earlier".into(),
            entity_type: Some(entity::QUOTE.into()),
            entity_id: Some(quote_id),
        })
        .await
        .unwrap();
    assert_eq!(log.status, status::SENT);

    let report = svc.run_pass(t0()).await.unwrap();
    assert_eq!(report.sent(), 0);
    assert_eq!(sms.bodies(), vec!["Called you earlier".to_string()]);
}

#[tokio::test]
async fn inbound_does_not_suppress() {
    let (db, _dir) = create_test_db();
    let sms = FakeSms::new();
    let svc = automation_with(&db, sms.clone());

    svc.record_inbound("0412 000 001", "+61800000000", "Yes please", Some("SMin1".into()))
        .unwrap();
    let logs = svc.recent_logs(10, None).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].direction, direction::INBOUND);

    assert!(svc.record_inbound(" ", "+61800000000", "x", None).is_err());
}

#[tokio::test]
async fn run_pass_without_provider_is_missing_config() {
    let (db, _dir) = create_test_db();
    let svc = fp_services::AutomationService::new(
        db.clone(),
        common::create_test_event_bus(),
        None,
        common::test_company(),
        &fp_core::config::AutomationConfig::default(),
    );
    let err = svc.run_pass(t0()).await.unwrap_err();
    assert!(matches!(err, fp_core::error::FpError::MissingConfig(_)));
}

// ---- Scheduler ----

#[tokio::test]
async fn scheduler_runs_passes_until_stopped() {
    let (db, _dir) = create_test_db();
    let sms = FakeSms::new();
    let svc = automation_with(&db, sms.clone());

    let client_id = seed_client(&db, "Jane Citizen", Some("0412 000 001"), client_type::PUBLIC);
    seed_sent_quote(&db, client_id, Utc::now() - ChronoDuration::days(4));
    seed_campaign(&db, TriggerType::QuoteSent, 3, 0, None, "Checking in");

    let scheduler = AutomationScheduler::new(Arc::new(RwLock::new(svc)), Duration::from_millis(20));
    let handle = scheduler.spawn();
    tokio::time::sleep(Duration::from_millis(150)).await;
    handle.stop().await;

    // Several ticks ran, one message went out.
    assert_eq!(sms.sent_count(), 1);
}
