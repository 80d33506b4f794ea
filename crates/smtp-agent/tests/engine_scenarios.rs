//! Notification scenarios driven through the public engine API.
//!
//! These tests verify:
//! 1. A new alert produces exactly one delivery attempt
//! 2. A failed delivery is retried and only success marks the alert notified
//! 3. Duplicates inside the re-notification interval are suppressed
//! 4. Resolution is notified exactly once
//! 5. Events for unknown assets and malformed asset events have no effect

use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use smtp_agent::{
    decode_event, AgentConfig, AgentRuntime, AlertEvent, AlertKey, AssetEvent, BusEvent, Email,
    EventOutcome, MailTransport, NotificationEngine, TransportError,
};
use tokio::io::BufReader;

// ============================================================================
// Helpers
// ============================================================================

#[derive(Debug, Clone, Default)]
struct RecordingTransport {
    attempts: Arc<Mutex<Vec<Email>>>,
    failing: Arc<Mutex<bool>>,
}

impl RecordingTransport {
    fn attempts(&self) -> usize {
        self.attempts.lock().len()
    }

    fn last(&self) -> Option<Email> {
        self.attempts.lock().last().cloned()
    }

    fn fail(&self, failing: bool) {
        *self.failing.lock() = failing;
    }
}

impl MailTransport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    fn send(&self, email: &Email) -> Result<(), TransportError> {
        self.attempts.lock().push(email.clone());
        if *self.failing.lock() {
            return Err(TransportError::rejected("relay unavailable"));
        }
        Ok(())
    }
}

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn qwerty() -> BusEvent {
    BusEvent::Asset(AssetEvent::new(
        "QWERTY",
        Some("1"),
        Some("John Doe"),
        Some("a@b.com"),
    ))
}

fn ny_rule(state: &str) -> BusEvent {
    BusEvent::Alert(
        AlertEvent::new("NY_RULE", "QWERTY", state, "CRITICAL")
            .with_description("ASDFKLHJH")
            .with_timestamp(123_456)
            .with_actions("EMAIL"),
    )
}

fn setup() -> (NotificationEngine, RecordingTransport) {
    let transport = RecordingTransport::default();
    let mut engine = NotificationEngine::new(Box::new(transport.clone()));
    assert_eq!(engine.handle(qwerty(), at(100_000)), EventOutcome::AssetUpdated);
    (engine, transport)
}

fn key() -> AlertKey {
    AlertKey::new("NY_RULE", "QWERTY")
}

// ============================================================================
// Delivery
// ============================================================================

#[test]
fn test_single_alert_single_attempt() {
    let (mut engine, transport) = setup();

    assert_eq!(engine.handle(ny_rule("ACTIVE"), at(200_000)), EventOutcome::Notified);

    assert_eq!(transport.attempts(), 1);
    let email = transport.last().unwrap();
    assert_eq!(email.to, "a@b.com");
    assert_eq!(email.subject, "CRITICAL alert on QWERTY from the rule NY_RULE is active!");
    assert!(email.body.contains("Alert priority: P1"));
    assert!(email.body.contains("Alert description: ASDFKLHJH"));
    assert_eq!(
        engine.tracker().get(&key()).unwrap().last_notification,
        Some(at(200_000))
    );
}

#[test]
fn test_failed_send_is_retried_until_success() {
    let (mut engine, transport) = setup();
    transport.fail(true);

    assert_eq!(engine.handle(ny_rule("ACTIVE"), at(200_000)), EventOutcome::SendFailed);
    assert!(engine.tracker().get(&key()).unwrap().last_notification.is_none());

    // still failing: every check is another attempt
    assert_eq!(engine.handle(ny_rule("ACTIVE"), at(200_005)), EventOutcome::SendFailed);
    assert_eq!(transport.attempts(), 2);

    transport.fail(false);
    assert_eq!(engine.handle(ny_rule("ACTIVE"), at(200_010)), EventOutcome::Notified);
    assert_eq!(transport.attempts(), 3);
    assert_eq!(
        engine.tracker().get(&key()).unwrap().last_notification,
        Some(at(200_010))
    );

    let stats = engine.stats();
    assert_eq!(stats.notification_failures, 2);
    assert_eq!(stats.notifications_sent, 1);
}

// ============================================================================
// Scheduling
// ============================================================================

#[test]
fn test_duplicate_within_interval_is_suppressed() {
    let (mut engine, transport) = setup();
    engine.handle(ny_rule("ACTIVE"), at(200_000));

    for offset in [1, 60, 299, 300] {
        assert_eq!(
            engine.handle(ny_rule("ACTIVE"), at(200_000 + offset)),
            EventOutcome::NotDue
        );
    }

    assert_eq!(transport.attempts(), 1);
}

#[test]
fn test_unchanged_active_alert_is_repeated_after_interval() {
    let (mut engine, transport) = setup();
    engine.handle(ny_rule("ACTIVE"), at(200_000));

    assert_eq!(engine.handle(ny_rule("ACTIVE"), at(200_301)), EventOutcome::Notified);
    assert_eq!(engine.handle(ny_rule("ACTIVE"), at(200_400)), EventOutcome::NotDue);
    assert_eq!(engine.handle(ny_rule("ACTIVE"), at(200_602)), EventOutcome::Notified);
    assert_eq!(transport.attempts(), 3);
}

#[test]
fn test_resolution_is_notified_once() {
    let (mut engine, transport) = setup();
    engine.handle(ny_rule("ACTIVE"), at(200_000));

    assert_eq!(engine.handle(ny_rule("RESOLVED"), at(200_010)), EventOutcome::Notified);
    assert_eq!(transport.attempts(), 2);
    let email = transport.last().unwrap();
    assert_eq!(email.subject, "Alert on QWERTY from the rule NY_RULE was resolved");
    assert!(email.body.starts_with("In the system an alert was resolved."));

    let much_later = at(200_010) + Duration::days(30);
    assert_eq!(engine.handle(ny_rule("RESOLVED"), much_later), EventOutcome::NotDue);
    assert_eq!(transport.attempts(), 2);
}

#[test]
fn test_reactivated_alert_is_notified() {
    let (mut engine, transport) = setup();
    engine.handle(ny_rule("ACTIVE"), at(200_000));
    engine.handle(ny_rule("RESOLVED"), at(200_010));

    assert_eq!(engine.handle(ny_rule("ACTIVE"), at(200_020)), EventOutcome::Notified);
    assert_eq!(transport.attempts(), 3);
}

// ============================================================================
// Rejected Input
// ============================================================================

#[test]
fn test_unknown_asset_creates_no_record() {
    let transport = RecordingTransport::default();
    let mut engine = NotificationEngine::new(Box::new(transport.clone()));

    assert_eq!(engine.handle(ny_rule("ACTIVE"), at(200_000)), EventOutcome::Dropped);

    assert!(engine.tracker().is_empty());
    assert_eq!(transport.attempts(), 0);

    // once the asset is known the same alert goes through
    engine.handle(qwerty(), at(200_001));
    assert_eq!(engine.handle(ny_rule("ACTIVE"), at(200_002)), EventOutcome::Notified);
}

#[test]
fn test_malformed_asset_event_is_dropped() {
    let (mut engine, transport) = setup();
    let event = decode_event(
        r#"{"kind":"asset","name":"ASDF","ext":{"contact_name":"John","contact_email":"a@b.com"}}"#,
    )
    .unwrap();

    assert_eq!(engine.handle(event, at(200_000)), EventOutcome::Dropped);
    assert!(!engine.assets().contains("ASDF"));

    let alert = BusEvent::Alert(AlertEvent::new("NY_RULE", "ASDF", "ACTIVE", "CRITICAL"));
    assert_eq!(engine.handle(alert, at(200_001)), EventOutcome::Dropped);
    assert_eq!(transport.attempts(), 0);
}

// ============================================================================
// Runtime
// ============================================================================

#[tokio::test]
async fn test_runtime_processes_event_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"{{"kind":"asset","name":"QWERTY","aux":{{"priority":"1"}},"ext":{{"contact_name":"John","contact_email":"a@b.com"}}}}"#
    )
    .unwrap();
    writeln!(
        file,
        r#"{{"kind":"alert","rule":"NY_RULE","element_src":"QWERTY","description":"ASDFKLHJH","state":"ACTIVE","severity":"CRITICAL","time":123456,"action":"EMAIL"}}"#
    )
    .unwrap();
    writeln!(file, "garbage").unwrap();

    let transport = RecordingTransport::default();
    let config = AgentConfig::from_toml("name = \"agent-smtp-test\"\nqueue_capacity = 1\n").unwrap();
    let engine = NotificationEngine::from_config(&config, Box::new(transport.clone()));

    let input = tokio::fs::File::open(file.path()).await.unwrap();
    let summary = AgentRuntime::new(engine, config.queue_capacity)
        .run_until(BufReader::new(input), std::future::pending())
        .await
        .unwrap();

    assert_eq!(summary.lines_read, 3);
    assert_eq!(summary.lines_rejected, 1);
    assert_eq!(summary.engine.notifications_sent, 1);
    assert_eq!(transport.last().unwrap().to, "a@b.com");
}
