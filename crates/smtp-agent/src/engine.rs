//! Notification engine.
//!
//! This module provides the [`NotificationEngine`], which joins the asset
//! directory and the alert tracker: asset events update the directory,
//! alert events update the tracker and, when a notification is due, render
//! it and hand it to the mail transport.
//!
//! The engine processes one event at a time and owns all of its state.
//! Callers that receive events concurrently must funnel them through a
//! single owner (see [`crate::runtime`]).

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, info_span, warn, Span};

use crate::assets::AssetDirectory;
use crate::composer::MessageComposer;
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::events::{AlertEvent, AssetEvent, BusEvent};
use crate::tracker::AlertTracker;
use crate::transport::{Email, MailTransport};

/// Target used for delivery audit records.
pub const AUDIT_TARGET: &str = "smtp_agent::audit";

/// Minimum seconds between two retention sweeps.
pub const RETENTION_SWEEP_INTERVAL_SECS: i64 = 60;

/// What happened to an alert event that reached the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// A notification was delivered.
    Notified,
    /// The alert was recorded; no notification was due.
    NotDue,
}

/// What happened to a bus event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The asset directory was updated.
    AssetUpdated,
    /// A notification was delivered.
    Notified,
    /// The alert was recorded; no notification was due.
    NotDue,
    /// The alert was recorded but delivery failed; it stays due.
    SendFailed,
    /// The event was rejected and had no effect.
    Dropped,
}

impl From<AlertOutcome> for EventOutcome {
    fn from(outcome: AlertOutcome) -> Self {
        match outcome {
            AlertOutcome::Notified => Self::Notified,
            AlertOutcome::NotDue => Self::NotDue,
        }
    }
}

/// Running counters for an engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Events handled.
    pub events: u64,
    /// Asset events applied.
    pub assets_updated: u64,
    /// Alert events that reached the tracker.
    pub alerts_ingested: u64,
    /// Events dropped as malformed or for an unknown asset.
    pub dropped: u64,
    /// Notifications delivered.
    pub notifications_sent: u64,
    /// Notification attempts that failed.
    pub notification_failures: u64,
    /// Resolved alerts forgotten by the retention sweep.
    pub alerts_pruned: u64,
}

/// Decides when alerts are mailed and sends them.
#[derive(Debug)]
pub struct NotificationEngine {
    assets: AssetDirectory,
    tracker: AlertTracker,
    composer: MessageComposer,
    transport: Box<dyn MailTransport>,
    resolved_retention: Option<Duration>,
    last_sweep: Option<DateTime<Utc>>,
    stats: EngineStats,
    span: Span,
}

impl NotificationEngine {
    /// Creates an engine that delivers through `transport`.
    #[must_use]
    pub fn new(transport: Box<dyn MailTransport>) -> Self {
        Self {
            assets: AssetDirectory::new(),
            tracker: AlertTracker::new(),
            composer: MessageComposer::new(),
            transport,
            resolved_retention: None,
            last_sweep: None,
            stats: EngineStats::default(),
            span: Span::none(),
        }
    }

    /// Creates an engine named and tuned by the agent configuration.
    #[must_use]
    pub fn from_config(config: &AgentConfig, transport: Box<dyn MailTransport>) -> Self {
        Self::new(transport)
            .with_span(info_span!("engine", agent = %config.name))
            .with_resolved_retention(config.resolved_retention())
    }

    /// Sets the span every log line of this engine is recorded in.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Forget notified resolved alerts after `retention`.
    ///
    /// Sweeps run after alert events, at most once per
    /// [`RETENTION_SWEEP_INTERVAL_SECS`].
    #[must_use]
    pub fn with_resolved_retention(mut self, retention: Option<Duration>) -> Self {
        self.resolved_retention = retention;
        self
    }

    /// Returns the asset directory.
    #[must_use]
    pub const fn assets(&self) -> &AssetDirectory {
        &self.assets
    }

    /// Returns the alert tracker.
    #[must_use]
    pub const fn tracker(&self) -> &AlertTracker {
        &self.tracker
    }

    /// Returns the running counters.
    #[must_use]
    pub const fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Returns the name of the mail transport.
    #[must_use]
    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    /// Handles one bus event.
    ///
    /// Never fails: rejected events and delivery failures are logged and
    /// reported through the outcome.
    pub fn handle(&mut self, event: BusEvent, now: DateTime<Utc>) -> EventOutcome {
        self.stats.events += 1;

        match event {
            BusEvent::Asset(asset) => match self.on_asset_event(asset) {
                Ok(()) => EventOutcome::AssetUpdated,
                Err(_) => EventOutcome::Dropped,
            },
            BusEvent::Alert(alert) => {
                let outcome = match self.on_alert_event(&alert, now) {
                    Ok(outcome) => outcome.into(),
                    Err(AgentError::Transport(_)) => EventOutcome::SendFailed,
                    Err(_) => EventOutcome::Dropped,
                };
                self.sweep_resolved(now);
                outcome
            }
        }
    }

    /// Applies an asset event to the directory.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::MissingField` or `AgentError::InvalidField` if
    /// the event is incomplete; the event is logged and dropped.
    pub fn on_asset_event(&mut self, event: AssetEvent) -> Result<()> {
        let _entered = self.span.clone().entered();
        let name = event.name.clone();

        match event.into_record() {
            Ok(record) => {
                self.assets.upsert(record);
                self.stats.assets_updated += 1;
                Ok(())
            }
            Err(e) => {
                warn!(asset = %name, error = %e, "dropping malformed asset event");
                self.stats.dropped += 1;
                Err(e)
            }
        }
    }

    /// Applies an alert event and mails the asset contact if due.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::UnknownAsset` if the asset has not been seen;
    /// the alert is not recorded. Returns `AgentError::Transport` if
    /// delivery failed; the alert is recorded and stays due.
    pub fn on_alert_event(&mut self, event: &AlertEvent, now: DateTime<Utc>) -> Result<AlertOutcome> {
        let _entered = self.span.clone().entered();

        let asset = match self.assets.lookup(&event.asset_name) {
            Ok(asset) => asset,
            Err(e) => {
                warn!(
                    rule = %event.rule_name,
                    asset = %event.asset_name,
                    "no information is known about the asset, dropping alert"
                );
                self.stats.dropped += 1;
                return Err(e);
            }
        };

        let (key, changed) = self.tracker.ingest(event, now);
        self.stats.alerts_ingested += 1;

        if !self.tracker.is_notification_due(&key, asset.priority, now) {
            debug!(alert = %key, changed, "notification not due");
            return Ok(AlertOutcome::NotDue);
        }

        let Some(alert) = self.tracker.get(&key) else {
            return Ok(AlertOutcome::NotDue);
        };

        let email = Email::new(
            &asset.contact_email,
            self.composer.render_subject(alert, asset, &key.rule_name),
            self.composer.render_body(alert, asset, &key.rule_name),
        );
        let state = alert.state.clone();

        match self.transport.send(&email) {
            Ok(()) => {
                self.tracker.mark_notified(&key, now);
                self.stats.notifications_sent += 1;
                info!(
                    target: AUDIT_TARGET,
                    alert = %key,
                    state = %state,
                    to = %email.to,
                    transport = %self.transport.name(),
                    "notification sent"
                );
                Ok(AlertOutcome::Notified)
            }
            Err(e) => {
                self.stats.notification_failures += 1;
                warn!(
                    target: AUDIT_TARGET,
                    alert = %key,
                    state = %state,
                    to = %email.to,
                    transport = %self.transport.name(),
                    error = %e,
                    "notification failed, will retry"
                );
                Err(e.into())
            }
        }
    }

    fn sweep_resolved(&mut self, now: DateTime<Utc>) {
        let Some(retention) = self.resolved_retention else {
            return;
        };
        if self
            .last_sweep
            .is_some_and(|last| {
                now.signed_duration_since(last) < Duration::seconds(RETENTION_SWEEP_INTERVAL_SECS)
            })
        {
            return;
        }

        self.last_sweep = Some(now);
        let removed = self.tracker.prune_resolved(retention, now);
        self.stats.alerts_pruned += removed as u64;
    }
}
