//! Alert lifecycle tracking.
//!
//! The [`AlertTracker`] deduplicates alert events by [`AlertKey`], records
//! when an alert last changed in a meaningful way, and decides whether a
//! notification is due according to the [`NotificationPolicy`].
//!
//! Per alert the lifecycle is `NEW -> ACTIVE -> RESOLVED`. Only incoming
//! events move an alert between states; elapsed time can only make an
//! active alert due again.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, trace};

use crate::events::AlertEvent;
use crate::policy::NotificationPolicy;
use crate::types::{parse_actions, AlertKey, AlertRecord, Priority, Severity};

/// Owns every tracked alert.
#[derive(Debug, Default)]
pub struct AlertTracker {
    policy: NotificationPolicy,
    alerts: HashMap<AlertKey, AlertRecord>,
}

impl AlertTracker {
    /// Creates an empty tracker using the default schedule.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(NotificationPolicy::new())
    }

    /// Creates an empty tracker with the given schedule.
    #[must_use]
    pub fn with_policy(policy: NotificationPolicy) -> Self {
        Self {
            policy,
            alerts: HashMap::new(),
        }
    }

    /// Records an alert event.
    ///
    /// Returns the alert key and whether the event was a significant
    /// change: either the first sighting of the key, or a difference in
    /// description, state, severity, actions or event timestamp.
    pub fn ingest(&mut self, event: &AlertEvent, now: DateTime<Utc>) -> (AlertKey, bool) {
        let key = AlertKey::new(&event.rule_name, &event.asset_name);
        let actions = parse_actions(&event.actions);
        let severity = Severity::from(event.severity.as_str());
        let event_timestamp = event_time(event.timestamp, now);

        let Some(record) = self.alerts.get_mut(&key) else {
            debug!(alert = %key, state = %event.state, severity = %severity, "new alert");
            self.alerts.insert(
                key.clone(),
                AlertRecord {
                    description: event.description.clone(),
                    state: event.state.clone(),
                    severity,
                    actions,
                    event_timestamp,
                    last_update: event_timestamp,
                    last_notification: None,
                },
            );
            return (key, true);
        };

        let changed = record.description != event.description
            || record.state != event.state
            || record.severity != severity
            || record.actions != actions
            || record.event_timestamp != event_timestamp;

        if !changed {
            trace!(alert = %key, "alert unchanged");
            return (key, false);
        }

        debug!(
            alert = %key,
            from_state = %record.state,
            to_state = %event.state,
            severity = %severity,
            "alert changed"
        );
        record.description.clone_from(&event.description);
        record.state.clone_from(&event.state);
        record.severity = severity;
        record.actions = actions;
        record.event_timestamp = event_timestamp;
        // A first sighting may carry a future event timestamp.
        record.last_update = record.last_update.max(now);

        (key, true)
    }

    /// Returns true if a notification should be sent for the alert now.
    ///
    /// An alert is due when it changed since its last notification, or
    /// when it is still active and the re-notification interval for its
    /// severity and the asset priority has elapsed. Resolved alerts are
    /// only notified on the transition itself. Unknown keys are never due.
    #[must_use]
    pub fn is_notification_due(&self, key: &AlertKey, priority: Priority, now: DateTime<Utc>) -> bool {
        let Some(record) = self.alerts.get(key) else {
            return false;
        };

        if record.has_unnotified_change() {
            return true;
        }

        if record.is_resolved() {
            return false;
        }

        let interval = self.policy.interval_for(&record.severity, priority);
        record
            .last_notification
            .map_or(true, |notified| now.signed_duration_since(notified) > interval)
    }

    /// Records that a notification for the alert was delivered at `now`.
    ///
    /// Must only be called once delivery has been confirmed, so that a
    /// failed send is retried on the next check. Returns false if the key
    /// is unknown.
    pub fn mark_notified(&mut self, key: &AlertKey, now: DateTime<Utc>) -> bool {
        match self.alerts.get_mut(key) {
            Some(record) => {
                record.last_notification = Some(now);
                true
            }
            None => false,
        }
    }

    /// Gets a tracked alert.
    #[must_use]
    pub fn get(&self, key: &AlertKey) -> Option<&AlertRecord> {
        self.alerts.get(key)
    }

    /// Iterates over all tracked alerts.
    pub fn iter(&self) -> impl Iterator<Item = (&AlertKey, &AlertRecord)> {
        self.alerts.iter()
    }

    /// Returns the number of tracked alerts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    /// Returns true if no alert is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Forgets resolved alerts that have been stable for longer than
    /// `retention` and whose resolution was already notified.
    ///
    /// Returns the number of alerts removed.
    pub fn prune_resolved(&mut self, retention: Duration, now: DateTime<Utc>) -> usize {
        let before = self.alerts.len();
        self.alerts.retain(|_, record| {
            !(record.is_resolved()
                && !record.has_unnotified_change()
                && now.signed_duration_since(record.last_update) > retention)
        });
        let removed = before - self.alerts.len();

        if removed > 0 {
            debug!(removed, remaining = self.alerts.len(), "pruned resolved alerts");
        }

        removed
    }
}

/// Converts a wire timestamp, substituting `now` for unknown values.
fn event_time(timestamp: i64, now: DateTime<Utc>) -> DateTime<Utc> {
    if timestamp <= 0 {
        return now;
    }
    DateTime::from_timestamp(timestamp, 0).unwrap_or(now)
}
