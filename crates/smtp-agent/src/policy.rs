//! Re-notification schedule.
//!
//! Maps an alert severity and an asset priority onto the minimum time
//! between two notifications for an unchanged alert.

use chrono::Duration;

use crate::types::{Priority, Severity};

/// The notification schedule.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationPolicy;

impl NotificationPolicy {
    /// Creates the policy.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns the re-notification interval for a severity and priority.
    ///
    /// Combinations outside the schedule yield a zero interval, which
    /// makes an unchanged active alert due on every check.
    #[must_use]
    pub fn interval_for(&self, severity: &Severity, priority: Priority) -> Duration {
        match (severity, priority.value()) {
            (Severity::Critical, 1) => Duration::minutes(5),
            (Severity::Critical, 2..=5) => Duration::minutes(15),
            (Severity::Warning, 1) => Duration::hours(1),
            (Severity::Warning, 2..=5) => Duration::hours(4),
            (Severity::Info, 1) => Duration::hours(8),
            (Severity::Info, 2..=5) => Duration::hours(24),
            _ => Duration::zero(),
        }
    }
}
