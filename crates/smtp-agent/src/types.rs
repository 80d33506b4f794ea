//! Core types shared by the directory, tracker and composer.
//!
//! - [`Severity`]: the severity carried by an alert event
//! - [`Priority`]: the priority of an asset (1 is the most critical)
//! - [`AssetRecord`]: metadata about one asset and its contact
//! - [`AlertKey`]: the (rule, asset) identity of a tracked alert
//! - [`AlertRecord`]: the tracked state of one alert

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// The alert state value that stops schedule-based re-notification.
pub const RESOLVED_STATE: &str = "RESOLVED";

/// Separator between entries of a raw action list.
pub const ACTION_SEPARATOR: char = '/';

/// The severity of an alert.
///
/// Unrecognized values are preserved verbatim so that they can be
/// compared and rendered exactly as received.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Requires immediate attention.
    Critical,
    /// Should be investigated.
    Warning,
    /// Informational.
    Info,
    /// Any other value.
    Other(String),
}

impl Severity {
    /// Returns the severity as it appears on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Critical => "CRITICAL",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
            Self::Other(raw) => raw,
        }
    }
}

impl From<&str> for Severity {
    fn from(raw: &str) -> Self {
        match raw {
            "CRITICAL" => Self::Critical,
            "WARNING" => Self::Warning,
            "INFO" => Self::Info,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The priority of an asset, where 1 is the most critical.
///
/// Assets normally carry P1..P5; other digits are accepted and simply
/// fall outside the notification schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Priority(u8);

impl Priority {
    /// Creates a priority from its numeric value.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Parses a priority attribute.
    ///
    /// Only the first character is significant, so `"1"` and `"1-high"`
    /// both yield P1.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::InvalidField` if the attribute does not start
    /// with a decimal digit.
    pub fn parse(raw: &str) -> Result<Self> {
        let first = raw.chars().next().ok_or_else(|| AgentError::InvalidField {
            field: "priority",
            reason: "empty value".to_string(),
        })?;

        let digit = first.to_digit(10).ok_or_else(|| AgentError::InvalidField {
            field: "priority",
            reason: format!("'{raw}' does not start with a digit"),
        })?;

        Ok(Self(digit as u8))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata about an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Unique asset name.
    pub name: String,
    /// Asset priority.
    pub priority: Priority,
    /// Name of the person responsible for the asset.
    pub contact_name: String,
    /// Address notifications are mailed to.
    pub contact_email: String,
}

impl AssetRecord {
    /// Creates a new asset record.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        priority: Priority,
        contact_name: impl Into<String>,
        contact_email: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            contact_name: contact_name.into(),
            contact_email: contact_email.into(),
        }
    }
}

/// Identity of a tracked alert.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AlertKey {
    /// Name of the rule that raised the alert.
    pub rule_name: String,
    /// Name of the asset the alert is about.
    pub asset_name: String,
}

impl AlertKey {
    /// Creates a new alert key.
    #[must_use]
    pub fn new(rule_name: impl Into<String>, asset_name: impl Into<String>) -> Self {
        Self {
            rule_name: rule_name.into(),
            asset_name: asset_name.into(),
        }
    }
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.rule_name, self.asset_name)
    }
}

/// Tracked state of one alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRecord {
    /// Human-readable description.
    pub description: String,
    /// Free-form state; [`RESOLVED_STATE`] is the only special value.
    pub state: String,
    /// Alert severity.
    pub severity: Severity,
    /// Actions requested by the rule.
    pub actions: BTreeSet<String>,
    /// When the underlying condition was observed.
    pub event_timestamp: DateTime<Utc>,
    /// When a significant change was last recorded.
    pub last_update: DateTime<Utc>,
    /// When a notification was last sent, if ever.
    pub last_notification: Option<DateTime<Utc>>,
}

impl AlertRecord {
    /// Returns true if the alert is in the resolved state.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.state == RESOLVED_STATE
    }

    /// Returns true if a significant change has not been notified yet.
    #[must_use]
    pub fn has_unnotified_change(&self) -> bool {
        self.last_notification
            .map_or(true, |notified| self.last_update > notified)
    }
}

/// Splits a raw action list into a set of actions.
///
/// Entries are separated by [`ACTION_SEPARATOR`]; surrounding whitespace
/// and empty entries are dropped.
#[must_use]
pub fn parse_actions(raw: &str) -> BTreeSet<String> {
    raw.split(ACTION_SEPARATOR)
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(ToString::to_string)
        .collect()
}
