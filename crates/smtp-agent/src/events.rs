//! Inbound bus events.
//!
//! The bus delivers two kinds of messages, modelled as the [`BusEvent`]
//! sum type. On the wire each event is one JSON object tagged by `kind`:
//!
//! ```json
//! {"kind":"asset","name":"QWERTY","aux":{"priority":"1"},"ext":{"contact_name":"John","contact_email":"a@b.com"}}
//! {"kind":"alert","rule":"NY_RULE","element_src":"QWERTY","state":"ACTIVE","severity":"CRITICAL","description":"ASDFKLHJH","time":123456,"action":"EMAIL"}
//! ```
//!
//! Messages that fail to decode are rejected by [`decode_event`] and never
//! reach the engine.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{AgentError, Result};
use crate::types::{AssetRecord, Priority};

/// An event delivered by the bus.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BusEvent {
    /// Asset metadata.
    Asset(AssetEvent),
    /// An alert raised (or resolved) by a rule.
    Alert(AlertEvent),
}

impl BusEvent {
    /// Returns the event kind as a string.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Asset(_) => "asset",
            Self::Alert(_) => "alert",
        }
    }
}

/// Asset metadata as received from the bus.
///
/// Fields are optional because upstream producers may omit them; an
/// incomplete event is rejected by [`AssetEvent::into_record`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "AssetMessage")]
pub struct AssetEvent {
    /// Asset name.
    pub name: String,
    /// Raw priority attribute.
    pub priority: Option<String>,
    /// Contact person.
    pub contact_name: Option<String>,
    /// Contact address.
    pub contact_email: Option<String>,
}

impl AssetEvent {
    /// Creates a new asset event.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        priority: Option<&str>,
        contact_name: Option<&str>,
        contact_email: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            priority: priority.map(ToString::to_string),
            contact_name: contact_name.map(ToString::to_string),
            contact_email: contact_email.map(ToString::to_string),
        }
    }

    /// Converts the event into a complete asset record.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::MissingField` if the name, priority or contact
    /// is absent, and `AgentError::InvalidField` if the priority cannot be
    /// parsed.
    pub fn into_record(self) -> Result<AssetRecord> {
        if self.name.is_empty() {
            return Err(missing_asset_field("name"));
        }

        let priority = self.priority.ok_or_else(|| missing_asset_field("priority"))?;
        let priority = Priority::parse(&priority)?;
        let contact_name = self
            .contact_name
            .ok_or_else(|| missing_asset_field("contact_name"))?;
        let contact_email = self
            .contact_email
            .filter(|email| !email.trim().is_empty())
            .ok_or_else(|| missing_asset_field("contact_email"))?;

        Ok(AssetRecord::new(self.name, priority, contact_name, contact_email))
    }
}

fn missing_asset_field(field: &'static str) -> AgentError {
    AgentError::MissingField {
        kind: "asset",
        field,
    }
}

/// Wire layout of an asset message: priority lives in the auxiliary
/// attributes, contact details in the extended attributes.
#[derive(Deserialize)]
struct AssetMessage {
    name: String,
    #[serde(default)]
    aux: HashMap<String, String>,
    #[serde(default)]
    ext: HashMap<String, String>,
}

impl From<AssetMessage> for AssetEvent {
    fn from(mut msg: AssetMessage) -> Self {
        Self {
            name: msg.name,
            priority: msg.aux.remove("priority"),
            contact_name: msg.ext.remove("contact_name"),
            contact_email: msg.ext.remove("contact_email"),
        }
    }
}

/// An alert as received from the bus.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AlertEvent {
    /// Name of the rule that raised the alert.
    #[serde(rename = "rule")]
    pub rule_name: String,
    /// Name of the asset the alert is about.
    #[serde(rename = "element_src")]
    pub asset_name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Alert state, e.g. `ACTIVE` or `RESOLVED`.
    pub state: String,
    /// Alert severity, e.g. `CRITICAL`.
    pub severity: String,
    /// Unix seconds when the condition was observed; non-positive means
    /// "unknown".
    #[serde(rename = "time", default)]
    pub timestamp: i64,
    /// `/`-separated list of requested actions.
    #[serde(rename = "action", default)]
    pub actions: String,
}

impl AlertEvent {
    /// Creates a new alert event with no description, timestamp or actions.
    #[must_use]
    pub fn new(
        rule_name: impl Into<String>,
        asset_name: impl Into<String>,
        state: impl Into<String>,
        severity: impl Into<String>,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            asset_name: asset_name.into(),
            description: String::new(),
            state: state.into(),
            severity: severity.into(),
            timestamp: 0,
            actions: String::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the event timestamp in Unix seconds.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the raw action list.
    #[must_use]
    pub fn with_actions(mut self, actions: impl Into<String>) -> Self {
        self.actions = actions.into();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.rule_name.is_empty() {
            return Err(AgentError::MissingField {
                kind: "alert",
                field: "rule",
            });
        }
        if self.asset_name.is_empty() {
            return Err(AgentError::MissingField {
                kind: "alert",
                field: "element_src",
            });
        }
        Ok(())
    }
}

/// Decodes one wire message into a bus event.
///
/// # Errors
///
/// Returns `AgentError::Decode` for malformed JSON or an unknown `kind`,
/// and `AgentError::MissingField` for an alert without rule or asset.
pub fn decode_event(line: &str) -> Result<BusEvent> {
    let event: BusEvent = serde_json::from_str(line)?;
    if let BusEvent::Alert(alert) = &event {
        alert.validate()?;
    }
    Ok(event)
}
