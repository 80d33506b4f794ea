//! Notification subject and body rendering.
//!
//! Templates use `${name}` placeholders. Rendering walks the template once
//! from left to right and replaces every known placeholder with its value;
//! substituted text is never scanned again, and unknown placeholders are
//! copied through unchanged.

use crate::types::{AlertRecord, AssetRecord};

/// Body template for an active alert.
pub const ACTIVE_BODY_TEMPLATE: &str = "In the system an alert was detected. \n\
Source rule: ${rulename}\n\
Asset: ${assetname}\n\
Alert priority: P${priority}\n\
Alert severity: ${severity}\n\
Alert description: ${description}\n\
Alert state: ${state}";

/// Subject template for an active alert.
pub const ACTIVE_SUBJECT_TEMPLATE: &str =
    "${severity} alert on ${assetname} from the rule ${rulename} is active!";

/// Body template for a resolved alert.
pub const RESOLVED_BODY_TEMPLATE: &str = "In the system an alert was resolved. \n\
Source rule: ${rulename}\n\
Asset: ${assetname}\n\
Alert description: ${description}";

/// Subject template for a resolved alert.
pub const RESOLVED_SUBJECT_TEMPLATE: &str =
    "Alert on ${assetname} from the rule ${rulename} was resolved";

/// Renders notification text for an alert on an asset.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageComposer;

impl MessageComposer {
    /// Creates a composer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Renders the subject line.
    #[must_use]
    pub fn render_subject(&self, alert: &AlertRecord, asset: &AssetRecord, rule_name: &str) -> String {
        if alert.is_resolved() {
            render(RESOLVED_SUBJECT_TEMPLATE, &resolved_values(alert, asset, rule_name))
        } else {
            render(ACTIVE_SUBJECT_TEMPLATE, &active_values(alert, asset, rule_name))
        }
    }

    /// Renders the message body.
    #[must_use]
    pub fn render_body(&self, alert: &AlertRecord, asset: &AssetRecord, rule_name: &str) -> String {
        if alert.is_resolved() {
            render(RESOLVED_BODY_TEMPLATE, &resolved_values(alert, asset, rule_name))
        } else {
            render(ACTIVE_BODY_TEMPLATE, &active_values(alert, asset, rule_name))
        }
    }
}

fn resolved_values(alert: &AlertRecord, asset: &AssetRecord, rule_name: &str) -> Vec<(&'static str, String)> {
    vec![
        ("rulename", rule_name.to_string()),
        ("assetname", asset.name.clone()),
        ("description", alert.description.clone()),
    ]
}

fn active_values(alert: &AlertRecord, asset: &AssetRecord, rule_name: &str) -> Vec<(&'static str, String)> {
    let mut values = resolved_values(alert, asset, rule_name);
    values.extend([
        ("priority", asset.priority.to_string()),
        ("severity", alert.severity.to_string()),
        ("state", alert.state.clone()),
    ]);
    values
}

/// Substitutes `${name}` placeholders in a single pass.
#[must_use]
pub fn render(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];

        let value = candidate.find('}').and_then(|end| {
            let name = &candidate[2..end];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (value, end))
        });

        match value {
            Some((value, end)) => {
                out.push_str(value);
                rest = &candidate[end + 1..];
            }
            None => {
                // Unknown or unterminated: keep the marker and rescan after it.
                out.push_str("${");
                rest = &candidate[2..];
            }
        }
    }

    out.push_str(rest);
    out
}
