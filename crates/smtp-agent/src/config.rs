//! Agent configuration.
//!
//! Configuration is read from a TOML file:
//!
//! ```toml
//! name = "agent-smtp"
//! queue_capacity = 1024
//! resolved_retention_secs = 86400
//!
//! [mail]
//! program = "/usr/bin/msmtp"
//! host = "mail.example.com"
//! from = "bios@example.com"
//! ```

use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Default mail program.
pub const DEFAULT_MAIL_PROGRAM: &str = "/usr/bin/msmtp";

/// Settings for the outbound mail program.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MailConfig {
    /// Path to an `msmtp` compatible program.
    #[serde(default = "default_program")]
    pub program: String,
    /// SMTP relay host.
    #[serde(default)]
    pub host: String,
    /// Sender address.
    #[serde(default)]
    pub from: String,
}

fn default_program() -> String {
    DEFAULT_MAIL_PROGRAM.to_string()
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            host: String::new(),
            from: String::new(),
        }
    }
}

/// Main agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentConfig {
    /// Agent name, attached to every log line.
    #[serde(default = "default_name")]
    pub name: String,
    /// Maximum number of decoded events waiting for the engine.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Forget notified resolved alerts after this many seconds. Unset
    /// keeps every alert for the lifetime of the process.
    #[serde(default)]
    pub resolved_retention_secs: Option<u64>,
    /// Mail settings.
    #[serde(default)]
    pub mail: MailConfig,
}

fn default_name() -> String {
    "agent-smtp".to_string()
}

const fn default_queue_capacity() -> usize {
    1024
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            queue_capacity: default_queue_capacity(),
            resolved_retention_secs: None,
            mail: MailConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AgentError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AgentError::Config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AgentError::Config(e.to_string()))
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(AgentError::Config("name cannot be empty".to_string()));
        }

        if self.mail.program.is_empty() {
            return Err(AgentError::Config("mail.program cannot be empty".to_string()));
        }

        if self.mail.program.contains(['\0', '\n', '\r']) {
            return Err(AgentError::Config(
                "mail.program contains control characters".to_string(),
            ));
        }

        if self.mail.host.contains(char::is_whitespace) {
            return Err(AgentError::Config("mail.host cannot contain whitespace".to_string()));
        }

        if self.queue_capacity == 0 {
            return Err(AgentError::Config(
                "queue_capacity must be greater than 0".to_string(),
            ));
        }

        if self.resolved_retention_secs == Some(0) {
            return Err(AgentError::Config(
                "resolved_retention_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Returns the resolved-alert retention, if configured.
    #[must_use]
    pub fn resolved_retention(&self) -> Option<Duration> {
        // Values beyond the representable range mean "keep forever".
        self.resolved_retention_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(Duration::try_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("failed to write temp file");
        file
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = AgentConfig::from_toml("").expect("should parse empty config");

        assert_eq!(config, AgentConfig::default());
        assert_eq!(config.name, "agent-smtp");
        assert_eq!(config.mail.program, "/usr/bin/msmtp");
        assert_eq!(config.queue_capacity, 1024);
        assert!(config.resolved_retention().is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            name = "agent-smtp-2"
            queue_capacity = 16
            resolved_retention_secs = 3600

            [mail]
            program = "/opt/bin/msmtp"
            host = "mail.example.com"
            from = "bios@example.com"
        "#;

        let config = AgentConfig::from_toml(toml).expect("should parse full config");

        assert_eq!(config.name, "agent-smtp-2");
        assert_eq!(config.mail.program, "/opt/bin/msmtp");
        assert_eq!(config.mail.host, "mail.example.com");
        assert_eq!(config.mail.from, "bios@example.com");
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.resolved_retention(), Some(Duration::hours(1)));
    }

    #[test]
    fn test_load_from_file() {
        let file = create_temp_config("[mail]\nhost = \"localhost\"\n");
        let config = AgentConfig::load(file.path()).expect("should load from file");

        assert_eq!(config.mail.host, "localhost");
        assert_eq!(config.mail.program, DEFAULT_MAIL_PROGRAM);
    }

    #[test]
    fn test_file_not_found() {
        let err = AgentConfig::load("/nonexistent/path/config.toml").unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let err = AgentConfig::from_toml("name = ").unwrap_err();
        assert!(err.to_string().contains("invalid TOML"));
    }

    #[test]
    fn test_json_is_not_accepted() {
        let err = AgentConfig::from_toml(r#"{ "name": "agent-smtp" }"#).unwrap_err();
        assert!(err.to_string().contains("invalid TOML"));
    }

    #[test]
    fn test_empty_program_rejected() {
        let err = AgentConfig::from_toml("[mail]\nprogram = \"\"\n").unwrap_err();
        assert!(err.to_string().contains("mail.program cannot be empty"));
    }

    #[test]
    fn test_host_with_whitespace_rejected() {
        let err = AgentConfig::from_toml("[mail]\nhost = \"a b\"\n").unwrap_err();
        assert!(err.to_string().contains("whitespace"));
    }

    #[test]
    fn test_zero_queue_capacity_rejected() {
        let err = AgentConfig::from_toml("queue_capacity = 0").unwrap_err();
        assert!(err.to_string().contains("queue_capacity must be greater than 0"));
    }

    #[test]
    fn test_zero_retention_rejected() {
        let err = AgentConfig::from_toml("resolved_retention_secs = 0").unwrap_err();
        assert!(err.to_string().contains("resolved_retention_secs"));
    }

    #[test]
    fn test_written_config_loads_back() {
        let mut config = AgentConfig {
            resolved_retention_secs: Some(60),
            ..AgentConfig::default()
        };
        config.mail.host = "mail.example.com".to_string();

        let file = create_temp_config(&config.to_toml().unwrap());
        assert_eq!(AgentConfig::load(file.path()).unwrap(), config);
    }
}
