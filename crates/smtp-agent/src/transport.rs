//! Outbound mail transports.
//!
//! This module provides the [`MailTransport`] trait used by the engine to
//! deliver notifications, and two implementations:
//!
//! - [`MsmtpTransport`] pipes a formatted message into an `msmtp`
//!   compatible program
//! - [`LogTransport`] only logs, for dry runs

use std::fmt;
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;

use chrono::{DateTime, FixedOffset, Local};
use tracing::{debug, info};

use crate::config::MailConfig;
use crate::error::TransportError;

/// A notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Message body.
    pub body: String,
}

impl Email {
    /// Creates a new email.
    #[must_use]
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Trait for mail transports.
///
/// `send` blocks until the transport knows whether the message was
/// accepted. Any error is treated by the engine as retryable.
pub trait MailTransport: Send + Sync + fmt::Debug {
    /// Returns the name of this transport.
    fn name(&self) -> &str;

    /// Delivers an email.
    ///
    /// # Errors
    ///
    /// Returns a `TransportError` if the message was not accepted.
    fn send(&self, email: &Email) -> Result<(), TransportError>;
}

/// Delivers mail by piping it to an `msmtp` compatible program.
///
/// The program is started once per message with the recipients and
/// envelope sender read from the message headers.
#[derive(Debug, Clone)]
pub struct MsmtpTransport {
    program: String,
    host: String,
    from: String,
}

impl MsmtpTransport {
    /// Creates a transport from the mail configuration.
    #[must_use]
    pub fn new(config: &MailConfig) -> Self {
        Self {
            program: config.program.clone(),
            host: config.host.clone(),
            from: config.from.clone(),
        }
    }

    /// Returns the program that is invoked.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the command line arguments passed to the program.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        vec![
            format!("--host={}", self.host),
            "--protocol=smtp".to_string(),
            "--auth=off".to_string(),
            "--tls=off".to_string(),
            "--auto-from=off".to_string(),
            "--read-recipients".to_string(),
            "--read-envelope-from".to_string(),
        ]
    }

    /// Formats the full message, headers included, as piped to the program.
    #[must_use]
    pub fn format_message(&self, email: &Email, date: DateTime<FixedOffset>) -> String {
        format!(
            "From: {}\nTo: {}\nDate: {}\nSubject: {}\n\n{}\n",
            header_value(&self.from),
            header_value(&email.to),
            date.format("%a, %d %b %Y %T %z"),
            header_value(&email.subject),
            email.body,
        )
    }
}

/// Header values must stay on one line.
fn header_value(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

impl MailTransport for MsmtpTransport {
    fn name(&self) -> &str {
        "msmtp"
    }

    fn send(&self, email: &Email) -> Result<(), TransportError> {
        if email.to.trim().is_empty() {
            return Err(TransportError::rejected("empty recipient"));
        }
        if email.to.contains(['\r', '\n']) {
            return Err(TransportError::rejected("recipient contains a line break"));
        }

        let message = self.format_message(email, Local::now().into());

        let mut child = Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| TransportError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // stdin is fed from its own thread while stderr is drained here, so
        // a program that talks before it reads cannot block either side.
        let stdin = child.stdin.take();
        let (output, written) = thread::scope(|scope| {
            let writer = scope.spawn(|| match stdin {
                // Dropping stdin after the write signals end of message.
                Some(mut stdin) => stdin.write_all(message.as_bytes()),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked")));
            (output, written)
        });

        let output = output.map_err(|source| TransportError::Pipe {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(TransportError::NonZeroExit {
                program: self.program.clone(),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        written.map_err(|source| TransportError::Pipe {
            program: self.program.clone(),
            source,
        })?;

        debug!(program = %self.program, to = %email.to, bytes = message.len(), "message piped");
        Ok(())
    }
}

/// A transport that logs notifications instead of sending them.
#[derive(Debug, Clone)]
pub struct LogTransport {
    name: String,
}

impl LogTransport {
    /// Creates a new log transport.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for LogTransport {
    fn default() -> Self {
        Self::new("log")
    }
}

impl MailTransport for LogTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, email: &Email) -> Result<(), TransportError> {
        info!(
            transport = %self.name,
            to = %email.to,
            subject = %email.subject,
            "would send email"
        );
        debug!(body = %email.body, "email body");
        Ok(())
    }
}
