//! Alert notification agent.
//!
//! `smtp-agent` listens to asset and alert events, keeps track of every
//! alert per (rule, asset) pair, and mails the asset contact when an alert
//! appears, changes, resolves, or stays active past its re-notification
//! interval.
//!
//! # Features
//!
//! - **Asset Directory**: Latest priority and contact details per asset
//! - **Alert Tracking**: Deduplication and significant-change detection
//! - **Notification Schedule**: Re-notification interval by severity and asset priority
//! - **Templates**: Subject and body for active and resolved alerts
//! - **Transports**: Delivery through `msmtp`, or log-only dry runs
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use smtp_agent::{
//!     AlertEvent, AssetEvent, BusEvent, EventOutcome, NotificationEngine,
//!     transport::LogTransport,
//! };
//!
//! let mut engine = NotificationEngine::new(Box::new(LogTransport::default()));
//!
//! let asset = AssetEvent::new("ups-1", Some("1"), Some("John Doe"), Some("john@example.com"));
//! assert_eq!(engine.handle(BusEvent::Asset(asset), Utc::now()), EventOutcome::AssetUpdated);
//!
//! let alert = AlertEvent::new("onbattery", "ups-1", "ACTIVE", "CRITICAL")
//!     .with_description("UPS is running on battery")
//!     .with_timestamp(1_450_000_000);
//! assert_eq!(engine.handle(BusEvent::Alert(alert.clone()), Utc::now()), EventOutcome::Notified);
//!
//! // Repeating the same alert within five minutes sends nothing.
//! assert_eq!(engine.handle(BusEvent::Alert(alert), Utc::now()), EventOutcome::NotDue);
//! ```
//!
//! # Running
//!
//! The `smtp-agent` binary reads JSON-lines events from stdin or a file and
//! drives an engine through [`runtime::AgentRuntime`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod assets;
pub mod composer;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod policy;
pub mod runtime;
pub mod tracker;
pub mod transport;
pub mod types;

// Re-export main types at crate root
pub use assets::AssetDirectory;
pub use composer::MessageComposer;
pub use config::{AgentConfig, MailConfig};
pub use engine::{AlertOutcome, EngineStats, EventOutcome, NotificationEngine};
pub use error::{AgentError, Result, TransportError};
pub use events::{decode_event, AlertEvent, AssetEvent, BusEvent};
pub use policy::NotificationPolicy;
pub use runtime::{AgentRuntime, RunSummary};
pub use tracker::AlertTracker;
pub use transport::{Email, LogTransport, MailTransport, MsmtpTransport};
pub use types::{AlertKey, AlertRecord, AssetRecord, Priority, Severity};
