//! Event loop driving a [`NotificationEngine`].
//!
//! Input is read as JSON lines. A reader decodes each line and queues it on
//! a bounded channel; a single worker owns the engine and handles queued
//! events in arrival order. The worker runs on the blocking pool because
//! mail delivery is synchronous.
//!
//! On shutdown the reader stops first. Events already queued are still
//! handled before [`AgentRuntime::run_until`] returns.

use std::future::Future;

use chrono::Utc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{EngineStats, NotificationEngine};
use crate::error::{AgentError, Result};
use crate::events::{decode_event, BusEvent};

/// Totals reported when a run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Non-empty input lines read.
    pub lines_read: u64,
    /// Lines that could not be decoded.
    pub lines_rejected: u64,
    /// Engine counters at the end of the run.
    pub engine: EngineStats,
}

/// Owns an engine and feeds it from a line-oriented input.
#[derive(Debug)]
pub struct AgentRuntime {
    engine: NotificationEngine,
    queue_capacity: usize,
}

impl AgentRuntime {
    /// Creates a runtime. A zero capacity is raised to one.
    #[must_use]
    pub fn new(engine: NotificationEngine, queue_capacity: usize) -> Self {
        Self {
            engine,
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Runs until the input ends or the process receives SIGINT or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the input fails or the engine task dies.
    pub async fn run<R>(self, input: R) -> Result<RunSummary>
    where
        R: AsyncBufRead + Unpin,
    {
        self.run_until(input, shutdown_signal()).await
    }

    /// Runs until the input ends or `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the input fails or the engine task dies.
    pub async fn run_until<R, F>(self, input: R, shutdown: F) -> Result<RunSummary>
    where
        R: AsyncBufRead + Unpin,
        F: Future<Output = ()>,
    {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let engine = self.engine;
        let worker = tokio::task::spawn_blocking(move || process_events(engine, rx));

        // The sender is dropped when reading stops, which ends the worker.
        let read = read_events(input, tx, shutdown).await;

        let engine = worker
            .await
            .map_err(|e| AgentError::Runtime(format!("engine task failed: {e}")))?;
        let (lines_read, lines_rejected) = read?;

        let summary = RunSummary {
            lines_read,
            lines_rejected,
            engine: engine.stats(),
        };
        info!(
            lines = summary.lines_read,
            rejected = summary.lines_rejected,
            sent = summary.engine.notifications_sent,
            failed = summary.engine.notification_failures,
            "event loop stopped"
        );
        Ok(summary)
    }
}

async fn read_events<R, F>(input: R, tx: mpsc::Sender<BusEvent>, shutdown: F) -> Result<(u64, u64)>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    let mut lines = input.lines();
    let mut read = 0u64;
    let mut rejected = 0u64;
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            biased;
            () = &mut shutdown => {
                info!("shutdown requested, draining queued events");
                break;
            }
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            debug!("input closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        read += 1;

        match decode_event(&line) {
            Ok(event) => {
                if tx.send(event).await.is_err() {
                    warn!("engine stopped, no longer reading input");
                    break;
                }
            }
            Err(e) => {
                rejected += 1;
                warn!(line = read, error = %e, "rejecting undecodable event");
            }
        }
    }

    Ok((read, rejected))
}

fn process_events(mut engine: NotificationEngine, mut rx: mpsc::Receiver<BusEvent>) -> NotificationEngine {
    while let Some(event) = rx.blocking_recv() {
        let kind = event.kind();
        let outcome = engine.handle(event, Utc::now());
        debug!(kind, ?outcome, "event handled");
    }
    engine
}

/// Completes on SIGINT, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => info!("received SIGINT"),
        () = terminate => info!("received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LogTransport;
    use tokio::io::BufReader;

    const ASSET: &str = r#"{"kind":"asset","name":"QWERTY","aux":{"priority":"1"},"ext":{"contact_name":"John","contact_email":"a@b.com"}}"#;
    const ALERT: &str = r#"{"kind":"alert","rule":"NY_RULE","element_src":"QWERTY","description":"ASDFKLHJH","state":"ACTIVE","severity":"CRITICAL","time":123456,"action":"EMAIL"}"#;

    fn runtime() -> AgentRuntime {
        AgentRuntime::new(NotificationEngine::new(Box::new(LogTransport::default())), 4)
    }

    #[tokio::test]
    async fn events_are_handled_in_arrival_order() {
        let input = format!("{ASSET}\n{ALERT}\n");

        let summary = runtime()
            .run_until(BufReader::new(input.as_bytes()), std::future::pending())
            .await
            .unwrap();

        assert_eq!(summary.lines_read, 2);
        assert_eq!(summary.engine.assets_updated, 1);
        assert_eq!(summary.engine.notifications_sent, 1);
        assert_eq!(summary.engine.dropped, 0);
    }

    #[tokio::test]
    async fn undecodable_lines_are_skipped() {
        let input = format!("not json\n\n{ASSET}\n{{\"kind\":\"metric\"}}\n{ALERT}\n");

        let summary = runtime()
            .run_until(BufReader::new(input.as_bytes()), std::future::pending())
            .await
            .unwrap();

        assert_eq!(summary.lines_read, 4);
        assert_eq!(summary.lines_rejected, 2);
        assert_eq!(summary.engine.events, 2);
        assert_eq!(summary.engine.notifications_sent, 1);
    }

    #[tokio::test]
    async fn more_events_than_queue_capacity_are_all_handled() {
        let mut input = format!("{ASSET}\n");
        for i in 0..32 {
            input.push_str(&ALERT.replace("NY_RULE", &format!("RULE_{i}")));
            input.push('\n');
        }

        let summary = runtime()
            .run_until(BufReader::new(input.as_bytes()), std::future::pending())
            .await
            .unwrap();

        assert_eq!(summary.engine.events, 33);
        assert_eq!(summary.engine.notifications_sent, 32);
    }

    #[tokio::test]
    async fn shutdown_stops_reading_open_input() {
        // the writer half stays open, so only shutdown can end the run
        let (_writer, reader) = tokio::io::duplex(64);

        let summary = runtime()
            .run_until(BufReader::new(reader), async {})
            .await
            .unwrap();

        assert_eq!(summary.lines_read, 0);
        assert_eq!(summary.engine.events, 0);
    }

    #[test]
    fn zero_capacity_is_raised() {
        assert_eq!(
            AgentRuntime::new(NotificationEngine::new(Box::new(LogTransport::default())), 0)
                .queue_capacity,
            1
        );
    }
}
