//! Live stream consumption
//!
//! Holds the filtered stream open, frames the body into
//! newline-delimited messages and submits one job per message. On
//! stream end or failure the consumer loops back and reconnects; a
//! rate-limited response pushes the reconnect out to the reset
//! instant the service announced.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::executor::JobExecutor;
use super::reconcile::Engine;
use super::tasks::stream_message_job;
use crate::error::Result;
use crate::metrics::{STREAM_MESSAGES_TOTAL, STREAM_RECONNECTS_TOTAL};
use crate::search::{SearchApi, SearchClient};

pub struct StreamConsumer<S: SearchApi> {
    client: Arc<SearchClient>,
    engine: Arc<Engine<S>>,
    executor: Arc<JobExecutor>,
    default_delay: Duration,
}

impl<S: SearchApi> StreamConsumer<S> {
    pub fn new(
        client: Arc<SearchClient>,
        engine: Arc<Engine<S>>,
        executor: Arc<JobExecutor>,
        default_delay: Duration,
    ) -> Self {
        Self {
            client,
            engine,
            executor,
            default_delay,
        }
    }

    /// Consume until shutdown, reconnecting as needed
    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let delay = match self.consume_once(&shutdown).await {
                Ok(()) => {
                    tracing::info!("Stream ended");
                    self.default_delay
                }
                Err(error) => {
                    tracing::warn!(error = %error, "Stream failed");
                    reconnect_delay(error.rate_limit_reset(), Utc::now(), self.default_delay)
                }
            };

            if shutdown.is_cancelled() {
                break;
            }

            STREAM_RECONNECTS_TOTAL.inc();
            tracing::info!(delay_secs = delay.as_secs(), "Reconnecting stream after delay");
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("Stream consumer stopped");
    }

    /// One connection's worth of messages
    async fn consume_once(&self, shutdown: &CancellationToken) -> Result<()> {
        let response = self.client.open_stream().await?;
        tracing::info!("Stream connected");

        let mut body = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        loop {
            let chunk = tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                chunk = body.next() => match chunk {
                    Some(chunk) => chunk?,
                    None => break,
                },
            };

            buffer.extend_from_slice(&chunk);
            for line in drain_lines(&mut buffer) {
                STREAM_MESSAGES_TOTAL.inc();
                let job = stream_message_job(Arc::clone(&self.engine), line);
                self.executor.submit(job).await?;
            }
        }

        Ok(())
    }
}

/// Pull complete lines out of the carry-over buffer
///
/// Whitespace-only lines are the service's keep-alives and are
/// dropped; a trailing partial line stays in the buffer.
fn drain_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&line);
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }
    lines
}

/// How long to wait before reconnecting
///
/// A rate-limit reset in the future wins; anything else falls back to
/// the default. The result is never negative.
fn reconnect_delay(
    reset_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    default_delay: Duration,
) -> Duration {
    match reset_at {
        Some(reset) if reset > now => (reset - now).to_std().unwrap_or(default_delay),
        _ => default_delay,
    }
}
