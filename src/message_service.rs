//! Message delivery with direct-then-flood retry and ACK tracking (§4.9).
//!
//! `sendMessageWithRetry`: an adaptive per-attempt timeout, a
//! direct-then-flood attempt schedule, an `AckEntry` table swept on a
//! background `tokio::spawn` task (same idiom as the `read_task`/
//! `process_task` pair in `client.rs`), and retry/ack/failure
//! notifications delivered as [`MeshEvent`] broadcasts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::event::{EventDispatcher, EventFilter, MeshEvent};
use crate::session::MeshCoreSession;
use crate::transport::Transport;
use crate::types::{Contact, PublicKey};

/// Default maximum send attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
/// Default attempt index (0-based) at which routing switches to flood.
pub const DEFAULT_FLOOD_AFTER: u32 = 2;
/// Default cap on flood-routed attempts.
pub const DEFAULT_MAX_FLOOD_ATTEMPTS: u32 = 2;
/// How often the ACK table is swept for expired entries.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5);
/// Floor for the adaptive per-attempt direct timeout.
pub const MIN_DIRECT_TIMEOUT: Duration = Duration::from_secs(2);
/// Per-hop contribution to the adaptive direct timeout.
pub const PER_HOP_TIMEOUT: Duration = Duration::from_secs(1);
/// Fixed timeout for flood-routed attempts.
pub const FLOOD_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a retrying send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// An ACK arrived before all attempts were exhausted.
    Delivered,
    /// All attempts were exhausted without an ACK.
    Failed,
}

/// Tracks a single message awaiting acknowledgment, keyed by `ack_code`.
#[derive(Debug, Clone)]
struct AckEntry {
    message_id: String,
    created_at: std::time::Instant,
    attempt_index: u32,
    timeout_at: std::time::Instant,
}

/// Retry/ACK orchestration for outbound messages.
pub struct MessageService<T> {
    session: Arc<MeshCoreSession<T>>,
    dispatcher: EventDispatcher,
    pending: Arc<Mutex<HashMap<u32, AckEntry>>>,
    sweep_task: Option<JoinHandle<()>>,
}

/// Computes the adaptive direct-routing timeout from a contact's path
/// length, per §5: `max(2s, 1s * pathLength + 2s)`.
#[must_use]
pub fn adaptive_direct_timeout(out_path_len: i8) -> Duration {
    if out_path_len < 0 {
        return MIN_DIRECT_TIMEOUT;
    }
    let hops = u32::from(out_path_len.unsigned_abs());
    (PER_HOP_TIMEOUT * hops + Duration::from_secs(2)).max(MIN_DIRECT_TIMEOUT)
}

impl<T: Transport + 'static> MessageService<T> {
    /// Creates a new message service and spawns its ACK-sweeper task.
    #[must_use]
    pub fn new(session: Arc<MeshCoreSession<T>>, dispatcher: EventDispatcher) -> Self {
        let pending = Arc::new(Mutex::new(HashMap::new()));
        let sweep_task = Self::spawn_sweeper(pending.clone(), dispatcher.clone());
        Self {
            session,
            dispatcher,
            pending,
            sweep_task: Some(sweep_task),
        }
    }

    fn spawn_sweeper(pending: Arc<Mutex<HashMap<u32, AckEntry>>>, dispatcher: EventDispatcher) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let now = std::time::Instant::now();
                let mut table = pending.lock().await;
                let expired: Vec<u32> = table
                    .iter()
                    .filter(|(_, entry)| entry.timeout_at <= now)
                    .map(|(code, _)| *code)
                    .collect();
                for code in expired {
                    if let Some(entry) = table.remove(&code) {
                        tracing::debug!("ack entry expired: message {}", entry.message_id);
                        dispatcher.dispatch(MeshEvent::MessageFailed {
                            message_id: entry.message_id,
                        });
                    }
                }
            }
        })
    }

    /// Stops the background sweeper. Idempotent: calling it twice (or after
    /// drop has already aborted it) is a no-op.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.sweep_task.take() {
            task.abort();
        }
    }

    /// Sends `text` to `destination` with direct-then-flood retry (§4.9).
    ///
    /// # Errors
    ///
    /// Returns an error only if the transport write itself fails on every
    /// attempt; delivery failure after exhausting retries is reported via
    /// the returned [`DeliveryStatus::Failed`], not an `Err`.
    pub async fn send_message_with_retry(
        &self,
        destination: &PublicKey,
        contact: &Contact,
        text: &str,
        timestamp: u32,
    ) -> Result<DeliveryStatus> {
        self.send_message_with_retry_config(
            destination,
            contact,
            text,
            timestamp,
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_FLOOD_AFTER,
            DEFAULT_MAX_FLOOD_ATTEMPTS,
        )
        .await
    }

    /// Full-control variant of [`Self::send_message_with_retry`] with
    /// explicit retry-schedule parameters.
    ///
    /// # Errors
    ///
    /// See [`Self::send_message_with_retry`].
    #[allow(clippy::too_many_arguments)]
    pub async fn send_message_with_retry_config(
        &self,
        destination: &PublicKey,
        contact: &Contact,
        text: &str,
        timestamp: u32,
        max_attempts: u32,
        flood_after: u32,
        max_flood_attempts: u32,
    ) -> Result<DeliveryStatus> {
        let message_id = format!("{}:{timestamp}", destination.to_hex());
        let mut flood_attempts_used = 0u32;

        for attempt in 0..max_attempts {
            let is_flood = attempt >= flood_after;
            if is_flood {
                if flood_attempts_used >= max_flood_attempts {
                    break;
                }
                flood_attempts_used += 1;
                if attempt == flood_after {
                    let _ = self.session.reset_path(destination).await;
                    self.dispatcher.dispatch(MeshEvent::RoutingChanged {
                        contact_id: message_id.clone(),
                        is_flood: true,
                    });
                }
            }

            let timeout = if is_flood {
                FLOOD_TIMEOUT
            } else {
                adaptive_direct_timeout(contact.out_path_len)
            };

            let attempt_u8 = u8::try_from(attempt).unwrap_or(u8::MAX);
            let sent = self
                .session
                .send_message(destination, text, timestamp, attempt_u8)
                .await?;

            let expected_ack = match sent {
                MeshEvent::MessageSent { expected_ack, .. } => expected_ack,
                _ => {
                    tracing::warn!("unexpected response to sendMessage: {:?}", sent);
                    continue;
                }
            };

            let now = std::time::Instant::now();
            {
                let mut table = self.pending.lock().await;
                table.insert(
                    expected_ack,
                    AckEntry {
                        message_id: message_id.clone(),
                        created_at: now,
                        attempt_index: attempt,
                        timeout_at: now + timeout,
                    },
                );
            }

            match self.await_ack(expected_ack, timeout).await {
                Some(rtt_ms) => {
                    self.pending.lock().await.remove(&expected_ack);
                    self.dispatcher.dispatch(MeshEvent::AckConfirmation {
                        ack_code: expected_ack,
                        rtt_ms,
                    });
                    return Ok(DeliveryStatus::Delivered);
                }
                None => {
                    self.pending.lock().await.remove(&expected_ack);
                    if attempt + 1 < max_attempts {
                        self.dispatcher.dispatch(MeshEvent::RetryStatus {
                            message_id: message_id.clone(),
                            attempt: attempt + 1,
                            max_attempts,
                        });
                    }
                }
            }
        }

        self.dispatcher.dispatch(MeshEvent::MessageFailed {
            message_id: message_id.clone(),
        });
        Ok(DeliveryStatus::Failed)
    }

    async fn await_ack(&self, ack_code: u32, timeout: Duration) -> Option<u64> {
        let filter = EventFilter::ack(ack_code);
        let start = std::time::Instant::now();
        self.dispatcher
            .wait_for(filter, timeout)
            .await
            .map(|_| u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX))
    }

    /// Re-sends an already-failed message over flood routing with a fresh
    /// timestamp, using the same retry contract.
    ///
    /// # Errors
    ///
    /// See [`Self::send_message_with_retry`].
    pub async fn retry_manually(
        &self,
        destination: &PublicKey,
        contact: &Contact,
        text: &str,
        new_timestamp: u32,
    ) -> Result<DeliveryStatus> {
        let _ = self.session.reset_path(destination).await;
        self.send_message_with_retry_config(destination, contact, text, new_timestamp, DEFAULT_MAX_ATTEMPTS, 0, DEFAULT_MAX_FLOOD_ATTEMPTS)
            .await
    }
}

impl<T> Drop for MessageService<T> {
    fn drop(&mut self) {
        if let Some(task) = self.sweep_task.take() {
            task.abort();
        }
    }
}
