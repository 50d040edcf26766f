use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::events::{ChatEnvelope, EventContext, EventDispatcher, HandlerResult};
use crate::outbox::{ChatOutbox, Outbound};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport delivery failed: {0}")]
    Deliver(String),
    #[error("bot api rejected `{method}`: {description}")]
    Api { method: String, description: String },
}

/// Reconnection never gives up. Delays grow from `base_delay_ms` and settle at `max_delay_ms`;
/// after `alert_after_retries` consecutive failures the outage is reported at error level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub alert_after_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { alert_after_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Source of inbound updates. `Ok(None)` means the stream ended cleanly.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError>;
}

/// Pulls updates one at a time, dispatches each to completion, and delivers the responses.
/// Transport failures reconnect with backoff; nothing a handler does stops the loop.
pub struct PollingRunner {
    source: Arc<dyn UpdateSource>,
    outbox: Arc<dyn ChatOutbox>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl PollingRunner {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        outbox: Arc<dyn ChatOutbox>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { source, outbox, dispatcher, reconnect_policy }
    }

    /// Runs until the update source reports a clean end of stream. Transport failures are
    /// retried indefinitely.
    pub async fn start(&self) -> Result<()> {
        let mut attempt: u32 = 0;
        loop {
            let mut processed = 0_usize;
            match self.connect_and_pump(attempt, &mut processed).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    // a connection that made progress starts a fresh backoff sequence
                    if processed > 0 {
                        attempt = 0;
                    }
                    warn!(
                        event_name = "transport.telegram.failed",
                        attempt,
                        error = %transport_error,
                        "long-polling transport failed"
                    );

                    if attempt == self.reconnect_policy.alert_after_retries {
                        error!(
                            event_name = "transport.telegram.outage",
                            attempt,
                            retry_delay_ms = self.reconnect_policy.max_delay_ms,
                            "long-polling transport still failing; retrying at capped delay"
                        );
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        processed: &mut usize,
    ) -> Result<(), TransportError> {
        info!(attempt, "connecting long-polling transport");
        self.source.connect().await?;
        info!(attempt, "long-polling transport connected");

        loop {
            let Some(envelope) = self.source.next_envelope().await? else {
                info!(attempt, "long-polling update stream closed");
                return Ok(());
            };
            *processed += 1;
            self.process(&envelope).await;
        }
    }

    async fn process(&self, envelope: &ChatEnvelope) {
        let context = EventContext::for_update(envelope.update_id);
        let user_id = envelope.event.user_id().map(|user| user.to_string());
        let user_id = user_id.as_deref().unwrap_or("unknown");

        info!(
            event_name = "ingress.telegram.update_received",
            update_id = envelope.update_id,
            event_type = ?envelope.event.event_type(),
            correlation_id = %context.correlation_id,
            user_id,
            "received telegram update"
        );

        let outbound = match self.dispatcher.dispatch(envelope, &context).await {
            Ok(HandlerResult::Responded(outbound)) => outbound,
            Ok(HandlerResult::Processed | HandlerResult::Ignored) => return,
            Err(error) => {
                warn!(
                    correlation_id = %context.correlation_id,
                    user_id,
                    error = %error,
                    "event dispatch failed; continuing polling loop"
                );
                return;
            }
        };

        for action in &outbound {
            self.deliver(action, &context).await;
        }
    }

    async fn deliver(&self, action: &Outbound, context: &EventContext) {
        match self.outbox.deliver(action).await {
            Ok(()) => debug!(
                event_name = "egress.telegram.delivered",
                correlation_id = %context.correlation_id,
                action = action.kind(),
                "delivered outbound action"
            ),
            Err(error) => warn!(
                event_name = "egress.telegram.delivery_failed",
                correlation_id = %context.correlation_id,
                action = action.kind(),
                error = %error,
                "failed to deliver outbound action"
            ),
        }
    }
}
