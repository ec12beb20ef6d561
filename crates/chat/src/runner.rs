use std::sync::Arc;

use async_trait::async_trait;
use huddle_core::{
    domain::routing::RoutingResult, errors::RoutingError, retry::RetryPolicy,
};
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::{
    ingress::{inbound_from_update, ChatRouting},
    router::MessageRouter,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

/// Source of raw platform updates and sink for replies.
#[async_trait]
pub trait UpdateTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` means the stream closed cleanly.
    async fn next_update(&self) -> Result<Option<Value>, TransportError>;
    async fn send_reply(&self, chat_id: &str, text: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopUpdateTransport;

#[async_trait]
impl UpdateTransport for NoopUpdateTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_update(&self) -> Result<Option<Value>, TransportError> {
        Ok(None)
    }

    async fn send_reply(&self, _chat_id: &str, _text: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Pumps updates from a transport through the router, one task per message.
pub struct UpdateRunner {
    transport: Arc<dyn UpdateTransport>,
    router: Arc<MessageRouter>,
    routing: ChatRouting,
    reconnect_policy: RetryPolicy,
}

impl UpdateRunner {
    pub fn new(
        transport: Arc<dyn UpdateTransport>,
        router: Arc<MessageRouter>,
        routing: ChatRouting,
        reconnect_policy: RetryPolicy,
    ) -> Self {
        Self { transport, router, routing, reconnect_policy }
    }

    /// Runs until the stream closes or reconnect attempts run out. Transport
    /// failures never bring the process down.
    pub async fn start(&self) {
        let attempts = self.reconnect_policy.attempts.max(1);
        for attempt in 0..attempts {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return,
                Err(transport_error) => {
                    warn!(
                        event_name = "runner.transport.failed",
                        attempt,
                        attempts,
                        error = %transport_error,
                        "update transport failed"
                    );

                    if attempt + 1 >= attempts {
                        warn!(
                            event_name = "runner.transport.exhausted",
                            attempts,
                            "transport retries exhausted; continuing process without crash"
                        );
                        return;
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening update transport connection");
        self.transport.connect().await?;

        let mut in_flight = JoinSet::new();
        let pumped = self.pump(&mut in_flight).await;
        while in_flight.join_next().await.is_some() {}
        pumped?;

        info!(attempt, "update stream closed");
        self.transport.disconnect().await
    }

    async fn pump(&self, in_flight: &mut JoinSet<()>) -> Result<(), TransportError> {
        loop {
            while in_flight.try_join_next().is_some() {}

            let Some(update) = self.transport.next_update().await? else {
                return Ok(());
            };

            let message = match inbound_from_update(&update, &self.routing) {
                Ok(message) => message,
                Err(error) => {
                    debug!(
                        event_name = "runner.update.skipped",
                        reason = %error,
                        "update does not carry a routable message"
                    );
                    continue;
                }
            };

            let router = self.router.clone();
            let transport = self.transport.clone();
            in_flight.spawn(async move {
                let chat_id = message.chat_id.clone();
                let result = route_isolated(router, message).await;
                if result.message.is_empty() {
                    return;
                }
                if let Err(error) = transport.send_reply(&chat_id, &result.message).await {
                    warn!(
                        event_name = "runner.reply.failed",
                        chat_id = %chat_id,
                        error = %error,
                        "failed to send reply"
                    );
                }
            });
        }
    }
}

/// Routes on its own task so a panic surfaces as a failed result.
async fn route_isolated(router: Arc<MessageRouter>, message: huddle_core::InboundMessage) -> RoutingResult {
    match tokio::spawn(async move { router.route(message).await }).await {
        Ok(result) => result,
        Err(join_error) => {
            let error = RoutingError::Internal(join_error.to_string());
            warn!(event_name = "runner.route.panicked", error = %error, "routing task aborted");
            RoutingResult::failure(&error)
        }
    }
}
