//! Periodic registration of an executor with the broker.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    client::{ClientError, ForwardClient},
    protocol::HeartbeatRequest,
};

/// Heartbeat emitter that periodically posts this executor's identity and
/// address to the broker's `/register` endpoint.
#[derive(Debug, Clone)]
pub struct HeartbeatEmitter {
    client: ForwardClient,
    broker_url: String,
    agent_id: String,
    agent_address: String,
    interval: Duration,
}

impl HeartbeatEmitter {
    #[must_use]
    pub const fn new(
        client: ForwardClient,
        broker_url: String,
        agent_id: String,
        agent_address: String,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            broker_url,
            agent_id,
            agent_address,
            interval,
        }
    }

    /// Send one heartbeat.
    ///
    /// # Errors
    /// Returns error if the broker cannot be reached or rejects the heartbeat.
    pub async fn send_once(&self) -> Result<(), ClientError> {
        let payload = HeartbeatRequest {
            agent_id: Some(self.agent_id.clone()),
            agent_address: Some(self.agent_address.clone()),
        };
        tracing::info!(broker = %self.broker_url, agent_id = %self.agent_id, "Sending heartbeat");
        let relayed = self
            .client
            .post_json(&self.broker_url, "/register", &payload)
            .await?;
        if relayed.status.is_success() {
            Ok(())
        } else {
            Err(ClientError::InvalidResponse(format!(
                "broker answered {}: {}",
                relayed.status, relayed.body
            )))
        }
    }

    /// Send heartbeats until `token` is cancelled.
    ///
    /// The first heartbeat goes out immediately. Failures are logged and the
    /// loop carries on at the next tick.
    pub async fn run(&self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = interval.tick() => {}
            }
            tokio::select! {
                () = token.cancelled() => break,
                result = self.send_once() => {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "Could not send heartbeat to broker");
                    }
                }
            }
        }
        tracing::info!(agent_id = %self.agent_id, "Heartbeat stopped");
    }

    /// Run on a background task, returning its handle for shutdown.
    #[must_use]
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(token).await })
    }
}
