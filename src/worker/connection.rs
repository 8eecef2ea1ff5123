//! Queue connection with bounded exponential backoff
//!
//! ```text
//! Disconnected ──> Connecting{attempt} ──ok──> Ready
//!      ^               │ err, attempt < max: sleep(backoff), attempt + 1
//!      │               │ err, attempt = max: QueueUnavailable (fatal)
//!      └── mark_lost ──┴──────────────────────────── Ready
//! ```

use crate::config::BackoffPolicy;
use crate::core::traits::QueueConnector;
use crate::types::LedgerError;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Connection lifecycle
pub enum ConnectionState<Q> {
    Disconnected,
    Connecting { attempt: u32 },
    Ready(Arc<Q>),
}

impl<Q> ConnectionState<Q> {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting { .. } => "connecting",
            ConnectionState::Ready(_) => "ready",
        }
    }
}

pub struct QueueConnection<K: QueueConnector> {
    connector: K,
    policy: BackoffPolicy,
    state: ConnectionState<K::Queue>,
}

impl<K: QueueConnector> QueueConnection<K> {
    /// Create a disconnected handle; the first [`QueueConnection::ready`] connects
    ///
    /// # Arguments
    ///
    /// * `connector` - Opens connections to the broker
    /// * `policy` - Delays and attempt budget for (re)connecting
    pub fn new(connector: K, policy: BackoffPolicy) -> Self {
        Self {
            connector,
            policy,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> &ConnectionState<K::Queue> {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ConnectionState::Ready(_))
    }

    /// Return the live queue handle, connecting first if needed
    ///
    /// # Errors
    ///
    /// * `LedgerError::QueueUnavailable` - every attempt of the backoff budget failed
    pub async fn ready(&mut self) -> Result<Arc<K::Queue>, LedgerError> {
        loop {
            match &self.state {
                ConnectionState::Ready(queue) => return Ok(Arc::clone(queue)),
                ConnectionState::Disconnected => {
                    self.state = ConnectionState::Connecting { attempt: 1 };
                }
                ConnectionState::Connecting { attempt } => {
                    let attempt = *attempt;
                    match self.connector.connect().await {
                        Ok(queue) => {
                            info!(attempt, "Connected to queue");
                            self.state = ConnectionState::Ready(queue);
                        }
                        Err(e) if attempt >= self.policy.max_attempts => {
                            error!(attempt, error = %e, "Giving up connecting to queue");
                            self.state = ConnectionState::Disconnected;
                            return Err(LedgerError::queue_unavailable(format!(
                                "no connection after {} attempts: {}",
                                attempt, e
                            )));
                        }
                        Err(e) => {
                            let delay = self.policy.delay_for(attempt);
                            warn!(attempt, error = %e, retry_in = ?delay, "Queue connection failed");
                            sleep(delay).await;
                            self.state = ConnectionState::Connecting {
                                attempt: attempt + 1,
                            };
                        }
                    }
                }
            }
        }
    }

    /// Drop the current handle after a broker error; the next `ready` reconnects
    pub fn mark_lost(&mut self) {
        if self.is_ready() {
            warn!("Queue connection lost");
        }
        self.state = ConnectionState::Disconnected;
    }
}
