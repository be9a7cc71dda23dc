//! Supervised connection lifecycle.
//!
//! A [`Supervisor`] owns a background task that connects, waits for the link
//! to close, and reconnects with bounded exponential backoff. Every
//! transition is published on a `watch` channel:
//!
//! ```text
//! Connecting -> Connected -> Reconnecting { attempt } -> Connected
//!                                                    \-> Failed
//! ```
//!
//! Once `Failed`, the task has stopped and the supervisor stays failed.

use quarry_core::{Connection, QuarryError, Response, Result, Statement};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// SQLSTATE `connection_failure`, reported while no link is up.
pub const CONNECTION_FAILURE: &str = "08006";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    /// Waiting before reconnect attempt number `attempt`
    Reconnecting { attempt: u32 },
    /// Gave up after too many consecutive failed attempts
    Failed { reason: String },
}

/// Reconnect policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
    /// Consecutive failed connection attempts before giving up
    pub max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(100),
            max: Duration::from_secs(5),
            max_attempts: 10,
        }
    }
}

impl Backoff {
    /// Delay before reconnect attempt `attempt` (1-based); doubles per
    /// attempt up to `max`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// Keeps one client connected in the background.
#[derive(Debug)]
pub struct Supervisor<T> {
    state: watch::Receiver<ConnectionState>,
    client: watch::Receiver<Option<Arc<T>>>,
    task: JoinHandle<()>,
}

impl<T: Send + Sync + 'static> Supervisor<T> {
    /// Spawns the supervising task on the current runtime.
    ///
    /// `connect` yields a client plus a future that resolves when the
    /// client's link closes.
    pub fn spawn<F, Fut, D>(backoff: Backoff, mut connect: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(T, D)>> + Send + 'static,
        D: Future<Output = ()> + Send + 'static,
    {
        let (state_tx, state) = watch::channel(ConnectionState::Connecting);
        let (client_tx, client) = watch::channel(None);

        let task = tokio::spawn(async move {
            let publish = |next: ConnectionState| {
                quarry_core::quarry_trace_state!(&next);
                state_tx.send_replace(next);
            };

            let mut failures = 0u32;
            let mut attempt = 0u32;
            loop {
                match connect().await {
                    Ok((conn, closed)) => {
                        failures = 0;
                        attempt = 0;
                        client_tx.send_replace(Some(Arc::new(conn)));
                        publish(ConnectionState::Connected);
                        closed.await;
                        client_tx.send_replace(None);
                    }
                    Err(err) => {
                        failures += 1;
                        if failures >= backoff.max_attempts {
                            publish(ConnectionState::Failed {
                                reason: err.to_string(),
                            });
                            return;
                        }
                    }
                }

                attempt += 1;
                publish(ConnectionState::Reconnecting { attempt });
                tokio::time::sleep(backoff.delay(attempt)).await;
            }
        });

        Self {
            state,
            client,
            task,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// A receiver observing every state transition.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// The live client, or a connection-failure driver error while none is
    /// up.
    pub fn client(&self) -> Result<Arc<T>> {
        self.client.borrow().clone().ok_or_else(|| {
            let message = match &*self.state.borrow() {
                ConnectionState::Failed { reason } => format!("connection failed: {}", reason),
                state => format!("connection unavailable ({:?})", state),
            };
            QuarryError::driver_with_code(message, CONNECTION_FAILURE)
        })
    }

    /// Waits until a client is connected; errors once the supervisor has
    /// failed.
    pub async fn connected(&self) -> Result<Arc<T>> {
        let mut state = self.state.clone();
        state
            .wait_for(|s| matches!(s, ConnectionState::Connected | ConnectionState::Failed { .. }))
            .await
            .map_err(|_| QuarryError::driver_with_code("supervisor stopped", CONNECTION_FAILURE))?;
        self.client()
    }
}

impl<T> Drop for Supervisor<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl<T: Connection + 'static> Connection for Supervisor<T> {
    fn execute(&self, statement: &Statement) -> impl Future<Output = Result<Response>> + Send {
        let client = self.client();
        async move {
            let client = client?;
            client.execute(statement).await
        }
    }
}

/// Supervises a `tokio-postgres` connection to `url` without TLS.
pub fn supervise(url: impl Into<String>, backoff: Backoff) -> Supervisor<tokio_postgres::Client> {
    let url = url.into();
    Supervisor::spawn(backoff, move || {
        let url = url.clone();
        async move {
            let (client, connection) = tokio_postgres::connect(&url, tokio_postgres::NoTls)
                .await
                .map_err(crate::client::driver_error)?;
            let closed = async move {
                #[cfg(feature = "tracing")]
                if let Err(err) = connection.await {
                    tracing::warn!(error = %err, "quarry.connection closed");
                }
                #[cfg(not(feature = "tracing"))]
                let _ = connection.await;
            };
            Ok((client, closed))
        }
    })
}
