//! Statement execution with bounded retry of transient failures.

use crate::config::RetryConfig;
use quarry_core::{Connection, Response, Result, Statement};

/// Runs statements on a connection, retrying transient errors in place.
///
/// The same statement and parameters are resent on every attempt; nothing
/// else carries over between attempts. Errors that are not transient, and
/// the last error once retries run out, are returned unchanged.
#[derive(Debug, Clone)]
pub struct Executor<C> {
    conn: C,
    retry: RetryConfig,
}

impl<C: Connection> Executor<C> {
    pub fn new(conn: C, retry: RetryConfig) -> Self {
        Self { conn, retry }
    }

    #[inline]
    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub async fn run(&self, statement: &Statement) -> Result<Response> {
        let mut attempt = 0u32;
        loop {
            quarry_core::quarry_trace_query!(&statement.sql, statement.params.len());
            match self.conn.execute(statement).await {
                Ok(response) => return Ok(response),
                Err(err)
                    if attempt < self.retry.max_retries
                        && err.is_transient(&self.retry.signatures, &self.retry.codes) =>
                {
                    attempt += 1;
                    quarry_core::quarry_trace_retry!(attempt, &err);
                    let delay = self.retry.delay(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}
