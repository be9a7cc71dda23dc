//! Tracing utilities for query, retry and connection observability.
//!
//! Enable the `tracing` feature to emit spans and events via the `tracing` crate.
//! These macros no-op when the feature is disabled, avoiding `#[cfg]` boilerplate
//! at every call site.

/// Emit a debug-level tracing event with the SQL text and parameter count.
///
/// ```ignore
/// quarry_trace_query!(&statement.sql, statement.params.len());
/// ```
#[macro_export]
macro_rules! quarry_trace_query {
    ($sql:expr, $param_count:expr) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(sql = %$sql, params = $param_count, "quarry.query");
    };
}

/// Emit a warn-level tracing event for a transient failure that is about to be retried.
///
/// ```ignore
/// quarry_trace_retry!(attempt, &err);
/// ```
#[macro_export]
macro_rules! quarry_trace_retry {
    ($attempt:expr, $error:expr) => {
        #[cfg(feature = "tracing")]
        tracing::warn!(attempt = $attempt, error = %$error, "quarry.retry");
    };
}

/// Emit an info-level tracing event for a connection state transition.
///
/// ```ignore
/// quarry_trace_state!(&state);
/// ```
#[macro_export]
macro_rules! quarry_trace_state {
    ($state:expr) => {
        #[cfg(feature = "tracing")]
        tracing::info!(state = ?$state, "quarry.connection");
    };
}
