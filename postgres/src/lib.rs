//! PostgreSQL support for quarry
//!
//! Binds engine values as `tokio-postgres` parameters, decodes result rows,
//! implements [`quarry_core::Connection`] for [`tokio_postgres::Client`] and
//! keeps a client connected through a reconnect [`Supervisor`].

mod client;
pub mod supervisor;
pub mod values;

pub use client::driver_error;
pub use supervisor::{Backoff, ConnectionState, Supervisor, supervise};
pub use values::{PgValue, decode_row};

pub use tokio_postgres::{Client, NoTls};
