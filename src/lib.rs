//! # Quarry
//!
//! Schema-driven query translation and relation loading for SQL databases.
//!
//! Register model schemas and their relations, then query them with
//! attribute-level descriptors. Quarry emits parameterized SQL, retries
//! transient lock errors, and folds joined rows back into entities with
//! eager-loaded relations and pagination metadata.
//!
//! ```no_run
//! use quarry::prelude::*;
//!
//! # async fn demo(conn: impl Connection) -> quarry::Result<()> {
//! let mut registry = Registry::new();
//! registry
//!     .register(
//!         Schema::builder("User")
//!             .attr(Attribute::new("id").kind(AttrType::Number).primary())
//!             .attr(Attribute::new("name"))
//!             .build()?,
//!     )?
//!     .register(
//!         Schema::builder("Post")
//!             .attr(Attribute::new("id").kind(AttrType::Number).primary())
//!             .attr(Attribute::new("user_id").kind(AttrType::Number))
//!             .build()?,
//!     )?
//!     .relate(Relation::has_many("User", "posts", "Post", "user_id"))?;
//!
//! let engine = Engine::new(conn, registry, EngineConfig::default())?;
//! let users = engine
//!     .model("User")?
//!     .find_all(Query::new().filter(Filter::eq("name", "jeff")).include("posts"))
//!     .await?;
//! println!("{} of {}", users.collection.len(), users.total);
//! # Ok(())
//! # }
//! ```
//!
//! ## Database Support
//!
//! | Database   | Driver         | Feature Flag     |
//! |------------|----------------|------------------|
//! | PostgreSQL | tokio-postgres | `tokio-postgres` |
//!
//! Any other driver plugs in by implementing [`Connection`].

pub mod config;
mod engine;
mod executor;

pub use config::{ConfigError, EngineConfig, RetryConfig};
pub use engine::{Engine, Model};
pub use executor::Executor;

pub use quarry_core::*;

#[cfg(feature = "tokio-postgres")]
pub use quarry_postgres as postgres;

pub mod prelude {
    pub use crate::config::{EngineConfig, RetryConfig};
    pub use crate::engine::{Engine, Model};
    pub use quarry_core::{
        AttrType, Attribute, Collection, ColumnType, Condition, Connection, Dialect, Entity,
        FalseEncoding, Filter, OrderTerm, QuarryError, Query, Registry, Relation, Schema, Value,
        Values,
    };
}
