//! IO-free core of the quarry engine.
//!
//! Turns attribute-level [`Query`] descriptors into parameterized SQL for a
//! registered [`Schema`], and folds result rows back into [`Entity`] values.
//! Running statements is left to a [`Connection`].

pub mod assemble;
pub mod builder;
pub mod coerce;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod query;
pub mod relation;
pub mod resolve;
pub mod schema;
pub mod sql;
mod tracing;
pub mod value;

pub use assemble::{Collection, Entity};
pub use builder::StatementBuilder;
pub use coerce::{CoercionOptions, FalseEncoding};
pub use connection::{Connection, Response, Row};
pub use dialect::Dialect;
pub use error::{QuarryError, Result};
pub use query::{Condition, Direction, Filter, OrderTerm, Page, Query, Values};
pub use relation::{Registry, Relation};
pub use resolve::{Plan, ResolveOptions};
pub use schema::{AttrType, Attribute, ColumnType, Schema};
pub use sql::{SQL, SQLChunk, Statement, Token};
pub use value::Value;
