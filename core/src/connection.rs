//! The seam between the engine and a database driver.

use crate::error::Result;
use crate::sql::Statement;
use crate::value::Value;
use std::future::Future;
use std::sync::Arc;

/// One result row: physical (possibly table-prefixed) column name to raw
/// driver value, in result order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    /// Appends a column; builder form of [`Row::push`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.columns.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// What a connection reports for one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub rows: Vec<Row>,
    pub rows_affected: u64,
    /// Key generated by an insert, for drivers without `returning`
    pub last_insert_id: Option<Value>,
}

impl Response {
    pub fn rows(rows: Vec<Row>) -> Self {
        Self {
            rows_affected: rows.len() as u64,
            rows,
            last_insert_id: None,
        }
    }

    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            ..Self::default()
        }
    }
}

/// A handle able to run one statement at a time.
///
/// Implementations report every failure as [`QuarryError::Driver`], with the
/// SQLSTATE or driver code when one is known, so the executor can recognize
/// transient errors.
///
/// [`QuarryError::Driver`]: crate::error::QuarryError::Driver
pub trait Connection: Send + Sync {
    fn execute(&self, statement: &Statement) -> impl Future<Output = Result<Response>> + Send;
}

impl<C: Connection> Connection for Arc<C> {
    fn execute(&self, statement: &Statement) -> impl Future<Output = Result<Response>> + Send {
        (**self).execute(statement)
    }
}

impl<C: Connection> Connection for &C {
    fn execute(&self, statement: &Statement) -> impl Future<Output = Result<Response>> + Send {
        (**self).execute(statement)
    }
}
