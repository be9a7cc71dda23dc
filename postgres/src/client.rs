//! [`Connection`] for `tokio_postgres::Client`.

use crate::values::{PgValue, decode_row};
use quarry_core::{Connection, QuarryError, Response, Result, Row, Statement};
use smallvec::SmallVec;
use std::future::Future;
use tokio_postgres::Client;
use tokio_postgres::types::ToSql;

impl Connection for Client {
    fn execute(&self, statement: &Statement) -> impl Future<Output = Result<Response>> + Send {
        async move {
            let values: SmallVec<[PgValue<'_>; 8]> =
                statement.params.iter().map(PgValue).collect();
            let params: SmallVec<[&(dyn ToSql + Sync); 8]> = values
                .iter()
                .map(|value| value as &(dyn ToSql + Sync))
                .collect();

            if returns_rows(&statement.sql) {
                let rows = self
                    .query(statement.sql.as_str(), &params[..])
                    .await
                    .map_err(driver_error)?;
                let rows = rows.iter().map(decode_row).collect::<Result<Vec<Row>>>()?;
                Ok(Response::rows(rows))
            } else {
                let affected = Client::execute(self, statement.sql.as_str(), &params[..])
                    .await
                    .map_err(driver_error)?;
                Ok(Response::affected(affected))
            }
        }
    }
}

/// Whether the statement produces a result set (selects and `returning`).
fn returns_rows(sql: &str) -> bool {
    let head = sql.trim_start();
    let starts_with = |keyword: &str| {
        head.get(..keyword.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(keyword))
    };
    starts_with("select") || starts_with("with") || sql.contains(" returning ")
}

/// Maps a driver error to [`QuarryError::Driver`], keeping the SQLSTATE so
/// deadlocks (`40P01`) and serialization failures (`40001`) read as
/// transient.
pub fn driver_error(err: tokio_postgres::Error) -> QuarryError {
    if let Some(db) = err.as_db_error() {
        return QuarryError::driver_with_code(db.message(), db.code().code());
    }
    match err.code() {
        Some(state) => QuarryError::driver_with_code(err.to_string(), state.code()),
        None => QuarryError::driver(err.to_string()),
    }
}
