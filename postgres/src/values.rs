//! Binding [`Value`]s as `tokio-postgres` parameters and decoding result rows.
//!
//! Parameters are sent in the binary format, so each value is encoded for the
//! type the server inferred for its placeholder rather than for its own
//! variant. A coerced timestamp bound as text still reaches a `timestamp`
//! column as a timestamp.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use quarry_core::coerce::{to_bool, to_date};
use quarry_core::{QuarryError, Result, Row, Value};
use std::error::Error;
use tokio_postgres::types::{FromSql, IsNull, Kind, ToSql, Type};

type BoxError = Box<dyn Error + Sync + Send>;

/// A borrowed [`Value`] bound as a statement parameter.
#[derive(Debug, Clone, Copy)]
pub struct PgValue<'a>(pub &'a Value);

impl ToSql for PgValue<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        match self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => encode_bool(*b, ty, out),
            Value::Integer(n) => encode_integer(*n, ty, out),
            Value::Float(f) => encode_float(*f, ty, out),
            Value::Text(text) => encode_text(text, ty, out),
            Value::Json(json) => match *ty {
                Type::JSON | Type::JSONB => json.to_sql(ty, out),
                _ => json.to_string().as_str().to_sql(ty, out),
            },
            Value::Date(date) => encode_date(*date, ty, out),
            Value::Array(items) => match ty.kind() {
                Kind::Array(_) => items
                    .iter()
                    .map(PgValue)
                    .collect::<Vec<_>>()
                    .to_sql(ty, out),
                _ => Err(format!("cannot bind a list to a {} parameter", ty).into()),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Conversion happens per target type in `to_sql`
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

fn encode_bool(b: bool, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
    match *ty {
        Type::BOOL => b.to_sql(ty, out),
        _ => encode_integer(i64::from(b), ty, out),
    }
}

fn encode_integer(n: i64, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => i16::try_from(n)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(n)?.to_sql(ty, out),
        Type::OID => u32::try_from(n)?.to_sql(ty, out),
        Type::FLOAT4 => (n as f32).to_sql(ty, out),
        Type::FLOAT8 => (n as f64).to_sql(ty, out),
        Type::BOOL => (n != 0).to_sql(ty, out),
        Type::TIMESTAMP | Type::TIMESTAMPTZ | Type::DATE => {
            let date = DateTime::from_timestamp(n, 0)
                .ok_or_else(|| format!("{} is out of range for a timestamp", n))?;
            encode_date(date, ty, out)
        }
        Type::JSON | Type::JSONB => serde_json::Value::from(n).to_sql(ty, out),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            n.to_string().as_str().to_sql(ty, out)
        }
        _ => n.to_sql(ty, out),
    }
}

fn encode_float(f: f64, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
    match *ty {
        Type::FLOAT4 => (f as f32).to_sql(ty, out),
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID if f.fract() == 0.0 => {
            encode_integer(f as i64, ty, out)
        }
        Type::JSON | Type::JSONB => serde_json::Value::from(f).to_sql(ty, out),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            f.to_string().as_str().to_sql(ty, out)
        }
        _ => f.to_sql(ty, out),
    }
}

fn encode_text(text: &str, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => {
            encode_integer(text.trim().parse()?, ty, out)
        }
        Type::FLOAT4 | Type::FLOAT8 => encode_float(text.trim().parse()?, ty, out),
        // Legacy false encoding binds the NULL token as text
        Type::BOOL if text == "NULL" => Ok(IsNull::Yes),
        Type::BOOL => to_bool("parameter", &Value::Text(text.to_string()))?.to_sql(ty, out),
        Type::TIMESTAMP | Type::TIMESTAMPTZ | Type::DATE => {
            encode_date(to_date("parameter", &Value::Text(text.to_string()))?, ty, out)
        }
        Type::JSON | Type::JSONB => match serde_json::from_str::<serde_json::Value>(text) {
            Ok(json) => json.to_sql(ty, out),
            Err(_) => serde_json::Value::from(text).to_sql(ty, out),
        },
        _ => text.to_sql(ty, out),
    }
}

fn encode_date(
    date: DateTime<Utc>,
    ty: &Type,
    out: &mut BytesMut,
) -> std::result::Result<IsNull, BoxError> {
    match *ty {
        Type::TIMESTAMP => date.naive_utc().to_sql(ty, out),
        Type::DATE => date.date_naive().to_sql(ty, out),
        Type::INT8 => date.timestamp().to_sql(ty, out),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR => {
            quarry_core::value::iso_string(&date).as_str().to_sql(ty, out)
        }
        _ => date.to_sql(ty, out),
    }
}

// ============================================================================
// Rows
// ============================================================================

/// Decodes a driver row into named raw values, in column order.
pub fn decode_row(row: &tokio_postgres::Row) -> Result<Row> {
    let mut decoded = Row::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, idx, column.type_()).map_err(|err| {
            QuarryError::Mapping(format!("column `{}`: {}", column.name(), err))
        })?;
        decoded.push(column.name(), value);
    }
    Ok(decoded)
}

fn get<'a, T: FromSql<'a>>(
    row: &'a tokio_postgres::Row,
    idx: usize,
) -> std::result::Result<Option<T>, tokio_postgres::Error> {
    row.try_get::<_, Option<T>>(idx)
}

fn decode_column(
    row: &tokio_postgres::Row,
    idx: usize,
    ty: &Type,
) -> std::result::Result<Value, BoxError> {
    let value = match *ty {
        Type::BOOL => get::<bool>(row, idx)?.map(Value::Bool),
        Type::INT2 => get::<i16>(row, idx)?.map(Value::from),
        Type::INT4 => get::<i32>(row, idx)?.map(Value::from),
        Type::INT8 => get::<i64>(row, idx)?.map(Value::from),
        Type::OID => get::<u32>(row, idx)?.map(|n| Value::Integer(i64::from(n))),
        Type::FLOAT4 => get::<f32>(row, idx)?.map(Value::from),
        Type::FLOAT8 => get::<f64>(row, idx)?.map(Value::from),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            get::<String>(row, idx)?.map(Value::Text)
        }
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx)?.map(|ts| Value::Date(ts.and_utc())),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx)?.map(Value::Date),
        Type::DATE => get::<NaiveDate>(row, idx)?
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|ts| Value::Date(ts.and_utc())),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx)?.map(Value::Json),
        Type::INT4_ARRAY => get::<Vec<Option<i32>>>(row, idx)?.map(array),
        Type::INT8_ARRAY => get::<Vec<Option<i64>>>(row, idx)?.map(array),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => get::<Vec<Option<String>>>(row, idx)?.map(array),
        _ => return Err(format!("unsupported column type {}", ty).into()),
    };
    Ok(value.unwrap_or(Value::Null))
}

fn array<T: Into<Value>>(items: Vec<Option<T>>) -> Value {
    Value::Array(items.into_iter().map(Value::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn encode(value: Value, ty: &Type) -> std::result::Result<(IsNull, BytesMut), BoxError> {
        let mut out = BytesMut::new();
        let is_null = PgValue(&value).to_sql(ty, &mut out)?;
        Ok((is_null, out))
    }

    #[test]
    fn integers_follow_the_parameter_width() {
        let (_, int4) = encode(Value::Integer(7), &Type::INT4).unwrap();
        assert_eq!(&int4[..], &7i32.to_be_bytes());

        let (_, int8) = encode(Value::Integer(7), &Type::INT8).unwrap();
        assert_eq!(&int8[..], &7i64.to_be_bytes());

        assert!(encode(Value::Integer(1 << 40), &Type::INT4).is_err());
    }

    #[test]
    fn numeric_text_binds_as_number() {
        let (_, out) = encode(Value::Text("42".into()), &Type::INT4).unwrap();
        assert_eq!(&out[..], &42i32.to_be_bytes());
    }

    #[test]
    fn booleans_bind_to_bool_and_integer_columns() {
        let (_, out) = encode(Value::Bool(true), &Type::BOOL).unwrap();
        assert_eq!(&out[..], &[1]);

        let (_, out) = encode(Value::Integer(0), &Type::BOOL).unwrap();
        assert_eq!(&out[..], &[0]);

        let (_, out) = encode(Value::Bool(true), &Type::INT2).unwrap();
        assert_eq!(&out[..], &1i16.to_be_bytes());

        let (is_null, _) = encode(Value::Text("NULL".into()), &Type::BOOL).unwrap();
        assert!(matches!(is_null, IsNull::Yes));
    }

    #[test]
    fn timestamp_text_binds_as_timestamp() {
        let (_, from_text) =
            encode(Value::Text("2014-02-03 04:05:06".into()), &Type::TIMESTAMP).unwrap();
        let date = Utc.with_ymd_and_hms(2014, 2, 3, 4, 5, 6).unwrap();
        let (_, from_date) = encode(Value::Date(date), &Type::TIMESTAMP).unwrap();
        assert_eq!(from_text, from_date);
    }

    #[test]
    fn null_is_null_for_every_type() {
        for ty in [Type::INT4, Type::TEXT, Type::TIMESTAMPTZ, Type::JSONB] {
            let (is_null, out) = encode(Value::Null, &ty).unwrap();
            assert!(matches!(is_null, IsNull::Yes));
            assert!(out.is_empty());
        }
    }

    #[test]
    fn lists_need_an_array_parameter() {
        let list = Value::Array(vec![1.into(), 2.into()]);
        assert!(encode(list.clone(), &Type::INT4).is_err());
        assert!(encode(list, &Type::INT4_ARRAY).is_ok());
    }
}
