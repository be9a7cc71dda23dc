//! Type-driven value coercion.
//!
//! Outbound coercion turns caller values into what gets bound for a column;
//! inbound coercion turns driver values back into attribute values. Both are
//! a closed match over [`AttrType`]; filters are coerced by visiting every
//! value of every [`Condition`] with the type of the attribute it targets.

use crate::error::{QuarryError, Result};
use crate::query::{Condition, Filter, Values};
use crate::relation::Registry;
use crate::schema::{AttrType, Attribute, ColumnType, Schema};
use crate::value::{Value, iso_string, parse_numeric};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

/// How boolean `false` is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FalseEncoding {
    /// `0`
    #[default]
    Zero,
    /// The literal `NULL` token, bound as text.
    LegacyNull,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoercionOptions {
    pub false_encoding: FalseEncoding,
}

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Coerces one outbound value for `attr`.
///
/// `name` is only used in errors; an undeclared attribute (`attr == None`)
/// gets numeric-text and JSON handling only.
pub fn outbound(
    name: &str,
    attr: Option<&Attribute>,
    value: Value,
    options: CoercionOptions,
) -> Result<Value> {
    if let Some(formatter) = attr.and_then(|a| a.formatter.as_ref()) {
        return formatter(&value);
    }
    if value.is_null() {
        return Ok(Value::Null);
    }

    let Some(attr) = attr else {
        return Ok(match value {
            Value::Json(json) => Value::Text(json.to_string()),
            Value::Text(text) => parse_numeric(&text).unwrap_or(Value::Text(text)),
            other => other,
        });
    };

    match attr.kind {
        AttrType::Date => {
            let date = to_date(name, &value)?;
            Ok(match attr.column_type {
                Some(ColumnType::Datetime) => Value::Text(iso_string(&date)),
                Some(ColumnType::Timestamp) => {
                    Value::Text(date.format(TIMESTAMP_FORMAT).to_string())
                }
                Some(ColumnType::Integer | ColumnType::Number) | None => {
                    Value::Integer(date.timestamp())
                }
            })
        }
        AttrType::Boolean => match to_bool(name, &value)? {
            true => Ok(Value::Integer(1)),
            false => Ok(match options.false_encoding {
                FalseEncoding::Zero => Value::Integer(0),
                FalseEncoding::LegacyNull => Value::Text("NULL".into()),
            }),
        },
        AttrType::Json | AttrType::Array | AttrType::Object => Ok(match value {
            text @ Value::Text(_) => text,
            other => Value::Text(other.to_json().to_string()),
        }),
        AttrType::Number => match value {
            Value::Text(text) => parse_numeric(&text)
                .ok_or_else(|| QuarryError::coercion(name, format!("`{}` is not a number", text))),
            Value::Bool(b) => Ok(Value::Integer(b as i64)),
            Value::Json(_) | Value::Array(_) => Err(QuarryError::coercion(name, "expected a number")),
            other => Ok(other),
        },
        AttrType::String => Ok(match value {
            Value::Integer(_) | Value::Float(_) => Value::Text(value.to_string()),
            Value::Json(json) => Value::Text(json.to_string()),
            other => other,
        }),
    }
}

/// Coerces one value read from the column of `attr`.
pub fn inbound(attr: &Attribute, value: Value) -> Result<Value> {
    match attr.kind {
        AttrType::Boolean => Ok(Value::Bool(value.is_truthy())),
        AttrType::Date => {
            // Stored numbers are always epoch seconds. Anything that does not
            // read as a date (MySQL's zero date) is returned as stored.
            let read = match &value {
                Value::Integer(secs) => Some(from_epoch(&attr.name, *secs as f64)),
                Value::Float(secs) => Some(from_epoch(&attr.name, *secs)),
                Value::Text(_) => Some(to_date(&attr.name, &value)),
                _ => None,
            };
            Ok(match read {
                Some(Ok(date)) => Value::Date(date),
                _ => value,
            })
        }
        AttrType::Json | AttrType::Array | AttrType::Object => Ok(match value {
            Value::Text(text) => match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(json) if attr.kind == AttrType::Array => Value::from_json(json),
                Ok(json) => Value::Json(json),
                Err(_) => Value::Text(text),
            },
            other => other,
        }),
        AttrType::Number | AttrType::String => Ok(value),
    }
}

/// Coerces every value in a filter tree.
///
/// Conditions qualified with a table use that table's schema, everything
/// else uses `schema`. `$like` patterns are left as text.
pub fn coerce_filters(
    filters: Vec<Filter>,
    schema: &Schema,
    registry: &Registry,
    options: CoercionOptions,
) -> Result<Vec<Filter>> {
    filters
        .into_iter()
        .map(|filter| coerce_filter(filter, schema, registry, options))
        .collect()
}

fn coerce_filter(
    filter: Filter,
    schema: &Schema,
    registry: &Registry,
    options: CoercionOptions,
) -> Result<Filter> {
    match filter {
        Filter::And(filters) => Ok(Filter::And(coerce_filters(filters, schema, registry, options)?)),
        Filter::Or(filters) => Ok(Filter::Or(coerce_filters(filters, schema, registry, options)?)),
        Filter::Field {
            table,
            attr,
            condition,
        } => {
            let owner = match &table {
                Some(table) => registry.schema_for_table(table),
                None => Some(schema),
            };
            let definition = owner.and_then(|s| s.attribute(&attr));

            let condition = match condition {
                Condition::Like(pattern @ Value::Text(_)) => Condition::Like(pattern),
                // Equality with null renders `is null` and is never coerced.
                Condition::Eq(Value::Null) => Condition::Eq(Value::Null),
                Condition::Ne(Value::Null) => Condition::Ne(Value::Null),
                other => other.try_map_values(|v| outbound(&attr, definition, v, options))?,
            };

            Ok(Filter::Field {
                table,
                attr,
                condition,
            })
        }
    }
}

/// Coerces write values, dropping unset entries.
pub fn coerce_values(
    values: Values,
    schema: &Schema,
    options: CoercionOptions,
) -> Result<Vec<(String, Value)>> {
    values
        .into_iter()
        .filter_map(|(attr, value)| value.map(|v| (attr, v)))
        .map(|(attr, value)| {
            let value = outbound(&attr, schema.attribute(&attr), value, options)?;
            Ok((attr, value))
        })
        .collect()
}

/// Normalizes date-like input: a date, epoch seconds, a four-digit year, or
/// ISO / `YYYY-MM-DD[ HH:MM:SS]` text (naive text is read as UTC).
pub fn to_date(name: &str, value: &Value) -> Result<DateTime<Utc>> {
    let invalid = || QuarryError::coercion(name, format!("`{}` is not a valid date", value));
    match value {
        Value::Date(date) => Ok(*date),
        Value::Integer(year) if (1000..=9999).contains(year) => Utc
            .with_ymd_and_hms(*year as i32, 1, 1, 0, 0, 0)
            .single()
            .ok_or_else(invalid),
        Value::Integer(secs) => from_epoch(name, *secs as f64),
        Value::Float(secs) => from_epoch(name, *secs),
        Value::Text(text) => {
            let text = text.trim();
            if let Some(number) = parse_numeric(text) {
                return to_date(name, &number);
            }
            if let Ok(date) = DateTime::parse_from_rfc3339(text) {
                return Ok(date.with_timezone(&Utc));
            }
            for format in [TIMESTAMP_FORMAT, "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
                    return Ok(naive.and_utc());
                }
            }
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
                .ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

fn from_epoch(name: &str, secs: f64) -> Result<DateTime<Utc>> {
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
        .ok_or_else(|| QuarryError::coercion(name, format!("{} is out of range for a date", secs)))
}

pub fn to_bool(name: &str, value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Integer(n) => Ok(*n != 0),
        Value::Float(f) => Ok(*f != 0.0),
        Value::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            _ => Err(QuarryError::coercion(name, format!("`{}` is not a boolean", text))),
        },
        _ => Err(QuarryError::coercion(name, "expected a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use chrono::Timelike;
    use serde_json::json;

    const DEFAULTS: CoercionOptions = CoercionOptions {
        false_encoding: FalseEncoding::Zero,
    };

    fn date(column_type: Option<ColumnType>) -> Attribute {
        let attr = Attribute::new("created").kind(AttrType::Date);
        match column_type {
            Some(ct) => attr.column_type(ct),
            None => attr,
        }
    }

    #[test]
    fn dates_serialize_per_column_type() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let value = Value::Date(at);

        assert_eq!(
            outbound("created", Some(&date(Some(ColumnType::Timestamp))), value.clone(), DEFAULTS)
                .unwrap(),
            Value::Text("2024-03-05 14:07:09".into())
        );
        assert_eq!(
            outbound("created", Some(&date(Some(ColumnType::Datetime))), value.clone(), DEFAULTS)
                .unwrap(),
            Value::Text("2024-03-05T14:07:09.000Z".into())
        );
        assert_eq!(
            outbound("created", Some(&date(None)), value, DEFAULTS).unwrap(),
            Value::Integer(at.timestamp())
        );
    }

    #[test]
    fn date_inputs_are_normalized() {
        let attr = date(Some(ColumnType::Datetime));
        let year = outbound("created", Some(&attr), Value::Integer(2020), DEFAULTS).unwrap();
        assert_eq!(year, Value::Text("2020-01-01T00:00:00.000Z".into()));

        let epoch = outbound("created", Some(&attr), Value::Integer(86_400), DEFAULTS).unwrap();
        assert_eq!(epoch, Value::Text("1970-01-02T00:00:00.000Z".into()));

        let text = outbound("created", Some(&attr), "2021-06-01".into(), DEFAULTS).unwrap();
        assert_eq!(text, Value::Text("2021-06-01T00:00:00.000Z".into()));

        assert!(outbound("created", Some(&attr), "yesterday".into(), DEFAULTS).is_err());
    }

    #[test]
    fn timestamp_round_trip_is_exact_to_the_second() {
        let attr = date(Some(ColumnType::Timestamp));
        let at = Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 58).unwrap()
            + chrono::Duration::milliseconds(750);

        let stored = outbound("created", Some(&attr), Value::Date(at), DEFAULTS).unwrap();
        let Value::Date(read) = inbound(&attr, stored).unwrap() else {
            panic!("expected a date");
        };
        assert_eq!(read, at.with_nanosecond(0).unwrap());
    }

    #[test]
    fn unreadable_stored_dates_are_kept_as_stored() {
        let attr = date(Some(ColumnType::Timestamp));
        let zero = Value::from("0000-00-00 00:00:00");
        assert_eq!(inbound(&attr, zero.clone()).unwrap(), zero);
        assert!(outbound("created", Some(&attr), zero, DEFAULTS).is_err());
    }

    #[test]
    fn booleans_encode_false_per_option() {
        let attr = Attribute::new("active").kind(AttrType::Boolean);
        assert_eq!(
            outbound("active", Some(&attr), true.into(), DEFAULTS).unwrap(),
            Value::Integer(1)
        );
        assert_eq!(
            outbound("active", Some(&attr), false.into(), DEFAULTS).unwrap(),
            Value::Integer(0)
        );
        let legacy = CoercionOptions {
            false_encoding: FalseEncoding::LegacyNull,
        };
        assert_eq!(
            outbound("active", Some(&attr), false.into(), legacy).unwrap(),
            Value::Text("NULL".into())
        );

        assert_eq!(inbound(&attr, Value::Integer(1)).unwrap(), Value::Bool(true));
        assert_eq!(inbound(&attr, Value::Null).unwrap(), Value::Bool(false));
    }

    #[test]
    fn structured_values_become_json_text() {
        let attr = Attribute::new("tags").kind(AttrType::Array);
        let stored = outbound("tags", Some(&attr), vec!["a", "b"].into(), DEFAULTS).unwrap();
        assert_eq!(stored, Value::Text(r#"["a","b"]"#.into()));
        assert_eq!(
            inbound(&attr, stored).unwrap(),
            Value::Array(vec!["a".into(), "b".into()])
        );

        let undeclared = outbound("meta", None, json!({"k": 1}).into(), DEFAULTS).unwrap();
        assert_eq!(undeclared, Value::Text(r#"{"k":1}"#.into()));
    }

    #[test]
    fn formatter_takes_precedence() {
        let attr = Attribute::new("email").formatter(|v| {
            Ok(Value::Text(v.as_str().unwrap_or_default().to_lowercase()))
        });
        assert_eq!(
            outbound("email", Some(&attr), "A@B.COM".into(), DEFAULTS).unwrap(),
            Value::Text("a@b.com".into())
        );
    }

    #[test]
    fn numeric_text_follows_attribute_type() {
        let number = Attribute::new("age").kind(AttrType::Number);
        let string = Attribute::new("zip");
        assert_eq!(
            outbound("age", Some(&number), "42".into(), DEFAULTS).unwrap(),
            Value::Integer(42)
        );
        assert_eq!(
            outbound("zip", Some(&string), "02134".into(), DEFAULTS).unwrap(),
            Value::Text("02134".into())
        );
        assert_eq!(
            outbound("zip", Some(&string), Value::Integer(2134), DEFAULTS).unwrap(),
            Value::Text("2134".into())
        );
        assert_eq!(outbound("id", None, "7".into(), DEFAULTS).unwrap(), Value::Integer(7));
        assert!(outbound("age", Some(&number), "old".into(), DEFAULTS).is_err());
    }

    #[test]
    fn filters_coerce_every_operand() {
        let schema = Schema::builder("User")
            .attr(Attribute::new("id").kind(AttrType::Number).primary())
            .attr(Attribute::new("active").kind(AttrType::Boolean))
            .build()
            .unwrap();
        let registry = Registry::new();
        let filters = vec![
            Filter::is_in("id", ["1", "2"]),
            Filter::or([Filter::eq("active", true), Filter::eq("active", Value::Null)]),
        ];
        let coerced = coerce_filters(filters, &schema, &registry, DEFAULTS).unwrap();
        assert_eq!(
            coerced,
            vec![
                Filter::is_in("id", [1, 2]),
                Filter::or([Filter::eq("active", 1), Filter::eq("active", Value::Null)]),
            ]
        );
    }
}
