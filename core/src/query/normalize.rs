//! Folding of free-form JSON query objects into [`Query`], and pagination.

use super::{Condition, Direction, Filter, OrderTerm, Query, Values, split_list};
use crate::error::{QuarryError, Result};
use crate::value::{Value, parse_numeric};
use serde_json::{Map, Value as Json};

/// Top-level keys that are never folded into `where`.
const RESERVED: &[&str] = &[
    "where", "include", "columns", "table", "type", "values", "order", "sort", "limit", "offset",
    "page", "pageSize", "groupBy", "joins",
];

impl Query {
    /// Canonicalizes a free-form query object.
    ///
    /// `sort` is an alias of `order`, `pageSize` takes precedence over
    /// `limit`, and any top-level key outside the reserved keyword set is
    /// treated as an implicit filter. `null` is an empty query.
    ///
    /// ```
    /// use quarry_core::query::{Filter, Query};
    /// use serde_json::json;
    ///
    /// let query = Query::from_json(&json!({ "name": "alex", "limit": "10" })).unwrap();
    /// assert_eq!(query.filters, vec![Filter::eq("name", "alex")]);
    /// assert_eq!(query.limit, Some(10));
    /// ```
    pub fn from_json(input: &Json) -> Result<Query> {
        let object = match input {
            Json::Null => return Ok(Query::new()),
            Json::Object(object) => object,
            other => {
                return Err(QuarryError::InvalidQuery(format!(
                    "expected a query object, got {}",
                    other
                )));
            }
        };

        let mut query = Query::new();
        for (key, value) in object {
            match key.as_str() {
                "where" => match value {
                    Json::Null => {}
                    Json::Object(clauses) => query.filters.extend(parse_clauses(clauses)?),
                    other => {
                        return Err(QuarryError::InvalidQuery(format!(
                            "`where` must be an object, got {}",
                            other
                        )));
                    }
                },
                "include" => query.include.extend(parse_names("include", value)?),
                "order" | "sort" => {
                    for term in parse_names(key, value)? {
                        query.order.extend(parse_order(&term));
                    }
                }
                "limit" => query.limit = parse_count(key, value)?,
                "offset" => query.offset = parse_count(key, value)?,
                "page" => query.page = parse_count(key, value)?,
                "pageSize" => query.page_size = parse_count(key, value)?,
                "values" => query.values = parse_values(value)?,
                reserved if RESERVED.contains(&reserved) => {}
                _ => query.filters.push(parse_clause(key, value)?),
            }
        }
        Ok(query)
    }
}

/// Largest `limit` or `offset` a statement can bind (the range of a
/// signed 64-bit integer parameter).
pub const MAX_COUNT: u64 = i64::MAX as u64;

/// Resolved `limit`/`offset` of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

impl Page {
    /// 1-based page number: `ceil((offset + limit) / limit)`.
    pub fn number(&self) -> u64 {
        self.offset.saturating_add(self.limit).div_ceil(self.limit)
    }

    /// Page count for `total` rows: `ceil(total / limit)`.
    pub fn pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }
}

impl Query {
    /// Resolves pagination against the configured limits.
    ///
    /// A missing or zero limit falls back to `default_limit`; the result is
    /// clamped to `1..=max_limit`. A page number (1-based; `0` is ignored)
    /// overrides any explicit offset with `page * limit - limit`. Both values
    /// are capped at [`MAX_COUNT`].
    pub fn paginate(&self, default_limit: u64, max_limit: u64) -> Page {
        let requested = self
            .page_size
            .or(self.limit)
            .filter(|&l| l > 0)
            .unwrap_or(default_limit);
        let limit = requested.clamp(1, max_limit.clamp(1, MAX_COUNT));

        let offset = match self.page {
            Some(page) if page >= 1 => page.saturating_mul(limit) - limit,
            _ => self.offset.unwrap_or(0),
        }
        .min(MAX_COUNT);

        Page { limit, offset }
    }
}

/// Parses `"name desc, -created_at, post.title asc"`.
pub(crate) fn parse_order(order: &str) -> Vec<OrderTerm> {
    split_list(order)
        .filter_map(|term| {
            let (name, direction) = match term.strip_prefix('-') {
                Some(name) => (name.trim().to_string(), Direction::Desc),
                None => {
                    let mut parts = term.split_whitespace();
                    let name = parts.next()?.to_string();
                    let direction = match parts.next() {
                        Some(d) if d.eq_ignore_ascii_case("desc") => Direction::Desc,
                        _ => Direction::Asc,
                    };
                    (name, direction)
                }
            };
            if name.is_empty() {
                return None;
            }
            let (table, attr) = split_qualified(&name);
            Some(OrderTerm {
                table,
                attr,
                direction,
            })
        })
        .collect()
}

fn split_qualified(name: &str) -> (Option<String>, String) {
    match name.split_once('.') {
        Some((table, attr)) if !table.is_empty() && !attr.is_empty() => {
            (Some(table.to_string()), attr.to_string())
        }
        _ => (None, name.to_string()),
    }
}

fn parse_clauses(clauses: &Map<String, Json>) -> Result<Vec<Filter>> {
    clauses
        .iter()
        .map(|(key, value)| parse_clause(key, value))
        .collect()
}

fn parse_clause(key: &str, value: &Json) -> Result<Filter> {
    match key {
        "$or" => Ok(Filter::Or(parse_group(key, value)?)),
        "$and" => Ok(Filter::And(parse_group(key, value)?)),
        op if op.starts_with('$') => Err(QuarryError::InvalidQuery(format!(
            "operator `{}` is not valid at attribute position",
            op
        ))),
        _ => {
            let (table, attr) = split_qualified(key);
            let mut conditions = parse_conditions(key, value)?;
            let field = |condition| Filter::Field {
                table: table.clone(),
                attr: attr.clone(),
                condition,
            };
            if conditions.len() == 1 {
                Ok(field(conditions.remove(0)))
            } else {
                Ok(Filter::And(conditions.into_iter().map(field).collect()))
            }
        }
    }
}

/// `$or`/`$and` operands: an object of clauses, or an array of clause
/// objects (each anded internally).
fn parse_group(op: &str, value: &Json) -> Result<Vec<Filter>> {
    let filters = match value {
        Json::Object(clauses) => parse_clauses(clauses)?,
        Json::Array(items) => items
            .iter()
            .map(|item| match item {
                Json::Object(clauses) => {
                    let mut filters = parse_clauses(clauses)?;
                    Ok(if filters.len() == 1 {
                        filters.remove(0)
                    } else {
                        Filter::And(filters)
                    })
                }
                other => Err(QuarryError::InvalidQuery(format!(
                    "`{}` items must be objects, got {}",
                    op, other
                ))),
            })
            .collect::<Result<_>>()?,
        other => {
            return Err(QuarryError::InvalidQuery(format!(
                "`{}` expects an object or array, got {}",
                op, other
            )));
        }
    };
    if filters.is_empty() {
        return Err(QuarryError::InvalidQuery(format!("`{}` is empty", op)));
    }
    Ok(filters)
}

fn parse_conditions(attr: &str, value: &Json) -> Result<Vec<Condition>> {
    let object = match value {
        Json::Array(items) => return Ok(vec![Condition::In(list(items))]),
        Json::Object(object) => object,
        scalar => return Ok(vec![Condition::Eq(Value::from_json(scalar.clone()))]),
    };

    if object.is_empty() {
        return Err(QuarryError::InvalidQuery(format!(
            "empty expression for `{}`",
            attr
        )));
    }
    if !object.keys().any(|k| k.starts_with('$')) {
        // A plain document compared as a whole.
        return Ok(vec![Condition::Eq(Value::Json(value.clone()))]);
    }

    object
        .iter()
        .map(|(op, operand)| {
            let single = || Value::from_json(operand.clone());
            Ok(match op.as_str() {
                "$eq" => Condition::Eq(single()),
                "$ne" => Condition::Ne(single()),
                "$gt" => Condition::Gt(single()),
                "$gte" => Condition::Gte(single()),
                "$lt" => Condition::Lt(single()),
                "$lte" => Condition::Lte(single()),
                "$like" => Condition::Like(single()),
                "$in" => Condition::In(operand_list(op, operand)?),
                "$nin" => Condition::NotIn(operand_list(op, operand)?),
                other => {
                    return Err(QuarryError::InvalidQuery(format!(
                        "unknown operator `{}` on `{}`",
                        other, attr
                    )));
                }
            })
        })
        .collect()
}

fn list(items: &[Json]) -> Vec<Value> {
    items.iter().cloned().map(Value::from_json).collect()
}

fn operand_list(op: &str, operand: &Json) -> Result<Vec<Value>> {
    match operand {
        Json::Array(items) => Ok(list(items)),
        Json::String(s) => Ok(split_list(s).map(Value::Text).collect()),
        other => Err(QuarryError::InvalidQuery(format!(
            "`{}` expects a list, got {}",
            op, other
        ))),
    }
}

fn parse_names(key: &str, value: &Json) -> Result<Vec<String>> {
    match value {
        Json::Null => Ok(Vec::new()),
        Json::String(s) => Ok(split_list(s).collect()),
        Json::Array(items) => items
            .iter()
            .map(|item| match item {
                Json::String(s) => Ok(s.trim().to_string()),
                other => Err(QuarryError::InvalidQuery(format!(
                    "`{}` entries must be strings, got {}",
                    key, other
                ))),
            })
            .collect(),
        other => Err(QuarryError::InvalidQuery(format!(
            "`{}` must be a string or list, got {}",
            key, other
        ))),
    }
}

/// Accepts non-negative integers and numeric text up to [`MAX_COUNT`].
fn parse_count(key: &str, value: &Json) -> Result<Option<u64>> {
    let number = match value {
        Json::Null => return Ok(None),
        Json::Number(n) => match n.as_i64() {
            Some(n) => Some(Value::Integer(n)),
            None => n.as_f64().map(Value::Float),
        },
        Json::String(s) => parse_numeric(s),
        _ => None,
    };
    let invalid = |reason: &str| QuarryError::InvalidQuery(format!("`{}` {}", key, reason));
    let count = match number {
        Some(Value::Integer(n)) => u64::try_from(n).map_err(|_| invalid("must not be negative"))?,
        Some(Value::Float(f)) if f < 0.0 => return Err(invalid("must not be negative")),
        Some(Value::Float(f)) if f < MAX_COUNT as f64 => f.floor() as u64,
        Some(Value::Float(_)) => return Err(invalid("is out of range")),
        _ => {
            return Err(invalid(&format!("must be a number, got {}", value)));
        }
    };
    Ok(Some(count))
}

fn parse_values(value: &Json) -> Result<Values> {
    match value {
        Json::Null => Ok(Values::new()),
        Json::Object(object) => {
            let mut values = Values::new();
            for (attr, v) in object {
                values.insert(attr.clone(), Some(Value::from_json(v.clone())));
            }
            Ok(values)
        }
        other => Err(QuarryError::InvalidQuery(format!(
            "`values` must be an object, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn or_object_becomes_a_disjunction() {
        let query = Query::from_json(&json!({ "where": { "$or": { "id": 1, "name": "jeff" } } }))
            .unwrap();
        assert_eq!(
            query.filters,
            vec![Filter::or([Filter::eq("id", 1), Filter::eq("name", "jeff")])]
        );
    }

    #[test]
    fn or_array_ands_each_branch() {
        let query = Query::from_json(&json!({
            "$or": [{ "id": 1 }, { "name": "jeff", "age": { "$gt": 20 } }]
        }))
        .unwrap();
        assert_eq!(
            query.filters,
            vec![Filter::or([
                Filter::eq("id", 1),
                Filter::and([Filter::eq("name", "jeff"), Filter::gt("age", 20)]),
            ])]
        );
    }

    #[test]
    fn unreserved_keys_fold_into_where() {
        let query = Query::from_json(&json!({
            "name": "alex",
            "columns": ["id"],
            "sort": "name desc",
            "include": "posts, groups",
        }))
        .unwrap();
        assert_eq!(query.filters, vec![Filter::eq("name", "alex")]);
        assert_eq!(query.order, vec![OrderTerm::desc("name")]);
        assert_eq!(query.include, vec!["posts", "groups"]);
    }

    #[test]
    fn operator_objects_expand_per_operator() {
        let query = Query::from_json(&json!({
            "age": { "$gte": 18, "$lt": 65 },
            "id": { "$in": [1, 2] },
            "role": ["admin", "owner"],
        }))
        .unwrap();
        assert_eq!(
            query.filters,
            vec![
                Filter::and([Filter::gte("age", 18), Filter::lt("age", 65)]),
                Filter::is_in("id", [1, 2]),
                Filter::is_in("role", ["admin", "owner"]),
            ]
        );
    }

    #[test]
    fn empty_and_unknown_operators_are_rejected() {
        assert!(Query::from_json(&json!({ "age": {} })).is_err());
        assert!(Query::from_json(&json!({ "age": { "$between": [1, 2] } })).is_err());
        assert!(Query::from_json(&json!({ "$or": [] })).is_err());
    }

    #[test]
    fn pagination_params_accept_numeric_text() {
        let query = Query::from_json(&json!({ "page": "3", "pageSize": 20 })).unwrap();
        assert_eq!(query.page, Some(3));
        assert_eq!(query.page_size, Some(20));
        assert!(Query::from_json(&json!({ "limit": -1 })).is_err());
        assert!(Query::from_json(&json!({ "offset": "ten" })).is_err());
    }

    #[test]
    fn order_parsing() {
        assert_eq!(
            parse_order("name, -created_at, post.title DESC"),
            vec![
                OrderTerm::asc("name"),
                OrderTerm::desc("created_at"),
                OrderTerm {
                    table: Some("post".into()),
                    attr: "title".into(),
                    direction: Direction::Desc,
                },
            ]
        );
    }

    #[test]
    fn page_offsets_subtract_one_page() {
        for page in 1..10u64 {
            for size in [1u64, 7, 50] {
                let p = Query::new().page(page).page_size(size).paginate(50, 200);
                assert_eq!(p.offset, page * size - size);
                assert_eq!(p.number(), page);
            }
        }
    }

    #[test]
    fn limits_are_clamped_and_defaulted() {
        assert_eq!(Query::new().paginate(50, 200).limit, 50);
        assert_eq!(Query::new().limit(0).paginate(50, 200).limit, 50);
        assert_eq!(Query::new().limit(5000).paginate(50, 200).limit, 200);
        assert_eq!(Query::new().limit(10).offset(30).paginate(50, 200).offset, 30);
        assert_eq!(Query::new().page(0).offset(4).paginate(50, 200).offset, 4);
    }

    #[test]
    fn counts_beyond_a_bigint_are_rejected() {
        assert!(Query::from_json(&json!({ "offset": 1e30 })).is_err());
        assert!(Query::from_json(&json!({ "offset": u64::MAX })).is_err());
        assert!(Query::from_json(&json!({ "page": "1e19" })).is_err());

        let query = Query::from_json(&json!({ "offset": i64::MAX })).unwrap();
        assert_eq!(query.offset, Some(MAX_COUNT));
    }

    #[test]
    fn huge_offsets_are_capped() {
        let page = Query::new().offset(u64::MAX).paginate(50, 200);
        assert_eq!(page.offset, MAX_COUNT);
        assert_eq!(page.limit, 50);
        assert!(page.number() > 1);

        let page = Query::new().page(u64::MAX).page_size(10).paginate(50, 200);
        assert_eq!(page.offset, MAX_COUNT);

        let page = Query::new().limit(u64::MAX).paginate(50, u64::MAX);
        assert_eq!(page.limit, MAX_COUNT);
    }

    #[test]
    fn page_count_rounds_up() {
        let page = Page { limit: 20, offset: 0 };
        assert_eq!(page.pages(0), 0);
        assert_eq!(page.pages(20), 1);
        assert_eq!(page.pages(21), 2);
    }
}
