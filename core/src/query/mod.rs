//! Query descriptors.
//!
//! A [`Query`] is the canonical shape every operation consumes: anded
//! [`Filter`]s, include aliases, ordering, pagination and write values.
//! Free-form JSON input is folded into this shape by [`Query::from_json`].

mod normalize;

pub use normalize::{MAX_COUNT, Page};

use crate::value::Value;

/// Comparison applied to one attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Like(Value),
}

impl Condition {
    /// Applies `f` to every value held by this condition.
    pub fn try_map_values<E>(
        self,
        mut f: impl FnMut(Value) -> Result<Value, E>,
    ) -> Result<Condition, E> {
        Ok(match self {
            Condition::Eq(v) => Condition::Eq(f(v)?),
            Condition::Ne(v) => Condition::Ne(f(v)?),
            Condition::Gt(v) => Condition::Gt(f(v)?),
            Condition::Gte(v) => Condition::Gte(f(v)?),
            Condition::Lt(v) => Condition::Lt(f(v)?),
            Condition::Lte(v) => Condition::Lte(f(v)?),
            Condition::Like(v) => Condition::Like(f(v)?),
            Condition::In(vs) => Condition::In(vs.into_iter().map(&mut f).collect::<Result<_, _>>()?),
            Condition::NotIn(vs) => {
                Condition::NotIn(vs.into_iter().map(&mut f).collect::<Result<_, _>>()?)
            }
        })
    }
}

/// A boolean filter tree over attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `attr <condition>`; `table` defaults to the queried model's table.
    Field {
        table: Option<String>,
        attr: String,
        condition: Condition,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn field(attr: impl Into<String>, condition: Condition) -> Self {
        Filter::Field {
            table: None,
            attr: attr.into(),
            condition,
        }
    }

    /// A condition on a column of an explicitly named table.
    pub fn qualified(table: impl Into<String>, attr: impl Into<String>, condition: Condition) -> Self {
        Filter::Field {
            table: Some(table.into()),
            attr: attr.into(),
            condition,
        }
    }

    pub fn eq(attr: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(attr, Condition::Eq(value.into()))
    }

    pub fn ne(attr: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(attr, Condition::Ne(value.into()))
    }

    pub fn gt(attr: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(attr, Condition::Gt(value.into()))
    }

    pub fn gte(attr: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(attr, Condition::Gte(value.into()))
    }

    pub fn lt(attr: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(attr, Condition::Lt(value.into()))
    }

    pub fn lte(attr: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(attr, Condition::Lte(value.into()))
    }

    pub fn is_in<I>(attr: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self::field(attr, Condition::In(values.into_iter().map(Into::into).collect()))
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// One `order by` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub table: Option<String>,
    pub attr: String,
    pub direction: Direction,
}

impl OrderTerm {
    pub fn asc(attr: impl Into<String>) -> Self {
        Self {
            table: None,
            attr: attr.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(attr: impl Into<String>) -> Self {
        Self {
            table: None,
            attr: attr.into(),
            direction: Direction::Desc,
        }
    }
}

/// Ordered attribute assignments for inserts and updates.
///
/// An unset entry (`None`) leaves its column untouched and is dropped before
/// the statement is built.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Values(Vec<(String, Option<Value>)>);

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `value`, replacing an earlier assignment of the same attribute.
    pub fn set(mut self, attr: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(attr.into(), Some(value.into()));
        self
    }

    /// Records `attr` as present but undefined.
    pub fn unset(mut self, attr: impl Into<String>) -> Self {
        self.insert(attr.into(), None);
        self
    }

    pub fn insert(&mut self, attr: String, value: Option<Value>) {
        match self.0.iter_mut().find(|(name, _)| *name == attr) {
            Some(slot) => slot.1 = value,
            None => self.0.push((attr, value)),
        }
    }

    pub fn get(&self, attr: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(name, _)| name == attr)
            .and_then(|(_, v)| v.as_ref())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.0.iter().map(|(name, v)| (name.as_str(), v.as_ref()))
    }
}

impl IntoIterator for Values {
    type Item = (String, Option<Value>);
    type IntoIter = std::vec::IntoIter<(String, Option<Value>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Values {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Values::new(), |values, (k, v)| values.set(k, v))
    }
}

/// Canonical query descriptor.
///
/// # Examples
///
/// ```
/// use quarry_core::query::{Filter, Query};
///
/// let query = Query::new()
///     .filter(Filter::or([Filter::eq("id", 1), Filter::eq("name", "jeff")]))
///     .include("posts")
///     .page(2)
///     .page_size(25);
/// assert_eq!(query.include, vec!["posts".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    /// Filters joined with `and`
    pub filters: Vec<Filter>,
    /// Relation aliases to eager-load
    pub include: Vec<String>,
    pub order: Vec<OrderTerm>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub values: Values,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query matching a single primary-key value.
    pub fn by_primary(primary_key: &str, value: impl Into<Value>) -> Self {
        Self::new().filter(Filter::eq(primary_key, value))
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Adds include aliases; accepts a single alias or a comma-separated list.
    pub fn include(mut self, aliases: &str) -> Self {
        self.include.extend(split_list(aliases));
        self
    }

    pub fn order_by(mut self, term: OrderTerm) -> Self {
        self.order.push(term);
        self
    }

    /// Parses `"name desc, -created_at"` style ordering.
    pub fn order(mut self, order: &str) -> Self {
        self.order.extend(normalize::parse_order(order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn values(mut self, values: Values) -> Self {
        self.values = values;
        self
    }
}

pub(crate) fn split_list(list: &str) -> impl Iterator<Item = String> + '_ {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
