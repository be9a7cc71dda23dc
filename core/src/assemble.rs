//! Reassembly of flat, table-prefixed result rows into entities.

use crate::builder::COUNT_ALIAS;
use crate::coerce::inbound;
use crate::connection::Row;
use crate::error::{QuarryError, Result};
use crate::query::Page;
use crate::resolve::Plan;
use crate::schema::Schema;
use crate::value::Value;
use hashbrown::{HashMap, HashSet};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Attribute values of one record, plus eager-loaded relations by alias.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity {
    pub attributes: BTreeMap<String, Value>,
    pub related: BTreeMap<String, Vec<Entity>>,
}

impl Entity {
    pub fn get(&self, attr: &str) -> Option<&Value> {
        self.attributes.get(attr)
    }

    /// Related entities loaded under `alias`; empty when none were loaded.
    pub fn related(&self, alias: &str) -> &[Entity] {
        self.related.get(alias).map(Vec::as_slice).unwrap_or_default()
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let len = self.attributes.len() + usize::from(!self.related.is_empty());
        let mut map = serializer.serialize_map(Some(len))?;
        for (attr, value) in &self.attributes {
            map.serialize_entry(attr, value)?;
        }
        if !self.related.is_empty() {
            map.serialize_entry("related", &self.related)?;
        }
        map.end()
    }
}

/// One page of entities with its pagination metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub collection: Vec<Entity>,
    pub offset: u64,
    pub limit: u64,
    pub page: u64,
    pub pages: u64,
    pub page_size: u64,
    pub total: u64,
}

impl Collection {
    pub fn new(collection: Vec<Entity>, page: Page, total: u64) -> Self {
        Self {
            collection,
            offset: page.offset,
            limit: page.limit,
            page: page.number(),
            pages: page.pages(total),
            page_size: page.limit,
            total,
        }
    }
}

/// Decodes the columns of `schema`'s table from a row.
///
/// A column named `<table>_<rest>` belongs to the table only when `rest` is
/// one of its physical columns; its value is mapped to the attribute and
/// coerced inbound.
pub fn decode(schema: &Schema, row: &Row) -> Result<Entity> {
    let prefix = format!("{}_", schema.table());
    let mut entity = Entity::default();
    for (name, value) in row.iter() {
        let Some(column) = name.strip_prefix(prefix.as_str()) else {
            continue;
        };
        let Some(attr) = schema.attribute_for_column(column) else {
            continue;
        };
        if attr.column_name() != column {
            continue;
        }
        entity
            .attributes
            .insert(attr.name.clone(), inbound(attr, value.clone())?);
    }
    Ok(entity)
}

/// Folds joined rows into distinct entities in first-seen order.
///
/// Rows repeating a primary key collapse into one entity; each row's related
/// columns are decoded through the related schema and appended under the
/// include alias of the owner whose key matches the row's
/// `<table>_foreign_key` column, once per related primary key.
pub fn assemble(plan: &Plan<'_>, rows: &[Row]) -> Result<Vec<Entity>> {
    let schema = plan.schema;
    let primary_key = schema.primary_key();
    let key_aliases: Vec<String> = plan.includes.iter().map(|i| i.key_alias()).collect();

    let mut entities: Vec<Entity> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut loaded: HashSet<(usize, usize, String)> = HashSet::new();

    for row in rows {
        let entity = decode(schema, row)?;
        let key = match entity.get(primary_key) {
            Some(value) if !value.is_null() => value.key(),
            _ => {
                return Err(QuarryError::Mapping(format!(
                    "row without a `{}` value for {}",
                    primary_key,
                    schema.model()
                )));
            }
        };
        if !by_key.contains_key(&key) {
            let mut entity = entity;
            for include in &plan.includes {
                entity.related.insert(include.alias.clone(), Vec::new());
            }
            by_key.insert(key, entities.len());
            entities.push(entity);
        }

        for (i, include) in plan.includes.iter().enumerate() {
            let owner_key = match row.get(&key_aliases[i]) {
                Some(value) if !value.is_null() => value.key(),
                _ => continue,
            };
            let Some(&owner) = by_key.get(&owner_key) else {
                continue;
            };

            let related = decode(include.target, row)?;
            let related_key = match related.get(include.target.primary_key()) {
                Some(value) if !value.is_null() => value.key(),
                _ => continue,
            };
            if loaded.insert((owner, i, related_key)) {
                entities[owner]
                    .related
                    .entry(include.alias.clone())
                    .or_default()
                    .push(related);
            }
        }
    }

    Ok(entities)
}

/// Reads the `_count` column of a count statement's single row.
pub fn count(rows: &[Row]) -> Result<u64> {
    rows.first()
        .and_then(|row| row.get(COUNT_ALIAS))
        .and_then(Value::as_i64)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| QuarryError::Mapping(format!("count result has no `{}` column", COUNT_ALIAS)))
}

/// Distinct primary keys from an id pre-pass, in row order.
pub fn primary_keys(schema: &Schema, rows: &[Row]) -> Vec<Value> {
    let alias = crate::builder::column_alias(schema.table(), schema.primary_column());
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|row| row.get(&alias))
        .filter(|value| !value.is_null() && seen.insert(value.key()))
        .cloned()
        .collect()
}
