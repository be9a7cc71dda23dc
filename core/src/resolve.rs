//! Relation resolution: turns foreign-key filters and include aliases into
//! join descriptors.

use crate::error::{QuarryError, Result};
use crate::query::{Filter, OrderTerm, Query};
use crate::relation::{Registry, Relation};
use crate::schema::Schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
}

/// `"table"."column"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    fn new(table: &str, column: &str) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

/// `<kind> join "table" on <left> = <right>`; `left` is a column of the
/// joined table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub left: ColumnRef,
    pub right: ColumnRef,
}

/// An eager-loaded relation.
#[derive(Debug, Clone)]
pub struct Include<'r> {
    pub alias: String,
    /// Schema of the related rows
    pub target: &'r Schema,
    /// Joins bringing the target in, in order
    pub joins: Vec<Join>,
    /// Column pairing each related row with its owner, selected as
    /// `<table>_foreign_key`
    pub key: ColumnRef,
}

impl Include<'_> {
    /// Result column holding the owner's key.
    pub fn key_alias(&self) -> String {
        format!("{}_foreign_key", self.key.table)
    }
}

/// Knobs that change how a query resolves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Fail on include aliases that name no relation instead of ignoring them.
    pub strict_includes: bool,
}

/// A query with its relations resolved against one model.
#[derive(Debug, Clone)]
pub struct Plan<'r> {
    pub registry: &'r Registry,
    pub schema: &'r Schema,
    pub filters: Vec<Filter>,
    pub order: Vec<OrderTerm>,
    /// Inner joins required by filters
    pub joins: Vec<Join>,
    pub includes: Vec<Include<'r>>,
}

impl<'r> Plan<'r> {
    /// Resolves `query` against `model`.
    ///
    /// A filter on a foreign key of a relation targeting `model` through an
    /// intermediary moves onto the intermediary's table, which is inner
    /// joined. Direct relations need no join since `model`'s table already
    /// holds the key.
    pub fn resolve(
        registry: &'r Registry,
        model: &str,
        query: &Query,
        options: ResolveOptions,
    ) -> Result<Plan<'r>> {
        let schema = registry.schema(model)?;
        let mut plan = Plan {
            registry,
            schema,
            filters: Vec::with_capacity(query.filters.len()),
            order: query.order.clone(),
            joins: Vec::new(),
            includes: Vec::new(),
        };

        for filter in &query.filters {
            let filter = plan.resolve_filter(filter.clone())?;
            plan.filters.push(filter);
        }

        let mut seen: Vec<&str> = Vec::with_capacity(query.include.len());
        for alias in &query.include {
            if seen.contains(&alias.as_str()) {
                continue;
            }
            seen.push(alias);

            match registry.relation_by_alias(model, alias) {
                Some(relation) => {
                    let include = plan.resolve_include(relation)?;
                    plan.includes.push(include);
                }
                None if options.strict_includes => {
                    return Err(QuarryError::UnknownRelation {
                        model: model.to_string(),
                        alias: alias.clone(),
                    });
                }
                None => {}
            }
        }

        Ok(plan)
    }

    /// Filter joins followed by every include's joins.
    pub fn all_joins(&self) -> impl Iterator<Item = &Join> {
        self.joins
            .iter()
            .chain(self.includes.iter().flat_map(|i| i.joins.iter()))
    }

    fn resolve_filter(&mut self, filter: Filter) -> Result<Filter> {
        match filter {
            Filter::And(filters) => Ok(Filter::And(
                filters
                    .into_iter()
                    .map(|f| self.resolve_filter(f))
                    .collect::<Result<_>>()?,
            )),
            Filter::Or(filters) => Ok(Filter::Or(
                filters
                    .into_iter()
                    .map(|f| self.resolve_filter(f))
                    .collect::<Result<_>>()?,
            )),
            Filter::Field {
                table: None,
                attr,
                condition,
            } => {
                let relation = self
                    .registry
                    .relation_by_foreign_key(self.schema.model(), &attr);
                let Some(Relation {
                    through: Some(through),
                    through_key: Some(through_key),
                    ..
                }) = relation
                else {
                    return Ok(Filter::Field {
                        table: None,
                        attr,
                        condition,
                    });
                };

                let through = self.registry.schema(through)?;
                let join = Join {
                    kind: JoinKind::Inner,
                    table: through.table().to_string(),
                    left: ColumnRef::new(through.table(), through.columns().to_column(through_key)),
                    right: ColumnRef::new(self.schema.table(), self.schema.primary_column()),
                };
                if !self.joins.contains(&join) {
                    self.claim_table(&join.table)?;
                    self.joins.push(join);
                }

                Ok(Filter::Field {
                    table: Some(through.table().to_string()),
                    attr,
                    condition,
                })
            }
            qualified => Ok(qualified),
        }
    }

    fn resolve_include(&self, relation: &Relation) -> Result<Include<'r>> {
        let target = self.registry.schema(&relation.target)?;
        let owner_key = ColumnRef::new(self.schema.table(), self.schema.primary_column());

        let (joins, key) = match (&relation.through, &relation.through_key) {
            (Some(through), Some(through_key)) => {
                let through = self.registry.schema(through)?;
                let key = ColumnRef::new(
                    through.table(),
                    through.columns().to_column(&relation.foreign_key),
                );
                let joins = vec![
                    Join {
                        kind: JoinKind::LeftOuter,
                        table: through.table().to_string(),
                        left: key.clone(),
                        right: owner_key,
                    },
                    Join {
                        kind: JoinKind::LeftOuter,
                        table: target.table().to_string(),
                        left: ColumnRef::new(target.table(), target.primary_column()),
                        right: ColumnRef::new(through.table(), through.columns().to_column(through_key)),
                    },
                ];
                (joins, key)
            }
            _ => {
                let key = ColumnRef::new(
                    target.table(),
                    target.columns().to_column(&relation.foreign_key),
                );
                let joins = vec![Join {
                    kind: JoinKind::LeftOuter,
                    table: target.table().to_string(),
                    left: key.clone(),
                    right: owner_key,
                }];
                (joins, key)
            }
        };

        for join in &joins {
            self.claim_table(&join.table)?;
        }
        // Both joins of one include must not collide with each other either.
        if joins.len() == 2 && joins[0].table == joins[1].table {
            return Err(joined_twice(&joins[0].table));
        }

        Ok(Include {
            alias: relation.alias.clone(),
            target,
            joins,
            key,
        })
    }

    /// Rejects a join against a table that is already part of the statement.
    fn claim_table(&self, table: &str) -> Result<()> {
        if table == self.schema.table() || self.all_joins().any(|j| j.table == table) {
            return Err(joined_twice(table));
        }
        Ok(())
    }
}

fn joined_twice(table: &str) -> QuarryError {
    QuarryError::InvalidQuery(format!("table `{}` would be joined twice", table))
}
