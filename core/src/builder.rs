//! Statement builders for the four statement kinds.
//!
//! Attribute names are mapped to physical columns per table while the
//! statement is assembled; values only ever become parameters.

use crate::dialect::Dialect;
use crate::query::{Condition, Direction, Filter, Page};
use crate::resolve::{Join, JoinKind, Plan};
use crate::schema::Schema;
use crate::sql::{SQL, SQLChunk, Statement, Token};
use crate::value::Value;
use std::borrow::Cow;

/// Alias of the count column.
pub const COUNT_ALIAS: &str = "_count";

/// Result column name for `column` of `table`.
#[inline]
pub fn column_alias(table: &str, column: &str) -> String {
    format!("{}_{}", table, column)
}

/// Builds statements for a resolved [`Plan`].
#[derive(Debug, Clone, Copy)]
pub struct StatementBuilder<'p, 'r> {
    plan: &'p Plan<'r>,
    dialect: Dialect,
}

impl<'p, 'r> StatementBuilder<'p, 'r> {
    pub fn new(plan: &'p Plan<'r>, dialect: Dialect) -> Self {
        Self { plan, dialect }
    }

    /// `select <columns> from ... [where] [order by] [limit offset]`,
    /// including every eager-loaded relation.
    pub fn select(&self, page: Option<Page>) -> Statement {
        let mut sql = self.select_list().append(self.from(true));
        sql.append_mut(self.where_clause(None));
        sql.append_mut(self.order_by());
        if let Some(page) = page {
            sql.append_mut(limit_offset(page));
        }
        sql.build(self.dialect)
    }

    /// Primary keys of one page, without eager-loaded joins so fan-out
    /// cannot distort `limit`/`offset`.
    pub fn select_ids(&self, page: Page) -> Statement {
        let schema = self.plan.schema;
        let pk = schema.primary_column();
        let sql = SQL::token(Token::SELECT)
            .append(SQL::column(schema.table(), pk).alias(column_alias(schema.table(), pk)))
            .append(self.from(false))
            .append(self.where_clause(None))
            .append(self.order_by())
            .append(limit_offset(page));
        sql.build(self.dialect)
    }

    /// Full select restricted to the given primary keys, unpaginated.
    pub fn select_in(&self, ids: Vec<Value>) -> Statement {
        let schema = self.plan.schema;
        let restriction = SQL::column(schema.table(), schema.primary_column())
            .append(in_list(Token::IN, ids));
        let sql = self
            .select_list()
            .append(self.from(true))
            .append(self.where_clause(Some(restriction)))
            .append(self.order_by());
        sql.build(self.dialect)
    }

    /// `select COUNT(*) as _count from ... [where]`
    pub fn count(&self) -> Statement {
        SQL::token(Token::SELECT)
            .push(SQLChunk::raw("COUNT(*)"))
            .push(Token::AS)
            .push(SQLChunk::raw(COUNT_ALIAS))
            .append(self.from(false))
            .append(self.where_clause(None))
            .build(self.dialect)
    }

    /// `update "t" set ... [where]`. Filters that need joins restrict by
    /// primary key through a subselect.
    pub fn update(&self, values: Vec<(String, Value)>) -> Statement {
        let schema = self.plan.schema;
        let assignments = values
            .into_iter()
            .map(|(attr, value)| (Cow::Owned(schema.columns().to_column(&attr).to_string()), value));
        SQL::token(Token::UPDATE)
            .append(SQL::ident(schema.table()))
            .push(Token::SET)
            .append(SQL::assignments(assignments))
            .append(self.mutation_filter())
            .build(self.dialect)
    }

    /// `delete from "t" [where]`
    pub fn delete(&self) -> Statement {
        SQL::token(Token::DELETE)
            .push(Token::FROM)
            .append(SQL::ident(self.plan.schema.table()))
            .append(self.mutation_filter())
            .build(self.dialect)
    }

    /// `insert into "t" (...) values (...)`, reporting the new key through
    /// `returning` where the dialect supports it.
    pub fn insert(schema: &Schema, values: Vec<(String, Value)>, dialect: Dialect) -> Statement {
        let mut sql = SQL::token(Token::INSERT)
            .push(Token::INTO)
            .append(SQL::ident(schema.table()));

        if values.is_empty() && dialect == Dialect::MySQL {
            sql.append_mut(SQL::empty().parens());
            sql.push_mut(Token::VALUES);
            sql.append_mut(SQL::empty().parens());
        } else if values.is_empty() {
            sql.push_mut(Token::DEFAULT);
            sql.push_mut(Token::VALUES);
        } else {
            let (columns, params): (Vec<_>, Vec<_>) = values
                .into_iter()
                .map(|(attr, value)| (SQL::ident(schema.columns().to_column(&attr).to_string()), value))
                .unzip();
            sql.append_mut(SQL::join(columns, Token::COMMA).parens());
            sql.push_mut(Token::VALUES);
            sql.append_mut(SQL::param_list(params).parens());
        }

        if dialect.supports_returning() {
            sql.push_mut(Token::RETURNING);
            sql.append_mut(SQL::ident(schema.primary_column()));
        }
        sql.build(dialect)
    }

    // ==================== clauses ====================

    fn select_list(&self) -> SQL<'p> {
        let mut columns = aliased_columns(self.plan.schema);
        for include in &self.plan.includes {
            columns.extend(aliased_columns(include.target));
            columns.push(
                SQL::column(include.key.table.as_str(), include.key.column.as_str())
                    .alias(include.key_alias()),
            );
        }
        SQL::token(Token::SELECT).append(SQL::join(columns, Token::COMMA))
    }

    fn from(&self, with_includes: bool) -> SQL<'p> {
        let mut sql = SQL::token(Token::FROM).append(SQL::ident(self.plan.schema.table()));
        for join in &self.plan.joins {
            sql.append_mut(render_join(join));
        }
        if with_includes {
            for join in self.plan.includes.iter().flat_map(|i| i.joins.iter()) {
                sql.append_mut(render_join(join));
            }
        }
        sql
    }

    fn where_clause(&self, extra: Option<SQL<'p>>) -> SQL<'p> {
        let mut predicates: Vec<SQL<'p>> = self
            .plan
            .filters
            .iter()
            .map(|filter| self.filter(filter))
            .collect();
        predicates.extend(extra);
        if predicates.is_empty() {
            return SQL::empty();
        }
        SQL::token(Token::WHERE).append(SQL::join(predicates, Token::AND))
    }

    /// `where` for update/delete: plain filters, or a primary-key subselect
    /// when filters reach into joined tables.
    fn mutation_filter(&self) -> SQL<'p> {
        if self.plan.joins.is_empty() {
            return self.where_clause(None);
        }
        let schema = self.plan.schema;
        let pk = SQL::column(schema.table(), schema.primary_column());
        let subselect = SQL::token(Token::SELECT)
            .append(pk.clone())
            .append(self.from(false))
            .append(self.where_clause(None));
        SQL::token(Token::WHERE)
            .append(pk)
            .push(Token::IN)
            .append(subselect.parens())
    }

    fn order_by(&self) -> SQL<'p> {
        if self.plan.order.is_empty() {
            return SQL::empty();
        }
        let terms = self.plan.order.iter().map(|term| {
            let direction = match term.direction {
                Direction::Asc => Token::ASC,
                Direction::Desc => Token::DESC,
            };
            self.column(term.table.as_deref(), &term.attr).push(direction)
        });
        SQL::token(Token::ORDER)
            .push(Token::BY)
            .append(SQL::join(terms, Token::COMMA))
    }

    fn filter(&self, filter: &Filter) -> SQL<'p> {
        match filter {
            Filter::And(filters) => self.group(filters, Token::AND, Token::TRUE),
            Filter::Or(filters) => self.group(filters, Token::OR, Token::FALSE),
            Filter::Field {
                table,
                attr,
                condition,
            } => self.condition(self.column(table.as_deref(), attr), condition),
        }
    }

    fn group(&self, filters: &[Filter], separator: Token, identity: Token) -> SQL<'p> {
        match filters {
            [] => SQL::token(identity),
            [single] => self.filter(single),
            many => SQL::join(many.iter().map(|f| self.filter(f)), separator).parens(),
        }
    }

    fn condition(&self, column: SQL<'p>, condition: &Condition) -> SQL<'p> {
        let (op, value) = match condition {
            Condition::Eq(Value::Null) => return column.push(Token::IS).push(Token::NULL),
            Condition::Ne(Value::Null) => {
                return column.push(Token::IS).push(Token::NOT).push(Token::NULL);
            }
            Condition::Eq(Value::Array(values)) | Condition::In(values) => {
                return match values.is_empty() {
                    true => SQL::token(Token::FALSE),
                    false => column.append(in_list(Token::IN, values.clone())),
                };
            }
            Condition::NotIn(values) => {
                return match values.is_empty() {
                    true => SQL::token(Token::TRUE),
                    false => column
                        .push(Token::NOT)
                        .append(in_list(Token::IN, values.clone())),
                };
            }
            Condition::Eq(value) => (Token::EQ, value),
            Condition::Ne(value) => (Token::NE, value),
            Condition::Gt(value) => (Token::GT, value),
            Condition::Gte(value) => (Token::GE, value),
            Condition::Lt(value) => (Token::LT, value),
            Condition::Lte(value) => (Token::LE, value),
            Condition::Like(value) => (Token::LIKE, value),
        };
        column.push(op).push(value.clone())
    }

    /// `"table"."column"` for an attribute, mapped through the owning
    /// table's schema. Unknown tables and attributes pass through unmapped.
    fn column(&self, table: Option<&str>, attr: &str) -> SQL<'p> {
        let table = table.unwrap_or(self.plan.schema.table());
        let column = self
            .plan
            .registry
            .schema_for_table(table)
            .or_else(|| (table == self.plan.schema.table()).then_some(self.plan.schema))
            .map(|schema| schema.columns().to_column(attr))
            .unwrap_or(attr);
        SQL::column(table.to_string(), column.to_string())
    }
}

fn aliased_columns<'a>(schema: &'a Schema) -> Vec<SQL<'a>> {
    schema
        .attributes()
        .iter()
        .map(|attr| {
            let column = attr.column_name();
            SQL::column(schema.table(), column).alias(column_alias(schema.table(), column))
        })
        .collect()
}

fn render_join(join: &Join) -> SQL<'_> {
    let kind = match join.kind {
        JoinKind::Inner => SQL::token(Token::INNER),
        JoinKind::LeftOuter => SQL::token(Token::LEFT).push(Token::OUTER),
    };
    kind.push(Token::JOIN)
        .append(SQL::ident(join.table.as_str()))
        .push(Token::ON)
        .append(SQL::column(join.left.table.as_str(), join.left.column.as_str()))
        .push(Token::EQ)
        .append(SQL::column(join.right.table.as_str(), join.right.column.as_str()))
}

fn in_list<'a>(keyword: Token, values: Vec<Value>) -> SQL<'a> {
    SQL::token(keyword).append(SQL::param_list(values).parens())
}

fn limit_offset<'a>(page: Page) -> SQL<'a> {
    SQL::token(Token::LIMIT)
        .push(bigint(page.limit))
        .push(Token::OFFSET)
        .push(bigint(page.offset))
}

/// Pages are capped at `MAX_COUNT` when resolved; hand-built ones saturate.
fn bigint(count: u64) -> Value {
    Value::Integer(i64::try_from(count).unwrap_or(i64::MAX))
}
