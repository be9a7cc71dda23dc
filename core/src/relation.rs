//! Declared associations between models and the registry that owns them.
//!
//! A relation is declared once per model pair and found from either side:
//! by `(owning model, alias)` when eager-loading, and by
//! `(target model, foreign key)` when a filter names a foreign key.

use crate::error::{QuarryError, Result};
use crate::schema::Schema;
use hashbrown::HashMap;

/// A declared association from an owning model to a target model.
///
/// For a direct relation the foreign key lives on the target's table
/// (`post.user_id` for `User has many Post`). For a relation `through` an
/// intermediary model, the intermediary holds both the foreign key pointing
/// at the owner and the `through_key` pointing at the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Alias used in `include`
    pub alias: String,
    /// Owning model
    pub model: String,
    /// Target model
    pub target: String,
    pub foreign_key: String,
    pub through: Option<String>,
    pub through_key: Option<String>,
}

impl Relation {
    /// `model` has many `target`, joined on `target.foreign_key = model.pk`.
    pub fn has_many(
        model: impl Into<String>,
        alias: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            model: model.into(),
            target: target.into(),
            foreign_key: foreign_key.into(),
            through: None,
            through_key: None,
        }
    }

    /// `model` has many `target` through the intermediary `through`, joined on
    /// `through.foreign_key = model.pk` and `target.pk = through.through_key`.
    pub fn has_many_through(
        model: impl Into<String>,
        alias: impl Into<String>,
        target: impl Into<String>,
        through: impl Into<String>,
        foreign_key: impl Into<String>,
        through_key: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            model: model.into(),
            target: target.into(),
            foreign_key: foreign_key.into(),
            through: Some(through.into()),
            through_key: Some(through_key.into()),
        }
    }

    #[inline]
    pub fn is_through(&self) -> bool {
        self.through.is_some()
    }
}

/// Schemas and relations registered at definition time.
///
/// Immutable once handed to an engine.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    schemas: Vec<Schema>,
    by_model: HashMap<String, usize>,
    by_table: HashMap<String, usize>,
    relations: Vec<Relation>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema. Model and table names must be unique.
    pub fn register(&mut self, schema: Schema) -> Result<&mut Self> {
        if self.by_model.contains_key(schema.model()) {
            return Err(QuarryError::Schema(format!(
                "model {} registered twice",
                schema.model()
            )));
        }
        if self.by_table.contains_key(schema.table()) {
            return Err(QuarryError::Schema(format!(
                "table `{}` already belongs to another model",
                schema.table()
            )));
        }

        let idx = self.schemas.len();
        self.by_model.insert(schema.model().to_string(), idx);
        self.by_table.insert(schema.table().to_string(), idx);
        self.schemas.push(schema);
        Ok(self)
    }

    /// Declares a relation. Every model it names must already be registered.
    pub fn relate(&mut self, relation: Relation) -> Result<&mut Self> {
        self.schema(&relation.model)?;
        self.schema(&relation.target)?;
        if let Some(through) = &relation.through {
            self.schema(through)?;
            if relation.through_key.is_none() {
                return Err(QuarryError::Schema(format!(
                    "relation `{}` goes through {} without a through key",
                    relation.alias, through
                )));
            }
        }
        self.relations.push(relation);
        Ok(self)
    }

    pub fn schema(&self, model: &str) -> Result<&Schema> {
        self.by_model
            .get(model)
            .map(|&i| &self.schemas[i])
            .ok_or_else(|| QuarryError::UnknownModel(model.to_string()))
    }

    /// Looks up the schema stored in `table`.
    pub fn schema_for_table(&self, table: &str) -> Option<&Schema> {
        self.by_table.get(table).map(|&i| &self.schemas[i])
    }

    #[inline]
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Relation owned by `model` with the given include alias.
    ///
    /// The last declared match wins.
    pub fn relation_by_alias(&self, model: &str, alias: &str) -> Option<&Relation> {
        self.relations
            .iter()
            .rev()
            .find(|r| r.model == model && r.alias == alias)
    }

    /// Relation targeting `model` whose foreign key is `key`.
    ///
    /// The last declared match wins.
    pub fn relation_by_foreign_key(&self, model: &str, key: &str) -> Option<&Relation> {
        self.relations
            .iter()
            .rev()
            .find(|r| r.target == model && r.foreign_key == key)
    }
}
