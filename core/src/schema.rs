//! Model schemas: attribute definitions and the attribute↔column mapper.

use crate::error::{QuarryError, Result};
use crate::value::Value;
use hashbrown::HashMap;
use heck::ToSnakeCase;
use std::sync::Arc;

/// Semantic type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttrType {
    #[default]
    String,
    Number,
    Boolean,
    Date,
    Json,
    Array,
    Object,
}

impl AttrType {
    /// Attributes whose values are stored as serialized JSON text.
    #[inline]
    pub const fn is_structured(&self) -> bool {
        matches!(self, AttrType::Json | AttrType::Array | AttrType::Object)
    }
}

/// Physical storage type governing how dates are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// ISO-8601 string
    Datetime,
    /// `YYYY-MM-DD HH:MM:SS`
    Timestamp,
    /// Epoch seconds
    Integer,
    /// Epoch seconds
    Number,
}

/// Custom outbound value formatter; takes precedence over type coercion.
pub type Formatter = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// A logical, typed field of an entity.
#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub kind: AttrType,
    pub column_name: Option<String>,
    pub column_type: Option<ColumnType>,
    pub primary: bool,
    pub formatter: Option<Formatter>,
}

impl Attribute {
    /// Creates a string attribute stored under its own name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AttrType::String,
            column_name: None,
            column_type: None,
            primary: false,
            formatter: None,
        }
    }

    pub fn kind(mut self, kind: AttrType) -> Self {
        self.kind = kind;
        self
    }

    /// Stores this attribute under a different physical column.
    pub fn column(mut self, column_name: impl Into<String>) -> Self {
        self.column_name = Some(column_name.into());
        self
    }

    pub fn column_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = Some(column_type);
        self
    }

    /// Marks this attribute as the primary key.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn formatter(
        mut self,
        formatter: impl Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    /// The physical column holding this attribute.
    #[inline]
    pub fn column_name(&self) -> &str {
        self.column_name.as_deref().unwrap_or(&self.name)
    }
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("column_name", &self.column_name)
            .field("column_type", &self.column_type)
            .field("primary", &self.primary)
            .field("formatter", &self.formatter.is_some())
            .finish()
    }
}

/// Bidirectional attribute↔column lookup, built once per schema.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    to_column: HashMap<String, String>,
    to_attribute: HashMap<String, String>,
}

impl ColumnMap {
    fn build(attributes: &[Attribute]) -> Result<Self> {
        let mut map = ColumnMap::default();
        let mut seen: HashMap<&str, &str> = HashMap::with_capacity(attributes.len());

        for attr in attributes {
            let column = attr.column_name();
            if let Some(other) = seen.insert(column, attr.name.as_str()) {
                return Err(QuarryError::Schema(format!(
                    "attributes `{}` and `{}` both map to column `{}`",
                    other, attr.name, column
                )));
            }
            if let Some(column_name) = &attr.column_name {
                map.to_column.insert(attr.name.clone(), column_name.clone());
                map.to_attribute.insert(column_name.clone(), attr.name.clone());
            }
        }

        Ok(map)
    }

    /// Physical column for an attribute, or the attribute name itself.
    #[inline]
    pub fn to_column<'s>(&'s self, attr: &'s str) -> &'s str {
        self.to_column.get(attr).map(String::as_str).unwrap_or(attr)
    }

    /// Attribute for a physical column, or the column name itself.
    #[inline]
    pub fn to_attribute<'s>(&'s self, column: &'s str) -> &'s str {
        self.to_attribute.get(column).map(String::as_str).unwrap_or(column)
    }
}

/// Ordered attribute definitions for one model, plus its table.
#[derive(Debug, Clone)]
pub struct Schema {
    model: String,
    table: String,
    primary_key: String,
    attributes: Vec<Attribute>,
    index: HashMap<String, usize>,
    columns: ColumnMap,
    max_limit: Option<u64>,
}

impl Schema {
    /// Starts a schema for the named model.
    pub fn builder(model: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            model: model.into(),
            table: None,
            attributes: Vec::new(),
            max_limit: None,
        }
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Name of the primary-key attribute.
    #[inline]
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Physical column of the primary key.
    #[inline]
    pub fn primary_column(&self) -> &str {
        self.columns.to_column(&self.primary_key)
    }

    #[inline]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.index.get(name).map(|&i| &self.attributes[i])
    }

    /// Attribute stored in the given physical column.
    pub fn attribute_for_column(&self, column: &str) -> Option<&Attribute> {
        self.attribute(self.columns.to_attribute(column))
    }

    #[inline]
    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    /// Per-model override of the engine's maximum page size.
    #[inline]
    pub fn max_limit(&self) -> Option<u64> {
        self.max_limit
    }
}

/// Builder for [`Schema`]; validation happens in [`SchemaBuilder::build`].
#[derive(Debug)]
pub struct SchemaBuilder {
    model: String,
    table: Option<String>,
    attributes: Vec<Attribute>,
    max_limit: Option<u64>,
}

impl SchemaBuilder {
    /// Overrides the table name derived from the model name.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn attr(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn max_limit(mut self, max_limit: u64) -> Self {
        self.max_limit = Some(max_limit);
        self
    }

    pub fn build(self) -> Result<Schema> {
        if self.model.is_empty() {
            return Err(QuarryError::Schema("model name must not be empty".into()));
        }

        let mut index = HashMap::with_capacity(self.attributes.len());
        for (i, attr) in self.attributes.iter().enumerate() {
            if index.insert(attr.name.clone(), i).is_some() {
                return Err(QuarryError::Schema(format!(
                    "attribute `{}` declared twice on {}",
                    attr.name, self.model
                )));
            }
        }

        let mut primaries = self.attributes.iter().filter(|a| a.primary);
        let primary_key = match (primaries.next(), primaries.next()) {
            (Some(attr), None) => attr.name.clone(),
            (None, _) if index.contains_key("id") => "id".to_string(),
            (None, _) => {
                return Err(QuarryError::Schema(format!(
                    "{} declares no primary attribute",
                    self.model
                )));
            }
            (Some(_), Some(_)) => {
                return Err(QuarryError::Schema(format!(
                    "{} declares more than one primary attribute",
                    self.model
                )));
            }
        };

        let columns = ColumnMap::build(&self.attributes)?;
        let table = self.table.unwrap_or_else(|| default_table_name(&self.model));

        Ok(Schema {
            model: self.model,
            table,
            primary_key,
            attributes: self.attributes,
            index,
            columns,
            max_limit: self.max_limit,
        })
    }
}

/// Derives a table name from a model name: snake_case, then singular.
pub fn default_table_name(model: &str) -> String {
    pluralizer::pluralize(&model.to_snake_case(), 1, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> Schema {
        Schema::builder("User")
            .attr(Attribute::new("id").kind(AttrType::Number).primary())
            .attr(Attribute::new("fullname").column("name"))
            .build()
            .unwrap()
    }

    #[test]
    fn mapper_is_bidirectional() {
        let schema = user();
        assert_eq!(schema.columns().to_column("fullname"), "name");
        assert_eq!(schema.columns().to_attribute("name"), "fullname");
        assert_eq!(schema.columns().to_column("id"), "id");
        assert_eq!(schema.columns().to_attribute("unknown"), "unknown");
        assert_eq!(schema.attribute_for_column("name").unwrap().name, "fullname");
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let err = Schema::builder("User")
            .attr(Attribute::new("id").primary())
            .attr(Attribute::new("name"))
            .attr(Attribute::new("fullname").column("name"))
            .build()
            .unwrap_err();
        assert!(matches!(err, QuarryError::Schema(_)));
    }

    #[test]
    fn primary_key_defaults_to_id() {
        let schema = Schema::builder("Tag")
            .attr(Attribute::new("id"))
            .attr(Attribute::new("label"))
            .build()
            .unwrap();
        assert_eq!(schema.primary_key(), "id");
    }

    #[test]
    fn table_names_are_singular_snake_case() {
        assert_eq!(user().table(), "user");
        assert_eq!(default_table_name("Users"), "user");
        assert_eq!(default_table_name("BlogPosts"), "blog_post");
        assert_eq!(default_table_name("Categories"), "category");
        assert_eq!(default_table_name("Boxes"), "box");
        assert_eq!(default_table_name("Status"), "status");
        assert_eq!(default_table_name("Address"), "address");
        assert_eq!(default_table_name("Movies"), "movie");
        assert_eq!(default_table_name("Statuses"), "status");
        assert_eq!(default_table_name("Buses"), "bus");
        assert_eq!(default_table_name("Series"), "series");
    }
}
