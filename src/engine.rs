//! The CRUD surface over registered models.

use crate::config::EngineConfig;
use crate::executor::Executor;
use futures_util::future::try_join;
use quarry_core::assemble::{self, Collection, Entity};
use quarry_core::coerce::{coerce_filters, coerce_values};
use quarry_core::{
    Connection, Plan, QuarryError, Query, Registry, Response, Result, Schema, Statement,
    StatementBuilder, Value, Values,
};
use std::sync::Arc;

/// Owns a connection handle, the model registry and the configuration.
///
/// The engine holds no locks; concurrent operations are independent and
/// rely on the connection for isolation.
#[derive(Debug, Clone)]
pub struct Engine<C> {
    executor: Executor<C>,
    registry: Arc<Registry>,
    config: EngineConfig,
}

impl<C: Connection> Engine<C> {
    pub fn new(conn: C, registry: impl Into<Arc<Registry>>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            executor: Executor::new(conn, config.retry.clone()),
            registry: registry.into(),
            config,
        })
    }

    #[inline]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn connection(&self) -> &C {
        self.executor.connection()
    }

    /// Operations on one registered model.
    pub fn model(&self, name: &str) -> Result<Model<'_, C>> {
        Ok(Model {
            engine: self,
            schema: self.registry.schema(name)?,
        })
    }

    async fn run(&self, statement: Statement) -> Result<Response> {
        self.executor.run(&statement).await
    }
}

/// CRUD operations bound to one model's schema.
#[derive(Debug)]
pub struct Model<'e, C> {
    engine: &'e Engine<C>,
    schema: &'e Schema,
}

impl<'e, C: Connection> Model<'e, C> {
    #[inline]
    pub fn schema(&self) -> &'e Schema {
        self.schema
    }

    /// First entity matching `query`, with its included relations.
    /// `Ok(None)` when nothing matches.
    pub async fn find(&self, query: Query) -> Result<Option<Entity>> {
        let plan = self.plan(&query)?;
        let builder = StatementBuilder::new(&plan, self.engine.config.dialect);
        // Joined rows of one entity span several rows, so only plain
        // lookups can be limited.
        let page = plan
            .includes
            .is_empty()
            .then_some(quarry_core::Page { limit: 1, offset: 0 });

        let response = self.engine.run(builder.select(page)).await?;
        let mut entities = assemble::assemble(&plan, &response.rows)?;
        Ok((!entities.is_empty()).then(|| entities.swap_remove(0)))
    }

    /// Entity with the given primary key.
    pub async fn find_by_id(&self, id: impl Into<Value>) -> Result<Option<Entity>> {
        self.find(Query::by_primary(self.schema.primary_key(), id))
            .await
    }

    /// One page of matching entities with pagination metadata.
    ///
    /// The total is counted alongside the page. With includes, the page's
    /// primary keys are selected first and the joined select is restricted
    /// to them, so join fan-out never shifts `limit`/`offset`.
    pub async fn find_all(&self, query: Query) -> Result<Collection> {
        let config = &self.engine.config;
        let page = query.paginate(
            config.default_limit,
            self.schema.max_limit().unwrap_or(config.max_limit),
        );
        let plan = self.plan(&query)?;
        let builder = StatementBuilder::new(&plan, config.dialect);

        let entities = async {
            if plan.includes.is_empty() {
                let response = self.engine.run(builder.select(Some(page))).await?;
                return assemble::assemble(&plan, &response.rows);
            }

            let ids = self.engine.run(builder.select_ids(page)).await?;
            let ids = assemble::primary_keys(self.schema, &ids.rows);
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let response = self.engine.run(builder.select_in(ids)).await?;
            assemble::assemble(&plan, &response.rows)
        };

        let (counted, entities) = try_join(self.engine.run(builder.count()), entities).await?;
        let total = assemble::count(&counted.rows)?;
        Ok(Collection::new(entities, page, total))
    }

    pub async fn count(&self, query: Query) -> Result<u64> {
        let plan = self.plan(&query)?;
        let statement = StatementBuilder::new(&plan, self.engine.config.dialect).count();
        let response = self.engine.run(statement).await?;
        assemble::count(&response.rows)
    }

    /// Deletes every matching row; returns the number deleted.
    pub async fn remove_all(&self, query: Query) -> Result<u64> {
        let plan = self.plan(&query)?;
        let statement = StatementBuilder::new(&plan, self.engine.config.dialect).delete();
        Ok(self.engine.run(statement).await?.rows_affected)
    }

    /// Deletes the entity with the given primary key.
    pub async fn remove(&self, id: impl Into<Value>) -> Result<u64> {
        self.remove_all(Query::by_primary(self.schema.primary_key(), id))
            .await
    }

    /// Inserts one row and returns its primary key.
    ///
    /// The key comes from `returning` on PostgreSQL and from the driver's
    /// last-insert id elsewhere, falling back to a caller-supplied key.
    pub async fn insert(&self, values: Values) -> Result<Entity> {
        let config = &self.engine.config;
        let schema = self.schema;
        let values = coerce_values(values, schema, config.coercion())?;
        let supplied = values
            .iter()
            .find(|(attr, _)| attr == schema.primary_key())
            .map(|(_, value)| value.clone());

        let statement = StatementBuilder::insert(schema, values, config.dialect);
        let response = self.engine.run(statement).await?;

        let key = response
            .rows
            .first()
            .and_then(|row| row.get(schema.primary_column()))
            .cloned()
            .or(response.last_insert_id)
            .or(supplied)
            .ok_or_else(|| {
                QuarryError::Mapping(format!("no key reported for new {}", schema.model()))
            })?;
        self.key_entity(key)
    }

    /// Applies `query.values` to every matching row; returns the number
    /// updated. Without values nothing is sent.
    pub async fn update(&self, mut query: Query) -> Result<u64> {
        let config = &self.engine.config;
        let values = coerce_values(std::mem::take(&mut query.values), self.schema, config.coercion())?;
        if values.is_empty() {
            return Ok(0);
        }
        let plan = self.plan(&query)?;
        let statement = StatementBuilder::new(&plan, config.dialect).update(values);
        Ok(self.engine.run(statement).await?.rows_affected)
    }

    /// Updates the entity with primary key `id`, or inserts when no key is
    /// given. Returns the key.
    pub async fn save(&self, id: Option<Value>, values: Values) -> Result<Entity> {
        let Some(id) = id else {
            return self.insert(values).await;
        };
        let query = Query::by_primary(self.schema.primary_key(), id.clone()).values(values);
        self.update(query).await?;
        self.key_entity(id)
    }

    fn plan(&self, query: &Query) -> Result<Plan<'e>> {
        let engine = self.engine;
        let registry: &'e Registry = &engine.registry;
        let mut plan = Plan::resolve(registry, self.schema.model(), query, engine.config.resolve())?;
        plan.filters = coerce_filters(
            std::mem::take(&mut plan.filters),
            self.schema,
            registry,
            engine.config.coercion(),
        )?;
        Ok(plan)
    }

    fn key_entity(&self, key: Value) -> Result<Entity> {
        let mut entity = Entity::default();
        let key = match self.schema.attribute(self.schema.primary_key()) {
            Some(attr) => quarry_core::coerce::inbound(attr, key)?,
            None => key,
        };
        entity
            .attributes
            .insert(self.schema.primary_key().to_string(), key);
        Ok(entity)
    }
}
