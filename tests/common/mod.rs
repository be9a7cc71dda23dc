//! Shared fixtures: a recording, scriptable connection and a small
//! User/Post/Tag registry.
#![allow(dead_code)]

use quarry::prelude::*;
use quarry::{Response, Row, Statement};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

type Responder = Box<dyn Fn(&Statement) -> quarry::Result<Response> + Send + Sync>;

/// Records every statement it is asked to run and answers from a script.
///
/// Queued responses are consumed in order; once the queue is empty the
/// fallback responder answers.
pub struct MockConnection {
    statements: Mutex<Vec<Statement>>,
    queue: Mutex<VecDeque<quarry::Result<Response>>>,
    fallback: Responder,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Self::with_fallback(|_| Ok(Response::default()))
    }

    pub fn with_fallback(
        fallback: impl Fn(&Statement) -> quarry::Result<Response> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            statements: Mutex::new(Vec::new()),
            queue: Mutex::new(VecDeque::new()),
            fallback: Box::new(fallback),
        })
    }

    pub fn push(&self, response: quarry::Result<Response>) -> &Self {
        self.queue.lock().unwrap().push_back(response);
        self
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.statements().into_iter().map(|s| s.sql).collect()
    }
}

impl Connection for MockConnection {
    fn execute(
        &self,
        statement: &Statement,
    ) -> impl Future<Output = quarry::Result<Response>> + Send {
        self.statements.lock().unwrap().push(statement.clone());
        let scripted = self.queue.lock().unwrap().pop_front();
        let response = scripted.unwrap_or_else(|| (self.fallback)(statement));
        std::future::ready(response)
    }
}

/// Answers count statements with `total` and everything else with `rows`.
pub fn listing(total: i64, rows: Vec<Row>) -> Arc<MockConnection> {
    MockConnection::with_fallback(move |statement| {
        if statement.sql.contains("COUNT(*)") {
            Ok(Response::rows(vec![Row::new().with("_count", total)]))
        } else {
            Ok(Response::rows(rows.clone()))
        }
    })
}

pub fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register(
            Schema::builder("User")
                .attr(Attribute::new("id").kind(AttrType::Number).primary())
                .attr(Attribute::new("name"))
                .attr(Attribute::new("active").kind(AttrType::Boolean))
                .attr(
                    Attribute::new("created")
                        .kind(AttrType::Date)
                        .column("created_at")
                        .column_type(ColumnType::Timestamp),
                )
                .build()
                .unwrap(),
        )
        .unwrap()
        .register(
            Schema::builder("Post")
                .attr(Attribute::new("id").kind(AttrType::Number).primary())
                .attr(Attribute::new("title").column("headline"))
                .attr(Attribute::new("user_id").kind(AttrType::Number))
                .build()
                .unwrap(),
        )
        .unwrap()
        .register(
            Schema::builder("Tag")
                .attr(Attribute::new("id").kind(AttrType::Number).primary())
                .attr(Attribute::new("label"))
                .build()
                .unwrap(),
        )
        .unwrap()
        .register(
            Schema::builder("PostTag")
                .table("post_tag")
                .attr(Attribute::new("id").kind(AttrType::Number).primary())
                .attr(Attribute::new("post_id").kind(AttrType::Number))
                .attr(Attribute::new("tag_id").kind(AttrType::Number))
                .build()
                .unwrap(),
        )
        .unwrap()
        .relate(Relation::has_many("User", "posts", "Post", "user_id"))
        .unwrap()
        .relate(Relation::has_many_through(
            "Post", "tags", "Tag", "PostTag", "post_id", "tag_id",
        ))
        .unwrap();
    registry
}

pub fn engine(conn: Arc<MockConnection>) -> Engine<Arc<MockConnection>> {
    engine_with(conn, EngineConfig::default())
}

pub fn engine_with(conn: Arc<MockConnection>, config: EngineConfig) -> Engine<Arc<MockConnection>> {
    Engine::new(conn, registry(), config).unwrap()
}

/// A joined user/post row as the database returns it.
pub fn user_post_row(user_id: i64, name: &str, post: Option<(i64, &str)>) -> Row {
    let row = Row::new()
        .with("user_id", user_id)
        .with("user_name", name)
        .with("user_active", 1)
        .with("user_created_at", "2014-02-03 04:05:06");
    match post {
        Some((post_id, title)) => row
            .with("post_id", post_id)
            .with("post_headline", title)
            .with("post_user_id", user_id)
            .with("post_foreign_key", user_id),
        None => row
            .with("post_id", Value::Null)
            .with("post_headline", Value::Null)
            .with("post_user_id", Value::Null)
            .with("post_foreign_key", Value::Null),
    }
}
