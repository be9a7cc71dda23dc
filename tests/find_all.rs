use common::{engine, engine_with, listing, user_post_row};
use quarry::prelude::*;
use quarry::Row;
use serde_json::json;

mod common;

#[tokio::test]
async fn or_filter_renders_grouped_and_parameterized() {
    let conn = listing(1, vec![user_post_row(1, "jeff", None)]);
    let engine = engine(conn.clone());

    let query = Query::from_json(&json!({ "where": { "$or": { "id": 1, "name": "jeff" } } })).unwrap();
    let users = engine.model("User").unwrap().find_all(query).await.unwrap();
    assert_eq!(users.total, 1);

    let statements = conn.statements();
    assert_eq!(statements.len(), 2);
    for statement in &statements {
        assert!(
            statement
                .sql
                .contains(r#"where ("user"."id" = $1 or "user"."name" = $2)"#),
            "{}",
            statement.sql
        );
        assert_eq!(&statement.params[..2], &[Value::Integer(1), Value::from("jeff")]);
    }
    assert_eq!(
        statements[0].sql,
        r#"select COUNT(*) as _count from "user" where ("user"."id" = $1 or "user"."name" = $2)"#
    );
    assert!(statements[1].sql.ends_with("limit $3 offset $4"));
    assert_eq!(
        &statements[1].params[2..],
        &[Value::Integer(50), Value::Integer(0)]
    );
}

#[tokio::test]
async fn includes_group_related_rows_without_duplicates() {
    let conn = listing(
        2,
        vec![
            user_post_row(1, "alex", Some((10, "first"))),
            user_post_row(1, "alex", Some((11, "second"))),
            user_post_row(1, "alex", Some((11, "second"))),
            user_post_row(2, "sam", None),
        ],
    );
    let engine = engine(conn.clone());

    let users = engine
        .model("User")
        .unwrap()
        .find_all(Query::new().include("posts"))
        .await
        .unwrap();

    assert_eq!(users.collection.len(), 2);
    let alex = &users.collection[0];
    assert_eq!(alex.get("name"), Some(&Value::from("alex")));
    let titles: Vec<_> = alex
        .related("posts")
        .iter()
        .map(|post| post.get("title").cloned())
        .collect();
    assert_eq!(
        titles,
        vec![Some(Value::from("first")), Some(Value::from("second"))]
    );

    let sam = &users.collection[1];
    assert!(sam.related("posts").is_empty());
    assert!(sam.related.contains_key("posts"));

    let sql = conn.sql();
    assert_eq!(sql.len(), 3, "count, id pre-pass, joined select");
    assert!(sql[0].starts_with("select COUNT(*)"));
    assert_eq!(
        sql[1],
        r#"select "user"."id" as "user_id" from "user" limit $1 offset $2"#
    );
    assert!(sql[2].contains(r#"left outer join "post" on "post"."user_id" = "user"."id""#));
    assert!(sql[2].ends_with(r#"where "user"."id" in ($1, $2)"#));
    assert!(!sql[2].contains("limit"));
}

#[tokio::test]
async fn empty_id_pass_skips_the_joined_select() {
    let conn = listing(0, Vec::new());
    let engine = engine(conn.clone());

    let users = engine
        .model("User")
        .unwrap()
        .find_all(Query::new().include("posts"))
        .await
        .unwrap();

    assert!(users.collection.is_empty());
    assert_eq!(users.total, 0);
    assert_eq!(conn.statements().len(), 2);
}

#[tokio::test]
async fn pagination_metadata() {
    let conn = listing(45, vec![user_post_row(21, "kim", None)]);
    let engine = engine(conn.clone());

    let page = engine
        .model("User")
        .unwrap()
        .find_all(Query::new().page(3).page_size(10))
        .await
        .unwrap();

    assert_eq!(page.limit, 10);
    assert_eq!(page.offset, 20);
    assert_eq!(page.page, 3);
    assert_eq!(page.pages, 5);
    assert_eq!(page.page_size, 10);
    assert_eq!(page.total, 45);

    let select = &conn.statements()[1];
    assert_eq!(select.params, vec![Value::Integer(10), Value::Integer(20)]);

    let body = serde_json::to_value(&page).unwrap();
    assert_eq!(body["pageSize"], json!(10));
    assert_eq!(body["collection"][0]["name"], json!("kim"));
}

#[tokio::test]
async fn page_size_is_clamped_to_the_max_limit() {
    let conn = listing(0, Vec::new());
    let config = EngineConfig {
        max_limit: 25,
        default_limit: 10,
        ..EngineConfig::default()
    };
    let engine = engine_with(conn.clone(), config);

    let page = engine
        .model("User")
        .unwrap()
        .find_all(Query::new().limit(1000))
        .await
        .unwrap();
    assert_eq!(page.limit, 25);

    let page = engine
        .model("User")
        .unwrap()
        .find_all(Query::new().limit(0))
        .await
        .unwrap();
    assert_eq!(page.limit, 10);
    assert_eq!(page.pages, 0);
}

#[tokio::test]
async fn column_names_are_mapped_both_ways() {
    let conn = listing(
        1,
        vec![
            Row::new()
                .with("post_id", 3)
                .with("post_headline", "hello")
                .with("post_user_id", 1),
        ],
    );
    let engine = engine(conn.clone());

    let posts = engine
        .model("Post")
        .unwrap()
        .find_all(Query::new().filter(Filter::eq("title", "hello")).order("title desc"))
        .await
        .unwrap();

    let select = &conn.sql()[1];
    assert!(select.contains(r#""post"."headline" as "post_headline""#));
    assert!(select.contains(r#"where "post"."headline" = $1"#));
    assert!(select.contains(r#"order by "post"."headline" desc"#));
    assert!(!select.contains(r#""title""#));

    let post = &posts.collection[0];
    assert_eq!(post.get("title"), Some(&Value::from("hello")));
    assert_eq!(post.get("headline"), None);
}

#[tokio::test]
async fn through_includes_group_targets_under_each_owner() {
    let post_tag = |post: i64, tag: Option<(i64, &str)>| {
        let row = Row::new()
            .with("post_id", post)
            .with("post_headline", "joins")
            .with("post_user_id", 1);
        match tag {
            Some((id, label)) => row
                .with("tag_id", id)
                .with("tag_label", label)
                .with("post_tag_foreign_key", post),
            None => row
                .with("tag_id", Value::Null)
                .with("tag_label", Value::Null)
                .with("post_tag_foreign_key", Value::Null),
        }
    };
    let conn = listing(
        2,
        vec![
            post_tag(1, Some((5, "rust"))),
            post_tag(1, Some((6, "sql"))),
            post_tag(2, None),
        ],
    );
    let engine = engine(conn.clone());

    let posts = engine
        .model("Post")
        .unwrap()
        .find_all(Query::new().include("tags"))
        .await
        .unwrap();

    let sql = conn.sql();
    assert_eq!(sql.len(), 3);
    assert!(sql[2].contains(concat!(
        r#"left outer join "post_tag" on "post_tag"."post_id" = "post"."id" "#,
        r#"left outer join "tag" on "tag"."id" = "post_tag"."tag_id""#
    )));
    assert!(sql[2].contains(r#""post_tag"."post_id" as "post_tag_foreign_key""#));

    assert_eq!(posts.collection.len(), 2);
    let body = serde_json::to_value(&posts.collection[0]).unwrap();
    assert_eq!(
        body["related"]["tags"],
        json!([{ "id": 5, "label": "rust" }, { "id": 6, "label": "sql" }])
    );
    assert!(posts.collection[1].related("tags").is_empty());
}

#[tokio::test]
async fn offsets_past_a_bigint_are_capped() {
    let conn = listing(0, Vec::new());
    let engine = engine(conn.clone());

    let page = engine
        .model("User")
        .unwrap()
        .find_all(Query::new().offset(u64::MAX))
        .await
        .unwrap();
    assert_eq!(page.offset, i64::MAX as u64);

    let select = &conn.statements()[1];
    assert_eq!(
        select.params,
        vec![Value::Integer(50), Value::Integer(i64::MAX)]
    );

    let huge = Query::from_json(&json!({ "offset": 1e30 }));
    assert!(matches!(huge, Err(QuarryError::InvalidQuery(_))));
}

#[tokio::test]
async fn through_foreign_key_filter_joins_the_intermediary() {
    let conn = listing(0, Vec::new());
    let engine = engine(conn.clone());

    engine
        .model("Tag")
        .unwrap()
        .find_all(Query::from_json(&json!({ "post_id": "7" })).unwrap())
        .await
        .unwrap();

    let count = &conn.statements()[0];
    assert_eq!(
        count.sql,
        concat!(
            r#"select COUNT(*) as _count from "tag" "#,
            r#"inner join "post_tag" on "post_tag"."tag_id" = "tag"."id" "#,
            r#"where "post_tag"."post_id" = $1"#
        )
    );
    assert_eq!(count.params, vec![Value::Integer(7)]);
}

#[tokio::test]
async fn driver_errors_surface_unchanged() {
    let conn = common::MockConnection::with_fallback(|_| {
        Err(QuarryError::driver("error finding users."))
    });
    let engine = engine(conn);

    let err = engine
        .model("User")
        .unwrap()
        .find_all(Query::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "error finding users.");
}

#[tokio::test]
async fn unknown_models_and_strict_includes() {
    let conn = listing(0, Vec::new());
    let engine = engine(conn.clone());
    assert!(matches!(
        engine.model("Comment"),
        Err(QuarryError::UnknownModel(_))
    ));

    // Unknown aliases are ignored by default
    engine
        .model("User")
        .unwrap()
        .find_all(Query::new().include("comments"))
        .await
        .unwrap();

    let strict = engine_with(
        conn,
        EngineConfig {
            strict_includes: true,
            ..EngineConfig::default()
        },
    );
    let err = strict
        .model("User")
        .unwrap()
        .find_all(Query::new().include("comments"))
        .await
        .unwrap_err();
    assert!(matches!(err, QuarryError::UnknownRelation { .. }));
}
