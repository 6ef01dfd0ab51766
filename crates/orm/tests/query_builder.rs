//! Query builder rendering and execution against in-memory SQLite

use serde_json::{json, Value};
use sqlx::{Connection, SqliteConnection};
use strata_orm::{
    delete, execute_transaction, insert_into, select, update, AllowList, OrmError, SecurityError,
};

async fn seeded() -> SqliteConnection {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut conn = SqliteConnection::connect("sqlite::memory:").await.unwrap();
    sqlx::query(
        "CREATE TABLE framework_epics (id INTEGER PRIMARY KEY, name TEXT NOT NULL, status TEXT, priority INTEGER);
         CREATE TABLE framework_stories (id INTEGER PRIMARY KEY, epic_id INTEGER, title TEXT, points INTEGER);",
    )
    .execute(&mut conn)
    .await
    .unwrap();
    conn
}

async fn insert_epic(conn: &mut SqliteConnection, name: &str, status: &str, priority: i64) {
    insert_into("framework_epics")
        .values([("name", json!(name)), ("status", json!(status)), ("priority", json!(priority))])
        .execute(conn)
        .await
        .unwrap();
}

#[test]
fn renders_parameterized_select() {
    let (sql, params) = select(["id", "name"])
        .from_table("framework_epics")
        .where_eq("status", "active")
        .limit(5)
        .build()
        .unwrap();

    assert_eq!(sql, "SELECT id, name FROM framework_epics WHERE status = ? LIMIT 5");
    assert_eq!(params, vec![json!("active")]);
}

#[test]
fn placeholder_count_matches_params() {
    let (sql, params) = update("framework_stories")
        .set("title", "Renamed")
        .set("points", 8)
        .where_eq("epic_id", 3)
        .where_op("points", "<", 13)
        .build()
        .unwrap();

    assert_eq!(sql.matches('?').count(), params.len());
    assert_eq!(params, vec![json!("Renamed"), json!(8), json!(3), json!(13)]);
}

#[test]
fn injection_attempts_are_rejected_before_rendering() {
    let attempts = [
        select(["id"]).from_table("framework_epics; DROP TABLE users"),
        select(["id; DROP TABLE users"]).from_table("framework_epics"),
        select(["id"]).from_table("sqlite_master"),
        select(["password_hash"]).from_table("users"),
        select(["id"]).from_table("users").order_by("id DESC; --"),
        select(["id"])
            .from_table("users")
            .join("secrets", "secrets.user_id = users.id"),
    ];

    for builder in attempts {
        let err = builder.build().unwrap_err();
        assert!(err.is_security(), "expected security error, got {err:?}");
    }
}

#[test]
fn unknown_operator_fails_closed() {
    let result = select(["id"])
        .from_table("users")
        .where_op("id", "= 1 OR 1 =", 1)
        .build();

    assert!(matches!(
        result,
        Err(OrmError::Security(SecurityError::OperatorNotAllowed(_)))
    ));
}

#[test]
fn custom_allow_list_is_independent_of_the_application_list() {
    let allow = AllowList::new(&["audit_log"], &["id", "event"]);

    let (sql, _) = select(["id", "event"])
        .from_table("audit_log")
        .build_with(&allow)
        .unwrap();
    assert_eq!(sql, "SELECT id, event FROM audit_log");

    assert!(select(["id"]).from_table("audit_log").build().is_err());
    assert!(select(["id"]).from_table("users").build_with(&allow).is_err());
}

#[tokio::test]
async fn insert_select_update_delete_round_trip() {
    let mut conn = seeded().await;
    insert_epic(&mut conn, "Auth", "active", 2).await;
    insert_epic(&mut conn, "Billing", "active", 1).await;
    insert_epic(&mut conn, "Legacy", "archived", 3).await;

    let active = select(["id", "name"])
        .from_table("framework_epics")
        .where_eq("status", "active")
        .order_by("priority")
        .limit(5)
        .execute(&mut conn)
        .await
        .unwrap();
    let names: Vec<&Value> = active.rows().iter().map(|row| &row["name"]).collect();
    assert_eq!(names, vec![&json!("Billing"), &json!("Auth")]);

    let changed = update("framework_epics")
        .set("status", "archived")
        .where_eq("name", "Auth")
        .execute(&mut conn)
        .await
        .unwrap();
    assert_eq!(changed.rows_affected(), 1);

    let removed = delete()
        .from_table("framework_epics")
        .where_eq("status", "archived")
        .execute(&mut conn)
        .await
        .unwrap();
    assert_eq!(removed.rows_affected(), 2);

    let remaining = select(Vec::<String>::new())
        .from_table("framework_epics")
        .execute(&mut conn)
        .await
        .unwrap();
    assert_eq!(remaining.rows().len(), 1);
    assert_eq!(remaining.rows()[0]["name"], json!("Billing"));
    assert_eq!(remaining.rows()[0]["priority"], json!(1));
}

#[tokio::test]
async fn bound_values_are_never_interpreted_as_sql() {
    let mut conn = seeded().await;
    insert_epic(&mut conn, "Robert'); DROP TABLE framework_epics; --", "active", 1).await;

    let rows = select(["name"])
        .from_table("framework_epics")
        .where_like("name", "Robert%")
        .execute(&mut conn)
        .await
        .unwrap();
    assert_eq!(
        rows.rows()[0]["name"],
        json!("Robert'); DROP TABLE framework_epics; --")
    );
}

#[tokio::test]
async fn join_renders_and_runs() {
    let mut conn = seeded().await;
    insert_epic(&mut conn, "Auth", "active", 1).await;
    insert_into("framework_stories")
        .values([("epic_id", json!(1)), ("title", json!("Login form")), ("points", json!(3))])
        .execute(&mut conn)
        .await
        .unwrap();

    let rows = select(["framework_stories.title", "framework_epics.name AS epic"])
        .from_table("framework_stories")
        .join("framework_epics", "framework_epics.id = framework_stories.epic_id")
        .execute(&mut conn)
        .await
        .unwrap();

    assert_eq!(rows.rows().len(), 1);
    assert_eq!(rows.rows()[0]["title"], json!("Login form"));
    assert_eq!(rows.rows()[0]["epic"], json!("Auth"));
}

#[tokio::test]
async fn rendered_statements_compose_into_a_transaction() {
    let mut conn = seeded().await;
    let first = insert_into("framework_epics")
        .values([("name", json!("Auth"))])
        .build()
        .unwrap();
    let broken = insert_into("framework_epics")
        .values([("name", Value::Null)])
        .build()
        .unwrap();

    assert!(execute_transaction(&mut conn, &[first.clone(), broken]).await.is_err());
    let count = select(["id"]).from_table("framework_epics").execute(&mut conn).await.unwrap();
    assert!(count.rows().is_empty());

    let outcomes = execute_transaction(&mut conn, &[first]).await.unwrap();
    assert_eq!(outcomes[0].rows_affected(), 1);
}

#[tokio::test]
async fn bounded_delete_is_rejected_instead_of_widened() {
    let mut conn = seeded().await;
    insert_epic(&mut conn, "Auth", "active", 1).await;
    insert_epic(&mut conn, "Billing", "active", 2).await;

    let result = delete()
        .from_table("framework_epics")
        .order_by("id")
        .limit(1)
        .execute(&mut conn)
        .await;
    assert!(matches!(result, Err(OrmError::InvalidInput(_))));

    let result = update("framework_epics")
        .set("status", "archived")
        .join("framework_stories", "framework_stories.epic_id = framework_epics.id")
        .execute(&mut conn)
        .await;
    assert!(matches!(result, Err(OrmError::InvalidInput(_))));

    let rows = select(["id"])
        .from_table("framework_epics")
        .where_eq("status", "active")
        .execute(&mut conn)
        .await
        .unwrap();
    assert_eq!(rows.rows().len(), 2);
}
