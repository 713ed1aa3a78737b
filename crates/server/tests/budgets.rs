use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use http_body_util::BodyExt;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use serde_json::{Value, json};
use tower::ServiceExt;

use engine::Engine;
use migration::MigratorTrait;
use server::{ServerState, router};

async fn exec(db: &DatabaseConnection, sql: &str) {
    db.execute(Statement::from_string(db.get_database_backend(), sql))
        .await
        .unwrap();
}

async fn app() -> (Router, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    for sql in [
        "INSERT INTO users (username, password, base_currency) VALUES ('alice', 'password', 'USD')",
        "INSERT INTO users (username, password, base_currency) VALUES ('bob', 'hunter2', 'EUR')",
        "INSERT INTO accounts (id, owner, name, currency) VALUES (1, 'alice', 'Euro card', 'EUR')",
        "INSERT INTO categories (id, owner, name) VALUES (7, 'alice', 'Food')",
        "INSERT INTO transactions (owner, account_id, kind, is_transfer, amount, occurred_on, category_id) \
         VALUES ('alice', 1, 'expense', 0, '100.00', '2024-01-15', 7)",
        "INSERT INTO exchange_rate_snapshots (effective_on, base_currency, rates, source, created_at) \
         VALUES ('2024-01-15', 'USD', '{\"EUR\":\"0.92\",\"USD\":\"1.00\"}', 'test', '2024-01-01T00:00:00+00:00')",
    ] {
        exec(&db, sql).await;
    }
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    let state = ServerState {
        engine: Arc::new(engine),
        db: db.clone(),
    };
    (router(state), db)
}

fn basic(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

fn request(method: &str, uri: &str, user: &str, body: Option<Value>) -> Request<Body> {
    let password = if user == "bob" { "hunter2" } else { "password" };
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, basic(user, password));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(res: axum::response::Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn january() -> Value {
    json!({
        "name": "Groceries",
        "currency": "usd",
        "target_amount": "500",
        "period": "Monthly",
        "start_date": "2024-01-01",
        "end_date": "2024-01-31",
        "categories": [7, 999],
    })
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let (app, _db) = app().await;
    let req = Request::builder()
        .uri("/budgets")
        .header(header::AUTHORIZATION, basic("alice", "nope"))
        .body(Body::empty())
        .unwrap();

    let res = app.oneshot(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_renders_inclusive_end_and_lower_case_period() {
    let (app, _db) = app().await;

    let res = app
        .oneshot(request("POST", "/budgets", "alice", Some(january())))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CREATED);
    let body = json_body(res).await;
    assert_eq!(body["end_date"], "2024-01-31");
    assert_eq!(body["period"], "monthly");
    assert_eq!(body["currency"], "USD");
    assert_eq!(body["categories"], json!([7]));
    assert_eq!(body["collected_amount"], "108.70");
}

#[tokio::test]
async fn budgets_of_other_users_are_not_found() {
    let (app, _db) = app().await;
    let res = app
        .clone()
        .oneshot(request("POST", "/budgets", "alice", Some(january())))
        .await
        .unwrap();
    let id = json_body(res).await["id"].as_i64().unwrap();

    for (method, uri) in [
        ("GET", format!("/budgets/{id}")),
        ("DELETE", format!("/budgets/{id}")),
        ("POST", format!("/budgets/{id}/archive")),
        ("POST", format!("/budgets/{id}/recompute")),
    ] {
        let res = app
            .clone()
            .oneshot(request(method, &uri, "bob", None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{method} {uri}");
    }

    let res = app
        .oneshot(request("GET", &format!("/budgets/{id}"), "alice", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn invalid_period_is_unprocessable() {
    let (app, _db) = app().await;
    let mut body = january();
    body["period"] = json!("hourly");

    let res = app
        .oneshot(request("POST", "/budgets", "alice", Some(body)))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(res).await;
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("daily, weekly, monthly, yearly, custom")
    );
}

#[tokio::test]
async fn failed_recompute_is_reported_generically() {
    let (app, db) = app().await;
    let res = app
        .clone()
        .oneshot(request("POST", "/budgets", "alice", Some(january())))
        .await
        .unwrap();
    let id = json_body(res).await["id"].as_i64().unwrap();
    exec(
        &db,
        "INSERT INTO transactions (owner, account_id, kind, is_transfer, amount, occurred_on, category_id) \
         VALUES ('alice', 1, 'expense', 0, '5', '2024-01-20', 7)",
    )
    .await;

    let res = app
        .oneshot(request("POST", &format!("/budgets/{id}/recompute"), "alice", None))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(res).await["error"], "unable to refresh budget");
}

#[tokio::test]
async fn budget_failing_its_first_recompute_is_still_stored() {
    let (app, db) = app().await;
    exec(
        &db,
        "INSERT INTO transactions (owner, account_id, kind, is_transfer, amount, occurred_on, category_id) \
         VALUES ('alice', 1, 'expense', 0, '5', '2024-01-20', 7)",
    )
    .await;

    let res = app
        .clone()
        .oneshot(request("POST", "/budgets", "alice", Some(january())))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(res).await["error"], "unable to refresh budget");

    let res = app
        .oneshot(request("GET", "/budgets", "alice", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let budgets = json_body(res).await["budgets"].as_array().unwrap().clone();
    assert_eq!(budgets.len(), 1);
    assert_eq!(budgets[0]["name"], "Groceries");
    assert_eq!(budgets[0]["collected_amount"], "0.00");
}

#[tokio::test]
async fn archived_budgets_are_listed_on_request() {
    let (app, _db) = app().await;
    let res = app
        .clone()
        .oneshot(request("POST", "/budgets", "alice", Some(january())))
        .await
        .unwrap();
    let id = json_body(res).await["id"].as_i64().unwrap();

    let res = app
        .clone()
        .oneshot(request("POST", &format!("/budgets/{id}/archive"), "alice", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = app
        .clone()
        .oneshot(request("GET", "/budgets", "alice", None))
        .await
        .unwrap();
    assert_eq!(json_body(res).await["budgets"], json!([]));

    let res = app
        .oneshot(request("GET", "/budgets?include_archived=true", "alice", None))
        .await
        .unwrap();
    let body = json_body(res).await;
    assert_eq!(body["budgets"][0]["id"], id);
    assert_eq!(body["budgets"][0]["archived"], true);
}

#[tokio::test]
async fn convert_uses_the_rates_of_the_day() {
    let (app, _db) = app().await;

    let res = app
        .clone()
        .oneshot(request(
            "GET",
            "/convert?date=2024-01-15&amount=100.00&from=eur&to=USD",
            "alice",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["from"], "EUR");
    let converted: rust_decimal::Decimal = body["converted"].as_str().unwrap().parse().unwrap();
    assert_eq!(converted.round_dp(2), rust_decimal::Decimal::new(10870, 2));

    let res = app
        .oneshot(request(
            "GET",
            "/convert?date=2024-01-16&amount=1&from=EUR&to=USD",
            "alice",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
