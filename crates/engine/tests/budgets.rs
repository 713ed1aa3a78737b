use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{BudgetDraft, BudgetListFilter, CurrencyCode, Engine, EngineError, PeriodKind};
use migration::MigratorTrait;

async fn exec(db: &DatabaseConnection, sql: &str) {
    db.execute(Statement::from_string(db.get_database_backend(), sql))
        .await
        .unwrap();
}

/// alice (base USD) owns a EUR account (1), a USD account (2) and
/// categories 5 and 7; bob owns category 999.
async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    for sql in [
        "INSERT INTO users (username, password, base_currency) VALUES ('alice', 'password', 'USD')",
        "INSERT INTO users (username, password, base_currency) VALUES ('bob', 'password', 'EUR')",
        "INSERT INTO accounts (id, owner, name, currency) VALUES (1, 'alice', 'Euro card', 'EUR')",
        "INSERT INTO accounts (id, owner, name, currency) VALUES (2, 'alice', 'Checking', 'USD')",
        "INSERT INTO categories (id, owner, parent_id, name) VALUES (5, 'alice', NULL, 'Home')",
        "INSERT INTO categories (id, owner, parent_id, name) VALUES (7, 'alice', NULL, 'Food')",
        "INSERT INTO categories (id, owner, parent_id, name) VALUES (999, 'bob', NULL, 'Bob stuff')",
    ] {
        exec(&db, sql).await;
    }
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

async fn expense(
    db: &DatabaseConnection,
    account_id: i64,
    amount: &str,
    base_amount: Option<&str>,
    on: &str,
    category_id: i64,
) {
    let base_amount = base_amount.map_or("NULL".to_string(), |value| format!("'{value}'"));
    exec(
        db,
        &format!(
            "INSERT INTO transactions (owner, account_id, kind, is_transfer, amount, base_amount, occurred_on, category_id) \
             VALUES ('alice', {account_id}, 'expense', 0, '{amount}', {base_amount}, '{on}', {category_id})"
        ),
    )
    .await;
}

async fn snapshot(db: &DatabaseConnection, on: &str, rates: &str) {
    exec(
        db,
        &format!(
            "INSERT INTO exchange_rate_snapshots (effective_on, base_currency, rates, source, created_at) \
             VALUES ('{on}', 'USD', '{rates}', 'test', '2024-01-01T00:00:00+00:00')"
        ),
    )
    .await;
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn code(value: &str) -> CurrencyCode {
    CurrencyCode::try_from(value).unwrap()
}

fn january(currency: &str, categories: Vec<i64>) -> BudgetDraft {
    BudgetDraft {
        name: "Groceries".to_string(),
        currency: currency.to_string(),
        target_amount: dec!(500),
        period: "monthly".to_string(),
        repeat: false,
        start_date: date(2024, 1, 1),
        end_date: date(2024, 1, 31),
        categories,
        comment: None,
    }
}

#[tokio::test]
async fn euro_expense_counts_towards_dollar_budget() {
    let (engine, db) = engine_with_db().await;
    expense(&db, 1, "100.00", None, "2024-01-15", 7).await;
    snapshot(&db, "2024-01-15", r#"{"EUR":"0.92","USD":"1.00"}"#).await;

    let budget = engine
        .create_budget(&january("USD", vec![7]), "alice")
        .await
        .unwrap();

    assert_eq!(budget.collected_amount, dec!(108.70));
    assert_eq!(budget.window.end, date(2024, 2, 1));
    assert_eq!(budget.window.inclusive_end(), date(2024, 1, 31));
    let stored = engine.budget(budget.id, "alice").await.unwrap();
    assert_eq!(stored.collected_amount, dec!(108.70));

    let converted = engine
        .convert(date(2024, 1, 15), dec!(100.00), code("EUR"), code("USD"))
        .await
        .unwrap();
    assert_eq!(converted.round_dp(2), dec!(108.70));
}

#[tokio::test]
async fn foreign_categories_are_dropped() {
    let (engine, _db) = engine_with_db().await;

    let budget = engine
        .create_budget(&january("USD", vec![5, 999]), "alice")
        .await
        .unwrap();

    assert_eq!(budget.categories.into_iter().collect::<Vec<_>>(), vec![5]);
    let stored = engine.budget(budget.id, "alice").await.unwrap();
    assert_eq!(stored.categories.into_iter().collect::<Vec<_>>(), vec![5]);
}

#[tokio::test]
async fn only_categories_of_someone_else_leave_an_empty_budget() {
    let (engine, db) = engine_with_db().await;
    expense(&db, 2, "40", None, "2024-01-10", 7).await;

    let budget = engine
        .create_budget(&january("USD", vec![999]), "alice")
        .await
        .unwrap();

    assert!(budget.categories.is_empty());
    assert_eq!(budget.collected_amount, Decimal::ZERO);
}

#[tokio::test]
async fn only_matching_expenses_in_the_window_are_counted() {
    let (engine, db) = engine_with_db().await;
    expense(&db, 1, "10.00", None, "2024-01-01", 7).await;
    expense(&db, 1, "2.50", None, "2024-01-31", 5).await;
    // end date is exclusive once stored
    expense(&db, 1, "1000", None, "2024-02-01", 7).await;
    expense(&db, 1, "1000", None, "2023-12-31", 7).await;
    for sql in [
        "INSERT INTO transactions (owner, account_id, kind, is_transfer, amount, occurred_on, category_id, deleted) \
         VALUES ('alice', 1, 'expense', 0, '1000', '2024-01-10', 7, 1)",
        "INSERT INTO transactions (owner, account_id, kind, is_transfer, amount, occurred_on, category_id) \
         VALUES ('alice', 1, 'expense', 1, '1000', '2024-01-10', 7)",
        "INSERT INTO transactions (owner, account_id, kind, is_transfer, amount, occurred_on, category_id) \
         VALUES ('alice', 1, 'income', 0, '1000', '2024-01-10', 7)",
        "INSERT INTO transactions (owner, account_id, kind, is_transfer, amount, occurred_on, category_id) \
         VALUES ('alice', 1, 'expense', 0, '1000', '2024-01-10', NULL)",
    ] {
        exec(&db, sql).await;
    }

    let budget = engine
        .create_budget(&january("EUR", vec![5, 7]), "alice")
        .await
        .unwrap();

    assert_eq!(budget.collected_amount, dec!(12.50));
}

#[tokio::test]
async fn recompute_twice_gives_the_same_amount() {
    let (engine, db) = engine_with_db().await;
    expense(&db, 1, "100.00", None, "2024-01-15", 7).await;
    expense(&db, 2, "19.99", None, "2024-01-16", 7).await;
    snapshot(&db, "2024-01-15", r#"{"EUR":"0.92"}"#).await;
    let budget = engine
        .create_budget(&january("USD", vec![7]), "alice")
        .await
        .unwrap();

    let first = engine.recompute_budget(budget.id, "alice").await.unwrap();
    let second = engine.recompute_budget(budget.id, "alice").await.unwrap();

    assert_eq!(first.collected_amount, dec!(128.69));
    assert_eq!(first.collected_amount, second.collected_amount);
    assert_eq!(
        engine.budget(budget.id, "alice").await.unwrap().collected_amount,
        dec!(128.69)
    );
}

#[tokio::test]
async fn same_currency_needs_no_rates() {
    let (engine, db) = engine_with_db().await;
    // no snapshot at all: any conversion attempt would fail
    expense(&db, 1, "25.10", Some("27.28"), "2024-01-15", 7).await;

    let budget = engine
        .create_budget(&january("EUR", vec![7]), "alice")
        .await
        .unwrap();

    assert_eq!(budget.collected_amount, dec!(25.10));
    assert!(engine.rate_cache().last_refresh().is_none());
}

#[tokio::test]
async fn base_amount_is_used_for_base_currency_budgets() {
    let (engine, db) = engine_with_db().await;
    expense(&db, 1, "25.10", Some("27.28"), "2024-01-15", 7).await;

    let budget = engine
        .create_budget(&january("USD", vec![7]), "alice")
        .await
        .unwrap();

    assert_eq!(budget.collected_amount, dec!(27.28));
    assert!(engine.rate_cache().last_refresh().is_none());
}

#[tokio::test]
async fn missing_rate_fails_the_recompute() {
    let (engine, db) = engine_with_db().await;
    let budget = engine
        .create_budget(&january("USD", vec![7]), "alice")
        .await
        .unwrap();
    expense(&db, 1, "100.00", None, "2024-01-20", 7).await;
    snapshot(&db, "2024-01-15", r#"{"EUR":"0.92"}"#).await;

    let err = engine
        .recompute_budget(budget.id, "alice")
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        EngineError::ConversionFailure { budget_id, amount, .. }
            if *budget_id == budget.id && *amount == dec!(100.00)
    ));
    assert!(err.is_refresh_failure());
    assert_eq!(
        engine.budget(budget.id, "alice").await.unwrap().collected_amount,
        Decimal::ZERO
    );
}

#[tokio::test]
async fn failed_recompute_on_create_keeps_the_budget() {
    let (engine, db) = engine_with_db().await;
    expense(&db, 1, "100.00", None, "2024-01-20", 7).await;

    let err = engine
        .create_budget(&january("USD", vec![7]), "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ConversionFailure { .. }));

    let budgets = engine
        .list_budgets("alice", BudgetListFilter::default())
        .await
        .unwrap();
    assert_eq!(budgets.len(), 1);
    assert_eq!(budgets[0].collected_amount, Decimal::ZERO);
}

#[tokio::test]
async fn invalid_period_lists_accepted_values() {
    let (engine, _db) = engine_with_db().await;
    let mut draft = january("USD", vec![7]);
    draft.period = "fortnightly".to_string();

    let err = engine.create_budget(&draft, "alice").await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "invalid period \"fortnightly\", accepted values: daily, weekly, monthly, yearly, custom"
    );
}

#[tokio::test]
async fn repeating_custom_budget_is_rejected() {
    let (engine, _db) = engine_with_db().await;
    let mut draft = january("USD", vec![7]);
    draft.period = "CUSTOM".to_string();
    draft.repeat = true;

    assert!(matches!(
        engine.create_budget(&draft, "alice").await,
        Err(EngineError::InvalidPeriodForRenewal(_))
    ));
    assert!(
        engine
            .list_budgets("alice", BudgetListFilter::default())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn update_replaces_fields_and_recomputes() {
    let (engine, db) = engine_with_db().await;
    expense(&db, 2, "10", None, "2024-01-05", 5).await;
    expense(&db, 2, "30", None, "2024-01-06", 7).await;
    let budget = engine
        .create_budget(&january("USD", vec![5]), "alice")
        .await
        .unwrap();
    assert_eq!(budget.collected_amount, dec!(10));

    let mut draft = january("usd", vec![7, 999]);
    draft.name = "Food".to_string();
    draft.period = "Custom".to_string();
    let updated = engine
        .update_budget(budget.id, &draft, "alice")
        .await
        .unwrap();

    assert_eq!(updated.id, budget.id);
    assert_eq!(updated.name, "Food");
    assert_eq!(updated.period, PeriodKind::Custom);
    assert_eq!(updated.categories.into_iter().collect::<Vec<_>>(), vec![7]);
    assert_eq!(updated.collected_amount, dec!(30));
}

#[tokio::test]
async fn update_of_someone_elses_budget_is_not_found() {
    let (engine, _db) = engine_with_db().await;
    let budget = engine
        .create_budget(&january("USD", vec![7]), "alice")
        .await
        .unwrap();

    assert_eq!(
        engine
            .update_budget(budget.id, &january("EUR", vec![]), "bob")
            .await
            .unwrap_err(),
        EngineError::BudgetNotFound(budget.id)
    );
    assert_eq!(
        engine.budget(budget.id, "alice").await.unwrap().currency,
        code("USD")
    );
}

#[tokio::test]
async fn delete_and_archive_check_the_owner() {
    let (engine, _db) = engine_with_db().await;
    let first = engine
        .create_budget(&january("USD", vec![7]), "alice")
        .await
        .unwrap();
    let second = engine
        .create_budget(&january("USD", vec![5]), "alice")
        .await
        .unwrap();

    assert_eq!(
        engine.delete_budget(first.id, "bob").await.unwrap_err(),
        EngineError::BudgetNotFound(first.id)
    );
    assert_eq!(
        engine.archive_budget(second.id, "bob").await.unwrap_err(),
        EngineError::BudgetNotFound(second.id)
    );

    engine.delete_budget(first.id, "alice").await.unwrap();
    assert_eq!(
        engine.delete_budget(first.id, "alice").await.unwrap_err(),
        EngineError::BudgetNotFound(first.id)
    );
    assert_eq!(
        engine.budget(first.id, "alice").await.unwrap_err(),
        EngineError::BudgetNotFound(first.id)
    );
    assert_eq!(
        engine.archive_budget(first.id, "alice").await.unwrap_err(),
        EngineError::BudgetNotFound(first.id)
    );

    engine.archive_budget(second.id, "alice").await.unwrap();
    assert!(
        engine
            .list_budgets("alice", BudgetListFilter::default())
            .await
            .unwrap()
            .is_empty()
    );
    let all = engine
        .list_budgets(
            "alice",
            BudgetListFilter {
                include_archived: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].archived);
}

#[tokio::test]
async fn outdated_budgets_are_archived_and_renewed() {
    let (engine, db) = engine_with_db().await;
    expense(&db, 2, "12", None, "2024-02-10", 7).await;
    expense(&db, 2, "99", None, "2024-01-10", 7).await;

    let mut repeating = january("USD", vec![7]);
    repeating.repeat = true;
    let repeating = engine.create_budget(&repeating, "alice").await.unwrap();
    let one_off = engine
        .create_budget(&january("USD", vec![5]), "alice")
        .await
        .unwrap();
    let mut running = january("USD", vec![7]);
    running.end_date = date(2024, 2, 5);
    running.period = "custom".to_string();
    let running = engine.create_budget(&running, "alice").await.unwrap();

    let archived = engine.process_outdated(date(2024, 2, 1)).await.unwrap();

    assert_eq!(archived, vec![repeating.id, one_off.id]);
    let active = engine
        .list_budgets("alice", BudgetListFilter::default())
        .await
        .unwrap();
    assert_eq!(active.len(), 2);
    assert_eq!(active[0].id, running.id);
    let successor = &active[1];
    assert_eq!(successor.name, "Groceries (copy)");
    assert_eq!(successor.window.start, date(2024, 2, 1));
    assert_eq!(successor.window.end, date(2024, 3, 1));
    assert_eq!(successor.target_amount, dec!(500));
    assert!(successor.repeat);
    assert_eq!(successor.collected_amount, dec!(12));

    // already archived: nothing left to do on the same day
    assert!(
        engine
            .process_outdated(date(2024, 2, 1))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn repeating_custom_budget_is_archived_among_valid_ones() {
    let (engine, db) = engine_with_db().await;
    let first = engine
        .create_budget(&january("USD", vec![7]), "alice")
        .await
        .unwrap();
    // rows like this predate the renewal check on create
    exec(
        &db,
        "INSERT INTO budgets (owner, name, currency, target_amount, period, repeat, start_on, end_on, category_ids, created_at, updated_at) \
         VALUES ('alice', 'Trip', 'USD', '900', 'CUSTOM', 1, '2024-01-05', '2024-01-20', '5', \
         '2024-01-01T00:00:00+00:00', '2024-01-01T00:00:00+00:00')",
    )
    .await;
    let legacy = engine
        .list_budgets("alice", BudgetListFilter::default())
        .await
        .unwrap()
        .into_iter()
        .find(|budget| budget.name == "Trip")
        .unwrap();
    let last = engine
        .create_budget(&january("USD", vec![5]), "alice")
        .await
        .unwrap();

    let archived = engine.process_outdated(date(2024, 2, 1)).await.unwrap();

    assert_eq!(archived, vec![first.id, legacy.id, last.id]);
    assert!(
        engine
            .list_budgets("alice", BudgetListFilter::default())
            .await
            .unwrap()
            .is_empty()
    );
    assert!(engine.budget(legacy.id, "alice").await.unwrap().archived);
    assert!(
        engine
            .process_outdated(date(2024, 2, 2))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn renewal_survives_a_failed_successor_recompute() {
    let (engine, db) = engine_with_db().await;
    let mut draft = january("USD", vec![7]);
    draft.repeat = true;
    let budget = engine.create_budget(&draft, "alice").await.unwrap();
    // no rate for this date
    expense(&db, 1, "50", None, "2024-02-03", 7).await;

    let archived = engine.process_outdated(date(2024, 2, 2)).await.unwrap();

    assert_eq!(archived, vec![budget.id]);
    let active = engine
        .list_budgets("alice", BudgetListFilter::default())
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].collected_amount, Decimal::ZERO);
    assert_eq!(active[0].window.start, date(2024, 2, 1));
}

#[tokio::test]
async fn broken_snapshots_do_not_block_conversions() {
    let (engine, db) = engine_with_db().await;
    snapshot(&db, "2024-01-15", r#"{"EUR":"0.92","USD":"1.00"}"#).await;
    snapshot(&db, "2023-06-01", r#"{"EUR":"0.90","USDT":"1.0"}"#).await;
    exec(
        &db,
        "INSERT INTO exchange_rate_snapshots (effective_on, base_currency, rates, source, created_at) \
         VALUES ('2023-07-01', 'dollars', '{\"EUR\":\"0.91\"}', 'test', '2024-01-01T00:00:00+00:00')",
    )
    .await;

    let converted = engine
        .convert(date(2024, 1, 15), dec!(100.00), code("EUR"), code("USD"))
        .await
        .unwrap();
    assert_eq!(converted.round_dp(2), dec!(108.70));

    let converted = engine
        .convert(date(2023, 6, 1), dec!(90), code("EUR"), code("USD"))
        .await
        .unwrap();
    assert_eq!(converted, dec!(100));

    assert_eq!(
        engine
            .convert(date(2023, 7, 1), dec!(1), code("EUR"), code("USD"))
            .await
            .unwrap_err(),
        EngineError::RateNotFoundForDate(date(2023, 7, 1))
    );
}

#[tokio::test]
async fn recompute_all_skips_failing_budgets() {
    let (engine, db) = engine_with_db().await;
    let failing = engine
        .create_budget(&january("USD", vec![7]), "alice")
        .await
        .unwrap();
    let healthy = engine
        .create_budget(&january("EUR", vec![5]), "alice")
        .await
        .unwrap();
    let archived = engine
        .create_budget(&january("EUR", vec![5]), "alice")
        .await
        .unwrap();
    engine.archive_budget(archived.id, "alice").await.unwrap();

    expense(&db, 1, "80", None, "2024-01-20", 7).await;
    expense(&db, 1, "15.5", None, "2024-01-21", 5).await;

    let failed = engine.recompute_all_for_user("alice").await.unwrap();

    assert_eq!(failed, vec![failing.id]);
    assert_eq!(
        engine.budget(healthy.id, "alice").await.unwrap().collected_amount,
        dec!(15.50)
    );
    assert_eq!(
        engine.budget(archived.id, "alice").await.unwrap().collected_amount,
        dec!(15.50)
    );
    assert_eq!(
        engine.budget(failing.id, "alice").await.unwrap().collected_amount,
        Decimal::ZERO
    );
}
