use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveValue, ConnectionTrait, DatabaseConnection, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*, sea_query::Expr,
};

use crate::{
    Budget, BudgetListFilter, CurrencyCode, EngineError, ExchangeRateSnapshot, ExpenseTransaction,
    NewBudget, ResultEngine, TransactionKind, accounts, budgets, categories, exchange_rates,
    transactions, users,
    util::{encode_category_ids, model_currency, stored_decimal},
};

use super::{BudgetStore, CategoryDirectory, RateSnapshotStore, TransactionStore, with_tx};

/// Relational implementation of every engine collaborator.
#[derive(Clone, Debug)]
pub struct SqlStore {
    database: DatabaseConnection,
}

impl SqlStore {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }

    async fn find_budget<C: ConnectionTrait>(db: &C, id: i64) -> ResultEngine<Option<Budget>> {
        budgets::Entity::find_by_id(id)
            .filter(budgets::Column::Deleted.eq(false))
            .one(db)
            .await?
            .map(Budget::try_from)
            .transpose()
    }

    async fn insert_budget<C: ConnectionTrait>(db: &C, budget: &NewBudget) -> ResultEngine<Budget> {
        let model = budget.active_model(Utc::now()).insert(db).await?;
        Budget::try_from(model)
    }
}

fn models_into_budgets(models: Vec<budgets::Model>) -> ResultEngine<Vec<Budget>> {
    models.into_iter().map(Budget::try_from).collect()
}

#[async_trait]
impl RateSnapshotStore for SqlStore {
    async fn list_non_deleted_snapshots(&self) -> ResultEngine<Vec<ExchangeRateSnapshot>> {
        let models = exchange_rates::Entity::find()
            .filter(exchange_rates::Column::Deleted.eq(false))
            .order_by_asc(exchange_rates::Column::EffectiveOn)
            .order_by_asc(exchange_rates::Column::Id)
            .all(&self.database)
            .await?;
        // A snapshot that cannot be decoded must not hide the others.
        Ok(models
            .into_iter()
            .filter_map(|model| {
                let id = model.id;
                ExchangeRateSnapshot::try_from(model)
                    .inspect_err(|err| tracing::warn!("skipping exchange rate snapshot {id}: {err}"))
                    .ok()
            })
            .collect())
    }
}

#[async_trait]
impl TransactionStore for SqlStore {
    async fn find_expense_transactions(
        &self,
        owner: &str,
        category_ids: &BTreeSet<i64>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ResultEngine<Vec<ExpenseTransaction>> {
        if category_ids.is_empty() {
            return Ok(Vec::new());
        }
        transactions::Entity::find()
            .filter(transactions::Column::Owner.eq(owner))
            .filter(transactions::Column::Deleted.eq(false))
            .filter(transactions::Column::IsTransfer.eq(false))
            .filter(transactions::Column::Kind.eq(TransactionKind::Expense.as_str()))
            .filter(transactions::Column::CategoryId.is_in(category_ids.iter().copied()))
            .filter(transactions::Column::OccurredOn.gte(start))
            .filter(transactions::Column::OccurredOn.lt(end))
            .order_by_asc(transactions::Column::OccurredOn)
            .order_by_asc(transactions::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(ExpenseTransaction::try_from)
            .collect()
    }

    async fn get_account_currency(&self, account_id: i64) -> ResultEngine<CurrencyCode> {
        let account = accounts::Entity::find_by_id(account_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("account {account_id}")))?;
        model_currency(&account.currency, "currency")
    }

    async fn get_user_base_currency(&self, owner: &str) -> ResultEngine<CurrencyCode> {
        let user = users::Entity::find_by_id(owner.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))?;
        model_currency(&user.base_currency, "base_currency")
    }
}

#[async_trait]
impl BudgetStore for SqlStore {
    async fn insert(&self, budget: &NewBudget) -> ResultEngine<Budget> {
        Self::insert_budget(&self.database, budget).await
    }

    async fn find(&self, id: i64) -> ResultEngine<Option<Budget>> {
        Self::find_budget(&self.database, id).await
    }

    async fn update(&self, id: i64, budget: &NewBudget) -> ResultEngine<Option<Budget>> {
        with_tx!(self, |db_tx| {
            let active = budgets::ActiveModel {
                name: ActiveValue::Set(budget.name.clone()),
                currency: ActiveValue::Set(budget.currency.code().to_string()),
                target_amount: ActiveValue::Set(stored_decimal(budget.target_amount)),
                collected_amount: ActiveValue::Set(stored_decimal(Decimal::ZERO)),
                period: ActiveValue::Set(budget.period.as_stored().to_string()),
                repeat: ActiveValue::Set(budget.repeat),
                start_on: ActiveValue::Set(budget.window.start),
                end_on: ActiveValue::Set(budget.window.end),
                category_ids: ActiveValue::Set(encode_category_ids(&budget.categories)),
                comment: ActiveValue::Set(budget.comment.clone()),
                updated_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            };
            let result = budgets::Entity::update_many()
                .set(active)
                .filter(budgets::Column::Id.eq(id))
                .filter(budgets::Column::Owner.eq(budget.owner.as_str()))
                .filter(budgets::Column::Deleted.eq(false))
                .exec(&db_tx)
                .await?;
            if result.rows_affected == 0 {
                Ok(None)
            } else {
                Self::find_budget(&db_tx, id).await
            }
        })
    }

    async fn set_collected(&self, id: i64, amount: Decimal) -> ResultEngine<()> {
        let result = budgets::Entity::update_many()
            .col_expr(
                budgets::Column::CollectedAmount,
                Expr::value(stored_decimal(amount)),
            )
            .col_expr(budgets::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(budgets::Column::Id.eq(id))
            .filter(budgets::Column::Deleted.eq(false))
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::BudgetNotFound(id));
        }
        Ok(())
    }

    async fn soft_delete(&self, id: i64, owner: &str) -> ResultEngine<bool> {
        let result = budgets::Entity::update_many()
            .col_expr(budgets::Column::Deleted, Expr::value(true))
            .col_expr(budgets::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(budgets::Column::Id.eq(id))
            .filter(budgets::Column::Owner.eq(owner))
            .filter(budgets::Column::Deleted.eq(false))
            .exec(&self.database)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn archive(&self, id: i64, owner: &str) -> ResultEngine<bool> {
        let result = budgets::Entity::update_many()
            .col_expr(budgets::Column::Archived, Expr::value(true))
            .col_expr(budgets::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(budgets::Column::Id.eq(id))
            .filter(budgets::Column::Owner.eq(owner))
            .filter(budgets::Column::Deleted.eq(false))
            .exec(&self.database)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn renew(&self, outdated_id: i64, successor: &NewBudget) -> ResultEngine<Budget> {
        with_tx!(self, |db_tx| {
            let archived = budgets::Entity::update_many()
                .col_expr(budgets::Column::Archived, Expr::value(true))
                .col_expr(budgets::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(budgets::Column::Id.eq(outdated_id))
                .filter(budgets::Column::Owner.eq(successor.owner.as_str()))
                .filter(budgets::Column::Archived.eq(false))
                .filter(budgets::Column::Deleted.eq(false))
                .exec(&db_tx)
                .await?;
            if archived.rows_affected == 0 {
                Err(EngineError::BudgetNotFound(outdated_id))
            } else {
                Self::insert_budget(&db_tx, successor).await
            }
        })
    }

    async fn list_outdated(&self, today: NaiveDate) -> ResultEngine<Vec<Budget>> {
        let models = budgets::Entity::find()
            .filter(budgets::Column::Archived.eq(false))
            .filter(budgets::Column::Deleted.eq(false))
            .filter(budgets::Column::EndOn.lte(today))
            .order_by_asc(budgets::Column::Id)
            .all(&self.database)
            .await?;
        models_into_budgets(models)
    }

    async fn list_by_owner(
        &self,
        owner: &str,
        filter: BudgetListFilter,
    ) -> ResultEngine<Vec<Budget>> {
        let mut query = budgets::Entity::find()
            .filter(budgets::Column::Owner.eq(owner))
            .filter(budgets::Column::Deleted.eq(false));
        if !filter.include_archived {
            query = query.filter(budgets::Column::Archived.eq(false));
        }
        let models = query
            .order_by_asc(budgets::Column::StartOn)
            .order_by_asc(budgets::Column::Id)
            .all(&self.database)
            .await?;
        models_into_budgets(models)
    }
}

#[async_trait]
impl CategoryDirectory for SqlStore {
    async fn filter_valid_category_ids(
        &self,
        owner: &str,
        requested: &BTreeSet<i64>,
    ) -> ResultEngine<BTreeSet<i64>> {
        if requested.is_empty() {
            return Ok(BTreeSet::new());
        }
        let models = categories::Entity::find()
            .filter(categories::Column::Owner.eq(owner))
            .filter(categories::Column::Deleted.eq(false))
            .filter(categories::Column::Id.is_in(requested.iter().copied()))
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(|model| model.id).collect())
    }
}
