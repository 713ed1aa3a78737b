//! Collaborators the budget engine reads from and writes to.
//!
//! Each trait is the narrow interface one engine component needs. [`SqlStore`]
//! implements all of them on top of the relational database.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{
    Budget, BudgetListFilter, CurrencyCode, ExchangeRateSnapshot, ExpenseTransaction, NewBudget,
    ResultEngine,
};

mod sql;

pub use sql::SqlStore;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Source of published exchange-rate snapshots.
#[async_trait]
pub trait RateSnapshotStore: Send + Sync {
    /// Every snapshot not flagged as deleted, ordered by effective date and
    /// then by publication order.
    async fn list_non_deleted_snapshots(&self) -> ResultEngine<Vec<ExchangeRateSnapshot>>;
}

/// Read access to the ledger.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Non-deleted, non-transfer expenses of `owner` in `category_ids` whose
    /// date falls in `[start, end)`.
    async fn find_expense_transactions(
        &self,
        owner: &str,
        category_ids: &BTreeSet<i64>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ResultEngine<Vec<ExpenseTransaction>>;

    async fn get_account_currency(&self, account_id: i64) -> ResultEngine<CurrencyCode>;

    async fn get_user_base_currency(&self, owner: &str) -> ResultEngine<CurrencyCode>;
}

/// Budget persistence. Deleted budgets are invisible to every method.
#[async_trait]
pub trait BudgetStore: Send + Sync {
    async fn insert(&self, budget: &NewBudget) -> ResultEngine<Budget>;

    async fn find(&self, id: i64) -> ResultEngine<Option<Budget>>;

    /// Replaces the editable fields of a budget owned by `budget.owner` and
    /// zeroes its collected amount. `None` when no such budget exists.
    async fn update(&self, id: i64, budget: &NewBudget) -> ResultEngine<Option<Budget>>;

    async fn set_collected(&self, id: i64, amount: Decimal) -> ResultEngine<()>;

    /// Returns `false` when no budget of `owner` matched.
    async fn soft_delete(&self, id: i64, owner: &str) -> ResultEngine<bool>;

    /// Returns `false` when no budget of `owner` matched.
    async fn archive(&self, id: i64, owner: &str) -> ResultEngine<bool>;

    /// Archives `outdated_id` and stores `successor` atomically.
    async fn renew(&self, outdated_id: i64, successor: &NewBudget) -> ResultEngine<Budget>;

    /// Active budgets whose exclusive end date is on or before `today`.
    async fn list_outdated(&self, today: NaiveDate) -> ResultEngine<Vec<Budget>>;

    async fn list_by_owner(
        &self,
        owner: &str,
        filter: BudgetListFilter,
    ) -> ResultEngine<Vec<Budget>>;
}

/// Category ownership checks.
#[async_trait]
pub trait CategoryDirectory: Send + Sync {
    /// The subset of `requested` that exists and belongs to `owner`.
    async fn filter_valid_category_ids(
        &self,
        owner: &str,
        requested: &BTreeSet<i64>,
    ) -> ResultEngine<BTreeSet<i64>>;
}
