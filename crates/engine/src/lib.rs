use std::{sync::Arc, time::Duration};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;

pub use aggregation::{BudgetAggregationEngine, Contribution, contribution};
pub use budgets::{Budget, BudgetDraft, BudgetListFilter, NewBudget};
pub use converter::CurrencyConverter;
pub use currency::CurrencyCode;
pub use error::EngineError;
pub use exchange_rates::ExchangeRateSnapshot;
pub use lifecycle::BudgetLifecycleManager;
pub use period::{BudgetWindow, PeriodKind, decode_end_date, encode_end_date};
pub use rate_cache::{DEFAULT_REFRESH_TIMEOUT, DayRates, ExchangeRateCache, is_stale};
pub use store::{BudgetStore, CategoryDirectory, RateSnapshotStore, SqlStore, TransactionStore};
pub use transactions::{ExpenseTransaction, TransactionKind};

mod accounts;
mod aggregation;
mod budgets;
mod categories;
mod converter;
mod currency;
mod error;
mod exchange_rates;
mod lifecycle;
mod period;
mod rate_cache;
mod store;
mod transactions;
pub mod users;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;

/// Entry point of the budget core.
///
/// Every component is built once here and shared; nothing is global.
pub struct Engine {
    cache: Arc<ExchangeRateCache>,
    converter: Arc<CurrencyConverter>,
    lifecycle: BudgetLifecycleManager,
}

impl core::fmt::Debug for Engine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine").field("cache", &self.cache).finish()
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn rate_cache(&self) -> &Arc<ExchangeRateCache> {
        &self.cache
    }

    pub fn lifecycle(&self) -> &BudgetLifecycleManager {
        &self.lifecycle
    }

    pub async fn create_budget(&self, draft: &BudgetDraft, owner: &str) -> ResultEngine<Budget> {
        self.lifecycle.create(draft, owner).await
    }

    pub async fn update_budget(
        &self,
        id: i64,
        draft: &BudgetDraft,
        owner: &str,
    ) -> ResultEngine<Budget> {
        self.lifecycle.update(id, draft, owner).await
    }

    pub async fn delete_budget(&self, id: i64, owner: &str) -> ResultEngine<()> {
        self.lifecycle.delete(id, owner).await
    }

    pub async fn archive_budget(&self, id: i64, owner: &str) -> ResultEngine<()> {
        self.lifecycle.archive(id, owner).await
    }

    pub async fn budget(&self, id: i64, owner: &str) -> ResultEngine<Budget> {
        self.lifecycle.budget(id, owner).await
    }

    pub async fn list_budgets(
        &self,
        owner: &str,
        filter: BudgetListFilter,
    ) -> ResultEngine<Vec<Budget>> {
        self.lifecycle.list(owner, filter).await
    }

    /// Recomputes a budget on behalf of its owner.
    pub async fn recompute_budget(&self, id: i64, owner: &str) -> ResultEngine<Budget> {
        let mut budget = self.lifecycle.budget(id, owner).await?;
        budget.collected_amount = self.lifecycle.aggregation().recompute(&budget).await?;
        Ok(budget)
    }

    /// Recomputes a budget whoever owns it.
    pub async fn recompute(&self, id: i64) -> ResultEngine<()> {
        self.lifecycle.recompute(id).await.map(|_| ())
    }

    /// Returns the ids of the budgets that could not be recomputed.
    pub async fn recompute_all_for_user(&self, owner: &str) -> ResultEngine<Vec<i64>> {
        self.lifecycle.recompute_all_for_user(owner).await
    }

    /// Returns the ids of the archived budgets.
    pub async fn process_outdated(&self, today: NaiveDate) -> ResultEngine<Vec<i64>> {
        self.lifecycle.process_outdated(today).await
    }

    pub async fn convert(
        &self,
        date: NaiveDate,
        amount: Decimal,
        from: CurrencyCode,
        to: CurrencyCode,
    ) -> ResultEngine<Decimal> {
        self.converter.convert(date, amount, from, to).await
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    refresh_timeout: Option<Duration>,
    store_timeout: Option<Duration>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Deadline for reloading exchange-rate snapshots.
    pub fn refresh_timeout(mut self, timeout: Duration) -> EngineBuilder {
        self.refresh_timeout = Some(timeout);
        self
    }

    /// Deadline for store calls made by recomputations and the outdated sweep.
    pub fn store_timeout(mut self, timeout: Duration) -> EngineBuilder {
        self.store_timeout = Some(timeout);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let store = Arc::new(SqlStore::new(self.database));
        let cache = Arc::new(ExchangeRateCache::new(
            store.clone(),
            self.refresh_timeout.unwrap_or(DEFAULT_REFRESH_TIMEOUT),
        ));
        let converter = Arc::new(CurrencyConverter::new(cache.clone()));
        let aggregation = Arc::new(
            BudgetAggregationEngine::new(store.clone(), store.clone(), converter.clone())
                .with_store_timeout(self.store_timeout),
        );
        let lifecycle = BudgetLifecycleManager::new(store.clone(), store, aggregation)
            .with_store_timeout(self.store_timeout);

        Ok(Engine {
            cache,
            converter,
            lifecycle,
        })
    }
}
