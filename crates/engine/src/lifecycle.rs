//! Budget lifecycle: creation, edits, soft transitions and the outdated sweep.
//!
//! ```text
//! Active --(end passed, no repeat)--> Archived
//! Active --(end passed, repeat)-----> Archived + new Active successor
//! any non-deleted state --delete--> Deleted
//! ```

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{
    Budget, BudgetAggregationEngine, BudgetDraft, BudgetListFilter, EngineError, ResultEngine,
    store::{BudgetStore, CategoryDirectory},
    util::within,
};

pub struct BudgetLifecycleManager {
    budgets: Arc<dyn BudgetStore>,
    categories: Arc<dyn CategoryDirectory>,
    aggregation: Arc<BudgetAggregationEngine>,
    store_timeout: Option<Duration>,
}

impl BudgetLifecycleManager {
    pub fn new(
        budgets: Arc<dyn BudgetStore>,
        categories: Arc<dyn CategoryDirectory>,
        aggregation: Arc<BudgetAggregationEngine>,
    ) -> Self {
        Self {
            budgets,
            categories,
            aggregation,
            store_timeout: None,
        }
    }

    /// Deadline applied to the store calls of the outdated sweep.
    pub fn with_store_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn aggregation(&self) -> &Arc<BudgetAggregationEngine> {
        &self.aggregation
    }

    async fn owned_categories(
        &self,
        owner: &str,
        requested: &BTreeSet<i64>,
    ) -> ResultEngine<BTreeSet<i64>> {
        let valid = self
            .categories
            .filter_valid_category_ids(owner, requested)
            .await?;
        if valid.len() != requested.len() {
            tracing::debug!(
                "dropped categories {:?} not owned by {owner}",
                requested.difference(&valid).collect::<Vec<_>>()
            );
        }
        Ok(valid)
    }

    async fn refreshed(&self, mut budget: Budget) -> ResultEngine<Budget> {
        budget.collected_amount = self.aggregation.recompute(&budget).await?;
        Ok(budget)
    }

    /// Stores a new budget and computes its collected amount.
    ///
    /// Categories the owner does not have are dropped. If the recomputation
    /// fails the budget stays stored with a zero collected amount and the
    /// error is returned.
    pub async fn create(&self, draft: &BudgetDraft, owner: &str) -> ResultEngine<Budget> {
        let mut new = draft.validate(owner)?;
        new.categories = self.owned_categories(owner, &new.categories).await?;
        let budget = self.budgets.insert(&new).await?;
        tracing::info!("budget {} created for {owner}", budget.id);
        self.refreshed(budget).await
    }

    /// Replaces a budget's editable fields and recomputes it from zero.
    pub async fn update(&self, id: i64, draft: &BudgetDraft, owner: &str) -> ResultEngine<Budget> {
        let mut new = draft.validate(owner)?;
        new.categories = self.owned_categories(owner, &new.categories).await?;
        let budget = self
            .budgets
            .update(id, &new)
            .await?
            .ok_or(EngineError::BudgetNotFound(id))?;
        self.refreshed(budget).await
    }

    pub async fn delete(&self, id: i64, owner: &str) -> ResultEngine<()> {
        if !self.budgets.soft_delete(id, owner).await? {
            return Err(EngineError::BudgetNotFound(id));
        }
        tracing::info!("budget {id} deleted by {owner}");
        Ok(())
    }

    pub async fn archive(&self, id: i64, owner: &str) -> ResultEngine<()> {
        if !self.budgets.archive(id, owner).await? {
            return Err(EngineError::BudgetNotFound(id));
        }
        tracing::info!("budget {id} archived by {owner}");
        Ok(())
    }

    pub async fn budget(&self, id: i64, owner: &str) -> ResultEngine<Budget> {
        self.budgets
            .find(id)
            .await?
            .filter(|budget| budget.owner == owner)
            .ok_or(EngineError::BudgetNotFound(id))
    }

    pub async fn list(&self, owner: &str, filter: BudgetListFilter) -> ResultEngine<Vec<Budget>> {
        self.budgets.list_by_owner(owner, filter).await
    }

    /// Recomputes one budget regardless of its owner.
    pub async fn recompute(&self, id: i64) -> ResultEngine<Decimal> {
        let budget = self
            .budgets
            .find(id)
            .await?
            .ok_or(EngineError::BudgetNotFound(id))?;
        self.aggregation.recompute(&budget).await
    }

    /// Recomputes every non-deleted budget of `owner`, archived ones
    /// included. Returns the ids that failed; each failure is logged.
    pub async fn recompute_all_for_user(&self, owner: &str) -> ResultEngine<Vec<i64>> {
        let filter = BudgetListFilter {
            include_archived: true,
        };
        let budgets = self.budgets.list_by_owner(owner, filter).await?;
        let mut failed = Vec::new();
        for budget in &budgets {
            if let Err(err) = self.aggregation.recompute(budget).await {
                tracing::warn!("skipping budget {} of {owner}: {err}", budget.id);
                failed.push(budget.id);
            }
        }
        tracing::info!(
            "recomputed {} of {} budgets for {owner}",
            budgets.len() - failed.len(),
            budgets.len()
        );
        Ok(failed)
    }

    /// Archives every budget whose period ended on or before `today` and
    /// renews the repeating ones. Returns the archived ids.
    ///
    /// A budget that fails is logged and left as it is; the sweep goes on.
    pub async fn process_outdated(&self, today: NaiveDate) -> ResultEngine<Vec<i64>> {
        let outdated = within(
            self.store_timeout,
            "outdated budget query",
            self.budgets.list_outdated(today),
        )
        .await?;

        let mut archived = Vec::with_capacity(outdated.len());
        for budget in &outdated {
            match self.process_one(budget).await {
                Ok(()) => archived.push(budget.id),
                Err(err) => tracing::warn!("skipping outdated budget {}: {err}", budget.id),
            }
        }
        if !outdated.is_empty() {
            tracing::info!(
                "outdated budgets: {} found, {} archived",
                outdated.len(),
                archived.len()
            );
        }
        Ok(archived)
    }

    async fn process_one(&self, budget: &Budget) -> ResultEngine<()> {
        let successor = match budget.repeat.then(|| budget.successor()) {
            None => None,
            Some(Ok(successor)) => Some(successor),
            Some(Err(err)) => {
                tracing::warn!("budget {} archived without renewal: {err}", budget.id);
                None
            }
        };

        let Some(successor) = successor else {
            let matched = within(
                self.store_timeout,
                "budget archive",
                self.budgets.archive(budget.id, &budget.owner),
            )
            .await?;
            if !matched {
                return Err(EngineError::BudgetNotFound(budget.id));
            }
            return Ok(());
        };

        let renewed = within(
            self.store_timeout,
            "budget renewal",
            self.budgets.renew(budget.id, &successor),
        )
        .await?;
        tracing::info!("budget {} renewed as {}", budget.id, renewed.id);

        // The expired budget is archived at this point; a successor that cannot be
        // computed yet keeps a zero collected amount until the next recompute.
        if let Err(err) = self.aggregation.recompute(&renewed).await {
            tracing::warn!("renewed budget {} not recomputed: {err}", renewed.id);
        }
        Ok(())
    }
}
