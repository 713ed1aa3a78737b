//! Collected amount of a budget.
//!
//! The collected amount is never maintained incrementally: every
//! recomputation reads the full matching transaction set and replaces the
//! stored value.

use std::{collections::HashMap, sync::Arc, time::Duration};

use rust_decimal::Decimal;

use crate::{
    Budget, CurrencyCode, CurrencyConverter, EngineError, ExpenseTransaction, ResultEngine,
    store::{BudgetStore, TransactionStore},
    util::{round_collected, within},
};

/// Where a transaction's contribution to a budget comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Contribution {
    /// Account currency is the budget currency.
    Verbatim(Decimal),
    /// Precomputed amount in the owner's base currency, which is the budget
    /// currency.
    BaseAmount(Decimal),
    /// Needs a conversion from the account currency on the transaction date.
    Convert { amount: Decimal, from: CurrencyCode },
}

/// Picks the contribution path of one transaction.
///
/// The account currency wins over the precomputed base amount even when the
/// latter is present.
pub fn contribution(
    transaction: &ExpenseTransaction,
    account_currency: CurrencyCode,
    base_currency: CurrencyCode,
    budget_currency: CurrencyCode,
) -> Contribution {
    if account_currency == budget_currency {
        return Contribution::Verbatim(transaction.amount);
    }
    match transaction.base_amount {
        Some(base_amount) if base_currency == budget_currency => {
            Contribution::BaseAmount(base_amount)
        }
        _ => Contribution::Convert {
            amount: transaction.amount,
            from: account_currency,
        },
    }
}

pub struct BudgetAggregationEngine {
    transactions: Arc<dyn TransactionStore>,
    budgets: Arc<dyn BudgetStore>,
    converter: Arc<CurrencyConverter>,
    store_timeout: Option<Duration>,
}

impl BudgetAggregationEngine {
    pub fn new(
        transactions: Arc<dyn TransactionStore>,
        budgets: Arc<dyn BudgetStore>,
        converter: Arc<CurrencyConverter>,
    ) -> Self {
        Self {
            transactions,
            budgets,
            converter,
            store_timeout: None,
        }
    }

    /// Deadline applied to every store call made during a recomputation.
    pub fn with_store_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn converter(&self) -> &Arc<CurrencyConverter> {
        &self.converter
    }

    /// Sum of the budget's matching expenses in the budget currency, rounded
    /// to cents. Nothing is persisted.
    pub async fn collected_amount(&self, budget: &Budget) -> ResultEngine<Decimal> {
        if budget.categories.is_empty() {
            return Ok(round_collected(Decimal::ZERO));
        }

        let transactions = within(
            self.store_timeout,
            "transaction query",
            self.transactions.find_expense_transactions(
                &budget.owner,
                &budget.categories,
                budget.window.start,
                budget.window.end,
            ),
        )
        .await?;
        if transactions.is_empty() {
            return Ok(round_collected(Decimal::ZERO));
        }

        let mut base_currency: Option<CurrencyCode> = None;
        let mut account_currencies: HashMap<i64, CurrencyCode> = HashMap::new();
        let mut total = Decimal::ZERO;
        for transaction in &transactions {
            let account_currency = match account_currencies.get(&transaction.account_id) {
                Some(currency) => *currency,
                None => {
                    let currency = within(
                        self.store_timeout,
                        "account currency lookup",
                        self.transactions
                            .get_account_currency(transaction.account_id),
                    )
                    .await?;
                    account_currencies.insert(transaction.account_id, currency);
                    currency
                }
            };

            // The owner's base currency only matters for a precomputed base amount.
            let base = if account_currency != budget.currency && transaction.base_amount.is_some() {
                match base_currency {
                    Some(currency) => currency,
                    None => {
                        let currency = within(
                            self.store_timeout,
                            "base currency lookup",
                            self.transactions.get_user_base_currency(&budget.owner),
                        )
                        .await?;
                        *base_currency.insert(currency)
                    }
                }
            } else {
                account_currency
            };

            let amount = match contribution(transaction, account_currency, base, budget.currency) {
                Contribution::Verbatim(amount) | Contribution::BaseAmount(amount) => amount,
                Contribution::Convert { amount, from } => self
                    .converter
                    .convert(transaction.occurred_on, amount, from, budget.currency)
                    .await
                    .map_err(|err| EngineError::ConversionFailure {
                        budget_id: budget.id,
                        transaction_id: transaction.id,
                        amount,
                        from,
                        to: budget.currency,
                        source: Box::new(err),
                    })?,
            };
            total += amount;
        }

        Ok(round_collected(total))
    }

    /// Recomputes and stores the collected amount of `budget`.
    pub async fn recompute(&self, budget: &Budget) -> ResultEngine<Decimal> {
        let collected = self.collected_amount(budget).await?;
        within(
            self.store_timeout,
            "budget update",
            self.budgets.set_collected(budget.id, collected),
        )
        .await?;
        tracing::debug!("budget {} collected {collected} {}", budget.id, budget.currency);
        Ok(collected)
    }
}
