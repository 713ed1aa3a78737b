//! The module contains the error the engine can throw.
//!
//! Rate lookups fail with [`RateNotFoundForDate`] or [`RateNotFoundForCurrency`];
//! a budget recomputation wraps either of them into a [`ConversionFailure`]
//! carrying the offending transaction.
//!
//!  [`RateNotFoundForDate`]: EngineError::RateNotFoundForDate
//!  [`RateNotFoundForCurrency`]: EngineError::RateNotFoundForCurrency
//!  [`ConversionFailure`]: EngineError::ConversionFailure
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::DbErr;
use thiserror::Error;

use crate::CurrencyCode;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no exchange rates for {0}")]
    RateNotFoundForDate(NaiveDate),
    #[error("no exchange rate for {currency} on {date}")]
    RateNotFoundForCurrency {
        date: NaiveDate,
        currency: CurrencyCode,
    },
    #[error("invalid period \"{value}\", accepted values: {}", accepted.join(", "))]
    InvalidPeriod {
        value: String,
        accepted: Vec<&'static str>,
    },
    #[error("period {0} cannot repeat")]
    InvalidPeriodForRenewal(String),
    #[error("budget {0} not found")]
    BudgetNotFound(i64),
    #[error(
        "budget {budget_id}: cannot convert transaction {transaction_id} ({amount} {from} -> {to}): {source}"
    )]
    ConversionFailure {
        budget_id: i64,
        transaction_id: i64,
        amount: Decimal,
        from: CurrencyCode,
        to: CurrencyCode,
        #[source]
        source: Box<EngineError>,
    },
    #[error("exchange rate refresh failed: {0}")]
    RefreshFailure(String),
    #[error("Invalid currency: {0}")]
    InvalidCurrency(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid name: {0}")]
    InvalidName(String),
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Returns `true` for failures that only concern refreshing a budget's
    /// collected amount (missing rates, refresh problems).
    pub fn is_refresh_failure(&self) -> bool {
        matches!(
            self,
            Self::RateNotFoundForDate(_)
                | Self::RateNotFoundForCurrency { .. }
                | Self::ConversionFailure { .. }
                | Self::RefreshFailure(_)
        )
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::RateNotFoundForDate(a), Self::RateNotFoundForDate(b)) => a == b,
            (
                Self::RateNotFoundForCurrency {
                    date: a_date,
                    currency: a_currency,
                },
                Self::RateNotFoundForCurrency {
                    date: b_date,
                    currency: b_currency,
                },
            ) => a_date == b_date && a_currency == b_currency,
            (Self::InvalidPeriod { value: a, .. }, Self::InvalidPeriod { value: b, .. }) => a == b,
            (Self::InvalidPeriodForRenewal(a), Self::InvalidPeriodForRenewal(b)) => a == b,
            (Self::BudgetNotFound(a), Self::BudgetNotFound(b)) => a == b,
            (
                Self::ConversionFailure {
                    budget_id: a_budget,
                    transaction_id: a_tx,
                    ..
                },
                Self::ConversionFailure {
                    budget_id: b_budget,
                    transaction_id: b_tx,
                    ..
                },
            ) => a_budget == b_budget && a_tx == b_tx,
            (Self::RefreshFailure(a), Self::RefreshFailure(b)) => a == b,
            (Self::InvalidName(a), Self::InvalidName(b)) => a == b,
            (Self::InvalidCurrency(a), Self::InvalidCurrency(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidDateRange(a), Self::InvalidDateRange(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
