//! Daily exchange-rate snapshots.
//!
//! A snapshot is published upstream once per `(date, base, source)` and is
//! never mutated afterwards. Rates are "units of currency per unit of base".

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;

use crate::{CurrencyCode, EngineError, util::model_currency};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangeRateSnapshot {
    pub id: i64,
    pub effective_on: NaiveDate,
    pub base: CurrencyCode,
    pub rates: BTreeMap<CurrencyCode, Decimal>,
    /// Upstream service that produced the snapshot.
    pub source: String,
    pub deleted: bool,
}

impl ExchangeRateSnapshot {
    /// Rates usable for cross conversion on this snapshot's date.
    ///
    /// The base currency is implied at `1` when the upstream table omits it,
    /// and non-positive rates are dropped.
    pub fn usable_rates(&self) -> BTreeMap<CurrencyCode, Decimal> {
        let mut rates: BTreeMap<CurrencyCode, Decimal> = self
            .rates
            .iter()
            .filter(|(code, rate)| {
                let usable = rate.is_sign_positive() && !rate.is_zero();
                if !usable {
                    tracing::warn!(
                        "snapshot {} ({}) has unusable rate {rate} for {code}",
                        self.id,
                        self.effective_on
                    );
                }
                usable
            })
            .map(|(code, rate)| (*code, *rate))
            .collect();
        rates.entry(self.base).or_insert(Decimal::ONE);
        rates
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "exchange_rate_snapshots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub effective_on: Date,
    pub base_currency: String,
    /// JSON object mapping currency code to a decimal string.
    pub rates: String,
    pub source: String,
    pub deleted: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for ExchangeRateSnapshot {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let raw: BTreeMap<String, Decimal> = serde_json::from_str(&model.rates).map_err(|err| {
            EngineError::Database(DbErr::Custom(format!(
                "invalid rates in snapshot {}: {err}",
                model.id
            )))
        })?;
        let rates = raw
            .into_iter()
            .filter_map(|(code, rate)| match CurrencyCode::try_from(code.as_str()) {
                Ok(currency) => Some((currency, rate)),
                Err(_) => {
                    tracing::warn!(
                        "snapshot {} ({}) skips invalid currency code {code:?}",
                        model.id,
                        model.effective_on
                    );
                    None
                }
            })
            .collect();

        Ok(Self {
            id: model.id,
            effective_on: model.effective_on,
            base: model_currency(&model.base_currency, "base_currency")?,
            rates,
            source: model.source,
            deleted: model.deleted,
        })
    }
}
