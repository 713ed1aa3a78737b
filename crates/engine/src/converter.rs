use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{CurrencyCode, EngineError, ExchangeRateCache, ResultEngine};

/// Converts amounts between currencies using the rates published for a day.
#[derive(Debug, Clone)]
pub struct CurrencyConverter {
    cache: Arc<ExchangeRateCache>,
}

impl CurrencyConverter {
    pub fn new(cache: Arc<ExchangeRateCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<ExchangeRateCache> {
        &self.cache
    }

    /// Cross rate `rate[from] / rate[to]` on `date`.
    ///
    /// Reads the cache as it is; call [`CurrencyConverter::convert`] to make
    /// sure the rates are loaded first.
    pub fn rate_between(
        &self,
        date: NaiveDate,
        from: CurrencyCode,
        to: CurrencyCode,
    ) -> ResultEngine<Decimal> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        let rates = self.cache.get_rates(date)?;
        let lookup = |currency: CurrencyCode| {
            rates
                .get(&currency)
                .copied()
                .ok_or(EngineError::RateNotFoundForCurrency { date, currency })
        };
        let from_rate = lookup(from)?;
        let to_rate = lookup(to)?;
        from_rate
            .checked_div(to_rate)
            .ok_or(EngineError::RateNotFoundForCurrency { date, currency: to })
    }

    /// Converts `amount` expressed in `from` into `to` as of `date`.
    pub async fn convert(
        &self,
        date: NaiveDate,
        amount: Decimal,
        from: CurrencyCode,
        to: CurrencyCode,
    ) -> ResultEngine<Decimal> {
        if from == to {
            return Ok(amount);
        }
        self.cache.ensure_fresh().await?;
        let rate = self.rate_between(date, from, to)?;
        amount
            .checked_div(rate)
            .ok_or(EngineError::RateNotFoundForCurrency { date, currency: from })
    }
}
