//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the engine enforces consistent invariants.

use std::{collections::BTreeSet, future::Future, str::FromStr, time::Duration};

use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::DbErr;

use crate::{CurrencyCode, EngineError, ResultEngine};

/// Fractional digits kept on a persisted collected amount.
pub(crate) const COLLECTED_SCALE: u32 = 2;

fn corrupt(column: &str, value: &str) -> EngineError {
    EngineError::Database(DbErr::Custom(format!(
        "invalid value in column {column}: {value:?}"
    )))
}

/// Parse a decimal stored as text.
pub(crate) fn model_decimal(value: &str, column: &str) -> ResultEngine<Decimal> {
    Decimal::from_str(value.trim()).map_err(|_| corrupt(column, value))
}

/// Parse a currency code stored in the DB into a strongly typed `CurrencyCode`.
pub(crate) fn model_currency(value: &str, column: &str) -> ResultEngine<CurrencyCode> {
    CurrencyCode::try_from(value).map_err(|_| corrupt(column, value))
}

/// Canonical text form of a decimal for storage.
pub(crate) fn stored_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Rounds to cents and always carries two fractional digits (`12` becomes `12.00`).
pub(crate) fn round_collected(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(COLLECTED_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(COLLECTED_SCALE);
    rounded
}

/// Category sets are stored as a comma separated id list (`"5,7,12"`).
pub(crate) fn encode_category_ids(ids: &BTreeSet<i64>) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn decode_category_ids(value: &str) -> ResultEngine<BTreeSet<i64>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<i64>()
                .map_err(|_| corrupt("category_ids", value))
        })
        .collect()
}

pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidName(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Await `fut`, failing with a database timeout once `limit` elapses.
pub(crate) async fn within<T>(
    limit: Option<Duration>,
    what: &str,
    fut: impl Future<Output = ResultEngine<T>>,
) -> ResultEngine<T> {
    let Some(limit) = limit else {
        return fut.await;
    };
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Database(DbErr::Custom(format!(
            "{what} timed out after {}s",
            limit.as_secs_f64()
        )))),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn category_ids_round_trip_through_text() {
        let ids: BTreeSet<i64> = [12, 5, 7].into_iter().collect();
        let encoded = encode_category_ids(&ids);
        assert_eq!(encoded, "5,7,12");
        assert_eq!(decode_category_ids(&encoded).unwrap(), ids);
    }

    #[test]
    fn empty_category_text_is_empty_set() {
        assert!(decode_category_ids("").unwrap().is_empty());
        assert!(decode_category_ids(" , ").unwrap().is_empty());
    }

    #[test]
    fn corrupted_category_text_is_reported() {
        assert!(matches!(
            decode_category_ids("5,abc"),
            Err(EngineError::Database(_))
        ));
    }

    #[test]
    fn collected_amount_rounds_half_away_from_zero() {
        assert_eq!(round_collected(dec!(108.695652)), dec!(108.70));
        assert_eq!(round_collected(dec!(0.005)), dec!(0.01));
        assert_eq!(round_collected(dec!(-0.005)), dec!(-0.01));
        assert_eq!(round_collected(dec!(12)).to_string(), "12.00");
    }

    #[tokio::test(start_paused = true)]
    async fn within_times_out_slow_calls() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, EngineError>(1)
        };
        let result = within(Some(Duration::from_secs(1)), "slow call", slow).await;
        assert!(matches!(result, Err(EngineError::Database(_))));
    }
}
