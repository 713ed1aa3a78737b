use api_types::rates::{ConvertQuery, ConvertResponse};
use axum::{
    Json,
    extract::{Query, State},
};
use engine::{CurrencyCode, EngineError};

use crate::{ServerError, server::ServerState};

pub async fn convert(
    State(state): State<ServerState>,
    Query(query): Query<ConvertQuery>,
) -> Result<Json<ConvertResponse>, ServerError> {
    let from = CurrencyCode::try_from(query.from.as_str())?;
    let to = CurrencyCode::try_from(query.to.as_str())?;
    let converted = state
        .engine
        .convert(query.date, query.amount, from, to)
        .await
        .map_err(|err| match err {
            // not tied to a budget, the client may see the missing rate
            EngineError::RateNotFoundForDate(_) | EngineError::RateNotFoundForCurrency { .. } => {
                ServerError::Generic(err.to_string())
            }
            other => ServerError::Engine(other),
        })?;
    Ok(Json(ConvertResponse {
        date: query.date,
        from: from.to_string(),
        to: to.to_string(),
        amount: query.amount,
        converted,
    }))
}
