use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{ServerState, router, run, run_with_listener, spawn_with_listener};

mod budgets;
mod rates;
mod server;
mod user;

pub mod types {
    pub mod budget {
        pub use api_types::budget::{
            BudgetList, BudgetListResponse, BudgetNew, BudgetView, RecomputeAllResponse,
        };
        pub use engine::Budget;
    }

    pub mod rates {
        pub use api_types::rates::{ConvertQuery, ConvertResponse};
    }

    pub mod user {
        pub use api_types::user::UserView;
    }
}

/// Message shown to clients when a budget cannot be recomputed.
const REFRESH_FAILED: &str = "unable to refresh budget";

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::BudgetNotFound(_) | EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidPeriod { .. }
        | EngineError::InvalidPeriodForRenewal(_)
        | EngineError::InvalidCurrency(_)
        | EngineError::InvalidAmount(_)
        | EngineError::InvalidName(_)
        | EngineError::InvalidDateRange(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::RateNotFoundForDate(_)
        | EngineError::RateNotFoundForCurrency { .. }
        | EngineError::ConversionFailure { .. }
        | EngineError::RefreshFailure(_)
        | EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        err if err.is_refresh_failure() => {
            tracing::error!("{REFRESH_FAILED}: {err}");
            REFRESH_FAILED.to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), message_for_engine_error(err)),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}
