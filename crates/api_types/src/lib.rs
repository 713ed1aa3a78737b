use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod user {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserView {
        pub username: String,
        pub base_currency: String,
    }
}

pub mod budget {
    use super::*;

    /// Request body for creating or replacing a budget.
    ///
    /// `period` is matched case-insensitively; the currency is a 3-letter code.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetNew {
        pub name: String,
        pub currency: String,
        /// Decimal, serialized as a string in JSON.
        pub target_amount: Decimal,
        pub period: String,
        #[serde(default)]
        pub repeat: bool,
        pub start_date: NaiveDate,
        /// Inclusive.
        pub end_date: NaiveDate,
        #[serde(default)]
        pub categories: Vec<i64>,
        pub comment: Option<String>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct BudgetList {
        #[serde(default)]
        pub include_archived: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetView {
        pub id: i64,
        pub name: String,
        pub currency: String,
        pub target_amount: Decimal,
        pub collected_amount: Decimal,
        /// Lower case.
        pub period: String,
        pub repeat: bool,
        pub start_date: NaiveDate,
        /// Inclusive.
        pub end_date: NaiveDate,
        pub categories: Vec<i64>,
        pub comment: Option<String>,
        pub archived: bool,
        pub updated_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetListResponse {
        pub budgets: Vec<BudgetView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RecomputeAllResponse {
        /// Budgets whose collected amount could not be refreshed.
        pub failed: Vec<i64>,
    }
}

pub mod rates {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ConvertQuery {
        pub date: NaiveDate,
        pub amount: Decimal,
        pub from: String,
        pub to: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ConvertResponse {
        pub date: NaiveDate,
        pub from: String,
        pub to: String,
        pub amount: Decimal,
        pub converted: Decimal,
    }
}
