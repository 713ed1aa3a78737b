//! Ledger transactions, read-only to the budget engine.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, util::model_decimal};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(EngineError::Database(DbErr::Custom(format!(
                "invalid transaction kind: {other}"
            )))),
        }
    }
}

/// An expense that can count towards a budget.
///
/// The amount is expressed in the currency of `account_id`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpenseTransaction {
    pub id: i64,
    pub account_id: i64,
    pub amount: Decimal,
    pub occurred_on: NaiveDate,
    pub category_id: Option<i64>,
    /// Amount already converted into the owner's base currency, when known.
    pub base_amount: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub owner: String,
    pub account_id: i64,
    pub kind: String,
    pub is_transfer: bool,
    pub amount: String,
    pub base_amount: Option<String>,
    pub occurred_on: Date,
    pub category_id: Option<i64>,
    pub note: Option<String>,
    pub deleted: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Account,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for ExpenseTransaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let kind = TransactionKind::try_from(model.kind.as_str())?;
        if kind != TransactionKind::Expense || model.is_transfer {
            return Err(EngineError::Database(DbErr::Custom(format!(
                "transaction {} is not an expense",
                model.id
            ))));
        }
        Ok(Self {
            id: model.id,
            account_id: model.account_id,
            amount: model_decimal(&model.amount, "amount")?,
            occurred_on: model.occurred_on,
            category_id: model.category_id,
            base_amount: model
                .base_amount
                .as_deref()
                .map(|value| model_decimal(value, "base_amount"))
                .transpose()?,
        })
    }
}
