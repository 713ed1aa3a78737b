//! Budgets: a target amount in one currency, tracked against the owner's
//! expense transactions in a set of categories over a date window.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveValue, entity::prelude::*};

use crate::{
    BudgetWindow, CurrencyCode, EngineError, PeriodKind, ResultEngine,
    util::{
        decode_category_ids, encode_category_ids, model_currency, model_decimal,
        normalize_optional_text, normalize_required_name, round_collected, stored_decimal,
    },
};

const COPY_SUFFIX: &str = " (copy)";

/// A persisted budget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Budget {
    pub id: i64,
    pub owner: String,
    pub name: String,
    pub currency: CurrencyCode,
    pub target_amount: Decimal,
    /// Derived from matching transactions; rewritten by every recomputation.
    pub collected_amount: Decimal,
    pub period: PeriodKind,
    pub repeat: bool,
    pub window: BudgetWindow,
    pub categories: BTreeSet<i64>,
    pub comment: Option<String>,
    pub archived: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Budget {
    /// The budget that takes over once this recurring budget is outdated.
    pub fn successor(&self) -> ResultEngine<NewBudget> {
        self.period.ensure_renewable(self.repeat)?;
        Ok(NewBudget {
            owner: self.owner.clone(),
            name: format!("{}{COPY_SUFFIX}", self.name),
            currency: self.currency,
            target_amount: self.target_amount,
            period: self.period,
            repeat: self.repeat,
            window: self.window.next(self.period)?,
            categories: self.categories.clone(),
            comment: self.comment.clone(),
        })
    }
}

/// User input for creating or editing a budget.
///
/// `end_date` is inclusive, the way users think about it.
#[derive(Clone, Debug)]
pub struct BudgetDraft {
    pub name: String,
    pub currency: String,
    pub target_amount: Decimal,
    pub period: String,
    pub repeat: bool,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub categories: Vec<i64>,
    pub comment: Option<String>,
}

impl BudgetDraft {
    /// Validates the draft. Category ids are taken as given; ownership is
    /// checked separately.
    pub fn validate(&self, owner: &str) -> ResultEngine<NewBudget> {
        let period = PeriodKind::parse(&self.period)?;
        period.ensure_renewable(self.repeat)?;
        let name = normalize_required_name(&self.name, "budget")?;
        let currency = CurrencyCode::try_from(self.currency.as_str())?;
        if self.target_amount <= Decimal::ZERO {
            return Err(EngineError::InvalidAmount(
                "target amount must be > 0".to_string(),
            ));
        }
        let window = BudgetWindow::from_inclusive(self.start_date, self.end_date)?;

        Ok(NewBudget {
            owner: owner.to_string(),
            name,
            currency,
            target_amount: self.target_amount,
            period,
            repeat: self.repeat,
            window,
            categories: self.categories.iter().copied().collect(),
            comment: normalize_optional_text(self.comment.as_deref()),
        })
    }
}

/// A validated budget that has not been stored yet.
///
/// It is always stored with a zero collected amount.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewBudget {
    pub owner: String,
    pub name: String,
    pub currency: CurrencyCode,
    pub target_amount: Decimal,
    pub period: PeriodKind,
    pub repeat: bool,
    pub window: BudgetWindow,
    pub categories: BTreeSet<i64>,
    pub comment: Option<String>,
}

/// Filters for listing a user's budgets. Deleted budgets are never listed.
#[derive(Clone, Copy, Debug, Default)]
pub struct BudgetListFilter {
    pub include_archived: bool,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub owner: String,
    pub name: String,
    pub currency: String,
    pub target_amount: String,
    pub collected_amount: String,
    pub period: String,
    pub repeat: bool,
    pub start_on: Date,
    /// Exclusive.
    pub end_on: Date,
    pub category_ids: String,
    pub comment: Option<String>,
    pub archived: bool,
    pub deleted: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::Owner",
        to = "super::users::Column::Username",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl NewBudget {
    /// Active model carrying every user-editable column plus a zeroed
    /// collected amount.
    pub(crate) fn active_model(&self, now: DateTime<Utc>) -> ActiveModel {
        ActiveModel {
            id: ActiveValue::NotSet,
            owner: ActiveValue::Set(self.owner.clone()),
            name: ActiveValue::Set(self.name.clone()),
            currency: ActiveValue::Set(self.currency.code().to_string()),
            target_amount: ActiveValue::Set(stored_decimal(self.target_amount)),
            collected_amount: ActiveValue::Set(stored_decimal(Decimal::ZERO)),
            period: ActiveValue::Set(self.period.as_stored().to_string()),
            repeat: ActiveValue::Set(self.repeat),
            start_on: ActiveValue::Set(self.window.start),
            end_on: ActiveValue::Set(self.window.end),
            category_ids: ActiveValue::Set(encode_category_ids(&self.categories)),
            comment: ActiveValue::Set(self.comment.clone()),
            archived: ActiveValue::Set(false),
            deleted: ActiveValue::Set(false),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        }
    }
}

impl TryFrom<Model> for Budget {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let period = PeriodKind::parse(&model.period).map_err(|_| {
            EngineError::Database(DbErr::Custom(format!(
                "invalid period in budget {}: {}",
                model.id, model.period
            )))
        })?;
        Ok(Self {
            id: model.id,
            currency: model_currency(&model.currency, "currency")?,
            target_amount: model_decimal(&model.target_amount, "target_amount")?,
            collected_amount: round_collected(model_decimal(
                &model.collected_amount,
                "collected_amount",
            )?),
            period,
            repeat: model.repeat,
            window: BudgetWindow {
                start: model.start_on,
                end: model.end_on,
            },
            categories: decode_category_ids(&model.category_ids)?,
            owner: model.owner,
            name: model.name,
            comment: model.comment,
            archived: model.archived,
            deleted: model.deleted,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
