//! Budget period arithmetic.
//!
//! Budgets are stored with a half-open window `[start, end)`: the end date a
//! user types in is inclusive and gets stored one day later, then decoded back
//! when the budget is rendered.

use std::str::FromStr;

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Custom,
}

impl PeriodKind {
    /// Values accepted by [`PeriodKind::parse`], in their API spelling.
    pub const ACCEPTED: [&'static str; 5] = ["daily", "weekly", "monthly", "yearly", "custom"];

    /// Parses a period case-insensitively.
    pub fn parse(value: &str) -> ResultEngine<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            "custom" => Ok(Self::Custom),
            _ => Err(EngineError::InvalidPeriod {
                value: value.to_string(),
                accepted: Self::ACCEPTED.to_vec(),
            }),
        }
    }

    /// Storage spelling (upper case).
    pub fn as_stored(self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
            Self::Custom => "CUSTOM",
        }
    }

    /// API spelling (lower case).
    pub fn as_api(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Custom => "custom",
        }
    }

    /// Whether a budget of this kind may auto-renew.
    pub fn can_repeat(self) -> bool {
        !matches!(self, Self::Custom)
    }

    /// Rejects `repeat` on periods without a defined length.
    pub fn ensure_renewable(self, repeat: bool) -> ResultEngine<()> {
        if repeat && !self.can_repeat() {
            return Err(EngineError::InvalidPeriodForRenewal(
                self.as_api().to_string(),
            ));
        }
        Ok(())
    }

    fn advance(self, from: NaiveDate) -> ResultEngine<NaiveDate> {
        let next = match self {
            Self::Daily => from.checked_add_days(Days::new(1)),
            Self::Weekly => from.checked_add_days(Days::new(7)),
            Self::Monthly => from.checked_add_months(Months::new(1)),
            Self::Yearly => from.checked_add_months(Months::new(12)),
            Self::Custom => {
                return Err(EngineError::InvalidPeriodForRenewal(
                    self.as_api().to_string(),
                ));
            }
        };
        next.ok_or_else(|| EngineError::InvalidDateRange(format!("no period after {from}")))
    }
}

impl FromStr for PeriodKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl core::fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_api())
    }
}

/// Stored form of a user-facing inclusive end date.
pub fn encode_end_date(inclusive_end: NaiveDate) -> ResultEngine<NaiveDate> {
    inclusive_end
        .succ_opt()
        .ok_or_else(|| EngineError::InvalidDateRange(format!("end date {inclusive_end} too far")))
}

/// User-facing inclusive end date of a stored exclusive end.
pub fn decode_end_date(exclusive_end: NaiveDate) -> NaiveDate {
    exclusive_end.pred_opt().unwrap_or(exclusive_end)
}

/// Half-open date window `[start, end)` covered by a budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BudgetWindow {
    pub start: NaiveDate,
    /// Exclusive upper bound.
    pub end: NaiveDate,
}

impl BudgetWindow {
    /// Builds a window from user input, where `inclusive_end` is the last day
    /// that still belongs to the budget.
    pub fn from_inclusive(start: NaiveDate, inclusive_end: NaiveDate) -> ResultEngine<Self> {
        if inclusive_end < start {
            return Err(EngineError::InvalidDateRange(format!(
                "end date {inclusive_end} is before start date {start}"
            )));
        }
        Ok(Self {
            start,
            end: encode_end_date(inclusive_end)?,
        })
    }

    pub fn inclusive_end(&self) -> NaiveDate {
        decode_end_date(self.end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// Whether the window is over on `today`.
    pub fn is_outdated(&self, today: NaiveDate) -> bool {
        self.end <= today
    }

    /// The window that follows this one for a recurring budget: `[end, end + Δ)`.
    pub fn next(&self, kind: PeriodKind) -> ResultEngine<Self> {
        Ok(Self {
            start: self.end,
            end: kind.advance(self.end)?,
        })
    }
}
