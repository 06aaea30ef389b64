use std::{fmt::Display, str::FromStr};

use rusqlite::types::{ToSql, ToSqlOutput};
use serde::{Deserialize, Serialize};
use time::Time;

use crate::{
    CurrencyCode, Error, RecurringRuleId, Timestamp, category::CategoryName,
    transaction::TransactionKind,
};

/// How often a recurring rule produces a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Every seven calendar days at the same local time of day.
    Weekly,
    /// A calendar month of variable length.
    ///
    /// Days that do not exist in the next month are clamped to its last day.
    Monthly,
}

impl Frequency {
    /// The name used for this frequency in the database and in JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            other => Err(Error::InvalidFrequency(other.to_owned())),
        }
    }
}

impl Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ToSql for Frequency {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// Everything about a recurring rule except its identity and schedule position.
///
/// Each generated transaction copies these fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringRuleDetails {
    /// The amount of every occurrence, always positive.
    pub amount: f64,
    /// Whether each occurrence is income or an expense.
    pub kind: TransactionKind,
    /// The category name, which may refer to a category that no longer exists.
    pub category: CategoryName,
    /// How far apart occurrences are.
    pub frequency: Frequency,
    /// Copied onto each occurrence after [crate::RECURRING_NOTE_PREFIX].
    pub note: Option<String>,
    /// The currency of `amount`.
    pub currency: CurrencyCode,
}

/// A transaction (income or expense) that repeats on a regular basis (e.g., wages, phone bill).
///
/// New instances should be created through [crate::create_recurring_rule].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringRule {
    /// The ID of the rule.
    pub id: RecurringRuleId,
    /// The date of the next occurrence that has not been materialized yet.
    ///
    /// This only ever moves forwards.
    pub next_due_date: Timestamp,
    /// The local wall-clock time every occurrence is meant to happen at.
    ///
    /// Kept apart from `next_due_date` because a due date that landed in a
    /// daylight saving gap was moved off this time, and later occurrences
    /// must return to it.
    #[serde(with = "time_of_day_format")]
    pub time_of_day: Time,
    /// What each occurrence looks like.
    #[serde(flatten)]
    pub details: RecurringRuleDetails,
}

/// Serializes a [Time] as "HH:MM:SS" with fractional seconds only when present.
mod time_of_day_format {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _, ser::Error as _};
    use time::{Time, macros::format_description};

    pub fn serialize<S: Serializer>(time: &Time, serializer: S) -> Result<S::Ok, S::Error> {
        let formatted = if time.nanosecond() == 0 {
            time.format(format_description!("[hour]:[minute]:[second]"))
        } else {
            time.format(format_description!("[hour]:[minute]:[second].[subsecond]"))
        }
        .map_err(S::Error::custom)?;

        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Time, D::Error> {
        let raw = String::deserialize(deserializer)?;

        Time::parse(
            &raw,
            format_description!("[hour]:[minute]:[second][optional [.[subsecond]]]"),
        )
        .map_err(D::Error::custom)
    }
}
