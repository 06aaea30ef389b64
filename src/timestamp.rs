//! An instant in time stored as milliseconds since the Unix epoch.

use std::fmt::Display;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::Error;

const NANOS_PER_MILLI: i128 = 1_000_000;

/// An instant in time with millisecond precision.
///
/// Transaction dates and rule due dates are persisted in this form, which is
/// also how they appear in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create a timestamp from milliseconds since the Unix epoch.
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// The number of milliseconds since the Unix epoch.
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// The current instant, truncated to whole milliseconds.
    pub fn now() -> Self {
        Self::from(OffsetDateTime::now_utc())
    }

    /// Convert to a UTC date-time.
    ///
    /// # Errors
    /// Returns [Error::DateOutOfRange] if the timestamp lies outside the years
    /// the `time` crate can represent.
    pub fn to_offset_date_time(self) -> Result<OffsetDateTime, Error> {
        OffsetDateTime::from_unix_timestamp_nanos(self.0 as i128 * NANOS_PER_MILLI)
            .map_err(|_| Error::DateOutOfRange)
    }
}

impl From<OffsetDateTime> for Timestamp {
    fn from(date_time: OffsetDateTime) -> Self {
        Self((date_time.unix_timestamp_nanos() / NANOS_PER_MILLI) as i64)
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self
            .to_offset_date_time()
            .ok()
            .and_then(|date_time| date_time.format(&Rfc3339).ok())
        {
            Some(formatted) => write!(f, "{formatted}"),
            None => write!(f, "{}ms", self.0),
        }
    }
}

impl ToSql for Timestamp {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for Timestamp {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Timestamp)
    }
}
