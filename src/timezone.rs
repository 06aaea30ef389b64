//! Conversions between instants and the wall-clock time of the user's time zone.

use std::fmt::Debug;

use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use time_tz::{Offset, TimeZone, Tz, timezones};

use crate::{Error, Timestamp};

/// The user's calendar: a canonical IANA time zone.
///
/// Recurring rules advance by calendar days and months, which only makes
/// sense relative to the local date and time of day.
#[derive(Clone)]
pub struct Calendar {
    name: String,
    timezone: &'static Tz,
}

impl Calendar {
    /// Create a calendar for `canonical_timezone`, e.g. "Pacific/Auckland".
    ///
    /// # Errors
    /// Returns [Error::InvalidTimezoneError] if the name is not a known time zone.
    pub fn new(canonical_timezone: &str) -> Result<Self, Error> {
        timezones::get_by_name(canonical_timezone)
            .map(|timezone| Self {
                name: canonical_timezone.to_owned(),
                timezone,
            })
            .ok_or_else(|| Error::InvalidTimezoneError(canonical_timezone.to_owned()))
    }

    /// The canonical name of the time zone.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn offset_at(&self, date_time: &OffsetDateTime) -> UtcOffset {
        self.timezone.get_offset_utc(date_time).to_utc()
    }

    /// The local date and time of `timestamp`.
    ///
    /// # Errors
    /// Returns [Error::DateOutOfRange] if the timestamp cannot be represented.
    pub fn to_local(&self, timestamp: Timestamp) -> Result<OffsetDateTime, Error> {
        let utc = timestamp.to_offset_date_time()?;
        let offset = self.offset_at(&utc);

        Ok(utc.to_offset(offset))
    }

    /// The instant at which the local clock reads `wall_clock`.
    ///
    /// Wall-clock times skipped by a daylight saving jump resolve to the
    /// same wall-clock time pushed forward by the length of the jump, so
    /// 02:30 on a night that skips from 02:00 to 03:00 becomes 03:30.
    /// Times that occur twice when the clocks go back resolve to the
    /// earlier of the two instants.
    pub fn from_local(&self, wall_clock: PrimitiveDateTime) -> Timestamp {
        let guess = wall_clock.assume_utc();
        // A day either side of the guess is outside any single transition.
        let offset_before = self.offset_at(&guess.checked_sub(Duration::DAY).unwrap_or(guess));
        let offset_after = self.offset_at(&guess.checked_add(Duration::DAY).unwrap_or(guess));

        let before = wall_clock.assume_offset(offset_before);
        if self.offset_at(&before) == offset_before {
            return Timestamp::from(before);
        }

        let after = wall_clock.assume_offset(offset_after);
        if self.offset_at(&after) == offset_after {
            return Timestamp::from(after);
        }

        // Skipped: read with the old offset, the wall-clock time lands past the jump.
        Timestamp::from(before)
    }

    /// The local year and month that `timestamp` falls in.
    ///
    /// # Errors
    /// Returns [Error::DateOutOfRange] if the timestamp cannot be represented.
    pub fn month_of(&self, timestamp: Timestamp) -> Result<(i32, Month), Error> {
        let local = self.to_local(timestamp)?;

        Ok((local.year(), local.month()))
    }

    /// The instant of local midnight on the first day of `month`.
    ///
    /// # Errors
    /// Returns [Error::DateOutOfRange] if the year cannot be represented.
    pub fn month_start(&self, year: i32, month: Month) -> Result<Timestamp, Error> {
        let first_day =
            Date::from_calendar_date(year, month, 1).map_err(|_| Error::DateOutOfRange)?;

        Ok(self.from_local(PrimitiveDateTime::new(first_day, Time::MIDNIGHT)))
    }
}

impl Debug for Calendar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Calendar").field("name", &self.name).finish()
    }
}
