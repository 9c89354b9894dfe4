//! Date arithmetic for the scheduling service.
//!
//! All calendar dates and times of day are local to the configured zone;
//! everything stored or compared is a UTC instant.

use chrono::{Datelike, DateTime, Days, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{ApiError, ApiResult};

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::validation(format!("'{}' is not a YYYY-MM-DD date", s)))
}

/// Parse a time of day, `HH:MM` or `HH:MM:SS` with optional fraction.
pub fn parse_time_of_day(s: &str) -> ApiResult<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| ApiError::validation(format!("'{}' is not a HH:MM time", s)))
}

/// Parse a `YYYY-MM` month into its first day.
pub fn parse_month(s: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d")
        .map_err(|_| ApiError::validation(format!("'{}' is not a YYYY-MM month", s)))
}

/// Combine a local date and time of day into an instant.
///
/// Ambiguous local times (clocks turned back) resolve to the earlier
/// instant; times skipped by a DST jump are rejected.
pub fn local_instant(date: NaiveDate, time: NaiveTime, tz: Tz) -> ApiResult<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            ApiError::validation(format!("{} {} does not exist in {}", date, time, tz))
        })
}

/// Local midnight at the start of `date`.
fn start_of_day(date: NaiveDate, tz: Tz) -> ApiResult<DateTime<Utc>> {
    match local_instant(date, NaiveTime::MIN, tz) {
        Ok(instant) => Ok(instant),
        // A few zones skip midnight itself; the day then starts an hour later.
        Err(_) => local_instant(date, NaiveTime::MIN + Duration::hours(1), tz),
    }
}

/// Half-open window `[first day of month, first day of next month)`.
pub fn month_window(month: NaiveDate, tz: Tz) -> ApiResult<(DateTime<Utc>, DateTime<Utc>)> {
    let first = month
        .with_day0(0)
        .ok_or_else(|| ApiError::validation("invalid month"))?;
    let next = first
        .checked_add_months(Months::new(1))
        .ok_or_else(|| ApiError::validation("month out of range"))?;

    Ok((start_of_day(first, tz)?, start_of_day(next, tz)?))
}

/// Closed window covering `date`, from local midnight to the last
/// millisecond before the next midnight.
pub fn day_bounds(date: NaiveDate, tz: Tz) -> ApiResult<(DateTime<Utc>, DateTime<Utc>)> {
    let next = date
        .checked_add_days(Days::new(1))
        .ok_or_else(|| ApiError::validation("date out of range"))?;

    Ok((
        start_of_day(date, tz)?,
        start_of_day(next, tz)? - Duration::milliseconds(1),
    ))
}

/// A time interval, start inclusive and end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whether placing `self` would double-book over `existing`.
    ///
    /// True when `self` starts inside `existing`, ends inside it, or fully
    /// contains it. Touching endpoints do not collide.
    pub fn collides_with(&self, existing: &TimeRange) -> bool {
        let starts_inside = existing.start <= self.start && self.start < existing.end;
        let ends_inside = existing.start < self.end && self.end <= existing.end;
        let contains = self.start <= existing.start && existing.end <= self.end;

        starts_inside || ends_inside || contains
    }

    /// Move the range onto `date`, keeping each bound's local time of day.
    ///
    /// A range that ends on a later local day than it starts keeps that
    /// day offset.
    pub fn moved_to(&self, date: NaiveDate, tz: Tz) -> ApiResult<TimeRange> {
        let local_start = self.start.with_timezone(&tz);
        let local_end = self.end.with_timezone(&tz);
        let day_offset = (local_end.date_naive() - local_start.date_naive()).num_days();

        let end_date = date
            .checked_add_signed(Duration::days(day_offset))
            .ok_or_else(|| ApiError::validation("date out of range"))?;

        Ok(TimeRange {
            start: local_instant(date, local_start.time(), tz)?,
            end: local_instant(end_date, local_end.time(), tz)?,
        })
    }
}
