//! Cron expressions
//!
//! Standard five-field expressions (minute, hour, day of month, month, day of
//! week) plus the `@hourly`-style macros. Evaluation is minute-granular and
//! works on naive local timestamps.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MONTH_NAMES: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAY_NAMES: &[&str] = &["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// How far ahead `next_from` searches before giving up on an expression
/// that can never fire (e.g. `0 0 30 2 *`).
const SEARCH_HORIZON_DAYS: i64 = 366 * 10;

/// Errors produced while parsing a cron expression
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronParseError {
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),

    #[error("unsupported macro '{0}'")]
    UnknownMacro(String),

    #[error("invalid {field} value '{value}'")]
    InvalidValue { field: &'static str, value: String },

    #[error("{field} value {value} out of range {min}-{max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("invalid step in '{0}'")]
    InvalidStep(String),
}

/// One field of a cron expression, stored as a bit set of allowed values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CronField {
    bits: u64,
    /// False when the field was written starting with `*`
    restricted: bool,
}

impl CronField {
    fn parse(
        text: &str,
        field: &'static str,
        min: u32,
        max: u32,
        names: &[&str],
    ) -> Result<Self, CronParseError> {
        let mut bits = 0u64;

        for item in text.split(',') {
            let (range, step) = match item.split_once('/') {
                Some((range, step)) => {
                    let step: u32 = step
                        .parse()
                        .map_err(|_| CronParseError::InvalidStep(item.to_string()))?;
                    if step == 0 {
                        return Err(CronParseError::InvalidStep(item.to_string()));
                    }
                    (range, Some(step))
                }
                None => (item, None),
            };

            let (start, end) = if range == "*" {
                (min, max)
            } else if let Some((lo, hi)) = range.split_once('-') {
                (
                    parse_value(lo, field, min, max, names)?,
                    parse_value(hi, field, min, max, names)?,
                )
            } else {
                let value = parse_value(range, field, min, max, names)?;
                // `5/15` means "from 5 to the end, every 15"
                match step {
                    Some(_) => (value, max),
                    None => (value, value),
                }
            };

            if start > end {
                return Err(CronParseError::InvalidValue {
                    field,
                    value: item.to_string(),
                });
            }

            let step = step.unwrap_or(1);
            let mut value = start;
            while value <= end {
                bits |= 1 << value;
                match value.checked_add(step) {
                    Some(next) => value = next,
                    None => break,
                }
            }
        }

        Ok(Self {
            bits,
            restricted: !text.starts_with('*'),
        })
    }

    /// Returns true if `value` is allowed by this field
    pub fn contains(&self, value: u32) -> bool {
        value < 64 && self.bits & (1 << value) != 0
    }

    /// Returns true unless the field was written as a wildcard
    pub fn is_restricted(&self) -> bool {
        self.restricted
    }
}

fn parse_value(
    raw: &str,
    field: &'static str,
    min: u32,
    max: u32,
    names: &[&str],
) -> Result<u32, CronParseError> {
    let lower = raw.to_ascii_lowercase();
    if let Some(idx) = names.iter().position(|name| *name == lower) {
        return Ok(min + idx as u32);
    }

    let value: u32 = raw.parse().map_err(|_| CronParseError::InvalidValue {
        field,
        value: raw.to_string(),
    })?;

    if value < min || value > max {
        return Err(CronParseError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }

    Ok(value)
}

/// A parsed cron expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    source: String,
    minutes: CronField,
    hours: CronField,
    days_of_month: CronField,
    months: CronField,
    days_of_week: CronField,
}

impl CronExpr {
    /// Parses an expression such as `*/15 9-17 * * mon-fri` or `@daily`
    pub fn parse(source: &str) -> Result<Self, CronParseError> {
        let trimmed = source.trim();
        let expanded = if trimmed.starts_with('@') {
            expand_macro(trimmed)?
        } else {
            trimmed
        };

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronParseError::FieldCount(fields.len()));
        }

        let mut days_of_week = CronField::parse(fields[4], "day of week", 0, 7, WEEKDAY_NAMES)?;
        // 7 is an alias for Sunday
        if days_of_week.contains(7) {
            days_of_week.bits = (days_of_week.bits & !(1 << 7)) | 1;
        }

        Ok(Self {
            source: trimmed.to_string(),
            minutes: CronField::parse(fields[0], "minute", 0, 59, &[])?,
            hours: CronField::parse(fields[1], "hour", 0, 23, &[])?,
            days_of_month: CronField::parse(fields[2], "day of month", 1, 31, &[])?,
            months: CronField::parse(fields[3], "month", 1, 12, MONTH_NAMES)?,
            days_of_week,
        })
    }

    /// The expression as written
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true if the minute containing `at` satisfies the expression
    pub fn matches(&self, at: NaiveDateTime) -> bool {
        self.months.contains(at.month())
            && self.day_matches(at.date())
            && self.hours.contains(at.hour())
            && self.minutes.contains(at.minute())
    }

    /// Earliest minute-aligned instant `>= from` that satisfies the expression.
    ///
    /// `from` itself is returned when it is minute-aligned and matches.
    /// Returns `None` if nothing matches within the search horizon.
    pub fn next_from(&self, from: NaiveDateTime) -> Option<NaiveDateTime> {
        let mut candidate = ceil_to_minute(from);
        let limit = candidate + TimeDelta::days(SEARCH_HORIZON_DAYS);

        while candidate <= limit {
            if !self.months.contains(candidate.month()) {
                candidate = first_of_next_month(candidate.date())?.and_time(NaiveTime::MIN);
                continue;
            }

            if !self.day_matches(candidate.date()) {
                candidate = candidate.date().succ_opt()?.and_time(NaiveTime::MIN);
                continue;
            }

            if !self.hours.contains(candidate.hour()) {
                candidate = candidate.date().and_hms_opt(candidate.hour(), 0, 0)?
                    + TimeDelta::hours(1);
                continue;
            }

            if !self.minutes.contains(candidate.minute()) {
                candidate += TimeDelta::minutes(1);
                continue;
            }

            return Some(candidate);
        }

        None
    }

    /// Day-of-month and day-of-week are OR-ed when both are restricted
    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = self.days_of_month.contains(date.day());
        let dow = self
            .days_of_week
            .contains(date.weekday().num_days_from_sunday());

        if self.days_of_month.is_restricted() && self.days_of_week.is_restricted() {
            dom || dow
        } else {
            dom && dow
        }
    }
}

impl FromStr for CronExpr {
    type Err = CronParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn expand_macro(name: &str) -> Result<&'static str, CronParseError> {
    match name.to_ascii_lowercase().as_str() {
        "@yearly" | "@annually" => Ok("0 0 1 1 *"),
        "@monthly" => Ok("0 0 1 * *"),
        "@weekly" => Ok("0 0 * * 0"),
        "@daily" | "@midnight" => Ok("0 0 * * *"),
        "@hourly" => Ok("0 * * * *"),
        _ => Err(CronParseError::UnknownMacro(name.to_string())),
    }
}

/// Drops seconds and sub-second precision
pub fn truncate_to_minute(at: NaiveDateTime) -> NaiveDateTime {
    at - TimeDelta::seconds(i64::from(at.second()))
        - TimeDelta::nanoseconds(i64::from(at.nanosecond()))
}

fn ceil_to_minute(at: NaiveDateTime) -> NaiveDateTime {
    let floor = truncate_to_minute(at);
    if floor == at {
        floor
    } else {
        floor + TimeDelta::minutes(1)
    }
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_hourly_macro() {
        let expr = CronExpr::parse("@hourly").unwrap();
        assert_eq!(expr.as_str(), "@hourly");
        assert_eq!(
            expr.next_from(at("2024-01-01 10:01:00")),
            Some(at("2024-01-01 11:00:00"))
        );
    }

    #[test]
    fn test_matching_instant_is_returned() {
        let expr = CronExpr::parse("30 10 * * *").unwrap();
        let t = at("2024-03-05 10:30:00");
        assert!(expr.matches(t));
        assert_eq!(expr.next_from(t), Some(t));
    }

    #[test]
    fn test_non_matching_instant_moves_forward() {
        let expr = CronExpr::parse("30 10 * * *").unwrap();
        assert_eq!(
            expr.next_from(at("2024-03-05 10:30:01")),
            Some(at("2024-03-06 10:30:00"))
        );
        assert_eq!(
            expr.next_from(at("2024-03-05 10:29:59")),
            Some(at("2024-03-05 10:30:00"))
        );
    }

    #[test]
    fn test_steps_ranges_and_lists() {
        let expr = CronExpr::parse("*/15 9-17 * * 1-5").unwrap();
        // Saturday -> next Monday 09:00
        assert_eq!(
            expr.next_from(at("2024-06-01 12:00:00")),
            Some(at("2024-06-03 09:00:00"))
        );
        assert_eq!(
            expr.next_from(at("2024-06-03 09:01:00")),
            Some(at("2024-06-03 09:15:00"))
        );

        let expr = CronExpr::parse("5,10 0 * * *").unwrap();
        assert_eq!(
            expr.next_from(at("2024-06-03 00:06:00")),
            Some(at("2024-06-03 00:10:00"))
        );
    }

    #[test]
    fn test_start_with_step_runs_to_end_of_range() {
        let expr = CronExpr::parse("50/5 * * * *").unwrap();
        assert_eq!(
            expr.next_from(at("2024-06-03 00:56:00")),
            Some(at("2024-06-03 01:50:00"))
        );
    }

    #[test]
    fn test_names_are_case_insensitive() {
        let expr = CronExpr::parse("0 0 1 JAN,jul Sun").unwrap();
        // both day fields restricted: first of the month OR any Sunday
        assert_eq!(
            expr.next_from(at("2024-01-02 00:00:00")),
            Some(at("2024-01-07 00:00:00"))
        );
    }

    #[test]
    fn test_day_fields_are_anded_when_one_is_wildcard() {
        let expr = CronExpr::parse("0 12 * * 0").unwrap();
        // 2024-01-03 is a Wednesday
        assert_eq!(
            expr.next_from(at("2024-01-03 00:00:00")),
            Some(at("2024-01-07 12:00:00"))
        );
    }

    #[test]
    fn test_seven_is_sunday() {
        let a = CronExpr::parse("0 0 * * 7").unwrap();
        let b = CronExpr::parse("0 0 * * 0").unwrap();
        let from = at("2024-01-03 00:00:00");
        assert_eq!(a.next_from(from), b.next_from(from));
    }

    #[test]
    fn test_crosses_year_boundary() {
        let expr = CronExpr::parse("@yearly").unwrap();
        assert_eq!(
            expr.next_from(at("2024-12-31 23:59:30")),
            Some(at("2025-01-01 00:00:00"))
        );
    }

    #[test]
    fn test_leap_day() {
        let expr = CronExpr::parse("0 0 29 2 *").unwrap();
        assert_eq!(
            expr.next_from(at("2024-03-01 00:00:00")),
            Some(at("2028-02-29 00:00:00"))
        );
    }

    #[test]
    fn test_impossible_date_yields_none() {
        let expr = CronExpr::parse("0 0 30 2 *").unwrap();
        assert_eq!(expr.next_from(at("2024-01-01 00:00:00")), None);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            CronExpr::parse("* * * *"),
            Err(CronParseError::FieldCount(4))
        );
        assert!(matches!(
            CronExpr::parse("@reboot"),
            Err(CronParseError::UnknownMacro(_))
        ));
        assert!(matches!(
            CronExpr::parse("60 * * * *"),
            Err(CronParseError::OutOfRange { value: 60, .. })
        ));
        assert!(matches!(
            CronExpr::parse("*/0 * * * *"),
            Err(CronParseError::InvalidStep(_))
        ));
        assert!(matches!(
            CronExpr::parse("5-1 * * * *"),
            Err(CronParseError::InvalidValue { .. })
        ));
        assert!(matches!(
            CronExpr::parse("x * * * *"),
            Err(CronParseError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_truncate_to_minute() {
        assert_eq!(
            truncate_to_minute(at("2024-01-01 10:00:42")),
            at("2024-01-01 10:00:00")
        );
    }
}
