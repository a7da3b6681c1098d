//! Date and time helpers
//!
//! Formats use `chrono` strftime syntax. An unknown specifier is an error
//! rather than a panic at render time.

use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, Local, Months, NaiveDate, TimeDelta, TimeZone, Utc};

use crate::{HelperError, Result};

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";
pub const DEFAULT_TIME_FORMAT: &str = "%H:%M:%S";
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render `datetime` with a strftime `format`
pub fn format_datetime<Tz>(datetime: &DateTime<Tz>, format: &str) -> Result<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(HelperError::InvalidFormat(format.to_string()));
    }

    let mut out = String::new();
    write!(out, "{}", datetime.format_with_items(items.iter()))
        .map_err(|_| HelperError::InvalidFormat(format.to_string()))?;
    Ok(out)
}

/// Today's local date, `%Y-%m-%d` unless `format` is given
pub fn current_date(format: Option<&str>) -> Result<String> {
    format_datetime(&Local::now(), format.unwrap_or(DEFAULT_DATE_FORMAT))
}

/// Local wall-clock time, `%H:%M:%S` unless `format` is given
pub fn current_time(format: Option<&str>) -> Result<String> {
    format_datetime(&Local::now(), format.unwrap_or(DEFAULT_TIME_FORMAT))
}

pub fn current_datetime(format: Option<&str>) -> Result<String> {
    format_datetime(&Local::now(), format.unwrap_or(DEFAULT_DATETIME_FORMAT))
}

/// Local now shifted by `relative` (e.g. `"-1 day"`), then formatted
pub fn get_datetime(relative: &str, format: Option<&str>) -> Result<String> {
    let shifted = apply_relative(Local::now(), relative)?;
    format_datetime(&shifted, format.unwrap_or(DEFAULT_DATETIME_FORMAT))
}

/// Seconds since the Unix epoch with microsecond fraction
pub fn current_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

pub fn current_unix_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Milliseconds since the Unix epoch
pub fn get_millisecond() -> i64 {
    Utc::now().timestamp_millis()
}

/// Completed years since `birthday`, as of today
pub fn get_age(birthday: NaiveDate) -> u32 {
    age_on(birthday, Local::now().date_naive())
}

/// Completed years between `birthday` and `today`; zero for future birthdays
pub fn age_on(birthday: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - birthday.year();
    if (today.month(), today.day()) < (birthday.month(), birthday.day()) {
        years -= 1;
    }
    u32::try_from(years).unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Fortnight,
    Month,
    Year,
}

fn parse_unit(word: &str) -> Option<Unit> {
    let unit = match word {
        "s" | "sec" | "secs" | "second" | "seconds" => Unit::Second,
        "min" | "mins" | "minute" | "minutes" => Unit::Minute,
        "h" | "hour" | "hours" => Unit::Hour,
        "d" | "day" | "days" => Unit::Day,
        "w" | "week" | "weeks" => Unit::Week,
        "fortnight" | "fortnights" => Unit::Fortnight,
        "month" | "months" => Unit::Month,
        "y" | "year" | "years" => Unit::Year,
        _ => return None,
    };
    Some(unit)
}

fn shift<Tz: TimeZone>(base: DateTime<Tz>, amount: i64, unit: Unit) -> Option<DateTime<Tz>> {
    let months = |n: i64| -> Option<DateTime<Tz>> {
        let magnitude = Months::new(u32::try_from(n.unsigned_abs()).ok()?);
        if n >= 0 {
            base.clone().checked_add_months(magnitude)
        } else {
            base.clone().checked_sub_months(magnitude)
        }
    };

    match unit {
        Unit::Second => base.clone().checked_add_signed(TimeDelta::try_seconds(amount)?),
        Unit::Minute => base.clone().checked_add_signed(TimeDelta::try_minutes(amount)?),
        Unit::Hour => base.clone().checked_add_signed(TimeDelta::try_hours(amount)?),
        Unit::Day => base.clone().checked_add_signed(TimeDelta::try_days(amount)?),
        Unit::Week => base.clone().checked_add_signed(TimeDelta::try_weeks(amount)?),
        Unit::Fortnight => base
            .clone()
            .checked_add_signed(TimeDelta::try_weeks(amount.checked_mul(2)?)?),
        Unit::Month => months(amount),
        Unit::Year => months(amount.checked_mul(12)?),
    }
}

/// Shift `base` by a relative expression.
///
/// Accepts `now`, `today`, `yesterday`, `tomorrow`, and any sequence of
/// `[+|-]N unit` terms (`"+2 hours 30 minutes"`, `"-1 day"`). A trailing
/// `ago` negates the whole expression. A term without a number (`"next
/// week"`, `"last month"`) counts as one.
pub fn apply_relative<Tz: TimeZone>(base: DateTime<Tz>, relative: &str) -> Result<DateTime<Tz>> {
    let invalid = || HelperError::InvalidInput(format!("unrecognized relative time: {}", relative));

    let lowered = relative.trim().to_ascii_lowercase();
    let mut tokens: Vec<&str> = lowered.split_whitespace().collect();

    let negate = tokens.last() == Some(&"ago");
    if negate {
        tokens.pop();
    }

    let mut terms: Vec<(i64, Unit)> = Vec::new();
    let mut pending: Option<i64> = None;

    for token in tokens {
        match token {
            "now" | "today" if pending.is_none() => continue,
            "yesterday" if pending.is_none() => terms.push((-1, Unit::Day)),
            "tomorrow" if pending.is_none() => terms.push((1, Unit::Day)),
            "next" if pending.is_none() => pending = Some(1),
            "last" | "previous" if pending.is_none() => pending = Some(-1),
            _ => {
                // Number glued to its unit: "+3days", "-1day".
                let (number, unit) = match token.find(|c: char| c.is_ascii_alphabetic()) {
                    Some(0) => (None, Some(token)),
                    Some(i) => (Some(&token[..i]), Some(&token[i..])),
                    None => (Some(token), None),
                };

                if let Some(number) = number {
                    if pending.is_some() {
                        return Err(invalid());
                    }
                    let n = number.parse::<i64>().map_err(|_| invalid())?;
                    pending = Some(n);
                }
                if let Some(unit) = unit {
                    let unit = parse_unit(unit).ok_or_else(invalid)?;
                    terms.push((pending.take().unwrap_or(1), unit));
                }
            }
        }
    }

    if pending.is_some() {
        return Err(invalid());
    }

    let mut result = base;
    for (amount, unit) in terms {
        let amount = if negate {
            amount.checked_neg().ok_or_else(invalid)?
        } else {
            amount
        };
        result = shift(result, amount, unit).ok_or_else(invalid)?;
    }
    Ok(result)
}
