//! Cron schedule expressions.
//!
//! Supported syntax:
//! - six fields `second minute hour day-of-month month day-of-week`, or five fields with the seconds implied as `0`;
//! - per field `*`, `?`, values, ranges `a-b`, steps `*/n`, `a-b/n`, `a/n` and comma lists;
//! - month names `JAN`..`DEC` and weekday names `SUN`..`SAT` (case-insensitive, Sunday is `0`);
//! - descriptors `@yearly`, `@annually`, `@monthly`, `@weekly`, `@daily`, `@midnight`, `@hourly`, `@every <duration>`.
//!
//! When both day fields are restricted a day matches if either of them matches;
//! when one of them is `*` or `?` both must match.
use std::{fmt, str::FromStr, time::Duration};

use thiserror::Error;
use time::{Date, Duration as TimeDuration, Month, OffsetDateTime, Time};

/// How far ahead [`CronExpr::next_after`] searches before giving up.
const SEARCH_YEARS: i32 = 5;

/// Longest accepted `@every` interval; anything longer could never fire within the search window.
const MAX_EVERY: Duration = Duration::from_secs(SEARCH_YEARS as u64 * 366 * 24 * 3600);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CronParseError {
    #[error("empty schedule expression")]
    Empty,
    #[error("expected 5 or 6 fields, found {0}")]
    FieldCount(usize),
    #[error("invalid {field} field '{value}': {reason}")]
    Field {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("unknown descriptor '{0}'")]
    Descriptor(String),
    #[error("invalid @every duration '{0}'")]
    Duration(String),
}

/// Parsed schedule expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    source: String,
    schedule: Schedule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Schedule {
    Fields(FieldSet),
    Every(Duration),
}

/// One bit per allowed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSet {
    second: u64,
    minute: u64,
    hour: u64,
    dom: u64,
    month: u64,
    dow: u64,
    dom_any: bool,
    dow_any: bool,
}

struct Bounds {
    name: &'static str,
    min: u8,
    max: u8,
    names: &'static [&'static str],
}

const SECOND: Bounds = Bounds { name: "second", min: 0, max: 59, names: &[] };
const MINUTE: Bounds = Bounds { name: "minute", min: 0, max: 59, names: &[] };
const HOUR: Bounds = Bounds { name: "hour", min: 0, max: 23, names: &[] };
const DOM: Bounds = Bounds { name: "day-of-month", min: 1, max: 31, names: &[] };
const MONTH: Bounds = Bounds {
    name: "month",
    min: 1,
    max: 12,
    names: &[
        "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
    ],
};
const DOW: Bounds = Bounds {
    name: "day-of-week",
    min: 0,
    max: 6,
    names: &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"],
};

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self, CronParseError> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Err(CronParseError::Empty);
        }

        let schedule = match trimmed.strip_prefix('@') {
            Some(descriptor) => parse_descriptor(descriptor)?,
            None => Schedule::Fields(parse_fields(trimmed)?),
        };

        Ok(Self {
            source: trimmed.to_string(),
            schedule,
        })
    }

    /// `@every` schedules fire at fixed intervals, independent of wall-clock time.
    pub(crate) fn is_interval(&self) -> bool {
        matches!(self.schedule, Schedule::Every(_))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// First firing strictly after `after`, in the offset of `after`.
    ///
    /// Returns `None` if nothing matches within the next five years (e.g. `0 0 0 30 2 *`).
    pub fn next_after(&self, after: OffsetDateTime) -> Option<OffsetDateTime> {
        let base = after.replace_nanosecond(0).ok()?;
        match &self.schedule {
            Schedule::Every(every) => base.checked_add(TimeDuration::try_from(*every).ok()?),
            Schedule::Fields(set) => set.next_after(base),
        }
    }
}

impl FromStr for CronExpr {
    type Err = CronParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CronExpr::parse(s)
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FieldSet {
    fn next_after(&self, base: OffsetDateTime) -> Option<OffsetDateTime> {
        let mut t = base + TimeDuration::SECOND;
        let year_limit = t.year() + SEARCH_YEARS;

        'wrap: loop {
            if t.year() > year_limit {
                return None;
            }

            while !has(self.month, t.month() as u8) {
                t = start_of_next_month(t)?;
                if t.year() > year_limit {
                    return None;
                }
            }

            while !self.day_matches(t) {
                t = t.replace_time(Time::MIDNIGHT) + TimeDuration::DAY;
                if t.day() == 1 {
                    continue 'wrap;
                }
            }

            while !has(self.hour, t.hour()) {
                t = t.replace_time(Time::from_hms(t.hour(), 0, 0).ok()?) + TimeDuration::HOUR;
                if t.hour() == 0 {
                    continue 'wrap;
                }
            }

            while !has(self.minute, t.minute()) {
                t = t.replace_time(Time::from_hms(t.hour(), t.minute(), 0).ok()?)
                    + TimeDuration::MINUTE;
                if t.minute() == 0 {
                    continue 'wrap;
                }
            }

            while !has(self.second, t.second()) {
                t += TimeDuration::SECOND;
                if t.second() == 0 {
                    continue 'wrap;
                }
            }

            return Some(t);
        }
    }

    fn day_matches(&self, t: OffsetDateTime) -> bool {
        let dom = has(self.dom, t.day());
        let dow = has(self.dow, t.weekday().number_days_from_sunday());
        if self.dom_any || self.dow_any {
            dom && dow
        } else {
            dom || dow
        }
    }
}

#[inline]
fn has(bits: u64, value: u8) -> bool {
    bits & (1u64 << value) != 0
}

fn start_of_next_month(t: OffsetDateTime) -> Option<OffsetDateTime> {
    let (year, month) = match t.month() {
        Month::December => (t.year() + 1, Month::January),
        m => (t.year(), m.next()),
    };
    let date = Date::from_calendar_date(year, month, 1).ok()?;
    Some(t.replace_date(date).replace_time(Time::MIDNIGHT))
}

fn parse_descriptor(descriptor: &str) -> Result<Schedule, CronParseError> {
    if let Some(every) = descriptor.strip_prefix("every ") {
        return parse_every(every.trim()).map(Schedule::Every);
    }

    let fields = match descriptor.to_ascii_lowercase().as_str() {
        "yearly" | "annually" => "0 0 0 1 1 *",
        "monthly" => "0 0 0 1 * *",
        "weekly" => "0 0 0 * * 0",
        "daily" | "midnight" => "0 0 0 * * *",
        "hourly" => "0 0 * * * *",
        _ => return Err(CronParseError::Descriptor(format!("@{descriptor}"))),
    };
    parse_fields(fields).map(Schedule::Fields)
}

/// Parse a duration such as `1h30m`, `45s` or `500ms`.
///
/// Sub-second parts are truncated and the result is at least one second.
fn parse_every(raw: &str) -> Result<Duration, CronParseError> {
    let invalid = || CronParseError::Duration(raw.to_string());
    if raw.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    let mut rest = raw;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid());
        }
        let amount: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let part = match &rest[..unit_len] {
            "h" => amount.checked_mul(3600).map(Duration::from_secs),
            "m" => amount.checked_mul(60).map(Duration::from_secs),
            "s" => Some(Duration::from_secs(amount)),
            "ms" => Some(Duration::from_millis(amount)),
            _ => None,
        }
        .ok_or_else(invalid)?;
        rest = &rest[unit_len..];

        total = total.checked_add(part).ok_or_else(invalid)?;
    }
    if total > MAX_EVERY {
        return Err(invalid());
    }

    Ok(Duration::from_secs(total.as_secs().max(1)))
}

fn parse_fields(expr: &str) -> Result<FieldSet, CronParseError> {
    let mut fields: Vec<&str> = expr.split_whitespace().collect();
    match fields.len() {
        6 => {}
        5 => fields.insert(0, "0"),
        n => return Err(CronParseError::FieldCount(n)),
    }

    let (second, _) = parse_field(fields[0], &SECOND)?;
    let (minute, _) = parse_field(fields[1], &MINUTE)?;
    let (hour, _) = parse_field(fields[2], &HOUR)?;
    let (dom, dom_any) = parse_field(fields[3], &DOM)?;
    let (month, _) = parse_field(fields[4], &MONTH)?;
    let (dow, dow_any) = parse_field(fields[5], &DOW)?;

    Ok(FieldSet {
        second,
        minute,
        hour,
        dom,
        month,
        dow,
        dom_any,
        dow_any,
    })
}

/// Returns the value bits and whether the field is an unrestricted `*`/`?`.
fn parse_field(field: &str, bounds: &Bounds) -> Result<(u64, bool), CronParseError> {
    let mut bits = 0u64;
    let mut any = false;
    for part in field.split(',') {
        let (part_bits, part_any) = parse_part(part, bounds)?;
        bits |= part_bits;
        any |= part_any;
    }
    Ok((bits, any))
}

fn parse_part(part: &str, bounds: &Bounds) -> Result<(u64, bool), CronParseError> {
    let err = |reason: &'static str| CronParseError::Field {
        field: bounds.name,
        value: part.to_string(),
        reason,
    };

    let (range, step) = match part.split_once('/') {
        Some((range, step)) => {
            let step: u8 = step.parse().map_err(|_| err("invalid step"))?;
            if step == 0 {
                return Err(err("step must be positive"));
            }
            (range, Some(step))
        }
        None => (part, None),
    };

    let (start, end, any) = if range == "*" || range == "?" {
        (bounds.min, bounds.max, step.is_none())
    } else if let Some((lo, hi)) = range.split_once('-') {
        let lo = parse_value(lo, bounds).ok_or_else(|| err("unknown value"))?;
        let hi = parse_value(hi, bounds).ok_or_else(|| err("unknown value"))?;
        (lo, hi, false)
    } else {
        let value = parse_value(range, bounds).ok_or_else(|| err("unknown value"))?;
        let end = if step.is_some() { bounds.max } else { value };
        (value, end, false)
    };

    if start < bounds.min || end > bounds.max {
        return Err(err("value out of range"));
    }
    if start > end {
        return Err(err("range start is after its end"));
    }

    let bits = (start..=end)
        .step_by(usize::from(step.unwrap_or(1)))
        .fold(0u64, |acc, v| acc | (1u64 << v));
    Ok((bits, any))
}

fn parse_value(raw: &str, bounds: &Bounds) -> Option<u8> {
    if let Ok(value) = raw.parse::<u8>() {
        return Some(value);
    }
    bounds
        .names
        .iter()
        .position(|name| name.eq_ignore_ascii_case(raw))
        .and_then(|idx| u8::try_from(idx).ok())
        .map(|idx| bounds.min + idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn next(expr: &str, after: OffsetDateTime) -> Option<OffsetDateTime> {
        CronExpr::parse(expr).unwrap().next_after(after)
    }

    #[test]
    fn every_second_moves_to_next_whole_second() {
        assert_eq!(
            next("* * * * * *", datetime!(2024-01-01 10:00:00.5 UTC)),
            Some(datetime!(2024-01-01 10:00:01 UTC))
        );
    }

    #[test]
    fn result_is_strictly_after() {
        assert_eq!(
            next("0 * * * * *", datetime!(2024-01-01 10:00:00 UTC)),
            Some(datetime!(2024-01-01 10:01:00 UTC))
        );
    }

    #[test]
    fn five_fields_imply_zero_seconds() {
        assert_eq!(
            next("30 2 * * *", datetime!(2024-01-01 03:00:00 UTC)),
            Some(datetime!(2024-01-02 02:30:00 UTC))
        );
    }

    #[test]
    fn steps_wrap_into_next_minute() {
        let expr = "*/15 * * * * *";
        assert_eq!(
            next(expr, datetime!(2024-01-01 10:00:14 UTC)),
            Some(datetime!(2024-01-01 10:00:15 UTC))
        );
        assert_eq!(
            next(expr, datetime!(2024-01-01 10:00:45 UTC)),
            Some(datetime!(2024-01-01 10:01:00 UTC))
        );
    }

    #[test]
    fn ranges_lists_and_weekday_names() {
        // 2024-01-05 is a Friday.
        assert_eq!(
            next("0 0 9-17/4 * * MON-FRI", datetime!(2024-01-05 17:00:00 UTC)),
            Some(datetime!(2024-01-08 09:00:00 UTC))
        );
        assert_eq!(
            next("0 5,10 * * * *", datetime!(2024-01-01 10:07:00 UTC)),
            Some(datetime!(2024-01-01 10:10:00 UTC))
        );
    }

    #[test]
    fn month_names_are_case_insensitive() {
        assert_eq!(
            next("0 0 0 1 jan *", datetime!(2024-03-10 00:00:00 UTC)),
            Some(datetime!(2025-01-01 00:00:00 UTC))
        );
    }

    #[test]
    fn restricted_day_fields_match_either() {
        assert_eq!(
            next("0 0 0 13 * FRI", datetime!(2024-01-01 00:00:00 UTC)),
            Some(datetime!(2024-01-05 00:00:00 UTC))
        );
    }

    #[test]
    fn leap_day_is_found() {
        assert_eq!(
            next("0 0 0 29 2 *", datetime!(2025-01-01 00:00:00 UTC)),
            Some(datetime!(2028-02-29 00:00:00 UTC))
        );
    }

    #[test]
    fn impossible_date_yields_none() {
        assert_eq!(next("0 0 0 30 2 *", datetime!(2024-01-01 00:00:00 UTC)), None);
    }

    #[test]
    fn descriptors() {
        // Wednesday -> following Sunday.
        assert_eq!(
            next("@weekly", datetime!(2024-01-03 12:00:00 UTC)),
            Some(datetime!(2024-01-07 00:00:00 UTC))
        );
        assert_eq!(
            next("@hourly", datetime!(2024-01-03 12:34:56 UTC)),
            Some(datetime!(2024-01-03 13:00:00 UTC))
        );
        assert_eq!(
            next("@midnight", datetime!(2024-12-31 23:59:59 UTC)),
            Some(datetime!(2025-01-01 00:00:00 UTC))
        );
    }

    #[test]
    fn every_adds_fixed_delay() {
        assert_eq!(
            next("@every 1h30m", datetime!(2024-01-01 10:00:00.7 UTC)),
            Some(datetime!(2024-01-01 11:30:00 UTC))
        );
        assert_eq!(
            next("@every 500ms", datetime!(2024-01-01 10:00:00 UTC)),
            Some(datetime!(2024-01-01 10:00:01 UTC))
        );
    }

    #[test]
    fn every_longer_than_search_window_is_rejected() {
        assert_eq!(
            CronExpr::parse("@every 100000000h"),
            Err(CronParseError::Duration("100000000h".into()))
        );
        assert!(CronExpr::parse("@every 43800h").is_ok());
    }

    #[test]
    fn every_near_end_of_time_yields_none() {
        let expr = CronExpr::parse("@every 43800h").unwrap();
        assert_eq!(expr.next_after(datetime!(9999-06-01 00:00:00 UTC)), None);
    }

    #[test]
    fn offset_is_preserved() {
        let after = datetime!(2024-01-01 23:30:00 +2);
        let fired = next("0 0 0 * * *", after).unwrap();
        assert_eq!(fired, datetime!(2024-01-02 00:00:00 +2));
        assert_eq!(fired.offset(), after.offset());
    }

    #[test]
    fn parse_errors() {
        assert_eq!(CronExpr::parse("  "), Err(CronParseError::Empty));
        assert_eq!(CronExpr::parse("* * * *"), Err(CronParseError::FieldCount(4)));
        assert!(matches!(
            CronExpr::parse("60 * * * * *"),
            Err(CronParseError::Field { field: "second", .. })
        ));
        assert!(matches!(
            CronExpr::parse("0 0 0 * * 7"),
            Err(CronParseError::Field { field: "day-of-week", .. })
        ));
        assert!(matches!(
            CronExpr::parse("*/0 * * * * *"),
            Err(CronParseError::Field { reason: "step must be positive", .. })
        ));
        assert!(matches!(
            CronExpr::parse("0 0 0 * FOO *"),
            Err(CronParseError::Field { field: "month", .. })
        ));
        assert_eq!(
            CronExpr::parse("@fortnightly"),
            Err(CronParseError::Descriptor("@fortnightly".into()))
        );
        assert_eq!(
            CronExpr::parse("@every 10x"),
            Err(CronParseError::Duration("10x".into()))
        );
    }

    #[test]
    fn display_keeps_source() {
        let expr: CronExpr = " @every 10s ".parse().unwrap();
        assert_eq!(expr.to_string(), "@every 10s");
    }
}
