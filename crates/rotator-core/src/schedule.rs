//! Recurrence rules and next-occurrence evaluation.
//!
//! Accepts `manual`, the usual `@` macros, and five-field cron expressions
//! evaluated in UTC (minute, hour, day-of-month, month, day-of-week).

use std::fmt;

use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::error::{Result, RotatorError};

/// Searching further than this without a match means the rule never fires
/// (e.g. February 30th).
const SEARCH_YEARS: i32 = 8;

const MONTH_NAMES: &[&str] = &[
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const DAY_NAMES: &[&str] = &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// When avatar updates are expected to happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recurrence {
    /// Only on explicit dispatch.
    Manual,
    Cron(CronSchedule),
}

impl Recurrence {
    pub fn parse(expr: &str) -> Result<Self> {
        let trimmed = expr.trim();
        if trimmed.eq_ignore_ascii_case("manual") {
            return Ok(Recurrence::Manual);
        }
        CronSchedule::parse(trimmed).map(Recurrence::Cron)
    }

    /// First occurrence strictly after `after`; `None` for manual rules.
    pub fn next_after(&self, after: OffsetDateTime) -> Option<OffsetDateTime> {
        match self {
            Recurrence::Manual => None,
            Recurrence::Cron(c) => c.next_after(after),
        }
    }

    /// The next `count` occurrences after `after`.
    pub fn upcoming(&self, after: OffsetDateTime, count: usize) -> Vec<OffsetDateTime> {
        let mut out = Vec::with_capacity(count);
        let mut cursor = after;
        while out.len() < count {
            match self.next_after(cursor) {
                Some(t) => {
                    out.push(t);
                    cursor = t;
                }
                None => break,
            }
        }
        out
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recurrence::Manual => f.write_str("manual"),
            Recurrence::Cron(c) => f.write_str(&c.source),
        }
    }
}

/// A parsed cron expression. Each field is a bitmask of allowed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    source: String,
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    dom_any: bool,
    dow_any: bool,
}

struct FieldRule {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    /// Offset added to a name's index to get its numeric value.
    name_base: u32,
}

const MINUTE: FieldRule = FieldRule {
    name: "minute",
    min: 0,
    max: 59,
    names: &[],
    name_base: 0,
};
const HOUR: FieldRule = FieldRule {
    name: "hour",
    min: 0,
    max: 23,
    names: &[],
    name_base: 0,
};
const DAY_OF_MONTH: FieldRule = FieldRule {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: &[],
    name_base: 0,
};
const MONTH: FieldRule = FieldRule {
    name: "month",
    min: 1,
    max: 12,
    names: MONTH_NAMES,
    name_base: 1,
};
// 7 is accepted as Sunday and folded onto 0 after parsing.
const DAY_OF_WEEK: FieldRule = FieldRule {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: DAY_NAMES,
    name_base: 0,
};

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self> {
        let source = expr.trim().to_string();
        let expanded = match source.to_ascii_lowercase().as_str() {
            "@yearly" | "@annually" => "0 0 1 1 *",
            "@monthly" => "0 0 1 * *",
            "@weekly" => "0 0 * * 0",
            "@daily" | "@midnight" => "0 0 * * *",
            "@hourly" => "0 * * * *",
            s if s.starts_with('@') => {
                return Err(RotatorError::schedule(expr, "unknown macro"));
            }
            _ => source.as_str(),
        }
        .to_string();

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(RotatorError::schedule(
                expr,
                format!("expected 5 fields, found {}", fields.len()),
            ));
        }

        let minutes = parse_field(expr, fields[0], &MINUTE)?;
        let hours = parse_field(expr, fields[1], &HOUR)?;
        let days_of_month = parse_field(expr, fields[2], &DAY_OF_MONTH)?;
        let months = parse_field(expr, fields[3], &MONTH)?;
        let mut days_of_week = parse_field(expr, fields[4], &DAY_OF_WEEK)?;
        if days_of_week & (1 << 7) != 0 {
            days_of_week = (days_of_week & !(1 << 7)) | 1;
        }

        Ok(Self {
            source,
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            dom_any: fields[2].starts_with('*'),
            dow_any: fields[4].starts_with('*'),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn day_matches(&self, date: Date) -> bool {
        let dom = bit(self.days_of_month, u32::from(date.day()));
        let dow = bit(
            self.days_of_week,
            u32::from(date.weekday().number_days_from_sunday()),
        );
        match (self.dom_any, self.dow_any) {
            (false, false) => dom || dow,
            (true, false) => dow,
            (false, true) => dom,
            (true, true) => true,
        }
    }

    /// First matching minute strictly after `after`, in UTC.
    pub fn next_after(&self, after: OffsetDateTime) -> Option<OffsetDateTime> {
        let after = after.to_offset(UtcOffset::UTC);
        let start = after.replace_second(0).ok()?.replace_nanosecond(0).ok()? + Duration::MINUTE;
        let mut t = PrimitiveDateTime::new(start.date(), start.time());
        let limit_year = t.year() + SEARCH_YEARS;

        while t.year() <= limit_year {
            if !bit(self.months, u32::from(u8::from(t.month()))) {
                t = first_of_next_month(t.date())?;
                continue;
            }
            if !self.day_matches(t.date()) {
                t = PrimitiveDateTime::new(t.date().next_day()?, Time::MIDNIGHT);
                continue;
            }
            if !bit(self.hours, u32::from(t.hour())) {
                t = t.replace_minute(0).ok()? + Duration::HOUR;
                continue;
            }
            if !bit(self.minutes, u32::from(t.minute())) {
                t += Duration::MINUTE;
                continue;
            }
            return Some(t.assume_utc());
        }
        None
    }
}

fn bit(mask: u64, value: u32) -> bool {
    mask & (1u64 << value) != 0
}

fn first_of_next_month(date: Date) -> Option<PrimitiveDateTime> {
    let (year, month) = match date.month() {
        Month::December => (date.year() + 1, Month::January),
        m => (date.year(), m.next()),
    };
    let first = Date::from_calendar_date(year, month, 1).ok()?;
    Some(PrimitiveDateTime::new(first, Time::MIDNIGHT))
}

fn parse_field(expr: &str, field: &str, rule: &FieldRule) -> Result<u64> {
    let mut mask = 0u64;
    for part in field.split(',') {
        if part.is_empty() {
            return Err(RotatorError::schedule(
                expr,
                format!("empty list item in {} field", rule.name),
            ));
        }
        let (range, step) = match part.split_once('/') {
            Some((r, s)) => {
                let step: u32 = s.parse().map_err(|_| {
                    RotatorError::schedule(expr, format!("bad step `{s}` in {} field", rule.name))
                })?;
                if step == 0 || step > rule.max {
                    return Err(RotatorError::schedule(
                        expr,
                        format!("step {step} outside 1-{} in {} field", rule.max, rule.name),
                    ));
                }
                (r, step)
            }
            None => (part, 1),
        };

        let (lo, hi) = if range == "*" {
            (rule.min, rule.max)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_value(expr, a, rule)?, parse_value(expr, b, rule)?)
        } else {
            let v = parse_value(expr, range, rule)?;
            // `5/15` means from 5 to the end in steps of 15.
            if part.contains('/') {
                (v, rule.max)
            } else {
                (v, v)
            }
        };
        if lo > hi {
            return Err(RotatorError::schedule(
                expr,
                format!("range {lo}-{hi} is reversed in {} field", rule.name),
            ));
        }
        let mut v = Some(lo);
        while let Some(cur) = v.filter(|cur| *cur <= hi) {
            mask |= 1u64 << cur;
            v = cur.checked_add(step);
        }
    }
    Ok(mask)
}

fn parse_value(expr: &str, raw: &str, rule: &FieldRule) -> Result<u32> {
    let value = match raw.parse::<u32>() {
        Ok(v) => v,
        Err(_) => rule
            .names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(raw))
            .map(|i| i as u32 + rule.name_base)
            .ok_or_else(|| {
                RotatorError::schedule(expr, format!("bad value `{raw}` in {} field", rule.name))
            })?,
    };
    if value < rule.min || value > rule.max {
        return Err(RotatorError::schedule(
            expr,
            format!(
                "{value} outside {}-{} in {} field",
                rule.min, rule.max, rule.name
            ),
        ));
    }
    Ok(value)
}
