//! 5-field cron expression parsing and next-occurrence computation.
//!
//! Fields: minute (0-59), hour (0-23), day-of-month (1-31), month (1-12),
//! day-of-week (0-7, both 0 and 7 are Sunday). Field grammar: `*`, `N`,
//! `N-M`, `*/S`, `N/S`, `N-M/S` and comma lists of those.
//!
//! Expressions are parsed once into per-field membership sets, so
//! evaluating an instant is a handful of set lookups rather than a
//! re-parse.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Timelike, Utc};

use crate::error::CronError;

/// Search horizon for `next_after`, in days. Covers every leap-year
/// combination a satisfiable expression can require.
const HORIZON_DAYS: i64 = 4 * 366;

/// A parsed cron expression.
///
/// Day-of-month and day-of-week follow the classic rule: when both are
/// restricted (neither is `*`), a date matching **either** field fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    source: String,
    minutes: BTreeSet<u32>,
    hours: BTreeSet<u32>,
    days_of_month: BTreeSet<u32>,
    months: BTreeSet<u32>,
    days_of_week: BTreeSet<u32>,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronExpression {
    /// Parse and validate a 5-field cron expression.
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronError::invalid(
                expr,
                format!("expected 5 fields, got {}", fields.len()),
            ));
        }

        let minutes = parse_field(fields[0], 0, 59, expr, "minute")?;
        let hours = parse_field(fields[1], 0, 23, expr, "hour")?;
        let days_of_month = parse_field(fields[2], 1, 31, expr, "day-of-month")?;
        let months = parse_field(fields[3], 1, 12, expr, "month")?;

        // Day-of-week accepts 0-7; 7 folds onto 0 (Sunday).
        let mut days_of_week = parse_field(fields[4], 0, 7, expr, "day-of-week")?;
        if days_of_week.remove(&7) {
            days_of_week.insert(0);
        }

        Ok(Self {
            source: expr.to_string(),
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            dom_restricted: fields[2] != "*",
            dow_restricted: fields[4] != "*",
        })
    }

    /// The original expression string.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether `instant` (at minute resolution) satisfies every field.
    pub fn matches(&self, instant: &DateTime<Utc>) -> bool {
        self.months.contains(&instant.month())
            && self.day_matches(instant)
            && self.hours.contains(&instant.hour())
            && self.minutes.contains(&instant.minute())
    }

    /// The smallest instant strictly greater than `instant` satisfying
    /// every field, with seconds zeroed. Fails with `Unschedulable` when
    /// nothing matches within the horizon (e.g. `0 0 30 2 *`).
    pub fn next_after(&self, instant: DateTime<Utc>) -> Result<DateTime<Utc>, CronError> {
        let horizon = instant + Duration::days(HORIZON_DAYS);
        let mut t = instant + Duration::minutes(1);
        t = t
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(t);

        while t <= horizon {
            if !self.months.contains(&t.month()) || !self.day_matches(&t) {
                // Skip the rest of this day.
                let Some(next_day) = t.date_naive().succ_opt() else {
                    break;
                };
                t = Utc.from_utc_datetime(&next_day.and_time(NaiveTime::MIN));
                continue;
            }
            if !self.hours.contains(&t.hour()) {
                // Skip to the next hour boundary.
                t = t.with_minute(0).unwrap_or(t) + Duration::hours(1);
                continue;
            }
            if !self.minutes.contains(&t.minute()) {
                t += Duration::minutes(1);
                continue;
            }
            return Ok(t);
        }

        Err(CronError::Unschedulable(self.source.clone()))
    }

    fn day_matches(&self, instant: &DateTime<Utc>) -> bool {
        let dom = self.days_of_month.contains(&instant.day());
        let dow = self
            .days_of_week
            .contains(&instant.weekday().num_days_from_sunday());

        match (self.dom_restricted, self.dow_restricted) {
            // Both restricted: either field matching fires (vixie cron).
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for CronExpression {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parse one field specification into its membership set.
fn parse_field(
    spec: &str,
    min: u32,
    max: u32,
    expr: &str,
    name: &str,
) -> Result<BTreeSet<u32>, CronError> {
    let mut values = BTreeSet::new();

    for part in spec.split(',') {
        if part.is_empty() {
            return Err(CronError::invalid(expr, format!("empty {} field", name)));
        }

        let (range, step) = match part.split_once('/') {
            Some((range, step_str)) => {
                let step: u32 = step_str.parse().map_err(|_| {
                    CronError::invalid(expr, format!("bad step '{}' in {} field", step_str, name))
                })?;
                if step == 0 {
                    return Err(CronError::invalid(
                        expr,
                        format!("zero step in {} field", name),
                    ));
                }
                (range, step)
            }
            None => (part, 1),
        };

        let (lo, hi) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            (
                parse_value(a, expr, name)?,
                parse_value(b, expr, name)?,
            )
        } else {
            let v = parse_value(range, expr, name)?;
            // "N/S" means N through the field maximum, stepping by S.
            if part.contains('/') { (v, max) } else { (v, v) }
        };

        if lo > hi {
            return Err(CronError::invalid(
                expr,
                format!("reversed range {}-{} in {} field", lo, hi, name),
            ));
        }
        if lo < min || hi > max {
            return Err(CronError::invalid(
                expr,
                format!("{} value out of range {}-{}", name, min, max),
            ));
        }

        values.extend((lo..=hi).step_by(step as usize));
    }

    Ok(values)
}

fn parse_value(s: &str, expr: &str, name: &str) -> Result<u32, CronError> {
    s.parse().map_err(|_| {
        CronError::invalid(expr, format!("bad value '{}' in {} field", s, name))
    })
}
