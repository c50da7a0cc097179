//! Five-field cron expressions: validation and next-trigger computation.
//!
//! Supports `*`, `N`, `A-B`, `*/S`, `A-B/S`, `N/S` and comma lists, plus the
//! `@hourly`, `@daily`, `@weekly`, `@monthly` and `@yearly` shorthands.
//! Day-of-week accepts 0–7 with both 0 and 7 meaning Sunday.

use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Upper bound for the next-trigger search.
const SEARCH_LIMIT_MINUTES: i64 = 366 * 24 * 60;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CadenceError {
    #[error("expected 5 fields, got {0}")]
    FieldCount(usize),
    #[error("unknown shorthand {0:?}")]
    UnknownShorthand(String),
    #[error("invalid {field} field {value:?}: {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: String,
    },
}

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
}

const FIELDS: [FieldSpec; 5] = [
    FieldSpec { name: "minute", min: 0, max: 59 },
    FieldSpec { name: "hour", min: 0, max: 23 },
    FieldSpec { name: "day-of-month", min: 1, max: 31 },
    FieldSpec { name: "month", min: 1, max: 12 },
    FieldSpec { name: "day-of-week", min: 0, max: 7 },
];

/// A validated cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    source: String,
    /// Bitsets indexed by value, one per field.
    sets: [u64; 5],
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self, CadenceError> {
        let trimmed = expr.trim();
        let expanded = if trimmed.starts_with('@') {
            expand_shorthand(trimmed)?
        } else {
            trimmed
        };

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        if fields.len() != FIELDS.len() {
            return Err(CadenceError::FieldCount(fields.len()));
        }

        let mut sets = [0u64; 5];
        for (i, (raw, spec)) in fields.iter().zip(FIELDS.iter()).enumerate() {
            sets[i] = parse_field(raw, spec)?;
        }
        // Sunday is both 0 and 7.
        if sets[4] & (1 << 7) != 0 {
            sets[4] = (sets[4] | 1) & !(1 << 7);
        }

        Ok(Self {
            source: if trimmed.starts_with('@') { trimmed.to_string() } else { fields.join(" ") },
            sets,
            dom_restricted: fields[2] != "*",
            dow_restricted: fields[4] != "*",
        })
    }

    /// The expression as written, with fields separated by single spaces.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the expression fires at `t` (seconds are ignored).
    pub fn matches(&self, t: &NaiveDateTime) -> bool {
        let has = |set: u64, v: u32| set & (1u64 << v) != 0;

        if !has(self.sets[0], t.minute()) || !has(self.sets[1], t.hour()) || !has(self.sets[3], t.month()) {
            return false;
        }
        let dom = has(self.sets[2], t.day());
        let dow = has(self.sets[4], t.weekday().num_days_from_sunday());
        if self.dom_restricted && self.dow_restricted {
            dom || dow
        } else {
            dom && dow
        }
    }

    /// First trigger strictly after `after`, within a year.
    pub fn next_after(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        let start = after.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        (0..SEARCH_LIMIT_MINUTES)
            .map(|m| start + Duration::minutes(m))
            .find(|t| self.matches(t))
    }
}

impl FromStr for CronExpr {
    type Err = CadenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn expand_shorthand(s: &str) -> Result<&'static str, CadenceError> {
    match s {
        "@hourly" => Ok("0 * * * *"),
        "@daily" | "@midnight" => Ok("0 0 * * *"),
        "@weekly" => Ok("0 0 * * 0"),
        "@monthly" => Ok("0 0 1 * *"),
        "@yearly" | "@annually" => Ok("0 0 1 1 *"),
        other => Err(CadenceError::UnknownShorthand(other.to_string())),
    }
}

fn parse_field(raw: &str, spec: &FieldSpec) -> Result<u64, CadenceError> {
    let invalid = |reason: String| CadenceError::InvalidField {
        field: spec.name,
        value: raw.to_string(),
        reason,
    };

    let mut set = 0u64;
    for item in raw.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step.parse().map_err(|_| invalid(format!("bad step {step:?}")))?;
                if step == 0 {
                    return Err(invalid("step must be positive".into()));
                }
                (range, Some(step))
            }
            None => (item, None),
        };

        let parse_num = |s: &str| -> Result<u32, CadenceError> {
            let v: u32 = s.parse().map_err(|_| invalid(format!("bad value {s:?}")))?;
            if v < spec.min || v > spec.max {
                return Err(invalid(format!("{v} outside {}-{}", spec.min, spec.max)));
            }
            Ok(v)
        };

        let (lo, hi) = if range == "*" {
            (spec.min, spec.max)
        } else if let Some((a, b)) = range.split_once('-') {
            let (a, b) = (parse_num(a)?, parse_num(b)?);
            if a > b {
                return Err(invalid(format!("range {a}-{b} is reversed")));
            }
            (a, b)
        } else {
            let v = parse_num(range)?;
            // `N/S` runs from N to the end of the field.
            if step.is_some() {
                (v, spec.max)
            } else {
                (v, v)
            }
        };

        let step = step.unwrap_or(1) as usize;
        for v in (lo..=hi).step_by(step) {
            set |= 1u64 << v;
        }
    }
    Ok(set)
}
