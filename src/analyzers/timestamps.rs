//! Monthly timestamps and the time ranges sent to the ohsome API.

use anyhow::{Context, Result, bail};
use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;

/// Reads the `YYYY-MM-DD` prefix of an ISO-8601 timestamp.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let date = s.split('T').next().unwrap_or(s).trim();
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{s}'"))
}

/// First day of the month `date` falls in.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First-of-month dates from the month of `from` through the month of `to`,
/// both included. Empty when `to` lies in an earlier month than `from`.
pub fn monthly_stamps(from: &str, to: &str) -> Result<Vec<NaiveDate>> {
    let start = month_start(parse_date(from)?);
    let end = month_start(parse_date(to)?);
    Ok(months_between(start, end))
}

pub fn months_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut stamps = Vec::new();
    let mut current = month_start(start);
    let end = month_start(end);

    while current <= end {
        stamps.push(current);
        current = match current.checked_add_months(chrono::Months::new(1)) {
            Some(next) => next,
            None => break,
        };
    }

    stamps
}

/// A `start/end/step` range such as `2009-11-01/2020-06-01/P1M`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub step: Option<String>,
}

impl TimeRange {
    /// `start,end` as expected by the full-history endpoints.
    pub fn history_interval(&self) -> String {
        format!("{},{}", self.start, self.end)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.step {
            Some(step) => write!(f, "{}/{}/{}", self.start, self.end, step),
            None => write!(f, "{}/{}", self.start, self.end),
        }
    }
}

impl FromStr for TimeRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(['/', ',']).map(str::trim).collect();
        let (start, end, step) = match parts.as_slice() {
            [start, end] => (start, end, None),
            [start, end, step] => (start, end, Some(step.to_string())),
            _ => bail!("time range '{s}' must look like start/end[/step]"),
        };

        let start = parse_date(start)?;
        let end = parse_date(end)?;
        if end < start {
            bail!("time range '{s}' ends before it starts");
        }

        Ok(Self { start, end, step })
    }
}
