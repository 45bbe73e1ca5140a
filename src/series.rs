use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::infra::ohsome::types::TimestampValue;

/// A monthly series for one location and filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    pub location: String,
    pub filter: String,
    /// Distinguishes several series for the same location/filter, e.g. the
    /// completeness threshold.
    pub label: String,
    pub points: BTreeMap<NaiveDate, f64>,
}

/// One CSV row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRecord {
    pub location: String,
    pub filter: String,
    pub label: String,
    pub timestamp: NaiveDate,
    pub value: f64,
}

impl TimeSeries {
    pub fn new(location: &str, filter: &str, label: &str) -> Self {
        Self {
            location: location.to_string(),
            filter: filter.to_string(),
            label: label.to_string(),
            points: BTreeMap::new(),
        }
    }

    pub fn with_points(mut self, points: BTreeMap<NaiveDate, f64>) -> Self {
        self.points = points;
        self
    }

    /// Builds a series from an `/elements/{metric}` result.
    pub fn from_values(location: &str, filter: &str, label: &str, values: &[TimestampValue]) -> Result<Self> {
        let points = values
            .iter()
            .map(|tv| -> Result<(NaiveDate, f64)> { Ok((tv.date()?, tv.value)) })
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self::new(location, filter, label).with_points(points))
    }

    /// Legend text: the location, followed by the label when there is one.
    pub fn legend(&self) -> String {
        if self.label.is_empty() {
            self.location.clone()
        } else {
            format!("{} {}", self.location, self.label)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = SeriesRecord> + '_ {
        self.points.iter().map(|(timestamp, value)| SeriesRecord {
            location: self.location.clone(),
            filter: self.filter.clone(),
            label: self.label.clone(),
            timestamp: *timestamp,
            value: *value,
        })
    }
}
