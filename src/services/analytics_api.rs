//! Trait and types for querying an OSM history analytics service.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analyzers::timestamps::TimeRange;
use crate::infra::ohsome::types::{GroupByEntry, TimestampValue};
use crate::spatial::{BoundingBox, Grid};

/// The aggregation an `/elements/{metric}` endpoint computes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Count,
    Length,
    Area,
    Perimeter,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Count => "count",
            Metric::Length => "length",
            Metric::Area => "area",
            Metric::Perimeter => "perimeter",
        }
    }

    /// Axis label for charts.
    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Count => "objects",
            Metric::Length | Metric::Perimeter => "m",
            Metric::Area => "m²",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Abstraction over the analytics provider (the ohsome API).
#[async_trait::async_trait]
pub trait AnalyticsApi: Send + Sync {
    /// `metric` of the objects matching `filter` inside `bbox`, per timestamp of `time`.
    async fn aggregate(
        &self,
        metric: Metric,
        bbox: &BoundingBox,
        filter: &str,
        time: &TimeRange,
    ) -> Result<Vec<TimestampValue>>;

    /// `metric` per grid cell in a single request, keyed by cell id.
    async fn aggregate_by_cell(
        &self,
        metric: Metric,
        grid: &Grid,
        filter: &str,
        time: &TimeRange,
    ) -> Result<Vec<GroupByEntry>>;

    /// Every version of every matching object within `time`, with its tags.
    async fn full_history(
        &self,
        bbox: &BoundingBox,
        filter: &str,
        time: &TimeRange,
    ) -> Result<Vec<serde_json::Value>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert_eq!(Metric::Count.to_string(), "count");
        assert_eq!(Metric::Length.as_str(), "length");
        assert_eq!(serde_json::to_string(&Metric::Area).unwrap(), "\"area\"");
    }
}
