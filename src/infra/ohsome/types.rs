//! Response bodies of the ohsome endpoints used by this tool.

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::analyzers::timestamps::parse_date;

/// One `{"timestamp": …, "value": …}` entry of an aggregation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampValue {
    pub timestamp: String,
    pub value: f64,
}

impl TimestampValue {
    pub fn date(&self) -> Result<NaiveDate> {
        parse_date(&self.timestamp)
    }
}

/// Body of `/elements/{metric}`.
#[derive(Debug, Deserialize)]
pub struct AggregationResponse {
    pub result: Vec<TimestampValue>,
}

/// Body of `/elements/{metric}/groupBy/boundary`.
#[derive(Debug, Deserialize)]
pub struct GroupByResponse {
    #[serde(rename = "groupByResult")]
    pub group_by_result: Vec<GroupByEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupByEntry {
    #[serde(rename = "groupByObject", deserialize_with = "string_or_number")]
    pub group_by_object: String,
    pub result: Vec<TimestampValue>,
}

/// Body of `/elementsFullHistory/centroid`. Features are kept loose so one
/// malformed entry does not fail the whole response.
#[derive(Debug, Deserialize)]
pub struct FullHistoryResponse {
    pub features: Option<Vec<serde_json::Value>>,
}

/// Error body the API returns on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub status: Option<u16>,
    pub message: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "unexpected groupByObject {other}"
        ))),
    }
}
