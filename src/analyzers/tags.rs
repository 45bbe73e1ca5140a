//! Per-month tag cardinalities derived from full-history features.
//!
//! Every feature version is counted in each month of its validity interval.
//! The buckets then yield either the share of objects meeting a minimum tag
//! count (completeness) or the mean tag count per month.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use crate::analyzers::timestamps::monthly_stamps;
use crate::analyzers::utility::mean;

const VALID_FROM: &str = "@validFrom";
const VALID_TO: &str = "@validTo";

/// Tag count of a feature: every property that is not ohsome metadata (`@…`).
pub fn tag_count(properties: &serde_json::Map<String, Value>) -> usize {
    properties.keys().filter(|k| !k.starts_with('@')).count()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagBuckets {
    buckets: BTreeMap<NaiveDate, Vec<usize>>,
}

impl TagBuckets {
    /// Buckets all well-formed features. Malformed ones are logged and
    /// skipped; the number skipped is returned alongside.
    pub fn from_features(features: &[Value]) -> (Self, usize) {
        let mut buckets = Self::default();
        let mut skipped = 0;

        for feature in features {
            if let Err(e) = buckets.add_feature(feature) {
                warn!(error = %e, "Skipping malformed feature");
                skipped += 1;
            }
        }

        (buckets, skipped)
    }

    pub fn add_feature(&mut self, feature: &Value) -> Result<()> {
        let properties = feature
            .get("properties")
            .and_then(Value::as_object)
            .context("feature has no properties")?;
        let valid_from = properties
            .get(VALID_FROM)
            .and_then(Value::as_str)
            .context("feature has no @validFrom")?;
        let valid_to = properties
            .get(VALID_TO)
            .and_then(Value::as_str)
            .context("feature has no @validTo")?;

        self.add(valid_from, valid_to, tag_count(properties))
    }

    pub fn add(&mut self, valid_from: &str, valid_to: &str, tags: usize) -> Result<()> {
        for stamp in monthly_stamps(valid_from, valid_to)? {
            self.buckets.entry(stamp).or_default().push(tags);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Largest number of feature versions seen in any one month.
    pub fn max_objects(&self) -> usize {
        self.buckets.values().map(Vec::len).max().unwrap_or(0)
    }

    /// Share of objects per month with at least `min_tags` tags.
    pub fn completeness(&self, min_tags: usize) -> BTreeMap<NaiveDate, f64> {
        self.buckets
            .iter()
            .map(|(month, counts)| {
                let meeting = counts.iter().filter(|&&c| c >= min_tags).count();
                (*month, meeting as f64 / counts.len() as f64)
            })
            .collect()
    }

    /// Mean tag count per month.
    pub fn average(&self) -> BTreeMap<NaiveDate, f64> {
        self.buckets
            .iter()
            .map(|(month, counts)| {
                let values: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
                (*month, mean(&values))
            })
            .collect()
    }
}
