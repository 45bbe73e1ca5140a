//! The style dictionary driving the choropleth: layer → month → cell → value.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analyzers::utility::value_range;
use crate::infra::ohsome::types::GroupByEntry;
use crate::spatial::CellId;

/// Values of one layer, ordered by month and cell id.
pub type Layer = BTreeMap<NaiveDate, BTreeMap<CellId, f64>>;

pub const DELTA_PREFIX: &str = "delta_";
pub const TAGS_PREFIX: &str = "tags_";

pub fn delta_layer_name(layer: &str) -> String {
    format!("{DELTA_PREFIX}{layer}")
}

pub fn tags_layer_name(filter: &str) -> String {
    format!("{TAGS_PREFIX}{filter}")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleDict {
    layers: BTreeMap<String, Layer>,
}

impl StyleDict {
    pub fn insert(&mut self, name: impl Into<String>, layer: Layer) {
        self.layers.insert(name.into(), layer);
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name)
    }

    pub fn layers(&self) -> impl Iterator<Item = (&String, &Layer)> {
        self.layers.iter()
    }

    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn timestamps(&self, name: &str) -> Vec<NaiveDate> {
        self.layer(name)
            .map(|l| l.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Cell values of `name` at `month`.
    pub fn frame(&self, name: &str, month: NaiveDate) -> Option<&BTreeMap<CellId, f64>> {
        self.layer(name)?.get(&month)
    }

    /// Min/max of a frame, used to seed the colour range.
    pub fn frame_range(&self, name: &str, month: NaiveDate) -> Option<(f64, f64)> {
        value_range(self.frame(name, month)?.values())
    }
}

/// Reshapes a groupBy/boundary response into a layer keyed by cell id.
pub fn layer_from_group_by(entries: &[GroupByEntry]) -> Result<Layer> {
    let mut layer = Layer::new();

    for entry in entries {
        let cell: CellId = entry
            .group_by_object
            .parse()
            .with_context(|| format!("groupByObject '{}' is not a cell id", entry.group_by_object))?;

        for tv in &entry.result {
            layer.entry(tv.date()?).or_default().insert(cell, tv.value);
        }
    }

    Ok(layer)
}

/// Gives every cell in `cells` a value at every month of `layer`, using zero
/// where none was reported.
pub fn backfill<I>(layer: &mut Layer, cells: I)
where
    I: IntoIterator<Item = CellId>,
{
    let cells: Vec<CellId> = cells.into_iter().collect();
    for values in layer.values_mut() {
        for &cell in &cells {
            values.entry(cell).or_insert(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::ohsome::types::TimestampValue;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn tv(ts: &str, value: f64) -> TimestampValue {
        TimestampValue {
            timestamp: ts.to_string(),
            value,
        }
    }

    #[test]
    fn test_layer_from_group_by() {
        let entries = vec![
            GroupByEntry {
                group_by_object: "0".into(),
                result: vec![tv("2020-01-01T00:00:00Z", 4.0), tv("2020-02-01T00:00:00Z", 5.0)],
            },
            GroupByEntry {
                group_by_object: "7".into(),
                result: vec![tv("2020-02-01T00:00:00Z", 1.0)],
            },
        ];
        let layer = layer_from_group_by(&entries).unwrap();

        assert_eq!(layer.len(), 2);
        assert_eq!(layer[&d(2020, 1)][&0], 4.0);
        assert_eq!(layer[&d(2020, 2)][&7], 1.0);
        assert!(!layer[&d(2020, 1)].contains_key(&7));
    }

    #[test]
    fn test_group_by_rejects_foreign_ids() {
        let entries = vec![GroupByEntry {
            group_by_object: "boundary1".into(),
            result: vec![],
        }];
        assert!(layer_from_group_by(&entries).is_err());
    }

    #[test]
    fn test_backfill_every_cell_every_month() {
        let mut layer = Layer::new();
        layer.entry(d(2020, 1)).or_default().insert(1, 2.0);
        layer.entry(d(2020, 2)).or_default().insert(2, 3.0);

        backfill(&mut layer, [1, 2, 3]);

        for values in layer.values() {
            assert_eq!(values.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        }
        assert_eq!(layer[&d(2020, 1)][&1], 2.0);
        assert_eq!(layer[&d(2020, 1)][&3], 0.0);
    }

    #[test]
    fn test_serializes_as_nested_maps() {
        let mut layer = Layer::new();
        layer.entry(d(2020, 1)).or_default().insert(12, 1.5);
        let mut style = StyleDict::default();
        style.insert("building=*", layer);

        let json = serde_json::to_value(&style).unwrap();
        assert_eq!(json["building=*"]["2020-01-01"]["12"], 1.5);

        let back: StyleDict = serde_json::from_value(json).unwrap();
        assert_eq!(back, style);
        assert_eq!(back.frame_range("building=*", d(2020, 1)), Some((1.5, 1.5)));
    }
}
