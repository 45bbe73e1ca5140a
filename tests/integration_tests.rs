use anyhow::{Result, bail};
use chrono::NaiveDate;
use ohsome_trends::analyzers::analyzer::{
    MapOptions, build_style, completeness_series, metric_series, tag_layer,
};
use ohsome_trends::analyzers::presets::{DEFAULT_STEPS, PresetKind};
use ohsome_trends::analyzers::timestamps::TimeRange;
use ohsome_trends::config::Regions;
use ohsome_trends::infra::ohsome::types::{GroupByEntry, TimestampValue};
use ohsome_trends::render::choropleth::ChoroplethMap;
use ohsome_trends::services::analytics_api::{AnalyticsApi, Metric};
use ohsome_trends::spatial::{BoundingBox, DistanceMetric, Grid};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Mutex;

const MONTHS: [&str; 3] = [
    "2020-01-01T00:00:00Z",
    "2020-02-01T00:00:00Z",
    "2020-03-01T00:00:00Z",
];

/// Answers every query from canned data and remembers what was asked.
#[derive(Default)]
struct FakeApi {
    calls: Mutex<Vec<String>>,
    /// Full-history queries for these boxes fail.
    failing: Vec<BoundingBox>,
    fail_all: bool,
}

impl FakeApi {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn values(vs: [f64; 3]) -> Vec<TimestampValue> {
    MONTHS
        .iter()
        .zip(vs)
        .map(|(t, value)| TimestampValue {
            timestamp: t.to_string(),
            value,
        })
        .collect()
}

#[async_trait::async_trait]
impl AnalyticsApi for FakeApi {
    async fn aggregate(
        &self,
        metric: Metric,
        bbox: &BoundingBox,
        filter: &str,
        _time: &TimeRange,
    ) -> Result<Vec<TimestampValue>> {
        self.record(format!("aggregate {metric} {filter}"));
        Ok(values([bbox.west, bbox.west * 2.0, bbox.west * 3.0]))
    }

    async fn aggregate_by_cell(
        &self,
        metric: Metric,
        grid: &Grid,
        filter: &str,
        _time: &TimeRange,
    ) -> Result<Vec<GroupByEntry>> {
        self.record(format!("by_cell {metric} {filter}"));
        // Only the first cell has data; the rest must be backfilled.
        Ok(vec![GroupByEntry {
            group_by_object: grid.cells[0].id.to_string(),
            result: values([1.0, 3.0, 6.0]),
        }])
    }

    async fn full_history(
        &self,
        bbox: &BoundingBox,
        filter: &str,
        _time: &TimeRange,
    ) -> Result<Vec<Value>> {
        self.record(format!("history {filter}"));
        if self.fail_all || self.failing.contains(bbox) {
            bail!("full-history response for {bbox} has no features");
        }
        Ok(vec![
            json!({
                "type": "Feature",
                "properties": {
                    "@osmId": "way/1",
                    "@validFrom": "2020-01-15T00:00:00Z",
                    "@validTo": "2020-03-10T00:00:00Z",
                    "building": "yes",
                    "name": "Hall"
                }
            }),
            json!({
                "type": "Feature",
                "properties": {
                    "@osmId": "way/2",
                    "@validFrom": "2020-02-01T00:00:00Z",
                    "@validTo": "2020-03-01T00:00:00Z",
                    "building": "school",
                    "amenity": "school",
                    "name": "School",
                    "addr:street": "Hauptstraße",
                    "roof:shape": "flat"
                }
            }),
            json!({ "type": "Feature" }),
        ])
    }
}

fn d(y: i32, m: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, 1).unwrap()
}

fn time() -> TimeRange {
    "2020-01-01/2020-03-01/P1M".parse().unwrap()
}

fn heidelberg() -> Regions {
    Regions::resolve(None, &["Heidelberg=8.6581,49.3836,8.7225,49.4363".to_string()]).unwrap()
}

#[tokio::test]
async fn test_metric_series_one_per_region() {
    let api = FakeApi::default();
    let regions = Regions::default();
    let preset = PresetKind::Roads.preset();

    let series = metric_series(&api, &regions, &preset, &time()).await.unwrap();

    assert_eq!(series.len(), regions.len());
    let locations: Vec<&str> = series.iter().map(|s| s.location.as_str()).collect();
    assert_eq!(locations, regions.names().collect::<Vec<_>>());

    let heidelberg = series.iter().find(|s| s.location == "Heidelberg").unwrap();
    assert_eq!(heidelberg.points.len(), 3);
    assert_eq!(heidelberg.points[&d(2020, 3)], 8.6581 * 3.0);

    assert!(api.calls().iter().all(|c| c == "aggregate length highway=*"));
}

#[tokio::test]
async fn test_completeness_series_shares() {
    let api = FakeApi::default();
    let series = completeness_series(&api, &heidelberg(), "building=*", &time(), DEFAULT_STEPS)
        .await
        .unwrap();

    assert_eq!(series.len(), DEFAULT_STEPS.len());
    let by_label = |label: &str| series.iter().find(|s| s.label == label).unwrap();

    let all = by_label(">=0");
    assert_eq!(all.points[&d(2020, 1)], 1.0);
    assert_eq!(all.points[&d(2020, 3)], 1.0);

    let three = by_label(">=3");
    assert_eq!(three.points[&d(2020, 1)], 0.0);
    assert_eq!(three.points[&d(2020, 2)], 0.5);

    let ten = by_label(">=10");
    assert!(ten.points.values().all(|v| *v == 0.0));
}

#[tokio::test]
async fn test_build_style_layers() {
    let api = FakeApi::default();
    let regions = heidelberg();
    let grid = Grid::build(regions.iter(), 2.0, DistanceMetric::Utm).unwrap();
    let first = grid.cells[0].id;
    let other = grid.cells[1].id;

    let options = MapOptions {
        metric: Metric::Count,
        delta: true,
        tags: true,
    };
    let filters = vec!["building=*".to_string()];
    let style = build_style(&api, &grid, &filters, &time(), options).await.unwrap();

    let names: Vec<&str> = style.layer_names().collect();
    assert_eq!(names, vec!["building=*", "delta_building=*", "tags_building=*"]);

    let counts = style.layer("building=*").unwrap();
    assert_eq!(counts.len(), 3);
    for frame in counts.values() {
        assert_eq!(frame.len(), grid.len());
    }
    assert_eq!(counts[&d(2020, 3)][&first], 6.0);
    assert_eq!(counts[&d(2020, 3)][&other], 0.0);

    let deltas = style.layer("delta_building=*").unwrap();
    assert!(deltas[&d(2020, 1)].values().all(|v| *v == 0.0));
    assert_eq!(deltas[&d(2020, 2)][&first], 2.0);
    assert_eq!(deltas[&d(2020, 3)][&first], 3.0);

    let tags = style.layer("tags_building=*").unwrap();
    assert_eq!(tags[&d(2020, 1)][&other], 2.0);
    assert_eq!(tags[&d(2020, 2)][&other], 3.5);

    // One grouped query, then one history query per cell.
    let calls = api.calls();
    assert_eq!(calls[0], "by_cell count building=*");
    assert_eq!(calls.len(), 1 + grid.len());
}

#[tokio::test]
async fn test_tag_layer_skips_failing_cells() {
    let regions = heidelberg();
    let grid = Grid::build(regions.iter(), 2.0, DistanceMetric::Utm).unwrap();
    let (first, broken) = (&grid.cells[0], &grid.cells[1]);

    let api = FakeApi {
        failing: vec![broken.bbox()],
        ..FakeApi::default()
    };
    let layer = tag_layer(&api, &grid, "building=*", &time()).await.unwrap();

    assert_eq!(api.calls().len(), grid.len());
    for frame in layer.values() {
        assert_eq!(frame.len(), grid.len());
        assert_eq!(frame[&broken.id], 0.0);
    }
    assert_eq!(layer[&d(2020, 1)][&first.id], 2.0);
    assert_eq!(layer[&d(2020, 2)][&first.id], 3.5);
}

#[tokio::test]
async fn test_tag_layer_fails_when_every_cell_fails() {
    let regions = heidelberg();
    let grid = Grid::build(regions.iter(), 2.0, DistanceMetric::Utm).unwrap();
    let api = FakeApi {
        fail_all: true,
        ..FakeApi::default()
    };

    let err = tag_layer(&api, &grid, "building=*", &time()).await.unwrap_err();
    assert!(format!("{err:#}").contains("has no features"), "{err:#}");
}

#[tokio::test]
async fn test_map_saves_and_renders() {
    let api = FakeApi::default();
    let regions = heidelberg();
    let grid = Grid::build(regions.iter(), 2.0, DistanceMetric::Utm).unwrap();
    let filters = vec!["building=*".to_string()];
    let style = build_style(&api, &grid, &filters, &time(), MapOptions::default())
        .await
        .unwrap();

    let dir = std::env::temp_dir().join("ohsome_trends_integration");
    let style_path = dir.join("style.json.gz");
    let grid_path = dir.join("grid.geojson");
    let _ = std::fs::remove_dir_all(&dir);

    ChoroplethMap::new(regions.clone(), grid.clone(), style.clone())
        .save(&style_path, &grid_path)
        .unwrap();
    let map = ChoroplethMap::load(&style_path, &grid_path, regions).unwrap();
    assert_eq!(map.style, style);
    assert_eq!(map.grid.len(), grid.len());

    let html = dir.join("map.html");
    map.write_html(&html, Some("delta_building=*")).unwrap();
    let page = std::fs::read_to_string(&html).unwrap();
    assert!(page.contains("delta_building=*"));

    let svg = dir.join("frame.svg");
    map.write_frame(&svg, None, Some(d(2020, 2)), None).unwrap();
    assert!(std::fs::read_to_string(&svg).unwrap().contains("<svg"));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_default_regions_grid_ids_are_unique() {
    let regions = Regions::default();
    let grid = Grid::build(regions.iter(), 1.0, DistanceMetric::Utm).unwrap();

    let ids: HashSet<u32> = grid.ids().collect();
    assert_eq!(ids.len(), grid.len());

    let names: HashSet<&str> = regions.names().collect();
    for location in &names {
        assert!(grid.cells.iter().any(|c| c.location == *location));
    }
    assert!(grid.cells.iter().all(|c| names.contains(c.location.as_str())));
}
