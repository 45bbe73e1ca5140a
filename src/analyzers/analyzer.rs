use anyhow::Result;
use tracing::{debug, info, warn};

use crate::analyzers::delta::add_deltas;
use crate::analyzers::presets::Preset;
use crate::analyzers::style::{Layer, StyleDict, backfill, layer_from_group_by, tags_layer_name};
use crate::analyzers::tags::TagBuckets;
use crate::analyzers::timestamps::TimeRange;
use crate::config::Regions;
use crate::series::TimeSeries;
use crate::services::analytics_api::{AnalyticsApi, Metric};
use crate::spatial::Grid;

/// Which layers [`build_style`] computes besides the per-filter metric.
#[derive(Debug, Clone, Copy)]
pub struct MapOptions {
    pub metric: Metric,
    pub delta: bool,
    pub tags: bool,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            metric: Metric::Count,
            delta: true,
            tags: false,
        }
    }
}

/// Queries `preset` for every region, one series per region.
#[tracing::instrument(skip(api, regions, time), fields(filter = %preset.filter, metric = %preset.metric))]
pub async fn metric_series<A: AnalyticsApi + ?Sized>(
    api: &A,
    regions: &Regions,
    preset: &Preset,
    time: &TimeRange,
) -> Result<Vec<TimeSeries>> {
    let mut series = Vec::with_capacity(regions.len());

    for (location, bbox) in regions.iter() {
        let values = api.aggregate(preset.metric, bbox, &preset.filter, time).await?;
        let s = TimeSeries::from_values(location, &preset.filter, "", &values)?;
        if s.is_empty() {
            warn!(location, "No values returned");
        }
        info!(location, points = s.points.len(), "Series fetched");
        series.push(s);
    }

    Ok(series)
}

/// Share of objects with at least `step` tags per month, for every region
/// and step.
#[tracing::instrument(skip(api, regions, time))]
pub async fn completeness_series<A: AnalyticsApi + ?Sized>(
    api: &A,
    regions: &Regions,
    filter: &str,
    time: &TimeRange,
    steps: &[usize],
) -> Result<Vec<TimeSeries>> {
    let mut series = Vec::with_capacity(regions.len() * steps.len());

    for (index, (location, bbox)) in regions.iter().enumerate() {
        info!(
            location,
            region = index + 1,
            regions = regions.len(),
            "Waiting for full-history response"
        );
        let features = api.full_history(bbox, filter, time).await?;
        let (buckets, skipped) = TagBuckets::from_features(&features);
        if skipped > 0 {
            warn!(location, skipped, total = features.len(), "Some features were skipped");
        }
        info!(
            location,
            objects = features.len(),
            max_per_month = buckets.max_objects(),
            "Tags bucketed"
        );

        for step in steps {
            series.push(
                TimeSeries::new(location, filter, &format!(">={step}"))
                    .with_points(buckets.completeness(*step)),
            );
        }
    }

    Ok(series)
}

/// Mean tag count per month and cell. Cells without data are zero.
///
/// A cell whose full-history query fails is logged and left at zero. The
/// layer only fails when no cell could be queried at all.
#[tracing::instrument(skip(api, grid, time), fields(cells = grid.len()))]
pub async fn tag_layer<A: AnalyticsApi + ?Sized>(
    api: &A,
    grid: &Grid,
    filter: &str,
    time: &TimeRange,
) -> Result<Layer> {
    let mut layer = Layer::new();
    let mut failed = 0;
    let mut last_error = None;

    for (index, cell) in grid.cells.iter().enumerate() {
        match api.full_history(&cell.bbox(), filter, time).await {
            Ok(features) => {
                let (buckets, skipped) = TagBuckets::from_features(&features);
                if skipped > 0 {
                    warn!(cell = cell.id, skipped, "Some features were skipped");
                }
                if buckets.is_empty() {
                    debug!(cell = cell.id, "No objects in cell");
                }

                for (month, avg) in buckets.average() {
                    layer.entry(month).or_default().insert(cell.id, avg);
                }
            }
            Err(e) => {
                warn!(cell = cell.id, error = %e, "Full-history query failed, cell left at zero");
                failed += 1;
                last_error = Some(e);
            }
        }

        if (index + 1) % 50 == 0 {
            info!(done = index + 1, total = grid.len(), "Cells processed");
        }
    }

    if let Some(e) = last_error {
        if failed == grid.len() {
            return Err(e.context(format!("full-history query failed for all {failed} cells")));
        }
        warn!(failed, total = grid.len(), "Some cells have no tag statistics");
    }

    backfill(&mut layer, grid.ids());
    Ok(layer)
}

/// Builds the full style dictionary for the choropleth: one metric layer per
/// filter, then the delta layers, then the tag layers.
#[tracing::instrument(skip(api, grid, filters, time), fields(cells = grid.len(), filters = filters.len()))]
pub async fn build_style<A: AnalyticsApi + ?Sized>(
    api: &A,
    grid: &Grid,
    filters: &[String],
    time: &TimeRange,
    options: MapOptions,
) -> Result<StyleDict> {
    let mut style = StyleDict::default();

    for filter in filters {
        let entries = api
            .aggregate_by_cell(options.metric, grid, filter, time)
            .await?;
        let mut layer = layer_from_group_by(&entries)?;
        backfill(&mut layer, grid.ids());
        info!(filter = %filter, timestamps = layer.len(), "Layer built");
        style.insert(filter.as_str(), layer);
    }

    if options.delta {
        add_deltas(&mut style);
    }

    if options.tags {
        for filter in filters {
            let layer = tag_layer(api, grid, filter, time).await?;
            style.insert(tags_layer_name(filter), layer);
        }
    }

    Ok(style)
}
