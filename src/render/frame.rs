use anyhow::{Context, Result};
use chrono::NaiveDate;
use plotters::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::render::colormap::LinearColormap;
use crate::spatial::{CellId, Grid, GridCell};

const FRAME_SIZE: (u32, u32) = (900, 900);

/// Renders one layer at one month as filled grid cells. Only cells of
/// `location` are drawn when given, since regions can be continents apart.
#[tracing::instrument(skip(path, grid, values, colormap), fields(path = %path.display()))]
pub fn draw_frame(
    path: &Path,
    grid: &Grid,
    values: &BTreeMap<CellId, f64>,
    colormap: &LinearColormap,
    layer: &str,
    month: NaiveDate,
    location: Option<&str>,
) -> Result<()> {
    let cells: Vec<&GridCell> = grid
        .cells
        .iter()
        .filter(|c| location.is_none_or(|l| c.location == l))
        .collect();
    let extent = Grid::extent_of(cells.iter().copied()).context("no grid cells to draw")?;

    let root = SVGBackend::new(path, FRAME_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let caption = match location {
        Some(l) => format!("{layer} | {l} | {month}"),
        None => format!("{layer} | {month}"),
    };

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 20))
        .margin(12)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(extent.west..extent.east, extent.south..extent.north)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("lon")
        .y_desc("lat")
        .draw()?;

    chart.draw_series(cells.iter().map(|cell| {
        let value = values.get(&cell.id).copied().unwrap_or(0.0);
        let (r, g, b) = colormap.rgb(value);
        let points: Vec<(f64, f64)> = cell.ring().iter().map(|p| (p[0], p[1])).collect();
        Polygon::new(points, RGBColor(r, g, b).mix(0.8).filled())
    }))?;

    chart.draw_series(cells.iter().map(|cell| {
        let points: Vec<(f64, f64)> = cell.ring().iter().map(|p| (p[0], p[1])).collect();
        PathElement::new(points, WHITE.stroke_width(1))
    }))?;

    root.present()?;
    info!(cells = cells.len(), "Frame written");
    Ok(())
}
