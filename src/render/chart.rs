//! SVG line charts of monthly series, one panel per query.

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use plotters::prelude::*;
use std::path::Path;
use tracing::info;

use crate::series::TimeSeries;

const PANEL_HEIGHT: u32 = 380;
const CHART_WIDTH: u32 = 1200;

/// One subplot: a title, a y-axis description and the series drawn in it.
#[derive(Debug, Clone, Default)]
pub struct Panel {
    pub title: String,
    pub y_label: String,
    pub series: Vec<TimeSeries>,
}

/// Months since year 0, the x coordinate of every chart.
pub fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

pub fn month_label(index: i32) -> String {
    format!("{}-{:02}", index.div_euclid(12), index.rem_euclid(12) + 1)
}

fn x_range(panel: &Panel) -> (i32, i32) {
    let months = panel
        .series
        .iter()
        .flat_map(|s| s.points.keys())
        .map(|d| month_index(*d));
    let (lo, hi) = months.fold((i32::MAX, i32::MIN), |(lo, hi), m| (lo.min(m), hi.max(m)));
    if lo > hi {
        (0, 1)
    } else if lo == hi {
        (lo, hi + 1)
    } else {
        (lo, hi)
    }
}

fn y_range(panel: &Panel) -> (f64, f64) {
    let values = panel.series.iter().flat_map(|s| s.points.values());
    let (lo, hi) = crate::analyzers::utility::value_range(values).unwrap_or((0.0, 1.0));
    let (lo, hi) = (lo.min(0.0), hi.max(0.0));
    let hi = if hi > lo { hi + (hi - lo) * 0.05 } else { lo + 1.0 };
    (lo, hi)
}

/// Colours follow the location, stroke width follows the label, so the
/// thresholds of one region share a colour.
fn style_keys(series: &[TimeSeries]) -> (Vec<&str>, Vec<&str>) {
    let mut locations: Vec<&str> = Vec::new();
    let mut labels: Vec<&str> = Vec::new();
    for s in series {
        if !locations.contains(&s.location.as_str()) {
            locations.push(&s.location);
        }
        if !labels.contains(&s.label.as_str()) {
            labels.push(&s.label);
        }
    }
    (locations, labels)
}

/// Draws `panels` stacked vertically into an SVG file at `path`.
#[tracing::instrument(skip(path, panels), fields(path = %path.display(), panels = panels.len()))]
pub fn draw_panels(path: &Path, title: &str, panels: &[Panel]) -> Result<()> {
    let height = PANEL_HEIGHT * panels.len().max(1) as u32 + 40;
    let root = SVGBackend::new(path, (CHART_WIDTH, height)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", 26))?;

    let areas = root.split_evenly((panels.len().max(1), 1));

    for (panel, area) in panels.iter().zip(areas.iter()) {
        let (x0, x1) = x_range(panel);
        let (y0, y1) = y_range(panel);

        let mut chart = ChartBuilder::on(area)
            .caption(&panel.title, ("sans-serif", 18))
            .margin(12)
            .x_label_area_size(35)
            .y_label_area_size(70)
            .build_cartesian_2d(x0..x1, y0..y1)?;

        chart
            .configure_mesh()
            .x_labels(12)
            .x_label_formatter(&|m| month_label(*m))
            .y_desc(panel.y_label.as_str())
            .draw()?;

        let (locations, labels) = style_keys(&panel.series);

        for s in &panel.series {
            let color_index = locations.iter().position(|l| *l == s.location).unwrap_or(0);
            let width = 1 + labels.iter().position(|l| *l == s.label).unwrap_or(0) as u32;
            let style = Palette99::pick(color_index).to_rgba().stroke_width(width);

            chart
                .draw_series(LineSeries::new(
                    s.points.iter().map(|(d, v)| (month_index(*d), *v)),
                    style,
                ))?
                .label(s.legend())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
        }

        if !panel.series.is_empty() {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperLeft)
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }
    }

    root.present()?;
    info!("Chart written");
    Ok(())
}
