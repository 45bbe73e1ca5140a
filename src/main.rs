//! CLI entry point for the ohsome trends tool.
//!
//! Provides subcommands for charting metric and tag-completeness series per
//! region, building the choropleth grid and style dictionary, and rendering
//! saved maps as HTML pages or SVG frames.

use anyhow::{Result, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use geojson::GeoJson;
use ohsome_trends::analyzers::analyzer::{
    MapOptions, build_style, completeness_series, metric_series,
};
use ohsome_trends::analyzers::presets::{DEFAULT_STEPS, Preset, PresetKind};
use ohsome_trends::analyzers::timestamps::{TimeRange, parse_date};
use ohsome_trends::config::{AppConfig, Regions};
use ohsome_trends::infra::ohsome::OhsomeClient;
use ohsome_trends::output::{append_series, print_summary, save_json, with_gzip_suffix};
use ohsome_trends::render::chart::{Panel, draw_panels};
use ohsome_trends::render::choropleth::ChoroplethMap;
use ohsome_trends::services::analytics_api::Metric;
use ohsome_trends::spatial::{DistanceMetric, Grid};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const DEFAULT_TIME: &str = "2009-11-01/2020-06-01/P1M";

#[derive(Parser)]
#[command(name = "ohsome_trends")]
#[command(about = "Charts and choropleth maps of OpenStreetMap history from the ohsome API", long_about = None)]
struct Cli {
    #[command(flatten)]
    regions: RegionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RegionArgs {
    /// JSON file mapping location names to "w,s,e,n" bounding boxes
    #[arg(long, global = true)]
    regions: Option<String>,

    /// Additional region as name=w,s,e,n (repeatable)
    #[arg(long = "bbox", value_name = "NAME=W,S,E,N", global = true)]
    bboxes: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chart counts or lengths over time for presets and/or filters
    Trend {
        /// Ready-made query (repeatable)
        #[arg(short, long, value_enum)]
        preset: Vec<PresetKind>,

        /// ohsome filter to chart (repeatable)
        #[arg(short, long)]
        filter: Vec<String>,

        /// Metric for --filter queries
        #[arg(short, long, value_enum, default_value_t = Metric::Count)]
        metric: Metric,

        /// Time range start/end/step
        #[arg(short, long, default_value = DEFAULT_TIME)]
        time: String,

        /// SVG file to write the chart to
        #[arg(short, long, default_value = "trend.svg")]
        output: PathBuf,

        /// CSV file to append the series to
        #[arg(long)]
        csv: Option<String>,
    },
    /// Chart the share of objects carrying at least N tags
    Completeness {
        /// ohsome filter to analyse (repeatable)
        #[arg(short, long, required = true)]
        filter: Vec<String>,

        /// Minimum tag counts to plot
        #[arg(short, long, value_delimiter = ',', default_values_t = DEFAULT_STEPS.to_vec())]
        steps: Vec<usize>,

        /// Time range start/end/step
        #[arg(short, long, default_value = DEFAULT_TIME)]
        time: String,

        /// SVG file to write the chart to
        #[arg(short, long, default_value = "completeness.svg")]
        output: PathBuf,

        /// CSV file to append the series to
        #[arg(long)]
        csv: Option<String>,
    },
    /// Write the choropleth grid as GeoJSON
    Grid {
        #[command(flatten)]
        grid: GridArgs,

        /// GeoJSON file to write
        #[arg(short, long, default_value = "grid.geojson")]
        output: PathBuf,
    },
    /// Query per-cell statistics and save the grid and style dictionary
    Map {
        #[command(flatten)]
        grid: GridArgs,

        /// ohsome filter, one layer each (repeatable)
        #[arg(short, long, required = true)]
        filter: Vec<String>,

        /// Metric aggregated per cell
        #[arg(short, long, value_enum, default_value_t = Metric::Count)]
        metric: Metric,

        /// Time range start/end/step
        #[arg(short, long, default_value = DEFAULT_TIME)]
        time: String,

        /// Skip the month-over-month delta layers
        #[arg(long, default_value_t = false)]
        no_delta: bool,

        /// Add average tag count layers (one full-history query per cell)
        #[arg(long, default_value_t = false)]
        tags: bool,

        /// Style dictionary output
        #[arg(long, default_value = "style.json")]
        style_out: String,

        /// Grid output
        #[arg(long, default_value = "grid.geojson")]
        grid_out: String,

        /// Gzip compress both outputs
        #[arg(long, default_value_t = false)]
        gzip: bool,

        /// Also write the HTML map page
        #[arg(long)]
        html: Option<PathBuf>,
    },
    /// Render a saved grid and style dictionary
    Render {
        /// Style dictionary written by `map`
        #[arg(long, default_value = "style.json")]
        style: PathBuf,

        /// Grid written by `map`
        #[arg(long, default_value = "grid.geojson")]
        grid: PathBuf,

        /// Interactive HTML page to write
        #[arg(long)]
        html: Option<PathBuf>,

        /// Static SVG frame to write
        #[arg(long)]
        svg: Option<PathBuf>,

        /// Layer to show first
        #[arg(short, long)]
        layer: Option<String>,

        /// Month of the SVG frame (YYYY-MM-DD)
        #[arg(long)]
        timestamp: Option<String>,

        /// Location of the SVG frame
        #[arg(long)]
        location: Option<String>,
    },
}

#[derive(Args)]
struct GridArgs {
    /// Target cell edge length in km
    #[arg(short, long, default_value_t = 1.0)]
    size: f64,

    /// How box extents are measured
    #[arg(long, value_enum, default_value_t = DistanceMetric::Utm)]
    distance: DistanceMetric,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/ohsome_trends.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("ohsome_trends.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let regions = Regions::resolve(cli.regions.regions.as_deref(), &cli.regions.bboxes)?;
    info!(regions = regions.len(), api = %config.api_url, "Configuration loaded");

    match cli.command {
        Commands::Trend {
            preset,
            filter,
            metric,
            time,
            output,
            csv,
        } => {
            let presets: Vec<Preset> = preset
                .into_iter()
                .map(PresetKind::preset)
                .chain(filter.iter().map(|f| Preset::custom(f, metric)))
                .collect();
            if presets.is_empty() {
                bail!("give at least one --preset or --filter");
            }

            let client = OhsomeClient::from_config(&config)?;
            let time: TimeRange = time.parse()?;

            let mut panels = Vec::with_capacity(presets.len());
            for preset in &presets {
                let series = metric_series(&client, &regions, preset, &time).await?;
                series.iter().for_each(print_summary);
                if let Some(path) = &csv {
                    append_series(path, &series)?;
                }
                panels.push(Panel {
                    title: preset.title.clone(),
                    y_label: preset.metric.unit().to_string(),
                    series,
                });
            }

            draw_panels(&output, "Development over time", &panels)?;
            info!(path = %output.display(), "Trend chart written");
        }
        Commands::Completeness {
            filter,
            steps,
            time,
            output,
            csv,
        } => {
            let client = OhsomeClient::from_config(&config)?;
            let time: TimeRange = time.parse()?;

            let mut panels = Vec::with_capacity(filter.len());
            for (index, f) in filter.iter().enumerate() {
                info!(filter = %f, done = index, total = filter.len(), "Querying filter");
                let series = completeness_series(&client, &regions, f, &time, &steps).await?;
                if let Some(path) = &csv {
                    append_series(path, &series)?;
                }
                panels.push(Panel {
                    title: f.clone(),
                    y_label: "share of objects".to_string(),
                    series,
                });
            }

            draw_panels(
                &output,
                "Portion of objects containing a minimum number of tags",
                &panels,
            )?;
            info!(path = %output.display(), "Completeness chart written");
        }
        Commands::Grid { grid, output } => {
            let grid = Grid::build(regions.iter(), grid.size, grid.distance)?;
            save_json(&output, &GeoJson::FeatureCollection(grid.to_geojson()))?;
            info!(cells = grid.len(), path = %output.display(), "Grid written");
        }
        Commands::Map {
            grid,
            filter,
            metric,
            time,
            no_delta,
            tags,
            style_out,
            grid_out,
            gzip,
            html,
        } => {
            let client = OhsomeClient::from_config(&config)?;
            let time: TimeRange = time.parse()?;
            let grid = Grid::build(regions.iter(), grid.size, grid.distance)?;
            info!(cells = grid.len(), "Grid built");

            let options = MapOptions {
                metric,
                delta: !no_delta,
                tags,
            };
            let style = build_style(&client, &grid, &filter, &time, options).await?;

            let (style_out, grid_out) = if gzip {
                (with_gzip_suffix(&style_out), with_gzip_suffix(&grid_out))
            } else {
                (style_out, grid_out)
            };

            let map = ChoroplethMap::new(regions, grid, style);
            map.save(Path::new(&style_out), Path::new(&grid_out))?;
            if let Some(path) = html {
                map.write_html(&path, None)?;
            }
        }
        Commands::Render {
            style,
            grid,
            html,
            svg,
            layer,
            timestamp,
            location,
        } => {
            if html.is_none() && svg.is_none() {
                bail!("nothing to render: pass --html and/or --svg");
            }

            let map = ChoroplethMap::load(&style, &grid, regions)?;
            if let Some(path) = html {
                map.write_html(&path, layer.as_deref())?;
            }
            if let Some(path) = svg {
                let month: Option<NaiveDate> = timestamp.as_deref().map(parse_date).transpose()?;
                map.write_frame(&path, layer.as_deref(), month, location.as_deref())?;
            }
        }
    }

    Ok(())
}
