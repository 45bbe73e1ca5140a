//! Time-sliced choropleth: the grid, its style dictionary and the regions,
//! persisted as JSON and rendered as a standalone Leaflet page.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use geojson::GeoJson;
use serde_json::json;
use std::path::Path;
use tracing::info;

use crate::analyzers::style::StyleDict;
use crate::config::Regions;
use crate::output::{load_json, read_text, save_json};
use crate::render::colormap::LinearColormap;
use crate::render::frame::draw_frame;
use crate::spatial::Grid;

const TEMPLATE: &str = r##"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{{TITLE}}</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>
  html, body, #map { height: 100%; margin: 0; }
  .panel { background: rgba(255,255,255,0.9); padding: 6px 10px; font: 13px sans-serif; border-radius: 4px; }
  .panel label { display: block; margin: 2px 0; }
</style>
</head>
<body>
<div id="map"></div>
<script>
const GRID = {{GRID}};
const STYLE = {{STYLE}};
const REGIONS = {{REGIONS}};
const STOPS = {{STOPS}};
const INITIAL_LAYER = {{LAYER}};

const map = L.map('map');
L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
  attribution: '&copy; OpenStreetMap contributors'
}).addTo(map);

function rgb(hex) {
  return [1, 3, 5].map(i => parseInt(hex.slice(i, i + 2), 16));
}

function colorFor(value, lo, hi) {
  if (value === undefined || !(hi > lo)) return STOPS[0];
  const t = Math.min(1, Math.max(0, (value - lo) / (hi - lo))) * (STOPS.length - 1);
  const i = Math.min(Math.floor(t), STOPS.length - 2);
  const f = t - i;
  const a = rgb(STOPS[i]), b = rgb(STOPS[i + 1]);
  const c = a.map((x, k) => Math.round(x + (b[k] - x) * f));
  return `rgb(${c[0]},${c[1]},${c[2]})`;
}

const topPanel = L.control({ position: 'topright' });
topPanel.onAdd = () => {
  const div = L.DomUtil.create('div', 'panel');
  div.innerHTML =
    '<label>Select layer <select id="layer"></select></label>' +
    '<label>Location <select id="location"></select></label>';
  L.DomEvent.disableClickPropagation(div);
  return div;
};
topPanel.addTo(map);

const bottomPanel = L.control({ position: 'bottomright' });
bottomPanel.onAdd = () => {
  const div = L.DomUtil.create('div', 'panel');
  div.innerHTML =
    '<label>TimeStamp <input id="stamp" type="range" min="0" value="0" step="1"> <span id="stamp-label"></span></label>' +
    '<label>ColorBar <input id="vmin" type="number" step="any"> &ndash; <input id="vmax" type="number" step="any"></label>';
  L.DomEvent.disableClickPropagation(div);
  return div;
};
bottomPanel.addTo(map);

const layerSelect = document.getElementById('layer');
const locationSelect = document.getElementById('location');
const slider = document.getElementById('stamp');
const stampLabel = document.getElementById('stamp-label');
const vmin = document.getElementById('vmin');
const vmax = document.getElementById('vmax');

for (const name of Object.keys(STYLE)) layerSelect.add(new Option(name, name));
for (const name of Object.keys(REGIONS)) locationSelect.add(new Option(name, name));
layerSelect.value = INITIAL_LAYER;

function dates() { return Object.keys(STYLE[layerSelect.value] || {}).sort(); }
function frame() { return (STYLE[layerSelect.value] || {})[dates()[slider.value]] || {}; }

function resetRange() {
  const values = Object.values(frame());
  vmin.value = values.length ? Math.min(0, ...values) : 0;
  vmax.value = values.length ? Math.max(...values) : 1;
}

const cells = L.geoJSON(GRID, {
  style: feature => ({
    fillColor: colorFor(frame()[feature.id], +vmin.value, +vmax.value),
    color: 'white',
    weight: 1,
    dashArray: '5, 5',
    fillOpacity: 0.8
  })
}).bindTooltip(l => `${l.feature.id}: ${frame()[l.feature.id] ?? ''}`).addTo(map);

function redraw() {
  stampLabel.textContent = dates()[slider.value] || '';
  cells.setStyle(cells.options.style);
}

function onLayer() {
  slider.max = Math.max(0, dates().length - 1);
  slider.value = Math.min(slider.value, slider.max);
  resetRange();
  redraw();
}

function zoomTo(name) {
  const [w, s, e, n] = REGIONS[name];
  map.fitBounds([[s, w], [n, e]]);
}

layerSelect.addEventListener('change', onLayer);
slider.addEventListener('input', () => { resetRange(); redraw(); });
vmin.addEventListener('change', redraw);
vmax.addEventListener('change', redraw);
locationSelect.addEventListener('change', () => zoomTo(locationSelect.value));

onLayer();
zoomTo(locationSelect.value);
</script>
</body>
</html>
"##;

/// Embeds JSON in a `<script>` block without letting it close the tag.
fn script_json(value: &serde_json::Value) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

pub struct ChoroplethMap {
    pub regions: Regions,
    pub grid: Grid,
    pub style: StyleDict,
}

impl ChoroplethMap {
    pub fn new(regions: Regions, grid: Grid, style: StyleDict) -> Self {
        Self {
            regions,
            grid,
            style,
        }
    }

    /// Loads a style dictionary and grid written by [`ChoroplethMap::save`].
    pub fn load(style_path: &Path, grid_path: &Path, regions: Regions) -> Result<Self> {
        let style: StyleDict = load_json(style_path)
            .with_context(|| format!("loading style {}", style_path.display()))?;
        let geojson: GeoJson = read_text(grid_path)?
            .parse()
            .with_context(|| format!("parsing grid {}", grid_path.display()))?;
        let grid = Grid::from_geojson(geojson)?;
        info!(cells = grid.len(), layers = style.layer_names().count(), "Map loaded");
        Ok(Self::new(regions, grid, style))
    }

    pub fn save(&self, style_path: &Path, grid_path: &Path) -> Result<()> {
        save_json(style_path, &self.style)?;
        save_json(grid_path, &GeoJson::FeatureCollection(self.grid.to_geojson()))?;
        Ok(())
    }

    /// The regions the grid actually covers. Known regions keep their box;
    /// any other location is bounded by the extent of its cells.
    pub fn locations(&self) -> Regions {
        let mut names: Vec<&str> = self.grid.cells.iter().map(|c| c.location.as_str()).collect();
        names.dedup();

        let mut locations = Regions::empty();
        for name in names {
            let bbox = self.regions.get(name).copied().or_else(|| {
                Grid::extent_of(self.grid.cells.iter().filter(|c| c.location == name))
            });
            if let Some(bbox) = bbox {
                locations.insert(name.to_string(), bbox);
            }
        }
        locations
    }

    /// The layer shown first: the requested one, else the first by name.
    pub fn pick_layer(&self, requested: Option<&str>) -> Result<String> {
        match requested {
            Some(name) if self.style.layer(name).is_some() => Ok(name.to_string()),
            Some(name) => bail!(
                "layer '{name}' not found; available: {}",
                self.style.layer_names().collect::<Vec<_>>().join(", ")
            ),
            None => self
                .style
                .layer_names()
                .next()
                .map(str::to_string)
                .context("style dictionary has no layers"),
        }
    }

    /// The month shown for `layer`: the requested one, else the first.
    pub fn pick_month(&self, layer: &str, requested: Option<NaiveDate>) -> Result<NaiveDate> {
        let months = self.style.timestamps(layer);
        match requested {
            Some(month) if months.contains(&month) => Ok(month),
            Some(month) => bail!("layer '{layer}' has no values for {month}"),
            None => months
                .first()
                .copied()
                .with_context(|| format!("layer '{layer}' is empty")),
        }
    }

    pub fn to_html(&self, layer: Option<&str>) -> Result<String> {
        let layer = self.pick_layer(layer)?;

        let regions: serde_json::Map<String, serde_json::Value> = self
            .locations()
            .iter()
            .map(|(name, b)| (name.to_string(), json!([b.west, b.south, b.east, b.north])))
            .collect();
        let stops = LinearColormap::yl_or_rd(0.0, 1.0).stop_hexes();

        let html = TEMPLATE
            .replace("{{TITLE}}", "ohsome choropleth")
            .replace(
                "{{GRID}}",
                &script_json(&serde_json::to_value(GeoJson::FeatureCollection(
                    self.grid.to_geojson(),
                ))?)?,
            )
            .replace("{{STYLE}}", &script_json(&serde_json::to_value(&self.style)?)?)
            .replace("{{REGIONS}}", &script_json(&serde_json::Value::Object(regions))?)
            .replace("{{STOPS}}", &script_json(&json!(stops))?)
            .replace("{{LAYER}}", &script_json(&json!(layer))?);

        Ok(html)
    }

    pub fn write_html(&self, path: &Path, layer: Option<&str>) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_html(layer)?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "Map page written");
        Ok(())
    }

    /// Writes one layer/month as a static SVG, coloured from zero to the
    /// frame's maximum.
    pub fn write_frame(
        &self,
        path: &Path,
        layer: Option<&str>,
        month: Option<NaiveDate>,
        location: Option<&str>,
    ) -> Result<()> {
        let layer = self.pick_layer(layer)?;
        let month = self.pick_month(&layer, month)?;
        let values = self
            .style
            .frame(&layer, month)
            .with_context(|| format!("layer '{layer}' has no values for {month}"))?;

        let (lo, hi) = self.style.frame_range(&layer, month).unwrap_or((0.0, 1.0));
        let colormap = LinearColormap::yl_or_rd(lo.min(0.0), hi);

        let location = location.or_else(|| self.grid.cells.first().map(|c| c.location.as_str()));
        draw_frame(path, &self.grid, values, &colormap, &layer, month, location)
    }
}
