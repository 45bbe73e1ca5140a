//! Rectangular grid covering one or more named bounding boxes.
//!
//! Each box is tiled with cells whose edges are close to the requested size
//! in kilometres. The tiling is stretched past the north/east edge of the box
//! so that every cell has the same extent. Cell ids are sequential per box and
//! offset by box so they stay unique across the whole grid.

use anyhow::{Context, Result, bail};
use geo::Rect;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value, feature::Id};
use serde_json::json;
use tracing::debug;

use crate::spatial::bbox::BoundingBox;
use crate::spatial::projection::DistanceMetric;

pub type CellId = u32;

/// Upper bound on the grid points of all boxes together, so every cell id fits
/// in a [`CellId`].
const MAX_POINTS: f64 = CellId::MAX as f64;

#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    pub id: CellId,
    pub location: String,
    pub rect: Rect<f64>,
}

impl GridCell {
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::from_rect(&self.rect)
    }

    /// Closed exterior ring: upper-left, upper-right, lower-right, lower-left.
    pub fn ring(&self) -> Vec<[f64; 2]> {
        let (min, max) = (self.rect.min(), self.rect.max());
        vec![
            [min.x, max.y],
            [max.x, max.y],
            [max.x, min.y],
            [min.x, min.y],
            [min.x, max.y],
        ]
    }
}

/// Row/column layout of a single box.
#[derive(Debug, Clone, PartialEq)]
pub struct Tiling {
    pub location: String,
    pub lat_steps: Vec<f64>,
    pub lon_steps: Vec<f64>,
}

impl Tiling {
    pub fn rows(&self) -> usize {
        self.lat_steps.len() - 1
    }

    pub fn cols(&self) -> usize {
        self.lon_steps.len() - 1
    }

    fn points(&self) -> usize {
        self.lat_steps.len() * self.lon_steps.len()
    }

    /// Lays out `bbox` with cells of roughly `size_km` edge length.
    pub fn new(
        location: &str,
        bbox: &BoundingBox,
        size_km: f64,
        metric: DistanceMetric,
    ) -> Result<Self> {
        if !(size_km > 0.0) {
            bail!("cell size must be positive, got {size_km}");
        }

        let dlat = metric.distance_km(bbox.west, bbox.south, bbox.west, bbox.north);
        let dlon = metric.distance_km(bbox.west, bbox.south, bbox.east, bbox.south);
        if !(dlat > 0.0) || !(dlon > 0.0) {
            bail!("bounding box for {location} has no extent");
        }

        let rows = (dlat / size_km).floor() + 1.0;
        let cols = (dlon / size_km).floor() + 1.0;
        if (rows + 1.0) * (cols + 1.0) > MAX_POINTS {
            bail!("cell size {size_km} km is too small for {location}: {rows} x {cols} cells");
        }
        let (rows, cols) = (rows as usize, cols as usize);
        let lat_factor = (size_km / dlat) * rows as f64;
        let lon_factor = (size_km / dlon) * cols as f64;

        let north = bbox.south + (bbox.north - bbox.south) * lat_factor;
        let east = bbox.west + (bbox.east - bbox.west) * lon_factor;

        debug!(location, dlat, dlon, rows, cols, "Tiling bounding box");

        Ok(Self {
            location: location.to_string(),
            lat_steps: linspace(bbox.south, north, rows + 1),
            lon_steps: linspace(bbox.west, east, cols + 1),
        })
    }
}

/// `count` evenly spaced values from `start` to `end`, both included.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count)
                .map(|i| if i == count - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    pub cells: Vec<GridCell>,
}

impl Grid {
    /// Tiles every box in order. Box `i` gets ids starting at `i * max_points`.
    pub fn build<'a, I>(boxes: I, size_km: f64, metric: DistanceMetric) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a BoundingBox)>,
    {
        let tilings = boxes
            .into_iter()
            .map(|(location, bbox)| Tiling::new(location, bbox, size_km, metric))
            .collect::<Result<Vec<_>>>()?;

        let max_points = tilings.iter().map(Tiling::points).max().unwrap_or(0);
        if (max_points as f64) * (tilings.len() as f64) > MAX_POINTS {
            bail!(
                "{} boxes of up to {max_points} grid points exceed the cell id range",
                tilings.len()
            );
        }

        let mut cells = Vec::new();
        for (box_index, tiling) in tilings.iter().enumerate() {
            let offset = box_index * max_points;
            let cols = tiling.cols();

            for (row, lat) in tiling.lat_steps.windows(2).enumerate() {
                for (col, lon) in tiling.lon_steps.windows(2).enumerate() {
                    let id = CellId::try_from(offset + row * cols + col)
                        .context("grid too large for 32-bit cell ids")?;
                    cells.push(GridCell {
                        id,
                        location: tiling.location.clone(),
                        rect: Rect::new((lon[0], lat[0]), (lon[1], lat[1])),
                    });
                }
            }
        }

        Ok(Self { cells })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = CellId> + '_ {
        self.cells.iter().map(|c| c.id)
    }

    /// `id:w,s,e,n|id:w,s,e,n|…` for the groupBy/boundary endpoints.
    pub fn boundaries_param(&self) -> String {
        self.cells
            .iter()
            .map(|c| format!("{}:{}", c.id, c.bbox()))
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Overall extent of all cells, if any.
    pub fn extent(&self) -> Option<BoundingBox> {
        Self::extent_of(&self.cells)
    }

    pub fn extent_of<'a, I>(cells: I) -> Option<BoundingBox>
    where
        I: IntoIterator<Item = &'a GridCell>,
    {
        let mut iter = cells.into_iter().map(|c| c.rect);
        let first = iter.next()?;
        let rect = iter.fold(first, |acc, r| {
            Rect::new(
                (acc.min().x.min(r.min().x), acc.min().y.min(r.min().y)),
                (acc.max().x.max(r.max().x), acc.max().y.max(r.max().y)),
            )
        });
        Some(BoundingBox::from_rect(&rect))
    }

    pub fn to_geojson(&self) -> FeatureCollection {
        let features = self
            .cells
            .iter()
            .map(|cell| {
                let bbox = cell.bbox();
                let mut properties = JsonObject::new();
                properties.insert("location".into(), json!(cell.location));
                properties.insert("lower_left".into(), json!([bbox.west, bbox.south]));
                properties.insert("upper_right".into(), json!([bbox.east, bbox.north]));
                properties.insert("bbox".into(), json!(bbox.to_string()));

                let ring = cell.ring().into_iter().map(|p| p.to_vec()).collect();
                Feature {
                    bbox: None,
                    geometry: Some(Geometry::new(Value::Polygon(vec![ring]))),
                    id: Some(Id::String(cell.id.to_string())),
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }

    /// Reads a grid previously written by [`Grid::to_geojson`].
    pub fn from_geojson(geojson: GeoJson) -> Result<Self> {
        let collection = match geojson {
            GeoJson::FeatureCollection(fc) => fc,
            _ => bail!("grid must be a GeoJSON FeatureCollection"),
        };

        let cells = collection
            .features
            .into_iter()
            .map(|feature| -> Result<GridCell> {
                let id = match &feature.id {
                    Some(Id::String(s)) => s.parse::<CellId>()?,
                    Some(Id::Number(n)) => n
                        .as_u64()
                        .and_then(|n| CellId::try_from(n).ok())
                        .context("grid cell id out of range")?,
                    None => bail!("grid cell without id"),
                };
                let location = feature
                    .property("location")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let bbox: BoundingBox = feature
                    .property("bbox")
                    .and_then(|v| v.as_str())
                    .with_context(|| format!("grid cell {id} has no bbox property"))?
                    .parse()?;
                Ok(GridCell {
                    id,
                    location,
                    rect: bbox.to_rect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { cells })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn heidelberg() -> BoundingBox {
        "8.6581,49.3836,8.7225,49.4363".parse().unwrap()
    }

    fn pokhara() -> BoundingBox {
        "83.9142,28.1693,84.0775,28.2687".parse().unwrap()
    }

    #[test]
    fn test_linspace_endpoints() {
        let steps = linspace(0.0, 1.0, 5);
        assert_eq!(steps, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(3.0, 4.0, 1), vec![3.0]);
        assert!(linspace(3.0, 4.0, 0).is_empty());
    }

    #[test]
    fn test_tiling_covers_box() {
        let bbox = heidelberg();
        let tiling = Tiling::new("Heidelberg", &bbox, 1.0, DistanceMetric::Utm).unwrap();

        // ~4.7 km wide, ~5.9 km tall
        assert_eq!(tiling.cols(), 5);
        assert_eq!(tiling.rows(), 6);
        assert_eq!(tiling.lat_steps[0], bbox.south);
        assert_eq!(tiling.lon_steps[0], bbox.west);
        assert!(*tiling.lat_steps.last().unwrap() >= bbox.north);
        assert!(*tiling.lon_steps.last().unwrap() >= bbox.east);
    }

    #[test]
    fn test_cells_are_close_to_requested_size() {
        let bbox = heidelberg();
        let tiling = Tiling::new("Heidelberg", &bbox, 1.0, DistanceMetric::Utm).unwrap();
        let lat = tiling.lat_steps[0];
        let (lon0, lon1) = (tiling.lon_steps[0], tiling.lon_steps[1]);
        let width = DistanceMetric::Utm.distance_km(lon0, lat, lon1, lat);
        assert!((width - 1.0).abs() < 0.01, "cell width {width}");
    }

    #[test]
    fn test_cell_count_is_rows_times_cols_per_box() {
        let (h, p) = (heidelberg(), pokhara());
        let grid = Grid::build(
            [("Heidelberg", &h), ("Pokhara", &p)],
            1.0,
            DistanceMetric::Utm,
        )
        .unwrap();

        let th = Tiling::new("Heidelberg", &h, 1.0, DistanceMetric::Utm).unwrap();
        let tp = Tiling::new("Pokhara", &p, 1.0, DistanceMetric::Utm).unwrap();

        let in_h = grid.cells.iter().filter(|c| c.location == "Heidelberg").count();
        let in_p = grid.cells.iter().filter(|c| c.location == "Pokhara").count();
        assert_eq!(in_h, th.rows() * th.cols());
        assert_eq!(in_p, tp.rows() * tp.cols());
        assert_eq!(grid.len(), in_h + in_p);
    }

    #[test]
    fn test_ids_unique_across_boxes() {
        let (h, p) = (heidelberg(), pokhara());
        let grid = Grid::build(
            [("Heidelberg", &h), ("Pokhara", &p), ("Again", &h)],
            0.5,
            DistanceMetric::Haversine,
        )
        .unwrap();

        let ids: HashSet<_> = grid.ids().collect();
        assert_eq!(ids.len(), grid.len());
    }

    #[test]
    fn test_rejects_non_positive_size() {
        let h = heidelberg();
        assert!(Grid::build([("Heidelberg", &h)], 0.0, DistanceMetric::Utm).is_err());
        assert!(Grid::build([("Heidelberg", &h)], -1.0, DistanceMetric::Utm).is_err());
    }

    #[test]
    fn test_rejects_size_beyond_cell_id_range() {
        let h = heidelberg();
        assert!(Grid::build([("Heidelberg", &h)], 1e-300, DistanceMetric::Utm).is_err());
        assert!(Tiling::new("Heidelberg", &h, 1e-6, DistanceMetric::Haversine).is_err());

        // Fine enough per box, but not for many boxes together.
        let boxes: Vec<(&str, &BoundingBox)> = (0..1000).map(|_| ("Heidelberg", &h)).collect();
        assert!(Grid::build(boxes, 0.002, DistanceMetric::Utm).is_err());
    }

    #[test]
    fn test_boundaries_param() {
        let bbox = BoundingBox::new(0.0, 0.0, 0.001, 0.001).unwrap();
        let grid = Grid::build([("tiny", &bbox)], 10.0, DistanceMetric::Utm).unwrap();
        assert_eq!(grid.len(), 1);
        let param = grid.boundaries_param();
        assert!(param.starts_with("0:0,0,"), "{param}");
        assert!(!param.contains('|'));
    }

    #[test]
    fn test_geojson_preserves_cells() {
        let h = heidelberg();
        let grid = Grid::build([("Heidelberg", &h)], 2.0, DistanceMetric::Utm).unwrap();
        let fc = grid.to_geojson();
        assert_eq!(fc.features.len(), grid.len());

        let first = &fc.features[0];
        assert_eq!(first.property("location").unwrap(), "Heidelberg");
        match &first.geometry.as_ref().unwrap().value {
            Value::Polygon(rings) => {
                assert_eq!(rings[0].len(), 5);
                assert_eq!(rings[0][0], rings[0][4]);
            }
            other => panic!("unexpected geometry {other:?}"),
        }

        let text = GeoJson::FeatureCollection(fc).to_string();
        let restored = Grid::from_geojson(text.parse().unwrap()).unwrap();
        assert_eq!(restored.ids().collect::<Vec<_>>(), grid.ids().collect::<Vec<_>>());
        assert_eq!(restored.cells[3].location, "Heidelberg");
    }

    #[test]
    fn test_extent_spans_all_cells() {
        let (h, p) = (heidelberg(), pokhara());
        let grid = Grid::build([("H", &h), ("P", &p)], 2.0, DistanceMetric::Utm).unwrap();
        let extent = grid.extent().unwrap();
        assert_eq!(extent.west, h.west);
        assert_eq!(extent.south, p.south);
        assert!(extent.east >= p.east);
        assert!(Grid::default().extent().is_none());
    }
}
