//! Bounding boxes, distance metrics and the choropleth grid.

pub mod bbox;
pub mod grid;
pub mod projection;

pub use bbox::BoundingBox;
pub use grid::{CellId, Grid, GridCell};
pub use projection::DistanceMetric;
