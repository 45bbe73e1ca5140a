//! Time-series and style-dictionary computations.
//!
//! This module expands validity intervals into monthly buckets, reshapes
//! ohsome responses into per-cell layers, derives completeness, average tag
//! and delta layers, and orchestrates the queries behind each chart and map.

pub mod analyzer;
pub mod delta;
pub mod presets;
pub mod style;
pub mod tags;
pub mod timestamps;
pub mod utility;
