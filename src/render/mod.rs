//! Charts, choropleth pages and static map frames.

pub mod chart;
pub mod choropleth;
pub mod colormap;
pub mod frame;
