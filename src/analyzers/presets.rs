//! Ready-made chart queries.

use crate::services::analytics_api::Metric;

/// Facilities counted for the "level 3" infrastructure chart.
pub const LEVEL3_TAGS: &[&str] = &[
    "amenity=water_point",
    "amenity=drinking_water",
    "amenity=place_of_worship",
    "amenity=clinic",
    "amenity=doctors",
    "amenity=dentist",
    "healthcare=*",
    "amenity=school",
    "amenity=college",
    "amenity=university",
    "amenity=kindergarten",
    "amenity=childcare",
    "bridge=*",
    "tunnel=*",
];

/// Tag thresholds plotted by the completeness chart when none are given.
pub const DEFAULT_STEPS: &[usize] = &[0, 3, 5, 10];

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PresetKind {
    /// Water, health, education and crossing facilities
    Level3,
    /// Named amenities
    Poi,
    /// Total road network length
    Roads,
    /// Number of buildings
    Buildings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub title: String,
    pub filter: String,
    pub metric: Metric,
}

impl PresetKind {
    pub fn preset(self) -> Preset {
        let (title, filter, metric) = match self {
            PresetKind::Level3 => ("Level 3 count", LEVEL3_TAGS.join(" or "), Metric::Count),
            PresetKind::Poi => (
                "Points of interest count",
                "name=* and amenity=*".to_string(),
                Metric::Count,
            ),
            PresetKind::Roads => (
                "Total length of road network",
                "highway=*".to_string(),
                Metric::Length,
            ),
            PresetKind::Buildings => (
                "Total count of buildings",
                "building=*".to_string(),
                Metric::Count,
            ),
        };
        Preset {
            title: title.to_string(),
            filter,
            metric,
        }
    }
}

impl Preset {
    /// A preset for an ad-hoc filter, titled after the filter itself.
    pub fn custom(filter: &str, metric: Metric) -> Self {
        Self {
            title: format!("{filter} ({metric})"),
            filter: filter.to_string(),
            metric,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level3_filter_is_disjunction() {
        let preset = PresetKind::Level3.preset();
        assert_eq!(preset.metric, Metric::Count);
        assert_eq!(preset.filter.matches(" or ").count(), LEVEL3_TAGS.len() - 1);
        assert!(preset.filter.starts_with("amenity=water_point or "));
    }

    #[test]
    fn test_roads_use_length() {
        let preset = PresetKind::Roads.preset();
        assert_eq!(preset.filter, "highway=*");
        assert_eq!(preset.metric, Metric::Length);
    }

    #[test]
    fn test_custom_title() {
        let preset = Preset::custom("shop=*", Metric::Count);
        assert_eq!(preset.title, "shop=* (count)");
    }
}
