//! Runtime configuration: API endpoint settings from the environment and the
//! named regions every command works on.

use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::infra::ohsome::DEFAULT_BASE_URL;
use crate::spatial::BoundingBox;

const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Regions used when none are configured.
pub const DEFAULT_REGIONS: &[(&str, &str)] = &[
    ("Heidelberg", "8.6581,49.3836,8.7225,49.4363"),
    ("Pokhara", "83.9142,28.1693,84.0775,28.2687"),
    ("Kathmandu", "85.26810609,27.66794937,85.3755574,27.75133958"),
    ("Manila", "120.94169186,14.55699989,121.0261672,14.63900265"),
];

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    /// Reads `OHSOME_API_URL` and `OHSOME_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("OHSOME_API_URL") {
            config.api_url = url;
        }
        if let Ok(secs) = std::env::var("OHSOME_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("OHSOME_TIMEOUT_SECS must be a number, got '{secs}'"))?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

/// Maps location names to bounding boxes.
///
/// Stored as a plain JSON object on disk:
/// ```json
/// {
///   "Heidelberg": "8.6581,49.3836,8.7225,49.4363",
///   "Pokhara": "83.9142,28.1693,84.0775,28.2687"
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Regions {
    entries: BTreeMap<String, BoundingBox>,
}

impl Default for Regions {
    fn default() -> Self {
        let entries = DEFAULT_REGIONS
            .iter()
            .filter_map(|(name, bbox)| Some((name.to_string(), bbox.parse().ok()?)))
            .collect();
        Self { entries }
    }
}

impl Regions {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Loads the regions from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading regions {path}"))?;
        let entries: BTreeMap<String, BoundingBox> = serde_json::from_str(&content)
            .with_context(|| format!("parsing regions {path}"))?;
        if entries.is_empty() {
            bail!("{path} defines no regions");
        }
        Ok(Self { entries })
    }

    /// Builds the working set from an optional file plus `name=w,s,e,n`
    /// overrides. Without either the built-in regions are used.
    pub fn resolve(path: Option<&str>, overrides: &[String]) -> Result<Self> {
        let mut regions = match path {
            Some(path) => Self::load(path)?,
            None if overrides.is_empty() => Self::default(),
            None => Self::empty(),
        };
        for spec in overrides {
            let (name, bbox) = parse_named_bbox(spec)?;
            regions.insert(name, bbox);
        }
        Ok(regions)
    }

    pub fn insert(&mut self, name: String, bbox: BoundingBox) {
        self.entries.insert(name, bbox);
    }

    pub fn get(&self, name: &str) -> Option<&BoundingBox> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all `(name, bbox)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoundingBox)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Parses `name=w,s,e,n`.
pub fn parse_named_bbox(spec: &str) -> Result<(String, BoundingBox)> {
    let (name, bbox) = spec
        .split_once('=')
        .with_context(|| format!("expected name=w,s,e,n, got '{spec}'"))?;
    let name = name.trim();
    if name.is_empty() {
        bail!("region name missing in '{spec}'");
    }
    Ok((name.to_string(), bbox.parse()?))
}
