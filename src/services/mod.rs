pub mod analytics_api;

pub use analytics_api::{AnalyticsApi, Metric};
