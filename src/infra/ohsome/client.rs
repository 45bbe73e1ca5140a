use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::analyzers::timestamps::TimeRange;
use crate::config::AppConfig;
use crate::fetch::{BasicClient, HttpClient, post_form};
use crate::infra::ohsome::types::{
    AggregationResponse, ApiError, FullHistoryResponse, GroupByEntry, GroupByResponse,
    TimestampValue,
};
use crate::services::analytics_api::{AnalyticsApi, Metric};
use crate::spatial::{BoundingBox, Grid};

pub const DEFAULT_BASE_URL: &str = "https://api.ohsome.org/v1";

pub struct OhsomeClient<C> {
    base_url: String,
    http: C,
}

impl OhsomeClient<BasicClient> {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let http = BasicClient::new(config.timeout, config.connect_timeout)?;
        Ok(Self::new(&config.api_url, http))
    }
}

impl<C: HttpClient> OhsomeClient<C> {
    pub fn new(base_url: &str, http: C) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let url = self.endpoint(path);
        debug!(url = %url, "Posting ohsome query");

        let bytes = post_form(&self.http, &url, params).await?;
        decode(&bytes)
    }
}

/// Parses a response body, surfacing the API's own error message when the
/// body is an error document instead of the expected shape.
fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    match serde_json::from_slice::<T>(bytes) {
        Ok(value) => Ok(value),
        Err(e) => match serde_json::from_slice::<ApiError>(bytes) {
            Ok(api_error) => Err(anyhow!(
                "ohsome API error{}: {}",
                api_error.status.map(|s| format!(" {s}")).unwrap_or_default(),
                api_error.message
            )),
            Err(_) => Err(anyhow!("Failed to parse ohsome response: {}", e)),
        },
    }
}

#[async_trait]
impl<C: HttpClient> AnalyticsApi for OhsomeClient<C> {
    #[tracing::instrument(skip(self, time), fields(time = %time))]
    async fn aggregate(
        &self,
        metric: Metric,
        bbox: &BoundingBox,
        filter: &str,
        time: &TimeRange,
    ) -> Result<Vec<TimestampValue>> {
        let params = [
            ("bboxes", bbox.to_string()),
            ("filter", filter.to_string()),
            ("time", time.to_string()),
        ];
        let body: AggregationResponse = self
            .post(&format!("elements/{}", metric.as_str()), &params)
            .await?;
        debug!(points = body.result.len(), "Aggregation received");
        Ok(body.result)
    }

    #[tracing::instrument(skip(self, grid, time), fields(cells = grid.len(), time = %time))]
    async fn aggregate_by_cell(
        &self,
        metric: Metric,
        grid: &Grid,
        filter: &str,
        time: &TimeRange,
    ) -> Result<Vec<GroupByEntry>> {
        let params = [
            ("bboxes", grid.boundaries_param()),
            ("filter", filter.to_string()),
            ("time", time.to_string()),
        ];
        let body: GroupByResponse = self
            .post(
                &format!("elements/{}/groupBy/boundary", metric.as_str()),
                &params,
            )
            .await?;
        info!(groups = body.group_by_result.len(), "Grouped aggregation received");
        Ok(body.group_by_result)
    }

    #[tracing::instrument(skip(self, bbox, time), fields(bbox = %bbox, time = %time))]
    async fn full_history(
        &self,
        bbox: &BoundingBox,
        filter: &str,
        time: &TimeRange,
    ) -> Result<Vec<serde_json::Value>> {
        let params = [
            ("bboxes", bbox.to_string()),
            ("filter", filter.to_string()),
            ("time", time.history_interval()),
            ("properties", "tags".to_string()),
        ];
        let body: FullHistoryResponse = self
            .post("elementsFullHistory/centroid", &params)
            .await?;

        let features = body
            .features
            .ok_or_else(|| anyhow!("full-history response for {bbox} has no features"))?;
        debug!(features = features.len(), "Full history received");
        Ok(features)
    }
}
