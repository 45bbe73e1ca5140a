mod client;
mod basic;

pub use client::HttpClient;
pub use basic::BasicClient;

use anyhow::{Result, anyhow};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request, Url};
use tracing::debug;

/// A POST request to `url` with `params` as an `application/x-www-form-urlencoded` body.
pub fn form_request(url: &str, params: &[(&str, String)]) -> Result<Request> {
    let url: Url = url.parse()?;

    let mut encoder = url.clone();
    encoder.set_query(None);
    encoder
        .query_pairs_mut()
        .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
    let body = encoder.query().unwrap_or_default().to_string();

    let mut req = Request::new(Method::POST, url);
    req.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );
    *req.body_mut() = Some(body.into());
    Ok(req)
}

/// Posts `params` form-encoded to `url` and returns the response body.
///
/// Non-success statuses are turned into errors carrying the status and the
/// body the server sent back.
pub async fn post_form<C: HttpClient>(
    client: &C,
    url: &str,
    params: &[(&str, String)],
) -> Result<Vec<u8>> {
    let req = form_request(url, params)?;

    let resp = client.execute(req).await?;
    let status = resp.status();
    let bytes = resp.bytes().await?.to_vec();
    debug!(url, %status, bytes = bytes.len(), "Response received");

    if !status.is_success() {
        let body = String::from_utf8_lossy(&bytes);
        return Err(anyhow!("{} returned status {}: {}", url, status, body));
    }

    Ok(bytes)
}
