use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes prepared requests. Lets the ohsome client run over any transport.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
