mod gnews;
mod newsapi;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::config::{NewsConfig, NewsProviderKind};

use super::article::RawPage;
use super::NewsError;

pub use self::gnews::GNewsClient;
pub use self::newsapi::NewsApiClient;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ERROR_EXCERPT: usize = 200;

/// A third-party news search API.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    /// Searches articles matching `query`. `page` starts at 1.
    async fn search(&self, query: &str, page: u32, page_size: u32) -> Result<RawPage, NewsError>;

    /// Fetches the current top headlines.
    async fn top_headlines(&self, page_size: u32) -> Result<RawPage, NewsError>;
}

pub fn from_config(cfg: &NewsConfig) -> Result<Arc<dyn NewsProvider>> {
    let http_client = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(cfg.timeout.into())
        .build()
        .context("could not create an HTTP client")?;

    let base_url = |default: &str| {
        let base_url = cfg.base_url.as_deref().unwrap_or(default);

        Url::parse(base_url).with_context(|| anyhow!("invalid news provider URL `{base_url}`"))
    };

    let provider: Arc<dyn NewsProvider> = match cfg.provider {
        NewsProviderKind::GNews => Arc::new(GNewsClient::new(
            http_client,
            base_url(gnews::DEFAULT_BASE_URL)?,
            cfg.api_key.clone(),
            cfg.lang.clone(),
        )),

        NewsProviderKind::NewsApi => Arc::new(NewsApiClient::new(
            http_client,
            base_url(newsapi::DEFAULT_BASE_URL)?,
            cfg.api_key.clone(),
            cfg.lang.clone(),
        )),
    };

    Ok(provider)
}

/// Returns the API key, or fails before anything touches the network.
fn require_key(api_key: &Option<String>) -> Result<&str, NewsError> {
    api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or(NewsError::MissingApiKey)
}

/// Appends `endpoint` to the path of `base`, keeping whatever prefix the base has.
fn endpoint_url(base: &Url, endpoint: &str) -> Url {
    let mut url = base.clone();
    let path = format!("{}/{}", base.path().trim_end_matches('/'), endpoint);
    url.set_path(&path);

    url
}

async fn get_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, NewsError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    trace!(%status, len = body.len(), "Received a news provider response");

    if !status.is_success() {
        return Err(NewsError::Status {
            status,
            message: excerpt(&body),
        });
    }

    Ok(serde_json::from_str(&body)?)
}

fn excerpt(body: &str) -> String {
    let body = body.trim();

    match body.char_indices().nth(MAX_ERROR_EXCERPT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_owned(),
    }
}
