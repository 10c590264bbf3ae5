use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::news::article::{RawArticle, RawPage};
use crate::news::NewsError;

use super::{endpoint_url, get_json, require_key, NewsProvider};

pub const DEFAULT_BASE_URL: &str = "https://gnews.io/api/v4";

const BREAKING_NEWS_TOPIC: &str = "breaking-news";

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Response {
    #[serde(default)]
    total_articles: u64,

    #[serde(default)]
    articles: Vec<RawArticle>,

    #[serde(default)]
    errors: Option<Value>,
}

impl Response {
    fn into_page(self) -> Result<RawPage, NewsError> {
        if let Some(errors) = self.errors {
            return Err(NewsError::Provider(errors.to_string()));
        }

        Ok(RawPage {
            total_results: self.total_articles,
            articles: self.articles,
        })
    }
}

pub struct GNewsClient {
    http_client: Client,
    base_url: Url,
    api_key: Option<String>,
    lang: String,
}

impl GNewsClient {
    pub fn new(http_client: Client, base_url: Url, api_key: Option<String>, lang: String) -> Self {
        Self {
            http_client,
            base_url,
            api_key,
            lang,
        }
    }
}

#[async_trait]
impl NewsProvider for GNewsClient {
    #[instrument(level = "DEBUG", skip(self))]
    async fn search(&self, query: &str, page: u32, page_size: u32) -> Result<RawPage, NewsError> {
        let api_key = require_key(&self.api_key)?;
        let page_str = page.to_string();
        let max = page_size.to_string();

        let request = self
            .http_client
            .get(endpoint_url(&self.base_url, "search"))
            .query(&[
                ("q", query),
                ("lang", self.lang.as_str()),
                ("max", max.as_str()),
                ("page", page_str.as_str()),
                ("token", api_key),
            ]);

        let result = get_json::<Response>(request).await?.into_page()?;
        debug!(
            total = result.total_results,
            received = result.articles.len(),
            "Fetched search results from GNews"
        );

        Ok(result)
    }

    #[instrument(level = "DEBUG", skip(self))]
    async fn top_headlines(&self, page_size: u32) -> Result<RawPage, NewsError> {
        let api_key = require_key(&self.api_key)?;
        let max = page_size.to_string();

        let request = self
            .http_client
            .get(endpoint_url(&self.base_url, "top-headlines"))
            .query(&[
                ("topic", BREAKING_NEWS_TOPIC),
                ("lang", self.lang.as_str()),
                ("max", max.as_str()),
                ("token", api_key),
            ]);

        let result = get_json::<Response>(request).await?.into_page()?;
        debug!(
            received = result.articles.len(),
            "Fetched top headlines from GNews"
        );

        Ok(result)
    }
}
