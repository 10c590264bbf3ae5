use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::news::article::{RawArticle, RawPage};
use crate::news::NewsError;

use super::{endpoint_url, get_json, require_key, NewsProvider};

pub const DEFAULT_BASE_URL: &str = "https://newsapi.org/v2";

const HEADLINES_CATEGORY: &str = "general";

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Response {
    status: String,

    #[serde(default)]
    total_results: u64,

    #[serde(default)]
    articles: Vec<RawArticle>,

    #[serde(default)]
    code: Option<String>,

    #[serde(default)]
    message: Option<String>,
}

impl Response {
    fn into_page(self) -> Result<RawPage, NewsError> {
        if self.status != "ok" {
            return Err(NewsError::Provider(format!(
                "{}: {}",
                self.code.as_deref().unwrap_or("unknown"),
                self.message.as_deref().unwrap_or("no message"),
            )));
        }

        Ok(RawPage {
            total_results: self.total_results,
            articles: self.articles,
        })
    }
}

pub struct NewsApiClient {
    http_client: Client,
    base_url: Url,
    api_key: Option<String>,
    lang: String,
}

impl NewsApiClient {
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
impl NewsProvider for NewsApiClient {
    #[instrument(level = "DEBUG", skip(self))]
    async fn search(&self, query: &str, page: u32, page_size: u32) -> Result<RawPage, NewsError> {
        let api_key = require_key(&self.api_key)?;
        let page_str = page.to_string();
        let page_size = page_size.to_string();

        let request = self
            .http_client
            .get(endpoint_url(&self.base_url, "everything"))
            .query(&[
                ("q", query),
                ("language", self.lang.as_str()),
                ("page", page_str.as_str()),
                ("pageSize", page_size.as_str()),
                ("apiKey", api_key),
            ]);

        let result = get_json::<Response>(request).await?.into_page()?;
        debug!(
            total = result.total_results,
            received = result.articles.len(),
            "Fetched search results from NewsAPI"
        );

        Ok(result)
    }

    #[instrument(level = "DEBUG", skip(self))]
    async fn top_headlines(&self, page_size: u32) -> Result<RawPage, NewsError> {
        let api_key = require_key(&self.api_key)?;
        let page_size = page_size.to_string();

        let request = self
            .http_client
            .get(endpoint_url(&self.base_url, "top-headlines"))
            .query(&[
                ("category", HEADLINES_CATEGORY),
                ("pageSize", page_size.as_str()),
                ("apiKey", api_key),
            ]);

        let result = get_json::<Response>(request).await?.into_page()?;
        debug!(
            received = result.articles.len(),
            "Fetched top headlines from NewsAPI"
        );

        Ok(result)
    }
}
