use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use http_cache_reqwest::{Cache, HttpCache, MokaCache, MokaManager};
use regex_lite::Regex;
use reqwest::{StatusCode, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::ExtractorConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the body text of an article is looked for, in order of preference.
const CONTENT_SCOPES: &[&str] = &["article p", "main p", "p"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub title: Option<String>,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("could not fetch `{url}`")]
    Fetch {
        url: Url,
        #[source]
        source: reqwest_middleware::Error,
    },

    #[error("`{url}` responded with {status}")]
    Status { url: Url, status: StatusCode },

    #[error("could not read the page at `{url}`")]
    Body {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("the page at `{url}` is larger than {limit} bytes")]
    TooLarge { url: Url, limit: u64 },
}

/// Isolates the main text of an article from the page it is published on.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, url: &Url) -> Result<ExtractedArticle, ExtractError>;
}

pub struct HtmlExtractor {
    http_client: ClientWithMiddleware,
    max_page_size: u64,
}

impl HtmlExtractor {
    pub fn new(cfg: &ExtractorConfig) -> anyhow::Result<Self> {
        let http_client = ClientBuilder::new(
            reqwest::Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .read_timeout(READ_TIMEOUT)
                .timeout(cfg.timeout.into())
                .build()
                .context("could not create an HTTP client")?,
        )
        .with(Cache(HttpCache {
            mode: Default::default(),
            manager: MokaManager::new(
                MokaCache::builder()
                    .max_capacity(cfg.cache_capacity)
                    .build(),
            ),
            options: Default::default(),
        }))
        .build();

        Ok(Self {
            http_client,
            max_page_size: cfg.max_page_size,
        })
    }
}

#[async_trait]
impl Extractor for HtmlExtractor {
    #[instrument(level = "DEBUG", skip(self, url), fields(%url))]
    async fn extract(&self, url: &Url) -> Result<ExtractedArticle, ExtractError> {
        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| ExtractError::Fetch {
                url: url.clone(),
                source,
            })?;

        let status = response.status();

        if !status.is_success() {
            return Err(ExtractError::Status {
                url: url.clone(),
                status,
            });
        }

        let body = read_capped(response, url, self.max_page_size).await?;
        let article = extract_text(&body);
        debug!(chars = article.text.chars().count(), "Extracted the article text");

        Ok(article)
    }
}

/// Reads the response body, giving up as soon as it grows past `limit` bytes.
async fn read_capped(
    mut response: reqwest::Response,
    url: &Url,
    limit: u64,
) -> Result<String, ExtractError> {
    let too_large = || ExtractError::TooLarge {
        url: url.clone(),
        limit,
    };

    if response.content_length().is_some_and(|len| len > limit) {
        return Err(too_large());
    }

    let mut body = Vec::new();

    while let Some(chunk) = response.chunk().await.map_err(|source| ExtractError::Body {
        url: url.clone(),
        source,
    })? {
        if (body.len() + chunk.len()) as u64 > limit {
            return Err(too_large());
        }

        body.extend_from_slice(&chunk);
    }

    Ok(String::from_utf8_lossy(&body).into_owned())
}

fn selector(s: &str) -> Selector {
    Selector::parse(s).unwrap()
}

pub fn extract_text(html: &str) -> ExtractedArticle {
    let document = Html::parse_document(html);

    let title = document
        .select(&selector("title"))
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|title| !title.is_empty());

    let text = CONTENT_SCOPES
        .iter()
        .map(|scope| {
            let paragraphs = document
                .select(&selector(scope))
                .map(|p| collapse_whitespace(&p.text().collect::<Vec<_>>().join(" ")))
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>();

            paragraphs.join(" ")
        })
        .find(|text| !text.is_empty())
        .unwrap_or_default();

    ExtractedArticle { title, text }
}

/// Replaces markup with spaces and squeezes whitespace runs.
pub fn strip_html(text: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();

    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]+>").unwrap());

    collapse_whitespace(&tag.replace_all(text, " "))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
