use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::cache::Cache;
use crate::diversifier::Diversifier;

use super::article::{normalize_all, total_pages, Article, FeedPage};
use super::{NewsError, NewsProvider};

const BREAKING_NEWS_KEY: &str = "top-headlines";

/// Serves paginated feeds and breaking news, going upstream only when the cache cannot answer.
pub struct FeedService {
    provider: Arc<dyn NewsProvider>,
    diversifier: Diversifier,
    feed_cache: Cache,
    breaking_cache: Cache,
    page_size: u32,
    breaking_page_size: u32,
}

impl FeedService {
    pub fn new(
        provider: Arc<dyn NewsProvider>,
        diversifier: Diversifier,
        feed_cache: Cache,
        breaking_cache: Cache,
        page_size: u32,
        breaking_page_size: u32,
    ) -> Self {
        Self {
            provider,
            diversifier,
            feed_cache,
            breaking_cache,
            page_size: page_size.max(1),
            breaking_page_size: breaking_page_size.max(1),
        }
    }

    /// The search term a request for `category` is served with.
    fn effective_query(&self, category: Option<&str>) -> String {
        match category.map(str::trim).filter(|c| !c.is_empty()) {
            Some(category) => self.diversifier.resolve_category(category),
            None => self.diversifier.pick_main_topic(),
        }
    }

    #[instrument(level = "INFO", skip(self))]
    pub async fn get_feed(
        &self,
        category: Option<&str>,
        page: u32,
        force: bool,
    ) -> Result<FeedPage, NewsError> {
        let page = page.max(1);
        let query = self.effective_query(category);
        let key = format!("{}:page:{page}", urlencoding::encode(&query));

        if !force {
            if let Some(feed) = lookup::<FeedPage>(&self.feed_cache, &key).await {
                debug!(%query, "Serving the feed from the cache");
                return Ok(feed);
            }
        }

        let raw = self.provider.search(&query, page, self.page_size).await?;
        let feed = FeedPage {
            articles: normalize_all(raw.articles),
            total_pages: total_pages(raw.total_results, self.page_size),
            current_page: page,
        };

        info!(
            %query,
            articles = feed.articles.len(),
            total_pages = feed.total_pages,
            "Fetched a feed page from upstream"
        );
        store(&self.feed_cache, &key, &feed).await;

        Ok(feed)
    }

    #[instrument(level = "INFO", skip(self))]
    pub async fn get_breaking_news(&self, force: bool) -> Result<Vec<Article>, NewsError> {
        if !force {
            if let Some(articles) =
                lookup::<Vec<Article>>(&self.breaking_cache, BREAKING_NEWS_KEY).await
            {
                debug!("Serving breaking news from the cache");
                return Ok(articles);
            }
        }

        let raw = self.provider.top_headlines(self.breaking_page_size).await?;
        let articles = normalize_all(raw.articles);

        info!(
            articles = articles.len(),
            "Fetched breaking news from upstream"
        );
        store(&self.breaking_cache, BREAKING_NEWS_KEY, &articles).await;

        Ok(articles)
    }
}

async fn lookup<T: DeserializeOwned>(cache: &Cache, key: &str) -> Option<T> {
    let payload = cache.get(key).await?;

    match serde_json::from_value(payload) {
        Ok(value) => Some(value),

        Err(e) => {
            warn!(
                namespace = cache.namespace(),
                %key,
                "Ignoring an undecodable cache entry: {e}"
            );
            None
        }
    }
}

async fn store<T: Serialize>(cache: &Cache, key: &str, value: &T) {
    match serde_json::to_value(value) {
        Ok(payload) => cache.set(key, payload).await,

        Err(e) => warn!(
            namespace = cache.namespace(),
            %key,
            "Could not serialize a cache entry: {e}"
        ),
    }
}
