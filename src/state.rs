use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::cache::Cache;
use crate::clock::{Clock, SystemClock};
use crate::config::{CacheBackendKind, Config};
use crate::diversifier::Diversifier;
use crate::news::{provider, FeedService};
use crate::storage::Storage;
use crate::summary::extract::HtmlExtractor;
use crate::summary::llm::OpenAiCompatClient;
use crate::summary::Summarizer;

const FEED_NAMESPACE: &str = "feed";
const BREAKING_NAMESPACE: &str = "breaking";

#[derive(Clone)]
pub struct State {
    pub cfg: Arc<Config>,
    pub storage: Arc<Storage>,
    pub feeds: Arc<FeedService>,
    pub summarizer: Arc<Summarizer>,
    pub clock: Arc<dyn Clock>,
}

impl State {
    pub async fn new(cfg: Config) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let storage = Arc::new(Storage::new(&cfg.db_path).await?);
        let feeds = Arc::new(Self::make_feeds(&cfg, &storage, &clock)?);
        let summarizer = Arc::new(Self::make_summarizer(&cfg)?);

        Ok(State {
            cfg: Arc::new(cfg),
            storage,
            feeds,
            summarizer,
            clock,
        })
    }

    fn make_feeds(
        cfg: &Config,
        storage: &Arc<Storage>,
        clock: &Arc<dyn Clock>,
    ) -> Result<FeedService> {
        let make_cache = |namespace: &str, ttl: std::time::Duration| match cfg.cache.backend {
            CacheBackendKind::Memory => Cache::in_memory(namespace, ttl, clock.clone()),

            CacheBackendKind::Sqlite => {
                Cache::persistent(namespace, ttl, clock.clone(), storage.clone())
            }
        };

        let provider =
            provider::from_config(&cfg.news).context("could not set up the news provider")?;
        info!(
            provider = ?cfg.news.provider,
            cache = ?cfg.cache.backend,
            "Set up the news feed"
        );

        Ok(FeedService::new(
            provider,
            Diversifier::from_config(&cfg.diversifier),
            make_cache(FEED_NAMESPACE, cfg.cache.feed_ttl.into()),
            make_cache(BREAKING_NAMESPACE, cfg.cache.breaking_ttl.into()),
            cfg.news.page_size,
            cfg.news.breaking_page_size,
        ))
    }

    fn make_summarizer(cfg: &Config) -> Result<Summarizer> {
        let extractor = HtmlExtractor::new(&cfg.extractor)
            .context("could not set up the article extractor")?;
        let llm = OpenAiCompatClient::new(&cfg.llm).context("could not set up the LLM client")?;

        Ok(Summarizer::new(
            Arc::new(extractor),
            Arc::new(llm),
            cfg.llm.timeout.into(),
        ))
    }
}
