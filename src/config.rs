mod types;

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use take_mut::take;
use tracing::{debug, info};

pub use self::types::*;

#[derive(Deserialize, Debug, Clone)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    pub bind_addr: String,
    pub db_path: PathBuf,
    pub cors_origin: Option<String>,
    pub news: NewsConfig,
    pub cache: CacheConfig,
    pub llm: LlmConfig,
    pub extractor: ExtractorConfig,
    pub diversifier: DiversifierConfig,
}

impl Config {
    pub fn update(&mut self, args: crate::cli::Args) {
        fn set_if_some<T>(dst: &mut T, v: Option<T>) {
            if let Some(v) = v {
                *dst = v;
            }
        }

        set_if_some(&mut self.bind_addr, args.bind_addr);
        set_if_some(&mut self.db_path, args.db_path);
        set_if_some(&mut self.news.api_key, args.news_api_key.map(Some));
        set_if_some(&mut self.llm.api_key, args.llm_api_key.map(Some));
        set_if_some(&mut self.llm.model, args.llm_model);
    }

    pub fn resolve_relative_paths(&mut self, config_dir: impl AsRef<Path>) {
        let config_dir = config_dir.as_ref();

        take(self, |this| Self {
            db_path: config_dir.join(&this.db_path),
            ..this
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "127.0.0.1:5000".into(),
            db_path: "./nexbrief.sqlite3".into(),
            cors_origin: None,
            news: Default::default(),
            cache: Default::default(),
            llm: Default::default(),
            extractor: Default::default(),
            diversifier: Default::default(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct NewsConfig {
    pub provider: NewsProviderKind,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub lang: String,
    pub page_size: u32,
    pub breaking_page_size: u32,
    pub timeout: Duration,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            provider: Default::default(),
            base_url: None,
            api_key: None,
            lang: "en".into(),
            page_size: 10,
            breaking_page_size: 5,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub feed_ttl: Duration,
    pub breaking_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: Default::default(),
            feed_ttl: Duration::from_mins(10),
            breaking_ttl: Duration::from_mins(10),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.together.xyz/v1".into(),
            api_key: None,
            model: "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo".into(),
            timeout: Duration::from_secs(30),
            max_tokens: 200,
            temperature: 0.5,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ExtractorConfig {
    pub timeout: Duration,
    pub cache_capacity: u64,

    /// Pages larger than this many bytes are not extracted.
    pub max_page_size: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            cache_capacity: 1024,
            max_page_size: 5 * 1024 * 1024,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct DiversifierConfig {
    /// Replaces the built-in list of general feed topics.
    pub topics: Option<Vec<String>>,

    /// Umbrella categories and their keywords, merged over the built-in ones.
    pub categories: HashMap<String, Vec<String>>,
}

pub fn load(search_paths: &[PathBuf]) -> Result<Config> {
    for path in search_paths {
        debug!("Trying to load {}", path.display());
        let mut contents = String::new();

        {
            let mut f = match File::open(path) {
                Ok(f) => f,

                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(file = %path.display(), "File not found, skipping");
                    continue;
                }

                Err(e) => {
                    return Err(e)
                        .context(anyhow!("could not load a config file `{}`", path.display()));
                }
            };

            f.read_to_string(&mut contents).with_context(|| {
                anyhow!(
                    "could not read the contents of a config file `{}`",
                    path.display()
                )
            })?;
        }

        let mut cfg = parse(&contents)
            .with_context(|| anyhow!("could not load the config file `{}`", path.display()))?;

        if let Some(parent) = path.parent() {
            cfg.resolve_relative_paths(parent);
        }

        info!("Loaded a config file `{}`", path.display());

        return Ok(cfg);
    }

    info!("Using the default config");

    Ok(Default::default())
}

fn parse(contents: &str) -> Result<Config> {
    Ok(toml::from_str(contents)?)
}
