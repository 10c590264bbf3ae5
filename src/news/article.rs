use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

pub const NO_SUMMARY: &str = "No summary available.";

/// NewsAPI keeps deleted articles in its results under this title and a URL on this host.
const REMOVED_PLACEHOLDER: &str = "[Removed]";
const REMOVED_HOST: &str = "removed.com";

/// An article as the provider sent it. Any field may be missing.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RawArticle {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default, alias = "urlToImage")]
    pub image: Option<String>,

    #[serde(default, rename = "publishedAt")]
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RawPage {
    pub total_results: u64,
    pub articles: Vec<RawArticle>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub image_url: Option<String>,
    pub source_url: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub articles: Vec<Article>,
    pub total_pages: u32,
    pub current_page: u32,
}

/// Derives the article id from its URL. The same URL always yields the same id.
pub fn encode_id(source_url: &str) -> String {
    BASE64.encode(source_url)
}

#[cfg(test)]
fn decode_id(id: &str) -> Option<String> {
    let bytes = BASE64.decode(id).ok()?;

    String::from_utf8(bytes).ok()
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

fn is_removed_placeholder_url(url: &str) -> bool {
    Url::parse(url).is_ok_and(|url| url.host_str() == Some(REMOVED_HOST))
}

/// Maps a provider article to an [`Article`], or drops it if it has no title or URL.
pub fn normalize(raw: RawArticle) -> Option<Article> {
    let title = non_blank(raw.title)?;
    let source_url = non_blank(raw.url)?;

    if title == REMOVED_PLACEHOLDER || is_removed_placeholder_url(&source_url) {
        return None;
    }

    let published_at = raw
        .published_at
        .and_then(|s| OffsetDateTime::parse(s.trim(), &Rfc3339).ok());

    Some(Article {
        id: encode_id(&source_url),
        title,
        summary: non_blank(raw.description).unwrap_or_else(|| NO_SUMMARY.into()),
        image_url: non_blank(raw.image),
        source_url,
        published_at,
    })
}

pub fn normalize_all(raw: Vec<RawArticle>) -> Vec<Article> {
    let received = raw.len();
    let articles = raw.into_iter().filter_map(normalize).collect::<Vec<_>>();

    if articles.len() < received {
        debug!(
            dropped = received - articles.len(),
            "Dropped malformed articles"
        );
    }

    articles
}

pub fn total_pages(total_results: u64, page_size: u32) -> u32 {
    let page_size = u64::from(page_size.max(1));
    let pages = total_results.div_ceil(page_size).max(1);

    pages.try_into().unwrap_or(u32::MAX)
}
