pub mod extract;
pub mod llm;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::news::article::NO_SUMMARY;

use self::extract::{strip_html, Extractor};
use self::llm::{ChatModel, LlmError};

/// How much of the article text is sent to the model.
const MAX_PROMPT_CHARS: usize = 2000;

/// How much of the article text is shown when the model is unavailable.
const MAX_FALLBACK_CHARS: usize = 300;

const DEFAULT_LANG: &str = "en";

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SummaryRequest {
    pub url: Option<String>,
    pub lang: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    Summarized {
        summary: String,
        full_article: String,
    },

    /// The model could not be used, so `summary` is an excerpt of the text.
    Degraded {
        summary: String,
        full_article: String,
        reason: String,
    },

    /// The article at the requested URL could not be fetched or parsed.
    ExtractionFailed,
}

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("URL or text is required")]
    MissingInput,
}

pub struct Summarizer {
    extractor: Arc<dyn Extractor>,
    llm: Arc<dyn ChatModel>,
    llm_timeout: Duration,
}

fn non_blank(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Summarizer {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        llm: Arc<dyn ChatModel>,
        llm_timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            llm,
            llm_timeout,
        }
    }

    #[instrument(level = "DEBUG", skip_all, fields(url = req.url.as_deref()))]
    pub async fn summarize(&self, req: SummaryRequest) -> Result<Summary, SummaryError> {
        let url = non_blank(&req.url);
        let title = non_blank(&req.title);
        let summary = non_blank(&req.summary);

        if url.is_none() && title.is_none() && summary.is_none() {
            return Err(SummaryError::MissingInput);
        }

        let mut text = String::new();

        if let Some(url) = url {
            text = match self.extract(url).await {
                Some(text) => text,
                None => return Ok(Summary::ExtractionFailed),
            };
        }

        if text.is_empty() {
            text = strip_html(summary.or(title).unwrap_or_default());
        }

        if text.is_empty() {
            return Ok(Summary::Summarized {
                summary: NO_SUMMARY.into(),
                full_article: String::new(),
            });
        }

        let lang = non_blank(&req.lang).unwrap_or(DEFAULT_LANG);

        match self.ask_model(&text, lang).await {
            Ok(summary) => Ok(Summary::Summarized {
                summary,
                full_article: text,
            }),

            Err(e) => {
                warn!(error = %e, "AI summarization failed, falling back to an excerpt");

                Ok(Summary::Degraded {
                    summary: excerpt(&text, MAX_FALLBACK_CHARS),
                    full_article: text,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Returns the plain text of the article, or `None` if it cannot be obtained.
    async fn extract(&self, url: &str) -> Option<String> {
        let url = match Url::parse(url) {
            Ok(url) => url,

            Err(e) => {
                info!(url, error = %e, "Refusing to extract an article from an invalid URL");
                return None;
            }
        };

        match self.extractor.extract(&url).await {
            Ok(article) => {
                let text = strip_html(&article.text);

                Some(if text.is_empty() {
                    article.title.as_deref().map(strip_html).unwrap_or_default()
                } else {
                    text
                })
            }

            Err(e) => {
                warn!(%url, "Article extraction failed: {:#}", anyhow::Error::new(e));
                None
            }
        }
    }

    async fn ask_model(&self, text: &str, lang: &str) -> Result<String, LlmError> {
        let language = if lang == DEFAULT_LANG { "English" } else { lang };
        let system = format!(
            "You are a helpful assistant that summarizes news articles. \
            Provide concise summaries under 100 words in {language} language."
        );
        let user = format!(
            "Please summarize this news article in 2-4 lines: {}",
            text.chars().take(MAX_PROMPT_CHARS).collect::<String>()
        );

        let summary = tokio::time::timeout(self.llm_timeout, self.llm.complete(&system, &user))
            .await
            .map_err(|_| LlmError::Timeout(self.llm_timeout))??;
        debug!("Summarized the article");

        Ok(summary)
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::extract::{ExtractError, ExtractedArticle};
    use super::*;

    enum FakeExtractor {
        Text(&'static str),
        Titled(&'static str),
        Failing,
    }

    #[async_trait]
    impl Extractor for FakeExtractor {
        async fn extract(&self, url: &Url) -> Result<ExtractedArticle, ExtractError> {
            match self {
                Self::Text(text) => Ok(ExtractedArticle {
                    title: Some("Title".into()),
                    text: (*text).into(),
                }),

                Self::Titled(title) => Ok(ExtractedArticle {
                    title: Some((*title).into()),
                    text: String::new(),
                }),

                Self::Failing => Err(ExtractError::Status {
                    url: url.clone(),
                    status: reqwest::StatusCode::NOT_FOUND,
                }),
            }
        }
    }

    #[derive(Default)]
    struct FakeModel {
        answer: Option<&'static str>,
        delay: Option<Duration>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ChatModel for FakeModel {
        async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts
                .lock()
                .unwrap()
                .push((system.into(), user.into()));

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.answer
                .map(Into::into)
                .ok_or(LlmError::MissingApiKey)
        }
    }

    fn summarizer(extractor: FakeExtractor, model: Arc<FakeModel>) -> Summarizer {
        Summarizer::new(Arc::new(extractor), model, Duration::from_secs(5))
    }

    fn request(url: Option<&str>, title: Option<&str>, summary: Option<&str>) -> SummaryRequest {
        SummaryRequest {
            url: url.map(Into::into),
            title: title.map(Into::into),
            summary: summary.map(Into::into),
            lang: None,
        }
    }

    #[tokio::test]
    async fn summarizes_the_extracted_article() {
        let model = Arc::new(FakeModel {
            answer: Some("Short."),
            ..Default::default()
        });
        let result = summarizer(FakeExtractor::Text("<p>Long  story</p>"), model.clone())
            .summarize(request(Some("https://news.example/a"), None, None))
            .await
            .unwrap();

        assert_eq!(
            result,
            Summary::Summarized {
                summary: "Short.".into(),
                full_article: "Long story".into(),
            }
        );

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].0.contains("under 100 words in English language"));
        assert_eq!(
            prompts[0].1,
            "Please summarize this news article in 2-4 lines: Long story"
        );
    }

    #[tokio::test]
    async fn extraction_failures_skip_the_model() {
        let model = Arc::new(FakeModel {
            answer: Some("Short."),
            ..Default::default()
        });
        let summarizer = summarizer(FakeExtractor::Failing, model.clone());

        for url in ["https://news.example/gone", "not a url"] {
            let result = summarizer
                .summarize(request(Some(url), Some("Title"), Some("Summary")))
                .await
                .unwrap();

            assert_eq!(result, Summary::ExtractionFailed);
        }

        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn falls_back_to_the_extracted_title() {
        let model = Arc::new(FakeModel {
            answer: Some("Short."),
            ..Default::default()
        });
        let result = summarizer(FakeExtractor::Titled("Headline"), model)
            .summarize(request(Some("https://news.example/a"), None, None))
            .await
            .unwrap();

        assert_eq!(
            result,
            Summary::Summarized {
                summary: "Short.".into(),
                full_article: "Headline".into(),
            }
        );
    }

    #[tokio::test]
    async fn uses_the_request_text_without_a_url() {
        let model = Arc::new(FakeModel {
            answer: Some("Short."),
            ..Default::default()
        });
        let summarizer = summarizer(FakeExtractor::Failing, model.clone());
        let result = summarizer
            .summarize(SummaryRequest {
                lang: Some("fr".into()),
                ..request(None, Some("Title"), Some("<b>Summary</b> text"))
            })
            .await
            .unwrap();

        assert_eq!(
            result,
            Summary::Summarized {
                summary: "Short.".into(),
                full_article: "Summary text".into(),
            }
        );
        assert!(model.prompts.lock().unwrap()[0]
            .0
            .contains("in fr language"));
    }

    #[tokio::test]
    async fn markup_only_input_has_a_placeholder_summary() {
        let model = Arc::new(FakeModel::default());
        let result = summarizer(FakeExtractor::Failing, model.clone())
            .summarize(request(None, None, Some("<br/>")))
            .await
            .unwrap();

        assert_eq!(
            result,
            Summary::Summarized {
                summary: NO_SUMMARY.into(),
                full_article: String::new(),
            }
        );
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn model_failures_degrade_to_an_excerpt() {
        let text = "word ".repeat(100);
        let model = Arc::new(FakeModel::default());
        let result = summarizer(FakeExtractor::Failing, model)
            .summarize(request(None, None, Some(&text)))
            .await
            .unwrap();

        let Summary::Degraded {
            summary,
            full_article,
            ..
        } = result
        else {
            panic!("expected a degraded summary, got {result:?}");
        };

        assert_eq!(full_article, text.trim());
        assert_eq!(summary.chars().count(), MAX_FALLBACK_CHARS + 3);
        assert!(summary.ends_with("..."));
    }

    #[tokio::test]
    async fn slow_models_time_out() {
        let model = Arc::new(FakeModel {
            answer: Some("Too late."),
            delay: Some(Duration::from_secs(10)),
            ..Default::default()
        });
        let summarizer = Summarizer::new(
            Arc::new(FakeExtractor::Failing),
            model,
            Duration::from_millis(50),
        );
        let result = summarizer
            .summarize(request(None, Some("Short title"), None))
            .await
            .unwrap();

        assert!(matches!(
            result,
            Summary::Degraded { ref summary, ref reason, .. }
                if summary == "Short title" && reason.contains("did not answer")
        ));
    }

    #[tokio::test]
    async fn requires_some_input() {
        let model = Arc::new(FakeModel::default());
        let result = summarizer(FakeExtractor::Failing, model)
            .summarize(request(Some(" "), Some(""), None))
            .await;

        assert!(matches!(result, Err(SummaryError::MissingInput)));
    }
}
