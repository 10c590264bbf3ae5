mod responses;
mod routes;

use std::future::Future;

use anyhow::{anyhow, Context, Result};
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use reqwest::StatusCode;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, TraceLayer};
use tracing::{error, info, Level};

use crate::state::State;

async fn convert_errors<F, R>(fut: F) -> axum::response::Result<R>
where
    F: Future<Output = Result<R>>,
{
    match fut.await {
        Ok(r) => Ok(r),

        Err(e) => {
            error!("Error occured while processing an HTTP request: {e:#}");

            Err(StatusCode::INTERNAL_SERVER_ERROR.into())
        }
    }
}

fn cors_layer(origin: &str) -> Result<CorsLayer> {
    let origin = HeaderValue::from_str(origin)
        .with_context(|| anyhow!("invalid CORS origin `{origin}`"))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-user-id"),
        ]))
}

pub fn router(state: State) -> Result<Router> {
    use axum::routing::{delete, get, post};

    let cors = state.cfg.cors_origin.as_deref().map(cors_layer).transpose()?;

    let app = Router::new()
        .route("/", get(routes::index))
        .route("/feed", get(routes::get_feed))
        .route("/feed/breaking", get(routes::get_breaking_news))
        .route("/feed/:category", get(routes::get_category_feed))
        .route("/summary", post(routes::summarize))
        .route(
            "/bookmarks",
            get(routes::get_bookmarks).post(routes::add_bookmark),
        )
        .route("/bookmarks/:id", delete(routes::remove_bookmark))
        .layer(
            ServiceBuilder::new().layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_request(DefaultOnRequest::new().level(Level::INFO)),
            ),
        );

    let app = match cors {
        Some(cors) => app.layer(cors),
        None => app,
    };

    Ok(app.with_state(state))
}

pub struct Server {
    socket: TcpListener,
    app: Router,
}

impl Server {
    pub async fn new(state: State) -> Result<Self> {
        let bind_addr = state.cfg.bind_addr.clone();
        let app = router(state)?;
        let socket = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| anyhow!("could not bind to `{bind_addr}`"))?;
        info!("Listening on {bind_addr}");

        Ok(Self { socket, app })
    }

    pub async fn serve(self, cancel: CancellationToken) -> Result<()> {
        axum::serve(self.socket, self.app)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
            .context("the HTTP server encountered a failure")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use reqwest::Url;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::cache::Cache;
    use crate::clock::{ManualClock, SystemClock};
    use crate::config::Config;
    use crate::diversifier::Diversifier;
    use crate::news::article::{RawArticle, RawPage};
    use crate::news::{FeedService, NewsError, NewsProvider};
    use crate::storage::Storage;
    use crate::summary::extract::{ExtractError, ExtractedArticle, Extractor};
    use crate::summary::llm::{ChatModel, LlmError};
    use crate::summary::Summarizer;

    use super::*;

    enum Upstream {
        Ok,
        MissingKey,
        Down,
    }

    struct FakeProvider {
        upstream: Upstream,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn result(&self) -> Result<RawPage, NewsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            match self.upstream {
                Upstream::Ok => Ok(RawPage {
                    total_results: 25,
                    articles: vec![RawArticle {
                        title: Some("Headline".into()),
                        url: Some("https://news.example/a".into()),
                        ..Default::default()
                    }],
                }),

                Upstream::MissingKey => Err(NewsError::MissingApiKey),
                Upstream::Down => Err(NewsError::Provider("quota exceeded".into())),
            }
        }
    }

    #[async_trait]
    impl NewsProvider for FakeProvider {
        async fn search(&self, _: &str, _: u32, _: u32) -> Result<RawPage, NewsError> {
            self.result()
        }

        async fn top_headlines(&self, _: u32) -> Result<RawPage, NewsError> {
            self.result()
        }
    }

    struct FakeExtractor;

    #[async_trait]
    impl Extractor for FakeExtractor {
        async fn extract(&self, url: &Url) -> Result<ExtractedArticle, ExtractError> {
            if url.path() == "/gone" {
                return Err(ExtractError::Status {
                    url: url.clone(),
                    status: StatusCode::NOT_FOUND,
                });
            }

            Ok(ExtractedArticle {
                title: None,
                text: "The full story.".into(),
            })
        }
    }

    struct FakeModel(Option<&'static str>);

    #[async_trait]
    impl ChatModel for FakeModel {
        async fn complete(&self, _: &str, _: &str) -> Result<String, LlmError> {
            self.0.map(Into::into).ok_or(LlmError::EmptyResponse)
        }
    }

    async fn app(upstream: Upstream, answer: Option<&'static str>) -> (Router, Arc<FakeProvider>) {
        let provider = Arc::new(FakeProvider {
            upstream,
            calls: AtomicUsize::new(0),
        });
        let ttl = Duration::from_secs(600);
        let feeds = FeedService::new(
            provider.clone(),
            Diversifier::new(
                vec!["world".into()],
                Default::default(),
                SmallRng::seed_from_u64(0),
            ),
            Cache::in_memory("feed", ttl, Arc::new(SystemClock)),
            Cache::in_memory("breaking", ttl, Arc::new(SystemClock)),
            10,
            5,
        );
        let summarizer = Summarizer::new(
            Arc::new(FakeExtractor),
            Arc::new(FakeModel(answer)),
            Duration::from_secs(5),
        );
        let state = State {
            cfg: Arc::new(Config {
                cors_origin: Some("http://localhost:3000".into()),
                ..Default::default()
            }),
            storage: Arc::new(Storage::in_memory().await.unwrap()),
            feeds: Arc::new(feeds),
            summarizer: Arc::new(summarizer),
            clock: Arc::new(ManualClock::new(time::macros::datetime!(2024-08-02 09:00 UTC))),
        };

        (router(state).unwrap(), provider)
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);

        if let Some(user) = user {
            req = req.header("X-User-Id", user);
        }

        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        (status, body)
    }

    #[tokio::test]
    async fn serves_feeds() {
        let (app, provider) = app(Upstream::Ok, None).await;

        let (status, body) = call(&app, Method::GET, "/feed?page=2", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalPages"], 3);
        assert_eq!(body["currentPage"], 2);
        assert_eq!(body["articles"][0]["sourceUrl"], "https://news.example/a");

        let (status, body) = call(&app, Method::GET, "/feed/sports?page=nope", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currentPage"], 1);

        let (status, body) = call(&app, Method::GET, "/feed/breaking", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let calls = provider.calls.load(Ordering::SeqCst);
        call(&app, Method::GET, "/feed/breaking", None, None).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), calls);

        call(&app, Method::GET, "/feed/breaking?force=true", None, None).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), calls + 1);
    }

    #[tokio::test]
    async fn maps_upstream_failures() {
        let (app, _) = app(Upstream::Down, None).await;

        let (status, body) = call(&app, Method::GET, "/feed?category=sports", None, None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Failed to fetch sports news.");

        let (status, body) = call(&app, Method::GET, "/feed/breaking", None, None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Failed to fetch breaking news.");
    }

    #[tokio::test]
    async fn maps_configuration_errors() {
        let (app, _) = app(Upstream::MissingKey, None).await;

        let (status, body) = call(&app, Method::GET, "/feed", None, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Server configuration error:"));
    }

    #[tokio::test]
    async fn summarizes_articles() {
        let (app, _) = app(Upstream::Ok, Some("In short.")).await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/summary",
            None,
            Some(json!({ "url": "https://news.example/a" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "summary": "In short.", "fullArticle": "The full story." })
        );

        let (status, body) = call(
            &app,
            Method::POST,
            "/summary",
            None,
            Some(json!({ "url": "https://news.example/gone" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "error": "EXTRACTION_FAILED" }));

        let (status, _) = call(&app, Method::POST, "/summary", None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn degraded_summaries_carry_a_note() {
        let (app, _) = app(Upstream::Ok, None).await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/summary",
            None,
            Some(json!({ "title": "Just a title" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"], "Just a title");
        assert_eq!(body["fullArticle"], "Just a title");
        assert!(body["note"].as_str().unwrap().contains("temporarily unavailable"));
    }

    #[tokio::test]
    async fn manages_bookmarks() {
        let (app, _) = app(Upstream::Ok, None).await;
        let bookmark = json!({
            "title": "Headline",
            "sourceUrl": "https://news.example/a",
            "publishedAt": "2024-08-01T12:00:00Z"
        });

        let (status, _) = call(&app, Method::GET, "/bookmarks", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, created) = call(
            &app,
            Method::POST,
            "/bookmarks",
            Some("alice"),
            Some(bookmark.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["sourceUrl"], "https://news.example/a");
        assert_eq!(created["createdAt"], "2024-08-02T09:00:00Z");
        assert!(created["_id"].is_i64());
        assert!(created.get("id").is_none());

        let (status, body) = call(
            &app,
            Method::POST,
            "/bookmarks",
            Some("alice"),
            Some(bookmark.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "This article is already bookmarked.");

        let (status, _) = call(
            &app,
            Method::POST,
            "/bookmarks",
            Some("alice"),
            Some(json!({ "title": " ", "sourceUrl": "https://news.example/b" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, Method::POST, "/bookmarks", Some("bob"), Some(bookmark)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, listed) = call(&app, Method::GET, "/bookmarks", Some("alice"), None).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let uri = format!("/bookmarks/{}", created["_id"]);

        let (status, _) = call(&app, Method::DELETE, &uri, Some("bob"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(&app, Method::DELETE, &uri, Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Bookmark removed");

        let (status, _) = call(&app, Method::DELETE, &uri, Some("alice"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn answers_liveness_checks() {
        let (app, _) = app(Upstream::Ok, None).await;

        let (status, body) = call(&app, Method::GET, "/", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "nexbrief is running");
    }

    #[test]
    fn rejects_invalid_cors_origins() {
        assert!(cors_layer("http://localhost:3000").is_ok());
        assert!(cors_layer("bad\norigin").is_err());
    }
}
