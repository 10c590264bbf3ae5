use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::news::NewsError;
use crate::storage::entities::Bookmark;
use crate::summary::{Summary, SummaryError};

const DEGRADED_NOTE: &str = "AI summarization temporarily unavailable, showing extracted content";

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    let message: String = message.into();

    (status, Json(json!({ "error": message }))).into_response()
}

/// A feed request the news provider could not serve.
#[derive(Debug)]
pub struct FeedFailed {
    /// What was requested, as in "Failed to fetch {subject} news."
    pub subject: Option<String>,
    pub error: NewsError,
}

impl IntoResponse for FeedFailed {
    fn into_response(self) -> Response {
        let is_config = self.error.is_config();
        let error = anyhow::Error::new(self.error);
        let subject = self.subject.map(|s| format!("{s} ")).unwrap_or_default();

        if is_config {
            error!("Could not fetch {subject}news: {error:#}");

            return error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Server configuration error: {error}"),
            );
        }

        warn!("Could not fetch {subject}news: {error:#}");

        error_body(
            StatusCode::BAD_GATEWAY,
            format!("Failed to fetch {subject}news."),
        )
    }
}

impl IntoResponse for Summary {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Body {
            summary: String,
            full_article: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            note: Option<&'static str>,
        }

        match self {
            Summary::Summarized {
                summary,
                full_article,
            } => Json(Body {
                summary,
                full_article,
                note: None,
            })
            .into_response(),

            Summary::Degraded {
                summary,
                full_article,
                reason,
            } => {
                debug!(%reason, "Serving a degraded summary");

                Json(Body {
                    summary,
                    full_article,
                    note: Some(DEGRADED_NOTE),
                })
                .into_response()
            }

            Summary::ExtractionFailed => Json(json!({ "error": "EXTRACTION_FAILED" })).into_response(),
        }
    }
}

impl IntoResponse for SummaryError {
    fn into_response(self) -> Response {
        match self {
            SummaryError::MissingInput => error_body(StatusCode::BAD_REQUEST, self.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum BookmarkRejection {
    MissingUser,
    Invalid(&'static str),
    Duplicate,
    NotFound,
}

impl IntoResponse for BookmarkRejection {
    fn into_response(self) -> Response {
        match self {
            Self::MissingUser => error_body(StatusCode::UNAUTHORIZED, "Authentication required."),
            Self::Invalid(message) => error_body(StatusCode::BAD_REQUEST, message),
            Self::Duplicate => error_body(StatusCode::CONFLICT, "This article is already bookmarked."),
            Self::NotFound => error_body(StatusCode::NOT_FOUND, "Bookmark not found"),
        }
    }
}

pub struct BookmarkCreated(pub Bookmark);

impl IntoResponse for BookmarkCreated {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.0)).into_response()
    }
}

pub struct BookmarkRemoved;

impl IntoResponse for BookmarkRemoved {
    fn into_response(self) -> Response {
        Json(json!({ "message": "Bookmark removed" })).into_response()
    }
}
