use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Result;
use axum::Json;
use serde::Deserialize;

use crate::news::{Article, FeedPage};
use crate::server::convert_errors;
use crate::state::State as AppState;
use crate::storage::entities::{Bookmark, NewBookmark};
use crate::summary::{Summary, SummaryRequest};

use super::responses::{BookmarkCreated, BookmarkRejection, BookmarkRemoved, FeedFailed};

const USER_HEADER: &str = "x-user-id";

/// Query parameters are read leniently: anything unparseable falls back to the default.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct FeedParams {
    category: Option<String>,
    page: Option<String>,
    force: Option<String>,
}

impl FeedParams {
    fn page(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|page| page.trim().parse().ok())
            .filter(|&page| page > 0)
            .unwrap_or(1)
    }

    fn force(&self) -> bool {
        self.force.as_deref() == Some("true")
    }
}

pub async fn index() -> &'static str {
    "nexbrief is running"
}

pub async fn get_feed(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> Result<Json<FeedPage>> {
    let category = params
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    feed_page(&state, category, &params).await
}

pub async fn get_category_feed(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(params): Query<FeedParams>,
) -> Result<Json<FeedPage>> {
    feed_page(&state, Some(category.trim()), &params).await
}

async fn feed_page(
    state: &AppState,
    category: Option<&str>,
    params: &FeedParams,
) -> Result<Json<FeedPage>> {
    let feed = state
        .feeds
        .get_feed(category, params.page(), params.force())
        .await
        .map_err(|error| FeedFailed {
            subject: category.map(str::to_owned),
            error,
        })?;

    Ok(Json(feed))
}

pub async fn get_breaking_news(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> Result<Json<Vec<Article>>> {
    let articles = state
        .feeds
        .get_breaking_news(params.force())
        .await
        .map_err(|error| FeedFailed {
            subject: Some("breaking".into()),
            error,
        })?;

    Ok(Json(articles))
}

pub async fn summarize(
    State(state): State<AppState>,
    Json(req): Json<SummaryRequest>,
) -> Result<Summary> {
    Ok(state.summarizer.summarize(req).await?)
}

fn user_id(headers: &HeaderMap) -> Result<String, BookmarkRejection> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|user| !user.is_empty())
        .map(str::to_owned)
        .ok_or(BookmarkRejection::MissingUser)
}

pub async fn get_bookmarks(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Bookmark>>> {
    let user_id = user_id(&headers)?;

    let bookmarks = convert_errors(async {
        let mut tx = state.storage.begin().await?;
        let bookmarks = tx.get_bookmarks(&user_id).await?;
        tx.commit().await?;

        Ok(bookmarks)
    })
    .await?;

    Ok(Json(bookmarks))
}

pub async fn add_bookmark(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut bookmark): Json<NewBookmark>,
) -> Result<BookmarkCreated> {
    let user_id = user_id(&headers)?;

    bookmark.title = bookmark.title.trim().to_owned();
    bookmark.source_url = bookmark.source_url.trim().to_owned();

    if bookmark.title.is_empty() {
        return Err(BookmarkRejection::Invalid("Title is required.").into());
    }

    if bookmark.source_url.is_empty() {
        return Err(BookmarkRejection::Invalid("Source URL is required.").into());
    }

    let inserted = convert_errors(async {
        let mut tx = state.storage.begin().await?;
        let inserted = tx
            .insert_bookmark(&user_id, bookmark, state.clock.now())
            .await?;
        tx.commit().await?;

        Ok(inserted)
    })
    .await?;

    let bookmark = inserted.ok_or(BookmarkRejection::Duplicate)?;

    Ok(BookmarkCreated(bookmark))
}

pub async fn remove_bookmark(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<BookmarkRemoved> {
    let user_id = user_id(&headers)?;
    let id = id.parse::<i64>().map_err(|_| BookmarkRejection::NotFound)?;

    let deleted = convert_errors(async {
        let mut tx = state.storage.begin().await?;
        let deleted = tx.delete_bookmark(&user_id, id).await?;
        tx.commit().await?;

        Ok(deleted)
    })
    .await?;

    if !deleted {
        return Err(BookmarkRejection::NotFound.into());
    }

    Ok(BookmarkRemoved)
}
