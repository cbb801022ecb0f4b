/**
 * Visitor Routes
 * Per-page visit counter reported by the frontend
 */
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::db::models::VisitorStat;
use crate::error::{ApiError, ApiResult, Success};
use crate::routes::optional_text;
use crate::AppState;

lazy_static::lazy_static! {
    /// Blog post page: `/blog/<slug>` with an optional trailing slash
    static ref BLOG_PAGE_REGEX: Regex = Regex::new(r"^/blog/([^/?#]+)/?$").unwrap();
}

/// Slug of the blog post a page path points at, if any
fn blog_slug(page: &str) -> Option<&str> {
    BLOG_PAGE_REGEX
        .captures(page)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VisitRequest {
    pub page: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VisitorQuery {
    pub page: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VisitCount {
    pub count: i32,
}

/// GET without `page` returns every counter; with it, just that page's count.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum VisitorReport {
    Page { count: i32 },
    All { stats: Vec<VisitorStat> },
}

/// POST /api/visitor - Count a page view
///
/// Read and write are separate round-trips with no transaction, so two
/// simultaneous first hits on a page can both write 1.
pub async fn record_visit(
    State(state): State<AppState>,
    payload: Result<Json<VisitRequest>, JsonRejection>,
) -> ApiResult<VisitCount> {
    let Json(request) = payload?;
    let page = optional_text(request.page).ok_or_else(|| ApiError::validation("Page is required"))?;

    let prior = state
        .store
        .visitor_stat(&page)
        .await
        .map_err(ApiError::store("Failed to update visitor count"))?
        .map_or(0, |stat| stat.count);
    let count = prior.saturating_add(1);

    // The post's own counter is written from the page counter, not incremented.
    if let Some(slug) = blog_slug(&page) {
        state
            .store
            .set_post_views(slug, count)
            .await
            .map_err(ApiError::store("Failed to update visitor count"))?;
    }

    let stat = state
        .store
        .write_visitor_count(&page, count)
        .await
        .map_err(ApiError::store("Failed to update visitor count"))?;
    Ok(Success::ok(VisitCount { count: stat.count }))
}

/// GET /api/visitor?page=
pub async fn get_count(
    State(state): State<AppState>,
    Query(query): Query<VisitorQuery>,
) -> ApiResult<VisitorReport> {
    let report = match optional_text(query.page) {
        Some(page) => {
            let count = state
                .store
                .visitor_stat(&page)
                .await
                .map_err(ApiError::store("Failed to fetch visitor count"))?
                .map_or(0, |stat| stat.count);
            VisitorReport::Page { count }
        }
        None => {
            let stats = state
                .store
                .list_visitor_stats()
                .await
                .map_err(ApiError::store("Failed to fetch visitor count"))?;
            VisitorReport::All { stats }
        }
    };
    Ok(Success::ok(report))
}
