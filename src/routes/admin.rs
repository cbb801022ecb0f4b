/**
 * Admin Routes
 * Dashboard summary: content counts, traffic and the latest posts
 */
use axum::extract::State;
use serde::Serialize;

use crate::db::models::{BlogPost, BlogPostFilter, ContentCounts};
use crate::error::{ApiError, ApiResult, Success};
use crate::routes::auth::{require_admin, Caller};
use crate::store::ContentStore;
use crate::AppState;

const RECENT_POSTS: usize = 5;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub stats: ContentCounts,
    pub recent_posts: Vec<BlogPost>,
}

async fn summary(store: &dyn ContentStore) -> Result<DashboardSummary, ApiError> {
    let stats = store
        .content_counts()
        .await
        .map_err(ApiError::store("Failed to load dashboard"))?;
    let mut recent_posts = store
        .list_posts(&BlogPostFilter::default())
        .await
        .map_err(ApiError::store("Failed to load dashboard"))?;
    recent_posts.truncate(RECENT_POSTS);
    Ok(DashboardSummary {
        stats,
        recent_posts,
    })
}

/// GET /api/admin/stats (admin)
pub async fn stats(State(state): State<AppState>, caller: Caller) -> ApiResult<DashboardSummary> {
    require_admin(state.store.as_ref(), &caller).await?;
    Ok(Success::ok(summary(state.store.as_ref()).await?))
}

/// GET /admin/dashboard. Access is decided by the admin page middleware.
pub async fn dashboard(State(state): State<AppState>) -> ApiResult<DashboardSummary> {
    Ok(Success::ok(summary(state.store.as_ref()).await?))
}
