/**
 * Blog Routes
 * CRUD API endpoints for blog posts, addressed by numeric id or slug
 */
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::db::models::{BlogPost, BlogPostFilter, BlogPostInput, TagSummary};
use crate::error::{ApiError, ApiResult, Done, Success};
use crate::routes::auth::{is_admin, require_admin, Caller};
use crate::routes::optional_text;
use crate::routes::projects::query_flag;
use crate::store::{normalize_tags, ContentStore, StoreError};
use crate::AppState;

const NOT_FOUND: &str = "Post not found";
const SLUG_TAKEN: &str = "A post with this slug already exists";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for GET /api/blog (list)
#[derive(Debug, Default, Deserialize)]
pub struct BlogListQuery {
    pub published: Option<String>,
    pub tag: Option<String>,
}

/// Request body for POST /api/blog and PUT /api/blog/{idOrSlug}
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BlogPostRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub cover_image: Option<String>,
    pub published: Option<bool>,
    pub tags: Option<Vec<String>>,
}

impl BlogPostRequest {
    /// Validates required fields and slug shape, sanitizes the HTML body.
    /// The slug is checked as sent; surrounding whitespace fails the pattern.
    pub fn into_input(self) -> Result<BlogPostInput, ApiError> {
        let (Some(title), Some(slug), Some(content)) = (
            optional_text(self.title),
            self.slug.filter(|slug| !slug.trim().is_empty()),
            optional_text(self.content),
        ) else {
            return Err(ApiError::validation("Title, slug, and content are required"));
        };

        if !is_valid_slug(&slug) {
            return Err(ApiError::validation(
                "Slug must contain only lowercase letters, numbers, and hyphens",
            ));
        }

        Ok(BlogPostInput {
            title,
            slug,
            excerpt: optional_text(self.excerpt),
            content: sanitize_html(&content),
            cover_image: optional_text(self.cover_image),
            published: self.published.unwrap_or(false),
            tags: normalize_tags(self.tags.unwrap_or_default()),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PostList {
    pub posts: Vec<BlogPost>,
}

#[derive(Debug, Serialize)]
pub struct PostBody {
    pub post: BlogPost,
}

#[derive(Debug, Serialize)]
pub struct TagList {
    pub tags: Vec<TagSummary>,
}

// ============================================================================
// Validation
// ============================================================================

lazy_static::lazy_static! {
    /// Valid slug pattern: lowercase letters, numbers, and hyphens
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

/// Sanitize HTML content using ammonia
fn sanitize_html(html: &str) -> String {
    ammonia::clean(html)
}

/// How a `{idOrSlug}` path segment is resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostKey {
    Id(i64),
    Slug(String),
    /// All digits but outside the id range; matches nothing.
    Unresolvable,
}

impl PostKey {
    /// Purely syntactic: only an all-ASCII-digit string is an id.
    pub fn parse(raw: &str) -> Self {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            match raw.parse::<i64>() {
                Ok(id) => PostKey::Id(id),
                Err(_) => PostKey::Unresolvable,
            }
        } else {
            PostKey::Slug(raw.to_string())
        }
    }
}

async fn find_post(store: &dyn ContentStore, key: &PostKey) -> Result<Option<BlogPost>, StoreError> {
    match key {
        PostKey::Id(id) => store.post_by_id(*id).await,
        PostKey::Slug(slug) => store.post_by_slug(slug).await,
        PostKey::Unresolvable => Ok(None),
    }
}

/// Unique violations from the write become the slug conflict; anything else is a 500.
fn write_error(context: &'static str) -> impl FnOnce(StoreError) -> ApiError {
    move |e| match e {
        StoreError::Conflict(_) => ApiError::conflict(SLUG_TAKEN),
        other => ApiError::store(context)(other),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/blog - Posts newest first. Non-admins only ever see published posts.
pub async fn list_posts(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<BlogListQuery>,
) -> ApiResult<PostList> {
    let published = if is_admin(state.store.as_ref(), &caller).await {
        query_flag(query.published.as_deref())
    } else {
        Some(true)
    };
    let filter = BlogPostFilter {
        published,
        tag: optional_text(query.tag).map(|t| t.to_lowercase()),
    };

    let posts = state
        .store
        .list_posts(&filter)
        .await
        .map_err(ApiError::store("Failed to fetch posts"))?;
    Ok(Success::ok(PostList { posts }))
}

/// GET /api/blog/{idOrSlug}
pub async fn get_post(
    State(state): State<AppState>,
    caller: Caller,
    Path(id_or_slug): Path<String>,
) -> ApiResult<PostBody> {
    let post = find_post(state.store.as_ref(), &PostKey::parse(&id_or_slug))
        .await
        .map_err(ApiError::store("Failed to fetch post"))?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;

    if !post.published && !is_admin(state.store.as_ref(), &caller).await {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    Ok(Success::ok(PostBody { post }))
}

/// POST /api/blog - Create post (admin)
pub async fn create_post(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<BlogPostRequest>, JsonRejection>,
) -> ApiResult<PostBody> {
    require_admin(state.store.as_ref(), &caller).await?;
    let Json(request) = payload?;
    let input = request.into_input()?;

    let existing = state
        .store
        .post_by_slug(&input.slug)
        .await
        .map_err(ApiError::store("Failed to create post"))?;
    if existing.is_some() {
        return Err(ApiError::conflict(SLUG_TAKEN));
    }

    let post = state
        .store
        .insert_post(&input)
        .await
        .map_err(write_error("Failed to create post"))?;
    tracing::info!(post_id = post.id, slug = %post.slug, "Blog post created");
    Ok(Success::created(PostBody { post }))
}

/// PUT /api/blog/{idOrSlug} - Replace post (admin)
pub async fn update_post(
    State(state): State<AppState>,
    caller: Caller,
    Path(id_or_slug): Path<String>,
    payload: Result<Json<BlogPostRequest>, JsonRejection>,
) -> ApiResult<PostBody> {
    require_admin(state.store.as_ref(), &caller).await?;
    let Json(request) = payload?;
    let input = request.into_input()?;

    let current = find_post(state.store.as_ref(), &PostKey::parse(&id_or_slug))
        .await
        .map_err(ApiError::store("Failed to update post"))?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;

    if input.slug != current.slug {
        let holder = state
            .store
            .post_by_slug(&input.slug)
            .await
            .map_err(ApiError::store("Failed to update post"))?;
        if holder.is_some_and(|other| other.id != current.id) {
            return Err(ApiError::conflict(SLUG_TAKEN));
        }
    }

    let post = state
        .store
        .update_post(current.id, &input)
        .await
        .map_err(write_error("Failed to update post"))?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    tracing::info!(post_id = post.id, "Blog post updated");
    Ok(Success::ok(PostBody { post }))
}

/// DELETE /api/blog/{idOrSlug} (admin)
pub async fn delete_post(
    State(state): State<AppState>,
    caller: Caller,
    Path(id_or_slug): Path<String>,
) -> ApiResult<Done> {
    require_admin(state.store.as_ref(), &caller).await?;

    let post = find_post(state.store.as_ref(), &PostKey::parse(&id_or_slug))
        .await
        .map_err(ApiError::store("Failed to delete post"))?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;

    let deleted = state
        .store
        .delete_post(post.id)
        .await
        .map_err(ApiError::store("Failed to delete post"))?;
    if !deleted {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    tracing::info!(post_id = post.id, "Blog post deleted");
    Ok(Success::ok(Done::with_message("Post deleted successfully")))
}

/// GET /api/tags - Every tag with its published post count
pub async fn list_tags(State(state): State<AppState>) -> ApiResult<TagList> {
    let tags = state
        .store
        .list_tags()
        .await
        .map_err(ApiError::store("Failed to fetch tags"))?;
    Ok(Success::ok(TagList { tags }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::TestApp;
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    fn post(slug: &str, published: bool) -> Value {
        json!({
            "title": format!("Post {}", slug),
            "slug": slug,
            "content": "<p>Hello</p>",
            "published": published
        })
    }

    #[test]
    fn test_post_key_is_syntactic() {
        assert_eq!(PostKey::parse("42"), PostKey::Id(42));
        assert_eq!(PostKey::parse("42-answers"), PostKey::Slug("42-answers".into()));
        assert_eq!(PostKey::parse("v2"), PostKey::Slug("v2".into()));
        assert_eq!(
            PostKey::parse("99999999999999999999999"),
            PostKey::Unresolvable
        );
    }

    #[test]
    fn test_slug_validation() {
        assert!(is_valid_slug("hello-world-2"));
        assert!(!is_valid_slug("Hello"));
        assert!(!is_valid_slug("double--dash"));
        assert!(!is_valid_slug("-leading"));
    }

    #[test]
    fn test_into_input_sanitizes_and_normalizes() {
        let request = BlogPostRequest {
            title: Some("T".into()),
            slug: Some("t".into()),
            content: Some("<p>ok</p><script>alert(1)</script>".into()),
            tags: Some(vec!["Rust".into(), "rust".into(), " ".into()]),
            ..Default::default()
        };
        let input = request.into_input().unwrap();
        assert_eq!(input.content, "<p>ok</p>");
        assert_eq!(input.tags, vec!["rust".to_string()]);
        assert!(!input.published);
    }

    #[tokio::test]
    async fn test_slug_is_stored_exactly_as_sent() {
        let app = TestApp::new();
        let admin = app.admin("user_admin").await;

        let (status, body) = app
            .post(
                "/api/blog",
                Some(&admin),
                json!({ "title": "T", "slug": " hello ", "content": "c" }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "Slug must contain only lowercase letters, numbers, and hyphens"
        );
        assert!(app.store.post_by_slug("hello").await.unwrap().is_none());

        let (status, body) = app
            .post(
                "/api/blog",
                Some(&admin),
                json!({ "title": "T", "slug": "hello", "content": "c" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["post"]["slug"], "hello");
    }

    #[tokio::test]
    async fn test_create_then_get_by_slug() {
        let app = TestApp::new();
        let admin = app.admin("user_admin").await;

        let (status, body) = app.post("/api/blog", Some(&admin), post("hello-world", true)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["post"]["slug"], "hello-world");
        let id = body["post"]["id"].clone();

        let (status, body) = app.get("/api/blog/hello-world", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["post"]["id"], id);
        assert_eq!(body["post"]["views"], 0);
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_conflict_without_insert() {
        let app = TestApp::new();
        let admin = app.admin("user_admin").await;
        app.post("/api/blog", Some(&admin), post("taken", true)).await;

        let (status, body) = app.post("/api/blog", Some(&admin), post("taken", true)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], SLUG_TAKEN);

        let (_, body) = app.get("/api/blog", Some(&admin)).await;
        assert_eq!(body["posts"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_slug_conflicts_only_with_other_posts() {
        let app = TestApp::new();
        let admin = app.admin("user_admin").await;
        app.post("/api/blog", Some(&admin), post("first", true)).await;
        app.post("/api/blog", Some(&admin), post("second", true)).await;

        let (status, body) = app.put("/api/blog/second", Some(&admin), post("first", true)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], SLUG_TAKEN);

        let mut same = post("second", true);
        same["title"] = json!("Renamed");
        let (status, body) = app.put("/api/blog/second", Some(&admin), same).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["post"]["title"], "Renamed");

        let (status, _) = app.put("/api/blog/missing", Some(&admin), post("missing", true)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_numeric_identifier_resolves_by_id() {
        let app = TestApp::new();
        let admin = app.admin("user_admin").await;
        let (_, first) = app.post("/api/blog", Some(&admin), post("intro", true)).await;
        let first_id = first["post"]["id"].as_i64().unwrap();

        // A second post whose slug is the first post's id as a string
        let (status, _) = app
            .post("/api/blog", Some(&admin), post(&first_id.to_string(), true))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = app.get(&format!("/api/blog/{}", first_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["post"]["slug"], "intro");

        let (status, _) = app.get("/api/blog/99999999999999999999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_published_filter_and_visibility() {
        let app = TestApp::new();
        let admin = app.admin("user_admin").await;
        app.post("/api/blog", Some(&admin), post("old", true)).await;
        app.post("/api/blog", Some(&admin), post("draft", false)).await;
        app.post("/api/blog", Some(&admin), post("new", true)).await;

        let (_, body) = app.get("/api/blog?published=true", Some(&admin)).await;
        let slugs: Vec<&str> = body["posts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["slug"].as_str().unwrap())
            .collect();
        assert_eq!(slugs, vec!["new", "old"]);

        let (_, body) = app.get("/api/blog", Some(&admin)).await;
        assert_eq!(body["posts"].as_array().unwrap().len(), 3);

        // Anonymous callers cannot opt into drafts
        let (_, body) = app.get("/api/blog?published=false", None).await;
        assert!(body["posts"]
            .as_array()
            .unwrap()
            .iter()
            .all(|p| p["published"] == true));

        let (status, _) = app.get("/api/blog/draft", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app.get("/api/blog/draft", Some(&admin)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_tags_filter_and_listing() {
        let app = TestApp::new();
        let admin = app.admin("user_admin").await;

        let mut tagged = post("tagged", true);
        tagged["tags"] = json!(["Rust", "axum", "rust"]);
        let (_, body) = app.post("/api/blog", Some(&admin), tagged).await;
        assert_eq!(body["post"]["tags"], json!(["axum", "rust"]));
        app.post("/api/blog", Some(&admin), post("plain", true)).await;

        let (_, body) = app.get("/api/blog?tag=RUST", None).await;
        let posts = body["posts"].as_array().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0]["slug"], "tagged");

        let (status, body) = app.get("/api/tags", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tags"].as_array().unwrap().len(), 2);
        assert_eq!(body["tags"][0]["postCount"], 1);
    }

    #[tokio::test]
    async fn test_delete_post() {
        let app = TestApp::new();
        let admin = app.admin("user_admin").await;
        app.post("/api/blog", Some(&admin), post("doomed", true)).await;

        let (status, body) = app.delete("/api/blog/doomed", Some(&admin)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, _) = app.delete("/api/blog/doomed", Some(&admin)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_blog_mutations_require_admin() {
        let app = TestApp::new();
        let member = app.member("user_member").await;

        let (status, _) = app.post("/api/blog", None, post("x", true)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = app.post("/api/blog", Some(&member), post("x", true)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = app.put("/api/blog/x", Some(&member), post("x", true)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
