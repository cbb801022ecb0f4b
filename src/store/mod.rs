//! Content store: every read and write the route handlers perform goes
//! through [`ContentStore`]. `PgStore` is the production backend;
//! `MemoryStore` serves development runs without `DATABASE_URL` and tests.

use async_trait::async_trait;
use std::time::Duration;

use crate::db::models::{
    BlogPost, BlogPostFilter, BlogPostInput, ContactMessage, ContentCounts, NewContactMessage,
    Profile, ProfileInput, Project, ProjectInput, Skill, SkillInput, TagSummary, VisitorStat,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Typed access to the portfolio schema.
///
/// Lookups return `Ok(None)` when no row matches; updates return `Ok(None)`
/// when the target id does not exist; deletes return whether a row was removed.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn ping(&self) -> StoreResult<Duration>;

    // ── Profile ─────────────────────────────────────────────────────
    async fn profile_by_user(&self, user_id: &str) -> StoreResult<Option<Profile>>;
    /// Lowest-id admin profile, else lowest-id profile.
    async fn owner_profile(&self) -> StoreResult<Option<Profile>>;
    async fn insert_profile(&self, user_id: &str, input: &ProfileInput) -> StoreResult<Profile>;
    async fn update_profile(
        &self,
        user_id: &str,
        input: &ProfileInput,
    ) -> StoreResult<Option<Profile>>;

    // ── Skills ──────────────────────────────────────────────────────
    async fn list_skills(&self) -> StoreResult<Vec<Skill>>;
    async fn skill(&self, id: i64) -> StoreResult<Option<Skill>>;
    async fn insert_skill(&self, input: &SkillInput) -> StoreResult<Skill>;
    async fn update_skill(&self, id: i64, input: &SkillInput) -> StoreResult<Option<Skill>>;
    async fn delete_skill(&self, id: i64) -> StoreResult<bool>;

    // ── Projects ────────────────────────────────────────────────────
    async fn list_projects(&self, featured: Option<bool>) -> StoreResult<Vec<Project>>;
    async fn project(&self, id: i64) -> StoreResult<Option<Project>>;
    async fn insert_project(&self, input: &ProjectInput) -> StoreResult<Project>;
    async fn update_project(&self, id: i64, input: &ProjectInput)
        -> StoreResult<Option<Project>>;
    async fn delete_project(&self, id: i64) -> StoreResult<bool>;

    // ── Blog posts and tags ─────────────────────────────────────────
    async fn list_posts(&self, filter: &BlogPostFilter) -> StoreResult<Vec<BlogPost>>;
    async fn post_by_id(&self, id: i64) -> StoreResult<Option<BlogPost>>;
    async fn post_by_slug(&self, slug: &str) -> StoreResult<Option<BlogPost>>;
    async fn insert_post(&self, input: &BlogPostInput) -> StoreResult<BlogPost>;
    async fn update_post(&self, id: i64, input: &BlogPostInput)
        -> StoreResult<Option<BlogPost>>;
    async fn delete_post(&self, id: i64) -> StoreResult<bool>;
    /// Overwrites the view counter of the post with `slug`. Returns whether a post matched.
    async fn set_post_views(&self, slug: &str, views: i32) -> StoreResult<bool>;
    async fn list_tags(&self) -> StoreResult<Vec<TagSummary>>;

    // ── Contact messages ────────────────────────────────────────────
    async fn insert_message(&self, message: &NewContactMessage) -> StoreResult<ContactMessage>;
    async fn list_messages(&self) -> StoreResult<Vec<ContactMessage>>;
    async fn message(&self, id: i64) -> StoreResult<Option<ContactMessage>>;
    async fn set_message_read(&self, id: i64, read: bool) -> StoreResult<Option<ContactMessage>>;
    async fn delete_message(&self, id: i64) -> StoreResult<bool>;

    // ── Visitor stats ───────────────────────────────────────────────
    async fn visitor_stat(&self, page: &str) -> StoreResult<Option<VisitorStat>>;
    async fn list_visitor_stats(&self) -> StoreResult<Vec<VisitorStat>>;
    /// Writes `count` for `page` (creating the row if needed) and refreshes `last_visit`.
    /// This is a plain overwrite, not an increment.
    async fn write_visitor_count(&self, page: &str, count: i32) -> StoreResult<VisitorStat>;

    // ── Dashboard ───────────────────────────────────────────────────
    async fn content_counts(&self) -> StoreResult<ContentCounts>;
}

/// Trims, lower-cases and de-duplicates tag names; the result is sorted.
pub fn normalize_tags<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tags: Vec<String> = names
        .into_iter()
        .map(|n| n.as_ref().trim().to_lowercase())
        .filter(|n| !n.is_empty())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}
