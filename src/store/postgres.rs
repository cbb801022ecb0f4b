use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use std::time::Duration;

use super::{ContentStore, StoreError, StoreResult};
use crate::db::{
    self,
    models::{
        BlogPost, BlogPostFilter, BlogPostInput, ContactMessage, ContentCounts,
        NewContactMessage, Profile, ProfileInput, Project, ProjectInput, Skill, SkillInput,
        TagSummary, VisitorStat,
    },
};

const PROFILE_COLUMNS: &str = "id, user_id, name, title, bio, avatar, email, github, linkedin, \
     twitter, resume, is_admin, created_at, updated_at";

const SKILL_COLUMNS: &str = "id, name, icon, category, proficiency";

const PROJECT_COLUMNS: &str = "id, title, description, image, demo_url, github_url, \
     technologies, featured, display_order, created_at, updated_at";

const MESSAGE_COLUMNS: &str = "id, name, email, subject, message, read, created_at";

/// Post columns with the tag names folded in, aliased against `blog_posts p`.
const POST_SELECT: &str = r#"
    SELECT p.id, p.title, p.slug, p.excerpt, p.content, p.cover_image, p.published, p.views,
           ARRAY(
               SELECT t.name FROM tags t
               JOIN blog_posts_tags bt ON bt.tag_id = t.id
               WHERE bt.blog_post_id = p.id
               ORDER BY t.name
           ) AS tags,
           p.created_at, p.updated_at
    FROM blog_posts p
"#;

/// PostgreSQL-backed store
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Maps SQLSTATE 23505 to [`StoreError::Conflict`].
fn map_unique(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or("unique").to_string();
            return StoreError::Conflict(constraint);
        }
    }
    StoreError::Database(err)
}

async fn fetch_post<'e, E>(executor: E, id: i64) -> Result<Option<BlogPost>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, BlogPost>(&format!("{POST_SELECT} WHERE p.id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Replaces the tag set of a post, creating missing tag rows.
async fn replace_tags(
    tx: &mut Transaction<'_, Postgres>,
    post_id: i64,
    tags: &[String],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM blog_posts_tags WHERE blog_post_id = $1")
        .bind(post_id)
        .execute(&mut **tx)
        .await?;

    for name in tags {
        let (tag_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO tags (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(name)
        .fetch_one(&mut **tx)
        .await?;

        sqlx::query(
            "INSERT INTO blog_posts_tags (blog_post_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(post_id)
        .bind(tag_id)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

#[async_trait]
impl ContentStore for PgStore {
    async fn ping(&self) -> StoreResult<Duration> {
        Ok(db::health_check(&self.pool).await?)
    }

    async fn profile_by_user(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profile WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn owner_profile(&self) -> StoreResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profile ORDER BY is_admin DESC, id ASC LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn insert_profile(&self, user_id: &str, input: &ProfileInput) -> StoreResult<Profile> {
        sqlx::query_as::<_, Profile>(&format!(
            r#"
            INSERT INTO profile (user_id, name, title, bio, avatar, email, github, linkedin, twitter, resume)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&input.name)
        .bind(&input.title)
        .bind(&input.bio)
        .bind(&input.avatar)
        .bind(&input.email)
        .bind(&input.github)
        .bind(&input.linkedin)
        .bind(&input.twitter)
        .bind(&input.resume)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique)
    }

    async fn update_profile(
        &self,
        user_id: &str,
        input: &ProfileInput,
    ) -> StoreResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            r#"
            UPDATE profile
            SET name = $2, title = $3, bio = $4, avatar = $5, email = $6, github = $7,
                linkedin = $8, twitter = $9, resume = $10, updated_at = now()
            WHERE user_id = $1
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&input.name)
        .bind(&input.title)
        .bind(&input.bio)
        .bind(&input.avatar)
        .bind(&input.email)
        .bind(&input.github)
        .bind(&input.linkedin)
        .bind(&input.twitter)
        .bind(&input.resume)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn list_skills(&self) -> StoreResult<Vec<Skill>> {
        let skills = sqlx::query_as::<_, Skill>(&format!(
            "SELECT {SKILL_COLUMNS} FROM skills ORDER BY name ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(skills)
    }

    async fn skill(&self, id: i64) -> StoreResult<Option<Skill>> {
        let skill =
            sqlx::query_as::<_, Skill>(&format!("SELECT {SKILL_COLUMNS} FROM skills WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(skill)
    }

    async fn insert_skill(&self, input: &SkillInput) -> StoreResult<Skill> {
        let skill = sqlx::query_as::<_, Skill>(&format!(
            r#"
            INSERT INTO skills (name, icon, category, proficiency)
            VALUES ($1, $2, $3, $4)
            RETURNING {SKILL_COLUMNS}
            "#
        ))
        .bind(&input.name)
        .bind(&input.icon)
        .bind(&input.category)
        .bind(input.proficiency)
        .fetch_one(&self.pool)
        .await?;
        Ok(skill)
    }

    async fn update_skill(&self, id: i64, input: &SkillInput) -> StoreResult<Option<Skill>> {
        let skill = sqlx::query_as::<_, Skill>(&format!(
            r#"
            UPDATE skills
            SET name = $2, icon = $3, category = $4, proficiency = $5
            WHERE id = $1
            RETURNING {SKILL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.icon)
        .bind(&input.category)
        .bind(input.proficiency)
        .fetch_optional(&self.pool)
        .await?;
        Ok(skill)
    }

    async fn delete_skill(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM skills WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_projects(&self, featured: Option<bool>) -> StoreResult<Vec<Project>> {
        let projects = sqlx::query_as::<_, Project>(&format!(
            r#"
            SELECT {PROJECT_COLUMNS} FROM projects
            WHERE ($1::boolean IS NULL OR featured = $1)
            ORDER BY display_order ASC, id ASC
            "#
        ))
        .bind(featured)
        .fetch_all(&self.pool)
        .await?;
        Ok(projects)
    }

    async fn project(&self, id: i64) -> StoreResult<Option<Project>> {
        let project = sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(project)
    }

    async fn insert_project(&self, input: &ProjectInput) -> StoreResult<Project> {
        let project = sqlx::query_as::<_, Project>(&format!(
            r#"
            INSERT INTO projects (title, description, image, demo_url, github_url, technologies, featured, display_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.image)
        .bind(&input.demo_url)
        .bind(&input.github_url)
        .bind(&input.technologies)
        .bind(input.featured)
        .bind(input.display_order)
        .fetch_one(&self.pool)
        .await?;
        Ok(project)
    }

    async fn update_project(
        &self,
        id: i64,
        input: &ProjectInput,
    ) -> StoreResult<Option<Project>> {
        let project = sqlx::query_as::<_, Project>(&format!(
            r#"
            UPDATE projects
            SET title = $2, description = $3, image = $4, demo_url = $5, github_url = $6,
                technologies = $7, featured = $8, display_order = $9, updated_at = now()
            WHERE id = $1
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.image)
        .bind(&input.demo_url)
        .bind(&input.github_url)
        .bind(&input.technologies)
        .bind(input.featured)
        .bind(input.display_order)
        .fetch_optional(&self.pool)
        .await?;
        Ok(project)
    }

    async fn delete_project(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_posts(&self, filter: &BlogPostFilter) -> StoreResult<Vec<BlogPost>> {
        let posts = sqlx::query_as::<_, BlogPost>(&format!(
            r#"
            {POST_SELECT}
            WHERE ($1::boolean IS NULL OR p.published = $1)
              AND ($2::text IS NULL OR EXISTS (
                  SELECT 1 FROM blog_posts_tags bt
                  JOIN tags t ON t.id = bt.tag_id
                  WHERE bt.blog_post_id = p.id AND t.name = $2
              ))
            ORDER BY p.created_at DESC, p.id DESC
            "#
        ))
        .bind(filter.published)
        .bind(&filter.tag)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    async fn post_by_id(&self, id: i64) -> StoreResult<Option<BlogPost>> {
        Ok(fetch_post(&self.pool, id).await?)
    }

    async fn post_by_slug(&self, slug: &str) -> StoreResult<Option<BlogPost>> {
        let post = sqlx::query_as::<_, BlogPost>(&format!("{POST_SELECT} WHERE p.slug = $1"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn insert_post(&self, input: &BlogPostInput) -> StoreResult<BlogPost> {
        let mut tx = self.pool.begin().await?;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO blog_posts (title, slug, excerpt, content, cover_image, published)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&input.title)
        .bind(&input.slug)
        .bind(&input.excerpt)
        .bind(&input.content)
        .bind(&input.cover_image)
        .bind(input.published)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique)?;

        replace_tags(&mut tx, id, &input.tags).await?;
        let post = fetch_post(&mut *tx, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        tx.commit().await?;

        Ok(post)
    }

    async fn update_post(
        &self,
        id: i64,
        input: &BlogPostInput,
    ) -> StoreResult<Option<BlogPost>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE blog_posts
            SET title = $2, slug = $3, excerpt = $4, content = $5, cover_image = $6,
                published = $7, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.slug)
        .bind(&input.excerpt)
        .bind(&input.content)
        .bind(&input.cover_image)
        .bind(input.published)
        .execute(&mut *tx)
        .await
        .map_err(map_unique)?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        replace_tags(&mut tx, id, &input.tags).await?;
        let post = fetch_post(&mut *tx, id).await?;
        tx.commit().await?;

        Ok(post)
    }

    async fn delete_post(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM blog_posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_post_views(&self, slug: &str, views: i32) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE blog_posts SET views = $2 WHERE slug = $1")
            .bind(slug)
            .bind(views)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_tags(&self) -> StoreResult<Vec<TagSummary>> {
        let tags = sqlx::query_as::<_, TagSummary>(
            r#"
            SELECT t.id, t.name, COUNT(p.id) AS post_count
            FROM tags t
            LEFT JOIN blog_posts_tags bt ON bt.tag_id = t.id
            LEFT JOIN blog_posts p ON p.id = bt.blog_post_id AND p.published
            GROUP BY t.id, t.name
            ORDER BY t.name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    async fn insert_message(&self, message: &NewContactMessage) -> StoreResult<ContactMessage> {
        let message = sqlx::query_as::<_, ContactMessage>(&format!(
            r#"
            INSERT INTO contact_messages (name, email, subject, message)
            VALUES ($1, $2, $3, $4)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(&message.name)
        .bind(&message.email)
        .bind(&message.subject)
        .bind(&message.message)
        .fetch_one(&self.pool)
        .await?;
        Ok(message)
    }

    async fn list_messages(&self) -> StoreResult<Vec<ContactMessage>> {
        let messages = sqlx::query_as::<_, ContactMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM contact_messages ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    async fn message(&self, id: i64) -> StoreResult<Option<ContactMessage>> {
        let message = sqlx::query_as::<_, ContactMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM contact_messages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(message)
    }

    async fn set_message_read(&self, id: i64, read: bool) -> StoreResult<Option<ContactMessage>> {
        let message = sqlx::query_as::<_, ContactMessage>(&format!(
            "UPDATE contact_messages SET read = $2 WHERE id = $1 RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(id)
        .bind(read)
        .fetch_optional(&self.pool)
        .await?;
        Ok(message)
    }

    async fn delete_message(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM contact_messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn visitor_stat(&self, page: &str) -> StoreResult<Option<VisitorStat>> {
        let stat = sqlx::query_as::<_, VisitorStat>(
            "SELECT id, page, count, last_visit FROM visitor_stats WHERE page = $1",
        )
        .bind(page)
        .fetch_optional(&self.pool)
        .await?;
        Ok(stat)
    }

    async fn list_visitor_stats(&self) -> StoreResult<Vec<VisitorStat>> {
        let stats = sqlx::query_as::<_, VisitorStat>(
            "SELECT id, page, count, last_visit FROM visitor_stats ORDER BY page ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(stats)
    }

    async fn write_visitor_count(&self, page: &str, count: i32) -> StoreResult<VisitorStat> {
        let stat = sqlx::query_as::<_, VisitorStat>(
            r#"
            INSERT INTO visitor_stats (page, count, last_visit)
            VALUES ($1, $2, now())
            ON CONFLICT (page) DO UPDATE SET count = EXCLUDED.count, last_visit = now()
            RETURNING id, page, count, last_visit
            "#,
        )
        .bind(page)
        .bind(count)
        .fetch_one(&self.pool)
        .await?;
        Ok(stat)
    }

    async fn content_counts(&self) -> StoreResult<ContentCounts> {
        let counts = sqlx::query_as::<_, ContentCounts>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM blog_posts) AS posts,
                (SELECT COUNT(*) FROM blog_posts WHERE published) AS published_posts,
                (SELECT COUNT(*) FROM projects) AS projects,
                (SELECT COUNT(*) FROM skills) AS skills,
                (SELECT COUNT(*) FROM contact_messages WHERE NOT read) AS unread_messages,
                (SELECT COALESCE(SUM(count), 0)::BIGINT FROM visitor_stats) AS total_visits
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }
}
