use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::{ContentStore, StoreError, StoreResult};
use crate::db::models::{
    BlogPost, BlogPostFilter, BlogPostInput, ContactMessage, ContentCounts, NewContactMessage,
    Profile, ProfileInput, Project, ProjectInput, Skill, SkillInput, TagSummary, VisitorStat,
};

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    profiles: Vec<Profile>,
    skills: Vec<Skill>,
    projects: Vec<Project>,
    // `tags` on stored posts is always empty; it is filled from `post_tags` on read.
    posts: Vec<BlogPost>,
    tags: BTreeMap<String, i64>,
    post_tags: Vec<(i64, i64)>,
    messages: Vec<ContactMessage>,
    visitor_stats: Vec<VisitorStat>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn hydrate(&self, post: &BlogPost) -> BlogPost {
        let mut names: Vec<String> = self
            .post_tags
            .iter()
            .filter(|(post_id, _)| *post_id == post.id)
            .filter_map(|(_, tag_id)| {
                self.tags
                    .iter()
                    .find(|(_, id)| *id == tag_id)
                    .map(|(name, _)| name.clone())
            })
            .collect();
        names.sort();
        BlogPost {
            tags: names,
            ..post.clone()
        }
    }

    fn post_has_tag(&self, post_id: i64, tag: &str) -> bool {
        match self.tags.get(tag) {
            Some(tag_id) => self.post_tags.contains(&(post_id, *tag_id)),
            None => false,
        }
    }

    fn replace_tags(&mut self, post_id: i64, tags: &[String]) {
        self.post_tags.retain(|(p, _)| *p != post_id);
        for name in tags {
            let tag_id = match self.tags.get(name) {
                Some(id) => *id,
                None => {
                    let id = self.next_id();
                    self.tags.insert(name.clone(), id);
                    id
                }
            };
            if !self.post_tags.contains(&(post_id, tag_id)) {
                self.post_tags.push((post_id, tag_id));
            }
        }
    }

    fn slug_taken(&self, slug: &str, except: Option<i64>) -> bool {
        self.posts
            .iter()
            .any(|p| p.slug == slug && Some(p.id) != except)
    }
}

/// In-process store with the same contract as `PgStore`.
///
/// Used when the service runs without `DATABASE_URL` and by the handler tests.
/// Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    /// Holds every visitor counter read until this many readers arrive.
    #[cfg(test)]
    visitor_read_barrier: Option<std::sync::Arc<tokio::sync::Barrier>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose `visitor_stat` reads wait for `readers` concurrent callers
    /// before returning, so each of them sees the same prior count.
    #[cfg(test)]
    pub(crate) fn with_visitor_read_barrier(readers: usize) -> Self {
        Self {
            visitor_read_barrier: Some(std::sync::Arc::new(tokio::sync::Barrier::new(readers))),
            ..Self::default()
        }
    }

    /// Grants or revokes the admin flag. There is no API route for this; it
    /// mirrors flipping `is_admin` directly in the database.
    pub async fn set_admin(&self, user_id: &str, is_admin: bool) -> bool {
        let mut tables = self.tables.write().await;
        match tables.profiles.iter_mut().find(|p| p.user_id == user_id) {
            Some(profile) => {
                profile.is_admin = is_admin;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn ping(&self) -> StoreResult<Duration> {
        let start = Instant::now();
        let _tables = self.tables.read().await;
        Ok(start.elapsed())
    }

    async fn profile_by_user(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        let tables = self.tables.read().await;
        Ok(tables.profiles.iter().find(|p| p.user_id == user_id).cloned())
    }

    async fn owner_profile(&self) -> StoreResult<Option<Profile>> {
        let tables = self.tables.read().await;
        let owner = tables
            .profiles
            .iter()
            .filter(|p| p.is_admin)
            .min_by_key(|p| p.id)
            .or_else(|| tables.profiles.iter().min_by_key(|p| p.id));
        Ok(owner.cloned())
    }

    async fn insert_profile(&self, user_id: &str, input: &ProfileInput) -> StoreResult<Profile> {
        let mut tables = self.tables.write().await;
        if tables.profiles.iter().any(|p| p.user_id == user_id) {
            return Err(StoreError::Conflict("profile_user_id_key".to_string()));
        }
        let now = Utc::now();
        let profile = Profile {
            id: tables.next_id(),
            user_id: user_id.to_string(),
            name: input.name.clone(),
            title: input.title.clone(),
            bio: input.bio.clone(),
            avatar: input.avatar.clone(),
            email: input.email.clone(),
            github: input.github.clone(),
            linkedin: input.linkedin.clone(),
            twitter: input.twitter.clone(),
            resume: input.resume.clone(),
            is_admin: false,
            created_at: now,
            updated_at: now,
        };
        tables.profiles.push(profile.clone());
        Ok(profile)
    }

    async fn update_profile(
        &self,
        user_id: &str,
        input: &ProfileInput,
    ) -> StoreResult<Option<Profile>> {
        let mut tables = self.tables.write().await;
        let Some(profile) = tables.profiles.iter_mut().find(|p| p.user_id == user_id) else {
            return Ok(None);
        };
        profile.name = input.name.clone();
        profile.title = input.title.clone();
        profile.bio = input.bio.clone();
        profile.avatar = input.avatar.clone();
        profile.email = input.email.clone();
        profile.github = input.github.clone();
        profile.linkedin = input.linkedin.clone();
        profile.twitter = input.twitter.clone();
        profile.resume = input.resume.clone();
        profile.updated_at = Utc::now();
        Ok(Some(profile.clone()))
    }

    async fn list_skills(&self) -> StoreResult<Vec<Skill>> {
        let tables = self.tables.read().await;
        let mut skills = tables.skills.clone();
        skills.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(skills)
    }

    async fn skill(&self, id: i64) -> StoreResult<Option<Skill>> {
        let tables = self.tables.read().await;
        Ok(tables.skills.iter().find(|s| s.id == id).cloned())
    }

    async fn insert_skill(&self, input: &SkillInput) -> StoreResult<Skill> {
        let mut tables = self.tables.write().await;
        let skill = Skill {
            id: tables.next_id(),
            name: input.name.clone(),
            icon: input.icon.clone(),
            category: input.category.clone(),
            proficiency: input.proficiency,
        };
        tables.skills.push(skill.clone());
        Ok(skill)
    }

    async fn update_skill(&self, id: i64, input: &SkillInput) -> StoreResult<Option<Skill>> {
        let mut tables = self.tables.write().await;
        let Some(skill) = tables.skills.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        skill.name = input.name.clone();
        skill.icon = input.icon.clone();
        skill.category = input.category.clone();
        skill.proficiency = input.proficiency;
        Ok(Some(skill.clone()))
    }

    async fn delete_skill(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.skills.len();
        tables.skills.retain(|s| s.id != id);
        Ok(tables.skills.len() < before)
    }

    async fn list_projects(&self, featured: Option<bool>) -> StoreResult<Vec<Project>> {
        let tables = self.tables.read().await;
        let mut projects: Vec<Project> = tables
            .projects
            .iter()
            .filter(|p| featured.map_or(true, |f| p.featured == f))
            .cloned()
            .collect();
        projects.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then(a.id.cmp(&b.id))
        });
        Ok(projects)
    }

    async fn project(&self, id: i64) -> StoreResult<Option<Project>> {
        let tables = self.tables.read().await;
        Ok(tables.projects.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_project(&self, input: &ProjectInput) -> StoreResult<Project> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let project = Project {
            id: tables.next_id(),
            title: input.title.clone(),
            description: input.description.clone(),
            image: input.image.clone(),
            demo_url: input.demo_url.clone(),
            github_url: input.github_url.clone(),
            technologies: input.technologies.clone(),
            featured: input.featured,
            display_order: input.display_order,
            created_at: now,
            updated_at: now,
        };
        tables.projects.push(project.clone());
        Ok(project)
    }

    async fn update_project(
        &self,
        id: i64,
        input: &ProjectInput,
    ) -> StoreResult<Option<Project>> {
        let mut tables = self.tables.write().await;
        let Some(project) = tables.projects.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        project.title = input.title.clone();
        project.description = input.description.clone();
        project.image = input.image.clone();
        project.demo_url = input.demo_url.clone();
        project.github_url = input.github_url.clone();
        project.technologies = input.technologies.clone();
        project.featured = input.featured;
        project.display_order = input.display_order;
        project.updated_at = Utc::now();
        Ok(Some(project.clone()))
    }

    async fn delete_project(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.projects.len();
        tables.projects.retain(|p| p.id != id);
        Ok(tables.projects.len() < before)
    }

    async fn list_posts(&self, filter: &BlogPostFilter) -> StoreResult<Vec<BlogPost>> {
        let tables = self.tables.read().await;
        let mut posts: Vec<BlogPost> = tables
            .posts
            .iter()
            .filter(|p| filter.published.map_or(true, |want| p.published == want))
            .filter(|p| {
                filter
                    .tag
                    .as_deref()
                    .map_or(true, |tag| tables.post_has_tag(p.id, tag))
            })
            .map(|p| tables.hydrate(p))
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(posts)
    }

    async fn post_by_id(&self, id: i64) -> StoreResult<Option<BlogPost>> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .iter()
            .find(|p| p.id == id)
            .map(|p| tables.hydrate(p)))
    }

    async fn post_by_slug(&self, slug: &str) -> StoreResult<Option<BlogPost>> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .iter()
            .find(|p| p.slug == slug)
            .map(|p| tables.hydrate(p)))
    }

    async fn insert_post(&self, input: &BlogPostInput) -> StoreResult<BlogPost> {
        let mut tables = self.tables.write().await;
        if tables.slug_taken(&input.slug, None) {
            return Err(StoreError::Conflict("blog_posts_slug_key".to_string()));
        }
        let now = Utc::now();
        let post = BlogPost {
            id: tables.next_id(),
            title: input.title.clone(),
            slug: input.slug.clone(),
            excerpt: input.excerpt.clone(),
            content: input.content.clone(),
            cover_image: input.cover_image.clone(),
            published: input.published,
            views: 0,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        tables.posts.push(post.clone());
        tables.replace_tags(post.id, &input.tags);
        Ok(tables.hydrate(&post))
    }

    async fn update_post(
        &self,
        id: i64,
        input: &BlogPostInput,
    ) -> StoreResult<Option<BlogPost>> {
        let mut tables = self.tables.write().await;
        if !tables.posts.iter().any(|p| p.id == id) {
            return Ok(None);
        }
        if tables.slug_taken(&input.slug, Some(id)) {
            return Err(StoreError::Conflict("blog_posts_slug_key".to_string()));
        }
        let Some(post) = tables.posts.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        post.title = input.title.clone();
        post.slug = input.slug.clone();
        post.excerpt = input.excerpt.clone();
        post.content = input.content.clone();
        post.cover_image = input.cover_image.clone();
        post.published = input.published;
        post.updated_at = Utc::now();
        let post = post.clone();
        tables.replace_tags(id, &input.tags);
        Ok(Some(tables.hydrate(&post)))
    }

    async fn delete_post(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.posts.len();
        tables.posts.retain(|p| p.id != id);
        // Mirrors ON DELETE CASCADE on the junction table.
        tables.post_tags.retain(|(post_id, _)| *post_id != id);
        Ok(tables.posts.len() < before)
    }

    async fn set_post_views(&self, slug: &str, views: i32) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.posts.iter_mut().find(|p| p.slug == slug) {
            Some(post) => {
                post.views = views;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_tags(&self) -> StoreResult<Vec<TagSummary>> {
        let tables = self.tables.read().await;
        let summaries = tables
            .tags
            .iter()
            .map(|(name, id)| {
                let post_count = tables
                    .post_tags
                    .iter()
                    .filter(|(_, tag_id)| tag_id == id)
                    .filter(|(post_id, _)| {
                        tables
                            .posts
                            .iter()
                            .any(|p| p.id == *post_id && p.published)
                    })
                    .count() as i64;
                TagSummary {
                    id: *id,
                    name: name.clone(),
                    post_count,
                }
            })
            .collect();
        Ok(summaries)
    }

    async fn insert_message(&self, message: &NewContactMessage) -> StoreResult<ContactMessage> {
        let mut tables = self.tables.write().await;
        let message = ContactMessage {
            id: tables.next_id(),
            name: message.name.clone(),
            email: message.email.clone(),
            subject: message.subject.clone(),
            message: message.message.clone(),
            read: false,
            created_at: Utc::now(),
        };
        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self) -> StoreResult<Vec<ContactMessage>> {
        let tables = self.tables.read().await;
        let mut messages = tables.messages.clone();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(messages)
    }

    async fn message(&self, id: i64) -> StoreResult<Option<ContactMessage>> {
        let tables = self.tables.read().await;
        Ok(tables.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn set_message_read(&self, id: i64, read: bool) -> StoreResult<Option<ContactMessage>> {
        let mut tables = self.tables.write().await;
        let Some(message) = tables.messages.iter_mut().find(|m| m.id == id) else {
            return Ok(None);
        };
        message.read = read;
        Ok(Some(message.clone()))
    }

    async fn delete_message(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.messages.len();
        tables.messages.retain(|m| m.id != id);
        Ok(tables.messages.len() < before)
    }

    async fn visitor_stat(&self, page: &str) -> StoreResult<Option<VisitorStat>> {
        let stat = {
            let tables = self.tables.read().await;
            tables.visitor_stats.iter().find(|s| s.page == page).cloned()
        };
        #[cfg(test)]
        if let Some(barrier) = &self.visitor_read_barrier {
            barrier.wait().await;
        }
        Ok(stat)
    }

    async fn list_visitor_stats(&self) -> StoreResult<Vec<VisitorStat>> {
        let tables = self.tables.read().await;
        let mut stats = tables.visitor_stats.clone();
        stats.sort_by(|a, b| a.page.cmp(&b.page));
        Ok(stats)
    }

    async fn write_visitor_count(&self, page: &str, count: i32) -> StoreResult<VisitorStat> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        if let Some(stat) = tables.visitor_stats.iter_mut().find(|s| s.page == page) {
            stat.count = count;
            stat.last_visit = now;
            return Ok(stat.clone());
        }
        let stat = VisitorStat {
            id: tables.next_id(),
            page: page.to_string(),
            count,
            last_visit: now,
        };
        tables.visitor_stats.push(stat.clone());
        Ok(stat)
    }

    async fn content_counts(&self) -> StoreResult<ContentCounts> {
        let tables = self.tables.read().await;
        Ok(ContentCounts {
            posts: tables.posts.len() as i64,
            published_posts: tables.posts.iter().filter(|p| p.published).count() as i64,
            projects: tables.projects.len() as i64,
            skills: tables.skills.len() as i64,
            unread_messages: tables.messages.iter().filter(|m| !m.read).count() as i64,
            total_visits: tables.visitor_stats.iter().map(|s| s.count as i64).sum(),
        })
    }
}
