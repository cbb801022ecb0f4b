//! Seeds an empty database with a sample profile, skills, projects and posts.
//!
//! Usage: `DATABASE_URL=... cargo run --bin seed`
//! Set `SEED_ADMIN_USER_ID` to the identity provider's user id to make the
//! seeded profile an admin.

use portfolio_site::db::{self, models::*, DbConfig};
use portfolio_site::store::{ContentStore, PgStore, StoreError};

const DEFAULT_USER_ID: &str = "seed-owner";

fn profile() -> ProfileInput {
    ProfileInput {
        name: "Sam Rivera".to_string(),
        title: "Backend Engineer".to_string(),
        bio: "I build web services and developer tooling, mostly in Rust and TypeScript."
            .to_string(),
        avatar: Some("/images/avatar.jpg".to_string()),
        email: Some("sam@example.com".to_string()),
        github: Some("https://github.com/example".to_string()),
        linkedin: Some("https://linkedin.com/in/example".to_string()),
        twitter: None,
        resume: None,
    }
}

fn skills() -> Vec<SkillInput> {
    [
        ("Rust", "🦀", "backend", 90),
        ("PostgreSQL", "🐘", "database", 80),
        ("TypeScript", "TS", "frontend", 80),
        ("React", "⚛️", "frontend", 75),
        ("Docker", "🐳", "devops", 70),
    ]
    .into_iter()
    .map(|(name, icon, category, proficiency)| SkillInput {
        name: name.to_string(),
        icon: Some(icon.to_string()),
        category: category.to_string(),
        proficiency,
    })
    .collect()
}

fn projects() -> Vec<ProjectInput> {
    vec![
        ProjectInput {
            title: "Portfolio API".to_string(),
            description: "The JSON API behind this site: profile, projects, blog and contact."
                .to_string(),
            image: None,
            demo_url: None,
            github_url: Some("https://github.com/example/portfolio".to_string()),
            technologies: vec!["Rust".into(), "Axum".into(), "PostgreSQL".into()],
            featured: true,
            display_order: 1,
        },
        ProjectInput {
            title: "Log Shipper".to_string(),
            description: "A small agent that tails files and forwards structured logs."
                .to_string(),
            image: None,
            demo_url: None,
            github_url: Some("https://github.com/example/log-shipper".to_string()),
            technologies: vec!["Rust".into(), "Tokio".into()],
            featured: false,
            display_order: 2,
        },
    ]
}

fn posts() -> Vec<BlogPostInput> {
    vec![BlogPostInput {
        title: "Hello, world".to_string(),
        slug: "hello-world".to_string(),
        excerpt: Some("Why this site exists and what will be posted here.".to_string()),
        content: "<h2>Welcome</h2><p>Notes on backend work, tooling and the odd side project.</p>"
            .to_string(),
        cover_image: None,
        published: true,
        tags: vec!["meta".to_string(), "rust".to_string()],
    }]
}

async fn seed(store: &PgStore) -> Result<(), StoreError> {
    let counts = store.content_counts().await?;
    if counts.posts + counts.projects + counts.skills > 0 {
        println!("Database already has content, skipping seed.");
        return Ok(());
    }

    let user_id = std::env::var("SEED_ADMIN_USER_ID").ok();
    let owner = user_id.as_deref().unwrap_or(DEFAULT_USER_ID);
    if store.profile_by_user(owner).await?.is_none() {
        store.insert_profile(owner, &profile()).await?;
        println!("Profile created for {}", owner);
    }
    if user_id.is_some() {
        sqlx::query("UPDATE profile SET is_admin = true WHERE user_id = $1")
            .bind(owner)
            .execute(store.pool())
            .await?;
        println!("Granted admin to {}", owner);
    }

    for skill in skills() {
        store.insert_skill(&skill).await?;
    }
    for project in projects() {
        store.insert_project(&project).await?;
    }
    for post in posts() {
        store.insert_post(&post).await?;
    }
    println!("Seed completed");
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL must be set to seed the database");
        std::process::exit(1);
    }

    let pool = match db::init_pool(&DbConfig::default()).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Error connecting to database: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = db::run_migrations(&pool).await {
        eprintln!("Error running migrations: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = seed(&PgStore::new(pool)).await {
        eprintln!("Seed failed: {}", e);
        std::process::exit(1);
    }
}
