//! Portfolio Site - library for app logic and testing

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod media;
pub mod routes;
pub mod store;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::media::{CloudinaryHost, ImageHost};
use crate::routes::auth::TokenVerifier;
use crate::store::{ContentStore, MemoryStore, PgStore};

/// Upload body cap: the largest image plus multipart framing. Other routes keep
/// axum's default limit.
const BODY_LIMIT: usize = media::MAX_FILE_SIZE + 1024 * 1024;

/// Shared per-process handles. Handlers keep no other state between requests.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ContentStore>,
    /// `None` when no image host is configured; uploads then answer 503.
    pub images: Option<Arc<dyn ImageHost>>,
    pub verifier: Arc<TokenVerifier>,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid token verification key: {0}")]
    VerificationKey(#[from] jsonwebtoken::errors::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN.
/// Falls back to the local frontend dev server.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .and_then(|s| {
            let origins: Vec<HeaderValue> = s
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                None
            } else {
                Some(origins)
            }
        })
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors();

    let admin_pages = Router::new()
        .route("/admin/dashboard", get(routes::admin::dashboard))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            routes::auth::admin_pages,
        ));

    Router::new()
        .route(
            "/api/profile",
            get(routes::profile::get_profile).put(routes::profile::update_profile),
        )
        .route(
            "/api/skills",
            get(routes::skills::list_skills).post(routes::skills::create_skill),
        )
        .route(
            "/api/skills/{id}",
            get(routes::skills::get_skill)
                .put(routes::skills::update_skill)
                .delete(routes::skills::delete_skill),
        )
        .route(
            "/api/projects",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/api/projects/{id}",
            get(routes::projects::get_project)
                .put(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        .route(
            "/api/blog",
            get(routes::blog::list_posts).post(routes::blog::create_post),
        )
        .route(
            "/api/blog/{id}",
            get(routes::blog::get_post)
                .put(routes::blog::update_post)
                .delete(routes::blog::delete_post),
        )
        .route("/api/tags", get(routes::blog::list_tags))
        .route(
            "/api/contact",
            get(routes::contact::list_messages).post(routes::contact::submit_message),
        )
        .route(
            "/api/contact/{id}",
            get(routes::contact::get_message)
                .patch(routes::contact::mark_read)
                .delete(routes::contact::delete_message),
        )
        .route(
            "/api/visitor",
            get(routes::visitor::get_count).post(routes::visitor::record_visit),
        )
        .route("/api/check-admin", get(routes::auth::check_admin))
        .route("/api/admin/stats", get(routes::admin::stats))
        .route(
            "/api/upload",
            post(routes::upload::upload_image).layer(DefaultBodyLimit::max(BODY_LIMIT)),
        )
        .route("/health", get(routes::health::health_ping))
        .route("/health/database", get(routes::health::health_database))
        .route("/health/ready", get(routes::health::health_ready))
        .merge(admin_pages)
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        // Compress responses with gzip/br/zstd automatically
        .layer(CompressionLayer::new())
        .layer(cors)
}

/// Connects to Postgres when configured, otherwise falls back to the in-memory store.
async fn build_store(config: &AppConfig) -> Result<Arc<dyn ContentStore>, StartupError> {
    match &config.database {
        Some(db_config) => {
            let pool = db::init_pool(db_config).await?;
            db::run_migrations(&pool).await?;
            Ok(Arc::new(PgStore::new(pool)))
        }
        None if config.environment.is_production() => Err(StartupError::Config(
            "DATABASE_URL must be set in production".to_string(),
        )),
        None => {
            tracing::warn!(
                "DATABASE_URL not set. Using the in-memory store; content is lost on restart."
            );
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Run the server (used by main).
pub async fn run() -> Result<(), StartupError> {
    dotenvy::dotenv().ok();

    // Guards MUST be held for the programme's lifetime; dropping them early
    // shuts down background log-writer threads and loses buffered log lines.
    let _log_guards = logging::init();

    routes::health::init_start_time();

    let config = AppConfig::from_env().map_err(StartupError::Config)?;
    tracing::info!("Starting in {} environment", config.environment.as_str());

    // Refuse to start in production with the insecure default token secret.
    if config.environment.is_production() && config.auth.uses_default_secret() {
        return Err(StartupError::Config(
            "AUTH_JWT_SECRET or AUTH_JWT_PUBLIC_KEY must be set in production".to_string(),
        ));
    }

    let verifier = TokenVerifier::from_config(&config.auth)?;
    let store = build_store(&config).await?;

    let images: Option<Arc<dyn ImageHost>> = match config.cloudinary.clone() {
        Some(cloudinary) => Some(Arc::new(CloudinaryHost::new(cloudinary))),
        None => {
            tracing::warn!("Cloudinary is not configured. Image uploads are disabled.");
            None
        }
    };

    let app = create_app(AppState {
        store,
        images,
        verifier: Arc::new(verifier),
    });
    tracing::info!("CORS configured");

    tracing::info!("Starting server on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
