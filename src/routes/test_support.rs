//! Shared fixtures for the route tests: an app wired to `MemoryStore`, a stub
//! image host and tokens signed with a fixed test secret.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

use crate::config::AuthConfig;
use crate::db::models::ProfileInput;
use crate::media::{HostedImage, ImageHost, ImageUpload, MediaError};
use crate::routes::auth::{Claims, TokenVerifier};
use crate::store::{ContentStore, MemoryStore};
use crate::{create_app, AppState};

pub const TEST_SECRET: &str = "test-secret-for-route-tests";

pub fn verifier() -> TokenVerifier {
    TokenVerifier::from_config(&AuthConfig {
        jwt_secret: TEST_SECRET.to_string(),
        jwt_public_key: None,
        issuer: None,
    })
    .unwrap()
}

pub fn token_with_expiry(user_id: &str, offset_secs: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + offset_secs,
        iat: Some(now),
        iss: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn token_for(user_id: &str) -> String {
    token_with_expiry(user_id, 3600)
}

/// Records uploads instead of calling a real host.
#[derive(Debug, Default)]
pub struct StubHost {
    pub calls: AtomicUsize,
}

impl StubHost {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageHost for StubHost {
    async fn upload(&self, image: ImageUpload) -> Result<HostedImage, MediaError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(HostedImage {
            url: format!("https://images.test/portfolio/{}", image.file_name),
            public_id: format!("portfolio/upload-{}", n),
        })
    }
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub images: Arc<StubHost>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        let images = Arc::new(StubHost::default());
        let state = AppState {
            store: store.clone(),
            images: Some(images.clone()),
            verifier: Arc::new(verifier()),
        };
        Self {
            store,
            images,
            state,
        }
    }

    /// Same app with no image host configured
    pub fn without_images() -> Self {
        let mut app = Self::new();
        app.state.images = None;
        app
    }

    pub fn router(&self) -> Router {
        create_app(self.state.clone())
    }

    /// Creates a non-admin profile for `user_id` and returns a session token for it.
    pub async fn member(&self, user_id: &str) -> String {
        let input = ProfileInput {
            name: format!("Member {}", user_id),
            title: "Developer".to_string(),
            bio: "Writes code.".to_string(),
            ..Default::default()
        };
        self.store.insert_profile(user_id, &input).await.unwrap();
        token_for(user_id)
    }

    pub async fn admin(&self, user_id: &str) -> String {
        let token = self.member(user_id).await;
        self.store.set_admin(user_id, true).await;
        token
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send_json(Method::GET, uri, token, None).await
    }

    pub async fn send_json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        send(self.router(), req).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send_json(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send_json(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send_json(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send_json(Method::DELETE, uri, token, None).await
    }
}

pub async fn send_raw(app: Router, req: Request<Body>) -> Response {
    app.oneshot(req).await.unwrap()
}

/// Status and JSON body; an empty body reads as `Value::Null`.
pub async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = send_raw(app, req).await;
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    if body.is_empty() {
        return (status, Value::Null);
    }
    (status, serde_json::from_slice(&body).unwrap())
}
