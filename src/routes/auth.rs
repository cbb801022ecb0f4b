/**
 * Authorization Gate
 * Caller identity from identity-provider session tokens, and the per-request
 * admin check guarding mutations and admin pages
 */
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use cookie::Cookie;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

use crate::config::AuthConfig;
use crate::db::models::Profile;
use crate::error::ApiError;
use crate::store::{ContentStore, StoreError};
use crate::AppState;

/// Cookie the identity provider's browser SDK stores the session token in
const SESSION_COOKIE: &str = "__session";

const SIGN_IN_PATH: &str = "/sign-in";

// ============================================================================
// Token verification
// ============================================================================

/// Session token claims. Only the subject is used as the caller identity.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // External user id
    pub exp: i64,    // Expiry timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn from_config(config: &AuthConfig) -> Result<Self, jsonwebtoken::errors::Error> {
        let (key, algorithm) = match &config.jwt_public_key {
            Some(pem) => (DecodingKey::from_rsa_pem(pem.as_bytes())?, Algorithm::RS256),
            None => (
                DecodingKey::from_secret(config.jwt_secret.as_bytes()),
                Algorithm::HS256,
            ),
        };

        let mut validation = Validation::new(algorithm);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }

        Ok(Self { key, validation })
    }

    /// Verify and decode a session token
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(token_data.claims)
    }
}

/// Bearer token from the Authorization header, else the session cookie
fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

// ============================================================================
// Caller identity
// ============================================================================

/// Resolved external-authentication subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: String,
}

/// Who is making the request. Extracting this never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    /// A token was sent but could not be verified
    Invalid,
    Identified(CallerIdentity),
}

impl Caller {
    pub fn resolve(verifier: &TokenVerifier, headers: &HeaderMap) -> Self {
        match session_token(headers) {
            None => Caller::Anonymous,
            Some(token) => match verifier.verify(&token) {
                Ok(claims) => Caller::Identified(CallerIdentity {
                    user_id: claims.sub,
                }),
                Err(e) => {
                    tracing::debug!(error = %e, "rejected session token");
                    Caller::Invalid
                }
            },
        }
    }

    pub fn identity(&self) -> Option<&CallerIdentity> {
        match self {
            Caller::Identified(identity) => Some(identity),
            _ => None,
        }
    }

    /// Fails with 401 unless the caller is identified
    pub fn require(&self) -> Result<&CallerIdentity, ApiError> {
        match self {
            Caller::Identified(identity) => Ok(identity),
            Caller::Anonymous => Err(ApiError::unauthorized("Unauthorized")),
            Caller::Invalid => Err(ApiError::unauthorized("Invalid or expired token")),
        }
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Caller::resolve(&state.verifier, &parts.headers))
    }
}

// ============================================================================
// Admin check
// ============================================================================

/// Proof that the admin check passed for this request
#[derive(Debug, Clone)]
pub struct AdminAccess {
    pub profile: Profile,
}

async fn admin_profile(
    store: &dyn ContentStore,
    identity: &CallerIdentity,
) -> Result<Option<Profile>, StoreError> {
    Ok(store
        .profile_by_user(&identity.user_id)
        .await?
        .filter(|profile| profile.is_admin))
}

/// 401 without identity, 403 unless the caller's profile carries the admin flag.
/// Looked up fresh on every call.
pub async fn require_admin(
    store: &dyn ContentStore,
    caller: &Caller,
) -> Result<AdminAccess, ApiError> {
    let identity = caller.require()?;
    match admin_profile(store, identity)
        .await
        .map_err(ApiError::store("Failed to verify admin access"))?
    {
        Some(profile) => Ok(AdminAccess { profile }),
        None => Err(ApiError::forbidden("Admin access required")),
    }
}

/// Non-failing variant for read paths that only change what they show.
pub async fn is_admin(store: &dyn ContentStore, caller: &Caller) -> bool {
    let Some(identity) = caller.identity() else {
        return false;
    };
    match admin_profile(store, identity).await {
        Ok(profile) => profile.is_some(),
        Err(e) => {
            tracing::error!(error = %e, "Error checking admin status");
            false
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAdminResponse {
    pub is_admin: bool,
}

/// GET /api/check-admin
pub async fn check_admin(State(state): State<AppState>, caller: Caller) -> impl IntoResponse {
    Json(CheckAdminResponse {
        is_admin: is_admin(state.store.as_ref(), &caller).await,
    })
}

// ============================================================================
// Admin pages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAccess {
    Allowed,
    SignIn,
    Home,
}

pub async fn page_access(store: &dyn ContentStore, caller: &Caller) -> PageAccess {
    if caller.identity().is_none() {
        return PageAccess::SignIn;
    }
    if is_admin(store, caller).await {
        PageAccess::Allowed
    } else {
        PageAccess::Home
    }
}

/// Middleware for `/admin/*`: anonymous callers go to sign-in, non-admins go home.
pub async fn admin_pages(
    State(state): State<AppState>,
    caller: Caller,
    request: Request,
    next: Next,
) -> Response {
    match page_access(state.store.as_ref(), &caller).await {
        PageAccess::Allowed => next.run(request).await,
        PageAccess::SignIn => {
            let original = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/admin");
            let target = format!("{}?redirect_url={}", SIGN_IN_PATH, urlencoding::encode(original));
            Redirect::to(&target).into_response()
        }
        PageAccess::Home => Redirect::to("/").into_response(),
    }
}
