/**
 * Contact Routes
 * Public contact form intake and admin inbox management
 */
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::db::models::{ContactMessage, NewContactMessage};
use crate::error::{ApiError, ApiResult, Done, FieldErrors, Success};
use crate::routes::auth::{require_admin, Caller};
use crate::routes::parse_id;
use crate::AppState;

const INVALID_ID: &str = "Invalid message ID";
const NOT_FOUND: &str = "Message not found";
const MIN_MESSAGE_CHARS: usize = 10;

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for POST /api/contact
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

impl ContactRequest {
    /// Collects every failing field before rejecting.
    pub fn into_message(self) -> Result<NewContactMessage, FieldErrors> {
        let mut errors = FieldErrors::new();
        let mut fail = |field: &str, message: &str| {
            errors
                .entry(field.to_string())
                .or_default()
                .push(message.to_string());
        };

        let name = self.name.unwrap_or_default().trim().to_string();
        if name.is_empty() {
            fail("name", "Name is required");
        }

        let email = self.email.unwrap_or_default().trim().to_string();
        if !EMAIL_REGEX.is_match(&email) {
            fail("email", "Invalid email address");
        }

        let subject = self.subject.unwrap_or_default().trim().to_string();
        if subject.is_empty() {
            fail("subject", "Subject is required");
        }

        let message = self.message.unwrap_or_default();
        if message.chars().count() < MIN_MESSAGE_CHARS {
            fail("message", "Message must be at least 10 characters");
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(NewContactMessage {
            name,
            email,
            subject,
            message,
        })
    }
}

/// Request body for PATCH /api/contact/{id}
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReadFlagRequest {
    pub read: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct MessageList {
    pub messages: Vec<ContactMessage>,
}

#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: ContactMessage,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/contact - Public contact form. Nothing is echoed back.
pub async fn submit_message(
    State(state): State<AppState>,
    payload: Result<Json<ContactRequest>, JsonRejection>,
) -> ApiResult<Done> {
    let Json(request) = payload?;
    let message = request
        .into_message()
        .map_err(|details| ApiError::validation_with("Validation failed", details))?;

    let saved = state
        .store
        .insert_message(&message)
        .await
        .map_err(ApiError::store("Failed to save message"))?;
    tracing::info!(message_id = saved.id, "Contact message received");
    Ok(Success::created(Done::default()))
}

/// PATCH /api/contact/{id} - Set the read flag (any signed-in caller)
pub async fn mark_read(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    payload: Result<Json<ReadFlagRequest>, JsonRejection>,
) -> ApiResult<Done> {
    caller.require()?;
    let id = parse_id(&id, INVALID_ID)?;
    let Json(request) = payload?;
    let read = request
        .read
        .ok_or_else(|| ApiError::validation("Invalid request body"))?;

    state
        .store
        .set_message_read(id, read)
        .await
        .map_err(ApiError::store("Failed to update message"))?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(Success::ok(Done::with_message(if read {
        "Message marked as read"
    } else {
        "Message marked as unread"
    })))
}

/// GET /api/contact - Inbox, newest first (admin)
pub async fn list_messages(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<MessageList> {
    require_admin(state.store.as_ref(), &caller).await?;
    let messages = state
        .store
        .list_messages()
        .await
        .map_err(ApiError::store("Failed to fetch messages"))?;
    Ok(Success::ok(MessageList { messages }))
}

/// GET /api/contact/{id} - Open a message; opening marks it read (admin)
pub async fn get_message(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<MessageBody> {
    require_admin(state.store.as_ref(), &caller).await?;
    let id = parse_id(&id, INVALID_ID)?;

    let message = state
        .store
        .set_message_read(id, true)
        .await
        .map_err(ApiError::store("Failed to fetch message"))?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(Success::ok(MessageBody { message }))
}

/// DELETE /api/contact/{id} (admin)
pub async fn delete_message(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Done> {
    require_admin(state.store.as_ref(), &caller).await?;
    let id = parse_id(&id, INVALID_ID)?;

    let deleted = state
        .store
        .delete_message(id)
        .await
        .map_err(ApiError::store("Failed to delete message"))?;
    if !deleted {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    Ok(Success::ok(Done::with_message("Message deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::TestApp;
    use crate::store::ContentStore;
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    fn form(email: &str, message: &str) -> Value {
        json!({
            "name": "Ada",
            "email": email,
            "subject": "Hello",
            "message": message
        })
    }

    #[test]
    fn test_message_length_counts_characters() {
        let request = ContactRequest {
            name: Some("Ada".into()),
            email: Some("a@b.co".into()),
            subject: Some("Hi".into()),
            message: Some("ééééééééé".into()),
        };
        let errors = request.into_message().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_key("message"));
    }

    #[tokio::test]
    async fn test_message_length_boundary() {
        let app = TestApp::new();

        let (status, body) = app.post("/api/contact", None, form("a@b.co", "123456789")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(
            body["details"]["message"][0],
            "Message must be at least 10 characters"
        );

        let (status, body) = app.post("/api/contact", None, form("a@b.co", "1234567890")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({ "success": true }));
    }

    #[tokio::test]
    async fn test_email_validation() {
        let app = TestApp::new();

        let (status, body) = app
            .post("/api/contact", None, form("not-an-email", "long enough message"))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["email"][0], "Invalid email address");
        assert!(app.store.list_messages().await.unwrap().is_empty());

        let (status, _) = app
            .post("/api/contact", None, form("a@b.co", "long enough message"))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let stored = app.store.list_messages().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(!stored[0].read);
    }

    #[tokio::test]
    async fn test_mark_read_requires_identity_and_boolean() {
        let app = TestApp::new();
        let member = app.member("user_member").await;
        app.post("/api/contact", None, form("a@b.co", "long enough message"))
            .await;
        let id = app.store.list_messages().await.unwrap()[0].id;
        let uri = format!("/api/contact/{}", id);

        let (status, _) = app.patch(&uri, None, json!({ "read": true })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app.patch(&uri, Some(&member), json!({ "read": "yes" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request body");

        let (status, _) = app.patch("/api/contact/abc", Some(&member), json!({ "read": true })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .patch("/api/contact/9999", Some(&member), json!({ "read": true }))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app.patch(&uri, Some(&member), json!({ "read": true })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(app.store.message(id).await.unwrap().unwrap().read);
    }

    #[tokio::test]
    async fn test_admin_inbox() {
        let app = TestApp::new();
        let admin = app.admin("user_admin").await;
        let member = app.member("user_member").await;
        app.post("/api/contact", None, form("a@b.co", "first message here"))
            .await;
        app.post("/api/contact", None, form("c@d.io", "second message here"))
            .await;

        let (status, _) = app.get("/api/contact", Some(&member)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app.get("/api/contact", Some(&admin)).await;
        assert_eq!(status, StatusCode::OK);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages[0]["email"], "c@d.io");
        let id = messages[0]["id"].as_i64().unwrap();

        let (status, body) = app.get(&format!("/api/contact/{}", id), Some(&admin)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"]["read"], true);

        let (status, _) = app.delete(&format!("/api/contact/{}", id), Some(&admin)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app.delete(&format!("/api/contact/{}", id), Some(&admin)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
