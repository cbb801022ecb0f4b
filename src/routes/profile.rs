/**
 * Profile Routes
 * Public owner profile, self-service edits for signed-in users
 */
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::models::{Profile, ProfileInput};
use crate::error::{ApiError, ApiResult, FieldErrors, Success};
use crate::routes::auth::Caller;
use crate::routes::optional_text;
use crate::store::StoreError;
use crate::AppState;

/// Request body for PUT /api/profile. There is no admin field: the flag is
/// only ever changed directly in the database.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileRequest {
    pub name: Option<String>,
    pub title: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub email: Option<String>,
    pub github: Option<String>,
    pub linkedin: Option<String>,
    pub twitter: Option<String>,
    pub resume: Option<String>,
}

impl ProfileRequest {
    pub fn into_input(self) -> Result<ProfileInput, ApiError> {
        let name = optional_text(self.name);
        let title = optional_text(self.title);
        let bio = optional_text(self.bio);

        let mut details = FieldErrors::new();
        for (field, value) in [("name", &name), ("title", &title), ("bio", &bio)] {
            if value.is_none() {
                details.insert(field.to_string(), vec![format!("{} is required", capitalize(field))]);
            }
        }
        let (Some(name), Some(title), Some(bio)) = (name, title, bio) else {
            return Err(ApiError::validation_with("Validation failed", details));
        };

        Ok(ProfileInput {
            name,
            title,
            bio,
            avatar: optional_text(self.avatar),
            email: optional_text(self.email),
            github: optional_text(self.github),
            linkedin: optional_text(self.linkedin),
            twitter: optional_text(self.twitter),
            resume: optional_text(self.resume),
        })
    }
}

fn capitalize(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileBody {
    pub profile: Option<Profile>,
}

/// GET /api/profile - The caller's own profile when signed in, else the site owner's
pub async fn get_profile(State(state): State<AppState>, caller: Caller) -> ApiResult<ProfileBody> {
    let own = match caller.identity() {
        Some(identity) => state
            .store
            .profile_by_user(&identity.user_id)
            .await
            .map_err(ApiError::store("Failed to fetch profile"))?,
        None => None,
    };

    let profile = match own {
        Some(profile) => Some(profile),
        None => state
            .store
            .owner_profile()
            .await
            .map_err(ApiError::store("Failed to fetch profile"))?,
    };
    Ok(Success::ok(ProfileBody { profile }))
}

/// PUT /api/profile - Update the caller's profile, creating it on first save
pub async fn update_profile(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<ProfileRequest>, JsonRejection>,
) -> ApiResult<ProfileBody> {
    let identity = caller.require()?;
    let Json(request) = payload?;
    let input = request.into_input()?;

    let updated = state
        .store
        .update_profile(&identity.user_id, &input)
        .await
        .map_err(ApiError::store("Failed to update profile"))?;

    let profile = match updated {
        Some(profile) => profile,
        None => match state.store.insert_profile(&identity.user_id, &input).await {
            Ok(profile) => {
                tracing::info!(user_id = %identity.user_id, "Profile created");
                profile
            }
            // Lost a race with a concurrent first save; apply ours on top.
            Err(StoreError::Conflict(_)) => state
                .store
                .update_profile(&identity.user_id, &input)
                .await
                .map_err(ApiError::store("Failed to update profile"))?
                .ok_or_else(|| ApiError::not_found("Profile not found"))?,
            Err(e) => return Err(ApiError::store("Failed to update profile")(e)),
        },
    };
    Ok(Success::ok(ProfileBody {
        profile: Some(profile),
    }))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{self, TestApp};
    use axum::http::StatusCode;
    use serde_json::json;

    fn profile_body(name: &str) -> serde_json::Value {
        json!({
            "name": name,
            "title": "Rust Engineer",
            "bio": "Builds backends.",
            "github": "https://github.com/example",
            "isAdmin": true
        })
    }

    #[tokio::test]
    async fn test_put_requires_identity() {
        let app = TestApp::new();
        let (status, _) = app.put("/api/profile", None, profile_body("Ada")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_first_save_creates_non_admin_profile() {
        let app = TestApp::new();
        let token = test_support::token_for("user_new");

        let (status, body) = app.put("/api/profile", Some(&token), profile_body("Ada")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["profile"]["name"], "Ada");
        assert_eq!(body["profile"]["userId"], "user_new");
        assert_eq!(body["profile"]["isAdmin"], false);

        let (_, body) = app.put("/api/profile", Some(&token), profile_body("Ada L.")).await;
        assert_eq!(body["profile"]["name"], "Ada L.");

        let (_, body) = app.get("/api/profile", Some(&token)).await;
        assert_eq!(body["profile"]["name"], "Ada L.");
    }

    #[tokio::test]
    async fn test_put_validates_required_fields() {
        let app = TestApp::new();
        let token = app.member("user_member").await;

        let (status, body) = app
            .put("/api/profile", Some(&token), json!({ "name": "Ada", "bio": "  " }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["title"][0], "Title is required");
        assert_eq!(body["details"]["bio"][0], "Bio is required");
        assert!(body["details"].get("name").is_none());
    }

    #[tokio::test]
    async fn test_anonymous_get_returns_owner_profile() {
        let app = TestApp::new();

        let (status, body) = app.get("/api/profile", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["profile"].is_null());

        app.member("user_member").await;
        app.admin("user_owner").await;
        let (_, body) = app.get("/api/profile", None).await;
        assert_eq!(body["profile"]["userId"], "user_owner");
    }
}
