/**
 * Project Routes
 * Public listing and detail, admin-only create/update/delete
 */
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::models::{Project, ProjectInput};
use crate::error::{ApiError, ApiResult, Done, Success};
use crate::routes::auth::{require_admin, Caller};
use crate::routes::{optional_text, parse_id};
use crate::AppState;

const INVALID_ID: &str = "Invalid project ID";
const NOT_FOUND: &str = "Project not found";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for GET /api/projects
#[derive(Debug, Default, Deserialize)]
pub struct ProjectListQuery {
    pub featured: Option<String>,
}

/// Request body for POST /api/projects and PUT /api/projects/{id}
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub demo_url: Option<String>,
    pub github_url: Option<String>,
    pub technologies: Option<Vec<String>>,
    pub featured: Option<bool>,
    pub order: Option<i32>,
}

impl ProjectRequest {
    pub fn into_input(self) -> Result<ProjectInput, ApiError> {
        let (Some(title), Some(description)) =
            (optional_text(self.title), optional_text(self.description))
        else {
            return Err(ApiError::validation("Title and description are required"));
        };

        let technologies = self
            .technologies
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        Ok(ProjectInput {
            title,
            description,
            image: optional_text(self.image),
            demo_url: optional_text(self.demo_url),
            github_url: optional_text(self.github_url),
            technologies,
            featured: self.featured.unwrap_or(false),
            display_order: self.order.unwrap_or(0),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectList {
    pub projects: Vec<Project>,
}

#[derive(Debug, Serialize)]
pub struct ProjectBody {
    pub project: Project,
}

/// `"true"`/`"false"` query flags; anything else means no filter.
pub(crate) fn query_flag(raw: Option<&str>) -> Option<bool> {
    match raw {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/projects - Projects by display order, optional `?featured=`
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ProjectListQuery>,
) -> ApiResult<ProjectList> {
    let projects = state
        .store
        .list_projects(query_flag(query.featured.as_deref()))
        .await
        .map_err(ApiError::store("Failed to fetch projects"))?;
    Ok(Success::ok(ProjectList { projects }))
}

/// GET /api/projects/{id}
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ProjectBody> {
    let id = parse_id(&id, INVALID_ID)?;
    let project = state
        .store
        .project(id)
        .await
        .map_err(ApiError::store("Failed to fetch project"))?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(Success::ok(ProjectBody { project }))
}

/// POST /api/projects - Create project (admin)
pub async fn create_project(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<ProjectRequest>, JsonRejection>,
) -> ApiResult<ProjectBody> {
    require_admin(state.store.as_ref(), &caller).await?;
    let Json(request) = payload?;
    let input = request.into_input()?;

    let project = state
        .store
        .insert_project(&input)
        .await
        .map_err(ApiError::store("Failed to create project"))?;
    tracing::info!(project_id = project.id, "Project created");
    Ok(Success::created(ProjectBody { project }))
}

/// PUT /api/projects/{id} - Replace project (admin)
pub async fn update_project(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    payload: Result<Json<ProjectRequest>, JsonRejection>,
) -> ApiResult<ProjectBody> {
    require_admin(state.store.as_ref(), &caller).await?;
    let id = parse_id(&id, INVALID_ID)?;
    let Json(request) = payload?;
    let input = request.into_input()?;

    let project = state
        .store
        .update_project(id, &input)
        .await
        .map_err(ApiError::store("Failed to update project"))?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(Success::ok(ProjectBody { project }))
}

/// DELETE /api/projects/{id} (admin)
pub async fn delete_project(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Done> {
    require_admin(state.store.as_ref(), &caller).await?;
    let id = parse_id(&id, INVALID_ID)?;

    let deleted = state
        .store
        .delete_project(id)
        .await
        .map_err(ApiError::store("Failed to delete project"))?;
    if !deleted {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    tracing::info!(project_id = id, "Project deleted");
    Ok(Success::ok(Done::with_message("Project deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::TestApp;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn test_into_input_applies_defaults() {
        let request = ProjectRequest {
            title: Some("CLI".into()),
            description: Some("A tool".into()),
            demo_url: Some("   ".into()),
            ..Default::default()
        };
        let input = request.into_input().unwrap();
        assert!(input.technologies.is_empty());
        assert!(!input.featured);
        assert_eq!(input.display_order, 0);
        assert_eq!(input.demo_url, None);
    }

    #[test]
    fn test_query_flag() {
        assert_eq!(query_flag(Some("true")), Some(true));
        assert_eq!(query_flag(Some("false")), Some(false));
        assert_eq!(query_flag(Some("yes")), None);
        assert_eq!(query_flag(None), None);
    }

    #[tokio::test]
    async fn test_projects_ordered_and_filtered() {
        let app = TestApp::new();
        let admin = app.admin("user_admin").await;

        for (title, order, featured) in [("Third", 3, false), ("First", 1, true), ("Second", 2, true)] {
            let (status, _) = app
                .post(
                    "/api/projects",
                    Some(&admin),
                    json!({
                        "title": title,
                        "description": "desc",
                        "technologies": ["Rust", "Postgres"],
                        "featured": featured,
                        "order": order
                    }),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, body) = app.get("/api/projects", None).await;
        let titles: Vec<&str> = body["projects"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);
        assert_eq!(body["projects"][0]["technologies"], json!(["Rust", "Postgres"]));

        let (_, body) = app.get("/api/projects?featured=true", None).await;
        assert_eq!(body["projects"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_project_requires_description() {
        let app = TestApp::new();
        let admin = app.admin("user_admin").await;

        let (status, body) = app
            .post("/api/projects", Some(&admin), json!({ "title": "Only title" }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Title and description are required");
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_project() {
        let app = TestApp::new();
        let admin = app.admin("user_admin").await;

        let (status, _) = app
            .put(
                "/api/projects/404",
                Some(&admin),
                json!({ "title": "T", "description": "D" }),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app.delete("/api/projects/404", Some(&admin)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app.delete("/api/projects/abc", Some(&admin)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_project_mutation_without_token_is_unauthorized() {
        let app = TestApp::new();
        let (status, body) = app
            .post("/api/projects", None, json!({ "title": "T", "description": "D" }))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_project_mutation_by_member_is_forbidden() {
        let app = TestApp::new();
        let admin = app.admin("user_admin").await;
        let member = app.member("user_member").await;
        let project = json!({ "title": "T", "description": "D" });

        let (_, created) = app.post("/api/projects", Some(&admin), project.clone()).await;
        let uri = format!("/api/projects/{}", created["project"]["id"]);

        let (status, body) = app.post("/api/projects", Some(&member), project.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Admin access required");

        let (status, body) = app.put(&uri, Some(&member), project).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Admin access required");

        let (status, body) = app.delete(&uri, Some(&member)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Admin access required");

        let (_, body) = app.get("/api/projects", None).await;
        assert_eq!(body["projects"].as_array().unwrap().len(), 1);
    }
}
