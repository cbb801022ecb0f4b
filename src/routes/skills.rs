/**
 * Skill Routes
 * Public listing, admin-only create/update/delete
 */
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::models::{Skill, SkillInput};
use crate::error::{ApiError, ApiResult, Done, Success};
use crate::routes::auth::{require_admin, Caller};
use crate::routes::{optional_text, parse_id};
use crate::AppState;

const INVALID_ID: &str = "Invalid skill ID";
const NOT_FOUND: &str = "Skill not found";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for POST /api/skills and PUT /api/skills/{id}
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SkillRequest {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub category: Option<String>,
    pub proficiency: Option<i64>,
}

impl SkillRequest {
    pub fn into_input(self) -> Result<SkillInput, ApiError> {
        let (Some(name), Some(category), Some(proficiency)) = (
            optional_text(self.name),
            optional_text(self.category),
            self.proficiency,
        ) else {
            return Err(ApiError::validation("Missing required fields"));
        };

        if !(1..=100).contains(&proficiency) {
            return Err(ApiError::validation(
                "Proficiency must be between 1 and 100",
            ));
        }

        Ok(SkillInput {
            name,
            icon: optional_text(self.icon),
            category: category.to_lowercase(),
            proficiency: proficiency as i32,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct SkillList {
    pub skills: Vec<Skill>,
}

#[derive(Debug, Serialize)]
pub struct SkillBody {
    pub skill: Skill,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/skills - All skills by name
pub async fn list_skills(State(state): State<AppState>) -> ApiResult<SkillList> {
    let skills = state
        .store
        .list_skills()
        .await
        .map_err(ApiError::store("Failed to fetch skills"))?;
    Ok(Success::ok(SkillList { skills }))
}

/// GET /api/skills/{id}
pub async fn get_skill(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SkillBody> {
    let id = parse_id(&id, INVALID_ID)?;
    let skill = state
        .store
        .skill(id)
        .await
        .map_err(ApiError::store("Failed to fetch skill"))?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(Success::ok(SkillBody { skill }))
}

/// POST /api/skills - Create skill (admin)
pub async fn create_skill(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<SkillRequest>, JsonRejection>,
) -> ApiResult<SkillBody> {
    require_admin(state.store.as_ref(), &caller).await?;
    let Json(request) = payload?;
    let input = request.into_input()?;

    let skill = state
        .store
        .insert_skill(&input)
        .await
        .map_err(ApiError::store("Failed to create skill"))?;
    tracing::info!(skill_id = skill.id, "Skill created");
    Ok(Success::created(SkillBody { skill }))
}

/// PUT /api/skills/{id} - Replace skill (admin)
pub async fn update_skill(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    payload: Result<Json<SkillRequest>, JsonRejection>,
) -> ApiResult<SkillBody> {
    require_admin(state.store.as_ref(), &caller).await?;
    let id = parse_id(&id, INVALID_ID)?;
    let Json(request) = payload?;
    let input = request.into_input()?;

    let skill = state
        .store
        .update_skill(id, &input)
        .await
        .map_err(ApiError::store("Failed to update skill"))?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(Success::ok(SkillBody { skill }))
}

/// DELETE /api/skills/{id} (admin)
pub async fn delete_skill(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Done> {
    require_admin(state.store.as_ref(), &caller).await?;
    let id = parse_id(&id, INVALID_ID)?;

    let deleted = state
        .store
        .delete_skill(id)
        .await
        .map_err(ApiError::store("Failed to delete skill"))?;
    if !deleted {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    tracing::info!(skill_id = id, "Skill deleted");
    Ok(Success::ok(Done::with_message("Skill deleted successfully")))
}
