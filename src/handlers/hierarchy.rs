use axum::extract::{Json, Path, State};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::{Direction, HierarchyLevel, HierarchyLevelUpdate, NewHierarchyLevel, Permission};
use crate::database::transaction::with_deadline;
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::HierarchyLevelService;

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub direction: String,
}

fn service(state: &AppState) -> HierarchyLevelService {
    HierarchyLevelService::new(state.pool.clone(), state.tx_settings())
}

/// GET /api/hierarchy-levels - All levels, highest authority first
pub async fn list(State(state): State<AppState>, _auth: AuthUser) -> ApiResult<Vec<HierarchyLevel>> {
    let levels = with_deadline(state.deadline(), service(&state).list()).await?;
    Ok(ApiResponse::success(levels))
}

/// POST /api/hierarchy-levels - Append a level, or insert it at `position`
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<NewHierarchyLevel>,
) -> ApiResult<HierarchyLevel> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::validation_error(
            "Invalid hierarchy level",
            Some([("name".to_string(), "name is required".to_string())].into()),
        ));
    }
    state.require(&auth, &[Permission::ConfigureSystem]).await?;

    let level = with_deadline(state.deadline(), service(&state).create(payload)).await?;
    Ok(ApiResponse::created(level))
}

/// PATCH /api/hierarchy-levels/:id - Rename, recolor or change permissions
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<HierarchyLevelUpdate>,
) -> ApiResult<HierarchyLevel> {
    state.require(&auth, &[Permission::ConfigureSystem]).await?;

    let level = with_deadline(state.deadline(), service(&state).update(id, payload)).await?;
    Ok(ApiResponse::success(level))
}

/// POST /api/hierarchy-levels/:id/move - Swap with the adjacent level
pub async fn move_level(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MoveRequest>,
) -> ApiResult<Vec<HierarchyLevel>> {
    let direction: Direction = payload.direction.parse().map_err(ApiError::bad_request)?;
    state.require(&auth, &[Permission::ConfigureSystem]).await?;

    let levels = service(&state);
    let ordered = with_deadline(state.deadline(), async {
        levels.move_level(id, direction).await?;
        levels.list().await
    })
    .await?;
    Ok(ApiResponse::success(ordered))
}

/// DELETE /api/hierarchy-levels/:id
pub async fn delete(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> ApiResult<()> {
    state.require(&auth, &[Permission::ConfigureSystem]).await?;

    with_deadline(state.deadline(), service(&state).delete(id)).await?;
    Ok(ApiResponse::no_content())
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_support::{authed, send};
    use axum::http::StatusCode;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn rejects_unknown_direction() {
        let uri = format!("/api/hierarchy-levels/{}/move", Uuid::new_v4());
        let (status, body) = send(authed("POST", &uri, Some(json!({ "direction": "sideways" })))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
        assert!(body["error"].as_str().unwrap().contains("sideways"));
    }

    #[tokio::test]
    async fn rejects_blank_name() {
        let (status, body) = send(authed("POST", "/api/hierarchy-levels", Some(json!({ "name": "  " })))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field_errors"]["name"], "name is required");
    }
}
