use axum::extract::{Json, Path, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::{Permission, User};
use crate::database::transaction::with_deadline;
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{NewUser, OrgTreeService, UserService};

#[derive(Debug, Deserialize)]
pub struct ReportsToRequest {
    /// New manager; `null` detaches the user from the tree
    pub manager_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct Reassigned {
    pub user_id: Uuid,
    pub manager_id: Option<Uuid>,
    pub refreshed_teams: usize,
}

/// POST /api/users
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<NewUser>,
) -> ApiResult<User> {
    payload.validate()?;
    state.require(&auth, &[Permission::ManageUsers]).await?;

    let users = UserService::new(state.pool.clone());
    let user = with_deadline(state.deadline(), users.create(payload)).await?;
    Ok(ApiResponse::created(user))
}

/// GET /api/users/:id
pub async fn get(State(state): State<AppState>, _auth: AuthUser, Path(id): Path<Uuid>) -> ApiResult<User> {
    let users = UserService::new(state.pool.clone());
    let user = with_deadline(state.deadline(), users.get(id)).await?;
    Ok(ApiResponse::success(user))
}

/// GET /api/users/:id/subordinates - Everyone below the user, at any depth
pub async fn subordinates(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<Uuid>> {
    if id != auth.user_id {
        state
            .require(&auth, &[Permission::ManageUsers, Permission::ViewAllTeams])
            .await?;
    }

    let org = OrgTreeService::new(state.pool.clone(), state.tx_settings());
    let ids = with_deadline(state.deadline(), org.subordinates(id)).await?;
    Ok(ApiResponse::success(ids))
}

/// PUT /api/users/:id/reports-to - Move a user (and everyone below them) under
/// a new manager; the supervisor chains that moved with them are refreshed in
/// the same transaction
pub async fn reassign(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReportsToRequest>,
) -> ApiResult<Reassigned> {
    if payload.manager_id == Some(id) {
        return Err(ApiError::bad_request("A user cannot report to themselves"));
    }
    state.require(&auth, &[Permission::ManageUsers]).await?;

    let org = OrgTreeService::new(state.pool.clone(), state.tx_settings());
    let refreshed_teams = with_deadline(state.deadline(), org.assign_manager(id, payload.manager_id)).await?;

    Ok(ApiResponse::success(Reassigned {
        user_id: id,
        manager_id: payload.manager_id,
        refreshed_teams,
    }))
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_support::{authed, send};
    use axum::http::StatusCode;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn self_reporting_is_rejected() {
        let id = Uuid::new_v4();
        let uri = format!("/api/users/{}/reports-to", id);
        let (status, _) = send(authed("PUT", &uri, Some(json!({ "manager_id": id })))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_user_fields_are_reported() {
        let payload = json!({
            "username": "x",
            "email": "not-an-email",
            "full_name": "Someone",
            "hierarchy_level_id": Uuid::new_v4()
        });
        let (status, body) = send(authed("POST", "/api/users", Some(payload))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["field_errors"]["username"].is_string());
        assert!(body["field_errors"]["email"].is_string());
    }
}
