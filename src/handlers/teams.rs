use axum::extract::{Json, Path, State};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::{NewTeam, Permission, SupervisorLink, Team};
use crate::database::transaction::with_deadline;
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{SupervisorScopeService, TeamService};

#[derive(Debug, Deserialize)]
pub struct LeadRequest {
    pub team_lead_id: Option<Uuid>,
}

fn teams(state: &AppState) -> TeamService {
    TeamService::new(state.pool.clone(), state.tx_settings())
}

fn scope(state: &AppState) -> SupervisorScopeService {
    SupervisorScopeService::new(state.pool.clone(), state.tx_settings())
}

/// POST /api/teams - Create a team and derive its supervisor chain
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<NewTeam>,
) -> ApiResult<Team> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::validation_error(
            "Invalid team",
            Some([("name".to_string(), "team name is required".to_string())].into()),
        ));
    }
    state.require(&auth, &[Permission::EditTeams]).await?;

    let team = with_deadline(state.deadline(), teams(&state).create(payload)).await?;
    Ok(ApiResponse::created(team))
}

/// GET /api/teams/:id - Team with members and supervisor chain
pub async fn get(State(state): State<AppState>, _auth: AuthUser, Path(id): Path<Uuid>) -> ApiResult<Team> {
    let team = with_deadline(state.deadline(), teams(&state).get(id)).await?;
    Ok(ApiResponse::success(team))
}

/// PUT /api/teams/:id/lead - Change the lead; the chain follows the new lead
pub async fn set_lead(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<LeadRequest>,
) -> ApiResult<Team> {
    state.require(&auth, &[Permission::EditTeams]).await?;

    let teams = teams(&state);
    let team = with_deadline(state.deadline(), async {
        teams.set_lead(id, payload.team_lead_id).await?;
        teams.get(id).await
    })
    .await?;
    Ok(ApiResponse::success(team))
}

/// GET /api/teams/:id/supervisors - Stored chain, nearest supervisor first
pub async fn chain(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<SupervisorLink>> {
    let chain = with_deadline(state.deadline(), scope(&state).chain(id)).await?;
    Ok(ApiResponse::success(chain))
}

/// POST /api/teams/:id/supervisors - Re-derive the chain from the team lead
pub async fn refresh_chain(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<SupervisorLink>> {
    state.require(&auth, &[Permission::EditTeams]).await?;

    let chain = with_deadline(state.deadline(), scope(&state).refresh_chain(id)).await?;
    Ok(ApiResponse::success(chain))
}

/// PUT /api/teams/:id/supervisors - Replace the chain with an explicit ordering
pub async fn replace_chain(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(ordered): Json<Vec<SupervisorLink>>,
) -> ApiResult<Vec<SupervisorLink>> {
    state.require(&auth, &[Permission::EditTeams]).await?;

    let scope = scope(&state);
    let chain = with_deadline(state.deadline(), async {
        scope.rebuild_chain(id, &ordered).await?;
        scope.chain(id).await
    })
    .await?;
    Ok(ApiResponse::success(chain))
}
