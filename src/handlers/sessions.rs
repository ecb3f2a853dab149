use axum::extract::{Json, Path, Query, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::{HealthCheckSession, Permission, SessionSubmission};
use crate::database::transaction::with_deadline;
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::SessionService;

const REPORT_READERS: &[Permission] = &[Permission::ViewReports, Permission::ViewAnalytics];

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub team_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub period: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Saved {
    pub id: Uuid,
}

fn service(state: &AppState) -> SessionService {
    SessionService::new(state.pool.clone(), state.tx_settings())
}

/// POST /api/sessions - Submit (or resubmit, when `id` is set) a health check
pub async fn submit(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(submission): Json<SessionSubmission>,
) -> ApiResult<Saved> {
    // field checks first so malformed submissions never reach the store
    let session = submission.validate()?;

    if session.user_id != auth.user_id {
        return Err(ApiError::forbidden("Sessions can only be submitted by their own user"));
    }
    state.require(&auth, &[Permission::TakeSurvey]).await?;

    let id = with_deadline(state.deadline(), service(&state).store(session)).await?;
    Ok(ApiResponse::created(Saved { id }))
}

/// GET /api/sessions/:id
pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<HealthCheckSession> {
    let session = with_deadline(state.deadline(), service(&state).find_by_id(id)).await?;
    if session.user_id != auth.user_id {
        state.require(&auth, REPORT_READERS).await?;
    }
    Ok(ApiResponse::success(session))
}

/// GET /api/sessions?team_id=|user_id=|period= - Exactly one filter
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Vec<HealthCheckSession>> {
    let sessions = service(&state);
    let found = match (query.team_id, query.user_id, query.period) {
        (Some(team_id), None, None) => {
            state.require(&auth, REPORT_READERS).await?;
            with_deadline(state.deadline(), sessions.find_by_team_id(team_id)).await?
        }
        (None, Some(user_id), None) => {
            if user_id != auth.user_id {
                state.require(&auth, REPORT_READERS).await?;
            }
            with_deadline(state.deadline(), sessions.find_by_user_id(user_id)).await?
        }
        (None, None, Some(period)) => {
            state.require(&auth, REPORT_READERS).await?;
            with_deadline(state.deadline(), sessions.find_by_period(&period)).await?
        }
        _ => {
            return Err(ApiError::bad_request(
                "Exactly one of team_id, user_id or period is required",
            ))
        }
    };
    Ok(ApiResponse::success(found))
}

/// GET /api/sessions/periods - Distinct assessment periods, newest first
pub async fn periods(State(state): State<AppState>, _auth: AuthUser) -> ApiResult<Vec<String>> {
    let periods = with_deadline(state.deadline(), service(&state).periods()).await?;
    Ok(ApiResponse::success(periods))
}

/// DELETE /api/sessions/:id - Owners may delete their own sessions
pub async fn delete(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> ApiResult<()> {
    let sessions = service(&state);
    let session = with_deadline(state.deadline(), sessions.find_by_id(id)).await?;
    if session.user_id != auth.user_id {
        state.require(&auth, &[Permission::ConfigureSystem]).await?;
    }
    with_deadline(state.deadline(), sessions.delete(id)).await?;
    Ok(ApiResponse::no_content())
}
