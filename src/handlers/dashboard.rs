use axum::extract::{Query, State};
use serde::Deserialize;

use crate::database::models::Permission;
use crate::database::transaction::with_deadline;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{HealthAggregationService, TeamHealthSummary};

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub period: Option<String>,
}

/// GET /api/dashboard?period= - Team health for the caller's scope, weakest
/// team first
pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Vec<TeamHealthSummary>> {
    state
        .require(&auth, &[Permission::ViewAnalytics, Permission::ViewReports])
        .await?;

    let aggregation = HealthAggregationService::new(state.pool.clone(), state.tx_settings());
    let summaries = with_deadline(
        state.deadline(),
        aggregation.team_health_for_manager(auth.user_id, query.period.as_deref()),
    )
    .await?;
    Ok(ApiResponse::success(summaries))
}
