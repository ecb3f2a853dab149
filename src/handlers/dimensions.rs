use axum::extract::{Path, State};

use crate::database::models::{HealthDimension, Permission};
use crate::database::transaction::with_deadline;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::DimensionService;

/// GET /api/dimensions - Active dimensions only
pub async fn list(State(state): State<AppState>, _auth: AuthUser) -> ApiResult<Vec<HealthDimension>> {
    let dimensions = DimensionService::new(state.pool.clone());
    let active = with_deadline(state.deadline(), dimensions.list_active()).await?;
    Ok(ApiResponse::success(active))
}

/// DELETE /api/dimensions/:id - Soft delete
pub async fn delete(State(state): State<AppState>, auth: AuthUser, Path(id): Path<String>) -> ApiResult<()> {
    state.require(&auth, &[Permission::ConfigureSystem]).await?;

    let dimensions = DimensionService::new(state.pool.clone());
    with_deadline(state.deadline(), dimensions.deactivate(&id)).await?;
    Ok(ApiResponse::no_content())
}
