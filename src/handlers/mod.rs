pub mod dashboard;
pub mod dimensions;
pub mod hierarchy;
pub mod sessions;
pub mod teams;
pub mod users;

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::database::models::Permission;
use crate::database::{DatabaseManager, TxSettings};
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::services::HierarchyLevelService;

/// Shared by every handler; cloned per request
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }

    pub fn tx_settings(&self) -> TxSettings {
        TxSettings::from(&self.config.database)
    }

    /// Per-request deadline for core calls; zero disables it
    pub fn deadline(&self) -> Option<Duration> {
        (self.config.api.request_timeout_ms > 0).then(|| self.config.request_timeout())
    }

    /// Fails with 403 unless the caller's hierarchy level grants one of `any_of`
    pub async fn require(&self, auth: &AuthUser, any_of: &[Permission]) -> Result<(), ApiError> {
        let levels = HierarchyLevelService::new(self.pool.clone(), self.tx_settings());
        let level = levels.get(auth.hierarchy_level_id).await.map_err(|e| match e {
            crate::database::DatabaseError::NotFound(_) => ApiError::forbidden("Unknown hierarchy level"),
            other => other.into(),
        })?;

        if any_of.iter().any(|p| level.permissions.allows(*p)) {
            Ok(())
        } else {
            tracing::debug!(
                "User {} at level '{}' lacks {:?}",
                auth.user_id,
                level.name,
                any_of
            );
            Err(ApiError::forbidden(format!(
                "Hierarchy level '{}' is not permitted to perform this action",
                level.name
            )))
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let logging = state.config.api.enable_request_logging;

    let router = Router::new()
        .route("/health", get(health))
        .merge(hierarchy_routes())
        .merge(session_routes())
        .merge(org_routes())
        .merge(team_routes())
        .route("/api/dimensions", get(dimensions::list))
        .route("/api/dimensions/:id", axum::routing::delete(dimensions::delete))
        .route("/api/dashboard", get(dashboard::get))
        .layer(cors);

    let router = if logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };
    router.with_state(state)
}

fn hierarchy_routes() -> Router<AppState> {
    Router::new()
        .route("/api/hierarchy-levels", get(hierarchy::list).post(hierarchy::create))
        .route(
            "/api/hierarchy-levels/:id",
            axum::routing::patch(hierarchy::update).delete(hierarchy::delete),
        )
        .route("/api/hierarchy-levels/:id/move", post(hierarchy::move_level))
}

fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sessions", get(sessions::list).post(sessions::submit))
        .route("/api/sessions/periods", get(sessions::periods))
        .route("/api/sessions/:id", get(sessions::get).delete(sessions::delete))
}

fn org_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", post(users::create))
        .route("/api/users/:id", get(users::get))
        .route("/api/users/:id/subordinates", get(users::subordinates))
        .route("/api/users/:id/reports-to", put(users::reassign))
}

fn team_routes() -> Router<AppState> {
    Router::new()
        .route("/api/teams", post(teams::create))
        .route("/api/teams/:id", get(teams::get))
        .route("/api/teams/:id/lead", put(teams::set_lead))
        .route(
            "/api/teams/:id/supervisors",
            get(teams::chain).post(teams::refresh_chain).put(teams::replace_chain),
        )
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if !config.security.enable_cors {
        return CorsLayer::new();
    }
    if config.security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health(axum::extract::State(state): axum::extract::State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::send;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    #[tokio::test]
    async fn missing_identity_is_unauthorized() {
        let request = Request::builder()
            .method("GET")
            .uri("/api/dashboard")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let request = Request::builder().uri("/api/nothing-here").body(Body::empty()).unwrap();
        let (status, _) = send(request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
