use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::models::session::{group_session_rows, SessionResponseRow};
use crate::database::models::{HealthCheckSession, SessionSubmission};
use crate::database::{transaction, DatabaseError, TxSettings};

const SESSION_SELECT: &str = "SELECT s.id, s.team_id, s.user_id, s.date, s.assessment_period, s.completed, \
     r.dimension_id, r.score, r.trend, r.comment \
     FROM health_check_sessions s \
     LEFT JOIN health_check_responses r ON r.session_id = s.id";

const SESSION_ORDER: &str = "ORDER BY s.date DESC, s.id, r.dimension_id";

#[derive(Debug, Clone, Copy)]
enum SessionFilter<'a> {
    Team(Uuid),
    User(Uuid),
    Period(&'a str),
}

/// Health check submissions. A session and its responses are always written
/// together: saving replaces every response, deleting removes them all.
pub struct SessionService {
    pool: PgPool,
    settings: TxSettings,
}

impl SessionService {
    pub fn new(pool: PgPool, settings: TxSettings) -> Self {
        Self { pool, settings }
    }

    /// Validate and persist a submission, replacing any earlier version of
    /// the same session id. Returns the session id.
    pub async fn save(&self, submission: SessionSubmission) -> Result<Uuid, DatabaseError> {
        let session = submission.validate()?;
        self.store(session).await
    }

    /// Persist a session that already passed [`SessionSubmission::validate`].
    /// Checks what only the store knows: the team, the user and every
    /// dimension must exist, and a resubmission must come from the user who
    /// owns the stored session.
    pub async fn store(&self, session: HealthCheckSession) -> Result<Uuid, DatabaseError> {
        // an uncommitted transaction rolls back when dropped, so every early
        // return below leaves the previous submission untouched
        let mut tx = transaction::begin(&self.pool, self.settings).await?;

        let mut field_errors = HashMap::new();
        let (team_exists, user_exists): (bool, bool) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM teams WHERE id = $1), EXISTS (SELECT 1 FROM users WHERE id = $2)",
        )
        .bind(session.team_id)
        .bind(session.user_id)
        .fetch_one(&mut *tx)
        .await?;
        if !team_exists {
            field_errors.insert("team_id".to_string(), format!("team {} not found", session.team_id));
        }
        if !user_exists {
            field_errors.insert("user_id".to_string(), format!("user {} not found", session.user_id));
        }

        let dimension_ids: Vec<String> = session.responses.iter().map(|r| r.dimension_id.clone()).collect();
        let active: HashSet<String> = sqlx::query_scalar::<_, String>(
            "SELECT id FROM health_dimensions WHERE is_active AND id = ANY($1)",
        )
        .bind(&dimension_ids)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .collect();

        field_errors.extend(
            session
                .responses
                .iter()
                .filter(|r| !active.contains(&r.dimension_id))
                .map(|r| {
                    (
                        format!("responses.{}", r.dimension_id),
                        format!("unknown or inactive dimension '{}'", r.dimension_id),
                    )
                }),
        );
        if !field_errors.is_empty() {
            return Err(DatabaseError::Validation {
                message: "Invalid health check submission".to_string(),
                field_errors,
            });
        }

        // a resubmission only replaces the stored session when the owner matches
        let written = sqlx::query(
            "INSERT INTO health_check_sessions (id, team_id, user_id, date, assessment_period, completed) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO UPDATE SET \
                team_id = EXCLUDED.team_id, \
                date = EXCLUDED.date, \
                assessment_period = EXCLUDED.assessment_period, \
                completed = EXCLUDED.completed, \
                updated_at = NOW() \
             WHERE health_check_sessions.user_id = EXCLUDED.user_id",
        )
        .bind(session.id)
        .bind(session.team_id)
        .bind(session.user_id)
        .bind(session.date)
        .bind(&session.assessment_period)
        .bind(session.completed)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if written == 0 {
            return Err(DatabaseError::Conflict(format!(
                "health check session {} belongs to another user",
                session.id
            )));
        }

        let replaced = sqlx::query("DELETE FROM health_check_responses WHERE session_id = $1")
            .bind(session.id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for response in &session.responses {
            sqlx::query(
                "INSERT INTO health_check_responses (session_id, dimension_id, score, trend, comment) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(session.id)
            .bind(&response.dimension_id)
            .bind(response.score)
            .bind(response.trend.as_str())
            .bind(&response.comment)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            "Saved health check session {} for team {} ({} responses, {} replaced)",
            session.id,
            session.team_id,
            session.responses.len(),
            replaced
        );
        Ok(session.id)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<HealthCheckSession, DatabaseError> {
        let sql = format!("{} WHERE s.id = $1 {}", SESSION_SELECT, SESSION_ORDER);
        let rows = sqlx::query_as::<_, SessionResponseRow>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        group_session_rows(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| DatabaseError::not_found("Health check session", id))
    }

    pub async fn find_by_team_id(&self, team_id: Uuid) -> Result<Vec<HealthCheckSession>, DatabaseError> {
        self.fetch_grouped(SessionFilter::Team(team_id)).await
    }

    pub async fn find_by_user_id(&self, user_id: Uuid) -> Result<Vec<HealthCheckSession>, DatabaseError> {
        self.fetch_grouped(SessionFilter::User(user_id)).await
    }

    pub async fn find_by_period(&self, period: &str) -> Result<Vec<HealthCheckSession>, DatabaseError> {
        self.fetch_grouped(SessionFilter::Period(period.trim())).await
    }

    /// Distinct assessment periods, most recently used first
    pub async fn periods(&self) -> Result<Vec<String>, DatabaseError> {
        let periods = sqlx::query_scalar::<_, String>(
            "SELECT assessment_period FROM health_check_sessions \
             GROUP BY assessment_period ORDER BY MAX(date) DESC, assessment_period DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(periods)
    }

    /// Remove a session together with all of its responses
    pub async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut tx = transaction::begin(&self.pool, self.settings).await?;

        let responses = sqlx::query("DELETE FROM health_check_responses WHERE session_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let sessions = sqlx::query("DELETE FROM health_check_sessions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if sessions == 0 {
            return Err(DatabaseError::not_found("Health check session", id));
        }

        tx.commit().await?;
        info!("Deleted health check session {} and {} response(s)", id, responses);
        Ok(())
    }

    async fn fetch_grouped(&self, filter: SessionFilter<'_>) -> Result<Vec<HealthCheckSession>, DatabaseError> {
        let column = match filter {
            SessionFilter::Team(_) => "s.team_id",
            SessionFilter::User(_) => "s.user_id",
            SessionFilter::Period(_) => "s.assessment_period",
        };
        let sql = format!("{} WHERE {} = $1 {}", SESSION_SELECT, column, SESSION_ORDER);
        let query = sqlx::query_as::<_, SessionResponseRow>(&sql);
        let query = match filter {
            SessionFilter::Team(id) | SessionFilter::User(id) => query.bind(id),
            SessionFilter::Period(period) => query.bind(period),
        };
        let rows = query.fetch_all(&self.pool).await?;
        let sessions = group_session_rows(rows)?;
        debug!("Loaded {} health check session(s) by {}", sessions.len(), column);
        Ok(sessions)
    }
}
