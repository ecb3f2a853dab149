use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::models::{Permission, Permissions, Trend};
use crate::database::{DatabaseError, TxSettings};
use crate::services::supervisor_scope_service::SupervisorScopeService;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendCounts {
    pub improving: u32,
    pub stable: u32,
    pub declining: u32,
}

impl TrendCounts {
    fn record(&mut self, trend: Trend) {
        match trend {
            Trend::Improving => self.improving += 1,
            Trend::Stable => self.stable += 1,
            Trend::Declining => self.declining += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionSummary {
    pub dimension_id: String,
    pub avg_score: f64,
    pub response_count: u32,
    pub trends: TrendCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamHealthSummary {
    pub team_id: Uuid,
    pub team_name: String,
    pub submission_count: u32,
    /// Flat mean over every response; `None` when nothing was scored
    pub overall_health: Option<f64>,
    pub dimensions: Vec<DimensionSummary>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TeamRef {
    pub id: Uuid,
    pub name: String,
}

/// One response of a completed session, or a bare session without responses
#[derive(Debug, Clone, FromRow)]
pub struct ScoreRow {
    pub session_id: Uuid,
    pub team_id: Uuid,
    pub dimension_id: Option<String>,
    pub score: Option<i32>,
    pub trend: Option<String>,
}

#[derive(Default)]
struct DimensionAcc {
    sum: i64,
    count: u32,
    trends: TrendCounts,
}

#[derive(Default)]
struct TeamAcc {
    sessions: HashSet<Uuid>,
    sum: i64,
    count: u32,
    dimensions: BTreeMap<String, DimensionAcc>,
}

/// Per-team summaries, worst overall health first. Teams without scores come
/// last; ties are broken by team name and then id. Every team in `teams`
/// appears in the output, scored or not.
pub fn aggregate(teams: &[TeamRef], rows: &[ScoreRow]) -> Result<Vec<TeamHealthSummary>, DatabaseError> {
    let mut acc: HashMap<Uuid, TeamAcc> = teams.iter().map(|t| (t.id, TeamAcc::default())).collect();

    for row in rows {
        let Some(team) = acc.get_mut(&row.team_id) else {
            continue;
        };
        team.sessions.insert(row.session_id);

        let (Some(dimension_id), Some(score)) = (&row.dimension_id, row.score) else {
            continue;
        };
        team.sum += i64::from(score);
        team.count += 1;

        let dim = team.dimensions.entry(dimension_id.clone()).or_default();
        dim.sum += i64::from(score);
        dim.count += 1;
        if let Some(trend) = &row.trend {
            let trend = trend
                .parse::<Trend>()
                .map_err(|e| DatabaseError::Integrity(format!("session {}: {}", row.session_id, e)))?;
            dim.trends.record(trend);
        }
    }

    let mut summaries: Vec<TeamHealthSummary> = teams
        .iter()
        .map(|team| {
            let a = acc.remove(&team.id).unwrap_or_default();
            TeamHealthSummary {
                team_id: team.id,
                team_name: team.name.clone(),
                submission_count: a.sessions.len() as u32,
                overall_health: mean(a.sum, a.count),
                dimensions: a
                    .dimensions
                    .into_iter()
                    .map(|(dimension_id, d)| DimensionSummary {
                        dimension_id,
                        avg_score: mean(d.sum, d.count).unwrap_or(0.0),
                        response_count: d.count,
                        trends: d.trends,
                    })
                    .collect(),
            }
        })
        .collect();

    summaries.sort_by(attention_order);
    Ok(summaries)
}

fn mean(sum: i64, count: u32) -> Option<f64> {
    (count > 0).then(|| sum as f64 / f64::from(count))
}

fn attention_order(a: &TeamHealthSummary, b: &TeamHealthSummary) -> Ordering {
    let by_health = match (a.overall_health, b.overall_health) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_health
        .then_with(|| a.team_name.cmp(&b.team_name))
        .then_with(|| a.team_id.cmp(&b.team_id))
}

/// Manager dashboard aggregation over completed sessions
pub struct HealthAggregationService {
    pool: PgPool,
    scope: SupervisorScopeService,
}

impl HealthAggregationService {
    pub fn new(pool: PgPool, settings: TxSettings) -> Self {
        let scope = SupervisorScopeService::new(pool.clone(), settings);
        Self { pool, scope }
    }

    /// Summaries for the given teams, optionally limited to one assessment period
    pub async fn team_health(
        &self,
        team_ids: &[Uuid],
        period: Option<&str>,
    ) -> Result<Vec<TeamHealthSummary>, DatabaseError> {
        if team_ids.is_empty() {
            return Ok(Vec::new());
        }
        let period = period.map(str::trim).filter(|p| !p.is_empty());

        let teams = sqlx::query_as::<_, TeamRef>("SELECT id, name FROM teams WHERE id = ANY($1)")
            .bind(team_ids)
            .fetch_all(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, ScoreRow>(
            "SELECT s.id AS session_id, s.team_id, r.dimension_id, r.score, r.trend \
             FROM health_check_sessions s \
             LEFT JOIN health_check_responses r ON r.session_id = s.id \
             WHERE s.team_id = ANY($1) AND s.completed \
               AND ($2::text IS NULL OR s.assessment_period = $2)",
        )
        .bind(team_ids)
        .bind(period)
        .fetch_all(&self.pool)
        .await?;

        debug!("Aggregating {} score row(s) across {} team(s)", rows.len(), teams.len());
        aggregate(&teams, &rows)
    }

    /// Dashboard for one manager: the teams in their supervisor scope, or every
    /// team when their hierarchy level may view all teams.
    pub async fn team_health_for_manager(
        &self,
        manager_id: Uuid,
        period: Option<&str>,
    ) -> Result<Vec<TeamHealthSummary>, DatabaseError> {
        let permissions = sqlx::query_as::<_, Permissions>(
            "SELECT l.can_view_all_teams, l.can_edit_teams, l.can_manage_users, l.can_take_survey, \
                    l.can_view_analytics, l.can_configure_system, l.can_view_reports, l.can_export_data \
             FROM users u JOIN hierarchy_levels l ON l.id = u.hierarchy_level_id \
             WHERE u.id = $1",
        )
        .bind(manager_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("User", manager_id))?;

        let team_ids = if permissions.allows(Permission::ViewAllTeams) {
            sqlx::query_scalar::<_, Uuid>("SELECT id FROM teams ORDER BY name")
                .fetch_all(&self.pool)
                .await?
        } else {
            self.scope.teams_for(manager_id).await?
        };

        let summaries = self.team_health(&team_ids, period).await?;
        info!(
            "Built dashboard for manager {} ({} team(s), period {:?})",
            manager_id,
            summaries.len(),
            period
        );
        Ok(summaries)
    }
}
