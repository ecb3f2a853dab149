use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::database::models::team::TeamRow;
use crate::database::models::{Cadence, NewTeam, SupervisorLink, Team};
use crate::database::transaction::{self, retry_serializable};
use crate::database::{DatabaseError, TxSettings};
use crate::services::supervisor_scope_service::refresh_chain_in;

/// Team records and memberships. Creating a team or changing its lead
/// re-derives the supervisor chain in the same transaction.
pub struct TeamService {
    pool: PgPool,
    settings: TxSettings,
}

impl TeamService {
    pub fn new(pool: PgPool, settings: TxSettings) -> Self {
        Self { pool, settings }
    }

    pub async fn create(&self, new_team: NewTeam) -> Result<Team, DatabaseError> {
        let name = new_team.name.trim();
        if name.is_empty() {
            return Err(DatabaseError::field("name", "team name is required"));
        }

        let team_id = retry_serializable(self.settings.serialization_retries, || {
            self.try_create(name, &new_team)
        })
        .await?;

        info!("Created team '{}' ({}) with {} member(s)", name, team_id, new_team.members.len());
        self.get(team_id).await
    }

    async fn try_create(&self, name: &str, new_team: &NewTeam) -> Result<Uuid, DatabaseError> {
        let mut tx = transaction::begin_serializable(&self.pool, self.settings).await?;
        let team_id: Uuid = sqlx::query_scalar(
            "INSERT INTO teams (name, team_lead_id, cadence) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(name)
        .bind(new_team.team_lead_id)
        .bind(new_team.cadence.map(|c| c.as_str()))
        .fetch_one(&mut *tx)
        .await?;

        for member in &new_team.members {
            sqlx::query("INSERT INTO team_members (team_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(team_id)
                .bind(member)
                .execute(&mut *tx)
                .await?;
        }

        refresh_chain_in(&mut tx, team_id).await?;
        tx.commit().await?;
        Ok(team_id)
    }

    pub async fn get(&self, id: Uuid) -> Result<Team, DatabaseError> {
        let row = sqlx::query_as::<_, TeamRow>(
            "SELECT id, name, team_lead_id, cadence, created_at, updated_at FROM teams WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Team", id))?;

        let members = sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM team_members WHERE team_id = $1 ORDER BY user_id")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        let supervisor_chain = sqlx::query_as::<_, SupervisorLink>(
            "SELECT user_id, hierarchy_level_id FROM team_supervisors WHERE team_id = $1 ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let cadence = row
            .cadence
            .as_deref()
            .map(str::parse::<Cadence>)
            .transpose()
            .map_err(|e| DatabaseError::Integrity(format!("team {}: {}", id, e)))?;

        Ok(Team {
            id: row.id,
            name: row.name,
            team_lead_id: row.team_lead_id,
            cadence,
            members,
            supervisor_chain,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    /// Change (or clear) the team lead and re-derive its supervisor chain
    pub async fn set_lead(&self, id: Uuid, lead_id: Option<Uuid>) -> Result<Vec<SupervisorLink>, DatabaseError> {
        let chain = retry_serializable(self.settings.serialization_retries, || self.try_set_lead(id, lead_id)).await?;
        info!("Team {} lead set to {:?}", id, lead_id);
        Ok(chain)
    }

    async fn try_set_lead(&self, id: Uuid, lead_id: Option<Uuid>) -> Result<Vec<SupervisorLink>, DatabaseError> {
        let mut tx = transaction::begin_serializable(&self.pool, self.settings).await?;
        let updated = sqlx::query("UPDATE teams SET team_lead_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(lead_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(DatabaseError::not_found("Team", id));
        }
        let chain = refresh_chain_in(&mut tx, id).await?;
        tx.commit().await?;
        Ok(chain)
    }
}
