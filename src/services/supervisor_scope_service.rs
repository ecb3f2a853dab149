use sqlx::{PgConnection, PgPool};
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::models::SupervisorLink;
use crate::database::transaction::{self, retry_serializable};
use crate::database::{DatabaseError, TxSettings};
use crate::services::org_directory::{PgOrgDirectory, TxOrgDirectory};
use crate::services::org_tree_service::reporting_line;

/// Team visibility through the denormalized per-team supervisor chain.
///
/// The chain is a cache of each team's reporting line. It is never derived on
/// read. Operations that change a team lead or a `reports_to` edge refresh the
/// affected chains in their own transaction through [`refresh_chain_in`] and
/// [`refresh_chains_for_users_in`].
pub struct SupervisorScopeService {
    pool: PgPool,
    settings: TxSettings,
    directory: PgOrgDirectory,
}

impl SupervisorScopeService {
    pub fn new(pool: PgPool, settings: TxSettings) -> Self {
        let directory = PgOrgDirectory::new(pool.clone());
        Self { pool, settings, directory }
    }

    /// Teams whose chain mentions `manager_id` at any position
    pub async fn teams_for(&self, manager_id: Uuid) -> Result<Vec<Uuid>, DatabaseError> {
        let teams = sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT team_id FROM team_supervisors WHERE user_id = $1 ORDER BY team_id",
        )
        .bind(manager_id)
        .fetch_all(&self.pool)
        .await?;
        debug!("Manager {} sees {} team(s)", manager_id, teams.len());
        Ok(teams)
    }

    pub async fn chain(&self, team_id: Uuid) -> Result<Vec<SupervisorLink>, DatabaseError> {
        self.ensure_team(team_id).await?;
        let links = sqlx::query_as::<_, SupervisorLink>(
            "SELECT user_id, hierarchy_level_id FROM team_supervisors WHERE team_id = $1 ORDER BY position",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }

    /// Replace the whole chain of a team with `ordered`, nearest first
    pub async fn rebuild_chain(&self, team_id: Uuid, ordered: &[SupervisorLink]) -> Result<(), DatabaseError> {
        let mut tx = transaction::begin(&self.pool, self.settings).await?;
        lock_team(&mut tx, team_id).await?;
        rebuild_chain_in(&mut tx, team_id, ordered).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Chain implied by the team lead's reporting line; empty without a lead
    pub async fn derive_chain(&self, team_id: Uuid) -> Result<Vec<SupervisorLink>, DatabaseError> {
        let lead: Option<Option<Uuid>> = sqlx::query_scalar("SELECT team_lead_id FROM teams WHERE id = $1")
            .bind(team_id)
            .fetch_optional(&self.pool)
            .await?;
        match lead {
            None => Err(DatabaseError::not_found("Team", team_id)),
            Some(None) => Ok(Vec::new()),
            Some(Some(lead_id)) => reporting_line(&self.directory, lead_id).await,
        }
    }

    pub async fn refresh_chain(&self, team_id: Uuid) -> Result<Vec<SupervisorLink>, DatabaseError> {
        retry_serializable(self.settings.serialization_retries, || self.try_refresh_chain(team_id)).await
    }

    async fn try_refresh_chain(&self, team_id: Uuid) -> Result<Vec<SupervisorLink>, DatabaseError> {
        let mut tx = transaction::begin_serializable(&self.pool, self.settings).await?;
        let chain = refresh_chain_in(&mut tx, team_id).await?;
        tx.commit().await?;
        Ok(chain)
    }

    /// Refresh every team led by one of `user_ids` in a single transaction.
    /// Callers pass the user whose reporting line changed together with all of
    /// their subordinates.
    pub async fn refresh_chains_for_users(&self, user_ids: &[Uuid]) -> Result<usize, DatabaseError> {
        if user_ids.is_empty() {
            return Ok(0);
        }
        retry_serializable(self.settings.serialization_retries, || self.try_refresh_for_users(user_ids)).await
    }

    async fn try_refresh_for_users(&self, user_ids: &[Uuid]) -> Result<usize, DatabaseError> {
        let mut tx = transaction::begin_serializable(&self.pool, self.settings).await?;
        let refreshed = refresh_chains_for_users_in(&mut tx, user_ids).await?;
        tx.commit().await?;
        Ok(refreshed)
    }

    async fn ensure_team(&self, team_id: Uuid) -> Result<(), DatabaseError> {
        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM teams WHERE id = $1")
            .bind(team_id)
            .fetch_optional(&self.pool)
            .await?;
        exists.map(|_| ()).ok_or_else(|| DatabaseError::not_found("Team", team_id))
    }
}

async fn lock_team(conn: &mut PgConnection, team_id: Uuid) -> Result<Option<Uuid>, DatabaseError> {
    let lead: Option<Option<Uuid>> = sqlx::query_scalar("SELECT team_lead_id FROM teams WHERE id = $1 FOR UPDATE")
        .bind(team_id)
        .fetch_optional(&mut *conn)
        .await?;
    lead.ok_or_else(|| DatabaseError::not_found("Team", team_id))
}

/// Overwrite the stored chain of a team the caller has already locked
pub(crate) async fn rebuild_chain_in(
    conn: &mut PgConnection,
    team_id: Uuid,
    ordered: &[SupervisorLink],
) -> Result<(), DatabaseError> {
    let mut seen = HashSet::new();
    if let Some(dup) = ordered.iter().find(|l| !seen.insert(l.user_id)) {
        return Err(DatabaseError::field(
            "supervisors",
            format!("user {} appears more than once in the chain", dup.user_id),
        ));
    }

    sqlx::query("DELETE FROM team_supervisors WHERE team_id = $1")
        .bind(team_id)
        .execute(&mut *conn)
        .await?;

    for (position, link) in ordered.iter().enumerate() {
        sqlx::query(
            "INSERT INTO team_supervisors (team_id, user_id, hierarchy_level_id, position) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(team_id)
        .bind(link.user_id)
        .bind(link.hierarchy_level_id)
        .bind(position as i32)
        .execute(&mut *conn)
        .await?;
    }

    info!("Rebuilt supervisor chain of team {} with {} link(s)", team_id, ordered.len());
    Ok(())
}

/// Re-derive a team's chain from its lead's reporting line as seen by `conn`,
/// including edits the surrounding transaction has not committed yet
pub(crate) async fn refresh_chain_in(conn: &mut PgConnection, team_id: Uuid) -> Result<Vec<SupervisorLink>, DatabaseError> {
    let chain = match lock_team(&mut *conn, team_id).await? {
        None => Vec::new(),
        Some(lead_id) => {
            let directory = TxOrgDirectory::new(&mut *conn);
            reporting_line(&directory, lead_id).await?
        }
    };
    rebuild_chain_in(&mut *conn, team_id, &chain).await?;
    Ok(chain)
}

/// Refresh the chain of every team led by one of `user_ids`
pub(crate) async fn refresh_chains_for_users_in(conn: &mut PgConnection, user_ids: &[Uuid]) -> Result<usize, DatabaseError> {
    if user_ids.is_empty() {
        return Ok(0);
    }
    let teams = sqlx::query_scalar::<_, Uuid>("SELECT id FROM teams WHERE team_lead_id = ANY($1) ORDER BY id")
        .bind(user_ids)
        .fetch_all(&mut *conn)
        .await?;
    for team_id in &teams {
        refresh_chain_in(&mut *conn, *team_id).await?;
    }
    info!("Refreshed {} supervisor chain(s) after reporting change", teams.len());
    Ok(teams.len())
}
