use sqlx::PgPool;
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::models::SupervisorLink;
use crate::database::transaction::{self, retry_serializable};
use crate::database::{DatabaseError, TxSettings};
use crate::services::org_directory::{OrgDirectory, PgOrgDirectory, TxOrgDirectory};
use crate::services::supervisor_scope_service::refresh_chains_for_users_in;

/// Resolves reporting lines over the `reports_to` forest
pub struct OrgTreeService {
    pool: PgPool,
    settings: TxSettings,
    directory: PgOrgDirectory,
}

impl OrgTreeService {
    pub fn new(pool: PgPool, settings: TxSettings) -> Self {
        let directory = PgOrgDirectory::new(pool.clone());
        Self { pool, settings, directory }
    }

    /// Everyone whose reporting line eventually reaches `user_id`
    pub async fn subordinates(&self, user_id: Uuid) -> Result<Vec<Uuid>, DatabaseError> {
        if self.directory.node(user_id).await?.is_none() {
            return Err(DatabaseError::not_found("User", user_id));
        }
        subordinates(&self.directory, user_id).await
    }

    /// The user followed by everyone above them, nearest first
    pub async fn reporting_line(&self, user_id: Uuid) -> Result<Vec<SupervisorLink>, DatabaseError> {
        reporting_line(&self.directory, user_id).await
    }

    /// Point `user_id` at a new manager, or detach it with `None`, and refresh
    /// the supervisor chains of every team led by the user or anyone below
    /// them. Refuses assignments that would close a cycle. Returns how many
    /// chains were refreshed.
    pub async fn assign_manager(&self, user_id: Uuid, manager_id: Option<Uuid>) -> Result<usize, DatabaseError> {
        if manager_id == Some(user_id) {
            return Err(DatabaseError::field("reports_to", "a user cannot report to themselves"));
        }

        let refreshed = retry_serializable(self.settings.serialization_retries, || {
            self.try_assign_manager(user_id, manager_id)
        })
        .await?;

        info!(
            "User {} now reports to {:?}; refreshed {} chain(s)",
            user_id, manager_id, refreshed
        );
        Ok(refreshed)
    }

    async fn try_assign_manager(&self, user_id: Uuid, manager_id: Option<Uuid>) -> Result<usize, DatabaseError> {
        let mut tx = transaction::begin_serializable(&self.pool, self.settings).await?;

        // both rows stay locked until commit, in id order
        let wanted: Vec<Uuid> = std::iter::once(user_id).chain(manager_id).collect();
        let locked: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(&wanted)
            .fetch_all(&mut *tx)
            .await?;
        if let Some(missing) = wanted.iter().find(|id| !locked.contains(id)) {
            return Err(DatabaseError::not_found("User", *missing));
        }

        if let Some(manager_id) = manager_id {
            let directory = TxOrgDirectory::new(&mut *tx);
            let above = reporting_line(&directory, manager_id).await?;
            if above.iter().any(|link| link.user_id == user_id) {
                return Err(DatabaseError::field(
                    "reports_to",
                    "the new manager reports to this user; the assignment would create a cycle",
                ));
            }
        }

        sqlx::query("UPDATE users SET reports_to = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(manager_id)
            .execute(&mut *tx)
            .await?;

        let mut affected = {
            let directory = TxOrgDirectory::new(&mut *tx);
            subordinates(&directory, user_id).await?
        };
        affected.push(user_id);
        let refreshed = refresh_chains_for_users_in(&mut tx, &affected).await?;

        tx.commit().await?;
        Ok(refreshed)
    }
}

/// Breadth-first expansion over direct reports. Each round asks the directory
/// for the reports of the current frontier until no new users appear. Users
/// reachable twice are kept once; reaching `root` again means the stored
/// reporting lines contain a cycle.
pub async fn subordinates(directory: &dyn OrgDirectory, root: Uuid) -> Result<Vec<Uuid>, DatabaseError> {
    let mut visited: HashSet<Uuid> = HashSet::from([root]);
    let mut found = Vec::new();
    let mut frontier = vec![root];
    let mut depth = 0usize;

    while !frontier.is_empty() {
        let reports = directory.direct_reports(&frontier).await?;
        let mut next = Vec::new();
        for id in reports {
            if id == root {
                return Err(DatabaseError::Integrity(format!(
                    "reporting cycle: user {} reports to themselves through {} level(s)",
                    root,
                    depth + 1
                )));
            }
            if visited.insert(id) {
                found.push(id);
                next.push(id);
            }
        }
        frontier = next;
        depth += 1;
    }

    debug!("Resolved {} subordinates of {} across {} level(s)", found.len(), root, depth);
    Ok(found)
}

/// Walk `reports_to` upward from `start`, including `start` itself. An empty
/// result means `start` does not exist.
pub async fn reporting_line(directory: &dyn OrgDirectory, start: Uuid) -> Result<Vec<SupervisorLink>, DatabaseError> {
    let mut seen = HashSet::new();
    let mut line = Vec::new();
    let mut cursor = Some(start);

    while let Some(user_id) = cursor {
        if !seen.insert(user_id) {
            return Err(DatabaseError::Integrity(format!(
                "reporting cycle above user {} at user {}",
                start, user_id
            )));
        }
        let Some(node) = directory.node(user_id).await? else {
            if user_id == start {
                break;
            }
            return Err(DatabaseError::Integrity(format!(
                "user {} reports to missing user {}",
                line.last().map(|l: &SupervisorLink| l.user_id).unwrap_or(start),
                user_id
            )));
        };
        line.push(SupervisorLink {
            user_id: node.user_id,
            hierarchy_level_id: node.hierarchy_level_id,
        });
        cursor = node.reports_to;
    }

    Ok(line)
}
