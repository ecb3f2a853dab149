use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::database::DatabaseError;

/// A user's place in the reporting forest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrgNode {
    pub user_id: Uuid,
    pub hierarchy_level_id: Uuid,
    pub reports_to: Option<Uuid>,
}

/// Read access to the `reports_to` relation
#[async_trait]
pub trait OrgDirectory: Send + Sync {
    /// Users whose `reports_to` is one of `managers`
    async fn direct_reports(&self, managers: &[Uuid]) -> Result<Vec<Uuid>, DatabaseError>;

    async fn node(&self, user_id: Uuid) -> Result<Option<OrgNode>, DatabaseError>;
}

/// Directory backed by the `users` table
#[derive(Clone)]
pub struct PgOrgDirectory {
    pool: PgPool,
}

impl PgOrgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const DIRECT_REPORTS_SQL: &str = "SELECT id FROM users WHERE reports_to = ANY($1) ORDER BY username";
const NODE_SQL: &str = "SELECT id, hierarchy_level_id, reports_to FROM users WHERE id = $1";

type NodeRow = (Uuid, Uuid, Option<Uuid>);

fn to_node(row: Option<NodeRow>) -> Option<OrgNode> {
    row.map(|(user_id, hierarchy_level_id, reports_to)| OrgNode {
        user_id,
        hierarchy_level_id,
        reports_to,
    })
}

#[async_trait]
impl OrgDirectory for PgOrgDirectory {
    async fn direct_reports(&self, managers: &[Uuid]) -> Result<Vec<Uuid>, DatabaseError> {
        if managers.is_empty() {
            return Ok(Vec::new());
        }
        let ids = sqlx::query_scalar::<_, Uuid>(DIRECT_REPORTS_SQL)
            .bind(managers)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn node(&self, user_id: Uuid) -> Result<Option<OrgNode>, DatabaseError> {
        let row: Option<NodeRow> = sqlx::query_as(NODE_SQL).bind(user_id).fetch_optional(&self.pool).await?;
        Ok(to_node(row))
    }
}

/// Directory reading through an open transaction, so walks see the
/// transaction's own uncommitted edges and join its serializable snapshot
pub struct TxOrgDirectory<'c> {
    conn: Mutex<&'c mut PgConnection>,
}

impl<'c> TxOrgDirectory<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn: Mutex::new(conn) }
    }
}

#[async_trait]
impl<'c> OrgDirectory for TxOrgDirectory<'c> {
    async fn direct_reports(&self, managers: &[Uuid]) -> Result<Vec<Uuid>, DatabaseError> {
        if managers.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.lock().await;
        let ids = sqlx::query_scalar::<_, Uuid>(DIRECT_REPORTS_SQL)
            .bind(managers)
            .fetch_all(&mut **conn)
            .await?;
        Ok(ids)
    }

    async fn node(&self, user_id: Uuid) -> Result<Option<OrgNode>, DatabaseError> {
        let mut conn = self.conn.lock().await;
        let row: Option<NodeRow> = sqlx::query_as(NODE_SQL).bind(user_id).fetch_optional(&mut **conn).await?;
        Ok(to_node(row))
    }
}

/// Directory over a fixed set of nodes, for tooling and tests
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrgDirectory {
    nodes: HashMap<Uuid, OrgNode>,
}

impl InMemoryOrgDirectory {
    pub fn new(nodes: impl IntoIterator<Item = OrgNode>) -> Self {
        Self {
            nodes: nodes.into_iter().map(|n| (n.user_id, n)).collect(),
        }
    }
}

#[async_trait]
impl OrgDirectory for InMemoryOrgDirectory {
    async fn direct_reports(&self, managers: &[Uuid]) -> Result<Vec<Uuid>, DatabaseError> {
        let mut ids: Vec<Uuid> = self
            .nodes
            .values()
            .filter(|n| n.reports_to.map(|m| managers.contains(&m)).unwrap_or(false))
            .map(|n| n.user_id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn node(&self, user_id: Uuid) -> Result<Option<OrgNode>, DatabaseError> {
        Ok(self.nodes.get(&user_id).copied())
    }
}
