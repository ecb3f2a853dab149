use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::models::{Direction, HierarchyLevel, HierarchyLevelUpdate, NewHierarchyLevel};
use crate::database::transaction::{self, retry_serializable};
use crate::database::{DatabaseError, TxSettings};

const LEVEL_COLUMNS: &str = "id, name, position, color, can_view_all_teams, can_edit_teams, can_manage_users, \
     can_take_survey, can_view_analytics, can_configure_system, can_view_reports, can_export_data, \
     created_at, updated_at";

/// Ordered list of organizational levels. Owns position integrity: after every
/// committed mutation positions are exactly 1..=N.
pub struct HierarchyLevelService {
    pool: PgPool,
    settings: TxSettings,
}

impl HierarchyLevelService {
    pub fn new(pool: PgPool, settings: TxSettings) -> Self {
        Self { pool, settings }
    }

    /// All levels, highest authority first
    pub async fn list(&self) -> Result<Vec<HierarchyLevel>, DatabaseError> {
        let sql = format!("SELECT {} FROM hierarchy_levels ORDER BY position ASC", LEVEL_COLUMNS);
        let levels = sqlx::query_as::<_, HierarchyLevel>(&sql).fetch_all(&self.pool).await?;
        Ok(levels)
    }

    pub async fn get(&self, id: Uuid) -> Result<HierarchyLevel, DatabaseError> {
        let sql = format!("SELECT {} FROM hierarchy_levels WHERE id = $1", LEVEL_COLUMNS);
        sqlx::query_as::<_, HierarchyLevel>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Hierarchy level", id))
    }

    /// Append a level, or insert it at an explicit position after shifting
    /// everything at or below that rank down by one.
    pub async fn create(&self, new_level: NewHierarchyLevel) -> Result<HierarchyLevel, DatabaseError> {
        let name = validate_name(&new_level.name)?;
        let level = retry_serializable(self.settings.serialization_retries, || {
            self.try_create(&name, &new_level)
        })
        .await?;
        info!("Created hierarchy level '{}' at position {}", level.name, level.position);
        Ok(level)
    }

    async fn try_create(&self, name: &str, new_level: &NewHierarchyLevel) -> Result<HierarchyLevel, DatabaseError> {
        let mut tx = transaction::begin_serializable(&self.pool, self.settings).await?;

        let max = max_position(&mut tx).await?;
        let position = match new_level.position {
            None => max + 1,
            Some(p) if p >= 1 && p <= max + 1 => {
                shift_range(&mut tx, p, max, 1).await?;
                p
            }
            Some(p) => {
                return Err(DatabaseError::field(
                    "position",
                    format!("position must be between 1 and {}, got {}", max + 1, p),
                ))
            }
        };

        let perms = &new_level.permissions;
        let sql = format!(
            "INSERT INTO hierarchy_levels (name, position, color, can_view_all_teams, can_edit_teams, \
             can_manage_users, can_take_survey, can_view_analytics, can_configure_system, can_view_reports, \
             can_export_data) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {}",
            LEVEL_COLUMNS
        );
        let level = sqlx::query_as::<_, HierarchyLevel>(&sql)
            .bind(name)
            .bind(position)
            .bind(&new_level.color)
            .bind(perms.can_view_all_teams)
            .bind(perms.can_edit_teams)
            .bind(perms.can_manage_users)
            .bind(perms.can_take_survey)
            .bind(perms.can_view_analytics)
            .bind(perms.can_configure_system)
            .bind(perms.can_view_reports)
            .bind(perms.can_export_data)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(level)
    }

    /// Edit name, color or permissions. Positions are only changed by
    /// create, move and delete.
    pub async fn update(&self, id: Uuid, update: HierarchyLevelUpdate) -> Result<HierarchyLevel, DatabaseError> {
        let name = update.name.as_deref().map(validate_name).transpose()?;
        let perms = update.permissions;

        let sql = format!(
            "UPDATE hierarchy_levels SET \
             name = COALESCE($2, name), \
             color = COALESCE($3, color), \
             can_view_all_teams = COALESCE($4, can_view_all_teams), \
             can_edit_teams = COALESCE($5, can_edit_teams), \
             can_manage_users = COALESCE($6, can_manage_users), \
             can_take_survey = COALESCE($7, can_take_survey), \
             can_view_analytics = COALESCE($8, can_view_analytics), \
             can_configure_system = COALESCE($9, can_configure_system), \
             can_view_reports = COALESCE($10, can_view_reports), \
             can_export_data = COALESCE($11, can_export_data), \
             updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            LEVEL_COLUMNS
        );
        let level = sqlx::query_as::<_, HierarchyLevel>(&sql)
            .bind(id)
            .bind(name)
            .bind(update.color)
            .bind(perms.map(|p| p.can_view_all_teams))
            .bind(perms.map(|p| p.can_edit_teams))
            .bind(perms.map(|p| p.can_manage_users))
            .bind(perms.map(|p| p.can_take_survey))
            .bind(perms.map(|p| p.can_view_analytics))
            .bind(perms.map(|p| p.can_configure_system))
            .bind(perms.map(|p| p.can_view_reports))
            .bind(perms.map(|p| p.can_export_data))
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Hierarchy level", id))?;

        info!("Updated hierarchy level {}", id);
        Ok(level)
    }

    /// Swap a level with its neighbor. Moving the first level up or the last
    /// level down changes nothing.
    pub async fn move_level(&self, id: Uuid, direction: Direction) -> Result<(), DatabaseError> {
        retry_serializable(self.settings.serialization_retries, || self.try_move(id, direction)).await
    }

    async fn try_move(&self, id: Uuid, direction: Direction) -> Result<(), DatabaseError> {
        let mut tx = transaction::begin_serializable(&self.pool, self.settings).await?;

        let position: i32 = sqlx::query_scalar("SELECT position FROM hierarchy_levels WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Hierarchy level", id))?;

        let neighbor_sql = match direction {
            Direction::Up => {
                "SELECT id, position FROM hierarchy_levels WHERE position < $1 \
                 ORDER BY position DESC LIMIT 1 FOR UPDATE"
            }
            Direction::Down => {
                "SELECT id, position FROM hierarchy_levels WHERE position > $1 \
                 ORDER BY position ASC LIMIT 1 FOR UPDATE"
            }
        };
        let neighbor: Option<(Uuid, i32)> = sqlx::query_as(neighbor_sql)
            .bind(position)
            .fetch_optional(&mut *tx)
            .await?;

        let Some((neighbor_id, neighbor_position)) = neighbor else {
            debug!("Hierarchy level {} already at the {:?} boundary", id, direction);
            return Ok(());
        };

        set_position(&mut tx, id, neighbor_position).await?;
        set_position(&mut tx, neighbor_id, position).await?;
        tx.commit().await?;

        info!(
            "Moved hierarchy level {} {:?}: position {} -> {}",
            id, direction, position, neighbor_position
        );
        Ok(())
    }

    /// Remove an unreferenced level and close the gap it leaves
    pub async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        retry_serializable(self.settings.serialization_retries, || self.try_delete(id)).await
    }

    async fn try_delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut tx = transaction::begin_serializable(&self.pool, self.settings).await?;

        let (name, position): (String, i32) =
            sqlx::query_as("SELECT name, position FROM hierarchy_levels WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DatabaseError::not_found("Hierarchy level", id))?;

        let assigned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE hierarchy_level_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if assigned > 0 {
            return Err(DatabaseError::Conflict(format!(
                "hierarchy level '{}' still has {} assigned user{}",
                name,
                assigned,
                if assigned == 1 { "" } else { "s" }
            )));
        }

        let max = max_position(&mut tx).await?;
        if position == max {
            return Err(DatabaseError::validation(format!(
                "'{}' is the lowest hierarchy level and cannot be deleted",
                name
            )));
        }

        sqlx::query("DELETE FROM hierarchy_levels WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        shift_range(&mut tx, position + 1, max, -1).await?;
        tx.commit().await?;

        info!("Deleted hierarchy level '{}' from position {}", name, position);
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<String, DatabaseError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DatabaseError::field("name", "name is required"));
    }
    if name.chars().count() > 100 {
        return Err(DatabaseError::field("name", "name must be at most 100 characters"));
    }
    Ok(name.to_string())
}

async fn max_position(conn: &mut PgConnection) -> Result<i32, DatabaseError> {
    let max: Option<i32> = sqlx::query_scalar("SELECT MAX(position) FROM hierarchy_levels")
        .fetch_one(&mut *conn)
        .await?;
    Ok(max.unwrap_or(0))
}

async fn set_position(conn: &mut PgConnection, id: Uuid, position: i32) -> Result<(), DatabaseError> {
    sqlx::query("UPDATE hierarchy_levels SET position = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(position)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Add `delta` to every position in the inclusive band [start, end]. The
/// unique constraint is deferred, so transient duplicates are fine.
async fn shift_range(conn: &mut PgConnection, start: i32, end: i32, delta: i32) -> Result<(), DatabaseError> {
    if start > end || delta == 0 {
        return Ok(());
    }
    let shifted = sqlx::query(
        "UPDATE hierarchy_levels SET position = position + $3, updated_at = NOW() \
         WHERE position BETWEEN $1 AND $2",
    )
    .bind(start)
    .bind(end)
    .bind(delta)
    .execute(&mut *conn)
    .await?;
    debug!("Shifted {} hierarchy levels in [{}, {}] by {}", shifted.rows_affected(), start, end, delta);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_requires_name() {
        assert_eq!(validate_name("  Director ").unwrap(), "Director");
        assert!(matches!(validate_name("   "), Err(DatabaseError::Validation { .. })));
        assert!(validate_name(&"n".repeat(101)).is_err());
    }
}
