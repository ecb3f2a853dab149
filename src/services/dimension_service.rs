use sqlx::PgPool;
use tracing::info;

use crate::database::models::HealthDimension;
use crate::database::DatabaseError;

const DIMENSION_COLUMNS: &str = "id, name, description, good_description, bad_description, is_active, weight";

/// The fixed dimension catalog
pub struct DimensionService {
    pool: PgPool,
}

impl DimensionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_active(&self) -> Result<Vec<HealthDimension>, DatabaseError> {
        let sql = format!("SELECT {} FROM health_dimensions WHERE is_active ORDER BY id", DIMENSION_COLUMNS);
        let dimensions = sqlx::query_as::<_, HealthDimension>(&sql).fetch_all(&self.pool).await?;
        Ok(dimensions)
    }

    /// Retire a dimension. Stored responses keep referencing it.
    pub async fn deactivate(&self, id: &str) -> Result<(), DatabaseError> {
        let updated = sqlx::query("UPDATE health_dimensions SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(DatabaseError::not_found("Dimension", id));
        }
        info!("Deactivated health dimension {}", id);
        Ok(())
    }
}
