use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Entry of the fixed health dimension catalog. Dimensions are retired by
/// clearing `is_active`, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HealthDimension {
    pub id: String,
    pub name: String,
    pub description: String,
    pub good_description: String,
    pub bad_description: String,
    pub is_active: bool,
    pub weight: f64,
}
