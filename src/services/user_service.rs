use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::database::models::user::{is_valid_email, is_valid_username};
use crate::database::models::User;
use crate::database::DatabaseError;

const USER_COLUMNS: &str = "id, username, email, full_name, hierarchy_level_id, reports_to, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub hierarchy_level_id: Uuid,
    pub reports_to: Option<Uuid>,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), DatabaseError> {
        let mut field_errors = HashMap::new();
        if !is_valid_username(&self.username) {
            field_errors.insert(
                "username".to_string(),
                "username must be 3-50 letters, digits, '_', '.' or '-'".to_string(),
            );
        }
        if !is_valid_email(&self.email) {
            field_errors.insert("email".to_string(), "email address is not valid".to_string());
        }
        if self.full_name.trim().is_empty() {
            field_errors.insert("full_name".to_string(), "full name is required".to_string());
        }
        if field_errors.is_empty() {
            Ok(())
        } else {
            Err(DatabaseError::Validation {
                message: "Invalid user".to_string(),
                field_errors,
            })
        }
    }
}

pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a user. New users are leaves of the reporting forest, so the
    /// `reports_to` edge cannot close a cycle.
    pub async fn create(&self, new_user: NewUser) -> Result<User, DatabaseError> {
        new_user.validate()?;
        let sql = format!(
            "INSERT INTO users (username, email, full_name, hierarchy_level_id, reports_to) \
             VALUES ($1, lower($2), $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&new_user.username)
            .bind(&new_user.email)
            .bind(new_user.full_name.trim())
            .bind(new_user.hierarchy_level_id)
            .bind(new_user.reports_to)
            .fetch_one(&self.pool)
            .await?;
        info!("Created user {} ({})", user.username, user.id);
        Ok(user)
    }

    pub async fn get(&self, id: Uuid) -> Result<User, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("User", id))
    }
}
