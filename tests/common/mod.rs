#![allow(dead_code)]

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use uuid::Uuid;

use teamhealth_api::database::manager::MIGRATOR;
use teamhealth_api::database::models::{NewTeam, ResponseInput, SessionSubmission, Team, User};
use teamhealth_api::database::TxSettings;
use teamhealth_api::services::{NewUser, TeamService, UserService};

/// A migrated schema private to one test. Call `cleanup` at the end.
pub struct TestDb {
    pub pool: PgPool,
    admin: PgPool,
    schema: String,
}

/// Pick the test database. Skipping is only allowed outside CI.
pub fn database_url(url: Option<String>, ci: bool) -> Result<Option<String>> {
    match url {
        Some(url) if !url.trim().is_empty() => Ok(Some(url)),
        _ if ci => anyhow::bail!("DATABASE_URL must be set when CI is set; database tests cannot be skipped"),
        _ => {
            eprintln!("DATABASE_URL not set, skipping database test");
            Ok(None)
        }
    }
}

impl TestDb {
    /// `None` when DATABASE_URL is unset, so local runs can skip without a
    /// database. Under CI a missing DATABASE_URL is an error.
    pub async fn new() -> Result<Option<Self>> {
        let _ = dotenvy::dotenv();
        let ci = std::env::var_os("CI").is_some();
        let Some(url) = database_url(std::env::var("DATABASE_URL").ok(), ci)? else {
            return Ok(None);
        };

        let schema = format!("th_test_{}", Uuid::new_v4().simple());
        let admin = PgPoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .context("failed to connect to DATABASE_URL")?;
        admin.execute(format!("CREATE SCHEMA {}", schema).as_str()).await?;

        let search_path = format!("SET search_path TO {}, public", schema);
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .after_connect(move |conn, _meta| {
                let sql = search_path.clone();
                Box::pin(async move {
                    conn.execute(sql.as_str()).await?;
                    Ok(())
                })
            })
            .connect(&url)
            .await?;
        MIGRATOR.run(&pool).await.context("failed to migrate test schema")?;

        Ok(Some(Self { pool, admin, schema }))
    }

    pub fn settings(&self) -> TxSettings {
        TxSettings::default()
    }

    pub async fn cleanup(self) -> Result<()> {
        self.pool.close().await;
        self.admin
            .execute(format!("DROP SCHEMA {} CASCADE", self.schema).as_str())
            .await?;
        Ok(())
    }

    pub async fn level_id(&self, name: &str) -> Result<Uuid> {
        let id = sqlx::query_scalar("SELECT id FROM hierarchy_levels WHERE name = $1")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn user(&self, username: &str, level: &str, reports_to: Option<Uuid>) -> Result<User> {
        let users = UserService::new(self.pool.clone());
        let user = users
            .create(NewUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                full_name: username.to_string(),
                hierarchy_level_id: self.level_id(level).await?,
                reports_to,
            })
            .await?;
        Ok(user)
    }

    /// Team with `lead` as lead, its chain derived from the lead's reporting line
    pub async fn team(&self, name: &str, lead: Option<Uuid>) -> Result<Team> {
        let team = TeamService::new(self.pool.clone(), self.settings())
            .create(NewTeam {
                name: name.to_string(),
                team_lead_id: lead,
                cadence: None,
                members: lead.into_iter().collect(),
            })
            .await?;
        Ok(team)
    }
}

pub fn submission(team_id: Uuid, user_id: Uuid, period: &str, scores: &[(&str, i32, &str)]) -> SessionSubmission {
    SessionSubmission {
        id: None,
        team_id,
        user_id,
        date: NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date"),
        assessment_period: period.to_string(),
        completed: true,
        responses: scores
            .iter()
            .map(|(dimension, score, trend)| ResponseInput {
                dimension_id: dimension.to_string(),
                score: *score,
                trend: trend.to_string(),
                comment: None,
            })
            .collect(),
    }
}
