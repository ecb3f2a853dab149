use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::database::DatabaseError;

pub const MIN_SCORE: i32 = 1;
pub const MAX_SCORE: i32 = 3;
pub const MAX_COMMENT_LEN: usize = 1000;
pub const MAX_PERIOD_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Improving => "improving",
            Trend::Stable => "stable",
            Trend::Declining => "declining",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Trend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "improving" => Ok(Trend::Improving),
            "stable" => Ok(Trend::Stable),
            "declining" => Ok(Trend::Declining),
            other => Err(format!("trend must be improving, stable or declining, got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub dimension_id: String,
    pub score: i32,
    pub trend: Trend,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckSession {
    pub id: Uuid,
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub assessment_period: String,
    pub completed: bool,
    pub responses: Vec<HealthCheckResponse>,
}

/// One row of the sessions LEFT JOIN responses query
#[derive(Debug, Clone, FromRow)]
pub struct SessionResponseRow {
    pub id: Uuid,
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub assessment_period: String,
    pub completed: bool,
    pub dimension_id: Option<String>,
    pub score: Option<i32>,
    pub trend: Option<String>,
    pub comment: Option<String>,
}

/// Fold joined rows into sessions, keeping the order in which each session
/// first appears. Sessions without responses keep an empty list.
pub fn group_session_rows(rows: Vec<SessionResponseRow>) -> Result<Vec<HealthCheckSession>, DatabaseError> {
    let mut sessions: Vec<HealthCheckSession> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();

    for row in rows {
        let slot = *index.entry(row.id).or_insert_with(|| {
            sessions.push(HealthCheckSession {
                id: row.id,
                team_id: row.team_id,
                user_id: row.user_id,
                date: row.date,
                assessment_period: row.assessment_period.clone(),
                completed: row.completed,
                responses: Vec::new(),
            });
            sessions.len() - 1
        });

        if let (Some(dimension_id), Some(score), Some(trend)) = (row.dimension_id, row.score, row.trend) {
            let trend = trend
                .parse::<Trend>()
                .map_err(|e| DatabaseError::Integrity(format!("session {}: {}", row.id, e)))?;
            sessions[slot].responses.push(HealthCheckResponse {
                dimension_id,
                score,
                trend,
                comment: row.comment,
            });
        }
    }

    Ok(sessions)
}

/// Response as submitted by a client, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseInput {
    pub dimension_id: String,
    pub score: i32,
    pub trend: String,
    pub comment: Option<String>,
}

/// A survey submission; `id` is set when replacing an earlier submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSubmission {
    pub id: Option<Uuid>,
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub assessment_period: String,
    #[serde(default = "default_completed")]
    pub completed: bool,
    pub responses: Vec<ResponseInput>,
}

fn default_completed() -> bool {
    true
}

impl SessionSubmission {
    /// Check every field that can be checked without the store. Responses
    /// come back ordered by dimension id.
    pub fn validate(self) -> Result<HealthCheckSession, DatabaseError> {
        let mut field_errors = HashMap::new();

        let period = self.assessment_period.trim().to_string();
        if period.is_empty() {
            field_errors.insert("assessment_period".to_string(), "assessment period is required".to_string());
        } else if period.chars().count() > MAX_PERIOD_LEN {
            field_errors.insert(
                "assessment_period".to_string(),
                format!("assessment period must be at most {} characters", MAX_PERIOD_LEN),
            );
        }

        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        let mut responses = Vec::with_capacity(self.responses.len());

        for (i, input) in self.responses.into_iter().enumerate() {
            let prefix = format!("responses[{}]", i);
            let dimension_id = input.dimension_id.trim().to_string();

            if dimension_id.is_empty() {
                field_errors.insert(format!("{}.dimension_id", prefix), "dimension is required".to_string());
            } else if !seen.insert(dimension_id.clone()) {
                duplicates.push(dimension_id.clone());
            }

            if !(MIN_SCORE..=MAX_SCORE).contains(&input.score) {
                field_errors.insert(
                    format!("{}.score", prefix),
                    format!("score must be between {} and {}, got {}", MIN_SCORE, MAX_SCORE, input.score),
                );
            }

            let trend = match input.trend.parse::<Trend>() {
                Ok(t) => Some(t),
                Err(e) => {
                    field_errors.insert(format!("{}.trend", prefix), e);
                    None
                }
            };

            let comment = input.comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
            if let Some(c) = &comment {
                if c.chars().count() > MAX_COMMENT_LEN {
                    field_errors.insert(
                        format!("{}.comment", prefix),
                        format!("comment must be at most {} characters", MAX_COMMENT_LEN),
                    );
                }
            }

            if let Some(trend) = trend {
                responses.push(HealthCheckResponse {
                    dimension_id,
                    score: input.score,
                    trend,
                    comment,
                });
            }
        }

        if !field_errors.is_empty() {
            return Err(DatabaseError::Validation {
                message: "Invalid health check submission".to_string(),
                field_errors,
            });
        }

        if !duplicates.is_empty() {
            return Err(DatabaseError::Conflict(format!(
                "duplicate responses for dimension(s): {}",
                duplicates.join(", ")
            )));
        }

        responses.sort_by(|a, b| a.dimension_id.cmp(&b.dimension_id));

        Ok(HealthCheckSession {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            team_id: self.team_id,
            user_id: self.user_id,
            date: self.date,
            assessment_period: period,
            completed: self.completed,
            responses,
        })
    }
}
