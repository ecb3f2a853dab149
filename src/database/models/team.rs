use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
}

impl Cadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Weekly => "weekly",
            Cadence::Biweekly => "biweekly",
            Cadence::Monthly => "monthly",
            Cadence::Quarterly => "quarterly",
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cadence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly" => Ok(Cadence::Weekly),
            "biweekly" => Ok(Cadence::Biweekly),
            "monthly" => Ok(Cadence::Monthly),
            "quarterly" => Ok(Cadence::Quarterly),
            other => Err(format!("unknown cadence '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TeamRow {
    pub id: Uuid,
    pub name: String,
    pub team_lead_id: Option<Uuid>,
    pub cadence: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub team_lead_id: Option<Uuid>,
    pub cadence: Option<Cadence>,
    pub members: Vec<Uuid>,
    pub supervisor_chain: Vec<SupervisorLink>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTeam {
    pub name: String,
    pub team_lead_id: Option<Uuid>,
    pub cadence: Option<Cadence>,
    #[serde(default)]
    pub members: Vec<Uuid>,
}

/// One supervisory authority over a team; chains are ordered nearest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SupervisorLink {
    pub user_id: Uuid,
    pub hierarchy_level_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_cadence() {
        assert_eq!("biweekly".parse::<Cadence>(), Ok(Cadence::Biweekly));
        assert!("daily".parse::<Cadence>().is_err());
        assert!("Weekly".parse::<Cadence>().is_err());
    }
}
