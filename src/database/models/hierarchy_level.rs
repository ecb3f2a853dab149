use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Named capabilities granted by a hierarchy level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(default)]
pub struct Permissions {
    pub can_view_all_teams: bool,
    pub can_edit_teams: bool,
    pub can_manage_users: bool,
    pub can_take_survey: bool,
    pub can_view_analytics: bool,
    pub can_configure_system: bool,
    pub can_view_reports: bool,
    pub can_export_data: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ViewAllTeams,
    EditTeams,
    ManageUsers,
    TakeSurvey,
    ViewAnalytics,
    ConfigureSystem,
    ViewReports,
    ExportData,
}

impl Permissions {
    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::ViewAllTeams => self.can_view_all_teams,
            Permission::EditTeams => self.can_edit_teams,
            Permission::ManageUsers => self.can_manage_users,
            Permission::TakeSurvey => self.can_take_survey,
            Permission::ViewAnalytics => self.can_view_analytics,
            Permission::ConfigureSystem => self.can_configure_system,
            Permission::ViewReports => self.can_view_reports,
            Permission::ExportData => self.can_export_data,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HierarchyLevel {
    pub id: Uuid,
    pub name: String,
    /// 1 is the highest authority; positions are contiguous
    pub position: i32,
    pub color: Option<String>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub permissions: Permissions,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewHierarchyLevel {
    pub name: String,
    pub color: Option<String>,
    #[serde(default)]
    pub permissions: Permissions,
    /// Insert at this position instead of appending
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HierarchyLevelUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
    pub permissions: Option<Permissions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(format!("direction must be 'up' or 'down', got '{}'", other)),
        }
    }
}
