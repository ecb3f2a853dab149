pub mod dimension;
pub mod hierarchy_level;
pub mod session;
pub mod team;
pub mod user;

pub use dimension::HealthDimension;
pub use hierarchy_level::{Direction, HierarchyLevel, HierarchyLevelUpdate, NewHierarchyLevel, Permission, Permissions};
pub use session::{HealthCheckResponse, HealthCheckSession, ResponseInput, SessionSubmission, Trend};
pub use team::{Cadence, NewTeam, SupervisorLink, Team};
pub use user::User;
