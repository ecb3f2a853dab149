pub mod dimension_service;
pub mod health_aggregation_service;
pub mod hierarchy_level_service;
pub mod org_directory;
pub mod org_tree_service;
pub mod session_service;
pub mod supervisor_scope_service;
pub mod team_service;
pub mod user_service;

pub use dimension_service::DimensionService;
pub use health_aggregation_service::{DimensionSummary, HealthAggregationService, TeamHealthSummary, TrendCounts};
pub use hierarchy_level_service::HierarchyLevelService;
pub use org_directory::{InMemoryOrgDirectory, OrgDirectory, OrgNode, PgOrgDirectory, TxOrgDirectory};
pub use org_tree_service::OrgTreeService;
pub use session_service::SessionService;
pub use supervisor_scope_service::SupervisorScopeService;
pub use team_service::TeamService;
pub use user_service::{NewUser, UserService};
