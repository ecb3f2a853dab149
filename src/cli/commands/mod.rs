pub mod dashboard;
pub mod levels;
pub mod migrate;
pub mod org;
pub mod teams;
