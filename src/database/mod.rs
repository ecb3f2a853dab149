pub mod error;
pub mod manager;
pub mod models;
pub mod transaction;

pub use error::DatabaseError;
pub use manager::DatabaseManager;
pub use transaction::TxSettings;
