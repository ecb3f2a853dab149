use sqlx::{PgPool, Postgres, Transaction};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::database::DatabaseError;

/// Settings every service applies to the transactions it opens
#[derive(Debug, Clone, Copy)]
pub struct TxSettings {
    pub statement_timeout: Duration,
    pub serialization_retries: u32,
}

impl Default for TxSettings {
    fn default() -> Self {
        Self {
            statement_timeout: Duration::from_secs(30),
            serialization_retries: 3,
        }
    }
}

impl From<&crate::config::DatabaseConfig> for TxSettings {
    fn from(config: &crate::config::DatabaseConfig) -> Self {
        Self {
            statement_timeout: Duration::from_millis(config.statement_timeout_ms),
            serialization_retries: config.serialization_retries,
        }
    }
}

/// Open a READ COMMITTED transaction. Dropping it without commit rolls back.
pub async fn begin(pool: &PgPool, settings: TxSettings) -> Result<Transaction<'static, Postgres>, DatabaseError> {
    let mut tx = pool.begin().await?;
    set_statement_timeout(&mut tx, settings).await?;
    Ok(tx)
}

/// Open a SERIALIZABLE transaction for read-then-write sequences
pub async fn begin_serializable(
    pool: &PgPool,
    settings: TxSettings,
) -> Result<Transaction<'static, Postgres>, DatabaseError> {
    let mut tx = pool.begin().await?;
    // must be the first statement of the transaction
    sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        .execute(&mut *tx)
        .await?;
    set_statement_timeout(&mut tx, settings).await?;
    Ok(tx)
}

async fn set_statement_timeout(
    tx: &mut Transaction<'static, Postgres>,
    settings: TxSettings,
) -> Result<(), DatabaseError> {
    // SET LOCAL does not accept bind parameters
    let sql = format!("SET LOCAL statement_timeout = {}", settings.statement_timeout.as_millis());
    sqlx::query(&sql).execute(&mut **tx).await?;
    Ok(())
}

/// Re-run `attempt` while it fails with a serialization failure, at most `retries` extra times
pub async fn retry_serializable<T, F, Fut>(retries: u32, mut attempt: F) -> Result<T, DatabaseError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DatabaseError>>,
{
    let mut tries = 0;
    loop {
        match attempt().await {
            Err(DatabaseError::SerializationFailure(msg)) if tries < retries => {
                tries += 1;
                warn!("Serialization failure, retrying ({}/{}): {}", tries, retries, msg);
            }
            other => return other,
        }
    }
}

/// Bound a core call by a deadline. On expiry the inner future is dropped,
/// which drops any open transaction and rolls it back.
pub async fn with_deadline<T, Fut>(deadline: Option<Duration>, fut: Fut) -> Result<T, DatabaseError>
where
    Fut: Future<Output = Result<T, DatabaseError>>,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| DatabaseError::Timeout(limit))?,
        None => fut.await,
    }
}
