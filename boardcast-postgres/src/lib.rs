#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! Postgres backend for boardcast change capture.
//!
//! Implements [`SqlRunner`] over a sqlx pool so
//! [`ChangeCapture`](boardcast::capture::ChangeCapture) can install and
//! remove its trigger pair, and classifies sqlx failures into [`StoreError`]
//! at this boundary.
//!
//! ```rust,no_run
//! use boardcast::capture::ChangeCapture;
//! use boardcast_postgres::PgRunner;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), boardcast::StoreError> {
//!     let runner = PgRunner::connect("postgres://localhost/board").await?;
//!     ChangeCapture::default().install(&runner).await?;
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use boardcast::capture::SqlRunner;
use boardcast::StoreError;
use sqlx::postgres::PgPool;

/// [`SqlRunner`] over a sqlx Postgres pool.
#[derive(Debug, Clone)]
pub struct PgRunner {
    pool: PgPool,
}

impl PgRunner {
    /// Connect a new pool to the given database URL.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(url).await.map_err(store_error)?;
        tracing::info!(target: "boardcast::postgres", "connected to postgres");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SqlRunner for PgRunner {
    async fn execute(&self, sql: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(sql).execute(&self.pool).await.map_err(store_error)?;
        Ok(result.rows_affected())
    }

    async fn query_bool(&self, sql: &str) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)
    }
}

/// Classify a sqlx failure into the shared taxonomy.
///
/// Database-reported errors carry a SQLSTATE, which the classifier resolves
/// before any text heuristics run.
pub fn store_error(e: sqlx::Error) -> StoreError {
    use boardcast::ErrorKind;
    let err = match &e {
        sqlx::Error::RowNotFound => StoreError::new(ErrorKind::NotFound, e.to_string()),
        sqlx::Error::PoolTimedOut => StoreError::new(ErrorKind::TimeoutError, e.to_string()),
        sqlx::Error::Io(_) => StoreError::new(ErrorKind::ConnectionError, e.to_string()),
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.into_owned());
            StoreError::classify(code.as_deref(), db.message())
        }
        _ => StoreError::classify(None, e.to_string()),
    };
    err.with_details(serde_json::json!({ "source": "postgres" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardcast::ErrorKind;

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert_eq!(store_error(sqlx::Error::RowNotFound).kind(), ErrorKind::NotFound);
    }

    #[test]
    fn pool_timeout_maps_to_timeout() {
        assert_eq!(store_error(sqlx::Error::PoolTimedOut).kind(), ErrorKind::TimeoutError);
    }

    #[test]
    fn io_failures_map_to_connection() {
        let e = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "Connection refused (os error 111)",
        ));
        assert_eq!(store_error(e).kind(), ErrorKind::ConnectionError);
    }

    #[test]
    fn other_failures_fall_through_to_text_heuristics() {
        let e = sqlx::Error::Protocol("connection reset during handshake".into());
        assert_eq!(store_error(e).kind(), ErrorKind::ConnectionError);
    }

    #[test]
    fn classified_errors_carry_driver_context() {
        let err = store_error(sqlx::Error::RowNotFound);
        assert_eq!(err.details().unwrap()["source"], "postgres");
    }
}
