//! Document store: comment collection and board metadata singleton.
//!
//! ARCHITECTURE
//! ============
//! The board never queries on demand. Each backend keeps a `watch` channel
//! per document set and pushes a full snapshot after every change, the way
//! a live-query database would. Page sessions subscribe with
//! [`DocumentStore::watch_comments`] / [`DocumentStore::watch_board_info`],
//! render the current value, then await `changed()`.
//!
//! Backends:
//! - [`memory::MemoryStore`]: in-process, used without `DATABASE_URL` and
//!   in tests.
//! - [`postgres::PgStore`]: sqlx + `LISTEN/NOTIFY`.
//!
//! ACCESS POLICY
//! =============
//! Writes are accepted only from identities the backend itself issued.
//! A locally synthesized identity is rejected with
//! [`StoreError::PermissionDenied`].

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;

use crate::frame::ErrorCode;
use crate::model::{BoardInfo, Comment, NewComment, TitleUpdate};

/// Full comment collection, in store order.
pub type CommentSnapshot = Arc<Vec<Comment>>;

/// Board metadata document; `None` until first written.
pub type BoardInfoSnapshot = Option<Arc<BoardInfo>>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("permission denied for identity {0}")]
    PermissionDenied(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

/// An exhausted or closed pool is reported as unavailable, not as a query
/// failure.
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            e @ (sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed) => Self::Unavailable(e.to_string()),
            e => Self::Database(e),
        }
    }
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "E_PERMISSION_DENIED",
            Self::Unavailable(_) => "E_STORE_UNAVAILABLE",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        !matches!(self, Self::PermissionDenied(_))
    }
}

#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Append a comment. The store assigns id and server timestamp.
    async fn add_comment(&self, comment: NewComment) -> Result<Uuid, StoreError>;

    /// Subscribe to the comment collection. The receiver starts with the
    /// current snapshot marked as seen.
    fn watch_comments(&self) -> watch::Receiver<CommentSnapshot>;

    /// Merge `title`, `updated_at`, `updated_by` into the board document,
    /// creating it if needed. Other fields are left untouched.
    async fn merge_title(&self, update: TitleUpdate) -> Result<(), StoreError>;

    /// Subscribe to the board metadata document.
    fn watch_board_info(&self) -> watch::Receiver<BoardInfoSnapshot>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_exhaustion_is_unavailable() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(err.error_code(), "E_STORE_UNAVAILABLE");
        assert!(err.retryable());

        let err = StoreError::from(sqlx::Error::PoolClosed);
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn query_failures_stay_database_errors() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
        assert_eq!(err.error_code(), "E_DATABASE");
    }

    #[test]
    fn permission_denied_is_not_retryable() {
        assert!(!StoreError::PermissionDenied("Anon-1".into()).retryable());
    }
}
