//! Postgres document store.
//!
//! DESIGN
//! ======
//! Snapshots are cached in `watch` channels exactly like the memory store.
//! Row triggers (see `0001_feedboard.sql`) `NOTIFY` with the `app_id` whose
//! documents changed; a single listener task re-reads the affected set and
//! publishes a fresh snapshot. Writers never publish directly, so every
//! server instance converges through the same notification path.
//!
//! ERROR HANDLING
//! ==============
//! A dropped listener connection is logged and re-established after a fixed
//! delay. Both sets are re-read on reconnect because notifications sent
//! while disconnected are lost. Until then subscribers keep the last
//! snapshot.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgListener;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{BoardInfoSnapshot, CommentSnapshot, DocumentStore, StoreError};
use crate::model::{BOARD_INFO_DOC, BoardInfo, Comment, NewComment, TitleUpdate};
use crate::services::identity::{
    AuthError, IdentityProvider, SignIn, generate_session_token, generate_uid,
};

const COMMENTS_CHANNEL: &str = "feedboard_comments";
const BOARD_CHANNEL: &str = "feedboard_board_metadata";
const LISTENER_RETRY: Duration = Duration::from_secs(2);

type CommentRow = (Uuid, String, String, String, Option<OffsetDateTime>, String);
type BoardInfoRow = (Option<String>, Option<OffsetDateTime>, Option<String>, serde_json::Value);

pub struct PgStore {
    pool: PgPool,
    app_id: String,
    comments_tx: watch::Sender<CommentSnapshot>,
    board_info_tx: watch::Sender<BoardInfoSnapshot>,
}

impl PgStore {
    /// Load initial snapshots and spawn the notification listener.
    ///
    /// # Errors
    ///
    /// Returns a database error if the initial reads fail.
    pub async fn start(pool: PgPool, app_id: impl Into<String>) -> Result<(Arc<Self>, JoinHandle<()>), StoreError> {
        let app_id = app_id.into();
        let comments = load_comments(&pool, &app_id).await?;
        let board_info = load_board_info(&pool, &app_id).await?;
        info!(%app_id, comments = comments.len(), "pg store: initial snapshot loaded");

        let (comments_tx, _) = watch::channel(Arc::new(comments));
        let (board_info_tx, _) = watch::channel(board_info.map(Arc::new));
        let store = Arc::new(Self { pool, app_id, comments_tx, board_info_tx });

        let listener = tokio::spawn(run_listener(Arc::clone(&store)));
        Ok((store, listener))
    }

    /// Upsert configured `(token, uid)` pairs into `bootstrap_tokens`.
    ///
    /// # Errors
    ///
    /// Returns a database error if any upsert fails.
    pub async fn provision_bootstrap_tokens(&self, tokens: &[(String, String)]) -> Result<(), StoreError> {
        for (token, uid) in tokens {
            sqlx::query(
                "INSERT INTO bootstrap_tokens (token, uid) VALUES ($1, $2)
                 ON CONFLICT (token) DO UPDATE SET uid = EXCLUDED.uid",
            )
            .bind(token)
            .bind(uid)
            .execute(&self.pool)
            .await?;
        }
        if !tokens.is_empty() {
            info!(count = tokens.len(), "pg store: bootstrap tokens provisioned");
        }
        Ok(())
    }

    async fn refresh_comments(&self) -> Result<(), sqlx::Error> {
        let comments = load_comments(&self.pool, &self.app_id).await?;
        debug!(total = comments.len(), "pg store: comments refreshed");
        self.comments_tx.send_replace(Arc::new(comments));
        Ok(())
    }

    async fn refresh_board_info(&self) -> Result<(), sqlx::Error> {
        let info = load_board_info(&self.pool, &self.app_id).await?;
        self.board_info_tx.send_replace(info.map(Arc::new));
        Ok(())
    }
}

// =============================================================================
// LISTENER
// =============================================================================

async fn run_listener(store: Arc<PgStore>) {
    loop {
        if let Err(e) = listen(&store).await {
            warn!(error = %e, "pg store: listener failed, retrying");
        }
        tokio::time::sleep(LISTENER_RETRY).await;
    }
}

async fn listen(store: &PgStore) -> Result<(), sqlx::Error> {
    let mut listener = PgListener::connect_with(&store.pool).await?;
    listener.listen_all([COMMENTS_CHANNEL, BOARD_CHANNEL]).await?;

    store.refresh_comments().await?;
    store.refresh_board_info().await?;

    loop {
        let notification = listener.recv().await?;
        if notification.payload() != store.app_id {
            continue;
        }
        match notification.channel() {
            COMMENTS_CHANNEL => store.refresh_comments().await?,
            BOARD_CHANNEL => store.refresh_board_info().await?,
            other => debug!(channel = other, "pg store: ignoring notification"),
        }
    }
}

// =============================================================================
// QUERIES
// =============================================================================

async fn load_comments(pool: &PgPool, app_id: &str) -> Result<Vec<Comment>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CommentRow>(
        "SELECT id, name, kind, comment, created_at, author_id
         FROM comments
         WHERE app_id = $1",
    )
    .bind(app_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, name, kind, comment, timestamp, author_id)| Comment { id, name, kind, comment, timestamp, author_id })
        .collect())
}

async fn load_board_info(pool: &PgPool, app_id: &str) -> Result<Option<BoardInfo>, sqlx::Error> {
    let row = sqlx::query_as::<_, BoardInfoRow>(
        "SELECT title, updated_at, updated_by, extra
         FROM board_metadata
         WHERE app_id = $1 AND doc_id = $2",
    )
    .bind(app_id)
    .bind(BOARD_INFO_DOC)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(title, updated_at, updated_by, extra)| BoardInfo {
        title,
        updated_at,
        updated_by,
        extra: match extra {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        },
    }))
}

/// Writes from identities missing in `identities` trip the foreign key.
fn write_error(err: sqlx::Error, uid: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_foreign_key_violation() {
            return StoreError::PermissionDenied(uid.to_owned());
        }
    }
    StoreError::from(err)
}

#[async_trait::async_trait]
impl DocumentStore for PgStore {
    async fn add_comment(&self, comment: NewComment) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO comments (id, app_id, name, kind, comment, author_id)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(&self.app_id)
        .bind(&comment.name)
        .bind(comment.kind.as_str())
        .bind(&comment.comment)
        .bind(&comment.author_id)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, &comment.author_id))?;
        Ok(id)
    }

    fn watch_comments(&self) -> watch::Receiver<CommentSnapshot> {
        self.comments_tx.subscribe()
    }

    async fn merge_title(&self, update: TitleUpdate) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO board_metadata (app_id, doc_id, title, updated_at, updated_by)
             VALUES ($1, $2, $3, now(), $4)
             ON CONFLICT (app_id, doc_id) DO UPDATE
             SET title = EXCLUDED.title,
                 updated_at = EXCLUDED.updated_at,
                 updated_by = EXCLUDED.updated_by",
        )
        .bind(&self.app_id)
        .bind(BOARD_INFO_DOC)
        .bind(&update.title)
        .bind(&update.updated_by)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, &update.updated_by))?;
        Ok(())
    }

    fn watch_board_info(&self) -> watch::Receiver<BoardInfoSnapshot> {
        self.board_info_tx.subscribe()
    }
}

// =============================================================================
// IDENTITY PROVIDER
// =============================================================================

impl PgStore {
    async fn issue_session(&self, uid: &str, provider: &str) -> Result<String, AuthError> {
        let token = generate_session_token();
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO identities (uid, provider) VALUES ($1, $2) ON CONFLICT (uid) DO NOTHING")
            .bind(uid)
            .bind(provider)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO identity_sessions (token, uid) VALUES ($1, $2)")
            .bind(&token)
            .bind(uid)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(token)
    }
}

#[async_trait::async_trait]
impl IdentityProvider for PgStore {
    async fn current_session(&self, session_token: &str) -> Result<Option<String>, AuthError> {
        let uid = sqlx::query_scalar::<_, String>(
            "SELECT uid FROM identity_sessions WHERE token = $1 AND expires_at > now()",
        )
        .bind(session_token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(uid)
    }

    async fn sign_in_anonymously(&self) -> Result<SignIn, AuthError> {
        let uid = generate_uid();
        let session_token = self.issue_session(&uid, "anonymous").await?;
        Ok(SignIn { uid, session_token })
    }

    async fn sign_in_with_token(&self, token: &str) -> Result<SignIn, AuthError> {
        let uid = sqlx::query_scalar::<_, String>("SELECT uid FROM bootstrap_tokens WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        let session_token = self.issue_session(&uid, "custom").await?;
        Ok(SignIn { uid, session_token })
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
#[path = "postgres_test.rs"]
mod tests;
