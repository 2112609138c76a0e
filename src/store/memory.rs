//! In-process document store.
//!
//! DESIGN
//! ======
//! One mutex guards every document. Writes mutate under the lock, build the
//! next snapshot, release, then publish through `watch::Sender::send_replace`
//! so subscribers never observe a half-applied write. Server timestamps are
//! strictly increasing per store even if the wall clock stalls.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use time::{Duration, OffsetDateTime};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use super::{BoardInfoSnapshot, CommentSnapshot, DocumentStore, StoreError};
use crate::model::{BoardInfo, Comment, NewComment, TitleUpdate};
use crate::services::identity::{
    AuthError, IdentityProvider, SignIn, generate_session_token, generate_uid,
};

struct Inner {
    comments: Vec<Comment>,
    board_info: Option<BoardInfo>,
    /// Identities this store issued. Writes from anyone else are denied.
    identities: HashSet<String>,
    /// session token -> uid
    sessions: HashMap<String, String>,
    /// bootstrap token -> uid
    bootstrap_tokens: HashMap<String, String>,
    last_stamp: Option<OffsetDateTime>,
}

impl Inner {
    fn next_stamp(&mut self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    fn issue_session(&mut self, uid: &str) -> String {
        let token = generate_session_token();
        self.identities.insert(uid.to_owned());
        self.sessions.insert(token.clone(), uid.to_owned());
        token
    }
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
    comments_tx: watch::Sender<CommentSnapshot>,
    board_info_tx: watch::Sender<BoardInfoSnapshot>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        let (comments_tx, _) = watch::channel(Arc::new(Vec::new()));
        let (board_info_tx, _) = watch::channel(None);
        Self {
            inner: Mutex::new(Inner {
                comments: Vec::new(),
                board_info: None,
                identities: HashSet::new(),
                sessions: HashMap::new(),
                bootstrap_tokens: HashMap::new(),
                last_stamp: None,
            }),
            comments_tx,
            board_info_tx,
        }
    }

    /// Pre-provision bootstrap tokens as `(token, uid)` pairs.
    #[must_use]
    pub fn with_bootstrap_tokens(self, tokens: impl IntoIterator<Item = (String, String)>) -> Self {
        self.lock().bootstrap_tokens.extend(tokens);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Number of stored comments.
    #[must_use]
    pub fn comment_count(&self) -> usize {
        self.lock().comments.len()
    }

    /// Current board document, if any.
    #[must_use]
    pub fn board_info(&self) -> Option<BoardInfo> {
        self.lock().board_info.clone()
    }

    /// Insert a document as-is, bypassing validation and access policy.
    /// Used to seed data the board itself would never write.
    pub fn insert_raw(&self, comment: Comment) {
        let snapshot = {
            let mut inner = self.lock();
            inner.comments.push(comment);
            Arc::new(inner.comments.clone())
        };
        self.comments_tx.send_replace(snapshot);
    }

    /// Replace the whole board document, bypassing access policy.
    pub fn put_board_info(&self, info: BoardInfo) {
        {
            let mut inner = self.lock();
            inner.board_info = Some(info.clone());
        }
        self.board_info_tx.send_replace(Some(Arc::new(info)));
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn add_comment(&self, comment: NewComment) -> Result<Uuid, StoreError> {
        let (id, snapshot) = {
            let mut inner = self.lock();
            if !inner.identities.contains(&comment.author_id) {
                return Err(StoreError::PermissionDenied(comment.author_id));
            }
            let id = Uuid::new_v4();
            let timestamp = Some(inner.next_stamp());
            inner.comments.push(Comment {
                id,
                name: comment.name,
                kind: comment.kind.as_str().to_owned(),
                comment: comment.comment,
                timestamp,
                author_id: comment.author_id,
            });
            (id, Arc::new(inner.comments.clone()))
        };
        debug!(%id, total = snapshot.len(), "memory store: comment added");
        self.comments_tx.send_replace(snapshot);
        Ok(id)
    }

    fn watch_comments(&self) -> watch::Receiver<CommentSnapshot> {
        self.comments_tx.subscribe()
    }

    async fn merge_title(&self, update: TitleUpdate) -> Result<(), StoreError> {
        let info = {
            let mut inner = self.lock();
            if !inner.identities.contains(&update.updated_by) {
                return Err(StoreError::PermissionDenied(update.updated_by));
            }
            let updated_at = Some(inner.next_stamp());
            let info = inner.board_info.get_or_insert_with(|| BoardInfo {
                title: None,
                updated_at: None,
                updated_by: None,
                extra: serde_json::Map::new(),
            });
            info.title = Some(update.title);
            info.updated_at = updated_at;
            info.updated_by = Some(update.updated_by);
            Arc::new(info.clone())
        };
        self.board_info_tx.send_replace(Some(info));
        Ok(())
    }

    fn watch_board_info(&self) -> watch::Receiver<BoardInfoSnapshot> {
        self.board_info_tx.subscribe()
    }
}

#[async_trait::async_trait]
impl IdentityProvider for MemoryStore {
    async fn current_session(&self, session_token: &str) -> Result<Option<String>, AuthError> {
        Ok(self.lock().sessions.get(session_token).cloned())
    }

    async fn sign_in_anonymously(&self) -> Result<SignIn, AuthError> {
        let uid = generate_uid();
        let session_token = self.lock().issue_session(&uid);
        Ok(SignIn { uid, session_token })
    }

    async fn sign_in_with_token(&self, token: &str) -> Result<SignIn, AuthError> {
        let mut inner = self.lock();
        let Some(uid) = inner.bootstrap_tokens.get(token).cloned() else {
            return Err(AuthError::InvalidToken);
        };
        let session_token = inner.issue_session(&uid);
        Ok(SignIn { uid, session_token })
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
