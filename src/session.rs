//! Page session: the per-connection context object.
//!
//! ARCHITECTURE
//! ============
//! One `PageSession` exists per websocket connection. It owns everything a
//! page would hold: the resolved identity, the latest comment snapshot for
//! export, the current title, the submit guard, and the toast widget. The
//! websocket layer only moves frames; every domain decision happens here.
//!
//! LIFECYCLE
//! =========
//! 1. [`PageSession::start`] resolves identity and pushes `session:identity`.
//! 2. Title and comment subscriptions start concurrently. Each pushes a
//!    frame for the current value, then one per store change.
//! 3. [`PageSession::handle`] answers client requests. Writes wait on the
//!    identity cell, so a request that races `start` is delayed, not lost.
//! 4. [`PageSession::shutdown`] aborts the subscriptions and any request
//!    still in flight, including one parked on an identity that will never
//!    resolve.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError};

use time::OffsetDateTime;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::frame::{Data, Frame};
use crate::model::BoardInfo;
use crate::services::comments::{self, CategoryBuckets, SubmitError, SubmitForm, SubmitGuard};
use crate::services::export::{self, CSV_MIME, ExportError};
use crate::services::identity::{self, Identity, IdentityCell, IdentityProvider};
use crate::services::render::{RenderContext, render_panels};
use crate::services::title;
use crate::services::toast::{Level, Toast};
use crate::store::{CommentSnapshot, DocumentStore};

/// Result of a request handler. The dispatcher turns it into a reply frame.
enum Outcome {
    /// Send done+data to the requesting page.
    Reply(Data),
    /// Send an empty done.
    Done,
}

pub struct PageSession {
    client_id: Uuid,
    store: Arc<dyn DocumentStore>,
    config: Arc<Config>,
    identity: IdentityCell,
    latest_comments: RwLock<CommentSnapshot>,
    current_title: RwLock<String>,
    submitting: AtomicBool,
    toast: Toast,
    outbox: mpsc::Sender<Frame>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PageSession {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, config: Arc<Config>, outbox: mpsc::Sender<Frame>) -> Arc<Self> {
        let toast = Toast::new(outbox.clone(), config.toast_duration);
        let current_title = title::display_title(None, config.locale);
        Arc::new(Self {
            client_id: Uuid::new_v4(),
            store,
            config,
            identity: IdentityCell::new(),
            latest_comments: RwLock::new(Arc::default()),
            current_title: RwLock::new(current_title),
            submitting: AtomicBool::new(false),
            toast,
            outbox,
            tasks: Mutex::new(Vec::new()),
        })
    }

    #[must_use]
    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    /// The resolved identity, once `start` has completed resolution.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.get()
    }

    // =========================================================================
    // STARTUP
    // =========================================================================

    /// Resolve identity, announce it, then start both subscriptions.
    pub async fn start(
        self: &Arc<Self>,
        provider: &dyn IdentityProvider,
        session_token: Option<&str>,
        bootstrap_token: Option<&str>,
    ) {
        let resolved = identity::resolve(provider, session_token, bootstrap_token).await;
        let frame = self.identity_frame(&resolved);
        if let Err(e) = self.identity.set(resolved) {
            warn!(client_id = %self.client_id, error = %e, "session: start called twice");
            return;
        }
        self.push(frame).await;

        let title_task = self.spawn_title_loop();
        let comments_task = self.spawn_comments_loop();
        self.lock_tasks().extend([title_task, comments_task]);
    }

    fn identity_frame(&self, identity: &Identity) -> Frame {
        let display = if identity.degraded {
            format!("{}: {}", self.config.locale.labels().auth_error, identity.uid)
        } else {
            identity.uid.clone()
        };
        let mut frame = Frame::request("session:identity", Data::new())
            .with_data("user_id", identity.uid.clone())
            .with_data("degraded", identity.degraded)
            .with_data("display", display);
        if let Some(token) = &identity.session_token {
            frame = frame.with_data("session_token", token.clone());
        }
        frame
    }

    fn spawn_title_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let session = Arc::clone(self);
        let mut rx = self.store.watch_board_info();
        tokio::spawn(async move {
            loop {
                let snapshot = rx.borrow_and_update().clone();
                let frame = session.on_title_snapshot(snapshot.as_deref()).await;
                if session.outbox.send(frame).await.is_err() {
                    break;
                }
                if rx.changed().await.is_err() {
                    warn!(client_id = %session.client_id, "session: title subscription closed");
                    break;
                }
            }
        })
    }

    fn spawn_comments_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let session = Arc::clone(self);
        let mut rx = self.store.watch_comments();
        tokio::spawn(async move {
            loop {
                let snapshot = rx.borrow_and_update().clone();
                let frame = session.on_comments_snapshot(snapshot).await;
                if session.outbox.send(frame).await.is_err() {
                    break;
                }
                if rx.changed().await.is_err() {
                    warn!(client_id = %session.client_id, "session: comment subscription closed");
                    break;
                }
            }
        })
    }

    /// Abort the subscriptions and in-flight requests. A pending toast timer
    /// still fires once and finds the outbox closed.
    pub fn shutdown(&self) {
        for task in self.lock_tasks().drain(..) {
            task.abort();
        }
        debug!(client_id = %self.client_id, "session: shut down");
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Keep the title for export and mirror it to both title surfaces.
    async fn on_title_snapshot(&self, info: Option<&BoardInfo>) -> Frame {
        if let Some(info) = info {
            debug!(
                client_id = %self.client_id,
                updated_by = ?info.updated_by,
                updated_at = ?info.updated_at,
                extra_fields = info.extra.len(),
                "session: board info changed"
            );
        }
        let title = title::display_title(info, self.config.locale);
        *self.current_title.write().await = title.clone();
        Frame::request("title:changed", Data::new())
            .with_data("input", title.clone())
            .with_data("display", title)
    }

    /// Keep the flat snapshot for export and re-render every panel.
    async fn on_comments_snapshot(&self, snapshot: CommentSnapshot) -> Frame {
        *self.latest_comments.write().await = Arc::clone(&snapshot);

        let buckets = CategoryBuckets::partition(&snapshot);
        let ctx = RenderContext {
            current_uid: self.identity.get().map(|identity| identity.uid.as_str()),
            locale: self.config.locale,
            offset: self.config.utc_offset,
        };
        let panels = render_panels(&buckets, &ctx);
        debug!(client_id = %self.client_id, total = snapshot.len(), "session: comments rendered");

        Frame::request("comments:rendered", Data::new())
            .with_data("impressive", panels.impressive)
            .with_data("learn_more", panels.learn_more)
            .with_data("difficult", panels.difficult)
            .with_data("total", snapshot.len())
    }

    // =========================================================================
    // REQUESTS
    // =========================================================================

    /// Handle `req` on its own task and queue the reply. The task is tracked
    /// so [`PageSession::shutdown`] can abort it.
    pub fn spawn_request(self: &Arc<Self>, req: Frame) {
        let session = Arc::clone(self);
        let task = tokio::spawn(async move {
            let reply = session.handle(&req).await;
            session.push(reply).await;
        });
        let mut tasks = self.lock_tasks();
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
    }

    /// Dispatch one client request by syscall prefix and build its reply.
    pub async fn handle(&self, req: &Frame) -> Frame {
        info!(client_id = %self.client_id, id = %req.id, syscall = %req.syscall, "session: request");

        let result = match (req.prefix(), req.op()) {
            ("comment", "submit") => self.submit_comment(req).await,
            ("title", "save") => self.save_title(req).await,
            ("export", "csv") => self.export_csv(req).await,
            ("comment" | "title" | "export", op) => Err(req.error(format!("unknown {} op: {op}", req.prefix()))),
            (prefix, _) => Err(req.error(format!("unknown prefix: {prefix}"))),
        };

        match result {
            Ok(Outcome::Reply(data)) => req.done_with(data),
            Ok(Outcome::Done) => req.done(),
            Err(err_frame) => err_frame,
        }
    }

    async fn submit_comment(&self, req: &Frame) -> Result<Outcome, Frame> {
        let labels = self.config.locale.labels();

        let draft = match comments::validate(&SubmitForm::from_frame(req)) {
            Ok(draft) => draft,
            Err(e) => {
                self.toast.show(labels.missing_fields, Level::Error);
                return Err(req.error_from(&e));
            }
        };

        let Some(_guard) = SubmitGuard::acquire(&self.submitting) else {
            self.toast.show(labels.submit_busy, Level::Warning);
            return Err(req.error_from(&SubmitError::Busy));
        };

        self.push(busy_frame(true)).await;
        let identity = self.identity.wait().await;
        let name = draft.name.clone();
        let result = comments::append(self.store.as_ref(), &identity, draft).await;
        self.push(busy_frame(false)).await;

        match result {
            Ok(id) => {
                info!(client_id = %self.client_id, %id, "session: comment submitted");
                self.toast.show(labels.submit_ok, Level::Success);
                let mut data = Data::new();
                data.insert("id".into(), serde_json::json!(id));
                data.insert("name".into(), serde_json::json!(name));
                data.insert("clear".into(), serde_json::json!(["comment", "type"]));
                Ok(Outcome::Reply(data))
            }
            Err(e) => {
                warn!(client_id = %self.client_id, error = %e, "session: comment submit failed");
                self.toast.show(format!("{}{e}", labels.submit_failed), Level::Error);
                Err(req.error_from(&e))
            }
        }
    }

    async fn save_title(&self, req: &Frame) -> Result<Outcome, Frame> {
        let labels = self.config.locale.labels();
        let candidate = req.str_field("title");
        if title::normalize(candidate).is_none() {
            return Ok(Outcome::Done);
        }

        let identity = self.identity.wait().await;
        match title::save_title(self.store.as_ref(), &identity, candidate).await {
            Ok(Some(saved)) => {
                self.toast.show(labels.title_ok, Level::Success);
                let mut data = Data::new();
                data.insert("title".into(), serde_json::json!(saved));
                Ok(Outcome::Reply(data))
            }
            Ok(None) => Ok(Outcome::Done),
            Err(e) => {
                warn!(client_id = %self.client_id, error = %e, "session: title save failed");
                self.toast.show(format!("{}{e}", labels.title_failed), Level::Error);
                Err(req.error_from(&e))
            }
        }
    }

    async fn export_csv(&self, req: &Frame) -> Result<Outcome, Frame> {
        let labels = self.config.locale.labels();
        let snapshot = Arc::clone(&*self.latest_comments.read().await);
        let board_title = self.current_title.read().await.clone();

        let file = export::export_csv(
            &snapshot,
            &board_title,
            OffsetDateTime::now_utc(),
            self.config.locale,
            self.config.utc_offset,
        );
        match file {
            Ok(file) => {
                info!(client_id = %self.client_id, filename = %file.filename, rows = snapshot.len(), "session: csv exported");
                self.toast.show(labels.export_started, Level::Success);
                let mut data = Data::new();
                data.insert("filename".into(), serde_json::json!(file.filename));
                data.insert("mime".into(), serde_json::json!(CSV_MIME));
                data.insert("content".into(), serde_json::json!(file.content));
                Ok(Outcome::Reply(data))
            }
            Err(e @ ExportError::Empty) => {
                self.toast.show(labels.export_empty, Level::Warning);
                Err(req.error_from(&e))
            }
            Err(e) => {
                warn!(client_id = %self.client_id, error = %e, "session: csv export failed");
                self.toast.show(e.to_string(), Level::Error);
                Err(req.error_from(&e))
            }
        }
    }

    async fn push(&self, frame: Frame) {
        if self.outbox.send(frame).await.is_err() {
            debug!(client_id = %self.client_id, "session: outbox closed");
        }
    }
}

fn busy_frame(busy: bool) -> Frame {
    Frame::request("form:busy", Data::new()).with_data("busy", busy)
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
