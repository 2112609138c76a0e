//! Notification widget: one transient status message per page.
//!
//! DESIGN
//! ======
//! `Idle → Showing → (timer) → Idle`. Each `show` bumps a generation
//! counter, aborts the pending hide timer, and starts a new one. A timer
//! only hides the toast if its generation is still current, so a timer that
//! fired just before being aborted can't hide a newer message. There is no
//! queue: the latest message wins.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::frame::{Data, Frame};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToastState {
    Idle,
    Showing { message: String, level: Level },
}

struct Inner {
    state: ToastState,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct Toast {
    inner: Arc<Mutex<Inner>>,
    outbox: mpsc::Sender<Frame>,
    duration: Duration,
}

impl Toast {
    #[must_use]
    pub fn new(outbox: mpsc::Sender<Frame>, duration: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner { state: ToastState::Idle, generation: 0, timer: None })),
            outbox,
            duration,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub fn state(&self) -> ToastState {
        self.lock().state.clone()
    }

    /// Show `message`, replacing whatever is showing and restarting the timer.
    pub fn show(&self, message: impl Into<String>, level: Level) {
        let message = message.into();
        let mut inner = self.lock();
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        if let ToastState::Showing { message: previous, .. } = &inner.state {
            debug!(%previous, "toast: replaced before hide");
        }
        inner.generation += 1;
        inner.state = ToastState::Showing { message: message.clone(), level };

        let mut data = Data::new();
        data.insert("message".into(), serde_json::json!(message));
        data.insert("level".into(), serde_json::json!(level.as_str()));
        if let Err(e) = self.outbox.try_send(Frame::request("toast:show", data)) {
            warn!(error = %e, "toast: show frame dropped");
        }

        inner.timer = Some(tokio::spawn(hide_after(self.clone(), inner.generation)));
    }
}

async fn hide_after(toast: Toast, generation: u64) {
    tokio::time::sleep(toast.duration).await;
    {
        let mut inner = toast.lock();
        if inner.generation != generation {
            return;
        }
        inner.state = ToastState::Idle;
        inner.timer = None;
    }
    let _ = toast.outbox.send(Frame::request("toast:hide", Data::new())).await;
}

#[cfg(test)]
#[path = "toast_test.rs"]
mod tests;
