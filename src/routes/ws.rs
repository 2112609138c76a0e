//! WebSocket handler: bidirectional frame relay for one page.
//!
//! DESIGN
//! ======
//! On upgrade, creates a [`PageSession`] and enters a `select!` loop:
//! - Incoming client frames → parse, then handle on a spawned task
//! - Session outbox (renders, toasts, replies) → forward to client
//!
//! Requests run on session-owned tasks so a slow write never holds up
//! snapshot delivery, and a second submit can reach the session while the
//! first is still in flight.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id`
//! 2. Identity resolution and subscriptions start in the background
//! 3. Client sends frames → session handles → reply via outbox
//! 4. Close → abort subscriptions and in-flight requests

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::frame::{Data, Frame, Status};
use crate::session::PageSession;
use crate::state::AppState;

/// Credentials a page may bring on connect.
#[derive(Debug, Clone, Default)]
struct Credentials {
    session_token: Option<String>,
    bootstrap_token: Option<String>,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let credentials = Credentials {
        session_token: params.get("session").cloned(),
        bootstrap_token: params
            .get("bootstrap")
            .cloned()
            .or_else(|| state.config.bootstrap_token.clone()),
    };
    ws.on_upgrade(move |socket| run_ws(socket, state, credentials))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, credentials: Credentials) {
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(256);
    let session = PageSession::new(Arc::clone(&state.store), Arc::clone(&state.config), client_tx);
    let client_id = session.client_id();

    let welcome = Frame::request("session:connected", Data::new()).with_data("client_id", client_id.to_string());
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(%client_id, "ws: client connected");

    let starter = {
        let session = Arc::clone(&session);
        let provider = Arc::clone(&state.identity);
        tokio::spawn(async move {
            session
                .start(
                    provider.as_ref(),
                    credentials.session_token.as_deref(),
                    credentials.bootstrap_token.as_deref(),
                )
                .await;
        })
    };

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        if let Some(err) = process_inbound_text(&session, text.as_str()) {
                            let _ = send_frame(&mut socket, &err).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    starter.abort();
    session.shutdown();
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse one inbound text frame and hand it to the session on its own task.
/// Returns a frame for the sender only when the text could not be parsed.
fn process_inbound_text(session: &Arc<PageSession>, text: &str) -> Option<Frame> {
    let client_id = session.client_id();
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound frame");
            return Some(Frame::request("gateway:error", Data::new()).with_data("message", format!("invalid json: {e}")));
        }
    };

    // Stamp the resolved identity as `from`; pages can't claim one.
    req.from = session.identity().map(|identity| identity.uid.clone());
    debug!(%client_id, id = %req.id, syscall = %req.syscall, "ws: recv frame");

    session.spawn_request(req);
    None
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == Status::Error {
        let code = frame
            .data
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        let message = frame
            .data
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        debug!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
