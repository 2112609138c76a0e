//! Frame: the universal message type for the feedback board websocket.
//!
//! ARCHITECTURE
//! ============
//! Every exchange between a page and the server is a Frame. Pages send
//! request frames (`comment:submit`, `title:save`, `export:csv`), the
//! session dispatches by syscall prefix, and responses flow back as
//! done/error frames. Server-initiated pushes (renders, toasts, identity)
//! are request frames with no parent.
//!
//! DESIGN
//! ======
//! - Flat data: payload is always `Map<String, Value>`, never nested.
//! - Responses correlate to requests via `parent_id`.
//! - The gateway routes on `syscall` prefix ("comment:", "title:", ...)
//!   and never inspects `data`.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// FIELD CONSTANTS
// =============================================================================

/// Frame data key for error messages.
pub const FRAME_MESSAGE: &str = "message";

/// Frame data key for grepable error codes.
pub const FRAME_CODE: &str = "code";

/// Frame data key for the retryable flag on error frames.
pub const FRAME_RETRYABLE: &str = "retryable";

// =============================================================================
// TYPES
// =============================================================================

/// Flat key-value payload. Alias to reduce noise in signatures.
pub type Data = HashMap<String, serde_json::Value>;

/// Lifecycle position of a frame in a request/response exchange.
///
/// Every exchange is `request → done` or `request → error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Request,
    Done,
    Error,
}

/// The universal message type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    /// Milliseconds since Unix epoch. Set automatically at construction.
    pub ts: i64,
    pub from: Option<String>,
    pub syscall: String,
    pub status: Status,
    #[serde(default)]
    pub data: Data,
}

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for structured error frames.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

/// Current time as milliseconds since Unix epoch.
fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

impl Frame {
    /// Create a request frame. Also used for server-initiated pushes.
    pub fn request(syscall: impl Into<String>, data: Data) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: None,
            ts: now_ms(),
            from: None,
            syscall: syscall.into(),
            status: Status::Request,
            data,
        }
    }

    /// Create a done response. Terminal, carries no data.
    #[must_use]
    pub fn done(&self) -> Self {
        self.reply(Status::Done, Data::new())
    }

    /// Create a done response carrying a payload. Terminal.
    #[must_use]
    pub fn done_with(&self, data: Data) -> Self {
        self.reply(Status::Done, data)
    }

    /// Create an error response from a plain string. Terminal.
    #[must_use]
    pub fn error(&self, message: impl Into<String>) -> Self {
        let mut data = Data::new();
        data.insert(FRAME_MESSAGE.into(), serde_json::Value::String(message.into()));
        self.reply(Status::Error, data)
    }

    /// Create a structured error response from a typed error. Terminal.
    #[must_use]
    pub fn error_from(&self, err: &(impl ErrorCode + ?Sized)) -> Self {
        let mut data = Data::new();
        data.insert(FRAME_CODE.into(), serde_json::Value::String(err.error_code().to_string()));
        data.insert(FRAME_MESSAGE.into(), serde_json::Value::String(err.to_string()));
        data.insert(FRAME_RETRYABLE.into(), serde_json::Value::Bool(err.retryable()));
        self.reply(Status::Error, data)
    }

    /// Build a reply frame. Inherits `parent_id` and `syscall`.
    fn reply(&self, status: Status, data: Data) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: Some(self.id),
            ts: now_ms(),
            from: None,
            syscall: self.syscall.clone(),
            status,
            data,
        }
    }
}

// =============================================================================
// BUILDERS
// =============================================================================

impl Frame {
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// ROUTING
// =============================================================================

impl Frame {
    /// Extract the syscall prefix (everything before the first ':').
    #[must_use]
    pub fn prefix(&self) -> &str {
        let Some((prefix, _)) = self.syscall.split_once(':') else {
            return &self.syscall;
        };
        prefix
    }

    /// Extract the operation (everything after the first ':').
    #[must_use]
    pub fn op(&self) -> &str {
        self.syscall.split_once(':').map_or("", |(_, op)| op)
    }

    /// Read a string field from `data`, or `""` when absent or not a string.
    #[must_use]
    pub fn str_field(&self, key: &str) -> &str {
        self.data
            .get(key)
            .and_then(serde_json::Value::as_str)
            .unwrap_or("")
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_sets_fields() {
        let frame = Frame::request("comment:submit", Data::new());
        assert_eq!(frame.syscall, "comment:submit");
        assert_eq!(frame.status, Status::Request);
        assert!(frame.parent_id.is_none());
        assert!(frame.ts > 0);
    }

    #[test]
    fn reply_inherits_context() {
        let req = Frame::request("title:save", Data::new());
        let done = req.done_with(Data::new());

        assert_eq!(done.parent_id, Some(req.id));
        assert_eq!(done.syscall, "title:save");
        assert_eq!(done.status, Status::Done);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Status::Done).expect("serialize"), r#""done""#);
        let status: Status = serde_json::from_str(r#""request""#).expect("deserialize");
        assert_eq!(status, Status::Request);
    }

    #[test]
    fn prefix_and_op_extraction() {
        let frame = Frame::request("comment:submit", Data::new());
        assert_eq!(frame.prefix(), "comment");
        assert_eq!(frame.op(), "submit");

        let frame = Frame::request("noseparator", Data::new());
        assert_eq!(frame.prefix(), "noseparator");
        assert_eq!(frame.op(), "");
    }

    #[test]
    fn str_field_defaults_to_empty() {
        let frame = Frame::request("title:save", Data::new())
            .with_data("title", "Week 3")
            .with_data("count", 3);
        assert_eq!(frame.str_field("title"), "Week 3");
        assert_eq!(frame.str_field("count"), "");
        assert_eq!(frame.str_field("missing"), "");
    }

    #[test]
    fn inbound_frame_without_data_parses() {
        let json = format!(
            r#"{{"id":"{}","parent_id":null,"ts":1,"from":null,"syscall":"export:csv","status":"request"}}"#,
            Uuid::new_v4()
        );
        let frame: Frame = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(frame.syscall, "export:csv");
        assert!(frame.data.is_empty());
    }

    #[test]
    fn error_from_typed() {
        #[derive(Debug, thiserror::Error)]
        #[error("store unavailable")]
        struct Unavailable;

        impl ErrorCode for Unavailable {
            fn error_code(&self) -> &'static str {
                "E_UNAVAILABLE"
            }

            fn retryable(&self) -> bool {
                true
            }
        }

        let req = Frame::request("comment:submit", Data::new());
        let err = req.error_from(&Unavailable);

        assert_eq!(err.status, Status::Error);
        assert_eq!(err.data.get("code").and_then(|v| v.as_str()), Some("E_UNAVAILABLE"));
        assert_eq!(err.data.get("message").and_then(|v| v.as_str()), Some("store unavailable"));
        assert_eq!(
            err.data
                .get("retryable")
                .and_then(serde_json::Value::as_bool),
            Some(true)
        );
    }
}
