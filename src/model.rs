//! Documents the board reads and writes.
//!
//! DESIGN
//! ======
//! Comments keep their `kind` as the raw stored string. Only the partition
//! step parses it into a [`CommentType`], so a document with an unknown type
//! still travels through snapshots and reaches the CSV export.

use time::OffsetDateTime;
use uuid::Uuid;

/// Fixed key of the singleton board metadata document.
pub const BOARD_INFO_DOC: &str = "board_info";

// =============================================================================
// COMMENT TYPE
// =============================================================================

/// The three category buckets, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommentType {
    Impressive,
    LearnMore,
    Difficult,
}

impl CommentType {
    pub const ALL: [CommentType; 3] = [Self::Impressive, Self::LearnMore, Self::Difficult];

    /// Canonical stored value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Impressive => "impressive",
            Self::LearnMore => "learn_more",
            Self::Difficult => "difficult",
        }
    }

    /// Exact match against the canonical value or the legacy Korean label.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "impressive" | "인상깊은 부분" => Some(Self::Impressive),
            "learn_more" | "더 알아보고 싶은 부분" => Some(Self::LearnMore),
            "difficult" | "이해하기 어려웠던 부분" => Some(Self::Difficult),
            _ => None,
        }
    }
}

// =============================================================================
// COMMENT
// =============================================================================

/// One stored feedback item as it appears in a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: Uuid,
    pub name: String,
    /// Raw stored type. See [`CommentType::parse`].
    pub kind: String,
    pub comment: String,
    /// `None` until the store acknowledges the write.
    pub timestamp: Option<OffsetDateTime>,
    pub author_id: String,
}

impl Comment {
    #[must_use]
    pub fn comment_type(&self) -> Option<CommentType> {
        CommentType::parse(&self.kind)
    }

    /// Sort key where an absent timestamp counts as the epoch.
    #[must_use]
    pub fn timestamp_nanos(&self) -> i128 {
        self.timestamp.map_or(0, OffsetDateTime::unix_timestamp_nanos)
    }
}

/// A validated comment ready to be appended. The store assigns id and time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub name: String,
    pub kind: CommentType,
    pub comment: String,
    pub author_id: String,
}

// =============================================================================
// BOARD TITLE
// =============================================================================

/// The singleton board metadata document.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardInfo {
    pub title: Option<String>,
    pub updated_at: Option<OffsetDateTime>,
    pub updated_by: Option<String>,
    /// Any other fields on the document. Title writes never touch these.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Merge write for the title fields. `updated_at` is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleUpdate {
    pub title: String,
    pub updated_by: String,
}
