//! Comment service: submit validation, append, and snapshot partitioning.
//!
//! DESIGN
//! ======
//! Submitting is split so the session can report progress around the write:
//! [`validate`] runs before anything else and never touches the store,
//! [`SubmitGuard`] keeps one submit in flight per page, and [`append`]
//! performs the actual write.
//!
//! Snapshots are partitioned client-side: the store pushes the entire
//! collection and [`CategoryBuckets::partition`] sorts it into the three
//! display buckets. Nothing is diffed; every push rebuilds every bucket.

use std::sync::atomic::{AtomicBool, Ordering};

use uuid::Uuid;

use crate::frame::{ErrorCode, Frame};
use crate::model::{Comment, CommentType, NewComment};
use crate::services::identity::Identity;
use crate::store::{DocumentStore, StoreError};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("name, type, and comment are all required")]
    MissingFields,
    #[error("unknown comment type: {0}")]
    UnknownType(String),
    #[error("a submission is already in progress")]
    Busy,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for SubmitError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingFields => "E_MISSING_FIELDS",
            Self::UnknownType(_) => "E_UNKNOWN_TYPE",
            Self::Busy => "E_SUBMIT_BUSY",
            Self::Store(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Busy => true,
            Self::Store(e) => e.retryable(),
            Self::MissingFields | Self::UnknownType(_) => false,
        }
    }
}

// =============================================================================
// SUBMIT
// =============================================================================

/// Raw form fields as the page sent them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitForm {
    pub name: String,
    /// Selected radio value; empty when nothing is selected.
    pub kind: String,
    pub comment: String,
}

impl SubmitForm {
    #[must_use]
    pub fn from_frame(req: &Frame) -> Self {
        Self {
            name: req.str_field("name").to_owned(),
            kind: req.str_field("type").to_owned(),
            comment: req.str_field("comment").to_owned(),
        }
    }
}

/// A validated submission still missing its author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub name: String,
    pub kind: CommentType,
    pub comment: String,
}

impl Draft {
    #[must_use]
    pub fn authored_by(self, identity: &Identity) -> NewComment {
        NewComment { name: self.name, kind: self.kind, comment: self.comment, author_id: identity.uid.clone() }
    }
}

/// Trim and check every field.
///
/// # Errors
///
/// [`SubmitError::MissingFields`] if any field is blank after trimming,
/// [`SubmitError::UnknownType`] if the type is not a known category.
pub fn validate(form: &SubmitForm) -> Result<Draft, SubmitError> {
    let name = form.name.trim();
    let kind = form.kind.trim();
    let comment = form.comment.trim();

    if name.is_empty() || kind.is_empty() || comment.is_empty() {
        return Err(SubmitError::MissingFields);
    }
    let Some(kind) = CommentType::parse(kind) else {
        return Err(SubmitError::UnknownType(kind.to_owned()));
    };

    Ok(Draft { name: name.to_owned(), kind, comment: comment.to_owned() })
}

/// Re-entrancy guard for the submit control. Released on drop.
#[derive(Debug)]
pub struct SubmitGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SubmitGuard<'a> {
    /// Claim the flag, or `None` if a submit is already running.
    #[must_use]
    pub fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Append a validated comment as `identity`.
///
/// # Errors
///
/// Returns the store's error unchanged. No retry is attempted.
pub async fn append(store: &dyn DocumentStore, identity: &Identity, draft: Draft) -> Result<Uuid, SubmitError> {
    let id = store.add_comment(draft.authored_by(identity)).await?;
    Ok(id)
}

// =============================================================================
// PARTITION
// =============================================================================

/// The three display buckets, each sorted newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryBuckets {
    pub impressive: Vec<Comment>,
    pub learn_more: Vec<Comment>,
    pub difficult: Vec<Comment>,
}

impl CategoryBuckets {
    /// Split a snapshot by exact type match. Unknown types land nowhere.
    #[must_use]
    pub fn partition(snapshot: &[Comment]) -> Self {
        let mut buckets = Self::default();
        for comment in snapshot {
            if let Some(kind) = comment.comment_type() {
                buckets.bucket_mut(kind).push(comment.clone());
            }
        }
        for kind in CommentType::ALL {
            sort_newest_first(buckets.bucket_mut(kind));
        }
        buckets
    }

    #[must_use]
    pub fn bucket(&self, kind: CommentType) -> &[Comment] {
        match kind {
            CommentType::Impressive => &self.impressive,
            CommentType::LearnMore => &self.learn_more,
            CommentType::Difficult => &self.difficult,
        }
    }

    fn bucket_mut(&mut self, kind: CommentType) -> &mut Vec<Comment> {
        match kind {
            CommentType::Impressive => &mut self.impressive,
            CommentType::LearnMore => &mut self.learn_more,
            CommentType::Difficult => &mut self.difficult,
        }
    }
}

/// Descending by timestamp (absent = epoch), then ascending id.
pub fn sort_newest_first(comments: &mut [Comment]) {
    comments.sort_by(|a, b| {
        b.timestamp_nanos()
            .cmp(&a.timestamp_nanos())
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
#[path = "comments_test.rs"]
mod tests;
