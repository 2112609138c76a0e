//! Board title service: the shared singleton title document.
//!
//! The title shows in two places on the page (editable input and read-only
//! heading); both always receive the same value. A blank candidate is never
//! written, so the displayed default can't be replaced by an empty title.

use crate::locale::Locale;
use crate::model::{BoardInfo, TitleUpdate};
use crate::services::identity::Identity;
use crate::store::{DocumentStore, StoreError};

/// Title to display for a board document, falling back to the default.
#[must_use]
pub fn display_title(info: Option<&BoardInfo>, locale: Locale) -> String {
    info.and_then(|info| info.title.as_deref())
        .filter(|title| !title.is_empty())
        .unwrap_or(locale.labels().default_title)
        .to_owned()
}

/// Trimmed candidate, or `None` if it is blank and must not be saved.
#[must_use]
pub fn normalize(candidate: &str) -> Option<&str> {
    let trimmed = candidate.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Merge a new title into the board document as `identity`.
///
/// Returns `Ok(None)` without touching the store when the candidate is
/// blank, `Ok(Some(title))` with the saved title otherwise.
///
/// # Errors
///
/// Returns the store's error unchanged.
pub async fn save_title(
    store: &dyn DocumentStore,
    identity: &Identity,
    candidate: &str,
) -> Result<Option<String>, StoreError> {
    let Some(title) = normalize(candidate) else {
        return Ok(None);
    };
    store
        .merge_title(TitleUpdate { title: title.to_owned(), updated_by: identity.uid.clone() })
        .await?;
    Ok(Some(title.to_owned()))
}
