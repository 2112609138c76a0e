//! Identity resolution: who is this page session?
//!
//! DESIGN
//! ======
//! Every page session resolves exactly one identity before it may write.
//! Preference order:
//! 1. A session token the provider issued earlier (page reconnect).
//! 2. A bootstrap token, exchanged for its pre-provisioned identity.
//! 3. Anonymous sign-in.
//!
//! If the provider cannot produce an identity at all, the session falls
//! back to a locally synthesized `Anon-{uuid}` and is marked degraded. The
//! store only accepts writes from identities the provider issued, so
//! degraded sessions can read but their writes fail downstream.
//!
//! The result is published through [`IdentityCell`], a one-shot cell that
//! every write path awaits.

use std::fmt::Write;

use rand::Rng;
use rand::distr::Alphanumeric;
use tokio::sync::{Notify, OnceCell};
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::ErrorCode;

const UID_LEN: usize = 28;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("bootstrap token rejected")]
    InvalidToken,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            e @ (sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed) => Self::Unavailable(e.to_string()),
            e => Self::Database(e),
        }
    }
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidToken => "E_AUTH_INVALID_TOKEN",
            Self::Unavailable(_) => "E_AUTH_UNAVAILABLE",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        !matches!(self, Self::InvalidToken)
    }
}

/// Successful provider sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignIn {
    pub uid: String,
    /// Opaque token the page can present on reconnect.
    pub session_token: String,
}

/// The identity a page session writes as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    /// Set when the uid was synthesized locally after provider failure.
    pub degraded: bool,
    /// Freshly issued session token, if this resolution created one.
    pub session_token: Option<String>,
}

/// Provider of identities. Implemented by each store backend.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Look up the identity behind a previously issued session token.
    async fn current_session(&self, session_token: &str) -> Result<Option<String>, AuthError>;

    /// Create a new anonymous identity.
    async fn sign_in_anonymously(&self) -> Result<SignIn, AuthError>;

    /// Exchange a pre-provisioned bootstrap token for its identity.
    async fn sign_in_with_token(&self, token: &str) -> Result<SignIn, AuthError>;
}

// =============================================================================
// IDENTITY CELL
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("identity already resolved")]
pub struct AlreadyResolved;

/// One-shot identity slot. Empty until resolution completes, then fixed.
#[derive(Debug, Default)]
pub struct IdentityCell {
    cell: OnceCell<Identity>,
    notify: Notify,
}

impl IdentityCell {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Complete the cell. Only the first call succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`AlreadyResolved`] if the cell was already completed.
    pub fn set(&self, identity: Identity) -> Result<(), AlreadyResolved> {
        self.cell.set(identity).map_err(|_| AlreadyResolved)?;
        self.notify.notify_waiters();
        Ok(())
    }

    /// The resolved identity, if resolution has completed.
    #[must_use]
    pub fn get(&self) -> Option<&Identity> {
        self.cell.get()
    }

    /// Wait for resolution. Returns immediately once the cell is set.
    pub async fn wait(&self) -> Identity {
        loop {
            // Register before checking so a concurrent `set` can't slip between.
            let notified = self.notify.notified();
            if let Some(identity) = self.cell.get() {
                return identity.clone();
            }
            notified.await;
        }
    }
}

// =============================================================================
// RESOLUTION
// =============================================================================

/// Resolve the identity for a new page session. Never fails: provider
/// failures degrade to a synthesized identity.
pub async fn resolve(
    provider: &dyn IdentityProvider,
    session_token: Option<&str>,
    bootstrap_token: Option<&str>,
) -> Identity {
    if let Some(token) = session_token.filter(|t| !t.is_empty()) {
        match provider.current_session(token).await {
            Ok(Some(uid)) => {
                info!(%uid, "identity: resumed session");
                return Identity { uid, degraded: false, session_token: None };
            }
            Ok(None) => info!("identity: session token unknown or expired"),
            Err(e) => warn!(error = %e, "identity: session lookup failed"),
        }
    }

    if let Some(token) = bootstrap_token.filter(|t| !t.is_empty()) {
        match provider.sign_in_with_token(token).await {
            Ok(sign_in) => {
                info!(uid = %sign_in.uid, "identity: signed in with bootstrap token");
                return from_sign_in(sign_in);
            }
            Err(e) => warn!(error = %e, "identity: bootstrap sign-in failed"),
        }
    }

    match provider.sign_in_anonymously().await {
        Ok(sign_in) => {
            info!(uid = %sign_in.uid, "identity: signed in anonymously");
            from_sign_in(sign_in)
        }
        Err(e) => {
            let uid = synthesize_uid();
            warn!(error = %e, %uid, "identity: provider failed, using local identity");
            Identity { uid, degraded: true, session_token: None }
        }
    }
}

fn from_sign_in(sign_in: SignIn) -> Identity {
    Identity { uid: sign_in.uid, degraded: false, session_token: Some(sign_in.session_token) }
}

/// Locally generated identifier for degraded sessions.
#[must_use]
pub fn synthesize_uid() -> String {
    format!("Anon-{}", Uuid::new_v4())
}

// =============================================================================
// TOKENS
// =============================================================================

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex session token.
#[must_use]
pub fn generate_session_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Generate a provider uid: 28 alphanumeric characters.
#[must_use]
pub fn generate_uid() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(UID_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
