//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the configuration and the two faces of the selected backend:
//! the document store and the identity provider. Both point at the same
//! backend object so only identities that store issued can write to it.
//! Per-page state lives in [`crate::session::PageSession`], never here.

use std::sync::Arc;

use crate::config::Config;
use crate::services::identity::IdentityProvider;
use crate::store::DocumentStore;
use crate::store::memory::MemoryStore;
use crate::store::postgres::PgStore;

/// Shared application state. Clone is required by Axum; every field is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    #[must_use]
    pub fn with_memory(config: Config, store: Arc<MemoryStore>) -> Self {
        Self { config: Arc::new(config), store: store.clone(), identity: store }
    }

    #[must_use]
    pub fn with_postgres(config: Config, store: Arc<PgStore>) -> Self {
        Self { config: Arc::new(config), store: store.clone(), identity: store }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
