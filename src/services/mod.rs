//! Domain services used by the page session.
//!
//! ARCHITECTURE
//! ============
//! Service modules own validation, ordering, rendering, and export rules so
//! the session can stay focused on sequencing and frame translation.

pub mod comments;
pub mod export;
pub mod identity;
pub mod render;
pub mod title;
pub mod toast;
