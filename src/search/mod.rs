//! Search layer facade.
//!
//! - **[`compose`]**: multi-signal query composition and index DSL rendering.
//! - **[`service`]**: request orchestration over the providers and index store.

pub mod compose;
pub mod service;
