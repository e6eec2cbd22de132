//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside the engine.
//!
//! # Tasks
//! - TTL Cleanup: Reclaims expired cache entries at configured intervals

mod cleanup;

pub use cleanup::{spawn_cleanup_task, spawn_cleanup_task_every, CleanupHandle};
