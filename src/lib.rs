//! Mini Cache - An embedded in-memory cache engine
//!
//! Stores typed values under generated keys with optional TTL expiration,
//! counts and records calls to named operations, and caches producer output
//! per resource with access counting. A thin HTTP wrapper lives in [`api`].
//!
//! ```ignore
//! let engine = Engine::new();
//! let key = engine.store(42i64, None).await?;
//! assert_eq!(engine.retrieve_int(&key).await?, Some(42));
//! println!("{}", engine.replay("store").await);
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod instrument;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{decode, Value};
pub use config::Config;
pub use engine::{Engine, EngineOptions, STORE_OPERATION};
pub use error::{CacheError, DecodeError, Result};
pub use instrument::{Outcome, Replay};
pub use tasks::{spawn_cleanup_task, CleanupHandle};
