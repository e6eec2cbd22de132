//! API Module
//!
//! Thin HTTP wrapper exposing the cache engine as a REST API.
//!
//! # Endpoints
//! - `POST /store` - Store a value under a generated key
//! - `GET /get/:key` - Retrieve a value by key
//! - `DELETE /del/:key` - Delete a key
//! - `POST /flush` - Remove every entry
//! - `GET /replay/:name` - Call count and history of an operation
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
