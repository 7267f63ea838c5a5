//! Hexlink server - authoritative online match coordination
//!
//! Each match id is bound to exactly one coordinator task that serializes
//! joins and moves, persists the record and pushes fresh snapshots to
//! every connected session.
//!
//! # Architecture
//!
//! - **Store**: keyed match records with TTL (in-memory or SQLite)
//! - **Coordinator**: per-match actor plus the registry addressing them
//! - **API**: REST routes and the realtime WebSocket channel
//!
//! # Example
//!
//! ```no_run
//! use hexlink_server::{Server, ServerConfig};
//!
//! # async fn example() -> Result<(), hexlink_server::ServeError> {
//! let server = Server::bind(ServerConfig::default()).await?;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod api;
mod config;
mod coordinator;
mod error;
mod server;
mod store;

// Crate-level exports - Configuration
pub use config::{ConfigError, ServerConfig, StoreConfig};

// Crate-level exports - Errors
pub use error::{MISSING_FIELDS, MatchError, PLAYER_ID_REQUIRED, StoreError};

// Crate-level exports - Storage
#[cfg(feature = "sqlite")]
pub use store::SqliteStore;
pub use store::{MatchStore, MemoryStore, open_store};

// Crate-level exports - Coordination
pub use coordinator::{Outbox, Registry, SessionHandle, SessionId};

// Crate-level exports - HTTP surface
pub use api::{ApiError, AppState, router, status_for};
pub use server::{ServeError, Server};
