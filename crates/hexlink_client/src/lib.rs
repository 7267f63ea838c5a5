//! Hexlink client - keeps a local view of an online match in step with
//! the server
//!
//! # Architecture
//!
//! - **API**: typed REST calls against `/api/games`
//! - **Channel**: realtime link with generation-tagged events
//! - **Agent**: single task owning the local view, reconnecting with
//!   exponential backoff and falling back to REST when the channel is down
//! - **Local store**: self-issued identity and the tracked-match directory
//!
//! # Example
//!
//! ```no_run
//! use hexlink_client::{ClientConfig, SyncAgent};
//!
//! # async fn example() -> Result<(), hexlink_client::ClientError> {
//! let agent = SyncAgent::spawn(&ClientConfig::default());
//! let created = agent.create("my-player-id").await?;
//! println!("Share {}", created.share_link);
//! agent.make_move(5, 5).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod agent;
mod api;
mod backoff;
mod channel;
mod config;
mod directory;
mod error;
mod local_store;
mod overview;

// Crate-level exports - Configuration and errors
pub use config::ClientConfig;
pub use error::ClientError;

// Crate-level exports - Server access
pub use api::ApiClient;
pub use backoff::Backoff;

// Crate-level exports - Sync agent
pub use agent::{Connection, LocalView, Mode, SyncAgent, SyncHandle};

// Crate-level exports - Local bookkeeping
pub use directory::{MAX_TRACKED_MATCHES, MatchDirectory, TRACKED_RETENTION_DAYS, TrackedMatch};
pub use local_store::LocalStore;
pub use overview::{MatchSummary, load_overview, resume_match};
