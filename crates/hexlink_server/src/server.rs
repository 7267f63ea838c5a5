//! Listener setup and the serve loop.

use crate::api::{AppState, router};
use crate::config::{ConfigError, ServerConfig};
use crate::coordinator::Registry;
use crate::error::StoreError;
use crate::store::{MatchStore, open_store};
use axum::Router;
use derive_more::{Display, Error, From};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, instrument};

/// Failure to start or run the server.
#[derive(Debug, Display, Error, From)]
pub enum ServeError {
    /// Socket bind or accept failure.
    #[display("I/O error: {}", _0)]
    Io(std::io::Error),
    /// The store could not be opened.
    #[display("{}", _0)]
    Store(StoreError),
    /// Invalid configuration.
    #[display("{}", _0)]
    Config(ConfigError),
}

/// A bound, not yet running, match server.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    state: AppState,
}

impl Server {
    /// Opens the configured store and binds the listener.
    #[instrument(skip(config), fields(host = %config.host(), port = config.port()))]
    pub async fn bind(config: ServerConfig) -> Result<Self, ServeError> {
        config.validate()?;
        let store = open_store(&config)?;
        Self::bind_with_store(config, store).await
    }

    /// Binds the listener over an already opened store.
    pub async fn bind_with_store(config: ServerConfig, store: Arc<dyn MatchStore>) -> Result<Self, ServeError> {
        let listener = TcpListener::bind((config.host().as_str(), *config.port())).await?;
        let addr = listener.local_addr()?;
        // Port 0 resolves here; share links must carry the real one.
        let config = config.with_port(addr.port());

        let registry = Registry::new(store, &config);
        let state = AppState::new(registry, config.share_origin());
        info!(%addr, origin = %config.share_origin(), "Match server bound");
        Ok(Self { listener, state })
    }

    /// Address the server listens on.
    pub fn local_addr(&self) -> Result<SocketAddr, ServeError> {
        Ok(self.listener.local_addr()?)
    }

    /// The router this server serves.
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Serves until the process ends.
    pub async fn run(self) -> Result<(), ServeError> {
        self.run_until(std::future::pending()).await
    }

    /// Serves until `shutdown` resolves, then drains open connections.
    pub async fn run_until(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<(), ServeError> {
        let app = self.router();
        info!(addr = ?self.listener.local_addr().ok(), "Match server listening");
        axum::serve(self.listener, app).with_graceful_shutdown(shutdown).await?;
        info!("Match server stopped");
        Ok(())
    }
}
