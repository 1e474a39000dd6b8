//! Listener and shared server state

use crate::connection::handle_connection;
use crate::{Config, Error, Motd, Registry, Result, Router, Statistics};
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// State shared by every connection task
#[derive(Debug)]
pub struct ServerState {
    /// Server configuration
    pub config: Config,
    /// Nicknames and channels
    pub registry: Arc<Registry>,
    /// Outbound queues of live sessions
    pub router: Router,
    /// Message of the Day
    pub motd: Motd,
    /// Counters
    pub stats: Statistics,
    /// Start time reported in RPL_CREATED
    pub created: DateTime<Utc>,
}

impl ServerState {
    /// Build shared state from a validated configuration
    pub fn new(config: Config) -> Result<Self> {
        let motd = Motd::load(&config.server)?;
        if motd.is_empty() {
            info!("No MOTD configured");
        } else {
            debug!("Loaded MOTD ({} lines)", motd.line_count());
        }
        let registry = Arc::new(Registry::new());

        Ok(Self {
            router: Router::new(registry.clone()),
            registry,
            motd,
            stats: Statistics::new(),
            created: Utc::now(),
            config,
        })
    }
}

/// Chat server
#[derive(Debug, Clone)]
pub struct Server {
    state: Arc<ServerState>,
    shutdown: CancellationToken,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Result<Self> {
        // Validate configuration
        config.validate()?;

        let state = ServerState::new(config)?;
        info!("Server {} initialized", state.config.server.name);

        Ok(Self {
            state: Arc::new(state),
            shutdown: CancellationToken::new(),
        })
    }

    /// Get server configuration
    pub fn config(&self) -> &Config {
        &self.state.config
    }

    /// Shared state, for inspection
    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let address = self.state.config.connection.listen_address();
        self.bind_to(&address).await
    }

    /// Bind an explicit address, e.g. `127.0.0.1:0`
    pub async fn bind_to(&self, address: &str) -> Result<TcpListener> {
        TcpListener::bind(address)
            .await
            .map_err(|e| Error::Server(format!("Failed to bind {}: {}", address, e)))
    }

    /// Start the server on the configured address
    pub async fn start(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Accept connections until [`Server::shutdown`] is called
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local: SocketAddr = listener.local_addr()?;
        info!("Listening on {}", local);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Listener on {} shutting down", local);
                    self.log_statistics();
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
                        }

                        let state = self.state.clone();
                        let shutdown = self.shutdown.clone();
                        tokio::spawn(async move {
                            handle_connection(state, stream, addr, shutdown).await;
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection on {}: {}", local, e);
                        // Usually descriptor exhaustion; back off instead of spinning
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        }
    }

    fn log_statistics(&self) {
        let stats = self.state.stats.snapshot();
        info!(
            "Served {} connections over {}s ({} open, {} registered), {} messages, {} violations",
            stats.total_connections,
            stats.uptime_seconds,
            stats.current_connections,
            stats.registered_users,
            stats.messages_received,
            stats.violations
        );
        for (command, count) in self.state.stats.top_commands(5) {
            info!("  {}: {}", command, count);
        }
    }

    /// Stop accepting and close every session
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
