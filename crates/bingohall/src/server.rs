//! `BingoServer` builder and accept loop.
//!
//! This is the entry point for running a Bingo Hall server. It ties the
//! layers together: transport → protocol → session → engine.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bingohall_engine::{ChannelBroadcaster, EngineConfig, EngineHandle, Store, spawn_engine};
use bingohall_protocol::{Codec, JsonCodec};
use bingohall_session::Authenticator;
use bingohall_tick::{Clock, SystemClock};
use bingohall_transport::{Transport, WebSocketTransport};

use crate::BingoError;
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task.
///
/// Everything in here is either immutable or does its own
/// synchronization, so handlers share it through a plain `Arc`.
pub(crate) struct ServerState<A: Authenticator, C: Codec> {
    pub(crate) engine: EngineHandle,
    pub(crate) broadcaster: Arc<ChannelBroadcaster>,
    pub(crate) auth: A,
    pub(crate) codec: C,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) handshake_timeout: Duration,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a Bingo Hall server.
///
/// # Example
///
/// ```rust,ignore
/// use bingohall::prelude::*;
///
/// let server = ServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .engine_config(EngineConfig::default().with_draw_interval(Duration::from_secs(3)))
///     .build(TelegramAuthenticator::new(&bot_token), Arc::new(MemoryStore::new()))
///     .await?;
/// server.run().await
/// ```
pub struct ServerBuilder {
    bind_addr: String,
    engine_config: EngineConfig,
    handshake_timeout: Duration,
    idle_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl ServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            engine_config: EngineConfig::default(),
            handshake_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    /// How long a new connection has to send `hello`.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// How long a connection may stay silent before it is dropped.
    /// Clients keep it alive with `heartbeat`.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Wall clock for timestamps and session ages.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Binds the listener, starts the engine and returns the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    ///
    /// # Errors
    /// The address can't be bound, or the engine can't load its round.
    pub async fn build<A: Authenticator, S: Store>(
        self,
        auth: A,
        store: Arc<S>,
    ) -> Result<BingoServer<A, JsonCodec>, BingoError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let broadcaster = Arc::new(ChannelBroadcaster::new());
        let engine = spawn_engine(
            self.engine_config,
            store,
            Arc::clone(&broadcaster),
            Arc::clone(&self.clock),
        )
        .await?;

        let state = Arc::new(ServerState {
            engine,
            broadcaster,
            auth,
            codec: JsonCodec,
            clock: self.clock,
            handshake_timeout: self.handshake_timeout,
            idle_timeout: self.idle_timeout,
        });

        Ok(BingoServer { transport, state })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A Bingo Hall server, bound and with its engine running.
///
/// Built with [`ServerBuilder`]. Call [`run()`](Self::run) to start
/// accepting connections.
pub struct BingoServer<A: Authenticator, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, C>>,
}

impl<A, C> BingoServer<A, C>
where
    A: Authenticator,
    C: Codec + Clone,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle to the engine, for host tooling and tests.
    pub fn engine(&self) -> EngineHandle {
        self.state.engine.clone()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), BingoError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs the accept loop until `shutdown` resolves, then stops the
    /// engine so queued writes reach the store.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> Result<(), BingoError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Bingo Hall server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        self.state.engine.shutdown().await?;
        Ok(())
    }
}
