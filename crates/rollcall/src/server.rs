//! `RollCallServer` builder and server loop.
//!
//! This is the entry point for running a roll-call server. It ties the
//! layers together: transport → gateway → attendance → store.

use std::sync::Arc;

use rollcall_attendance::{EventRouter, SessionControl, SessionStore};
use rollcall_protocol::{Codec, JsonCodec};
use rollcall_session::Authenticator;
use rollcall_store::{AttendanceStore, RosterStore};
use rollcall_transport::{Transport, WebSocketTransport};

use crate::broadcast::Fanout;
use crate::handler::handle_connection;
use crate::{Broadcaster, RollCallError, ServerConfig};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<A, S, C> {
    pub(crate) auth: A,
    pub(crate) router: EventRouter<S>,
    pub(crate) broadcaster: Arc<Broadcaster>,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a roll-call server.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rollcall::prelude::*;
///
/// # async fn run() -> Result<(), RollCallError> {
/// let store = Arc::new(SqliteStore::open("rollcall.db")?);
/// let server = RollCallServerBuilder::new()
///     .bind("0.0.0.0:3003")
///     .build(JwtAuthenticator::new(b"secret"), store)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct RollCallServerBuilder {
    bind_addr: String,
    config: ServerConfig,
}

impl RollCallServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3003".to_string(),
            config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the gateway configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and assembles the shared state.
    ///
    /// The server starts `Idle`; use [`RollCallServer::control`] to open a
    /// session.
    pub async fn build<A, S>(
        self,
        auth: A,
        store: Arc<S>,
    ) -> Result<RollCallServer<A, S, JsonCodec>, RollCallError>
    where
        A: Authenticator,
        S: RosterStore + AttendanceStore,
    {
        let transport = WebSocketTransport::bind(&self.bind_addr)
            .await?
            .with_path(self.config.ws_path.clone());

        let sessions = Arc::new(SessionStore::new());
        let control = SessionControl::new(Arc::clone(&sessions), Arc::clone(&store));
        let broadcaster = Arc::new(Broadcaster::new());
        let fanout = Arc::new(Fanout::new(Arc::clone(&broadcaster), JsonCodec));
        let state = Arc::new(ServerState {
            auth,
            router: EventRouter::new(sessions, store, fanout),
            broadcaster,
            codec: JsonCodec,
            config: self.config,
        });

        Ok(RollCallServer {
            transport,
            state,
            control,
        })
    }
}

impl Default for RollCallServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A roll-call server bound to its listening socket.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RollCallServer<A, S, C> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, S, C>>,
    control: SessionControl<S>,
}

impl<A, S, C> RollCallServer<A, S, C>
where
    A: Authenticator,
    S: RosterStore + AttendanceStore,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle for opening sessions. Stays valid after [`run()`](Self::run)
    /// takes the server.
    pub fn control(&self) -> SessionControl<S> {
        self.control.clone()
    }

    /// Runs the accept loop.
    ///
    /// Each accepted connection gets its own task. Runs until the process
    /// is terminated.
    pub async fn run(mut self) -> Result<(), RollCallError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "rollcall server running");

        loop {
            match self.transport.accept().await {
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
            }
        }
    }
}
