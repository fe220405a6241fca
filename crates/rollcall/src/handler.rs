//! Per-connection handler: token check, then event routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Read the token from the handshake query → verify → `Identity`
//!   2. Register with the broadcaster
//!   3. Loop: inbound frames go to the router, broadcasts go out to the
//!      socket, until the client leaves, a terminal error, or idle timeout

use std::sync::Arc;

use rollcall_attendance::{AttendanceError, Outcome};
use rollcall_protocol::{Codec, InboundFrame, ServerEvent};
use rollcall_session::{AuthError, Authenticator, Identity};
use rollcall_store::{AttendanceStore, RosterStore};
use rollcall_transport::{query_values, Connection, ConnectionId, WebSocketConnection};
use tokio::time::Instant;

use crate::server::ServerState;
use crate::{Broadcaster, RollCallError};

const UNAUTHORIZED: &str = "unauthorized or invalid token";

/// Unregisters a connection from the broadcaster when the handler exits.
struct BroadcastGuard {
    conn_id: ConnectionId,
    broadcaster: Arc<Broadcaster>,
}

impl Drop for BroadcastGuard {
    fn drop(&mut self) {
        self.broadcaster.unregister(self.conn_id);
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, S, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, S, C>>,
) -> Result<(), RollCallError>
where
    A: Authenticator,
    S: RosterStore + AttendanceStore,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let identity = match authenticate(&conn, &state).await {
        Ok(identity) => identity,
        Err(e) => {
            let message = match e {
                AuthError::MissingToken => e.to_string(),
                _ => UNAUTHORIZED.to_string(),
            };
            send_event(&conn, &state.codec, &ServerEvent::error(message)).await?;
            let _ = conn.close().await;
            return Err(e.into());
        }
    };
    tracing::info!(%conn_id, user_id = %identity.user_id, role = %identity.role, "connection authenticated");

    let mut outbound = state.broadcaster.register(conn_id);
    let _guard = BroadcastGuard {
        conn_id,
        broadcaster: Arc::clone(&state.broadcaster),
    };

    let idle_timeout = state.config.idle_timeout;
    let mut deadline = idle_timeout.map(|d| Instant::now() + d);

    loop {
        tokio::select! {
            received = conn.recv() => {
                let data = match received {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%conn_id, "connection closed");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                };
                deadline = idle_timeout.map(|d| Instant::now() + d);
                if !handle_frame(&conn, &state, &identity, &data).await? {
                    break;
                }
            }
            Some(frame) = outbound.recv() => {
                conn.send(&frame).await?;
            }
            () = idle(deadline) => {
                tracing::info!(%conn_id, "connection idle, closing");
                break;
            }
        }
    }

    let _ = conn.close().await;
    // _guard drops here and unregisters the connection.
    Ok(())
}

/// Reads exactly one token from the handshake query and verifies it.
async fn authenticate<A, S, C>(
    conn: &WebSocketConnection,
    state: &ServerState<A, S, C>,
) -> Result<Identity, AuthError>
where
    A: Authenticator,
{
    let tokens = query_values(conn.handshake_query(), &state.config.token_param);
    let [token] = tokens.as_slice() else {
        tracing::debug!(conn_id = %conn.id(), count = tokens.len(), "token missing or repeated");
        return Err(AuthError::MissingToken);
    };
    state.auth.authenticate(token).await
}

/// Routes one inbound frame. Returns `false` if the connection must close.
async fn handle_frame<A, S, C>(
    conn: &WebSocketConnection,
    state: &ServerState<A, S, C>,
    identity: &Identity,
    data: &[u8],
) -> Result<bool, RollCallError>
where
    A: Authenticator,
    S: RosterStore + AttendanceStore,
    C: Codec,
{
    let frame: InboundFrame = match state.codec.decode(data) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(user_id = %identity.user_id, error = %e, "undecodable frame ignored");
            return Ok(true);
        }
    };

    match state.router.route_frame(identity, frame).await {
        Ok(Outcome::Published(event)) => {
            tracing::trace!(user_id = %identity.user_id, event = ?event, "event published");
            Ok(true)
        }
        Ok(Outcome::Reply(event)) => {
            send_event(conn, &state.codec, &event).await?;
            Ok(true)
        }
        Ok(Outcome::Ignored) => Ok(true),
        Err(e) => {
            log_rejection(identity, &e);
            send_event(conn, &state.codec, &ServerEvent::error(e.client_message())).await?;
            Ok(!e.is_terminal())
        }
    }
}

fn log_rejection(identity: &Identity, e: &AttendanceError) {
    match e {
        AttendanceError::Persistence(_) | AttendanceError::Storage(_) => {
            tracing::warn!(user_id = %identity.user_id, error = %e, "event failed");
        }
        _ => {
            tracing::debug!(user_id = %identity.user_id, error = %e, "event rejected");
        }
    }
}

async fn send_event(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    event: &ServerEvent,
) -> Result<(), RollCallError> {
    let bytes = codec.encode(event)?;
    conn.send(&bytes).await?;
    Ok(())
}

/// Resolves at `deadline`, or never if there is none.
async fn idle(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
