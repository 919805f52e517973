//! Per-connection handler: handshake, origin check and event dispatch.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `hello` → authenticate the token → send `welcome`
//!   2. Attach an outbox and spawn the writer task that drains it
//!   3. Send the round snapshot
//!   4. Loop: receive client events → check origin → forward to the engine
//!
//! Everything the server sends after `welcome` goes through the outbox, so
//! direct replies and broadcasts reach the client in one order.

use std::sync::Arc;

use bingohall_engine::{Broadcaster, EngineError, Outbox};
use bingohall_protocol::{
    ClientEvent, Codec, ConnectionId, ProtocolError, Recipient, ServerEvent, error_code,
};
use bingohall_session::{Authenticator, Identity};
use bingohall_transport::{Connection, WebSocketConnection};

use crate::BingoError;
use crate::server::ServerState;

/// Drop guard that tells the engine the connection is gone.
///
/// Runs exactly once however the handler exits, including a panic. `Drop`
/// is synchronous, so the engine call goes out on a spawned task.
struct ConnectionGuard<A: Authenticator, C: Codec> {
    connection_id: ConnectionId,
    state: Arc<ServerState<A, C>>,
}

impl<A: Authenticator, C: Codec> Drop for ConnectionGuard<A, C> {
    fn drop(&mut self) {
        let connection_id = self.connection_id;
        self.state.broadcaster.detach(connection_id);
        let engine = self.state.engine.clone();
        tokio::spawn(async move {
            let _ = engine.disconnect(connection_id).await;
        });
    }
}

/// What the read loop should do after an event.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, C>>,
) -> Result<(), BingoError>
where
    A: Authenticator,
    C: Codec + Clone,
{
    let connection_id = conn.id();
    tracing::debug!(%connection_id, peer = %conn.peer_addr(), "handling new connection");

    // --- Step 1: Handshake ---
    let identity = match perform_handshake(&conn, &state).await {
        Ok(identity) => identity,
        Err(e) => {
            let _ = conn.close().await;
            return Err(e);
        }
    };
    let player_id = identity.player_id;
    tracing::info!(%connection_id, %player_id, "player authenticated");

    // --- Step 2: Outbox ---
    let conn = Arc::new(conn);
    let outbox = state.broadcaster.attach(connection_id);
    let _guard = ConnectionGuard {
        connection_id,
        state: Arc::clone(&state),
    };
    let writer = tokio::spawn(write_outbox(
        Arc::clone(&conn),
        outbox,
        state.codec.clone(),
    ));

    // --- Step 3: Snapshot ---
    let snapshot = state.engine.snapshot().await?;
    reply(&state, connection_id, snapshot.to_event());

    // --- Step 4: Event loop ---
    loop {
        let data = match tokio::time::timeout(state.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%player_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%player_id, "connection timed out");
                break;
            }
        };

        let event: ClientEvent = match state.codec.decode(&data) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(%player_id, error = %e, "rejected malformed frame");
                reply(
                    &state,
                    connection_id,
                    ServerEvent::error(error_code::BAD_REQUEST, format!("malformed frame: {e}")),
                );
                continue;
            }
        };

        if let Some(claimed) = event.claimed_player() {
            if claimed != player_id {
                tracing::warn!(
                    %player_id,
                    %claimed,
                    event = ?event,
                    "rejected frame acting for another player"
                );
                reply(
                    &state,
                    connection_id,
                    ServerEvent::error(
                        error_code::FORBIDDEN,
                        "player id does not match the authenticated player",
                    ),
                );
                continue;
            }
        }

        if dispatch(&state, connection_id, &identity, event).await? == Flow::Close {
            break;
        }
    }

    writer.abort();
    let _ = conn.close().await;
    // _guard drops here → detach + engine disconnect.
    Ok(())
}

/// Receives `hello`, authenticates it and answers with `welcome`.
///
/// Failures are reported to the client (`400` or `401`) before the error
/// is returned; the caller closes the connection.
async fn perform_handshake<A, C>(
    conn: &WebSocketConnection,
    state: &ServerState<A, C>,
) -> Result<Identity, BingoError>
where
    A: Authenticator,
    C: Codec,
{
    let data = match tokio::time::timeout(state.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before hello".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            send_direct(
                conn,
                &state.codec,
                &ServerEvent::error(error_code::BAD_REQUEST, "hello timed out"),
            )
            .await?;
            return Err(ProtocolError::InvalidMessage("hello timed out".into()).into());
        }
    };

    let token = match state.codec.decode::<ClientEvent>(&data) {
        Ok(ClientEvent::Hello { token }) => token,
        _ => {
            send_direct(
                conn,
                &state.codec,
                &ServerEvent::error(error_code::BAD_REQUEST, "expected hello"),
            )
            .await?;
            return Err(ProtocolError::InvalidMessage("first frame must be hello".into()).into());
        }
    };

    let identity = match state.auth.authenticate(&token).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(connection_id = %conn.id(), error = %e, "authentication failed");
            send_direct(
                conn,
                &state.codec,
                &ServerEvent::error(error_code::UNAUTHORIZED, "unauthorized"),
            )
            .await?;
            return Err(e.into());
        }
    };

    let welcome = ServerEvent::Welcome {
        player_id: identity.player_id,
        server_time: state.clock.now_millis(),
    };
    send_direct(conn, &state.codec, &welcome).await?;

    Ok(identity)
}

/// Forwards one client event to the engine.
async fn dispatch<A, C>(
    state: &ServerState<A, C>,
    connection_id: ConnectionId,
    identity: &Identity,
    event: ClientEvent,
) -> Result<Flow, BingoError>
where
    A: Authenticator,
    C: Codec,
{
    let player_id = identity.player_id;
    match event {
        ClientEvent::Hello { .. } => {
            reply(
                state,
                connection_id,
                ServerEvent::error(error_code::BAD_REQUEST, "already authenticated"),
            );
        }

        ClientEvent::RegisterPlayer { name } => {
            let name = if name.is_empty() {
                identity.name.clone()
            } else {
                name
            };
            let result = state
                .engine
                .register_player(connection_id, player_id, name)
                .await;
            report_failure(state, connection_id, result)?;
        }

        ClientEvent::JoinGame { .. } => {
            let result = state
                .engine
                .join(connection_id, player_id, identity.name.clone())
                .await;
            report_failure(state, connection_id, result)?;
        }

        ClientEvent::MarkNumber { number, .. } => {
            let outcome = state.engine.mark(player_id, number).await?;
            tracing::debug!(%player_id, number, ?outcome, "mark handled");
        }

        ClientEvent::CallNumber {} => {
            let number = state.engine.call_number().await?;
            tracing::info!(%player_id, ?number, "manual draw requested");
        }

        ClientEvent::StopRound {} => {
            let stopped = state.engine.stop_round().await?;
            tracing::info!(%player_id, stopped, "stop requested");
        }

        ClientEvent::Heartbeat { client_time } => {
            reply(
                state,
                connection_id,
                ServerEvent::HeartbeatAck {
                    client_time,
                    server_time: state.clock.now_millis(),
                },
            );
        }

        ClientEvent::Disconnect {} => {
            tracing::info!(%player_id, "client disconnected");
            return Ok(Flow::Close);
        }
    }

    Ok(Flow::Continue)
}

/// Turns a request/response failure into an `error` event for the caller.
/// Only a stopped engine ends the connection.
fn report_failure<A, C, T>(
    state: &ServerState<A, C>,
    connection_id: ConnectionId,
    result: Result<T, EngineError>,
) -> Result<(), BingoError>
where
    A: Authenticator,
    C: Codec,
{
    let Err(error) = result else {
        return Ok(());
    };
    let code = match &error {
        EngineError::Unavailable => return Err(BingoError::Engine(EngineError::Unavailable)),
        EngineError::PlayerNotFound(_) => error_code::NOT_FOUND,
        _ => {
            tracing::warn!(%connection_id, %error, "request failed");
            error_code::INTERNAL
        }
    };
    reply(state, connection_id, ServerEvent::error(code, error.to_string()));
    Ok(())
}

/// Queues an event for this connection only, behind anything already
/// queued for it.
fn reply<A: Authenticator, C: Codec>(
    state: &ServerState<A, C>,
    connection_id: ConnectionId,
    event: ServerEvent,
) {
    state
        .broadcaster
        .publish(Recipient::Connection(connection_id), event);
}

/// Sends an event straight to the socket. Only used before the outbox is
/// attached.
async fn send_direct(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    event: &ServerEvent,
) -> Result<(), BingoError> {
    let bytes = codec.encode(event)?;
    conn.send(&bytes).await?;
    Ok(())
}

/// Drains the outbox onto the socket until the outbox is detached or a
/// send fails.
async fn write_outbox<C: Codec>(conn: Arc<WebSocketConnection>, mut outbox: Outbox, codec: C) {
    let connection_id = conn.id();
    while let Some(event) = outbox.recv().await {
        let bytes = match codec.encode(&event) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%connection_id, event = event.name(), error = %e, "failed to encode event");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%connection_id, error = %e, "send failed, writer stopping");
            break;
        }
    }
}
