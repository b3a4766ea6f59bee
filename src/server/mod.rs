//! Chat server — membership, routing, broadcast.
//!
//! The server listens on a TCP port and coordinates the chat room.
//! Architecture: channel-based actor. A single loop owns all mutable
//! state ([`state::ServerState`]). Per-connection tasks perform framed
//! I/O and forward validated packets via an mpsc channel; outbound
//! frames are routed back through per-connection channels. Membership
//! events (accept, disconnect) are arms of the same loop, so the
//! roster always mirrors the set of live connections.

mod connection;
mod handler;
pub mod state;

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};

use bytes::Bytes;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::mpsc;

use connection::{DisconnectNotice, Packet};
use handler::Action;
use state::ServerState;

use crate::wire::message::{self, Body, Message, SERVER_ID, UserId};

/// Listen backlog for pending connections.
const LISTEN_BACKLOG: u32 = 10;

/// Server startup/runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind port {port}: {source}")]
    BindFailed {
        port: u16,
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the chat server until SIGTERM or SIGINT.
pub async fn run(port: u16) -> Result<(), ServerError> {
    let listener = bind(port)?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "server listening");
    serve(listener).await
}

/// Bind the listening socket with `SO_REUSEADDR` set.
fn bind(port: u16) -> Result<TcpListener, ServerError> {
    let bind_failed = |source| ServerError::BindFailed { port, source };
    let socket = TcpSocket::new_v4().map_err(bind_failed)?;
    socket.set_reuseaddr(true).map_err(bind_failed)?;
    socket
        .bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
        .map_err(bind_failed)?;
    socket.listen(LISTEN_BACKLOG).map_err(bind_failed)
}

/// The server loop: accept clients, dispatch packets, reconcile the
/// roster on disconnects.
async fn serve(listener: TcpListener) -> Result<(), ServerError> {
    let (packet_tx, mut packet_rx) = mpsc::unbounded_channel::<Packet>();
    let (disconnect_tx, mut disconnect_rx) = mpsc::unbounded_channel::<DisconnectNotice>();

    // Per-connection outbound channels, keyed by assigned id.
    let mut outbound: HashMap<UserId, mpsc::UnboundedSender<Bytes>> = HashMap::new();

    let mut state = ServerState::new();

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    loop {
        tokio::select! {
            // -- New connection --
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        accept_client(
                            stream,
                            addr,
                            &mut state,
                            &mut outbound,
                            &packet_tx,
                            &disconnect_tx,
                        );
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                }
            }

            // -- Validated packet from a connection task --
            Some(packet) = packet_rx.recv() => {
                tracing::debug!(sender = packet.sender, "handling packet");
                for action in handler::handle_packet(&mut state, &packet) {
                    execute(&outbound, action);
                }
            }

            // -- Connection closed --
            Some(notice) = disconnect_rx.recv() => {
                drop_client(notice.user_id, &mut state, &mut outbound);
            }

            // -- Shutdown signals --
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                tracing::info!("received SIGINT, shutting down");
                break;
            }
        }
    }

    tracing::info!("server stopped");
    Ok(())
}

/// Admit a new client: assign an id, announce it, send the welcome.
///
/// The USER_CONNECT broadcast goes out before the new connection is
/// registered, so it reaches existing members only; the welcome
/// snapshot then carries the full roster (the new user included) with
/// the assigned id in the header's `to` field.
fn accept_client(
    stream: TcpStream,
    addr: SocketAddr,
    state: &mut ServerState,
    outbound: &mut HashMap<UserId, mpsc::UnboundedSender<Bytes>>,
    packet_tx: &mpsc::UnboundedSender<Packet>,
    disconnect_tx: &mpsc::UnboundedSender<DisconnectNotice>,
) {
    let Some(user_id) = state.add_user() else {
        // Dropping the stream closes the socket; the remote sees an
        // immediate close.
        tracing::warn!(%addr, "roster full, rejecting connection");
        return;
    };
    tracing::info!(user_id, %addr, users = state.len(), "client connected");

    broadcast(
        outbound,
        &Message {
            from: SERVER_ID,
            to: SERVER_ID,
            body: Body::Connect {
                id: user_id,
                name: String::new(),
            },
        },
    );

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let welcome = Message {
        from: SERVER_ID,
        to: user_id,
        body: Body::ActiveUsers {
            users: state.snapshot(),
        },
    };
    match message::encode(&welcome) {
        // Queued before the task spawns, so the welcome is always the
        // first frame the client receives.
        Ok(frame) => {
            let _ = outbound_tx.send(frame);
        }
        Err(e) => tracing::error!(user_id, error = %e, "failed to encode welcome"),
    }
    outbound.insert(user_id, outbound_tx);

    connection::spawn_connection(
        stream,
        user_id,
        packet_tx.clone(),
        outbound_rx,
        disconnect_tx.clone(),
    );
}

/// Remove a departed client and announce it to the remaining members.
fn drop_client(
    user_id: UserId,
    state: &mut ServerState,
    outbound: &mut HashMap<UserId, mpsc::UnboundedSender<Bytes>>,
) {
    outbound.remove(&user_id);
    if state.remove_user(user_id) {
        tracing::info!(user_id, "client disconnected");
        broadcast(
            outbound,
            &Message {
                from: SERVER_ID,
                to: SERVER_ID,
                body: Body::Disconnect {
                    id: user_id,
                    name: String::new(),
                },
            },
        );
    }
}

/// Carry out one routing action from the handler.
fn execute(outbound: &HashMap<UserId, mpsc::UnboundedSender<Bytes>>, action: Action) {
    match action {
        Action::Send { to, message } => send_to(outbound, to, &message),
        Action::Broadcast { message } => broadcast(outbound, &message),
        Action::Forward { to, frame } => forward_to(outbound, to, frame),
        Action::ForwardAll { frame } => {
            for tx in outbound.values() {
                let _ = tx.send(frame.clone());
            }
        }
    }
}

fn send_to(
    outbound: &HashMap<UserId, mpsc::UnboundedSender<Bytes>>,
    to: UserId,
    message: &Message,
) {
    match message::encode(message) {
        Ok(frame) => forward_to(outbound, to, frame),
        Err(e) => tracing::error!(to, error = %e, "failed to encode outbound message"),
    }
}

/// Encode once; every recipient gets an identical byte stream.
fn broadcast(outbound: &HashMap<UserId, mpsc::UnboundedSender<Bytes>>, message: &Message) {
    match message::encode(message) {
        Ok(frame) => {
            for tx in outbound.values() {
                let _ = tx.send(frame.clone());
            }
        }
        Err(e) => tracing::error!(error = %e, "failed to encode broadcast"),
    }
}

fn forward_to(
    outbound: &HashMap<UserId, mpsc::UnboundedSender<Bytes>>,
    to: UserId,
    frame: Bytes,
) {
    match outbound.get(&to) {
        Some(tx) => {
            if tx.send(frame).is_err() {
                tracing::debug!(to, "recipient task already gone");
            }
        }
        None => tracing::debug!(to, "recipient not connected"),
    }
}
