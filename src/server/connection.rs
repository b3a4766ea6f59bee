//! Per-connection task — framed I/O and packet validation.
//!
//! Each accepted client spawns a tokio task that:
//! 1. Wraps the socket in the length-prefixed frame codec.
//! 2. Decodes every inbound frame into a typed message; a malformed
//!    frame is logged and dropped while the connection stays open.
//! 3. Forwards validated packets to the server loop and drains the
//!    connection's outbound channel of pre-encoded frames.
//! 4. On disconnect, notifies the server loop for roster cleanup.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

use crate::wire::codec::{CodecError, FrameCodec};
use crate::wire::message::{self, Message, UserId};

/// A validated inbound message with its sender and original bytes.
///
/// `frame` is the encoded form exactly as received; chat forwarding
/// reuses it so recipients get a byte-identical copy.
#[derive(Debug)]
pub struct Packet {
    pub sender: UserId,
    pub message: Message,
    pub frame: Bytes,
}

/// Notification sent when a connection closes.
#[derive(Debug)]
pub struct DisconnectNotice {
    pub user_id: UserId,
}

/// Spawn a connection handler task for an accepted client.
///
/// The task runs until the client disconnects, the socket errors, or
/// the server loop drops the outbound sender. On exit a
/// [`DisconnectNotice`] is always sent for cleanup.
pub fn spawn_connection(
    stream: TcpStream,
    user_id: UserId,
    packet_tx: mpsc::UnboundedSender<Packet>,
    outbound_rx: mpsc::UnboundedReceiver<Bytes>,
    disconnect_tx: mpsc::UnboundedSender<DisconnectNotice>,
) {
    tokio::spawn(async move {
        if let Err(e) = handle_connection(stream, user_id, packet_tx, outbound_rx).await {
            tracing::debug!(user_id, error = %e, "connection closed");
        }
        let _ = disconnect_tx.send(DisconnectNotice { user_id });
    });
}

async fn handle_connection(
    stream: TcpStream,
    user_id: UserId,
    packet_tx: mpsc::UnboundedSender<Packet>,
    mut outbound_rx: mpsc::UnboundedReceiver<Bytes>,
) -> Result<(), CodecError> {
    let mut framed = Framed::new(stream, FrameCodec::new());

    loop {
        tokio::select! {
            frame = framed.next() => {
                let raw = match frame {
                    Some(Ok(raw)) => raw,
                    Some(Err(e)) => return Err(e),
                    None => return Ok(()), // Clean disconnect.
                };
                match message::decode(&raw) {
                    Ok(msg) => {
                        let packet = Packet {
                            sender: user_id,
                            message: msg,
                            frame: raw.freeze(),
                        };
                        if packet_tx.send(packet).is_err() {
                            // Server loop is gone — shut down.
                            return Ok(());
                        }
                    }
                    Err(e) => {
                        // Drop the frame, keep the connection.
                        tracing::warn!(user_id, error = %e, "dropping malformed frame");
                    }
                }
            }
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(frame) => framed.send(frame).await?,
                    None => return Ok(()), // Server loop dropped our sender.
                }
            }
        }
    }
}
