//! Packet dispatch and routing decisions.
//!
//! Pure logic — no I/O. [`handle_packet`] takes a mutable reference to
//! [`ServerState`] and returns the routing actions the server loop must
//! carry out. Server-originated replies are built here; forwarded chat
//! reuses the sender's encoded bytes so every recipient sees an
//! identical frame.

use bytes::Bytes;

use crate::wire::message::{Body, Message, SERVER_ID, UserId};

use super::connection::Packet;
use super::state::ServerState;

/// A routing instruction produced by [`handle_packet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Encode and send a server-originated message to one user.
    Send { to: UserId, message: Message },
    /// Encode once and send a server-originated message to every
    /// roster member.
    Broadcast { message: Message },
    /// Forward already-encoded bytes to one user.
    Forward { to: UserId, frame: Bytes },
    /// Forward already-encoded bytes to every roster member.
    ForwardAll { frame: Bytes },
}

/// Dispatch one validated packet against the roster.
pub fn handle_packet(state: &mut ServerState, packet: &Packet) -> Vec<Action> {
    match &packet.message.body {
        // Echo with the payload unchanged, readdressed to the sender.
        Body::Ping { time } => vec![Action::Send {
            to: packet.sender,
            message: Message {
                from: SERVER_ID,
                to: packet.sender,
                body: Body::Ping { time: *time },
            },
        }],

        Body::SetName { name, .. } => handle_setname(state, packet.sender, name),

        // Request form: any client-sent ACTIVE_USERS gets the snapshot.
        Body::ActiveUsers { .. } => vec![Action::Send {
            to: packet.sender,
            message: Message {
                from: SERVER_ID,
                to: packet.sender,
                body: Body::ActiveUsers {
                    users: state.snapshot(),
                },
            },
        }],

        Body::Chat { .. } => {
            if packet.message.to == SERVER_ID {
                vec![Action::ForwardAll {
                    frame: packet.frame.clone(),
                }]
            } else {
                vec![Action::Forward {
                    to: packet.message.to,
                    frame: packet.frame.clone(),
                }]
            }
        }

        // Server-originated types are not routable when sent by a client.
        Body::Connect { .. } | Body::Disconnect { .. } | Body::Error { .. } => {
            tracing::warn!(
                sender = packet.sender,
                "dropping message type the server does not route"
            );
            vec![]
        }
    }
}

fn handle_setname(state: &mut ServerState, sender: UserId, name: &str) -> Vec<Action> {
    if !state.contains(sender) {
        tracing::warn!(sender, "setname from unknown sender");
        return vec![];
    }
    if state.name_taken(name) {
        tracing::debug!(sender, name, "requested username is taken");
        return vec![Action::Send {
            to: sender,
            message: Message {
                from: SERVER_ID,
                to: sender,
                body: Body::Error {
                    text: "Username already taken.".into(),
                },
            },
        }];
    }

    state.set_name(sender, name);
    vec![Action::Broadcast {
        message: Message {
            from: SERVER_ID,
            to: SERVER_ID,
            body: Body::SetName {
                id: sender,
                name: name.to_owned(),
            },
        },
    }]
}
