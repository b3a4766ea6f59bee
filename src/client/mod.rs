//! Chat client — handshake, server event dispatch, input interpretation.
//!
//! The client connects, waits up to ten seconds for the server's
//! ACTIVE_USERS welcome (adopting the header's `to` field as its own
//! id), then enters a loop that selects over the framed stream and the
//! UI input source. Server events drive the mirror roster
//! ([`state::ClientState`]); committed input lines become messages via
//! [`input::interpret_input`].

mod input;
pub mod state;

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use input::InputAction;
use state::{ClientState, UiEvent};

use crate::ui::{self, ChatUi, InputEvent, TerminalUi};
use crate::wire::codec::{CodecError, FrameCodec};
use crate::wire::message::{self, WireError};

/// How long to wait for the server's welcome.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Client error type.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("unable to connect to {host}:{port}: {source}")]
    ConnectFailed {
        host: String,
        port: u16,
        source: std::io::Error,
    },
    #[error("no greeting from server")]
    NoGreeting,
    #[error("incorrect greeting from server")]
    BadGreeting,
    #[error("server closed the connection")]
    Disconnected,
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
    #[error("transport error: {0}")]
    Codec(#[from] CodecError),
}

/// Run the chat client until the input source closes or the server
/// disconnects.
pub async fn run(host: &str, port: u16) -> Result<(), ClientError> {
    let stream =
        TcpStream::connect((host, port))
            .await
            .map_err(|source| ClientError::ConnectFailed {
                host: host.to_owned(),
                port,
                source,
            })?;
    let mut framed = Framed::new(stream, FrameCodec::new());
    tracing::info!(host, port, "connected, waiting for server greeting");

    // -- Handshake: first frame must be the ACTIVE_USERS welcome --
    let frame = match tokio::time::timeout(HANDSHAKE_TIMEOUT, framed.next()).await {
        Ok(Some(Ok(frame))) => frame,
        Ok(Some(Err(e))) => return Err(e.into()),
        Ok(None) => return Err(ClientError::NoGreeting),
        Err(_elapsed) => return Err(ClientError::NoGreeting),
    };
    let welcome = message::decode(&frame).map_err(|_| ClientError::BadGreeting)?;
    let mut state = ClientState::from_welcome(&welcome).ok_or(ClientError::BadGreeting)?;
    tracing::info!(id = state.id, "joined chat room");

    let mut chat_ui = TerminalUi::new();
    chat_ui.print_message(&format!("<Connected. Your id is {}>", state.id));
    chat_ui.update_user_display(state.roster());

    let mut input_rx = ui::input_events();

    // -- Main loop: server events + user input --
    loop {
        tokio::select! {
            frame = framed.next() => {
                match frame {
                    Some(Ok(raw)) => match message::decode(&raw) {
                        Ok(msg) => {
                            for event in state.apply(&msg, now_ms()) {
                                match event {
                                    UiEvent::Message(line) => chat_ui.print_message(&line),
                                    UiEvent::RosterChanged => {
                                        chat_ui.update_user_display(state.roster());
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            // Drop the frame, keep listening.
                            tracing::warn!(error = %e, "dropping malformed frame");
                        }
                    },
                    Some(Err(e)) => return Err(e.into()),
                    None => return Err(ClientError::Disconnected),
                }
            }
            event = input_rx.recv() => {
                match event {
                    Some(InputEvent::Line(line)) => {
                        match input::interpret_input(state.id, &line, now_ms()) {
                            InputAction::Send(msg) => {
                                framed.send(message::encode(&msg)?).await?;
                            }
                            InputAction::Notice(text) => chat_ui.print_message(&text),
                            InputAction::Ignore => {}
                        }
                    }
                    Some(InputEvent::Quit) | None => {
                        tracing::info!("input closed, leaving chat");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Millisecond wall clock, truncated to the wire's u32 ping stamp.
fn now_ms() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u32
}
