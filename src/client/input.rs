//! Input interpretation — committed lines become messages or notices.
//!
//! A line starting with `/` is a command; everything else is chat,
//! broadcast to the whole room. Unrecognized commands are dropped
//! without a notice.

use crate::wire::message::{
    Body, MAX_CHATMSG_LEN, MAX_USERNAME_LEN, Message, SERVER_ID, UserId,
};

/// What the run loop should do with one committed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    Send(Message),
    Notice(String),
    Ignore,
}

/// Interpret one committed line. `now_ms` stamps outgoing pings.
pub fn interpret_input(self_id: UserId, line: &str, now_ms: u32) -> InputAction {
    // The wire format cannot carry a NUL; anything after one is cut.
    let line = line.split('\0').next().unwrap_or("");

    let Some(command) = line.strip_prefix('/') else {
        return InputAction::Send(Message {
            from: self_id,
            to: SERVER_ID,
            body: Body::Chat {
                text: truncate(line, MAX_CHATMSG_LEN).to_owned(),
            },
        });
    };

    if command.starts_with("ping") {
        InputAction::Send(Message {
            from: self_id,
            to: SERVER_ID,
            body: Body::Ping { time: now_ms },
        })
    } else if let Some(name) = command.strip_prefix("setname ") {
        if name.len() > MAX_USERNAME_LEN {
            InputAction::Notice("Error: Desired username is too long.".into())
        } else {
            InputAction::Send(Message {
                from: self_id,
                to: SERVER_ID,
                body: Body::SetName {
                    id: self_id,
                    name: name.to_owned(),
                },
            })
        }
    } else {
        InputAction::Ignore
    }
}

/// Truncate to at most `max` bytes, never splitting a UTF-8 sequence.
fn truncate(line: &str, max: usize) -> &str {
    if line.len() <= max {
        return line;
    }
    let mut end = max;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}
