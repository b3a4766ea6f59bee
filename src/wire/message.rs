//! Typed chat messages and their byte-level codec.
//!
//! Every message starts with a 7-byte header:
//!
//! | offset | size | field | encoding |
//! |--------|------|-------|----------|
//! | 0      | 1    | type  | u8       |
//! | 1      | 2    | len   | big-endian u16, total bytes including header |
//! | 3      | 2    | from  | big-endian u16 |
//! | 5      | 2    | to    | big-endian u16 |
//!
//! Integers are big-endian on the wire, host-endian in memory. Strings are
//! NUL-terminated and bounded per field; the terminator is part of the
//! payload. [`decode`] accepts exactly one message whose declared length
//! matches the slice, and never reads past it.

use bytes::{BufMut, Bytes, BytesMut};

/// A peer identity. `0` is reserved for the server.
pub type UserId = u16;

/// The server's id, doubling as the broadcast destination.
pub const SERVER_ID: UserId = 0;

/// Maximum username length in bytes, excluding the NUL terminator.
pub const MAX_USERNAME_LEN: usize = 16;

/// Maximum chat/error text length in bytes, excluding the NUL terminator.
pub const MAX_CHATMSG_LEN: usize = 255;

/// Maximum number of users the roster (and an ACTIVE_USERS payload) holds.
pub const MAX_CLIENTS: usize = 255;

/// Size of the fixed message header.
pub const HEADER_LEN: usize = 7;

const TYPE_PING: u8 = 0;
const TYPE_USER_SETNAME: u8 = 1;
const TYPE_USER_CONNECT: u8 = 2;
const TYPE_USER_DISCONNECT: u8 = 3;
const TYPE_ACTIVE_USERS: u8 = 4;
const TYPE_CHAT: u8 = 5;
const TYPE_ERROR: u8 = 6;

/// Malformed-message conditions, raised by both [`encode`] and [`decode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("message truncated")]
    Truncated,
    #[error("unknown message type {0}")]
    UnknownType(u8),
    #[error("declared length {declared} does not match buffer length {actual}")]
    LengthMismatch { declared: u16, actual: usize },
    #[error("string missing NUL terminator within {max} bytes")]
    UnterminatedString { max: usize },
    #[error("{0} trailing byte(s) after payload")]
    TrailingBytes(usize),
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
    #[error("string is {len} bytes (max {max})")]
    StringTooLong { len: usize, max: usize },
    #[error("string contains an interior NUL byte")]
    InteriorNul,
    #[error("active user list holds {0} entries (max 255)")]
    TooManyUsers(usize),
}

/// One chat protocol message: routing header plus typed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub from: UserId,
    pub to: UserId,
    pub body: Body,
}

/// The typed payload of a [`Message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Opaque timestamp stamped by the sender, echoed back verbatim.
    Ping { time: u32 },
    /// Rename request (client → server) or rename broadcast (server → all).
    SetName { id: UserId, name: String },
    /// Membership broadcast; the name is empty on a fresh connect.
    Connect { id: UserId, name: String },
    /// Membership broadcast for a departed user.
    Disconnect { id: UserId, name: String },
    /// Full roster snapshot, or (client → server) a snapshot request.
    ActiveUsers { users: Vec<UserSummary> },
    Chat { text: String },
    Error { text: String },
}

/// One roster entry inside an ACTIVE_USERS payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
}

impl Body {
    fn wire_type(&self) -> u8 {
        match self {
            Body::Ping { .. } => TYPE_PING,
            Body::SetName { .. } => TYPE_USER_SETNAME,
            Body::Connect { .. } => TYPE_USER_CONNECT,
            Body::Disconnect { .. } => TYPE_USER_DISCONNECT,
            Body::ActiveUsers { .. } => TYPE_ACTIVE_USERS,
            Body::Chat { .. } => TYPE_CHAT,
            Body::Error { .. } => TYPE_ERROR,
        }
    }
}

/// Encode a message into its exact wire form.
///
/// The header's `len` field is written last, once the payload size is
/// known. Bounded strings are rejected if they exceed their field limit
/// or contain an interior NUL.
pub fn encode(msg: &Message) -> Result<Bytes, WireError> {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + 8);
    buf.put_u8(msg.body.wire_type());
    buf.put_u16(0); // len, patched below
    buf.put_u16(msg.from);
    buf.put_u16(msg.to);

    match &msg.body {
        Body::Ping { time } => buf.put_u32(*time),
        Body::SetName { id, name }
        | Body::Connect { id, name }
        | Body::Disconnect { id, name } => {
            buf.put_u16(*id);
            put_str(&mut buf, name, MAX_USERNAME_LEN)?;
        }
        Body::ActiveUsers { users } => {
            if users.len() > MAX_CLIENTS {
                return Err(WireError::TooManyUsers(users.len()));
            }
            buf.put_u8(users.len() as u8);
            for user in users {
                buf.put_u16(user.id);
            }
            for user in users {
                put_str(&mut buf, &user.name, MAX_USERNAME_LEN)?;
            }
        }
        Body::Chat { text } | Body::Error { text } => {
            put_str(&mut buf, text, MAX_CHATMSG_LEN)?;
        }
    }

    let len = buf.len() as u16;
    buf[1..3].copy_from_slice(&len.to_be_bytes());
    Ok(buf.freeze())
}

/// Decode exactly one message from `buf`.
///
/// The slice length must equal the header's declared `len`; truncated
/// fields, out-of-bound strings, unknown types, and trailing bytes all
/// fail without reading past the slice.
pub fn decode(buf: &[u8]) -> Result<Message, WireError> {
    if buf.len() < HEADER_LEN {
        return Err(WireError::Truncated);
    }
    let wire_type = buf[0];
    let declared = u16::from_be_bytes([buf[1], buf[2]]);
    if declared as usize != buf.len() {
        return Err(WireError::LengthMismatch {
            declared,
            actual: buf.len(),
        });
    }
    let from = u16::from_be_bytes([buf[3], buf[4]]);
    let to = u16::from_be_bytes([buf[5], buf[6]]);

    let mut cur = &buf[HEADER_LEN..];
    let body = match wire_type {
        TYPE_PING => Body::Ping {
            time: take_u32(&mut cur)?,
        },
        TYPE_USER_SETNAME | TYPE_USER_CONNECT | TYPE_USER_DISCONNECT => {
            let id = take_u16(&mut cur)?;
            let name = take_str(&mut cur, MAX_USERNAME_LEN)?;
            match wire_type {
                TYPE_USER_SETNAME => Body::SetName { id, name },
                TYPE_USER_CONNECT => Body::Connect { id, name },
                _ => Body::Disconnect { id, name },
            }
        }
        TYPE_ACTIVE_USERS => {
            let count = take_u8(&mut cur)? as usize;
            let mut ids = Vec::with_capacity(count);
            for _ in 0..count {
                ids.push(take_u16(&mut cur)?);
            }
            let mut users = Vec::with_capacity(count);
            for id in ids {
                users.push(UserSummary {
                    id,
                    name: take_str(&mut cur, MAX_USERNAME_LEN)?,
                });
            }
            Body::ActiveUsers { users }
        }
        TYPE_CHAT => Body::Chat {
            text: take_str(&mut cur, MAX_CHATMSG_LEN)?,
        },
        TYPE_ERROR => Body::Error {
            text: take_str(&mut cur, MAX_CHATMSG_LEN)?,
        },
        other => return Err(WireError::UnknownType(other)),
    };

    if !cur.is_empty() {
        return Err(WireError::TrailingBytes(cur.len()));
    }
    Ok(Message { from, to, body })
}

fn put_str(buf: &mut BytesMut, text: &str, max: usize) -> Result<(), WireError> {
    if text.len() > max {
        return Err(WireError::StringTooLong {
            len: text.len(),
            max,
        });
    }
    if text.as_bytes().contains(&0) {
        return Err(WireError::InteriorNul);
    }
    buf.put_slice(text.as_bytes());
    buf.put_u8(0);
    Ok(())
}

fn take_u8(cur: &mut &[u8]) -> Result<u8, WireError> {
    let (&value, rest) = cur.split_first().ok_or(WireError::Truncated)?;
    *cur = rest;
    Ok(value)
}

fn take_u16(cur: &mut &[u8]) -> Result<u16, WireError> {
    if cur.len() < 2 {
        return Err(WireError::Truncated);
    }
    let (head, rest) = cur.split_at(2);
    *cur = rest;
    Ok(u16::from_be_bytes([head[0], head[1]]))
}

fn take_u32(cur: &mut &[u8]) -> Result<u32, WireError> {
    if cur.len() < 4 {
        return Err(WireError::Truncated);
    }
    let (head, rest) = cur.split_at(4);
    *cur = rest;
    Ok(u32::from_be_bytes([head[0], head[1], head[2], head[3]]))
}

fn take_str(cur: &mut &[u8], max: usize) -> Result<String, WireError> {
    // The NUL must fall within the first max+1 bytes of the field.
    let limit = cur.len().min(max + 1);
    let pos = cur[..limit]
        .iter()
        .position(|&b| b == 0)
        .ok_or(WireError::UnterminatedString { max })?;
    let text = std::str::from_utf8(&cur[..pos])
        .map_err(|_| WireError::InvalidUtf8)?
        .to_owned();
    *cur = &cur[pos + 1..];
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(msg: &Message) -> Message {
        let encoded = encode(msg).unwrap();
        decode(&encoded).unwrap()
    }

    fn setname(from: UserId, to: UserId, id: UserId, name: &str) -> Message {
        Message {
            from,
            to,
            body: Body::SetName {
                id,
                name: name.into(),
            },
        }
    }

    // -- Round trips --

    #[test]
    fn ping_round_trip() {
        let msg = Message {
            from: 1000,
            to: SERVER_ID,
            body: Body::Ping { time: 100_000 },
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn setname_round_trip() {
        let msg = setname(1000, SERVER_ID, 1000, "alice");
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn empty_name_round_trip() {
        let msg = setname(10, 0, 10, "");
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn max_length_name_round_trip() {
        let name = "a".repeat(MAX_USERNAME_LEN);
        let msg = setname(10, 0, 10, &name);
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn connect_and_disconnect_round_trip() {
        let connect = Message {
            from: SERVER_ID,
            to: SERVER_ID,
            body: Body::Connect {
                id: 1001,
                name: String::new(),
            },
        };
        assert_eq!(round_trip(&connect), connect);

        let disconnect = Message {
            from: SERVER_ID,
            to: SERVER_ID,
            body: Body::Disconnect {
                id: 1001,
                name: String::new(),
            },
        };
        assert_eq!(round_trip(&disconnect), disconnect);
    }

    #[test]
    fn active_users_round_trip() {
        let msg = Message {
            from: SERVER_ID,
            to: 1002,
            body: Body::ActiveUsers {
                users: vec![
                    UserSummary {
                        id: 1000,
                        name: "alice".into(),
                    },
                    UserSummary {
                        id: 1001,
                        name: String::new(),
                    },
                    UserSummary {
                        id: 1002,
                        name: "bob".into(),
                    },
                ],
            },
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn empty_active_users_is_eight_bytes() {
        let msg = Message {
            from: SERVER_ID,
            to: 1000,
            body: Body::ActiveUsers { users: vec![] },
        };
        let encoded = encode(&msg).unwrap();
        assert_eq!(encoded.len(), HEADER_LEN + 1);
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn chat_round_trip() {
        let msg = Message {
            from: 1000,
            to: SERVER_ID,
            body: Body::Chat { text: "hi".into() },
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn empty_chat_round_trip() {
        let msg = Message {
            from: 1000,
            to: SERVER_ID,
            body: Body::Chat {
                text: String::new(),
            },
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn error_round_trip() {
        let msg = Message {
            from: SERVER_ID,
            to: 1000,
            body: Body::Error {
                text: "Username already taken.".into(),
            },
        };
        assert_eq!(round_trip(&msg), msg);
    }

    // -- Header layout --

    #[test]
    fn header_fields_are_big_endian_at_fixed_offsets() {
        let msg = setname(0x1234, 0x5678, 7, "bob");
        let encoded = encode(&msg).unwrap();

        assert_eq!(encoded[0], 1); // USER_SETNAME
        let len = u16::from_be_bytes([encoded[1], encoded[2]]) as usize;
        assert_eq!(len, encoded.len());
        assert_eq!(u16::from_be_bytes([encoded[3], encoded[4]]), 0x1234);
        assert_eq!(u16::from_be_bytes([encoded[5], encoded[6]]), 0x5678);
    }

    #[test]
    fn setname_exact_bytes() {
        let msg = setname(7, 0, 7, "bob");
        let encoded = encode(&msg).unwrap();
        assert_eq!(
            &encoded[..],
            &[1, 0, 13, 0, 7, 0, 0, 0, 7, b'b', b'o', b'b', 0]
        );
    }

    #[test]
    fn ping_time_is_big_endian() {
        let msg = Message {
            from: 0,
            to: 0,
            body: Body::Ping { time: 0x0102_0304 },
        };
        let encoded = encode(&msg).unwrap();
        assert_eq!(encoded.len(), 11);
        assert_eq!(&encoded[7..], &[1, 2, 3, 4]);
    }

    // -- Encode failures --

    #[test]
    fn encode_rejects_over_limit_name() {
        let msg = setname(10, 0, 10, &"a".repeat(MAX_USERNAME_LEN + 1));
        assert_eq!(
            encode(&msg),
            Err(WireError::StringTooLong {
                len: MAX_USERNAME_LEN + 1,
                max: MAX_USERNAME_LEN,
            })
        );
    }

    #[test]
    fn encode_rejects_over_limit_chat() {
        let msg = Message {
            from: 1000,
            to: SERVER_ID,
            body: Body::Chat {
                text: "x".repeat(MAX_CHATMSG_LEN + 1),
            },
        };
        assert!(matches!(
            encode(&msg),
            Err(WireError::StringTooLong { .. })
        ));
    }

    #[test]
    fn encode_rejects_interior_nul() {
        let msg = Message {
            from: 1000,
            to: SERVER_ID,
            body: Body::Chat {
                text: "hi\0there".into(),
            },
        };
        assert_eq!(encode(&msg), Err(WireError::InteriorNul));
    }

    #[test]
    fn encode_rejects_oversized_roster() {
        let users = (0..=MAX_CLIENTS as u16)
            .map(|id| UserSummary {
                id,
                name: String::new(),
            })
            .collect();
        let msg = Message {
            from: SERVER_ID,
            to: 1000,
            body: Body::ActiveUsers { users },
        };
        assert_eq!(encode(&msg), Err(WireError::TooManyUsers(MAX_CLIENTS + 1)));
    }

    // -- Decode failures --

    #[test]
    fn decode_rejects_short_header() {
        assert_eq!(decode(&[0, 0, 6, 0, 0, 0]), Err(WireError::Truncated));
    }

    #[test]
    fn decode_rejects_unknown_type() {
        let buf = [9u8, 0, 7, 0, 0, 0, 0];
        assert_eq!(decode(&buf), Err(WireError::UnknownType(9)));
    }

    #[test]
    fn decode_rejects_length_mismatch() {
        // Declared len 10, only 7 bytes of body.
        let buf = [0u8, 0, 10, 0, 0, 0, 0];
        assert_eq!(
            decode(&buf),
            Err(WireError::LengthMismatch {
                declared: 10,
                actual: 7,
            })
        );
    }

    #[test]
    fn decode_rejects_tampered_length() {
        let msg = setname(7, 0, 7, "bob");
        let mut bytes = encode(&msg).unwrap().to_vec();
        bytes[2] = bytes[2].wrapping_add(1);
        assert!(matches!(
            decode(&bytes),
            Err(WireError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn decode_rejects_truncated_ping() {
        // Header only — the u32 timestamp is required.
        let buf = [0u8, 0, 7, 0, 0, 0, 0];
        assert_eq!(decode(&buf), Err(WireError::Truncated));
    }

    #[test]
    fn decode_rejects_missing_nul() {
        // USER_SETNAME with a 17-byte name and no terminator in bounds.
        let mut buf = vec![1u8, 0, 0, 0, 7, 0, 0, 0, 7];
        buf.extend_from_slice(&[b'x'; MAX_USERNAME_LEN + 1]);
        let len = buf.len() as u16;
        buf[1..3].copy_from_slice(&len.to_be_bytes());
        assert_eq!(
            decode(&buf),
            Err(WireError::UnterminatedString {
                max: MAX_USERNAME_LEN,
            })
        );
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let msg = Message {
            from: 1000,
            to: SERVER_ID,
            body: Body::Chat { text: "hi".into() },
        };
        let mut bytes = encode(&msg).unwrap().to_vec();
        bytes.push(0xFF);
        let len = bytes.len() as u16;
        bytes[1..3].copy_from_slice(&len.to_be_bytes());
        assert_eq!(decode(&bytes), Err(WireError::TrailingBytes(1)));
    }

    #[test]
    fn decode_rejects_truncated_active_users() {
        // Claims 3 users but carries only one id.
        let mut buf = vec![4u8, 0, 0, 0, 0, 0, 0, 3, 3, 0xE8];
        let len = buf.len() as u16;
        buf[1..3].copy_from_slice(&len.to_be_bytes());
        assert_eq!(decode(&buf), Err(WireError::Truncated));
    }

    #[test]
    fn decode_rejects_invalid_utf8_name() {
        let mut buf = vec![1u8, 0, 0, 0, 7, 0, 0, 0, 7, 0xFF, 0xFE, 0];
        let len = buf.len() as u16;
        buf[1..3].copy_from_slice(&len.to_be_bytes());
        assert_eq!(decode(&buf), Err(WireError::InvalidUtf8));
    }
}
