//! Wire protocol — typed message family and length-prefixed framing.
//!
//! Every message travels as one frame: a 2-byte big-endian payload length
//! followed by the encoded message, whose own 7-byte header repeats the
//! total length. [`message`] owns the byte layout; [`codec`] owns the
//! framing.

pub mod codec;
pub mod message;
