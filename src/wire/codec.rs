//! Length-prefixed framing for tokio I/O.
//!
//! Framing: `[2 bytes: payload length, big-endian u16][N bytes: encoded
//! message]`. The decoder reassembles frames across arbitrary TCP
//! chunking; the encoder takes pre-encoded message bytes so forwarded
//! chat traffic goes out verbatim, byte for byte.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Maximum frame payload, fixed by the u16 length prefix.
pub const MAX_FRAME_LEN: usize = 65535;

/// Codec error type.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("frame too large: {0} bytes (max {MAX_FRAME_LEN})")]
    FrameTooLarge(usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Frame-level codec — handles only length-prefixed framing.
///
/// Decoding yields raw payloads without interpreting them; message
/// decode happens one layer up so a malformed message can be dropped
/// while the connection stays open.
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Length of the current frame being read, if the prefix has been consumed.
    pending_len: Option<usize>,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self { pending_len: None }
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let payload_len = match self.pending_len {
            Some(len) => len,
            None => {
                if src.len() < 2 {
                    return Ok(None); // Need more data for the prefix.
                }
                let len = src.get_u16() as usize;
                self.pending_len = Some(len);
                len
            }
        };

        if src.len() < payload_len {
            src.reserve(payload_len - src.len());
            return Ok(None);
        }

        let payload = src.split_to(payload_len);
        self.pending_len = None;
        Ok(Some(payload))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > MAX_FRAME_LEN {
            return Err(CodecError::FrameTooLarge(item.len()));
        }
        dst.reserve(2 + item.len());
        dst.put_u16(item.len() as u16);
        dst.extend_from_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::message::{self, Body, Message, SERVER_ID};

    fn chat(text: &str) -> Bytes {
        message::encode(&Message {
            from: 1000,
            to: SERVER_ID,
            body: Body::Chat { text: text.into() },
        })
        .unwrap()
    }

    fn encode_frame(payload: Bytes) -> BytesMut {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(payload, &mut buf).unwrap();
        buf
    }

    #[test]
    fn round_trip_through_codec() {
        let payload = chat("hello");
        let mut buf = encode_frame(payload.clone());

        let mut codec = FrameCodec::new();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&decoded[..], &payload[..]);
        assert!(buf.is_empty());
    }

    #[test]
    fn length_prefix_is_big_endian() {
        let payload = chat("hi");
        let buf = encode_frame(payload.clone());
        let len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
        assert_eq!(len, payload.len());
        assert_eq!(buf.len() - 2, len);
    }

    #[test]
    fn empty_buffer_returns_none() {
        let mut codec = FrameCodec::new();
        assert!(codec.decode(&mut BytesMut::new()).unwrap().is_none());
    }

    #[test]
    fn partial_prefix_returns_none() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&[0u8][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn partial_payload_returns_none_then_completes() {
        let payload = chat("split me");
        let mut full = encode_frame(payload.clone());
        let mut partial = full.split_to(full.len() / 2);

        let mut codec = FrameCodec::new();
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&full);
        let decoded = codec.decode(&mut partial).unwrap().unwrap();
        assert_eq!(&decoded[..], &payload[..]);
    }

    #[test]
    fn multiple_frames_in_one_buffer() {
        let first = chat("one");
        let second = chat("two");
        let mut buf = BytesMut::new();
        let mut codec = FrameCodec::new();
        codec.encode(first.clone(), &mut buf).unwrap();
        codec.encode(second.clone(), &mut buf).unwrap();

        let mut codec = FrameCodec::new();
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], &first[..]);
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], &second[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn arbitrary_chunking_preserves_frame_boundaries() {
        // Stream three frames one byte at a time; exactly three frames
        // must come out, in order.
        let payloads = [chat("first"), chat("second"), chat("third")];
        let mut stream = BytesMut::new();
        let mut codec = FrameCodec::new();
        for payload in &payloads {
            codec.encode(payload.clone(), &mut stream).unwrap();
        }

        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        let mut decoded = Vec::new();
        for byte in &stream[..] {
            buf.put_u8(*byte);
            while let Some(frame) = codec.decode(&mut buf).unwrap() {
                decoded.push(frame);
            }
        }

        assert_eq!(decoded.len(), payloads.len());
        for (frame, payload) in decoded.iter().zip(&payloads) {
            assert_eq!(&frame[..], &payload[..]);
        }
    }

    #[test]
    fn oversized_payload_rejected_on_encode() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        let oversized = Bytes::from(vec![0u8; MAX_FRAME_LEN + 1]);
        let err = codec.encode(oversized, &mut buf).unwrap_err();
        assert!(matches!(err, CodecError::FrameTooLarge(_)));
    }

    #[test]
    fn decoded_frame_feeds_message_decoder() {
        let payload = chat("hello room");
        let mut buf = encode_frame(payload);
        let mut codec = FrameCodec::new();
        let frame = codec.decode(&mut buf).unwrap().unwrap();

        let msg = message::decode(&frame).unwrap();
        assert_eq!(
            msg.body,
            Body::Chat {
                text: "hello room".into(),
            }
        );
    }
}
