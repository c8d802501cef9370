//! Length-prefixed JSON framing for stream transports
//!
//! WebSocket transports get message boundaries for free. Plain byte streams
//! (TCP, Unix sockets) use a 4-byte big-endian length prefix followed by a
//! UTF-8 JSON document. The decoder buffers partial reads until a whole frame
//! is available.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Default maximum frame size (16 MB)
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Frame codec error
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Codec carrying one JSON text message per frame
#[derive(Debug, Clone)]
pub struct JsonFrameCodec {
    max_message_size: usize,
}

impl JsonFrameCodec {
    pub fn new() -> Self {
        Self::with_max_size(MAX_MESSAGE_SIZE)
    }

    pub fn with_max_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }
}

impl Default for JsonFrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for JsonFrameCodec {
    type Item = String;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Need at least 4 bytes for length prefix
        if src.len() < 4 {
            return Ok(None);
        }

        // Peek at length without consuming
        let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

        if len > self.max_message_size {
            return Err(CodecError::MessageTooLarge {
                size: len,
                max: self.max_message_size,
            });
        }

        if src.len() < 4 + len {
            src.reserve(4 + len - src.len());
            return Ok(None);
        }

        src.advance(4);
        let data = src.split_to(len);
        let text = String::from_utf8(data.to_vec())?;
        Ok(Some(text))
    }
}

impl<T: AsRef<str>> Encoder<T> for JsonFrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let data = item.as_ref().as_bytes();

        if data.len() > self.max_message_size {
            return Err(CodecError::MessageTooLarge {
                size: data.len(),
                max: self.max_message_size,
            });
        }

        dst.reserve(4 + data.len());
        dst.put_u32(data.len() as u32);
        dst.put_slice(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    #[test]
    fn test_roundtrip() {
        let mut codec = JsonFrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(r#"{"id":1,"method":"Foo.bar"}"#, &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, r#"{"id":1,"method":"Foo.bar"}"#);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_message() {
        let mut codec = JsonFrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(String::from(r#"{"method":"Foo.baz"}"#), &mut buf).unwrap();

        // Split buffer to simulate partial read
        let mut partial = buf.split_to(6);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.unsplit(buf);
        assert_eq!(
            codec.decode(&mut partial).unwrap().as_deref(),
            Some(r#"{"method":"Foo.baz"}"#)
        );
    }

    #[test]
    fn test_two_frames_in_one_buffer() {
        let mut codec = JsonFrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode("{\"id\":1}", &mut buf).unwrap();
        codec.encode("{\"id\":2}", &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("{\"id\":1}"));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("{\"id\":2}"));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_message_too_large_on_decode() {
        let mut codec = JsonFrameCodec::with_max_size(8);
        let mut buf = BytesMut::new();
        buf.put_u32(9);

        let result = codec.decode(&mut buf);
        assert!(matches!(
            result,
            Err(CodecError::MessageTooLarge { size: 9, max: 8 })
        ));
    }

    #[test]
    fn test_message_too_large_on_encode() {
        let mut codec = JsonFrameCodec::with_max_size(4);
        let mut buf = BytesMut::new();
        let result = codec.encode("{\"a\":1}", &mut buf);
        assert!(matches!(result, Err(CodecError::MessageTooLarge { .. })));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_invalid_utf8() {
        let mut codec = JsonFrameCodec::new();
        let mut buf = BytesMut::new();
        buf.put_u32(2);
        buf.put_slice(&[0xff, 0xfe]);
        assert!(matches!(codec.decode(&mut buf), Err(CodecError::Utf8(_))));
    }

    #[tokio::test]
    async fn test_framed_over_duplex() {
        let (client, server) = tokio::io::duplex(64);
        let mut writer = FramedWrite::new(client, JsonFrameCodec::new());
        let mut reader = FramedRead::new(server, JsonFrameCodec::new());

        // Larger than the duplex buffer, so the reader sees several partial reads
        let big = format!("{{\"data\":\"{}\"}}", "x".repeat(500));
        let expected = big.clone();
        let send = tokio::spawn(async move {
            writer.send(big).await.unwrap();
        });

        let received = reader.next().await.unwrap().unwrap();
        assert_eq!(received, expected);
        send.await.unwrap();
    }
}
