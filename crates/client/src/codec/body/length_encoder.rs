use crate::protocol::{ParseError, PayloadItem};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::warn;

/// Passes body bytes through verbatim, counting them against the declared `Content-Length`.
///
/// A `None` length means the message declared its own framing (for example an
/// `Upgrade` handshake) and nothing is counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    length: Option<u64>,
    written: u64,
}

impl LengthEncoder {
    pub fn new(length: Option<u64>) -> Self {
        Self { length, written: 0 }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn is_finish(&self) -> bool {
        self.length.is_none_or(|length| self.written >= length)
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthEncoder {
    type Error = ParseError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            PayloadItem::Chunk(mut bytes) => {
                let size = bytes.remaining() as u64;
                if size == 0 {
                    return Ok(());
                }
                if let Some(length) = self.length {
                    if self.written + size > length {
                        warn!(content_length = length, written = self.written + size, "body exceeds declared content-length");
                    }
                }
                while bytes.has_remaining() {
                    let chunk = bytes.chunk();
                    let len = chunk.len();
                    dst.extend_from_slice(chunk);
                    bytes.advance(len);
                }
                self.written += size;
                Ok(())
            }
            PayloadItem::Eof => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn counts_written_bytes() {
        let mut encoder = LengthEncoder::new(Some(8));
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"abcd")), &mut dst).unwrap();
        assert!(!encoder.is_finish());
        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"efgh")), &mut dst).unwrap();
        encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).unwrap();

        assert_eq!(&dst[..], b"abcdefgh");
        assert_eq!(encoder.written(), 8);
        assert!(encoder.is_finish());
    }

    #[test]
    fn overrun_is_still_written() {
        let mut encoder = LengthEncoder::new(Some(2));
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"abc")), &mut dst).unwrap();
        assert_eq!(&dst[..], b"abc");
        assert_eq!(encoder.written(), 3);
    }
}
