use crate::protocol::{ParseError, PayloadItem};
use bytes::{Buf, BufMut, BytesMut};
use std::io::Write;

use tokio_util::codec::Encoder;
use tracing::trace;

/// Frames a body with chunked transfer encoding.
///
/// Every non-empty chunk becomes `<size-in-hex>\r\n<data>\r\n`. [`PayloadItem::Eof`]
/// writes the closing `0\r\n\r\n` once; anything encoded after that is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedEncoder {
    eof: bool,
    send_size: u64,
}

impl ChunkedEncoder {
    pub fn new() -> Self {
        Self { eof: false, send_size: 0 }
    }

    /// Whether the closing chunk has been written.
    pub fn is_finish(&self) -> bool {
        self.eof
    }

    pub fn send_size(&self) -> u64 {
        self.send_size
    }
}

impl Default for ChunkedEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for ChunkedEncoder {
    type Error = ParseError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if self.eof {
            return Ok(());
        }

        match item {
            PayloadItem::Chunk(mut bytes) => {
                let size = bytes.remaining();
                // a zero sized chunk is the terminator, never emit one for an empty write
                if size == 0 {
                    return Ok(());
                }
                write!(helper::Writer(dst), "{size:x}\r\n").map_err(ParseError::invalid_body)?;
                dst.reserve(size + 2);
                while bytes.has_remaining() {
                    let chunk = bytes.chunk();
                    let len = chunk.len();
                    dst.put_slice(chunk);
                    bytes.advance(len);
                }
                dst.put_slice(b"\r\n");
                self.send_size += size as u64;
                trace!(size, "encoded chunk");
                Ok(())
            }
            PayloadItem::Eof => {
                self.eof = true;
                dst.put_slice(b"0\r\n\r\n");
                Ok(())
            }
        }
    }
}

mod helper {
    use bytes::{BufMut, BytesMut};
    use std::io;

    pub struct Writer<'a>(pub &'a mut BytesMut);

    impl io::Write for Writer<'_> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.put_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
