//! Decoder for HTTP chunked transfer encoding.
//!
//! See [RFC 7230 Section 4.1](https://tools.ietf.org/html/rfc7230#section-4.1). Besides
//! the data chunks the decoder keeps the raw trailer section (everything after the
//! `0\r\n` last-chunk line, including the closing blank line) so it can be parsed
//! into header fields once the message is complete.

use crate::protocol::{ParseError, PayloadItem};
use ChunkedState::*;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::task::Poll;
use tokio_util::codec::Decoder;
use tracing::trace;

/// Upper bound for the buffered trailer section.
const MAX_TRAILER_BYTES: usize = 8 * 1024;

/// A decoder for handling HTTP chunked transfer encoding.
///
/// The decoder processes incoming bytes according to the chunked format:
/// - Each chunk starts with its size in hexadecimal
/// - Followed by optional extensions and CRLF
/// - Then the chunk data and CRLF
/// - A zero-sized chunk indicates the end of the body, optional trailers follow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    remaining_size: u64,
    trailers: BytesMut,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: SizeStart, remaining_size: 0, trailers: BytesMut::new() }
    }

    /// True once the last-chunk line has been read; trailers may still be pending.
    pub fn body_complete(&self) -> bool {
        matches!(self.state, EndCr | Trailer | TrailerLf | EndLf | End)
    }

    /// True once the trailer section and the final CRLF have been read.
    pub fn is_complete(&self) -> bool {
        self.state == End
    }

    /// The raw trailer section, terminated by an empty line once [`is_complete`](Self::is_complete).
    pub fn trailers(&self) -> &[u8] {
        &self.trailers
    }

    pub fn take_trailers(&mut self) -> Bytes {
        self.trailers.split().freeze()
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Read the first hex digit of the chunk size
    SizeStart,
    /// Read the chunk size in hex
    Size,
    /// Handle whitespace after size
    SizeLws,
    /// Skip chunk extensions
    Extension,
    /// Read LF after chunk size
    SizeLf,
    /// Read chunk data
    Body,
    /// Read CR after chunk data
    BodyCr,
    /// Read LF after chunk data
    BodyLf,
    /// Read optional trailer fields
    Trailer,
    /// Read LF after trailer
    TrailerLf,
    /// Read final CR
    EndCr,
    /// Read final LF
    EndLf,
    /// Final state after reading last chunk
    End,
}

impl ChunkedState {
    fn in_trailer_section(self) -> bool {
        matches!(self, EndCr | Trailer | TrailerLf | EndLf)
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    /// Decodes chunked transfer encoded data from the input buffer.
    ///
    /// - `Ok(Some(PayloadItem::Chunk(bytes)))` when chunk data was decoded
    /// - `Ok(Some(PayloadItem::Eof))` once the final CRLF has been read
    /// - `Ok(None)` when more data is needed
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if self.state == End {
                trace!("finished reading chunked data");
                return Ok(Some(PayloadItem::Eof));
            }

            if src.is_empty() {
                return Ok(None);
            }

            // every trailer section state consumes exactly one byte
            if self.state.in_trailer_section() {
                if self.trailers.len() >= MAX_TRAILER_BYTES {
                    return Err(ParseError::too_large_header(self.trailers.len(), MAX_TRAILER_BYTES));
                }
                self.trailers.put_u8(src[0]);
            }

            let mut buf = None;

            self.state = match self.state.step(src, &mut self.remaining_size, &mut buf) {
                Poll::Pending => return Ok(None),
                Poll::Ready(Ok(new_state)) => new_state,
                Poll::Ready(Err(e)) => return Err(ParseError::invalid_body(e)),
            };

            if let Some(bytes) = buf {
                trace!(len = bytes.len(), "read chunked bytes");
                return Ok(Some(PayloadItem::Chunk(bytes)));
            }
        }
    }
}

macro_rules! try_next_byte {
    ($src:ident) => {{
        if $src.len() > 0 {
            $src.get_u8()
        } else {
            return Poll::Pending;
        }
    }};
}

impl ChunkedState {
    fn step(
        &self,
        src: &mut BytesMut,
        remaining_size: &mut u64,
        buf: &mut Option<Bytes>,
    ) -> Poll<Result<ChunkedState, &'static str>> {
        match self {
            SizeStart => ChunkedState::read_size_start(src, remaining_size),
            Size => ChunkedState::read_size(src, remaining_size),
            SizeLws => ChunkedState::read_size_lws(src),
            Extension => ChunkedState::read_extension(src),
            SizeLf => ChunkedState::read_size_lf(src, remaining_size),
            Body => ChunkedState::read_body(src, remaining_size, buf),
            BodyCr => ChunkedState::read_body_cr(src),
            BodyLf => ChunkedState::read_body_lf(src),
            Trailer => ChunkedState::read_trailer(src),
            TrailerLf => ChunkedState::read_trailer_lf(src),
            EndCr => ChunkedState::read_end_cr(src),
            EndLf => ChunkedState::read_end_lf(src),
            End => Poll::Ready(Ok(End)),
        }
    }

    /// A size line needs at least one digit.
    fn read_size_start(src: &mut BytesMut, size_per_chunk: &mut u64) -> Poll<Result<ChunkedState, &'static str>> {
        let digit = match try_next_byte!(src) {
            b @ b'0'..=b'9' => b - b'0',
            b @ b'a'..=b'f' => b + 10 - b'a',
            b @ b'A'..=b'F' => b + 10 - b'A',
            _ => return Poll::Ready(Err("invalid chunk size line: missing size")),
        };
        *size_per_chunk = u64::from(digit);
        Poll::Ready(Ok(Size))
    }

    /// Reads the chunk size digit by digit, upper and lower case hex are accepted.
    fn read_size(src: &mut BytesMut, size_per_chunk: &mut u64) -> Poll<Result<ChunkedState, &'static str>> {
        macro_rules! or_overflow {
            ($e:expr) => {
                match $e {
                    Some(val) => val,
                    None => return Poll::Ready(Err("invalid overflow chunked length")),
                }
            };
        }

        let digit = match try_next_byte!(src) {
            b @ b'0'..=b'9' => b - b'0',
            b @ b'a'..=b'f' => b + 10 - b'a',
            b @ b'A'..=b'F' => b + 10 - b'A',
            b'\t' | b' ' => return Poll::Ready(Ok(SizeLws)),
            b';' => return Poll::Ready(Ok(Extension)),
            b'\r' => return Poll::Ready(Ok(SizeLf)),
            _ => return Poll::Ready(Err("invalid chunk size line: Invalid Size")),
        };

        *size_per_chunk = or_overflow!(size_per_chunk.checked_mul(16));
        *size_per_chunk = or_overflow!(size_per_chunk.checked_add(u64::from(digit)));
        Poll::Ready(Ok(Size))
    }

    fn read_size_lws(src: &mut BytesMut) -> Poll<Result<ChunkedState, &'static str>> {
        match try_next_byte!(src) {
            // LWS can follow the chunk size, but no more digits can come
            b'\t' | b' ' => Poll::Ready(Ok(SizeLws)),
            b';' => Poll::Ready(Ok(Extension)),
            b'\r' => Poll::Ready(Ok(SizeLf)),
            _ => Poll::Ready(Err("invalid chunk size linear white space")),
        }
    }

    fn read_extension(src: &mut BytesMut) -> Poll<Result<ChunkedState, &'static str>> {
        // extensions are ignored up to the next CRLF, a bare LF is rejected
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(SizeLf)),
            b'\n' => Poll::Ready(Err("invalid chunk extension contains newline")),
            _ => Poll::Ready(Ok(Extension)),
        }
    }

    fn read_size_lf(src: &mut BytesMut, size_per_chunk: &mut u64) -> Poll<Result<ChunkedState, &'static str>> {
        match try_next_byte!(src) {
            b'\n' if *size_per_chunk == 0 => Poll::Ready(Ok(EndCr)),
            b'\n' => Poll::Ready(Ok(Body)),
            _ => Poll::Ready(Err("invalid chunk size LF")),
        }
    }

    fn read_body(
        src: &mut BytesMut,
        size_per_chunk: &mut u64,
        buf: &mut Option<Bytes>,
    ) -> Poll<Result<ChunkedState, &'static str>> {
        if src.is_empty() {
            return Poll::Ready(Ok(Body));
        }

        if *size_per_chunk == 0 {
            return Poll::Ready(Ok(BodyCr));
        }

        // cap remaining bytes at the max capacity of usize
        let remaining = usize::try_from(*size_per_chunk).unwrap_or(usize::MAX);
        let read_size = std::cmp::min(remaining, src.len());

        *size_per_chunk -= read_size as u64;
        *buf = Some(src.split_to(read_size).freeze());

        if *size_per_chunk > 0 { Poll::Ready(Ok(Body)) } else { Poll::Ready(Ok(BodyCr)) }
    }

    fn read_body_cr(src: &mut BytesMut) -> Poll<Result<ChunkedState, &'static str>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(BodyLf)),
            _ => Poll::Ready(Err("invalid chunk body CR")),
        }
    }

    fn read_body_lf(src: &mut BytesMut) -> Poll<Result<ChunkedState, &'static str>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(SizeStart)),
            _ => Poll::Ready(Err("invalid chunk body LF")),
        }
    }

    fn read_trailer(src: &mut BytesMut) -> Poll<Result<ChunkedState, &'static str>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(TrailerLf)),
            _ => Poll::Ready(Ok(Trailer)),
        }
    }

    fn read_trailer_lf(src: &mut BytesMut) -> Poll<Result<ChunkedState, &'static str>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(EndCr)),
            _ => Poll::Ready(Err("invalid trailer end LF")),
        }
    }

    /// A CR here starts the final blank line, anything else starts another trailer field.
    fn read_end_cr(src: &mut BytesMut) -> Poll<Result<ChunkedState, &'static str>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(EndLf)),
            _ => Poll::Ready(Ok(Trailer)),
        }
    }

    fn read_end_lf(src: &mut BytesMut) -> Poll<Result<ChunkedState, &'static str>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(End)),
            _ => Poll::Ready(Err("invalid chunk end LF")),
        }
    }
}
