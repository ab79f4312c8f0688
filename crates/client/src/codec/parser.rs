use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::body::ChunkedDecoder;
use crate::codec::header::{DecodeHead, decode_fields};
use crate::protocol::{Headers, ParseError, PayloadItem, PayloadSize};

/// Incremental parser for one incoming message.
///
/// The head is parsed into a caller supplied message. For chunked bodies the parser
/// strips the framing and tracks completion; fixed length and EOF delimited bodies
/// pass through untouched and are counted by the caller.
#[derive(Debug, Default)]
pub struct Parser {
    head_complete: bool,
    chunked: Option<ChunkedDecoder>,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets all progress, ready for the next message on the connection.
    pub fn reset(&mut self) {
        self.head_complete = false;
        self.chunked = None;
    }

    /// Parses a head off the front of `src` into `message`.
    ///
    /// Returns `Ok(false)` while the head is incomplete.
    pub fn parse_head<M: DecodeHead>(&mut self, src: &mut BytesMut, message: &mut M) -> Result<bool, ParseError> {
        if message.decode_head(src)? {
            self.head_complete = true;
        }
        Ok(self.head_complete)
    }

    /// Selects how the body following the parsed head is framed.
    pub fn set_payload(&mut self, size: PayloadSize) {
        self.chunked = size.is_chunked().then(ChunkedDecoder::new);
    }

    pub fn headers_complete(&self) -> bool {
        self.head_complete
    }

    /// True once every body byte has been seen. Trailers may still follow a chunked body.
    pub fn body_complete(&self) -> bool {
        self.head_complete && self.chunked.as_ref().is_none_or(ChunkedDecoder::body_complete)
    }

    /// True once the whole message, trailers included, has been parsed.
    pub fn message_complete(&self) -> bool {
        self.head_complete && self.chunked.as_ref().is_none_or(ChunkedDecoder::is_complete)
    }

    /// Strips body framing from `raw`.
    ///
    /// Returns the body bytes and the excess: bytes following the end of the message,
    /// which belong to the next message on the connection.
    pub fn parse_body(&mut self, raw: Bytes) -> Result<(Bytes, Bytes), ParseError> {
        let Some(decoder) = self.chunked.as_mut() else {
            return Ok((raw, Bytes::new()));
        };

        let mut src = BytesMut::from(&raw[..]);
        let mut body = BytesMut::new();
        while let Some(item) = decoder.decode(&mut src)? {
            match item {
                PayloadItem::Chunk(bytes) => body.extend_from_slice(&bytes),
                PayloadItem::Eof => break,
            }
        }

        trace!(body = body.len(), excess = src.len(), "parsed chunked body");
        Ok((body.freeze(), src.freeze()))
    }

    /// Takes the trailer fields of a completed chunked message.
    pub fn take_trailers(&mut self) -> Result<Headers, ParseError> {
        match self.chunked.as_mut() {
            Some(decoder) if decoder.is_complete() => decode_fields(&decoder.take_trailers()),
            _ => Ok(Headers::new()),
        }
    }
}
