use bytes::{Buf, Bytes};
use http::{HeaderValue, Version, header};

use crate::protocol::Headers;

/// Behaviour shared by [`Request`](crate::protocol::Request) and
/// [`Response`](crate::protocol::Response).
///
/// The framing engine only needs the version, the header block and the body of a
/// message; everything side specific lives in [`StreamSide`](crate::stream::StreamSide).
pub trait Message {
    fn version(&self) -> Version;

    fn set_version(&mut self, version: Version);

    fn headers(&self) -> &Headers;

    fn headers_mut(&mut self) -> &mut Headers;

    fn body(&self) -> &Bytes;

    fn set_body(&mut self, body: Bytes);

    /// Returns true if `Transfer-Encoding` names `chunked` as its final coding.
    fn is_chunked(&self) -> bool {
        is_chunked(self.headers().get(header::TRANSFER_ENCODING))
    }

    /// Returns true if the message carries `Connection: close`.
    fn has_connection_close(&self) -> bool {
        self.headers().contains_token(header::CONNECTION, "close")
    }
}

/// Represents an item in an HTTP message payload stream.
///
/// Encoders consume these to frame outgoing bodies, decoders produce them while
/// stripping the framing of incoming bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    /// A chunk of payload data
    Chunk(Data),
    /// Marks the end of the payload stream
    Eof,
}

/// How the body of an incoming message is delimited.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// Payload with known length in bytes, `Length(0)` for messages without body
    Length(u64),
    /// Payload using chunked transfer encoding
    Chunked,
    /// Payload runs until the peer closes the connection
    UntilEof,
}

impl PayloadSize {
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Length(0))
    }

    #[inline]
    pub fn is_until_eof(&self) -> bool {
        matches!(self, PayloadSize::UntilEof)
    }
}

impl<D: Buf> PayloadItem<D> {
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }
}

impl PayloadItem {
    /// Returns a reference to the contained bytes if this is a Chunk
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }

    /// Consumes the PayloadItem and returns the contained bytes if this is a Chunk
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}

/// Checks if the Transfer-Encoding header indicates chunked encoding.
///
/// According to RFC 7230, chunked must be the last encoding if present.
pub(crate) fn is_chunked(header_value: Option<&HeaderValue>) -> bool {
    const CHUNKED: &[u8] = b"chunked";
    if let Some(value) = header_value {
        if let Some(bytes) = value.as_bytes().rsplit(|b| *b == b',').next() {
            return bytes.trim_ascii().eq_ignore_ascii_case(CHUNKED);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_is_chunked() {
        assert!(!is_chunked(None));
        assert!(is_chunked(Some(&HeaderValue::from_static("gzip, chunked"))));
        assert!(is_chunked(Some(&HeaderValue::from_static("Chunked"))));
        assert!(!is_chunked(Some(&HeaderValue::from_static("chunked, gzip"))));
        assert!(!is_chunked(Some(&HeaderValue::from_static("gzip"))));
    }
}
