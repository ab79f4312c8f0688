//! Head encoding and decoding.
//!
//! - [`DecodeHead`]: parses a request line or status line plus header fields into a message
//! - [`EncodeHead`]: serializes a message's start line and header fields

mod header_decoder;
mod header_encoder;

pub use header_decoder::DecodeHead;
pub(crate) use header_decoder::decode_fields;
pub use header_encoder::EncodeHead;
