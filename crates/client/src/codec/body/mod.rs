//! Body framing.
//!
//! - [`ChunkedDecoder`]: strips chunked transfer encoding off incoming bodies and keeps the trailer block
//! - [`PayloadEncoder`]: frames outgoing bodies, either chunked or with a fixed `Content-Length`

mod chunked_decoder;
mod chunked_encoder;
mod length_encoder;
mod payload_encoder;

pub use chunked_decoder::ChunkedDecoder;
pub use chunked_encoder::ChunkedEncoder;
pub use payload_encoder::PayloadEncoder;
