//! HTTP/1.1 wire codec.
//!
//! - [`header`]: start line and header block encoding ([`EncodeHead`]) and decoding ([`DecodeHead`])
//! - [`body`]: chunked and fixed length body framing
//! - [`Parser`]: per message incremental parser used by a [`Stream`](crate::stream::Stream)
//!
//! # Example
//!
//! ```
//! use bytes::{Bytes, BytesMut};
//! use http::StatusCode;
//! use micro_client::codec::Parser;
//! use micro_client::protocol::{PayloadSize, Response};
//!
//! let mut src = BytesMut::from(&b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n"[..]);
//! let mut response = Response::new(StatusCode::OK);
//! let mut parser = Parser::new();
//! assert!(parser.parse_head(&mut src, &mut response).unwrap());
//!
//! parser.set_payload(PayloadSize::Chunked);
//! let (body, _excess) = parser.parse_body(Bytes::from_static(b"5\r\nhello\r\n0\r\n\r\n")).unwrap();
//! assert_eq!(body, "hello");
//! assert!(parser.message_complete());
//! ```

pub mod body;
pub mod header;

mod parser;

pub use header::{DecodeHead, EncodeHead};
pub use parser::Parser;
