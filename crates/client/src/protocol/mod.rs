//! Core HTTP protocol types.
//!
//! - **Messages**: [`Request`] and [`Response`], both implementing [`Message`]
//! - **Headers**: [`Headers`], an ordered, case-insensitive sequence of [`Header`] fields
//! - **Payload**: [`PayloadItem`] for body framing and [`PayloadSize`] for read framing
//! - **Errors**: [`HttpError`] for the pipeline and [`ParseError`] for the codec
//!
//! Requests and responses link to each other with owned boxes only: a client
//! response owns its request, a redirected request owns the response that caused
//! it. The chain therefore stays acyclic and is dropped in one piece.

mod header;
pub use header::Header;
pub use header::Headers;

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::Request;
pub(crate) use request::host_header;

mod response;
pub use response::Response;

mod error;
pub use error::HttpError;
pub use error::ParseError;
