//! mux-protocol
//!
//! Wire-level encoding/decoding for the broker and its peers.
//!
//! The wire is newline-terminated UTF-8 text over a stream socket (TCP or
//! Unix-domain). This crate is responsible for turning peer lines into
//! structured requests and broker replies into lines, plus the codec for
//! values stored in the shared key/value store.
//!
//! - [`request`] : peer -> broker command lines
//! - [`reply`]   : broker -> peer status lines and banners
//! - [`value`]   : shared-store value codec (JSON scalars only)

pub mod request;
pub mod reply;
pub mod value;

pub use request::{parse_request, Request};
pub use reply::Reply;
pub use value::{StoreValue, ValueError};
