//! mux-client
//!
//! Outbound half of the multiplexed console: connects to the broker,
//! performs the authentication handshake, classifies the broadcast stream
//! into typed events (keeping a local roster/ban/op cache current) and
//! offers convenience operations that validate their targets against that
//! cache before emitting commands.
//!
//! The cache is advisory: it can lag the game server's real state, and
//! validation failures are a convenience, not a security boundary.

pub mod client;
pub mod error;
pub mod state;
pub mod wrap;

pub use client::{Client, ClientConfig, ClientTransport};
pub use error::{ClientError, TargetError};
pub use state::RosterState;
