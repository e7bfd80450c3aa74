//! mux-server
//!
//! The broker: supervises the game-server child process, accepts and
//! authenticates socket peers, multiplexes their commands into the child's
//! stdin and broadcasts the child's output to every authenticated peer.

pub mod broker;
pub mod config;
pub mod store;
pub mod types;

// these are internal modules, not re-exported
mod child;
mod listener;
mod peer;
