//! Shared types for the broker.
//!
//! This module defines:
//! - `PeerId`: a lightweight handle for connected peers
//! - `BrokerEvent`: the tagged readiness events feeding the broker loop
//! - channel aliases between I/O tasks and the broker

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

/// Identifier for a connected peer.
///
/// Opaque and unique over the lifetime of the process. `Ord` so the
/// registry can iterate peers deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(pub u64);

static NEXT_PEER_ID: AtomicU64 = AtomicU64::new(1);

impl PeerId {
    /// Allocate the next unique id.
    pub fn next() -> PeerId {
        PeerId(NEXT_PEER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Which child output stream a line arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStream {
    Stdout,
    Stderr,
}

/// Everything that can wake the broker loop, tagged explicitly so the loop
/// dispatches on the tag rather than comparing descriptor identities.
#[derive(Debug)]
pub enum BrokerEvent {
    /// A new connection was accepted; `tx` is its outbound line channel.
    PeerConnected { id: PeerId, tx: PeerTx },
    /// One line read from a peer.
    PeerLine { id: PeerId, line: String },
    /// Peer hung up or its read failed.
    PeerClosed { id: PeerId },
    /// One line read from the child's stdout or stderr.
    ChildLine { stream: ChildStream, line: String },
    /// End-of-stream on the child's output: the process is terminated.
    ChildExited,
    /// One line read from the local operator console.
    ConsoleLine(String),
}

/// Outbound lines to a single peer. Dropping the sender ends the peer task
/// and closes the connection.
pub type PeerTx = mpsc::UnboundedSender<String>;
pub type PeerRx = mpsc::UnboundedReceiver<String>;

/// Channel from I/O tasks into the broker loop.
pub type BrokerTx = mpsc::UnboundedSender<BrokerEvent>;
pub type BrokerRx = mpsc::UnboundedReceiver<BrokerEvent>;
