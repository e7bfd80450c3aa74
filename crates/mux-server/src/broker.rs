//! The central broker loop.
//!
//! One task owns all mutable state: the peer registry, the shared store and
//! the child's stdin. Peer tasks, the child output pumps and the console
//! reader only forward lines over a channel, so the loop body never needs a
//! lock. A one-second housekeeping tick bounds the wait so grace-period
//! eviction runs even with no I/O activity.
//!
//! Failure policy: errors on one peer only remove that peer; end-of-stream
//! from the child is fatal and triggers the orderly shutdown sequence
//! (`stop` to the child, wait for exit, drop listener and peers, unlink a
//! bound Unix socket path via the listener's drop).

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use mux_protocol::{parse_request, Reply, Request, StoreValue};

use crate::child::ChildSupervisor;
use crate::config::{Config, Launch};
use crate::listener::{MuxListener, PeerStream};
use crate::peer;
use crate::store::SharedStore;
use crate::types::{BrokerEvent, BrokerRx, BrokerTx, PeerId, PeerTx};

/// Registry entry for one connected peer.
#[derive(Debug)]
struct Peer {
    tx: PeerTx,
    authenticated: bool,
    connected_at: Instant,
}

pub struct Broker {
    config: Config,
    peers: BTreeMap<PeerId, Peer>,
    store: SharedStore,
    child: ChildSupervisor,
    start_time: u64,
    events: BrokerRx,
    accept_task: JoinHandle<()>,
    console_task: JoinHandle<()>,
    local_addr: Option<SocketAddr>,
}

impl Broker {
    /// Bind the listener and launch the configured child process.
    pub async fn bind(config: Config) -> anyhow::Result<Broker> {
        let launch = config.launch();
        Broker::bind_with(config, launch).await
    }

    /// Bind with an explicit launch command (tests supervise `cat`).
    pub async fn bind_with(config: Config, launch: Launch) -> anyhow::Result<Broker> {
        let listener = MuxListener::bind(&config)
            .await
            .context("failed to bind listening endpoint")?;
        let local_addr = listener.local_addr();

        let (broker_tx, events) = mpsc::unbounded_channel();

        let child = ChildSupervisor::spawn(&launch, broker_tx.clone())
            .with_context(|| format!("failed to launch child process `{}`", launch.program))?;
        info!(program = %launch.program, "child process launched");

        let accept_task = tokio::spawn(accept_loop(listener, broker_tx.clone()));
        let console_task = tokio::spawn(console_loop(broker_tx));

        let start_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Ok(Broker {
            config,
            peers: BTreeMap::new(),
            store: SharedStore::new(),
            child,
            start_time,
            events,
            accept_task,
            console_task,
            local_addr,
        })
    }

    /// Actual bound TCP address (when listening on port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Run the broker loop until the child exits.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut housekeeping = tokio::time::interval(Duration::from_secs(1));
        housekeeping.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let keep_running = tokio::select! {
                event = self.events.recv() => match event {
                    Some(BrokerEvent::ChildExited) | None => false,
                    Some(event) => self.handle_event(event).await,
                },
                _ = housekeeping.tick() => {
                    self.evict_expired();
                    true
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupt received, stopping child");
                    false
                }
            };

            if !keep_running {
                self.shutdown().await;
                return Ok(());
            }
        }
    }

    /// Handle one event; returns false when the loop must shut down.
    async fn handle_event(&mut self, event: BrokerEvent) -> bool {
        match event {
            BrokerEvent::PeerConnected { id, tx } => {
                self.register_peer(id, tx);
                true
            }
            BrokerEvent::PeerLine { id, line } => self.handle_peer_line(id, line).await,
            BrokerEvent::PeerClosed { id } => {
                self.remove_peer(id);
                true
            }
            BrokerEvent::ChildLine { stream, line } => {
                debug!(?stream, %line, "child output");
                self.broadcast(&line);
                true
            }
            BrokerEvent::ConsoleLine(line) => match self.child.send_line(&line).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "child stdin write failed");
                    false
                }
            },
            // ChildExited is consumed in `run`.
            BrokerEvent::ChildExited => false,
        }
    }

    fn register_peer(&mut self, id: PeerId, tx: PeerTx) {
        // With no password configured a peer is authenticated on accept.
        let authenticated = self.config.password().is_none();
        let banner = if authenticated {
            Reply::Welcome
        } else {
            Reply::Challenge
        };
        self.peers.insert(
            id,
            Peer {
                tx,
                authenticated,
                connected_at: Instant::now(),
            },
        );
        info!(peer = id.0, "peer connected");
        self.send_reply(id, banner);
    }

    async fn handle_peer_line(&mut self, id: PeerId, line: String) -> bool {
        let password = self.config.password().map(str::to_string);
        let Some(peer) = self.peers.get_mut(&id) else {
            // Already removed; late line from a dying task.
            return true;
        };

        if !peer.authenticated {
            match password.as_deref() {
                Some(password) if line.trim() == password => {
                    peer.authenticated = true;
                    info!(peer = id.0, "peer authenticated");
                    self.send_reply(id, Reply::Ok);
                }
                _ => {
                    info!(peer = id.0, "bad password, closing");
                    self.send_reply(id, Reply::Forbidden);
                    self.remove_peer(id);
                }
            }
            return true;
        }

        match parse_request(&line) {
            Request::Forward(command) => {
                if let Err(e) = self.child.send_line(&command).await {
                    warn!(error = %e, "child stdin write failed");
                    return false;
                }
            }
            Request::Set { key, value } => match StoreValue::decode(&value) {
                Ok(value) => {
                    self.store.set(key, value);
                    self.send_reply(id, Reply::Ok);
                }
                Err(e) => {
                    debug!(peer = id.0, error = %e, "rejected store value");
                    self.send_reply(id, Reply::Malformed);
                }
            },
            Request::Get { key } => {
                let reply = match self.store.get(&key) {
                    Some(value) => Reply::Value {
                        key,
                        value: value.encode(),
                    },
                    None => Reply::NotFound,
                };
                self.send_reply(id, reply);
            }
            Request::Auth(secret) => match self.config.password() {
                Some(password) if secret == password => self.send_reply(id, Reply::Ok),
                Some(_) => {
                    self.send_reply(id, Reply::Forbidden);
                    self.remove_peer(id);
                }
                None => self.send_reply(id, Reply::Ok),
            },
            Request::Quit => {
                self.send_reply(id, Reply::Goodbye);
                self.remove_peer(id);
            }
            Request::Close => {
                self.send_reply(id, Reply::Closing);
                self.remove_peer(id);
            }
            Request::Time => self.send_reply(id, Reply::StartTime(self.start_time)),
            Request::Malformed => self.send_reply(id, Reply::Malformed),
        }
        true
    }

    /// Relay one child output line to every authenticated peer, in peer-id
    /// order. A failed send means the peer task is gone; evict it.
    fn broadcast(&mut self, line: &str) {
        let mut dead = Vec::new();
        for (id, peer) in &self.peers {
            if !peer.authenticated {
                continue;
            }
            if peer.tx.send(line.to_string()).is_err() {
                dead.push(*id);
            }
        }
        for id in dead {
            self.remove_peer(id);
        }
    }

    fn send_reply(&mut self, id: PeerId, reply: Reply) {
        let Some(peer) = self.peers.get(&id) else {
            return;
        };
        if peer.tx.send(reply.to_string()).is_err() {
            self.remove_peer(id);
        }
    }

    /// Removal and close are one atomic step: dropping the outbound sender
    /// ends the peer task, which drops and closes the stream. Idempotent.
    fn remove_peer(&mut self, id: PeerId) -> bool {
        let removed = self.peers.remove(&id).is_some();
        if removed {
            info!(peer = id.0, "peer removed");
        }
        removed
    }

    fn evict_expired(&mut self) {
        if self.config.password().is_some() {
            // Unauthenticated peers are tolerated indefinitely while a
            // password gate is configured.
            return;
        }
        let grace = Duration::from_secs(self.config.server.password_gracetime);
        for id in expired_peers(&self.peers, grace, Instant::now()) {
            info!(peer = id.0, "evicting unauthenticated peer past grace period");
            self.remove_peer(id);
        }
    }

    async fn shutdown(&mut self) {
        info!("shutting down");
        self.accept_task.abort();
        self.console_task.abort();

        // Best-effort stop; the child may already be gone.
        let _ = self.child.send_line("stop").await;
        self.child.close_stdin();
        match self.child.wait().await {
            Ok(status) => info!(%status, "child process exited"),
            Err(e) => warn!(error = %e, "failed to reap child process"),
        }

        self.peers.clear();
    }
}

/// Peers past the authentication grace period. Pure so it is testable
/// without a running loop.
fn expired_peers(peers: &BTreeMap<PeerId, Peer>, grace: Duration, now: Instant) -> Vec<PeerId> {
    peers
        .iter()
        .filter(|(_, peer)| {
            !peer.authenticated && now.duration_since(peer.connected_at) > grace
        })
        .map(|(id, _)| *id)
        .collect()
}

async fn accept_loop(listener: MuxListener, broker_tx: BrokerTx) {
    loop {
        match listener.accept().await {
            Ok(stream) => {
                let id = PeerId::next();
                let (tx, rx) = mpsc::unbounded_channel();
                if broker_tx.send(BrokerEvent::PeerConnected { id, tx }).is_err() {
                    return;
                }
                let broker_tx = broker_tx.clone();
                match stream {
                    PeerStream::Tcp(stream) => {
                        tokio::spawn(peer::run_peer(id, stream, broker_tx, rx));
                    }
                    PeerStream::Unix(stream) => {
                        tokio::spawn(peer::run_peer(id, stream, broker_tx, rx));
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
            }
        }
    }
}

/// Operator console passthrough: local stdin lines go verbatim to the
/// child's stdin.
async fn console_loop(broker_tx: BrokerTx) {
    use tokio::io::AsyncBufReadExt;

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if broker_tx.send(BrokerEvent::ConsoleLine(line)).is_err() {
            return;
        }
    }
}
