//! Listening endpoint: TCP or Unix-domain, selected by configuration.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};
use tracing::debug;

use crate::config::{Config, Transport};

/// One accepted peer connection.
pub enum PeerStream {
    Tcp(TcpStream),
    Unix(UnixStream),
}

pub enum MuxListener {
    Tcp(TcpListener),
    Unix { listener: UnixListener, path: PathBuf },
}

impl MuxListener {
    /// Bind per the configured transport. Bind failures are fatal at
    /// startup; a stale socket file from a previous run is removed first.
    pub async fn bind(config: &Config) -> anyhow::Result<MuxListener> {
        match config.server.transport {
            Transport::Tcp => {
                let addr = config.socket_addr_string();
                let listener = TcpListener::bind(&addr).await?;
                Ok(MuxListener::Tcp(listener))
            }
            Transport::Unix => {
                let path = PathBuf::from(&config.server.listen_addr);
                match std::fs::remove_file(&path) {
                    Ok(()) => debug!(path = %path.display(), "removed stale socket"),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                let listener = UnixListener::bind(&path)?;
                Ok(MuxListener::Unix { listener, path })
            }
        }
    }

    /// Actual bound TCP address (useful when binding port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            MuxListener::Tcp(listener) => listener.local_addr().ok(),
            MuxListener::Unix { .. } => None,
        }
    }

    pub async fn accept(&self) -> io::Result<PeerStream> {
        match self {
            MuxListener::Tcp(listener) => {
                let (stream, _) = listener.accept().await?;
                Ok(PeerStream::Tcp(stream))
            }
            MuxListener::Unix { listener, .. } => {
                let (stream, _) = listener.accept().await?;
                Ok(PeerStream::Unix(stream))
            }
        }
    }
}

impl Drop for MuxListener {
    fn drop(&mut self) {
        if let MuxListener::Unix { path, .. } = self {
            let _ = std::fs::remove_file(path);
        }
    }
}
