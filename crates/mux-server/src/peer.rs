//! Per-peer I/O task.
//!
//! One task per connection, driving both directions: outbound lines from
//! the broker are written `\r\n`-terminated, inbound lines are forwarded to
//! the broker as `PeerLine` events. EOF, a read error or a write error ends
//! the task; the broker removing the peer (dropping the outbound sender)
//! also ends it, which drops and closes the stream exactly once.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, WriteHalf};

use crate::types::{BrokerEvent, BrokerTx, PeerId, PeerRx};

pub async fn run_peer<S>(id: PeerId, stream: S, broker_tx: BrokerTx, mut out_rx: PeerRx)
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut lines = BufReader::new(read_half).lines();

    loop {
        tokio::select! {
            outbound = out_rx.recv() => match outbound {
                Some(line) => {
                    if write_line(&mut write_half, &line).await.is_err() {
                        let _ = broker_tx.send(BrokerEvent::PeerClosed { id });
                        break;
                    }
                }
                // Broker removed us; dropping the stream closes the session.
                None => break,
            },
            inbound = lines.next_line() => match inbound {
                Ok(Some(line)) => {
                    if broker_tx.send(BrokerEvent::PeerLine { id, line }).is_err() {
                        break;
                    }
                }
                Ok(None) | Err(_) => {
                    let _ = broker_tx.send(BrokerEvent::PeerClosed { id });
                    break;
                }
            },
        }
    }
}

async fn write_line<S>(write_half: &mut WriteHalf<S>, line: &str) -> std::io::Result<()>
where
    S: AsyncWrite,
{
    write_half.write_all(line.as_bytes()).await?;
    write_half.write_all(b"\r\n").await?;
    write_half.flush().await?;
    Ok(())
}
