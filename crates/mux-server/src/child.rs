//! Child process supervision.
//!
//! Spawns the controlled process with piped stdin/stdout/stderr and pumps
//! its output lines into the broker channel. End-of-stream on either output
//! means the process is terminated and the broker must shut down, so both
//! pump tasks report `ChildExited` on EOF (the broker ignores the second).

use std::io;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tracing::warn;

use crate::config::Launch;
use crate::types::{BrokerEvent, BrokerTx, ChildStream};

pub struct ChildSupervisor {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl ChildSupervisor {
    /// Spawn the child and start the stdout/stderr pump tasks.
    pub fn spawn(launch: &Launch, broker_tx: BrokerTx) -> io::Result<ChildSupervisor> {
        let mut child = Command::new(&launch.program)
            .args(&launch.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("child stderr was not captured"))?;

        tokio::spawn(pump_lines(stdout, ChildStream::Stdout, broker_tx.clone()));
        tokio::spawn(pump_lines(stderr, ChildStream::Stderr, broker_tx));

        Ok(ChildSupervisor { child, stdin })
    }

    /// Write one newline-terminated line to the child's stdin.
    pub async fn send_line(&mut self, line: &str) -> io::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "child stdin closed"))?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Close the child's stdin (signals end-of-input to the child).
    pub fn close_stdin(&mut self) {
        self.stdin = None;
    }

    /// Wait for the child to exit.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }
}

async fn pump_lines<R>(reader: R, stream: ChildStream, broker_tx: BrokerTx)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if broker_tx
                    .send(BrokerEvent::ChildLine { stream, line })
                    .is_err()
                {
                    return;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(?stream, error = %e, "child output read error");
                break;
            }
        }
    }
    let _ = broker_tx.send(BrokerEvent::ChildExited);
}
