//! The command client.
//!
//! Connects to the broker, performs the authentication handshake, then
//! feeds every broadcast line through the event dispatcher, keeping the
//! local [`RosterState`] current. Convenience operations validate their
//! targets against that cache before any network write.
//!
//! One client instance belongs to one task; concurrent use from multiple
//! tasks is unsupported and must be serialized by the caller.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::{TcpStream, UnixStream};
use tracing::{debug, info};

use mux_events::{Dispatcher, ParsedEvent};
use mux_protocol::Reply;

use crate::error::{ClientError, TargetError};
use crate::state::RosterState;
use crate::wrap::wrap;

/// Game chat line width; `say`/`tell` bodies wrap to this.
pub const LINE_WIDTH: usize = 44;
/// Largest quantity one `give` command may carry.
pub const STACK_SIZE: u32 = 64;
/// Continuation indent for wrapped chat lines.
pub const WRAP_INDENT: &str = ">>";

static IPV4: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,3}\.){3}\d{1,3}$").expect("ipv4 pattern must compile"));

/// How to reach the broker.
#[derive(Debug, Clone)]
pub enum ClientTransport {
    Tcp { host: String, port: u16 },
    Unix { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub transport: ClientTransport,
    /// Sent in response to the challenge banner; `None` expects an open
    /// broker.
    pub password: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            transport: ClientTransport::Unix {
                path: PathBuf::from("multiplex.sock"),
            },
            password: None,
        }
    }
}

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

pub struct Client {
    lines: Lines<BufReader<BoxedReader>>,
    writer: BoxedWriter,
    state: RosterState,
    dispatcher: Dispatcher,
    running: bool,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Connect and perform the authentication handshake.
    pub async fn connect(config: ClientConfig) -> Result<Client, ClientError> {
        let (reader, writer): (BoxedReader, BoxedWriter) = match &config.transport {
            ClientTransport::Tcp { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port)).await?;
                let (r, w) = stream.into_split();
                (Box::new(r), Box::new(w))
            }
            ClientTransport::Unix { path } => {
                let stream = UnixStream::connect(path).await?;
                let (r, w) = stream.into_split();
                (Box::new(r), Box::new(w))
            }
        };

        let mut client = Client::from_parts(reader, writer);
        client.handshake(config.password.as_deref()).await?;
        info!("connected to broker");
        Ok(client)
    }

    fn from_parts(reader: BoxedReader, writer: BoxedWriter) -> Client {
        Client {
            lines: BufReader::new(reader).lines(),
            writer,
            state: RosterState::new(),
            dispatcher: Dispatcher::new(),
            running: true,
        }
    }

    async fn handshake(&mut self, password: Option<&str>) -> Result<(), ClientError> {
        let banner = self.receive().await?;
        if Reply::is_challenge(&banner) {
            self.send_command(password.unwrap_or_default()).await?;
            let verdict = self.receive().await?;
            if Reply::is_denied(&verdict) || verdict.starts_with('-') {
                self.running = false;
                return Err(ClientError::BadPassword);
            }
        }
        Ok(())
    }

    /// Register a handler for one named event.
    pub fn on<F>(&mut self, name: &'static str, handler: F)
    where
        F: FnMut(&ParsedEvent) + Send + 'static,
    {
        self.dispatcher.on(name, handler);
    }

    /// Register the raw-line fallback handler.
    pub fn on_raw<F>(&mut self, handler: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.dispatcher.on_raw(handler);
    }

    /// The local roster/ban/op cache.
    pub fn roster(&self) -> &RosterState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Receive loop: classify and dispatch every broadcast line until the
    /// connection drops. Connection loss surfaces as `ConnectionClosed`
    /// and leaves `is_running` false.
    pub async fn run(&mut self) -> Result<(), ClientError> {
        loop {
            self.process_next().await?;
        }
    }

    /// Receive and dispatch one broadcast line. [`run`](Client::run) is
    /// this in a loop; callers interleaving their own I/O (a local stdin
    /// prompt, say) drive it from a `select!` instead. Cancellation-safe:
    /// a partially read line stays buffered.
    pub async fn process_next(&mut self) -> Result<(), ClientError> {
        let line = self.receive().await?;
        self.handle_line(&line);
        Ok(())
    }

    fn handle_line(&mut self, line: &str) {
        if let Some(event) = self.dispatcher.dispatch(line) {
            self.state.apply(&event);
        }
    }

    async fn receive(&mut self) -> Result<String, ClientError> {
        match self.lines.next_line().await {
            Ok(Some(line)) => Ok(line.trim_end_matches('\r').to_string()),
            Ok(None) => {
                self.running = false;
                Err(ClientError::ConnectionClosed)
            }
            Err(e) => {
                self.running = false;
                Err(e.into())
            }
        }
    }

    /// Send one raw command line to the broker.
    pub async fn send_command(&mut self, command: &str) -> Result<(), ClientError> {
        debug!(%command, "sending");
        self.writer.write_all(command.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Broadcast a chat message, wrapped to the game line width.
    pub async fn say(&mut self, message: &str) -> Result<(), ClientError> {
        for line in wrap(message, LINE_WIDTH, WRAP_INDENT) {
            self.send_command(&format!("say {line}")).await?;
        }
        Ok(())
    }

    /// Broadcast a chat message on a single unwrapped line.
    pub async fn say_unwrapped(&mut self, message: &str) -> Result<(), ClientError> {
        self.send_command(&format!("say {message}")).await
    }

    /// Whisper to an online player, wrapped to the game line width.
    pub async fn tell(&mut self, target: &str, message: &str) -> Result<(), ClientError> {
        self.require_online(target)?;
        for line in wrap(message, LINE_WIDTH, WRAP_INDENT) {
            self.send_command(&format!("tell {target} {line}")).await?;
        }
        Ok(())
    }

    /// Whisper a single unwrapped line.
    pub async fn tell_unwrapped(&mut self, target: &str, message: &str) -> Result<(), ClientError> {
        self.require_online(target)?;
        self.send_command(&format!("tell {target} {message}")).await
    }

    pub async fn kick(&mut self, target: &str) -> Result<(), ClientError> {
        self.require_online(target)?;
        self.send_command(&format!("kick {target}")).await
    }

    /// Ban a player name or a dotted-quad IP address.
    pub async fn ban(&mut self, target: &str) -> Result<(), ClientError> {
        let target = target.trim();
        if IPV4.is_match(target) {
            if self.state.is_banned_ip(target) {
                return Err(ClientError::invalid(target, TargetError::AlreadyBanned));
            }
            self.send_command(&format!("ban-ip {target}")).await
        } else {
            if self.state.is_banned_player(target) {
                return Err(ClientError::invalid(target, TargetError::AlreadyBanned));
            }
            self.send_command(&format!("ban {target}")).await
        }
    }

    /// Lift a ban on a player name or IP address.
    pub async fn unban(&mut self, target: &str) -> Result<(), ClientError> {
        let target = target.trim();
        if IPV4.is_match(target) {
            if !self.state.is_banned_ip(target) {
                return Err(ClientError::invalid(target, TargetError::NotBanned));
            }
            self.send_command(&format!("pardon-ip {target}")).await
        } else {
            if !self.state.is_banned_player(target) {
                return Err(ClientError::invalid(target, TargetError::NotBanned));
            }
            self.send_command(&format!("pardon {target}")).await
        }
    }

    pub async fn op(&mut self, player: &str) -> Result<(), ClientError> {
        if self.state.is_op(player) {
            return Err(ClientError::invalid(player, TargetError::AlreadyOp));
        }
        self.send_command(&format!("op {player}")).await
    }

    pub async fn deop(&mut self, player: &str) -> Result<(), ClientError> {
        if !self.state.is_op(player) {
            return Err(ClientError::invalid(player, TargetError::NotOp));
        }
        self.send_command(&format!("deop {player}")).await
    }

    /// Give items, split into full stacks plus a remainder, each transfer
    /// preceded by an informational whisper.
    pub async fn give(
        &mut self,
        player: &str,
        item: u32,
        quantity: u32,
    ) -> Result<(), ClientError> {
        self.require_online(player)?;
        for command in give_plan(player, item, quantity) {
            self.send_command(&command).await?;
        }
        Ok(())
    }

    /// Teleport `source` to `destination`; both must be online.
    pub async fn teleport(&mut self, source: &str, destination: &str) -> Result<(), ClientError> {
        self.require_online(source)?;
        self.require_online(destination)?;
        self.send_command(&format!("tp {source} {destination}")).await
    }

    /// Request disconnect and drain until the broker acknowledges.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.send_command(".close").await?;
        loop {
            match self.receive().await {
                Ok(line) => {
                    if matches!(Reply::parse(&line), Some(Reply::Closing | Reply::Goodbye)) {
                        break;
                    }
                    self.handle_line(&line);
                }
                Err(ClientError::ConnectionClosed) => break,
                Err(e) => return Err(e),
            }
        }
        self.running = false;
        Ok(())
    }

    fn require_online(&self, target: &str) -> Result<(), ClientError> {
        if self.state.is_online(target) {
            Ok(())
        } else {
            Err(ClientError::invalid(target, TargetError::NotFound))
        }
    }
}

/// The exact command sequence for a `give`, in send order: a `tell` before
/// every transfer, one transfer per full stack, then the remainder.
fn give_plan(player: &str, item: u32, quantity: u32) -> Vec<String> {
    let stacks = quantity / STACK_SIZE;
    let remainder = quantity % STACK_SIZE;

    let mut commands = Vec::new();
    for stack in 0..stacks {
        commands.push(format!(
            "tell {player} Giving you {STACK_SIZE} (stack #{stack}) of {item}"
        ));
        commands.push(format!("give {player} {item} {STACK_SIZE}"));
    }
    if remainder != 0 {
        commands.push(format!(
            "tell {player} Giving you the remaining {remainder} of {item}"
        ));
        commands.push(format!("give {player} {item} {remainder}"));
    }
    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{duplex, DuplexStream};
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    const TS: &str = "2024-01-01 00:00:00 [INFO]";

    fn split_client(stream: DuplexStream) -> Client {
        let (r, w) = tokio::io::split(stream);
        Client::from_parts(Box::new(r), Box::new(w))
    }

    /// Reads command lines the client wrote to its half of the duplex.
    async fn sent_line(lines: &mut Lines<BufReader<tokio::io::ReadHalf<DuplexStream>>>) -> String {
        timeout(Duration::from_secs(5), lines.next_line())
            .await
            .expect("timed out")
            .expect("read error")
            .expect("client closed pipe")
    }

    fn harness() -> (Client, Lines<BufReader<tokio::io::ReadHalf<DuplexStream>>>) {
        let (client_side, broker_side) = duplex(64 * 1024);
        let client = split_client(client_side);
        let (r, _w) = tokio::io::split(broker_side);
        (client, BufReader::new(r).lines())
    }

    fn bring_online(client: &mut Client, player: &str) {
        client.handle_line(&format!("{TS} {player} [/10.0.0.7:54321] logged in"));
    }

    #[test]
    fn give_130_is_three_transfers_with_three_tells() {
        let plan = give_plan("Steve", 17, 130);
        assert_eq!(
            plan,
            vec![
                "tell Steve Giving you 64 (stack #0) of 17",
                "give Steve 17 64",
                "tell Steve Giving you 64 (stack #1) of 17",
                "give Steve 17 64",
                "tell Steve Giving you the remaining 2 of 17",
                "give Steve 17 2",
            ]
        );
    }

    #[test]
    fn give_of_exact_stacks_has_no_remainder() {
        let plan = give_plan("Steve", 17, 128);
        assert_eq!(plan.len(), 4);
        assert_eq!(plan.last().unwrap(), "give Steve 17 64");
    }

    #[tokio::test]
    async fn kick_validates_against_the_roster() {
        let (mut client, mut sent) = harness();
        bring_online(&mut client, "Steve");

        client.kick("steve").await.expect("steve is online");
        assert_eq!(sent_line(&mut sent).await, "kick steve");

        let err = client.kick("Alex").await.unwrap_err();
        match err {
            ClientError::InvalidTarget { target, reason } => {
                assert_eq!(target, "Alex");
                assert_eq!(reason, TargetError::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn tell_wraps_long_messages_into_ordered_commands() {
        let (mut client, mut sent) = harness();
        bring_online(&mut client, "Steve");

        let message = "one two three four five six seven eight nine ten eleven \
                       twelve thirteen fourteen fifteen sixteen seventeen";
        assert!(message.len() >= 100);
        client.tell("Steve", message).await.expect("send ok");

        let mut bodies = Vec::new();
        for _ in 0..3 {
            let line = sent_line(&mut sent).await;
            let body = line.strip_prefix("tell Steve ").expect("tell command");
            bodies.push(body.to_string());
        }
        let rebuilt: Vec<String> = bodies
            .iter()
            .map(|b| b.strip_prefix(">>").unwrap_or(b))
            .flat_map(str::split_whitespace)
            .map(str::to_string)
            .collect();
        let original: Vec<String> = message.split_whitespace().map(str::to_string).collect();
        assert_eq!(rebuilt, original);
    }

    #[tokio::test]
    async fn ban_dispatches_on_target_shape() {
        let (mut client, mut sent) = harness();

        client.ban("10.0.0.7").await.expect("ip ban");
        assert_eq!(sent_line(&mut sent).await, "ban-ip 10.0.0.7");

        client.ban("Griefer").await.expect("player ban");
        assert_eq!(sent_line(&mut sent).await, "ban Griefer");

        // Cache knows about the ban once the broadcast comes back.
        client.handle_line(&format!("{TS} [CONSOLE] Banning Griefer"));
        let err = client.ban("griefer").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::InvalidTarget {
                reason: TargetError::AlreadyBanned,
                ..
            }
        ));

        client.unban("Griefer").await.expect("pardon");
        assert_eq!(sent_line(&mut sent).await, "pardon Griefer");

        let err = client.unban("10.0.0.8").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::InvalidTarget {
                reason: TargetError::NotBanned,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn op_and_deop_check_the_op_cache() {
        let (mut client, mut sent) = harness();

        client.op("Steve").await.expect("not yet an op");
        assert_eq!(sent_line(&mut sent).await, "op Steve");

        client.handle_line(&format!("{TS} [CONSOLE] Opping Steve"));
        assert!(matches!(
            client.op("Steve").await.unwrap_err(),
            ClientError::InvalidTarget {
                reason: TargetError::AlreadyOp,
                ..
            }
        ));

        client.deop("Steve").await.expect("is an op");
        assert_eq!(sent_line(&mut sent).await, "deop Steve");

        assert!(matches!(
            client.deop("Alex").await.unwrap_err(),
            ClientError::InvalidTarget {
                reason: TargetError::NotOp,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn teleport_validates_both_ends() {
        let (mut client, mut sent) = harness();
        bring_online(&mut client, "Steve");
        bring_online(&mut client, "Alex");

        client.teleport("Steve", "Alex").await.expect("both online");
        assert_eq!(sent_line(&mut sent).await, "tp Steve Alex");

        assert!(client.teleport("Steve", "Nobody").await.is_err());
    }

    #[tokio::test]
    async fn handshake_against_a_fake_broker() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let broker = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (r, mut w) = stream.into_split();
            w.write_all(b"- Enter password\r\n").await.unwrap();
            let mut lines = BufReader::new(r).lines();
            let secret = lines.next_line().await.unwrap().unwrap();
            assert_eq!(secret, "hunter2");
            w.write_all(b"+200\r\n").await.unwrap();
        });

        let config = ClientConfig {
            transport: ClientTransport::Tcp {
                host: "127.0.0.1".to_string(),
                port: addr.port(),
            },
            password: Some("hunter2".to_string()),
        };
        let client = timeout(Duration::from_secs(5), Client::connect(config))
            .await
            .expect("timed out")
            .expect("handshake must succeed");
        assert!(client.is_running());
        broker.await.unwrap();
    }

    #[tokio::test]
    async fn handshake_rejection_is_bad_password() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (r, mut w) = stream.into_split();
            w.write_all(b"- Enter password\r\n").await.unwrap();
            let mut lines = BufReader::new(r).lines();
            let _ = lines.next_line().await;
            w.write_all(b"+403\r\n").await.unwrap();
        });

        let config = ClientConfig {
            transport: ClientTransport::Tcp {
                host: "127.0.0.1".to_string(),
                port: addr.port(),
            },
            password: Some("wrong".to_string()),
        };
        let err = timeout(Duration::from_secs(5), Client::connect(config))
            .await
            .expect("timed out")
            .unwrap_err();
        assert!(matches!(err, ClientError::BadPassword));
    }

    #[tokio::test]
    async fn process_next_dispatches_a_single_broadcast_line() {
        let (client_side, broker_side) = duplex(1024);
        let mut client = split_client(client_side);
        let (_r, mut w) = tokio::io::split(broker_side);

        w.write_all(format!("{TS} Steve [/10.0.0.7:54321] logged in\r\n").as_bytes())
            .await
            .unwrap();
        timeout(Duration::from_secs(5), client.process_next())
            .await
            .expect("timed out")
            .expect("line must dispatch");
        assert!(client.roster().is_online("Steve"));

        // Dropping both broker halves closes the pipe.
        drop(_r);
        drop(w);
        let err = timeout(Duration::from_secs(5), client.process_next())
            .await
            .expect("timed out")
            .unwrap_err();
        assert!(matches!(err, ClientError::ConnectionClosed));
        assert!(!client.is_running());
    }

    #[tokio::test]
    async fn welcome_banner_skips_the_password_exchange() {
        let (client_side, broker_side) = duplex(1024);
        let mut client = split_client(client_side);
        let (_r, mut w) = tokio::io::split(broker_side);

        w.write_all(b"+ Welcome\r\n").await.unwrap();
        timeout(Duration::from_secs(5), client.handshake(None))
            .await
            .expect("timed out")
            .expect("open broker needs no password");
    }
}
