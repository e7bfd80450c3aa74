//! Interactive console client.
//!
//! Connects to a broker over TCP, prints every broadcast line (chat
//! messages and joins called out by the typed handlers), and forwards
//! each local stdin line to the broker as a command.
//!
//! Usage:
//!   cargo run --example console -- 127.0.0.1 9001 [password]

use tokio::io::{AsyncBufReadExt, BufReader};

use mux_client::{Client, ClientConfig, ClientTransport};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port: u16 = args.next().as_deref().unwrap_or("9001").parse()?;
    let password = args.next();

    let config = ClientConfig {
        transport: ClientTransport::Tcp { host, port },
        password,
    };

    let mut client = Client::connect(config).await?;

    client.on("chat_message", |event| {
        println!(
            "[chat] {}: {}",
            event.field("player").unwrap_or("?"),
            event.field("message").unwrap_or("")
        );
    });
    client.on("join", |event| {
        println!("[join] {}", event.field("player").unwrap_or("?"));
    });
    client.on_raw(|line| println!("  {line}"));

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            command = stdin.next_line() => match command? {
                Some(command) if !command.trim().is_empty() => {
                    client.send_command(command.trim()).await?;
                }
                Some(_) => {}
                None => break,
            },
            received = client.process_next() => received?,
        }
    }
    Ok(())
}
