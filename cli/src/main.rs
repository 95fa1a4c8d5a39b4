//! Interlink CLI - echo server and client over local sockets.
//!
//! ```text
//! interlink support                          probe which name types work here
//! interlink serve <NAME> [--max-clients N]   line echo server
//! interlink send <NAME> <MESSAGE>            send one line, print the echo
//! ```
//!
//! Log output goes to stderr and is filtered by `INTERLINK_LOG`, then
//! `RUST_LOG`, defaulting to `info`.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::task::JoinSet;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use interlink::local_socket::tokio::{LocalSocketListener, LocalSocketStream};
use interlink::local_socket::NameTypeSupport;

const LOG_ENV: &str = "INTERLINK_LOG";

/// First pause after a failed accept; doubles per consecutive failure.
const ACCEPT_BACKOFF_START: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(ACCEPT_BACKOFF_MAX)
}

#[derive(Debug, Parser)]
#[command(name = "interlink", version, about = "Local socket echo server and client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print which local socket name types this platform supports
    Support,
    /// Echo every line received back to its sender
    Serve {
        /// Socket name; a leading `@` selects the namespace
        name: String,
        /// Stop accepting after this many clients and exit once they disconnect
        #[arg(long, value_name = "N")]
        max_clients: Option<usize>,
    },
    /// Send one line and print the reply
    Send {
        name: String,
        message: String,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Command::Support => {
            print_support(NameTypeSupport::query());
            Ok(())
        }
        Command::Serve { name, max_clients } => serve(&name, max_clients).await,
        Command::Send { name, message } => {
            let reply = send(&name, &message).await?;
            println!("{reply}");
            Ok(())
        }
    }
}

fn print_support(support: NameTypeSupport) {
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    println!("{support:?}");
    println!("paths:      {}", yes_no(support.paths_supported()));
    println!("namespaced: {}", yes_no(support.namespace_supported()));
}

async fn serve(name: &str, max_clients: Option<usize>) -> Result<()> {
    let listener =
        LocalSocketListener::bind(name).with_context(|| format!("Failed to bind {name}"))?;
    tracing::info!(name, "Listening");

    let mut clients = JoinSet::new();
    let mut accepted = 0_usize;
    let mut backoff = ACCEPT_BACKOFF_START;

    loop {
        if max_clients.is_some_and(|max| accepted >= max) {
            break;
        }
        tokio::select! {
            conn = listener.accept() => {
                let conn = match conn {
                    Ok(conn) => {
                        backoff = ACCEPT_BACKOFF_START;
                        conn
                    }
                    Err(e) => {
                        // Errors like EMFILE persist; don't spin on them
                        tracing::warn!(retry_in = ?backoff, "Accept failed: {e}");
                        tokio::time::sleep(backoff).await;
                        backoff = next_backoff(backoff);
                        continue;
                    }
                };
                accepted += 1;
                let id = accepted;
                match conn.peer_pid() {
                    Ok(pid) => tracing::info!(client = id, pid, "Client connected"),
                    Err(_) => tracing::info!(client = id, "Client connected"),
                }
                clients.spawn(async move {
                    if let Err(e) = echo_lines(conn).await {
                        tracing::warn!(client = id, "Connection failed: {e:#}");
                    }
                    tracing::info!(client = id, "Client disconnected");
                });
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Interrupted, shutting down");
                clients.abort_all();
                return Ok(());
            }
        }
    }

    while clients.join_next().await.is_some() {}
    tracing::info!(accepted, "All clients served");
    Ok(())
}

async fn echo_lines(conn: LocalSocketStream) -> Result<()> {
    let (read, mut write) = conn.split();
    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read line")? {
        tracing::debug!(len = line.len(), "Echoing line");
        write.write_all(line.as_bytes()).await?;
        write.write_all(b"\n").await?;
    }
    Ok(())
}

async fn send(name: &str, message: &str) -> Result<String> {
    let conn = LocalSocketStream::connect(name)
        .await
        .with_context(|| format!("Failed to connect to {name}"))?;
    let (read, mut write) = conn.split();

    write
        .write_all(format!("{message}\n").as_bytes())
        .await
        .context("Failed to send message")?;

    let mut reply = String::new();
    BufReader::new(read)
        .read_line(&mut reply)
        .await
        .context("Failed to read reply")?;
    anyhow::ensure!(!reply.is_empty(), "Server closed the connection without replying");
    Ok(reply.trim_end_matches(['\r', '\n']).to_owned())
}
