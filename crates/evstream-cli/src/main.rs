//! Evstream CLI
//!
//! Headless companion for the inspector daemon: fetches the collected
//! event records or asks the daemon to clear them. Records print to
//! stdout; logs go to stderr so output stays pipeable.

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use evstream_core::protocol::{Hello, Response};
use evstream_core::wire;

#[derive(Parser, Debug)]
#[command(name = "evstream")]
#[command(version, about = "Inspect the evstream event collection", long_about = None)]
struct Cli {
    /// Daemon address
    #[arg(long, default_value = "127.0.0.1:9750", env = "EVSTREAM_ADDR")]
    addr: String,

    /// Instance identity to present to the daemon
    #[arg(long, env = "EVSTREAM_INSTANCE_ID")]
    instance_id: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and print every collected event record
    Events {
        /// Pretty-print the records as one JSON array
        #[arg(long)]
        pretty: bool,
    },
    /// Clear the daemon's event store
    Reset,
}

#[allow(clippy::print_stdout, clippy::print_stderr)]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "evstream=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), addr = %cli.addr, "Starting evstream CLI");

    let mut conn = DaemonConnection::connect(&cli.addr, &cli.instance_id).await?;

    match cli.command {
        Command::Events { pretty } => {
            let reply = conn.request(serde_json::json!({"type": "get-data"})).await?;
            let Response::ReceiveData { data } = reply else {
                anyhow::bail!("Daemon sent an unexpected reply");
            };
            if pretty {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                for record in &data {
                    println!("{record}");
                }
            }
        }
        Command::Reset => {
            let reply = conn.request(serde_json::json!({"type": "reset"})).await?;
            anyhow::ensure!(
                reply == Response::ResetFinished,
                "Daemon sent an unexpected reply"
            );
            eprintln!("Event store cleared");
        }
    }

    Ok(())
}

/// One NDJSON connection to the inspector daemon.
struct DaemonConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl DaemonConnection {
    /// Connect and present our identity.
    async fn connect(addr: &str, instance_id: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();
        let mut conn = Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        };
        wire::write_value(
            &mut conn.writer,
            &Hello {
                sender: instance_id.to_string(),
            },
        )
        .await?;
        Ok(conn)
    }

    /// Send one request and await the single reply.
    async fn request(&mut self, message: serde_json::Value) -> anyhow::Result<Response> {
        wire::write_value(&mut self.writer, &message).await?;
        match wire::read_value(&mut self.reader).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => anyhow::bail!(
                "Daemon closed the connection without replying; check that \
                 --instance-id matches the daemon's identity"
            ),
        }
    }
}
