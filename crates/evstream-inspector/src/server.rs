//! TCP frontend that turns sockets into inspector ports.
//!
//! Speaks newline-delimited JSON. The first line of every connection must
//! be a hello frame naming the sender; the socket is then wrapped into a
//! port and offered to the relay. Trust decisions stay in the relay: the
//! frontend forwards whatever identity the peer claims.

use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use evstream_core::protocol::Response;
use evstream_core::wire;

use crate::port::{InspectorPort, PortEvent, PortSender, PortTransport, port_pair};

/// Capacity of each port's response/event channels.
const PORT_CHANNEL_CAPACITY: usize = 64;

/// Accept inspector connections until `shutdown` flips.
///
/// Each socket is handled on its own task; the relay decides whether the
/// resulting port is kept.
pub async fn serve(
    listener: TcpListener,
    connections: mpsc::Sender<InspectorPort>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "Inspector frontend listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, peer_addr)) => {
                        debug!(peer = %peer_addr, "Socket accepted");
                        let connections = connections.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_socket(socket, connections).await {
                                warn!(peer = %peer_addr, error = %e, "Connection ended with error");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "Accept failed"),
                }
            }
            _ = shutdown.changed() => {
                info!("Inspector frontend shutting down");
                return Ok(());
            }
        }
    }
}

/// Drive one socket: hello exchange, then pump lines and responses until
/// either side hangs up.
async fn handle_socket(
    socket: TcpStream,
    connections: mpsc::Sender<InspectorPort>,
) -> evstream_core::Result<()> {
    let (read_half, write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);

    let hello = match wire::read_value(&mut reader).await? {
        Some(value) => wire::parse_hello(&value)?,
        None => {
            debug!("Socket closed before hello");
            return Ok(());
        }
    };

    let sender = PortSender {
        instance_id: hello.sender,
    };
    let (port, transport) = port_pair(sender, PORT_CHANNEL_CAPACITY);

    if connections.send(port).await.is_err() {
        return Err(evstream_core::Error::Wire(
            "Relay is not accepting connections".into(),
        ));
    }

    let PortTransport { responses, events } = transport;
    let read_task = tokio::spawn(read_loop(reader, events));
    let result = write_loop(write_half, responses).await;

    // The write loop ends when the relay drops the port (rejection,
    // replacement, shutdown) or the socket fails; stop reading and let the
    // halves drop so the peer sees the connection close.
    read_task.abort();
    result
}

/// Forward inbound lines to the relay as port events.
async fn read_loop(mut reader: BufReader<OwnedReadHalf>, events: mpsc::Sender<PortEvent>) {
    loop {
        match wire::read_value(&mut reader).await {
            Ok(Some(value)) => {
                if events.send(PortEvent::Message(value)).await.is_err() {
                    return;
                }
            }
            Ok(None) => {
                let _ = events.send(PortEvent::Disconnected).await;
                return;
            }
            Err(e) => {
                warn!(error = %e, "Inspector stream error");
                let _ = events.send(PortEvent::Disconnected).await;
                return;
            }
        }
    }
}

/// Write relay responses out to the peer until the port is dropped.
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut responses: mpsc::Receiver<Response>,
) -> evstream_core::Result<()> {
    while let Some(response) = responses.recv().await {
        wire::write_value(&mut writer, &response).await?;
    }
    Ok(())
}
