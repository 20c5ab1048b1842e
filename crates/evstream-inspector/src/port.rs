//! Connection port between the relay and one inspector peer.
//!
//! A port is split into two channel-backed halves: the relay holds
//! [`InspectorPort`] (post responses, receive events), the transport pump
//! holds [`PortTransport`]. Dropping the relay half closes both channels,
//! which the transport observes as an order to hang up.

use serde_json::Value;
use tokio::sync::mpsc;

use evstream_core::protocol::Response;

/// Identity delivered by the transport when a peer connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSender {
    /// Instance id the peer claims to share with this daemon.
    pub instance_id: String,
}

/// Events delivered on the relay half of a port.
#[derive(Debug)]
pub enum PortEvent {
    /// An inbound request message from the peer.
    Message(Value),
    /// The peer hung up or the transport failed.
    Disconnected,
}

/// Relay-side half of a peer connection.
#[derive(Debug)]
pub struct InspectorPort {
    sender: PortSender,
    responses: mpsc::Sender<Response>,
    events: mpsc::Receiver<PortEvent>,
}

/// Transport-side half of a peer connection.
#[derive(Debug)]
pub struct PortTransport {
    /// Responses posted by the relay, to be written to the peer.
    pub responses: mpsc::Receiver<Response>,
    /// Inbound events observed on the underlying stream.
    pub events: mpsc::Sender<PortEvent>,
}

/// Build the two halves of a port over bounded channels.
pub fn port_pair(sender: PortSender, capacity: usize) -> (InspectorPort, PortTransport) {
    let (response_tx, response_rx) = mpsc::channel(capacity);
    let (event_tx, event_rx) = mpsc::channel(capacity);
    (
        InspectorPort {
            sender,
            responses: response_tx,
            events: event_rx,
        },
        PortTransport {
            responses: response_rx,
            events: event_tx,
        },
    )
}

impl InspectorPort {
    /// Identity of the connected peer.
    pub const fn sender(&self) -> &PortSender {
        &self.sender
    }

    /// Sender half used to post responses to the peer.
    pub fn response_sender(&self) -> mpsc::Sender<Response> {
        self.responses.clone()
    }

    /// Receive the next event from the peer.
    ///
    /// `None` means the transport dropped its half; treat it as a
    /// disconnect.
    pub async fn next_event(&mut self) -> Option<PortEvent> {
        self.events.recv().await
    }

    /// Terminate the connection.
    ///
    /// Both channel halves close; the transport sees this and hangs up the
    /// underlying stream.
    pub fn shutdown(self) {
        drop(self);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_closes_both_halves() {
        let (port, mut transport) = port_pair(
            PortSender {
                instance_id: "i".into(),
            },
            4,
        );

        port.shutdown();

        assert!(transport.responses.recv().await.is_none());
        assert!(transport.events.is_closed());
    }

    #[tokio::test]
    async fn transport_drop_surfaces_as_closed_events() {
        let (mut port, transport) = port_pair(
            PortSender {
                instance_id: "i".into(),
            },
            4,
        );

        drop(transport);

        assert!(port.next_event().await.is_none());
    }
}
