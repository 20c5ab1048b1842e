//! Inspector relay: routes peer requests to the event store.
//!
//! The relay owns a single connection slot. A newly accepted port replaces
//! the previous one, which is shut down first so no stale transport keeps
//! running. Identity is checked before a port is installed: the peer must
//! present this daemon's own instance id.

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use evstream_core::protocol::{ParseError, Request, Response, parse_request};

use crate::port::{InspectorPort, PortEvent};
use crate::storage::{DatabaseError, EventStreamStore};

/// Errors surfaced by relay message handling.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),

    #[error("Inspector connection closed before the response was sent")]
    ConnectionClosed,
}

/// Routes messages between the event store and the connected inspector peer.
///
/// At most one connection is live at any time. Every inbound message yields
/// exactly one of: a single response on the same connection, or a
/// [`RelayError`] (in which case nothing is sent).
pub struct InspectorRelay {
    instance_id: String,
    store: EventStreamStore,
    connections: mpsc::Receiver<InspectorPort>,
    port: Option<InspectorPort>,
}

impl InspectorRelay {
    /// Create a relay serving `store` to peers offered on `connections`.
    ///
    /// The relay is an ordinary value: whoever wires the daemon constructs
    /// it once and hands the matching connection sender to the frontend.
    pub fn new(
        instance_id: String,
        store: EventStreamStore,
        connections: mpsc::Receiver<InspectorPort>,
    ) -> Self {
        Self {
            instance_id,
            store,
            connections,
            port: None,
        }
    }

    /// Storage endpoint shared with event producers.
    pub const fn store(&self) -> &EventStreamStore {
        &self.store
    }

    /// Run until `shutdown` flips or the connection source is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                offered = self.connections.recv() => {
                    match offered {
                        Some(port) => self.accept_port(port),
                        None => {
                            info!("Connection source closed, relay stopping");
                            return;
                        }
                    }
                }
                event = Self::next_port_event(self.port.as_mut()) => {
                    match event {
                        Some(PortEvent::Message(raw)) => self.spawn_dispatch(raw),
                        Some(PortEvent::Disconnected) | None => self.handle_disconnect(),
                    }
                }
                _ = shutdown.changed() => {
                    info!("Relay received shutdown signal");
                    return;
                }
            }
        }
    }

    /// Pending event on the current port, or pending forever when no peer
    /// is connected.
    async fn next_port_event(port: Option<&mut InspectorPort>) -> Option<PortEvent> {
        match port {
            Some(port) => port.next_event().await,
            None => std::future::pending().await,
        }
    }

    /// Install an offered connection after verifying the peer's identity.
    ///
    /// A peer that does not present this daemon's own instance id is
    /// rejected: the port is shut down and nothing else happens. An
    /// accepted port replaces the current one, which is shut down first.
    fn accept_port(&mut self, port: InspectorPort) {
        if port.sender().instance_id != self.instance_id {
            error!(
                sender = %port.sender().instance_id,
                "Received connection from unexpected sender"
            );
            port.shutdown();
            return;
        }

        if let Some(previous) = self.port.replace(port) {
            info!("Replacing existing inspector connection");
            previous.shutdown();
        } else {
            info!("Inspector connected");
        }
    }

    /// Clear the connection slot after the peer hung up or the transport
    /// failed, so no further send is attempted on a dead channel.
    fn handle_disconnect(&mut self) {
        info!("Inspector disconnected");
        self.port = None;
    }

    /// Handle one inbound message on its own task so a slow storage
    /// operation never blocks connection management.
    fn spawn_dispatch(&self, raw: Value) {
        let Some(port) = self.port.as_ref() else {
            return;
        };
        let store = self.store.clone();
        let responses = port.response_sender();

        tokio::spawn(async move {
            match dispatch(&store, &responses, &raw).await {
                Ok(()) => {}
                Err(e @ RelayError::Parse(_)) => warn!(error = %e, "Inspector message rejected"),
                Err(e) => error!(error = %e, "Inspector message handling failed"),
            }
        });
    }
}

/// Route one inbound message: fetch-and-send for `get-data`,
/// reset-and-notify for `reset`.
///
/// On success exactly one response has been posted; on failure nothing was
/// sent and the error describes the cause (including the offending type for
/// unrecognized messages).
pub async fn dispatch(
    store: &EventStreamStore,
    responses: &mpsc::Sender<Response>,
    raw: &Value,
) -> Result<(), RelayError> {
    match parse_request(raw)? {
        Request::GetData => {
            let data = store.get().await?;
            responses
                .send(Response::ReceiveData { data })
                .await
                .map_err(|_| RelayError::ConnectionClosed)
        }
        Request::Reset => {
            store.reset().await?;
            responses
                .send(Response::ResetFinished)
                .await
                .map_err(|_| RelayError::ConnectionClosed)
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::port::{PortSender, port_pair};
    use serde_json::json;

    const INSTANCE: &str = "instance-1";

    async fn store_with(records: &[Value]) -> EventStreamStore {
        let store = EventStreamStore::open_in_memory().await.unwrap();
        for record in records {
            store.push(record).await.unwrap();
        }
        store
    }

    fn sender(instance_id: &str) -> PortSender {
        PortSender {
            instance_id: instance_id.into(),
        }
    }

    #[tokio::test]
    async fn get_data_sends_full_snapshot_once() {
        let store = store_with(&[json!({"kind": "attention"}), json!({"kind": "audio"})]).await;
        let (tx, mut rx) = mpsc::channel(4);

        dispatch(&store, &tx, &json!({"type": "get-data"}))
            .await
            .unwrap();

        let response = rx.recv().await.unwrap();
        assert_eq!(
            response,
            Response::ReceiveData {
                data: vec![json!({"kind": "attention"}), json!({"kind": "audio"})],
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reset_clears_store_and_confirms() {
        let store = store_with(&[json!({"a": 1}), json!({"b": 2})]).await;
        let (tx, mut rx) = mpsc::channel(4);

        dispatch(&store, &tx, &json!({"type": "reset"}))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), Response::ResetFinished);
        assert!(rx.try_recv().is_err());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_type_fails_without_sending() {
        let store = store_with(&[json!({"a": 1})]).await;
        let (tx, mut rx) = mpsc::channel(4);

        let err = dispatch(&store, &tx, &json!({"type": "unknown"}))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("unknown"));
        assert!(rx.try_recv().is_err());
        // The store is untouched by a rejected message.
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_type_fails_without_sending() {
        let store = store_with(&[]).await;
        let (tx, mut rx) = mpsc::channel(4);

        let err = dispatch(&store, &tx, &json!({"payload": 7}))
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Parse(ParseError::MissingType)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_connection_surfaces_as_error() {
        let store = store_with(&[]).await;
        let (tx, rx) = mpsc::channel(4);
        drop(rx);

        let err = dispatch(&store, &tx, &json!({"type": "get-data"}))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::ConnectionClosed));
    }

    #[tokio::test]
    async fn store_accessor_is_the_producer_endpoint() {
        let store = store_with(&[]).await;
        let (_conn_tx, conn_rx) = mpsc::channel(1);
        let relay = InspectorRelay::new(INSTANCE.into(), store, conn_rx);

        relay
            .store()
            .push(&json!({"kind": "attention"}))
            .await
            .unwrap();
        assert_eq!(relay.store().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn matching_sender_is_accepted() {
        let store = store_with(&[]).await;
        let (_conn_tx, conn_rx) = mpsc::channel(1);
        let mut relay = InspectorRelay::new(INSTANCE.into(), store, conn_rx);

        let (port, transport) = port_pair(sender(INSTANCE), 4);
        relay.accept_port(port);

        assert!(relay.port.is_some());
        assert!(!transport.events.is_closed());
    }

    #[tokio::test]
    async fn mismatched_sender_is_rejected_and_terminated() {
        let store = store_with(&[]).await;
        let (_conn_tx, conn_rx) = mpsc::channel(1);
        let mut relay = InspectorRelay::new(INSTANCE.into(), store, conn_rx);

        let (port, mut transport) = port_pair(sender("someone-else"), 4);
        relay.accept_port(port);

        assert!(relay.port.is_none());
        // The transport observes the rejection as closed channels.
        assert!(transport.responses.recv().await.is_none());
        assert!(transport.events.is_closed());
    }

    #[tokio::test]
    async fn new_connection_replaces_and_closes_previous() {
        let store = store_with(&[]).await;
        let (_conn_tx, conn_rx) = mpsc::channel(1);
        let mut relay = InspectorRelay::new(INSTANCE.into(), store, conn_rx);

        let (first, mut first_transport) = port_pair(sender(INSTANCE), 4);
        let (second, second_transport) = port_pair(sender(INSTANCE), 4);

        relay.accept_port(first);
        relay.accept_port(second);

        assert!(first_transport.responses.recv().await.is_none());
        assert!(!second_transport.events.is_closed());
    }

    #[tokio::test]
    async fn dispatch_after_disconnect_is_a_quiet_no_op() {
        let store = store_with(&[]).await;
        let (_conn_tx, conn_rx) = mpsc::channel(1);
        let mut relay = InspectorRelay::new(INSTANCE.into(), store, conn_rx);

        let (port, _transport) = port_pair(sender(INSTANCE), 4);
        relay.accept_port(port);
        relay.handle_disconnect();

        assert!(relay.port.is_none());
        // The slot is cleared, so a late message simply has nowhere to go.
        relay.spawn_dispatch(json!({"type": "get-data"}));
    }

    #[tokio::test]
    async fn run_loop_serves_get_data_and_reset() {
        let store = store_with(&[json!(1), json!(2)]).await;
        let (conn_tx, conn_rx) = mpsc::channel(4);
        let relay = InspectorRelay::new(INSTANCE.into(), store.clone(), conn_rx);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(relay.run(shutdown_rx));

        let (port, mut transport) = port_pair(sender(INSTANCE), 4);
        conn_tx.send(port).await.unwrap();

        transport
            .events
            .send(PortEvent::Message(json!({"type": "get-data"})))
            .await
            .unwrap();
        assert_eq!(
            transport.responses.recv().await.unwrap(),
            Response::ReceiveData {
                data: vec![json!(1), json!(2)],
            }
        );

        transport
            .events
            .send(PortEvent::Message(json!({"type": "reset"})))
            .await
            .unwrap();
        assert_eq!(
            transport.responses.recv().await.unwrap(),
            Response::ResetFinished
        );
        assert_eq!(store.count().await.unwrap(), 0);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn run_loop_accepts_a_new_peer_after_disconnect() {
        let store = store_with(&[]).await;
        let (conn_tx, conn_rx) = mpsc::channel(4);
        let relay = InspectorRelay::new(INSTANCE.into(), store, conn_rx);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(relay.run(shutdown_rx));

        let (first, first_transport) = port_pair(sender(INSTANCE), 4);
        conn_tx.send(first).await.unwrap();
        first_transport
            .events
            .send(PortEvent::Disconnected)
            .await
            .unwrap();

        let (second, mut second_transport) = port_pair(sender(INSTANCE), 4);
        conn_tx.send(second).await.unwrap();

        second_transport
            .events
            .send(PortEvent::Message(json!({"type": "get-data"})))
            .await
            .unwrap();
        assert_eq!(
            second_transport.responses.recv().await.unwrap(),
            Response::ReceiveData { data: vec![] }
        );

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
