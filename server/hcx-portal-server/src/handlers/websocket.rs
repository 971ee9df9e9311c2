use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use insurance_service::ChannelFrame;
use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::server::PortalServer;

/// Fans result frames out to every connected notification client
#[derive(Clone)]
pub struct NotificationHub {
    broadcast_tx: broadcast::Sender<ChannelFrame>,
    /// Connection counter for unique IDs
    connection_counter: Arc<AtomicU64>,
    active_connections: Arc<AtomicUsize>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            broadcast_tx,
            connection_counter: Arc::new(AtomicU64::new(0)),
            active_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Receiver for frames published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelFrame> {
        self.broadcast_tx.subscribe()
    }

    /// Publish a frame, returning how many subscribers will see it
    pub fn publish(&self, frame: ChannelFrame) -> usize {
        // No subscribers is not an error: the result is simply not observed
        self.broadcast_tx.send(frame).unwrap_or(0)
    }

    pub fn connected_clients(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    fn register(&self) -> (u64, broadcast::Receiver<ChannelFrame>) {
        let id = self.connection_counter.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        (id, self.broadcast_tx.subscribe())
    }

    fn unregister(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Handle WebSocket upgrade for notification clients
pub async fn websocket_handler(ws: WebSocketUpgrade, State(server): State<PortalServer>) -> Response {
    let hub = server.hub.clone();
    ws.on_upgrade(move |socket| handle_websocket_connection(socket, hub))
}

async fn handle_websocket_connection(socket: WebSocket, hub: NotificationHub) {
    let (connection_id, mut frames) = hub.register();
    info!(connection_id, "Notification client connected");

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Ping(ping))) => {
                    if sender.send(Message::Pong(ping)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {
                    debug!(connection_id, "Ignoring client message");
                }
                Some(Err(e)) => {
                    warn!(connection_id, error = %e, "WebSocket error");
                    break;
                }
            },
            frame = frames.recv() => match frame {
                Ok(frame) => {
                    let text = match serde_json::to_string(&frame) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(connection_id, error = %e, "Failed to encode frame");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(connection_id, skipped, "Notification client lagging, frames dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    hub.unregister();
    info!(connection_id, "Notification client disconnected");
}
