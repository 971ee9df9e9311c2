//! Notification channel delivering final results pushed by the portal server
//!
//! The session owns its channel: it is opened before the session starts and
//! closed with it. Implementations must make [`NotificationChannel::next_event`]
//! cancel-safe because the session polls it inside `tokio::select!`.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::{InsuranceError, InsuranceResult};
use crate::models::{ChannelFrame, NotificationEvent};

#[async_trait]
pub trait NotificationChannel: Send {
    /// Next result event, or `None` once the channel has closed
    async fn next_event(&mut self) -> Option<InsuranceResult<NotificationEvent>>;

    async fn close(&mut self) -> InsuranceResult<()>;
}

/// WebSocket client for the portal's `/ws` endpoint
pub struct WebSocketChannel {
    url: String,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WebSocketChannel {
    pub async fn connect(url: &str) -> InsuranceResult<Self> {
        let (stream, response) = tokio_tungstenite::connect_async(url).await?;
        info!(url, status = response.status().as_u16(), "Notification channel connected");
        Ok(Self {
            url: url.to_string(),
            stream,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl NotificationChannel for WebSocketChannel {
    async fn next_event(&mut self) -> Option<InsuranceResult<NotificationEvent>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(e.into())),
            };

            match message {
                Message::Text(text) => match serde_json::from_str::<ChannelFrame>(&text) {
                    Ok(frame) => {
                        let event_name = frame.event.clone();
                        match frame.into_notification() {
                            Some(event) => return Some(Ok(event)),
                            None => debug!(event = %event_name, "Skipping channel event"),
                        }
                    }
                    Err(e) => warn!(error = %e, "Discarding malformed channel frame"),
                },
                Message::Close(frame) => {
                    debug!(?frame, "Notification channel closed by server");
                    return None;
                }
                _ => {}
            }
        }
    }

    async fn close(&mut self) -> InsuranceResult<()> {
        match self.stream.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => {
                info!(url = %self.url, "Notification channel closed");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Sending half of an [`InMemoryChannel`]
#[derive(Debug, Clone)]
pub struct InMemoryPublisher {
    sender: mpsc::UnboundedSender<NotificationEvent>,
}

impl InMemoryPublisher {
    pub fn publish(&self, event: NotificationEvent) -> InsuranceResult<()> {
        self.sender
            .send(event)
            .map_err(|_| InsuranceError::Channel("notification channel closed".to_string()))
    }
}

/// Process-local channel, used when the publisher lives in the same program
#[derive(Debug)]
pub struct InMemoryChannel {
    receiver: mpsc::UnboundedReceiver<NotificationEvent>,
}

pub fn in_memory_channel() -> (InMemoryPublisher, InMemoryChannel) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (InMemoryPublisher { sender }, InMemoryChannel { receiver })
}

#[async_trait]
impl NotificationChannel for InMemoryChannel {
    async fn next_event(&mut self) -> Option<InsuranceResult<NotificationEvent>> {
        self.receiver.recv().await.map(Ok)
    }

    async fn close(&mut self) -> InsuranceResult<()> {
        self.receiver.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CorrelationId;
    use axum::extract::ws::{Message as WsMessage, WebSocketUpgrade};
    use axum::{routing::get, Router};
    use serde_json::json;

    async fn spawn_push_server(frames: Vec<String>) -> String {
        let router = Router::new().route(
            "/ws",
            get(move |ws: WebSocketUpgrade| {
                let frames = frames.clone();
                async move {
                    ws.on_upgrade(move |mut socket| async move {
                        for frame in frames {
                            if socket.send(WsMessage::Text(frame)).await.is_err() {
                                return;
                            }
                        }
                        let _ = socket.send(WsMessage::Close(None)).await;
                    })
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("ws://{addr}/ws")
    }

    #[tokio::test]
    async fn websocket_channel_yields_only_acknowledgements() {
        let correlation_id = CorrelationId::new();
        let ack = ChannelFrame::acknowledgement(Some(correlation_id), json!({ "entry": [] }));
        let url = spawn_push_server(vec![
            r#"{"event":"heartbeat","data":{}}"#.to_string(),
            "not json".to_string(),
            serde_json::to_string(&ack).unwrap(),
        ])
        .await;

        let mut channel = WebSocketChannel::connect(&url).await.unwrap();
        let event = channel.next_event().await.unwrap().unwrap();
        assert_eq!(event.correlation_id, Some(correlation_id));
        assert_eq!(event.payload, json!({ "entry": [] }));

        assert!(channel.next_event().await.is_none());
        channel.close().await.unwrap();
    }

    #[tokio::test]
    async fn in_memory_channel_delivers_in_order() {
        let (publisher, mut channel) = in_memory_channel();
        publisher.publish(NotificationEvent::new(json!({ "n": 1 }))).unwrap();
        publisher.publish(NotificationEvent::new(json!({ "n": 2 }))).unwrap();

        assert_eq!(channel.next_event().await.unwrap().unwrap().payload["n"], 1);
        assert_eq!(channel.next_event().await.unwrap().unwrap().payload["n"], 2);

        channel.close().await.unwrap();
        assert!(publisher.publish(NotificationEvent::new(json!({}))).is_err());
    }
}
