//! Server-sent events progress channel.

use crate::channel::{ChannelEvent, ProgressChannel, Subscription};
use crate::client::ApiClient;
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{retry, Error as EventSourceError, Event, EventSource};
use scribe_core::{decode_event, AuthoritativeUpdate, TaskId};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Progress channel backed by the backend's event stream.
///
/// The stream is opened without automatic reconnection: a transport error
/// ends the subscription and the session falls back to a status fetch.
#[derive(Debug, Clone)]
pub struct SseProgressChannel {
    client: ApiClient,
}

impl SseProgressChannel {
    /// Create a channel over an API client.
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// The underlying API client.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

#[async_trait]
impl ProgressChannel for SseProgressChannel {
    async fn subscribe(&self, task_id: &TaskId) -> Result<Subscription> {
        let mut source = EventSource::new(self.client.stream_request(task_id))
            .map_err(|e| ClientError::Stream(e.to_string()))?;
        source.set_retry_policy(Box::new(retry::Never));

        let (tx, rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump_events(
            task_id.clone(),
            source,
            tx,
            self.client.idle_timeout(),
        ));

        debug!("Subscribed to progress stream for task {}", task_id.short());
        Ok(Subscription::new(rx, pump))
    }

    async fn fetch_status(&self, task_id: &TaskId) -> Result<AuthoritativeUpdate> {
        info!("Fetching status for task {}", task_id.short());
        self.client.fetch_update(task_id).await
    }
}

/// Forward decoded events until a terminal update or a transport failure.
///
/// A stream silent for longer than `idle` counts as dropped; heartbeats
/// reset the deadline.
async fn pump_events(
    task_id: TaskId,
    mut source: EventSource,
    tx: mpsc::UnboundedSender<ChannelEvent>,
    idle: Duration,
) {
    loop {
        let event = match timeout(idle, source.next()).await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(_) => {
                warn!(
                    "No event for task {} within {:?}, treating stream as dropped",
                    task_id.short(),
                    idle
                );
                let _ = tx.send(ChannelEvent::Failed(format!("no event within {idle:?}")));
                break;
            }
        };

        match event {
            Ok(Event::Open) => {
                debug!("Progress stream open for task {}", task_id.short());
            }

            Ok(Event::Message(message)) => match decode_event(&message.data) {
                Ok(Some(update)) if update.is_heartbeat() => {
                    debug!("Heartbeat for task {}", task_id.short());
                }
                Ok(Some(update)) => {
                    let terminal = update.is_terminal();
                    if tx.send(ChannelEvent::Update(update)).is_err() {
                        // Receiver dropped
                        break;
                    }
                    if terminal {
                        debug!("Terminal update for task {}, closing stream", task_id.short());
                        break;
                    }
                }
                Ok(None) => {
                    debug!("Heartbeat for task {}", task_id.short());
                }
                Err(e) => {
                    warn!(
                        "Dropping malformed event for task {}: {} - Data: {}",
                        task_id.short(),
                        e,
                        message.data
                    );
                }
            },

            Err(EventSourceError::StreamEnded) => {
                warn!("Progress stream ended early for task {}", task_id.short());
                let _ = tx.send(ChannelEvent::Failed(
                    "stream ended before a terminal status".to_string(),
                ));
                break;
            }

            Err(e) => {
                warn!("Progress stream error for task {}: {}", task_id.short(), e);
                let _ = tx.send(ChannelEvent::Failed(e.to_string()));
                break;
            }
        }
    }

    source.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use scribe_core::UpdateStatus;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const HEADERS: &str = "HTTP/1.1 200 OK\r\n\
        Content-Type: text/event-stream\r\n\
        Cache-Control: no-cache\r\n\
        Connection: close\r\n\r\n";

    /// Serve one event-stream response, then close or keep the socket open.
    async fn serve(body: &'static str, hold_open: bool, idle: Duration) -> SseProgressChannel {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await;

            socket.write_all(HEADERS.as_bytes()).await.unwrap();
            socket.write_all(body.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();

            if hold_open {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
        });

        SseProgressChannel::new(ApiClient::new(
            ClientConfig::default()
                .with_base_url(format!("http://{addr}"))
                .with_idle_timeout(idle),
        ))
    }

    async fn collect(channel: &SseProgressChannel) -> Vec<ChannelEvent> {
        let mut subscription = channel.subscribe(&TaskId::new("task-1")).await.unwrap();

        let mut events = Vec::new();
        let drain = async {
            while let Some(event) = subscription.next().await {
                events.push(event);
            }
        };
        tokio::time::timeout(Duration::from_secs(10), drain)
            .await
            .expect("subscription did not finish");
        events
    }

    #[tokio::test]
    async fn test_heartbeats_and_malformed_events_are_dropped() {
        let body = "data: {\"type\": \"heartbeat\"}\n\n\
                    data: {not json\n\n\
                    data: {\"status\": \"processing\", \"progress\": 10, \"message\": \"Parsing video info...\"}\n\n";
        let channel = serve(body, false, Duration::from_secs(5)).await;

        let events = collect(&channel).await;
        assert_eq!(
            events,
            vec![
                ChannelEvent::Update(AuthoritativeUpdate::progress(10.0, "Parsing video info...")),
                ChannelEvent::Failed("stream ended before a terminal status".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_closes_after_terminal_update() {
        let body = "data: {\"status\": \"processing\", \"progress\": 40, \"message\": \"Transcribing audio...\"}\n\n\
                    data: {\"status\": \"completed\", \"progress\": 100, \"message\": \"Processing completed!\", \"script\": \"hi\", \"video_title\": \"Talk\"}\n\n\
                    data: {\"status\": \"processing\", \"progress\": 50, \"message\": \"late\"}\n\n";
        let channel = serve(body, false, Duration::from_secs(5)).await;

        let events = collect(&channel).await;
        assert_eq!(events.len(), 2);
        match &events[1] {
            ChannelEvent::Update(update) => {
                assert_eq!(update.status, UpdateStatus::Completed);
                let payload = update.payload.as_ref().unwrap();
                assert_eq!(payload.script, "hi");
                assert_eq!(payload.video_title.as_deref(), Some("Talk"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_status_is_forwarded() {
        let body = "data: {\"status\": \"error\", \"error\": \"ERROR: Unsupported URL\"}\n\n";
        let channel = serve(body, false, Duration::from_secs(5)).await;

        let events = collect(&channel).await;
        assert_eq!(
            events,
            vec![ChannelEvent::Update(AuthoritativeUpdate {
                status: UpdateStatus::Error,
                progress: None,
                message: None,
                payload: None,
                error: Some("ERROR: Unsupported URL".to_string()),
            })]
        );
    }

    #[tokio::test]
    async fn test_silent_stream_is_reported_as_failed() {
        let body = "data: {\"status\": \"processing\", \"progress\": 10, \"message\": \"Downloading video...\"}\n\n";
        let channel = serve(body, true, Duration::from_millis(300)).await;

        let events = collect(&channel).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ChannelEvent::Update(u) if u.progress == Some(10.0)));
        assert_eq!(events[1], ChannelEvent::Failed("no event within 300ms".to_string()));
    }
}
