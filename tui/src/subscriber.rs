use std::sync::Arc;

use bytes::Bytes;
use http::header::{ACCEPT, CACHE_CONTROL};
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1::SendRequest;
use serde_json::Value;
use shared::types::buffer::EventBuffer;
use shared::types::event::{RealtimeEvent, TriggerRequest};
use shared::types::json_error::TriggerAck;
use shared::types::sse::SseDecoder;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{ApiClient, ClientError};

pub const SSE_PATH: &str = "/api/sse";

// ---------------------------------------------------------------------------
// SubscriberState
// ---------------------------------------------------------------------------

/// What a dashboard view renders: the recent events and whether the stream
/// is currently open.
#[derive(Clone, Debug, Default)]
pub struct SubscriberState {
    pub events: EventBuffer,
    pub is_connected: bool,
    closed: bool,
}

impl SubscriberState {
    /// The stream answered with 200.
    pub fn on_open(&mut self) {
        if !self.closed {
            self.is_connected = true;
        }
    }

    /// Parse one `data:` payload and buffer it. A payload that is not a
    /// valid event is logged and dropped; returns whether it was kept.
    pub fn on_message(&mut self, data: &str) -> bool {
        if self.closed {
            return false;
        }
        match serde_json::from_str::<RealtimeEvent>(data) {
            Ok(event) => {
                debug!("Realtime event received: {}", event.event_type());
                self.events.push(event);
                true
            }
            Err(e) => {
                warn!("Dropping malformed realtime message: {}", e);
                false
            }
        }
    }

    /// Transport failure or the server ended the stream.
    pub fn on_error(&mut self) {
        self.is_connected = false;
    }

    /// Consumer is done. Nothing is applied after this, even from a stream
    /// task that has not noticed the abort yet.
    pub fn on_close(&mut self) {
        self.is_connected = false;
        self.closed = true;
    }
}

// ---------------------------------------------------------------------------
// RealtimeSubscriber
// ---------------------------------------------------------------------------

/// Client side of the realtime stream.
///
/// `connect` spawns one task that opens a single `GET /api/sse` connection
/// and feeds every decoded message into a `watch` channel. There is no
/// automatic reconnect: when the stream fails, `is_connected` drops to false
/// and stays there.
#[derive(Debug)]
pub struct RealtimeSubscriber {
    client: ApiClient,
    state: Arc<watch::Sender<SubscriberState>>,
    task: Option<JoinHandle<()>>,
}

impl RealtimeSubscriber {
    /// Start subscribing to `base_url` (e.g. `http://127.0.0.1:1337`).
    ///
    /// Returns as soon as the stream task is spawned; watch `is_connected`
    /// for the open. Must be called from within a Tokio runtime.
    pub fn connect(base_url: &str) -> Result<Self, ClientError> {
        let client = ApiClient::new(base_url)?;
        let (tx, _) = watch::channel(SubscriberState::default());
        let state = Arc::new(tx);

        let task = tokio::spawn(run_stream(client.clone(), state.clone()));

        Ok(Self {
            client,
            state,
            task: Some(task),
        })
    }

    /// Buffered events, oldest first.
    pub fn events(&self) -> Vec<RealtimeEvent> {
        self.state.borrow().events.to_vec()
    }

    pub fn latest_event(&self) -> Option<RealtimeEvent> {
        self.state.borrow().events.latest().cloned()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected
    }

    /// Change notifications for the whole state.
    pub fn watch(&self) -> watch::Receiver<SubscriberState> {
        self.state.subscribe()
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Ask the server to broadcast `{type, data}`.
    ///
    /// Local state is untouched; if the server accepts the event it comes
    /// back through the stream like any other.
    pub async fn send_test_event(
        &self,
        event_type: &str,
        data: Value,
    ) -> Result<TriggerAck, ClientError> {
        let request = serde_json::to_value(TriggerRequest {
            event_type: event_type.to_string(),
            data,
        })?;

        let (status, body) = self.client.post_json(SSE_PATH, &request).await?;
        let ack: TriggerAck = serde_json::from_value(body)?;
        if !ack.success {
            warn!("Trigger for {} rejected ({}): {}", event_type, status, ack.message);
        }
        Ok(ack)
    }

    /// Drop the connection and mark the state closed. Safe to call more than
    /// once, and before the stream ever opened.
    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Realtime subscriber closed");
        }
        self.state.send_modify(SubscriberState::on_close);
    }
}

impl Drop for RealtimeSubscriber {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_stream(client: ApiClient, state: Arc<watch::Sender<SubscriberState>>) {
    let result = match client.handshake().await {
        Ok((sender, conn)) => {
            tokio::select! {
                res = conn => res.map_err(ClientError::from),
                res = read_events(sender, &client, &state) => res,
            }
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => info!("Realtime stream ended by server"),
        Err(e) => warn!("Realtime stream failed: {}", e),
    }
    state.send_modify(SubscriberState::on_error);
}

async fn read_events(
    mut sender: SendRequest<Full<Bytes>>,
    client: &ApiClient,
    state: &watch::Sender<SubscriberState>,
) -> Result<(), ClientError> {
    let request = client
        .request(Method::GET, SSE_PATH)
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .body(Full::new(Bytes::new()))?;

    let response = sender.send_request(request).await?;
    if response.status() != StatusCode::OK {
        return Err(ClientError::Status(response.status()));
    }
    state.send_modify(SubscriberState::on_open);
    info!("Realtime stream open: {}", client.authority());

    let mut body = response.into_body();
    let mut decoder = SseDecoder::new();

    while let Some(frame) = body.frame().await {
        let frame = frame?;
        let Some(chunk) = frame.data_ref() else {
            continue;
        };
        for message in decoder.feed(chunk) {
            state.send_modify(|s| {
                s.on_message(&message);
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::types::buffer::EVENT_BUFFER_CAPACITY;

    fn notification_json(message: &str) -> String {
        serde_json::to_string(&RealtimeEvent::notification(message, None)).unwrap()
    }

    #[test]
    fn open_then_error_flips_connected() {
        let mut state = SubscriberState::default();
        assert!(!state.is_connected);
        state.on_open();
        assert!(state.is_connected);
        state.on_error();
        assert!(!state.is_connected);
    }

    #[test]
    fn malformed_message_is_dropped_and_next_one_kept() {
        let mut state = SubscriberState::default();
        state.on_open();

        assert!(!state.on_message("{not json"));
        assert!(!state.on_message(r#"{"type":"mystery","data":{},"timestamp":"x"}"#));
        assert!(state.is_connected);
        assert!(state.events.is_empty());

        assert!(state.on_message(&notification_json("hi")));
        assert_eq!(state.events.len(), 1);
        assert_eq!(state.events.latest().map(RealtimeEvent::event_type), Some("notification"));
    }

    #[test]
    fn buffer_keeps_the_most_recent_fifty() {
        let mut state = SubscriberState::default();
        for i in 0..=EVENT_BUFFER_CAPACITY {
            state.on_message(&notification_json(&format!("n{}", i)));
        }

        let events = state.events.to_vec();
        assert_eq!(events.len(), EVENT_BUFFER_CAPACITY);
        let first = serde_json::to_value(&events[0]).unwrap();
        let last = serde_json::to_value(&events[EVENT_BUFFER_CAPACITY - 1]).unwrap();
        assert_eq!(first["data"]["message"], "n1");
        assert_eq!(last["data"]["message"], format!("n{}", EVENT_BUFFER_CAPACITY));
    }

    #[test]
    fn nothing_applies_after_close() {
        let mut state = SubscriberState::default();
        state.on_close();
        state.on_open();
        assert!(!state.is_connected);
        assert!(!state.on_message(&notification_json("late")));
        assert!(state.events.is_empty());
    }

    #[tokio::test]
    async fn close_before_open_is_safe() {
        // Port 9 (discard) on loopback is almost never listening.
        let mut subscriber = RealtimeSubscriber::connect("http://127.0.0.1:9").unwrap();
        subscriber.close();
        subscriber.close();
        assert!(!subscriber.is_connected());
        assert!(subscriber.events().is_empty());
    }

    #[tokio::test]
    async fn refused_connection_stays_disconnected() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let subscriber = RealtimeSubscriber::connect(&format!("http://{}", addr)).unwrap();
        let mut changes = subscriber.watch();
        // The failing task publishes once; nothing ever marks it connected.
        let _ = tokio::time::timeout(std::time::Duration::from_secs(2), changes.changed()).await;
        assert!(!subscriber.is_connected());
    }

    #[test]
    fn invalid_url_is_rejected_up_front() {
        assert!(matches!(
            RealtimeSubscriber::connect("ftp://gym"),
            Err(ClientError::InvalidUrl(_))
        ));
    }
}
