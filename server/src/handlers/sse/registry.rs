use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use shared::types::sse::SinkError;
use tokio::sync::mpsc;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// EventSink
// ---------------------------------------------------------------------------

/// A way to push encoded SSE frames to one connected client.
///
/// Writes must not block or suspend: the broadcaster calls every sink
/// synchronously while holding the registry lock.
pub trait EventSink: Send + Sync {
    fn write(&self, frame: &Bytes) -> Result<(), SinkError>;
}

/// Production sink: the receiving half feeds the client's response body.
/// Once hyper drops that body the receiver is gone and writes fail.
impl EventSink for mpsc::UnboundedSender<Bytes> {
    fn write(&self, frame: &Bytes) -> Result<(), SinkError> {
        self.send(frame.clone()).map_err(|_| SinkError::Disconnected)
    }
}

// ---------------------------------------------------------------------------
// ClientRegistry
// ---------------------------------------------------------------------------

/// The table of currently connected SSE clients, keyed by client id.
///
/// One registry lives in `AppState` for the lifetime of the server. It only
/// shrinks when a client disconnects or a write to it fails.
#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<String, Arc<dyn EventSink>>>,
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("clients", &self.len())
            .finish()
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // The map holds no cross-entry invariants, so a writer that panicked
    // mid-operation cannot leave it inconsistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn EventSink>>> {
        self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a sink. An existing entry under the same id is replaced.
    pub fn add(&self, client_id: impl Into<String>, sink: Arc<dyn EventSink>) {
        let client_id = client_id.into();
        let mut clients = self.lock();
        if clients.insert(client_id.clone(), sink).is_some() {
            debug!("SSE client {} re-registered, previous sink replaced", client_id);
        }
        info!("SSE client added: {} ({} connected)", client_id, clients.len());
    }

    /// Deregister a client. Removing an unknown id is a no-op.
    pub fn remove(&self, client_id: &str) {
        let mut clients = self.lock();
        if clients.remove(client_id).is_some() {
            info!("SSE client removed: {} ({} connected)", client_id, clients.len());
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write `frame` to every sink, pruning the ones that fail. Returns
    /// `(delivered, pruned)`. A failing sink never stops delivery to the rest.
    pub(super) fn deliver(&self, frame: &Bytes) -> (usize, usize) {
        let mut clients = self.lock();
        let mut dead = Vec::new();

        for (client_id, sink) in clients.iter() {
            if sink.write(frame).is_err() {
                dead.push(client_id.clone());
            }
        }

        for client_id in &dead {
            clients.remove(client_id);
            info!("SSE client pruned after failed write: {}", client_id);
        }

        (clients.len(), dead.len())
    }
}

// ---------------------------------------------------------------------------
// Registration guard
// ---------------------------------------------------------------------------

/// Deregisters its client when dropped.
///
/// The stream endpoint moves one of these into the response body stream, so
/// the entry is removed exactly when hyper drops the body: client gone,
/// connection error, or server shutdown.
#[derive(Debug)]
pub struct Registration {
    registry: Arc<ClientRegistry>,
    client_id: String,
}

impl Registration {
    pub fn new(registry: Arc<ClientRegistry>, client_id: String, sink: Arc<dyn EventSink>) -> Self {
        registry.add(client_id.clone(), sink);
        Self {
            registry,
            client_id,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(&self.client_id);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records every frame it is handed.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub frames: Mutex<Vec<Bytes>>,
    }

    impl EventSink for RecordingSink {
        fn write(&self, frame: &Bytes) -> Result<(), SinkError> {
            self.frames.lock().unwrap().push(frame.clone());
            Ok(())
        }
    }

    /// Always fails, counting attempts.
    #[derive(Default)]
    pub(crate) struct DeadSink {
        pub attempts: AtomicUsize,
    }

    impl EventSink for DeadSink {
        fn write(&self, _frame: &Bytes) -> Result<(), SinkError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(SinkError::Disconnected)
        }
    }

    #[test]
    fn add_and_remove() {
        let registry = ClientRegistry::new();
        registry.add("a", Arc::new(RecordingSink::default()));
        registry.add("b", Arc::new(RecordingSink::default()));
        assert_eq!(registry.len(), 2);

        registry.remove("a");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn removing_unknown_id_is_a_noop() {
        let registry = ClientRegistry::new();
        registry.remove("never-added");
        registry.add("a", Arc::new(RecordingSink::default()));
        registry.remove("a");
        registry.remove("a");
        assert!(registry.is_empty());
    }

    #[test]
    fn add_overwrites_existing_id() {
        let registry = ClientRegistry::new();
        let first = Arc::new(RecordingSink::default());
        let second = Arc::new(RecordingSink::default());
        registry.add("a", first.clone());
        registry.add("a", second.clone());
        assert_eq!(registry.len(), 1);

        registry.deliver(&Bytes::from_static(b"data: {}\n\n"));
        assert!(first.frames.lock().unwrap().is_empty());
        assert_eq!(second.frames.lock().unwrap().len(), 1);
    }

    #[test]
    fn failing_sink_is_pruned_without_blocking_others() {
        let registry = ClientRegistry::new();
        let live = Arc::new(RecordingSink::default());
        let dead = Arc::new(DeadSink::default());
        registry.add("live", live.clone());
        registry.add("dead", dead.clone());

        let (delivered, pruned) = registry.deliver(&Bytes::from_static(b"data: 1\n\n"));
        assert_eq!((delivered, pruned), (1, 1));
        assert_eq!(live.frames.lock().unwrap().len(), 1);

        registry.deliver(&Bytes::from_static(b"data: 2\n\n"));
        assert_eq!(dead.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(live.frames.lock().unwrap().len(), 2);
    }

    #[test]
    fn channel_sink_fails_once_receiver_is_dropped() {
        let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
        let frame = Bytes::from_static(b"data: x\n\n");
        assert!(tx.write(&frame).is_ok());
        drop(rx);
        assert_eq!(tx.write(&frame), Err(SinkError::Disconnected));
    }

    #[test]
    fn registration_guard_deregisters_on_drop() {
        let registry = Arc::new(ClientRegistry::new());
        let guard = Registration::new(
            registry.clone(),
            "guarded".to_string(),
            Arc::new(RecordingSink::default()),
        );
        assert_eq!(guard.client_id(), "guarded");
        assert_eq!(registry.len(), 1);

        drop(guard);
        assert!(registry.is_empty());
    }

    #[test]
    fn guard_drop_after_prune_is_harmless() {
        let registry = Arc::new(ClientRegistry::new());
        let guard = Registration::new(
            registry.clone(),
            "gone".to_string(),
            Arc::new(DeadSink::default()),
        );
        registry.deliver(&Bytes::from_static(b"data: x\n\n"));
        assert!(registry.is_empty());
        drop(guard);
        assert!(registry.is_empty());
    }
}
