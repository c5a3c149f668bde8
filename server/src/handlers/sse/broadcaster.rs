use bytes::Bytes;
use shared::types::event::{OutgoingEvent, RealtimeEvent};
use shared::types::sse::{encode_frame, encode_json_frame};
use tracing::{debug, error};

use super::registry::ClientRegistry;

/// Fan `event` out to every connected client.
///
/// The event is encoded once and the same bytes are written to each sink.
/// Clients whose sink fails are dropped from the registry; delivery to the
/// rest continues. Best effort: the caller is not told who received it.
pub fn broadcast(registry: &ClientRegistry, event: &RealtimeEvent) {
    match encode_frame(event) {
        Ok(frame) => broadcast_frame(registry, event.event_type(), &frame),
        Err(e) => error!("Failed to encode {} event: {}", event.event_type(), e),
    }
}

/// Fan out whatever the trigger endpoint accepted, typed or not.
pub fn broadcast_outgoing(registry: &ClientRegistry, event: &OutgoingEvent) {
    match event {
        OutgoingEvent::Typed(event) => broadcast(registry, event),
        OutgoingEvent::Untyped(value) => match encode_json_frame(value) {
            Ok(frame) => broadcast_frame(registry, event.event_type(), &frame),
            Err(e) => error!("Failed to encode {} event: {}", event.event_type(), e),
        },
    }
}

fn broadcast_frame(registry: &ClientRegistry, event_type: &str, frame: &Bytes) {
    let (delivered, pruned) = registry.deliver(frame);
    debug!(
        "Broadcast {} event to {} clients ({} pruned)",
        event_type, delivered, pruned
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use proptest::prelude::*;
    use shared::types::event::{Checkin, TriggerRequest};
    use shared::types::sse::SseDecoder;

    use super::*;
    use crate::handlers::sse::registry::tests::{DeadSink, RecordingSink};

    fn decode_all(frames: &[Bytes]) -> Vec<RealtimeEvent> {
        let mut decoder = SseDecoder::new();
        frames
            .iter()
            .flat_map(|f| decoder.feed(f))
            .map(|m| serde_json::from_str(&m).unwrap())
            .collect()
    }

    #[test]
    fn broadcast_with_no_clients_is_a_noop() {
        let registry = ClientRegistry::new();
        broadcast(&registry, &RealtimeEvent::notification("nobody home", None));
        assert!(registry.is_empty());
    }

    #[test]
    fn every_sink_receives_identical_bytes() {
        let registry = ClientRegistry::new();
        let a = Arc::new(RecordingSink::default());
        let b = Arc::new(RecordingSink::default());
        registry.add("a", a.clone());
        registry.add("b", b.clone());

        broadcast(&registry, &RealtimeEvent::notification("same", None));

        let a_frames = a.frames.lock().unwrap();
        let b_frames = b.frames.lock().unwrap();
        assert_eq!(a_frames.len(), 1);
        assert_eq!(a_frames[0], b_frames[0]);
        assert!(a_frames[0].starts_with(b"data: "));
        assert!(a_frames[0].ends_with(b"\n\n"));
    }

    #[test]
    fn checkin_reaches_subscriber_intact() {
        let registry = ClientRegistry::new();
        let sink = Arc::new(RecordingSink::default());
        registry.add("admin", sink.clone());

        broadcast(
            &registry,
            &RealtimeEvent::attendance_checkin(Checkin {
                member_name: "Jane".to_string(),
                member_id: "M-7".to_string(),
                membership_type: "Basic".to_string(),
                timestamp: "2024-01-01T09:00:00.000Z".to_string(),
            }),
        );

        let events = decode_all(&sink.frames.lock().unwrap());
        assert_eq!(events.len(), 1);
        match &events[0] {
            RealtimeEvent::AttendanceCheckin { data, .. } => {
                assert_eq!(data.checkin.as_ref().unwrap().member_name, "Jane");
            }
            other => panic!("unexpected variant: {}", other.event_type()),
        }
    }

    #[test]
    fn untyped_trigger_event_reaches_sinks_verbatim() {
        let registry = ClientRegistry::new();
        let sink = Arc::new(RecordingSink::default());
        registry.add("admin", sink.clone());

        let outgoing = TriggerRequest {
            event_type: "test_event".to_string(),
            data: serde_json::json!({"test": "data"}),
        }
        .into_outgoing();
        broadcast_outgoing(&registry, &outgoing);

        let frames = sink.frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        let mut decoder = SseDecoder::new();
        let messages = decoder.feed(&frames[0]);
        let wire: serde_json::Value = serde_json::from_str(&messages[0]).unwrap();
        assert_eq!(wire["type"], "test_event");
        assert_eq!(wire["data"]["test"], "data");
        assert!(wire["timestamp"].is_string());
    }

    #[test]
    fn removed_client_gets_nothing() {
        let registry = ClientRegistry::new();
        let sink = Arc::new(RecordingSink::default());
        registry.add("short-lived", sink.clone());
        registry.remove("short-lived");

        broadcast(&registry, &RealtimeEvent::notification("late", None));
        assert!(sink.frames.lock().unwrap().is_empty());
    }

    #[test]
    fn one_disconnect_leaves_one_recipient() {
        let registry = ClientRegistry::new();
        let stays = Arc::new(RecordingSink::default());
        let leaves = Arc::new(RecordingSink::default());
        registry.add("stays", stays.clone());
        registry.add("leaves", leaves.clone());
        registry.remove("leaves");

        broadcast(&registry, &RealtimeEvent::notification("still here?", None));

        assert_eq!(registry.len(), 1);
        assert_eq!(stays.frames.lock().unwrap().len(), 1);
        assert!(leaves.frames.lock().unwrap().is_empty());
    }

    #[test]
    fn dead_sink_is_pruned_on_broadcast() {
        let registry = ClientRegistry::new();
        let live = Arc::new(RecordingSink::default());
        registry.add("dead", Arc::new(DeadSink::default()));
        registry.add("live", live.clone());

        broadcast(&registry, &RealtimeEvent::notification("first", None));
        broadcast(&registry, &RealtimeEvent::notification("second", None));

        assert_eq!(registry.len(), 1);
        assert_eq!(live.frames.lock().unwrap().len(), 2);
    }

    proptest! {
        #[test]
        fn each_sink_sees_broadcasts_in_call_order(
            messages in proptest::collection::vec("[a-z]{1,8}", 1..30),
            sinks in 1usize..5,
        ) {
            let registry = ClientRegistry::new();
            let recorders: Vec<Arc<RecordingSink>> =
                (0..sinks).map(|_| Arc::new(RecordingSink::default())).collect();
            for (i, sink) in recorders.iter().enumerate() {
                registry.add(format!("client-{}", i), sink.clone());
            }

            for message in &messages {
                broadcast(&registry, &RealtimeEvent::notification(message.clone(), None));
            }

            for sink in &recorders {
                let received: Vec<String> = decode_all(&sink.frames.lock().unwrap())
                    .into_iter()
                    .map(|event| match event {
                        RealtimeEvent::Notification { data, .. } => data.message.unwrap_or_default(),
                        other => other.event_type().to_string(),
                    })
                    .collect();
                prop_assert_eq!(&received, &messages);
            }
        }
    }
}
