// shared/src/types/event.rs
// Realtime domain events pushed to admin dashboards over SSE.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Partial aggregate counters. Only the counters an action actually changed
/// are present on the wire.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_members: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_members: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub today_check_ins: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_revenue: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_memberships: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkin {
    pub member_name: String,
    pub member_id: String,
    pub membership_type: String,
    pub timestamp: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedData {
    #[serde(default)]
    pub client_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<DashboardStats>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckinData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkin: Option<Checkin>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Free-form severity / category chosen by the sender (`info`, `warning`, ...).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

// ---------------------------------------------------------------------------
// RealtimeEvent
// ---------------------------------------------------------------------------

/// One realtime event as it travels over the wire:
///
/// ```json
/// {"type":"attendance_checkin","data":{"checkin":{...}},"timestamp":"2024-01-01T09:00:00.000Z"}
/// ```
///
/// `timestamp` is stamped when the event is constructed for broadcast and is
/// independent of whatever time the payload itself carries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    Connected {
        data: ConnectedData,
        timestamp: String,
    },
    DashboardUpdate {
        #[serde(default)]
        data: DashboardData,
        timestamp: String,
    },
    AttendanceCheckin {
        #[serde(default)]
        data: CheckinData,
        timestamp: String,
    },
    MemberUpdate {
        #[serde(default)]
        data: MemberData,
        timestamp: String,
    },
    Notification {
        #[serde(default)]
        data: NotificationData,
        timestamp: String,
    },
}

/// Current time in the `toISOString` shape browsers expect, e.g.
/// `2024-05-01T10:15:30.123Z`.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl RealtimeEvent {
    pub fn connected(client_id: impl Into<String>) -> Self {
        Self::Connected {
            data: ConnectedData {
                client_id: client_id.into(),
            },
            timestamp: now_timestamp(),
        }
    }

    pub fn dashboard_update(stats: DashboardStats) -> Self {
        Self::DashboardUpdate {
            data: DashboardData { stats: Some(stats) },
            timestamp: now_timestamp(),
        }
    }

    pub fn attendance_checkin(checkin: Checkin) -> Self {
        Self::AttendanceCheckin {
            data: CheckinData {
                checkin: Some(checkin),
            },
            timestamp: now_timestamp(),
        }
    }

    pub fn member_update(member: serde_json::Value) -> Self {
        Self::MemberUpdate {
            data: MemberData {
                member: Some(member),
            },
            timestamp: now_timestamp(),
        }
    }

    pub fn notification(message: impl Into<String>, kind: Option<String>) -> Self {
        Self::Notification {
            data: NotificationData {
                message: Some(message.into()),
                kind,
            },
            timestamp: now_timestamp(),
        }
    }

    /// Build an event from a loosely-typed `{type, data}` pair, stamping the
    /// current time. Fails when `event_type` is not a known variant or `data`
    /// does not fit its payload shape.
    pub fn from_parts(
        event_type: &str,
        data: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        let mut wire = serde_json::Map::new();
        wire.insert("type".into(), event_type.into());
        if !data.is_null() {
            wire.insert("data".into(), data);
        }
        wire.insert("timestamp".into(), now_timestamp().into());
        serde_json::from_value(serde_json::Value::Object(wire))
    }

    /// Wire name of the variant, matching the `type` field.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::DashboardUpdate { .. } => "dashboard_update",
            Self::AttendanceCheckin { .. } => "attendance_checkin",
            Self::MemberUpdate { .. } => "member_update",
            Self::Notification { .. } => "notification",
        }
    }

    pub fn timestamp(&self) -> &str {
        match self {
            Self::Connected { timestamp, .. }
            | Self::DashboardUpdate { timestamp, .. }
            | Self::AttendanceCheckin { timestamp, .. }
            | Self::MemberUpdate { timestamp, .. }
            | Self::Notification { timestamp, .. } => timestamp,
        }
    }
}

/// Body accepted by the trigger endpoint: `{type, data}` without a timestamp.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TriggerRequest {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl TriggerRequest {
    /// Typed event when `{type, data}` fits a known variant, otherwise the
    /// pair as sent, stamped with the current time.
    pub fn into_outgoing(self) -> OutgoingEvent {
        match RealtimeEvent::from_parts(&self.event_type, self.data.clone()) {
            Ok(event) => OutgoingEvent::Typed(event),
            Err(_) => {
                let mut wire = serde_json::Map::new();
                wire.insert("type".into(), self.event_type.into());
                if !self.data.is_null() {
                    wire.insert("data".into(), self.data);
                }
                wire.insert("timestamp".into(), now_timestamp().into());
                OutgoingEvent::Untyped(serde_json::Value::Object(wire))
            }
        }
    }
}

/// What the trigger endpoint fans out. Untyped events reach every
/// subscriber unchanged; typed subscribers skip the ones they cannot parse.
#[derive(Clone, Debug, PartialEq)]
pub enum OutgoingEvent {
    Typed(RealtimeEvent),
    Untyped(serde_json::Value),
}

impl OutgoingEvent {
    pub fn event_type(&self) -> &str {
        match self {
            Self::Typed(event) => event.event_type(),
            Self::Untyped(value) => value["type"].as_str().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkin_serializes_with_camel_case_payload() {
        let event = RealtimeEvent::attendance_checkin(Checkin {
            member_name: "Jane".to_string(),
            member_id: "M-001".to_string(),
            membership_type: "Premium".to_string(),
            timestamp: "2024-01-01T09:00:00.000Z".to_string(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "attendance_checkin");
        assert_eq!(json["data"]["checkin"]["memberName"], "Jane");
        assert_eq!(json["data"]["checkin"]["membershipType"], "Premium");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn notification_inner_type_does_not_clash_with_tag() {
        let event = RealtimeEvent::notification("Gym closes early", Some("warning".into()));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "notification");
        assert_eq!(json["data"]["type"], "warning");

        let back: RealtimeEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn from_parts_accepts_partial_payload() {
        let event = RealtimeEvent::from_parts("notification", serde_json::json!({"message": "hi"}))
            .unwrap();
        match event {
            RealtimeEvent::Notification { data, .. } => {
                assert_eq!(data.message.as_deref(), Some("hi"));
                assert!(data.kind.is_none());
            }
            other => panic!("unexpected variant: {}", other.event_type()),
        }
    }

    #[test]
    fn from_parts_treats_null_data_as_empty_payload() {
        let event = RealtimeEvent::from_parts("dashboard_update", serde_json::Value::Null).unwrap();
        assert_eq!(event.event_type(), "dashboard_update");
    }

    #[test]
    fn from_parts_rejects_unknown_type() {
        assert!(RealtimeEvent::from_parts("test_event", serde_json::json!({})).is_err());
    }

    #[test]
    fn trigger_with_known_shape_goes_out_typed() {
        let req = TriggerRequest {
            event_type: "notification".to_string(),
            data: serde_json::json!({"message": "hi"}),
        };
        let outgoing = req.into_outgoing();
        assert!(matches!(outgoing, OutgoingEvent::Typed(RealtimeEvent::Notification { .. })));
        assert_eq!(outgoing.event_type(), "notification");
    }

    #[test]
    fn trigger_with_unknown_type_goes_out_as_sent() {
        let req = TriggerRequest {
            event_type: "test_event".to_string(),
            data: serde_json::json!({"test": "data"}),
        };
        let OutgoingEvent::Untyped(wire) = req.into_outgoing() else {
            panic!("expected an untyped event");
        };
        assert_eq!(wire["type"], "test_event");
        assert_eq!(wire["data"]["test"], "data");
        assert!(chrono::DateTime::parse_from_rfc3339(wire["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn trigger_with_mistyped_payload_keeps_its_data() {
        let req = TriggerRequest {
            event_type: "notification".to_string(),
            data: serde_json::json!({"message": 5}),
        };
        let outgoing = req.into_outgoing();
        assert_eq!(outgoing.event_type(), "notification");
        let OutgoingEvent::Untyped(wire) = outgoing else {
            panic!("expected an untyped event");
        };
        assert_eq!(wire["data"]["message"], 5);
    }

    #[test]
    fn from_parts_rejects_mistyped_payload() {
        let bad = serde_json::json!({"stats": {"totalMembers": "lots"}});
        assert!(RealtimeEvent::from_parts("dashboard_update", bad).is_err());
    }

    #[test]
    fn dashboard_update_omits_untouched_counters() {
        let event = RealtimeEvent::dashboard_update(DashboardStats {
            today_check_ins: Some(12),
            ..Default::default()
        });
        let json = serde_json::to_value(&event).unwrap();
        let stats = json["data"]["stats"].as_object().unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats["todayCheckIns"], 12);
    }

    #[test]
    fn timestamp_is_iso8601_utc() {
        let event = RealtimeEvent::connected("abc");
        let ts = event.timestamp();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn event_type_matches_wire_tag() {
        let events = vec![
            RealtimeEvent::connected("id"),
            RealtimeEvent::dashboard_update(DashboardStats::default()),
            RealtimeEvent::member_update(serde_json::json!({"name": "Jane"})),
            RealtimeEvent::notification("hello", None),
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.event_type());
        }
    }
}
