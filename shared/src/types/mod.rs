pub mod attendance;
pub mod buffer;
pub mod event;
pub mod json_error;
pub mod member;
pub mod server_config;
pub mod sse;

pub use self::buffer::{EVENT_BUFFER_CAPACITY, EventBuffer};
pub use self::event::{
    Checkin, DashboardStats, OutgoingEvent, RealtimeEvent, TriggerRequest, now_timestamp,
};
pub use self::json_error::{ErrorResponse, TriggerAck};
pub use self::sse::{SinkError, SseDecoder, encode_frame, encode_json_frame};
