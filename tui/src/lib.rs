pub mod client;
pub mod subscriber;

pub use client::{ApiClient, ClientError};
pub use subscriber::{RealtimeSubscriber, SubscriberState};
