pub mod broadcaster;
pub mod registry;
mod sse;

pub use broadcaster::{broadcast, broadcast_outgoing};
pub use registry::{ClientRegistry, EventSink, Registration};
pub use sse::{handle_sse_subscribe, handle_sse_trigger};
