pub mod attendance;
pub mod dashboard;
pub mod members;
pub mod routes;
pub mod utils;

pub use routes::{Router, build_router};
