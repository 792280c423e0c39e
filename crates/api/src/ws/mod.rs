//! WebSocket render channel.
//!
//! Clients subscribe to an identifier and receive a push when control
//! changes, so they re-render without waiting for the next poll.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
