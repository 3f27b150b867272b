//! HTTP and WebSocket surface
//!
//! Serves the viewer page, relays frames from viewers into the pipeline and
//! streams events back.

pub mod routes;
pub mod server;
pub mod shared;
pub mod types;
pub mod websocket;

pub use routes::create_router;
pub use server::run_server;
pub use shared::{SharedState, SharedStateHandle};
pub use types::*;
pub use websocket::{connected_greeting, handle_client_message, ClientMessage};
