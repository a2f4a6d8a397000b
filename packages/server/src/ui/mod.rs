//! UI layer: HTTP API, WebSocket transport and server lifecycle.

mod dispatcher;
mod error;
mod handler;
mod server;
mod signal;
pub mod state;

pub use dispatcher::EventDispatcher;
pub use error::{ApiError, status_for};
pub use server::{Server, router};
pub use state::AppState;
