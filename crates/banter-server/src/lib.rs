pub mod client;
pub mod handlers;
pub mod hub;
pub mod server;
pub mod wire;

pub use hub::{Hub, HubHandle};
pub use server::{start, AppState, ServerConfig, ServerHandle};
