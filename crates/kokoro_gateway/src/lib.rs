pub mod server;
pub mod session;
pub mod types;

pub use server::{GatewayServer, GatewayState};
pub use session::{InMemorySessionStore, SessionStore};
