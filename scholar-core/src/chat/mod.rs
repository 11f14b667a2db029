//! Multi-turn conversations on top of the agent.

mod manager;
mod session;

pub use manager::ChatManager;
pub use session::{ChatSession, Role, Turn};
