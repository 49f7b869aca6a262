pub mod entity_trait;
pub mod messagerouter;
pub mod rlc;
pub mod sim;

// Re-export commonly used items from router
pub use entity_trait::RlcEntityTrait;
pub use messagerouter::{MessagePrio, MessageQueue, MessageRouter};
