use as_any::AsAny;
use rlc_config::SharedConfig;
use rlc_core::{RlcEntity, TickTime};
use rlc_saps::SapMsg;

use crate::MessageQueue;

/// Trait for entities plugged into the MessageRouter
pub trait RlcEntityTrait: Send + AsAny {
    /// Returns the entity identifier
    fn entity(&self) -> RlcEntity;

    /// Handle incoming SAP primitive
    fn rx_prim(&mut self, queue: &mut MessageQueue, message: SapMsg);

    /// Update configuration (optional)
    #[allow(dead_code)]
    fn set_config(&mut self, _config: SharedConfig) {}

    /// Called at the start of each 1 ms tick
    fn tick_start(&mut self, _queue: &mut MessageQueue, _ts: TickTime) {}

    /// Called at the end of each tick
    fn tick_end(&mut self, _queue: &mut MessageQueue, _ts: TickTime) -> bool {
        false
    }
}
