use rlc_core::RlcEntity;
use rlc_entities::{MessageQueue, RlcEntityTrait};
use rlc_saps::SapMsg;

/// An RLC stack entity sink for testing purposes
/// Collects all received SapMsg messages for later inspection
pub struct Sink {
    component: RlcEntity,
    msgqueue: Vec<SapMsg>,
}

impl Sink {
    pub fn new(component: RlcEntity) -> Self {
        Self { component, msgqueue: vec![] }
    }

    pub fn take_msgqueue(&mut self) -> Vec<SapMsg> {
        std::mem::take(&mut self.msgqueue)
    }
}

impl RlcEntityTrait for Sink {
    fn entity(&self) -> RlcEntity {
        self.component
    }

    fn rx_prim(&mut self, _queue: &mut MessageQueue, message: SapMsg) {
        tracing::debug!("rx_prim: {:?}", message);
        self.msgqueue.push(message);
    }
}
