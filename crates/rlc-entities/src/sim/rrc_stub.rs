use rlc_config::SharedConfig;
use rlc_core::{Lcid, Node, RlcEntity, Sap, TickTime, unimplemented_log};
use rlc_saps::rrc::RrcReestablishReq;
use rlc_saps::{SapMsg, SapMsgInner};

use crate::{MessageQueue, RlcEntityTrait};

/// Radio link control of one node. Any link failure reported by its RLC entity leads to a
/// reestablishment of the bearer on both sides, as a real RRC connection re-establishment
/// would.
pub struct RrcStub {
    config: SharedConfig,
    node: Node,
    ts: TickTime,
}

impl RrcStub {
    pub fn new(config: SharedConfig, node: Node) -> Self {
        Self { config, node, ts: 0 }
    }

    fn link_failure(&mut self, queue: &mut MessageQueue, lcid: Lcid, reason: &str) {
        tracing::info!("Rrc{:?}: {} on lcid {}, reestablishing", self.node, reason, lcid);
        {
            let mut state = self.config.state_write();
            state.link_failures += 1;
            state.reestablishments += 1;
        }
        for node in [self.node, self.node.peer()] {
            queue.push_back(SapMsg::new(
                Sap::RrcSap,
                RlcEntity::Rrc(self.node),
                RlcEntity::Rlc(node),
                self.ts,
                SapMsgInner::RrcReestablishReq(RrcReestablishReq { lcid }),
            ));
        }
    }
}

impl RlcEntityTrait for RrcStub {
    fn entity(&self) -> RlcEntity {
        RlcEntity::Rrc(self.node)
    }

    fn set_config(&mut self, config: SharedConfig) {
        self.config = config;
    }

    fn rx_prim(&mut self, queue: &mut MessageQueue, message: SapMsg) {
        tracing::debug!("rx_prim: {}", message.msg);
        match message.msg {
            SapMsgInner::RrcMaxRetxInd(prim) => self.link_failure(queue, prim.lcid, "max retransmissions"),
            SapMsgInner::RrcProtocolFailureInd(prim) => self.link_failure(queue, prim.lcid, "protocol failure"),
            other => unimplemented_log!("Rrc{:?}: unexpected primitive {}", self.node, other),
        }
    }

    fn tick_start(&mut self, _queue: &mut MessageQueue, ts: TickTime) {
        self.ts = ts;
    }
}
