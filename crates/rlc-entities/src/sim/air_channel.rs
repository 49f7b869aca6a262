use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rlc_config::SharedConfig;
use rlc_core::{Node, RlcEntity, Sap, TickTime, unimplemented_log};
use rlc_saps::mac::{MacDataInd, MacTxOpportunity};
use rlc_saps::{SapMsg, SapMsgInner};

use crate::sim::SIM_LCID;
use crate::{MessageQueue, RlcEntityTrait};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub carried: u64,
    pub dropped: u64,
    pub delayed: u64,
}

struct InFlight {
    due: TickTime,
    dest: Node,
    pdu: Vec<u8>,
}

/// MAC and radio between the two nodes. Grants each RLC entity one transmission
/// opportunity per tick and carries the resulting PDUs to the peer, losing some and
/// holding others back long enough to reorder them.
pub struct AirChannel {
    config: SharedConfig,
    rng: StdRng,
    in_flight: Vec<InFlight>,
    stats: ChannelStats,
    ts: TickTime,
}

impl AirChannel {
    pub fn new(config: SharedConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.config().sim.seed);
        Self { config, rng, in_flight: Vec::new(), stats: ChannelStats::default(), ts: 0 }
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn rx_data_req(&mut self, src: RlcEntity, pdu: Vec<u8>) {
        let RlcEntity::Rlc(node) = src else {
            tracing::warn!("Air: MacDataReq from {}", src);
            return;
        };
        let cfg = self.config.config();
        let sim = &cfg.sim;
        if self.rng.random_bool(sim.loss_rate) {
            tracing::debug!("Air: dropping {} bytes from {:?}", pdu.len(), node);
            self.stats.dropped += 1;
            return;
        }
        let mut delay = 1;
        if sim.max_delay_ticks > 0 && self.rng.random_bool(sim.reorder_rate) {
            delay += self.rng.random_range(1..=sim.max_delay_ticks);
            self.stats.delayed += 1;
        }
        self.in_flight.push(InFlight { due: self.ts + delay, dest: node.peer(), pdu });
    }
}

impl RlcEntityTrait for AirChannel {
    fn entity(&self) -> RlcEntity {
        RlcEntity::Air
    }

    fn set_config(&mut self, config: SharedConfig) {
        self.config = config;
    }

    fn rx_prim(&mut self, _queue: &mut MessageQueue, message: SapMsg) {
        match message.msg {
            SapMsgInner::MacDataReq(prim) => self.rx_data_req(message.src, prim.pdu),
            other => unimplemented_log!("Air: unexpected primitive {}", other),
        }
    }

    fn tick_start(&mut self, _queue: &mut MessageQueue, ts: TickTime) {
        self.ts = ts;
    }

    /// Runs at tick end so the order of deliveries and grants does not depend on the
    /// order in which the router visits entities
    fn tick_end(&mut self, queue: &mut MessageQueue, ts: TickTime) -> bool {
        let mut sent = false;
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.in_flight).into_iter().partition(|p| p.due <= ts);
        self.in_flight = pending;
        for p in due {
            self.stats.carried += 1;
            let ind = MacDataInd { lcid: SIM_LCID, pdu: p.pdu };
            queue.push_back(SapMsg::new(Sap::MacSap, RlcEntity::Air, RlcEntity::Rlc(p.dest), ts, SapMsgInner::MacDataInd(ind)));
            sent = true;
        }

        let max_bytes = self.config.config().sim.opportunity_bytes;
        for node in [Node::Ue, Node::Enb] {
            let opp = MacTxOpportunity { lcid: SIM_LCID, max_bytes };
            queue.push_back(SapMsg::new(Sap::MacSap, RlcEntity::Air, RlcEntity::Rlc(node), ts, SapMsgInner::MacTxOpportunity(opp)));
        }
        sent
    }
}
