use std::collections::HashSet;

use rlc_config::SharedConfig;
use rlc_core::{Node, RlcEntity, Sap, SduId, TickTime, unimplemented_log};
use rlc_saps::rlc::RlcDataReq;
use rlc_saps::{SapMsg, SapMsgInner};

use crate::sim::SIM_LCID;
use crate::{MessageQueue, RlcEntityTrait};

/// Counters kept by a traffic generator, read back after a simulation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficStats {
    pub generated: u32,
    /// Own SDUs the bearer reported delivered to the peer
    pub delivered: u32,
    /// Own SDUs the bearer gave up on
    pub failed: u32,
    /// Peer SDUs received
    pub received: u32,
    pub corrupted: u32,
    pub out_of_order: u32,
}

/// Source and sink of SDUs on one node. Every SDU starts with its id in big endian,
/// followed by a pattern derived from that id, so the receiving side can check order and
/// integrity.
pub struct PdcpTraffic {
    config: SharedConfig,
    node: Node,
    generated: u32,
    delivered: HashSet<SduId>,
    failed: HashSet<SduId>,
    last_rx: Option<SduId>,
    received: u32,
    corrupted: u32,
    out_of_order: u32,
}

pub fn make_sdu(id: SduId, size: usize) -> Vec<u8> {
    let mut sdu = Vec::with_capacity(size.max(4));
    sdu.extend_from_slice(&id.to_be_bytes());
    for i in 4..size {
        sdu.push((id as usize).wrapping_add(i) as u8);
    }
    sdu
}

/// Returns the id carried in `sdu` if the rest of it matches the pattern
pub fn check_sdu(sdu: &[u8]) -> Option<SduId> {
    let id = SduId::from_be_bytes(sdu.get(..4)?.try_into().ok()?);
    let intact = sdu.iter().enumerate().skip(4).all(|(i, b)| *b == (id as usize).wrapping_add(i) as u8);
    intact.then_some(id)
}

impl PdcpTraffic {
    pub fn new(config: SharedConfig, node: Node) -> Self {
        Self {
            config,
            node,
            generated: 0,
            delivered: HashSet::new(),
            failed: HashSet::new(),
            last_rx: None,
            received: 0,
            corrupted: 0,
            out_of_order: 0,
        }
    }

    pub fn stats(&self) -> TrafficStats {
        TrafficStats {
            generated: self.generated,
            delivered: self.delivered.len() as u32,
            failed: self.failed.len() as u32,
            received: self.received,
            corrupted: self.corrupted,
            out_of_order: self.out_of_order,
        }
    }

    /// True once every generated SDU was either delivered or failed
    pub fn is_settled(&self) -> bool {
        self.generated == self.config.config().sim.num_sdus
            && (self.delivered.len() + self.failed.len()) as u32 >= self.generated
    }

    fn rx_data(&mut self, sdu: &[u8]) {
        let Some(id) = check_sdu(sdu) else {
            tracing::warn!("Pdcp{:?}: corrupted sdu, len {}", self.node, sdu.len());
            self.corrupted += 1;
            return;
        };
        self.received += 1;
        if let Some(last) = self.last_rx {
            if id <= last {
                tracing::warn!("Pdcp{:?}: sdu {} after {}", self.node, id, last);
                self.out_of_order += 1;
                return;
            }
        }
        tracing::debug!("Pdcp{:?}: got sdu {}", self.node, id);
        self.last_rx = Some(id);
    }
}

impl RlcEntityTrait for PdcpTraffic {
    fn entity(&self) -> RlcEntity {
        RlcEntity::Pdcp(self.node)
    }

    fn set_config(&mut self, config: SharedConfig) {
        self.config = config;
    }

    fn rx_prim(&mut self, _queue: &mut MessageQueue, message: SapMsg) {
        tracing::trace!("rx_prim: {}", message.msg);
        match message.msg {
            SapMsgInner::RlcDataInd(prim) => self.rx_data(&prim.sdu),
            SapMsgInner::RlcDeliveryInd(prim) => self.delivered.extend(prim.sdu_ids),
            SapMsgInner::RlcFailureInd(prim) => {
                tracing::info!("Pdcp{:?}: sdus {:?} lost", self.node, prim.sdu_ids);
                self.failed.extend(prim.sdu_ids);
            }
            other => unimplemented_log!("Pdcp{:?}: unexpected primitive {}", self.node, other),
        }
    }

    fn tick_start(&mut self, queue: &mut MessageQueue, ts: TickTime) {
        let cfg = self.config.config();
        if self.generated >= cfg.sim.num_sdus || ts % cfg.sim.sdu_interval_ticks != 0 {
            return;
        }
        let id = self.generated;
        self.generated += 1;
        let req = RlcDataReq { lcid: SIM_LCID, sdu_id: id, sdu: make_sdu(id, cfg.sim.sdu_size) };
        queue.push_back(SapMsg::new(
            Sap::RlcSap,
            RlcEntity::Pdcp(self.node),
            RlcEntity::Rlc(self.node),
            ts,
            SapMsgInner::RlcDataReq(req),
        ));
    }
}
