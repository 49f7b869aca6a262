use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use rlc_config::SharedConfig;
use rlc_core::{Lcid, ManualTimers, Node, RlcEntity, Sap, SduId, TickTime, unimplemented_log};
use rlc_saps::mac::MacDataReq;
use rlc_saps::rlc::{RlcDataInd, RlcDeliveryInd, RlcFailureInd};
use rlc_saps::rrc::{RrcMaxRetxInd, RrcProtocolFailureInd};
use rlc_saps::{SapMsg, SapMsgInner};

use crate::rlc::am::{AmBearer, ControlPlane, RlcError, UpperLayer};
use crate::{MessageQueue, RlcEntityTrait};

/// Turns bearer callbacks into SAP primitives. They are buffered in a channel and put on the
/// router queue once the bearer call returned.
struct SapBridge {
    out: Sender<SapMsgInner>,
}

impl SapBridge {
    fn send(&self, msg: SapMsgInner) {
        // Receiver lives as long as the entity owning the bearer
        let _ = self.out.send(msg);
    }
}

impl UpperLayer for SapBridge {
    fn write_sdu(&self, lcid: Lcid, sdu: Vec<u8>) {
        self.send(SapMsgInner::RlcDataInd(RlcDataInd { lcid, sdu }));
    }

    fn notify_delivery(&self, lcid: Lcid, sdu_ids: &[SduId]) {
        self.send(SapMsgInner::RlcDeliveryInd(RlcDeliveryInd { lcid, sdu_ids: sdu_ids.to_vec() }));
    }

    fn notify_failure(&self, lcid: Lcid, sdu_ids: &[SduId]) {
        self.send(SapMsgInner::RlcFailureInd(RlcFailureInd { lcid, sdu_ids: sdu_ids.to_vec() }));
    }
}

impl ControlPlane for SapBridge {
    fn max_retx_attempted(&self, lcid: Lcid) {
        self.send(SapMsgInner::RrcMaxRetxInd(RrcMaxRetxInd { lcid }));
    }

    fn protocol_failure(&self, lcid: Lcid) {
        self.send(SapMsgInner::RrcProtocolFailureInd(RrcProtocolFailureInd { lcid }));
    }
}

/// One AM bearer of one node, plugged into the message router. Its timers run on the
/// router's tick clock.
pub struct RlcAmEntity {
    config: SharedConfig,
    node: Node,
    ts: TickTime,
    bearer: Arc<AmBearer>,
    timers: Arc<ManualTimers>,
    bridge_rx: Receiver<SapMsgInner>,
}

impl RlcAmEntity {
    pub fn new(config: SharedConfig, node: Node, lcid: Lcid) -> Result<Self, RlcError> {
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let timers = Arc::new(ManualTimers::new(event_tx));
        let (bridge_tx, bridge_rx) = crossbeam_channel::unbounded();
        let bridge = Arc::new(SapBridge { out: bridge_tx });

        let am_cfg = config.config().rlc_am.clone();
        let bearer = AmBearer::new(lcid, am_cfg, timers.clone(), event_rx, bridge.clone(), bridge)?;
        Ok(Self { config, node, ts: 0, bearer: Arc::new(bearer), timers, bridge_rx })
    }

    pub fn bearer(&self) -> &Arc<AmBearer> {
        &self.bearer
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    fn me(&self) -> RlcEntity {
        RlcEntity::Rlc(self.node)
    }

    /// Moves everything the bearer reported into the router queue
    fn flush_indications(&mut self, queue: &mut MessageQueue) {
        while let Ok(msg) = self.bridge_rx.try_recv() {
            let (sap, dest) = match msg {
                SapMsgInner::RrcMaxRetxInd(_) | SapMsgInner::RrcProtocolFailureInd(_) => {
                    (Sap::RrcSap, RlcEntity::Rrc(self.node))
                }
                _ => (Sap::RlcSap, RlcEntity::Pdcp(self.node)),
            };
            queue.push_back(SapMsg::new(sap, self.me(), dest, self.ts, msg));
        }
    }

    fn rx_rlc_prim(&mut self, queue: &mut MessageQueue, message: SapMsg) {
        match message.msg {
            SapMsgInner::RlcDataReq(prim) => {
                if let Err(e) = self.bearer.write_sdu(prim.sdu_id, prim.sdu) {
                    tracing::warn!("{}: sdu {} rejected: {}", self.me(), prim.sdu_id, e);
                    let ind = RlcFailureInd { lcid: prim.lcid, sdu_ids: vec![prim.sdu_id] };
                    queue.push_back(SapMsg::new(
                        Sap::RlcSap,
                        self.me(),
                        message.src,
                        self.ts,
                        SapMsgInner::RlcFailureInd(ind),
                    ));
                }
            }
            SapMsgInner::RlcDiscardReq(prim) => {
                self.bearer.discard_sdu(prim.sdu_id);
            }
            other => unimplemented_log!("{}: unexpected primitive on rlc sap: {}", self.me(), other),
        }
    }

    fn rx_mac_prim(&mut self, queue: &mut MessageQueue, message: SapMsg) {
        match message.msg {
            SapMsgInner::MacTxOpportunity(prim) => {
                let pdu = self.bearer.read_pdu(prim.max_bytes);
                if !pdu.is_empty() {
                    let req = MacDataReq { lcid: prim.lcid, pdu };
                    queue.push_back(SapMsg::new(
                        Sap::MacSap,
                        self.me(),
                        RlcEntity::Air,
                        self.ts,
                        SapMsgInner::MacDataReq(req),
                    ));
                }
            }
            SapMsgInner::MacDataInd(prim) => {
                self.bearer.write_pdu(&prim.pdu);
            }
            other => unimplemented_log!("{}: unexpected primitive on mac sap: {}", self.me(), other),
        }
    }

    fn rx_rrc_prim(&mut self, _queue: &mut MessageQueue, message: SapMsg) {
        match message.msg {
            SapMsgInner::RrcReestablishReq(_) => {
                self.bearer.reestablish();
            }
            other => unimplemented_log!("{}: unexpected primitive on rrc sap: {}", self.me(), other),
        }
    }
}

impl RlcEntityTrait for RlcAmEntity {
    fn entity(&self) -> RlcEntity {
        self.me()
    }

    fn set_config(&mut self, config: SharedConfig) {
        if let Err(e) = self.bearer.configure(config.config().rlc_am.clone()) {
            tracing::warn!("{}: keeping old configuration: {}", self.me(), e);
            return;
        }
        self.config = config;
    }

    fn rx_prim(&mut self, queue: &mut MessageQueue, message: SapMsg) {
        tracing::trace!("rx_prim: {}", message.msg);
        match message.sap {
            Sap::RlcSap => self.rx_rlc_prim(queue, message),
            Sap::MacSap => self.rx_mac_prim(queue, message),
            Sap::RrcSap => self.rx_rrc_prim(queue, message),
        }
        self.flush_indications(queue);
    }

    fn tick_start(&mut self, queue: &mut MessageQueue, ts: TickTime) {
        self.ts = ts;
        self.timers.advance(1);
        self.bearer.process_timer_events();
        self.flush_indications(queue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlc_core::debug;
    use rlc_saps::mac::{MacDataInd, MacTxOpportunity};
    use rlc_saps::rlc::RlcDataReq;

    const LCID: Lcid = 1;

    fn msg(sap: Sap, src: RlcEntity, dest: RlcEntity, inner: SapMsgInner) -> SapMsg {
        SapMsg::new(sap, src, dest, 0, inner)
    }

    fn data_req(node: Node, sdu_id: SduId, sdu: Vec<u8>) -> SapMsg {
        let req = RlcDataReq { lcid: LCID, sdu_id, sdu };
        msg(Sap::RlcSap, RlcEntity::Pdcp(node), RlcEntity::Rlc(node), SapMsgInner::RlcDataReq(req))
    }

    fn grant(node: Node, max_bytes: usize) -> SapMsg {
        let opp = MacTxOpportunity { lcid: LCID, max_bytes };
        msg(Sap::MacSap, RlcEntity::Air, RlcEntity::Rlc(node), SapMsgInner::MacTxOpportunity(opp))
    }

    #[test]
    fn test_sdu_crosses_to_peer() {
        debug::setup_logging_verbose();
        let config = SharedConfig::from_config(Default::default());
        let mut ue = RlcAmEntity::new(config.clone(), Node::Ue, LCID).unwrap();
        let mut enb = RlcAmEntity::new(config, Node::Enb, LCID).unwrap();
        let mut queue = MessageQueue::new();

        ue.rx_prim(&mut queue, data_req(Node::Ue, 0, vec![0xAB; 50]));
        assert!(queue.is_empty());
        ue.rx_prim(&mut queue, grant(Node::Ue, 200));

        let Some(out) = queue.pop_front() else { panic!() };
        assert_eq!(out.dest, RlcEntity::Air);
        let SapMsgInner::MacDataReq(req) = out.msg else { panic!() };

        let ind = MacDataInd { lcid: LCID, pdu: req.pdu };
        enb.rx_prim(&mut queue, msg(Sap::MacSap, RlcEntity::Air, RlcEntity::Rlc(Node::Enb), SapMsgInner::MacDataInd(ind)));
        let Some(up) = queue.pop_front() else { panic!() };
        assert_eq!(up.dest, RlcEntity::Pdcp(Node::Enb));
        let SapMsgInner::RlcDataInd(ind) = up.msg else { panic!() };
        assert_eq!(ind.sdu, vec![0xAB; 50]);

        // The poll on the only PDU makes the peer answer with a status
        assert!(enb.bearer().status_due());
        enb.rx_prim(&mut queue, grant(Node::Enb, 200));
        let Some(status) = queue.pop_front() else { panic!() };
        let SapMsgInner::MacDataReq(req) = status.msg else { panic!() };
        let ind = MacDataInd { lcid: LCID, pdu: req.pdu };
        ue.rx_prim(&mut queue, msg(Sap::MacSap, RlcEntity::Air, RlcEntity::Rlc(Node::Ue), SapMsgInner::MacDataInd(ind)));

        let Some(delivered) = queue.pop_front() else { panic!() };
        assert_eq!(delivered.dest, RlcEntity::Pdcp(Node::Ue));
        let SapMsgInner::RlcDeliveryInd(ind) = delivered.msg else { panic!() };
        assert_eq!(ind.sdu_ids, vec![0]);
    }

    #[test]
    fn test_rejected_sdu_reports_failure() {
        debug::setup_logging_verbose();
        let config = SharedConfig::from_config(Default::default());
        let mut ue = RlcAmEntity::new(config, Node::Ue, LCID).unwrap();
        let mut queue = MessageQueue::new();

        ue.rx_prim(&mut queue, data_req(Node::Ue, 9, vec![]));
        let Some(out) = queue.pop_front() else { panic!() };
        assert_eq!(out.dest, RlcEntity::Pdcp(Node::Ue));
        let SapMsgInner::RlcFailureInd(ind) = out.msg else { panic!() };
        assert_eq!(ind.sdu_ids, vec![9]);
    }

    #[test]
    fn test_poll_timer_runs_on_ticks() {
        debug::setup_logging_verbose();
        let config = SharedConfig::from_config(Default::default());
        let t_poll_retx = config.config().rlc_am.t_poll_retx as u64;
        let mut ue = RlcAmEntity::new(config, Node::Ue, LCID).unwrap();
        let mut queue = MessageQueue::new();

        ue.rx_prim(&mut queue, data_req(Node::Ue, 0, vec![1; 20]));
        ue.rx_prim(&mut queue, grant(Node::Ue, 100));
        assert_eq!(queue.len(), 1);
        queue.pop_front();

        // Nothing comes back, so the expiry schedules the PDU again
        for ts in 1..=t_poll_retx {
            ue.tick_start(&mut queue, ts);
        }
        ue.rx_prim(&mut queue, grant(Node::Ue, 100));
        assert_eq!(queue.len(), 1);
        assert_eq!(ue.bearer().metrics().num_retx_pdus, 1);
    }
}
