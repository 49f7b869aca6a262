use core::fmt::Display;

use rlc_core::{RlcEntity, Sap, TickTime};

use super::mac::*;
use super::rlc::*;
use super::rrc::*;

/// Exhaustive list of primitives carried in a SapMsg
#[derive(Debug)]
pub enum SapMsgInner {
    // PDCP <-> RLC
    RlcDataReq(RlcDataReq),
    RlcDataInd(RlcDataInd),
    RlcDiscardReq(RlcDiscardReq),
    RlcDeliveryInd(RlcDeliveryInd),
    RlcFailureInd(RlcFailureInd),

    // RLC <-> MAC
    MacTxOpportunity(MacTxOpportunity),
    MacDataReq(MacDataReq),
    MacDataInd(MacDataInd),

    // RLC <-> RRC
    RrcMaxRetxInd(RrcMaxRetxInd),
    RrcProtocolFailureInd(RrcProtocolFailureInd),
    RrcReestablishReq(RrcReestablishReq),
}

impl Display for SapMsgInner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SapMsgInner::RlcDataReq(m) => write!(f, "RlcDataReq sdu {} len {}", m.sdu_id, m.sdu.len()),
            SapMsgInner::RlcDataInd(m) => write!(f, "RlcDataInd len {}", m.sdu.len()),
            SapMsgInner::RlcDiscardReq(m) => write!(f, "RlcDiscardReq sdu {}", m.sdu_id),
            SapMsgInner::RlcDeliveryInd(m) => write!(f, "RlcDeliveryInd {:?}", m.sdu_ids),
            SapMsgInner::RlcFailureInd(m) => write!(f, "RlcFailureInd {:?}", m.sdu_ids),
            SapMsgInner::MacTxOpportunity(m) => write!(f, "MacTxOpportunity {} bytes", m.max_bytes),
            SapMsgInner::MacDataReq(m) => write!(f, "MacDataReq len {}", m.pdu.len()),
            SapMsgInner::MacDataInd(m) => write!(f, "MacDataInd len {}", m.pdu.len()),
            SapMsgInner::RrcMaxRetxInd(m) => write!(f, "RrcMaxRetxInd lcid {}", m.lcid),
            SapMsgInner::RrcProtocolFailureInd(m) => write!(f, "RrcProtocolFailureInd lcid {}", m.lcid),
            SapMsgInner::RrcReestablishReq(m) => write!(f, "RrcReestablishReq lcid {}", m.lcid),
        }
    }
}

#[derive(Debug)]
pub struct SapMsg {
    pub sap: Sap,
    pub src: RlcEntity,
    pub dest: RlcEntity,
    /// Tick at which the message was created
    pub time: TickTime,
    pub msg: SapMsgInner,
}

impl SapMsg {
    pub fn new(sap: Sap, src: RlcEntity, dest: RlcEntity, time: TickTime, msg: SapMsgInner) -> Self {
        Self { sap, src, dest, time, msg }
    }

    pub fn get_source(&self) -> &RlcEntity {
        &self.src
    }
    pub fn get_dest(&self) -> &RlcEntity {
        &self.dest
    }
    pub fn get_sap(&self) -> &Sap {
        &self.sap
    }
}
