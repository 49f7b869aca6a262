use rlc_core::{Lcid, SduId};

/// RLC-DATA request: PDCP hands an SDU to the bearer for acknowledged transfer
#[derive(Debug)]
pub struct RlcDataReq {
    pub lcid: Lcid,
    pub sdu_id: SduId,
    pub sdu: Vec<u8>,
}

/// RLC-DATA indication: a reassembled SDU, delivered in order
#[derive(Debug)]
pub struct RlcDataInd {
    pub lcid: Lcid,
    pub sdu: Vec<u8>,
}

/// Withdraws an SDU that has not been transmitted yet
#[derive(Debug)]
pub struct RlcDiscardReq {
    pub lcid: Lcid,
    pub sdu_id: SduId,
}

/// Every fragment of these SDUs was acknowledged by the peer
#[derive(Debug)]
pub struct RlcDeliveryInd {
    pub lcid: Lcid,
    pub sdu_ids: Vec<SduId>,
}

/// These SDUs will never be delivered, either through max-retx or a reset
#[derive(Debug)]
pub struct RlcFailureInd {
    pub lcid: Lcid,
    pub sdu_ids: Vec<SduId>,
}
