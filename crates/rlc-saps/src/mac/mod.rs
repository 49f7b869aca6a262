use rlc_core::Lcid;

/// The MAC grants the bearer a transmission opportunity of at most `max_bytes`
#[derive(Debug)]
pub struct MacTxOpportunity {
    pub lcid: Lcid,
    pub max_bytes: usize,
}

/// A PDU built by the bearer for transmission
#[derive(Debug)]
pub struct MacDataReq {
    pub lcid: Lcid,
    pub pdu: Vec<u8>,
}

/// A PDU received from the peer
#[derive(Debug)]
pub struct MacDataInd {
    pub lcid: Lcid,
    pub pdu: Vec<u8>,
}
