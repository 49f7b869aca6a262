use rlc_core::Lcid;

/// An SN reached max_retx_thresh. The radio link is considered failed.
#[derive(Debug)]
pub struct RrcMaxRetxInd {
    pub lcid: Lcid,
}

/// The bearer detected an unrecoverable protocol error
#[derive(Debug)]
pub struct RrcProtocolFailureInd {
    pub lcid: Lcid,
}

/// RRC asks the bearer to reestablish, discarding all state
#[derive(Debug)]
pub struct RrcReestablishReq {
    pub lcid: Lcid,
}
