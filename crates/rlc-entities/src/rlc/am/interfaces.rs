use rlc_core::{Lcid, SduId};

/// Upper layer (PDCP) as seen from a bearer
pub trait UpperLayer: Send + Sync {
    /// A reassembled SDU, in order
    fn write_sdu(&self, lcid: Lcid, sdu: Vec<u8>);
    /// SDUs whose every byte was acknowledged by the peer
    fn notify_delivery(&self, lcid: Lcid, sdu_ids: &[SduId]);
    /// SDUs that will never be delivered
    fn notify_failure(&self, lcid: Lcid, sdu_ids: &[SduId]);
}

/// Control plane (RRC) as seen from a bearer
pub trait ControlPlane: Send + Sync {
    fn max_retx_attempted(&self, lcid: Lcid);
    fn protocol_failure(&self, lcid: Lcid);
}

/// Output collected while an engine lock is held. The bearer dispatches it after the lock
/// is released, so collaborators may call straight back into the bearer.
#[derive(Debug, Default)]
pub struct Indications {
    pub sdus: Vec<Vec<u8>>,
    pub delivered: Vec<SduId>,
    pub failed: Vec<SduId>,
    pub max_retx_events: u32,
    pub protocol_failure: bool,
}

impl Indications {
    pub fn is_empty(&self) -> bool {
        self.sdus.is_empty()
            && self.delivered.is_empty()
            && self.failed.is_empty()
            && self.max_retx_events == 0
            && !self.protocol_failure
    }

    pub fn dispatch(self, lcid: Lcid, upper: &dyn UpperLayer, control: &dyn ControlPlane) {
        for sdu in self.sdus {
            upper.write_sdu(lcid, sdu);
        }
        if !self.delivered.is_empty() {
            upper.notify_delivery(lcid, &self.delivered);
        }
        if !self.failed.is_empty() {
            upper.notify_failure(lcid, &self.failed);
        }
        for _ in 0..self.max_retx_events {
            control.max_retx_attempted(lcid);
        }
        if self.protocol_failure {
            control.protocol_failure(lcid);
        }
    }
}
