use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use rlc_core::{Lcid, SduId};
use rlc_entities::rlc::am::{ControlPlane, UpperLayer};

/// Upper layer that keeps everything a bearer hands up
#[derive(Default)]
pub struct RecordingUpper {
    sdus: Mutex<Vec<Vec<u8>>>,
    delivered: Mutex<Vec<SduId>>,
    failed: Mutex<Vec<SduId>>,
}

impl RecordingUpper {
    pub fn sdus(&self) -> Vec<Vec<u8>> {
        self.sdus.lock().unwrap().clone()
    }

    /// Delivered ids, sorted
    pub fn delivered(&self) -> Vec<SduId> {
        let mut ids = self.delivered.lock().unwrap().clone();
        ids.sort_unstable();
        ids
    }

    pub fn failed(&self) -> Vec<SduId> {
        let mut ids = self.failed.lock().unwrap().clone();
        ids.sort_unstable();
        ids
    }
}

impl UpperLayer for RecordingUpper {
    fn write_sdu(&self, _lcid: Lcid, sdu: Vec<u8>) {
        self.sdus.lock().unwrap().push(sdu);
    }

    fn notify_delivery(&self, _lcid: Lcid, sdu_ids: &[SduId]) {
        self.delivered.lock().unwrap().extend_from_slice(sdu_ids);
    }

    fn notify_failure(&self, _lcid: Lcid, sdu_ids: &[SduId]) {
        self.failed.lock().unwrap().extend_from_slice(sdu_ids);
    }
}

/// Control plane counting link failure notifications
#[derive(Default)]
pub struct RecordingControl {
    pub max_retx: AtomicU32,
    pub protocol_failures: AtomicU32,
}

impl RecordingControl {
    pub fn max_retx(&self) -> u32 {
        self.max_retx.load(Ordering::SeqCst)
    }

    pub fn protocol_failures(&self) -> u32 {
        self.protocol_failures.load(Ordering::SeqCst)
    }
}

impl ControlPlane for RecordingControl {
    fn max_retx_attempted(&self, _lcid: Lcid) {
        self.max_retx.fetch_add(1, Ordering::SeqCst);
    }

    fn protocol_failure(&self, _lcid: Lcid) {
        self.protocol_failures.fetch_add(1, Ordering::SeqCst);
    }
}
