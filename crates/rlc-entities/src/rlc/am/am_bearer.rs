use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use rlc_config::RlcAmConfig;
use rlc_core::{Lcid, SduId, TimerEvent, TimerFacility, TimerKind};
use rlc_pdus::{StatusPdu, is_control_pdu};

use super::am_rx::AmRx;
use super::am_tx::AmTx;
use super::interfaces::{ControlPlane, Indications, UpperLayer};
use super::metrics::RlcBearerMetrics;
use super::RlcError;

/// Data waiting for a transmission opportunity, as reported to the MAC scheduler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferState {
    /// New data, including an estimate of its header overhead
    pub newtx_bytes: usize,
    /// Pending status report plus the head retransmission
    pub prio_bytes: usize,
}

/// One AM bearer: a transmitter and a receiver, each behind its own lock.
///
/// Lock order is transmitter before receiver. Collaborators are only called after both locks
/// are released, so they may call back into the bearer.
pub struct AmBearer {
    lcid: Lcid,
    tx: Mutex<AmTx>,
    rx: Mutex<AmRx>,
    /// Raised by the receiver when a status report is due
    status_due: Arc<AtomicBool>,
    timers: Arc<dyn TimerFacility>,
    timer_events: Receiver<TimerEvent>,
    upper: Arc<dyn UpperLayer>,
    control: Arc<dyn ControlPlane>,
}

impl AmBearer {
    /// `timer_events` must receive the expiries posted by `timers`
    pub fn new(
        lcid: Lcid,
        cfg: RlcAmConfig,
        timers: Arc<dyn TimerFacility>,
        timer_events: Receiver<TimerEvent>,
        upper: Arc<dyn UpperLayer>,
        control: Arc<dyn ControlPlane>,
    ) -> Result<Self, RlcError> {
        cfg.validate().map_err(RlcError::InvalidConfig)?;
        let status_due = Arc::new(AtomicBool::new(false));
        tracing::info!("lcid {} am bearer up, window {}, li {}", lcid, cfg.window_size, cfg.li_width);
        Ok(AmBearer {
            lcid,
            tx: Mutex::new(AmTx::new(lcid, cfg.clone(), timers.clone())),
            rx: Mutex::new(AmRx::new(lcid, cfg, timers.clone(), status_due.clone())),
            status_due,
            timers,
            timer_events,
            upper,
            control,
        })
    }

    pub fn lcid(&self) -> Lcid {
        self.lcid
    }

    fn lock_tx(&self) -> MutexGuard<'_, AmTx> {
        self.tx.lock().expect("tx mutex poisoned")
    }

    fn lock_rx(&self) -> MutexGuard<'_, AmRx> {
        self.rx.lock().expect("rx mutex poisoned")
    }

    fn dispatch(&self, ind: Indications) {
        if !ind.is_empty() {
            ind.dispatch(self.lcid, self.upper.as_ref(), self.control.as_ref());
        }
    }

    fn status_sendable(&self, tx: &AmTx) -> bool {
        self.status_due.load(Ordering::SeqCst) && !tx.status_prohibited()
    }

    pub fn write_sdu(&self, sdu_id: SduId, sdu: Vec<u8>) -> Result<(), RlcError> {
        self.lock_tx().write_sdu(sdu_id, sdu)
    }

    pub fn discard_sdu(&self, sdu_id: SduId) -> bool {
        self.lock_tx().discard_sdu(sdu_id)
    }

    /// Builds the PDU for a transmission opportunity of `max_bytes`. Empty if nothing fits.
    pub fn read_pdu(&self, max_bytes: usize) -> Vec<u8> {
        let mut ind = Indications::default();
        let pdu = {
            let mut tx = self.lock_tx();
            let status = if self.status_sendable(&tx) {
                let mut rx = self.lock_rx();
                let status = rx.get_status_pdu(max_bytes);
                if status.is_some() {
                    rx.reset_status();
                }
                status
            } else {
                None
            };
            tx.read_pdu(max_bytes, status, &mut ind)
        };
        self.dispatch(ind);
        pdu
    }

    /// Hands a PDU received from the lower layer to the bearer
    pub fn write_pdu(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            tracing::warn!("lcid {} dropping empty pdu", self.lcid);
            return;
        }
        let mut ind = Indications::default();
        if is_control_pdu(bytes) {
            match StatusPdu::from_bytes(bytes) {
                Ok(status) => self.lock_tx().handle_control_pdu(&status, &mut ind),
                Err(e) => tracing::warn!("lcid {} dropping malformed status pdu: {}", self.lcid, e),
            }
        } else {
            self.lock_rx().handle_data_pdu(bytes, &mut ind);
        }
        self.dispatch(ind);
    }

    fn apply_timer_event(&self, event: TimerEvent, ind: &mut Indications) {
        if event.id.bearer != self.lcid {
            tracing::warn!("lcid {} ignoring timer event for {}", self.lcid, event.id);
            return;
        }
        match event.id.kind {
            TimerKind::PollRetransmit => {
                let mut tx = self.lock_tx();
                if self.timers.accept(&event) {
                    tx.on_poll_retx_expired(ind);
                }
            }
            TimerKind::StatusProhibit => {
                let mut tx = self.lock_tx();
                if self.timers.accept(&event) {
                    tx.on_status_prohibit_expired();
                }
            }
            TimerKind::Reordering => {
                let mut rx = self.lock_rx();
                if self.timers.accept(&event) {
                    rx.on_reordering_expired();
                }
            }
        }
    }

    /// Applies every pending timer expiry. Used with tick driven timers.
    pub fn process_timer_events(&self) {
        let mut ind = Indications::default();
        while let Ok(event) = self.timer_events.try_recv() {
            self.apply_timer_event(event, &mut ind);
        }
        self.dispatch(ind);
    }

    /// Applies timer expiries from a dedicated thread, for wall clock timers. The thread
    /// exits once the bearer is dropped.
    pub fn spawn_timer_dispatcher(self: &Arc<Self>) -> std::io::Result<JoinHandle<()>> {
        let bearer = Arc::downgrade(self);
        let events = self.timer_events.clone();
        std::thread::Builder::new().name(format!("rlc-am-{}", self.lcid)).spawn(move || {
            loop {
                match events.recv_timeout(Duration::from_millis(100)) {
                    Ok(event) => {
                        let Some(bearer) = bearer.upgrade() else {
                            return;
                        };
                        let mut ind = Indications::default();
                        bearer.apply_timer_event(event, &mut ind);
                        bearer.dispatch(ind);
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        if bearer.strong_count() == 0 {
                            return;
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }
        })
    }

    pub fn get_buffer_state(&self) -> BufferState {
        let tx = self.lock_tx();
        let (newtx_bytes, mut prio_bytes) = tx.get_buffer_state();
        if self.status_sendable(&tx) {
            prio_bytes += self.lock_rx().get_status_pdu_length();
        }
        BufferState { newtx_bytes, prio_bytes }
    }

    pub fn has_data(&self) -> bool {
        let tx = self.lock_tx();
        self.status_sendable(&tx) || tx.has_data()
    }

    pub fn status_due(&self) -> bool {
        self.status_due.load(Ordering::SeqCst)
    }

    /// Drops all state. Undelivered SDUs are reported as failed.
    pub fn reestablish(&self) {
        let mut ind = Indications::default();
        {
            let mut tx = self.lock_tx();
            let mut rx = self.lock_rx();
            tx.reestablish(&mut ind);
            rx.reestablish();
        }
        tracing::info!("lcid {} reestablished", self.lcid);
        self.dispatch(ind);
    }

    /// Like reestablish, but the bearer stays inactive afterwards
    pub fn stop(&self) {
        let mut ind = Indications::default();
        {
            let mut tx = self.lock_tx();
            let mut rx = self.lock_rx();
            tx.stop(&mut ind);
            rx.stop();
        }
        tracing::info!("lcid {} stopped", self.lcid);
        self.dispatch(ind);
    }

    /// Applies a new configuration, then reestablishes
    pub fn configure(&self, cfg: RlcAmConfig) -> Result<(), RlcError> {
        cfg.validate().map_err(RlcError::InvalidConfig)?;
        let mut ind = Indications::default();
        {
            let mut tx = self.lock_tx();
            let mut rx = self.lock_rx();
            tx.reconfigure(cfg.clone(), &mut ind);
            rx.reconfigure(cfg);
        }
        tracing::info!("lcid {} reconfigured", self.lcid);
        self.dispatch(ind);
        Ok(())
    }

    pub fn metrics(&self) -> RlcBearerMetrics {
        let tx = self.lock_tx();
        let rx = self.lock_rx();
        tx.metrics().merge(&rx.metrics())
    }

    pub fn reset_metrics(&self) {
        let mut tx = self.lock_tx();
        let mut rx = self.lock_rx();
        tx.reset_metrics();
        rx.reset_metrics();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rlc_core::{ManualTimers, ThreadTimers, debug};
    use std::time::Instant;

    #[derive(Default)]
    struct Recorder {
        sdus: Mutex<Vec<Vec<u8>>>,
        delivered: Mutex<Vec<SduId>>,
        failed: Mutex<Vec<SduId>>,
        max_retx: Mutex<u32>,
    }

    impl UpperLayer for Recorder {
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

    impl ControlPlane for Recorder {
        fn max_retx_attempted(&self, _lcid: Lcid) {
            *self.max_retx.lock().unwrap() += 1;
        }
        fn protocol_failure(&self, _lcid: Lcid) {}
    }

    fn manual_bearer(cfg: RlcAmConfig) -> (AmBearer, Arc<ManualTimers>, Arc<Recorder>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let timers = Arc::new(ManualTimers::new(tx));
        let rec = Arc::new(Recorder::default());
        let bearer = AmBearer::new(3, cfg, timers.clone(), rx, rec.clone(), rec.clone()).unwrap();
        (bearer, timers, rec)
    }

    #[test]
    fn test_loopback_with_losses() {
        debug::setup_logging_verbose();
        let cfg = RlcAmConfig { t_poll_retx: 20, t_reordering: 10, max_retx_thresh: 16, ..Default::default() };
        let (a, a_timers, a_rec) = manual_bearer(cfg.clone());
        let (b, b_timers, b_rec) = manual_bearer(cfg);

        let sdus: Vec<Vec<u8>> = (0..40u32).map(|i| vec![i as u8; 50 + (i as usize * 37) % 300]).collect();
        for (i, sdu) in sdus.iter().enumerate() {
            a.write_sdu(i as u32, sdu.clone()).unwrap();
        }

        // 10% of the PDUs are lost in either direction
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2000 {
            let pdu = a.read_pdu(120);
            if !pdu.is_empty() && !rng.random_bool(0.1) {
                b.write_pdu(&pdu);
            }
            let pdu = b.read_pdu(120);
            if !pdu.is_empty() && !rng.random_bool(0.1) {
                a.write_pdu(&pdu);
            }
            a_timers.advance(1);
            b_timers.advance(1);
            a.process_timer_events();
            b.process_timer_events();
            if a_rec.delivered.lock().unwrap().len() == sdus.len() {
                break;
            }
        }

        assert_eq!(*b_rec.sdus.lock().unwrap(), sdus);
        let mut delivered = a_rec.delivered.lock().unwrap().clone();
        delivered.sort_unstable();
        assert_eq!(delivered, (0..40).collect::<Vec<u32>>());
        assert!(a_rec.failed.lock().unwrap().is_empty());
        assert!(a.metrics().num_retx_pdus > 0);
        assert!(b.metrics().num_tx_status_pdus > 0);
    }

    #[test]
    fn test_reestablish_discards_stale_expiry() {
        debug::setup_logging_verbose();
        let (a, timers, rec) = manual_bearer(RlcAmConfig::default());
        a.write_sdu(9, vec![1; 10]).unwrap();
        assert!(!a.read_pdu(100).is_empty());
        timers.advance(45);

        a.reestablish();
        assert_eq!(*rec.failed.lock().unwrap(), vec![9]);
        a.process_timer_events();
        assert!(!a.has_data());
        assert!(a.read_pdu(100).is_empty());
    }

    #[test]
    fn test_status_takes_priority() {
        debug::setup_logging_verbose();
        let (a, _ta, _ra) = manual_bearer(RlcAmConfig::default());
        let (b, _tb, rb) = manual_bearer(RlcAmConfig::default());
        a.write_sdu(1, vec![5; 10]).unwrap();
        b.write_sdu(2, vec![6; 10]).unwrap();

        // polled PDU from a makes a status due at b
        b.write_pdu(&a.read_pdu(100));
        assert_eq!(*rb.sdus.lock().unwrap(), vec![vec![5; 10]]);
        assert!(b.status_due());
        assert_eq!(b.get_buffer_state(), BufferState { newtx_bytes: 12, prio_bytes: 2 });

        let status = b.read_pdu(100);
        assert!(is_control_pdu(&status));
        assert_eq!(StatusPdu::from_bytes(&status).unwrap(), StatusPdu::new(1));
        assert!(!b.status_due());
        assert!(!is_control_pdu(&b.read_pdu(100)));
    }

    #[test]
    fn test_status_prohibit_holds_back_status() {
        debug::setup_logging_verbose();
        let cfg = RlcAmConfig { t_status_prohibit: 50, ..Default::default() };
        let (a, _ta, _ra) = manual_bearer(cfg.clone());
        let (b, tb, _rb) = manual_bearer(cfg);

        a.write_sdu(1, vec![5; 10]).unwrap();
        b.write_pdu(&a.read_pdu(100));
        assert!(b.status_due());
        let status = b.read_pdu(100);
        assert_eq!(StatusPdu::from_bytes(&status).unwrap(), StatusPdu::new(1));

        // second poll arrives while t-StatusProhibit runs
        a.write_sdu(2, vec![6; 10]).unwrap();
        b.write_pdu(&a.read_pdu(100));
        assert!(b.status_due());
        assert!(b.read_pdu(100).is_empty());
        assert!(b.status_due());

        tb.advance(50);
        b.process_timer_events();
        let status = b.read_pdu(100);
        assert!(is_control_pdu(&status));
        assert_eq!(StatusPdu::from_bytes(&status).unwrap(), StatusPdu::new(2));
        assert!(!b.status_due());
    }

    #[test]
    fn test_configure_validates() {
        debug::setup_logging_verbose();
        let (a, _timers, _rec) = manual_bearer(RlcAmConfig::default());
        let bad = RlcAmConfig { window_size: 1000, ..Default::default() };
        assert!(matches!(a.configure(bad), Err(RlcError::InvalidConfig(_))));
        assert!(a.configure(RlcAmConfig { window_size: 32, ..Default::default() }).is_ok());

        a.stop();
        assert_eq!(a.write_sdu(1, vec![1]), Err(RlcError::NotActive));
        a.reestablish();
        assert!(a.write_sdu(1, vec![1]).is_ok());
    }

    #[test]
    fn test_threaded_timer_dispatch() {
        debug::setup_logging_verbose();
        let (tx, rx) = crossbeam_channel::unbounded();
        let timers = Arc::new(ThreadTimers::new(tx).unwrap());
        let rec = Arc::new(Recorder::default());
        let cfg = RlcAmConfig { t_poll_retx: 20, ..Default::default() };
        let bearer = Arc::new(AmBearer::new(4, cfg, timers, rx, rec.clone(), rec).unwrap());
        let _dispatcher = bearer.spawn_timer_dispatcher().unwrap();

        bearer.write_sdu(1, vec![1; 10]).unwrap();
        assert!(!bearer.read_pdu(100).is_empty());
        assert!(!bearer.has_data());

        // t-PollRetransmit fires on the timer thread and queues a retransmission
        let start = Instant::now();
        while !bearer.has_data() {
            assert!(start.elapsed() < Duration::from_secs(2), "poll timer never fired");
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!bearer.read_pdu(100).is_empty());
        assert_eq!(bearer.metrics().num_retx_pdus, 1);
    }
}
