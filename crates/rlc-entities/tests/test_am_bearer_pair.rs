mod common;

use std::sync::Arc;

use common::recording::{RecordingControl, RecordingUpper};
use rlc_config::RlcAmConfig;
use rlc_core::{LiWidth, ManualTimers, debug};
use rlc_entities::rlc::am::AmBearer;

struct Side {
    bearer: AmBearer,
    timers: Arc<ManualTimers>,
    upper: Arc<RecordingUpper>,
    control: Arc<RecordingControl>,
}

fn side(cfg: RlcAmConfig) -> Side {
    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    let timers = Arc::new(ManualTimers::new(event_tx));
    let upper = Arc::new(RecordingUpper::default());
    let control = Arc::new(RecordingControl::default());
    let bearer = AmBearer::new(5, cfg, timers.clone(), event_rx, upper.clone(), control.clone()).unwrap();
    Side { bearer, timers, upper, control }
}

/// Exchanges PDUs over a perfect link until both sides are idle
fn pump(a: &Side, b: &Side, capacity: usize, max_rounds: usize) {
    for _ in 0..max_rounds {
        let to_b = a.bearer.read_pdu(capacity);
        let to_a = b.bearer.read_pdu(capacity);
        if !to_b.is_empty() {
            b.bearer.write_pdu(&to_b);
        }
        if !to_a.is_empty() {
            a.bearer.write_pdu(&to_a);
        }
        a.timers.advance(1);
        b.timers.advance(1);
        a.bearer.process_timer_events();
        b.bearer.process_timer_events();
        if to_a.is_empty() && to_b.is_empty() && !a.bearer.has_data() && !b.bearer.has_data() {
            return;
        }
    }
}

#[test]
fn test_large_sdu_over_small_grants() {
    debug::setup_logging_verbose();
    let a = side(RlcAmConfig::default());
    let b = side(RlcAmConfig::default());
    let sdu: Vec<u8> = (0..3000u32).map(|i| (i * 7) as u8).collect();
    a.bearer.write_sdu(0, sdu.clone()).unwrap();

    pump(&a, &b, 64, 500);
    assert_eq!(b.upper.sdus(), vec![sdu]);
    assert_eq!(a.upper.delivered(), vec![0]);
    assert!(a.bearer.metrics().num_tx_pdus >= 3000 / 64);
}

#[test]
fn test_discarded_sdu_is_never_sent() {
    debug::setup_logging_verbose();
    let a = side(RlcAmConfig::default());
    let b = side(RlcAmConfig::default());
    for id in 0..3u32 {
        a.bearer.write_sdu(id, vec![id as u8; 30]).unwrap();
    }
    assert!(a.bearer.discard_sdu(1));
    assert!(!a.bearer.discard_sdu(1));

    pump(&a, &b, 500, 100);
    assert_eq!(b.upper.sdus(), vec![vec![0u8; 30], vec![2u8; 30]]);
    assert_eq!(a.upper.delivered(), vec![0, 2]);
    assert!(a.upper.failed().is_empty());
}

#[test]
fn test_extended_li_concatenates_large_sdus() {
    debug::setup_logging_verbose();
    let cfg = RlcAmConfig { li_width: LiWidth::Extended, ..Default::default() };
    let a = side(cfg.clone());
    let b = side(cfg);
    a.bearer.write_sdu(0, vec![1; 2500]).unwrap();
    a.bearer.write_sdu(1, vec![2; 2500]).unwrap();

    pump(&a, &b, 6000, 100);
    assert_eq!(b.upper.sdus(), vec![vec![1; 2500], vec![2; 2500]]);
    assert_eq!(a.upper.delivered(), vec![0, 1]);
    // Both SDUs went out in a single data PDU
    assert_eq!(a.bearer.metrics().num_tx_pdus, 1);
}

#[test]
fn test_bidirectional_traffic() {
    debug::setup_logging_verbose();
    let cfg = RlcAmConfig { window_size: 16, ..Default::default() };
    let a = side(cfg.clone());
    let b = side(cfg);
    for id in 0..50u32 {
        a.bearer.write_sdu(id, vec![id as u8; 90]).unwrap();
        b.bearer.write_sdu(id, vec![!(id as u8); 70]).unwrap();
    }

    pump(&a, &b, 100, 2000);
    assert_eq!(b.upper.sdus(), (0..50u32).map(|i| vec![i as u8; 90]).collect::<Vec<_>>());
    assert_eq!(a.upper.sdus(), (0..50u32).map(|i| vec![!(i as u8); 70]).collect::<Vec<_>>());
    assert_eq!(a.upper.delivered(), (0..50).collect::<Vec<u32>>());
    assert_eq!(b.upper.delivered(), (0..50).collect::<Vec<u32>>());
    assert_eq!(a.control.max_retx(), 0);
    assert_eq!(b.control.protocol_failures(), 0);

    a.bearer.reset_metrics();
    assert_eq!(a.bearer.metrics().num_tx_pdus, 0);
}
