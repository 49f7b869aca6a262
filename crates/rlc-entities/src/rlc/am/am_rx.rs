//! Receiving side of an AM bearer, TS 36.322 clause 5.1.3.2 and 5.2.3

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rlc_config::RlcAmConfig;
use rlc_core::sn::{sn_add, sn_diff, sn_in_range};
use rlc_core::{Lcid, TimerFacility, TimerId, TimerKind};
use rlc_pdus::am::pdus::amd_pdu_header::SO_END_OF_PDU;
use rlc_pdus::{AmdPdu, AmdPduHeader, FramingInfo, NackEntry, StatusPdu};

use super::interfaces::Indications;
use super::metrics::RlcBearerMetrics;
use super::ring_window::RingWindow;

/// Fixed part of a status PDU, in bits
const STATUS_FIXED_BITS: usize = 15;

#[derive(Debug)]
pub struct RxPdu {
    pub header: AmdPduHeader,
    pub payload: Vec<u8>,
}

struct RxSegment {
    header: AmdPduHeader,
    payload: Vec<u8>,
}

impl RxSegment {
    fn so(&self) -> usize {
        self.header.so as usize
    }

    fn end(&self) -> usize {
        self.so() + self.payload.len()
    }
}

pub struct AmRx {
    cfg: RlcAmConfig,
    lcid: Lcid,
    active: bool,

    window: RingWindow<RxPdu>,
    /// Segments of SNs not yet fully received, sorted by SO
    segments: HashMap<u16, Vec<RxSegment>>,
    /// Bytes of an SDU whose last fragment has not arrived yet
    partial: Option<Vec<u8>>,

    /// VR(R), lower edge of the receiving window
    vr_r: u16,
    /// VR(H), highest received SN + 1
    vr_h: u16,
    /// VR(X), SN that triggered t-Reordering
    vr_x: u16,
    /// VR(MS), highest SN a status may report as received
    vr_ms: u16,

    poll_received: bool,
    /// Poll seen at an SN beyond VR(MS); reported once VR(MS) passes it
    deferred_poll: Option<u16>,
    do_status: Arc<AtomicBool>,

    timers: Arc<dyn TimerFacility>,
    reordering_timer: TimerId,

    metrics: RlcBearerMetrics,
}

impl AmRx {
    /// `do_status` is raised whenever a status report is due. It is shared with the bearer.
    pub fn new(lcid: Lcid, cfg: RlcAmConfig, timers: Arc<dyn TimerFacility>, do_status: Arc<AtomicBool>) -> Self {
        AmRx {
            lcid,
            active: true,
            window: RingWindow::new(cfg.window_size),
            segments: HashMap::new(),
            partial: None,
            vr_r: 0,
            vr_h: 0,
            vr_x: 0,
            vr_ms: 0,
            poll_received: false,
            deferred_poll: None,
            do_status,
            timers,
            reordering_timer: TimerId::new(lcid, TimerKind::Reordering),
            metrics: RlcBearerMetrics::default(),
            cfg,
        }
    }

    pub fn vr_r(&self) -> u16 {
        self.vr_r
    }

    pub fn vr_h(&self) -> u16 {
        self.vr_h
    }

    pub fn vr_ms(&self) -> u16 {
        self.vr_ms
    }

    pub fn vr_mr(&self) -> u16 {
        sn_add(self.vr_r, self.cfg.window_size)
    }

    pub fn poll_received(&self) -> bool {
        self.poll_received
    }

    pub fn get_do_status(&self) -> bool {
        self.do_status.load(Ordering::SeqCst)
    }

    /// Called once the status built by `get_status_pdu` was handed to the lower layer
    pub fn reset_status(&mut self) {
        self.do_status.store(false, Ordering::SeqCst);
        self.poll_received = false;
        self.deferred_poll = None;
    }

    pub fn reordering_running(&self) -> bool {
        self.timers.is_running(self.reordering_timer)
    }

    pub fn metrics(&self) -> RlcBearerMetrics {
        RlcBearerMetrics { rx_buffered_bytes: self.get_rx_buffered_bytes() as u64, ..self.metrics }
    }

    pub fn reset_metrics(&mut self) {
        self.metrics = RlcBearerMetrics::default();
    }

    /// Payload bytes held in the receive window and in incomplete segment sets
    pub fn get_rx_buffered_bytes(&self) -> usize {
        let in_window: usize = self.window.iter().map(|(_, p)| p.payload.len()).sum();
        let in_segments: usize = self.segments.values().flatten().map(|s| s.payload.len()).sum();
        in_window + in_segments
    }

    fn rel(&self, sn: u16) -> u16 {
        sn_diff(self.vr_r, sn)
    }

    fn in_window(&self, sn: u16) -> bool {
        sn_in_range(self.vr_r, self.cfg.window_size, sn)
    }

    fn raise_status(&self) {
        self.do_status.store(true, Ordering::SeqCst);
    }

    /// Entry point for a received data PDU or PDU segment
    pub fn handle_data_pdu(&mut self, bytes: &[u8], ind: &mut Indications) {
        if !self.active {
            return;
        }
        self.metrics.num_rx_pdus += 1;
        self.metrics.num_rx_pdu_bytes += bytes.len() as u64;

        let pdu = match AmdPdu::from_bytes(bytes, self.cfg.li_width) {
            Ok(pdu) => pdu,
            Err(e) => {
                tracing::warn!("lcid {} dropping malformed pdu: {}", self.lcid, e);
                return;
            }
        };
        tracing::debug!("<- {}", pdu);

        if pdu.header.rf {
            self.handle_segment(pdu, ind);
        } else {
            self.handle_full(pdu.header, pdu.payload, ind);
        }
    }

    fn handle_full(&mut self, header: AmdPduHeader, payload: Vec<u8>, ind: &mut Indications) {
        let sn = header.sn;
        if !self.in_window(sn) || self.window.has_sn(sn) {
            tracing::debug!("discarding sn {} outside [{}, {}) or duplicate", sn, self.vr_r, self.vr_mr());
            if header.p {
                self.raise_status();
            }
            return;
        }

        self.segments.remove(&sn);
        let poll = header.p;
        self.window.insert(sn, RxPdu { header, payload });

        self.update_vr_h(sn);
        if sn == self.vr_ms {
            self.advance_vr_ms();
        }
        if poll {
            self.on_poll(sn);
        }

        self.reassemble(ind);
        self.check_deferred_poll();
        self.update_reordering();
    }

    fn handle_segment(&mut self, pdu: AmdPdu, ind: &mut Indications) {
        let sn = pdu.header.sn;
        let poll = pdu.header.p;
        if !self.in_window(sn) || self.window.has_sn(sn) {
            tracing::debug!("discarding segment of sn {} outside [{}, {}) or already received", sn, self.vr_r, self.vr_mr());
            if poll {
                self.raise_status();
            }
            return;
        }

        let new = RxSegment { header: pdu.header, payload: pdu.payload };
        let segs = self.segments.entry(sn).or_default();
        if segs.iter().any(|s| s.so() <= new.so() && s.end() >= new.end()) {
            tracing::debug!("duplicate segment of sn {} [{}, {})", sn, new.so(), new.end());
            if poll {
                self.raise_status();
            }
            return;
        }
        segs.retain(|s| !(new.so() <= s.so() && new.end() >= s.end()));
        let pos = segs.partition_point(|s| s.so() < new.so());
        segs.insert(pos, new);

        let complete = Self::segments_complete(segs);
        self.update_vr_h(sn);

        if !complete {
            if poll {
                self.on_poll(sn);
            }
            self.update_reordering();
            return;
        }

        let segs = self.segments.remove(&sn).unwrap_or_default();
        match self.rebuild_pdu(sn, segs) {
            Some((header, payload)) => self.handle_full(header, payload, ind),
            None => {
                tracing::warn!("lcid {} segments of sn {} do not form a valid pdu, dropping", self.lcid, sn);
                self.update_reordering();
            }
        }
    }

    /// Gap free coverage from offset 0 up to a segment with LSF set
    fn segments_complete(segs: &[RxSegment]) -> bool {
        let mut covered = 0;
        for s in segs {
            if s.so() > covered {
                return false;
            }
            covered = covered.max(s.end());
        }
        segs.iter().any(|s| s.header.lsf && s.end() == covered)
    }

    /// Concatenates a complete segment set and rebuilds FI and LIs from the SDU boundaries
    /// carried by the individual segments
    fn rebuild_pdu(&self, sn: u16, segs: Vec<RxSegment>) -> Option<(AmdPduHeader, Vec<u8>)> {
        let total = segs.iter().map(|s| s.end()).max()?;
        let mut payload = Vec::with_capacity(total);
        let mut boundaries = BTreeSet::new();
        let mut p = false;
        let mut start_aligned = false;
        let mut end_aligned = false;

        for s in &segs {
            p |= s.header.p;
            if s.so() == 0 {
                start_aligned = s.header.fi.is_start_aligned();
            } else if s.header.fi.is_start_aligned() {
                boundaries.insert(s.so());
            }
            if s.header.lsf {
                end_aligned = s.header.fi.is_end_aligned();
            } else if s.header.fi.is_end_aligned() {
                boundaries.insert(s.end());
            }
            let mut acc = s.so();
            for li in &s.header.li {
                acc += *li as usize;
                boundaries.insert(acc);
            }
            if s.end() > payload.len() {
                let skip = payload.len() - s.so();
                payload.extend_from_slice(&s.payload[skip..]);
            }
        }

        let max_li = self.cfg.li_width.max_li() as usize;
        let mut li = Vec::new();
        let mut prev = 0;
        for b in boundaries.into_iter().filter(|b| *b > 0 && *b < total) {
            if b - prev > max_li {
                return None;
            }
            li.push((b - prev) as u16);
            prev = b;
        }

        let header = AmdPduHeader {
            p,
            li,
            ..AmdPduHeader::new(sn, FramingInfo::from_alignment(start_aligned, end_aligned))
        };
        tracing::debug!("sn {} reassembled from {} segments", sn, segs.len());
        Some((header, payload))
    }

    fn update_vr_h(&mut self, sn: u16) {
        if self.rel(sn) >= self.rel(self.vr_h) {
            self.vr_h = sn_add(sn, 1);
        }
    }

    fn advance_vr_ms(&mut self) {
        while self.window.has_sn(self.vr_ms) {
            self.vr_ms = sn_add(self.vr_ms, 1);
        }
    }

    fn on_poll(&mut self, sn: u16) {
        self.poll_received = true;
        if self.rel(sn) < self.rel(self.vr_ms) {
            self.raise_status();
        } else {
            self.deferred_poll = Some(sn);
        }
    }

    fn check_deferred_poll(&mut self) {
        if let Some(sn) = self.deferred_poll {
            if !self.in_window(sn) || self.rel(sn) < self.rel(self.vr_ms) {
                self.deferred_poll = None;
                self.raise_status();
            }
        }
    }

    /// Delivers every SDU completed by the in-sequence PDUs at VR(R)
    fn reassemble(&mut self, ind: &mut Indications) {
        let old_vr_r = self.vr_r;
        while let Some(pdu) = self.window.remove(self.vr_r) {
            self.deliver_pdu(pdu, ind);
            self.segments.remove(&self.vr_r);
            self.vr_r = sn_add(self.vr_r, 1);
        }
        if self.vr_r == old_vr_r {
            return;
        }
        let moved = sn_diff(old_vr_r, self.vr_r);
        if sn_diff(old_vr_r, self.vr_ms) < moved {
            self.vr_ms = self.vr_r;
        }
        if sn_diff(old_vr_r, self.vr_h) < moved {
            self.vr_h = self.vr_r;
        }
        tracing::trace!("rx window vr_r {} vr_h {} vr_ms {}", self.vr_r, self.vr_h, self.vr_ms);
    }

    fn deliver_pdu(&mut self, pdu: RxPdu, ind: &mut Indications) {
        let RxPdu { header, payload } = pdu;
        let num_frags = header.li.len() + 1;
        let mut pos = 0;

        for i in 0..num_frags {
            let len = header.li.get(i).map_or(payload.len() - pos, |li| *li as usize);
            let frag = &payload[pos..pos + len];
            pos += len;
            let starts_sdu = i > 0 || header.fi.is_start_aligned();
            let ends_sdu = i + 1 < num_frags || header.fi.is_end_aligned();

            if starts_sdu {
                if let Some(stale) = self.partial.take() {
                    tracing::warn!("dropping {} bytes of an incomplete sdu at sn {}", stale.len(), header.sn);
                    self.metrics.num_lost_sdus += 1;
                }
                self.partial = Some(frag.to_vec());
            } else if let Some(buf) = self.partial.as_mut() {
                buf.extend_from_slice(frag);
            } else {
                tracing::warn!("dropping fragment of sn {} without sdu start", header.sn);
                if ends_sdu {
                    self.metrics.num_lost_sdus += 1;
                }
                continue;
            }

            if ends_sdu {
                if let Some(sdu) = self.partial.take() {
                    self.metrics.num_rx_sdus += 1;
                    ind.sdus.push(sdu);
                }
            }
        }
    }

    fn update_reordering(&mut self) {
        if self.reordering_running() {
            let vr_mr = self.vr_mr();
            if self.vr_x == self.vr_r || (!self.in_window(self.vr_x) && self.vr_x != vr_mr) {
                tracing::trace!("stopping t-Reordering, vr_x {} vr_r {}", self.vr_x, self.vr_r);
                self.timers.stop(self.reordering_timer);
            }
        }
        if !self.reordering_running() && self.vr_h != self.vr_r {
            self.vr_x = self.vr_h;
            self.timers.start(self.reordering_timer, self.cfg.t_reordering);
            tracing::trace!("starting t-Reordering, vr_x {}", self.vr_x);
        }
    }

    /// t-Reordering expired: report everything missing below VR(X)
    pub fn on_reordering_expired(&mut self) {
        if !self.active {
            return;
        }
        tracing::debug!("t-Reordering expired, vr_x {} vr_r {}", self.vr_x, self.vr_r);
        self.vr_ms = self.vr_x;
        self.advance_vr_ms();
        self.raise_status();
        self.check_deferred_poll();

        if self.rel(self.vr_h) > self.rel(self.vr_ms) {
            self.vr_x = self.vr_h;
            self.timers.start(self.reordering_timer, self.cfg.t_reordering);
        }
    }

    /// NACK entries for the missing byte ranges of a partially received SN
    fn segment_nacks(sn: u16, segs: &[RxSegment]) -> Vec<NackEntry> {
        let mut nacks = Vec::new();
        let mut covered = 0;
        for s in segs {
            if s.so() > covered {
                nacks.push(NackEntry::segment(sn, covered as u16, (s.so() - 1) as u16));
            }
            covered = covered.max(s.end());
        }
        if !segs.iter().any(|s| s.header.lsf && s.end() == covered) {
            nacks.push(NackEntry::segment(sn, covered as u16, SO_END_OF_PDU));
        }
        nacks
    }

    /// Builds a status report of at most `capacity` bytes. When the NACK list does not fit,
    /// it is cut before the first SN whose entries do not fit, and ACK_SN is set to that SN.
    pub fn get_status_pdu(&self, capacity: usize) -> Option<StatusPdu> {
        if capacity < STATUS_FIXED_BITS.div_ceil(8) {
            return None;
        }

        let mut nacks = Vec::new();
        let mut bits = STATUS_FIXED_BITS;
        let mut ack_sn = self.vr_ms;
        let mut sn = self.vr_r;
        while sn != self.vr_ms {
            if !self.window.has_sn(sn) {
                let entries = match self.segments.get(&sn) {
                    Some(segs) if !segs.is_empty() => Self::segment_nacks(sn, segs),
                    _ => vec![NackEntry::whole(sn)],
                };
                let entry_bits: usize = entries.iter().map(|n| if n.so.is_some() { 42 } else { 12 }).sum();
                if (bits + entry_bits).div_ceil(8) > capacity {
                    ack_sn = sn;
                    break;
                }
                bits += entry_bits;
                nacks.extend(entries);
            }
            sn = sn_add(sn, 1);
        }

        let status = StatusPdu { ack_sn, nacks };
        if !status.is_valid() {
            tracing::warn!("built invalid status {}, falling back to ack_sn {}", status, self.vr_r);
            return Some(StatusPdu::new(self.vr_r));
        }
        Some(status)
    }

    /// Size of the status report that would be built with unlimited room
    pub fn get_status_pdu_length(&self) -> usize {
        self.get_status_pdu(usize::MAX).map_or(0, |s| s.packed_len())
    }

    fn reset(&mut self) {
        self.timers.stop(self.reordering_timer);
        if let Some(stale) = self.partial.take() {
            tracing::debug!("dropping {} bytes of an incomplete sdu", stale.len());
            self.metrics.num_lost_sdus += 1;
        }
        self.window.clear();
        self.segments.clear();
        self.vr_r = 0;
        self.vr_h = 0;
        self.vr_x = 0;
        self.vr_ms = 0;
        self.reset_status();
    }

    pub fn reestablish(&mut self) {
        self.reset();
        self.active = true;
    }

    pub fn stop(&mut self) {
        self.reset();
        self.active = false;
    }

    pub fn reconfigure(&mut self, cfg: RlcAmConfig) {
        self.reset();
        self.window = RingWindow::new(cfg.window_size);
        self.cfg = cfg;
        self.active = true;
    }
}
