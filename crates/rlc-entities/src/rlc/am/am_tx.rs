//! Transmitting side of an AM bearer, TS 36.322 clause 5.1.3.1 and 5.2

use std::sync::Arc;

use rlc_config::RlcAmConfig;
use rlc_core::sn::{sn_add, sn_diff, sn_sub};
use rlc_core::{BitBuffer, Lcid, LiWidth, SduId, TimerFacility, TimerId, TimerKind};
use rlc_pdus::am::pdus::amd_pdu_header::SO_END_OF_PDU;
use rlc_pdus::{AmdPduHeader, FramingInfo, NackEntry, StatusPdu};

use super::interfaces::Indications;
use super::metrics::RlcBearerMetrics;
use super::pdu_tracker::PduTracker;
use super::poll_policy::{PollContext, PollPolicy, ThresholdPollPolicy};
use super::retx_queue::{RetxDescriptor, RetxQueue};
use super::ring_window::RingWindow;
use super::sdu_queue::{SduQueue, TxSdu};
use super::{MAX_PDU_PAYLOAD, MAX_SDUS_PER_PDU, MIN_DATA_PDU_SIZE, RlcError};

/// One SN's data, kept until VT(A) passes it
#[derive(Debug)]
pub struct TxPdu {
    /// Header as first sent, with the poll bit cleared
    pub header: AmdPduHeader,
    pub payload: Vec<u8>,
    /// SDUs with a fragment in this PDU
    pub sdu_ids: Vec<SduId>,
    pub retx_count: u32,
    /// Acked by a status whose ACK_SN lies beyond a NACK, VT(A) has not passed it yet
    pub acked: bool,
    /// Reached max_retx_thresh, never queued again
    pub failed: bool,
}

/// SDU of which some bytes were already placed into a PDU
struct PartialSdu {
    id: SduId,
    data: Vec<u8>,
    offset: usize,
}

pub struct AmTx {
    cfg: RlcAmConfig,
    lcid: Lcid,
    active: bool,

    sdu_queue: SduQueue,
    partial: Option<PartialSdu>,
    window: RingWindow<TxPdu>,
    retx_queue: RetxQueue,
    tracker: PduTracker,
    poll_policy: Box<dyn PollPolicy>,

    /// VT(A), lower edge of the transmitting window
    vt_a: u16,
    /// VT(S), SN of the next new PDU
    vt_s: u16,
    /// VT(S) - 1 when the last poll was sent
    poll_sn: u16,
    /// A valid status arrived since t-PollRetransmit was last armed
    status_received: bool,

    timers: Arc<dyn TimerFacility>,
    poll_timer: TimerId,
    prohibit_timer: TimerId,

    metrics: RlcBearerMetrics,
}

fn encode(header: &AmdPduHeader, payload: &[u8], li_width: LiWidth) -> Vec<u8> {
    let mut buf = BitBuffer::new_autoexpand((header.packed_len(li_width) + payload.len()) * 8);
    header.to_bitbuf(&mut buf, li_width);
    buf.write_bytes(payload);
    buf.into_bytes()
}

/// Offsets in the payload where an SDU fragment other than the first starts
fn fragment_boundaries(header: &AmdPduHeader) -> Vec<usize> {
    let mut acc = 0usize;
    header
        .li
        .iter()
        .map(|li| {
            acc += *li as usize;
            acc
        })
        .collect()
}

/// Merges all NACKed byte ranges of one SN into a single `[start, end)` range.
/// None means the whole PDU.
fn merge_nack_ranges(nacks: &[&NackEntry], pdu_len: usize) -> Option<(usize, usize)> {
    let mut lo = usize::MAX;
    let mut hi = 0;
    for nack in nacks {
        let (so_start, so_end) = nack.so?;
        let start = if so_start as usize >= pdu_len { 0 } else { so_start as usize };
        let end = if so_end == SO_END_OF_PDU { pdu_len } else { (so_end as usize + 1).min(pdu_len) };
        lo = lo.min(start);
        hi = hi.max(end);
    }
    if lo >= hi || (lo == 0 && hi == pdu_len) {
        return None;
    }
    Some((lo, hi))
}

impl AmTx {
    pub fn new(lcid: Lcid, cfg: RlcAmConfig, timers: Arc<dyn TimerFacility>) -> Self {
        AmTx {
            lcid,
            active: true,
            sdu_queue: SduQueue::new(cfg.tx_queue_length),
            partial: None,
            window: RingWindow::new(cfg.window_size),
            retx_queue: RetxQueue::new(cfg.window_size as usize),
            tracker: PduTracker::new(),
            poll_policy: Box::new(ThresholdPollPolicy::new(&cfg)),
            vt_a: 0,
            vt_s: 0,
            poll_sn: 0,
            status_received: false,
            timers,
            poll_timer: TimerId::new(lcid, TimerKind::PollRetransmit),
            prohibit_timer: TimerId::new(lcid, TimerKind::StatusProhibit),
            metrics: RlcBearerMetrics::default(),
            cfg,
        }
    }

    pub fn set_poll_policy(&mut self, policy: Box<dyn PollPolicy>) {
        self.poll_policy = policy;
    }

    pub fn vt_a(&self) -> u16 {
        self.vt_a
    }

    pub fn vt_s(&self) -> u16 {
        self.vt_s
    }

    pub fn poll_sn(&self) -> u16 {
        self.poll_sn
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn record(&self, sn: u16) -> Option<&TxPdu> {
        self.window.get(sn)
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn retx_queue_len(&self) -> usize {
        self.retx_queue.len()
    }

    pub fn is_queued_for_retx(&self, sn: u16) -> bool {
        self.retx_queue.has_sn(sn)
    }

    /// Every SN in [VT(A), VT(S)) has exactly one record and the window is not overrun
    pub fn window_consistent(&self) -> bool {
        let n = sn_diff(self.vt_a, self.vt_s);
        n <= self.cfg.window_size
            && self.window.len() == n as usize
            && (0..n).all(|off| self.window.has_sn(sn_add(self.vt_a, off)))
    }

    pub fn metrics(&self) -> RlcBearerMetrics {
        self.metrics
    }

    pub fn reset_metrics(&mut self) {
        self.metrics = RlcBearerMetrics::default();
    }

    fn window_full(&self) -> bool {
        sn_diff(self.vt_a, self.vt_s) >= self.cfg.window_size
    }

    fn has_new_data(&self) -> bool {
        self.partial.is_some() || !self.sdu_queue.is_empty()
    }

    pub fn status_prohibited(&self) -> bool {
        self.timers.is_running(self.prohibit_timer)
    }

    pub fn write_sdu(&mut self, sdu_id: SduId, sdu: Vec<u8>) -> Result<(), RlcError> {
        if !self.active {
            return Err(RlcError::NotActive);
        }
        if sdu.is_empty() {
            return Err(RlcError::EmptySdu);
        }
        if sdu.len() > self.cfg.max_sdu_size {
            return Err(RlcError::SduTooLarge { len: sdu.len(), max: self.cfg.max_sdu_size });
        }
        let len = sdu.len();
        self.sdu_queue.push(TxSdu { id: sdu_id, data: sdu }).map_err(|_| RlcError::QueueFull)?;
        self.metrics.num_tx_sdus += 1;
        tracing::trace!("write_sdu id {} len {}, {} queued", sdu_id, len, self.sdu_queue.len());
        Ok(())
    }

    /// Drops a queued SDU none of whose bytes were sent yet
    pub fn discard_sdu(&mut self, sdu_id: SduId) -> bool {
        let removed = self.sdu_queue.discard(sdu_id);
        if removed {
            tracing::debug!("discarded sdu {}", sdu_id);
        }
        removed
    }

    /// Whether `read_pdu` would return data, status reports aside
    pub fn has_data(&self) -> bool {
        if !self.active {
            return false;
        }
        !self.retx_queue.is_empty() || (!self.window_full() && self.has_new_data()) || self.stalled()
    }

    /// Window full, nothing to retransmit and no poll outstanding
    fn stalled(&self) -> bool {
        self.window_full()
            && self.retx_queue.is_empty()
            && !self.timers.is_running(self.poll_timer)
            && self.window.get(self.vt_a).is_some_and(|r| !r.acked && !r.failed)
    }

    /// Returns `(newtx_bytes, prio_bytes)`, the latter without any status report
    pub fn get_buffer_state(&self) -> (usize, usize) {
        let newtx = if self.window_full() {
            0
        } else {
            let n = self.sdu_queue.len() + self.partial.is_some() as usize;
            let bytes = self.sdu_queue.bytes() + self.partial.as_ref().map_or(0, |p| p.data.len() - p.offset);
            if n == 0 { 0 } else { bytes + ((n - 1) * 3).div_ceil(2) + 2 }
        };
        (newtx, self.head_retx_bytes())
    }

    fn head_retx_bytes(&self) -> usize {
        let w = self.cfg.li_width;
        let Some(desc) = self.retx_queue.front() else {
            return 0;
        };
        let Some(rec) = self.window.get(desc.sn) else {
            return 0;
        };
        if desc.is_segment {
            AmdPduHeader::packed_len_for(true, rec.header.li.len(), w) + desc.so_end.saturating_sub(desc.so_start)
        } else {
            rec.header.packed_len(w) + rec.payload.len()
        }
    }

    /// Builds the next PDU for a transmission opportunity of `capacity` bytes. A status
    /// report handed in by the bearer takes precedence over data. Returns an empty vector
    /// when nothing fits.
    pub fn read_pdu(&mut self, capacity: usize, status: Option<StatusPdu>, ind: &mut Indications) -> Vec<u8> {
        if !self.active {
            return Vec::new();
        }

        if let Some(status) = status {
            let bytes = status.to_bytes();
            tracing::debug!("-> {}", status);
            self.metrics.num_tx_status_pdus += 1;
            self.metrics.num_tx_pdus += 1;
            self.metrics.num_tx_pdu_bytes += bytes.len() as u64;
            if self.cfg.t_status_prohibit > 0 {
                self.timers.start(self.prohibit_timer, self.cfg.t_status_prohibit);
            }
            return bytes;
        }

        if self.stalled() {
            tracing::info!("tx window stalled at vt_a {}, retransmitting it", self.vt_a);
            self.schedule_retx(self.vt_a, None, ind);
        }

        if let Some(pdu) = self.build_retx_pdu(capacity) {
            return pdu;
        }
        self.build_data_pdu(capacity)
    }

    fn poll_context(&self, pdu_bytes: usize) -> PollContext {
        PollContext {
            vt_s: self.vt_s,
            window_full: self.window_full(),
            queues_empty: !self.has_new_data() && self.retx_queue.is_empty(),
            pdu_bytes,
        }
    }

    fn set_poll(&mut self) {
        self.poll_sn = sn_sub(self.vt_s, 1);
        self.status_received = false;
        self.timers.start(self.poll_timer, self.cfg.t_poll_retx);
        tracing::trace!("poll set, poll_sn {}", self.poll_sn);
    }

    fn build_data_pdu(&mut self, capacity: usize) -> Vec<u8> {
        if self.window_full() {
            tracing::trace!("tx window full, vt_a {} vt_s {}", self.vt_a, self.vt_s);
            return Vec::new();
        }
        if capacity < MIN_DATA_PDU_SIZE || !self.has_new_data() {
            return Vec::new();
        }

        let w = self.cfg.li_width;
        let sn = self.vt_s;
        let mut payload: Vec<u8> = Vec::new();
        let mut li: Vec<u16> = Vec::new();
        let mut sdu_ids: Vec<SduId> = Vec::new();
        let mut last_len = 0usize;
        let mut start_aligned = true;
        let mut end_aligned = false;

        loop {
            if self.partial.is_none() {
                if !sdu_ids.is_empty() {
                    // Another fragment needs an LI for the previous one
                    if sdu_ids.len() >= MAX_SDUS_PER_PDU || last_len > w.max_li() as usize {
                        break;
                    }
                    let hdr = AmdPduHeader::packed_len_for(false, li.len() + 1, w);
                    if hdr + payload.len() + 1 > capacity || payload.len() + 1 > MAX_PDU_PAYLOAD {
                        break;
                    }
                }
                let Some(sdu) = self.sdu_queue.pop() else {
                    break;
                };
                if !sdu_ids.is_empty() {
                    li.push(last_len as u16);
                }
                self.partial = Some(PartialSdu { id: sdu.id, data: sdu.data, offset: 0 });
            }
            let Some(part) = self.partial.as_mut() else {
                break;
            };
            if sdu_ids.is_empty() {
                start_aligned = part.offset == 0;
            }

            let hdr = AmdPduHeader::packed_len_for(false, li.len(), w);
            let room = capacity.saturating_sub(hdr + payload.len()).min(MAX_PDU_PAYLOAD - payload.len());
            let take = room.min(part.data.len() - part.offset);
            if take == 0 {
                break;
            }
            payload.extend_from_slice(&part.data[part.offset..part.offset + take]);
            part.offset += take;
            self.tracker.add_fragment(part.id, sn);
            sdu_ids.push(part.id);
            last_len = take;

            if part.offset == part.data.len() {
                self.tracker.set_fully_txed(part.id);
                self.partial = None;
                end_aligned = true;
            } else {
                end_aligned = false;
                break;
            }
        }

        if payload.is_empty() {
            return Vec::new();
        }

        let mut header = AmdPduHeader { li, ..AmdPduHeader::new(sn, FramingInfo::from_alignment(start_aligned, end_aligned)) };
        self.vt_s = sn_add(self.vt_s, 1);

        let ctx = self.poll_context(payload.len());
        if self.poll_policy.on_pdu(&ctx) {
            self.set_poll();
            header.p = true;
        }
        let bytes = encode(&header, &payload, w);
        tracing::debug!("-> {} ({} B payload)", header, payload.len());

        header.p = false;
        let record = TxPdu { header, payload, sdu_ids, retx_count: 0, acked: false, failed: false };
        if let Some((old_sn, _)) = self.window.insert(sn, record) {
            tracing::error!("tx window slot of sn {} still held sn {}", sn, old_sn);
        }

        self.metrics.num_tx_pdus += 1;
        self.metrics.num_tx_pdu_bytes += bytes.len() as u64;
        bytes
    }

    fn build_retx_pdu(&mut self, capacity: usize) -> Option<Vec<u8>> {
        let w = self.cfg.li_width;
        loop {
            let desc = *self.retx_queue.front()?;
            let Some(rec) = self.window.get(desc.sn) else {
                self.retx_queue.pop_front();
                continue;
            };
            if rec.acked || rec.failed {
                self.retx_queue.pop_front();
                continue;
            }
            let len = rec.payload.len();
            let so_end = desc.so_end.min(len);
            if desc.so_start >= so_end {
                self.retx_queue.pop_front();
                continue;
            }

            if !desc.is_segment && rec.header.packed_len(w) + len <= capacity {
                self.retx_queue.pop_front();
                let mut header = rec.header.clone();
                let ctx = self.poll_context(len);
                if self.poll_policy.on_pdu(&ctx) {
                    self.set_poll();
                    header.p = true;
                }
                let bytes = match self.window.get(desc.sn) {
                    Some(rec) => encode(&header, &rec.payload, w),
                    None => return None,
                };
                tracing::debug!("-> retx {} ({} B payload)", header, len);
                self.metrics.num_retx_pdus += 1;
                self.metrics.num_tx_pdus += 1;
                self.metrics.num_tx_pdu_bytes += bytes.len() as u64;
                return Some(bytes);
            }

            return self.build_segment(RetxDescriptor { so_end, ..desc }, capacity);
        }
    }

    /// Resegments the byte range of `desc` into a PDU segment of at most `capacity` bytes
    fn build_segment(&mut self, desc: RetxDescriptor, capacity: usize) -> Option<Vec<u8>> {
        let w = self.cfg.li_width;
        let rec = self.window.get(desc.sn)?;
        let len = rec.payload.len();
        let boundaries = fragment_boundaries(&rec.header);
        let a = desc.so_start;
        let inner: Vec<usize> = boundaries.iter().copied().filter(|b| *b > a && *b < desc.so_end).collect();

        // Largest end offset e such that the segment [a, e) with its LIs fits
        let mut best: Option<(usize, usize)> = None;
        for k in 0..=inner.len() {
            let hdr = AmdPduHeader::packed_len_for(true, k, w);
            let lo = if k == 0 { a } else { inner[k - 1] };
            let hi = if k < inner.len() { inner[k] } else { desc.so_end };
            let Some(room) = capacity.checked_sub(hdr) else {
                break;
            };
            let e = hi.min(a + room);
            if e <= lo {
                break;
            }
            best = Some((k, e));
        }
        let Some((k, e)) = best else {
            tracing::trace!("no room for a segment of sn {} in {} bytes", desc.sn, capacity);
            return None;
        };

        let mut li = Vec::with_capacity(k);
        let mut prev = a;
        for b in &inner[..k] {
            li.push((*b - prev) as u16);
            prev = *b;
        }
        let start_aligned = if a == 0 { rec.header.fi.is_start_aligned() } else { boundaries.contains(&a) };
        let end_aligned = if e == len { rec.header.fi.is_end_aligned() } else { boundaries.contains(&e) };
        let mut header = AmdPduHeader {
            rf: true,
            p: false,
            fi: FramingInfo::from_alignment(start_aligned, end_aligned),
            sn: desc.sn,
            lsf: e == len,
            so: a as u16,
            li,
        };
        let payload = rec.payload[a..e].to_vec();

        if e >= desc.so_end {
            self.retx_queue.pop_front();
        } else if let Some(front) = self.retx_queue.front_mut() {
            front.so_start = e;
            front.so_end = desc.so_end;
            front.is_segment = true;
        }

        let ctx = self.poll_context(payload.len());
        if self.poll_policy.on_pdu(&ctx) {
            self.set_poll();
            header.p = true;
        }
        let bytes = encode(&header, &payload, w);
        tracing::debug!("-> retx segment {} ({} B payload)", header, payload.len());
        self.metrics.num_retx_pdus += 1;
        self.metrics.num_tx_pdus += 1;
        self.metrics.num_tx_pdu_bytes += bytes.len() as u64;
        Some(bytes)
    }

    /// Queues `sn` for retransmission, or gives up on it once max_retx_thresh is reached.
    /// Returns whether it was queued.
    fn schedule_retx(&mut self, sn: u16, range: Option<(usize, usize)>, ind: &mut Indications) -> bool {
        if self.retx_queue.has_sn(sn) {
            return false;
        }
        let max_retx = self.cfg.max_retx_thresh;
        let Some(rec) = self.window.get_mut(sn) else {
            return false;
        };
        if rec.acked || rec.failed {
            return false;
        }

        if rec.retx_count >= max_retx {
            rec.failed = true;
            let sdu_ids = rec.sdu_ids.clone();
            tracing::warn!("lcid {} sn {} reached max_retx_thresh {}, giving up", self.lcid, sn, max_retx);
            let failed = self.tracker.fail(&sdu_ids);
            self.metrics.num_lost_pdus += 1;
            self.metrics.num_lost_sdus += failed.len() as u64;
            ind.max_retx_events += 1;
            ind.failed.extend(failed);
            return false;
        }

        rec.retx_count += 1;
        let len = rec.payload.len();
        let desc = match range {
            Some((start, end)) => RetxDescriptor::range(sn, start, end, len),
            None => RetxDescriptor::whole(sn, len),
        };
        tracing::trace!("sn {} queued for retx #{} [{}, {})", sn, rec.retx_count, desc.so_start, desc.so_end);
        self.retx_queue.push(desc)
    }

    fn ack_record(&mut self, sdu_ids: &[SduId], sn: u16, ind: &mut Indications) {
        ind.delivered.extend(self.tracker.ack_sn(sdu_ids, sn));
    }

    /// Applies a status report received from the peer
    pub fn handle_control_pdu(&mut self, status: &StatusPdu, ind: &mut Indications) {
        if !self.active {
            return;
        }
        tracing::debug!("<- {}", status);
        self.metrics.num_rx_pdus += 1;
        self.metrics.num_rx_pdu_bytes += status.packed_len() as u64;

        let ack_off = sn_diff(self.vt_a, status.ack_sn);
        if ack_off > sn_diff(self.vt_a, self.vt_s) {
            tracing::warn!(
                "dropping status with ack_sn {} outside [{}, {}]",
                status.ack_sn,
                self.vt_a,
                self.vt_s
            );
            return;
        }
        if !status.is_valid() {
            tracing::warn!("dropping status that nacks its own ack_sn {}", status.ack_sn);
            return;
        }
        self.status_received = true;

        if self.timers.is_running(self.poll_timer) {
            let poll_off = sn_diff(self.vt_a, self.poll_sn);
            if poll_off >= sn_diff(self.vt_a, self.vt_s) || poll_off < ack_off {
                tracing::trace!("poll_sn {} answered, stopping t-PollRetransmit", self.poll_sn);
                self.timers.stop(self.poll_timer);
            }
        }

        if !status.nacks.is_empty() {
            self.retx_queue.clear();
        }

        let mut advancing = true;
        let mut new_vt_a = self.vt_a;
        for off in 0..ack_off {
            let sn = sn_add(self.vt_a, off);
            let nacks: Vec<&NackEntry> = status.nacks.iter().filter(|n| n.nack_sn == sn).collect();

            if !nacks.is_empty() {
                advancing = false;
                let Some(rec) = self.window.get(sn) else {
                    continue;
                };
                if rec.acked || rec.failed {
                    continue;
                }
                let range = merge_nack_ranges(&nacks, rec.payload.len());
                self.schedule_retx(sn, range, ind);
                continue;
            }

            if advancing {
                if let Some(rec) = self.window.remove(sn) {
                    if !rec.acked {
                        self.ack_record(&rec.sdu_ids, sn, ind);
                    }
                }
                new_vt_a = sn_add(sn, 1);
            } else if let Some(rec) = self.window.get_mut(sn) {
                if !rec.acked && !rec.failed {
                    rec.acked = true;
                    let sdu_ids = rec.sdu_ids.clone();
                    self.ack_record(&sdu_ids, sn, ind);
                }
            }
        }
        self.vt_a = new_vt_a;

        if self.vt_a != self.vt_s && !self.window.has_sn(self.vt_a) {
            tracing::error!("tx window lost sn {} (vt_s {})", self.vt_a, self.vt_s);
            ind.protocol_failure = true;
        }
        tracing::trace!(
            "tx window vt_a {} vt_s {} len {} retx {}",
            self.vt_a,
            self.vt_s,
            self.window.len(),
            self.retx_queue.len()
        );
    }

    /// t-PollRetransmit expired
    pub fn on_poll_retx_expired(&mut self, ind: &mut Indications) {
        if !self.active {
            return;
        }
        tracing::debug!("t-PollRetransmit expired, poll_sn {}, status received {}", self.poll_sn, self.status_received);
        self.poll_policy.poll_timer_expired();

        if !self.status_received {
            for off in 0..sn_diff(self.vt_a, self.vt_s) {
                let sn = sn_add(self.vt_a, off);
                self.schedule_retx(sn, None, ind);
            }
        }

        let unacked = self.window.iter().any(|(_, r)| !r.acked && !r.failed);
        if unacked {
            self.status_received = false;
            self.timers.start(self.poll_timer, self.cfg.t_poll_retx);
        }
    }

    /// t-StatusProhibit expired. A pending status may now be sent.
    pub fn on_status_prohibit_expired(&mut self) {
        tracing::trace!("t-StatusProhibit expired");
    }

    fn reset(&mut self, ind: &mut Indications) {
        self.timers.stop(self.poll_timer);
        self.timers.stop(self.prohibit_timer);

        let mut failed = self.tracker.drain_all();
        failed.extend(self.sdu_queue.clear());
        failed.sort_unstable();
        failed.dedup();
        if !failed.is_empty() {
            tracing::info!("dropping {} undelivered sdus", failed.len());
        }
        self.metrics.num_lost_sdus += failed.len() as u64;
        ind.failed.extend(failed);

        self.partial = None;
        self.window.clear();
        self.retx_queue.clear();
        self.poll_policy.reset();
        self.vt_a = 0;
        self.vt_s = 0;
        self.poll_sn = 0;
        self.status_received = false;
    }

    pub fn reestablish(&mut self, ind: &mut Indications) {
        self.reset(ind);
        self.active = true;
    }

    /// Like reestablish, but further SDUs are refused until the next reestablish
    pub fn stop(&mut self, ind: &mut Indications) {
        self.reset(ind);
        self.active = false;
    }

    /// Takes a new, already validated configuration and reestablishes
    pub fn reconfigure(&mut self, cfg: RlcAmConfig, ind: &mut Indications) {
        self.reset(ind);
        self.sdu_queue = SduQueue::new(cfg.tx_queue_length);
        self.window = RingWindow::new(cfg.window_size);
        self.retx_queue = RetxQueue::new(cfg.window_size as usize);
        self.poll_policy = Box::new(ThresholdPollPolicy::new(&cfg));
        self.cfg = cfg;
        self.active = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Receiver;
    use rlc_core::{ManualTimers, TimerEvent, debug};
    use rlc_pdus::AmdPdu;

    fn setup(cfg: RlcAmConfig) -> (AmTx, Arc<ManualTimers>, Receiver<TimerEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let timers = Arc::new(ManualTimers::new(tx));
        (AmTx::new(1, cfg, timers.clone()), timers, rx)
    }

    fn parse(bytes: &[u8]) -> AmdPdu {
        AmdPdu::from_bytes(bytes, LiWidth::Normal).unwrap()
    }

    /// Sends `n` single-SDU PDUs of 10 bytes
    fn send_pdus(tx: &mut AmTx, n: u32) {
        let mut ind = Indications::default();
        for i in 0..n {
            tx.write_sdu(i, vec![i as u8; 10]).unwrap();
            let pdu = tx.read_pdu(12, None, &mut ind);
            assert_eq!(pdu.len(), 12);
        }
    }

    #[test]
    fn test_concatenation_and_segmentation() {
        debug::setup_logging_verbose();
        let (mut tx, _timers, _rx) = setup(RlcAmConfig::default());
        tx.write_sdu(1, vec![1; 10]).unwrap();
        tx.write_sdu(2, vec![2; 10]).unwrap();
        tx.write_sdu(3, vec![3; 30]).unwrap();

        // 2 + 3 (two LIs) + 10 + 10 + 5
        let mut ind = Indications::default();
        let pdu = parse(&tx.read_pdu(30, None, &mut ind));
        assert_eq!(pdu.header.sn, 0);
        assert_eq!(pdu.header.li, vec![10, 10]);
        assert_eq!(pdu.header.fi, FramingInfo::StartAligned);
        assert_eq!(pdu.payload.len(), 25);

        let pdu = parse(&tx.read_pdu(100, None, &mut ind));
        assert_eq!(pdu.header.sn, 1);
        assert_eq!(pdu.header.fi, FramingInfo::EndAligned);
        assert_eq!(pdu.payload, vec![3; 25]);
        // queues drained, so this one polls
        assert!(pdu.header.p);
        assert_eq!(tx.poll_sn(), 1);
        assert!(tx.window_consistent());
        assert!(!tx.has_data());
    }

    #[test]
    fn test_tx_scenario_nack_behind_ack() {
        debug::setup_logging_verbose();
        let cfg = RlcAmConfig { window_size: 4, ..Default::default() };
        let (mut tx, _timers, _rx) = setup(cfg);
        send_pdus(&mut tx, 4);
        assert_eq!(tx.vt_s(), 4);
        assert!(tx.window_consistent());

        // window full
        tx.write_sdu(99, vec![0; 10]).unwrap();
        let mut ind = Indications::default();
        assert_eq!(tx.get_buffer_state().0, 0);

        let status = StatusPdu { ack_sn: 2, nacks: vec![NackEntry::whole(0)] };
        tx.handle_control_pdu(&status, &mut ind);
        assert!(tx.is_queued_for_retx(0));
        assert!(tx.record(1).is_some_and(|r| r.acked));
        assert_eq!(tx.vt_a(), 0);
        assert!(tx.record(2).is_some_and(|r| !r.acked) && tx.record(3).is_some_and(|r| !r.acked));
        assert_eq!(ind.delivered, vec![1]);
        assert!(tx.window_consistent());

        // resend SN 0
        let pdu = parse(&tx.read_pdu(100, None, &mut ind));
        assert_eq!(pdu.header.sn, 0);
        assert!(!pdu.header.rf);

        let mut ind = Indications::default();
        tx.handle_control_pdu(&StatusPdu::new(2), &mut ind);
        assert_eq!(tx.vt_a(), 2);
        assert_eq!(ind.delivered, vec![0]);
        assert!(tx.window_consistent());
    }

    #[test]
    fn test_ack_idempotence() {
        debug::setup_logging_verbose();
        let (mut tx, _timers, _rx) = setup(RlcAmConfig::default());
        send_pdus(&mut tx, 3);

        let status = StatusPdu { ack_sn: 3, nacks: vec![NackEntry::whole(0)] };
        let mut ind = Indications::default();
        tx.handle_control_pdu(&status, &mut ind);
        assert_eq!(ind.delivered, vec![1, 2]);
        let retx_after_first = tx.record(0).map(|r| r.retx_count);

        let mut ind = Indications::default();
        let ack_only = StatusPdu::new(1);
        tx.handle_control_pdu(&ack_only, &mut ind);
        tx.handle_control_pdu(&ack_only, &mut ind);
        assert_eq!(ind.delivered, vec![0]);
        // VT(A) moved on past the acked records
        let mut ind = Indications::default();
        tx.handle_control_pdu(&StatusPdu::new(3), &mut ind);
        tx.handle_control_pdu(&StatusPdu::new(3), &mut ind);
        assert!(ind.delivered.is_empty());
        assert_eq!(tx.vt_a(), 3);
        assert_eq!(retx_after_first, Some(1));
        assert_eq!(tx.window_len(), 0);
    }

    #[test]
    fn test_retx_bound() {
        debug::setup_logging_verbose();
        let cfg = RlcAmConfig { max_retx_thresh: 3, ..Default::default() };
        let (mut tx, _timers, _rx) = setup(cfg);
        send_pdus(&mut tx, 2);

        let status = StatusPdu { ack_sn: 2, nacks: vec![NackEntry::whole(0)] };
        let mut retransmissions = 0;
        let mut ind = Indications::default();
        for _ in 0..6 {
            tx.handle_control_pdu(&status, &mut ind);
            if !tx.read_pdu(100, None, &mut ind).is_empty() {
                retransmissions += 1;
            }
        }
        assert_eq!(retransmissions, 3);
        assert_eq!(ind.max_retx_events, 1);
        assert_eq!(ind.failed, vec![0]);
        assert!(tx.record(0).is_some_and(|r| r.failed));
        assert_eq!(tx.metrics().num_lost_pdus, 1);
    }

    #[test]
    fn test_resegmentation() {
        debug::setup_logging_verbose();
        let (mut tx, _timers, _rx) = setup(RlcAmConfig::default());
        tx.write_sdu(1, (0..20).collect()).unwrap();
        tx.write_sdu(2, (100..140).collect()).unwrap();
        let mut ind = Indications::default();
        let orig = parse(&tx.read_pdu(100, None, &mut ind));
        assert_eq!(orig.header.li, vec![20]);
        assert_eq!(orig.payload.len(), 60);

        tx.handle_control_pdu(&StatusPdu { ack_sn: 1, nacks: vec![NackEntry::whole(0)] }, &mut ind);

        // 4 header bytes + 2 for one LI leave room for 20 + 4 bytes
        let seg1 = parse(&tx.read_pdu(30, None, &mut ind));
        assert!(seg1.header.rf);
        assert_eq!(seg1.header.so, 0);
        assert!(!seg1.header.lsf);
        assert_eq!(seg1.header.li, vec![20]);
        assert_eq!(seg1.header.fi, FramingInfo::StartAligned);
        assert_eq!(seg1.payload.len(), 24);

        let seg2 = parse(&tx.read_pdu(30, None, &mut ind));
        assert_eq!(seg2.header.so, 24);
        assert!(seg2.header.li.is_empty());
        assert_eq!(seg2.header.fi, FramingInfo::NotAligned);
        assert_eq!(seg2.payload.len(), 26);

        let seg3 = parse(&tx.read_pdu(30, None, &mut ind));
        assert_eq!(seg3.header.so, 50);
        assert!(seg3.header.lsf);
        assert_eq!(seg3.header.fi, FramingInfo::EndAligned);
        assert_eq!(seg3.payload, (130..140).collect::<Vec<u8>>());
        assert_eq!(tx.retx_queue_len(), 0);
    }

    #[test]
    fn test_partial_nack_range() {
        debug::setup_logging_verbose();
        let (mut tx, _timers, _rx) = setup(RlcAmConfig::default());
        send_pdus(&mut tx, 1);
        let mut ind = Indications::default();
        let status = StatusPdu { ack_sn: 1, nacks: vec![NackEntry::segment(0, 2, 3), NackEntry::segment(0, 6, 0x7FFF)] };
        tx.handle_control_pdu(&status, &mut ind);

        let seg = parse(&tx.read_pdu(100, None, &mut ind));
        assert!(seg.header.rf && seg.header.lsf);
        assert_eq!(seg.header.so, 2);
        assert_eq!(seg.payload.len(), 8);
    }

    #[test]
    fn test_sn_wraparound() {
        debug::setup_logging_verbose();
        let cfg = RlcAmConfig { window_size: 8, ..Default::default() };
        let (mut tx, _timers, _rx) = setup(cfg);
        let mut ind = Indications::default();
        for i in 0..1030u32 {
            tx.write_sdu(i, vec![1; 10]).unwrap();
            let pdu = parse(&tx.read_pdu(12, None, &mut ind));
            assert_eq!(pdu.header.sn as u32, i % 1024);
            let ack_sn = tx.vt_s();
            tx.handle_control_pdu(&StatusPdu::new(ack_sn), &mut ind);
            assert!(tx.window_consistent());
        }
        assert_eq!(tx.vt_a(), 6);
        assert_eq!(ind.delivered.len(), 1030);
    }

    #[test]
    fn test_poll_timer_expiry_retransmits() {
        debug::setup_logging_verbose();
        let (mut tx, timers, rx) = setup(RlcAmConfig::default());
        send_pdus(&mut tx, 2);
        timers.advance(45);
        let ev = rx.try_recv().unwrap();
        assert!(timers.accept(&ev));

        let mut ind = Indications::default();
        tx.on_poll_retx_expired(&mut ind);
        assert_eq!(tx.retx_queue_len(), 2);
        assert!(timers.is_running(TimerId::new(1, TimerKind::PollRetransmit)));

        // the next retransmission carries a poll
        let pdu = parse(&tx.read_pdu(100, None, &mut ind));
        assert_eq!(pdu.header.sn, 0);
        assert!(pdu.header.p);
    }

    #[test]
    fn test_status_out_of_window_is_dropped() {
        debug::setup_logging_verbose();
        let (mut tx, _timers, _rx) = setup(RlcAmConfig::default());
        send_pdus(&mut tx, 2);
        let mut ind = Indications::default();
        tx.handle_control_pdu(&StatusPdu::new(5), &mut ind);
        assert_eq!(tx.vt_a(), 0);
        assert!(ind.is_empty());
    }

    #[test]
    fn test_write_sdu_errors_and_reestablish() {
        debug::setup_logging_verbose();
        let cfg = RlcAmConfig { tx_queue_length: 1, max_sdu_size: 100, ..Default::default() };
        let (mut tx, _timers, _rx) = setup(cfg);
        assert_eq!(tx.write_sdu(1, vec![]), Err(RlcError::EmptySdu));
        assert_eq!(tx.write_sdu(1, vec![0; 101]), Err(RlcError::SduTooLarge { len: 101, max: 100 }));
        tx.write_sdu(1, vec![0; 50]).unwrap();
        assert_eq!(tx.write_sdu(2, vec![0; 50]), Err(RlcError::QueueFull));

        // half of SDU 1 goes out
        let mut ind = Indications::default();
        tx.read_pdu(27, None, &mut ind);
        tx.write_sdu(2, vec![0; 50]).unwrap();
        assert!(tx.discard_sdu(2));
        assert!(!tx.discard_sdu(1));
        tx.write_sdu(3, vec![0; 50]).unwrap();

        tx.stop(&mut ind);
        assert_eq!(ind.failed, vec![1, 3]);
        assert_eq!(tx.write_sdu(4, vec![1]), Err(RlcError::NotActive));
        assert!(tx.read_pdu(100, None, &mut ind).is_empty());

        tx.reestablish(&mut ind);
        assert!(tx.write_sdu(4, vec![1]).is_ok());
        assert_eq!(tx.vt_s(), 0);
        assert!(tx.window_consistent());
    }
}
