use std::collections::VecDeque;

/// One pending retransmission of (part of) a Tx PDU record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetxDescriptor {
    pub sn: u16,
    /// True once part of the range was already served as a segment, or when only a byte
    /// range of the PDU was NACKed
    pub is_segment: bool,
    pub so_start: usize,
    /// Exclusive
    pub so_end: usize,
}

impl RetxDescriptor {
    pub fn whole(sn: u16, pdu_len: usize) -> Self {
        RetxDescriptor { sn, is_segment: false, so_start: 0, so_end: pdu_len }
    }

    pub fn range(sn: u16, so_start: usize, so_end: usize, pdu_len: usize) -> Self {
        let is_segment = so_start != 0 || so_end != pdu_len;
        RetxDescriptor { sn, is_segment, so_start, so_end }
    }
}

/// Bounded FIFO of retransmissions. Holds at most one descriptor per SN.
pub struct RetxQueue {
    queue: VecDeque<RetxDescriptor>,
    capacity: usize,
}

impl RetxQueue {
    pub fn new(capacity: usize) -> Self {
        RetxQueue { queue: VecDeque::with_capacity(capacity), capacity }
    }

    /// Queues `desc` unless its SN is already queued or the queue is full.
    /// Returns whether it was queued.
    pub fn push(&mut self, desc: RetxDescriptor) -> bool {
        if self.has_sn(desc.sn) {
            return false;
        }
        if self.queue.len() >= self.capacity {
            tracing::warn!("retx queue full, dropping retx of sn {}", desc.sn);
            return false;
        }
        self.queue.push_back(desc);
        true
    }

    pub fn has_sn(&self, sn: u16) -> bool {
        self.queue.iter().any(|d| d.sn == sn)
    }

    pub fn front(&self) -> Option<&RetxDescriptor> {
        self.queue.front()
    }

    pub fn front_mut(&mut self) -> Option<&mut RetxDescriptor> {
        self.queue.front_mut()
    }

    pub fn pop_front(&mut self) -> Option<RetxDescriptor> {
        self.queue.pop_front()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
