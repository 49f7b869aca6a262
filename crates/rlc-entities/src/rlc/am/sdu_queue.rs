use std::collections::VecDeque;

use rlc_core::SduId;

pub struct TxSdu {
    pub id: SduId,
    pub data: Vec<u8>,
}

/// Bounded FIFO of SDUs waiting for their first transmission
pub struct SduQueue {
    queue: VecDeque<TxSdu>,
    bytes: usize,
    capacity: usize,
}

impl SduQueue {
    pub fn new(capacity: usize) -> Self {
        SduQueue { queue: VecDeque::new(), bytes: 0, capacity }
    }

    /// Returns the SDU back when the queue is full
    pub fn push(&mut self, sdu: TxSdu) -> Result<(), TxSdu> {
        if self.queue.len() >= self.capacity {
            return Err(sdu);
        }
        self.bytes += sdu.data.len();
        self.queue.push_back(sdu);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<TxSdu> {
        let sdu = self.queue.pop_front()?;
        self.bytes -= sdu.data.len();
        Some(sdu)
    }

    /// Removes a queued SDU by id
    pub fn discard(&mut self, id: SduId) -> bool {
        let Some(pos) = self.queue.iter().position(|s| s.id == id) else {
            return false;
        };
        if let Some(sdu) = self.queue.remove(pos) {
            self.bytes -= sdu.data.len();
        }
        true
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Total payload bytes queued
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Empties the queue, returning the ids of the dropped SDUs
    pub fn clear(&mut self) -> Vec<SduId> {
        self.bytes = 0;
        self.queue.drain(..).map(|s| s.id).collect()
    }
}
