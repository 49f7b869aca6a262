use rlc_config::RlcAmConfig;

use super::POLL_PERIODICITY;

/// Transmitter state the poll decision is based on, sampled after the PDU was built
#[derive(Debug, Clone, Copy)]
pub struct PollContext {
    /// VT(S) after the PDU was assigned its SN
    pub vt_s: u16,
    pub window_full: bool,
    /// SDU queue and retransmission queue both empty
    pub queues_empty: bool,
    /// Payload bytes of the PDU
    pub pdu_bytes: usize,
}

/// Decides which PDUs carry the poll bit
pub trait PollPolicy: Send {
    /// Called for every data PDU and retransmission. Returns whether it carries a poll;
    /// a true return resets the policy's counters.
    fn on_pdu(&mut self, ctx: &PollContext) -> bool;

    /// t-PollRetransmit expired: the next PDU must poll
    fn poll_timer_expired(&mut self);

    fn reset(&mut self);
}

/// PDU and byte counters with thresholds, TS 36.322 clause 5.2.2.1
pub struct ThresholdPollPolicy {
    poll_pdu: i32,
    poll_byte: i32,
    pdu_without_poll: u32,
    byte_without_poll: u64,
    timer_expired: bool,
}

impl ThresholdPollPolicy {
    pub fn new(cfg: &RlcAmConfig) -> Self {
        ThresholdPollPolicy {
            poll_pdu: cfg.poll_pdu,
            poll_byte: cfg.poll_byte,
            pdu_without_poll: 0,
            byte_without_poll: 0,
            timer_expired: false,
        }
    }

    fn thresholds_disabled(&self) -> bool {
        self.poll_pdu <= 0 && self.poll_byte <= 0
    }
}

impl PollPolicy for ThresholdPollPolicy {
    fn on_pdu(&mut self, ctx: &PollContext) -> bool {
        self.pdu_without_poll += 1;
        self.byte_without_poll += ctx.pdu_bytes as u64;

        let poll = (self.poll_pdu > 0 && self.pdu_without_poll > self.poll_pdu as u32)
            || (self.poll_byte > 0 && self.byte_without_poll > self.poll_byte as u64)
            || self.timer_expired
            || ctx.window_full
            || ctx.queues_empty
            || (self.thresholds_disabled() && ctx.vt_s % POLL_PERIODICITY == 0);

        if poll {
            self.reset();
        }
        poll
    }

    fn poll_timer_expired(&mut self) {
        self.timer_expired = true;
    }

    fn reset(&mut self) {
        self.pdu_without_poll = 0;
        self.byte_without_poll = 0;
        self.timer_expired = false;
    }
}
