use rlc_core::LiWidth;
use rlc_core::sn::MAX_WINDOW_SIZE;

/// Parameters of one Acknowledged Mode bearer, as supplied by the control plane
#[derive(Debug, Clone, PartialEq)]
pub struct RlcAmConfig {
    /// Transmit and receive window size, in SNs. At most 512.
    pub window_size: u16,
    pub li_width: LiWidth,

    /// t-PollRetransmit in ms
    pub t_poll_retx: u32,
    /// Poll after this many PDUs without poll. Zero or negative disables.
    pub poll_pdu: i32,
    /// Poll after this many payload bytes without poll. Zero or negative disables.
    pub poll_byte: i32,
    /// Maximum number of retransmissions of one SN
    pub max_retx_thresh: u32,

    /// t-Reordering in ms
    pub t_reordering: u32,
    /// t-StatusProhibit in ms. Zero means status reports are never held back.
    pub t_status_prohibit: u32,

    /// Number of SDUs the transmit queue holds before rejecting writes
    pub tx_queue_length: usize,
    /// Largest SDU accepted by write_sdu
    pub max_sdu_size: usize,
}

impl Default for RlcAmConfig {
    fn default() -> Self {
        Self {
            window_size: MAX_WINDOW_SIZE,
            li_width: LiWidth::Normal,
            t_poll_retx: 45,
            poll_pdu: 4,
            poll_byte: 25000,
            max_retx_thresh: 4,
            t_reordering: 35,
            t_status_prohibit: 0,
            tx_queue_length: 256,
            max_sdu_size: 8188,
        }
    }
}

impl RlcAmConfig {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.window_size == 0 || self.window_size > MAX_WINDOW_SIZE {
            return Err("rlc_am.window_size must be in 1..=512");
        }
        if self.t_poll_retx == 0 {
            return Err("rlc_am.t_poll_retx must be non-zero");
        }
        if self.max_retx_thresh == 0 {
            return Err("rlc_am.max_retx_thresh must be non-zero");
        }
        if self.tx_queue_length == 0 {
            return Err("rlc_am.tx_queue_length must be non-zero");
        }
        if self.max_sdu_size == 0 {
            return Err("rlc_am.max_sdu_size must be non-zero");
        }
        Ok(())
    }

    /// True when neither poll threshold is active
    pub fn poll_thresholds_disabled(&self) -> bool {
        self.poll_pdu <= 0 && self.poll_byte <= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let cfg = RlcAmConfig::default();
        assert_eq!(cfg.validate(), Ok(()));
        assert_eq!(cfg.window_size, 512);
        assert!(!cfg.poll_thresholds_disabled());
    }

    #[test]
    fn test_window_bounds() {
        let mut cfg = RlcAmConfig { window_size: 0, ..Default::default() };
        assert!(cfg.validate().is_err());
        cfg.window_size = 513;
        assert!(cfg.validate().is_err());
        cfg.window_size = 1;
        assert!(cfg.validate().is_ok());
    }
}
