use core::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RlcBearerMetrics {
    pub num_tx_sdus: u64,
    pub num_rx_sdus: u64,
    pub num_lost_sdus: u64,
    pub num_tx_pdus: u64,
    pub num_rx_pdus: u64,
    pub num_lost_pdus: u64,
    pub num_tx_pdu_bytes: u64,
    pub num_rx_pdu_bytes: u64,
    pub num_tx_status_pdus: u64,
    pub num_retx_pdus: u64,
    pub rx_buffered_bytes: u64,
}

impl RlcBearerMetrics {
    /// Field-wise sum, used to combine the transmitter's and receiver's halves
    pub fn merge(&self, other: &RlcBearerMetrics) -> RlcBearerMetrics {
        RlcBearerMetrics {
            num_tx_sdus: self.num_tx_sdus + other.num_tx_sdus,
            num_rx_sdus: self.num_rx_sdus + other.num_rx_sdus,
            num_lost_sdus: self.num_lost_sdus + other.num_lost_sdus,
            num_tx_pdus: self.num_tx_pdus + other.num_tx_pdus,
            num_rx_pdus: self.num_rx_pdus + other.num_rx_pdus,
            num_lost_pdus: self.num_lost_pdus + other.num_lost_pdus,
            num_tx_pdu_bytes: self.num_tx_pdu_bytes + other.num_tx_pdu_bytes,
            num_rx_pdu_bytes: self.num_rx_pdu_bytes + other.num_rx_pdu_bytes,
            num_tx_status_pdus: self.num_tx_status_pdus + other.num_tx_status_pdus,
            num_retx_pdus: self.num_retx_pdus + other.num_retx_pdus,
            rx_buffered_bytes: self.rx_buffered_bytes + other.rx_buffered_bytes,
        }
    }
}

impl fmt::Display for RlcBearerMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  sdus   tx {:>8}  rx {:>8}  lost {:>6}", self.num_tx_sdus, self.num_rx_sdus, self.num_lost_sdus)?;
        writeln!(f, "  pdus   tx {:>8}  rx {:>8}  lost {:>6}", self.num_tx_pdus, self.num_rx_pdus, self.num_lost_pdus)?;
        writeln!(f, "  bytes  tx {:>8}  rx {:>8}", self.num_tx_pdu_bytes, self.num_rx_pdu_bytes)?;
        writeln!(f, "  status tx {:>8}  retx {:>6}", self.num_tx_status_pdus, self.num_retx_pdus)?;
        write!(f, "  rx buffered {} bytes", self.rx_buffered_bytes)
    }
}
