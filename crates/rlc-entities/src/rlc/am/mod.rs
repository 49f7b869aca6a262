//! RLC Acknowledged Mode engine, 3GPP TS 36.322 clause 5.1.3

pub mod am_bearer;
pub mod am_rx;
pub mod am_tx;
pub mod error;
pub mod interfaces;
pub mod metrics;
pub mod pdu_tracker;
pub mod poll_policy;
pub mod retx_queue;
pub mod ring_window;
pub mod sdu_queue;

pub use am_bearer::{AmBearer, BufferState};
pub use error::RlcError;
pub use interfaces::{ControlPlane, Indications, UpperLayer};
pub use metrics::RlcBearerMetrics;
pub use poll_policy::{PollContext, PollPolicy, ThresholdPollPolicy};

/// Smallest data PDU: two header bytes plus one payload byte
pub const MIN_DATA_PDU_SIZE: usize = 3;

/// Upper bound on SDU fragments concatenated into one PDU
pub const MAX_SDUS_PER_PDU: usize = 128;

/// With both poll thresholds disabled, poll every this many SNs
pub const POLL_PERIODICITY: u16 = 8;

/// Largest payload one PDU may carry, bounded by the 15-bit SO of its future segments
pub const MAX_PDU_PAYLOAD: usize = 0x7FFF;
