use core::fmt;

/// Errors returned by the bearer API. Protocol-level problems never surface here; they are
/// handled internally or reported through the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlcError {
    /// The SDU queue holds `tx_queue_length` SDUs. Backpressure, retry later.
    QueueFull,
    EmptySdu,
    /// The bearer was stopped and not yet reestablished
    NotActive,
    SduTooLarge { len: usize, max: usize },
    InvalidConfig(&'static str),
}

impl fmt::Display for RlcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RlcError::QueueFull => write!(f, "SDU queue full"),
            RlcError::EmptySdu => write!(f, "empty SDU"),
            RlcError::NotActive => write!(f, "bearer not active"),
            RlcError::SduTooLarge { len, max } => write!(f, "SDU of {} bytes exceeds maximum of {}", len, max),
            RlcError::InvalidConfig(reason) => write!(f, "invalid configuration: {}", reason),
        }
    }
}

impl std::error::Error for RlcError {}
