/// Clause 6.2.2.6 FI field
/// Bits: 2
/// First bit set: the first payload byte does not start an SDU.
/// Second bit set: the last payload byte does not end an SDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FramingInfo {
    /// Starts and ends on SDU boundaries
    Aligned = 0,
    /// Starts on an SDU boundary, ends inside an SDU
    StartAligned = 1,
    /// Starts inside an SDU, ends on an SDU boundary
    EndAligned = 2,
    /// Starts and ends inside SDUs
    NotAligned = 3,
}

impl std::convert::TryFrom<u64> for FramingInfo {
    type Error = ();
    fn try_from(x: u64) -> Result<Self, Self::Error> {
        match x {
            0 => Ok(FramingInfo::Aligned),
            1 => Ok(FramingInfo::StartAligned),
            2 => Ok(FramingInfo::EndAligned),
            3 => Ok(FramingInfo::NotAligned),
            _ => Err(()),
        }
    }
}

impl FramingInfo {
    pub fn from_alignment(start_aligned: bool, end_aligned: bool) -> Self {
        match (start_aligned, end_aligned) {
            (true, true) => FramingInfo::Aligned,
            (true, false) => FramingInfo::StartAligned,
            (false, true) => FramingInfo::EndAligned,
            (false, false) => FramingInfo::NotAligned,
        }
    }

    /// First payload byte is the first byte of an SDU
    pub fn is_start_aligned(self) -> bool {
        matches!(self, FramingInfo::Aligned | FramingInfo::StartAligned)
    }

    /// Last payload byte is the last byte of an SDU
    pub fn is_end_aligned(self) -> bool {
        matches!(self, FramingInfo::Aligned | FramingInfo::EndAligned)
    }

    /// Convert this enum back into the raw integer value
    pub fn into_raw(self) -> u64 {
        self as u64
    }
}

impl From<FramingInfo> for u64 {
    fn from(e: FramingInfo) -> Self {
        e.into_raw()
    }
}

impl core::fmt::Display for FramingInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FramingInfo::Aligned => write!(f, "[..]"),
            FramingInfo::StartAligned => write!(f, "[.."),
            FramingInfo::EndAligned => write!(f, "..]"),
            FramingInfo::NotAligned => write!(f, ".."),
        }
    }
}
