/// Clause 6.2.2.2 D/C field
/// Bits: 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DcField {
    ControlPdu = 0,
    DataPdu = 1,
}

impl std::convert::TryFrom<u64> for DcField {
    type Error = ();
    fn try_from(x: u64) -> Result<Self, Self::Error> {
        match x {
            0 => Ok(DcField::ControlPdu),
            1 => Ok(DcField::DataPdu),
            _ => Err(()),
        }
    }
}

impl DcField {
    /// Convert this enum back into the raw integer value
    pub fn into_raw(self) -> u64 {
        self as u64
    }
}

impl From<DcField> for u64 {
    fn from(e: DcField) -> Self {
        e.into_raw()
    }
}

impl core::fmt::Display for DcField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DcField::ControlPdu => write!(f, "ControlPdu"),
            DcField::DataPdu => write!(f, "DataPdu"),
        }
    }
}
