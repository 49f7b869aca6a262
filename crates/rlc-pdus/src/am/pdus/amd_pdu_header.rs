use core::fmt;

use rlc_core::pdu_parse_error::*;
use rlc_core::{BitBuffer, LiWidth};
use rlc_core::{expect_pdu_type, let_field};

use crate::am::enums::dc_field::DcField;
use crate::am::enums::framing_info::FramingInfo;

/// Value of SO/SOend that means "up to the end of the PDU"
pub const SO_END_OF_PDU: u16 = 0x7FFF;

/// Clause 6.2.1.4 / 6.2.1.5 AMD PDU and AMD PDU segment header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmdPduHeader {
    // 1, resegmentation flag: this is a segment of an earlier PDU
    pub rf: bool,
    // 1, poll bit
    pub p: bool,
    // 2
    pub fi: FramingInfo,
    // 10
    pub sn: u16,
    // 1, only present if rf. Last segment flag
    pub lsf: bool,
    // 15, only present if rf. Byte offset of this segment in the original PDU
    pub so: u16,
    /// Length of every SDU fragment in the payload except the last
    pub li: Vec<u16>,
}

impl AmdPduHeader {
    /// Header of a fresh, unsegmented PDU
    pub fn new(sn: u16, fi: FramingInfo) -> Self {
        AmdPduHeader { rf: false, p: false, fi, sn, lsf: false, so: 0, li: Vec::new() }
    }

    pub fn from_bitbuf(buf: &mut BitBuffer, li_width: LiWidth) -> Result<Self, PduParseErr> {
        let_field!(buf, dc, 1);
        expect_pdu_type!(dc, DcField::DataPdu)?;
        let_field!(buf, rf, 1);
        let_field!(buf, p, 1);
        let_field!(buf, fi, 2);
        let_field!(buf, e, 1);
        let_field!(buf, sn, 10);

        let (lsf, so) = if rf == 1 {
            let_field!(buf, lsf, 1);
            let_field!(buf, so, 15);
            (lsf == 1, so as u16)
        } else {
            (false, 0)
        };

        let mut li = Vec::new();
        let mut more = e == 1;
        while more {
            let_field!(buf, e, 1);
            let_field!(buf, li_val, li_width.bits());
            if li_val == 0 {
                return Err(PduParseErr::InvalidValue { field: "li", value: 0 });
            }
            li.push(li_val as u16);
            more = e == 1;
        }
        if li_width == LiWidth::Normal && li.len() % 2 == 1 {
            let_field!(buf, _padding, 4);
        }

        Ok(AmdPduHeader {
            rf: rf == 1,
            p: p == 1,
            // 2-bit field, always maps
            fi: FramingInfo::try_from(fi).unwrap_or(FramingInfo::NotAligned),
            sn: sn as u16,
            lsf,
            so,
            li,
        })
    }

    pub fn to_bitbuf(&self, buf: &mut BitBuffer, li_width: LiWidth) {
        buf.write_bits(DcField::DataPdu.into_raw(), 1);
        buf.write_bits(self.rf as u64, 1);
        buf.write_bits(self.p as u64, 1);
        buf.write_bits(self.fi.into_raw(), 2);
        buf.write_bits(!self.li.is_empty() as u64, 1);
        buf.write_bits(self.sn as u64, 10);
        if self.rf {
            buf.write_bits(self.lsf as u64, 1);
            buf.write_bits(self.so as u64, 15);
        }
        for (i, li) in self.li.iter().enumerate() {
            let e = i + 1 < self.li.len();
            buf.write_bits(e as u64, 1);
            buf.write_bits(*li as u64, li_width.bits());
        }
        if li_width == LiWidth::Normal && self.li.len() % 2 == 1 {
            buf.write_zeroes(4);
        }
    }

    /// Packed size in bytes of a header with the given shape
    pub fn packed_len_for(rf: bool, num_li: usize, li_width: LiWidth) -> usize {
        let fixed = if rf { 4 } else { 2 };
        fixed + (num_li * (1 + li_width.bits())).div_ceil(8)
    }

    pub fn packed_len(&self, li_width: LiWidth) -> usize {
        Self::packed_len_for(self.rf, self.li.len(), li_width)
    }

    /// Sum of all length indicators
    pub fn li_total(&self) -> usize {
        self.li.iter().map(|l| *l as usize).sum()
    }
}

impl fmt::Display for AmdPduHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "amd {{ sn: {}, p: {}, fi: {}", self.sn, self.p as u8, self.fi)?;
        if self.rf {
            write!(f, ", so: {}, lsf: {}", self.so, self.lsf as u8)?;
        }
        if !self.li.is_empty() {
            write!(f, ", li: {:?}", self.li)?;
        }
        write!(f, " }}")
    }
}
