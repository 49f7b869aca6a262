use core::fmt;

use rlc_core::BitBuffer;
use rlc_core::pdu_parse_error::*;
use rlc_core::{expect_pdu_type, expect_value, let_field};

use crate::am::enums::dc_field::DcField;

/// Bits of the fixed part: D/C, CPT, ACK_SN, E1
const STATUS_FIXED_BITS: usize = 1 + 3 + 10 + 1;
/// NACK_SN, E1, E2
const NACK_BITS: usize = 10 + 1 + 1;
/// SOstart, SOend
const NACK_SO_BITS: usize = 15 + 15;

/// One negative acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NackEntry {
    pub nack_sn: u16,
    /// Missing byte range `(so_start, so_end)`, both inclusive. `so_end == 0x7FFF` means up to the
    /// end of the PDU. None means the whole PDU is missing.
    pub so: Option<(u16, u16)>,
}

impl NackEntry {
    pub fn whole(nack_sn: u16) -> Self {
        NackEntry { nack_sn, so: None }
    }

    pub fn segment(nack_sn: u16, so_start: u16, so_end: u16) -> Self {
        NackEntry { nack_sn, so: Some((so_start, so_end)) }
    }

    fn packed_bits(&self) -> usize {
        NACK_BITS + if self.so.is_some() { NACK_SO_BITS } else { 0 }
    }
}

/// Clause 6.2.1.6 STATUS PDU
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusPdu {
    // 10, first SN not reported as received (and not NACKed)
    pub ack_sn: u16,
    pub nacks: Vec<NackEntry>,
}

impl StatusPdu {
    pub fn new(ack_sn: u16) -> Self {
        StatusPdu { ack_sn, nacks: Vec::new() }
    }

    pub fn from_bitbuf(buf: &mut BitBuffer) -> Result<Self, PduParseErr> {
        let_field!(buf, dc, 1);
        expect_pdu_type!(dc, DcField::ControlPdu)?;
        // Only STATUS PDU is defined
        let_field!(buf, cpt, 3);
        expect_value!(cpt, 0u64)?;
        let_field!(buf, ack_sn, 10);
        let_field!(buf, e1, 1);

        let mut nacks = Vec::new();
        let mut more = e1 == 1;
        while more {
            let_field!(buf, nack_sn, 10);
            let_field!(buf, e1, 1);
            let_field!(buf, e2, 1);
            let so = if e2 == 1 {
                let_field!(buf, so_start, 15);
                let_field!(buf, so_end, 15);
                Some((so_start as u16, so_end as u16))
            } else {
                None
            };
            nacks.push(NackEntry { nack_sn: nack_sn as u16, so });
            more = e1 == 1;
        }
        buf.skip_to_byte_boundary();

        Ok(StatusPdu { ack_sn: ack_sn as u16, nacks })
    }

    pub fn to_bitbuf(&self, buf: &mut BitBuffer) {
        buf.write_bits(DcField::ControlPdu.into_raw(), 1);
        buf.write_bits(0, 3);
        buf.write_bits(self.ack_sn as u64, 10);
        buf.write_bits(!self.nacks.is_empty() as u64, 1);
        for (i, nack) in self.nacks.iter().enumerate() {
            buf.write_bits(nack.nack_sn as u64, 10);
            buf.write_bits((i + 1 < self.nacks.len()) as u64, 1);
            buf.write_bits(nack.so.is_some() as u64, 1);
            if let Some((so_start, so_end)) = nack.so {
                buf.write_bits(so_start as u64, 15);
                buf.write_bits(so_end as u64, 15);
            }
        }
        buf.pad_to_byte_boundary();
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, PduParseErr> {
        Self::from_bitbuf(&mut BitBuffer::from_bytes(data))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BitBuffer::new_autoexpand(self.packed_len() * 8);
        self.to_bitbuf(&mut buf);
        buf.into_bytes()
    }

    /// Packed size in bytes, padding included
    pub fn packed_len(&self) -> usize {
        let bits: usize = STATUS_FIXED_BITS + self.nacks.iter().map(|n| n.packed_bits()).sum::<usize>();
        bits.div_ceil(8)
    }

    /// A status may not NACK its own ACK_SN
    pub fn is_valid(&self) -> bool {
        self.nacks.iter().all(|n| n.nack_sn != self.ack_sn)
    }

    pub fn is_nacked(&self, sn: u16) -> bool {
        self.nacks.iter().any(|n| n.nack_sn == sn)
    }
}

impl fmt::Display for NackEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.so {
            Some((start, end)) if end == 0x7FFF => write!(f, "{}[{}:]", self.nack_sn, start),
            Some((start, end)) => write!(f, "{}[{}:{}]", self.nack_sn, start, end),
            None => write!(f, "{}", self.nack_sn),
        }
    }
}

impl fmt::Display for StatusPdu {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "status {{ ack_sn: {}", self.ack_sn)?;
        if !self.nacks.is_empty() {
            write!(f, ", nacks: [")?;
            for (i, n) in self.nacks.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", n)?;
            }
            write!(f, "]")?;
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlc_core::debug;

    #[test]
    fn test_ack_only() {
        debug::setup_logging_verbose();
        let st = StatusPdu::new(1023);
        let bytes = st.to_bytes();
        // D/C=0 CPT=000 ACK_SN=1111111111 E1=0 + 1 padding bit
        assert_eq!(bytes, vec![0x0F, 0xFE]);
        assert_eq!(st.packed_len(), 2);
        assert_eq!(StatusPdu::from_bytes(&bytes).unwrap(), st);
    }

    #[test]
    fn test_mixed_nacks() {
        debug::setup_logging_verbose();
        let st = StatusPdu {
            ack_sn: 0,
            nacks: vec![
                NackEntry::whole(1020),
                NackEntry::segment(1021, 0, 99),
                NackEntry::segment(1023, 250, 0x7FFF),
            ],
        };
        // ceil((15 + 12 + 42 + 42) / 8)
        assert_eq!(st.packed_len(), 14);
        let bytes = st.to_bytes();
        assert_eq!(bytes.len(), 14);
        let parsed = StatusPdu::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, st);
        assert!(parsed.is_valid());
        assert!(parsed.is_nacked(1021));
        assert!(!parsed.is_nacked(1022));
    }

    #[test]
    fn test_maximal_nack_list() {
        debug::setup_logging_verbose();
        // Every SN of a 512 window except the ACK_SN itself
        let st = StatusPdu { ack_sn: 511, nacks: (0..511).map(NackEntry::whole).collect() };
        assert_eq!(st.packed_len(), (15 + 511 * 12usize).div_ceil(8));
        assert_eq!(StatusPdu::from_bytes(&st.to_bytes()).unwrap(), st);
    }

    #[test]
    fn test_validity() {
        let st = StatusPdu { ack_sn: 5, nacks: vec![NackEntry::whole(5)] };
        assert!(!st.is_valid());
    }

    #[test]
    fn test_reserved_cpt_is_rejected() {
        debug::setup_logging_verbose();
        // CPT = 001
        assert_eq!(
            StatusPdu::from_bytes(&[0x10, 0x00]),
            Err(PduParseErr::InvalidValue { field: "cpt", value: 1 })
        );
        // data PDU
        assert!(matches!(StatusPdu::from_bytes(&[0x80, 0x00]), Err(PduParseErr::InvalidPduType { .. })));
        // E1 set but the NACK is missing
        assert!(matches!(StatusPdu::from_bytes(&[0x00, 0x03]), Err(PduParseErr::BufferEnded { .. })));
    }
}
