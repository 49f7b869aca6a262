use core::fmt;

use rlc_core::pdu_parse_error::PduParseErr;
use rlc_core::{BitBuffer, LiWidth};

use crate::am::enums::dc_field::DcField;
use crate::am::pdus::amd_pdu_header::AmdPduHeader;

/// Tests the D/C bit of a raw RLC AM PDU. Empty input is not a control PDU.
pub fn is_control_pdu(data: &[u8]) -> bool {
    match data.first() {
        Some(b) => (b >> 7) as u64 == DcField::ControlPdu.into_raw(),
        None => false,
    }
}

/// A complete AMD PDU or PDU segment: header plus payload bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmdPdu {
    pub header: AmdPduHeader,
    pub payload: Vec<u8>,
}

impl AmdPdu {
    /// Parses and sanity checks a data PDU. The payload must hold at least one byte after
    /// the fragments described by the length indicators.
    pub fn from_bytes(data: &[u8], li_width: LiWidth) -> Result<Self, PduParseErr> {
        let mut buf = BitBuffer::from_bytes(data);
        let header = AmdPduHeader::from_bitbuf(&mut buf, li_width)?;
        let payload = buf.remaining_bytes().to_vec();

        if payload.is_empty() {
            return Err(PduParseErr::InconsistentLength { expected: 1, found: 0 });
        }
        let li_total = header.li_total();
        if li_total >= payload.len() {
            return Err(PduParseErr::Inconsistency {
                field: "li",
                reason: "length indicators do not fit the payload",
            });
        }
        Ok(AmdPdu { header, payload })
    }

    pub fn to_bytes(&self, li_width: LiWidth) -> Vec<u8> {
        let mut buf = BitBuffer::new_autoexpand((self.header.packed_len(li_width) + self.payload.len()) * 8);
        self.header.to_bitbuf(&mut buf, li_width);
        buf.write_bytes(&self.payload);
        buf.into_bytes()
    }

    pub fn packed_len(&self, li_width: LiWidth) -> usize {
        self.header.packed_len(li_width) + self.payload.len()
    }
}

impl fmt::Display for AmdPdu {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({} B payload)", self.header, self.payload.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::am::enums::framing_info::FramingInfo;
    use rlc_core::debug;

    #[test]
    fn test_pdu_bytes_roundtrip() {
        debug::setup_logging_verbose();
        let pdu = AmdPdu {
            header: AmdPduHeader { li: vec![3], ..AmdPduHeader::new(42, FramingInfo::StartAligned) },
            payload: vec![1, 2, 3, 4, 5],
        };
        let bytes = pdu.to_bytes(LiWidth::Normal);
        assert_eq!(bytes.len(), pdu.packed_len(LiWidth::Normal));
        assert!(!is_control_pdu(&bytes));
        assert_eq!(AmdPdu::from_bytes(&bytes, LiWidth::Normal).unwrap(), pdu);
    }

    #[test]
    fn test_li_overrun_is_malformed() {
        debug::setup_logging_verbose();
        let pdu = AmdPdu {
            header: AmdPduHeader { li: vec![5], ..AmdPduHeader::new(1, FramingInfo::Aligned) },
            payload: vec![0; 5],
        };
        let bytes = pdu.to_bytes(LiWidth::Normal);
        assert!(matches!(
            AmdPdu::from_bytes(&bytes, LiWidth::Normal),
            Err(PduParseErr::Inconsistency { field: "li", .. })
        ));

        // header only
        let bytes = AmdPdu { header: AmdPduHeader::new(1, FramingInfo::Aligned), payload: vec![] }.to_bytes(LiWidth::Normal);
        assert!(AmdPdu::from_bytes(&bytes, LiWidth::Normal).is_err());
    }

    #[test]
    fn test_is_control_pdu() {
        assert!(is_control_pdu(&[0x00, 0x04]));
        assert!(!is_control_pdu(&[0x80]));
        assert!(!is_control_pdu(&[]));
    }
}
