use rlc_core::LiWidth;
use rlc_core::pdu_parse_error::PduParseErr;
use rlc_pdus::am::pdus::amd_pdu_header::SO_END_OF_PDU;
use rlc_pdus::{AmdPdu, StatusPdu, is_control_pdu};

/// Turns "0a 1B:ff" style input into bytes
pub fn parse_hex(input: &str) -> Result<Vec<u8>, String> {
    let digits: Vec<char> = input.chars().filter(|c| !c.is_whitespace() && *c != ':').collect();
    let digits = match digits.as_slice() {
        ['0', 'x' | 'X', rest @ ..] => rest,
        all => all,
    };
    if digits.is_empty() {
        return Err("empty input".to_string());
    }
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits ({})", digits.len()));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let s: String = pair.iter().collect();
            u8::from_str_radix(&s, 16).map_err(|_| format!("invalid hex byte '{}'", s))
        })
        .collect()
}

/// Prints a human readable breakdown of one PDU
pub struct PduDecoder {
    li_width: LiWidth,
}

impl PduDecoder {
    pub fn new(li_width: LiWidth) -> Self {
        Self { li_width }
    }

    pub fn decode(&self, pdu: &[u8]) -> Result<(), PduParseErr> {
        println!("=== RLC AM PDU ===");
        println!("Input: {} bytes", pdu.len());
        if is_control_pdu(pdu) {
            tracing::debug!("d/c bit clear, decoding as status pdu");
            self.decode_status(pdu)
        } else {
            self.decode_data(pdu)
        }
    }

    fn decode_status(&self, pdu: &[u8]) -> Result<(), PduParseErr> {
        let status = StatusPdu::from_bytes(pdu)?;
        println!("STATUS PDU");
        println!("  ack_sn: {}", status.ack_sn);
        if status.nacks.is_empty() {
            println!("  no nacks");
        }
        for nack in status.nacks.iter() {
            match nack.so {
                Some((start, SO_END_OF_PDU)) => println!("  nack sn {} bytes {}..end", nack.nack_sn, start),
                Some((start, end)) => println!("  nack sn {} bytes {}..={}", nack.nack_sn, start, end),
                None => println!("  nack sn {}", nack.nack_sn),
            }
        }
        if !status.is_valid() {
            println!("[!] ack_sn is also nacked, a receiver would drop this status");
        }
        println!("Packed length: {} bytes", status.packed_len());
        Ok(())
    }

    fn decode_data(&self, pdu: &[u8]) -> Result<(), PduParseErr> {
        let amd = AmdPdu::from_bytes(pdu, self.li_width)?;
        let h = &amd.header;
        if h.rf {
            println!("AMD PDU SEGMENT (li width {})", self.li_width);
            println!("  so: {}, last segment: {}", h.so, h.lsf);
        } else {
            println!("AMD PDU (li width {})", self.li_width);
        }
        println!("  sn: {}, poll: {}, fi: {}", h.sn, h.p, h.fi);

        // Every LI delimits one fragment, the remainder is the last one
        let mut offset = 0;
        let count = h.li.len() + 1;
        for i in 0..count {
            let len = match h.li.get(i) {
                Some(li) => *li as usize,
                None => amd.payload.len() - offset,
            };
            let starts_sdu = i > 0 || h.fi.is_start_aligned();
            let ends_sdu = i + 1 < count || h.fi.is_end_aligned();
            let kind = match (starts_sdu, ends_sdu) {
                (true, true) => "complete sdu",
                (true, false) => "sdu head",
                (false, true) => "sdu tail",
                (false, false) => "sdu middle",
            };
            println!("  [{}] {} bytes, {}", i, len, kind);
            offset += len;
        }
        Ok(())
    }
}
