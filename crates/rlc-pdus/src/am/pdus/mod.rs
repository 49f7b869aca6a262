pub mod amd_pdu;
pub mod amd_pdu_header;
pub mod status_pdu;
