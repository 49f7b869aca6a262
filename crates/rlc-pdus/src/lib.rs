//! Bit-exact codecs for RLC Acknowledged Mode PDUs (3GPP TS 36.322 clause 6.2)

pub mod am;

pub use am::enums::dc_field::DcField;
pub use am::enums::framing_info::FramingInfo;
pub use am::pdus::amd_pdu::{AmdPdu, is_control_pdu};
pub use am::pdus::amd_pdu_header::AmdPduHeader;
pub use am::pdus::status_pdu::{NackEntry, StatusPdu};
