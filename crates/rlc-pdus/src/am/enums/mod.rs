pub mod dc_field;
pub mod framing_info;
