pub mod am;
pub mod rlc_am_entity;
