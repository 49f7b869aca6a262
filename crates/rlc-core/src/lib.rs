//! Core utilities for the RLC AM stack
//!
//! This crate provides fundamental types and utilities used across the workspace:
//! - BitBuffer for bit-level PDU manipulation
//! - Sequence number arithmetic (10-bit, modulo 1024)
//! - The timer facility used by bearers
//! - Common enums, macros and debug utilities

pub mod bitbuffer;
pub mod debug;
pub mod pdu_parse_error;
pub mod rlc_common;
pub mod sn;
pub mod timer;

// Re-export commonly used items
pub use bitbuffer::BitBuffer;
pub use pdu_parse_error::PduParseErr;
pub use rlc_common::*;
pub use timer::{ManualTimers, ThreadTimers, TimerEvent, TimerFacility, TimerId, TimerKind};

/// Logical channel identifier. Opaque to the AM engine, used in notifications and logs.
pub type Lcid = u32;

/// Identifier assigned by the upper layer to each SDU handed to a bearer
pub type SduId = u32;

/// Simulation time, in 1 ms ticks
pub type TickTime = u64;
