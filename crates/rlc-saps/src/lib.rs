//! Service access point primitives exchanged between the RLC entity and its neighbours

/// PDCP <-> RLC
pub mod rlc;
/// RLC <-> MAC
pub mod mac;
/// RLC <-> RRC
pub mod rrc;
pub mod sapmsg;

pub use sapmsg::*;
