//! Simulated peers of an RLC AM bearer, used by `rlc-am-sim` and the integration tests

pub mod air_channel;
pub mod pdcp_traffic;
pub mod rrc_stub;

pub use air_channel::{AirChannel, ChannelStats};
pub use pdcp_traffic::{PdcpTraffic, TrafficStats};
pub use rrc_stub::RrcStub;

use rlc_core::Lcid;

/// Logical channel of the single simulated bearer
pub const SIM_LCID: Lcid = 1;
