use core::fmt;

use serde::Deserialize;

/// SAPs between the entities surrounding an RLC bearer
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Sap {
    /// PDCP/RLC user data
    RlcSap,
    /// RLC/MAC, transmission opportunities and PDUs
    MacSap,
    /// RLC/RRC link management
    RrcSap,
}

/// Side of the radio link an entity lives on
#[derive(PartialEq, Eq, Hash, Clone, Debug, Copy)]
pub enum Node {
    Ue,
    Enb,
}

impl Node {
    pub fn peer(self) -> Node {
        match self {
            Node::Ue => Node::Enb,
            Node::Enb => Node::Ue,
        }
    }
}

/// Entities known to the message router
#[derive(PartialEq, Eq, Hash, Clone, Debug, Copy)]
pub enum RlcEntity {
    /// Packet Data Convergence Protocol, source and sink of SDUs
    Pdcp(Node),
    /// The RLC AM bearer
    Rlc(Node),
    /// Radio Resource Control, receives link failure indications
    Rrc(Node),
    /// Shared radio channel between both nodes
    Air,
}

impl fmt::Display for RlcEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RlcEntity::Pdcp(n) => write!(f, "Pdcp{:?}", n),
            RlcEntity::Rlc(n) => write!(f, "Rlc{:?}", n),
            RlcEntity::Rrc(n) => write!(f, "Rrc{:?}", n),
            RlcEntity::Air => write!(f, "Air"),
        }
    }
}

/// Width of the Length Indicator field in AMD PDU headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiWidth {
    /// 11-bit LI, SDU fragments up to 2047 bytes
    #[default]
    Normal,
    /// 15-bit LI, SDU fragments up to 32767 bytes
    Extended,
}

impl LiWidth {
    pub fn bits(self) -> usize {
        match self {
            LiWidth::Normal => 11,
            LiWidth::Extended => 15,
        }
    }

    /// Largest value a single LI can carry
    pub fn max_li(self) -> u16 {
        ((1u32 << self.bits()) - 1) as u16
    }
}

impl fmt::Display for LiWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiWidth::Normal => write!(f, "normal"),
            LiWidth::Extended => write!(f, "extended"),
        }
    }
}
