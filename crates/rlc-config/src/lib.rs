//! RLC stack configuration management
//!
//! This crate provides configuration loading and parsing:
//! - TOML configuration file parsing
//! - Stack configuration structures
//! - Per-bearer AM parameters and simulation settings

pub mod stack_config;
pub mod stack_config_am;
pub mod stack_config_sim;
pub mod toml_config;

pub use stack_config::*;
pub use stack_config_am::*;
pub use stack_config_sim::*;
pub use toml_config::*;
