use std::sync::{Arc, RwLock};

use crate::stack_config_am::RlcAmConfig;
use crate::stack_config_sim::CfgSim;

#[derive(Debug, Clone, Default)]
pub struct StackConfig {
    pub debug_log: Option<String>,

    /// Parameters applied to every AM bearer
    pub rlc_am: RlcAmConfig,

    pub sim: CfgSim,
}

impl StackConfig {
    pub fn new(rlc_am: RlcAmConfig) -> Self {
        StackConfig { debug_log: None, rlc_am, sim: CfgSim::default() }
    }

    /// Validate that all configuration fields hold usable values.
    pub fn validate(&self) -> Result<(), &str> {
        self.rlc_am.validate()?;
        self.sim.validate()?;
        if self.sim.sdu_size > self.rlc_am.max_sdu_size {
            return Err("sim.sdu_size exceeds rlc_am.max_sdu_size");
        }
        Ok(())
    }
}

/// Mutable, stack-editable state (lock-protected).
#[derive(Debug, Clone, Default)]
pub struct StackState {
    /// Max-retx and protocol failures reported to RRC
    pub link_failures: u32,
    /// Bearer reestablishments requested by RRC
    pub reestablishments: u32,
}

/// Global shared configuration: immutable config + mutable state.
#[derive(Clone)]
pub struct SharedConfig {
    /// Read-only configuration (immutable after construction).
    cfg: Arc<StackConfig>,
    /// Mutable state guarded with RwLock (write by the stack, read by others).
    state: Arc<RwLock<StackState>>,
}

impl SharedConfig {
    pub fn new(rlc_am: RlcAmConfig) -> Self {
        Self::from_config(StackConfig::new(rlc_am))
    }

    pub fn from_config(cfg: StackConfig) -> Self {
        Self::from_parts(cfg, StackState::default())
    }

    /// Panics on an invalid configuration. Loaders validate first and return an error instead.
    pub fn from_parts(cfg: StackConfig, state: StackState) -> Self {
        if let Err(e) = cfg.validate() {
            panic!("Invalid stack configuration: {}", e);
        }

        Self {
            cfg: Arc::new(cfg),
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Access immutable config.
    pub fn config(&self) -> Arc<StackConfig> {
        Arc::clone(&self.cfg)
    }

    /// Read guard for mutable state.
    pub fn state_read(&self) -> std::sync::RwLockReadGuard<'_, StackState> {
        self.state.read().expect("StackState RwLock poisoned")
    }

    /// Write guard for mutable state.
    pub fn state_write(&self) -> std::sync::RwLockWriteGuard<'_, StackState> {
        self.state.write().expect("StackState RwLock poisoned")
    }
}
