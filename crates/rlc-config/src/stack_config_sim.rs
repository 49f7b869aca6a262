/// Settings of the two-node loopback simulation run by `rlc-am-sim`
#[derive(Debug, Clone, PartialEq)]
pub struct CfgSim {
    /// Number of 1 ms ticks to run
    pub num_ticks: u64,
    /// SDUs each node generates
    pub num_sdus: u32,
    /// Size of each generated SDU in bytes
    pub sdu_size: usize,
    /// Ticks between two generated SDUs
    pub sdu_interval_ticks: u64,
    /// Bytes the MAC grants each bearer per tick
    pub opportunity_bytes: usize,
    /// Probability that the channel drops a PDU
    pub loss_rate: f64,
    /// Probability that a PDU gets a random extra delay, reordering it
    pub reorder_rate: f64,
    /// Upper bound of that extra delay
    pub max_delay_ticks: u64,
    /// Seed of the channel RNG
    pub seed: u64,
}

impl Default for CfgSim {
    fn default() -> Self {
        Self {
            num_ticks: 5000,
            num_sdus: 200,
            sdu_size: 300,
            sdu_interval_ticks: 5,
            opportunity_bytes: 200,
            loss_rate: 0.1,
            reorder_rate: 0.1,
            max_delay_ticks: 8,
            seed: 1,
        }
    }
}

impl CfgSim {
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(0.0..1.0).contains(&self.loss_rate) {
            return Err("sim.loss_rate must be in [0, 1)");
        }
        if !(0.0..=1.0).contains(&self.reorder_rate) {
            return Err("sim.reorder_rate must be in [0, 1]");
        }
        if self.sdu_size == 0 {
            return Err("sim.sdu_size must be non-zero");
        }
        if self.sdu_interval_ticks == 0 {
            return Err("sim.sdu_interval_ticks must be non-zero");
        }
        if self.opportunity_bytes < 3 {
            return Err("sim.opportunity_bytes must be at least 3");
        }
        Ok(())
    }
}
