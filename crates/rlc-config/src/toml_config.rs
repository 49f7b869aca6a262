use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use rlc_core::LiWidth;
use serde::Deserialize;
use toml::Value;

use super::stack_config::{SharedConfig, StackConfig, StackState};
use super::stack_config_am::RlcAmConfig;
use super::stack_config_sim::CfgSim;

const EXPECTED_CONFIG_VERSION: &str = "0.1";

/// Build `SharedConfig` from a TOML configuration string
pub fn from_toml_str(toml_str: &str) -> Result<SharedConfig, Box<dyn std::error::Error>> {
    let root: TomlConfigRoot = toml::from_str(toml_str)?;

    if root.config_version != EXPECTED_CONFIG_VERSION {
        return Err(format!(
            "Unrecognized config_version: {}, expect {}",
            root.config_version, EXPECTED_CONFIG_VERSION
        )
        .into());
    }
    if !root.extra.is_empty() {
        return Err(format!("Unrecognized top-level fields: {:?}", sorted_keys(&root.extra)).into());
    }
    if let Some(ref am) = root.rlc_am {
        if !am.extra.is_empty() {
            return Err(format!("Unrecognized fields in rlc_am: {:?}", sorted_keys(&am.extra)).into());
        }
    }
    if let Some(ref sim) = root.sim {
        if !sim.extra.is_empty() {
            return Err(format!("Unrecognized fields in sim: {:?}", sorted_keys(&sim.extra)).into());
        }
    }
    if let Some(ref ss) = root.stack_state {
        if !ss.extra.is_empty() {
            return Err(format!("Unrecognized fields in stack_state: {:?}", sorted_keys(&ss.extra)).into());
        }
    }

    let mut cfg = StackConfig {
        debug_log: root.debug_log,
        rlc_am: RlcAmConfig::default(),
        sim: CfgSim::default(),
    };
    if let Some(am) = root.rlc_am {
        apply_rlc_am_patch(&mut cfg.rlc_am, am);
    }
    if let Some(sim) = root.sim {
        apply_sim_patch(&mut cfg.sim, sim);
    }

    let mut state = StackState::default();
    if let Some(ss) = root.stack_state {
        if let Some(v) = ss.link_failures {
            state.link_failures = v;
        }
        if let Some(v) = ss.reestablishments {
            state.reestablishments = v;
        }
    }

    // from_parts panics on invalid input, report it as an error instead
    if let Err(e) = cfg.validate() {
        return Err(format!("Invalid configuration: {}", e).into());
    }
    Ok(SharedConfig::from_parts(cfg, state))
}

/// Build `SharedConfig` from any reader.
pub fn from_reader<R: Read>(reader: R) -> Result<SharedConfig, Box<dyn std::error::Error>> {
    let mut contents = String::new();
    let mut reader = BufReader::new(reader);
    reader.read_to_string(&mut contents)?;
    from_toml_str(&contents)
}

/// Build `SharedConfig` from a file path.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<SharedConfig, Box<dyn std::error::Error>> {
    let f = File::open(path)?;
    from_reader(BufReader::new(f))
}

fn apply_rlc_am_patch(dst: &mut RlcAmConfig, src: RlcAmDto) {
    if let Some(v) = src.window_size {
        dst.window_size = v;
    }
    if let Some(v) = src.li_width {
        dst.li_width = v;
    }
    if let Some(v) = src.t_poll_retx {
        dst.t_poll_retx = v;
    }
    if let Some(v) = src.poll_pdu {
        dst.poll_pdu = v;
    }
    if let Some(v) = src.poll_byte {
        dst.poll_byte = v;
    }
    if let Some(v) = src.max_retx_thresh {
        dst.max_retx_thresh = v;
    }
    if let Some(v) = src.t_reordering {
        dst.t_reordering = v;
    }
    if let Some(v) = src.t_status_prohibit {
        dst.t_status_prohibit = v;
    }
    if let Some(v) = src.tx_queue_length {
        dst.tx_queue_length = v;
    }
    if let Some(v) = src.max_sdu_size {
        dst.max_sdu_size = v;
    }
}

fn apply_sim_patch(dst: &mut CfgSim, src: SimDto) {
    if let Some(v) = src.num_ticks {
        dst.num_ticks = v;
    }
    if let Some(v) = src.num_sdus {
        dst.num_sdus = v;
    }
    if let Some(v) = src.sdu_size {
        dst.sdu_size = v;
    }
    if let Some(v) = src.sdu_interval_ticks {
        dst.sdu_interval_ticks = v;
    }
    if let Some(v) = src.opportunity_bytes {
        dst.opportunity_bytes = v;
    }
    if let Some(v) = src.loss_rate {
        dst.loss_rate = v;
    }
    if let Some(v) = src.reorder_rate {
        dst.reorder_rate = v;
    }
    if let Some(v) = src.max_delay_ticks {
        dst.max_delay_ticks = v;
    }
    if let Some(v) = src.seed {
        dst.seed = v;
    }
}

fn sorted_keys(map: &HashMap<String, Value>) -> Vec<&str> {
    let mut v: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
    v.sort_unstable();
    v
}

/// ----------------------- DTOs for input shape -----------------------

#[derive(Deserialize)]
struct TomlConfigRoot {
    config_version: String,
    debug_log: Option<String>,

    #[serde(default)]
    rlc_am: Option<RlcAmDto>,

    #[serde(default)]
    sim: Option<SimDto>,

    #[serde(default)]
    stack_state: Option<StackStatePatch>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct RlcAmDto {
    window_size: Option<u16>,
    li_width: Option<LiWidth>,
    t_poll_retx: Option<u32>,
    poll_pdu: Option<i32>,
    poll_byte: Option<i32>,
    max_retx_thresh: Option<u32>,
    t_reordering: Option<u32>,
    t_status_prohibit: Option<u32>,
    tx_queue_length: Option<usize>,
    max_sdu_size: Option<usize>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct SimDto {
    num_ticks: Option<u64>,
    num_sdus: Option<u32>,
    sdu_size: Option<usize>,
    sdu_interval_ticks: Option<u64>,
    opportunity_bytes: Option<usize>,
    loss_rate: Option<f64>,
    reorder_rate: Option<f64>,
    max_delay_ticks: Option<u64>,
    seed: Option<u64>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct StackStatePatch {
    link_failures: Option<u32>,
    reestablishments: Option<u32>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}
