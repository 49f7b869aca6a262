use clap::Parser;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rlc_config::{SharedConfig, toml_config};
use rlc_core::{Node, RlcEntity, debug};
use rlc_entities::MessageRouter;
use rlc_entities::rlc::rlc_am_entity::RlcAmEntity;
use rlc_entities::sim::{AirChannel, PdcpTraffic, RrcStub, SIM_LCID};

/// Load configuration file
fn load_config_from_toml(cfg_path: &str) -> SharedConfig {
    match toml_config::from_file(cfg_path) {
        Ok(c) => c,
        Err(e) => {
            println!("Failed to load configuration from {}: {}", cfg_path, e);
            std::process::exit(1);
        }
    }
}

/// Two nodes, each with traffic, an AM bearer and RRC, joined by one air channel
fn build_sim_stack(cfg: &SharedConfig) -> MessageRouter {
    let mut router = MessageRouter::new(cfg.clone());
    for node in [Node::Ue, Node::Enb] {
        let rlc = match RlcAmEntity::new(cfg.clone(), node, SIM_LCID) {
            Ok(rlc) => rlc,
            Err(e) => {
                println!("Failed to set up {:?} bearer: {}", node, e);
                std::process::exit(1);
            }
        };
        router.register_entity(Box::new(rlc));
        router.register_entity(Box::new(PdcpTraffic::new(cfg.clone(), node)));
        router.register_entity(Box::new(RrcStub::new(cfg.clone(), node)));
    }
    router.register_entity(Box::new(AirChannel::new(cfg.clone())));
    router
}

/// Prints per node results, returns whether the run was clean
fn report(router: &mut MessageRouter, cfg: &SharedConfig) -> bool {
    let mut clean = true;
    for node in [Node::Ue, Node::Enb] {
        println!("== {:?} ==", node);
        if let Some(rlc) = router.get_entity(RlcEntity::Rlc(node)).and_then(|e| e.as_any().downcast_ref::<RlcAmEntity>()) {
            println!("{}", rlc.bearer().metrics());
        }
        if let Some(pdcp) = router.get_entity(RlcEntity::Pdcp(node)).and_then(|e| e.as_any().downcast_ref::<PdcpTraffic>()) {
            let stats = pdcp.stats();
            println!(
                "  traffic generated {}  delivered {}  failed {}  received {}  out of order {}  corrupted {}",
                stats.generated, stats.delivered, stats.failed, stats.received, stats.out_of_order, stats.corrupted
            );
            clean &= pdcp.is_settled() && stats.failed == 0 && stats.out_of_order == 0 && stats.corrupted == 0;
        }
    }
    if let Some(air) = router.get_entity(RlcEntity::Air).and_then(|e| e.as_any().downcast_ref::<AirChannel>()) {
        let stats = air.stats();
        println!("== Air ==");
        println!("  carried {}  dropped {}  delayed {}  in flight {}", stats.carried, stats.dropped, stats.delayed, air.in_flight());
    }
    let state = cfg.state_read();
    println!("link failures {}  reestablishments {}", state.link_failures, state.reestablishments);
    clean && state.link_failures == 0
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "RLC AM loopback simulator",
    long_about = "Runs two RLC AM bearers against each other over a lossy, reordering channel and checks that every SDU arrives"
)]
struct Args {
    /// Config file (required)
    #[arg(help = "TOML config with rlc_am and sim parameters")]
    config: String,

    /// Pace the simulation at one tick per millisecond
    #[arg(long)]
    realtime: bool,

    /// Override sim.num_ticks
    #[arg(long)]
    ticks: Option<u64>,
}

fn main() {
    eprintln!("[+] RLC AM loopback simulator");

    let args = Args::parse();
    let cfg = load_config_from_toml(&args.config);
    let _log_guard = debug::setup_logging_default(cfg.config().debug_log.clone());

    let mut router = build_sim_stack(&cfg);
    if args.realtime {
        router.set_tick_period(Some(Duration::from_millis(1)));
    }

    // Set up Ctrl+C handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("failed to set Ctrl+C handler");

    let num_ticks = args.ticks.unwrap_or(cfg.config().sim.num_ticks);
    tracing::info!("running {} ticks, {} sdus per node", num_ticks, cfg.config().sim.num_sdus);
    router.run_stack(Some(num_ticks as usize), Some(running));

    let clean = report(&mut router, &cfg);
    if clean {
        println!("PASS: every sdu delivered in order");
    } else {
        println!("FAIL: see counters above");
        std::process::exit(2);
    }
}
