use rlc_config::{RlcAmConfig, SharedConfig, StackConfig, StackState};
use rlc_core::{Node, RlcEntity};
use rlc_entities::rlc::rlc_am_entity::RlcAmEntity;
use rlc_entities::sim::{AirChannel, PdcpTraffic, RrcStub, SIM_LCID, TrafficStats};
use rlc_entities::{MessageRouter, RlcEntityTrait};
use rlc_saps::SapMsg;

use super::sink::Sink;

/// Creates a default config for testing. It can still be modified as needed
/// before passing it to the ComponentTest constructor
pub fn default_test_config() -> StackConfig {
    let mut cfg = StackConfig::new(RlcAmConfig { max_retx_thresh: 64, ..Default::default() });
    cfg.sim.loss_rate = 0.0;
    cfg.sim.reorder_rate = 0.0;
    cfg.sim.num_sdus = 0;
    cfg
}

/// Infrastructure for testing the RLC AM entities
/// Quick setup of all components for end-to-end testing
/// Supports optional sinks for collecting messages for later inspection
pub struct ComponentTest {
    pub config: SharedConfig,
    pub router: MessageRouter,
    pub sinks: Vec<RlcEntity>,
}

impl ComponentTest {
    pub fn new(config: StackConfig) -> Self {
        let shared_config = SharedConfig::from_parts(config, StackState::default());
        let router = MessageRouter::new(shared_config.clone());
        Self { config: shared_config, router, sinks: vec![] }
    }

    pub fn get_shared_config(&self) -> SharedConfig {
        self.config.clone()
    }

    pub fn populate_entities(&mut self, components: Vec<RlcEntity>, sinks: Vec<RlcEntity>) {
        for component in components.iter() {
            match *component {
                RlcEntity::Pdcp(node) => {
                    let pdcp = PdcpTraffic::new(self.config.clone(), node);
                    self.register_entity(pdcp);
                }
                RlcEntity::Rlc(node) => {
                    let rlc = RlcAmEntity::new(self.config.clone(), node, SIM_LCID).expect("valid test config");
                    self.register_entity(rlc);
                }
                RlcEntity::Rrc(node) => {
                    let rrc = RrcStub::new(self.config.clone(), node);
                    self.register_entity(rrc);
                }
                RlcEntity::Air => {
                    let air = AirChannel::new(self.config.clone());
                    self.register_entity(air);
                }
            }
        }

        // Create sinks for debugging / message collection
        for sink in sinks.iter() {
            assert!(!self.sinks.contains(sink), "Sink already exists: {:?}", sink);
            assert!(self.router.get_entity(*sink).is_none(), "Sink already registered as entity: {:?}", sink);
            self.sinks.push(*sink);
            self.register_entity(Sink::new(*sink));
        }
    }

    /// Every simulated entity of both nodes
    pub fn populate_full_loopback(&mut self) {
        let mut components = vec![RlcEntity::Air];
        for node in [Node::Ue, Node::Enb] {
            components.extend([RlcEntity::Pdcp(node), RlcEntity::Rlc(node), RlcEntity::Rrc(node)]);
        }
        self.populate_entities(components, vec![]);
    }

    pub fn register_entity<T: 'static + RlcEntityTrait>(&mut self, entity: T) {
        self.router.register_entity(Box::new(entity));
    }

    pub fn run_stack(&mut self, num_ticks: Option<usize>) {
        self.router.run_stack(num_ticks, None);
    }

    pub fn submit_message(&mut self, message: SapMsg) {
        self.router.submit_message(message);
    }

    pub fn deliver_all_messages(&mut self) {
        self.router.deliver_all_messages();
    }

    pub fn dump_sinks(&mut self) -> Vec<SapMsg> {
        let mut msgs = vec![];
        for sink in self.sinks.iter() {
            if let Some(component) = self.router.get_entity(*sink) {
                if let Some(sink) = component.as_any_mut().downcast_mut::<Sink>() {
                    let mut sink_msgs = sink.take_msgqueue();
                    msgs.append(&mut sink_msgs);
                }
            }
        }
        msgs
    }

    pub fn traffic_stats(&mut self, node: Node) -> TrafficStats {
        let component = self.router.get_entity(RlcEntity::Pdcp(node)).expect("no traffic entity");
        let pdcp = component.as_any().downcast_ref::<PdcpTraffic>().expect("not a traffic entity");
        pdcp.stats()
    }

    pub fn rlc_entity(&mut self, node: Node) -> &RlcAmEntity {
        let component = self.router.get_entity(RlcEntity::Rlc(node)).expect("no rlc entity");
        component.as_any().downcast_ref::<RlcAmEntity>().expect("not an rlc entity")
    }
}
