use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rlc_config::SharedConfig;
use rlc_core::{RlcEntity, TickTime};
use rlc_saps::SapMsg;

use crate::RlcEntityTrait;

#[derive(Default)]
pub enum MessagePrio {
    Immediate,
    #[default]
    Normal,
}

#[derive(Default)]
pub struct MessageQueue {
    messages: VecDeque<SapMsg>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self { messages: VecDeque::new() }
    }

    pub fn push_back(&mut self, message: SapMsg) {
        self.messages.push_back(message);
    }

    pub fn push_prio(&mut self, message: SapMsg, prio: MessagePrio) {
        match prio {
            MessagePrio::Immediate => self.messages.push_front(message),
            MessagePrio::Normal => self.messages.push_back(message),
        }
    }

    pub fn pop_front(&mut self) -> Option<SapMsg> {
        self.messages.pop_front()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

pub struct MessageRouter {
    /// Not read by the router itself, kept so entities can be built from it later
    _config: SharedConfig,
    entities: HashMap<RlcEntity, Box<dyn RlcEntityTrait>>,
    msg_queue: MessageQueue,

    /// Current tick, incremented at the end of each tick
    ts: TickTime,

    /// If set, each tick is stretched to at least this wall-clock duration
    tick_period: Option<Duration>,
}

impl MessageRouter {
    pub fn new(config: SharedConfig) -> Self {
        Self {
            _config: config,
            entities: HashMap::new(),
            msg_queue: MessageQueue::new(),
            ts: 0,
            tick_period: None,
        }
    }

    pub fn set_time(&mut self, ts: TickTime) {
        self.ts = ts;
    }

    pub fn get_time(&self) -> TickTime {
        self.ts
    }

    /// Pace ticks against the wall clock (None runs as fast as possible)
    pub fn set_tick_period(&mut self, period: Option<Duration>) {
        self.tick_period = period;
    }

    pub fn register_entity(&mut self, entity: Box<dyn RlcEntityTrait>) {
        let comp_type = entity.entity();
        tracing::debug!("register_entity {:?}", comp_type);
        self.entities.insert(comp_type, entity);
    }

    /// Returns a mut ref to a component of the requested type
    pub fn get_entity(&mut self, comp: RlcEntity) -> Option<&mut dyn RlcEntityTrait> {
        self.entities.get_mut(&comp).map(|entity| entity.as_mut())
    }

    pub fn submit_message(&mut self, message: SapMsg) {
        tracing::debug!("submit_message {:?}: {} -> {}", message.get_sap(), message.get_source(), message.get_dest());
        self.msg_queue.push_back(message);
    }

    pub fn deliver_message(&mut self) {
        let Some(message) = self.msg_queue.pop_front() else {
            return;
        };
        tracing::trace!(ts = self.ts, "deliver_message: {} -> {}: {}", message.get_source(), message.get_dest(), message.msg);

        let dest = *message.get_dest();
        if let Some(entity) = self.entities.get_mut(&dest) {
            entity.rx_prim(&mut self.msg_queue, message);
        } else {
            tracing::warn!("deliver_message: entity {} not found for {:?}: {}", dest, message.get_sap(), message.msg);
        }
    }

    pub fn deliver_all_messages(&mut self) {
        while !self.msg_queue.is_empty() {
            self.deliver_message();
        }
    }

    pub fn get_msgqueue_len(&self) -> usize {
        self.msg_queue.len()
    }

    pub fn tick_start(&mut self) {
        tracing::debug!("--- tick {} ----------------------------", self.ts);
        for entity in self.entities.values_mut() {
            entity.tick_start(&mut self.msg_queue, self.ts);
        }
    }

    /// Gives every entity a chance to flush end-of-tick output, then advances time
    pub fn tick_end(&mut self) {
        for entity in self.entities.values_mut() {
            entity.tick_end(&mut self.msg_queue, self.ts);
        }
        self.deliver_all_messages();
        self.ts += 1;
    }

    /// Runs the stack either forever or for a specified number of ticks.
    /// Stops early when `running` is cleared.
    pub fn run_stack(&mut self, num_ticks: Option<usize>, running: Option<Arc<AtomicBool>>) {
        let mut ticks: usize = 0;
        let mut next_deadline = Instant::now();

        loop {
            if let Some(ref running) = running {
                if !running.load(Ordering::SeqCst) {
                    tracing::info!("stopping stack at tick {}", self.ts);
                    break;
                }
            }

            self.tick_start();
            self.deliver_all_messages();
            self.tick_end();

            ticks += 1;
            if let Some(num_ticks) = num_ticks {
                if ticks >= num_ticks {
                    break;
                }
            }

            if let Some(period) = self.tick_period {
                next_deadline += period;
                let now = Instant::now();
                if next_deadline > now {
                    std::thread::sleep(next_deadline - now);
                } else {
                    next_deadline = now;
                }
            }
        }
    }
}
