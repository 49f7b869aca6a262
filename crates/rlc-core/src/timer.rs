//! Millisecond timers for RLC bearers.
//!
//! A timer never calls back into its owner. Expiry is posted as a [`TimerEvent`] on a
//! crossbeam channel; the owner drains the channel and applies each event under its own
//! lock, after checking [`TimerFacility::accept`]. Every start and stop bumps the
//! timer's generation, so an event posted before a stop or restart is rejected.

use core::fmt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// t-PollRetransmit, transmitter side
    PollRetransmit,
    /// t-Reordering, receiver side
    Reordering,
    /// t-StatusProhibit, transmitter side
    StatusProhibit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId {
    pub bearer: u32,
    pub kind: TimerKind,
}

impl TimerId {
    pub fn new(bearer: u32, kind: TimerKind) -> Self {
        TimerId { bearer, kind }
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{}", self.kind, self.bearer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub id: TimerId,
    pub generation: u64,
}

pub trait TimerFacility: Send + Sync {
    /// (Re)starts the timer. A pending expiry of the previous run is invalidated.
    fn start(&self, id: TimerId, duration_ms: u32);
    /// Stops the timer if running. Idempotent.
    fn stop(&self, id: TimerId);
    /// True from start until stop, or until its expiry event is accepted
    fn is_running(&self, id: TimerId) -> bool;
    fn time_remaining(&self, id: TimerId) -> Option<u32>;
    /// Returns true if `event` belongs to the current run of its timer, and marks the timer stopped.
    /// Stale events return false and must be ignored.
    fn accept(&self, event: &TimerEvent) -> bool;
}

struct Slot<T> {
    generation: u64,
    deadline: Option<T>,
    fired: bool,
}

/// Generation bookkeeping shared by both facilities. `T` is the clock type.
struct TimerTable<T> {
    next_generation: u64,
    slots: HashMap<TimerId, Slot<T>>,
}

impl<T: Copy + Ord> TimerTable<T> {
    fn new() -> Self {
        TimerTable { next_generation: 1, slots: HashMap::new() }
    }

    fn bump(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }

    fn start(&mut self, id: TimerId, deadline: T) {
        let generation = self.bump();
        self.slots.insert(id, Slot { generation, deadline: Some(deadline), fired: false });
    }

    fn stop(&mut self, id: TimerId) {
        let generation = self.bump();
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.generation = generation;
            slot.deadline = None;
            slot.fired = false;
        }
    }

    fn deadline(&self, id: TimerId) -> Option<T> {
        self.slots.get(&id).and_then(|s| s.deadline)
    }

    fn accept(&mut self, event: &TimerEvent) -> bool {
        match self.slots.get_mut(&event.id) {
            Some(slot) if slot.generation == event.generation && slot.fired => {
                slot.deadline = None;
                slot.fired = false;
                true
            }
            _ => false,
        }
    }

    /// Marks every due, not yet fired timer as fired and returns their events, earliest first
    fn collect_due(&mut self, now: T) -> Vec<TimerEvent> {
        let mut due: Vec<(T, TimerEvent)> = self
            .slots
            .iter_mut()
            .filter_map(|(id, slot)| match slot.deadline {
                Some(d) if !slot.fired && d <= now => {
                    slot.fired = true;
                    Some((d, TimerEvent { id: *id, generation: slot.generation }))
                }
                _ => None,
            })
            .collect();
        due.sort_by_key(|(d, _)| *d);
        due.into_iter().map(|(_, ev)| ev).collect()
    }

    fn next_deadline(&self) -> Option<T> {
        self.slots.values().filter(|s| !s.fired).filter_map(|s| s.deadline).min()
    }
}

fn post(events: &Sender<TimerEvent>, due: Vec<TimerEvent>) {
    for ev in due {
        tracing::trace!("timer {} expired (gen {})", ev.id, ev.generation);
        if events.send(ev).is_err() {
            tracing::debug!("timer {} expired but its owner is gone", ev.id);
        }
    }
}

/// Tick-driven clock. Nothing expires until [`ManualTimers::advance`] moves time forward.
/// Used by the router simulation and by tests.
pub struct ManualTimers {
    inner: Mutex<ManualInner>,
    events: Sender<TimerEvent>,
}

struct ManualInner {
    now_ms: u64,
    table: TimerTable<u64>,
}

impl ManualTimers {
    pub fn new(events: Sender<TimerEvent>) -> Self {
        ManualTimers {
            inner: Mutex::new(ManualInner { now_ms: 0, table: TimerTable::new() }),
            events,
        }
    }

    /// Moves the clock forward and posts every expiry that became due
    pub fn advance(&self, ms: u64) {
        let due = {
            let mut inner = self.inner.lock().expect("timer mutex poisoned");
            inner.now_ms += ms;
            let now = inner.now_ms;
            inner.table.collect_due(now)
        };
        post(&self.events, due);
    }

    pub fn now_ms(&self) -> u64 {
        self.inner.lock().expect("timer mutex poisoned").now_ms
    }
}

impl TimerFacility for ManualTimers {
    fn start(&self, id: TimerId, duration_ms: u32) {
        let mut inner = self.inner.lock().expect("timer mutex poisoned");
        let deadline = inner.now_ms + duration_ms as u64;
        inner.table.start(id, deadline);
    }

    fn stop(&self, id: TimerId) {
        self.inner.lock().expect("timer mutex poisoned").table.stop(id);
    }

    fn is_running(&self, id: TimerId) -> bool {
        self.inner.lock().expect("timer mutex poisoned").table.deadline(id).is_some()
    }

    fn time_remaining(&self, id: TimerId) -> Option<u32> {
        let inner = self.inner.lock().expect("timer mutex poisoned");
        inner.table.deadline(id).map(|d| d.saturating_sub(inner.now_ms) as u32)
    }

    fn accept(&self, event: &TimerEvent) -> bool {
        self.inner.lock().expect("timer mutex poisoned").table.accept(event)
    }
}

enum Command {
    Wake,
    Shutdown,
}

/// Wall-clock timers served by one worker thread. Start and stop only touch the shared
/// table and nudge the worker; they never block on it.
pub struct ThreadTimers {
    table: Arc<Mutex<TimerTable<Instant>>>,
    commands: Sender<Command>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadTimers {
    /// Fails only if the worker thread cannot be spawned
    pub fn new(events: Sender<TimerEvent>) -> std::io::Result<Self> {
        let table = Arc::new(Mutex::new(TimerTable::new()));
        let (commands, command_rx) = crossbeam_channel::unbounded();
        let worker_table = table.clone();
        let worker = std::thread::Builder::new()
            .name("rlc-timers".to_string())
            .spawn(move || Self::worker(worker_table, command_rx, events))?;
        Ok(ThreadTimers { table, commands, worker: Some(worker) })
    }

    fn worker(table: Arc<Mutex<TimerTable<Instant>>>, commands: Receiver<Command>, events: Sender<TimerEvent>) {
        loop {
            let (due, next) = {
                let mut table = table.lock().expect("timer mutex poisoned");
                let due = table.collect_due(Instant::now());
                (due, table.next_deadline())
            };
            post(&events, due);

            let cmd = match next {
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    match commands.recv_timeout(wait) {
                        Ok(cmd) => cmd,
                        Err(RecvTimeoutError::Timeout) => Command::Wake,
                        Err(RecvTimeoutError::Disconnected) => Command::Shutdown,
                    }
                }
                None => commands.recv().unwrap_or(Command::Shutdown),
            };
            if let Command::Shutdown = cmd {
                tracing::debug!("timer thread exiting");
                return;
            }
        }
    }

    fn wake(&self) {
        // Worker gone means we are shutting down anyway
        let _ = self.commands.send(Command::Wake);
    }
}

impl TimerFacility for ThreadTimers {
    fn start(&self, id: TimerId, duration_ms: u32) {
        let deadline = Instant::now() + Duration::from_millis(duration_ms as u64);
        self.table.lock().expect("timer mutex poisoned").start(id, deadline);
        self.wake();
    }

    fn stop(&self, id: TimerId) {
        self.table.lock().expect("timer mutex poisoned").stop(id);
        self.wake();
    }

    fn is_running(&self, id: TimerId) -> bool {
        self.table.lock().expect("timer mutex poisoned").deadline(id).is_some()
    }

    fn time_remaining(&self, id: TimerId) -> Option<u32> {
        let deadline = self.table.lock().expect("timer mutex poisoned").deadline(id)?;
        Some(deadline.saturating_duration_since(Instant::now()).as_millis() as u32)
    }

    fn accept(&self, event: &TimerEvent) -> bool {
        self.table.lock().expect("timer mutex poisoned").accept(event)
    }
}

impl Drop for ThreadTimers {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
