use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use log::{debug, error};

use crate::core::errors::{NodeFault, RackError};
use crate::core::node::{CtxOp, Node, NodeContext};
use crate::core::ports::{InRef, OutRef, PortTable};
use crate::core::timers::{SlotTimer, TimerQueue};
use crate::core::types::{NodeId, NodeInfo};
use crate::core::value::Value;

/// Destination of one output port instance.
enum Target {
    Port { node: usize, input: InRef },
    Probe(usize),
}

/// One pending event delivery.
struct Delivery {
    node: usize,
    input: InRef,
    value: Value,
}

enum Invoke {
    Startup,
    Event(InRef, Value),
    Timer(u32),
}

struct NodeSlot {
    info: NodeInfo,
    node: Box<dyn Node>,
    table: PortTable,
    /// per flat output index
    targets: Vec<Vec<Target>>,
    timers: HashMap<u32, SlotTimer>,
    failed: bool,
}

/// Recording tap on an output port, for tests and telemetry.
///
/// A probe counts as a connection: the tapped output reports `connected`.
#[derive(Clone)]
pub struct Probe {
    values: Rc<RefCell<Vec<Value>>>,
}

impl Probe {
    pub fn values(&self) -> Vec<Value> {
        self.values.borrow().clone()
    }

    /// Drain and return everything recorded so far.
    pub fn take(&self) -> Vec<Value> {
        self.values.borrow_mut().drain(..).collect()
    }

    pub fn last(&self) -> Option<Value> {
        self.values.borrow().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Single-threaded cooperative host for a patch of nodes.
///
/// Events are delivered one handler at a time, run to completion, in FIFO
/// order; timer firings re-enter through the same path at deterministic
/// virtual-time deadlines. No two handlers of the same rack ever overlap.
pub struct Rack {
    slots: Vec<NodeSlot>,
    index: HashMap<NodeId, usize>,
    probes: Vec<Rc<RefCell<Vec<Value>>>>,
    queue: VecDeque<Delivery>,
    timers: TimerQueue,
    clock: u64,
    started: bool,
}

impl Rack {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
            probes: Vec::new(),
            queue: VecDeque::new(),
            timers: TimerQueue::new(),
            clock: 0,
            started: false,
        }
    }

    /// Register a node instance under a rack-unique id.
    pub fn add(&mut self, id: &str, node: Box<dyn Node>) -> Result<(), RackError> {
        if self.index.contains_key(id) {
            return Err(RackError::DuplicateNode(id.to_string()));
        }
        let table = PortTable::build(&node.ports());
        let mut targets = Vec::with_capacity(table.output_count());
        targets.resize_with(table.output_count(), Vec::new);
        self.index.insert(id.to_string(), self.slots.len());
        self.slots.push(NodeSlot {
            info: NodeInfo::new(id),
            node,
            table,
            targets,
            timers: HashMap::new(),
            failed: false,
        });
        Ok(())
    }

    /// Wire a source output to a destination input, both addressed by
    /// `(node id, port name)`. Marks the source output connected.
    pub fn connect(&mut self, src: (&str, &str), dst: (&str, &str)) -> Result<(), RackError> {
        let src_idx = self.node_index(src.0)?;
        let dst_idx = self.node_index(dst.0)?;
        let flat = self.resolve_output(src_idx, src.0, src.1)?;
        let input = self.slots[dst_idx]
            .table
            .input(dst.1)
            .ok_or_else(|| RackError::PortNotFound(format!("{}.{}", dst.0, dst.1)))?;

        self.slots[src_idx].table.mark_connected(flat);
        self.slots[src_idx].targets[flat].push(Target::Port {
            node: dst_idx,
            input,
        });
        Ok(())
    }

    /// Attach a recording tap to an output port.
    pub fn probe(&mut self, id: &str, port: &str) -> Result<Probe, RackError> {
        let idx = self.node_index(id)?;
        let flat = self.resolve_output(idx, id, port)?;

        let cell = Rc::new(RefCell::new(Vec::new()));
        self.probes.push(Rc::clone(&cell));
        let probe_idx = self.probes.len() - 1;
        self.slots[idx].table.mark_connected(flat);
        self.slots[idx].targets[flat].push(Target::Probe(probe_idx));
        Ok(Probe { values: cell })
    }

    /// Run every node's startup hook once, in registration order.
    /// Idempotent.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        for idx in 0..self.slots.len() {
            self.invoke(idx, Invoke::Startup);
            self.run();
        }
    }

    /// Queue an event for delivery to a node's input port. Delivery happens
    /// on the next `run` or `advance`.
    pub fn send(&mut self, id: &str, port: &str, value: Value) -> Result<(), RackError> {
        let idx = self.node_index(id)?;
        let input = self.slots[idx]
            .table
            .input(port)
            .ok_or_else(|| RackError::PortNotFound(format!("{}.{}", id, port)))?;
        self.queue.push_back(Delivery {
            node: idx,
            input,
            value,
        });
        Ok(())
    }

    /// Drain the delivery queue, running each handler to completion.
    pub fn run(&mut self) {
        while let Some(d) = self.queue.pop_front() {
            self.invoke(d.node, Invoke::Event(d.input, d.value));
        }
    }

    /// Advance the virtual clock by `ms`, firing due timers in deadline
    /// order and draining deliveries after each firing.
    pub fn advance(&mut self, ms: u64) {
        let target = self.clock.saturating_add(ms);
        self.run();
        while let Some(timer) = self.timers.pop_due(target) {
            let live = {
                let slot = &self.slots[timer.node];
                !slot.failed
                    && slot
                        .timers
                        .get(&timer.slot)
                        .map(|t| t.armed && t.generation == timer.generation)
                        .unwrap_or(false)
            };
            if !live {
                continue;
            }
            if timer.deadline > self.clock {
                self.clock = timer.deadline;
            }
            if let Some(t) = self.slots[timer.node].timers.get_mut(&timer.slot) {
                t.armed = false;
            }
            self.invoke(timer.node, Invoke::Timer(timer.slot));
            self.run();
        }
        self.clock = target;
    }

    /// Current virtual time in milliseconds.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Telemetry snapshot of one node, reflecting state after its most
    /// recent completed handler.
    pub fn snapshot(&self, id: &str) -> Result<Vec<(&'static str, Value)>, RackError> {
        let idx = self.node_index(id)?;
        Ok(self.slots[idx].node.snapshot())
    }

    /// Whether a node has terminated fatally.
    pub fn failed(&self, id: &str) -> Result<bool, RackError> {
        let idx = self.node_index(id)?;
        Ok(self.slots[idx].failed)
    }

    pub fn node_count(&self) -> usize {
        self.slots.len()
    }

    fn node_index(&self, id: &str) -> Result<usize, RackError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| RackError::NodeNotFound(id.to_string()))
    }

    fn resolve_output(&self, idx: usize, id: &str, port: &str) -> Result<usize, RackError> {
        let table = &self.slots[idx].table;
        table
            .output(port)
            .and_then(|out| table.flat_output(out))
            .ok_or_else(|| RackError::PortNotFound(format!("{}.{}", id, port)))
    }

    fn invoke(&mut self, idx: usize, call: Invoke) {
        let slot = &mut self.slots[idx];
        if slot.failed {
            return;
        }
        let mut ctx = NodeContext::new(&slot.table, &slot.timers);
        let result = match call {
            Invoke::Startup => slot.node.startup(&mut ctx),
            Invoke::Event(input, value) => slot.node.on_event(input, value, &mut ctx),
            Invoke::Timer(timer_slot) => slot.node.on_timer(timer_slot, &mut ctx),
        };
        let ops = ctx.into_ops();
        match result {
            Ok(()) => self.apply_ops(idx, ops),
            Err(fault) => self.fail_node(idx, fault),
        }
    }

    fn apply_ops(&mut self, idx: usize, ops: Vec<CtxOp>) {
        for op in ops {
            match op {
                CtxOp::Emit(out, value) => self.route_emit(idx, out, value),
                CtxOp::Arm(slot, delay) | CtxOp::Rearm(slot, delay) => {
                    let deadline = self.clock.saturating_add(delay);
                    let state = self.slots[idx].timers.entry(slot).or_default();
                    state.generation += 1;
                    state.armed = true;
                    let generation = state.generation;
                    self.timers.schedule(deadline, idx, slot, generation);
                }
                CtxOp::Cancel(slot) => {
                    let state = self.slots[idx].timers.entry(slot).or_default();
                    state.generation += 1;
                    state.armed = false;
                }
            }
        }
    }

    fn route_emit(&mut self, idx: usize, out: OutRef, value: Value) {
        let flat = match self.slots[idx].table.flat_output(out) {
            Some(flat) => flat,
            None => {
                debug!(
                    "{}: emit on unknown output token {:?} dropped",
                    self.slots[idx].info, out
                );
                return;
            }
        };
        for target in &self.slots[idx].targets[flat] {
            match target {
                Target::Port { node, input } => self.queue.push_back(Delivery {
                    node: *node,
                    input: *input,
                    value: value.clone(),
                }),
                Target::Probe(probe_idx) => {
                    self.probes[*probe_idx].borrow_mut().push(value.clone())
                }
            }
        }
    }

    fn fail_node(&mut self, idx: usize, fault: NodeFault) {
        let slot = &mut self.slots[idx];
        slot.failed = true;
        for state in slot.timers.values_mut() {
            state.generation += 1;
            state.armed = false;
        }
        error!(
            "node {} ({}) halted: {}",
            slot.info.id(),
            slot.info.instance(),
            fault
        );
    }
}

impl Default for Rack {
    fn default() -> Self {
        Self::new()
    }
}
