use std::collections::HashMap;

use crate::core::errors::NodeFault;
use crate::core::ports::{InRef, NodePorts, OutRef, PortTable};
use crate::core::timers::SlotTimer;
use crate::core::value::Value;

/// A stateful reactive node.
///
/// The rack delivers one event at a time to `on_event` and runs the handler
/// to completion; timer firings re-enter through `on_timer` under the same
/// discipline, so node state never needs locking. A returned fault halts
/// this node instance only.
pub trait Node {
    /// Declared port families, resolved once at registration.
    fn ports(&self) -> NodePorts;

    /// Hook run once before the first event delivery, after wiring. Nodes
    /// arm their initial timers and compute connectivity policies here.
    fn startup(&mut self, _ctx: &mut NodeContext<'_>) -> Result<(), NodeFault> {
        Ok(())
    }

    /// Handle one event on one input port instance.
    fn on_event(
        &mut self,
        input: InRef,
        data: Value,
        ctx: &mut NodeContext<'_>,
    ) -> Result<(), NodeFault>;

    /// Handle the firing of a previously armed timer slot.
    fn on_timer(&mut self, _slot: u32, _ctx: &mut NodeContext<'_>) -> Result<(), NodeFault> {
        Ok(())
    }

    /// Telemetry hook: a snapshot of internal state after the most recent
    /// completed handler. No node logic may depend on this being called.
    fn snapshot(&self) -> Vec<(&'static str, Value)> {
        Vec::new()
    }
}

/// Operation recorded by a handler, applied by the rack after it returns.
#[derive(Debug)]
pub enum CtxOp {
    Emit(OutRef, Value),
    Arm(u32, u64),
    Rearm(u32, u64),
    Cancel(u32),
}

/// Per-invocation view handed to node handlers.
///
/// Emissions and timer operations are buffered and applied in order once the
/// handler returns; `timer_armed` already reflects operations buffered
/// earlier in the same invocation.
pub struct NodeContext<'a> {
    table: &'a PortTable,
    timers: &'a HashMap<u32, SlotTimer>,
    armed_shadow: HashMap<u32, bool>,
    ops: Vec<CtxOp>,
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(table: &'a PortTable, timers: &'a HashMap<u32, SlotTimer>) -> Self {
        Self {
            table,
            timers,
            armed_shadow: HashMap::new(),
            ops: Vec::new(),
        }
    }

    pub(crate) fn into_ops(self) -> Vec<CtxOp> {
        self.ops
    }

    /// Whether anything consumes this output port. Expensive computation
    /// should be skipped when this is false.
    pub fn connected(&self, out: OutRef) -> bool {
        self.table.is_connected(out)
    }

    /// Push a value to an output port instance. A disconnected destination
    /// makes this a cheap no-op.
    pub fn push(&mut self, out: OutRef, value: Value) {
        if self.table.is_connected(out) {
            self.ops.push(CtxOp::Emit(out, value));
        }
    }

    /// Arm the timer for `slot` to fire after `delay_ms` of rack time.
    /// At most one timer may be armed per slot; callers check `timer_armed`
    /// first, or use `rearm_timer` to replace an armed one.
    pub fn arm_timer(&mut self, slot: u32, delay_ms: u64) {
        debug_assert!(!self.timer_armed(slot), "timer slot {} already armed", slot);
        self.armed_shadow.insert(slot, true);
        self.ops.push(CtxOp::Arm(slot, delay_ms));
    }

    /// Cancel any armed timer for `slot`, then arm it afresh.
    pub fn rearm_timer(&mut self, slot: u32, delay_ms: u64) {
        self.armed_shadow.insert(slot, true);
        self.ops.push(CtxOp::Rearm(slot, delay_ms));
    }

    /// Cancel the armed timer for `slot`. Guarantees the pending firing,
    /// if any, is never delivered.
    pub fn cancel_timer(&mut self, slot: u32) {
        self.armed_shadow.insert(slot, false);
        self.ops.push(CtxOp::Cancel(slot));
    }

    pub fn timer_armed(&self, slot: u32) -> bool {
        if let Some(armed) = self.armed_shadow.get(&slot) {
            return *armed;
        }
        self.timers.get(&slot).map(|t| t.armed).unwrap_or(false)
    }
}
