use serde::{Deserialize, Serialize};

use crate::core::errors::NodeFault;
use crate::core::node::{Node, NodeContext};
use crate::core::ports::{InRef, NodePorts, OutRef, PortDecl};
use crate::core::value::Value;

const FAM_GATE: usize = 0;

/// Temporal contract of one timer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    /// Continuously rearmed; the output fires when gate arrival and timer
    /// expiry have both happened, in either order.
    Relative,
    /// One-shot per cycle: armed by the first gate, fires once, then the
    /// slot is inert until the next gate.
    Absolute,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimerSpec {
    pub period_ms: u64,
    pub mode: TimerMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayOptions {
    /// One entry per timer slot; slot k listens on `gate<k>` and emits on
    /// `gate<k>`.
    pub timers: Vec<TimerSpec>,
}

impl Default for DelayOptions {
    fn default() -> Self {
        Self {
            timers: vec![TimerSpec {
                period_ms: 1000,
                mode: TimerMode::Relative,
            }],
        }
    }
}

#[derive(Debug, Default)]
struct SlotState {
    timeout: bool,
    gate: bool,
    latched: Value,
}

/// Bank of independently armed per-slot timers.
///
/// Timers, flags, and latched payloads are keyed by slot index and never
/// shared between slots.
pub struct Delay {
    options: DelayOptions,
    slots: Vec<SlotState>,
}

impl Delay {
    pub fn new(options: DelayOptions) -> Self {
        let mut slots = Vec::with_capacity(options.timers.len());
        slots.resize_with(options.timers.len(), SlotState::default);
        Self { options, slots }
    }

    fn on_gate(&mut self, slot: u32, data: Value, ctx: &mut NodeContext<'_>) {
        let idx = (slot - 1) as usize;
        self.slots[idx].gate = true;
        self.slots[idx].latched = data.gate_or_default();

        if ctx.timer_armed(slot) {
            return;
        }
        let spec = self.options.timers[idx];
        match spec.mode {
            TimerMode::Relative => {
                if self.slots[idx].timeout {
                    self.fire(slot, ctx);
                }
            }
            TimerMode::Absolute => ctx.arm_timer(slot, spec.period_ms),
        }
    }

    fn fire(&mut self, slot: u32, ctx: &mut NodeContext<'_>) {
        let idx = (slot - 1) as usize;
        self.slots[idx].timeout = false;
        self.slots[idx].gate = false;
        let payload = self.slots[idx].latched.clone();
        ctx.push(OutRef::new(FAM_GATE, slot), payload);

        let spec = self.options.timers[idx];
        if spec.mode == TimerMode::Relative {
            ctx.arm_timer(slot, spec.period_ms);
        }
    }
}

impl Node for Delay {
    fn ports(&self) -> NodePorts {
        let arity = self.options.timers.len() as u32;
        NodePorts::new(
            vec![PortDecl::dynamic("gate{}", arity)],
            vec![PortDecl::dynamic("gate{}", arity)],
        )
    }

    fn startup(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeFault> {
        for (idx, spec) in self.options.timers.iter().enumerate() {
            if spec.mode == TimerMode::Relative {
                ctx.arm_timer(idx as u32 + 1, spec.period_ms);
            }
        }
        Ok(())
    }

    fn on_event(
        &mut self,
        input: InRef,
        data: Value,
        ctx: &mut NodeContext<'_>,
    ) -> Result<(), NodeFault> {
        if input.family == FAM_GATE {
            self.on_gate(input.slot, data, ctx);
        }
        Ok(())
    }

    fn on_timer(&mut self, slot: u32, ctx: &mut NodeContext<'_>) -> Result<(), NodeFault> {
        let idx = (slot - 1) as usize;
        self.slots[idx].timeout = true;
        match self.options.timers[idx].mode {
            TimerMode::Relative => {
                if self.slots[idx].gate {
                    self.fire(slot, ctx);
                }
            }
            TimerMode::Absolute => self.fire(slot, ctx),
        }
        Ok(())
    }

    fn snapshot(&self) -> Vec<(&'static str, Value)> {
        let slots: Vec<Value> = self
            .slots
            .iter()
            .enumerate()
            .map(|(idx, state)| {
                Value::List(vec![
                    Value::Int(idx as i64 + 1),
                    Value::Bool(state.timeout),
                    Value::Bool(state.gate),
                ])
            })
            .collect();
        vec![("timers", Value::List(slots))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rack::Rack;

    fn delay_rack(timers: Vec<TimerSpec>) -> (Rack, Vec<crate::core::rack::Probe>) {
        let count = timers.len();
        let mut rack = Rack::new();
        rack.add("delay", Box::new(Delay::new(DelayOptions { timers })))
            .unwrap();
        let probes = (1..=count)
            .map(|n| rack.probe("delay", &format!("gate{}", n)).unwrap())
            .collect();
        rack.start();
        (rack, probes)
    }

    #[test]
    fn test_absolute_slot_fires_once_per_armed_cycle() {
        let (mut rack, probes) = delay_rack(vec![TimerSpec {
            period_ms: 100,
            mode: TimerMode::Absolute,
        }]);

        rack.send("delay", "gate1", Value::Int(7)).unwrap();
        rack.run();
        // Further gates before expiry must not arm additional timers
        rack.send("delay", "gate1", Value::Int(8)).unwrap();
        rack.send("delay", "gate1", Value::Int(9)).unwrap();
        rack.advance(100);
        assert_eq!(probes[0].values(), vec![Value::Int(9)]);

        // Slot is inert until the next gate
        rack.advance(500);
        assert_eq!(probes[0].len(), 1);

        rack.send("delay", "gate1", Value::Int(1)).unwrap();
        rack.advance(100);
        assert_eq!(probes[0].len(), 2);
    }

    #[test]
    fn test_relative_slot_waits_for_gate_and_timeout() {
        let (mut rack, probes) = delay_rack(vec![TimerSpec {
            period_ms: 10,
            mode: TimerMode::Relative,
        }]);

        // Gate first, then expiry
        rack.send("delay", "gate1", Value::Int(1)).unwrap();
        rack.advance(10);
        assert_eq!(probes[0].len(), 1);

        // Expiry first, then a late gate fires immediately
        rack.advance(10);
        assert_eq!(probes[0].len(), 1);
        rack.send("delay", "gate1", Value::Int(2)).unwrap();
        rack.run();
        assert_eq!(probes[0].values(), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_relative_slot_keeps_a_steady_cadence() {
        let (mut rack, probes) = delay_rack(vec![TimerSpec {
            period_ms: 10,
            mode: TimerMode::Relative,
        }]);

        for _ in 0..3 {
            rack.send("delay", "gate1", Value::Nil).unwrap();
            rack.advance(10);
        }
        assert_eq!(probes[0].len(), 3);
    }

    #[test]
    fn test_slots_are_independent() {
        let (mut rack, probes) = delay_rack(vec![
            TimerSpec {
                period_ms: 10,
                mode: TimerMode::Absolute,
            },
            TimerSpec {
                period_ms: 50,
                mode: TimerMode::Absolute,
            },
        ]);

        rack.send("delay", "gate1", Value::Int(1)).unwrap();
        rack.send("delay", "gate2", Value::Int(2)).unwrap();
        rack.advance(10);
        assert_eq!(probes[0].len(), 1);
        assert!(probes[1].is_empty());

        rack.advance(40);
        assert_eq!(probes[1].values(), vec![Value::Int(2)]);
    }
}
