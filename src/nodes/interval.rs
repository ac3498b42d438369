use serde::{Deserialize, Serialize};

use crate::core::errors::{ConfigError, NodeFault};
use crate::core::node::{Node, NodeContext};
use crate::core::ports::{InRef, NodePorts, OutRef, PortDecl};
use crate::core::value::Value;

const IN_START: usize = 0;
const IN_STOP: usize = 1;

const OUT_GATE: OutRef = OutRef::new(0, 1);

const TIMER: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalOptions {
    /// Milliseconds between pulses.
    pub period_ms: u64,
    /// Begin emitting immediately after startup.
    pub auto_start: bool,
}

impl Default for IntervalOptions {
    fn default() -> Self {
        Self {
            period_ms: 1000,
            auto_start: true,
        }
    }
}

/// Fixed-rate pulse source.
///
/// Emits `1` on `gate` once per period while running. `start` while already
/// running and `stop` while stopped are no-ops.
pub struct Interval {
    options: IntervalOptions,
}

impl Interval {
    pub fn new(options: IntervalOptions) -> Result<Self, ConfigError> {
        if options.period_ms < 1 {
            return Err(ConfigError::OutOfBounds("period_ms must be >= 1".into()));
        }
        Ok(Self { options })
    }

    fn start(&self, ctx: &mut NodeContext<'_>) {
        if !ctx.timer_armed(TIMER) {
            ctx.arm_timer(TIMER, self.options.period_ms);
        }
    }
}

impl Node for Interval {
    fn ports(&self) -> NodePorts {
        NodePorts::new(
            vec![PortDecl::single("start"), PortDecl::single("stop")],
            vec![PortDecl::single("gate")],
        )
    }

    fn startup(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeFault> {
        if self.options.auto_start {
            self.start(ctx);
        }
        Ok(())
    }

    fn on_event(
        &mut self,
        input: InRef,
        _data: Value,
        ctx: &mut NodeContext<'_>,
    ) -> Result<(), NodeFault> {
        match input.family {
            IN_START => self.start(ctx),
            IN_STOP => {
                if ctx.timer_armed(TIMER) {
                    ctx.cancel_timer(TIMER);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn on_timer(&mut self, _slot: u32, ctx: &mut NodeContext<'_>) -> Result<(), NodeFault> {
        ctx.push(OUT_GATE, Value::Int(1));
        ctx.arm_timer(TIMER, self.options.period_ms);
        Ok(())
    }
}
