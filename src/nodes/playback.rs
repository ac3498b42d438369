use serde::{Deserialize, Serialize};

use crate::core::errors::{ConfigError, NodeFault};
use crate::core::node::{Node, NodeContext};
use crate::core::ports::{InRef, NodePorts, OutRef, PortDecl};
use crate::core::value::Value;

const IN_START: usize = 0;
const IN_STOP: usize = 1;
const IN_RESET: usize = 2;

const OUT_UNIT: OutRef = OutRef::new(0, 1);

const TIMER: u32 = 1;

/// What happens when the cursor runs off the end of the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOut {
    /// Wrap to the first step and keep playing.
    Restart,
    /// Stop; the cursor rewinds so a later `start` replays from the top.
    Halt,
}

/// One scripted emission: the value sent on `unit` after its delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub value: Value,
    pub delay_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackOptions {
    pub steps: Vec<Step>,
    pub auto_start: bool,
    pub on_end: RunOut,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            auto_start: true,
            on_end: RunOut::Restart,
        }
    }
}

/// Scripted sequence player.
///
/// While running, schedules the current step's value after its delay, emits
/// it, and advances the cursor. `stop` cancels the pending emission and
/// keeps the cursor; `reset` rewinds and always restarts. A script that
/// cannot be played is a fault: the node halts rather than guessing.
pub struct Playback {
    options: PlaybackOptions,
    cursor: usize,
    running: bool,
}

impl Playback {
    pub fn new(options: PlaybackOptions) -> Result<Self, ConfigError> {
        for (idx, step) in options.steps.iter().enumerate() {
            if step.delay_ms < 0 {
                return Err(ConfigError::InvalidData(format!(
                    "step {} has a negative delay",
                    idx
                )));
            }
        }
        Ok(Self {
            options,
            cursor: 0,
            running: false,
        })
    }

    fn start(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeFault> {
        if self.running {
            return Ok(());
        }
        self.running = true;
        self.schedule(ctx)
    }

    fn stop(&mut self, ctx: &mut NodeContext<'_>) {
        if !self.running {
            return;
        }
        ctx.cancel_timer(TIMER);
        self.running = false;
    }

    fn reset(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeFault> {
        ctx.cancel_timer(TIMER);
        self.cursor = 0;
        self.running = false;
        self.start(ctx)
    }

    fn schedule(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeFault> {
        if !self.running {
            return Ok(());
        }
        match self.options.steps.get(self.cursor) {
            Some(step) => {
                ctx.rearm_timer(TIMER, step.delay_ms as u64);
                Ok(())
            }
            None => Err(NodeFault::BadData(format!(
                "no playable step at index {}",
                self.cursor
            ))),
        }
    }
}

impl Node for Playback {
    fn ports(&self) -> NodePorts {
        NodePorts::new(
            vec![
                PortDecl::single("start"),
                PortDecl::single("stop"),
                PortDecl::single("reset"),
            ],
            vec![PortDecl::single("unit")],
        )
    }

    fn startup(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeFault> {
        if self.options.auto_start {
            self.start(ctx)?;
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
            IN_START => self.start(ctx)?,
            IN_STOP => self.stop(ctx),
            IN_RESET => self.reset(ctx)?,
            _ => {}
        }
        Ok(())
    }

    fn on_timer(&mut self, _slot: u32, ctx: &mut NodeContext<'_>) -> Result<(), NodeFault> {
        if let Some(step) = self.options.steps.get(self.cursor) {
            ctx.push(OUT_UNIT, step.value.clone());
        }
        self.cursor += 1;
        if self.cursor == self.options.steps.len() {
            self.cursor = 0;
            if self.options.on_end == RunOut::Halt {
                self.running = false;
                return Ok(());
            }
        }
        self.schedule(ctx)
    }

    fn snapshot(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("cursor", Value::Int(self.cursor as i64)),
            ("running", Value::Bool(self.running)),
        ]
    }
}
