use log::warn;
use serde::{Deserialize, Serialize};

use crate::core::errors::{ConfigError, NodeFault};
use crate::core::node::{Node, NodeContext};
use crate::core::ports::{InRef, NodePorts, OutRef, PortDecl};
use crate::core::value::Value;

const IN_MIXED: usize = 0;
const IN_CHANNEL: usize = 1;
const IN_GATE: usize = 2;

const FAM_MIX: usize = 0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnmixerOptions {
    /// Number of output channels `mix1..mixN`.
    pub outputs: u32,
}

impl Default for UnmixerOptions {
    fn default() -> Self {
        Self { outputs: 8 }
    }
}

/// Demultiplexer for a combined signal.
///
/// Latches the most recent mixed value and channel independently; on gate,
/// forwards the value to the single output slot matching the channel and
/// clears both latches. A gate with an incomplete latch pair does nothing;
/// an out-of-range channel is reported and the forward is dropped.
pub struct Unmixer {
    options: UnmixerOptions,
    last_mixed: Option<Value>,
    last_channel: Option<Value>,
}

impl Unmixer {
    pub fn new(options: UnmixerOptions) -> Result<Self, ConfigError> {
        if options.outputs < 1 || options.outputs > 64 {
            return Err(ConfigError::OutOfBounds(
                "outputs must be within 1..=64".into(),
            ));
        }
        Ok(Self {
            options,
            last_mixed: None,
            last_channel: None,
        })
    }

    fn unmix(&mut self, ctx: &mut NodeContext<'_>) {
        let (mixed, channel) = match (&self.last_mixed, &self.last_channel) {
            (Some(mixed), Some(channel)) => (mixed.clone(), channel),
            _ => return,
        };

        let slot = match channel.as_i64() {
            Some(n) if n >= 1 && n <= self.options.outputs as i64 => n as u32,
            _ => {
                warn!(
                    "channel {:?} outside range 1..={}, value dropped",
                    channel, self.options.outputs
                );
                return;
            }
        };

        ctx.push(OutRef::new(FAM_MIX, slot), mixed);
        self.last_mixed = None;
        self.last_channel = None;
    }
}

impl Node for Unmixer {
    fn ports(&self) -> NodePorts {
        NodePorts::new(
            vec![
                PortDecl::single("mixed"),
                PortDecl::single("channel"),
                PortDecl::single("gate"),
            ],
            vec![PortDecl::dynamic("mix{}", self.options.outputs)],
        )
    }

    fn on_event(
        &mut self,
        input: InRef,
        data: Value,
        ctx: &mut NodeContext<'_>,
    ) -> Result<(), NodeFault> {
        match input.family {
            IN_MIXED => self.last_mixed = Some(data),
            IN_CHANNEL => self.last_channel = Some(data),
            IN_GATE => self.unmix(ctx),
            _ => {}
        }
        Ok(())
    }
}
