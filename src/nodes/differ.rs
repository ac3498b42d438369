use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::core::errors::NodeFault;
use crate::core::node::{Node, NodeContext};
use crate::core::ports::{InRef, NodePorts, OutRef, PortDecl};
use crate::core::value::{ChannelKey, Value};

const IN_UNIT: usize = 0;
const IN_CHANNEL: usize = 1;
const IN_GATE: usize = 2;

const OUT_UNIT: OutRef = OutRef::new(0, 1);
const OUT_CHANNEL: OutRef = OutRef::new(1, 1);
const OUT_GATE: OutRef = OutRef::new(2, 1);

/// Per-channel change detector.
///
/// Holds the last observed unit value per channel and emits only on a value
/// transition. A previously unseen channel is seeded with the current
/// latched value on its first gate, which therefore never emits; emission
/// starts with the first differing observation after that.
pub struct Differ {
    seen: HashMap<ChannelKey, Value>,
    unit: Value,
    channel: ChannelKey,
    auto_gate: bool,
}

impl Differ {
    pub fn new() -> Self {
        Self {
            seen: HashMap::new(),
            unit: Value::Int(0),
            channel: ChannelKey::Num(1),
            auto_gate: false,
        }
    }

    fn check(&mut self, gate: Value, ctx: &mut NodeContext<'_>) {
        match self.seen.entry(self.channel.clone()) {
            Entry::Vacant(entry) => {
                // Seeding with the just-received value swallows the first
                // observation for the channel
                entry.insert(self.unit.clone());
                return;
            }
            Entry::Occupied(mut entry) => {
                if *entry.get() == self.unit {
                    return;
                }
                entry.insert(self.unit.clone());
            }
        }

        ctx.push(OUT_UNIT, self.unit.clone());
        ctx.push(OUT_CHANNEL, self.channel.to_value());
        ctx.push(OUT_GATE, gate);
    }
}

impl Default for Differ {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for Differ {
    fn ports(&self) -> NodePorts {
        NodePorts::new(
            vec![
                PortDecl::single("unit"),
                PortDecl::single("channel"),
                PortDecl::single("gate"),
            ],
            vec![
                PortDecl::single("unit"),
                PortDecl::single("channel"),
                PortDecl::single("gate"),
            ],
        )
    }

    fn startup(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeFault> {
        self.auto_gate = !ctx.connected(OUT_GATE);
        Ok(())
    }

    fn on_event(
        &mut self,
        input: InRef,
        data: Value,
        ctx: &mut NodeContext<'_>,
    ) -> Result<(), NodeFault> {
        match input.family {
            IN_UNIT => {
                self.unit = data;
                if self.auto_gate {
                    self.check(Value::Int(1), ctx);
                }
            }
            IN_CHANNEL => {
                if let Some(key) = data.channel_key() {
                    self.channel = key;
                }
            }
            IN_GATE => self.check(data.gate_or_default(), ctx),
            _ => {}
        }
        Ok(())
    }

    fn snapshot(&self) -> Vec<(&'static str, Value)> {
        vec![("tracked_channels", Value::Int(self.seen.len() as i64))]
    }
}
