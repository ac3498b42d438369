use serde::{Deserialize, Serialize};

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

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelFilterOptions {
    /// Channels allowed through. Empty means no allow-list filtering.
    pub include: Vec<ChannelKey>,
    /// Channels blocked. Empty means no deny-list filtering.
    pub except: Vec<ChannelKey>,
}

/// Admission filter on the latched channel.
///
/// A gate is rejected when the allow-list is non-empty and the channel is
/// absent from it, or when the channel appears in the deny-list; otherwise
/// the latched unit, channel, and gate pass through unchanged.
pub struct ChannelFilter {
    options: ChannelFilterOptions,
    unit: Value,
    channel: ChannelKey,
}

impl ChannelFilter {
    pub fn new(options: ChannelFilterOptions) -> Self {
        Self {
            options,
            unit: Value::Int(0),
            channel: ChannelKey::Num(1),
        }
    }

    fn admitted(&self) -> bool {
        let include = &self.options.include;
        let except = &self.options.except;
        if !include.is_empty() && !include.contains(&self.channel) {
            return false;
        }
        !except.contains(&self.channel)
    }
}

impl Node for ChannelFilter {
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

    fn on_event(
        &mut self,
        input: InRef,
        data: Value,
        ctx: &mut NodeContext<'_>,
    ) -> Result<(), NodeFault> {
        match input.family {
            IN_UNIT => self.unit = data,
            IN_CHANNEL => {
                if let Some(key) = data.channel_key() {
                    self.channel = key;
                }
            }
            IN_GATE => {
                if self.admitted() {
                    ctx.push(OUT_UNIT, self.unit.clone());
                    ctx.push(OUT_CHANNEL, self.channel.to_value());
                    ctx.push(OUT_GATE, data.gate_or_default());
                }
            }
            _ => {}
        }
        Ok(())
    }
}
