use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::errors::NodeFault;
use crate::core::node::{Node, NodeContext};
use crate::core::ports::{InRef, NodePorts, OutRef, PortDecl};
use crate::core::value::{ChannelKey, Value};

const IN_INDEX: usize = 0;
const IN_GATE: usize = 1;

const OUT_VALUE: OutRef = OutRef::new(0, 1);
const OUT_GATE: OutRef = OutRef::new(1, 1);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupOptions {
    /// Dictionary mapping index keys to emitted values.
    pub table: HashMap<ChannelKey, Value>,
}

/// Dictionary translation of a latched index.
///
/// On gate, emits the configured value for the latched index, or `Nil` when
/// the table has no entry. The lookup never fabricates a value.
pub struct Lookup {
    options: LookupOptions,
    index: ChannelKey,
    auto_gate: bool,
}

impl Lookup {
    pub fn new(options: LookupOptions) -> Self {
        Self {
            options,
            index: ChannelKey::Num(0),
            auto_gate: false,
        }
    }

    fn translate(&mut self, gate: Value, ctx: &mut NodeContext<'_>) {
        let found = self
            .options
            .table
            .get(&self.index)
            .cloned()
            .unwrap_or(Value::Nil);
        ctx.push(OUT_VALUE, found);
        ctx.push(OUT_GATE, gate);
    }
}

impl Node for Lookup {
    fn ports(&self) -> NodePorts {
        NodePorts::new(
            vec![PortDecl::single("index"), PortDecl::single("gate")],
            vec![PortDecl::single("value"), PortDecl::single("gate")],
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
            IN_INDEX => {
                if let Some(key) = data.channel_key() {
                    self.index = key;
                }
                if self.auto_gate {
                    self.translate(Value::Int(1), ctx);
                }
            }
            IN_GATE => self.translate(data.gate_or_default(), ctx),
            _ => {}
        }
        Ok(())
    }
}
