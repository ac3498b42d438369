use serde::{Deserialize, Serialize};

use crate::core::errors::NodeFault;
use crate::core::node::{Node, NodeContext};
use crate::core::ports::{InRef, NodePorts, OutRef, PortDecl};
use crate::core::value::Value;

const IN_GATE: usize = 0;
const IN_START: usize = 1;
const IN_STOP: usize = 2;
const IN_RESET: usize = 3;

const FAM_GATE: usize = 0;

/// What happens when the cursor steps past the last output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndPolicy {
    /// Wrap back to the first output.
    Reset,
    /// Stop running; the cursor stays on the last output.
    Nothing,
    /// Flip direction and walk back.
    Reverse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerOptions {
    /// Number of gate outputs `gate1..gateN`. Zero is legal and makes every
    /// gate a no-op.
    pub outputs: u32,
    pub on_end: EndPolicy,
    /// Run immediately after startup.
    pub start: bool,
    /// Emit a pulse on the now-active output when reset, even while stopped.
    pub reset_signal: bool,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        Self {
            outputs: 16,
            on_end: EndPolicy::Reset,
            start: true,
            reset_signal: true,
        }
    }
}

/// Cyclic pointer over N gate outputs.
///
/// Each gate advances the cursor and pulses the newly active output; the
/// emitted slot is a pure function of the post-transition cursor. Direction
/// reversal bounces between the ends without pulsing the same end slot
/// twice in a row.
pub struct Sequencer {
    options: SequencerOptions,
    index: u32,
    running: bool,
    reverse: bool,
}

impl Sequencer {
    pub fn new(options: SequencerOptions) -> Self {
        Self {
            options,
            index: 1,
            running: false,
            reverse: false,
        }
    }

    fn advance(&mut self) {
        let outputs = self.options.outputs;
        if self.reverse {
            if self.index == 1 {
                // Turn around at the bottom and step to slot 2 when there is one
                self.reverse = false;
                self.index = if outputs > 1 { 2 } else { 1 };
            } else {
                self.index -= 1;
            }
        } else if self.index == outputs {
            match self.options.on_end {
                EndPolicy::Reset => self.index = 1,
                EndPolicy::Nothing => self.running = false,
                EndPolicy::Reverse => {
                    self.reverse = true;
                    if outputs > 1 {
                        self.index -= 1;
                    }
                }
            }
        } else {
            self.index += 1;
        }
    }

    fn out_gate(&self, data: Value, ctx: &mut NodeContext<'_>) {
        ctx.push(OutRef::new(FAM_GATE, self.index), data);
    }
}

impl Node for Sequencer {
    fn ports(&self) -> NodePorts {
        NodePorts::new(
            vec![
                PortDecl::single("gate"),
                PortDecl::single("start"),
                PortDecl::single("stop"),
                PortDecl::single("reset"),
            ],
            vec![PortDecl::dynamic("gate{}", self.options.outputs)],
        )
    }

    fn startup(&mut self, _ctx: &mut NodeContext<'_>) -> Result<(), NodeFault> {
        self.running = self.options.start;
        Ok(())
    }

    fn on_event(
        &mut self,
        input: InRef,
        data: Value,
        ctx: &mut NodeContext<'_>,
    ) -> Result<(), NodeFault> {
        match input.family {
            IN_GATE => {
                if self.running && self.options.outputs > 0 {
                    self.advance();
                    self.out_gate(data.gate_or_default(), ctx);
                }
            }
            IN_START => self.running = true,
            IN_STOP => self.running = false,
            IN_RESET => {
                self.index = 1;
                self.reverse = false;
                if self.options.reset_signal && self.options.outputs > 0 {
                    self.out_gate(Value::Int(1), ctx);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn snapshot(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("index", Value::Int(self.index as i64)),
            ("running", Value::Bool(self.running)),
            ("reverse", Value::Bool(self.reverse)),
        ]
    }
}
