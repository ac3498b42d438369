use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::core::errors::{ConfigError, NodeFault};
use crate::core::node::{Node, NodeContext};
use crate::core::ports::{InRef, NodePorts, OutRef, PortDecl};
use crate::core::value::{ChannelKey, Value};

const IN_UNIT: usize = 0;
const IN_CHANNEL: usize = 1;
const IN_GATE: usize = 2;

const OUT_MAX: OutRef = OutRef::new(0, 1);
const OUT_MIN: OutRef = OutRef::new(1, 1);
const OUT_AVG: OutRef = OutRef::new(2, 1);
const OUT_CHANNEL: OutRef = OutRef::new(3, 1);
const OUT_GATE: OutRef = OutRef::new(4, 1);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateOptions {
    /// Number of samples a channel accumulates before statistics are
    /// computed.
    pub samples: u32,
    /// When true the buffer is a sliding window: the oldest sample is
    /// dropped once the window is full, and statistics are recomputed on
    /// every gate at capacity. When false the buffer is flushed and reset
    /// after each computation.
    pub cyclic: bool,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            samples: 32,
            cyclic: false,
        }
    }
}

#[derive(Debug, Default)]
struct ChannelBuffer {
    samples: VecDeque<f64>,
    count: u32,
}

/// Per-channel windowed statistics over latched unit values.
///
/// Each gate appends the latched unit to the current channel's buffer; when
/// the configured sample count is reached, max/min/avg are emitted. Each
/// statistic is computed only if its output is connected.
pub struct Aggregate {
    options: AggregateOptions,
    channels: HashMap<ChannelKey, ChannelBuffer>,
    unit: f64,
    channel: ChannelKey,
    auto_gate: bool,
}

impl Aggregate {
    pub fn new(options: AggregateOptions) -> Result<Self, ConfigError> {
        if options.samples < 1 {
            return Err(ConfigError::OutOfBounds("samples must be >= 1".into()));
        }
        Ok(Self {
            options,
            channels: HashMap::new(),
            unit: 0.0,
            channel: ChannelKey::Num(1),
            auto_gate: false,
        })
    }

    fn on_gate(&mut self, gate: Value, ctx: &mut NodeContext<'_>) {
        let window = self.options.samples as usize;
        let buffer = self.channels.entry(self.channel.clone()).or_default();

        if self.options.cyclic {
            buffer.samples.push_back(self.unit);
            if buffer.samples.len() > window {
                buffer.samples.pop_front();
            }
            if buffer.samples.len() == window {
                Self::send_results(&self.channel, &buffer.samples, gate, ctx);
            }
        } else {
            buffer.count += 1;
            buffer.samples.push_back(self.unit);
            if buffer.count >= self.options.samples {
                Self::send_results(&self.channel, &buffer.samples, gate, ctx);
                buffer.samples.clear();
                buffer.count = 0;
            }
        }
    }

    fn send_results(
        channel: &ChannelKey,
        samples: &VecDeque<f64>,
        gate: Value,
        ctx: &mut NodeContext<'_>,
    ) {
        if samples.is_empty() {
            return;
        }

        if ctx.connected(OUT_MAX) {
            let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            ctx.push(OUT_MAX, Value::Float(max));
        }
        if ctx.connected(OUT_MIN) {
            let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
            ctx.push(OUT_MIN, Value::Float(min));
        }
        if ctx.connected(OUT_AVG) {
            let avg = samples.iter().sum::<f64>() / samples.len() as f64;
            ctx.push(OUT_AVG, Value::Float(avg));
        }

        ctx.push(OUT_CHANNEL, channel.to_value());
        ctx.push(OUT_GATE, gate);
    }
}

impl Node for Aggregate {
    fn ports(&self) -> NodePorts {
        NodePorts::new(
            vec![
                PortDecl::single("unit"),
                PortDecl::single("channel"),
                PortDecl::single("gate"),
            ],
            vec![
                PortDecl::single("max"),
                PortDecl::single("min"),
                PortDecl::single("avg"),
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
                self.unit = data.as_f64().unwrap_or(f64::NAN);
                if self.auto_gate {
                    self.on_gate(Value::Int(1), ctx);
                }
            }
            IN_CHANNEL => {
                if let Some(key) = data.channel_key() {
                    self.channel = key;
                }
            }
            IN_GATE => self.on_gate(data.gate_or_default(), ctx),
            _ => {}
        }
        Ok(())
    }

    fn snapshot(&self) -> Vec<(&'static str, Value)> {
        let occupancy: Vec<Value> = self
            .channels
            .iter()
            .map(|(key, buffer)| {
                Value::List(vec![key.to_value(), Value::Int(buffer.samples.len() as i64)])
            })
            .collect();
        vec![("channels", Value::List(occupancy))]
    }
}
