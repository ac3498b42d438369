use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::errors::{ConfigError, NodeFault};
use crate::core::node::{Node, NodeContext};
use crate::core::ports::{InRef, NodePorts, OutRef, PortDecl};
use crate::core::value::Value;

const IN_MIX: usize = 0;
const IN_FX_MIX: usize = 1;
const IN_FX_CHANNEL: usize = 2;
const IN_FX_GATE: usize = 3;

const OUT_MIXED: OutRef = OutRef::new(0, 1);
const OUT_CHANNEL: OutRef = OutRef::new(1, 1);
const OUT_GATE: OutRef = OutRef::new(2, 1);
const FAM_FX_MIX: usize = 3;
const FAM_FX_CHANNEL: usize = 4;
const FAM_FX_GATE: usize = 5;

/// Route table entry as configured: one destination name or several.
/// Destinations are `"main"` or `"fx<k>"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteSpec {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerOptions {
    /// Number of plain inputs `mix1..mixN`.
    pub inputs: u32,
    /// Number of FX input groups `fx<k>.mix` / `fx<k>.channel` / `fx<k>.gate`.
    pub inputs_fx: u32,
    /// Number of FX output groups.
    pub outputs_fx: u32,
    /// Routing of plain inputs, keyed by 1-based input slot. An absent slot
    /// routes to `main`.
    pub routes: HashMap<u32, RouteSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteTarget {
    Main,
    Fx(u32),
}

/// Signal router with configurable fan-out and an FX loop.
///
/// Plain inputs are forwarded per the route table to the main outputs, to
/// FX output groups, or to several destinations at once. Each FX input
/// group latches its own unit and channel and re-enters the main outputs on
/// its gate, closing the loop back into the mix.
pub struct Mixer {
    options: MixerOptions,
    /// Compiled route table, indexed by input slot - 1.
    routes: Vec<Option<Vec<RouteTarget>>>,
    fx_units: Vec<Value>,
    fx_channels: Vec<Value>,
}

impl Mixer {
    pub fn new(options: MixerOptions) -> Result<Self, ConfigError> {
        let routes = Self::compile_routes(&options)?;
        let fx_units = vec![Value::Nil; options.inputs_fx as usize];
        let fx_channels = vec![Value::Nil; options.inputs_fx as usize];
        Ok(Self {
            options,
            routes,
            fx_units,
            fx_channels,
        })
    }

    /// Validate the route table and flatten it to slot-indexed target
    /// lists. Every violation is fatal.
    fn compile_routes(
        options: &MixerOptions,
    ) -> Result<Vec<Option<Vec<RouteTarget>>>, ConfigError> {
        let mut compiled = vec![None; options.inputs as usize];
        for (&slot, spec) in &options.routes {
            if slot < 1 || slot > options.inputs {
                return Err(ConfigError::InvalidRoute(format!(
                    "route key {} outside input range 1..={}",
                    slot, options.inputs
                )));
            }
            let names: Vec<&String> = match spec {
                RouteSpec::One(name) => vec![name],
                RouteSpec::Many(names) => names.iter().collect(),
            };
            let mut targets = Vec::with_capacity(names.len());
            for name in names {
                targets.push(Self::parse_target(name, slot, options.outputs_fx)?);
            }
            compiled[(slot - 1) as usize] = Some(targets);
        }
        Ok(compiled)
    }

    fn parse_target(name: &str, slot: u32, outputs_fx: u32) -> Result<RouteTarget, ConfigError> {
        if name == "main" {
            return Ok(RouteTarget::Main);
        }
        let digits = name.strip_prefix("fx").unwrap_or("");
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::InvalidRoute(format!(
                "route {} => '{}': destination must be 'main' or 'fx<k>'",
                slot, name
            )));
        }
        let group: u32 = digits.parse().map_err(|_| {
            ConfigError::InvalidRoute(format!("route {} => '{}': bad fx number", slot, name))
        })?;
        if group < 1 || group > outputs_fx {
            return Err(ConfigError::InvalidRoute(format!(
                "route {} => '{}': no such fx output group (outputs_fx = {})",
                slot, name, outputs_fx
            )));
        }
        Ok(RouteTarget::Fx(group))
    }

    fn out_main(ctx: &mut NodeContext<'_>, channel: Value, unit: Value, gate: Value) {
        ctx.push(OUT_MIXED, unit);
        ctx.push(OUT_CHANNEL, channel);
        ctx.push(OUT_GATE, gate);
    }

    fn out_fx(ctx: &mut NodeContext<'_>, group: u32, slot: u32, unit: Value, gate: Value) {
        ctx.push(OutRef::new(FAM_FX_MIX, group), unit);
        ctx.push(OutRef::new(FAM_FX_CHANNEL, group), Value::Int(slot as i64));
        ctx.push(OutRef::new(FAM_FX_GATE, group), gate);
    }
}

impl Node for Mixer {
    fn ports(&self) -> NodePorts {
        NodePorts::new(
            vec![
                PortDecl::dynamic("mix{}", self.options.inputs),
                PortDecl::dynamic("fx{}.mix", self.options.inputs_fx),
                PortDecl::dynamic("fx{}.channel", self.options.inputs_fx),
                PortDecl::dynamic("fx{}.gate", self.options.inputs_fx),
            ],
            vec![
                PortDecl::single("mixed"),
                PortDecl::single("channel"),
                PortDecl::single("gate"),
                PortDecl::dynamic("fx{}.mix", self.options.outputs_fx),
                PortDecl::dynamic("fx{}.channel", self.options.outputs_fx),
                PortDecl::dynamic("fx{}.gate", self.options.outputs_fx),
            ],
        )
    }

    fn on_event(
        &mut self,
        input: InRef,
        data: Value,
        ctx: &mut NodeContext<'_>,
    ) -> Result<(), NodeFault> {
        let slot = input.slot;
        match input.family {
            IN_MIX => {
                let channel = Value::Int(slot as i64);
                match &self.routes[(slot - 1) as usize] {
                    None => Self::out_main(ctx, channel, data, Value::Int(1)),
                    Some(targets) => {
                        for target in targets {
                            match target {
                                RouteTarget::Main => Self::out_main(
                                    ctx,
                                    channel.clone(),
                                    data.clone(),
                                    Value::Int(1),
                                ),
                                RouteTarget::Fx(group) => Self::out_fx(
                                    ctx,
                                    *group,
                                    slot,
                                    data.clone(),
                                    Value::Int(1),
                                ),
                            }
                        }
                    }
                }
            }
            IN_FX_MIX => self.fx_units[(slot - 1) as usize] = data,
            IN_FX_CHANNEL => self.fx_channels[(slot - 1) as usize] = data,
            IN_FX_GATE => {
                let unit = self.fx_units[(slot - 1) as usize].clone();
                let channel = self.fx_channels[(slot - 1) as usize].clone();
                Self::out_main(ctx, channel, unit, data.gate_or_default());
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rack::Rack;

    fn route_one(slot: u32, dest: &str) -> (u32, RouteSpec) {
        (slot, RouteSpec::One(dest.to_string()))
    }

    #[test]
    fn test_unrouted_input_goes_to_main() {
        let mut rack = Rack::new();
        let mixer = Mixer::new(MixerOptions {
            inputs: 2,
            ..Default::default()
        })
        .unwrap();
        rack.add("mixer", Box::new(mixer)).unwrap();
        let mixed = rack.probe("mixer", "mixed").unwrap();
        let channel = rack.probe("mixer", "channel").unwrap();
        let gate = rack.probe("mixer", "gate").unwrap();
        rack.start();

        rack.send("mixer", "mix2", Value::Float(0.5)).unwrap();
        rack.run();

        assert_eq!(mixed.values(), vec![Value::Float(0.5)]);
        assert_eq!(channel.values(), vec![Value::Int(2)]);
        assert_eq!(gate.values(), vec![Value::Int(1)]);
    }

    #[test]
    fn test_string_route_to_fx_group() {
        let mut rack = Rack::new();
        let mixer = Mixer::new(MixerOptions {
            inputs: 2,
            outputs_fx: 2,
            routes: [route_one(1, "fx2")].into_iter().collect(),
            ..Default::default()
        })
        .unwrap();
        rack.add("mixer", Box::new(mixer)).unwrap();
        let main = rack.probe("mixer", "mixed").unwrap();
        let fx_mix = rack.probe("mixer", "fx2.mix").unwrap();
        let fx_channel = rack.probe("mixer", "fx2.channel").unwrap();
        rack.start();

        rack.send("mixer", "mix1", Value::Int(11)).unwrap();
        rack.run();

        assert!(main.is_empty());
        assert_eq!(fx_mix.values(), vec![Value::Int(11)]);
        assert_eq!(fx_channel.values(), vec![Value::Int(1)]);
    }

    #[test]
    fn test_array_route_fans_out() {
        let mut rack = Rack::new();
        let mixer = Mixer::new(MixerOptions {
            inputs: 1,
            outputs_fx: 1,
            routes: [(
                1,
                RouteSpec::Many(vec!["main".to_string(), "fx1".to_string()]),
            )]
            .into_iter()
            .collect(),
            ..Default::default()
        })
        .unwrap();
        rack.add("mixer", Box::new(mixer)).unwrap();
        let main = rack.probe("mixer", "mixed").unwrap();
        let fx_mix = rack.probe("mixer", "fx1.mix").unwrap();
        rack.start();

        rack.send("mixer", "mix1", Value::Int(3)).unwrap();
        rack.run();

        assert_eq!(main.values(), vec![Value::Int(3)]);
        assert_eq!(fx_mix.values(), vec![Value::Int(3)]);
    }

    #[test]
    fn test_fx_return_closes_the_loop() {
        let mut rack = Rack::new();
        let mixer = Mixer::new(MixerOptions {
            inputs: 0,
            inputs_fx: 1,
            ..Default::default()
        })
        .unwrap();
        rack.add("mixer", Box::new(mixer)).unwrap();
        let mixed = rack.probe("mixer", "mixed").unwrap();
        let channel = rack.probe("mixer", "channel").unwrap();
        let gate = rack.probe("mixer", "gate").unwrap();
        rack.start();

        rack.send("mixer", "fx1.mix", Value::Float(0.7)).unwrap();
        rack.send("mixer", "fx1.channel", Value::Int(4)).unwrap();
        rack.send("mixer", "fx1.gate", Value::Nil).unwrap();
        rack.run();

        assert_eq!(mixed.values(), vec![Value::Float(0.7)]);
        assert_eq!(channel.values(), vec![Value::Int(4)]);
        assert_eq!(gate.values(), vec![Value::Int(1)]);
    }

    #[test]
    fn test_route_to_missing_fx_group_is_fatal() {
        let result = Mixer::new(MixerOptions {
            inputs: 4,
            outputs_fx: 3,
            routes: [route_one(2, "fx99")].into_iter().collect(),
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_route_key_outside_input_range_is_fatal() {
        let result = Mixer::new(MixerOptions {
            inputs: 2,
            routes: [route_one(5, "main")].into_iter().collect(),
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_destination_is_fatal() {
        for bad in ["fx", "aux1", "fxtwo", ""] {
            let result = Mixer::new(MixerOptions {
                inputs: 1,
                outputs_fx: 1,
                routes: [route_one(1, bad)].into_iter().collect(),
                ..Default::default()
            });
            assert!(result.is_err(), "destination '{}' should be rejected", bad);
        }
    }
}
