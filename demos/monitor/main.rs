//! Monitoring rack demo: three simulated sensors mixed into a per-channel
//! aggregator, with drift detection and metric-name translation downstream,
//! plus a heartbeat built from a clock and a relative timer slot.
//!
//! Run with `RUST_LOG=debug` to watch the rack's internal logging.

use std::collections::HashMap;
use std::error::Error;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use patchbay::nodes::{
    Aggregate, AggregateOptions, Delay, DelayOptions, Differ, Interval, IntervalOptions, Lookup,
    LookupOptions, Mixer, MixerOptions, TimerMode, TimerSpec,
};
use patchbay::{ChannelKey, Rack, Value};

const SENSORS: u32 = 3;
const ROUNDS: u32 = 32;
const SAMPLE_PERIOD_MS: u64 = 250;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut rack = Rack::new();

    rack.add(
        "mixer",
        Box::new(Mixer::new(MixerOptions {
            inputs: SENSORS,
            ..Default::default()
        })?),
    )?;
    rack.add(
        "stats",
        Box::new(Aggregate::new(AggregateOptions {
            samples: 8,
            cyclic: false,
        })?),
    )?;
    rack.add("drift", Box::new(Differ::new()))?;

    let mut table = HashMap::new();
    table.insert(ChannelKey::Num(1), Value::Str("/sensor/intake/temp".into()));
    table.insert(ChannelKey::Num(2), Value::Str("/sensor/exhaust/temp".into()));
    table.insert(ChannelKey::Num(3), Value::Str("/sensor/coolant/flow".into()));
    rack.add("names", Box::new(Lookup::new(LookupOptions { table })))?;

    rack.add(
        "clock",
        Box::new(Interval::new(IntervalOptions {
            period_ms: SAMPLE_PERIOD_MS,
            auto_start: true,
        })?),
    )?;
    rack.add(
        "heartbeat",
        Box::new(Delay::new(DelayOptions {
            timers: vec![TimerSpec {
                period_ms: 1000,
                mode: TimerMode::Relative,
            }],
        })),
    )?;

    rack.connect(("mixer", "mixed"), ("stats", "unit"))?;
    rack.connect(("mixer", "channel"), ("stats", "channel"))?;
    rack.connect(("mixer", "gate"), ("stats", "gate"))?;
    rack.connect(("stats", "avg"), ("drift", "unit"))?;
    rack.connect(("stats", "channel"), ("drift", "channel"))?;
    rack.connect(("stats", "gate"), ("drift", "gate"))?;
    rack.connect(("drift", "channel"), ("names", "index"))?;
    rack.connect(("clock", "gate"), ("heartbeat", "gate1"))?;

    let max = rack.probe("stats", "max")?;
    let min = rack.probe("stats", "min")?;
    let avg = rack.probe("stats", "avg")?;
    let stat_channel = rack.probe("stats", "channel")?;
    let drifted = rack.probe("drift", "unit")?;
    // Keep the drift gate connected so unit updates wait for their channel
    let _drift_gate = rack.probe("drift", "gate")?;
    let metric = rack.probe("names", "value")?;
    let pulses = rack.probe("heartbeat", "gate1")?;

    rack.start();

    let mut rng = StdRng::seed_from_u64(7);
    let sensors: Vec<Normal<f64>> = (0..SENSORS)
        .map(|n| Normal::new(20.0 + 5.0 * n as f64, 0.8))
        .collect::<Result<_, _>>()?;

    for round in 0..ROUNDS {
        for (idx, sensor) in sensors.iter().enumerate() {
            // Nudge the means upward halfway through so the drift detector
            // has something to report
            let bias = if round >= ROUNDS / 2 { 3.0 } else { 0.0 };
            let sample = sensor.sample(&mut rng) + bias;
            let port = format!("mix{}", idx + 1);
            rack.send("mixer", &port, Value::Float(sample))?;
        }
        rack.advance(SAMPLE_PERIOD_MS);
    }

    println!("rack time: {} ms, heartbeat pulses: {}", rack.clock(), pulses.len());
    println!();
    println!("{:<10} {:>10} {:>10} {:>10}", "channel", "max", "min", "avg");
    let channels = stat_channel.values();
    let maxes = max.values();
    let mins = min.values();
    let avgs = avg.values();
    for i in 0..channels.len() {
        println!(
            "{:<10} {:>10} {:>10} {:>10}",
            render(&channels[i]),
            render(&maxes[i]),
            render(&mins[i]),
            render(&avgs[i]),
        );
    }

    println!();
    let changes = drifted.values();
    let metrics = metric.values();
    println!("drift events: {}", changes.len());
    for (value, path) in changes.iter().zip(metrics.iter()) {
        println!("  {} -> {}", render(path), render(value));
    }

    Ok(())
}

fn render(value: &Value) -> String {
    match value {
        Value::Float(f) => format!("{:.2}", f),
        Value::Int(n) => n.to_string(),
        Value::Str(s) => s.clone(),
        other => format!("{:?}", other),
    }
}
