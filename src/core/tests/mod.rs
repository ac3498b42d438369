use crate::core::errors::{NodeFault, RackError};
use crate::core::node::{Node, NodeContext};
use crate::core::ports::{InRef, NodePorts, OutRef, PortDecl};
use crate::core::rack::Rack;
use crate::core::value::Value;

const OUT: OutRef = OutRef::new(0, 1);

/// Forwards every input to its single output.
struct Echo;

impl Node for Echo {
    fn ports(&self) -> NodePorts {
        NodePorts::new(vec![PortDecl::single("in")], vec![PortDecl::single("out")])
    }

    fn on_event(
        &mut self,
        _input: InRef,
        data: Value,
        ctx: &mut NodeContext<'_>,
    ) -> Result<(), NodeFault> {
        ctx.push(OUT, data);
        Ok(())
    }
}

/// Counts deliveries; faults when told to.
struct Counter {
    seen: i64,
}

impl Node for Counter {
    fn ports(&self) -> NodePorts {
        NodePorts::new(
            vec![PortDecl::single("in"), PortDecl::single("boom")],
            vec![],
        )
    }

    fn on_event(
        &mut self,
        input: InRef,
        _data: Value,
        _ctx: &mut NodeContext<'_>,
    ) -> Result<(), NodeFault> {
        if input.family == 1 {
            return Err(NodeFault::BadData("told to fail".into()));
        }
        self.seen += 1;
        Ok(())
    }

    fn snapshot(&self) -> Vec<(&'static str, Value)> {
        vec![("seen", Value::Int(self.seen))]
    }
}

/// Arms a one-shot timer on "arm", cancels it on "cancel".
struct OneShot {
    delay_ms: u64,
}

impl Node for OneShot {
    fn ports(&self) -> NodePorts {
        NodePorts::new(
            vec![PortDecl::single("arm"), PortDecl::single("cancel")],
            vec![PortDecl::single("fired")],
        )
    }

    fn on_event(
        &mut self,
        input: InRef,
        _data: Value,
        ctx: &mut NodeContext<'_>,
    ) -> Result<(), NodeFault> {
        match input.family {
            0 => {
                if !ctx.timer_armed(1) {
                    ctx.arm_timer(1, self.delay_ms);
                }
            }
            1 => ctx.cancel_timer(1),
            _ => {}
        }
        Ok(())
    }

    fn on_timer(&mut self, _slot: u32, ctx: &mut NodeContext<'_>) -> Result<(), NodeFault> {
        ctx.push(OUT, Value::Int(1));
        Ok(())
    }
}

#[test]
fn test_duplicate_node_id_is_rejected() {
    let mut rack = Rack::new();
    rack.add("a", Box::new(Echo)).unwrap();
    let result = rack.add("a", Box::new(Echo));
    assert!(matches!(result, Err(RackError::DuplicateNode(_))));
}

#[test]
fn test_unknown_ports_are_rejected_at_wiring() {
    let mut rack = Rack::new();
    rack.add("a", Box::new(Echo)).unwrap();
    rack.add("b", Box::new(Echo)).unwrap();

    assert!(matches!(
        rack.connect(("a", "nope"), ("b", "in")),
        Err(RackError::PortNotFound(_))
    ));
    assert!(matches!(
        rack.connect(("a", "out"), ("b", "nope")),
        Err(RackError::PortNotFound(_))
    ));
    assert!(matches!(
        rack.connect(("missing", "out"), ("b", "in")),
        Err(RackError::NodeNotFound(_))
    ));
}

#[test]
fn test_events_chain_through_connections_in_order() {
    let mut rack = Rack::new();
    rack.add("first", Box::new(Echo)).unwrap();
    rack.add("second", Box::new(Echo)).unwrap();
    rack.connect(("first", "out"), ("second", "in")).unwrap();
    let out = rack.probe("second", "out").unwrap();
    rack.start();

    rack.send("first", "in", Value::Int(1)).unwrap();
    rack.send("first", "in", Value::Int(2)).unwrap();
    rack.run();

    assert_eq!(out.values(), vec![Value::Int(1), Value::Int(2)]);
}

#[test]
fn test_disconnected_output_is_a_cheap_no_op() {
    let mut rack = Rack::new();
    rack.add("only", Box::new(Echo)).unwrap();
    rack.start();

    // Nothing consumes "out"; the emission is silently dropped
    rack.send("only", "in", Value::Int(5)).unwrap();
    rack.run();

    let tap = rack.probe("only", "out").unwrap();
    rack.send("only", "in", Value::Int(6)).unwrap();
    rack.run();
    assert_eq!(tap.values(), vec![Value::Int(6)]);
}

#[test]
fn test_fan_out_reaches_every_consumer() {
    let mut rack = Rack::new();
    rack.add("src", Box::new(Echo)).unwrap();
    rack.add("a", Box::new(Counter { seen: 0 })).unwrap();
    rack.add("b", Box::new(Counter { seen: 0 })).unwrap();
    rack.connect(("src", "out"), ("a", "in")).unwrap();
    rack.connect(("src", "out"), ("b", "in")).unwrap();
    rack.start();

    rack.send("src", "in", Value::Nil).unwrap();
    rack.run();

    assert_eq!(rack.snapshot("a").unwrap(), vec![("seen", Value::Int(1))]);
    assert_eq!(rack.snapshot("b").unwrap(), vec![("seen", Value::Int(1))]);
}

#[test]
fn test_cancelled_timer_never_fires() {
    let mut rack = Rack::new();
    rack.add("shot", Box::new(OneShot { delay_ms: 10 })).unwrap();
    let fired = rack.probe("shot", "fired").unwrap();
    rack.start();

    rack.send("shot", "arm", Value::Nil).unwrap();
    rack.run();
    rack.send("shot", "cancel", Value::Nil).unwrap();
    rack.run();
    rack.advance(100);
    assert!(fired.is_empty());

    // Re-arming after a cancel works normally
    rack.send("shot", "arm", Value::Nil).unwrap();
    rack.advance(10);
    assert_eq!(fired.len(), 1);
}

#[test]
fn test_rearm_supersedes_the_pending_deadline() {
    let mut rack = Rack::new();
    rack.add("shot", Box::new(OneShot { delay_ms: 10 })).unwrap();
    let fired = rack.probe("shot", "fired").unwrap();
    rack.start();

    rack.send("shot", "arm", Value::Nil).unwrap();
    rack.run();
    rack.advance(5);
    // Cancel and arm again: the clock restarts from now
    rack.send("shot", "cancel", Value::Nil).unwrap();
    rack.send("shot", "arm", Value::Nil).unwrap();
    rack.run();
    rack.advance(9);
    assert!(fired.is_empty());
    rack.advance(1);
    assert_eq!(fired.len(), 1);
}

#[test]
fn test_faulted_node_halts_alone() {
    let mut rack = Rack::new();
    rack.add("fragile", Box::new(Counter { seen: 0 })).unwrap();
    rack.add("steady", Box::new(Counter { seen: 0 })).unwrap();
    rack.start();

    rack.send("fragile", "in", Value::Nil).unwrap();
    rack.send("fragile", "boom", Value::Nil).unwrap();
    rack.send("fragile", "in", Value::Nil).unwrap();
    rack.send("steady", "in", Value::Nil).unwrap();
    rack.run();

    assert!(rack.failed("fragile").unwrap());
    assert!(!rack.failed("steady").unwrap());
    // The delivery after the fault was dropped
    assert_eq!(
        rack.snapshot("fragile").unwrap(),
        vec![("seen", Value::Int(1))]
    );
    assert_eq!(
        rack.snapshot("steady").unwrap(),
        vec![("seen", Value::Int(1))]
    );
}

#[test]
fn test_clock_advances_to_the_target() {
    let mut rack = Rack::new();
    rack.add("shot", Box::new(OneShot { delay_ms: 25 })).unwrap();
    rack.start();
    assert_eq!(rack.clock(), 0);
    rack.advance(40);
    assert_eq!(rack.clock(), 40);
}
