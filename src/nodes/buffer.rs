use crate::core::errors::NodeFault;
use crate::core::node::{Node, NodeContext};
use crate::core::ports::{InRef, NodePorts, OutRef, PortDecl};
use crate::core::value::Value;

const IN_ENTITY: usize = 0;
const IN_SHIFT: usize = 1;
const IN_SLICE: usize = 2;

const OUT_ENTITIES: OutRef = OutRef::new(0, 1);

/// Shared ordered buffer of arbitrary values.
///
/// `entity` appends, `shift` drops the first *n* elements, `slice` reads the
/// first *n* (clipped to the current length) without removing them and emits
/// the batch as a single list. Non-numeric or non-positive counts are
/// ignored.
#[derive(Default)]
pub struct Buffer {
    buffer: Vec<Value>,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn count_of(data: &Value) -> Option<usize> {
        match data.as_f64() {
            Some(n) if n > 0.0 => Some(n.floor() as usize),
            _ => None,
        }
    }
}

impl Node for Buffer {
    fn ports(&self) -> NodePorts {
        NodePorts::new(
            vec![
                PortDecl::single("entity"),
                PortDecl::single("shift"),
                PortDecl::single("slice"),
            ],
            vec![PortDecl::single("entities")],
        )
    }

    fn on_event(
        &mut self,
        input: InRef,
        data: Value,
        ctx: &mut NodeContext<'_>,
    ) -> Result<(), NodeFault> {
        match input.family {
            IN_ENTITY => self.buffer.push(data),
            IN_SHIFT => {
                if let Some(count) = Self::count_of(&data) {
                    let count = count.min(self.buffer.len());
                    self.buffer.drain(..count);
                }
            }
            IN_SLICE => {
                if let Some(count) = Self::count_of(&data) {
                    if ctx.connected(OUT_ENTITIES) {
                        let count = count.min(self.buffer.len());
                        let batch = self.buffer[..count].to_vec();
                        ctx.push(OUT_ENTITIES, Value::List(batch));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn snapshot(&self) -> Vec<(&'static str, Value)> {
        vec![("length", Value::Int(self.buffer.len() as i64))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rack::Rack;

    fn rack_with_buffer() -> (Rack, crate::core::rack::Probe) {
        let mut rack = Rack::new();
        rack.add("buf", Box::new(Buffer::new())).unwrap();
        let entities = rack.probe("buf", "entities").unwrap();
        rack.start();
        (rack, entities)
    }

    #[test]
    fn test_slice_is_clipped_and_non_destructive() {
        let (mut rack, entities) = rack_with_buffer();
        for n in [1, 2, 3] {
            rack.send("buf", "entity", Value::Int(n)).unwrap();
        }
        rack.send("buf", "slice", Value::Int(10)).unwrap();
        rack.send("buf", "slice", Value::Int(2)).unwrap();
        rack.run();

        assert_eq!(
            entities.values(),
            vec![
                Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
                Value::List(vec![Value::Int(1), Value::Int(2)]),
            ]
        );
        assert_eq!(
            rack.snapshot("buf").unwrap(),
            vec![("length", Value::Int(3))]
        );
    }

    #[test]
    fn test_shift_drops_from_the_front() {
        let (mut rack, entities) = rack_with_buffer();
        for n in [1, 2, 3] {
            rack.send("buf", "entity", Value::Int(n)).unwrap();
        }
        rack.send("buf", "shift", Value::Int(2)).unwrap();
        rack.send("buf", "slice", Value::Int(5)).unwrap();
        rack.run();

        assert_eq!(entities.values(), vec![Value::List(vec![Value::Int(3)])]);
    }

    #[test]
    fn test_bad_counts_are_ignored() {
        let (mut rack, entities) = rack_with_buffer();
        rack.send("buf", "entity", Value::Int(1)).unwrap();
        rack.send("buf", "shift", Value::Int(-3)).unwrap();
        rack.send("buf", "shift", Value::Str("two".into())).unwrap();
        rack.send("buf", "slice", Value::Int(0)).unwrap();
        rack.run();

        assert!(entities.is_empty());
        assert_eq!(
            rack.snapshot("buf").unwrap(),
            vec![("length", Value::Int(1))]
        );
    }
}
