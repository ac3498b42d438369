use std::collections::HashMap;

/// A declared port family: either a single named port or a dynamic family
/// whose arity is fixed at construction.
///
/// Dynamic templates carry a `{}` placeholder replaced by the 1-based slot
/// number when the table is expanded, e.g. `gate{}` becomes `gate1..gateN`
/// and `fx{}.mix` becomes `fx1.mix..fxN.mix`. Expansion happens exactly once
/// per node registration; event dispatch never formats or parses names.
#[derive(Debug, Clone)]
pub struct PortDecl {
    template: String,
    arity: u32,
    dynamic: bool,
}

impl PortDecl {
    /// Declare a single port.
    pub fn single(name: &str) -> Self {
        Self {
            template: name.to_string(),
            arity: 1,
            dynamic: false,
        }
    }

    /// Declare an indexed family of `arity` ports.
    ///
    /// An arity of zero is legal and expands to nothing.
    pub fn dynamic(template: &str, arity: u32) -> Self {
        assert!(
            template.contains("{}"),
            "dynamic port template '{}' has no slot placeholder",
            template
        );
        Self {
            template: template.to_string(),
            arity,
            dynamic: true,
        }
    }

    pub fn arity(&self) -> u32 {
        self.arity
    }

    fn instance_name(&self, slot: u32) -> String {
        if self.dynamic {
            self.template.replace("{}", &slot.to_string())
        } else {
            self.template.clone()
        }
    }
}

/// The full port declaration of a node type, in family order.
///
/// Family indices used in [`InRef`]/[`OutRef`] are positions in these
/// vectors, so each node keeps its declaration order and its dispatch
/// constants in lockstep.
#[derive(Debug, Clone, Default)]
pub struct NodePorts {
    pub inputs: Vec<PortDecl>,
    pub outputs: Vec<PortDecl>,
}

impl NodePorts {
    pub fn new(inputs: Vec<PortDecl>, outputs: Vec<PortDecl>) -> Self {
        Self { inputs, outputs }
    }
}

/// Address of one input port instance: declared family plus 1-based slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InRef {
    pub family: usize,
    pub slot: u32,
}

impl InRef {
    pub const fn new(family: usize, slot: u32) -> Self {
        Self { family, slot }
    }
}

/// Address of one output port instance: declared family plus 1-based slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutRef {
    pub family: usize,
    pub slot: u32,
}

impl OutRef {
    pub const fn new(family: usize, slot: u32) -> Self {
        Self { family, slot }
    }
}

/// Flattened, name-addressable expansion of a node's declared ports.
///
/// Built once at registration. Wiring resolves names here; after that the
/// hot path works purely with `(family, slot)` tokens and flat indices.
#[derive(Debug)]
pub struct PortTable {
    in_by_name: HashMap<String, InRef>,
    out_by_name: HashMap<String, OutRef>,
    /// family -> slot-1 -> flat output index
    out_flat: Vec<Vec<usize>>,
    out_names: Vec<String>,
    connected: Vec<bool>,
}

impl PortTable {
    pub fn build(ports: &NodePorts) -> Self {
        let mut in_by_name = HashMap::new();
        for (family, decl) in ports.inputs.iter().enumerate() {
            for slot in 1..=decl.arity {
                in_by_name.insert(decl.instance_name(slot), InRef::new(family, slot));
            }
        }

        let mut out_by_name = HashMap::new();
        let mut out_flat = Vec::with_capacity(ports.outputs.len());
        let mut out_names = Vec::new();
        for (family, decl) in ports.outputs.iter().enumerate() {
            let mut slots = Vec::with_capacity(decl.arity as usize);
            for slot in 1..=decl.arity {
                let name = decl.instance_name(slot);
                out_by_name.insert(name.clone(), OutRef::new(family, slot));
                slots.push(out_names.len());
                out_names.push(name);
            }
            out_flat.push(slots);
        }

        let connected = vec![false; out_names.len()];
        Self {
            in_by_name,
            out_by_name,
            out_flat,
            out_names,
            connected,
        }
    }

    pub fn input(&self, name: &str) -> Option<InRef> {
        self.in_by_name.get(name).copied()
    }

    pub fn output(&self, name: &str) -> Option<OutRef> {
        self.out_by_name.get(name).copied()
    }

    /// Flat index of an output port instance, if the token is in range.
    pub fn flat_output(&self, out: OutRef) -> Option<usize> {
        if out.slot == 0 {
            return None;
        }
        self.out_flat
            .get(out.family)
            .and_then(|slots| slots.get((out.slot - 1) as usize))
            .copied()
    }

    pub fn output_name(&self, flat: usize) -> &str {
        &self.out_names[flat]
    }

    pub fn output_count(&self) -> usize {
        self.out_names.len()
    }

    pub fn mark_connected(&mut self, flat: usize) {
        self.connected[flat] = true;
    }

    pub fn is_connected(&self, out: OutRef) -> bool {
        self.flat_output(out)
            .map(|flat| self.connected[flat])
            .unwrap_or(false)
    }
}
