use uuid::Uuid;

/// Human-assigned identifier of a node instance within a rack.
pub type NodeId = String;

/// Identity of a registered node: the rack-unique id plus an instance tag
/// used in log lines and telemetry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    id: NodeId,
    instance: Uuid,
}

impl NodeInfo {
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            instance: Uuid::new_v4(),
        }
    }

    /// Get the raw id string
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the per-instance tag
    pub fn instance(&self) -> Uuid {
        self.instance
    }
}

impl std::fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}
