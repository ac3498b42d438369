use crate::core::types::NodeId;

/// Error raised while validating node options. Always fatal: a node with a
/// bad configuration is never registered.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Numeric option outside its allowed bounds
    OutOfBounds(String),
    /// Route table entry with a bad key or destination
    InvalidRoute(String),
    /// Scripted data that can never be played
    InvalidData(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::OutOfBounds(msg) => write!(f, "option out of bounds: {}", msg),
            ConfigError::InvalidRoute(msg) => write!(f, "invalid route: {}", msg),
            ConfigError::InvalidData(msg) => write!(f, "invalid data: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Error raised by the rack API: registration, wiring, or addressing a node
/// or port that does not exist.
#[derive(Debug, Clone)]
pub enum RackError {
    DuplicateNode(NodeId),
    NodeNotFound(NodeId),
    PortNotFound(String),
}

impl std::fmt::Display for RackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RackError::DuplicateNode(id) => write!(f, "node '{}' already exists", id),
            RackError::NodeNotFound(id) => write!(f, "node '{}' not found", id),
            RackError::PortNotFound(port) => write!(f, "port '{}' not found", port),
        }
    }
}

impl std::error::Error for RackError {}

impl From<String> for RackError {
    fn from(msg: String) -> Self {
        RackError::NodeNotFound(msg)
    }
}

/// Fault surfaced by a node handler. Halts that node instance only; the
/// rest of the rack keeps running.
#[derive(Debug, Clone)]
pub enum NodeFault {
    /// Unplayable or structurally wrong data discovered at first use
    BadData(String),
}

impl std::fmt::Display for NodeFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeFault::BadData(msg) => write!(f, "bad data: {}", msg),
        }
    }
}

impl std::error::Error for NodeFault {}
