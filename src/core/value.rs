use serde::{Deserialize, Serialize};

/// Payload carried on every port.
///
/// `Nil` doubles as the explicit missing marker: a lookup miss emits it, and
/// a gate pulse delivered without a payload is read as `Int(1)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Numeric view of the payload, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Bool(b) => Some(if *b { 1 } else { 0 }),
            _ => None,
        }
    }

    /// Partition key view of the payload, for channel-keyed maps.
    pub fn channel_key(&self) -> Option<ChannelKey> {
        match self {
            Value::Int(n) => Some(ChannelKey::Num(*n)),
            Value::Float(f) if f.is_finite() && f.fract() == 0.0 => {
                Some(ChannelKey::Num(*f as i64))
            }
            Value::Float(f) if f.is_finite() => Some(ChannelKey::Name(f.to_string())),
            Value::Str(s) => Some(ChannelKey::Name(s.clone())),
            Value::Bool(b) => Some(ChannelKey::Num(if *b { 1 } else { 0 })),
            _ => None,
        }
    }

    /// Gate payloads default to `1` when absent.
    pub fn gate_or_default(self) -> Value {
        if self.is_nil() {
            Value::Int(1)
        } else {
            self
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Nil
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Hashable partition key grouping channel state within one node instance.
///
/// Carries no ordering semantics; it only partitions maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKey {
    Num(i64),
    Name(String),
}

impl ChannelKey {
    /// The key rendered back as a port payload.
    pub fn to_value(&self) -> Value {
        match self {
            ChannelKey::Num(n) => Value::Int(*n),
            ChannelKey::Name(s) => Value::Str(s.clone()),
        }
    }
}

impl std::fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKey::Num(n) => write!(f, "{}", n),
            ChannelKey::Name(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for ChannelKey {
    fn from(n: i64) -> Self {
        ChannelKey::Num(n)
    }
}

impl From<&str> for ChannelKey {
    fn from(s: &str) -> Self {
        ChannelKey::Name(s.to_string())
    }
}
