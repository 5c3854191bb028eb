use crate::error::{DiError, DiResult};
use crate::namespace::NamespaceTable;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

static NODE_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:ns=(\d+);)?([isgb])=(.+)$").expect("node id pattern is valid")
});

static EXPANDED_NODE_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^nsu=([^;]+);([isgb])=(.+)$").expect("expanded node id pattern is valid")
});

static GUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}$")
        .expect("guid pattern is valid")
});

/// Identifier part of a node id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identifier {
    /// Numeric identifier (`i=`)
    Numeric(u32),
    /// String identifier (`s=`)
    String(String),
    /// GUID identifier (`g=`), kept in canonical lower-case text form
    Guid(String),
    /// Opaque identifier (`b=`), written as hex in text form
    Opaque(Vec<u8>),
}

impl Identifier {
    fn parse(kind: &str, value: &str) -> DiResult<Self> {
        match kind {
            "i" => value
                .parse::<u32>()
                .map(Identifier::Numeric)
                .map_err(|_| DiError::InvalidData(format!("Invalid numeric identifier: {}", value))),
            "s" => Ok(Identifier::String(value.to_string())),
            "g" => {
                if GUID_PATTERN.is_match(value) {
                    Ok(Identifier::Guid(value.to_ascii_lowercase()))
                } else {
                    Err(DiError::InvalidData(format!("Invalid GUID identifier: {}", value)))
                }
            }
            "b" => decode_hex(value).map(Identifier::Opaque),
            _ => Err(DiError::InvalidData(format!("Unknown identifier type: {}", kind))),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Numeric(n) => write!(f, "i={}", n),
            Identifier::String(s) => write!(f, "s={}", s),
            Identifier::Guid(g) => write!(f, "g={}", g),
            Identifier::Opaque(bytes) => {
                write!(f, "b=")?;
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

fn decode_hex(s: &str) -> DiResult<Vec<u8>> {
    if s.len() % 2 != 0 {
        return Err(DiError::InvalidData(format!("Odd-length opaque identifier: {}", s)));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|_| DiError::InvalidData(format!("Invalid opaque identifier: {}", s)))
        })
        .collect()
}

/// Node identifier
///
/// A node id is unique within a server's address space. It is made of the
/// index of a namespace in the server's namespace table and an identifier
/// inside that namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    namespace: u16,
    identifier: Identifier,
}

impl NodeId {
    /// Create a node id from a namespace index and an identifier
    pub fn new(namespace: u16, identifier: Identifier) -> Self {
        Self { namespace, identifier }
    }

    /// Create a numeric node id
    pub fn numeric(namespace: u16, value: u32) -> Self {
        Self::new(namespace, Identifier::Numeric(value))
    }

    /// Create a string node id
    pub fn string(namespace: u16, value: impl Into<String>) -> Self {
        Self::new(namespace, Identifier::String(value.into()))
    }

    /// The null node id (`ns=0;i=0`)
    pub fn null() -> Self {
        Self::numeric(0, 0)
    }

    /// Parse a node id from its text form
    ///
    /// Supports formats like:
    /// - "i=58"
    /// - "ns=2;i=1002"
    /// - "ns=1;s=Device1"
    /// - "ns=1;g=72962b91-fa75-4ae6-8d28-b404dc7daf63"
    /// - "ns=1;b=0a0b"
    pub fn from_string(s: &str) -> DiResult<Self> {
        let caps = NODE_ID_PATTERN
            .captures(s.trim())
            .ok_or_else(|| DiError::InvalidData(format!("Invalid node id format: {}", s)))?;
        let namespace = match caps.get(1) {
            Some(ns) => ns
                .as_str()
                .parse::<u16>()
                .map_err(|_| DiError::InvalidData(format!("Invalid namespace index: {}", ns.as_str())))?,
            None => 0,
        };
        let identifier = Identifier::parse(&caps[2], &caps[3])?;
        Ok(Self { namespace, identifier })
    }

    /// Namespace index
    pub fn namespace(&self) -> u16 {
        self.namespace
    }

    /// Identifier inside the namespace
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// Numeric identifier value, if the identifier is numeric
    pub fn as_numeric(&self) -> Option<u32> {
        match self.identifier {
            Identifier::Numeric(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        self.namespace == 0 && self.identifier == Identifier::Numeric(0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace == 0 {
            write!(f, "{}", self.identifier)
        } else {
            write!(f, "ns={};{}", self.namespace, self.identifier)
        }
    }
}

impl FromStr for NodeId {
    type Err = DiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        NodeId::from_string(&s).map_err(serde::de::Error::custom)
    }
}

/// Node id that may name its namespace by URI instead of by index
///
/// Model documents use this form so that they do not depend on the index a
/// namespace happens to get in a particular server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpandedNodeId {
    namespace_uri: Option<String>,
    node_id: NodeId,
}

impl ExpandedNodeId {
    /// Create from a namespace URI and an identifier
    pub fn with_uri(namespace_uri: impl Into<String>, identifier: Identifier) -> Self {
        Self {
            namespace_uri: Some(namespace_uri.into()),
            node_id: NodeId::new(0, identifier),
        }
    }

    /// Parse `nsu=<uri>;i=<n>` or any plain node id form
    pub fn from_string(s: &str) -> DiResult<Self> {
        let trimmed = s.trim();
        if let Some(caps) = EXPANDED_NODE_ID_PATTERN.captures(trimmed) {
            let identifier = Identifier::parse(&caps[2], &caps[3])?;
            return Ok(Self::with_uri(&caps[1], identifier));
        }
        Ok(Self::from(NodeId::from_string(trimmed)?))
    }

    pub fn namespace_uri(&self) -> Option<&str> {
        self.namespace_uri.as_deref()
    }

    /// Resolve to a local node id through the namespace table
    ///
    /// # Errors
    /// Returns `DiError::NotFound` if the namespace URI is not registered
    pub fn resolve(&self, namespaces: &NamespaceTable) -> DiResult<NodeId> {
        match &self.namespace_uri {
            Some(uri) => {
                let index = namespaces
                    .index_of(uri)
                    .ok_or_else(|| DiError::NotFound(format!("Namespace not registered: {}", uri)))?;
                Ok(NodeId::new(index, self.node_id.identifier.clone()))
            }
            None => Ok(self.node_id.clone()),
        }
    }
}

impl From<NodeId> for ExpandedNodeId {
    fn from(node_id: NodeId) -> Self {
        Self { namespace_uri: None, node_id }
    }
}

impl fmt::Display for ExpandedNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace_uri {
            Some(uri) => write!(f, "nsu={};{}", uri, self.node_id.identifier),
            None => write!(f, "{}", self.node_id),
        }
    }
}

impl FromStr for ExpandedNodeId {
    type Err = DiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl Serialize for ExpandedNodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ExpandedNodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ExpandedNodeId::from_string(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_numeric() {
        let id = NodeId::numeric(2, 1002);
        assert_eq!(id.namespace(), 2);
        assert_eq!(id.as_numeric(), Some(1002));
    }

    #[test]
    fn test_node_id_from_string() {
        assert_eq!(NodeId::from_string("ns=2;i=1002").unwrap(), NodeId::numeric(2, 1002));
        assert_eq!(NodeId::from_string("i=58").unwrap(), NodeId::numeric(0, 58));
        assert_eq!(NodeId::from_string("ns=1;s=Pump.Lock").unwrap(), NodeId::string(1, "Pump.Lock"));
        assert_eq!(
            NodeId::from_string("ns=1;b=0aff").unwrap(),
            NodeId::new(1, Identifier::Opaque(vec![0x0a, 0xff]))
        );
    }

    #[test]
    fn test_node_id_guid_normalized() {
        let id = NodeId::from_string("ns=3;g=72962B91-FA75-4AE6-8D28-B404DC7DAF63").unwrap();
        assert_eq!(id.to_string(), "ns=3;g=72962b91-fa75-4ae6-8d28-b404dc7daf63");
    }

    #[test]
    fn test_node_id_rejects_garbage() {
        assert!(NodeId::from_string("ns=x;i=1").is_err());
        assert!(NodeId::from_string("i=abc").is_err());
        assert!(NodeId::from_string("ns=70000;i=1").is_err());
        assert!(NodeId::from_string("g=not-a-guid").is_err());
        assert!(NodeId::from_string("").is_err());
    }

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId::numeric(0, 85).to_string(), "i=85");
        assert_eq!(NodeId::string(4, "Device").to_string(), "ns=4;s=Device");
    }

    #[test]
    fn test_expanded_node_id_resolve() {
        let mut table = NamespaceTable::new();
        let di = table.register("http://opcfoundation.org/UA/DI/");
        let expanded = ExpandedNodeId::from_string("nsu=http://opcfoundation.org/UA/DI/;i=1002").unwrap();
        assert_eq!(expanded.resolve(&table).unwrap(), NodeId::numeric(di, 1002));

        let unknown = ExpandedNodeId::from_string("nsu=urn:unknown;i=1").unwrap();
        assert!(matches!(unknown.resolve(&table), Err(DiError::NotFound(_))));
    }

    #[test]
    fn test_node_id_serde_as_string() {
        let id = NodeId::numeric(2, 6388);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"ns=2;i=6388\"");
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
