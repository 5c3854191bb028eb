//! Namespace table
//!
//! Maps namespace URIs to the indexes used inside node ids. Index 0 is always
//! the OPC UA base namespace.

use serde::{Deserialize, Serialize};

/// URI of the OPC UA base namespace (index 0)
pub const OPC_UA_NAMESPACE_URI: &str = "http://opcfoundation.org/UA/";

/// URI of the Device Integration companion namespace
pub const DI_NAMESPACE_URI: &str = "http://opcfoundation.org/UA/DI/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceTable {
    uris: Vec<String>,
}

impl NamespaceTable {
    /// Create a table holding only the base namespace
    pub fn new() -> Self {
        Self {
            uris: vec![OPC_UA_NAMESPACE_URI.to_string()],
        }
    }

    /// Register a namespace URI and return its index
    ///
    /// Registering a URI that is already present returns the existing index.
    pub fn register(&mut self, uri: &str) -> u16 {
        if let Some(index) = self.index_of(uri) {
            return index;
        }
        self.uris.push(uri.to_string());
        (self.uris.len() - 1) as u16
    }

    pub fn index_of(&self, uri: &str) -> Option<u16> {
        self.uris.iter().position(|u| u == uri).map(|i| i as u16)
    }

    pub fn uri(&self, index: u16) -> Option<&str> {
        self.uris.get(index as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }

    pub fn uris(&self) -> &[String] {
        &self.uris
    }
}

impl Default for NamespaceTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_namespace_is_index_zero() {
        let table = NamespaceTable::new();
        assert_eq!(table.index_of(OPC_UA_NAMESPACE_URI), Some(0));
        assert_eq!(table.uri(0), Some(OPC_UA_NAMESPACE_URI));
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut table = NamespaceTable::new();
        let first = table.register(DI_NAMESPACE_URI);
        let second = table.register(DI_NAMESPACE_URI);
        assert_eq!(first, 1);
        assert_eq!(first, second);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_unknown_uri() {
        let table = NamespaceTable::new();
        assert_eq!(table.index_of("urn:nothing"), None);
        assert_eq!(table.uri(7), None);
    }
}
