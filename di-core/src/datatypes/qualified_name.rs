//! Browse and display names

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name qualified by a namespace index
///
/// Browse names are qualified names. Two browse names are equal only if both
/// the namespace index and the name match exactly (case-sensitive).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct QualifiedName {
    pub namespace_index: u16,
    pub name: String,
}

impl QualifiedName {
    pub fn new(namespace_index: u16, name: impl Into<String>) -> Self {
        Self {
            namespace_index,
            name: name.into(),
        }
    }

    /// Parse `<ns>:<name>`; without a prefix the namespace index is 0
    pub fn parse(s: &str) -> Self {
        if let Some((prefix, name)) = s.split_once(':') {
            if let Ok(ns) = prefix.parse::<u16>() {
                return Self::new(ns, name);
            }
        }
        Self::new(0, s)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_index == 0 {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}:{}", self.namespace_index, self.name)
        }
    }
}

/// Human readable text with an optional locale
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LocalizedText {
    #[serde(default)]
    pub locale: String,
    pub text: String,
}

impl LocalizedText {
    pub fn new(locale: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            text: text.into(),
        }
    }
}

impl From<&str> for LocalizedText {
    fn from(text: &str) -> Self {
        Self::new("", text)
    }
}

impl fmt::Display for LocalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_name_parse() {
        assert_eq!(QualifiedName::parse("2:DeviceHealth"), QualifiedName::new(2, "DeviceHealth"));
        assert_eq!(QualifiedName::parse("EventId"), QualifiedName::new(0, "EventId"));
        assert_eq!(QualifiedName::parse("a:b"), QualifiedName::new(0, "a:b"));
    }

    #[test]
    fn test_qualified_name_is_case_sensitive() {
        assert_ne!(QualifiedName::new(2, "Lock"), QualifiedName::new(2, "lock"));
        assert_ne!(QualifiedName::new(1, "Lock"), QualifiedName::new(2, "Lock"));
    }

    #[test]
    fn test_qualified_name_display() {
        assert_eq!(QualifiedName::new(2, "Lock").to_string(), "2:Lock");
        assert_eq!(QualifiedName::new(0, "Message").to_string(), "Message");
    }
}
