//! Variant values carried by variables and method arguments

use crate::datatypes::qualified_name::{LocalizedText, QualifiedName};
use crate::error::{DiError, DiResult};
use crate::node_id::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Container holding any value stored in the address space
///
/// Stores numbers, strings, byte strings, node ids, names or one-dimensional
/// arrays of those.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Variant {
    /// No value
    #[default]
    Empty,
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    /// Milliseconds since the Unix epoch
    DateTime(i64),
    ByteString(#[serde(with = "serde_bytes")] Vec<u8>),
    NodeId(NodeId),
    QualifiedName(QualifiedName),
    LocalizedText(LocalizedText),
    /// One-dimensional array
    Array(Vec<Variant>),
}

/// Type enumeration for Variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantType {
    Empty,
    Boolean,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    String,
    DateTime,
    ByteString,
    NodeId,
    QualifiedName,
    LocalizedText,
    Array,
}

impl VariantType {
    /// Check if this type is a number type
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            VariantType::SByte
                | VariantType::Byte
                | VariantType::Int16
                | VariantType::UInt16
                | VariantType::Int32
                | VariantType::UInt32
                | VariantType::Int64
                | VariantType::UInt64
                | VariantType::Float
                | VariantType::Double
        )
    }
}

impl Variant {
    /// Get the type of this Variant
    pub fn get_type(&self) -> VariantType {
        match self {
            Variant::Empty => VariantType::Empty,
            Variant::Boolean(_) => VariantType::Boolean,
            Variant::SByte(_) => VariantType::SByte,
            Variant::Byte(_) => VariantType::Byte,
            Variant::Int16(_) => VariantType::Int16,
            Variant::UInt16(_) => VariantType::UInt16,
            Variant::Int32(_) => VariantType::Int32,
            Variant::UInt32(_) => VariantType::UInt32,
            Variant::Int64(_) => VariantType::Int64,
            Variant::UInt64(_) => VariantType::UInt64,
            Variant::Float(_) => VariantType::Float,
            Variant::Double(_) => VariantType::Double,
            Variant::String(_) => VariantType::String,
            Variant::DateTime(_) => VariantType::DateTime,
            Variant::ByteString(_) => VariantType::ByteString,
            Variant::NodeId(_) => VariantType::NodeId,
            Variant::QualifiedName(_) => VariantType::QualifiedName,
            Variant::LocalizedText(_) => VariantType::LocalizedText,
            Variant::Array(_) => VariantType::Array,
        }
    }

    /// Constructs an array
    ///
    /// # Errors
    ///
    /// Returns an error if array elements have different types
    pub fn new_array(array: Vec<Variant>) -> DiResult<Self> {
        if let Some(first) = array.first() {
            let array_type = first.get_type();
            for (index, sub) in array.iter().enumerate() {
                if sub.get_type() != array_type {
                    return Err(DiError::InvalidData(format!(
                        "Array is of type {:?}, but element at {} is of type {:?}",
                        array_type,
                        index,
                        sub.get_type()
                    )));
                }
            }
        }
        Ok(Variant::Array(array))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    pub fn is_number(&self) -> bool {
        self.get_type().is_number()
    }

    /// Get the value as a boolean
    pub fn as_bool(&self) -> DiResult<bool> {
        match self {
            Variant::Boolean(b) => Ok(*b),
            _ => Err(self.mismatch("Boolean")),
        }
    }

    /// Get the value as an Int32
    pub fn as_i32(&self) -> DiResult<i32> {
        match self {
            Variant::Int32(i) => Ok(*i),
            _ => Err(self.mismatch("Int32")),
        }
    }

    /// Get the value as a UInt32
    pub fn as_u32(&self) -> DiResult<u32> {
        match self {
            Variant::UInt32(u) => Ok(*u),
            _ => Err(self.mismatch("UInt32")),
        }
    }

    /// Get the value as a Double
    pub fn as_f64(&self) -> DiResult<f64> {
        match self {
            Variant::Double(d) => Ok(*d),
            _ => Err(self.mismatch("Double")),
        }
    }

    /// Get the value as a string slice
    pub fn as_str(&self) -> DiResult<&str> {
        match self {
            Variant::String(s) => Ok(s),
            _ => Err(self.mismatch("String")),
        }
    }

    /// Get the value as a byte string
    pub fn as_bytes(&self) -> DiResult<&[u8]> {
        match self {
            Variant::ByteString(b) => Ok(b),
            _ => Err(self.mismatch("ByteString")),
        }
    }

    /// Get the value as an array
    pub fn as_array(&self) -> DiResult<&[Variant]> {
        match self {
            Variant::Array(items) => Ok(items),
            _ => Err(self.mismatch("Array")),
        }
    }

    fn mismatch(&self, expected: &str) -> DiError {
        DiError::InvalidData(format!("Expected {}, got {:?}", expected, self.get_type()))
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Variant::Boolean(value)
    }
}

impl From<i32> for Variant {
    fn from(value: i32) -> Self {
        Variant::Int32(value)
    }
}

impl From<u32> for Variant {
    fn from(value: u32) -> Self {
        Variant::UInt32(value)
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Variant::Double(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.to_string())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Variant::String(value)
    }
}

impl From<Vec<u8>> for Variant {
    fn from(value: Vec<u8>) -> Self {
        Variant::ByteString(value)
    }
}

impl From<NodeId> for Variant {
    fn from(value: NodeId) -> Self {
        Variant::NodeId(value)
    }
}

impl From<LocalizedText> for Variant {
    fn from(value: LocalizedText) -> Self {
        Variant::LocalizedText(value)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Empty => write!(f, "<empty>"),
            Variant::Boolean(b) => write!(f, "{}", b),
            Variant::SByte(v) => write!(f, "{}", v),
            Variant::Byte(v) => write!(f, "{}", v),
            Variant::Int16(v) => write!(f, "{}", v),
            Variant::UInt16(v) => write!(f, "{}", v),
            Variant::Int32(v) => write!(f, "{}", v),
            Variant::UInt32(v) => write!(f, "{}", v),
            Variant::Int64(v) => write!(f, "{}", v),
            Variant::UInt64(v) => write!(f, "{}", v),
            Variant::Float(v) => write!(f, "{}", v),
            Variant::Double(v) => write!(f, "{}", v),
            Variant::String(s) => write!(f, "{}", s),
            Variant::DateTime(ms) => write!(f, "@{}ms", ms),
            Variant::ByteString(b) => write!(f, "<{} bytes>", b.len()),
            Variant::NodeId(id) => write!(f, "{}", id),
            Variant::QualifiedName(q) => write!(f, "{}", q),
            Variant::LocalizedText(t) => write!(f, "{}", t),
            Variant::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_type() {
        assert_eq!(Variant::Int32(1).get_type(), VariantType::Int32);
        assert_eq!(Variant::Empty.get_type(), VariantType::Empty);
        assert!(Variant::Double(1.0).is_number());
        assert!(!Variant::from("x").is_number());
    }

    #[test]
    fn test_new_array_rejects_mixed_types() {
        assert!(Variant::new_array(vec![Variant::Int32(1), Variant::Int32(2)]).is_ok());
        assert!(Variant::new_array(vec![Variant::Int32(1), Variant::from("2")]).is_err());
        assert!(Variant::new_array(Vec::new()).is_ok());
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Variant::Int32(-2).as_i32().unwrap(), -2);
        assert_eq!(Variant::from("client-a").as_str().unwrap(), "client-a");
        assert!(Variant::Int32(1).as_str().is_err());
        assert!(Variant::Boolean(true).as_bool().unwrap());
    }

    #[test]
    fn test_display_array() {
        let v = Variant::Array(vec![Variant::Int32(1), Variant::Int32(2)]);
        assert_eq!(v.to_string(), "[1, 2]");
    }
}
