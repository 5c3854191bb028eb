//! Data type tags for variables and method arguments

use crate::datatypes::variant::Variant;
use crate::node_id::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Built-in data type of a value
///
/// `Duration` is carried as a Double, `Enumeration` as an Int32 and
/// `BaseDataType` accepts any value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
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
    Duration,
    Enumeration,
    BaseDataType,
}

impl DataType {
    /// Node id of the data type in the base namespace
    pub fn node_id(self) -> NodeId {
        let id = match self {
            Self::Boolean => 1,
            Self::SByte => 2,
            Self::Byte => 3,
            Self::Int16 => 4,
            Self::UInt16 => 5,
            Self::Int32 => 6,
            Self::UInt32 => 7,
            Self::Int64 => 8,
            Self::UInt64 => 9,
            Self::Float => 10,
            Self::Double => 11,
            Self::String => 12,
            Self::DateTime => 13,
            Self::ByteString => 15,
            Self::NodeId => 17,
            Self::QualifiedName => 20,
            Self::LocalizedText => 21,
            Self::BaseDataType => 24,
            Self::Enumeration => 29,
            Self::Duration => 290,
        };
        NodeId::numeric(0, id)
    }

    /// Look up a built-in data type by its base-namespace node id
    pub fn from_node_id(node_id: &NodeId) -> Option<Self> {
        if node_id.namespace() != 0 {
            return None;
        }
        let ty = match node_id.as_numeric()? {
            1 => Self::Boolean,
            2 => Self::SByte,
            3 => Self::Byte,
            4 => Self::Int16,
            5 => Self::UInt16,
            6 => Self::Int32,
            7 => Self::UInt32,
            8 => Self::Int64,
            9 => Self::UInt64,
            10 => Self::Float,
            11 => Self::Double,
            12 => Self::String,
            13 => Self::DateTime,
            15 => Self::ByteString,
            17 => Self::NodeId,
            20 => Self::QualifiedName,
            21 => Self::LocalizedText,
            24 => Self::BaseDataType,
            29 => Self::Enumeration,
            290 => Self::Duration,
            _ => return None,
        };
        Some(ty)
    }

    /// Check whether a scalar value is acceptable for this data type
    pub fn accepts(self, value: &Variant) -> bool {
        match (self, value) {
            (Self::BaseDataType, _) => true,
            (Self::Boolean, Variant::Boolean(_))
            | (Self::SByte, Variant::SByte(_))
            | (Self::Byte, Variant::Byte(_))
            | (Self::Int16, Variant::Int16(_))
            | (Self::UInt16, Variant::UInt16(_))
            | (Self::Int32, Variant::Int32(_))
            | (Self::UInt32, Variant::UInt32(_))
            | (Self::Int64, Variant::Int64(_))
            | (Self::UInt64, Variant::UInt64(_))
            | (Self::Float, Variant::Float(_))
            | (Self::Double, Variant::Double(_))
            | (Self::String, Variant::String(_))
            | (Self::DateTime, Variant::DateTime(_))
            | (Self::ByteString, Variant::ByteString(_))
            | (Self::NodeId, Variant::NodeId(_))
            | (Self::QualifiedName, Variant::QualifiedName(_))
            | (Self::LocalizedText, Variant::LocalizedText(_))
            | (Self::Duration, Variant::Double(_))
            | (Self::Enumeration, Variant::Int32(_)) => true,
            _ => false,
        }
    }

    /// Default value a freshly created variable of this type holds
    pub fn default_value(self) -> Variant {
        match self {
            Self::Boolean => Variant::Boolean(false),
            Self::SByte => Variant::SByte(0),
            Self::Byte => Variant::Byte(0),
            Self::Int16 => Variant::Int16(0),
            Self::UInt16 => Variant::UInt16(0),
            Self::Int32 | Self::Enumeration => Variant::Int32(0),
            Self::UInt32 => Variant::UInt32(0),
            Self::Int64 => Variant::Int64(0),
            Self::UInt64 => Variant::UInt64(0),
            Self::Float => Variant::Float(0.0),
            Self::Double | Self::Duration => Variant::Double(0.0),
            Self::String => Variant::String(String::new()),
            Self::DateTime => Variant::DateTime(0),
            Self::ByteString => Variant::ByteString(Vec::new()),
            Self::NodeId => Variant::NodeId(NodeId::null()),
            Self::QualifiedName => Variant::QualifiedName(Default::default()),
            Self::LocalizedText => Variant::LocalizedText(Default::default()),
            Self::BaseDataType => Variant::Empty,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Rank of a value: scalar or one-dimensional array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ValueRank {
    #[default]
    Scalar,
    OneDimension,
}

impl ValueRank {
    /// Check a value against a data type at this rank
    ///
    /// Array elements must all be acceptable for the data type.
    pub fn accepts(self, data_type: DataType, value: &Variant) -> bool {
        match (self, value) {
            (Self::OneDimension, Variant::Array(items)) => items.iter().all(|v| data_type.accepts(v)),
            (Self::OneDimension, _) => false,
            (Self::Scalar, Variant::Array(_)) => data_type == DataType::BaseDataType,
            (Self::Scalar, v) => data_type.accepts(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_round_trip_for_well_known_types() {
        for ty in [DataType::Boolean, DataType::String, DataType::Duration, DataType::Enumeration] {
            assert_eq!(DataType::from_node_id(&ty.node_id()), Some(ty));
        }
        assert_eq!(DataType::from_node_id(&NodeId::numeric(2, 6244)), None);
    }

    #[test]
    fn test_duration_is_carried_as_double() {
        assert!(DataType::Duration.accepts(&Variant::Double(1500.0)));
        assert!(!DataType::Duration.accepts(&Variant::Int32(1500)));
    }

    #[test]
    fn test_enumeration_is_carried_as_int32() {
        assert!(DataType::Enumeration.accepts(&Variant::Int32(3)));
        assert!(!DataType::Enumeration.accepts(&Variant::UInt32(3)));
    }

    #[test]
    fn test_value_rank() {
        let strings = Variant::Array(vec![Variant::from("a"), Variant::from("b")]);
        assert!(ValueRank::OneDimension.accepts(DataType::String, &strings));
        assert!(!ValueRank::Scalar.accepts(DataType::String, &strings));
        assert!(!ValueRank::OneDimension.accepts(DataType::String, &Variant::from("a")));
        let mixed = Variant::Array(vec![Variant::from("a"), Variant::Int32(1)]);
        assert!(!ValueRank::OneDimension.accepts(DataType::String, &mixed));
    }
}
