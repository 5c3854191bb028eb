//! Type definitions
//!
//! A type definition is a named schema for objects or variables: its super
//! type and the ordered list of child slots every instance may carry.

use di_core::{DataType, NodeId, QualifiedName, ValueRank, Variant};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Class of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeClass {
    Object,
    Variable,
    Method,
    ObjectType,
    VariableType,
}

impl NodeClass {
    /// Class of the instances a type of this class describes
    pub fn instance_class(self) -> Option<NodeClass> {
        match self {
            NodeClass::ObjectType => Some(NodeClass::Object),
            NodeClass::VariableType => Some(NodeClass::Variable),
            _ => None,
        }
    }

    pub fn is_type(self) -> bool {
        matches!(self, NodeClass::ObjectType | NodeClass::VariableType)
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Modelling rule of a child slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModellingRule {
    /// Created together with every instance
    Mandatory,
    /// Created on demand
    Optional,
    /// Any number of children of the slot's type, each with its own name
    OptionalPlaceholder,
    /// At least one child of the slot's type, each with its own name
    MandatoryPlaceholder,
}

impl ModellingRule {
    pub fn is_placeholder(self) -> bool {
        matches!(self, Self::OptionalPlaceholder | Self::MandatoryPlaceholder)
    }
}

/// One input or output argument of a method
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    /// Data type id, either a built-in type or a registered enumeration
    pub data_type: NodeId,
    pub value_rank: ValueRank,
}

impl Argument {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.node_id(),
            value_rank: ValueRank::Scalar,
        }
    }

    pub fn array(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            value_rank: ValueRank::OneDimension,
            ..Self::new(name, data_type)
        }
    }
}

/// Input and output argument schema of a method
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodSignature {
    pub input_arguments: Vec<Argument>,
    pub output_arguments: Vec<Argument>,
}

/// A child declared by a type definition
#[derive(Debug, Clone, PartialEq)]
pub struct ChildSlot {
    pub browse_name: QualifiedName,
    pub node_class: NodeClass,
    /// Type definition of the child; `None` for methods
    pub type_definition: Option<NodeId>,
    pub modelling_rule: ModellingRule,
    /// Data type of a variable child
    pub data_type: Option<NodeId>,
    pub value_rank: ValueRank,
    /// Initial value of a variable child
    pub default_value: Option<Variant>,
    /// Argument schema of a method child
    pub signature: Option<MethodSignature>,
}

impl ChildSlot {
    pub fn is_mandatory(&self) -> bool {
        self.modelling_rule == ModellingRule::Mandatory
    }
}

/// Object type or variable type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefinition {
    pub type_id: NodeId,
    pub browse_name: QualifiedName,
    pub node_class: NodeClass,
    pub super_type: Option<NodeId>,
    pub is_abstract: bool,
    /// Data type of instances of a variable type
    pub data_type: Option<NodeId>,
    /// Children in declaration order
    pub children: Vec<ChildSlot>,
}

impl TypeDefinition {
    /// Find a slot declared directly on this type
    pub fn slot(&self, browse_name: &QualifiedName) -> Option<&ChildSlot> {
        self.children.iter().find(|c| &c.browse_name == browse_name)
    }
}

/// Name and value of an enumeration member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    pub value: i32,
    pub name: String,
}

/// Data type declared by a model, encoded as one of the built-in types
#[derive(Debug, Clone, PartialEq)]
pub struct DataTypeDefinition {
    pub data_type_id: NodeId,
    pub browse_name: QualifiedName,
    pub base: DataType,
    pub enum_values: Vec<EnumValue>,
}

impl DataTypeDefinition {
    /// Name of an enumeration member
    pub fn enum_name(&self, value: i32) -> Option<&str> {
        self.enum_values
            .iter()
            .find(|e| e.value == value)
            .map(|e| e.name.as_str())
    }

    /// Check a value against the data type, including enumeration range
    pub fn accepts(&self, value: &Variant) -> bool {
        if !self.base.accepts(value) {
            return false;
        }
        match value {
            Variant::Int32(v) if !self.enum_values.is_empty() => self.enum_name(*v).is_some(),
            _ => true,
        }
    }
}
