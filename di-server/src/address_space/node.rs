//! Address space nodes

use di_core::{LocalizedText, NodeId, QualifiedName, ValueRank, Variant};
use di_model::{MethodSignature, NodeClass};

/// Node of the address space
///
/// Nodes handed out by the address space are snapshots; changes go through
/// the [`AddressSpace`](super::AddressSpace) operations.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub node_id: NodeId,
    pub browse_name: QualifiedName,
    pub display_name: LocalizedText,
    pub node_class: NodeClass,
    /// Type definition of objects and variables
    pub type_definition: Option<NodeId>,
    /// Data type id of variables
    pub data_type: Option<NodeId>,
    pub value_rank: ValueRank,
    /// Current value of variables
    pub value: Option<Variant>,
    /// Argument schema of methods
    pub signature: Option<MethodSignature>,
    pub parent: Option<NodeId>,
}

impl Node {
    fn new(browse_name: QualifiedName, node_class: NodeClass) -> Self {
        Self {
            node_id: NodeId::null(),
            display_name: LocalizedText::new("", browse_name.name.clone()),
            browse_name,
            node_class,
            type_definition: None,
            data_type: None,
            value_rank: ValueRank::Scalar,
            value: None,
            signature: None,
            parent: None,
        }
    }

    /// Object of the given type; the id is assigned when it is added
    pub fn object(browse_name: QualifiedName, type_definition: NodeId) -> Self {
        Self {
            type_definition: Some(type_definition),
            ..Self::new(browse_name, NodeClass::Object)
        }
    }

    /// Variable holding `value`; the id is assigned when it is added
    pub fn variable(
        browse_name: QualifiedName,
        type_definition: NodeId,
        data_type: NodeId,
        value: Variant,
    ) -> Self {
        Self {
            type_definition: Some(type_definition),
            data_type: Some(data_type),
            value: Some(value),
            ..Self::new(browse_name, NodeClass::Variable)
        }
    }

    /// Method with the given argument schema
    pub fn method(browse_name: QualifiedName, signature: MethodSignature) -> Self {
        Self {
            signature: Some(signature),
            ..Self::new(browse_name, NodeClass::Method)
        }
    }

    pub fn with_node_id(mut self, node_id: NodeId) -> Self {
        self.node_id = node_id;
        self
    }

    pub fn with_value_rank(mut self, value_rank: ValueRank) -> Self {
        self.value_rank = value_rank;
        self
    }

    pub fn is_variable(&self) -> bool {
        self.node_class == NodeClass::Variable
    }

    pub fn is_method(&self) -> bool {
        self.node_class == NodeClass::Method
    }
}

/// Structural or value change published by the address space
#[derive(Debug, Clone, PartialEq)]
pub enum NodeChange {
    NodeAdded { parent: Option<NodeId>, node_id: NodeId },
    NodeRemoved { parent: Option<NodeId>, node_id: NodeId },
    ValueChanged { node_id: NodeId, value: Variant },
}
