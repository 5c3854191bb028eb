//! Type hierarchy resolver
//!
//! Holds every registered type definition and answers questions that need the
//! super type chain: which children an instance inherits, in which order they
//! are listed, and whether one type derives from another.

use crate::type_definition::{ChildSlot, DataTypeDefinition, NodeClass, TypeDefinition};
use crate::well_known;
use di_core::{DataType, DiError, DiResult, NodeId, QualifiedName, ValueRank, Variant};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<NodeId, TypeDefinition>,
    by_name: HashMap<QualifiedName, NodeId>,
    data_types: HashMap<NodeId, DataTypeDefinition>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type definition
    ///
    /// # Errors
    /// Returns `DiError::Model` if the type id is already registered, if the
    /// super type is unknown, or if the super type is of a different class.
    pub fn register_type(&mut self, definition: TypeDefinition) -> DiResult<()> {
        if !definition.node_class.is_type() {
            return Err(DiError::Model(format!(
                "{} is a {}, not a type",
                definition.browse_name, definition.node_class
            )));
        }
        if self.types.contains_key(&definition.type_id) {
            return Err(DiError::Model(format!(
                "Type {} is already registered",
                definition.type_id
            )));
        }
        if let Some(super_id) = &definition.super_type {
            let super_type = self.types.get(super_id).ok_or_else(|| {
                DiError::Model(format!(
                    "Super type {} of {} is not registered",
                    super_id, definition.browse_name
                ))
            })?;
            if super_type.node_class != definition.node_class {
                return Err(DiError::Model(format!(
                    "{} cannot derive from {} of class {}",
                    definition.browse_name, super_type.browse_name, super_type.node_class
                )));
            }
        }

        log::debug!("Registered type {} ({})", definition.browse_name, definition.type_id);
        self.by_name
            .insert(definition.browse_name.clone(), definition.type_id.clone());
        self.types.insert(definition.type_id.clone(), definition);
        Ok(())
    }

    /// Register a model-defined data type
    ///
    /// # Errors
    /// Returns `DiError::Model` if the data type id is already registered
    pub fn register_data_type(&mut self, definition: DataTypeDefinition) -> DiResult<()> {
        if self.data_types.contains_key(&definition.data_type_id) {
            return Err(DiError::Model(format!(
                "Data type {} is already registered",
                definition.data_type_id
            )));
        }
        self.data_types
            .insert(definition.data_type_id.clone(), definition);
        Ok(())
    }

    pub fn get(&self, type_id: &NodeId) -> Option<&TypeDefinition> {
        self.types.get(type_id)
    }

    pub fn find_by_name(&self, browse_name: &QualifiedName) -> Option<&TypeDefinition> {
        self.by_name.get(browse_name).and_then(|id| self.types.get(id))
    }

    pub fn data_type(&self, data_type_id: &NodeId) -> Option<&DataTypeDefinition> {
        self.data_types.get(data_type_id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Type chain from `type_id` up to its root, most derived first
    ///
    /// # Errors
    /// Returns `DiError::NotFound` if `type_id` is not registered
    pub fn ancestry(&self, type_id: &NodeId) -> DiResult<Vec<&TypeDefinition>> {
        let mut chain = Vec::new();
        let mut current = Some(
            self.types
                .get(type_id)
                .ok_or_else(|| DiError::NotFound(format!("Type {}", type_id)))?,
        );
        while let Some(definition) = current {
            chain.push(definition);
            current = definition
                .super_type
                .as_ref()
                .and_then(|id| self.types.get(id));
        }
        Ok(chain)
    }

    /// Check whether `type_id` is `base` or derives from it
    pub fn is_subtype_of(&self, type_id: &NodeId, base: &NodeId) -> bool {
        self.ancestry(type_id)
            .map(|chain| chain.iter().any(|t| &t.type_id == base))
            .unwrap_or(false)
    }

    /// Find the slot for `browse_name`, searching from the most derived type
    pub fn declared_slot(&self, type_id: &NodeId, browse_name: &QualifiedName) -> Option<&ChildSlot> {
        self.ancestry(type_id)
            .ok()?
            .into_iter()
            .find_map(|t| t.slot(browse_name))
    }

    /// Every slot an instance of `type_id` may carry
    ///
    /// Slots of the most derived type come first, followed by each base type
    /// in turn. A slot redeclared by a subtype is listed once, at the
    /// subtype's position.
    pub fn slots_in_order(&self, type_id: &NodeId) -> Vec<&ChildSlot> {
        let mut seen = HashSet::new();
        let mut slots = Vec::new();
        for definition in self.ancestry(type_id).unwrap_or_default() {
            for slot in &definition.children {
                if seen.insert(&slot.browse_name) {
                    slots.push(slot);
                }
            }
        }
        slots
    }

    /// Slots that are created together with every instance of `type_id`
    pub fn mandatory_slots(&self, type_id: &NodeId) -> Vec<&ChildSlot> {
        self.slots_in_order(type_id)
            .into_iter()
            .filter(|s| s.is_mandatory())
            .collect()
    }

    /// Type definition used for nodes created without an explicit type
    pub fn default_type_definition(&self, node_class: NodeClass) -> Option<NodeId> {
        match node_class {
            NodeClass::Object => Some(well_known::base_object_type()),
            NodeClass::Variable => Some(well_known::base_data_variable_type()),
            _ => None,
        }
    }

    /// Data type of the variables a variable type describes, searching up the chain
    pub fn variable_type_data_type(&self, type_id: &NodeId) -> Option<NodeId> {
        self.ancestry(type_id)
            .ok()?
            .into_iter()
            .find_map(|t| t.data_type.clone())
    }

    /// Built-in encoding of a data type id
    pub fn resolve_data_type(&self, data_type_id: &NodeId) -> Option<DataType> {
        DataType::from_node_id(data_type_id)
            .or_else(|| self.data_types.get(data_type_id).map(|d| d.base))
    }

    /// Check a value against a data type id and value rank
    pub fn accepts_value(&self, data_type_id: &NodeId, value_rank: ValueRank, value: &Variant) -> bool {
        if let Some(definition) = self.data_types.get(data_type_id) {
            return match (value_rank, value) {
                (ValueRank::OneDimension, Variant::Array(items)) => {
                    items.iter().all(|v| definition.accepts(v))
                }
                (ValueRank::OneDimension, _) => false,
                (ValueRank::Scalar, v) => definition.accepts(v),
            };
        }
        match DataType::from_node_id(data_type_id) {
            Some(builtin) => value_rank.accepts(builtin, value),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_definition::ModellingRule;

    fn object_type(id: u32, name: &str, super_type: Option<u32>, children: Vec<ChildSlot>) -> TypeDefinition {
        TypeDefinition {
            type_id: NodeId::numeric(1, id),
            browse_name: QualifiedName::new(1, name),
            node_class: NodeClass::ObjectType,
            super_type: super_type.map(|s| NodeId::numeric(1, s)),
            is_abstract: false,
            data_type: None,
            children,
        }
    }

    fn property(name: &str, rule: ModellingRule) -> ChildSlot {
        ChildSlot {
            browse_name: QualifiedName::new(1, name),
            node_class: NodeClass::Variable,
            type_definition: Some(well_known::property_type()),
            modelling_rule: rule,
            data_type: Some(DataType::String.node_id()),
            value_rank: ValueRank::Scalar,
            default_value: None,
            signature: None,
        }
    }

    fn chain() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry
            .register_type(object_type(1, "Root", None, vec![property("A", ModellingRule::Optional)]))
            .unwrap();
        registry
            .register_type(object_type(
                2,
                "Middle",
                Some(1),
                vec![property("B", ModellingRule::Optional), property("C", ModellingRule::Optional)],
            ))
            .unwrap();
        registry
            .register_type(object_type(
                3,
                "Leaf",
                Some(2),
                vec![property("D", ModellingRule::Mandatory), property("B", ModellingRule::Mandatory)],
            ))
            .unwrap();
        registry
    }

    #[test]
    fn test_ancestry_is_most_derived_first() {
        let registry = chain();
        let names: Vec<_> = registry
            .ancestry(&NodeId::numeric(1, 3))
            .unwrap()
            .iter()
            .map(|t| t.browse_name.name.clone())
            .collect();
        assert_eq!(names, vec!["Leaf", "Middle", "Root"]);
    }

    #[test]
    fn test_slots_in_order_dedups_redeclared_slots() {
        let registry = chain();
        let slots: Vec<_> = registry
            .slots_in_order(&NodeId::numeric(1, 3))
            .iter()
            .map(|s| (s.browse_name.name.clone(), s.modelling_rule))
            .collect();
        assert_eq!(
            slots,
            vec![
                ("D".to_string(), ModellingRule::Mandatory),
                ("B".to_string(), ModellingRule::Mandatory),
                ("C".to_string(), ModellingRule::Optional),
                ("A".to_string(), ModellingRule::Optional),
            ]
        );
        assert_eq!(registry.mandatory_slots(&NodeId::numeric(1, 3)).len(), 2);
    }

    #[test]
    fn test_declared_slot_walks_to_base() {
        let registry = chain();
        let leaf = NodeId::numeric(1, 3);
        assert!(registry.declared_slot(&leaf, &QualifiedName::new(1, "A")).is_some());
        assert!(registry.declared_slot(&leaf, &QualifiedName::new(1, "a")).is_none());
    }

    #[test]
    fn test_is_subtype_of() {
        let registry = chain();
        assert!(registry.is_subtype_of(&NodeId::numeric(1, 3), &NodeId::numeric(1, 1)));
        assert!(registry.is_subtype_of(&NodeId::numeric(1, 2), &NodeId::numeric(1, 2)));
        assert!(!registry.is_subtype_of(&NodeId::numeric(1, 1), &NodeId::numeric(1, 3)));
    }

    #[test]
    fn test_register_rejects_unknown_super_type() {
        let mut registry = TypeRegistry::new();
        let err = registry.register_type(object_type(5, "Orphan", Some(99), Vec::new()));
        assert!(matches!(err, Err(DiError::Model(_))));
    }

    #[test]
    fn test_register_rejects_duplicate() {
        let mut registry = chain();
        let err = registry.register_type(object_type(1, "Root", None, Vec::new()));
        assert!(matches!(err, Err(DiError::Model(_))));
    }

    #[test]
    fn test_accepts_value_with_builtin_type() {
        let registry = TypeRegistry::new();
        assert!(registry.accepts_value(&DataType::String.node_id(), ValueRank::Scalar, &Variant::from("x")));
        assert!(!registry.accepts_value(&DataType::String.node_id(), ValueRank::Scalar, &Variant::Int32(1)));
        assert!(!registry.accepts_value(&NodeId::numeric(3, 1), ValueRank::Scalar, &Variant::Int32(1)));
    }
}
