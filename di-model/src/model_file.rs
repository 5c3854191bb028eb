//! Model documents
//!
//! Type definitions are data, not code. A model document is a versioned JSON
//! description of the data types and object/variable types of one namespace.
//! References between nodes use expanded node ids (`nsu=<uri>;i=<n>`) so a
//! document does not depend on namespace indexes; they are resolved through
//! the namespace table when the document is registered.
//!
//! The base OPC UA subset and the Device Integration model ship with the
//! crate under `models/` and are embedded as the defaults.

use crate::type_definition::{
    Argument, ChildSlot, DataTypeDefinition, EnumValue, MethodSignature, ModellingRule, NodeClass,
    TypeDefinition,
};
use crate::type_registry::TypeRegistry;
use di_core::{
    DataType, DiError, DiResult, ExpandedNodeId, NamespaceTable, QualifiedName, ValueRank, Variant,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

const BASE_MODEL: &str = include_str!("../models/Opc.Ua.Base.json");
const DI_MODEL: &str = include_str!("../models/Opc.Ua.Di.json");

/// A versioned model document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDocument {
    pub model_uri: String,
    pub version: String,
    pub publication_date: String,
    /// Model URIs that must be registered before this one
    #[serde(default)]
    pub required_models: Vec<String>,
    #[serde(default)]
    pub data_types: Vec<DataTypeDoc>,
    #[serde(default)]
    pub types: Vec<TypeDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataTypeDoc {
    pub id: ExpandedNodeId,
    pub browse_name: String,
    pub base: DataType,
    #[serde(default)]
    pub enum_values: Vec<EnumValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDoc {
    pub id: ExpandedNodeId,
    pub browse_name: String,
    pub node_class: NodeClass,
    #[serde(default)]
    pub super_type: Option<ExpandedNodeId>,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub data_type: Option<ExpandedNodeId>,
    #[serde(default)]
    pub children: Vec<SlotDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotDoc {
    pub browse_name: String,
    /// Namespace of the browse name, defaults to the document's model URI
    #[serde(default)]
    pub browse_namespace: Option<String>,
    pub node_class: NodeClass,
    #[serde(default)]
    pub type_definition: Option<ExpandedNodeId>,
    pub modelling_rule: ModellingRule,
    #[serde(default)]
    pub data_type: Option<ExpandedNodeId>,
    #[serde(default)]
    pub value_rank: ValueRank,
    #[serde(default)]
    pub default_value: Option<Variant>,
    #[serde(default)]
    pub input_arguments: Vec<ArgumentDoc>,
    #[serde(default)]
    pub output_arguments: Vec<ArgumentDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentDoc {
    pub name: String,
    pub data_type: ExpandedNodeId,
    #[serde(default)]
    pub value_rank: ValueRank,
}

impl ModelDocument {
    /// Parse a model document from JSON text
    pub fn from_json(json: &str) -> DiResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a model document from a file
    pub fn from_path(path: impl AsRef<Path>) -> DiResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let document = Self::from_json(&text)?;
        log::info!(
            "Loaded model {} version {} from {}",
            document.model_uri,
            document.version,
            path.as_ref().display()
        );
        Ok(document)
    }

    /// Base OPC UA subset shipped with the crate
    pub fn builtin_base() -> DiResult<Self> {
        Self::from_json(BASE_MODEL)
    }

    /// Device Integration model shipped with the crate
    pub fn builtin_di() -> DiResult<Self> {
        Self::from_json(DI_MODEL)
    }

    /// Register the document's namespace, data types and types
    ///
    /// # Errors
    /// Returns `DiError::Model` if a required model is missing, a type is
    /// malformed, or a slot references an unknown type; `DiError::NotFound`
    /// if a reference names an unregistered namespace.
    pub fn register(&self, namespaces: &mut NamespaceTable, registry: &mut TypeRegistry) -> DiResult<()> {
        for required in &self.required_models {
            if namespaces.index_of(required).is_none() {
                return Err(DiError::Model(format!(
                    "Model {} requires {} to be registered first",
                    self.model_uri, required
                )));
            }
        }
        let namespace_index = namespaces.register(&self.model_uri);

        for doc in &self.data_types {
            registry.register_data_type(DataTypeDefinition {
                data_type_id: doc.id.resolve(namespaces)?,
                browse_name: QualifiedName::new(namespace_index, &doc.browse_name),
                base: doc.base,
                enum_values: doc.enum_values.clone(),
            })?;
        }

        let mut registered = Vec::with_capacity(self.types.len());
        for doc in &self.types {
            let definition = self.resolve_type(doc, namespace_index, namespaces)?;
            registered.push(definition.type_id.clone());
            registry.register_type(definition)?;
        }

        for type_id in &registered {
            let Some(definition) = registry.get(type_id) else {
                continue;
            };
            for slot in &definition.children {
                if let Some(child_type) = &slot.type_definition {
                    if registry.get(child_type).is_none() {
                        return Err(DiError::Model(format!(
                            "Slot {} of {} references unknown type {}",
                            slot.browse_name, definition.browse_name, child_type
                        )));
                    }
                }
            }
        }

        log::info!(
            "Registered model {} ({} types, {} data types) as namespace {}",
            self.model_uri,
            self.types.len(),
            self.data_types.len(),
            namespace_index
        );
        Ok(())
    }

    fn resolve_type(
        &self,
        doc: &TypeDoc,
        namespace_index: u16,
        namespaces: &NamespaceTable,
    ) -> DiResult<TypeDefinition> {
        let children = doc
            .children
            .iter()
            .map(|slot| Self::resolve_slot(slot, namespace_index, namespaces))
            .collect::<DiResult<Vec<_>>>()?;
        Ok(TypeDefinition {
            type_id: doc.id.resolve(namespaces)?,
            browse_name: QualifiedName::new(namespace_index, &doc.browse_name),
            node_class: doc.node_class,
            super_type: doc.super_type.as_ref().map(|s| s.resolve(namespaces)).transpose()?,
            is_abstract: doc.is_abstract,
            data_type: doc.data_type.as_ref().map(|d| d.resolve(namespaces)).transpose()?,
            children,
        })
    }

    fn resolve_slot(slot: &SlotDoc, namespace_index: u16, namespaces: &NamespaceTable) -> DiResult<ChildSlot> {
        let browse_namespace = match &slot.browse_namespace {
            Some(uri) => namespaces
                .index_of(uri)
                .ok_or_else(|| DiError::NotFound(format!("Namespace not registered: {}", uri)))?,
            None => namespace_index,
        };

        let signature = match slot.node_class {
            NodeClass::Method => {
                if slot.type_definition.is_some() {
                    return Err(DiError::Model(format!(
                        "Method {} cannot have a type definition",
                        slot.browse_name
                    )));
                }
                Some(MethodSignature {
                    input_arguments: Self::resolve_arguments(&slot.input_arguments, namespaces)?,
                    output_arguments: Self::resolve_arguments(&slot.output_arguments, namespaces)?,
                })
            }
            NodeClass::Object | NodeClass::Variable => {
                if slot.type_definition.is_none() {
                    return Err(DiError::Model(format!(
                        "{} {} needs a type definition",
                        slot.node_class, slot.browse_name
                    )));
                }
                None
            }
            NodeClass::ObjectType | NodeClass::VariableType => {
                return Err(DiError::Model(format!(
                    "Slot {} cannot be a {}",
                    slot.browse_name, slot.node_class
                )));
            }
        };

        Ok(ChildSlot {
            browse_name: QualifiedName::new(browse_namespace, &slot.browse_name),
            node_class: slot.node_class,
            type_definition: slot
                .type_definition
                .as_ref()
                .map(|t| t.resolve(namespaces))
                .transpose()?,
            modelling_rule: slot.modelling_rule,
            data_type: slot.data_type.as_ref().map(|d| d.resolve(namespaces)).transpose()?,
            value_rank: slot.value_rank,
            default_value: slot.default_value.clone(),
            signature,
        })
    }

    fn resolve_arguments(docs: &[ArgumentDoc], namespaces: &NamespaceTable) -> DiResult<Vec<Argument>> {
        docs.iter()
            .map(|doc| {
                Ok(Argument {
                    name: doc.name.clone(),
                    data_type: doc.data_type.resolve(namespaces)?,
                    value_rank: doc.value_rank,
                })
            })
            .collect()
    }
}

/// Register the shipped base and DI models and return the resulting registry
pub fn standard_registry(namespaces: &mut NamespaceTable) -> DiResult<TypeRegistry> {
    let mut registry = TypeRegistry::new();
    ModelDocument::builtin_base()?.register(namespaces, &mut registry)?;
    ModelDocument::builtin_di()?.register(namespaces, &mut registry)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::well_known::{self, di, di_node_id, names};
    use di_core::DI_NAMESPACE_URI;

    fn standard() -> (NamespaceTable, TypeRegistry) {
        let mut namespaces = NamespaceTable::new();
        let registry = standard_registry(&mut namespaces).unwrap();
        (namespaces, registry)
    }

    #[test]
    fn test_builtin_models_parse() {
        let base = ModelDocument::builtin_base().unwrap();
        let di = ModelDocument::builtin_di().unwrap();
        assert_eq!(base.model_uri, "http://opcfoundation.org/UA/");
        assert_eq!(di.model_uri, DI_NAMESPACE_URI);
        assert!(!di.types.is_empty());
    }

    #[test]
    fn test_standard_registry_registers_di_namespace() {
        let (namespaces, registry) = standard();
        assert_eq!(namespaces.index_of(DI_NAMESPACE_URI), Some(1));
        assert!(registry.get(&di_node_id(&namespaces, di::DEVICE_TYPE).unwrap()).is_some());
    }

    #[test]
    fn test_device_type_ancestry() {
        let (namespaces, registry) = standard();
        let device = di_node_id(&namespaces, di::DEVICE_TYPE).unwrap();
        let names: Vec<_> = registry
            .ancestry(&device)
            .unwrap()
            .iter()
            .map(|t| t.browse_name.name.clone())
            .collect();
        assert_eq!(
            names,
            vec!["DeviceType", "ComponentType", "TopologyElementType", "BaseObjectType"]
        );
    }

    #[test]
    fn test_locking_services_signatures() {
        let (namespaces, registry) = standard();
        let locking = di_node_id(&namespaces, di::LOCKING_SERVICES_TYPE).unwrap();
        let ns = namespaces.index_of(DI_NAMESPACE_URI).unwrap();
        let init = registry
            .declared_slot(&locking, &QualifiedName::new(ns, names::INIT_LOCK))
            .unwrap();
        let signature = init.signature.as_ref().unwrap();
        assert_eq!(signature.input_arguments.len(), 1);
        assert_eq!(signature.input_arguments[0].data_type, DataType::String.node_id());
        assert_eq!(signature.output_arguments[0].data_type, DataType::Int32.node_id());
    }

    #[test]
    fn test_device_health_enumeration_registered() {
        let (namespaces, registry) = standard();
        let health = di_node_id(&namespaces, di::DEVICE_HEALTH_ENUMERATION).unwrap();
        let definition = registry.data_type(&health).unwrap();
        assert_eq!(definition.base, DataType::Enumeration);
        assert_eq!(definition.enum_name(4), Some("MAINTENANCE_REQUIRED"));
    }

    #[test]
    fn test_failure_alarm_derives_from_alarm_condition() {
        let (namespaces, registry) = standard();
        let failure = di_node_id(&namespaces, di::FAILURE_ALARM_TYPE).unwrap();
        assert!(registry.is_subtype_of(&failure, &well_known::alarm_condition_type()));
        assert!(registry.is_subtype_of(&failure, &well_known::base_event_type()));
    }

    #[test]
    fn test_register_requires_dependencies() {
        let mut namespaces = NamespaceTable::new();
        let mut registry = TypeRegistry::new();
        let err = ModelDocument::builtin_di()
            .unwrap()
            .register(&mut namespaces, &mut registry);
        assert!(matches!(err, Err(DiError::Model(_))));
    }

    #[test]
    fn test_slot_with_unknown_type_is_rejected() {
        let json = r#"{
            "model_uri": "urn:test",
            "version": "1.0",
            "publication_date": "2026-01-01",
            "types": [
                { "id": "nsu=urn:test;i=1", "browse_name": "Broken", "node_class": "ObjectType",
                  "children": [
                    { "browse_name": "Child", "node_class": "Object",
                      "type_definition": "nsu=urn:test;i=99", "modelling_rule": "Optional" }
                  ] }
            ]
        }"#;
        let mut namespaces = NamespaceTable::new();
        let mut registry = TypeRegistry::new();
        let err = ModelDocument::from_json(json)
            .unwrap()
            .register(&mut namespaces, &mut registry);
        assert!(matches!(err, Err(DiError::Model(_))));
    }

    #[test]
    fn test_method_slot_with_type_definition_is_rejected() {
        let json = r#"{
            "model_uri": "urn:test",
            "version": "1.0",
            "publication_date": "2026-01-01",
            "types": [
                { "id": "nsu=urn:test;i=1", "browse_name": "Broken", "node_class": "ObjectType",
                  "children": [
                    { "browse_name": "Run", "node_class": "Method",
                      "type_definition": "i=58", "modelling_rule": "Mandatory" }
                  ] }
            ]
        }"#;
        let mut namespaces = NamespaceTable::new();
        let mut registry = TypeRegistry::new();
        ModelDocument::builtin_base()
            .unwrap()
            .register(&mut namespaces, &mut registry)
            .unwrap();
        let err = ModelDocument::from_json(json)
            .unwrap()
            .register(&mut namespaces, &mut registry);
        assert!(matches!(err, Err(DiError::Model(_))));
    }

    #[test]
    fn test_from_path_reads_file() {
        let path = std::env::temp_dir().join(format!("di-model-{}.json", std::process::id()));
        std::fs::write(&path, DI_MODEL).unwrap();
        let document = ModelDocument::from_path(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(document.model_uri, DI_NAMESPACE_URI);
    }
}
