//! Core types and utilities for the OPC UA Device Integration address space
//!
//! This crate provides node identity, namespace handling, value types and the
//! error taxonomy used throughout the workspace.

pub mod datatypes;
pub mod error;
pub mod namespace;
pub mod node_id;
pub mod status_code;

pub use datatypes::{DataType, LocalizedText, QualifiedName, ValueRank, Variant, VariantType};
pub use error::{DiError, DiResult};
pub use namespace::{NamespaceTable, DI_NAMESPACE_URI, OPC_UA_NAMESPACE_URI};
pub use node_id::{ExpandedNodeId, Identifier, NodeId};
pub use status_code::StatusCode;
