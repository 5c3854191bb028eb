//! Data types used in the address space

pub mod data_type;
pub mod qualified_name;
pub mod variant;

// Re-export types
pub use data_type::{DataType, ValueRank};
pub use qualified_name::{LocalizedText, QualifiedName};
pub use variant::{Variant, VariantType};
