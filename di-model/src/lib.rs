//! Device Integration information model
//!
//! This crate provides the DI type model and the behavior attached to DI
//! objects:
//!
//! - type definitions and the type hierarchy resolver
//! - model documents describing the base and DI types
//! - the locking service of topology elements
//! - the software update state machines
//! - the condition field layout of DI alarms

pub mod alarm;
pub mod device_health;
pub mod locking;
pub mod model_file;
pub mod software_update;
pub mod type_definition;
pub mod type_registry;
pub mod well_known;

pub use alarm::ConditionFields;
pub use device_health::DeviceHealth;
pub use locking::{CallerIdentity, LockEvent, LockState, LockingService};
pub use model_file::{ModelDocument, standard_registry};
pub use software_update::{
    ConfirmationStateMachine, InstallationStateMachine, PowerCycleStateMachine,
    PrepareForUpdateStateMachine, SoftwarePackage, SoftwareUpdate, UpdateState, UpdateStateMachine,
};
pub use type_definition::{
    Argument, ChildSlot, DataTypeDefinition, EnumValue, MethodSignature, ModellingRule, NodeClass,
    TypeDefinition,
};
pub use type_registry::TypeRegistry;
