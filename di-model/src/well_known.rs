//! Well-known node ids and browse names
//!
//! Base namespace ids are fixed. Device Integration ids are numeric values
//! inside the DI namespace, whose index depends on the server's namespace
//! table; use [`di_node_id`] to resolve them.

use di_core::{DI_NAMESPACE_URI, DiError, DiResult, NamespaceTable, NodeId};

pub fn base_object_type() -> NodeId {
    NodeId::numeric(0, 58)
}

pub fn folder_type() -> NodeId {
    NodeId::numeric(0, 61)
}

pub fn base_variable_type() -> NodeId {
    NodeId::numeric(0, 62)
}

pub fn base_data_variable_type() -> NodeId {
    NodeId::numeric(0, 63)
}

pub fn property_type() -> NodeId {
    NodeId::numeric(0, 68)
}

pub fn objects_folder() -> NodeId {
    NodeId::numeric(0, 85)
}

pub fn base_event_type() -> NodeId {
    NodeId::numeric(0, 2041)
}

pub fn finite_state_machine_type() -> NodeId {
    NodeId::numeric(0, 2771)
}

pub fn condition_type() -> NodeId {
    NodeId::numeric(0, 2782)
}

pub fn acknowledgeable_condition_type() -> NodeId {
    NodeId::numeric(0, 2881)
}

pub fn alarm_condition_type() -> NodeId {
    NodeId::numeric(0, 2915)
}

pub fn two_state_variable_type() -> NodeId {
    NodeId::numeric(0, 8995)
}

/// Numeric ids inside the DI namespace
pub mod di {
    pub const TOPOLOGY_ELEMENT_TYPE: u32 = 1001;
    pub const DEVICE_TYPE: u32 = 1002;
    pub const BLOCK_TYPE: u32 = 1003;
    pub const CONFIGURABLE_OBJECT_TYPE: u32 = 1004;
    pub const FUNCTIONAL_GROUP_TYPE: u32 = 1005;
    pub const PROTOCOL_TYPE: u32 = 1006;
    pub const DEVICE_HEALTH_ENUMERATION: u32 = 6244;
    pub const NETWORK_TYPE: u32 = 6247;
    pub const CONNECTION_POINT_TYPE: u32 = 6308;
    pub const LOCKING_SERVICES_TYPE: u32 = 6388;
    pub const COMPONENT_TYPE: u32 = 15063;
    pub const DEVICE_HEALTH_DIAGNOSTIC_ALARM_TYPE: u32 = 15143;
    pub const FAILURE_ALARM_TYPE: u32 = 15292;
    pub const SOFTWARE_UPDATE_TYPE: u32 = 1;
    pub const PREPARE_FOR_UPDATE_STATE_MACHINE_TYPE: u32 = 213;
    pub const INSTALLATION_STATE_MACHINE_TYPE: u32 = 115;
    pub const POWER_CYCLE_STATE_MACHINE_TYPE: u32 = 285;
    pub const CONFIRMATION_STATE_MACHINE_TYPE: u32 = 297;
}

/// Browse names used by the behavior bound to DI objects
pub mod names {
    pub const LOCK: &str = "Lock";
    pub const LOCKED: &str = "Locked";
    pub const LOCKING_CLIENT: &str = "LockingClient";
    pub const LOCKING_USER: &str = "LockingUser";
    pub const REMAINING_LOCK_TIME: &str = "RemainingLockTime";
    pub const INIT_LOCK: &str = "InitLock";
    pub const RENEW_LOCK: &str = "RenewLock";
    pub const EXIT_LOCK: &str = "ExitLock";
    pub const BREAK_LOCK: &str = "BreakLock";

    pub const DEVICE_HEALTH: &str = "DeviceHealth";

    pub const SOFTWARE_UPDATE: &str = "SoftwareUpdate";
    pub const PREPARE_FOR_UPDATE: &str = "PrepareForUpdate";
    pub const INSTALLATION: &str = "Installation";
    pub const POWER_CYCLE: &str = "PowerCycle";
    pub const CONFIRMATION: &str = "Confirmation";
    pub const CURRENT_STATE: &str = "CurrentState";
    pub const PERCENT_COMPLETE: &str = "PercentComplete";
    pub const CONFIRMATION_TIMEOUT: &str = "ConfirmationTimeout";
    pub const PREPARE: &str = "Prepare";
    pub const ABORT: &str = "Abort";
    pub const RESUME: &str = "Resume";
    pub const INSTALL_SOFTWARE_PACKAGE: &str = "InstallSoftwarePackage";
    pub const CONFIRM: &str = "Confirm";
}

/// Resolve a numeric DI id through the namespace table
///
/// # Errors
/// Returns `DiError::NotFound` if the DI namespace is not registered
pub fn di_node_id(namespaces: &NamespaceTable, id: u32) -> DiResult<NodeId> {
    let index = namespaces
        .index_of(DI_NAMESPACE_URI)
        .ok_or_else(|| DiError::NotFound(format!("Namespace not registered: {}", DI_NAMESPACE_URI)))?;
    Ok(NodeId::numeric(index, id))
}
