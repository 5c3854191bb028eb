//! DeviceHealthEnumeration

use di_core::{DiError, DiResult, Variant};
use std::fmt;

/// Health of a device as reported by its `DeviceHealth` variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum DeviceHealth {
    #[default]
    Normal = 0,
    Failure = 1,
    CheckFunction = 2,
    OffSpec = 3,
    MaintenanceRequired = 4,
}

impl DeviceHealth {
    /// Create from the enumeration value
    ///
    /// # Errors
    /// Returns `DiError::InvalidData` for values outside 0..=4
    pub fn from_i32(value: i32) -> DiResult<Self> {
        match value {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Failure),
            2 => Ok(Self::CheckFunction),
            3 => Ok(Self::OffSpec),
            4 => Ok(Self::MaintenanceRequired),
            _ => Err(DiError::InvalidData(format!(
                "Invalid DeviceHealthEnumeration value: {}",
                value
            ))),
        }
    }

    pub fn to_i32(self) -> i32 {
        self as i32
    }

    /// Symbolic name used by the model document
    pub fn name(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Failure => "FAILURE",
            Self::CheckFunction => "CHECK_FUNCTION",
            Self::OffSpec => "OFF_SPEC",
            Self::MaintenanceRequired => "MAINTENANCE_REQUIRED",
        }
    }
}

impl fmt::Display for DeviceHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<DeviceHealth> for Variant {
    fn from(health: DeviceHealth) -> Self {
        Variant::Int32(health.to_i32())
    }
}

impl TryFrom<&Variant> for DeviceHealth {
    type Error = DiError;

    fn try_from(value: &Variant) -> DiResult<Self> {
        Self::from_i32(value.as_i32()?)
    }
}
