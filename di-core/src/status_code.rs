//! OPC UA status codes used by the address space

use serde::{Deserialize, Serialize};
use std::fmt;

/// 32-bit OPC UA status code
///
/// The two most significant bits carry the severity (00 good, 01 uncertain,
/// 10 bad).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusCode(u32);

impl StatusCode {
    pub const GOOD: Self = Self(0x0000_0000);
    pub const BAD_INTERNAL_ERROR: Self = Self(0x8002_0000);
    pub const BAD_DECODING_ERROR: Self = Self(0x8007_0000);
    pub const BAD_TIMEOUT: Self = Self(0x800A_0000);
    pub const BAD_USER_ACCESS_DENIED: Self = Self(0x801F_0000);
    pub const BAD_NODE_ID_UNKNOWN: Self = Self(0x8034_0000);
    pub const BAD_NOT_IMPLEMENTED: Self = Self(0x8040_0000);
    pub const BAD_TYPE_MISMATCH: Self = Self(0x8074_0000);
    pub const BAD_ARGUMENTS_MISSING: Self = Self(0x8076_0000);
    pub const BAD_INVALID_ARGUMENT: Self = Self(0x80AB_0000);
    pub const BAD_INVALID_STATE: Self = Self(0x80AF_0000);
    pub const BAD_TOO_MANY_ARGUMENTS: Self = Self(0x80E5_0000);

    /// Create from the raw 32-bit value
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Raw 32-bit value
    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_good(self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    pub const fn is_uncertain(self) -> bool {
        self.0 & 0xC000_0000 == 0x4000_0000
    }

    pub const fn is_bad(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        Self::GOOD
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity() {
        assert!(StatusCode::GOOD.is_good());
        assert!(!StatusCode::GOOD.is_bad());
        assert!(StatusCode::BAD_TIMEOUT.is_bad());
        assert!(StatusCode::new(0x4000_0000).is_uncertain());
    }

    #[test]
    fn test_display() {
        assert_eq!(StatusCode::BAD_NOT_IMPLEMENTED.to_string(), "0x80400000");
    }
}
