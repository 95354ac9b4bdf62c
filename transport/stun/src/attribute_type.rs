//! STUN attribute types
//!
//! Attribute codes used by ICE connectivity checks. Types below 0x8000 are
//! comprehension-required; the rest may be ignored when unknown.

/// STUN attribute types understood by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// MAPPED-ADDRESS (0x0001)
    MappedAddress,
    /// USERNAME (0x0006)
    Username,
    /// MESSAGE-INTEGRITY (0x0008)
    MessageIntegrity,
    /// ERROR-CODE (0x0009)
    ErrorCode,
    /// UNKNOWN-ATTRIBUTES (0x000A)
    UnknownAttributes,
    /// XOR-MAPPED-ADDRESS (0x0020)
    XorMappedAddress,
    /// PRIORITY (0x0024)
    Priority,
    /// USE-CANDIDATE (0x0025)
    UseCandidate,
    /// SOFTWARE (0x8022)
    Software,
    /// FINGERPRINT (0x8028)
    Fingerprint,
    /// ICE-CONTROLLED (0x8029)
    IceControlled,
    /// ICE-CONTROLLING (0x802A)
    IceControlling,
    /// GOOG-NETWORK-INFO (0xC057), network id and cost
    NetworkCost,
}

impl AttributeType {
    /// Converts the attribute type to its wire value.
    pub fn to_u16(self) -> u16 {
        match self {
            AttributeType::MappedAddress => 0x0001,
            AttributeType::Username => 0x0006,
            AttributeType::MessageIntegrity => 0x0008,
            AttributeType::ErrorCode => 0x0009,
            AttributeType::UnknownAttributes => 0x000A,
            AttributeType::XorMappedAddress => 0x0020,
            AttributeType::Priority => 0x0024,
            AttributeType::UseCandidate => 0x0025,
            AttributeType::Software => 0x8022,
            AttributeType::Fingerprint => 0x8028,
            AttributeType::IceControlled => 0x8029,
            AttributeType::IceControlling => 0x802A,
            AttributeType::NetworkCost => 0xC057,
        }
    }

    /// Maps a wire value back to a known attribute, `None` otherwise.
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            0x0001 => AttributeType::MappedAddress,
            0x0006 => AttributeType::Username,
            0x0008 => AttributeType::MessageIntegrity,
            0x0009 => AttributeType::ErrorCode,
            0x000A => AttributeType::UnknownAttributes,
            0x0020 => AttributeType::XorMappedAddress,
            0x0024 => AttributeType::Priority,
            0x0025 => AttributeType::UseCandidate,
            0x8022 => AttributeType::Software,
            0x8028 => AttributeType::Fingerprint,
            0x8029 => AttributeType::IceControlled,
            0x802A => AttributeType::IceControlling,
            0xC057 => AttributeType::NetworkCost,
            _ => return None,
        })
    }

    /// Comprehension-required range (0x0000-0x7FFF).
    pub fn is_comprehension_required(value: u16) -> bool {
        value < 0x8000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ice_attribute_codes() {
        assert_eq!(AttributeType::Priority.to_u16(), 0x0024);
        assert_eq!(AttributeType::UseCandidate.to_u16(), 0x0025);
        assert_eq!(AttributeType::MessageIntegrity.to_u16(), 0x0008);
        assert_eq!(AttributeType::Fingerprint.to_u16(), 0x8028);
        assert_eq!(AttributeType::NetworkCost.to_u16(), 0xC057);
    }

    #[test]
    fn test_from_u16_maps_back() {
        for attr in [
            AttributeType::Username,
            AttributeType::XorMappedAddress,
            AttributeType::IceControlling,
            AttributeType::NetworkCost,
        ] {
            assert_eq!(AttributeType::from_u16(attr.to_u16()), Some(attr));
        }
        assert_eq!(AttributeType::from_u16(0x1234), None);
    }

    #[test]
    fn test_comprehension_required() {
        assert!(AttributeType::is_comprehension_required(0x0025));
        assert!(!AttributeType::is_comprehension_required(0xC057));
    }
}
