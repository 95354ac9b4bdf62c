//! STUN error types
//!
//! Everything here describes malformed or unauthenticated input. None of
//! these are fatal to a transport: the packet is simply dropped.

/// Errors that can occur while decoding or validating STUN messages.
#[derive(Debug, Clone, PartialEq)]
pub enum StunError {
    /// Leading bits set, bad length alignment or truncated attribute list
    InvalidMessageFormat,
    /// Invalid message type
    InvalidMessageType(u16),
    /// Invalid magic cookie
    InvalidMagicCookie,
    /// Declared length disagrees with the datagram size
    LengthMismatch { declared: usize, actual: usize },
    /// Message too short
    MessageTooShort,
    /// Attribute too short
    AttributeTooShort(u16),
    /// Invalid address family
    InvalidAddressFamily(u8),
    /// Attribute missing from the message
    MissingAttribute(&'static str),
    /// FINGERPRINT present but wrong
    FingerprintMismatch,
    /// MESSAGE-INTEGRITY did not verify with the supplied key
    IntegrityMismatch,
}

impl std::fmt::Display for StunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StunError::InvalidMessageFormat => write!(f, "Invalid message format"),
            StunError::InvalidMessageType(t) => write!(f, "Invalid message type: 0x{:04X}", t),
            StunError::InvalidMagicCookie => write!(f, "Invalid magic cookie"),
            StunError::LengthMismatch { declared, actual } => write!(
                f,
                "Length mismatch: header declares {} bytes, datagram carries {}",
                declared, actual
            ),
            StunError::MessageTooShort => write!(f, "Message too short"),
            StunError::AttributeTooShort(t) => write!(f, "Attribute 0x{:04X} too short", t),
            StunError::InvalidAddressFamily(fam) => {
                write!(f, "Invalid address family: 0x{:02X}", fam)
            }
            StunError::MissingAttribute(name) => write!(f, "Missing attribute: {}", name),
            StunError::FingerprintMismatch => write!(f, "FINGERPRINT mismatch"),
            StunError::IntegrityMismatch => write!(f, "MESSAGE-INTEGRITY mismatch"),
        }
    }
}

impl std::error::Error for StunError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_message_type() {
        let err = StunError::InvalidMessageType(0x9999);
        assert_eq!(err.to_string(), "Invalid message type: 0x9999");
    }

    #[test]
    fn test_error_display_length_mismatch() {
        let err = StunError::LengthMismatch {
            declared: 48,
            actual: 40,
        };
        assert_eq!(
            err.to_string(),
            "Length mismatch: header declares 48 bytes, datagram carries 40"
        );
    }

    #[test]
    fn test_error_display_attribute_too_short() {
        assert_eq!(
            StunError::AttributeTooShort(0x0024).to_string(),
            "Attribute 0x0024 too short"
        );
    }

    #[test]
    fn test_error_display_missing_attribute() {
        let err = StunError::MissingAttribute("USERNAME");
        assert_eq!(err.to_string(), "Missing attribute: USERNAME");
    }

    #[test]
    fn test_error_is_error_trait() {
        let err = StunError::IntegrityMismatch;
        let _: &dyn std::error::Error = &err;
    }
}
