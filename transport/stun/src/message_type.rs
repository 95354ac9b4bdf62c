//! STUN message types
//!
//! The 14-bit message type interleaves a 12-bit method with a 2-bit class
//! (RFC 5389 Section 6):
//!
//! ```text
//!  0                 1
//!  2  3  4 5 6 7 8 9 0 1 2 3 4 5
//! +--+--+-+-+-+-+-+-+-+-+-+-+-+-+
//! |M |M |M|M|M|C|M|M|M|C|M|M|M|M|
//! |11|10|9|8|7|1|6|5|4|0|3|2|1|0|
//! +--+--+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use crate::errors::StunError;

/// The Binding method, the only one ICE connectivity checks use.
pub const METHOD_BINDING: u16 = 0x0001;

/// Message class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    Request,
    Indication,
    SuccessResponse,
    ErrorResponse,
}

impl MessageClass {
    fn bits(self) -> u16 {
        match self {
            MessageClass::Request => 0b00,
            MessageClass::Indication => 0b01,
            MessageClass::SuccessResponse => 0b10,
            MessageClass::ErrorResponse => 0b11,
        }
    }

    fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0b00 => MessageClass::Request,
            0b01 => MessageClass::Indication,
            0b10 => MessageClass::SuccessResponse,
            _ => MessageClass::ErrorResponse,
        }
    }
}

/// A (method, class) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageType {
    pub method: u16,
    pub class: MessageClass,
}

impl MessageType {
    /// Binding Request (0x0001)
    pub const BINDING_REQUEST: MessageType = MessageType::binding(MessageClass::Request);
    /// Binding Indication (0x0011)
    pub const BINDING_INDICATION: MessageType = MessageType::binding(MessageClass::Indication);
    /// Binding Success Response (0x0101)
    pub const BINDING_SUCCESS: MessageType = MessageType::binding(MessageClass::SuccessResponse);
    /// Binding Error Response (0x0111)
    pub const BINDING_ERROR: MessageType = MessageType::binding(MessageClass::ErrorResponse);

    const fn binding(class: MessageClass) -> Self {
        MessageType {
            method: METHOD_BINDING,
            class,
        }
    }

    /// Converts the message type to its wire value.
    pub fn to_u16(self) -> u16 {
        let m = self.method & 0x0FFF;
        let c = self.class.bits();
        (m & 0x000F) | ((m & 0x0070) << 1) | ((m & 0x0F80) << 2) | ((c & 0b01) << 4) | ((c & 0b10) << 7)
    }

    /// Parses a wire value.
    ///
    /// # Errors
    /// `InvalidMessageType` when either of the two most significant bits is set.
    pub fn from_u16(value: u16) -> Result<Self, StunError> {
        if value & 0xC000 != 0 {
            return Err(StunError::InvalidMessageType(value));
        }
        let method = (value & 0x000F) | ((value >> 1) & 0x0070) | ((value >> 2) & 0x0F80);
        let class = ((value >> 4) & 0b01) | ((value >> 7) & 0b10);
        Ok(MessageType {
            method,
            class: MessageClass::from_bits(class),
        })
    }

    pub fn is_binding(self) -> bool {
        self.method == METHOD_BINDING
    }

    /// Success and error responses.
    pub fn is_response(self) -> bool {
        matches!(
            self.class,
            MessageClass::SuccessResponse | MessageClass::ErrorResponse
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_wire_values() {
        assert_eq!(MessageType::BINDING_REQUEST.to_u16(), 0x0001);
        assert_eq!(MessageType::BINDING_INDICATION.to_u16(), 0x0011);
        assert_eq!(MessageType::BINDING_SUCCESS.to_u16(), 0x0101);
        assert_eq!(MessageType::BINDING_ERROR.to_u16(), 0x0111);
    }

    #[test]
    fn test_from_u16_binding() {
        assert_eq!(
            MessageType::from_u16(0x0101).unwrap(),
            MessageType::BINDING_SUCCESS
        );
        assert_eq!(
            MessageType::from_u16(0x0111).unwrap().class,
            MessageClass::ErrorResponse
        );
    }

    #[test]
    fn test_other_method_decodes() {
        // TURN Allocate success response
        let allocate = MessageType::from_u16(0x0103).unwrap();
        assert_eq!(allocate.method, 0x0003);
        assert_eq!(allocate.class, MessageClass::SuccessResponse);
        assert!(!allocate.is_binding());
        assert!(allocate.is_response());
    }

    #[test]
    fn test_high_bits_rejected() {
        assert_eq!(
            MessageType::from_u16(0x8001),
            Err(StunError::InvalidMessageType(0x8001))
        );
    }
}
