//! STUN message header
//!
//! Fixed 20-byte prefix of every STUN message (RFC 5389 Section 6):
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |0 0|     STUN Message Type     |         Message Length        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         Magic Cookie                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                     Transaction ID (96 bits)                  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use crate::errors::StunError;
use crate::message_type::MessageType;

/// Magic cookie value defined in RFC 5389.
pub const MAGIC_COOKIE: u32 = 0x2112A442;

/// Decoded STUN header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub message_type: MessageType,
    /// Length of the attribute section, always a multiple of four
    pub message_length: u16,
    pub transaction_id: [u8; 12],
}

impl MessageHeader {
    /// Size of the STUN message header in bytes.
    pub const SIZE: usize = 20;

    pub fn new(message_type: MessageType, transaction_id: [u8; 12]) -> Self {
        Self {
            message_type,
            message_length: 0,
            transaction_id,
        }
    }

    /// Writes the header into `out`, using `length` for the length field.
    ///
    /// Integrity and fingerprint computations need the header with a
    /// length that differs from the final one, hence the explicit argument.
    pub fn write_to(&self, length: u16, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.message_type.to_u16().to_be_bytes());
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
        out.extend_from_slice(&self.transaction_id);
    }

    /// Encodes the header with its own length field.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::SIZE);
        self.write_to(self.message_length, &mut bytes);
        bytes
    }

    /// Decodes a header from the first 20 bytes.
    ///
    /// # Errors
    /// Fails on short input, a bad cookie, set leading bits or a length
    /// that is not 32-bit aligned.
    pub fn decode(bytes: &[u8]) -> Result<Self, StunError> {
        if bytes.len() < Self::SIZE {
            return Err(StunError::MessageTooShort);
        }

        let message_type = MessageType::from_u16(u16::from_be_bytes([bytes[0], bytes[1]]))?;

        let message_length = u16::from_be_bytes([bytes[2], bytes[3]]);
        if message_length % 4 != 0 {
            return Err(StunError::InvalidMessageFormat);
        }

        if bytes[4..8] != MAGIC_COOKIE.to_be_bytes() {
            return Err(StunError::InvalidMagicCookie);
        }

        let mut transaction_id = [0u8; 12];
        transaction_id.copy_from_slice(&bytes[8..Self::SIZE]);

        Ok(Self {
            message_type,
            message_length,
            transaction_id,
        })
    }
}
