//! Decoded STUN message
//!
//! A [`Message`] keeps the raw datagram next to its parsed attributes so
//! MESSAGE-INTEGRITY can be checked later, once the caller knows which
//! key applies.

use std::net::SocketAddr;

use crate::attribute::{RawAttribute, parse_attributes};
use crate::attribute_type::AttributeType;
use crate::error_code::ErrorCode;
use crate::errors::StunError;
use crate::integrity::{fingerprint_crc, verify_integrity};
use crate::message_header::MessageHeader;
use crate::message_type::{MessageClass, MessageType};
use crate::network_cost::NetworkCost;
use crate::xor_mapped_address;

#[derive(Debug, Clone)]
pub struct Message {
    pub header: MessageHeader,
    attributes: Vec<RawAttribute>,
    raw: Vec<u8>,
}

impl Message {
    /// Parses and structurally validates a datagram.
    ///
    /// The datagram must hold exactly one message. A FINGERPRINT, when
    /// present, must be last and must match. Attributes placed after
    /// MESSAGE-INTEGRITY are ignored per RFC 5389 Section 15.4.
    ///
    /// # Errors
    /// Any framing problem; such datagrams are not STUN.
    pub fn decode(bytes: &[u8]) -> Result<Self, StunError> {
        let header = MessageHeader::decode(bytes)?;

        let declared = MessageHeader::SIZE + header.message_length as usize;
        if bytes.len() != declared {
            return Err(StunError::LengthMismatch {
                declared,
                actual: bytes.len(),
            });
        }

        let mut attributes = parse_attributes(&bytes[MessageHeader::SIZE..], MessageHeader::SIZE)?;

        if let Some(pos) = attributes
            .iter()
            .position(|a| a.attr_type == AttributeType::Fingerprint.to_u16())
        {
            let attr = &attributes[pos];
            if pos + 1 != attributes.len() || attr.value.len() != 4 {
                return Err(StunError::FingerprintMismatch);
            }
            let received = u32::from_be_bytes([attr.value[0], attr.value[1], attr.value[2], attr.value[3]]);
            if fingerprint_crc(&bytes[..attr.offset]) != received {
                return Err(StunError::FingerprintMismatch);
            }
        }

        // Only FINGERPRINT may follow MESSAGE-INTEGRITY (RFC 5389 Section 15.4)
        if let Some(pos) = attributes
            .iter()
            .position(|a| a.attr_type == AttributeType::MessageIntegrity.to_u16())
        {
            let mut index = 0;
            attributes.retain(|a| {
                index += 1;
                index <= pos + 1 || a.attr_type == AttributeType::Fingerprint.to_u16()
            });
        }

        Ok(Self {
            header,
            attributes,
            raw: bytes.to_vec(),
        })
    }

    pub fn message_type(&self) -> MessageType {
        self.header.message_type
    }

    pub fn class(&self) -> MessageClass {
        self.header.message_type.class
    }

    pub fn transaction_id(&self) -> [u8; 12] {
        self.header.transaction_id
    }

    pub fn attributes(&self) -> &[RawAttribute] {
        &self.attributes
    }

    /// Raw bytes the message was decoded from.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// First attribute of the given type.
    pub fn get(&self, attr: AttributeType) -> Option<&RawAttribute> {
        let code = attr.to_u16();
        self.attributes.iter().find(|a| a.attr_type == code)
    }

    pub fn has(&self, attr: AttributeType) -> bool {
        self.get(attr).is_some()
    }

    /// USERNAME as text, `None` when absent or not UTF-8.
    pub fn username(&self) -> Option<&str> {
        self.get(AttributeType::Username)
            .and_then(|a| std::str::from_utf8(&a.value).ok())
    }

    /// PRIORITY value.
    pub fn priority(&self) -> Option<u32> {
        let value = &self.get(AttributeType::Priority)?.value;
        let bytes: [u8; 4] = value.get(..4)?.try_into().ok()?;
        Some(u32::from_be_bytes(bytes))
    }

    pub fn use_candidate(&self) -> bool {
        self.has(AttributeType::UseCandidate)
    }

    pub fn network_cost(&self) -> Option<NetworkCost> {
        NetworkCost::decode(&self.get(AttributeType::NetworkCost)?.value).ok()
    }

    /// Tie-breaker from ICE-CONTROLLING.
    pub fn ice_controlling(&self) -> Option<u64> {
        Self::tie_breaker(self.get(AttributeType::IceControlling)?)
    }

    /// Tie-breaker from ICE-CONTROLLED.
    pub fn ice_controlled(&self) -> Option<u64> {
        Self::tie_breaker(self.get(AttributeType::IceControlled)?)
    }

    fn tie_breaker(attr: &RawAttribute) -> Option<u64> {
        let bytes: [u8; 8] = attr.value.get(..8)?.try_into().ok()?;
        Some(u64::from_be_bytes(bytes))
    }

    pub fn xor_mapped_address(&self) -> Option<SocketAddr> {
        let attr = self.get(AttributeType::XorMappedAddress)?;
        xor_mapped_address::decode(&attr.value, &self.header.transaction_id).ok()
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::decode(&self.get(AttributeType::ErrorCode)?.value).ok()
    }

    /// Comprehension-required attribute types this crate does not know.
    pub fn unknown_required_attributes(&self) -> Vec<u16> {
        self.attributes
            .iter()
            .map(|a| a.attr_type)
            .filter(|t| AttributeType::is_comprehension_required(*t) && AttributeType::from_u16(*t).is_none())
            .collect()
    }

    /// Verifies MESSAGE-INTEGRITY with a short-term credential key.
    ///
    /// # Errors
    /// `MissingAttribute` when the message carries no integrity,
    /// `IntegrityMismatch` when the HMAC does not verify.
    pub fn check_integrity(&self, key: &[u8]) -> Result<(), StunError> {
        let attr = self
            .get(AttributeType::MessageIntegrity)
            .ok_or(StunError::MissingAttribute("MESSAGE-INTEGRITY"))?;
        if verify_integrity(&self.raw[..attr.offset], key, &attr.value) {
            Ok(())
        } else {
            Err(StunError::IntegrityMismatch)
        }
    }
}
