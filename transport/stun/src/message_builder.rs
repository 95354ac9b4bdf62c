//! STUN message builder
//!
//! Fluent construction of binding requests and responses. MESSAGE-INTEGRITY
//! and FINGERPRINT are appended last by [`MessageBuilder::build`], in that
//! order.

use std::net::SocketAddr;

use crate::attribute::write_attribute;
use crate::attribute_type::AttributeType;
use crate::error_code::ErrorCode;
use crate::integrity::{FINGERPRINT_ATTR_LEN, INTEGRITY_ATTR_LEN, fingerprint_crc, message_integrity};
use crate::message_header::MessageHeader;
use crate::message_type::MessageType;
use crate::network_cost::NetworkCost;
use crate::xor_mapped_address;

/// Builder for STUN messages.
///
/// The transaction ID is random unless set explicitly; responses copy it
/// from the request they answer.
///
/// ```
/// use stun::{Message, MessageBuilder, MessageType};
///
/// let bytes = MessageBuilder::new(MessageType::BINDING_REQUEST)
///     .username("remote:local")
///     .priority(0x6EFFFFFF)
///     .use_candidate()
///     .build(Some(b"remote-password"), true);
///
/// let message = Message::decode(&bytes).unwrap();
/// assert!(message.use_candidate());
/// assert!(message.check_integrity(b"remote-password").is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    header: MessageHeader,
    body: Vec<u8>,
}

impl MessageBuilder {
    /// Starts a message with a random transaction ID.
    pub fn new(message_type: MessageType) -> Self {
        Self {
            header: MessageHeader::new(message_type, rand::random::<[u8; 12]>()),
            body: Vec::new(),
        }
    }

    /// Starts a response to `request_id`.
    pub fn response_to(message_type: MessageType, request_id: [u8; 12]) -> Self {
        Self {
            header: MessageHeader::new(message_type, request_id),
            body: Vec::new(),
        }
    }

    pub fn transaction_id(mut self, id: [u8; 12]) -> Self {
        self.header.transaction_id = id;
        self
    }

    fn attribute(mut self, attr: AttributeType, value: &[u8]) -> Self {
        write_attribute(&mut self.body, attr.to_u16(), value);
        self
    }

    /// Adds an attribute by numeric type.
    pub fn raw_attribute(mut self, attr_type: u16, value: &[u8]) -> Self {
        write_attribute(&mut self.body, attr_type, value);
        self
    }

    pub fn username(self, username: &str) -> Self {
        self.attribute(AttributeType::Username, username.as_bytes())
    }

    pub fn priority(self, priority: u32) -> Self {
        self.attribute(AttributeType::Priority, &priority.to_be_bytes())
    }

    pub fn use_candidate(self) -> Self {
        self.attribute(AttributeType::UseCandidate, &[])
    }

    pub fn ice_controlling(self, tie_breaker: u64) -> Self {
        self.attribute(AttributeType::IceControlling, &tie_breaker.to_be_bytes())
    }

    pub fn ice_controlled(self, tie_breaker: u64) -> Self {
        self.attribute(AttributeType::IceControlled, &tie_breaker.to_be_bytes())
    }

    pub fn network_cost(self, cost: NetworkCost) -> Self {
        self.attribute(AttributeType::NetworkCost, &cost.encode())
    }

    pub fn xor_mapped_address(self, addr: SocketAddr) -> Self {
        let value = xor_mapped_address::encode(addr, &self.header.transaction_id);
        self.attribute(AttributeType::XorMappedAddress, &value)
    }

    pub fn error_code(self, error: &ErrorCode) -> Self {
        self.attribute(AttributeType::ErrorCode, &error.encode())
    }

    pub fn unknown_attributes(self, types: &[u16]) -> Self {
        let value: Vec<u8> = types.iter().flat_map(|t| t.to_be_bytes()).collect();
        self.attribute(AttributeType::UnknownAttributes, &value)
    }

    pub fn software(self, name: &str) -> Self {
        self.attribute(AttributeType::Software, name.as_bytes())
    }

    /// Serializes the message.
    ///
    /// # Arguments
    /// * `integrity_key` - short-term password; adds MESSAGE-INTEGRITY when set
    /// * `fingerprint` - whether to append FINGERPRINT
    pub fn build(self, integrity_key: Option<&[u8]>, fingerprint: bool) -> Vec<u8> {
        let trailer = integrity_key.map_or(0, |_| INTEGRITY_ATTR_LEN)
            + if fingerprint { FINGERPRINT_ATTR_LEN } else { 0 };

        let mut out = Vec::with_capacity(MessageHeader::SIZE + self.body.len() + trailer);
        self.header.write_to(self.body.len() as u16, &mut out);
        out.extend_from_slice(&self.body);

        if let Some(key) = integrity_key {
            let mac = message_integrity(&out, key);
            write_attribute(&mut out, AttributeType::MessageIntegrity.to_u16(), &mac);
        }
        if fingerprint {
            let crc = fingerprint_crc(&out);
            write_attribute(&mut out, AttributeType::Fingerprint.to_u16(), &crc.to_be_bytes());
        }

        let length = (out.len() - MessageHeader::SIZE) as u16;
        out[2..4].copy_from_slice(&length.to_be_bytes());
        out
    }
}
