//! STUN Module - Session Traversal Utilities for NAT
//!
//! Binding request/response codec as used by ICE connectivity checks
//! (RFC 5389, RFC 8445). Besides the classic XOR-MAPPED-ADDRESS this
//! crate understands the ICE attributes (PRIORITY, USE-CANDIDATE,
//! ICE-CONTROLLED/CONTROLLING), short-term credential MESSAGE-INTEGRITY,
//! FINGERPRINT and the network cost attribute.

mod attribute;
mod attribute_type;
mod error_code;
mod errors;
mod integrity;
mod message;
mod message_builder;
mod message_header;
mod message_type;
mod network_cost;
mod xor_mapped_address;

pub use attribute::RawAttribute;
pub use attribute_type::AttributeType;
pub use error_code::ErrorCode;
pub use errors::StunError;
pub use integrity::{FINGERPRINT_XOR, fingerprint_crc, message_integrity};
pub use message::Message;
pub use message_builder::MessageBuilder;
pub use message_header::{MAGIC_COOKIE, MessageHeader};
pub use message_type::{MessageClass, MessageType, METHOD_BINDING};
pub use network_cost::NetworkCost;

/// Result type for STUN operations.
pub type Result<T> = std::result::Result<T, StunError>;

/// Cheap pre-check on the first bytes of a datagram.
///
/// True when the two leading bits are zero and the magic cookie is in
/// place. A full [`Message::decode`] is still needed to trust the packet.
pub fn looks_like_stun(bytes: &[u8]) -> bool {
    bytes.len() >= MessageHeader::SIZE
        && bytes[0] & 0xC0 == 0
        && bytes[4..8] == MAGIC_COOKIE.to_be_bytes()
}
