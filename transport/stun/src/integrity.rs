//! MESSAGE-INTEGRITY and FINGERPRINT computation.
//!
//! Both cover the message up to, but excluding, their own attribute, with
//! the header length field rewritten as if that attribute were the last
//! one present.

use crc::{CRC_32_ISO_HDLC, Crc};
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// XOR mask applied to the CRC ("STUN" in ASCII).
pub const FINGERPRINT_XOR: u32 = 0x5354554e;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Size of the MESSAGE-INTEGRITY attribute including its header.
pub(crate) const INTEGRITY_ATTR_LEN: usize = 24;
/// Size of the FINGERPRINT attribute including its header.
pub(crate) const FINGERPRINT_ATTR_LEN: usize = 8;

/// Copies `prefix` (header plus preceding attributes) with the length
/// field patched to `length`.
fn with_length(prefix: &[u8], length: usize) -> Vec<u8> {
    let mut input = prefix.to_vec();
    input[2..4].copy_from_slice(&(length as u16).to_be_bytes());
    input
}

/// HMAC-SHA1 over `prefix` keyed with the short-term password.
///
/// `prefix` must begin with the 20-byte header.
pub fn message_integrity(prefix: &[u8], key: &[u8]) -> [u8; 20] {
    let length = prefix.len() - crate::MessageHeader::SIZE + INTEGRITY_ATTR_LEN;
    let input = with_length(prefix, length);
    // HMAC accepts keys of any length
    let mut mac = match HmacSha1::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return [0u8; 20],
    };
    mac.update(&input);
    let mut out = [0u8; 20];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Constant-time check of a received MESSAGE-INTEGRITY value.
pub(crate) fn verify_integrity(prefix: &[u8], key: &[u8], received: &[u8]) -> bool {
    let length = prefix.len() - crate::MessageHeader::SIZE + INTEGRITY_ATTR_LEN;
    let input = with_length(prefix, length);
    let Ok(mut mac) = HmacSha1::new_from_slice(key) else {
        return false;
    };
    mac.update(&input);
    mac.verify_slice(received).is_ok()
}

/// CRC-32 of `prefix` XOR'ed with [`FINGERPRINT_XOR`].
pub fn fingerprint_crc(prefix: &[u8]) -> u32 {
    let length = prefix.len() - crate::MessageHeader::SIZE + FINGERPRINT_ATTR_LEN;
    CRC32.checksum(&with_length(prefix, length)) ^ FINGERPRINT_XOR
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix() -> Vec<u8> {
        let mut p = vec![0x00, 0x01, 0x00, 0x00, 0x21, 0x12, 0xA4, 0x42];
        p.extend_from_slice(&[7u8; 12]);
        p
    }

    #[test]
    fn test_integrity_depends_on_key() {
        let a = message_integrity(&prefix(), b"secret-one");
        let b = message_integrity(&prefix(), b"secret-two");
        assert_ne!(a, b);
        assert!(verify_integrity(&prefix(), b"secret-one", &a));
        assert!(!verify_integrity(&prefix(), b"secret-two", &a));
    }

    #[test]
    fn test_integrity_ignores_existing_length_field() {
        let mut patched = prefix();
        patched[3] = 0x40;
        assert_eq!(
            message_integrity(&prefix(), b"k"),
            message_integrity(&patched, b"k")
        );
    }

    #[test]
    fn test_verify_rejects_truncated_mac() {
        let mac = message_integrity(&prefix(), b"k");
        assert!(!verify_integrity(&prefix(), b"k", &mac[..10]));
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let mut other = prefix();
        other[8] = 0;
        assert_ne!(fingerprint_crc(&prefix()), fingerprint_crc(&other));
    }
}
