//! XOR-MAPPED-ADDRESS attribute
//!
//! The address is XOR'ed with the magic cookie (and, for IPv6, the
//! transaction ID) so middleboxes rewriting literal addresses leave it alone.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::errors::StunError;
use crate::message_header::MAGIC_COOKIE;

const FAMILY_IPV4: u8 = 0x01;
const FAMILY_IPV6: u8 = 0x02;

fn xor_mask(transaction_id: &[u8; 12]) -> [u8; 16] {
    let mut mask = [0u8; 16];
    mask[..4].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
    mask[4..].copy_from_slice(transaction_id);
    mask
}

/// Encodes `addr` as an XOR-MAPPED-ADDRESS value.
pub fn encode(addr: SocketAddr, transaction_id: &[u8; 12]) -> Vec<u8> {
    let mask = xor_mask(transaction_id);
    let port = addr.port() ^ (MAGIC_COOKIE >> 16) as u16;
    let mut value = Vec::with_capacity(20);
    value.push(0);
    match addr.ip() {
        IpAddr::V4(ip) => {
            value.push(FAMILY_IPV4);
            value.extend_from_slice(&port.to_be_bytes());
            value.extend(ip.octets().iter().zip(&mask[..4]).map(|(b, m)| b ^ m));
        }
        IpAddr::V6(ip) => {
            value.push(FAMILY_IPV6);
            value.extend_from_slice(&port.to_be_bytes());
            value.extend(ip.octets().iter().zip(mask.iter()).map(|(b, m)| b ^ m));
        }
    }
    value
}

/// Decodes an XOR-MAPPED-ADDRESS value.
///
/// # Errors
/// Short values and unknown families.
pub fn decode(bytes: &[u8], transaction_id: &[u8; 12]) -> Result<SocketAddr, StunError> {
    const ATTR: u16 = 0x0020;
    if bytes.len() < 4 {
        return Err(StunError::AttributeTooShort(ATTR));
    }
    let mask = xor_mask(transaction_id);
    let port = u16::from_be_bytes([bytes[2], bytes[3]]) ^ (MAGIC_COOKIE >> 16) as u16;

    let ip = match bytes[1] {
        FAMILY_IPV4 => {
            if bytes.len() < 8 {
                return Err(StunError::AttributeTooShort(ATTR));
            }
            let mut octets = [0u8; 4];
            for (i, octet) in octets.iter_mut().enumerate() {
                *octet = bytes[4 + i] ^ mask[i];
            }
            IpAddr::V4(Ipv4Addr::from(octets))
        }
        FAMILY_IPV6 => {
            if bytes.len() < 20 {
                return Err(StunError::AttributeTooShort(ATTR));
            }
            let mut octets = [0u8; 16];
            for (i, octet) in octets.iter_mut().enumerate() {
                *octet = bytes[4 + i] ^ mask[i];
            }
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        family => return Err(StunError::InvalidAddressFamily(family)),
    };
    Ok(SocketAddr::new(ip, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TID: [u8; 12] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];

    #[test]
    fn test_encode_ipv4_known_vector() {
        // 192.168.1.100:8080
        let addr: SocketAddr = "192.168.1.100:8080".parse().unwrap();
        assert_eq!(
            encode(addr, &TID),
            vec![0x00, 0x01, 0x3E, 0x82, 0xE1, 0xBA, 0xA5, 0x26]
        );
    }

    #[test]
    fn test_decode_ipv6() {
        let addr: SocketAddr = "[2001:db8::1]:3478".parse().unwrap();
        let value = encode(addr, &TID);
        assert_eq!(value.len(), 20);
        assert_eq!(decode(&value, &TID).unwrap(), addr);
    }

    #[test]
    fn test_decode_invalid_family() {
        assert_eq!(
            decode(&[0x00, 0x03, 0x00, 0x00, 0, 0, 0, 0], &TID),
            Err(StunError::InvalidAddressFamily(0x03))
        );
    }

    #[test]
    fn test_decode_short_ipv4() {
        assert!(decode(&[0x00, 0x01, 0x00, 0x00, 1], &TID).is_err());
    }
}
