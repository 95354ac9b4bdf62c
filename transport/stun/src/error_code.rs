//! ERROR-CODE attribute (RFC 5389 Section 15.6).

use crate::errors::StunError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCode {
    pub code: u16,
    pub reason: String,
}

impl ErrorCode {
    pub const BAD_REQUEST: u16 = 400;
    pub const UNAUTHORIZED: u16 = 401;
    pub const UNKNOWN_ATTRIBUTE: u16 = 420;
    pub const ROLE_CONFLICT: u16 = 487;

    pub fn new(code: u16, reason: &str) -> Self {
        Self {
            code,
            reason: reason.to_string(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut value = vec![0, 0, (self.code / 100) as u8 & 0x07, (self.code % 100) as u8];
        value.extend_from_slice(self.reason.as_bytes());
        value
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StunError> {
        if bytes.len() < 4 {
            return Err(StunError::AttributeTooShort(0x0009));
        }
        let class = (bytes[2] & 0x07) as u16;
        let number = bytes[3] as u16;
        Ok(Self {
            code: class * 100 + number,
            reason: String::from_utf8_lossy(&bytes[4..]).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_unauthorized() {
        let value = ErrorCode::new(ErrorCode::UNAUTHORIZED, "Unauthorized").encode();
        assert_eq!(&value[..4], &[0, 0, 4, 1]);
        assert_eq!(&value[4..], b"Unauthorized");
    }

    #[test]
    fn test_decode_role_conflict() {
        let decoded = ErrorCode::decode(&[0, 0, 4, 87, b'x']).unwrap();
        assert_eq!(decoded.code, 487);
        assert_eq!(decoded.reason, "x");
    }
}
