//! Type-length-value attribute framing.

use crate::errors::StunError;

/// One attribute as found on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    pub attr_type: u16,
    pub value: Vec<u8>,
    /// Offset of the attribute header from the start of the message
    pub offset: usize,
}

/// Bytes an attribute with a `len`-byte value occupies, padding included.
pub(crate) fn padded_len(len: usize) -> usize {
    4 + len + (4 - len % 4) % 4
}

/// Appends one attribute, zero padded to a 4-byte boundary.
pub(crate) fn write_attribute(out: &mut Vec<u8>, attr_type: u16, value: &[u8]) {
    let padding = (4 - value.len() % 4) % 4;
    out.reserve(4 + value.len() + padding);
    out.extend_from_slice(&attr_type.to_be_bytes());
    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
    out.extend_from_slice(value);
    out.resize(out.len() + padding, 0);
}

/// Splits the attribute section into attributes.
///
/// `base` is the offset of `body` within the whole message.
pub(crate) fn parse_attributes(body: &[u8], base: usize) -> Result<Vec<RawAttribute>, StunError> {
    let mut attributes = Vec::new();
    let mut pos = 0;
    while pos < body.len() {
        if body.len() - pos < 4 {
            return Err(StunError::InvalidMessageFormat);
        }
        let attr_type = u16::from_be_bytes([body[pos], body[pos + 1]]);
        let len = u16::from_be_bytes([body[pos + 2], body[pos + 3]]) as usize;
        let total = padded_len(len);
        if pos + total > body.len() {
            return Err(StunError::AttributeTooShort(attr_type));
        }
        attributes.push(RawAttribute {
            attr_type,
            value: body[pos + 4..pos + 4 + len].to_vec(),
            offset: base + pos,
        });
        pos += total;
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_attribute_pads() {
        let mut out = Vec::new();
        write_attribute(&mut out, 0x0006, b"abcde");
        assert_eq!(out.len(), 12);
        assert_eq!(&out[0..4], &[0x00, 0x06, 0x00, 0x05]);
        assert_eq!(&out[9..12], &[0, 0, 0]);
    }

    #[test]
    fn test_parse_attributes_offsets() {
        let mut body = Vec::new();
        write_attribute(&mut body, 0x0006, b"ab:cd");
        write_attribute(&mut body, 0x0025, &[]);
        let attrs = parse_attributes(&body, 20).unwrap();

        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].value, b"ab:cd");
        assert_eq!(attrs[0].offset, 20);
        assert_eq!(attrs[1].attr_type, 0x0025);
        assert_eq!(attrs[1].offset, 32);
    }

    #[test]
    fn test_parse_attributes_truncated() {
        let mut body = Vec::new();
        write_attribute(&mut body, 0x0024, &[0, 0, 0, 1]);
        body.truncate(6);
        assert!(parse_attributes(&body, 20).is_err());
    }
}
