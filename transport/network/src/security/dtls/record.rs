//! DTLS record header inspection (RFC 6347 Section 4.1).
//!
//! Only enough of the header is read to classify traffic after the
//! handshake; record bodies are left to OpenSSL.

pub const RECORD_HEADER_LEN: usize = 13;

const ALERT_LEVEL_WARNING: u8 = 1;
const ALERT_CLOSE_NOTIFY: u8 = 0;

/// DTLS record content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
    Other(u8),
}

impl From<u8> for ContentType {
    fn from(value: u8) -> Self {
        match value {
            20 => ContentType::ChangeCipherSpec,
            21 => ContentType::Alert,
            22 => ContentType::Handshake,
            23 => ContentType::ApplicationData,
            other => ContentType::Other(other),
        }
    }
}

/// Fixed part of a DTLS record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub content_type: ContentType,
    pub version: u16,
    pub epoch: u16,
    pub sequence: u64,
    pub length: u16,
}

impl RecordHeader {
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < RECORD_HEADER_LEN || !is_dtls_record(data) {
            return None;
        }
        let mut sequence = [0u8; 8];
        sequence[2..].copy_from_slice(&data[5..11]);
        Some(Self {
            content_type: ContentType::from(data[0]),
            version: u16::from_be_bytes([data[1], data[2]]),
            epoch: u16::from_be_bytes([data[3], data[4]]),
            sequence: u64::from_be_bytes(sequence),
            length: u16::from_be_bytes([data[11], data[12]]),
        })
    }
}

pub const HANDSHAKE_HEADER_LEN: usize = 12;
pub const CLIENT_HELLO: u8 = 1;

/// Header of the first handshake message in a plaintext record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeHeader {
    pub msg_type: u8,
    pub message_seq: u16,
}

impl HandshakeHeader {
    /// Only epoch 0 records are readable; later epochs are encrypted.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let header = RecordHeader::parse(data)?;
        if header.content_type != ContentType::Handshake
            || header.epoch != 0
            || data.len() < RECORD_HEADER_LEN + HANDSHAKE_HEADER_LEN
        {
            return None;
        }
        let body = &data[RECORD_HEADER_LEN..];
        Some(Self {
            msg_type: body[0],
            message_seq: u16::from_be_bytes([body[4], body[5]]),
        })
    }
}

/// Leading byte in the DTLS range of RFC 7983.
pub fn is_dtls_record(data: &[u8]) -> bool {
    matches!(data.first(), Some(20..=63))
}

/// Unencrypted warning-level close_notify alert.
///
/// An alert sent after the handshake is normally encrypted; this only
/// catches peers that close before switching epochs.
pub fn is_plaintext_close_notify(data: &[u8]) -> bool {
    match RecordHeader::parse(data) {
        Some(header) => {
            header.content_type == ContentType::Alert
                && header.epoch == 0
                && header.length == 2
                && data.len() >= RECORD_HEADER_LEN + 2
                && data[RECORD_HEADER_LEN] == ALERT_LEVEL_WARNING
                && data[RECORD_HEADER_LEN + 1] == ALERT_CLOSE_NOTIFY
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(content_type: u8, epoch: u16, body: &[u8]) -> Vec<u8> {
        let mut data = vec![content_type, 0xFE, 0xFD];
        data.extend_from_slice(&epoch.to_be_bytes());
        data.extend_from_slice(&[0, 0, 0, 0, 0, 7]);
        data.extend_from_slice(&(body.len() as u16).to_be_bytes());
        data.extend_from_slice(body);
        data
    }

    #[test]
    fn test_parse_header() {
        let header = RecordHeader::parse(&record(22, 1, &[0; 5])).unwrap();
        assert_eq!(header.content_type, ContentType::Handshake);
        assert_eq!(header.version, 0xFEFD);
        assert_eq!(header.epoch, 1);
        assert_eq!(header.sequence, 7);
        assert_eq!(header.length, 5);
    }

    #[test]
    fn test_rejects_non_dtls() {
        assert!(RecordHeader::parse(&[0x80; 20]).is_none());
        assert!(RecordHeader::parse(&[22, 0xFE]).is_none());
        assert!(!is_dtls_record(&[]));
        assert!(is_dtls_record(&[63]));
        assert!(!is_dtls_record(&[64]));
    }

    #[test]
    fn test_handshake_header() {
        let mut body = vec![CLIENT_HELLO, 0, 0, 4, 0, 2];
        body.extend_from_slice(&[0; 6]);
        let header = HandshakeHeader::parse(&record(22, 0, &body)).unwrap();
        assert_eq!(header.msg_type, CLIENT_HELLO);
        assert_eq!(header.message_seq, 2);

        assert!(HandshakeHeader::parse(&record(22, 1, &body)).is_none());
        assert!(HandshakeHeader::parse(&record(20, 0, &body)).is_none());
        assert!(HandshakeHeader::parse(&record(22, 0, &body[..5])).is_none());
    }

    #[test]
    fn test_plaintext_close_notify() {
        assert!(is_plaintext_close_notify(&record(21, 0, &[1, 0])));
        assert!(!is_plaintext_close_notify(&record(21, 0, &[2, 40])));
        assert!(!is_plaintext_close_notify(&record(21, 1, &[1, 0])));
        assert!(!is_plaintext_close_notify(&record(22, 0, &[1, 0])));
    }
}
