//! First-byte demultiplexing of a shared media port (RFC 7983).

/// What a datagram on a media port carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// STUN binding traffic, first byte 0-3
    Stun,
    /// DTLS record, first byte 20-63
    Dtls,
    /// RTP/RTCP or anything else the next layer decides on
    Media,
    /// Empty datagram
    Empty,
}

/// Classify packet type by first byte
///
/// - STUN: 0-3 (top two bits zero)
/// - DTLS: 20-63 (content type)
/// - everything else goes up as media; SRTP/SRTCP are 128-191
pub fn classify_packet(data: &[u8]) -> PacketKind {
    match data.first() {
        None => PacketKind::Empty,
        Some(0..=3) => PacketKind::Stun,
        Some(20..=63) => PacketKind::Dtls,
        Some(_) => PacketKind::Media,
    }
}
