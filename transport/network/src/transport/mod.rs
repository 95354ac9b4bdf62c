//! Transport module - UDP sockets and demultiplexing

pub mod demux;
pub mod udp;

pub use demux::{PacketKind, classify_packet};
pub use udp::UdpTransport;
