//! Local address discovery for host candidates.
//!
//! A socket bound to a wildcard address cannot be advertised as is. The
//! kernel's route lookup tells which interface address would be used to
//! reach a destination; connecting a throwaway UDP socket performs that
//! lookup without sending anything.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

/// Well-known destinations used only for the route lookup.
const PROBE_V4: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 9);
const PROBE_V6: SocketAddr = SocketAddr::new(
    IpAddr::V6(Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8888)),
    9,
);

/// Interface address the host would use towards `toward`, or towards the
/// public internet when `toward` is `None`.
///
/// Returns `None` when no route exists or the lookup yields a link-local
/// address.
pub fn detect_local_ip(ipv6: bool, toward: Option<IpAddr>) -> Option<IpAddr> {
    let target = match toward {
        Some(ip) if !ip.is_unspecified() => SocketAddr::new(ip, 9),
        _ if ipv6 => PROBE_V6,
        _ => PROBE_V4,
    };
    let bind: SocketAddr = if target.is_ipv6() {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    };

    let socket = UdpSocket::bind(bind).ok()?;
    socket.connect(target).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    is_advertisable(ip).then_some(ip)
}

/// Replaces a wildcard bind address with a routable interface address.
pub fn resolve_host_address(bound: SocketAddr, toward: Option<IpAddr>) -> SocketAddr {
    if !bound.ip().is_unspecified() {
        return bound;
    }
    match detect_local_ip(bound.is_ipv6(), toward) {
        Some(ip) => SocketAddr::new(ip, bound.port()),
        None => bound,
    }
}

/// Checks if an address may be offered to a peer.
fn is_advertisable(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => !v4.is_unspecified() && !v4.is_link_local(),
        IpAddr::V6(v6) => !v6.is_unspecified() && (v6.segments()[0] & 0xFFC0) != 0xFE80,
    }
}
