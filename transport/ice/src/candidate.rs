//! ICE candidate representation.
//!
//! A `Candidate` describes one transport address for one component plus
//! the bookkeeping the engine keeps while connectivity checks arrive.
//! Signaling hands candidates over already parsed; nothing here deals with
//! SDP text.

use crate::candidate_type::CandidateType;
use crate::errors::IceError;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Instant;
use stun::NetworkCost;

/// Component id of the media data flow.
pub const COMPONENT_DATA: u32 = 1;
/// Component id of the control flow.
pub const COMPONENT_CONTROL: u32 = 2;

/// Local preference for IPv4 addresses.
pub const IPV4_LOCAL_PREFERENCE: u32 = 0xFFFF;
/// Local preference for IPv6 addresses.
///
/// Fixed value rather than an RFC 6724 policy table lookup.
pub const IPV6_LOCAL_PREFERENCE: u32 = 50;

/// Foundation used for every locally offered candidate.
pub const LITE_FOUNDATION: &str = "xyzzy";

/// Transport protocol of a candidate. Only UDP is usable here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportProtocol {
    #[default]
    Udp,
    Tcp,
}

impl TransportProtocol {
    pub fn parse(s: &str) -> Result<Self, IceError> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(TransportProtocol::Udp),
            "tcp" => Ok(TransportProtocol::Tcp),
            _ => Err(IceError::InvalidTransportProtocol(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportProtocol::Udp => "udp",
            TransportProtocol::Tcp => "tcp",
        }
    }
}

/// Check state of a remote candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CandidateState {
    #[default]
    Waiting,
    Succeeded,
}

/// An ICE candidate.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub component_id: u32,
    pub candidate_type: CandidateType,
    pub protocol: TransportProtocol,
    pub foundation: String,
    pub priority: u32,
    pub address: SocketAddr,
    /// Network id and cost reported by the peer, accumulated as a maximum
    pub network: Option<NetworkCost>,
    pub state: CandidateState,
    /// Binding requests received from this address
    pub rx_requests: u32,
    /// USE-CANDIDATE requests received from this address
    pub nominations: u32,
    pub first_nomination: Option<Instant>,
    pub last_nomination: Option<Instant>,
}

impl Candidate {
    /// Creates a UDP candidate with default bookkeeping.
    pub fn new(
        candidate_type: CandidateType,
        component_id: u32,
        foundation: &str,
        priority: u32,
        address: SocketAddr,
    ) -> Self {
        Self {
            component_id,
            candidate_type,
            protocol: TransportProtocol::Udp,
            foundation: foundation.to_string(),
            priority,
            address,
            network: None,
            state: CandidateState::Waiting,
            rx_requests: 0,
            nominations: 0,
            first_nomination: None,
            last_nomination: None,
        }
    }

    /// Host candidate for a local socket, priority per RFC 8445 5.1.2.
    pub fn host(component_id: u32, address: SocketAddr) -> Self {
        let priority = Self::calculate_priority(
            CandidateType::Host.type_preference(),
            local_preference(address.ip()),
            component_id,
        );
        Self::new(CandidateType::Host, component_id, LITE_FOUNDATION, priority, address)
    }

    /// Trickle ICE end-of-candidates marker.
    pub fn end_of_candidates(ipv6: bool) -> Self {
        let any = if ipv6 {
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        } else {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        };
        Self::new(
            CandidateType::Final,
            COMPONENT_DATA,
            LITE_FOUNDATION,
            1,
            SocketAddr::new(any, 9),
        )
    }

    /// Peer reflexive guess for a source seen in a binding request.
    ///
    /// The type comes from the top byte of `priority` when it holds one of
    /// the recommended preferences, otherwise relay: a path that took
    /// longer than signaling to discover is most likely relayed.
    pub fn learned(component_id: u32, address: SocketAddr, priority: Option<u32>) -> Self {
        let candidate_type = priority
            .and_then(|p| CandidateType::from_type_preference(p >> 24))
            .unwrap_or(CandidateType::Relay);
        let priority = priority.unwrap_or_else(|| {
            Self::calculate_priority(
                candidate_type.type_preference(),
                local_preference(address.ip()),
                component_id,
            )
        });
        Self::new(candidate_type, component_id, "", priority, address)
    }

    /// Priority = (2^24)*(type preference) + (2^8)*(local preference) + (256 - component ID)
    pub fn calculate_priority(type_pref: u32, local_pref: u32, component_id: u32) -> u32 {
        (type_pref << 24) | ((local_pref & 0xFFFF) << 8) | (256 - component_id.min(256))
    }

    /// Zero-based subchannel this candidate belongs to.
    pub fn subchannel(&self) -> Option<usize> {
        (self.component_id as usize).checked_sub(1)
    }

    /// Whether the engine can use the candidate on a transport with
    /// `subchannels` flows.
    pub fn is_usable(&self, subchannels: usize) -> bool {
        self.protocol == TransportProtocol::Udp
            && self.candidate_type != CandidateType::Final
            && self.component_id > 0
            && (self.component_id as usize) <= subchannels
    }

    /// Same transport path: component, protocol and address.
    pub fn same_path(&self, other: &Candidate) -> bool {
        self.component_id == other.component_id
            && self.protocol == other.protocol
            && self.address == other.address
    }

    /// Same advertised description, ignoring check bookkeeping.
    pub fn same_description(&self, other: &Candidate) -> bool {
        self.same_path(other)
            && self.candidate_type == other.candidate_type
            && self.foundation == other.foundation
            && self.priority == other.priority
    }

    /// Accumulates a reported network cost as a field-wise maximum.
    pub fn merge_network(&mut self, reported: NetworkCost) {
        self.network = Some(match self.network {
            Some(current) => current.merge_max(reported),
            None => reported,
        });
    }

    pub(crate) fn record_nomination(&mut self, now: Instant) {
        self.nominations += 1;
        self.first_nomination.get_or_insert(now);
        self.last_nomination = Some(now);
        self.state = CandidateState::Succeeded;
    }

    /// Copies bookkeeping learned from checks onto a freshly signaled entry.
    pub(crate) fn inherit_checks(&mut self, early: &Candidate) {
        self.network = early.network;
        self.state = early.state;
        self.rx_requests = early.rx_requests;
        self.nominations = early.nominations;
        self.first_nomination = early.first_nomination;
        self.last_nomination = early.last_nomination;
    }
}

/// Local preference by address family. IPv4-mapped IPv6 addresses
/// count as IPv6.
pub fn local_preference(ip: IpAddr) -> u32 {
    match ip {
        IpAddr::V4(_) => IPV4_LOCAL_PREFERENCE,
        IpAddr::V6(_) => IPV6_LOCAL_PREFERENCE,
    }
}

/// SDP-like rendering, for traces.
impl std::fmt::Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "candidate:{} {} {} {} {} {} typ {}",
            if self.foundation.is_empty() { "-" } else { &self.foundation },
            self.component_id,
            self.protocol.as_str(),
            self.priority,
            self.address.ip(),
            self.address.port(),
            self.candidate_type
        )?;
        if let Some(network) = self.network {
            write!(f, " network-id {} network-cost {}", network.network_id, network.cost)?;
        }
        Ok(())
    }
}
