//! ICE-lite agent.
//!
//! The agent answers connectivity checks on behalf of a media transport and
//! decides which remote address each subchannel talks to. It performs no
//! I/O itself: inbound datagrams are handed to [`IceAgent::handle_inbound`]
//! and the returned [`IceOutcome`] tells the caller what to send back and
//! whether the datagram continues up the stack. Callers serialize access
//! (the transport keeps the agent behind a read-write lock).

use crate::candidate::{Candidate, CandidateState};
use crate::credentials::Credentials;
use crate::errors::IceError;
use crate::ice_state::{IceRole, IceState};
use logging::Logger;
use std::net::SocketAddr;
use std::time::Instant;
use stun::{ErrorCode, Message, MessageBuilder, MessageClass, MessageType};

/// Behavior switches taken from transport configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IceConfig {
    /// ICE processing at all; when off the agent stays `Disabled`
    pub enabled: bool,
    /// Answer checks without originating them (the only mode supported)
    pub lite: bool,
    /// Append the end-of-candidates marker to local descriptions
    pub trickle: bool,
    /// Prefer cheaper networks over higher priority when nominating
    pub network_cost: bool,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lite: true,
            trickle: false,
            network_cost: false,
        }
    }
}

/// What the caller should do with an inbound datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IceOutcome {
    /// Not ICE traffic; pass it to the next layer.
    Forward,
    /// Non-STUN data from a source that is not the selected path.
    Discard,
    /// A STUN message, handled here and never passed on.
    Consumed {
        /// Response to send back to the source
        reply: Option<Vec<u8>>,
        /// Address the subchannel switched to, if this message changed it
        nominated: Option<SocketAddr>,
    },
}

impl IceOutcome {
    fn consumed(reply: Option<Vec<u8>>) -> Self {
        IceOutcome::Consumed {
            reply,
            nominated: None,
        }
    }
}

/// Which sources may deliver non-STUN data on a subchannel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFilter {
    /// Anything goes (ICE off, or negotiating with nothing selected yet)
    Open,
    /// Only this address; `None` drops everything
    Only(Option<SocketAddr>),
}

impl MediaFilter {
    pub fn accepts(&self, source: SocketAddr) -> bool {
        match self {
            MediaFilter::Open => true,
            MediaFilter::Only(address) => *address == Some(source),
        }
    }
}

/// Username, password and candidates to put in an offer or answer.
#[derive(Debug, Clone)]
pub struct LocalDescription {
    pub ufrag: String,
    pub pwd: String,
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone)]
struct SubchannelState {
    local_address: SocketAddr,
    /// Remote address fixed by signaling, used while ICE is disabled
    configured_remote: Option<SocketAddr>,
    local: Vec<Candidate>,
    remote: Vec<Candidate>,
    selected: Option<Candidate>,
    /// Selection that was live when an ICE restart began
    previous: Option<SocketAddr>,
    /// Nomination that arrived before our offer was answered
    deferred: Option<Candidate>,
}

impl SubchannelState {
    fn new(local_address: SocketAddr) -> Self {
        Self {
            local_address,
            configured_remote: None,
            local: Vec::new(),
            remote: Vec::new(),
            selected: None,
            previous: None,
            deferred: None,
        }
    }

    fn find_remote(&self, address: SocketAddr) -> Option<usize> {
        self.remote.iter().position(|c| c.address == address)
    }

    /// Candidates received through signaling, as opposed to learned from checks.
    fn signaled(&self) -> impl Iterator<Item = &Candidate> {
        self.remote.iter().filter(|c| !c.foundation.is_empty())
    }
}

/// ICE agent for one media transport.
pub struct IceAgent {
    config: IceConfig,
    state: IceState,
    role: IceRole,
    credentials: Credentials,
    subchannels: Vec<SubchannelState>,
    logger: Logger,
}

impl std::fmt::Debug for IceAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IceAgent")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("role", &self.role)
            .field("credentials", &self.credentials)
            .field("subchannels", &self.subchannels.len())
            .finish()
    }
}

impl IceAgent {
    /// Creates an agent for sockets bound at `local_addresses`, one per
    /// subchannel, with freshly generated local credentials.
    pub fn new(config: IceConfig, local_addresses: Vec<SocketAddr>, logger: Logger) -> Self {
        Self {
            config,
            state: IceState::Disabled,
            role: IceRole::Lite,
            credentials: Credentials::generate(),
            subchannels: local_addresses.into_iter().map(SubchannelState::new).collect(),
            logger,
        }
    }

    pub fn config(&self) -> IceConfig {
        self.config
    }

    pub fn state(&self) -> IceState {
        self.state
    }

    pub fn role(&self) -> IceRole {
        self.role
    }

    pub fn subchannel_count(&self) -> usize {
        self.subchannels.len()
    }

    /// Local username fragment and password.
    pub fn local_credentials(&self) -> (&str, &str) {
        (&self.credentials.local_ufrag, &self.credentials.local_pwd)
    }

    /// Remote username fragment and password, empty until signaled.
    pub fn remote_credentials(&self) -> (&str, &str) {
        (&self.credentials.remote_ufrag, &self.credentials.remote_pwd)
    }

    pub fn local_address(&self, subchannel: usize) -> Option<SocketAddr> {
        self.subchannels.get(subchannel).map(|sc| sc.local_address)
    }

    /// Remote address fixed by signaling for a subchannel.
    pub fn set_configured_remote(&mut self, subchannel: usize, address: Option<SocketAddr>) {
        if let Some(sc) = self.subchannels.get_mut(subchannel) {
            sc.configured_remote = address;
        }
    }

    pub fn local_candidates(&self, subchannel: usize) -> &[Candidate] {
        self.subchannels
            .get(subchannel)
            .map_or(&[], |sc| sc.local.as_slice())
    }

    pub fn remote_candidates(&self, subchannel: usize) -> &[Candidate] {
        self.subchannels
            .get(subchannel)
            .map_or(&[], |sc| sc.remote.as_slice())
    }

    /// Nominated remote candidate of a subchannel.
    pub fn selected(&self, subchannel: usize) -> Option<&Candidate> {
        self.subchannels.get(subchannel)?.selected.as_ref()
    }

    /// Every remote candidate across subchannels, for statistics.
    pub fn candidate_statistics(&self) -> Vec<Candidate> {
        self.subchannels
            .iter()
            .flat_map(|sc| sc.remote.iter().cloned())
            .collect()
    }

    /// Where media for a subchannel should be sent right now.
    ///
    /// The selection when there is one, the pre-restart selection while a
    /// restart is negotiating, and the signaled address while ICE is off.
    pub fn remote_address(&self, subchannel: usize) -> Option<SocketAddr> {
        let sc = self.subchannels.get(subchannel)?;
        match self.state {
            IceState::Disabled => sc.configured_remote,
            _ => sc.selected.as_ref().map(|c| c.address).or(sc.previous),
        }
    }

    /// True when every subchannel has a path to send media on.
    pub fn is_established(&self) -> bool {
        if self.subchannels.is_empty() {
            return false;
        }
        match self.state {
            IceState::Disabled => self.subchannels.iter().all(|sc| sc.configured_remote.is_some()),
            IceState::Completed => self.subchannels.iter().all(|sc| sc.selected.is_some()),
            _ => false,
        }
    }

    /// Returns the local credentials and one host candidate per subchannel.
    ///
    /// Offering from `Disabled` moves to `Offering`; producing the answer
    /// while `Answering` moves to `OfferAnswered`. In `Completed` the call
    /// only reports the cached description.
    ///
    /// # Errors
    /// `Configuration` when ICE is disabled or the transport has no sockets.
    pub fn get_candidates(&mut self, offering: bool) -> Result<LocalDescription, IceError> {
        if !self.config.enabled {
            return Err(IceError::Configuration("ICE disabled".to_string()));
        }
        if self.subchannels.is_empty() {
            return Err(IceError::Configuration("transport not open".to_string()));
        }

        let mut candidates = Vec::with_capacity(self.subchannels.len() + 1);
        for (index, sc) in self.subchannels.iter_mut().enumerate() {
            let host = Candidate::host(index as u32 + 1, sc.local_address);
            let unchanged = sc.local.len() == 1 && sc.local[0].same_description(&host);
            if !unchanged && self.state != IceState::Completed {
                sc.local = vec![host.clone()];
            }
            candidates.push(sc.local.first().cloned().unwrap_or(host));
        }

        match (self.state, offering) {
            (IceState::Disabled, true) => {
                self.state = IceState::Offering;
                self.logger.info("ICE configured with offered candidates");
            }
            (IceState::Answering, false) => {
                self.state = IceState::OfferAnswered;
                self.logger.info("ICE responding to received candidates");
            }
            (IceState::Answering, true) => {
                self.logger
                    .warn("ICE state error, making local offer when answering remote offer");
            }
            (state, _) => {
                self.logger
                    .debug(&format!("ICE sending unchanged candidates in state {}", state));
            }
        }

        if self.config.trickle {
            let ipv6 = self.subchannels[0].local_address.is_ipv6();
            candidates.push(Candidate::end_of_candidates(ipv6));
        }

        Ok(LocalDescription {
            ufrag: self.credentials.local_ufrag.clone(),
            pwd: self.credentials.local_pwd.clone(),
            candidates,
        })
    }

    /// Applies the peer's credentials and candidates.
    ///
    /// Candidates already learned from early checks are merged with the
    /// signaled ones that share their path. Empty credentials turn ICE off.
    ///
    /// # Errors
    /// `NoCandidates` for an empty list (state unchanged) and
    /// `NoSuitableCandidates` when nothing is UDP on a known component
    /// (ICE is disabled).
    pub fn set_candidates(
        &mut self,
        ufrag: &str,
        pwd: &str,
        remote: &[Candidate],
    ) -> Result<(), IceError> {
        if !self.config.enabled {
            return Err(IceError::Configuration("ICE disabled".to_string()));
        }
        if ufrag.is_empty() || pwd.is_empty() {
            self.logger.info("ICE disabled, remote offered no credentials");
            self.state = IceState::Disabled;
            return Ok(());
        }
        if remote.is_empty() {
            self.logger.debug("no ICE candidates from remote");
            return Err(IceError::NoCandidates);
        }

        let count = self.subchannels.len();
        let mut incoming: Vec<Vec<Candidate>> = vec![Vec::new(); count];
        for candidate in remote {
            if candidate.is_usable(count) {
                let mut fresh = candidate.clone();
                fresh.state = CandidateState::Waiting;
                incoming[candidate.component_id as usize - 1].push(fresh);
            } else {
                self.logger
                    .trace(&format!("ignoring unusable remote candidate {}", candidate));
            }
        }
        if incoming.iter().all(Vec::is_empty) {
            self.logger.warn("no suitable ICE candidates from remote");
            self.state = IceState::Disabled;
            return Err(IceError::NoSuitableCandidates);
        }

        match self.state {
            IceState::Disabled => {
                self.logger.info("ICE initial answer");
                self.state = IceState::Answering;
            }
            IceState::Completed => {
                if self.credentials.remote_matches(ufrag, pwd) {
                    self.logger.debug("ICE username/password unchanged");
                    return Ok(());
                }
                self.logger.info("ICE restart, username/password changed");
                for sc in &mut self.subchannels {
                    sc.previous = sc.selected.take().map(|c| c.address);
                }
                self.state = IceState::Answering;
            }
            IceState::Offering => {
                let answered_before = self.subchannels.iter().any(|sc| sc.signaled().next().is_some());
                if answered_before && self.same_as_signaled(&incoming) {
                    self.logger.debug("ICE answer to offer unchanged");
                    self.state = IceState::Completed;
                    self.commit_deferred();
                    return Ok(());
                }
                self.logger.info("ICE offer answered");
                self.state = IceState::OfferAnswered;
            }
            IceState::Answering | IceState::OfferAnswered => {
                if !self.same_as_signaled(&incoming) {
                    self.logger.warn("ICE candidates in bundled session different");
                }
                return Ok(());
            }
        }

        self.credentials.remote_ufrag = ufrag.to_string();
        self.credentials.remote_pwd = pwd.to_string();
        self.role = if self.config.lite {
            IceRole::Lite
        } else if self.state == IceState::Answering {
            IceRole::Controlled
        } else {
            IceRole::Controlling
        };

        for (sc, mut fresh) in self.subchannels.iter_mut().zip(incoming) {
            for early in sc.remote.iter().filter(|c| c.foundation.is_empty()) {
                match fresh.iter_mut().find(|c| c.same_path(early)) {
                    Some(signaled) => signaled.inherit_checks(early),
                    None => fresh.push(early.clone()),
                }
            }
            for held in [&mut sc.selected, &mut sc.deferred].into_iter().flatten() {
                if let Some(signaled) = fresh.iter().find(|c| c.same_path(held)) {
                    held.candidate_type = signaled.candidate_type;
                    held.priority = signaled.priority;
                    held.foundation = signaled.foundation.clone();
                }
            }
            sc.remote = fresh;
        }

        if self.state == IceState::OfferAnswered {
            self.commit_deferred();
        }

        self.logger.info(&format!(
            "ICE {} candidates: {}",
            if self.state == IceState::Answering {
                "configured from remote"
            } else {
                "remote response to local"
            },
            self.subchannels
                .iter()
                .enumerate()
                .map(|(i, sc)| format!("local-{}={} remote-{}={}", i, sc.local.len(), i, sc.remote.len()))
                .collect::<Vec<_>>()
                .join(" ")
        ));
        Ok(())
    }

    fn same_as_signaled(&self, incoming: &[Vec<Candidate>]) -> bool {
        self.subchannels.iter().zip(incoming).all(|(sc, new)| {
            let old: Vec<&Candidate> = sc.signaled().collect();
            old.len() == new.len() && old.iter().zip(new).all(|(a, b)| a.same_description(b))
        })
    }

    /// Applies nominations that arrived while we were still `Offering`.
    fn commit_deferred(&mut self) {
        let mut committed = false;
        for (index, sc) in self.subchannels.iter_mut().enumerate() {
            if let Some(winner) = sc.deferred.take() {
                self.logger.info(&format!(
                    "subchannel {} committing early nomination {}",
                    index, winner.address
                ));
                sc.previous = None;
                sc.selected = Some(winner);
                committed = true;
            }
        }
        if committed && self.state != IceState::Completed {
            self.state = IceState::Completed;
        }
    }

    /// Processes a datagram received on `subchannel` from `source`.
    ///
    /// Every valid STUN message is consumed. Other datagrams are forwarded
    /// unless a selection exists and `source` is not it.
    pub fn handle_inbound(
        &mut self,
        subchannel: usize,
        data: &[u8],
        source: SocketAddr,
        now: Instant,
    ) -> IceOutcome {
        if subchannel >= self.subchannels.len() {
            self.logger
                .trace(&format!("datagram for unknown subchannel {}", subchannel));
            return IceOutcome::Discard;
        }

        let message = match Message::decode(data) {
            Ok(message) => message,
            Err(_) => return self.filter_media(subchannel, source),
        };

        if self.state == IceState::Disabled {
            self.logger.trace(&format!(
                "subchannel {} ignoring STUN from {} while ICE disabled",
                subchannel, source
            ));
            return IceOutcome::consumed(None);
        }

        match message.class() {
            MessageClass::Request if message.message_type().is_binding() => {
                self.handle_request(subchannel, &message, source, now)
            }
            MessageClass::SuccessResponse if message.message_type().is_binding() => {
                self.handle_response(subchannel, &message, source, now)
            }
            _ => {
                self.logger.trace(&format!(
                    "subchannel {} unexpected STUN message 0x{:04X} from {}",
                    subchannel,
                    message.message_type().to_u16(),
                    source
                ));
                IceOutcome::consumed(None)
            }
        }
    }

    /// Decides whether non-STUN data from `source` may go up the stack.
    pub fn filter_media(&self, subchannel: usize, source: SocketAddr) -> IceOutcome {
        let accepted = self
            .media_filter(subchannel)
            .is_some_and(|filter| filter.accepts(source));
        if accepted {
            IceOutcome::Forward
        } else {
            self.logger.trace(&format!(
                "subchannel {} ignoring data from un-selected ICE candidate {}",
                subchannel, source
            ));
            IceOutcome::Discard
        }
    }

    /// Snapshot of the source filter for a subchannel.
    ///
    /// Readers cache it to classify media without holding the agent's lock.
    pub fn media_filter(&self, subchannel: usize) -> Option<MediaFilter> {
        let sc = self.subchannels.get(subchannel)?;
        Some(match self.state {
            IceState::Disabled => MediaFilter::Open,
            IceState::Completed => MediaFilter::Only(sc.selected.as_ref().map(|c| c.address)),
            _ => match sc.previous {
                Some(previous) => MediaFilter::Only(Some(previous)),
                None => MediaFilter::Open,
            },
        })
    }

    fn error_reply(&self, request: &Message, code: u16, reason: &str) -> Option<Vec<u8>> {
        Some(
            MessageBuilder::response_to(MessageType::BINDING_ERROR, request.transaction_id())
                .error_code(&ErrorCode::new(code, reason))
                .build(None, true),
        )
    }

    fn handle_request(
        &mut self,
        subchannel: usize,
        message: &Message,
        source: SocketAddr,
        now: Instant,
    ) -> IceOutcome {
        let Some(username) = message.username() else {
            self.logger
                .debug(&format!("subchannel {} STUN request from {} without USERNAME", subchannel, source));
            return IceOutcome::consumed(self.error_reply(message, ErrorCode::BAD_REQUEST, "Bad Request"));
        };

        let (expected, key) = self.credentials.server();
        let local_prefix = format!("{}:", self.credentials.local_ufrag);
        let username_ok = if self.credentials.has_remote() {
            username == expected
        } else {
            username.starts_with(&local_prefix)
        };
        if !username_ok || message.check_integrity(key).is_err() {
            self.logger.debug(&format!(
                "subchannel {} STUN request from {} failed authentication (username {})",
                subchannel, source, username
            ));
            return IceOutcome::consumed(self.error_reply(message, ErrorCode::UNAUTHORIZED, "Unauthorized"));
        }

        let unknown = message.unknown_required_attributes();
        if !unknown.is_empty() {
            let reply = MessageBuilder::response_to(MessageType::BINDING_ERROR, message.transaction_id())
                .error_code(&ErrorCode::new(ErrorCode::UNKNOWN_ATTRIBUTE, "Unknown Attribute"))
                .unknown_attributes(&unknown)
                .build(None, true);
            return IceOutcome::consumed(Some(reply));
        }

        let reply = MessageBuilder::response_to(MessageType::BINDING_SUCCESS, message.transaction_id())
            .xor_mapped_address(source)
            .build(Some(key), true);

        let sc = &mut self.subchannels[subchannel];
        let index = match sc.find_remote(source) {
            Some(index) => index,
            None => {
                let learned = Candidate::learned(subchannel as u32 + 1, source, message.priority());
                self.logger.info(&format!(
                    "subchannel {} STUN request for unknown ICE candidate, adding {}",
                    subchannel, learned
                ));
                sc.remote.push(learned);
                sc.remote.len() - 1
            }
        };

        let candidate = &mut sc.remote[index];
        candidate.rx_requests += 1;

        if !message.use_candidate() {
            if self.state != IceState::Completed {
                self.logger
                    .trace(&format!("subchannel {} ICE awaiting USE-CANDIDATE", subchannel));
            }
            return IceOutcome::consumed(Some(reply));
        }

        candidate.record_nomination(now);
        if let Some(cost) = message.network_cost() {
            candidate.merge_network(cost);
        }
        let candidate = candidate.clone();

        if self.state == IceState::Offering {
            if Self::wins(self.config.network_cost, &candidate, sc.deferred.as_ref()) {
                self.logger.debug(&format!(
                    "subchannel {} early USE-CANDIDATE from {}, deferred until answered",
                    subchannel, source
                ));
                sc.deferred = Some(candidate);
            }
            return IceOutcome::consumed(Some(reply));
        }

        if let Some(current) = sc.selected.as_mut() {
            if current.address == source {
                current.network = candidate.network;
                current.nominations = candidate.nominations;
                current.last_nomination = candidate.last_nomination;
                return IceOutcome::consumed(Some(reply));
            }
        }

        if !Self::wins(self.config.network_cost, &candidate, sc.selected.as_ref()) {
            self.logger.debug(&format!(
                "subchannel {} keeping selection over USE-CANDIDATE from {} (priority {})",
                subchannel, source, candidate.priority
            ));
            return IceOutcome::consumed(Some(reply));
        }

        self.logger.info(&format!(
            "subchannel {} ICE found USE-CANDIDATE from {}",
            subchannel, source
        ));
        self.commit(subchannel, candidate);
        IceOutcome::Consumed {
            reply: Some(reply),
            nominated: Some(source),
        }
    }

    /// A success response while offering completes the subchannel,
    /// provided it is signed with the peer's password.
    fn handle_response(
        &mut self,
        subchannel: usize,
        message: &Message,
        source: SocketAddr,
        now: Instant,
    ) -> IceOutcome {
        if self.state != IceState::Offering {
            self.logger.debug(&format!(
                "subchannel {} unexpected STUN response in ICE from {}",
                subchannel, source
            ));
            return IceOutcome::consumed(None);
        }

        let (_, key) = self.credentials.client();
        if !self.credentials.has_remote() || message.check_integrity(key).is_err() {
            self.logger.debug(&format!(
                "subchannel {} STUN response from {} failed integrity",
                subchannel, source
            ));
            return IceOutcome::consumed(None);
        }

        let sc = &mut self.subchannels[subchannel];
        let index = match sc.find_remote(source) {
            Some(index) => index,
            None => {
                sc.remote
                    .push(Candidate::learned(subchannel as u32 + 1, source, None));
                sc.remote.len() - 1
            }
        };
        sc.remote[index].record_nomination(now);
        let candidate = sc.remote[index].clone();

        self.logger.info(&format!(
            "subchannel {} ICE response selects {}",
            subchannel, source
        ));
        self.commit(subchannel, candidate);
        IceOutcome::Consumed {
            reply: None,
            nominated: Some(source),
        }
    }

    /// Tie-break: strictly higher priority wins, or strictly lower cost
    /// when the network cost policy is on and both costs are known.
    fn wins(network_cost: bool, candidate: &Candidate, current: Option<&Candidate>) -> bool {
        let Some(current) = current else {
            return true;
        };
        if candidate.same_path(current) {
            return false;
        }
        if network_cost {
            if let (Some(new), Some(old)) = (candidate.network, current.network) {
                if new.cost != old.cost {
                    return new.cost < old.cost;
                }
            }
        }
        candidate.priority > current.priority
    }

    fn commit(&mut self, subchannel: usize, candidate: Candidate) {
        let sc = &mut self.subchannels[subchannel];
        sc.previous = None;
        sc.deferred = None;
        sc.selected = Some(candidate);
        if self.state != IceState::Completed {
            self.logger.info("ICE completed");
            self.state = IceState::Completed;
        }
    }

    /// Binding indication keeping the selected path's NAT bindings open.
    pub fn keepalive(&self, subchannel: usize) -> Option<(SocketAddr, Vec<u8>)> {
        if self.state != IceState::Completed {
            return None;
        }
        let selected = self.subchannels.get(subchannel)?.selected.as_ref()?;
        let indication = MessageBuilder::new(MessageType::BINDING_INDICATION).build(None, true);
        Some((selected.address, indication))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate_type::CandidateType;
    use stun::NetworkCost;

    const REMOTE_UFRAG: &str = "rUfr";
    const REMOTE_PWD: &str = "remote-password-0123456789";

    fn local_addrs() -> Vec<SocketAddr> {
        vec!["10.0.0.1:5000".parse().unwrap(), "10.0.0.1:5001".parse().unwrap()]
    }

    fn agent(config: IceConfig) -> IceAgent {
        IceAgent::new(config, local_addrs(), Logger::discard())
    }

    fn remote(component: u32, addr: &str, priority: u32) -> Candidate {
        Candidate::new(CandidateType::Host, component, "f1", priority, addr.parse().unwrap())
    }

    fn check(agent: &IceAgent, priority: Option<u32>, nominate: bool, cost: Option<NetworkCost>) -> Vec<u8> {
        let (ufrag, pwd) = agent.local_credentials();
        let mut builder = MessageBuilder::new(MessageType::BINDING_REQUEST)
            .username(&format!("{}:{}", ufrag, REMOTE_UFRAG))
            .ice_controlling(7);
        if let Some(priority) = priority {
            builder = builder.priority(priority);
        }
        if nominate {
            builder = builder.use_candidate();
        }
        if let Some(cost) = cost {
            builder = builder.network_cost(cost);
        }
        builder.build(Some(pwd.as_bytes()), true)
    }

    fn answering_agent(config: IceConfig) -> IceAgent {
        let mut agent = agent(config);
        agent
            .set_candidates(REMOTE_UFRAG, REMOTE_PWD, &[remote(1, "192.0.2.1:6000", 0x7EFFFFFF)])
            .unwrap();
        agent
    }

    #[test]
    fn test_offer_priorities_for_two_subchannels() {
        let mut agent = agent(IceConfig::default());
        let description = agent.get_candidates(true).unwrap();
        assert_eq!(agent.state(), IceState::Offering);
        let priorities: Vec<u32> = description.candidates.iter().map(|c| c.priority).collect();
        assert_eq!(priorities, vec![0x7EFFFFFF, 0x7EFFFFFE]);
        assert_eq!(description.candidates[1].component_id, 2);
    }

    #[test]
    fn test_trickle_appends_final_marker() {
        let mut agent = agent(IceConfig {
            trickle: true,
            ..IceConfig::default()
        });
        let description = agent.get_candidates(true).unwrap();
        let last = description.candidates.last().unwrap();
        assert_eq!(description.candidates.len(), 3);
        assert_eq!(last.candidate_type, CandidateType::Final);
        assert_eq!(last.foundation, "xyzzy");
    }

    #[test]
    fn test_get_candidates_requires_subchannels() {
        let mut agent = IceAgent::new(IceConfig::default(), Vec::new(), Logger::discard());
        assert!(matches!(agent.get_candidates(true), Err(IceError::Configuration(_))));
    }

    #[test]
    fn test_disabled_config_refuses() {
        let mut agent = agent(IceConfig {
            enabled: false,
            ..IceConfig::default()
        });
        assert!(agent.get_candidates(true).is_err());
        assert!(agent.set_candidates("u", "p", &[remote(1, "192.0.2.1:1", 1)]).is_err());
        assert_eq!(agent.state(), IceState::Disabled);
    }

    #[test]
    fn test_answer_round_trip_keeps_local_credentials() {
        let mut agent = agent(IceConfig::default());
        let (ufrag, pwd) = {
            let (u, p) = agent.local_credentials();
            (u.to_string(), p.to_string())
        };
        agent
            .set_candidates("someone", "secret", &[remote(1, "192.0.2.1:6000", 100)])
            .unwrap();
        assert_eq!(agent.state(), IceState::Answering);

        let description = agent.get_candidates(false).unwrap();
        assert_eq!(description.ufrag, ufrag);
        assert_eq!(description.pwd, pwd);
        assert_eq!(agent.state(), IceState::OfferAnswered);
    }

    #[test]
    fn test_set_candidates_edge_cases() {
        let mut agent = agent(IceConfig::default());
        assert_eq!(
            agent.set_candidates(REMOTE_UFRAG, REMOTE_PWD, &[]),
            Err(IceError::NoCandidates)
        );
        assert_eq!(agent.state(), IceState::Disabled);

        let mut tcp = remote(1, "192.0.2.1:6000", 1);
        tcp.protocol = crate::candidate::TransportProtocol::Tcp;
        let bad_component = remote(3, "192.0.2.1:6001", 1);
        assert_eq!(
            agent.set_candidates(REMOTE_UFRAG, REMOTE_PWD, &[tcp, bad_component]),
            Err(IceError::NoSuitableCandidates)
        );
        assert_eq!(agent.state(), IceState::Disabled);

        agent
            .set_candidates(REMOTE_UFRAG, REMOTE_PWD, &[remote(1, "192.0.2.1:6000", 1)])
            .unwrap();
        assert_eq!(agent.state(), IceState::Answering);
        agent.set_candidates("", "", &[]).unwrap();
        assert_eq!(agent.state(), IceState::Disabled);
    }

    #[test]
    fn test_nomination_completes_answering() {
        let mut agent = answering_agent(IceConfig::default());
        let source: SocketAddr = "192.0.2.1:6000".parse().unwrap();
        let request = check(&agent, Some(0x7EFFFFFF), true, None);

        let outcome = agent.handle_inbound(0, &request, source, Instant::now());
        let IceOutcome::Consumed { reply, nominated } = outcome else {
            panic!("STUN must be consumed");
        };
        assert_eq!(nominated, Some(source));
        let reply = Message::decode(&reply.unwrap()).unwrap();
        assert_eq!(reply.message_type(), MessageType::BINDING_SUCCESS);
        assert_eq!(reply.xor_mapped_address(), Some(source));
        let (_, pwd) = agent.local_credentials();
        assert!(reply.check_integrity(pwd.as_bytes()).is_ok());

        assert_eq!(agent.state(), IceState::Completed);
        assert_eq!(agent.remote_address(0), Some(source));
        assert_eq!(agent.selected(0).unwrap().state, CandidateState::Succeeded);
    }

    #[test]
    fn test_check_without_use_candidate_only_answers() {
        let mut agent = answering_agent(IceConfig::default());
        let source: SocketAddr = "192.0.2.1:6000".parse().unwrap();
        let request = check(&agent, Some(0x7EFFFFFF), false, None);
        let outcome = agent.handle_inbound(0, &request, source, Instant::now());
        assert!(matches!(outcome, IceOutcome::Consumed { reply: Some(_), nominated: None }));
        assert_eq!(agent.state(), IceState::Answering);
        assert_eq!(agent.remote_candidates(0)[0].rx_requests, 1);
    }

    #[test]
    fn test_bad_integrity_gets_401() {
        let mut agent = answering_agent(IceConfig::default());
        let (ufrag, _) = agent.local_credentials();
        let request = MessageBuilder::new(MessageType::BINDING_REQUEST)
            .username(&format!("{}:{}", ufrag, REMOTE_UFRAG))
            .use_candidate()
            .build(Some(b"not-the-password"), true);
        let outcome = agent.handle_inbound(0, &request, "192.0.2.1:6000".parse().unwrap(), Instant::now());
        let IceOutcome::Consumed { reply: Some(reply), nominated: None } = outcome else {
            panic!("expected error reply");
        };
        let reply = Message::decode(&reply).unwrap();
        assert_eq!(reply.error_code().unwrap().code, 401);
        assert_eq!(agent.state(), IceState::Answering);
    }

    #[test]
    fn test_unknown_source_learns_type_from_priority() {
        let mut agent = answering_agent(IceConfig::default());
        let source: SocketAddr = "203.0.113.9:7000".parse().unwrap();
        let request = check(&agent, Some(0x64FFFFFF), true, None);
        agent.handle_inbound(0, &request, source, Instant::now());

        let learned = agent
            .remote_candidates(0)
            .iter()
            .find(|c| c.address == source)
            .unwrap();
        assert_eq!(learned.candidate_type, CandidateType::Srflx);
        assert!(learned.foundation.is_empty());
    }

    #[test]
    fn test_unknown_source_without_priority_is_relay() {
        let mut agent = answering_agent(IceConfig::default());
        let source: SocketAddr = "203.0.113.9:7001".parse().unwrap();
        let request = check(&agent, None, false, None);
        agent.handle_inbound(0, &request, source, Instant::now());
        let learned = agent.remote_candidates(0).last().unwrap();
        assert_eq!(learned.candidate_type, CandidateType::Relay);
    }

    #[test]
    fn test_nomination_never_downgrades() {
        let low: SocketAddr = "203.0.113.1:1000".parse().unwrap();
        let high: SocketAddr = "203.0.113.2:2000".parse().unwrap();

        for order in [[low, high], [high, low]] {
            let mut agent = answering_agent(IceConfig::default());
            for source in order {
                let priority = if source == high { 0x7E00FFFF } else { 0x6400FFFF };
                let request = check(&agent, Some(priority), true, None);
                agent.handle_inbound(0, &request, source, Instant::now());
            }
            assert_eq!(agent.remote_address(0), Some(high));
            assert_eq!(agent.selected(0).unwrap().priority, 0x7E00FFFF);
        }
    }

    #[test]
    fn test_network_cost_overrides_priority() {
        let mut agent = answering_agent(IceConfig {
            network_cost: true,
            ..IceConfig::default()
        });
        let cellular: SocketAddr = "203.0.113.1:1000".parse().unwrap();
        let wifi: SocketAddr = "203.0.113.2:2000".parse().unwrap();

        let request = check(&agent, Some(0x7E00FFFF), true, Some(NetworkCost::new(1, 900)));
        agent.handle_inbound(0, &request, cellular, Instant::now());
        assert_eq!(agent.remote_address(0), Some(cellular));

        let request = check(&agent, Some(0x6400FFFF), true, Some(NetworkCost::new(2, 10)));
        agent.handle_inbound(0, &request, wifi, Instant::now());
        assert_eq!(agent.remote_address(0), Some(wifi));
    }

    #[test]
    fn test_network_cost_ignored_without_policy() {
        let mut agent = answering_agent(IceConfig::default());
        let cellular: SocketAddr = "203.0.113.1:1000".parse().unwrap();
        let wifi: SocketAddr = "203.0.113.2:2000".parse().unwrap();

        let request = check(&agent, Some(0x7E00FFFF), true, Some(NetworkCost::new(1, 900)));
        agent.handle_inbound(0, &request, cellular, Instant::now());
        let request = check(&agent, Some(0x6400FFFF), true, Some(NetworkCost::new(2, 10)));
        agent.handle_inbound(0, &request, wifi, Instant::now());
        assert_eq!(agent.remote_address(0), Some(cellular));
    }

    #[test]
    fn test_early_nomination_deferred_until_answer() {
        let mut agent = agent(IceConfig::default());
        agent.get_candidates(true).unwrap();
        let source: SocketAddr = "192.0.2.1:6000".parse().unwrap();

        let request = check(&agent, Some(0x6EFFFFFF), true, Some(NetworkCost::new(3, 50)));
        let outcome = agent.handle_inbound(0, &request, source, Instant::now());
        assert!(matches!(outcome, IceOutcome::Consumed { reply: Some(_), nominated: None }));
        assert_eq!(agent.state(), IceState::Offering);
        assert!(agent.selected(0).is_none());

        agent
            .set_candidates(REMOTE_UFRAG, REMOTE_PWD, &[remote(1, "192.0.2.1:6000", 0x7EFFFFFF)])
            .unwrap();
        assert_eq!(agent.state(), IceState::Completed);
        let selected = agent.selected(0).unwrap();
        assert_eq!(selected.address, source);
        assert_eq!(selected.foundation, "f1");
        assert_eq!(selected.priority, 0x7EFFFFFF);

        // Early bookkeeping survives the merge
        let merged = &agent.remote_candidates(0)[0];
        assert_eq!(merged.network, Some(NetworkCost::new(3, 50)));
        assert_eq!(merged.nominations, 1);
        assert_eq!(agent.remote_candidates(0).len(), 1);
    }

    #[test]
    fn test_offer_answered_without_early_nomination() {
        let mut agent = agent(IceConfig::default());
        agent.get_candidates(true).unwrap();
        agent
            .set_candidates(REMOTE_UFRAG, REMOTE_PWD, &[remote(1, "192.0.2.1:6000", 1)])
            .unwrap();
        assert_eq!(agent.state(), IceState::OfferAnswered);
        assert_eq!(agent.role(), IceRole::Lite);
    }

    #[test]
    fn test_completed_get_candidates_is_idempotent() {
        let mut agent = answering_agent(IceConfig::default());
        let source: SocketAddr = "192.0.2.1:6000".parse().unwrap();
        let request = check(&agent, Some(1), true, None);
        agent.handle_inbound(0, &request, source, Instant::now());
        assert_eq!(agent.state(), IceState::Completed);

        let first = agent.get_candidates(true).unwrap();
        let second = agent.get_candidates(true).unwrap();
        assert_eq!(agent.state(), IceState::Completed);
        assert_eq!(first.ufrag, second.ufrag);
        assert_eq!(first.pwd, second.pwd);
        assert_eq!(first.candidates.len(), second.candidates.len());
        assert!(
            first
                .candidates
                .iter()
                .zip(&second.candidates)
                .all(|(a, b)| a.same_description(b))
        );
    }

    #[test]
    fn test_completed_same_credentials_is_noop() {
        let mut agent = answering_agent(IceConfig::default());
        let source: SocketAddr = "192.0.2.1:6000".parse().unwrap();
        let request = check(&agent, Some(1), true, None);
        agent.handle_inbound(0, &request, source, Instant::now());

        agent
            .set_candidates(REMOTE_UFRAG, REMOTE_PWD, &[remote(1, "192.0.2.99:1", 5)])
            .unwrap();
        assert_eq!(agent.state(), IceState::Completed);
        assert_eq!(agent.remote_address(0), Some(source));
    }

    #[test]
    fn test_media_filtering_and_restart_grace() {
        let mut agent = answering_agent(IceConfig::default());
        let selected: SocketAddr = "192.0.2.1:6000".parse().unwrap();
        let stranger: SocketAddr = "192.0.2.50:6000".parse().unwrap();
        let rtp = [0x80u8, 0x60, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0];

        // Before any selection media passes
        assert_eq!(agent.handle_inbound(0, &rtp, stranger, Instant::now()), IceOutcome::Forward);

        let request = check(&agent, Some(1), true, None);
        agent.handle_inbound(0, &request, selected, Instant::now());
        assert_eq!(agent.handle_inbound(0, &rtp, selected, Instant::now()), IceOutcome::Forward);
        assert_eq!(agent.handle_inbound(0, &rtp, stranger, Instant::now()), IceOutcome::Discard);

        // Restart: old path keeps flowing, others still dropped
        agent
            .set_candidates("newU", "new-password-abcdefghijkl", &[remote(1, "192.0.2.7:7000", 9)])
            .unwrap();
        assert_eq!(agent.state(), IceState::Answering);
        assert_eq!(agent.remote_address(0), Some(selected));
        assert_eq!(agent.handle_inbound(0, &rtp, selected, Instant::now()), IceOutcome::Forward);
        assert_eq!(agent.handle_inbound(0, &rtp, stranger, Instant::now()), IceOutcome::Discard);
    }

    #[test]
    fn test_stun_is_consumed_even_when_disabled() {
        let mut agent = agent(IceConfig::default());
        let request = check(&agent, Some(1), true, None);
        let outcome = agent.handle_inbound(0, &request, "192.0.2.1:1".parse().unwrap(), Instant::now());
        assert_eq!(outcome, IceOutcome::Consumed { reply: None, nominated: None });
    }

    #[test]
    fn test_unexpected_response_consumed() {
        let mut agent = answering_agent(IceConfig::default());
        let response = MessageBuilder::new(MessageType::BINDING_SUCCESS).build(None, true);
        let outcome = agent.handle_inbound(0, &response, "192.0.2.1:6000".parse().unwrap(), Instant::now());
        assert_eq!(outcome, IceOutcome::Consumed { reply: None, nominated: None });
        assert_eq!(agent.state(), IceState::Answering);
    }

    #[test]
    fn test_is_established_needs_every_subchannel() {
        let mut agent = answering_agent(IceConfig::default());
        assert!(!agent.is_established());
        let request = check(&agent, Some(1), true, None);
        agent.handle_inbound(0, &request, "192.0.2.1:6000".parse().unwrap(), Instant::now());
        assert!(!agent.is_established());
        let request = check(&agent, Some(1), true, None);
        agent.handle_inbound(1, &request, "192.0.2.1:6001".parse().unwrap(), Instant::now());
        assert!(agent.is_established());
    }

    #[test]
    fn test_keepalive_follows_selection() {
        let mut agent = answering_agent(IceConfig::default());
        let target: SocketAddr = "192.0.2.1:6000".parse().unwrap();
        assert!(agent.keepalive(0).is_none());

        let nomination = check(&agent, Some(1), true, None);
        agent.handle_inbound(0, &nomination, target, Instant::now());
        let (to, indication) = agent.keepalive(0).unwrap();
        assert_eq!(to, target);
        assert_eq!(
            Message::decode(&indication).unwrap().message_type(),
            MessageType::BINDING_INDICATION
        );
        assert!(agent.keepalive(1).is_none());
    }

    #[test]
    fn test_signed_response_while_offering_completes() {
        let mut agent = agent(IceConfig::default());
        agent.get_candidates(true).unwrap();
        // Credentials kept from an earlier session
        let source: SocketAddr = "192.0.2.1:6000".parse().unwrap();
        agent.credentials.remote_ufrag = REMOTE_UFRAG.to_string();
        agent.credentials.remote_pwd = REMOTE_PWD.to_string();

        let response = MessageBuilder::new(MessageType::BINDING_SUCCESS)
            .xor_mapped_address("10.0.0.1:5000".parse().unwrap())
            .build(Some(REMOTE_PWD.as_bytes()), true);
        let outcome = agent.handle_inbound(0, &response, source, Instant::now());
        assert_eq!(
            outcome,
            IceOutcome::Consumed {
                reply: None,
                nominated: Some(source)
            }
        );
        assert_eq!(agent.state(), IceState::Completed);
        assert_eq!(agent.remote_address(0), Some(source));
    }

    #[test]
    fn test_unsigned_response_while_offering_ignored() {
        let mut agent = agent(IceConfig::default());
        agent.get_candidates(true).unwrap();
        agent.credentials.remote_ufrag = REMOTE_UFRAG.to_string();
        agent.credentials.remote_pwd = REMOTE_PWD.to_string();

        let response = MessageBuilder::new(MessageType::BINDING_SUCCESS)
            .build(Some(b"somebody-else"), true);
        let outcome = agent.handle_inbound(0, &response, "192.0.2.1:6000".parse().unwrap(), Instant::now());
        assert_eq!(outcome, IceOutcome::Consumed { reply: None, nominated: None });
        assert_eq!(agent.state(), IceState::Offering);
    }
}
