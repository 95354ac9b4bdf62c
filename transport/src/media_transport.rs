//! Secure media transport
//!
//! Owns one UDP socket and one reader thread per subchannel. Inbound
//! datagrams go to the ICE agent first, then to the subchannel's DTLS
//! engine, and whatever is left reaches the media session as
//! [`TransportEvent::Media`].
//!
//! Signaling calls and reader threads share the ICE agent through a single
//! read-write lock. Readers keep a snapshot of the media source filter
//! tagged with an epoch counter, so steady-state media never takes it.

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::event::TransportEvent;
use crate::reader::SubchannelReader;
use ice::{Candidate, IceAgent, IceState, LocalDescription, resolve_host_address};
use logging::Logger;
use network::security::crypto_suite;
use network::{
    DtlsEngine, DtlsIdentity, DtlsRole, DtlsState, Fingerprint, HashAlgorithm, KeyInfoPair,
    NetworkError, UdpTransport,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};

/// Subchannel carrying media; its handshake yields the session keys.
pub const DATA_SUBCHANNEL: usize = 0;
/// Subchannel carrying control traffic (RTCP) when not multiplexed.
pub const CONTROL_SUBCHANNEL: usize = 1;
pub const MAX_SUBCHANNELS: usize = 2;

/// Per-subchannel counters and addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubchannelStatistics {
    pub local_address: Option<SocketAddr>,
    pub remote_address: Option<SocketAddr>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

#[derive(Debug, Clone)]
pub struct TransportStatistics {
    pub ice_state: IceState,
    pub subchannels: Vec<SubchannelStatistics>,
    /// Local and remote candidates with their check state
    pub candidates: Vec<Candidate>,
}

#[derive(Default)]
struct KeyState {
    /// Keys waiting for the SRTP consumer
    pending: Option<KeyInfoPair>,
    /// A handshake on the data subchannel produced keys since the last re-arm
    derived: bool,
}

impl KeyState {
    fn clear(&mut self) {
        self.pending = None;
        self.derived = false;
    }
}

pub(crate) struct Security {
    identity: Arc<DtlsIdentity>,
    engines: Vec<Mutex<DtlsEngine>>,
    keys: Mutex<KeyState>,
    remote_fingerprint: Mutex<Option<Fingerprint>>,
    /// Set by an ICE restart, cleared when the subchannel's new path is
    /// nominated or a new handshake completes
    restarting: Vec<AtomicBool>,
}

/// State shared by the transport handle and its reader threads.
///
/// Only [`MediaTransport`] holds a strong reference; readers upgrade a weak
/// one per iteration and stop once it is gone.
pub(crate) struct Shared {
    pub(crate) config: TransportConfig,
    pub(crate) logger: Logger,
    pub(crate) sockets: Vec<UdpTransport>,
    ice: RwLock<IceAgent>,
    epoch: AtomicU64,
    pub(crate) security: Option<Security>,
    closed: AtomicBool,
    failed: AtomicBool,
    announced: AtomicBool,
    events: Sender<TransportEvent>,
}

impl Shared {
    pub(crate) fn ice_read(&self) -> RwLockReadGuard<'_, IceAgent> {
        self.ice.read().unwrap_or_else(|poisoned| {
            self.logger.error("ICE agent lock poisoned");
            poisoned.into_inner()
        })
    }

    pub(crate) fn ice_write(&self) -> RwLockWriteGuard<'_, IceAgent> {
        self.ice.write().unwrap_or_else(|poisoned| {
            self.logger.error("ICE agent lock poisoned");
            poisoned.into_inner()
        })
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Invalidates every reader's cached view of ICE and DTLS state.
    pub(crate) fn bump_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn emit(&self, event: TransportEvent) {
        if self.events.send(event).is_err() {
            self.logger.trace("transport event dropped, no receiver");
        }
    }

    pub(crate) fn send_raw(&self, subchannel: usize, data: &[u8], target: SocketAddr) {
        let Some(socket) = self.sockets.get(subchannel) else {
            return;
        };
        if let Err(e) = socket.send_to(data, target) {
            self.logger.warn(&format!(
                "subchannel {} send to {} failed: {}",
                subchannel, target, e
            ));
        }
    }

    /// Marks the transport unusable after a socket error.
    pub(crate) fn fail(&self, subchannel: usize, error: NetworkError) {
        self.logger.error(&format!(
            "subchannel {} read failed, transport unusable: {}",
            subchannel, error
        ));
        self.failed.store(true, Ordering::Release);
        self.announced.store(false, Ordering::Release);
        self.emit(TransportEvent::Failed { subchannel, error });
    }

    pub(crate) fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Stores keys from a completed handshake; only the data subchannel's
    /// keys reach the SRTP consumer.
    fn store_keys(&self, subchannel: usize, keys: Option<KeyInfoPair>) {
        let Some(security) = &self.security else {
            return;
        };
        if subchannel != DATA_SUBCHANNEL {
            self.logger.debug(&format!(
                "subchannel {} handshake complete, keys come from the data subchannel",
                subchannel
            ));
            return;
        }
        let Some(keys) = keys else {
            return;
        };
        let mut state = security.lock_keys(&self.logger);
        state.pending = Some(keys);
        state.derived = true;
    }

    pub(crate) fn is_established(&self) -> bool {
        if self.is_closed() || self.is_failed() {
            return false;
        }
        if !self.ice_read().is_established() {
            return false;
        }
        match &self.security {
            Some(security) => {
                let derived = security.lock_keys(&self.logger).derived;
                derived
                    && (0..security.engines.len()).all(|subchannel| {
                        security.lock_engine(subchannel, &self.logger).state()
                            == DtlsState::Established
                    })
            }
            None => true,
        }
    }

    /// A handshake finished on `subchannel`; it replaces whatever an ICE
    /// restart was waiting to tear down.
    pub(crate) fn handshake_completed(&self, subchannel: usize, keys: Option<KeyInfoPair>) {
        if let Some(flag) = self
            .security
            .as_ref()
            .and_then(|security| security.restarting.get(subchannel))
        {
            flag.store(false, Ordering::Release);
        }
        self.store_keys(subchannel, keys);
    }

    /// The peer closed the association on `subchannel`; its keys are dead.
    pub(crate) fn association_closed(&self, subchannel: usize) {
        let Some(security) = &self.security else {
            return;
        };
        if subchannel == DATA_SUBCHANNEL {
            security.lock_keys(&self.logger).clear();
        }
        self.bump_epoch();
    }

    /// Drops the association an ICE restart left running on `subchannel`
    /// now that the new path is nominated. Returns true when a new
    /// handshake has to run.
    ///
    /// Called with the ICE agent locked, so the new path is never seen
    /// established with the old keys.
    pub(crate) fn rearm_after_restart(&self, subchannel: usize) -> bool {
        let Some(security) = &self.security else {
            return false;
        };
        let pending = security
            .restarting
            .get(subchannel)
            .is_some_and(|flag| flag.swap(false, Ordering::AcqRel));
        if !pending {
            return false;
        }
        {
            let mut engine = security.lock_engine(subchannel, &self.logger);
            // A peer that already sent a new ClientHello is mid-handshake
            if matches!(engine.state(), DtlsState::Idle | DtlsState::Handshaking) {
                return false;
            }
            engine.reset();
        }
        if subchannel == DATA_SUBCHANNEL {
            security.lock_keys(&self.logger).clear();
        }
        true
    }

    /// Emits [`TransportEvent::Established`] once per establishment.
    pub(crate) fn check_established(&self) {
        if self.is_established() {
            if !self.announced.swap(true, Ordering::AcqRel) {
                self.logger.info("Media transport established");
                self.emit(TransportEvent::Established);
            }
        } else {
            self.announced.store(false, Ordering::Release);
        }
    }

    /// Drops every DTLS association and key so handshakes start over.
    fn rearm_handshakes(&self) {
        let Some(security) = &self.security else {
            return;
        };
        for subchannel in 0..security.engines.len() {
            security.restarting[subchannel].store(false, Ordering::Release);
            let mut engine = security.lock_engine(subchannel, &self.logger);
            if engine.state() != DtlsState::Idle {
                engine.reset();
            }
        }
        security.lock_keys(&self.logger).clear();
        self.bump_epoch();
    }
}

impl Security {
    pub(crate) fn lock_engine(
        &self,
        subchannel: usize,
        logger: &Logger,
    ) -> MutexGuard<'_, DtlsEngine> {
        self.engines[subchannel].lock().unwrap_or_else(|poisoned| {
            logger.error(&format!("DTLS engine mutex poisoned on subchannel {}", subchannel));
            poisoned.into_inner()
        })
    }

    fn lock_keys(&self, logger: &Logger) -> MutexGuard<'_, KeyState> {
        self.keys.lock().unwrap_or_else(|poisoned| {
            logger.error("Key mutex poisoned");
            poisoned.into_inner()
        })
    }

    fn lock_remote_fingerprint(&self, logger: &Logger) -> MutexGuard<'_, Option<Fingerprint>> {
        self.remote_fingerprint.lock().unwrap_or_else(|poisoned| {
            logger.error("Fingerprint mutex poisoned");
            poisoned.into_inner()
        })
    }
}

/// Media transport for one call: sockets, ICE, DTLS-SRTP and readers.
pub struct MediaTransport {
    shared: Arc<Shared>,
    readers: Vec<JoinHandle<()>>,
}

impl MediaTransport {
    /// Opens `subchannels` sockets on `local_interface` and starts a reader
    /// thread for each.
    ///
    /// `remote` is the address signaling supplied for the data subchannel;
    /// the control subchannel uses the next port. It is only used while ICE
    /// is not running.
    ///
    /// # Errors
    /// `Config` for a bad subchannel count or when the crypto suites were
    /// never registered, `Network` when a socket cannot be bound or the
    /// DTLS identity cannot be generated.
    pub fn open(
        config: TransportConfig,
        subchannels: usize,
        local_interface: IpAddr,
        remote: Option<SocketAddr>,
        logger: Logger,
    ) -> Result<(Self, Receiver<TransportEvent>)> {
        if subchannels == 0 || subchannels > MAX_SUBCHANNELS {
            return Err(TransportError::Config(format!(
                "subchannel count must be 1 or 2, got {}",
                subchannels
            )));
        }
        if config.ice_enabled() && !config.ice_lite() {
            return Err(TransportError::Config(
                "only ICE-lite is supported".to_string(),
            ));
        }
        if config.secure() && !crypto_suite::is_initialized() {
            return Err(TransportError::Config(
                "crypto suites not registered, call init() first".to_string(),
            ));
        }

        let logger = logger.for_component("media_transport");
        logger.info(&format!(
            "Opening media transport: {} subchannel(s) on {}, ICE {}, {}",
            subchannels,
            local_interface,
            if config.ice_enabled() { "lite" } else { "off" },
            if config.secure() { "DTLS-SRTP" } else { "plain" }
        ));

        let mut sockets = Vec::with_capacity(subchannels);
        let mut local_addresses = Vec::with_capacity(subchannels);
        for subchannel in 0..subchannels {
            let socket = UdpTransport::new(
                SocketAddr::new(local_interface, 0),
                logger.for_component(&format!("udp-{}", subchannel)),
            )?;
            socket.set_read_timeout(config.tick())?;
            let bound = socket.local_addr()?;
            local_addresses.push(resolve_host_address(bound, remote.map(|r| r.ip())));
            sockets.push(socket);
        }

        let mut ice = IceAgent::new(
            config.ice_config(),
            local_addresses,
            logger.for_component("ice"),
        );
        if let Some(remote) = remote {
            for subchannel in 0..subchannels {
                let port = remote.port().wrapping_add(subchannel as u16);
                ice.set_configured_remote(subchannel, Some(SocketAddr::new(remote.ip(), port)));
            }
        }

        let security = if config.secure() {
            let identity = Arc::new(DtlsIdentity::generate()?);
            let engines = (0..subchannels)
                .map(|subchannel| {
                    Mutex::new(DtlsEngine::new(
                        identity.clone(),
                        config.dtls_config(),
                        logger.for_component(&format!("dtls-{}", subchannel)),
                    ))
                })
                .collect();
            Some(Security {
                identity,
                engines,
                keys: Mutex::new(KeyState::default()),
                remote_fingerprint: Mutex::new(None),
                restarting: (0..subchannels).map(|_| AtomicBool::new(false)).collect(),
            })
        } else {
            None
        };

        let (events, receiver) = mpsc::channel();
        let shared = Arc::new(Shared {
            config,
            logger: logger.clone(),
            sockets,
            ice: RwLock::new(ice),
            epoch: AtomicU64::new(1),
            security,
            closed: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            announced: AtomicBool::new(false),
            events,
        });

        let mut transport = MediaTransport {
            shared,
            readers: Vec::with_capacity(subchannels),
        };
        for subchannel in 0..subchannels {
            let reader = SubchannelReader::new(subchannel, &transport.shared);
            let handle = thread::Builder::new()
                .name(format!("media-reader-{}", subchannel))
                .spawn(move || reader.run())
                .map_err(|e| {
                    NetworkError::ThreadError(format!("Failed to spawn reader thread: {}", e))
                });
            match handle {
                Ok(handle) => transport.readers.push(handle),
                Err(e) => {
                    transport.close();
                    return Err(e.into());
                }
            }
        }

        transport.shared.check_established();
        Ok((transport, receiver))
    }

    /// Local credentials and one host candidate per subchannel.
    ///
    /// # Errors
    /// `Ice(Configuration)` when ICE is disabled.
    pub fn get_candidates(&self, offering: bool) -> Result<LocalDescription> {
        let description = self.shared.ice_write().get_candidates(offering)?;
        self.shared.bump_epoch();
        Ok(description)
    }

    /// Applies the peer's ICE credentials and candidates.
    ///
    /// Returns false when the candidates were unusable; the transport then
    /// simply never becomes established.
    pub fn set_candidates(&self, ufrag: &str, pwd: &str, candidates: &[Candidate]) -> bool {
        let (result, restarted) = {
            let mut ice = self.shared.ice_write();
            let before = ice.state();
            let result = ice.set_candidates(ufrag, pwd, candidates);
            let restarted = before == IceState::Completed && ice.state() == IceState::Answering;
            (result, restarted)
        };
        self.shared.bump_epoch();

        if restarted {
            if let Some(security) = &self.shared.security {
                self.shared
                    .logger
                    .info("ICE restart, DTLS stays on the previous path until a new nomination");
                for flag in &security.restarting {
                    flag.store(true, Ordering::Release);
                }
            }
        }
        self.shared.check_established();

        match result {
            Ok(()) => true,
            Err(e) => {
                self.shared
                    .logger
                    .warn(&format!("Remote candidates rejected: {}", e));
                false
            }
        }
    }

    /// Sets the fingerprint the peer's certificate must match.
    ///
    /// Returns true when it differs from the previous one. A change on a
    /// transport that already ran a handshake re-arms it on the same
    /// sockets.
    ///
    /// # Errors
    /// `Config` on a transport opened without security.
    pub fn set_remote_fingerprint(&self, fingerprint: Fingerprint) -> Result<bool> {
        let security = self.security()?;
        let changed = {
            let mut current = security.lock_remote_fingerprint(&self.shared.logger);
            if current.as_ref() == Some(&fingerprint) {
                false
            } else {
                *current = Some(fingerprint.clone());
                true
            }
        };
        if !changed {
            return Ok(false);
        }

        self.shared
            .logger
            .info(&format!("Remote DTLS fingerprint set: {}", fingerprint));
        for subchannel in 0..security.engines.len() {
            security
                .lock_engine(subchannel, &self.shared.logger)
                .set_remote_fingerprint(fingerprint.clone());
        }
        self.shared.rearm_handshakes();
        self.shared.check_established();
        Ok(true)
    }

    /// Fingerprint of the local certificate, by default in the hash the
    /// peer used for theirs.
    ///
    /// # Errors
    /// `Config` on a transport opened without security.
    pub fn get_local_fingerprint(&self, algorithm: Option<HashAlgorithm>) -> Result<Fingerprint> {
        let security = self.security()?;
        let algorithm = algorithm
            .or_else(|| {
                security
                    .lock_remote_fingerprint(&self.shared.logger)
                    .as_ref()
                    .map(Fingerprint::algorithm)
            })
            .unwrap_or_default();
        Ok(security.identity.fingerprint(algorithm)?)
    }

    /// Chooses the DTLS server role (setup:passive) for the next handshake.
    pub fn set_passive_mode(&self, passive: bool) {
        let Some(security) = &self.shared.security else {
            return;
        };
        let role = if passive {
            DtlsRole::Passive
        } else {
            DtlsRole::Active
        };
        for subchannel in 0..security.engines.len() {
            security
                .lock_engine(subchannel, &self.shared.logger)
                .set_role(role);
        }
        self.shared.bump_epoch();
    }

    /// Every subchannel has a remote path and, when secure, a live DTLS
    /// association whose keys were derived.
    pub fn is_established(&self) -> bool {
        self.shared.is_established()
    }

    /// Hands the session's SRTP keys to the caller; the transport keeps no
    /// copy. Returns `None` before the handshake or after an earlier take.
    pub fn get_key_info(&self) -> Option<KeyInfoPair> {
        let security = self.shared.security.as_ref()?;
        security.lock_keys(&self.shared.logger).pending.take()
    }

    /// Starts failed handshakes over, e.g. after a handshake timeout.
    pub fn retry_handshake(&self) {
        let Some(security) = &self.shared.security else {
            return;
        };
        let mut retried = false;
        for subchannel in 0..security.engines.len() {
            let mut engine = security.lock_engine(subchannel, &self.shared.logger);
            if engine.state() == DtlsState::Failed {
                engine.reset();
                retried = true;
            }
        }
        if retried {
            self.shared.logger.info("Retrying DTLS handshake");
            self.shared.bump_epoch();
        }
    }

    /// Sends a datagram to the subchannel's current remote address.
    ///
    /// # Errors
    /// `Closed` after close or once the peer closed the subchannel's DTLS
    /// association, `Config` when no remote address is known yet, `Network`
    /// on a socket failure.
    pub fn send(&self, subchannel: usize, data: &[u8]) -> Result<usize> {
        if self.shared.is_closed() || self.dtls_state(subchannel) == Some(DtlsState::Closed) {
            return Err(TransportError::Closed);
        }
        let socket = self
            .shared
            .sockets
            .get(subchannel)
            .ok_or_else(|| TransportError::Config(format!("no subchannel {}", subchannel)))?;
        let remote = self.shared.ice_read().remote_address(subchannel).ok_or_else(|| {
            TransportError::Config(format!("no remote address on subchannel {}", subchannel))
        })?;
        Ok(socket.send_to(data, remote)?)
    }

    pub fn ice_state(&self) -> IceState {
        self.shared.ice_read().state()
    }

    pub fn subchannel_count(&self) -> usize {
        self.shared.sockets.len()
    }

    pub fn local_address(&self, subchannel: usize) -> Option<SocketAddr> {
        self.shared.ice_read().local_address(subchannel)
    }

    pub fn remote_address(&self, subchannel: usize) -> Option<SocketAddr> {
        self.shared.ice_read().remote_address(subchannel)
    }

    /// DTLS state of a subchannel, `None` on an insecure transport.
    pub fn dtls_state(&self, subchannel: usize) -> Option<DtlsState> {
        let security = self.shared.security.as_ref()?;
        if subchannel >= security.engines.len() {
            return None;
        }
        Some(security.lock_engine(subchannel, &self.shared.logger).state())
    }

    pub fn statistics(&self) -> TransportStatistics {
        let ice = self.shared.ice_read();
        let subchannels = self
            .shared
            .sockets
            .iter()
            .enumerate()
            .map(|(subchannel, socket)| {
                let (bytes_sent, bytes_received) = socket.stats();
                SubchannelStatistics {
                    local_address: ice.local_address(subchannel),
                    remote_address: ice.remote_address(subchannel),
                    bytes_sent,
                    bytes_received,
                }
            })
            .collect();
        TransportStatistics {
            ice_state: ice.state(),
            subchannels,
            candidates: ice.candidate_statistics(),
        }
    }

    /// A reader hit a socket error; the session should end the call.
    pub fn is_failed(&self) -> bool {
        self.shared.is_failed()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Sends close_notify on live associations, stops the readers and
    /// wipes all key material.
    pub fn close(&mut self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.logger.info("Closing media transport");

        if let Some(security) = &self.shared.security {
            for subchannel in 0..security.engines.len() {
                let packets = {
                    let mut engine = security.lock_engine(subchannel, &self.shared.logger);
                    engine.close();
                    engine.take_pending_packets()
                };
                if packets.is_empty() {
                    continue;
                }
                if let Some(remote) = self.shared.ice_read().remote_address(subchannel) {
                    for packet in packets {
                        self.shared.send_raw(subchannel, &packet, remote);
                    }
                }
            }
            security.lock_keys(&self.shared.logger).clear();
        }

        for handle in self.readers.drain(..) {
            if handle.join().is_err() {
                self.shared.logger.error("Reader thread panicked");
            }
        }
        self.shared.logger.info("Media transport closed");
    }

    fn security(&self) -> Result<&Security> {
        self.shared
            .security
            .as_ref()
            .ok_or_else(|| TransportError::Config("transport opened without security".to_string()))
    }
}

impl Drop for MediaTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for MediaTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaTransport")
            .field("subchannels", &self.shared.sockets.len())
            .field("secure", &self.shared.security.is_some())
            .field("closed", &self.shared.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn open_plain(subchannels: usize, remote: Option<SocketAddr>) -> (MediaTransport, Receiver<TransportEvent>) {
        let config = TransportConfig::builder().secure(false).build();
        MediaTransport::open(config, subchannels, LOOPBACK, remote, Logger::discard()).unwrap()
    }

    #[test]
    fn test_open_rejects_bad_subchannel_count() {
        let config = TransportConfig::builder().secure(false).build();
        let result = MediaTransport::open(config.clone(), 0, LOOPBACK, None, Logger::discard());
        assert!(matches!(result, Err(TransportError::Config(_))));
        let result = MediaTransport::open(config, 3, LOOPBACK, None, Logger::discard());
        assert!(matches!(result, Err(TransportError::Config(_))));
    }

    #[test]
    fn test_open_rejects_full_ice_agent() {
        let config = TransportConfig::builder().secure(false).ice_lite(false).build();
        let result = MediaTransport::open(config, 1, LOOPBACK, None, Logger::discard());
        assert!(matches!(result, Err(TransportError::Config(_))));

        // Irrelevant once ICE is off
        let config = TransportConfig::builder()
            .secure(false)
            .ice_enabled(false)
            .ice_lite(false)
            .build();
        assert!(MediaTransport::open(config, 1, LOOPBACK, None, Logger::discard()).is_ok());
    }

    #[test]
    fn test_open_binds_one_socket_per_subchannel() {
        let (transport, _events) = open_plain(2, None);
        assert_eq!(transport.subchannel_count(), 2);
        let data = transport.local_address(DATA_SUBCHANNEL).unwrap();
        let control = transport.local_address(CONTROL_SUBCHANNEL).unwrap();
        assert_eq!(data.ip(), LOOPBACK);
        assert_ne!(data.port(), control.port());
        assert_eq!(transport.ice_state(), IceState::Disabled);
    }

    #[test]
    fn test_fixed_remote_without_ice_is_established() {
        let remote: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let (transport, events) = open_plain(2, Some(remote));
        assert!(transport.is_established());
        assert_eq!(transport.remote_address(CONTROL_SUBCHANNEL).unwrap().port(), 40001);
        assert!(matches!(events.try_recv(), Ok(TransportEvent::Established)));
    }

    #[test]
    fn test_not_established_without_remote() {
        let (transport, _events) = open_plain(1, None);
        assert!(!transport.is_established());
        assert!(matches!(transport.send(0, b"x"), Err(TransportError::Config(_))));
    }

    #[test]
    fn test_send_after_close_fails() {
        let remote: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let (mut transport, _events) = open_plain(1, Some(remote));
        transport.close();
        assert!(transport.is_closed());
        assert!(!transport.is_established());
        assert!(matches!(transport.send(0, b"x"), Err(TransportError::Closed)));
    }

    #[test]
    fn test_security_calls_need_secure_transport() {
        let (transport, _events) = open_plain(1, None);
        assert!(transport.get_local_fingerprint(None).is_err());
        assert!(transport.get_key_info().is_none());
        assert!(transport.dtls_state(0).is_none());
    }

    #[test]
    fn test_secure_open_creates_identity() {
        crate::init();
        let config = TransportConfig::default();
        let (transport, _events) =
            MediaTransport::open(config, 1, LOOPBACK, None, Logger::discard()).unwrap();
        assert_eq!(transport.dtls_state(0), Some(DtlsState::Idle));
        let local = transport.get_local_fingerprint(None).unwrap();
        assert_eq!(local.algorithm(), HashAlgorithm::Sha256);
    }

    #[test]
    fn test_remote_fingerprint_change_detection() {
        crate::init();
        let (transport, _events) =
            MediaTransport::open(TransportConfig::default(), 1, LOOPBACK, None, Logger::discard())
                .unwrap();
        let peer = DtlsIdentity::generate().unwrap();
        let fingerprint = peer.fingerprint(HashAlgorithm::Sha1).unwrap();

        assert!(transport.set_remote_fingerprint(fingerprint.clone()).unwrap());
        assert!(!transport.set_remote_fingerprint(fingerprint).unwrap());
        // Local hash follows the peer's choice
        let local = transport.get_local_fingerprint(None).unwrap();
        assert_eq!(local.algorithm(), HashAlgorithm::Sha1);
    }

    #[test]
    fn test_candidates_rejected_when_unusable() {
        let (transport, _events) = open_plain(1, None);
        assert!(!transport.set_candidates("ufrag", "password-0123456789abcd", &[]));
        assert_eq!(transport.ice_state(), IceState::Disabled);
    }
}
