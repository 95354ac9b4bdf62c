//! OpenSSL DTLS engine for one subchannel.
//!
//! Sans-IO like the rest of the stack: datagrams are pushed in with
//! [`DtlsEngine::handle_datagram`], periodic work happens in
//! [`DtlsEngine::poll`], and whatever OpenSSL wants to send is collected
//! with [`DtlsEngine::take_pending_packets`]. The engine never touches a
//! socket, so a failed or timed out handshake leaves the transport usable
//! for another attempt.

use super::certificate::{DtlsIdentity, Fingerprint};
use super::record::{
    CLIENT_HELLO, ContentType, HandshakeHeader, RecordHeader, is_dtls_record,
    is_plaintext_close_notify,
};
use crate::error::{NetworkError, Result};
use crate::security::crypto_suite::CryptoSuite;
use crate::security::key_info::{KeyInfo, KeyInfoPair};
use logging::Logger;
use openssl::ssl::{
    ErrorCode, HandshakeError, MidHandshakeSslStream, Ssl, SslContext, SslMethod, SslOptions,
    SslStream, SslVerifyMode,
};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use zeroize::Zeroize;

/// RFC 5764 exporter label for SRTP keying material.
pub const SRTP_EXPORTER_LABEL: &str = "EXTRACTOR-dtls_srtp";

pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_MTU: usize = 1400;

/// Handshake role, from the negotiated setup attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DtlsRole {
    /// Client, sends the ClientHello
    #[default]
    Active,
    /// Server, waits for the ClientHello
    Passive,
}

impl DtlsRole {
    pub fn is_server(&self) -> bool {
        matches!(self, DtlsRole::Passive)
    }
}

#[derive(Debug, Clone)]
pub struct DtlsConfig {
    pub role: DtlsRole,
    pub handshake_timeout: Duration,
    pub mtu: usize,
    /// Offered SRTP suites, most preferred first
    pub suites: Vec<CryptoSuite>,
}

impl Default for DtlsConfig {
    fn default() -> Self {
        Self {
            role: DtlsRole::Active,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            mtu: DEFAULT_MTU,
            suites: CryptoSuite::dtls_capable(),
        }
    }
}

/// Public view of the engine's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtlsState {
    Idle,
    Handshaking,
    Established,
    Failed,
    Closed,
}

/// Result of feeding one datagram to the engine.
#[derive(Debug)]
pub enum DtlsOutcome {
    /// DTLS traffic, handled here
    Consumed,
    /// The handshake just completed and keys are ready
    Established,
    /// The handshake failed; the engine stays failed until re-armed
    Failed(NetworkError),
    /// The peer closed the association
    Closed,
    /// Not DTLS, pass it on
    Forward,
    /// Not DTLS, but nothing can use it before the handshake ends
    Discard,
}

/// In-memory datagram queue standing in for the socket under OpenSSL.
#[derive(Debug, Default)]
struct Pipe {
    incoming: VecDeque<Vec<u8>>,
    outgoing: Vec<Vec<u8>>,
    /// Datagrams written since the last read, i.e. our latest flight
    last_flight: Vec<Vec<u8>>,
    flight_done: bool,
}

impl Read for Pipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.incoming.pop_front() {
            Some(datagram) => {
                let len = datagram.len().min(buf.len());
                buf[..len].copy_from_slice(&datagram[..len]);
                self.flight_done = true;
                Ok(len)
            }
            None => Err(io::ErrorKind::WouldBlock.into()),
        }
    }
}

impl Write for Pipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.flight_done {
            self.last_flight.clear();
            self.flight_done = false;
        }
        self.outgoing.push(buf.to_vec());
        self.last_flight.push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

enum Phase {
    Idle,
    Handshaking {
        stream: MidHandshakeSslStream<Pipe>,
        started: Instant,
        mismatch: Arc<AtomicBool>,
    },
    Established {
        stream: SslStream<Pipe>,
        /// message_seq of the last retransmitted record we answered
        answered: Option<u16>,
    },
    Failed,
    Closed,
}

/// DTLS-SRTP engine for one subchannel.
pub struct DtlsEngine {
    identity: Arc<DtlsIdentity>,
    config: DtlsConfig,
    remote_fingerprint: Option<Fingerprint>,
    phase: Phase,
    keys: Option<KeyInfoPair>,
    suite: Option<CryptoSuite>,
    pending_packets: Vec<Vec<u8>>,
    logger: Logger,
}

impl DtlsEngine {
    pub fn new(identity: Arc<DtlsIdentity>, config: DtlsConfig, logger: Logger) -> Self {
        Self {
            identity,
            config,
            remote_fingerprint: None,
            phase: Phase::Idle,
            keys: None,
            suite: None,
            pending_packets: Vec::new(),
            logger,
        }
    }

    pub fn state(&self) -> DtlsState {
        match self.phase {
            Phase::Idle => DtlsState::Idle,
            Phase::Handshaking { .. } => DtlsState::Handshaking,
            Phase::Established { .. } => DtlsState::Established,
            Phase::Failed => DtlsState::Failed,
            Phase::Closed => DtlsState::Closed,
        }
    }

    pub fn role(&self) -> DtlsRole {
        self.config.role
    }

    /// Takes effect on the next handshake.
    pub fn set_role(&mut self, role: DtlsRole) {
        self.config.role = role;
    }

    pub fn remote_fingerprint(&self) -> Option<&Fingerprint> {
        self.remote_fingerprint.as_ref()
    }

    pub fn set_remote_fingerprint(&mut self, fingerprint: Fingerprint) {
        self.remote_fingerprint = Some(fingerprint);
    }

    /// Suite negotiated by the last successful handshake.
    pub fn suite(&self) -> Option<CryptoSuite> {
        self.suite
    }

    pub fn has_keys(&self) -> bool {
        self.keys.is_some()
    }

    /// Hands the derived keys over; the engine keeps no copy.
    pub fn take_keys(&mut self) -> Option<KeyInfoPair> {
        self.keys.take()
    }

    /// Datagrams to send to the peer (drain pending).
    pub fn take_pending_packets(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.pending_packets)
    }

    /// Drops any association and key material and waits for a new start.
    pub fn reset(&mut self) {
        if !matches!(self.phase, Phase::Idle) {
            self.logger.debug("DTLS re-armed for a new handshake");
        }
        self.phase = Phase::Idle;
        self.keys = None;
        self.suite = None;
        self.pending_packets.clear();
    }

    fn build_context(&self, remote: Fingerprint, mismatch: Arc<AtomicBool>) -> Result<SslContext> {
        let profiles = self
            .config
            .suites
            .iter()
            .filter_map(|suite| suite.dtls_profile())
            .collect::<Vec<_>>()
            .join(":");
        if profiles.is_empty() {
            return Err(NetworkError::Config(
                "no DTLS-SRTP capable crypto suite configured".to_string(),
            ));
        }

        let mut ctx = SslContext::builder(SslMethod::dtls())?;
        ctx.set_certificate(self.identity.certificate())?;
        ctx.set_private_key(self.identity.private_key())?;
        ctx.check_private_key()?;
        ctx.set_tlsext_use_srtp(&profiles)?;
        ctx.set_options(SslOptions::NO_QUERY_MTU);
        ctx.set_verify_callback(
            SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT,
            move |_preverified, store| {
                // Self-signed peers never chain; only the leaf digest counts
                if store.error_depth() != 0 {
                    return true;
                }
                let ok = store
                    .current_cert()
                    .is_some_and(|cert| remote.matches(cert));
                if !ok {
                    mismatch.store(true, Ordering::SeqCst);
                }
                ok
            },
        );
        Ok(ctx.build())
    }

    /// Begins a handshake in the configured role.
    ///
    /// A setup error leaves the engine `Failed` until it is reset.
    ///
    /// # Errors
    /// `SecurityError` without a remote fingerprint, or OpenSSL setup
    /// failures.
    pub fn start(&mut self, now: Instant) -> Result<DtlsOutcome> {
        let result = self.begin(now);
        if result.is_err() {
            self.phase = Phase::Failed;
        }
        result
    }

    fn begin(&mut self, now: Instant) -> Result<DtlsOutcome> {
        let remote = self.remote_fingerprint.clone().ok_or_else(|| {
            NetworkError::SecurityError("remote fingerprint not set".to_string())
        })?;
        self.keys = None;
        self.suite = None;

        let mismatch = Arc::new(AtomicBool::new(false));
        let ctx = self.build_context(remote, mismatch.clone())?;
        let mut ssl = Ssl::new(&ctx)?;
        ssl.set_mtu(self.config.mtu as u32)?;

        self.logger.info(&format!(
            "Starting DTLS handshake (role: {})",
            if self.config.role.is_server() { "server" } else { "client" }
        ));

        let result = match self.config.role {
            DtlsRole::Active => ssl.connect(Pipe::default()),
            DtlsRole::Passive => ssl.accept(Pipe::default()),
        };
        Ok(self.on_handshake(result, now, mismatch))
    }

    fn on_handshake(
        &mut self,
        result: std::result::Result<SslStream<Pipe>, HandshakeError<Pipe>>,
        started: Instant,
        mismatch: Arc<AtomicBool>,
    ) -> DtlsOutcome {
        match result {
            Ok(mut stream) => {
                self.drain(stream.get_mut());
                match self.derive_keys(&stream) {
                    Ok(keys) => {
                        self.logger.info(&format!(
                            "DTLS handshake completed, SRTP suite {}",
                            keys.sender.suite()
                        ));
                        self.suite = Some(keys.sender.suite());
                        self.keys = Some(keys);
                        self.phase = Phase::Established {
                            stream,
                            answered: None,
                        };
                        DtlsOutcome::Established
                    }
                    Err(e) => {
                        self.logger.error(&format!("DTLS key export failed: {}", e));
                        self.phase = Phase::Failed;
                        DtlsOutcome::Failed(e)
                    }
                }
            }
            Err(HandshakeError::WouldBlock(mut stream)) => {
                self.drain(stream.get_mut());
                self.phase = Phase::Handshaking {
                    stream,
                    started,
                    mismatch,
                };
                DtlsOutcome::Consumed
            }
            Err(HandshakeError::Failure(mut stream)) => {
                self.drain(stream.get_mut());
                let error = if mismatch.load(Ordering::SeqCst) {
                    self.logger.error("Invalid remote certificate, fingerprint mismatch");
                    NetworkError::FingerprintMismatch
                } else {
                    self.logger
                        .error(&format!("DTLS handshake failed: {}", stream.error()));
                    NetworkError::SecurityError(stream.error().to_string())
                };
                self.phase = Phase::Failed;
                DtlsOutcome::Failed(error)
            }
            Err(HandshakeError::SetupFailure(stack)) => {
                self.logger
                    .error(&format!("DTLS handshake setup failed: {}", stack));
                self.phase = Phase::Failed;
                DtlsOutcome::Failed(stack.into())
            }
        }
    }

    fn drain(&mut self, pipe: &mut Pipe) {
        self.pending_packets.append(&mut pipe.outgoing);
    }

    fn derive_keys(&self, stream: &SslStream<Pipe>) -> Result<KeyInfoPair> {
        let profile = stream.ssl().selected_srtp_profile().ok_or_else(|| {
            NetworkError::SecurityError("peer did not negotiate an SRTP profile".to_string())
        })?;
        let suite = CryptoSuite::find(profile.name())?;

        let mut material = vec![0u8; suite.key_material_len()];
        stream
            .ssl()
            .export_keying_material(&mut material, SRTP_EXPORTER_LABEL, None)?;
        let keys = split_key_material(suite, &material, self.config.role);
        material.zeroize();
        keys
    }

    /// Feeds one datagram received on the subchannel.
    pub fn handle_datagram(&mut self, data: &[u8], now: Instant) -> DtlsOutcome {
        if !is_dtls_record(data) {
            return match self.phase {
                Phase::Handshaking { .. } => DtlsOutcome::Discard,
                _ => DtlsOutcome::Forward,
            };
        }

        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => {
                if self.config.role.is_server() && self.remote_fingerprint.is_some() {
                    return match self.start(now) {
                        Ok(DtlsOutcome::Consumed) => self.handle_datagram(data, now),
                        Ok(outcome) => outcome,
                        Err(e) => DtlsOutcome::Failed(e),
                    };
                }
                self.logger
                    .trace(&format!("DTLS record ({} bytes) before handshake start", data.len()));
                DtlsOutcome::Consumed
            }
            Phase::Handshaking {
                mut stream,
                started,
                mismatch,
            } => {
                self.logger
                    .trace(&format!("Read DTLS packet: {} bytes, queueing to SSL", data.len()));
                stream.get_mut().incoming.push_back(data.to_vec());
                let result = stream.handshake();
                self.on_handshake(result, started, mismatch)
            }
            Phase::Established { stream, answered } => {
                self.handle_established(stream, answered, data, now)
            }
            phase => {
                self.phase = phase;
                self.logger
                    .trace(&format!("Ignoring DTLS record in state {:?}", self.state()));
                DtlsOutcome::Consumed
            }
        }
    }

    fn handle_established(
        &mut self,
        mut stream: SslStream<Pipe>,
        answered: Option<u16>,
        data: &[u8],
        now: Instant,
    ) -> DtlsOutcome {
        if is_plaintext_close_notify(data) {
            self.logger.info("DTLS close_notify received");
            self.shutdown(stream);
            return DtlsOutcome::Closed;
        }

        let handshake = HandshakeHeader::parse(data);
        if self.config.role.is_server() && handshake.is_some_and(|h| h.msg_type == CLIENT_HELLO) {
            // RFC 6347 Section 4.2.8: the client lost its state, start over
            self.logger.info("Peer started a new DTLS handshake");
            self.reset();
            return self.handle_datagram(data, now);
        }

        let content_type = RecordHeader::parse(data).map(|h| h.content_type);
        match content_type {
            Some(ContentType::Handshake) | Some(ContentType::ChangeCipherSpec) => {
                // Peer lost our final flight and is retransmitting its own.
                // Records of one flight carry rising message_seq values, so a
                // value at or below the last answered one opens a new round.
                let answered = match handshake {
                    Some(h) if answered.is_none_or(|last| h.message_seq <= last) => {
                        let flight = stream.get_ref().last_flight.clone();
                        self.logger.debug(&format!(
                            "DTLS retransmission from peer, resending last flight ({} datagrams)",
                            flight.len()
                        ));
                        self.pending_packets.extend(flight);
                        Some(h.message_seq)
                    }
                    Some(h) => Some(h.message_seq),
                    None => answered,
                };
                self.phase = Phase::Established { stream, answered };
                DtlsOutcome::Consumed
            }
            _ => {
                stream.get_mut().incoming.push_back(data.to_vec());
                let mut buf = [0u8; 2048];
                let closed = match stream.ssl_read(&mut buf) {
                    Ok(0) => true,
                    Ok(len) => {
                        self.logger
                            .trace(&format!("Ignoring {} bytes of DTLS application data", len));
                        false
                    }
                    Err(e) if e.code() == ErrorCode::ZERO_RETURN => true,
                    Err(e) => {
                        self.logger.trace(&format!("DTLS record dropped: {}", e));
                        false
                    }
                };
                self.drain(stream.get_mut());
                if closed {
                    self.logger.info("DTLS close_notify received");
                    self.shutdown(stream);
                    DtlsOutcome::Closed
                } else {
                    self.phase = Phase::Established { stream, answered };
                    DtlsOutcome::Consumed
                }
            }
        }
    }

    fn shutdown(&mut self, mut stream: SslStream<Pipe>) {
        if let Err(e) = stream.shutdown() {
            self.logger.debug(&format!("DTLS shutdown: {}", e));
        }
        self.drain(stream.get_mut());
        self.phase = Phase::Closed;
    }

    /// Drives retransmission and enforces the handshake timeout.
    ///
    /// Returns `Some` when the state changed.
    pub fn poll(&mut self, now: Instant) -> Option<DtlsOutcome> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Handshaking {
                stream,
                started,
                mismatch,
            } => {
                if now.saturating_duration_since(started) >= self.config.handshake_timeout {
                    self.logger.error(&format!(
                        "DTLS handshake timeout after {:?}",
                        self.config.handshake_timeout
                    ));
                    self.phase = Phase::Failed;
                    return Some(DtlsOutcome::Failed(NetworkError::HandshakeTimeout));
                }
                // Re-entering the handshake lets OpenSSL retransmit on its own timer
                let result = stream.handshake();
                match self.on_handshake(result, started, mismatch) {
                    DtlsOutcome::Consumed => None,
                    outcome => Some(outcome),
                }
            }
            phase => {
                self.phase = phase;
                None
            }
        }
    }

    /// Sends close_notify if an association is up, then wipes keys.
    pub fn close(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::Closed) {
            Phase::Established { stream, .. } => self.shutdown(stream),
            Phase::Idle => self.phase = Phase::Idle,
            _ => {}
        }
        self.keys = None;
    }
}

impl std::fmt::Debug for DtlsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DtlsEngine")
            .field("role", &self.config.role)
            .field("state", &self.state())
            .field("suite", &self.suite)
            .finish_non_exhaustive()
    }
}

/// Splits exported material (RFC 5764 Section 4.2):
/// client key | server key | client salt | server salt.
///
/// The client sends with the client half, the server with the server half.
pub fn split_key_material(
    suite: CryptoSuite,
    material: &[u8],
    role: DtlsRole,
) -> Result<KeyInfoPair> {
    let key_len = suite.cipher_key_bytes();
    let salt_len = suite.auth_salt_bytes();
    if material.len() != suite.key_material_len() {
        return Err(NetworkError::CryptoError(format!(
            "Invalid keying material length: {} (expected {} for key={}, salt={})",
            material.len(),
            suite.key_material_len(),
            key_len,
            salt_len
        )));
    }

    let client_key = &material[..key_len];
    let server_key = &material[key_len..2 * key_len];
    let client_salt = &material[2 * key_len..2 * key_len + salt_len];
    let server_salt = &material[2 * key_len + salt_len..];

    let (local_key, local_salt, remote_key, remote_salt) = if role.is_server() {
        (server_key, server_salt, client_key, client_salt)
    } else {
        (client_key, client_salt, server_key, server_salt)
    };

    Ok(KeyInfoPair {
        sender: KeyInfo::from_parts(suite, local_key, local_salt)?,
        receiver: KeyInfo::from_parts(suite, remote_key, remote_salt)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::crypto_suite;
    use crate::security::dtls::certificate::HashAlgorithm;

    struct Peer {
        engine: DtlsEngine,
        identity: Arc<DtlsIdentity>,
    }

    fn peer(role: DtlsRole, timeout: Duration) -> Peer {
        crypto_suite::init();
        let identity = Arc::new(DtlsIdentity::generate().unwrap());
        let config = DtlsConfig {
            role,
            handshake_timeout: timeout,
            ..DtlsConfig::default()
        };
        Peer {
            engine: DtlsEngine::new(identity.clone(), config, Logger::discard()),
            identity,
        }
    }

    fn introduce(a: &mut Peer, b: &mut Peer) {
        let fa = a.identity.fingerprint(HashAlgorithm::Sha256).unwrap();
        let fb = b.identity.fingerprint(HashAlgorithm::Sha256).unwrap();
        a.engine.set_remote_fingerprint(fb);
        b.engine.set_remote_fingerprint(fa);
    }

    /// Shuttles datagrams until both sides settle or `rounds` pass.
    fn pump(client: &mut DtlsEngine, server: &mut DtlsEngine, rounds: usize) -> Vec<DtlsOutcome> {
        let mut outcomes = Vec::new();
        for _ in 0..rounds {
            let to_server = client.take_pending_packets();
            let to_client = server.take_pending_packets();
            if to_server.is_empty() && to_client.is_empty() {
                break;
            }
            for packet in to_server {
                outcomes.push(server.handle_datagram(&packet, Instant::now()));
            }
            for packet in to_client {
                outcomes.push(client.handle_datagram(&packet, Instant::now()));
            }
        }
        outcomes
    }

    #[test]
    fn test_split_key_material_slices_in_order() {
        let material: Vec<u8> = (0u8..60).collect();
        let suite = CryptoSuite::AesCm128HmacSha1_80;

        let client = split_key_material(suite, &material, DtlsRole::Active).unwrap();
        assert_eq!(client.sender.cipher_key(), &material[0..16]);
        assert_eq!(client.receiver.cipher_key(), &material[16..32]);
        assert_eq!(client.sender.auth_salt(), &material[32..46]);
        assert_eq!(client.receiver.auth_salt(), &material[46..60]);

        let server = split_key_material(suite, &material, DtlsRole::Passive).unwrap();
        assert_eq!(server.sender, client.receiver);
        assert_eq!(server.receiver, client.sender);

        assert!(split_key_material(suite, &material[..59], DtlsRole::Active).is_err());
    }

    #[test]
    fn test_handshake_derives_matching_keys() {
        let mut client = peer(DtlsRole::Active, DEFAULT_HANDSHAKE_TIMEOUT);
        let mut server = peer(DtlsRole::Passive, DEFAULT_HANDSHAKE_TIMEOUT);
        introduce(&mut client, &mut server);

        assert!(matches!(client.engine.start(Instant::now()).unwrap(), DtlsOutcome::Consumed));
        assert_eq!(client.engine.state(), DtlsState::Handshaking);
        pump(&mut client.engine, &mut server.engine, 10);

        assert_eq!(client.engine.state(), DtlsState::Established);
        assert_eq!(server.engine.state(), DtlsState::Established);
        assert_eq!(client.engine.suite(), Some(CryptoSuite::AesCm128HmacSha1_80));

        let client_keys = client.engine.take_keys().unwrap();
        let server_keys = server.engine.take_keys().unwrap();
        assert!(client_keys.sender.is_valid());
        assert_eq!(client_keys.sender, server_keys.receiver);
        assert_eq!(client_keys.receiver, server_keys.sender);
        assert!(client.engine.take_keys().is_none());
    }

    #[test]
    fn test_fingerprint_mismatch_fails() {
        let mut client = peer(DtlsRole::Active, DEFAULT_HANDSHAKE_TIMEOUT);
        let mut server = peer(DtlsRole::Passive, DEFAULT_HANDSHAKE_TIMEOUT);
        let stranger = DtlsIdentity::generate().unwrap();
        client
            .engine
            .set_remote_fingerprint(stranger.fingerprint(HashAlgorithm::Sha256).unwrap());
        server
            .engine
            .set_remote_fingerprint(client.identity.fingerprint(HashAlgorithm::Sha256).unwrap());

        client.engine.start(Instant::now()).unwrap();
        let outcomes = pump(&mut client.engine, &mut server.engine, 10);

        assert_eq!(client.engine.state(), DtlsState::Failed);
        assert!(outcomes
            .iter()
            .any(|o| matches!(o, DtlsOutcome::Failed(NetworkError::FingerprintMismatch))));
        assert!(!client.engine.has_keys());
    }

    #[test]
    fn test_handshake_timeout() {
        let mut client = peer(DtlsRole::Active, Duration::from_millis(50));
        let server = peer(DtlsRole::Passive, DEFAULT_HANDSHAKE_TIMEOUT);
        client
            .engine
            .set_remote_fingerprint(server.identity.fingerprint(HashAlgorithm::Sha256).unwrap());

        let started = Instant::now();
        client.engine.start(started).unwrap();
        assert!(client.engine.poll(started).is_none());
        let outcome = client.engine.poll(started + Duration::from_millis(60));
        assert!(matches!(outcome, Some(DtlsOutcome::Failed(NetworkError::HandshakeTimeout))));
        assert_eq!(client.engine.state(), DtlsState::Failed);

        client.engine.reset();
        assert_eq!(client.engine.state(), DtlsState::Idle);
    }

    #[test]
    fn test_media_classification() {
        let mut client = peer(DtlsRole::Active, DEFAULT_HANDSHAKE_TIMEOUT);
        let mut server = peer(DtlsRole::Passive, DEFAULT_HANDSHAKE_TIMEOUT);
        introduce(&mut client, &mut server);
        let rtp = [0x80u8, 0x00, 0x00, 0x01];

        assert!(matches!(client.engine.handle_datagram(&rtp, Instant::now()), DtlsOutcome::Forward));
        client.engine.start(Instant::now()).unwrap();
        assert!(matches!(client.engine.handle_datagram(&rtp, Instant::now()), DtlsOutcome::Discard));
        pump(&mut client.engine, &mut server.engine, 10);
        assert!(matches!(client.engine.handle_datagram(&rtp, Instant::now()), DtlsOutcome::Forward));
    }

    #[test]
    fn test_close_notify_ends_association() {
        let mut client = peer(DtlsRole::Active, DEFAULT_HANDSHAKE_TIMEOUT);
        let mut server = peer(DtlsRole::Passive, DEFAULT_HANDSHAKE_TIMEOUT);
        introduce(&mut client, &mut server);
        client.engine.start(Instant::now()).unwrap();
        pump(&mut client.engine, &mut server.engine, 10);

        client.engine.close();
        assert_eq!(client.engine.state(), DtlsState::Closed);
        let alerts = client.engine.take_pending_packets();
        assert!(!alerts.is_empty());
        let outcome = server.engine.handle_datagram(&alerts[0], Instant::now());
        assert!(matches!(outcome, DtlsOutcome::Closed));
        assert_eq!(server.engine.state(), DtlsState::Closed);
        // The server answers with its own close_notify
        assert!(!server.engine.take_pending_packets().is_empty());
    }

    fn handshake_record(msg_type: u8, message_seq: u16) -> Vec<u8> {
        let mut record = vec![22u8, 0xFE, 0xFD, 0, 0, 0, 0, 0, 0, 0, 40, 0, 12];
        record.extend_from_slice(&[msg_type, 0, 0, 0]);
        record.extend_from_slice(&message_seq.to_be_bytes());
        record.extend_from_slice(&[0; 6]);
        record
    }

    #[test]
    fn test_retransmitted_flight_is_answered_once() {
        let mut client = peer(DtlsRole::Active, DEFAULT_HANDSHAKE_TIMEOUT);
        let mut server = peer(DtlsRole::Passive, DEFAULT_HANDSHAKE_TIMEOUT);
        introduce(&mut client, &mut server);
        client.engine.start(Instant::now()).unwrap();
        pump(&mut client.engine, &mut server.engine, 10);

        // Certificate then ClientKeyExchange of one retransmitted flight
        let first = server.engine.handle_datagram(&handshake_record(11, 2), Instant::now());
        assert!(matches!(first, DtlsOutcome::Consumed));
        let resent = server.engine.take_pending_packets();
        assert!(!resent.is_empty());
        server.engine.handle_datagram(&handshake_record(16, 3), Instant::now());
        assert!(server.engine.take_pending_packets().is_empty());

        // The next retransmission round is answered again
        server.engine.handle_datagram(&handshake_record(11, 2), Instant::now());
        assert_eq!(server.engine.take_pending_packets(), resent);
        assert_eq!(server.engine.state(), DtlsState::Established);
    }

    #[test]
    fn test_server_accepts_new_client_hello_after_establishment() {
        let mut client = peer(DtlsRole::Active, DEFAULT_HANDSHAKE_TIMEOUT);
        let mut server = peer(DtlsRole::Passive, DEFAULT_HANDSHAKE_TIMEOUT);
        introduce(&mut client, &mut server);
        client.engine.start(Instant::now()).unwrap();
        pump(&mut client.engine, &mut server.engine, 10);
        let old = server.engine.take_keys().unwrap();
        client.engine.take_keys();

        client.engine.reset();
        client.engine.start(Instant::now()).unwrap();
        pump(&mut client.engine, &mut server.engine, 10);

        assert_eq!(client.engine.state(), DtlsState::Established);
        assert_eq!(server.engine.state(), DtlsState::Established);
        let client_keys = client.engine.take_keys().unwrap();
        let server_keys = server.engine.take_keys().unwrap();
        assert_eq!(client_keys.receiver, server_keys.sender);
        assert_ne!(server_keys.sender, old.sender);
    }
}
