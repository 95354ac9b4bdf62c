//! Media transport configuration
//!
//! This module defines the options a signaling layer passes when opening a
//! transport: ICE behavior, read timeouts and DTLS parameters.

use ice::IceConfig;
use network::CryptoSuite;
use network::security::dtls::{DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_MTU, DtlsConfig, DtlsRole};
use std::time::Duration;

/// Floor applied to both read timeouts.
pub const MIN_READ_TIMEOUT: Duration = Duration::from_secs(15);

/// Socket poll granularity of the reader threads.
pub const DEFAULT_TICK: Duration = Duration::from_millis(20);

/// Interval between binding indications on the selected path.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Configuration for a media transport
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Run ICE at all
    ice_enabled: bool,
    /// Answer checks only
    ice_lite: bool,
    /// Append end-of-candidates to local descriptions
    ice_trickle: bool,
    /// Prefer cheaper networks when nominating
    network_cost: bool,
    /// Read timeout while negotiating
    ice_timeout: Duration,
    /// Read timeout once media flows (or ICE is off)
    media_timeout: Duration,
    /// Perform DTLS-SRTP on every subchannel
    secure: bool,
    handshake_timeout: Duration,
    mtu: usize,
    passive: bool,
    suites: Vec<CryptoSuite>,
    tick: Duration,
}

impl TransportConfig {
    // Getters
    pub fn ice_enabled(&self) -> bool {
        self.ice_enabled
    }

    pub fn ice_lite(&self) -> bool {
        self.ice_lite
    }

    pub fn ice_trickle(&self) -> bool {
        self.ice_trickle
    }

    pub fn network_cost(&self) -> bool {
        self.network_cost
    }

    pub fn ice_timeout(&self) -> Duration {
        self.ice_timeout
    }

    pub fn media_timeout(&self) -> Duration {
        self.media_timeout
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    pub fn passive(&self) -> bool {
        self.passive
    }

    pub fn suites(&self) -> &[CryptoSuite] {
        &self.suites
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Creates a builder for TransportConfig
    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder::default()
    }

    pub(crate) fn ice_config(&self) -> IceConfig {
        IceConfig {
            enabled: self.ice_enabled,
            lite: self.ice_lite,
            trickle: self.ice_trickle,
            network_cost: self.network_cost,
        }
    }

    pub(crate) fn dtls_config(&self) -> DtlsConfig {
        DtlsConfig {
            role: if self.passive {
                DtlsRole::Passive
            } else {
                DtlsRole::Active
            },
            handshake_timeout: self.handshake_timeout,
            mtu: self.mtu,
            suites: self.suites.clone(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_enabled: true,
            ice_lite: true,
            ice_trickle: false,
            network_cost: false,
            ice_timeout: Duration::from_secs(30),
            media_timeout: MIN_READ_TIMEOUT,
            secure: true,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            mtu: DEFAULT_MTU,
            passive: false,
            suites: CryptoSuite::dtls_capable(),
            tick: DEFAULT_TICK,
        }
    }
}

/// Builder for TransportConfig
#[derive(Debug, Clone, Default)]
pub struct TransportConfigBuilder {
    config: TransportConfig,
}

impl TransportConfigBuilder {
    pub fn ice_enabled(mut self, enabled: bool) -> Self {
        self.config.ice_enabled = enabled;
        self
    }

    pub fn ice_lite(mut self, lite: bool) -> Self {
        self.config.ice_lite = lite;
        self
    }

    pub fn ice_trickle(mut self, trickle: bool) -> Self {
        self.config.ice_trickle = trickle;
        self
    }

    pub fn network_cost(mut self, enabled: bool) -> Self {
        self.config.network_cost = enabled;
        self
    }

    pub fn ice_timeout(mut self, timeout: Duration) -> Self {
        self.config.ice_timeout = timeout;
        self
    }

    pub fn media_timeout(mut self, timeout: Duration) -> Self {
        self.config.media_timeout = timeout;
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.config.secure = secure;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    pub fn mtu(mut self, mtu: usize) -> Self {
        self.config.mtu = mtu;
        self
    }

    /// DTLS server role (setup:passive).
    pub fn passive(mut self, passive: bool) -> Self {
        self.config.passive = passive;
        self
    }

    pub fn suites(mut self, suites: Vec<CryptoSuite>) -> Self {
        self.config.suites = suites;
        self
    }

    pub fn tick(mut self, tick: Duration) -> Self {
        self.config.tick = tick;
        self
    }

    /// Finishes the config, raising read timeouts to [`MIN_READ_TIMEOUT`].
    pub fn build(mut self) -> TransportConfig {
        self.config.ice_timeout = self.config.ice_timeout.max(MIN_READ_TIMEOUT);
        self.config.media_timeout = self.config.media_timeout.max(MIN_READ_TIMEOUT);
        if self.config.tick.is_zero() {
            self.config.tick = DEFAULT_TICK;
        }
        self.config
    }
}
