//! SRTP crypto suites.
//!
//! The set of suites is closed. A lookup table from suite and DTLS profile
//! names is built once by [`init`], which process bootstrap must call
//! before any transport negotiates keys.

use super::key_info::KeyInfo;
use crate::error::{NetworkError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

static REGISTRY: OnceLock<HashMap<&'static str, CryptoSuite>> = OnceLock::new();

/// An SRTP protection suite (RFC 4568 / RFC 6188 names).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CryptoSuite {
    AesCm128HmacSha1_80,
    AesCm128HmacSha1_32,
    AesCm256HmacSha1_80,
    AesCm256HmacSha1_32,
}

impl CryptoSuite {
    /// Every suite, most preferred first.
    pub const ALL: [CryptoSuite; 4] = [
        CryptoSuite::AesCm128HmacSha1_80,
        CryptoSuite::AesCm128HmacSha1_32,
        CryptoSuite::AesCm256HmacSha1_80,
        CryptoSuite::AesCm256HmacSha1_32,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CryptoSuite::AesCm128HmacSha1_80 => "AES_CM_128_HMAC_SHA1_80",
            CryptoSuite::AesCm128HmacSha1_32 => "AES_CM_128_HMAC_SHA1_32",
            CryptoSuite::AesCm256HmacSha1_80 => "AES_CM_256_HMAC_SHA1_80",
            CryptoSuite::AesCm256HmacSha1_32 => "AES_CM_256_HMAC_SHA1_32",
        }
    }

    /// DTLS-SRTP protection profile name (RFC 5764), where OpenSSL has one.
    pub fn dtls_profile(&self) -> Option<&'static str> {
        match self {
            CryptoSuite::AesCm128HmacSha1_80 => Some("SRTP_AES128_CM_SHA1_80"),
            CryptoSuite::AesCm128HmacSha1_32 => Some("SRTP_AES128_CM_SHA1_32"),
            CryptoSuite::AesCm256HmacSha1_80 | CryptoSuite::AesCm256HmacSha1_32 => None,
        }
    }

    pub fn cipher_key_bytes(&self) -> usize {
        match self {
            CryptoSuite::AesCm128HmacSha1_80 | CryptoSuite::AesCm128HmacSha1_32 => 16,
            CryptoSuite::AesCm256HmacSha1_80 | CryptoSuite::AesCm256HmacSha1_32 => 32,
        }
    }

    pub fn auth_salt_bytes(&self) -> usize {
        14
    }

    /// Authentication tag length in bits.
    pub fn auth_tag_bits(&self) -> usize {
        match self {
            CryptoSuite::AesCm128HmacSha1_80 | CryptoSuite::AesCm256HmacSha1_80 => 80,
            CryptoSuite::AesCm128HmacSha1_32 | CryptoSuite::AesCm256HmacSha1_32 => 32,
        }
    }

    /// Bytes of keying material to export for both directions.
    pub fn key_material_len(&self) -> usize {
        2 * (self.cipher_key_bytes() + self.auth_salt_bytes())
    }

    /// Empty (all zero) key info sized for this suite.
    pub fn create_key_info(&self) -> KeyInfo {
        KeyInfo::new(*self)
    }

    /// Resolves a suite or DTLS profile name through the registry.
    ///
    /// # Errors
    /// `Config` when [`init`] has not run, `UnknownCryptoSuite` for names
    /// not registered.
    pub fn find(name: &str) -> Result<CryptoSuite> {
        let registry = REGISTRY
            .get()
            .ok_or_else(|| NetworkError::Config("crypto suites not initialized".to_string()))?;
        registry
            .get(name)
            .copied()
            .ok_or_else(|| NetworkError::UnknownCryptoSuite(name.to_string()))
    }

    /// Suites that can be negotiated through DTLS-SRTP, in preference order.
    pub fn dtls_capable() -> Vec<CryptoSuite> {
        Self::ALL
            .into_iter()
            .filter(|suite| suite.dtls_profile().is_some())
            .collect()
    }
}

impl fmt::Display for CryptoSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Builds the suite registry. Safe to call more than once.
pub fn init() {
    REGISTRY.get_or_init(|| {
        let mut table = HashMap::new();
        for suite in CryptoSuite::ALL {
            table.insert(suite.name(), suite);
            if let Some(profile) = suite.dtls_profile() {
                table.insert(profile, suite);
            }
        }
        table
    });
}

/// True once [`init`] has run.
pub fn is_initialized() -> bool {
    REGISTRY.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_suite_and_profile_name() {
        init();
        assert_eq!(
            CryptoSuite::find("AES_CM_128_HMAC_SHA1_80").unwrap(),
            CryptoSuite::AesCm128HmacSha1_80
        );
        assert_eq!(
            CryptoSuite::find("SRTP_AES128_CM_SHA1_32").unwrap(),
            CryptoSuite::AesCm128HmacSha1_32
        );
        assert!(matches!(
            CryptoSuite::find("NULL_CIPHER"),
            Err(NetworkError::UnknownCryptoSuite(_))
        ));
    }

    #[test]
    fn test_sizes() {
        let suite = CryptoSuite::AesCm128HmacSha1_80;
        assert_eq!(suite.cipher_key_bytes(), 16);
        assert_eq!(suite.auth_salt_bytes(), 14);
        assert_eq!(suite.key_material_len(), 60);
        assert_eq!(CryptoSuite::AesCm256HmacSha1_32.key_material_len(), 92);
        assert_eq!(CryptoSuite::AesCm128HmacSha1_32.auth_tag_bits(), 32);
    }

    #[test]
    fn test_dtls_capable_keeps_preference_order() {
        assert_eq!(
            CryptoSuite::dtls_capable(),
            vec![CryptoSuite::AesCm128HmacSha1_80, CryptoSuite::AesCm128HmacSha1_32]
        );
    }

    #[test]
    fn test_create_key_info_is_sized() {
        let info = CryptoSuite::AesCm256HmacSha1_80.create_key_info();
        assert_eq!(info.cipher_key().len(), 32);
        assert_eq!(info.auth_salt().len(), 14);
        assert!(!info.is_valid());
    }
}
