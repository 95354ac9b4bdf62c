//! SRTP master key and salt for one direction.

use super::crypto_suite::CryptoSuite;
use crate::error::{NetworkError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Cipher key and authentication salt sized for a crypto suite.
///
/// Buffers are wiped when the value is dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyInfo {
    #[zeroize(skip)]
    suite: CryptoSuite,
    cipher_key: Vec<u8>,
    auth_salt: Vec<u8>,
}

impl KeyInfo {
    /// All-zero key and salt of the suite's sizes.
    pub fn new(suite: CryptoSuite) -> Self {
        Self {
            suite,
            cipher_key: vec![0u8; suite.cipher_key_bytes()],
            auth_salt: vec![0u8; suite.auth_salt_bytes()],
        }
    }

    /// Builds key info from exported material.
    ///
    /// # Errors
    /// `CryptoError` when a slice does not have the suite's length.
    pub fn from_parts(suite: CryptoSuite, cipher_key: &[u8], auth_salt: &[u8]) -> Result<Self> {
        let mut info = Self::new(suite);
        info.set_cipher_key(cipher_key)?;
        info.set_auth_salt(auth_salt)?;
        Ok(info)
    }

    pub fn suite(&self) -> CryptoSuite {
        self.suite
    }

    pub fn cipher_key(&self) -> &[u8] {
        &self.cipher_key
    }

    pub fn auth_salt(&self) -> &[u8] {
        &self.auth_salt
    }

    pub fn set_cipher_key(&mut self, key: &[u8]) -> Result<()> {
        if key.len() != self.suite.cipher_key_bytes() {
            return Err(NetworkError::CryptoError(format!(
                "cipher key is {} bytes, {} needs {}",
                key.len(),
                self.suite,
                self.suite.cipher_key_bytes()
            )));
        }
        self.cipher_key.copy_from_slice(key);
        Ok(())
    }

    pub fn set_auth_salt(&mut self, salt: &[u8]) -> Result<()> {
        if salt.len() != self.suite.auth_salt_bytes() {
            return Err(NetworkError::CryptoError(format!(
                "auth salt is {} bytes, {} needs {}",
                salt.len(),
                self.suite,
                self.suite.auth_salt_bytes()
            )));
        }
        self.auth_salt.copy_from_slice(salt);
        Ok(())
    }

    /// Key and salt have been filled in with something other than zeros.
    pub fn is_valid(&self) -> bool {
        self.cipher_key.len() == self.suite.cipher_key_bytes()
            && self.auth_salt.len() == self.suite.auth_salt_bytes()
            && self.cipher_key.iter().any(|b| *b != 0)
            && self.auth_salt.iter().any(|b| *b != 0)
    }

    /// Replaces key and salt with fresh random bytes.
    pub fn randomise(&mut self) {
        let mut rng = rand::thread_rng();
        rng.fill_bytes(&mut self.cipher_key);
        rng.fill_bytes(&mut self.auth_salt);
    }

    /// Base64 of key followed by salt, the SDES inline key format.
    pub fn to_base64(&self) -> String {
        let mut joined = Vec::with_capacity(self.cipher_key.len() + self.auth_salt.len());
        joined.extend_from_slice(&self.cipher_key);
        joined.extend_from_slice(&self.auth_salt);
        let encoded = STANDARD.encode(&joined);
        joined.zeroize();
        encoded
    }

    /// Parses the format produced by [`KeyInfo::to_base64`].
    pub fn from_base64(suite: CryptoSuite, encoded: &str) -> Result<Self> {
        let mut decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|e| NetworkError::CryptoError(format!("invalid base64 key: {}", e)))?;
        let key_len = suite.cipher_key_bytes();
        let result = if decoded.len() == key_len + suite.auth_salt_bytes() {
            Self::from_parts(suite, &decoded[..key_len], &decoded[key_len..])
        } else {
            Err(NetworkError::CryptoError(format!(
                "key material is {} bytes, {} needs {}",
                decoded.len(),
                suite,
                key_len + suite.auth_salt_bytes()
            )))
        };
        decoded.zeroize();
        result
    }
}

impl std::fmt::Debug for KeyInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyInfo")
            .field("suite", &self.suite)
            .finish_non_exhaustive()
    }
}

/// Keys for both directions of one handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfoPair {
    /// Protects what we send
    pub sender: KeyInfo,
    /// Protects what the peer sends
    pub receiver: KeyInfo,
}
