//! ICE short-term credentials.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;

/// Random octets behind a username fragment (16 base64 characters).
const UFRAG_OCTETS: usize = 12;
/// Random octets behind a password (24 base64 characters, 144 bits).
const PWD_OCTETS: usize = 18;

fn random_token(octets: usize) -> String {
    let mut bytes = vec![0u8; octets];
    rand::thread_rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

/// Local and remote username fragment and password.
///
/// The local pair is generated once per transport and never changes; the
/// remote pair is whatever signaling last applied.
#[derive(Clone, Default)]
pub struct Credentials {
    pub local_ufrag: String,
    pub local_pwd: String,
    pub remote_ufrag: String,
    pub remote_pwd: String,
}

impl Credentials {
    /// Fresh random local credentials, no remote side yet.
    pub fn generate() -> Self {
        Self {
            local_ufrag: random_token(UFRAG_OCTETS),
            local_pwd: random_token(PWD_OCTETS),
            remote_ufrag: String::new(),
            remote_pwd: String::new(),
        }
    }

    pub fn has_remote(&self) -> bool {
        !self.remote_ufrag.is_empty() && !self.remote_pwd.is_empty()
    }

    pub fn remote_matches(&self, ufrag: &str, pwd: &str) -> bool {
        self.remote_ufrag == ufrag && self.remote_pwd == pwd
    }

    /// USERNAME expected in checks we answer, and the key that signs them.
    pub fn server(&self) -> (String, &[u8]) {
        (
            format!("{}:{}", self.local_ufrag, self.remote_ufrag),
            self.local_pwd.as_bytes(),
        )
    }

    /// USERNAME for checks we send, and the key that signs them.
    pub fn client(&self) -> (String, &[u8]) {
        (
            format!("{}:{}", self.remote_ufrag, self.local_ufrag),
            self.remote_pwd.as_bytes(),
        )
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("local_ufrag", &self.local_ufrag)
            .field("remote_ufrag", &self.remote_ufrag)
            .finish_non_exhaustive()
    }
}
