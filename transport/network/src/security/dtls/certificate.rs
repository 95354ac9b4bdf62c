//! DTLS certificate generation and management

use crate::error::{NetworkError, Result};
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::{X509, X509Builder, X509NameBuilder, X509Ref};
use std::fmt;
use std::str::FromStr;

/// Validity of the ephemeral certificate, in days.
const CERTIFICATE_DAYS: u32 = 30;

/// Hash algorithm of a certificate fingerprint (RFC 8122 names).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    Sha1,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "sha-1",
            HashAlgorithm::Sha256 => "sha-256",
            HashAlgorithm::Sha384 => "sha-384",
            HashAlgorithm::Sha512 => "sha-512",
        }
    }

    fn digest(&self) -> MessageDigest {
        match self {
            HashAlgorithm::Sha1 => MessageDigest::sha1(),
            HashAlgorithm::Sha256 => MessageDigest::sha256(),
            HashAlgorithm::Sha384 => MessageDigest::sha384(),
            HashAlgorithm::Sha512 => MessageDigest::sha512(),
        }
    }

    fn digest_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha-1" | "sha1" => Ok(HashAlgorithm::Sha1),
            "sha-256" | "sha256" => Ok(HashAlgorithm::Sha256),
            "sha-384" | "sha384" => Ok(HashAlgorithm::Sha384),
            "sha-512" | "sha512" => Ok(HashAlgorithm::Sha512),
            other => Err(NetworkError::SecurityError(format!(
                "Unsupported fingerprint hash: {}",
                other
            ))),
        }
    }
}

/// Certificate digest as exchanged in signaling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    algorithm: HashAlgorithm,
    digest: Vec<u8>,
}

impl Fingerprint {
    pub fn new(algorithm: HashAlgorithm, digest: Vec<u8>) -> Result<Self> {
        if digest.len() != algorithm.digest_len() {
            return Err(NetworkError::SecurityError(format!(
                "{} fingerprint must have {} bytes, got {}",
                algorithm.as_str(),
                algorithm.digest_len(),
                digest.len()
            )));
        }
        Ok(Self { algorithm, digest })
    }

    /// Digest of `cert` with `algorithm`.
    pub fn of_certificate(algorithm: HashAlgorithm, cert: &X509Ref) -> Result<Self> {
        let digest = cert.digest(algorithm.digest())?;
        Ok(Self {
            algorithm,
            digest: digest.to_vec(),
        })
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// Colon separated uppercase hex, without the algorithm prefix.
    pub fn hex(&self) -> String {
        self.digest
            .iter()
            .map(|byte| format!("{:02X}", byte))
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Whether `cert` hashes to this fingerprint.
    pub fn matches(&self, cert: &X509Ref) -> bool {
        match cert.digest(self.algorithm.digest()) {
            Ok(digest) => digest.as_ref() == self.digest.as_slice(),
            Err(_) => false,
        }
    }
}

/// Parses `"sha-256 AB:CD:..."`; hex digits are case-insensitive.
impl FromStr for Fingerprint {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let (Some(algorithm), Some(hex), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(NetworkError::SecurityError(format!(
                "Malformed fingerprint: {}",
                s
            )));
        };
        let algorithm = algorithm.parse::<HashAlgorithm>()?;
        let digest = hex
            .split(':')
            .map(|byte| {
                if byte.len() == 2 {
                    u8::from_str_radix(byte, 16).ok()
                } else {
                    None
                }
            })
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| NetworkError::SecurityError(format!("Malformed fingerprint: {}", s)))?;
        Fingerprint::new(algorithm, digest)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.algorithm.as_str(), self.hex())
    }
}

/// Ephemeral self-signed certificate and key of one transport.
pub struct DtlsIdentity {
    certificate: X509,
    private_key: PKey<Private>,
}

impl DtlsIdentity {
    /// Generates an ECDSA P-256 key and a self-signed certificate for it.
    pub fn generate() -> Result<Self> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
        let private_key = PKey::from_ec_key(EcKey::generate(&group)?)?;

        let mut name = X509NameBuilder::new()?;
        name.append_entry_by_nid(Nid::COMMONNAME, "media-transport")?;
        let name = name.build();

        let mut serial = BigNum::new()?;
        serial.rand(64, MsbOption::MAYBE_ZERO, false)?;

        let mut builder = X509Builder::new()?;
        builder.set_version(2)?;
        builder.set_serial_number(&*serial.to_asn1_integer()?)?;
        builder.set_subject_name(&name)?;
        builder.set_issuer_name(&name)?;
        builder.set_pubkey(&private_key)?;
        builder.set_not_before(&*Asn1Time::days_from_now(0)?)?;
        builder.set_not_after(&*Asn1Time::days_from_now(CERTIFICATE_DAYS)?)?;
        builder.sign(&private_key, MessageDigest::sha256())?;

        Ok(Self {
            certificate: builder.build(),
            private_key,
        })
    }

    pub fn certificate(&self) -> &X509Ref {
        &self.certificate
    }

    pub fn private_key(&self) -> &PKey<Private> {
        &self.private_key
    }

    /// Fingerprint to advertise for this identity.
    pub fn fingerprint(&self, algorithm: HashAlgorithm) -> Result<Fingerprint> {
        Fingerprint::of_certificate(algorithm, &self.certificate)
    }
}

impl fmt::Debug for DtlsIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DtlsIdentity").finish_non_exhaustive()
    }
}
