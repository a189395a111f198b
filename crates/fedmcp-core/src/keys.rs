// Key material for FedMCP: algorithms, public key descriptors (JWK) and PEM I/O

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p256::elliptic_curve::zeroize::Zeroizing;
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};

/// JOSE signature algorithms understood by the keyring.
///
/// Signers always use `ES256`. `EdDSA` keys are accepted from federated
/// peers that publish Ed25519 keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "ES256")]
    Es256,
    #[serde(rename = "EdDSA")]
    EdDsa,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Es256 => "ES256",
            Algorithm::EdDsa => "EdDSA",
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("invalid PEM key: {0}")]
    InvalidPem(String),

    #[error("invalid public key descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("invalid DID: {0}")]
    InvalidDid(String),

    #[error("invalid DER public key: {0}")]
    InvalidDer(String),

    #[error("key encoding failed: {0}")]
    Encoding(String),
}

/// A public key registered in a keyring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationKey {
    Es256(p256::ecdsa::VerifyingKey),
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl VerificationKey {
    /// The only algorithm this key may be used with.
    pub fn algorithm(&self) -> Algorithm {
        match self {
            VerificationKey::Es256(_) => Algorithm::Es256,
            VerificationKey::Ed25519(_) => Algorithm::EdDsa,
        }
    }

    /// Publishes the key as a JWK with the given key id.
    pub fn to_descriptor(&self, kid: &str) -> PublicKeyDescriptor {
        match self {
            VerificationKey::Es256(key) => {
                let point = key.to_encoded_point(false);
                PublicKeyDescriptor {
                    kty: "EC".to_string(),
                    crv: "P-256".to_string(),
                    x: point.x().map(|x| URL_SAFE_NO_PAD.encode(x)).unwrap_or_default(),
                    y: point.y().map(|y| URL_SAFE_NO_PAD.encode(y)),
                    kid: kid.to_string(),
                    alg: Algorithm::Es256,
                    key_use: SIGNATURE_USE.to_string(),
                }
            }
            VerificationKey::Ed25519(key) => PublicKeyDescriptor {
                kty: "OKP".to_string(),
                crv: "Ed25519".to_string(),
                x: URL_SAFE_NO_PAD.encode(key.as_bytes()),
                y: None,
                kid: kid.to_string(),
                alg: Algorithm::EdDsa,
                key_use: SIGNATURE_USE.to_string(),
            },
        }
    }

    /// Imports a key from a JWK. `kty`, `crv` and `alg` must agree.
    pub fn from_descriptor(descriptor: &PublicKeyDescriptor) -> Result<Self, KeyError> {
        let invalid = |msg: &str| {
            KeyError::InvalidDescriptor(format!("kid '{}': {}", descriptor.kid, msg))
        };
        let decode = |field: &str, value: &str| {
            URL_SAFE_NO_PAD
                .decode(value)
                .map_err(|e| invalid(&format!("bad base64url in '{}': {}", field, e)))
        };

        match (
            descriptor.kty.as_str(),
            descriptor.crv.as_str(),
            descriptor.alg,
        ) {
            ("EC", "P-256", Algorithm::Es256) => {
                let x = decode("x", &descriptor.x)?;
                let y = decode(
                    "y",
                    descriptor
                        .y
                        .as_deref()
                        .ok_or_else(|| invalid("missing 'y' coordinate"))?,
                )?;
                if x.len() != 32 || y.len() != 32 {
                    return Err(invalid("P-256 coordinates must be 32 bytes"));
                }
                let mut sec1 = Vec::with_capacity(65);
                sec1.push(0x04);
                sec1.extend_from_slice(&x);
                sec1.extend_from_slice(&y);
                let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1)
                    .map_err(|_| invalid("point is not on the P-256 curve"))?;
                Ok(VerificationKey::Es256(key))
            }
            ("OKP", "Ed25519", Algorithm::EdDsa) => {
                let x: [u8; 32] = decode("x", &descriptor.x)?
                    .try_into()
                    .map_err(|_| invalid("Ed25519 key must be 32 bytes"))?;
                let key = ed25519_dalek::VerifyingKey::from_bytes(&x)
                    .map_err(|_| invalid("invalid Ed25519 point"))?;
                Ok(VerificationKey::Ed25519(key))
            }
            (kty, crv, alg) => Err(invalid(&format!(
                "unsupported key type {}/{} for {}",
                kty, crv, alg
            ))),
        }
    }
}

const SIGNATURE_USE: &str = "sig";

fn default_use() -> String {
    SIGNATURE_USE.to_string()
}

/// JWK-style public key descriptor, as published on a JWKS endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicKeyDescriptor {
    pub kty: String,
    pub crv: String,
    pub x: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    pub kid: String,
    pub alg: Algorithm,
    #[serde(rename = "use", default = "default_use")]
    pub key_use: String,
}

/// A JWKS document: `{"keys": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwks {
    pub keys: Vec<PublicKeyDescriptor>,
}

/// Generates a new P-256 keypair using secure random bytes from the OS.
pub fn generate_keypair() -> (p256::ecdsa::SigningKey, p256::ecdsa::VerifyingKey) {
    let signing_key = p256::ecdsa::SigningKey::random(&mut OsRng);
    let verifying_key = *signing_key.verifying_key();
    (signing_key, verifying_key)
}

/// Loads a P-256 private key from PEM. PKCS#8 (`PRIVATE KEY`) and SEC1
/// (`EC PRIVATE KEY`) encodings are accepted.
pub fn signing_key_from_pem(pem: &str) -> Result<p256::ecdsa::SigningKey, KeyError> {
    if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_pem(pem) {
        return Ok(key);
    }
    p256::SecretKey::from_sec1_pem(pem)
        .map(p256::ecdsa::SigningKey::from)
        .map_err(|_| KeyError::InvalidPem("expected a PKCS#8 or SEC1 P-256 private key".into()))
}

/// Encodes a private key as PKCS#8 PEM. The buffer is wiped on drop.
pub fn signing_key_to_pem(key: &p256::ecdsa::SigningKey) -> Result<Zeroizing<String>, KeyError> {
    key.to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| KeyError::Encoding(e.to_string()))
}

pub fn verifying_key_from_pem(pem: &str) -> Result<p256::ecdsa::VerifyingKey, KeyError> {
    p256::ecdsa::VerifyingKey::from_public_key_pem(pem)
        .map_err(|e| KeyError::InvalidPem(e.to_string()))
}

pub fn verifying_key_to_pem(key: &p256::ecdsa::VerifyingKey) -> Result<String, KeyError> {
    key.to_public_key_pem(LineEnding::LF)
        .map_err(|e| KeyError::Encoding(e.to_string()))
}

/// Decodes a DER SubjectPublicKeyInfo, the form key-management services
/// hand out.
pub fn verifying_key_from_der(der: &[u8]) -> Result<p256::ecdsa::VerifyingKey, KeyError> {
    p256::ecdsa::VerifyingKey::from_public_key_der(der)
        .map_err(|e| KeyError::InvalidDer(e.to_string()))
}
