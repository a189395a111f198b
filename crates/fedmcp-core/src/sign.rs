// Artifact signing for FedMCP
//
// Two key-custody strategies share one contract: a local signer holding the
// P-256 private key in memory, and a remote signer that only ever sends
// digests to an external key-management service.

use std::sync::Arc;

use async_trait::async_trait;
use p256::ecdsa::signature::{Signer as _, Verifier as _};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};

use crate::artifact::Artifact;
use crate::hash::sha256_digest;
use crate::jcs::jcs_canonical_bytes;
use crate::keys::{
    generate_keypair, signing_key_from_pem, verifying_key_from_der, Algorithm, KeyError,
    PublicKeyDescriptor, VerificationKey,
};
use crate::token::{assemble, signing_input, TokenHeader};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    #[error("signing key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("key service unavailable: {0}")]
    Unavailable(String),

    #[error("key service rejected the request: {0}")]
    Rejected(String),

    #[error("key service returned an unusable signature: {0}")]
    BadSignature(String),

    #[error("failed to canonicalize artifact: {0}")]
    Canonicalization(String),
}

/// Produces compact signed tokens over artifacts.
///
/// ECDSA signatures are not guaranteed to be byte-identical across calls, so
/// callers must not compare tokens for equality.
#[async_trait]
pub trait ArtifactSigner: Send + Sync {
    async fn sign(&self, artifact: &Artifact) -> Result<String, SigningError>;

    fn key_id(&self) -> &str;

    fn verification_key(&self) -> VerificationKey;

    fn public_key_descriptor(&self) -> PublicKeyDescriptor {
        self.verification_key().to_descriptor(self.key_id())
    }
}

/// Canonicalizes the artifact and builds the ES256 signing input.
fn es256_signing_input(artifact: &Artifact, kid: &str) -> Result<String, SigningError> {
    let payload =
        jcs_canonical_bytes(artifact).map_err(|e| SigningError::Canonicalization(e.to_string()))?;
    signing_input(&TokenHeader::new(Algorithm::Es256.as_str(), kid), &payload)
        .map_err(|e| SigningError::Canonicalization(e.to_string()))
}

/// Signs with a P-256 key held in process memory.
pub struct LocalSigner {
    kid: String,
    signing_key: SigningKey,
}

impl LocalSigner {
    pub fn new(kid: impl Into<String>, signing_key: SigningKey) -> Self {
        Self {
            kid: kid.into(),
            signing_key,
        }
    }

    /// Creates a signer with a freshly generated key.
    pub fn generate(kid: impl Into<String>) -> Self {
        let (signing_key, _) = generate_keypair();
        Self::new(kid, signing_key)
    }

    pub fn from_pem(kid: impl Into<String>, pem: &str) -> Result<Self, KeyError> {
        Ok(Self::new(kid, signing_key_from_pem(pem)?))
    }

    /// Synchronous signing, for callers without an async runtime.
    pub fn sign_artifact(&self, artifact: &Artifact) -> Result<String, SigningError> {
        let input = es256_signing_input(artifact, &self.kid)?;
        let signature: Signature = self.signing_key.sign(input.as_bytes());
        Ok(assemble(&input, &signature.to_bytes()))
    }
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("kid", &self.kid)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl ArtifactSigner for LocalSigner {
    async fn sign(&self, artifact: &Artifact) -> Result<String, SigningError> {
        self.sign_artifact(artifact)
    }

    fn key_id(&self) -> &str {
        &self.kid
    }

    fn verification_key(&self) -> VerificationKey {
        VerificationKey::Es256(*self.signing_key.verifying_key())
    }
}

/// An external key-management service holding a P-256 key.
///
/// Implementations must not retry; transient failures are reported as
/// [`SigningError::Unavailable`] and retry policy belongs to the caller.
#[async_trait]
pub trait KeyCustodian: Send + Sync {
    /// Signs a SHA-256 digest. Returns an ASN.1 DER ECDSA signature (raw
    /// 64-byte `r || s` is also accepted).
    async fn sign_digest(&self, key_ref: &str, digest: &[u8; 32]) -> Result<Vec<u8>, SigningError>;

    /// Returns the DER SubjectPublicKeyInfo of the referenced key.
    async fn public_key(&self, key_ref: &str) -> Result<Vec<u8>, SigningError>;
}

/// Delegates signing to a [`KeyCustodian`]; no private material in process.
pub struct RemoteSigner {
    kid: String,
    key_ref: String,
    custodian: Arc<dyn KeyCustodian>,
    verifying_key: VerifyingKey,
}

impl RemoteSigner {
    /// Fetches the public half of `key_ref` once and binds it to `kid`
    /// (which defaults to the key reference).
    pub async fn connect(
        custodian: Arc<dyn KeyCustodian>,
        key_ref: impl Into<String>,
        kid: Option<String>,
    ) -> Result<Self, SigningError> {
        let key_ref = key_ref.into();
        let der = custodian.public_key(&key_ref).await?;
        let verifying_key = verifying_key_from_der(&der)
            .map_err(|e| SigningError::KeyUnavailable(e.to_string()))?;

        Ok(Self {
            kid: kid.unwrap_or_else(|| key_ref.clone()),
            key_ref,
            custodian,
            verifying_key,
        })
    }

    pub fn key_ref(&self) -> &str {
        &self.key_ref
    }
}

#[async_trait]
impl ArtifactSigner for RemoteSigner {
    async fn sign(&self, artifact: &Artifact) -> Result<String, SigningError> {
        let input = es256_signing_input(artifact, &self.kid)?;
        let digest = sha256_digest(input.as_bytes());

        let raw = self.custodian.sign_digest(&self.key_ref, &digest).await?;
        let signature = Signature::from_der(&raw)
            .or_else(|_| Signature::from_slice(&raw))
            .map_err(|_| SigningError::BadSignature("neither DER nor r||s".into()))?;
        let signature = signature.normalize_s().unwrap_or(signature);

        // A custodian answering with a different key must not yield a token.
        self.verifying_key
            .verify(input.as_bytes(), &signature)
            .map_err(|_| SigningError::BadSignature("does not match the published key".into()))?;

        Ok(assemble(&input, &signature.to_bytes()))
    }

    fn key_id(&self) -> &str {
        &self.kid
    }

    fn verification_key(&self) -> VerificationKey {
        VerificationKey::Es256(self.verifying_key)
    }
}
