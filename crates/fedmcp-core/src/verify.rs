// Token verification for FedMCP
//
// Verification is all-or-nothing: structure, key lookup, algorithm, signature,
// payload shape and workspace binding must all pass before an artifact is
// returned.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use ed25519_dalek::Verifier as _;

use crate::artifact::{self, Artifact};
use crate::keys::{Algorithm, Jwks, KeyError, VerificationKey};
use crate::token::decode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("unknown key id '{0}'")]
    UnknownKey(String),

    #[error("algorithm '{declared}' does not match key '{kid}' registered for {registered}")]
    AlgorithmMismatch {
        kid: String,
        declared: String,
        registered: Algorithm,
    },

    #[error("invalid signature")]
    InvalidSignature,

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("artifact belongs to workspace '{actual}', expected '{expected}'")]
    WorkspaceMismatch { expected: String, actual: String },
}

impl VerificationError {
    /// Coarse category safe to hand to untrusted callers. Key lookup,
    /// algorithm and signature failures are indistinguishable from outside.
    pub fn category(&self) -> &'static str {
        match self {
            VerificationError::MalformedToken(_) | VerificationError::MalformedPayload(_) => {
                "malformed_token"
            }
            VerificationError::UnknownKey(_)
            | VerificationError::AlgorithmMismatch { .. }
            | VerificationError::InvalidSignature => "invalid_signature",
            VerificationError::WorkspaceMismatch { .. } => "workspace_mismatch",
        }
    }
}

/// Mapping from key id to public key. Holds no private material.
#[derive(Debug, Clone, Default)]
pub struct Keyring {
    keys: HashMap<String, VerificationKey>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a key, returning the one it replaced.
    pub fn insert(&mut self, kid: impl Into<String>, key: VerificationKey) -> Option<VerificationKey> {
        self.keys.insert(kid.into(), key)
    }

    pub fn get(&self, kid: &str) -> Option<&VerificationKey> {
        self.keys.get(kid)
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Imports every key of a JWKS document. Fails on the first bad key.
    pub fn extend_from_jwks(&mut self, jwks: &Jwks) -> Result<usize, KeyError> {
        let mut parsed = Vec::with_capacity(jwks.keys.len());
        for descriptor in &jwks.keys {
            parsed.push((descriptor.kid.clone(), VerificationKey::from_descriptor(descriptor)?));
        }
        let count = parsed.len();
        self.keys.extend(parsed);
        Ok(count)
    }

    /// Publishes the keyring, sorted by key id.
    pub fn to_jwks(&self) -> Jwks {
        let mut keys: Vec<_> = self
            .keys
            .iter()
            .map(|(kid, key)| key.to_descriptor(kid))
            .collect();
        keys.sort_by(|a, b| a.kid.cmp(&b.kid));
        Jwks { keys }
    }
}

/// Verifies tokens against a shared keyring.
///
/// The keyring is read by every verification and only written at startup or
/// on configuration reload.
#[derive(Debug, Default)]
pub struct Verifier {
    keyring: RwLock<Keyring>,
}

impl Verifier {
    pub fn new(keyring: Keyring) -> Self {
        Self {
            keyring: RwLock::new(keyring),
        }
    }

    pub fn register_key(&self, kid: impl Into<String>, key: VerificationKey) {
        let kid = kid.into();
        tracing::info!(kid = %kid, alg = %key.algorithm(), "registered verification key");
        self.keyring
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kid, key);
    }

    /// Swaps the whole keyring, e.g. after a configuration reload.
    pub fn replace_keyring(&self, keyring: Keyring) {
        *self.keyring.write().unwrap_or_else(PoisonError::into_inner) = keyring;
    }

    pub fn jwks(&self) -> Jwks {
        self.keyring
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .to_jwks()
    }

    fn lookup(&self, kid: &str) -> Option<VerificationKey> {
        self.keyring
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kid)
            .cloned()
    }

    /// Verifies a compact token and returns the artifact it carries.
    ///
    /// When `expected_workspace` is given the artifact's `workspaceId` must
    /// equal it exactly, regardless of the signature being valid.
    pub fn verify(
        &self,
        token: &str,
        expected_workspace: Option<&str>,
    ) -> Result<Artifact, VerificationError> {
        // Step 1: Structure
        let decoded = decode(token).map_err(|e| VerificationError::MalformedToken(e.0))?;
        let kid = decoded.header.kid.as_str();

        // Step 2: Key lookup
        let key = self
            .lookup(kid)
            .ok_or_else(|| VerificationError::UnknownKey(kid.to_string()))?;

        // Step 3: Algorithm and signature
        if decoded.header.alg != key.algorithm().as_str() {
            return Err(VerificationError::AlgorithmMismatch {
                kid: kid.to_string(),
                declared: decoded.header.alg.clone(),
                registered: key.algorithm(),
            });
        }
        check_signature(&key, decoded.signing_input.as_bytes(), &decoded.signature)?;

        // Step 4: Payload
        let artifact: Artifact = serde_json::from_slice(&decoded.payload)
            .map_err(|e| VerificationError::MalformedPayload(e.to_string()))?;
        artifact::validate(&artifact)
            .map_err(|e| VerificationError::MalformedPayload(e.to_string()))?;

        // Step 5: Workspace binding
        if let Some(expected) = expected_workspace {
            if artifact.workspace_id != expected {
                return Err(VerificationError::WorkspaceMismatch {
                    expected: expected.to_string(),
                    actual: artifact.workspace_id,
                });
            }
        }

        Ok(artifact)
    }
}

fn check_signature(
    key: &VerificationKey,
    message: &[u8],
    signature: &[u8],
) -> Result<(), VerificationError> {
    match key {
        VerificationKey::Es256(key) => {
            let signature = p256::ecdsa::Signature::from_slice(signature)
                .map_err(|_| VerificationError::InvalidSignature)?;
            key.verify(message, &signature)
                .map_err(|_| VerificationError::InvalidSignature)
        }
        VerificationKey::Ed25519(key) => {
            let bytes: [u8; 64] = signature
                .try_into()
                .map_err(|_| VerificationError::InvalidSignature)?;
            key.verify(message, &ed25519_dalek::Signature::from_bytes(&bytes))
                .map_err(|_| VerificationError::InvalidSignature)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jcs::jcs_canonical_bytes;
    use crate::sign::tests::sample_artifact;
    use crate::sign::LocalSigner;
    use crate::token::{assemble, signing_input, TokenHeader};
    use ed25519_dalek::Signer;

    fn verifier_for(signer: &LocalSigner) -> Verifier {
        let verifier = Verifier::default();
        verifier.register_key("kid-1", crate::ArtifactSigner::verification_key(signer));
        verifier
    }

    #[test]
    fn test_verify_valid_token() {
        let signer = LocalSigner::generate("kid-1");
        let verifier = verifier_for(&signer);
        let token = signer.sign_artifact(&sample_artifact()).unwrap();

        let artifact = verifier.verify(&token, Some("ws-1")).unwrap();
        assert_eq!(artifact, sample_artifact());

        // No expected workspace: binding is not checked.
        assert!(verifier.verify(&token, None).is_ok());
    }

    #[test]
    fn test_verify_rejects_other_workspace() {
        let signer = LocalSigner::generate("kid-1");
        let verifier = verifier_for(&signer);
        let token = signer.sign_artifact(&sample_artifact()).unwrap();

        let err = verifier.verify(&token, Some("ws-2")).unwrap_err();
        assert_eq!(
            err,
            VerificationError::WorkspaceMismatch {
                expected: "ws-2".to_string(),
                actual: "ws-1".to_string(),
            }
        );
        assert_eq!(err.category(), "workspace_mismatch");
    }

    #[test]
    fn test_verify_rejects_unknown_kid() {
        let signer = LocalSigner::generate("kid-unregistered");
        let verifier = verifier_for(&LocalSigner::generate("kid-1"));
        let token = signer.sign_artifact(&sample_artifact()).unwrap();

        let err = verifier.verify(&token, None).unwrap_err();
        assert_eq!(err, VerificationError::UnknownKey("kid-unregistered".into()));
        assert_eq!(err.category(), "invalid_signature");
    }

    #[test]
    fn test_verify_rejects_wrong_key_under_same_kid() {
        let signer = LocalSigner::generate("kid-1");
        let verifier = verifier_for(&LocalSigner::generate("kid-1"));
        let token = signer.sign_artifact(&sample_artifact()).unwrap();

        assert_eq!(
            verifier.verify(&token, None).unwrap_err(),
            VerificationError::InvalidSignature
        );
    }

    #[test]
    fn test_verify_rejects_algorithm_confusion() {
        let signer = LocalSigner::generate("kid-1");
        let verifier = verifier_for(&signer);

        let payload = jcs_canonical_bytes(&sample_artifact()).unwrap();
        for alg in ["none", "HS256", "EdDSA"] {
            let input = signing_input(&TokenHeader::new(alg, "kid-1"), &payload).unwrap();
            let token = assemble(&input, &[0u8; 64]);
            assert!(matches!(
                verifier.verify(&token, None),
                Err(VerificationError::AlgorithmMismatch { .. })
            ));
        }
    }

    #[test]
    fn test_verify_accepts_federated_ed25519_key() {
        let peer = ed25519_dalek::SigningKey::from_bytes(&[0x42; 32]);
        let verifier = Verifier::default();
        verifier.register_key("peer-ws", VerificationKey::Ed25519(peer.verifying_key()));

        let payload = jcs_canonical_bytes(&sample_artifact()).unwrap();
        let input = signing_input(&TokenHeader::new("EdDSA", "peer-ws"), &payload).unwrap();
        let token = assemble(&input, &peer.sign(input.as_bytes()).to_bytes());

        assert_eq!(verifier.verify(&token, Some("ws-1")).unwrap(), sample_artifact());
    }

    #[test]
    fn test_verify_rejects_signed_garbage_payload() {
        let peer = ed25519_dalek::SigningKey::from_bytes(&[0x07; 32]);
        let verifier = Verifier::default();
        verifier.register_key("peer", VerificationKey::Ed25519(peer.verifying_key()));

        let payloads: [&[u8]; 3] = [
            b"not json",
            br#"{"id":"a1"}"#,
            br#"{"id":"../x","type":"policy","version":1,"workspaceId":"w","createdAt":"2026-01-31T12:00:00Z","jsonBody":{}}"#,
        ];
        for payload in payloads {
            let input = signing_input(&TokenHeader::new("EdDSA", "peer"), payload).unwrap();
            let token = assemble(&input, &peer.sign(input.as_bytes()).to_bytes());
            let err = verifier.verify(&token, None).unwrap_err();
            assert!(matches!(err, VerificationError::MalformedPayload(_)), "{:?}", err);
        }
    }

    #[test]
    fn test_verify_accepts_non_canonical_payload_whitespace() {
        let peer = ed25519_dalek::SigningKey::from_bytes(&[0x09; 32]);
        let verifier = Verifier::default();
        verifier.register_key("peer", VerificationKey::Ed25519(peer.verifying_key()));

        let payload = serde_json::to_vec_pretty(&sample_artifact()).unwrap();
        let input = signing_input(&TokenHeader::new("EdDSA", "peer"), &payload).unwrap();
        let token = assemble(&input, &peer.sign(input.as_bytes()).to_bytes());

        assert_eq!(verifier.verify(&token, None).unwrap(), sample_artifact());
    }

    #[test]
    fn test_keyring_jwks_roundtrip() {
        let signer = LocalSigner::generate("b-key");
        let mut keyring = Keyring::new();
        keyring.insert("b-key", crate::ArtifactSigner::verification_key(&signer));
        keyring.insert(
            "a-key",
            VerificationKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(&[1; 32]).verifying_key()),
        );

        let jwks = keyring.to_jwks();
        assert_eq!(jwks.keys.len(), 2);
        assert_eq!(jwks.keys[0].kid, "a-key");

        let mut imported = Keyring::new();
        assert_eq!(imported.extend_from_jwks(&jwks).unwrap(), 2);
        assert_eq!(imported.get("b-key"), keyring.get("b-key"));
        assert!(imported.contains("a-key"));
    }

    #[test]
    fn test_replace_keyring_drops_old_keys() {
        let signer = LocalSigner::generate("kid-1");
        let verifier = verifier_for(&signer);
        let token = signer.sign_artifact(&sample_artifact()).unwrap();
        assert!(verifier.verify(&token, None).is_ok());

        verifier.replace_keyring(Keyring::new());
        assert!(matches!(
            verifier.verify(&token, None),
            Err(VerificationError::UnknownKey(_))
        ));
        assert!(verifier.jwks().keys.is_empty());
    }
}
