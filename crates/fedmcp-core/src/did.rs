// did:key import and export for federated peers
// Supports Ed25519 (multicodec 0xed01) and P-256 (multicodec 0x1200, compressed point)

use crate::keys::{KeyError, VerificationKey};

/// Multicodec prefix for Ed25519 public keys (varint of 0xed)
const ED25519_MULTICODEC_PREFIX: [u8; 2] = [0xed, 0x01];

/// Multicodec prefix for P-256 public keys (varint of 0x1200)
const P256_MULTICODEC_PREFIX: [u8; 2] = [0x80, 0x24];

const DID_KEY_PREFIX: &str = "did:key:z";

/// Converts a public key to a did:key identifier.
///
/// The DID format is `did:key:z<base58btc(multicodec || key bytes)>`; P-256
/// keys are encoded as compressed SEC1 points.
pub fn pubkey_to_did(public_key: &VerificationKey) -> String {
    let mut multicodec_bytes = Vec::with_capacity(35);
    match public_key {
        VerificationKey::Ed25519(key) => {
            multicodec_bytes.extend_from_slice(&ED25519_MULTICODEC_PREFIX);
            multicodec_bytes.extend_from_slice(key.as_bytes());
        }
        VerificationKey::Es256(key) => {
            multicodec_bytes.extend_from_slice(&P256_MULTICODEC_PREFIX);
            multicodec_bytes.extend_from_slice(key.to_encoded_point(true).as_bytes());
        }
    }

    format!("{}{}", DID_KEY_PREFIX, bs58::encode(&multicodec_bytes).into_string())
}

/// Resolves a did:key identifier to the public key it encodes.
pub fn did_to_verification_key(did: &str) -> Result<VerificationKey, KeyError> {
    let encoded = did
        .strip_prefix(DID_KEY_PREFIX)
        .ok_or_else(|| KeyError::InvalidDid(format!("'{}' is not a base58btc did:key", did)))?;

    let decoded = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| KeyError::InvalidDid(format!("bad base58: {}", e)))?;

    if decoded.len() < 2 {
        return Err(KeyError::InvalidDid("missing multicodec prefix".into()));
    }
    let (prefix, key_bytes) = decoded.split_at(2);

    if prefix == ED25519_MULTICODEC_PREFIX {
        let bytes: [u8; 32] = key_bytes
            .try_into()
            .map_err(|_| KeyError::InvalidDid("Ed25519 key must be 32 bytes".into()))?;
        let key = ed25519_dalek::VerifyingKey::from_bytes(&bytes)
            .map_err(|_| KeyError::InvalidDid("invalid Ed25519 point".into()))?;
        Ok(VerificationKey::Ed25519(key))
    } else if prefix == P256_MULTICODEC_PREFIX {
        let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(key_bytes)
            .map_err(|_| KeyError::InvalidDid("invalid P-256 point".into()))?;
        Ok(VerificationKey::Es256(key))
    } else {
        Err(KeyError::InvalidDid(format!(
            "unsupported multicodec prefix {}",
            hex::encode(prefix)
        )))
    }
}
