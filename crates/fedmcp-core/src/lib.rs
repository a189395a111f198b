// FedMCP Core - Artifact model, signing and verification for federated workspaces

pub mod artifact;
pub mod did;
pub mod hash;
pub mod jcs;
pub mod keys;
pub mod sign;
pub mod token;
pub mod verify;

pub use artifact::{
    parse_artifact, validate, validate_identifier, Artifact, ArtifactDraft, ArtifactType,
    ValidationError,
};
pub use did::{did_to_verification_key, pubkey_to_did};
pub use hash::{sha256_digest, sha256_hex};
pub use jcs::jcs_canonical_bytes;
pub use keys::{
    generate_keypair, signing_key_from_pem, signing_key_to_pem, verifying_key_from_der,
    verifying_key_from_pem, verifying_key_to_pem, Algorithm, Jwks, KeyError,
    PublicKeyDescriptor, VerificationKey,
};
pub use sign::{ArtifactSigner, KeyCustodian, LocalSigner, RemoteSigner, SigningError};
pub use token::{inspect, MalformedToken, TokenHeader};
pub use verify::{Keyring, VerificationError, Verifier};
