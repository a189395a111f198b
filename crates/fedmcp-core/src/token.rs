//! Compact token codec.
//!
//! A token is `base64url(header) . base64url(payload) . base64url(signature)`
//! without padding. The header is `{"alg", "kid", "typ"}`, the payload is the
//! canonical artifact JSON and the signature covers the first two segments
//! exactly as they appear on the wire.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::jcs::jcs_canonical_bytes;

pub const TOKEN_TYPE: &str = "JWT";

/// Protected header. `alg` stays a string so unknown algorithms survive
/// parsing and can be rejected against the keyring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    pub kid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

impl TokenHeader {
    pub fn new(alg: &str, kid: &str) -> Self {
        Self {
            alg: alg.to_string(),
            kid: kid.to_string(),
            typ: Some(TOKEN_TYPE.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed token: {0}")]
pub struct MalformedToken(pub String);

/// The three segments of a token, decoded but not yet trusted.
#[derive(Debug, Clone)]
pub struct DecodedToken<'a> {
    pub header: TokenHeader,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
    /// `header.payload` as received; the bytes the signature covers.
    pub signing_input: &'a str,
}

/// Builds the signing input for a header and raw payload bytes.
pub fn signing_input(header: &TokenHeader, payload: &[u8]) -> Result<String, serde_json::Error> {
    let header_bytes = jcs_canonical_bytes(header)?;
    Ok(format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_bytes),
        URL_SAFE_NO_PAD.encode(payload)
    ))
}

/// Appends the signature segment to a signing input.
pub fn assemble(signing_input: &str, signature: &[u8]) -> String {
    format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature))
}

/// Splits and base64-decodes a compact token. Performs no cryptography.
pub fn decode(token: &str) -> Result<DecodedToken<'_>, MalformedToken> {
    let mut segments = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(MalformedToken("expected three '.'-separated segments".into()));
    };

    if header_b64.is_empty() || signature_b64.is_empty() {
        return Err(MalformedToken("empty header or signature segment".into()));
    }

    let header_bytes = decode_segment("header", header_b64)?;
    let header: TokenHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| MalformedToken(format!("invalid header: {}", e)))?;
    let payload = decode_segment("payload", payload_b64)?;
    let signature = decode_segment("signature", signature_b64)?;

    let signing_input = &token[..header_b64.len() + 1 + payload_b64.len()];

    Ok(DecodedToken {
        header,
        payload,
        signature,
        signing_input,
    })
}

/// Decodes header and payload for display. The result is untrusted.
pub fn inspect(token: &str) -> Result<(TokenHeader, serde_json::Value), MalformedToken> {
    let decoded = decode(token)?;
    let payload = serde_json::from_slice(&decoded.payload)
        .map_err(|e| MalformedToken(format!("payload is not JSON: {}", e)))?;
    Ok((decoded.header, payload))
}

fn decode_segment(name: &str, segment: &str) -> Result<Vec<u8>, MalformedToken> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| MalformedToken(format!("{} is not base64url: {}", name, e)))
}
