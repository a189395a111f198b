//! HTTP client for a remote key-management service.
//!
//! Wire contract:
//! - `POST {endpoint}/v1/keys/{key_ref}/sign` with
//!   `{"digest": <base64 SHA-256>, "algorithm": "ECDSA_SHA_256"}` returns
//!   `{"signature": <base64 DER ECDSA signature>}`
//! - `GET {endpoint}/v1/keys/{key_ref}/public-key` returns
//!   `{"publicKey": <base64 SPKI DER>}`

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use fedmcp_core::{KeyCustodian, SigningError};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

pub const SIGNING_ALGORITHM: &str = "ECDSA_SHA_256";

#[derive(Serialize)]
struct SignRequest<'a> {
    digest: String,
    algorithm: &'a str,
}

#[derive(Deserialize)]
struct SignResponse {
    signature: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicKeyResponse {
    public_key: String,
}

/// Key custodian reached over HTTP. Never retries.
#[derive(Debug, Clone)]
pub struct HttpKeyCustodian {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpKeyCustodian {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, SigningError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| SigningError::KeyUnavailable(format!("invalid KMS endpoint: {}", e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(SigningError::KeyUnavailable(
                "KMS endpoint must be an http(s) URL".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SigningError::KeyUnavailable(e.to_string()))?;
        Ok(Self { client, endpoint })
    }

    fn key_url(&self, key_ref: &str, operation: &str) -> Result<Url, SigningError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| SigningError::KeyUnavailable("KMS endpoint cannot be a base URL".into()))?
            .pop_if_empty()
            .extend(["v1", "keys", key_ref, operation]);
        Ok(url)
    }
}

fn transport_error(e: reqwest::Error) -> SigningError {
    if e.is_timeout() {
        SigningError::Unavailable("KMS request timed out".into())
    } else if e.is_connect() {
        SigningError::Unavailable(format!("cannot reach KMS: {}", e))
    } else {
        SigningError::Unavailable(format!("KMS request failed: {}", e))
    }
}

fn status_error(status: StatusCode) -> SigningError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        SigningError::Unavailable(format!("KMS returned {}", status))
    } else if status == StatusCode::NOT_FOUND {
        SigningError::KeyUnavailable("KMS key not found".into())
    } else {
        SigningError::Rejected(format!("KMS returned {}", status))
    }
}

async fn read_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T, SigningError> {
    let status = response.status();
    if !status.is_success() {
        return Err(status_error(status));
    }
    response
        .json()
        .await
        .map_err(|e| SigningError::Rejected(format!("unexpected KMS response: {}", e)))
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, SigningError> {
    BASE64_STANDARD
        .decode(value)
        .map_err(|e| SigningError::Rejected(format!("KMS {} is not base64: {}", name, e)))
}

#[async_trait]
impl KeyCustodian for HttpKeyCustodian {
    async fn sign_digest(&self, key_ref: &str, digest: &[u8; 32]) -> Result<Vec<u8>, SigningError> {
        let url = self.key_url(key_ref, "sign")?;
        let response = self
            .client
            .post(url)
            .json(&SignRequest {
                digest: BASE64_STANDARD.encode(digest),
                algorithm: SIGNING_ALGORITHM,
            })
            .send()
            .await
            .map_err(transport_error)?;

        let body: SignResponse = read_json(response).await?;
        decode_field("signature", &body.signature)
    }

    async fn public_key(&self, key_ref: &str) -> Result<Vec<u8>, SigningError> {
        let url = self.key_url(key_ref, "public-key")?;
        let response = self.client.get(url).send().await.map_err(transport_error)?;

        let body: PublicKeyResponse = read_json(response).await?;
        decode_field("publicKey", &body.public_key)
    }
}
