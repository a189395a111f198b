// Fetching a peer workspace's published keys

use anyhow::{Context, Result};
use fedmcp_core::{Jwks, Keyring};
use std::time::Duration;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Downloads a JWKS document and loads every key into a keyring.
///
/// # Arguments
/// * `url` - Usually a peer's `/.well-known/jwks.json`
///
/// # Returns
/// A keyring holding the published keys
pub fn fetch_keyring(url: &str) -> Result<Keyring> {
    let jwks: Jwks = ureq::get(url)
        .timeout(FETCH_TIMEOUT)
        .call()
        .with_context(|| format!("Failed to fetch JWKS from {}", url))?
        .into_json()
        .with_context(|| format!("Response from {} is not a JWKS document", url))?;

    keyring_from_jwks(&jwks)
}

pub fn keyring_from_jwks(jwks: &Jwks) -> Result<Keyring> {
    let mut keyring = Keyring::new();
    let count = keyring
        .extend_from_jwks(jwks)
        .context("JWKS contains an unusable key")?;
    if count == 0 {
        anyhow::bail!("JWKS contains no keys");
    }
    Ok(keyring)
}
