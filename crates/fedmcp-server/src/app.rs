//! Wiring from [`Config`] to a running [`ArtifactService`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use fedmcp_core::{ArtifactSigner, Jwks, Keyring, LocalSigner, RemoteSigner, Verifier};

use crate::audit::{
    AuditLog, AuditSink, AuditTrail, FileAuditLog, InMemoryAuditLog, PostgresAuditLog,
    TracingSink, WebhookSink,
};
use crate::config::{AuditBackendConfig, AuditConfig, Config, SigningConfig, StorageConfig};
use crate::db;
use crate::kms::HttpKeyCustodian;
use crate::service::ArtifactService;
use crate::storage::{FilesystemStorage, ObjectStorage, StorageBackend};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn build_service(config: &Config) -> Result<ArtifactService> {
    let storage = build_storage(&config.storage)?;
    let signer = build_signer(&config.signing).await?;
    let keyring = build_keyring(signer.as_ref(), config.trusted_jwks_path.as_deref())?;
    let audit = build_audit(&config.audit).await?;

    tracing::info!(
        storage = storage.backend_name(),
        kid = signer.key_id(),
        trusted_keys = keyring.len(),
        version_policy = ?config.version_policy,
        "artifact service ready"
    );

    Ok(ArtifactService::new(
        storage,
        signer,
        Arc::new(Verifier::new(keyring)),
        Arc::new(audit),
        config.version_policy,
    ))
}

pub fn build_storage(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    Ok(match config {
        StorageConfig::Local { path } => Arc::new(FilesystemStorage::new(path)),
        StorageConfig::Object { bucket, prefix } => Arc::new(
            ObjectStorage::s3(bucket, prefix)
                .with_context(|| format!("Failed to configure bucket '{}'", bucket))?,
        ),
    })
}

pub async fn build_signer(config: &SigningConfig) -> Result<Arc<dyn ArtifactSigner>> {
    Ok(match config {
        SigningConfig::Local {
            key_path: Some(path),
            kid,
        } => {
            let pem = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read signing key {}", path.display()))?;
            Arc::new(
                LocalSigner::from_pem(kid.clone(), &pem)
                    .with_context(|| format!("Invalid signing key {}", path.display()))?,
            )
        }
        SigningConfig::Local { key_path: None, kid } => {
            tracing::warn!(kid = %kid, "SIGNING_KEY_PATH not set; using an ephemeral signing key");
            Arc::new(LocalSigner::generate(kid.clone()))
        }
        SigningConfig::Kms {
            key_id,
            endpoint,
            timeout,
            kid,
        } => {
            let custodian = HttpKeyCustodian::new(endpoint, *timeout)?;
            Arc::new(
                RemoteSigner::connect(Arc::new(custodian), key_id.clone(), kid.clone())
                    .await
                    .context("Failed to fetch the KMS public key")?,
            )
        }
    })
}

/// The signer's own key plus any trusted federated keys. The signer's key
/// wins over a trusted key with the same kid.
pub fn build_keyring(signer: &dyn ArtifactSigner, trusted_jwks: Option<&Path>) -> Result<Keyring> {
    let mut keyring = Keyring::new();
    if let Some(path) = trusted_jwks {
        let count = keyring.extend_from_jwks(&load_jwks(path)?)?;
        tracing::info!(path = %path.display(), count, "loaded trusted keys");
    }
    if keyring
        .insert(signer.key_id(), signer.verification_key())
        .is_some()
    {
        tracing::warn!(kid = signer.key_id(), "trusted JWKS entry shadowed by the signing key");
    }
    Ok(keyring)
}

pub fn load_jwks(path: &Path) -> Result<Jwks> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JWKS {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JWKS {}", path.display()))
}

pub async fn build_audit(config: &AuditConfig) -> Result<AuditTrail> {
    let log: Arc<dyn AuditLog> = match &config.backend {
        AuditBackendConfig::Memory => Arc::new(InMemoryAuditLog::new()),
        AuditBackendConfig::File { path } => Arc::new(FileAuditLog::new(path)),
        AuditBackendConfig::Postgres { database_url } => {
            let pool = db::create_pool(database_url)
                .await
                .context("Failed to connect to the audit database")?;
            db::run_migrations(&pool)
                .await
                .context("Failed to run audit migrations")?;
            Arc::new(PostgresAuditLog::new(pool))
        }
    };

    let mut sinks: Vec<Arc<dyn AuditSink>> = vec![Arc::new(TracingSink)];
    if let Some(url) = &config.webhook_url {
        sinks.push(Arc::new(WebhookSink::new(url.clone(), WEBHOOK_TIMEOUT)?));
    }

    let trail = AuditTrail::open(log, sinks, config.hash_chain).await?;
    if config.hash_chain && !trail.verify_integrity().await? {
        tracing::error!("audit hash chain failed verification at startup");
    }
    Ok(trail)
}

/// Re-reads the trusted JWKS and swaps the verifier's keyring.
pub fn reload_keyring(service: &ArtifactService, trusted_jwks: Option<&Path>) -> Result<usize> {
    let keyring = build_keyring(service.signer(), trusted_jwks)?;
    let count = keyring.len();
    service.verifier().replace_keyring(keyring);
    Ok(count)
}
