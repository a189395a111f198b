//! Environment-driven server configuration.
//!
//! Every backend variant is chosen explicitly; a variant missing its required
//! settings is a [`ConfigError`], never a silent fallback to another variant.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_STORAGE_PATH: &str = "/tmp/fedmcp";
pub const DEFAULT_OBJECT_PREFIX: &str = "artifacts";
pub const DEFAULT_SIGNING_KEY_ID: &str = "workspace-root";
pub const DEFAULT_AUDIT_LOG_PATH: &str = "/tmp/fedmcp/audit.jsonl";
pub const DEFAULT_KMS_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is required when {reason}")]
    Missing { var: &'static str, reason: String },

    #[error("invalid {var}='{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Local { path: PathBuf },
    Object { bucket: String, prefix: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningConfig {
    /// `key_path: None` generates an ephemeral key at startup.
    Local { key_path: Option<PathBuf>, kid: String },
    Kms {
        key_id: String,
        endpoint: String,
        timeout: Duration,
        /// Defaults to `key_id` when unset.
        kid: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditBackendConfig {
    Memory,
    File { path: PathBuf },
    Postgres { database_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    pub backend: AuditBackendConfig,
    pub hash_chain: bool,
    pub webhook_url: Option<String>,
}

/// What CreateArtifact does when the id is already stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VersionPolicy {
    /// Last writer wins for an equal or higher version.
    #[default]
    Overwrite,
    /// The new version must be strictly greater than the stored one.
    Monotonic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub storage: StorageConfig,
    pub signing: SigningConfig,
    pub audit: AuditConfig,
    pub trusted_jwks_path: Option<PathBuf>,
    pub version_policy: VersionPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source. Empty
    /// values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_raw = var("FEDMCP_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            var: "FEDMCP_BIND_ADDR",
            value: bind_raw.clone(),
            reason: e.to_string(),
        })?;

        let storage = match var("STORAGE_TYPE").as_deref().unwrap_or("local") {
            "local" => StorageConfig::Local {
                path: var("LOCAL_STORAGE_PATH")
                    .unwrap_or_else(|| DEFAULT_STORAGE_PATH.to_string())
                    .into(),
            },
            "object" | "s3" => StorageConfig::Object {
                bucket: var("FEDMCP_ARTIFACT_BUCKET").ok_or_else(|| ConfigError::Missing {
                    var: "FEDMCP_ARTIFACT_BUCKET",
                    reason: "STORAGE_TYPE=object".into(),
                })?,
                prefix: var("OBJECT_STORE_PREFIX")
                    .map(|p| p.trim_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_OBJECT_PREFIX.to_string()),
            },
            other => return Err(invalid("STORAGE_TYPE", other, "expected 'local' or 'object'")),
        };

        let signing = match var("SIGNING_TYPE").as_deref().unwrap_or("local") {
            "local" => SigningConfig::Local {
                key_path: var("SIGNING_KEY_PATH").map(PathBuf::from),
                kid: var("SIGNING_KEY_ID").unwrap_or_else(|| DEFAULT_SIGNING_KEY_ID.to_string()),
            },
            "kms" => {
                let reason = || "SIGNING_TYPE=kms".to_string();
                let timeout_secs = match var("KMS_TIMEOUT_SECS") {
                    Some(raw) => raw
                        .parse::<u64>()
                        .ok()
                        .filter(|secs| *secs > 0)
                        .ok_or_else(|| invalid("KMS_TIMEOUT_SECS", &raw, "expected a positive integer"))?,
                    None => DEFAULT_KMS_TIMEOUT_SECS,
                };
                SigningConfig::Kms {
                    key_id: var("KMS_KEY_ID").ok_or_else(|| ConfigError::Missing {
                        var: "KMS_KEY_ID",
                        reason: reason(),
                    })?,
                    endpoint: var("KMS_ENDPOINT").ok_or_else(|| ConfigError::Missing {
                        var: "KMS_ENDPOINT",
                        reason: reason(),
                    })?,
                    timeout: Duration::from_secs(timeout_secs),
                    kid: var("SIGNING_KEY_ID"),
                }
            }
            other => return Err(invalid("SIGNING_TYPE", other, "expected 'local' or 'kms'")),
        };

        let backend = match var("AUDIT_BACKEND").as_deref().unwrap_or("memory") {
            "memory" => AuditBackendConfig::Memory,
            "file" => AuditBackendConfig::File {
                path: var("AUDIT_LOG_PATH")
                    .unwrap_or_else(|| DEFAULT_AUDIT_LOG_PATH.to_string())
                    .into(),
            },
            "postgres" => AuditBackendConfig::Postgres {
                database_url: var("DATABASE_URL").ok_or_else(|| ConfigError::Missing {
                    var: "DATABASE_URL",
                    reason: "AUDIT_BACKEND=postgres".into(),
                })?,
            },
            other => {
                return Err(invalid(
                    "AUDIT_BACKEND",
                    other,
                    "expected 'memory', 'file' or 'postgres'",
                ))
            }
        };

        let hash_chain = match var("AUDIT_HASH_CHAIN") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| invalid("AUDIT_HASH_CHAIN", &raw, "expected true or false"))?,
            None => false,
        };

        let version_policy = match var("ARTIFACT_VERSION_POLICY").as_deref().unwrap_or("overwrite") {
            "overwrite" => VersionPolicy::Overwrite,
            "monotonic" => VersionPolicy::Monotonic,
            other => {
                return Err(invalid(
                    "ARTIFACT_VERSION_POLICY",
                    other,
                    "expected 'overwrite' or 'monotonic'",
                ))
            }
        };

        Ok(Config {
            bind_addr,
            storage,
            signing,
            audit: AuditConfig {
                backend,
                hash_chain,
                webhook_url: var("AUDIT_WEBHOOK_URL"),
            },
            trusted_jwks_path: var("TRUSTED_JWKS_PATH").map(PathBuf::from),
            version_policy,
        })
    }
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8000".parse().unwrap());
        assert_eq!(
            config.storage,
            StorageConfig::Local {
                path: PathBuf::from("/tmp/fedmcp")
            }
        );
        assert_eq!(
            config.signing,
            SigningConfig::Local {
                key_path: None,
                kid: "workspace-root".into()
            }
        );
        assert_eq!(config.audit.backend, AuditBackendConfig::Memory);
        assert!(!config.audit.hash_chain);
        assert_eq!(config.version_policy, VersionPolicy::Overwrite);
        assert!(config.trusted_jwks_path.is_none());
    }

    #[test]
    fn test_object_storage_requires_bucket() {
        let err = config(&[("STORAGE_TYPE", "object")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { var: "FEDMCP_ARTIFACT_BUCKET", .. }));

        let config = config(&[
            ("STORAGE_TYPE", "s3"),
            ("FEDMCP_ARTIFACT_BUCKET", "fedmcp-artifacts"),
            ("OBJECT_STORE_PREFIX", "/tenant-a/"),
        ])
        .unwrap();
        assert_eq!(
            config.storage,
            StorageConfig::Object {
                bucket: "fedmcp-artifacts".into(),
                prefix: "tenant-a".into()
            }
        );
    }

    #[test]
    fn test_kms_requires_key_and_endpoint() {
        assert!(matches!(
            config(&[("SIGNING_TYPE", "kms"), ("KMS_ENDPOINT", "http://kms")]).unwrap_err(),
            ConfigError::Missing { var: "KMS_KEY_ID", .. }
        ));
        assert!(matches!(
            config(&[("SIGNING_TYPE", "kms"), ("KMS_KEY_ID", "k1")]).unwrap_err(),
            ConfigError::Missing { var: "KMS_ENDPOINT", .. }
        ));

        let config = config(&[
            ("SIGNING_TYPE", "kms"),
            ("KMS_KEY_ID", "k1"),
            ("KMS_ENDPOINT", "http://kms"),
            ("KMS_TIMEOUT_SECS", "3"),
        ])
        .unwrap();
        assert_eq!(
            config.signing,
            SigningConfig::Kms {
                key_id: "k1".into(),
                endpoint: "http://kms".into(),
                timeout: Duration::from_secs(3),
                kid: None,
            }
        );
    }

    #[test]
    fn test_unknown_variants_are_errors() {
        for (var, value) in [
            ("STORAGE_TYPE", "ftp"),
            ("SIGNING_TYPE", "hsm"),
            ("AUDIT_BACKEND", "cloudwatch"),
            ("ARTIFACT_VERSION_POLICY", "append"),
            ("AUDIT_HASH_CHAIN", "maybe"),
            ("FEDMCP_BIND_ADDR", "not-an-addr"),
        ] {
            assert!(
                matches!(config(&[(var, value)]), Err(ConfigError::Invalid { .. })),
                "{}={} should be rejected",
                var,
                value
            );
        }
        assert!(config(&[("SIGNING_TYPE", "kms"), ("KMS_KEY_ID", "k"), ("KMS_ENDPOINT", "http://kms"), ("KMS_TIMEOUT_SECS", "0")]).is_err());
    }

    #[test]
    fn test_audit_settings() {
        assert!(matches!(
            config(&[("AUDIT_BACKEND", "postgres")]).unwrap_err(),
            ConfigError::Missing { var: "DATABASE_URL", .. }
        ));

        let config = config(&[
            ("AUDIT_BACKEND", "file"),
            ("AUDIT_LOG_PATH", "/var/log/fedmcp.jsonl"),
            ("AUDIT_HASH_CHAIN", "true"),
            ("AUDIT_WEBHOOK_URL", "https://siem.example/hook"),
            ("ARTIFACT_VERSION_POLICY", "monotonic"),
        ])
        .unwrap();
        assert_eq!(
            config.audit,
            AuditConfig {
                backend: AuditBackendConfig::File {
                    path: PathBuf::from("/var/log/fedmcp.jsonl")
                },
                hash_chain: true,
                webhook_url: Some("https://siem.example/hook".into()),
            }
        );
        assert_eq!(config.version_policy, VersionPolicy::Monotonic);
    }

    #[test]
    fn test_empty_values_count_as_unset() {
        let config = config(&[("STORAGE_TYPE", ""), ("SIGNING_KEY_ID", "  ")]).unwrap();
        assert!(matches!(config.storage, StorageConfig::Local { .. }));
        assert!(matches!(config.signing, SigningConfig::Local { ref kid, .. } if kid == "workspace-root"));
    }
}
