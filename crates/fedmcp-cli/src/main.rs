// FedMCP CLI - offline key management, signing and verification

mod keystore;
mod remote;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use fedmcp_core::{
    did_to_verification_key, generate_keypair, inspect, pubkey_to_did, validate,
    verifying_key_from_pem, verifying_key_to_pem, Artifact, ArtifactDraft, Keyring, LocalSigner,
    VerificationKey, Verifier,
};

/// FedMCP - sign and verify federated MCP artifacts
#[derive(Parser)]
#[command(name = "fedmcp")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a P-256 signing keypair
    Keygen {
        /// Output path prefix; writes <OUT>.key.pem[.age] and <OUT>.pub.pem
        #[arg(short, long, default_value = "fedmcp")]
        out: PathBuf,

        /// Encrypt the private key with a passphrase
        #[arg(short, long)]
        encrypt: bool,

        /// Overwrite existing key files
        #[arg(short, long)]
        force: bool,
    },
    /// Sign an artifact JSON file into a compact token
    Sign {
        /// Artifact JSON; id, version and createdAt are filled in when absent
        artifact: PathBuf,

        /// Private key PEM (age-encrypted when it ends in .age)
        key: PathBuf,

        /// Key id placed in the token header
        #[arg(long, default_value = "local")]
        kid: String,

        /// Write the token here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Verify a token against a known key or a published JWKS
    Verify {
        /// The token, or a path to a file containing it
        token: String,

        #[command(flatten)]
        keys: KeySource,

        /// Require the artifact to belong to this workspace
        #[arg(short, long)]
        workspace: Option<String>,
    },
    /// Decode a token without verifying it
    Inspect {
        /// The token, or a path to a file containing it
        token: String,
    },
}

#[derive(Args)]
#[group(required = true, multiple = true)]
struct KeySource {
    /// Public key PEM
    #[arg(long, requires = "kid", conflicts_with_all = ["did", "jwks_url"])]
    key: Option<PathBuf>,

    /// did:key of the signer
    #[arg(long, requires = "kid", conflicts_with = "jwks_url")]
    did: Option<String>,

    /// Key id the key is registered under
    #[arg(long)]
    kid: Option<String>,

    /// URL of a JWKS document, e.g. https://peer.example/.well-known/jwks.json
    #[arg(long)]
    jwks_url: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Keygen { out, encrypt, force } => handle_keygen(&out, encrypt, force),
        Commands::Sign {
            artifact,
            key,
            kid,
            out,
        } => handle_sign(&artifact, &key, &kid, out.as_deref()),
        Commands::Verify {
            token,
            keys,
            workspace,
        } => handle_verify(&token, &keys, workspace.as_deref()),
        Commands::Inspect { token } => handle_inspect(&token),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn handle_keygen(out: &Path, encrypt: bool, force: bool) -> Result<()> {
    let (private_path, public_path) = keygen_paths(out, encrypt);
    for path in [&private_path, &public_path] {
        if path.exists() && !force {
            anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
        }
    }

    let passphrase = if encrypt {
        Some(keystore::prompt_new_passphrase()?)
    } else {
        None
    };

    let (signing_key, verifying_key) = generate_keypair();
    keystore::write_signing_key(&private_path, &signing_key, passphrase.as_deref())?;
    let public_pem = verifying_key_to_pem(&verifying_key).context("Failed to encode public key")?;
    std::fs::write(&public_path, public_pem)
        .with_context(|| format!("Failed to write '{}'", public_path.display()))?;

    let did = pubkey_to_did(&VerificationKey::Es256(verifying_key));
    println!("{} Keypair generated", "✓".green().bold());
    println!();
    println!("  Private key: {}", private_path.display());
    println!("  Public key:  {}", public_path.display());
    println!("  DID:         {}", did);
    if !encrypt {
        println!();
        println!("{}", "The private key is stored unencrypted; consider --encrypt.".yellow());
    }
    Ok(())
}

fn keygen_paths(out: &Path, encrypt: bool) -> (PathBuf, PathBuf) {
    let base = out.to_string_lossy();
    let private = if encrypt {
        format!("{}.key.pem.{}", base, keystore::ENCRYPTED_EXTENSION)
    } else {
        format!("{}.key.pem", base)
    };
    (PathBuf::from(private), PathBuf::from(format!("{}.pub.pem", base)))
}

fn handle_sign(artifact_path: &Path, key_path: &Path, kid: &str, out: Option<&Path>) -> Result<()> {
    let artifact = load_artifact(artifact_path)?;
    let signing_key = keystore::load_signing_key(key_path)?;
    let signer = LocalSigner::new(kid, signing_key);

    let token = signer
        .sign_artifact(&artifact)
        .context("Failed to sign artifact")?;

    match out {
        Some(path) => {
            std::fs::write(path, format!("{}\n", token))
                .with_context(|| format!("Failed to write '{}'", path.display()))?;
            eprintln!("{} Signed {} v{}", "✓".green().bold(), artifact.id, artifact.version);
            eprintln!("  Token: {}", path.display());
        }
        None => println!("{}", token),
    }
    Ok(())
}

/// Reads an artifact file, completing any missing id, version or timestamp.
fn load_artifact(path: &Path) -> Result<Artifact> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    let draft: ArtifactDraft = serde_json::from_str(&content)
        .with_context(|| format!("'{}' is not an artifact", path.display()))?;

    let artifact = draft.complete(
        uuid::Uuid::new_v4().to_string(),
        1,
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    );
    validate(&artifact).with_context(|| format!("Invalid artifact in '{}'", path.display()))?;
    Ok(artifact)
}

fn handle_verify(token: &str, keys: &KeySource, workspace: Option<&str>) -> Result<()> {
    let token = read_token(token)?;
    let verifier = Verifier::new(build_keyring(keys)?);

    match verifier.verify(&token, workspace) {
        Ok(artifact) => {
            println!("{} {}", "✓".green().bold(), "Token verified".green());
            println!();
            println!("  Artifact:  {} ({})", artifact.id, artifact.artifact_type.as_str());
            println!("  Version:   {}", artifact.version);
            println!("  Workspace: {}", artifact.workspace_id);
            println!("  Created:   {}", artifact.created_at);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), "Token verification failed".red());
            eprintln!();
            eprintln!("  Reason: {}", e.category());
            Err(e.into())
        }
    }
}

fn build_keyring(keys: &KeySource) -> Result<Keyring> {
    if let Some(url) = &keys.jwks_url {
        return remote::fetch_keyring(url);
    }

    let kid = keys.kid.as_deref().context("--kid is required with --key or --did")?;
    let key = match (&keys.key, &keys.did) {
        (Some(path), _) => {
            let pem = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read '{}'", path.display()))?;
            VerificationKey::Es256(
                verifying_key_from_pem(&pem)
                    .with_context(|| format!("Invalid public key in '{}'", path.display()))?,
            )
        }
        (None, Some(did)) => did_to_verification_key(did).context("Invalid did:key")?,
        (None, None) => anyhow::bail!("Provide --key, --did or --jwks-url"),
    };

    let mut keyring = Keyring::new();
    keyring.insert(kid, key);
    Ok(keyring)
}

fn handle_inspect(token: &str) -> Result<()> {
    let token = read_token(token)?;
    let (header, payload) = inspect(&token).context("Not a well-formed token")?;

    println!("{}", "Unverified contents; use `fedmcp verify` before trusting them.".yellow());
    println!();
    println!("Header:");
    println!("{}", serde_json::to_string_pretty(&header)?);
    println!();
    println!("Payload:");
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

/// A token argument is either the token itself or a file holding it.
fn read_token(arg: &str) -> Result<String> {
    let path = Path::new(arg);
    let raw = if path.is_file() {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read '{}'", path.display()))?
    } else {
        arg.to_string()
    };
    Ok(raw.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedmcp_core::signing_key_to_pem;
    use tempfile::TempDir;

    fn write_artifact(dir: &TempDir, value: serde_json::Value) -> PathBuf {
        let path = dir.path().join("artifact.json");
        std::fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[test]
    fn test_keygen_paths() {
        let (private, public) = keygen_paths(Path::new("keys/ws"), false);
        assert_eq!(private, PathBuf::from("keys/ws.key.pem"));
        assert_eq!(public, PathBuf::from("keys/ws.pub.pem"));

        let (private, _) = keygen_paths(Path::new("keys/ws"), true);
        assert_eq!(private, PathBuf::from("keys/ws.key.pem.age"));
    }

    #[test]
    fn test_keygen_sign_verify_with_pem() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("ws");
        handle_keygen(&out, false, false).unwrap();
        assert!(handle_keygen(&out, false, false).is_err());

        let artifact = write_artifact(
            &dir,
            serde_json::json!({"type": "policy", "workspaceId": "ws-a", "jsonBody": {"allow": true}}),
        );
        let token_path = dir.path().join("artifact.jws");
        handle_sign(&artifact, &dir.path().join("ws.key.pem"), "ws-key", Some(&token_path)).unwrap();

        let keys = KeySource {
            key: Some(dir.path().join("ws.pub.pem")),
            did: None,
            kid: Some("ws-key".into()),
            jwks_url: None,
        };
        let token_arg = token_path.to_string_lossy();
        handle_verify(&token_arg, &keys, Some("ws-a")).unwrap();
        assert!(handle_verify(&token_arg, &keys, Some("ws-b")).is_err());
        handle_inspect(&token_arg).unwrap();
    }

    #[test]
    fn test_verify_with_did() {
        let (signing_key, verifying_key) = generate_keypair();
        let signer = LocalSigner::new("ws-key", signing_key);
        let artifact = load_artifact(&write_artifact(
            &TempDir::new().unwrap(),
            serde_json::json!({"id": "p1", "type": "prompt-template", "workspaceId": "ws-a"}),
        ))
        .unwrap();
        let token = signer.sign_artifact(&artifact).unwrap();

        let keys = KeySource {
            key: None,
            did: Some(pubkey_to_did(&VerificationKey::Es256(verifying_key))),
            kid: Some("ws-key".into()),
            jwks_url: None,
        };
        handle_verify(&token, &keys, None).unwrap();

        let wrong_kid = KeySource {
            kid: Some("other".into()),
            ..keys
        };
        assert!(handle_verify(&token, &wrong_kid, None).is_err());
    }

    #[test]
    fn test_load_artifact_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let artifact = load_artifact(&write_artifact(
            &dir,
            serde_json::json!({"type": "tool-manifest", "workspaceId": "ws-a"}),
        ))
        .unwrap();
        assert_eq!(artifact.version, 1);
        assert!(uuid::Uuid::parse_str(&artifact.id).is_ok());
        assert!(artifact.created_at.ends_with('Z'));

        let bad = write_artifact(&dir, serde_json::json!({"type": "policy", "workspaceId": "bad id!"}));
        assert!(load_artifact(&bad).is_err());
    }

    #[test]
    fn test_sign_with_encrypted_key_file_is_loadable() {
        let dir = TempDir::new().unwrap();
        let (signing_key, _) = generate_keypair();
        let path = dir.path().join("ws.key.pem.age");
        keystore::write_signing_key(&path, &signing_key, Some("pass")).unwrap();

        let loaded = keystore::load_signing_key_with(&path, Some("pass")).unwrap();
        assert_eq!(
            signing_key_to_pem(&loaded).unwrap().as_str(),
            signing_key_to_pem(&signing_key).unwrap().as_str()
        );
    }

    #[test]
    fn test_read_token_trims_file_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.jws");
        std::fs::write(&path, "a.b.c\n").unwrap();
        assert_eq!(read_token(&path.to_string_lossy()).unwrap(), "a.b.c");
        assert_eq!(read_token("x.y.z").unwrap(), "x.y.z");
    }

    #[test]
    fn test_inspect_rejects_garbage() {
        assert!(handle_inspect("garbage").is_err());
    }
}
