// Keystore module - private key files, optionally passphrase-encrypted with age

use age::secrecy::SecretString;
use anyhow::{Context, Result};
use fedmcp_core::{signing_key_from_pem, signing_key_to_pem};
use p256::ecdsa::SigningKey;
use std::io::{Read, Write};
use std::path::Path;

/// Extension marking an age-encrypted private key file.
pub const ENCRYPTED_EXTENSION: &str = "age";

/// Encrypts private key bytes with a passphrase using age encryption.
///
/// # Arguments
/// * `key_bytes` - The PKCS#8 PEM bytes to encrypt
/// * `passphrase` - The passphrase to use for encryption
///
/// # Returns
/// Encrypted bytes suitable for file storage
pub fn encrypt_key(key_bytes: &[u8], passphrase: &str) -> Result<Vec<u8>> {
    let encryptor = age::Encryptor::with_user_passphrase(SecretString::from(passphrase.to_string()));

    let mut encrypted = vec![];
    let mut writer = encryptor
        .wrap_output(&mut encrypted)
        .context("Failed to create age encryptor")?;

    writer
        .write_all(key_bytes)
        .context("Failed to write key bytes to encryptor")?;

    writer
        .finish()
        .context("Failed to finalize encryption")?;

    Ok(encrypted)
}

/// Reverses [`encrypt_key`]. A wrong passphrase is an error, never garbage.
pub fn decrypt_key(encrypted: &[u8], passphrase: &str) -> Result<Vec<u8>> {
    let decryptor = match age::Decryptor::new(encrypted).context("Not an age-encrypted key file")? {
        age::Decryptor::Passphrase(d) => d,
        _ => anyhow::bail!("Key file is not passphrase-encrypted"),
    };

    let mut decrypted = vec![];
    let mut reader = decryptor
        .decrypt(&SecretString::from(passphrase.to_string()), None)
        .context("Failed to decrypt key (wrong passphrase?)")?;

    reader
        .read_to_end(&mut decrypted)
        .context("Failed to read decrypted bytes")?;

    Ok(decrypted)
}

pub fn is_encrypted(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ENCRYPTED_EXTENSION)
}

/// Writes a private key as PEM, or age-encrypted PEM when a passphrase is
/// given. The file is readable by the owner only.
pub fn write_signing_key(path: &Path, key: &SigningKey, passphrase: Option<&str>) -> Result<()> {
    let pem = signing_key_to_pem(key).context("Failed to encode private key")?;
    let bytes = match passphrase {
        Some(passphrase) => encrypt_key(pem.as_bytes(), passphrase)?,
        None => pem.as_bytes().to_vec(),
    };
    write_private(path, &bytes)
}

/// Loads a private key, prompting for the passphrase when the file is
/// encrypted.
pub fn load_signing_key(path: &Path) -> Result<SigningKey> {
    if is_encrypted(path) {
        let passphrase = prompt_passphrase_single()?;
        load_signing_key_with(path, Some(&passphrase))
    } else {
        load_signing_key_with(path, None)
    }
}

pub fn load_signing_key_with(path: &Path, passphrase: Option<&str>) -> Result<SigningKey> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read key file '{}'", path.display()))?;
    let pem_bytes = match passphrase {
        Some(passphrase) => decrypt_key(&bytes, passphrase)?,
        None => bytes,
    };
    let pem = String::from_utf8(pem_bytes).context("Key file is not PEM text")?;
    signing_key_from_pem(&pem).with_context(|| format!("Invalid private key in '{}'", path.display()))
}

/// Prompts once for an existing passphrase, without echo.
pub fn prompt_passphrase_single() -> Result<String> {
    rpassword::prompt_password("Passphrase: ").context("Failed to read passphrase")
}

/// Prompts twice for a new passphrase and requires both to match.
pub fn prompt_new_passphrase() -> Result<String> {
    let first = rpassword::prompt_password("New passphrase: ").context("Failed to read passphrase")?;
    if first.is_empty() {
        anyhow::bail!("Passphrase must not be empty");
    }
    let second =
        rpassword::prompt_password("Confirm passphrase: ").context("Failed to read passphrase")?;
    if first != second {
        anyhow::bail!("Passphrases do not match");
    }
    Ok(first)
}

fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .with_context(|| format!("Failed to create '{}'", path.display()))?;
        file.write_all(bytes)?;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    #[cfg(not(unix))]
    {
        std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write '{}'", path.display()))?;
    }

    Ok(())
}
