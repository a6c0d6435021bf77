//! Chiffrement des mots de passe stockés dans la configuration
//!
//! Les mots de passe des comptes peuvent être écrits en clair ou sous la
//! forme `encrypted:BASE64`. La clé AES-256-GCM est dérivée de l'identifiant
//! de la machine : un fichier de configuration copié ailleurs ne se
//! déchiffre plus.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};

/// Préfixe pour identifier les mots de passe chiffrés
const ENCRYPTED_PREFIX: &str = "encrypted:";

const KEY_SALT: &[u8] = b"pmodigi-credentials-v1";
const NONCE_SALT: &[u8] = b"pmodigi-nonce-v1";
const NONCE_LEN: usize = 12;

/// Identifiant stable de la machine
#[cfg(target_os = "linux")]
fn machine_id() -> Result<String> {
    ["/etc/machine-id", "/var/lib/dbus/machine-id"]
        .iter()
        .find_map(|path| std::fs::read_to_string(path).ok())
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| anyhow!("Failed to read machine-id"))
}

#[cfg(target_os = "macos")]
fn machine_id() -> Result<String> {
    let output = std::process::Command::new("ioreg")
        .args(["-d2", "-c", "IOPlatformExpertDevice"])
        .output()?;
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .find(|line| line.contains("IOPlatformUUID"))
        .and_then(|line| line.split('"').nth(3))
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Failed to extract IOPlatformUUID from ioreg"))
}

#[cfg(target_os = "windows")]
fn machine_id() -> Result<String> {
    let output = std::process::Command::new("wmic")
        .args(["csproduct", "get", "UUID"])
        .output()?;
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .nth(1)
        .map(|line| line.trim().to_string())
        .ok_or_else(|| anyhow!("Failed to extract UUID from wmic"))
}

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
fn machine_id() -> Result<String> {
    Err(anyhow!("Unsupported platform for machine id extraction"))
}

fn cipher_for(machine_id: &str) -> Result<Aes256Gcm> {
    let key = Sha256::new()
        .chain_update(machine_id.as_bytes())
        .chain_update(KEY_SALT)
        .finalize();
    Aes256Gcm::new_from_slice(&key).map_err(|e| anyhow!("Failed to create cipher: {}", e))
}

/// Chiffre un mot de passe avec la clé de la machine
///
/// Le nonce est dérivé du mot de passe : chiffrer deux fois la même valeur
/// donne la même chaîne, et le fichier de configuration ne change pas.
/// Format encodé : nonce (12 octets) suivi du ciphertext.
pub fn encrypt_password(password: &str) -> Result<String> {
    encrypt_with(&cipher_for(&machine_id()?)?, password)
}

/// Déchiffre une valeur `encrypted:BASE64`
///
/// # Errors
///
/// Préfixe absent, base64 invalide, ou valeur chiffrée sur une autre machine.
pub fn decrypt_password(encrypted: &str) -> Result<String> {
    let encoded = payload(encrypted)?;
    decrypt_with(&cipher_for(&machine_id()?)?, encoded)
}

fn encrypt_with(cipher: &Aes256Gcm, password: &str) -> Result<String> {
    let digest = Sha256::new()
        .chain_update(password.as_bytes())
        .chain_update(NONCE_SALT)
        .finalize();
    let nonce_bytes = &digest[..NONCE_LEN];

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(nonce_bytes), password.as_bytes())
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    combined.extend_from_slice(nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    Ok(format!("{}{}", ENCRYPTED_PREFIX, STANDARD.encode(combined)))
}

fn payload(encrypted: &str) -> Result<&str> {
    encrypted
        .strip_prefix(ENCRYPTED_PREFIX)
        .ok_or_else(|| anyhow!("Invalid encrypted password format (missing prefix)"))
}

fn decrypt_with(cipher: &Aes256Gcm, encoded: &str) -> Result<String> {
    let combined = STANDARD
        .decode(encoded)
        .map_err(|e| anyhow!("Invalid base64: {}", e))?;
    if combined.len() <= NONCE_LEN {
        return Err(anyhow!("Invalid ciphertext (too short)"));
    }
    let (nonce, ciphertext) = combined.split_at(NONCE_LEN);

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| anyhow!("Decryption failed (wrong machine or corrupted data): {}", e))?;

    String::from_utf8(plaintext).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
}

/// `true` si la valeur commence par `encrypted:`
pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(ENCRYPTED_PREFIX)
}

/// Retourne le mot de passe en clair, qu'il soit stocké chiffré ou non
pub fn get_password(value: &str) -> Result<String> {
    if is_encrypted(value) {
        decrypt_password(value)
    } else {
        Ok(value.to_string())
    }
}
