// src/crypto/mod.rs
use std::fs::File;
use std::path::Path;
use aes_gcm::{Aes256Gcm, Nonce, aead::{Aead, KeyInit}};
use sha2::{Sha256, Digest};
use rand::RngCore;
use crate::{errors::GameBoxError, store::write_atomic};

const NONCE_LEN: usize = 12;

pub fn encrypt_data(data: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, GameBoxError> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| GameBoxError::CryptoError(format!("Failed to init cipher: {:?}", e)))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let encrypted = cipher.encrypt(nonce, data)
        .map_err(|e| GameBoxError::CryptoError(format!("Encryption failed: {}", e)))?;

    let mut result = Vec::with_capacity(NONCE_LEN + encrypted.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&encrypted);

    Ok(result)
}

pub fn decrypt_data(data: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, GameBoxError> {
    if data.len() < NONCE_LEN {
        return Err(GameBoxError::CryptoError("Invalid encrypted data: too short".to_string()));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| GameBoxError::CryptoError(format!("Failed to init cipher: {:?}", e)))?;

    let nonce = Nonce::from_slice(&data[0..NONCE_LEN]);
    let encrypted_data = &data[NONCE_LEN..];

    let decrypted = cipher.decrypt(nonce, encrypted_data)
        .map_err(|e| GameBoxError::CryptoError(format!("Decryption failed: {}", e)))?;

    Ok(decrypted)
}

/// SHA-256 of a file's contents, streamed.
pub fn hash_file(path: &Path) -> Result<String, GameBoxError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Reads the local 32-byte key, generating and storing one on first use.
pub fn load_or_create_key(path: &Path) -> Result<[u8; 32], GameBoxError> {
    if path.exists() {
        let bytes = std::fs::read(path)?;
        if bytes.len() != 32 {
            return Err(GameBoxError::CryptoError(format!(
                "Key file {} has wrong length {}",
                path.display(),
                bytes.len()
            )));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        return Ok(key);
    }

    replace_key(path)
}

/// Generates a fresh key and writes it over whatever is at `path`.
pub fn replace_key(path: &Path) -> Result<[u8; 32], GameBoxError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    write_atomic(path, &key)?;
    log::info!("Generated new local key at {}", path.display());
    Ok(key)
}

pub fn to_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn from_hex(hex: &str) -> Result<Vec<u8>, GameBoxError> {
    if hex.len() % 2 != 0 {
        return Err(GameBoxError::CryptoError("Odd-length hex string".to_string()));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| GameBoxError::CryptoError(format!("Invalid hex at offset {}", i)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_with_same_key() {
        let key = [7u8; 32];
        let sealed = encrypt_data(b"sk-or-secret", &key).unwrap();
        assert_ne!(&sealed[NONCE_LEN..], b"sk-or-secret");
        assert_eq!(decrypt_data(&sealed, &key).unwrap(), b"sk-or-secret");
    }

    #[test]
    fn decrypt_with_wrong_key_fails() {
        let sealed = encrypt_data(b"secret", &[1u8; 32]).unwrap();
        assert!(matches!(decrypt_data(&sealed, &[2u8; 32]), Err(GameBoxError::CryptoError(_))));
        assert!(decrypt_data(&[0u8; 4], &[1u8; 32]).is_err());
    }

    #[test]
    fn hex_helpers() {
        assert_eq!(to_hex(&[0x00, 0xab, 0xff]), "00abff");
        assert_eq!(from_hex("00abff").unwrap(), vec![0x00, 0xab, 0xff]);
        assert!(from_hex("abc").is_err());
        assert!(from_hex("zz").is_err());
    }

    #[test]
    fn key_file_is_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".secret_key");
        let first = load_or_create_key(&path).unwrap();
        let second = load_or_create_key(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn hash_file_is_sha256_hex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            hash_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
