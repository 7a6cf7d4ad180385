use crate::error::{Result, SealError};
use base64::{engine::general_purpose::STANDARD, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

const SALT_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const KDF_ROUNDS: u32 = 100_000;
const METHOD: &str = "ChaCha20Poly1305";

/// On-disk envelope of a passphrase-protected secret file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedPayload {
    pub version: u32,
    pub encryption_method: String,
    pub kdf_salt: String,
    pub nonce: String,
    pub ciphertext: String,
}

/// Encrypt with a key derived from `passphrase` (PBKDF2-SHA256).
pub fn seal(data: &[u8], passphrase: &str) -> Result<SealedPayload> {
    let mut kdf_salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut kdf_salt);

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let key = derive_key(passphrase, &kdf_salt);
    let cipher = ChaCha20Poly1305::new(&key);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), data)
        .map_err(|e| SealError::crypto(format!("Encryption failed: {}", e)))?;

    Ok(SealedPayload {
        version: 1,
        encryption_method: METHOD.to_string(),
        kdf_salt: hex::encode(kdf_salt),
        nonce: hex::encode(nonce),
        ciphertext: STANDARD.encode(ciphertext),
    })
}

pub fn open(payload: &SealedPayload, passphrase: &str) -> Result<Vec<u8>> {
    if payload.encryption_method != METHOD {
        return Err(SealError::crypto(format!(
            "Unsupported encryption method: {}",
            payload.encryption_method
        )));
    }

    let kdf_salt = hex::decode(&payload.kdf_salt)
        .map_err(|e| SealError::crypto(format!("Invalid salt: {}", e)))?;
    let nonce = hex::decode(&payload.nonce)
        .map_err(|e| SealError::crypto(format!("Invalid nonce: {}", e)))?;
    if nonce.len() != NONCE_SIZE {
        return Err(SealError::crypto("Invalid nonce length"));
    }
    let ciphertext = STANDARD
        .decode(&payload.ciphertext)
        .map_err(|e| SealError::crypto(format!("Invalid ciphertext: {}", e)))?;

    let key = derive_key(passphrase, &kdf_salt);
    let cipher = ChaCha20Poly1305::new(&key);

    cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
        .map_err(|_| SealError::crypto("Decryption failed: wrong passphrase or corrupted file"))
}

fn derive_key(passphrase: &str, salt: &[u8]) -> Key {
    use pbkdf2::pbkdf2_hmac;
    use sha2::Sha256;

    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, KDF_ROUNDS, &mut key);
    *Key::from_slice(&key)
}
