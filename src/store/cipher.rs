//! Frame encryption.
//!
//! Frames are sealed with ChaCha20-Poly1305. The first half of the 64-byte
//! store key is the AEAD key and the frame nonce fills the low eight bytes
//! of the 96-bit AEAD nonce. The whole key feeds a SHA-256 key check kept
//! in the file header, so a wrong key is reported before any frame is
//! opened.

use super::StoreError;
use chacha20poly1305::aead::{AeadInPlace, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce, Tag};
use sha2::{Digest, Sha256};

pub const ENCRYPTION_KEY_LEN: usize = 64;
pub const TAG_LEN: usize = 16;
pub const KEY_CHECK_LEN: usize = 16;

const AEAD_KEY_LEN: usize = 32;
const AEAD_NONCE_LEN: usize = 12;
const KEY_CHECK_DOMAIN: &[u8] = b"churn-sim key check v1";

/// Store encryption key
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; ENCRYPTION_KEY_LEN]);

impl EncryptionKey {
    pub fn new(bytes: [u8; ENCRYPTION_KEY_LEN]) -> Self {
        EncryptionKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ENCRYPTION_KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

#[derive(Clone)]
pub(crate) struct FrameCipher {
    aead: ChaCha20Poly1305,
    key_check: [u8; KEY_CHECK_LEN],
}

impl FrameCipher {
    pub(crate) fn new(key: &EncryptionKey) -> Self {
        let aead = ChaCha20Poly1305::new(Key::from_slice(&key.0[..AEAD_KEY_LEN]));

        let mut hasher = Sha256::new();
        hasher.update(KEY_CHECK_DOMAIN);
        hasher.update(key.0);
        let digest = hasher.finalize();
        let mut key_check = [0u8; KEY_CHECK_LEN];
        key_check.copy_from_slice(&digest[..KEY_CHECK_LEN]);

        FrameCipher { aead, key_check }
    }

    /// Digest stored in the file header to reject a wrong key up front.
    pub(crate) fn key_check(&self) -> [u8; KEY_CHECK_LEN] {
        self.key_check
    }

    /// Encrypt `plaintext` under `nonce`. Each nonce must be used once.
    pub(crate) fn seal(
        &self,
        nonce: u64,
        plaintext: &[u8],
    ) -> Result<(Vec<u8>, [u8; TAG_LEN]), StoreError> {
        let mut ciphertext = plaintext.to_vec();
        let tag = self
            .aead
            .encrypt_in_place_detached(&aead_nonce(nonce), b"", &mut ciphertext)
            .map_err(|_| {
                StoreError::Encryption(format!(
                    "cannot seal {} bytes under nonce {}",
                    plaintext.len(),
                    nonce
                ))
            })?;
        let mut detached = [0u8; TAG_LEN];
        detached.copy_from_slice(&tag);
        Ok((ciphertext, detached))
    }

    pub(crate) fn open(
        &self,
        nonce: u64,
        ciphertext: &[u8],
        tag: &[u8; TAG_LEN],
    ) -> Result<Vec<u8>, StoreError> {
        let mut plaintext = ciphertext.to_vec();
        self.aead
            .decrypt_in_place_detached(
                &aead_nonce(nonce),
                b"",
                &mut plaintext,
                Tag::from_slice(tag),
            )
            .map_err(|_| {
                StoreError::Decryption(format!(
                    "authentication tag mismatch for nonce {}",
                    nonce
                ))
            })?;
        Ok(plaintext)
    }
}

fn aead_nonce(nonce: u64) -> Nonce {
    let mut bytes = [0u8; AEAD_NONCE_LEN];
    bytes[..8].copy_from_slice(&nonce.to_le_bytes());
    *Nonce::from_slice(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(fill: u8) -> EncryptionKey {
        let mut bytes = [0u8; ENCRYPTION_KEY_LEN];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = fill.wrapping_add(i as u8);
        }
        EncryptionKey::new(bytes)
    }

    #[test]
    fn test_seal_open() {
        let cipher = FrameCipher::new(&key(7));
        let plaintext = vec![b'x'; 10_000];
        let (ciphertext, tag) = cipher.seal(3, &plaintext).unwrap();
        assert_ne!(ciphertext, plaintext);
        assert_eq!(cipher.open(3, &ciphertext, &tag).unwrap(), plaintext);
    }

    #[test]
    fn test_nonce_changes_ciphertext() {
        let cipher = FrameCipher::new(&key(7));
        let (a, _) = cipher.seal(1, b"same plaintext").unwrap();
        let (b, _) = cipher.seal(2, b"same plaintext").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_rejected() {
        let (ciphertext, tag) = FrameCipher::new(&key(1)).seal(0, b"payload").unwrap();
        let other = FrameCipher::new(&key(2));
        assert!(matches!(
            other.open(0, &ciphertext, &tag),
            Err(StoreError::Decryption(_))
        ));
        assert_ne!(FrameCipher::new(&key(1)).key_check(), other.key_check());
    }

    #[test]
    fn test_tampering_rejected() {
        let cipher = FrameCipher::new(&key(1));
        let (mut ciphertext, mut tag) = cipher.seal(9, b"payload").unwrap();
        ciphertext[0] ^= 0x01;
        assert!(cipher.open(9, &ciphertext, &tag).is_err());

        ciphertext[0] ^= 0x01;
        assert!(cipher.open(10, &ciphertext, &tag).is_err(), "nonce is authenticated");

        tag[TAG_LEN - 1] ^= 0x80;
        assert!(matches!(
            cipher.open(9, &ciphertext, &tag),
            Err(StoreError::Decryption(_))
        ));
    }

    #[test]
    fn test_ciphertext_matches_plaintext_length() {
        let cipher = FrameCipher::new(&key(3));
        let (ciphertext, _) = cipher.seal(0, &[0u8; 333]).unwrap();
        assert_eq!(ciphertext.len(), 333);
    }

    #[test]
    fn test_second_key_half_only_changes_key_check() {
        let a = key(1);
        let mut bytes = *a.as_bytes();
        bytes[ENCRYPTION_KEY_LEN - 1] ^= 0xFF;
        let b = EncryptionKey::new(bytes);

        let (ciphertext, tag) = FrameCipher::new(&a).seal(4, b"payload").unwrap();
        assert_eq!(
            FrameCipher::new(&b).open(4, &ciphertext, &tag).unwrap(),
            b"payload"
        );
        assert_ne!(FrameCipher::new(&a).key_check(), FrameCipher::new(&b).key_check());
    }

    #[test]
    fn test_debug_redacts_key() {
        assert_eq!(format!("{:?}", key(0)), "EncryptionKey(<redacted>)");
    }
}
