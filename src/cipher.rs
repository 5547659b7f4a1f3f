//! Single-field encryption/decryption using PBKDF2 + AES-256-CBC
//!
//! Each call stretches the base key with a fresh random salt:
//! - PBKDF2-HMAC-SHA256, 100,000 rounds, 32-byte output
//! - AES-256 in CBC mode with a fresh random 16-byte IV
//! - PKCS#7 padding (1..=16 bytes, always added)
//!
//! There is no authentication tag. Padding validation on decrypt is the only
//! integrity check, so some corrupted ciphertexts decrypt "successfully" to
//! garbage.

use crate::error::{Result, SsvError};
use crate::key::{KEY_LEN, SecretKey};
use aes::Aes256;
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Length of salt in bytes
pub const SALT_LEN: usize = 16;

/// Length of IV in bytes
pub const IV_LEN: usize = 16;

/// AES block size in bytes; every ciphertext is a multiple of this
pub const BLOCK_LEN: usize = 16;

/// PBKDF2 rounds used to stretch the base key per field
pub const PBKDF2_ROUNDS: u32 = 100_000;

pub type Salt = [u8; SALT_LEN];
pub type Iv = [u8; IV_LEN];

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// One encrypted field together with the non-secret parameters needed to
/// decrypt it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub salt: Salt,
    pub iv: Iv,
}

/// Stretch the base key into a per-field key bound to `salt`.
fn derive_key(key: &SecretKey, salt: &Salt) -> Zeroizing<[u8; KEY_LEN]> {
    let mut derived = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(key.as_bytes(), salt, PBKDF2_ROUNDS, &mut derived[..]);
    derived
}

/// Length of the ciphertext produced for a plaintext of `plaintext_len` bytes.
pub const fn ciphertext_len(plaintext_len: usize) -> usize {
    (plaintext_len / BLOCK_LEN + 1) * BLOCK_LEN
}

/// Encrypt plaintext under the base key using random salt and IV
pub fn encrypt(plaintext: &[u8], key: &SecretKey) -> Sealed {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    encrypt_deterministic(plaintext, key, &salt, &iv)
}

/// Encrypt plaintext under the base key using provided salt and IV
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `encrypt()` which generates random salt/IV.
pub fn encrypt_deterministic(plaintext: &[u8], key: &SecretKey, salt: &Salt, iv: &Iv) -> Sealed {
    let derived = derive_key(key, salt);
    let cipher = Aes256CbcEnc::new(
        GenericArray::from_slice(&derived[..]),
        GenericArray::from_slice(iv),
    );
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    Sealed {
        ciphertext,
        salt: *salt,
        iv: *iv,
    }
}

/// Decrypt one field and strip its padding
pub fn decrypt(ciphertext: &[u8], salt: &Salt, iv: &Iv, key: &SecretKey) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(SsvError::decryption(format!(
            "ciphertext length {} is not a positive multiple of {}; corrupt input",
            ciphertext.len(),
            BLOCK_LEN
        )));
    }

    let derived = derive_key(key, salt);
    let cipher = Aes256CbcDec::new(
        GenericArray::from_slice(&derived[..]),
        GenericArray::from_slice(iv),
    );
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| SsvError::decryption("bad padding: wrong secret or corrupt input"))
}
