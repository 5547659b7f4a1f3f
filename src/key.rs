//! Base key derivation from the operator's shared secret
//!
//! The base key is the SHA-256 digest of the secret. It is derived once,
//! typically at startup, and then handed explicitly to every encode and
//! decode call. Per-field keys are stretched from it in [`crate::cipher`].

use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

/// Length of the base key in bytes
pub const KEY_LEN: usize = 32;

/// The 32-byte base key every envelope is sealed under.
///
/// Wiped from memory on drop. `Debug` never prints the key bytes.
#[derive(Clone)]
pub struct SecretKey(Zeroizing<[u8; KEY_LEN]>);

impl SecretKey {
    /// Derive the base key from a shared secret.
    ///
    /// Deterministic: the same secret always yields the same key. Nothing
    /// is validated here, an empty secret is hashed like any other; callers
    /// that need to refuse weak or missing secrets do so beforehand (see
    /// [`crate::config::Config::secret_key`]).
    pub fn derive(secret: impl AsRef<[u8]>) -> Self {
        let digest = Sha256::digest(secret.as_ref());
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(&digest);
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}
