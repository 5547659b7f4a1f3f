//! Operator configuration loaded from the environment

use crate::cipher::{BLOCK_LEN, ciphertext_len};
use crate::codec::HEADER_LEN;
use crate::error::{ErrorCategory, ErrorKind, Result, SsvError};
use crate::key::SecretKey;
use std::env;
use std::fmt;
use zeroize::Zeroizing;

/// Environment variable holding the shared secret
pub const SECRET_KEY_VAR: &str = "SSV_SECRET_KEY";

/// Environment variable holding the input size cap in bytes
pub const MAX_FILE_SIZE_VAR: &str = "SSV_MAX_FILE_SIZE";

/// Default input size cap: 100 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Longest embedded filename, in bytes, an envelope read under the default
/// overhead allowance may carry
pub const MAX_FILENAME_LEN: usize = 4096;

/// Bytes an envelope may add on top of its payload: the fixed header, the
/// encrypted filename, and one block of payload padding.
pub const ENVELOPE_OVERHEAD: u64 =
    (HEADER_LEN + ciphertext_len(MAX_FILENAME_LEN) + BLOCK_LEN) as u64;

/// Limits applied to whole-file operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Largest plaintext, in bytes, that will be read into memory and sealed.
    pub max_file_size: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl Limits {
    /// Largest envelope that will be read into memory.
    ///
    /// Anything sealed under `max_file_size` with a filename of at most
    /// [`MAX_FILENAME_LEN`] bytes fits.
    pub fn max_envelope_size(&self) -> u64 {
        self.max_file_size.saturating_add(ENVELOPE_OVERHEAD)
    }
}

pub struct Config {
    secret: Option<Zeroizing<Vec<u8>>>,
    pub limits: Limits,
}

impl Config {
    pub fn new(secret: Option<Vec<u8>>, limits: Limits) -> Self {
        Self {
            secret: secret.map(Zeroizing::new),
            limits,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// - `SSV_SECRET_KEY` (optional here): the shared secret. Callers that
    ///   need a key go through [`Config::secret_key`], which rejects a
    ///   missing or empty secret.
    /// - `SSV_MAX_FILE_SIZE` (optional, default 104857600): input size cap.
    pub fn from_env() -> Result<Self> {
        let secret = env::var_os(SECRET_KEY_VAR).map(|s| s.into_encoded_bytes());

        let limits = match env::var(MAX_FILE_SIZE_VAR) {
            Ok(raw) => Limits {
                max_file_size: parse_size(&raw)?,
            },
            Err(env::VarError::NotPresent) => Limits::default(),
            Err(e) => {
                return Err(SsvError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::Configuration,
                    format!("{MAX_FILE_SIZE_VAR} is not valid unicode"),
                    e,
                ));
            }
        };

        Ok(Self::new(secret, limits))
    }

    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Derive the base key from the configured secret.
    pub fn secret_key(&self) -> Result<SecretKey> {
        match &self.secret {
            Some(secret) => secret_key_from(secret),
            None => Err(SsvError::with_kind(
                ErrorCategory::User,
                ErrorKind::Configuration,
                format!("no shared secret configured; set {SECRET_KEY_VAR}"),
            )),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("limits", &self.limits)
            .finish()
    }
}

/// Derive the base key from a secret obtained at runtime, refusing an empty one.
pub fn secret_key_from(secret: &[u8]) -> Result<SecretKey> {
    if secret.is_empty() {
        return Err(SsvError::with_kind(
            ErrorCategory::User,
            ErrorKind::Configuration,
            "shared secret is empty",
        ));
    }
    Ok(SecretKey::derive(secret))
}

fn parse_size(raw: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|e| {
        SsvError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Configuration,
            format!("{MAX_FILE_SIZE_VAR} must be a whole number of bytes, got {raw:?}"),
            e,
        )
    })
}
