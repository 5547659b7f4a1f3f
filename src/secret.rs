//! Obtaining the shared secret at runtime

use crate::config::SECRET_KEY_VAR;
use crate::error::{ErrorCategory, ErrorKind, Result, SsvError};
use std::io::{self, IsTerminal, Read, Write};
use zeroize::Zeroizing;

/// Trait for reading the shared secret from various sources
pub trait SecretReader {
    /// Read the secret as arbitrary bytes (not necessarily UTF-8)
    ///
    /// Returns the secret wrapped in `Zeroizing` to ensure it is securely
    /// wiped from memory when dropped.
    fn read_secret(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

/// Returns a fixed secret (for testing)
pub struct ConstantSecretReader {
    secret: Zeroizing<Vec<u8>>,
}

impl ConstantSecretReader {
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret: Zeroizing::new(secret),
        }
    }
}

impl SecretReader for ConstantSecretReader {
    fn read_secret(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new((*self.secret).clone()))
    }
}

/// Reads the secret from any io::Read source
///
/// A single trailing newline (`\n` or `\r\n`) is dropped so that
/// `echo "$SECRET" | ssv ...` behaves like typing it at the prompt.
pub struct ReaderSecretReader {
    reader: Box<dyn Read>,
}

impl ReaderSecretReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl SecretReader for ReaderSecretReader {
    fn read_secret(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut data).map_err(|e| {
            SsvError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("error reading secret: {}", e),
                e,
            )
        })?;
        if data.last() == Some(&b'\n') {
            data.pop();
            if data.last() == Some(&b'\r') {
                data.pop();
            }
        }
        Ok(data)
    }
}

/// Reads the secret from terminal with no echo
#[derive(Default)]
pub struct TerminalSecretReader;

impl SecretReader for TerminalSecretReader {
    /// Read the secret from the terminal.
    ///
    /// Note: Terminal input is limited to UTF-8 due to rpassword library constraints.
    /// For non-UTF-8 secrets, use --secret-stdin instead.
    fn read_secret(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if !io::stdin().is_terminal() {
            return Err(SsvError::with_kind(
                ErrorCategory::User,
                ErrorKind::SecretUnavailable,
                format!(
                    "cannot read secret from terminal - stdin is not a terminal; \
                     use --secret-stdin or set {SECRET_KEY_VAR}"
                ),
            ));
        }

        io::stderr().write_all(b"Secret (ssv): ").map_err(|e| {
            SsvError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to write prompt: {}", e),
                e,
            )
        })?;
        io::stderr().flush().map_err(|e| {
            SsvError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to flush prompt: {}", e),
                e,
            )
        })?;

        // Read secret *without echo*
        // Note: rpassword returns String (UTF-8 only), not zeroized
        let secret = rpassword::read_password().map_err(|e| {
            SsvError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::SecretUnavailable,
                format!("failure reading secret: {}", e),
                e,
            )
        })?;

        Ok(Zeroizing::new(secret.into_bytes()))
    }
}
