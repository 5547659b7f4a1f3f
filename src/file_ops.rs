//! Sealing and opening envelope files on disk
//!
//! This module provides high-level file operations for sealing a file into
//! an envelope, opening one back into its original name and content,
//! replacing an envelope's content in place, and inspecting its header.

use crate::codec::{self, Header};
use crate::config::Limits;
use crate::error::{ErrorCategory, ErrorKind, Result, SsvError};
use crate::key::SecretKey;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Where an opened envelope's content should be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Write to exactly this path.
    File(PathBuf),
    /// Write into this directory under the envelope's original filename.
    Directory(PathBuf),
}

/// Seal a file into an envelope
///
/// Reads plaintext from `input_path`, embeds the final component of
/// `input_path` as the original filename, and writes the envelope to
/// `output_path`. Inputs larger than `limits.max_file_size` are refused
/// before being read into memory.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn seal_file(
    input_path: &Path,
    output_path: &Path,
    key: &SecretKey,
    limits: &Limits,
) -> Result<()> {
    let filename = embedded_name(input_path)?;
    let plaintext = read_limited(input_path, limits.max_file_size)?;
    let envelope = codec::encode(&plaintext, filename, key)
        .map_err(|e| e.with_context("failed to seal"))?;
    write_file_secure(output_path, &envelope)
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;

    info!(
        input = %input_path.display(),
        output = %output_path.display(),
        plaintext_len = plaintext.len(),
        envelope_len = envelope.len(),
        "sealed file"
    );
    Ok(())
}

/// Open an envelope file
///
/// Decodes the envelope at `input_path` and writes the content to
/// `destination`. Returns the original filename stored in the envelope and
/// the path actually written. Envelopes larger than
/// `limits.max_envelope_size()` are refused before being read into memory.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn open_file(
    input_path: &Path,
    destination: &Destination,
    key: &SecretKey,
    limits: &Limits,
) -> Result<(String, PathBuf)> {
    let envelope = read_limited(input_path, limits.max_envelope_size())?;
    let decoded = codec::decode(&envelope, key).map_err(|e| e.with_context("failed to open"))?;

    let output_path = match destination {
        Destination::File(path) => path.clone(),
        Destination::Directory(dir) => dir.join(safe_file_name(&decoded.filename)?),
    };
    write_file_secure(&output_path, &decoded.payload)
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;

    info!(
        input = %input_path.display(),
        output = %output_path.display(),
        plaintext_len = decoded.payload.len(),
        "opened envelope"
    );
    Ok((decoded.filename, output_path))
}

/// Replace an envelope's content with new plaintext under the same secret
///
/// This function:
/// 1. Opens the existing envelope at `envelope_path` to validate the secret
/// 2. Reads new plaintext from `plain_path`
/// 3. Seals the new plaintext, embedding the file name of `plain_path`
/// 4. Atomically writes to `envelope_path` (tempfile + fsync + rename)
///
/// The atomic write ensures that either the old file or the new file exists,
/// never a partial/corrupted file.
///
/// Validating against the existing envelope prevents accidentally re-sealing
/// under a different secret.
pub fn update_file(
    plain_path: &Path,
    envelope_path: &Path,
    key: &SecretKey,
    limits: &Limits,
) -> Result<()> {
    let envelope = read_limited(envelope_path, limits.max_envelope_size())?;

    // Validate the secret by opening the existing envelope (discard plaintext)
    codec::decode(&envelope, key).map_err(|e| e.with_context("failed to open"))?;

    // Great, let's re-write it (atomically).
    let envelope_dir = match envelope_path.parent() {
        Some(dir) if dir.as_os_str().is_empty() => Path::new("."),
        Some(dir) => dir,
        None => {
            return Err(SsvError::with_kind(
                ErrorCategory::User,
                ErrorKind::Io,
                "envelope path has no parent directory",
            ));
        }
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(envelope_dir).map_err(|e| {
        SsvError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to create tempfile",
            e,
        )
    })?;
    let filename = embedded_name(plain_path)?;
    let new_plaintext = read_limited(plain_path, limits.max_file_size)?;
    let new_envelope = codec::encode(&new_plaintext, filename, key)
        .map_err(|e| e.with_context("failed to seal"))?;

    temp_file.write_all(&new_envelope).map_err(|e| {
        SsvError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to write to tempfile",
            e,
        )
    })?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file.flush().map_err(|e| {
        SsvError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to flush tempfile",
            e,
        )
    })?;
    temp_file.as_file().sync_all().map_err(|e| {
        SsvError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    // Atomically rename temp file to target (persist with restrictive permissions)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                SsvError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to set tempfile permissions",
                    e,
                )
            })?;
    }
    temp_file.persist(envelope_path).map_err(|e| {
        SsvError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", envelope_path.display()),
            e,
        )
    })?;

    info!(
        input = %plain_path.display(),
        envelope = %envelope_path.display(),
        envelope_len = new_envelope.len(),
        "updated envelope"
    );
    Ok(())
}

/// Read and validate an envelope's header without the secret
pub fn inspect_file(input_path: &Path, limits: &Limits) -> Result<Header> {
    let envelope = read_limited(input_path, limits.max_envelope_size())?;
    Header::parse(&envelope).map_err(|e| e.with_context("failed to inspect"))
}

/// The filename to embed for `path`: its final component, as UTF-8.
fn embedded_name(path: &Path) -> Result<&str> {
    let name = path.file_name().ok_or_else(|| {
        SsvError::with_kind(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("{} does not name a file", path.display()),
        )
    })?;
    name.to_str().ok_or_else(|| {
        SsvError::with_kind(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("file name of {} is not valid UTF-8", path.display()),
        )
    })
}

/// Reduce a stored filename to a single safe path component.
///
/// Envelopes may come from anywhere; a stored name such as `../../.bashrc`
/// must not escape the output directory.
fn safe_file_name(stored: &str) -> Result<&OsStr> {
    // Names may have been recorded on another OS; split on both separators.
    let last = stored
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(stored);
    match Path::new(last).components().next_back() {
        Some(Component::Normal(name)) => {
            if last != stored {
                debug!(stored, used = last, "stripped directories from stored filename");
            }
            Ok(name)
        }
        _ => Err(SsvError::with_kind(
            ErrorCategory::User,
            ErrorKind::Format,
            format!("stored filename {stored:?} cannot be used as an output file name"),
        )),
    }
}

/// Read a whole file, refusing anything longer than `max_len` bytes.
fn read_limited(path: &Path, max_len: u64) -> Result<Vec<u8>> {
    let file = File::open(path).map_err(|e| read_error(path, e))?;
    let size = file.metadata().map_err(|e| read_error(path, e))?.len();
    if size > max_len {
        return Err(too_large(path, max_len));
    }

    // The file may grow between the metadata call and the read.
    let mut data = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
    file.take(max_len.saturating_add(1))
        .read_to_end(&mut data)
        .map_err(|e| read_error(path, e))?;
    if data.len() as u64 > max_len {
        return Err(too_large(path, max_len));
    }
    Ok(data)
}

fn too_large(path: &Path, max_len: u64) -> SsvError {
    SsvError::with_kind(
        ErrorCategory::User,
        ErrorKind::InputTooLarge,
        format!(
            "{} exceeds the maximum input size of {} bytes",
            path.display(),
            max_len
        ),
    )
}

/// Write file with secure permissions (0o600 on Unix)
fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| {
                SsvError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::Io,
                    format!("failed to open {}", path.display()),
                    e,
                )
            })?;

        file.write_all(contents).map_err(|e| {
            SsvError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents).map_err(|e| {
            SsvError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Io,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }
}

fn read_error(path: &Path, err: io::Error) -> SsvError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    SsvError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}
