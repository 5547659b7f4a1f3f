//! The SSV envelope: one encrypted filename plus one encrypted payload
//!
//! The binary format is (all integers big-endian, offsets absolute):
//! - version: 4 bytes (currently 1)
//! - payload salt: 16 bytes
//! - payload IV: 16 bytes
//! - filename salt: 16 bytes
//! - filename IV: 16 bytes
//! - filename ciphertext length N: 4 bytes
//! - filename ciphertext: N bytes
//! - payload ciphertext: remainder
//!
//! The two fields are sealed independently by [`crate::cipher`], each with
//! its own salt and IV.

use crate::cipher::{self, IV_LEN, Iv, SALT_LEN, Salt, Sealed};
use crate::error::{ErrorCategory, ErrorKind, Result, SsvError};
use crate::key::SecretKey;
use tracing::debug;

/// The only envelope version this codec reads or writes
pub const FORMAT_VERSION: u32 = 1;

const VERSION_OFFSET: usize = 0;
const SALT_OFFSET: usize = VERSION_OFFSET + 4;
const IV_OFFSET: usize = SALT_OFFSET + SALT_LEN;
const FILENAME_SALT_OFFSET: usize = IV_OFFSET + IV_LEN;
const FILENAME_IV_OFFSET: usize = FILENAME_SALT_OFFSET + SALT_LEN;
const FILENAME_LEN_OFFSET: usize = FILENAME_IV_OFFSET + IV_LEN;

/// Size of the fixed header preceding the filename ciphertext
pub const HEADER_LEN: usize = FILENAME_LEN_OFFSET + 4;

/// Salt and IV for one field, for producing reproducible envelopes in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldParams {
    pub salt: Salt,
    pub iv: Iv,
}

/// Everything about an envelope that can be learned without the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub salt: Salt,
    pub iv: Iv,
    pub filename_salt: Salt,
    pub filename_iv: Iv,
    pub filename_ciphertext_len: usize,
    pub payload_ciphertext_len: usize,
}

/// A successfully opened envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub payload: Vec<u8>,
    pub filename: String,
}

impl Header {
    /// Parse and validate the fixed header of an envelope.
    ///
    /// Checks that the header is complete, that the version is supported,
    /// and that the filename ciphertext fits in the buffer.
    pub fn parse(envelope: &[u8]) -> Result<Self> {
        if envelope.len() < HEADER_LEN {
            return Err(SsvError::format(format!(
                "input likely truncated: {} bytes is shorter than the {}-byte header",
                envelope.len(),
                HEADER_LEN
            )));
        }

        let version = u32::from_be_bytes(read_array(envelope, VERSION_OFFSET));
        if version != FORMAT_VERSION {
            return Err(SsvError::with_kind(
                ErrorCategory::User,
                ErrorKind::UnsupportedVersion,
                format!("unsupported envelope version {version} (expected {FORMAT_VERSION})"),
            ));
        }

        let filename_len = u32::from_be_bytes(read_array(envelope, FILENAME_LEN_OFFSET));
        let available = envelope.len() - HEADER_LEN;
        let filename_ciphertext_len = usize::try_from(filename_len)
            .ok()
            .filter(|&n| n <= available)
            .ok_or_else(|| {
                SsvError::format(format!(
                    "truncated or corrupt input; filename length {filename_len} exceeds the {available} bytes after the header"
                ))
            })?;

        Ok(Self {
            version,
            salt: read_array(envelope, SALT_OFFSET),
            iv: read_array(envelope, IV_OFFSET),
            filename_salt: read_array(envelope, FILENAME_SALT_OFFSET),
            filename_iv: read_array(envelope, FILENAME_IV_OFFSET),
            filename_ciphertext_len,
            payload_ciphertext_len: available - filename_ciphertext_len,
        })
    }
}

/// Copy a fixed-size field out of a buffer already known to be long enough.
fn read_array<const N: usize>(buf: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[offset..offset + N]);
    out
}

/// Seal a payload and its original filename into an envelope
pub fn encode(payload: &[u8], filename: &str, key: &SecretKey) -> Result<Vec<u8>> {
    let sealed_filename = cipher::encrypt(filename.as_bytes(), key);
    let sealed_payload = cipher::encrypt(payload, key);

    assemble(&sealed_payload, &sealed_filename)
}

/// Seal an envelope using caller-provided salts and IVs
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `encode()`.
pub fn encode_deterministic(
    payload: &[u8],
    filename: &str,
    key: &SecretKey,
    payload_params: &FieldParams,
    filename_params: &FieldParams,
) -> Result<Vec<u8>> {
    let sealed_filename = cipher::encrypt_deterministic(
        filename.as_bytes(),
        key,
        &filename_params.salt,
        &filename_params.iv,
    );
    let sealed_payload =
        cipher::encrypt_deterministic(payload, key, &payload_params.salt, &payload_params.iv);

    assemble(&sealed_payload, &sealed_filename)
}

fn assemble(payload: &Sealed, filename: &Sealed) -> Result<Vec<u8>> {
    let filename_len = u32::try_from(filename.ciphertext.len()).map_err(|_| {
        SsvError::format(format!(
            "encrypted filename of {} bytes does not fit the 32-bit length field",
            filename.ciphertext.len()
        ))
    })?;

    let mut output =
        Vec::with_capacity(HEADER_LEN + filename.ciphertext.len() + payload.ciphertext.len());
    output.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
    output.extend_from_slice(&payload.salt);
    output.extend_from_slice(&payload.iv);
    output.extend_from_slice(&filename.salt);
    output.extend_from_slice(&filename.iv);
    output.extend_from_slice(&filename_len.to_be_bytes());
    output.extend_from_slice(&filename.ciphertext);
    output.extend_from_slice(&payload.ciphertext);

    debug!(
        envelope_len = output.len(),
        filename_ciphertext_len = filename.ciphertext.len(),
        payload_ciphertext_len = payload.ciphertext.len(),
        "assembled envelope"
    );

    Ok(output)
}

/// Open an envelope, returning the payload and its original filename
///
/// Either both fields decrypt or nothing is returned.
pub fn decode(envelope: &[u8], key: &SecretKey) -> Result<Decoded> {
    let header = Header::parse(envelope)?;
    debug!(
        version = header.version,
        filename_ciphertext_len = header.filename_ciphertext_len,
        payload_ciphertext_len = header.payload_ciphertext_len,
        "parsed envelope header"
    );

    let filename_end = HEADER_LEN + header.filename_ciphertext_len;
    let filename_ciphertext = &envelope[HEADER_LEN..filename_end];
    let payload_ciphertext = &envelope[filename_end..];

    let filename_bytes = cipher::decrypt(
        filename_ciphertext,
        &header.filename_salt,
        &header.filename_iv,
        key,
    )
    .map_err(|e| e.with_context("failed to decrypt filename"))?;
    let filename = String::from_utf8(filename_bytes).map_err(|e| {
        SsvError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Decryption,
            "decrypted filename is not valid UTF-8: wrong secret or corrupt input",
            e,
        )
    })?;

    let payload = cipher::decrypt(payload_ciphertext, &header.salt, &header.iv, key)
        .map_err(|e| e.with_context("failed to decrypt payload"))?;

    Ok(Decoded { payload, filename })
}
