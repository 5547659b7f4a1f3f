//! ssvbox - secret-keyed file envelopes
//!
//! An envelope bundles a file's bytes with its original filename, each
//! encrypted separately under a key stretched from one shared secret.
//! [`codec::encode`] and [`codec::decode`] are the whole contract; the
//! remaining modules load configuration, read the secret, and move
//! envelopes to and from disk.
//!
//! ```no_run
//! use ssvbox::{codec, key::SecretKey};
//!
//! let key = SecretKey::derive("test-secret");
//! let envelope = codec::encode(b"hello world", "a.txt", &key)?;
//! let decoded = codec::decode(&envelope, &key)?;
//! assert_eq!(decoded.filename, "a.txt");
//! # Ok::<(), ssvbox::error::SsvError>(())
//! ```

#![forbid(unsafe_code)]

pub mod cipher;
pub mod codec;
pub mod config;
pub mod error;
pub mod file_ops;
pub mod key;
pub mod secret;
