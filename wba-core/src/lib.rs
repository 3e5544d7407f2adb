//! Protocol layer for the `did:wba` agent interoperability runtime.
//!
//! This crate is pure: no file I/O, no network I/O. It implements:
//! - [`crypto`]: secp256k1 / Ed25519 sign & verify, DER<->R|S, base64url encoding
//! - [`did`]: DID string parsing and formatting
//! - [`document`]: DID document types and public-key extraction
//! - [`payload`]: the canonical JCS-signed payload
//! - [`header`]: Authorization header parsing/building for all four schemes

pub mod crypto;
pub mod did;
pub mod document;
pub mod error;
pub mod header;
pub mod payload;

pub use error::{CryptoError, ProtocolError};

/// A type alias for a boxed error that is thread-safe and sendable across threads.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
