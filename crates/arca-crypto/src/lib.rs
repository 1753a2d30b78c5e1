//! Content checksums for the Arca repository.
//!
//! Checksum types are opaque strings (`"SHA-256"`, `"BLAKE3"`, ...) resolved
//! against a [`ChecksumRegistry`]. The registry ships with the common
//! algorithms and accepts additional implementations of
//! [`ChecksumAlgorithm`] at construction time.
//!
//! All crypto operations wrap established libraries. No custom cryptography.

pub mod checksum;
pub mod error;

pub use checksum::{
    Blake3, ChecksumAlgorithm, ChecksumRegistry, Sha1, Sha256, Sha384, Sha512, DEFAULT_TYPE,
    DISABLED_TYPE,
};
pub use error::ChecksumError;
