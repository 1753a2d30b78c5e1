use std::collections::BTreeMap;
use std::sync::Arc;

use sha2::Digest;

use crate::error::ChecksumError;

/// Checksum type meaning "no checksum is kept".
pub const DISABLED_TYPE: &str = "DISABLED";

/// Checksum type alias that resolves to the registry's configured default.
pub const DEFAULT_TYPE: &str = "DEFAULT";

/// A named checksum algorithm producing lowercase hex digests.
pub trait ChecksumAlgorithm: Send + Sync {
    /// Registry name, e.g. `"SHA-256"`. Matched case-insensitively.
    fn name(&self) -> &str;

    /// Digest `data` and return the lowercase hex encoding.
    fn digest_hex(&self, data: &[u8]) -> String;
}

macro_rules! digest_algorithm {
    ($ty:ident, $name:literal, $hasher:path) => {
        #[doc = concat!("`", $name, "` checksum.")]
        pub struct $ty;

        impl ChecksumAlgorithm for $ty {
            fn name(&self) -> &str {
                $name
            }

            fn digest_hex(&self, data: &[u8]) -> String {
                hex::encode(<$hasher>::digest(data))
            }
        }
    };
}

digest_algorithm!(Sha1, "SHA-1", sha1::Sha1);
digest_algorithm!(Sha256, "SHA-256", sha2::Sha256);
digest_algorithm!(Sha384, "SHA-384", sha2::Sha384);
digest_algorithm!(Sha512, "SHA-512", sha2::Sha512);

/// `BLAKE3` checksum (unkeyed, 256-bit).
pub struct Blake3;

impl ChecksumAlgorithm for Blake3 {
    fn name(&self) -> &str {
        "BLAKE3"
    }

    fn digest_hex(&self, data: &[u8]) -> String {
        blake3::hash(data).to_hex().to_string()
    }
}

/// Registry of checksum algorithms keyed by uppercase name.
///
/// `DISABLED` is always known and computes nothing. `DEFAULT` resolves to
/// the configured default type.
#[derive(Clone)]
pub struct ChecksumRegistry {
    algorithms: BTreeMap<String, Arc<dyn ChecksumAlgorithm>>,
    default_type: String,
}

impl ChecksumRegistry {
    /// An empty registry whose default is `DISABLED`.
    pub fn empty() -> Self {
        Self {
            algorithms: BTreeMap::new(),
            default_type: DISABLED_TYPE.to_string(),
        }
    }

    /// Registry with SHA-1, SHA-256, SHA-384, SHA-512 and BLAKE3.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(Sha1));
        registry.register(Arc::new(Sha256));
        registry.register(Arc::new(Sha384));
        registry.register(Arc::new(Sha512));
        registry.register(Arc::new(Blake3));
        registry
    }

    /// Add or replace an algorithm.
    pub fn register(&mut self, algorithm: Arc<dyn ChecksumAlgorithm>) {
        self.algorithms
            .insert(algorithm.name().to_ascii_uppercase(), algorithm);
    }

    /// Set the type that `DEFAULT` resolves to.
    pub fn set_default_type(&mut self, checksum_type: &str) -> Result<(), ChecksumError> {
        let resolved = self.resolve(checksum_type)?;
        self.default_type = resolved;
        Ok(())
    }

    pub fn default_type(&self) -> &str {
        &self.default_type
    }

    /// Registered names, sorted, without `DISABLED`.
    pub fn names(&self) -> Vec<&str> {
        self.algorithms.keys().map(String::as_str).collect()
    }

    /// Resolve a caller-supplied type to its canonical registry name.
    pub fn resolve(&self, checksum_type: &str) -> Result<String, ChecksumError> {
        let upper = checksum_type.trim().to_ascii_uppercase();
        if upper == DEFAULT_TYPE {
            return Ok(self.default_type.clone());
        }
        if upper == DISABLED_TYPE || self.algorithms.contains_key(&upper) {
            return Ok(upper);
        }
        Err(ChecksumError::UnknownType(checksum_type.to_string()))
    }

    /// Compute the checksum of `data`. Returns `None` for `DISABLED`.
    pub fn compute(&self, checksum_type: &str, data: &[u8]) -> Result<Option<String>, ChecksumError> {
        let resolved = self.resolve(checksum_type)?;
        if resolved == DISABLED_TYPE {
            return Ok(None);
        }
        let algorithm = self
            .algorithms
            .get(&resolved)
            .ok_or_else(|| ChecksumError::UnknownType(checksum_type.to_string()))?;
        Ok(Some(algorithm.digest_hex(data)))
    }

    /// Compute the checksum of `data` and compare it with `expected`.
    ///
    /// Comparison ignores hex case. Returns the computed checksum on match.
    pub fn verify(
        &self,
        checksum_type: &str,
        expected: &str,
        data: &[u8],
    ) -> Result<String, ChecksumError> {
        let computed = self
            .compute(checksum_type, data)?
            .ok_or(ChecksumError::ValueWithoutType)?;
        if computed.eq_ignore_ascii_case(expected.trim()) {
            Ok(computed)
        } else {
            Err(ChecksumError::Mismatch {
                checksum_type: self.resolve(checksum_type)?,
                expected: expected.to_string(),
                computed,
            })
        }
    }
}

impl Default for ChecksumRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for ChecksumRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumRegistry")
            .field("algorithms", &self.names())
            .field("default_type", &self.default_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
    const ABC_SHA1: &str = "a9993e364706816aba3e25717850c26c9cd0d89d";

    #[test]
    fn known_vectors() {
        let registry = ChecksumRegistry::with_defaults();
        assert_eq!(registry.compute("SHA-256", b"abc").unwrap().unwrap(), ABC_SHA256);
        assert_eq!(registry.compute("sha-1", b"abc").unwrap().unwrap(), ABC_SHA1);
    }

    #[test]
    fn disabled_computes_nothing() {
        let registry = ChecksumRegistry::with_defaults();
        assert_eq!(registry.compute("DISABLED", b"abc").unwrap(), None);
        assert_eq!(
            registry.verify("DISABLED", "x", b"abc").unwrap_err(),
            ChecksumError::ValueWithoutType
        );
    }

    #[test]
    fn default_alias_follows_configuration() {
        let mut registry = ChecksumRegistry::with_defaults();
        assert_eq!(registry.resolve("DEFAULT").unwrap(), "DISABLED");
        registry.set_default_type("sha-512").unwrap();
        assert_eq!(registry.resolve("DEFAULT").unwrap(), "SHA-512");
        assert!(registry.set_default_type("CRC-7").is_err());
    }

    #[test]
    fn unknown_type_rejected() {
        let registry = ChecksumRegistry::with_defaults();
        assert!(matches!(
            registry.compute("MD2", b"abc"),
            Err(ChecksumError::UnknownType(_))
        ));
    }

    #[test]
    fn verify_ignores_hex_case() {
        let registry = ChecksumRegistry::with_defaults();
        let upper = ABC_SHA256.to_ascii_uppercase();
        assert_eq!(registry.verify("SHA-256", &upper, b"abc").unwrap(), ABC_SHA256);
    }

    #[test]
    fn verify_reports_mismatch() {
        let registry = ChecksumRegistry::with_defaults();
        let err = registry.verify("SHA-256", "deadbeef", b"abc").unwrap_err();
        match err {
            ChecksumError::Mismatch { computed, .. } => assert_eq!(computed, ABC_SHA256),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn custom_algorithm_can_be_registered() {
        struct Length;
        impl ChecksumAlgorithm for Length {
            fn name(&self) -> &str {
                "Length"
            }
            fn digest_hex(&self, data: &[u8]) -> String {
                format!("{:x}", data.len())
            }
        }

        let mut registry = ChecksumRegistry::empty();
        registry.register(Arc::new(Length));
        assert_eq!(registry.compute("LENGTH", b"0123456789").unwrap().unwrap(), "a");
        assert_eq!(registry.names(), vec!["LENGTH"]);
    }

    #[test]
    fn blake3_matches_reference() {
        let registry = ChecksumRegistry::with_defaults();
        let expected = blake3::hash(b"abc").to_hex().to_string();
        assert_eq!(registry.compute("BLAKE3", b"abc").unwrap().unwrap(), expected);
    }
}
