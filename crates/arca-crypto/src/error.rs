/// Errors from checksum operations.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ChecksumError {
    /// The checksum type is not registered.
    #[error("unknown checksum type: {0}")]
    UnknownType(String),

    /// A freshly computed checksum did not match the expected value.
    #[error("checksum mismatch ({checksum_type}): expected {expected}, computed {computed}")]
    Mismatch {
        checksum_type: String,
        expected: String,
        computed: String,
    },

    /// A checksum value was supplied for a disabled checksum type.
    #[error("checksum value supplied but checksum type is DISABLED")]
    ValueWithoutType,
}
