//! Error types for cipher-state operations

use thiserror::Error;

/// Errors from cipher-state operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherStateError {
    /// Key material has the wrong length for the configured suite
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length in bytes
        expected: usize,
        /// Actual key length in bytes
        actual: usize,
    },

    /// Nonce has the wrong length for the configured suite
    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength {
        /// Expected nonce length in bytes
        expected: usize,
        /// Actual nonce length in bytes
        actual: usize,
    },

    /// Output buffer cannot hold the result of the operation
    #[error("output buffer too small: need {needed}, got {actual}")]
    OutputBufferTooSmall {
        /// Bytes the operation would write
        needed: usize,
        /// Bytes available in the output buffer
        actual: usize,
    },

    /// Ciphertext is shorter than the authentication tag
    #[error("ciphertext too short: need at least {min}, got {actual}")]
    CiphertextTooShort {
        /// Minimum ciphertext length (the tag length)
        min: usize,
        /// Actual ciphertext length
        actual: usize,
    },

    /// The message counter has reached its maximum value.
    /// The session must rekey or be torn down; the state is unchanged.
    #[error("nonce overflow: message counter exhausted for this key")]
    NonceOverflow,

    /// Authentication tag verification failed during decryption.
    /// The output buffer must be treated as untrusted.
    #[error("authentication failed: tag verification rejected the message")]
    AuthenticationFailed,
}

impl CipherStateError {
    /// Returns true if this error is fatal (unrecoverable)
    ///
    /// Fatal errors indicate a caller defect or a tampered message.
    /// `NonceOverflow` is the one recoverable case: the protocol may
    /// ratchet the key and continue.
    pub fn is_fatal(&self) -> bool {
        match self {
            // Caller programming defects - fatal
            Self::InvalidKeyLength { .. } => true,
            Self::InvalidNonceLength { .. } => true,
            Self::OutputBufferTooSmall { .. } => true,
            Self::CiphertextTooShort { .. } => true,

            // Tampered or replayed message - fatal
            Self::AuthenticationFailed => true,

            // Recoverable at a protocol rekey boundary
            Self::NonceOverflow => false,
        }
    }
}
