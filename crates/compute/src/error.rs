//! Error types for confidential-compute operations.

use thiserror::Error;

use cbid_types::Handle;

/// Errors that can occur in the confidential-compute layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputeError {
    #[error("Ciphertext not found for handle {0}")]
    CiphertextNotFound(Handle),

    #[error("Not allowed to decrypt handle {0}")]
    NotAllowed(Handle),

    #[error("Unsupported input type {0}")]
    UnsupportedInputType(u8),

    #[error("Malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    #[error("Ciphertext authentication failed")]
    AuthenticationFailed,

    #[error("Encrypted subtraction would underflow")]
    Underflow,

    #[error("Encrypted addition would overflow")]
    Overflow,

    #[error("Operand {0} is not an encrypted boolean")]
    NotABoolean(Handle),

    #[error("Allowance address does not match handle and grantee")]
    AllowanceAddressMismatch,

    #[error("Key derivation failed")]
    KeyDerivationFailed,
}
