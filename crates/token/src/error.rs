//! Token layer error types.

use thiserror::Error;

use cbid_compute::ComputeError;

/// Errors that can occur in the token and custody layers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Mint not found: {0}")]
    MintNotFound(String),

    #[error("Mint already exists: {0}")]
    MintExists(String),

    #[error("Token account not found: {0}")]
    AccountNotFound(String),

    #[error("Token account mint mismatch")]
    MintMismatch,

    #[error("Signer does not own the token account")]
    OwnerMismatch,

    #[error("Signer is not the mint authority")]
    NotMintAuthority,

    #[error("Insufficient confidential balance")]
    InsufficientBalance,

    #[error("Insufficient asset balance: need {required}, have {available}")]
    InsufficientAssetBalance { required: u64, available: u64 },

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Compute error: {0}")]
    Compute(#[from] ComputeError),
}
