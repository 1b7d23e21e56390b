//! Asset layers consumed by the auction program.
//!
//! - `confidential`: token accounts whose balances are ciphertext handles
//! - `custody`: plaintext holdings of the auctioned asset
//! - `error`: error types

pub mod confidential;
pub mod custody;
pub mod error;

pub use confidential::{ConfidentialAccount, ConfidentialMint, ConfidentialTokenLedger};
pub use custody::AssetLedger;
pub use error::TokenError;

/// Result type for token operations.
pub type TokenResult<T> = Result<T, TokenError>;
