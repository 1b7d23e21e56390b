//! Auction module error types.

use thiserror::Error;

use cbid_compute::ComputeError;
use cbid_token::TokenError;
use cbid_types::rpc::WireError;

use crate::protocol::HandleSlot;

/// Category of an [`AuctionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Signer does not re-derive to the required address
    Authorization,
    /// Outside the allowed time window
    Timing,
    /// Action invalid for the current status or records
    State,
    /// Rejected by the compute or decryption layer
    Handle,
    /// Insufficient confidential or asset balance
    Balance,
    /// Committing call diverged from its discovery run
    Protocol,
    /// Malformed arguments
    Validation,
}

/// Errors that can occur in the auction module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuctionError {
    // === Authorization ===
    #[error("Not authorized")]
    NotAuthorized,

    #[error("Signer does not own the token account")]
    TokenOwnerMismatch,

    // === Timing ===
    #[error("Start time {start} is before current time {now}")]
    StartTimeInPast { start: u64, now: u64 },

    #[error("Auction has not started yet")]
    BiddingNotStarted,

    #[error("Bidding period ended")]
    BiddingEnded,

    #[error("Auction not ended")]
    AuctionNotEnded,

    // === State ===
    #[error("Auction not found: {0}")]
    AuctionNotFound(String),

    #[error("Auction already exists: {0}")]
    AuctionExists(String),

    #[error("Auction is not open")]
    AuctionNotOpen,

    #[error("Auction must be closed")]
    AuctionNotClosed,

    #[error("Already submitted bid")]
    AlreadyBid,

    #[error("No bid from this signer")]
    BidNotFound,

    #[error("Auction reached its bid limit of {0}")]
    BidLimitReached(u32),

    // === Validation ===
    #[error("Invalid timing configuration")]
    InvalidTiming,

    #[error("Token amount must be greater than zero")]
    InvalidQuantity,

    #[error("Bid mint is not a confidential mint")]
    InvalidBidMint,

    #[error("Invalid bid amount")]
    EmptyCiphertext,

    #[error("Unsupported input type {0}")]
    UnsupportedInputType(u8),

    #[error("Math overflow")]
    MathOverflow,

    #[error("Malformed call: {0}")]
    Wire(#[from] WireError),

    #[error("Token error: {0}")]
    Token(String),

    // === Handle ===
    #[error("Compute error: {0}")]
    Compute(ComputeError),

    // === Balance ===
    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Insufficient asset balance: need {required}, have {available}")]
    InsufficientAssetBalance { required: u64, available: u64 },

    // === Protocol ===
    #[error("Expected {expected} allowance inputs, got {got}")]
    AllowanceCountMismatch { expected: usize, got: usize },

    #[error("State diverged since discovery: allowance {index} ({slot:?}) does not match")]
    StateDiverged { index: usize, slot: HandleSlot },

    #[error("Call produces handles but no discovery result was supplied")]
    MissingPrediction,
}

impl AuctionError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        use AuctionError::*;
        match self {
            NotAuthorized | TokenOwnerMismatch => ErrorKind::Authorization,
            StartTimeInPast { .. } | BiddingNotStarted | BiddingEnded | AuctionNotEnded => {
                ErrorKind::Timing
            }
            AuctionNotFound(_) | AuctionExists(_) | AuctionNotOpen | AuctionNotClosed
            | AlreadyBid | BidNotFound | BidLimitReached(_) => ErrorKind::State,
            InvalidTiming | InvalidQuantity | InvalidBidMint | EmptyCiphertext
            | UnsupportedInputType(_) | MathOverflow | Wire(_) | Token(_) => ErrorKind::Validation,
            Compute(_) => ErrorKind::Handle,
            InsufficientBalance | InsufficientAssetBalance { .. } => ErrorKind::Balance,
            AllowanceCountMismatch { .. } | StateDiverged { .. } | MissingPrediction => {
                ErrorKind::Protocol
            }
        }
    }
}

impl From<ComputeError> for AuctionError {
    fn from(e: ComputeError) -> Self {
        match e {
            ComputeError::Underflow => AuctionError::InsufficientBalance,
            ComputeError::Overflow => AuctionError::MathOverflow,
            ComputeError::UnsupportedInputType(t) => AuctionError::UnsupportedInputType(t),
            other => AuctionError::Compute(other),
        }
    }
}

impl From<TokenError> for AuctionError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::InsufficientBalance => AuctionError::InsufficientBalance,
            TokenError::InsufficientAssetBalance {
                required,
                available,
            } => AuctionError::InsufficientAssetBalance {
                required,
                available,
            },
            TokenError::OwnerMismatch => AuctionError::TokenOwnerMismatch,
            TokenError::MintMismatch | TokenError::MintNotFound(_) => AuctionError::InvalidBidMint,
            TokenError::ZeroAmount => AuctionError::InvalidQuantity,
            TokenError::Compute(inner) => inner.into(),
            other => AuctionError::Token(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbid_types::Handle;

    #[test]
    fn test_underflow_maps_to_balance() {
        let err: AuctionError = ComputeError::Underflow.into();
        assert_eq!(err, AuctionError::InsufficientBalance);
        assert_eq!(err.kind(), ErrorKind::Balance);
    }

    #[test]
    fn test_decryption_errors_are_handle_errors() {
        let err: AuctionError = ComputeError::NotAllowed(Handle(1)).into();
        assert_eq!(err.kind(), ErrorKind::Handle);
        let err: AuctionError = ComputeError::CiphertextNotFound(Handle(1)).into();
        assert_eq!(err.kind(), ErrorKind::Handle);
    }

    #[test]
    fn test_token_error_mapping() {
        let err: AuctionError = TokenError::Compute(ComputeError::Underflow).into();
        assert_eq!(err, AuctionError::InsufficientBalance);

        let err: AuctionError = TokenError::AccountNotFound("ab".into()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_protocol_kinds() {
        assert_eq!(
            AuctionError::StateDiverged {
                index: 0,
                slot: HandleSlot::HighestBid
            }
            .kind(),
            ErrorKind::Protocol
        );
        assert_eq!(AuctionError::MissingPrediction.kind(), ErrorKind::Protocol);
    }
}
