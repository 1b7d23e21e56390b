//! Client SDK for bidding in confidential sealed-bid auctions.
//!
//! This crate provides a high-level API for:
//! - Sealing bid amounts to the coprocessor network key
//! - Deriving allowance inputs from a discovery run
//! - Submitting calls to the mock ledger in two phases
//! - Querying auction state and requesting decryption

pub mod bid;
pub mod query;
pub mod submit;

pub use bid::{create_bid, BidBuilder, BidError, PreparedBid};
pub use query::QueryClient;
pub use submit::{allowances_for, TwoPhaseSubmitter};
