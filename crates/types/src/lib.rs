//! Core type definitions for confidential sealed-bid auctions.
//!
//! This crate provides the shared data structures used across the auction system:
//! ciphertext handles, auction and bid records, allowance grants, and the
//! deterministic address derivations every other crate agrees on.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use std::fmt;
use std::str::FromStr;

pub mod rpc;

// =========================
// PRIMITIVES
// =========================

/// Generic address type (32 bytes)
pub type Address = [u8; 32];

/// Opaque reference to a ciphertext held by the confidential-compute layer.
///
/// Handles are write-once: an update never changes what an existing handle
/// refers to, it produces a new handle. The auction core only stores and
/// passes these around; it can never look inside one.
#[serde_as]
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct Handle(#[serde_as(as = "DisplayFromStr")] pub u128);

impl Handle {
    /// Little-endian encoding used for allowance address derivation.
    pub fn to_le_bytes(self) -> [u8; 16] {
        self.0.to_le_bytes()
    }

    /// Build a handle from the first 16 bytes of a digest.
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Self(u128::from_le_bytes(bytes))
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Handle {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u128>().map(Handle)
    }
}

/// Encoding of a client-supplied ciphertext.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum InputType {
    /// Envelope produced by the client bid cipher
    Ciphertext,
}

impl InputType {
    pub const CIPHERTEXT: u8 = 0;

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            Self::CIPHERTEXT => Some(Self::Ciphertext),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Ciphertext => Self::CIPHERTEXT,
        }
    }
}

// =========================
// AUCTION TYPES
// =========================

/// Types of auctions supported
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum AuctionKind {
    /// Winner pays their bid
    FirstPrice,

    /// Winner pays second-highest bid
    Vickrey,
}

/// Auction lifecycle status. `Open -> Closed` happens exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum AuctionStatus {
    /// Accepting bids
    Open,
    /// Bids locked, winners may be checked
    Closed,
}

/// Auction record, one per (organizer, auction_id).
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AuctionRecord {
    pub organizer: Address,
    pub auction_id: u64,

    // Assets
    pub asset_descriptor: Address,
    pub asset_quantity: u64,
    pub asset_vault_address: Address,
    pub bid_token_descriptor: Address,
    pub bid_vault_address: Address,

    // Timing
    pub start_time: u64,
    pub end_time: u64,

    // Rules
    pub reserve_price: u64,
    pub auction_kind: AuctionKind,
    pub status: AuctionStatus,

    // Confidential running state
    pub bid_count: u32,
    pub highest_bid_handle: Handle,
    pub second_highest_bid_handle: Option<Handle>,
    pub reserve_met_handle: Handle,
    /// Encrypted arrival number of the leading entry
    pub highest_bidder_timestamp: Handle,
}

impl AuctionRecord {
    /// Address of this record.
    pub fn address(&self) -> Address {
        derive_auction_address(&self.organizer, self.auction_id)
    }

    pub fn is_open(&self) -> bool {
        self.status == AuctionStatus::Open
    }
}

/// A bidder's entry in an auction, created on first bid.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BidRecord {
    pub bidder: Address,
    pub auction_ref: Address,
    pub amount_handle: Handle,
    /// Encrypted arrival number (bid count after the bid), compared against
    /// the auction's `highest_bidder_timestamp`
    pub timestamp_handle: Handle,
    pub is_winner_handle: Option<Handle>,
    pub submitted_at: u64,
}

impl BidRecord {
    pub fn address(&self) -> Address {
        derive_bid_address(&self.auction_ref, &self.bidder)
    }
}

// =========================
// ALLOWANCES
// =========================

/// Capability record authorizing `grantee` to decrypt `handle`.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AllowanceGrant {
    pub handle: Handle,
    pub grantee: Address,
}

impl AllowanceGrant {
    pub fn address(&self) -> Address {
        derive_allowance_address(self.handle, &self.grantee)
    }
}

/// Extra writable input supplied on a committing call: where to store the
/// allowance, and who it is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AllowanceInput {
    pub allowance_address: Address,
    pub grantee: Address,
}

impl AllowanceInput {
    pub fn for_handle(handle: Handle, grantee: Address) -> Self {
        Self {
            allowance_address: derive_allowance_address(handle, &grantee),
            grantee,
        }
    }
}

// =========================
// ADDRESS DERIVATION
// =========================

fn derive(domain: &[u8], parts: &[&[u8]]) -> Address {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(domain);
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Address of the auction record for (organizer, auction_id).
pub fn derive_auction_address(organizer: &Address, auction_id: u64) -> Address {
    derive(b"CBID_AUCTION_V1:", &[organizer, &auction_id.to_le_bytes()])
}

/// Address of the confidential escrow account holding bids.
pub fn derive_bid_vault_address(organizer: &Address, auction_id: u64) -> Address {
    derive(b"CBID_BID_VAULT_V1:", &[organizer, &auction_id.to_le_bytes()])
}

/// Address of the custody account holding the auctioned asset.
pub fn derive_asset_vault_address(auction: &Address) -> Address {
    derive(b"CBID_ASSET_VAULT_V1:", &[auction])
}

/// Address of a bidder's record within an auction.
pub fn derive_bid_address(auction: &Address, bidder: &Address) -> Address {
    derive(b"CBID_BID_V1:", &[auction, bidder])
}

/// Storage location of the allowance for (handle, grantee).
pub fn derive_allowance_address(handle: Handle, grantee: &Address) -> Address {
    derive(b"CBID_ALLOWANCE_V1:", &[&handle.to_le_bytes(), grantee])
}

/// Confidential token account of `owner` for `mint`.
pub fn derive_token_account_address(owner: &Address, mint: &Address) -> Address {
    derive(b"CBID_TOKEN_ACCOUNT_V1:", &[owner, mint])
}

/// Compute SHA-256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    Sha256::digest(data).into()
}
