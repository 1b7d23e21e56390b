//! JSON-RPC wire types shared by the mock ledger and the CLI.
//!
//! Addresses and byte strings travel hex-encoded, handles as decimal strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Address, AuctionKind, AuctionRecord, AuctionStatus, BidRecord, Handle};

/// Errors decoding wire values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("Invalid hex in {field}: {reason}")]
    InvalidHex { field: &'static str, reason: String },

    #[error("{field} must be {expected} bytes, got {got}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Unknown auction kind: {0}")]
    UnknownAuctionKind(String),
}

/// Decode a hex address, with or without `0x`.
pub fn parse_address(field: &'static str, s: &str) -> Result<Address, WireError> {
    let bytes = parse_bytes(field, s)?;
    let got = bytes.len();
    bytes.try_into().map_err(|_| WireError::InvalidLength {
        field,
        expected: 32,
        got,
    })
}

pub fn parse_bytes(field: &'static str, s: &str) -> Result<Vec<u8>, WireError> {
    hex::decode(s.trim_start_matches("0x")).map_err(|e| WireError::InvalidHex {
        field,
        reason: e.to_string(),
    })
}

pub fn parse_handle(s: &str) -> Result<Handle, WireError> {
    s.parse().map_err(|_| WireError::InvalidHandle(s.to_string()))
}

pub fn parse_auction_kind(s: &str) -> Result<AuctionKind, WireError> {
    match s {
        "first_price" => Ok(AuctionKind::FirstPrice),
        "vickrey" => Ok(AuctionKind::Vickrey),
        other => Err(WireError::UnknownAuctionKind(other.to_string())),
    }
}

pub fn auction_kind_name(kind: AuctionKind) -> &'static str {
    match kind {
        AuctionKind::FirstPrice => "first_price",
        AuctionKind::Vickrey => "vickrey",
    }
}

/// Block info response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub timestamp: u64,
}

/// Auction instruction as sent over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallRpc {
    CreateAuction {
        auction_id: u64,
        /// Hex-encoded asset descriptor
        asset: String,
        /// Hex-encoded confidential mint used for bids
        bid_mint: String,
        start_time: u64,
        end_time: u64,
        reserve_price: u64,
        /// "first_price" or "vickrey"
        kind: String,
        quantity: u64,
    },
    PlaceBid {
        auction: String,
        /// Hex-encoded bid envelope
        ciphertext: String,
        input_type: u8,
    },
    CheckWinner {
        auction: String,
        input_type: u8,
    },
    CloseAuction {
        auction: String,
    },
}

/// Parameters for phase 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulateParams {
    pub sender: String,
    pub call: CallRpc,
}

/// Parameters for phase 2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitParams {
    pub sender: String,
    pub call: CallRpc,
    pub allowances: Vec<AllowanceInputRpc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowanceInputRpc {
    pub allowance_address: String,
    pub grantee: String,
}

/// A handle the simulated call would produce, with the address that needs access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictedHandleRpc {
    pub slot: String,
    pub handle: String,
    pub grantee: String,
}

/// Result of a committed call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResultRpc {
    pub outcome: String,
    pub address: Option<String>,
    pub handle: Option<String>,
}

/// Parameters for a decryption request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptParams {
    pub requester: String,
    pub handles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptResponseRpc {
    pub request_id: String,
    pub plaintexts: Vec<String>,
    pub attestations: Vec<String>,
}

/// Auction record for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionRecordRpc {
    pub address: String,
    pub organizer: String,
    pub auction_id: u64,
    pub asset: String,
    pub asset_quantity: u64,
    pub bid_mint: String,
    pub bid_vault: String,
    pub start_time: u64,
    pub end_time: u64,
    pub reserve_price: u64,
    pub kind: String,
    pub status: String,
    pub bid_count: u32,
    pub highest_bid_handle: String,
    pub second_highest_bid_handle: Option<String>,
    pub reserve_met_handle: String,
}

impl From<&AuctionRecord> for AuctionRecordRpc {
    fn from(a: &AuctionRecord) -> Self {
        Self {
            address: hex::encode(a.address()),
            organizer: hex::encode(a.organizer),
            auction_id: a.auction_id,
            asset: hex::encode(a.asset_descriptor),
            asset_quantity: a.asset_quantity,
            bid_mint: hex::encode(a.bid_token_descriptor),
            bid_vault: hex::encode(a.bid_vault_address),
            start_time: a.start_time,
            end_time: a.end_time,
            reserve_price: a.reserve_price,
            kind: auction_kind_name(a.auction_kind).to_string(),
            status: match a.status {
                AuctionStatus::Open => "open",
                AuctionStatus::Closed => "closed",
            }
            .to_string(),
            bid_count: a.bid_count,
            highest_bid_handle: a.highest_bid_handle.to_string(),
            second_highest_bid_handle: a.second_highest_bid_handle.map(|h| h.to_string()),
            reserve_met_handle: a.reserve_met_handle.to_string(),
        }
    }
}

/// Bid record for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidRecordRpc {
    pub address: String,
    pub bidder: String,
    pub auction: String,
    pub amount_handle: String,
    pub is_winner_handle: Option<String>,
    pub submitted_at: u64,
}

impl From<&BidRecord> for BidRecordRpc {
    fn from(b: &BidRecord) -> Self {
        Self {
            address: hex::encode(b.address()),
            bidder: hex::encode(b.bidder),
            auction: hex::encode(b.auction_ref),
            amount_handle: b.amount_handle.to_string(),
            is_winner_handle: b.is_winner_handle.map(|h| h.to_string()),
            submitted_at: b.submitted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_accepts_prefix() {
        let hex_addr = format!("0x{}", hex::encode([5u8; 32]));
        assert_eq!(parse_address("sender", &hex_addr).unwrap(), [5u8; 32]);
    }

    #[test]
    fn test_parse_address_rejects_short_input() {
        let err = parse_address("sender", "abcd").unwrap_err();
        assert_eq!(
            err,
            WireError::InvalidLength {
                field: "sender",
                expected: 32,
                got: 2
            }
        );
    }

    #[test]
    fn test_call_rpc_tagging() {
        let call = CallRpc::CloseAuction {
            auction: "00".repeat(32),
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["type"], "close_auction");
    }

    #[test]
    fn test_auction_kind_names() {
        assert_eq!(parse_auction_kind("vickrey").unwrap(), AuctionKind::Vickrey);
        assert_eq!(
            parse_auction_kind(auction_kind_name(AuctionKind::FirstPrice)).unwrap(),
            AuctionKind::FirstPrice
        );
        assert!(parse_auction_kind("dutch").is_err());
    }
}
