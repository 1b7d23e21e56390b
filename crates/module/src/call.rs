//! Call message types for the auction module.

use borsh::{BorshDeserialize, BorshSerialize};

use cbid_types::rpc::{
    auction_kind_name, parse_address, parse_auction_kind, parse_bytes, CallRpc, WireError,
};
use cbid_types::{Address, AuctionKind};

/// Call messages for the auction module.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum AuctionCall {
    /// Open an auction and escrow the asset.
    CreateAuction {
        auction_id: u64,
        asset: Address,
        bid_mint: Address,
        start_time: u64,
        end_time: u64,
        reserve_price: u64,
        kind: AuctionKind,
        quantity: u64,
    },

    /// Submit (or top up) an encrypted bid.
    PlaceBid {
        auction: Address,
        ciphertext: Vec<u8>,
        input_type: u8,
    },

    /// Compute the signer's encrypted winner flag.
    CheckWinner { auction: Address, input_type: u8 },

    /// Stop accepting bids (organizer only).
    CloseAuction { auction: Address },
}

impl AuctionCall {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            AuctionCall::CreateAuction { .. } => "create_auction",
            AuctionCall::PlaceBid { .. } => "place_bid",
            AuctionCall::CheckWinner { .. } => "check_winner",
            AuctionCall::CloseAuction { .. } => "close_auction",
        }
    }

    /// Whether executing this call produces handles that need allowances.
    pub fn produces_handles(&self) -> bool {
        matches!(
            self,
            AuctionCall::PlaceBid { .. } | AuctionCall::CheckWinner { .. }
        )
    }
}

impl TryFrom<CallRpc> for AuctionCall {
    type Error = WireError;

    fn try_from(call: CallRpc) -> Result<Self, Self::Error> {
        Ok(match call {
            CallRpc::CreateAuction {
                auction_id,
                asset,
                bid_mint,
                start_time,
                end_time,
                reserve_price,
                kind,
                quantity,
            } => AuctionCall::CreateAuction {
                auction_id,
                asset: parse_address("asset", &asset)?,
                bid_mint: parse_address("bid_mint", &bid_mint)?,
                start_time,
                end_time,
                reserve_price,
                kind: parse_auction_kind(&kind)?,
                quantity,
            },
            CallRpc::PlaceBid {
                auction,
                ciphertext,
                input_type,
            } => AuctionCall::PlaceBid {
                auction: parse_address("auction", &auction)?,
                ciphertext: parse_bytes("ciphertext", &ciphertext)?,
                input_type,
            },
            CallRpc::CheckWinner {
                auction,
                input_type,
            } => AuctionCall::CheckWinner {
                auction: parse_address("auction", &auction)?,
                input_type,
            },
            CallRpc::CloseAuction { auction } => AuctionCall::CloseAuction {
                auction: parse_address("auction", &auction)?,
            },
        })
    }
}

impl From<&AuctionCall> for CallRpc {
    fn from(call: &AuctionCall) -> Self {
        match call {
            AuctionCall::CreateAuction {
                auction_id,
                asset,
                bid_mint,
                start_time,
                end_time,
                reserve_price,
                kind,
                quantity,
            } => CallRpc::CreateAuction {
                auction_id: *auction_id,
                asset: hex::encode(asset),
                bid_mint: hex::encode(bid_mint),
                start_time: *start_time,
                end_time: *end_time,
                reserve_price: *reserve_price,
                kind: auction_kind_name(*kind).to_string(),
                quantity: *quantity,
            },
            AuctionCall::PlaceBid {
                auction,
                ciphertext,
                input_type,
            } => CallRpc::PlaceBid {
                auction: hex::encode(auction),
                ciphertext: hex::encode(ciphertext),
                input_type: *input_type,
            },
            AuctionCall::CheckWinner {
                auction,
                input_type,
            } => CallRpc::CheckWinner {
                auction: hex::encode(auction),
                input_type: *input_type,
            },
            AuctionCall::CloseAuction { auction } => CallRpc::CloseAuction {
                auction: hex::encode(auction),
            },
        }
    }
}
