//! Events emitted by the auction module.

use serde::{Deserialize, Serialize};

use cbid_types::{Address, AuctionKind};

/// Module events, appended in execution order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuctionEvent {
    AuctionCreated {
        auction: Address,
        organizer: Address,
        auction_id: u64,
        kind: AuctionKind,
        start_time: u64,
        end_time: u64,
    },
    BidPlaced {
        auction: Address,
        bidder: Address,
        bid_count: u32,
        top_up: bool,
    },
    AuctionClosed {
        auction: Address,
        bid_count: u32,
    },
    WinnerChecked {
        auction: Address,
        bidder: Address,
    },
}

impl AuctionEvent {
    /// Auction the event belongs to.
    pub fn auction(&self) -> &Address {
        match self {
            AuctionEvent::AuctionCreated { auction, .. }
            | AuctionEvent::BidPlaced { auction, .. }
            | AuctionEvent::AuctionClosed { auction, .. }
            | AuctionEvent::WinnerChecked { auction, .. } => auction,
        }
    }
}
