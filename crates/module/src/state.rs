//! Ledger state owned by the auction module.

use std::collections::HashMap;

use cbid_types::{derive_bid_address, Address, AuctionRecord, BidRecord};

use crate::config::ModuleConfig;
use crate::events::AuctionEvent;

/// Auction module state.
///
/// Records are keyed by their derived addresses, as they would be on a
/// ledger with program-derived accounts.
#[derive(Clone, Debug, Default)]
pub struct ModuleState {
    pub config: ModuleConfig,

    /// Auctions by address
    pub auctions: HashMap<Address, AuctionRecord>,

    /// Bids by address
    pub bids: HashMap<Address, BidRecord>,

    /// Bidders per auction, in order of first bid
    pub auction_bidders: HashMap<Address, Vec<Address>>,

    /// Emitted events
    pub events: Vec<AuctionEvent>,
}

impl ModuleState {
    pub fn new(config: ModuleConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn get_auction(&self, auction: &Address) -> Option<&AuctionRecord> {
        self.auctions.get(auction)
    }

    pub fn get_auction_mut(&mut self, auction: &Address) -> Option<&mut AuctionRecord> {
        self.auctions.get_mut(auction)
    }

    /// Get a bidder's entry in an auction.
    pub fn get_bid(&self, auction: &Address, bidder: &Address) -> Option<&BidRecord> {
        self.bids.get(&derive_bid_address(auction, bidder))
    }

    /// Get all bids for an auction, in order of first submission.
    pub fn get_auction_bids(&self, auction: &Address) -> Vec<&BidRecord> {
        self.auction_bidders
            .get(auction)
            .map(|bidders| {
                bidders
                    .iter()
                    .filter_map(|bidder| self.get_bid(auction, bidder))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Insert or replace a bid, tracking first-time bidders.
    pub fn put_bid(&mut self, bid: BidRecord) {
        let bidders = self.auction_bidders.entry(bid.auction_ref).or_default();
        if !bidders.contains(&bid.bidder) {
            bidders.push(bid.bidder);
        }
        self.bids.insert(bid.address(), bid);
    }

    pub fn emit(&mut self, event: AuctionEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbid_types::Handle;

    fn bid(auction: Address, bidder: Address, submitted_at: u64) -> BidRecord {
        BidRecord {
            bidder,
            auction_ref: auction,
            amount_handle: Handle(1),
            timestamp_handle: Handle(2),
            is_winner_handle: None,
            submitted_at,
        }
    }

    #[test]
    fn test_put_bid_tracks_bidders_once() {
        let mut state = ModuleState::default();
        let auction = [7u8; 32];

        state.put_bid(bid(auction, [1u8; 32], 10));
        state.put_bid(bid(auction, [2u8; 32], 11));
        state.put_bid(bid(auction, [1u8; 32], 12));

        let bids = state.get_auction_bids(&auction);
        assert_eq!(bids.len(), 2);
        assert_eq!(bids[0].bidder, [1u8; 32]);
        assert_eq!(bids[0].submitted_at, 12);
        assert_eq!(bids[1].bidder, [2u8; 32]);
    }

    #[test]
    fn test_get_bid_by_derived_address() {
        let mut state = ModuleState::default();
        let auction = [7u8; 32];
        state.put_bid(bid(auction, [1u8; 32], 10));

        assert!(state.get_bid(&auction, &[1u8; 32]).is_some());
        assert!(state.get_bid(&auction, &[2u8; 32]).is_none());
        assert!(state.get_auction_bids(&[8u8; 32]).is_empty());
    }
}
