//! Query handlers for the auction module.
//!
//! These functions provide read-only access to auction state.

use serde::{Deserialize, Serialize};

use cbid_types::{Address, AuctionKind, AuctionRecord, AuctionStatus, BidRecord};

use crate::events::AuctionEvent;
use crate::state::ModuleState;

/// Query request types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AuctionQuery {
    /// Get auction details by address.
    GetAuction { auction: Address },

    /// Get all auctions (paginated, ordered by address).
    ListAuctions { offset: u64, limit: u64 },

    /// Get all bids for an auction.
    GetAuctionBids { auction: Address },

    /// Get a specific bid.
    GetBid { auction: Address, bidder: Address },

    /// Get events emitted for an auction.
    GetEvents { auction: Address },
}

/// Query response types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AuctionQueryResponse {
    Auction(Option<AuctionRecord>),
    AuctionList(Vec<AuctionRecord>),
    Bids(Vec<BidRecord>),
    Bid(Option<BidRecord>),
    Events(Vec<AuctionEvent>),
}

/// Handle a query.
pub fn handle_query(state: &ModuleState, query: AuctionQuery) -> AuctionQueryResponse {
    match query {
        AuctionQuery::GetAuction { auction } => {
            AuctionQueryResponse::Auction(state.get_auction(&auction).cloned())
        }

        AuctionQuery::ListAuctions { offset, limit } => {
            let auctions = sorted_auctions(state)
                .into_iter()
                .skip(usize::try_from(offset).unwrap_or(usize::MAX))
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .cloned()
                .collect();
            AuctionQueryResponse::AuctionList(auctions)
        }

        AuctionQuery::GetAuctionBids { auction } => {
            let bids = state
                .get_auction_bids(&auction)
                .into_iter()
                .cloned()
                .collect();
            AuctionQueryResponse::Bids(bids)
        }

        AuctionQuery::GetBid { auction, bidder } => {
            AuctionQueryResponse::Bid(state.get_bid(&auction, &bidder).cloned())
        }

        AuctionQuery::GetEvents { auction } => {
            let events = state
                .events
                .iter()
                .filter(|e| *e.auction() == auction)
                .cloned()
                .collect();
            AuctionQueryResponse::Events(events)
        }
    }
}

fn sorted_auctions(state: &ModuleState) -> Vec<&AuctionRecord> {
    let mut auctions: Vec<(&Address, &AuctionRecord)> = state.auctions.iter().collect();
    auctions.sort_by_key(|(address, _)| **address);
    auctions.into_iter().map(|(_, record)| record).collect()
}

/// Summary of an auction for listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionSummary {
    pub address: Address,
    pub organizer: Address,
    pub auction_id: u64,
    pub kind: AuctionKind,
    pub status: AuctionStatus,
    pub start_time: u64,
    pub end_time: u64,
    pub num_bids: u32,
}

impl AuctionSummary {
    pub fn from_record(record: &AuctionRecord) -> Self {
        Self {
            address: record.address(),
            organizer: record.organizer,
            auction_id: record.auction_id,
            kind: record.auction_kind,
            status: record.status,
            start_time: record.start_time,
            end_time: record.end_time,
            num_bids: record.bid_count,
        }
    }
}

/// Get auction summaries for listing.
pub fn get_auction_summaries(
    state: &ModuleState,
    offset: usize,
    limit: usize,
) -> Vec<AuctionSummary> {
    sorted_auctions(state)
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(AuctionSummary::from_record)
        .collect()
}

/// Auctions accepting bids at `current_time`.
pub fn get_active_auctions(state: &ModuleState, current_time: u64) -> Vec<AuctionSummary> {
    sorted_auctions(state)
        .into_iter()
        .filter(|record| {
            record.is_open() && current_time >= record.start_time && current_time < record.end_time
        })
        .map(AuctionSummary::from_record)
        .collect()
}

/// Open auctions whose bidding window has passed.
pub fn get_closable_auctions(state: &ModuleState, current_time: u64) -> Vec<Address> {
    sorted_auctions(state)
        .into_iter()
        .filter(|record| record.is_open() && current_time >= record.end_time)
        .map(AuctionRecord::address)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbid_types::Handle;

    fn record(organizer: u8, start_time: u64, end_time: u64, status: AuctionStatus) -> AuctionRecord {
        AuctionRecord {
            organizer: [organizer; 32],
            auction_id: 1,
            asset_descriptor: [0u8; 32],
            asset_quantity: 1,
            asset_vault_address: [0u8; 32],
            bid_token_descriptor: [0u8; 32],
            bid_vault_address: [0u8; 32],
            start_time,
            end_time,
            reserve_price: 0,
            auction_kind: AuctionKind::FirstPrice,
            status,
            bid_count: 0,
            highest_bid_handle: Handle(0),
            second_highest_bid_handle: None,
            reserve_met_handle: Handle(0),
            highest_bidder_timestamp: Handle(0),
        }
    }

    fn state_with(records: Vec<AuctionRecord>) -> ModuleState {
        let mut state = ModuleState::default();
        for r in records {
            state.auctions.insert(r.address(), r);
        }
        state
    }

    #[test]
    fn test_get_auction_query() {
        let r = record(1, 0, 10, AuctionStatus::Open);
        let address = r.address();
        let state = state_with(vec![r.clone()]);

        match handle_query(&state, AuctionQuery::GetAuction { auction: address }) {
            AuctionQueryResponse::Auction(Some(found)) => assert_eq!(found, r),
            other => panic!("unexpected response: {other:?}"),
        }
        match handle_query(&state, AuctionQuery::GetAuction { auction: [0u8; 32] }) {
            AuctionQueryResponse::Auction(None) => {}
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn test_list_auctions_paginates() {
        let state = state_with(vec![
            record(1, 0, 10, AuctionStatus::Open),
            record(2, 0, 10, AuctionStatus::Open),
            record(3, 0, 10, AuctionStatus::Closed),
        ]);

        let page = get_auction_summaries(&state, 1, 5);
        assert_eq!(page.len(), 2);
        assert!(page[0].address < page[1].address);

        match handle_query(&state, AuctionQuery::ListAuctions { offset: 0, limit: 2 }) {
            AuctionQueryResponse::AuctionList(list) => assert_eq!(list.len(), 2),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn test_list_auctions_saturates_large_page() {
        let state = state_with(vec![
            record(1, 0, 10, AuctionStatus::Open),
            record(2, 0, 10, AuctionStatus::Open),
        ]);

        let query = AuctionQuery::ListAuctions {
            offset: 1,
            limit: u64::MAX,
        };
        match handle_query(&state, query) {
            AuctionQueryResponse::AuctionList(list) => assert_eq!(list.len(), 1),
            other => panic!("unexpected response: {other:?}"),
        }

        let query = AuctionQuery::ListAuctions {
            offset: u64::MAX,
            limit: 10,
        };
        match handle_query(&state, query) {
            AuctionQueryResponse::AuctionList(list) => assert!(list.is_empty()),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn test_active_and_closable() {
        let state = state_with(vec![
            record(1, 0, 10, AuctionStatus::Open),
            record(2, 20, 30, AuctionStatus::Open),
            record(3, 0, 10, AuctionStatus::Closed),
        ]);

        let active = get_active_auctions(&state, 5);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].organizer, [1u8; 32]);

        assert!(get_active_auctions(&state, 10).is_empty());

        let closable = get_closable_auctions(&state, 10);
        assert_eq!(closable, vec![record(1, 0, 10, AuctionStatus::Open).address()]);
    }
}
