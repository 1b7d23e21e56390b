//! Encrypted bid comparison.
//!
//! Everything here runs on handles. The engine never learns an amount; it
//! asks the compute layer for maxima, minima and selections and gets new
//! handles back.
//!
//! Tie rule: every accepted bid gets a strictly increasing arrival number
//! (the auction's bid count after the bid). The incumbent highest bid is
//! always the first operand of the maximum, and the leader's arrival number
//! only moves when the new amount is strictly greater, or when the auction
//! had no bids yet. An equal later bid therefore never displaces an earlier
//! one, and exactly one entry matches the leader.

use cbid_compute::{ComputeResult, ConfidentialCompute};
use cbid_types::{AuctionKind, AuctionRecord, BidRecord, Handle};

/// Handles produced by folding one bid into an auction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BidUpdate {
    pub highest: Handle,
    pub second_highest: Option<Handle>,
    pub reserve_met: Handle,
    pub highest_timestamp: Handle,
    /// Stored amount of the bidder's entry
    pub entry_amount: Handle,
    /// Stored arrival number of the bidder's entry
    pub entry_timestamp: Handle,
}

/// Fold an encrypted amount into the auction's running maxima.
///
/// `arrival` is the encrypted arrival number of this bid and `bidders` the
/// number of distinct bidders once it is accepted. `prior` is the bidder's
/// existing entry when topping up; its amount is summed with `amount` and
/// the entry keeps its original arrival number if it currently holds the
/// top spot.
pub fn apply_bid<C: ConfidentialCompute>(
    compute: &mut C,
    auction: &AuctionRecord,
    amount: Handle,
    arrival: Handle,
    prior: Option<&BidRecord>,
    bidders: usize,
) -> ComputeResult<BidUpdate> {
    let old_highest = auction.highest_bid_handle;
    let old_timestamp = auction.highest_bidder_timestamp;

    let (entry_amount, entry_timestamp, was_top) = match prior {
        None => (amount, arrival, None),
        Some(prior) => {
            let total = compute.add(prior.amount_handle, amount)?;
            let same_amount = compute.compare_eq(prior.amount_handle, old_highest)?;
            let same_time = compute.compare_eq(prior.timestamp_handle, old_timestamp)?;
            let was_top = compute.and(same_amount, same_time)?;
            let timestamp = compute.select(was_top, prior.timestamp_handle, arrival)?;
            (total, timestamp, Some(was_top))
        }
    };

    let highest = compute.compare_max(old_highest, entry_amount)?;
    let highest_timestamp = if auction.bid_count == 0 {
        // The first bid leads whatever its amount, zero included.
        entry_timestamp
    } else {
        let displaces = compute.compare_gt(entry_amount, old_highest)?;
        compute.select(displaces, entry_timestamp, old_timestamp)?
    };

    let second_highest = match auction.auction_kind {
        AuctionKind::FirstPrice => None,
        // Second place needs a second bidder, not a second bid.
        AuctionKind::Vickrey if bidders < 2 => None,
        AuctionKind::Vickrey => {
            let base = match auction.second_highest_bid_handle {
                Some(handle) => handle,
                None => compute.as_encrypted(0),
            };
            let runner_up = compute.compare_min(entry_amount, old_highest)?;
            let candidate = compute.compare_max(runner_up, base)?;
            match was_top {
                // The top bidder raising their own bid leaves second place alone.
                Some(was_top) => Some(compute.select(was_top, base, candidate)?),
                None => Some(candidate),
            }
        }
    };

    let reserve = compute.as_encrypted(u128::from(auction.reserve_price));
    let reserve_met = compute.compare_ge(highest, reserve)?;

    Ok(BidUpdate {
        highest,
        second_highest,
        reserve_met,
        highest_timestamp,
        entry_amount,
        entry_timestamp,
    })
}

/// Encrypted flag: does `bid` hold the top amount with the earliest arrival.
pub fn is_winner<C: ConfidentialCompute>(
    compute: &mut C,
    auction: &AuctionRecord,
    bid: &BidRecord,
) -> ComputeResult<Handle> {
    let same_amount = compute.compare_eq(bid.amount_handle, auction.highest_bid_handle)?;
    let same_time = compute.compare_eq(bid.timestamp_handle, auction.highest_bidder_timestamp)?;
    compute.and(same_amount, same_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbid_compute::{Coprocessor, NetworkKey};
    use cbid_types::{derive_allowance_address, AuctionStatus};

    const VIEWER: [u8; 32] = [42u8; 32];

    fn reveal(cp: &mut Coprocessor, handle: Handle) -> u128 {
        cp.grant(&derive_allowance_address(handle, &VIEWER), handle, &VIEWER)
            .unwrap();
        cp.decrypt(handle, &VIEWER).unwrap()
    }

    /// Auction record plus the distinct bidders the module would track.
    struct Book {
        record: AuctionRecord,
        bidders: Vec<u8>,
    }

    fn auction(cp: &mut Coprocessor, kind: AuctionKind, reserve_price: u64) -> Book {
        let zero = cp.as_encrypted(0);
        let reserve = cp.as_encrypted(u128::from(reserve_price));
        let record = AuctionRecord {
            organizer: [1u8; 32],
            auction_id: 1,
            asset_descriptor: [2u8; 32],
            asset_quantity: 1,
            asset_vault_address: [3u8; 32],
            bid_token_descriptor: [4u8; 32],
            bid_vault_address: [5u8; 32],
            start_time: 0,
            end_time: 100,
            reserve_price,
            auction_kind: kind,
            status: AuctionStatus::Open,
            bid_count: 0,
            highest_bid_handle: zero,
            second_highest_bid_handle: None,
            reserve_met_handle: cp.compare_ge(zero, reserve).unwrap(),
            highest_bidder_timestamp: zero,
        };
        Book {
            record,
            bidders: Vec::new(),
        }
    }

    /// Apply a bid as the handler would, returning the stored entry.
    fn bid(
        cp: &mut Coprocessor,
        book: &mut Book,
        bidder: u8,
        value: u128,
        prior: Option<&BidRecord>,
    ) -> BidRecord {
        if !book.bidders.contains(&bidder) {
            book.bidders.push(bidder);
        }
        let record = &mut book.record;
        let sequence = record.bid_count + 1;

        let amount = cp.as_encrypted(value);
        let arrival = cp.as_encrypted(u128::from(sequence));
        let update = apply_bid(cp, record, amount, arrival, prior, book.bidders.len()).unwrap();

        record.bid_count = sequence;
        record.highest_bid_handle = update.highest;
        record.second_highest_bid_handle = update.second_highest;
        record.reserve_met_handle = update.reserve_met;
        record.highest_bidder_timestamp = update.highest_timestamp;

        BidRecord {
            bidder: [bidder; 32],
            auction_ref: [9u8; 32],
            amount_handle: update.entry_amount,
            timestamp_handle: update.entry_timestamp,
            is_winner_handle: None,
            submitted_at: 10,
        }
    }

    fn flags(cp: &mut Coprocessor, book: &Book, bids: &[&BidRecord]) -> Vec<u128> {
        bids.iter()
            .map(|b| {
                let flag = is_winner(cp, &book.record, b).unwrap();
                reveal(cp, flag)
            })
            .collect()
    }

    #[test]
    fn test_first_price_tracks_maximum_and_reserve() {
        let mut cp = Coprocessor::new(NetworkKey([0u8; 32]));
        let mut book = auction(&mut cp, AuctionKind::FirstPrice, 150);

        bid(&mut cp, &mut book, 1, 100, None);
        assert_eq!(reveal(&mut cp, book.record.reserve_met_handle), 0);

        bid(&mut cp, &mut book, 2, 200, None);
        bid(&mut cp, &mut book, 3, 120, None);

        assert_eq!(reveal(&mut cp, book.record.highest_bid_handle), 200);
        assert_eq!(reveal(&mut cp, book.record.reserve_met_handle), 1);
        assert_eq!(book.record.second_highest_bid_handle, None);
    }

    #[test]
    fn test_vickrey_second_price() {
        let mut cp = Coprocessor::new(NetworkKey([0u8; 32]));
        let mut book = auction(&mut cp, AuctionKind::Vickrey, 0);

        bid(&mut cp, &mut book, 1, 20, None);
        assert_eq!(book.record.second_highest_bid_handle, None);

        bid(&mut cp, &mut book, 2, 35, None);
        bid(&mut cp, &mut book, 3, 80, None);

        assert_eq!(reveal(&mut cp, book.record.highest_bid_handle), 80);
        let second = book.record.second_highest_bid_handle.unwrap();
        assert_eq!(reveal(&mut cp, second), 35);
    }

    #[test]
    fn test_vickrey_lower_bid_only_moves_second() {
        let mut cp = Coprocessor::new(NetworkKey([0u8; 32]));
        let mut book = auction(&mut cp, AuctionKind::Vickrey, 0);

        bid(&mut cp, &mut book, 1, 80, None);
        bid(&mut cp, &mut book, 2, 20, None);
        bid(&mut cp, &mut book, 3, 35, None);

        assert_eq!(reveal(&mut cp, book.record.highest_bid_handle), 80);
        let second = book.record.second_highest_bid_handle.unwrap();
        assert_eq!(reveal(&mut cp, second), 35);
    }

    #[test]
    fn test_tie_goes_to_earliest_bid() {
        let mut cp = Coprocessor::new(NetworkKey([0u8; 32]));
        let mut book = auction(&mut cp, AuctionKind::FirstPrice, 0);

        let first = bid(&mut cp, &mut book, 1, 200, None);
        let middle = bid(&mut cp, &mut book, 2, 100, None);
        let late = bid(&mut cp, &mut book, 3, 200, None);

        assert_eq!(flags(&mut cp, &book, &[&first, &middle, &late]), vec![1, 0, 0]);
    }

    #[test]
    fn test_zero_bids() {
        let mut cp = Coprocessor::new(NetworkKey([0u8; 32]));

        // A sole zero bid still wins
        let mut book = auction(&mut cp, AuctionKind::FirstPrice, 0);
        let only = bid(&mut cp, &mut book, 1, 0, None);
        assert_eq!(flags(&mut cp, &book, &[&only]), vec![1]);

        // All-zero auction: the earliest bid wins
        let mut book = auction(&mut cp, AuctionKind::Vickrey, 0);
        let first = bid(&mut cp, &mut book, 1, 0, None);
        let second = bid(&mut cp, &mut book, 2, 0, None);
        assert_eq!(flags(&mut cp, &book, &[&first, &second]), vec![1, 0]);
    }

    #[test]
    fn test_top_up_by_runner_up_takes_lead() {
        let mut cp = Coprocessor::new(NetworkKey([0u8; 32]));
        let mut book = auction(&mut cp, AuctionKind::Vickrey, 0);

        let first = bid(&mut cp, &mut book, 1, 50, None);
        let second = bid(&mut cp, &mut book, 2, 30, None);
        let topped = bid(&mut cp, &mut book, 2, 40, Some(&second));

        assert_eq!(reveal(&mut cp, topped.amount_handle), 70);
        assert_eq!(reveal(&mut cp, book.record.highest_bid_handle), 70);
        let runner_up = book.record.second_highest_bid_handle.unwrap();
        assert_eq!(reveal(&mut cp, runner_up), 50);

        assert_eq!(flags(&mut cp, &book, &[&topped, &first]), vec![1, 0]);
    }

    #[test]
    fn test_top_up_by_leader_keeps_second_and_arrival() {
        let mut cp = Coprocessor::new(NetworkKey([0u8; 32]));
        let mut book = auction(&mut cp, AuctionKind::Vickrey, 0);

        let leader = bid(&mut cp, &mut book, 1, 50, None);
        bid(&mut cp, &mut book, 2, 30, None);
        let topped = bid(&mut cp, &mut book, 1, 25, Some(&leader));

        assert_eq!(reveal(&mut cp, topped.timestamp_handle), 1);
        assert_eq!(reveal(&mut cp, book.record.highest_bid_handle), 75);
        let second = book.record.second_highest_bid_handle.unwrap();
        assert_eq!(reveal(&mut cp, second), 30);

        assert_eq!(flags(&mut cp, &book, &[&topped]), vec![1]);
    }

    #[test]
    fn test_single_bidder_top_up_has_no_second() {
        let mut cp = Coprocessor::new(NetworkKey([0u8; 32]));
        let mut book = auction(&mut cp, AuctionKind::Vickrey, 0);

        let first = bid(&mut cp, &mut book, 1, 30, None);
        let topped = bid(&mut cp, &mut book, 1, 20, Some(&first));
        assert_eq!(book.record.second_highest_bid_handle, None);
        assert_eq!(reveal(&mut cp, book.record.highest_bid_handle), 50);

        // A second bidder then sets second place from the leader's total
        let rival = bid(&mut cp, &mut book, 2, 40, None);
        let second = book.record.second_highest_bid_handle.unwrap();
        assert_eq!(reveal(&mut cp, second), 40);
        assert_eq!(flags(&mut cp, &book, &[&topped, &rival]), vec![1, 0]);
    }
}
