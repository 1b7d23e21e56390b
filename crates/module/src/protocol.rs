//! Two-phase submission.
//!
//! A handle does not exist until the call that produces it runs, but the
//! call that produces it must also be handed the allowance addresses derived
//! from it. Submission therefore happens twice:
//!
//! 1. **Discovery** ([`plan`]): execute the call against a copy of the
//!    ledger with no allowance inputs, read the produced handles out of the
//!    post-execution records and return them with their grantees.
//! 2. **Commit** ([`commit`]): derive one [`AllowanceInput`] per predicted
//!    handle and execute for real. The handler recomputes its grant plan and
//!    refuses to proceed unless every supplied input matches it.
//!
//! Handles are deterministic in their inputs, so an unchanged ledger yields
//! the same handles in both phases. If another call lands in between, the
//! commit fails with a protocol error and nothing is written.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use cbid_compute::ConfidentialCompute;
use cbid_types::rpc::{parse_address, parse_handle, PredictedHandleRpc, WireError};
use cbid_types::{
    derive_token_account_address, Address, AllowanceInput, AuctionKind, AuctionRecord, BidRecord,
    Handle,
};

use crate::call::AuctionCall;
use crate::error::AuctionError;
use crate::handlers::HandlerResult;
use crate::runtime::{CallOutcome, Runtime};

/// Which record field a predicted handle comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandleSlot {
    BidAmount,
    BidderBalance,
    HighestBid,
    SecondHighestBid,
    ReserveMet,
    IsWinner,
}

impl HandleSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            HandleSlot::BidAmount => "bid_amount",
            HandleSlot::BidderBalance => "bidder_balance",
            HandleSlot::HighestBid => "highest_bid",
            HandleSlot::SecondHighestBid => "second_highest_bid",
            HandleSlot::ReserveMet => "reserve_met",
            HandleSlot::IsWinner => "is_winner",
        }
    }
}

impl fmt::Display for HandleSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandleSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "bid_amount" => HandleSlot::BidAmount,
            "bidder_balance" => HandleSlot::BidderBalance,
            "highest_bid" => HandleSlot::HighestBid,
            "second_highest_bid" => HandleSlot::SecondHighestBid,
            "reserve_met" => HandleSlot::ReserveMet,
            "is_winner" => HandleSlot::IsWinner,
            other => return Err(format!("unknown handle slot: {other}")),
        })
    }
}

/// A handle the call will produce, and who gets to decrypt it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PredictedHandle {
    pub slot: HandleSlot,
    pub handle: Handle,
    pub grantee: Address,
}

impl PredictedHandle {
    pub fn allowance_input(&self) -> AllowanceInput {
        AllowanceInput::for_handle(self.handle, self.grantee)
    }
}

impl From<&PredictedHandle> for PredictedHandleRpc {
    fn from(p: &PredictedHandle) -> Self {
        Self {
            slot: p.slot.as_str().to_string(),
            handle: p.handle.to_string(),
            grantee: hex::encode(p.grantee),
        }
    }
}

impl TryFrom<&PredictedHandleRpc> for PredictedHandle {
    type Error = WireError;

    fn try_from(p: &PredictedHandleRpc) -> Result<Self, Self::Error> {
        Ok(Self {
            slot: p.slot.parse().map_err(WireError::InvalidHandle)?,
            handle: parse_handle(&p.handle)?,
            grantee: parse_address("grantee", &p.grantee)?,
        })
    }
}

/// Ordered discovery result for one call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PredictedHandles(pub Vec<PredictedHandle>);

impl PredictedHandles {
    /// Allowance inputs in grant order.
    pub fn allowance_inputs(&self) -> Vec<AllowanceInput> {
        self.0.iter().map(PredictedHandle::allowance_input).collect()
    }

    /// First handle recorded for `slot`.
    pub fn handle(&self, slot: HandleSlot) -> Option<Handle> {
        self.0.iter().find(|p| p.slot == slot).map(|p| p.handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PredictedHandle> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Grants written by a bid: the bidder sees their own amount and balance,
/// the organizer sees the bid and the auction's aggregates.
pub fn place_bid_grants(
    auction: &AuctionRecord,
    bid: &BidRecord,
    bidder_balance: Handle,
) -> Vec<PredictedHandle> {
    let organizer = auction.organizer;
    let bidder = bid.bidder;
    let entry = |slot, handle, grantee| PredictedHandle {
        slot,
        handle,
        grantee,
    };

    let mut plan = vec![
        entry(HandleSlot::BidAmount, bid.amount_handle, bidder),
        entry(HandleSlot::BidAmount, bid.amount_handle, organizer),
        entry(HandleSlot::BidderBalance, bidder_balance, bidder),
        entry(HandleSlot::HighestBid, auction.highest_bid_handle, organizer),
    ];
    if auction.auction_kind == AuctionKind::Vickrey {
        if let Some(second) = auction.second_highest_bid_handle {
            plan.push(entry(HandleSlot::SecondHighestBid, second, organizer));
        }
    }
    plan.push(entry(HandleSlot::ReserveMet, auction.reserve_met_handle, organizer));
    plan
}

/// Grants written by a winner check: the flag goes to the bidder and the
/// organizer.
pub fn check_winner_grants(auction: &AuctionRecord, bid: &BidRecord) -> Vec<PredictedHandle> {
    match bid.is_winner_handle {
        Some(handle) => vec![
            PredictedHandle {
                slot: HandleSlot::IsWinner,
                handle,
                grantee: bid.bidder,
            },
            PredictedHandle {
                slot: HandleSlot::IsWinner,
                handle,
                grantee: auction.organizer,
            },
        ],
        None => Vec::new(),
    }
}

/// Write allowances for `plan`, checking each supplied input against it.
///
/// An empty `allowances` slice is a discovery run and writes nothing.
pub fn apply_allowances<C: ConfidentialCompute>(
    compute: &mut C,
    plan: &[PredictedHandle],
    allowances: &[AllowanceInput],
) -> HandlerResult<()> {
    if allowances.is_empty() {
        debug!(planned = plan.len(), "No allowance inputs, skipping grants");
        return Ok(());
    }
    if allowances.len() != plan.len() {
        return Err(AuctionError::AllowanceCountMismatch {
            expected: plan.len(),
            got: allowances.len(),
        });
    }

    for (index, (predicted, supplied)) in plan.iter().zip(allowances).enumerate() {
        if *supplied != predicted.allowance_input() {
            warn!(index, slot = %predicted.slot, "Allowance input does not match execution");
            return Err(AuctionError::StateDiverged {
                index,
                slot: predicted.slot,
            });
        }
        compute.grant(&supplied.allowance_address, predicted.handle, &supplied.grantee)?;
    }
    Ok(())
}

/// Phase 1: simulate `call` and report the handles it would produce.
///
/// The runtime is not modified.
pub fn plan<C: ConfidentialCompute + Clone>(
    runtime: &Runtime<C>,
    sender: Address,
    call: &AuctionCall,
) -> HandlerResult<PredictedHandles> {
    let simulation = runtime.simulate(sender, call.clone())?;
    let image = &simulation.image;

    let predicted = match call {
        AuctionCall::PlaceBid { auction, .. } => {
            let record = image
                .module
                .get_auction(auction)
                .ok_or_else(|| AuctionError::AuctionNotFound(hex::encode(auction)))?;
            let bid = image
                .module
                .get_bid(auction, &sender)
                .ok_or(AuctionError::BidNotFound)?;
            let account = derive_token_account_address(&sender, &record.bid_token_descriptor);
            let balance = image.ext.tokens.account_handle(&account)?;
            place_bid_grants(record, bid, balance)
        }
        AuctionCall::CheckWinner { auction, .. } => {
            let record = image
                .module
                .get_auction(auction)
                .ok_or_else(|| AuctionError::AuctionNotFound(hex::encode(auction)))?;
            let bid = image
                .module
                .get_bid(auction, &sender)
                .ok_or(AuctionError::BidNotFound)?;
            check_winner_grants(record, bid)
        }
        AuctionCall::CreateAuction { .. } | AuctionCall::CloseAuction { .. } => Vec::new(),
    };

    debug!(call = call.name(), handles = predicted.len(), "Discovery complete");
    Ok(PredictedHandles(predicted))
}

/// Phase 2: execute `call` with allowance inputs derived from `predicted`.
pub fn commit<C: ConfidentialCompute + Clone>(
    runtime: &mut Runtime<C>,
    sender: Address,
    call: AuctionCall,
    predicted: &PredictedHandles,
) -> HandlerResult<CallOutcome> {
    if call.produces_handles() && predicted.is_empty() {
        return Err(AuctionError::MissingPrediction);
    }
    runtime.dispatch(sender, call, &predicted.allowance_inputs())
}

/// Both phases back to back.
pub fn submit<C: ConfidentialCompute + Clone>(
    runtime: &mut Runtime<C>,
    sender: Address,
    call: AuctionCall,
) -> HandlerResult<CallOutcome> {
    let predicted = plan(runtime, sender, &call)?;
    commit(runtime, sender, call, &predicted)
}
