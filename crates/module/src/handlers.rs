//! Call handlers for the auction module.
//!
//! These functions implement the business logic for each call type. A
//! handler may leave partial writes behind when it fails; the runtime
//! executes it against a scratch copy and only keeps the result on success.

use tracing::{debug, info};

use cbid_compute::ConfidentialCompute;
use cbid_types::{
    derive_asset_vault_address, derive_auction_address, derive_bid_vault_address,
    derive_token_account_address, Address, AllowanceInput, AuctionKind, AuctionRecord,
    AuctionStatus, BidRecord, Handle, InputType,
};

use crate::config::DuplicateBidPolicy;
use crate::engine;
use crate::error::AuctionError;
use crate::events::AuctionEvent;
use crate::protocol::{apply_allowances, check_winner_grants, place_bid_grants};
use crate::runtime::Externals;
use crate::state::ModuleState;

/// Context provided by the runtime for each call.
#[derive(Clone, Copy, Debug)]
pub struct CallContext {
    /// Signer of the call
    pub sender: Address,
    /// Current block height
    pub block_height: u64,
    /// Current timestamp
    pub timestamp: u64,
}

/// Result type for handlers.
pub type HandlerResult<T> = Result<T, AuctionError>;

fn lookup<'a>(state: &'a ModuleState, auction: &Address) -> HandlerResult<&'a AuctionRecord> {
    state
        .get_auction(auction)
        .ok_or_else(|| AuctionError::AuctionNotFound(hex::encode(auction)))
}

fn check_input_type(input_type: u8) -> HandlerResult<()> {
    InputType::from_u8(input_type)
        .map(|_| ())
        .ok_or(AuctionError::UnsupportedInputType(input_type))
}

/// Handle CreateAuction call.
///
/// Escrows `quantity` of `asset` from the organizer and opens the bid vault.
/// Returns the auction address.
#[allow(clippy::too_many_arguments)]
pub fn handle_create_auction<C: ConfidentialCompute>(
    state: &mut ModuleState,
    ext: &mut Externals<C>,
    ctx: &CallContext,
    auction_id: u64,
    asset: Address,
    bid_mint: Address,
    start_time: u64,
    end_time: u64,
    reserve_price: u64,
    kind: AuctionKind,
    quantity: u64,
) -> HandlerResult<Address> {
    // Validate timing
    if end_time <= start_time {
        return Err(AuctionError::InvalidTiming);
    }
    if end_time - start_time < state.config.min_duration_secs {
        return Err(AuctionError::InvalidTiming);
    }
    if start_time < ctx.timestamp {
        return Err(AuctionError::StartTimeInPast {
            start: start_time,
            now: ctx.timestamp,
        });
    }
    if quantity == 0 {
        return Err(AuctionError::InvalidQuantity);
    }
    if !ext.tokens.is_mint(&bid_mint) {
        return Err(AuctionError::InvalidBidMint);
    }

    let address = derive_auction_address(&ctx.sender, auction_id);
    if state.auctions.contains_key(&address) {
        return Err(AuctionError::AuctionExists(hex::encode(address)));
    }

    // Escrow the asset
    let asset_vault = derive_asset_vault_address(&address);
    ext.assets
        .transfer(&asset, &ctx.sender, &asset_vault, quantity)?;

    // Bid vault, owned by the auction
    let bid_vault = derive_bid_vault_address(&ctx.sender, auction_id);
    ext.tokens
        .create_account_at(&mut ext.compute, bid_vault, address, bid_mint)?;

    let zero = ext.compute.as_encrypted(0);
    let reserve = ext.compute.as_encrypted(u128::from(reserve_price));
    let reserve_met = ext.compute.compare_ge(zero, reserve)?;

    let record = AuctionRecord {
        organizer: ctx.sender,
        auction_id,
        asset_descriptor: asset,
        asset_quantity: quantity,
        asset_vault_address: asset_vault,
        bid_token_descriptor: bid_mint,
        bid_vault_address: bid_vault,
        start_time,
        end_time,
        reserve_price,
        auction_kind: kind,
        status: AuctionStatus::Open,
        bid_count: 0,
        highest_bid_handle: zero,
        second_highest_bid_handle: None,
        reserve_met_handle: reserve_met,
        highest_bidder_timestamp: zero,
    };

    state.auctions.insert(address, record);
    state.auction_bidders.insert(address, Vec::new());
    state.emit(AuctionEvent::AuctionCreated {
        auction: address,
        organizer: ctx.sender,
        auction_id,
        kind,
        start_time,
        end_time,
    });

    info!(
        auction = %hex::encode(address),
        auction_id,
        ?kind,
        start_time,
        end_time,
        "Auction created"
    );

    Ok(address)
}

/// Handle PlaceBid call.
///
/// Debits the encrypted amount from the signer's confidential account into
/// the bid vault and folds it into the auction's running maxima. Returns the
/// bid address.
pub fn handle_place_bid<C: ConfidentialCompute>(
    state: &mut ModuleState,
    ext: &mut Externals<C>,
    ctx: &CallContext,
    auction_address: Address,
    ciphertext: &[u8],
    input_type: u8,
    allowances: &[AllowanceInput],
) -> HandlerResult<Address> {
    let auction = lookup(state, &auction_address)?.clone();

    if auction.status != AuctionStatus::Open {
        return Err(AuctionError::AuctionNotOpen);
    }
    if ctx.timestamp < auction.start_time {
        return Err(AuctionError::BiddingNotStarted);
    }
    if ctx.timestamp >= auction.end_time {
        return Err(AuctionError::BiddingEnded);
    }
    if ciphertext.is_empty() {
        return Err(AuctionError::EmptyCiphertext);
    }
    check_input_type(input_type)?;

    let prior = state.get_bid(&auction_address, &ctx.sender).cloned();
    if prior.is_some() && state.config.duplicate_bid_policy == DuplicateBidPolicy::Reject {
        return Err(AuctionError::AlreadyBid);
    }
    if prior.is_none() && auction.bid_count >= state.config.max_bids_per_auction {
        return Err(AuctionError::BidLimitReached(state.config.max_bids_per_auction));
    }

    let amount = ext
        .compute
        .new_encrypted(ciphertext, input_type, &ctx.sender)?;

    // Move funds into the vault
    let bidder_account = derive_token_account_address(&ctx.sender, &auction.bid_token_descriptor);
    let bidder_balance = ext.tokens.debit(
        &mut ext.compute,
        &ctx.sender,
        &bidder_account,
        &auction.bid_vault_address,
        amount,
    )?;

    // Arrival order is the bid count after this bid
    let bid_count = auction
        .bid_count
        .checked_add(1)
        .ok_or(AuctionError::MathOverflow)?;
    let arrival = ext.compute.as_encrypted(u128::from(bid_count));

    let known_bidders = state
        .auction_bidders
        .get(&auction_address)
        .map_or(0, Vec::len);
    let bidders = known_bidders + usize::from(prior.is_none());

    let update = engine::apply_bid(
        &mut ext.compute,
        &auction,
        amount,
        arrival,
        prior.as_ref(),
        bidders,
    )?;

    let bid = BidRecord {
        bidder: ctx.sender,
        auction_ref: auction_address,
        amount_handle: update.entry_amount,
        timestamp_handle: update.entry_timestamp,
        is_winner_handle: None,
        submitted_at: ctx.timestamp,
    };
    let bid_address = bid.address();

    let record = state
        .get_auction_mut(&auction_address)
        .ok_or_else(|| AuctionError::AuctionNotFound(hex::encode(auction_address)))?;
    record.bid_count = bid_count;
    record.highest_bid_handle = update.highest;
    record.second_highest_bid_handle = update.second_highest;
    record.reserve_met_handle = update.reserve_met;
    record.highest_bidder_timestamp = update.highest_timestamp;
    let record = record.clone();

    let plan = place_bid_grants(&record, &bid, bidder_balance);
    apply_allowances(&mut ext.compute, &plan, allowances)?;

    state.put_bid(bid);
    state.emit(AuctionEvent::BidPlaced {
        auction: auction_address,
        bidder: ctx.sender,
        bid_count,
        top_up: prior.is_some(),
    });

    info!(
        auction = %hex::encode(auction_address),
        bidder = %hex::encode(ctx.sender),
        bid_count,
        top_up = prior.is_some(),
        "Bid placed"
    );

    Ok(bid_address)
}

/// Handle CloseAuction call.
pub fn handle_close_auction(
    state: &mut ModuleState,
    ctx: &CallContext,
    auction_address: Address,
) -> HandlerResult<()> {
    let auction = lookup(state, &auction_address)?;

    // Only the organizer re-derives to this address
    if derive_auction_address(&ctx.sender, auction.auction_id) != auction_address {
        return Err(AuctionError::NotAuthorized);
    }
    if auction.status != AuctionStatus::Open {
        return Err(AuctionError::AuctionNotOpen);
    }
    if ctx.timestamp < auction.end_time {
        return Err(AuctionError::AuctionNotEnded);
    }

    let record = state
        .get_auction_mut(&auction_address)
        .ok_or_else(|| AuctionError::AuctionNotFound(hex::encode(auction_address)))?;
    record.status = AuctionStatus::Closed;
    let bid_count = record.bid_count;

    state.emit(AuctionEvent::AuctionClosed {
        auction: auction_address,
        bid_count,
    });
    info!(auction = %hex::encode(auction_address), bid_count, "Auction closed");

    Ok(())
}

/// Handle CheckWinner call.
///
/// Stores the signer's encrypted winner flag on their bid and returns it.
pub fn handle_check_winner<C: ConfidentialCompute>(
    state: &mut ModuleState,
    ext: &mut Externals<C>,
    ctx: &CallContext,
    auction_address: Address,
    input_type: u8,
    allowances: &[AllowanceInput],
) -> HandlerResult<Handle> {
    let auction = lookup(state, &auction_address)?.clone();
    check_input_type(input_type)?;

    if auction.status != AuctionStatus::Closed {
        return Err(AuctionError::AuctionNotClosed);
    }

    let mut bid = state
        .get_bid(&auction_address, &ctx.sender)
        .cloned()
        .ok_or(AuctionError::BidNotFound)?;

    let is_winner = engine::is_winner(&mut ext.compute, &auction, &bid)?;
    bid.is_winner_handle = Some(is_winner);

    let plan = check_winner_grants(&auction, &bid);
    apply_allowances(&mut ext.compute, &plan, allowances)?;

    state.put_bid(bid);
    state.emit(AuctionEvent::WinnerChecked {
        auction: auction_address,
        bidder: ctx.sender,
    });
    debug!(
        auction = %hex::encode(auction_address),
        bidder = %hex::encode(ctx.sender),
        %is_winner,
        "Winner flag computed"
    );

    Ok(is_winner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModuleConfig;
    use crate::error::ErrorKind;
    use cbid_compute::{envelope, Coprocessor, NetworkKey};
    use cbid_token::{AssetLedger, ConfidentialTokenLedger};
    use cbid_types::derive_allowance_address;
    use rand::rngs::OsRng;

    const ORGANIZER: Address = [1u8; 32];
    const MINT: Address = [20u8; 32];
    const ASSET: Address = [21u8; 32];

    fn ctx(sender: Address, timestamp: u64) -> CallContext {
        CallContext {
            sender,
            block_height: 1,
            timestamp,
        }
    }

    fn setup(config: ModuleConfig) -> (ModuleState, Externals<Coprocessor>) {
        let mut tokens = ConfidentialTokenLedger::new();
        tokens.create_mint(MINT, ORGANIZER, 6).unwrap();
        let mut assets = AssetLedger::new();
        assets.deposit(ORGANIZER, ASSET, 1);
        let ext = Externals {
            compute: Coprocessor::new(NetworkKey([3u8; 32])),
            tokens,
            assets,
        };
        (ModuleState::new(config), ext)
    }

    fn fund(ext: &mut Externals<Coprocessor>, owner: Address, amount: u128) {
        let account = ext
            .tokens
            .create_account(&mut ext.compute, owner, MINT)
            .unwrap();
        let minted = ext.compute.as_encrypted(amount);
        ext.tokens
            .mint_to(&mut ext.compute, &ORGANIZER, &account, minted)
            .unwrap();
    }

    fn sealed(ext: &Externals<Coprocessor>, signer: &Address, value: u128) -> Vec<u8> {
        envelope::seal(ext.compute.network_key(), signer, value, &mut OsRng).unwrap()
    }

    fn create(
        state: &mut ModuleState,
        ext: &mut Externals<Coprocessor>,
        kind: AuctionKind,
    ) -> Address {
        handle_create_auction(
            state,
            ext,
            &ctx(ORGANIZER, 100),
            7,
            ASSET,
            MINT,
            100,
            200,
            50,
            kind,
            1,
        )
        .unwrap()
    }

    fn reveal(ext: &mut Externals<Coprocessor>, handle: Handle) -> u128 {
        let viewer = [77u8; 32];
        ext.compute
            .grant(&derive_allowance_address(handle, &viewer), handle, &viewer)
            .unwrap();
        ext.compute.decrypt(handle, &viewer).unwrap()
    }

    #[test]
    fn test_create_auction_escrows_asset() {
        let (mut state, mut ext) = setup(ModuleConfig::default());
        let address = create(&mut state, &mut ext, AuctionKind::FirstPrice);

        let record = state.get_auction(&address).unwrap();
        assert_eq!(record.status, AuctionStatus::Open);
        assert_eq!(record.bid_count, 0);
        assert_eq!(ext.assets.balance(&ORGANIZER, &ASSET), 0);
        assert_eq!(ext.assets.balance(&record.asset_vault_address, &ASSET), 1);
        assert_eq!(
            ext.tokens.account(&record.bid_vault_address).unwrap().owner,
            address
        );
        assert_eq!(state.events.len(), 1);
    }

    #[test]
    fn test_create_auction_validation() {
        let (mut state, mut ext) = setup(ModuleConfig::default());
        let c = ctx(ORGANIZER, 100);

        let bad_window = handle_create_auction(
            &mut state, &mut ext, &c, 1, ASSET, MINT, 150, 150, 0, AuctionKind::FirstPrice, 1,
        );
        assert_eq!(bad_window, Err(AuctionError::InvalidTiming));

        let past = handle_create_auction(
            &mut state, &mut ext, &c, 1, ASSET, MINT, 99, 150, 0, AuctionKind::FirstPrice, 1,
        );
        assert_eq!(past.unwrap_err().kind(), ErrorKind::Timing);

        let zero = handle_create_auction(
            &mut state, &mut ext, &c, 1, ASSET, MINT, 100, 150, 0, AuctionKind::FirstPrice, 0,
        );
        assert_eq!(zero, Err(AuctionError::InvalidQuantity));

        let bad_mint = handle_create_auction(
            &mut state, &mut ext, &c, 1, ASSET, ASSET, 100, 150, 0, AuctionKind::FirstPrice, 1,
        );
        assert_eq!(bad_mint, Err(AuctionError::InvalidBidMint));

        let no_asset = handle_create_auction(
            &mut state, &mut ext, &c, 1, ASSET, MINT, 100, 150, 0, AuctionKind::FirstPrice, 5,
        );
        assert_eq!(no_asset.unwrap_err().kind(), ErrorKind::Balance);

        assert!(state.auctions.is_empty());
    }

    #[test]
    fn test_create_auction_twice() {
        let (mut state, mut ext) = setup(ModuleConfig::default());
        ext.assets.deposit(ORGANIZER, ASSET, 1);
        create(&mut state, &mut ext, AuctionKind::FirstPrice);

        let again = handle_create_auction(
            &mut state,
            &mut ext,
            &ctx(ORGANIZER, 100),
            7,
            ASSET,
            MINT,
            100,
            200,
            50,
            AuctionKind::FirstPrice,
            1,
        );
        assert!(matches!(again, Err(AuctionError::AuctionExists(_))));
    }

    #[test]
    fn test_place_bid_discovery_writes_no_allowances() {
        let (mut state, mut ext) = setup(ModuleConfig::default());
        let auction = create(&mut state, &mut ext, AuctionKind::FirstPrice);
        let bidder = [2u8; 32];
        fund(&mut ext, bidder, 500);

        let envelope = sealed(&ext, &bidder, 120);
        handle_place_bid(
            &mut state,
            &mut ext,
            &ctx(bidder, 150),
            auction,
            &envelope,
            InputType::CIPHERTEXT,
            &[],
        )
        .unwrap();

        let record = state.get_auction(&auction).unwrap().clone();
        assert_eq!(record.bid_count, 1);
        assert!(!ext.compute.is_allowed(record.highest_bid_handle, &ORGANIZER));
        assert_eq!(reveal(&mut ext, record.highest_bid_handle), 120);
        assert_eq!(reveal(&mut ext, record.reserve_met_handle), 1);

        let vault = ext.tokens.account_handle(&record.bid_vault_address).unwrap();
        assert_eq!(reveal(&mut ext, vault), 120);
    }

    #[test]
    fn test_place_bid_timing() {
        let (mut state, mut ext) = setup(ModuleConfig::default());
        let auction = create(&mut state, &mut ext, AuctionKind::FirstPrice);
        let bidder = [2u8; 32];
        fund(&mut ext, bidder, 500);
        let envelope = sealed(&ext, &bidder, 10);

        for (at, expected) in [
            (99, AuctionError::BiddingNotStarted),
            (200, AuctionError::BiddingEnded),
        ] {
            let result = handle_place_bid(
                &mut state,
                &mut ext,
                &ctx(bidder, at),
                auction,
                &envelope,
                InputType::CIPHERTEXT,
                &[],
            );
            assert_eq!(result, Err(expected));
        }
    }

    #[test]
    fn test_place_bid_insufficient_balance() {
        let (mut state, mut ext) = setup(ModuleConfig::default());
        let auction = create(&mut state, &mut ext, AuctionKind::FirstPrice);
        let bidder = [2u8; 32];
        fund(&mut ext, bidder, 5);

        let envelope = sealed(&ext, &bidder, 10);
        let result = handle_place_bid(
            &mut state,
            &mut ext,
            &ctx(bidder, 150),
            auction,
            &envelope,
            InputType::CIPHERTEXT,
            &[],
        );
        assert_eq!(result, Err(AuctionError::InsufficientBalance));
        assert_eq!(state.get_auction(&auction).unwrap().bid_count, 0);
    }

    #[test]
    fn test_duplicate_bid_rejected_by_default() {
        let (mut state, mut ext) = setup(ModuleConfig::default());
        let auction = create(&mut state, &mut ext, AuctionKind::FirstPrice);
        let bidder = [2u8; 32];
        fund(&mut ext, bidder, 500);

        for (at, value) in [(150, 10), (151, 20)] {
            let envelope = sealed(&ext, &bidder, value);
            let result = handle_place_bid(
                &mut state,
                &mut ext,
                &ctx(bidder, at),
                auction,
                &envelope,
                InputType::CIPHERTEXT,
                &[],
            );
            if at == 151 {
                assert_eq!(result, Err(AuctionError::AlreadyBid));
            }
        }
        assert_eq!(state.get_auction(&auction).unwrap().bid_count, 1);
    }

    #[test]
    fn test_bid_limit() {
        let config = ModuleConfig {
            max_bids_per_auction: 1,
            ..Default::default()
        };
        let (mut state, mut ext) = setup(config);
        let auction = create(&mut state, &mut ext, AuctionKind::FirstPrice);

        for (i, bidder) in [[2u8; 32], [3u8; 32]].into_iter().enumerate() {
            fund(&mut ext, bidder, 100);
            let envelope = sealed(&ext, &bidder, 10);
            let result = handle_place_bid(
                &mut state,
                &mut ext,
                &ctx(bidder, 150),
                auction,
                &envelope,
                InputType::CIPHERTEXT,
                &[],
            );
            assert_eq!(result.is_ok(), i == 0);
        }
    }

    #[test]
    fn test_close_auction_rules() {
        let (mut state, mut ext) = setup(ModuleConfig::default());
        let auction = create(&mut state, &mut ext, AuctionKind::FirstPrice);

        let stranger = handle_close_auction(&mut state, &ctx([9u8; 32], 300), auction);
        assert_eq!(stranger, Err(AuctionError::NotAuthorized));

        let early = handle_close_auction(&mut state, &ctx(ORGANIZER, 199), auction);
        assert_eq!(early, Err(AuctionError::AuctionNotEnded));

        handle_close_auction(&mut state, &ctx(ORGANIZER, 200), auction).unwrap();
        assert_eq!(
            state.get_auction(&auction).unwrap().status,
            AuctionStatus::Closed
        );

        let again = handle_close_auction(&mut state, &ctx(ORGANIZER, 201), auction);
        assert_eq!(again.unwrap_err().kind(), ErrorKind::State);
    }

    #[test]
    fn test_check_winner_requires_closed_auction_and_bid() {
        let (mut state, mut ext) = setup(ModuleConfig::default());
        let auction = create(&mut state, &mut ext, AuctionKind::FirstPrice);
        let bidder = [2u8; 32];
        fund(&mut ext, bidder, 500);
        let envelope = sealed(&ext, &bidder, 60);
        handle_place_bid(
            &mut state,
            &mut ext,
            &ctx(bidder, 150),
            auction,
            &envelope,
            InputType::CIPHERTEXT,
            &[],
        )
        .unwrap();

        let open = handle_check_winner(
            &mut state,
            &mut ext,
            &ctx(bidder, 160),
            auction,
            InputType::CIPHERTEXT,
            &[],
        );
        assert_eq!(open, Err(AuctionError::AuctionNotClosed));

        handle_close_auction(&mut state, &ctx(ORGANIZER, 200), auction).unwrap();

        let nobody = handle_check_winner(
            &mut state,
            &mut ext,
            &ctx([8u8; 32], 210),
            auction,
            InputType::CIPHERTEXT,
            &[],
        );
        assert_eq!(nobody, Err(AuctionError::BidNotFound));

        let flag = handle_check_winner(
            &mut state,
            &mut ext,
            &ctx(bidder, 210),
            auction,
            InputType::CIPHERTEXT,
            &[],
        )
        .unwrap();
        assert_eq!(reveal(&mut ext, flag), 1);
        assert_eq!(
            state.get_bid(&auction, &bidder).unwrap().is_winner_handle,
            Some(flag)
        );
    }
}
