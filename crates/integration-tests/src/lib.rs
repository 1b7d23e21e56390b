//! End-to-end integration tests for confidential sealed-bid auctions.
//!
//! These tests exercise the full auction lifecycle:
//! 1. Ledger setup (mint, funded accounts, escrowed asset)
//! 2. Auction creation
//! 3. Encrypted bid submission through the two-phase protocol
//! 4. Close and per-bidder winner checks
//! 5. Decryption of granted handles

use cbid_client::create_bid;
use cbid_compute::{envelope, ComputeError, ConfidentialCompute, Coprocessor, NetworkKey};
use cbid_decryption_service::{DecryptionError, DecryptionService};
use cbid_module::{
    protocol, AuctionCall, CallOutcome, DuplicateBidPolicy, ErrorKind, ModuleConfig, Runtime,
};
use cbid_types::{Address, AuctionKind, AuctionStatus, Handle, InputType};

use rand::rngs::OsRng;

const ORGANIZER: Address = [1u8; 32];
const BIDDER_A: Address = [2u8; 32];
const BIDDER_B: Address = [3u8; 32];
const BIDDER_C: Address = [4u8; 32];
const OUTSIDER: Address = [9u8; 32];

const MINT: Address = [20u8; 32];
const ASSET: Address = [21u8; 32];

const NETWORK_KEY: NetworkKey = NetworkKey([0x17; 32]);

const START: u64 = 1_000;
const END: u64 = 2_000;

struct Ledger {
    runtime: Runtime<Coprocessor>,
    decryption: DecryptionService,
}

impl Ledger {
    fn new(config: ModuleConfig) -> Self {
        let mut runtime = Runtime::new(config, Coprocessor::new(NETWORK_KEY));
        runtime.set_timestamp(START);
        runtime.ext.tokens.create_mint(MINT, ORGANIZER, 6).unwrap();
        runtime.ext.assets.deposit(ORGANIZER, ASSET, 5);
        Self {
            runtime,
            decryption: DecryptionService::new(),
        }
    }

    fn fund(&mut self, owner: Address, amount: u128) {
        let ext = &mut self.runtime.ext;
        let account = ext
            .tokens
            .create_account(&mut ext.compute, owner, MINT)
            .unwrap();
        let minted = ext.compute.as_encrypted(amount);
        ext.tokens
            .mint_to(&mut ext.compute, &ORGANIZER, &account, minted)
            .unwrap();
    }

    fn create(&mut self, auction_id: u64, kind: AuctionKind, reserve_price: u64, start: u64) -> Address {
        let call = AuctionCall::CreateAuction {
            auction_id,
            asset: ASSET,
            bid_mint: MINT,
            start_time: start,
            end_time: END,
            reserve_price,
            kind,
            quantity: 1,
        };
        match protocol::submit(&mut self.runtime, ORGANIZER, call).unwrap() {
            CallOutcome::AuctionCreated { auction } => auction,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    fn bid_call(&self, auction: Address, bidder: &Address, value: u128) -> AuctionCall {
        let prepared = create_bid(&NETWORK_KEY, bidder, value, &mut OsRng)
            .expect("Failed to create bid");
        AuctionCall::PlaceBid {
            auction,
            ciphertext: prepared.ciphertext,
            input_type: prepared.input_type,
        }
    }

    fn bid(&mut self, auction: Address, bidder: Address, value: u128) -> Result<(), ErrorKind> {
        let call = self.bid_call(auction, &bidder, value);
        protocol::submit(&mut self.runtime, bidder, call)
            .map(|_| ())
            .map_err(|e| e.kind())
    }

    fn close(&mut self, sender: Address, auction: Address) -> Result<(), ErrorKind> {
        protocol::submit(&mut self.runtime, sender, AuctionCall::CloseAuction { auction })
            .map(|_| ())
            .map_err(|e| e.kind())
    }

    fn check_winner(&mut self, bidder: Address, auction: Address) -> Handle {
        let call = AuctionCall::CheckWinner {
            auction,
            input_type: InputType::CIPHERTEXT,
        };
        match protocol::submit(&mut self.runtime, bidder, call).unwrap() {
            CallOutcome::WinnerChecked { is_winner, .. } => is_winner,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    fn reveal(&mut self, requester: Address, handle: Handle) -> u128 {
        let response = self
            .decryption
            .decrypt(&self.runtime.ext.compute, requester, vec![handle])
            .expect("Decryption failed");
        assert!(self.decryption.verify(&response).unwrap());
        response.plaintexts[0]
    }

    fn bid_count(&self, auction: &Address) -> u32 {
        self.runtime.module.get_auction(auction).unwrap().bid_count
    }
}

/// Test the complete first-price flow.
#[test]
fn test_full_auction_flow() {
    // ========================================
    // Phase 1: Setup - mint and funded accounts
    // ========================================

    let mut ledger = Ledger::new(ModuleConfig::default());
    for bidder in [BIDDER_A, BIDDER_B, BIDDER_C] {
        ledger.fund(bidder, 1_000);
    }

    println!("Setup complete: 3 bidders funded");

    // ========================================
    // Phase 2: Create auction
    // ========================================

    let auction = ledger.create(1, AuctionKind::FirstPrice, 90, START);
    assert_eq!(ledger.runtime.ext.assets.balance(&ORGANIZER, &ASSET), 4);

    println!("Auction {} created", hex_short(&auction));

    // ========================================
    // Phase 3: Bidders submit encrypted bids
    // ========================================

    // A and C tie at 200; A arrives first
    ledger.bid(auction, BIDDER_A, 200).unwrap();
    ledger.runtime.advance_block();
    ledger.bid(auction, BIDDER_B, 100).unwrap();
    ledger.runtime.advance_block();
    ledger.bid(auction, BIDDER_C, 200).unwrap();

    assert_eq!(ledger.bid_count(&auction), 3);
    println!("3 bids submitted");

    // The amount handle is readable by its bidder only among bidders
    let b_amount = ledger
        .runtime
        .module
        .get_bid(&auction, &BIDDER_B)
        .unwrap()
        .amount_handle;
    assert_eq!(ledger.reveal(BIDDER_B, b_amount), 100);
    assert_eq!(ledger.reveal(ORGANIZER, b_amount), 100);
    assert!(ledger
        .decryption
        .decrypt(&ledger.runtime.ext.compute, BIDDER_A, vec![b_amount])
        .is_err());

    // ========================================
    // Phase 4: Close
    // ========================================

    ledger.runtime.set_timestamp(END);
    ledger.close(ORGANIZER, auction).unwrap();

    let record = ledger.runtime.module.get_auction(&auction).unwrap().clone();
    assert_eq!(record.status, AuctionStatus::Closed);
    assert_eq!(ledger.reveal(ORGANIZER, record.highest_bid_handle), 200);
    assert_eq!(ledger.reveal(ORGANIZER, record.reserve_met_handle), 1);
    assert_eq!(record.second_highest_bid_handle, None);

    println!("Auction closed: highest bid 200, reserve met");

    // ========================================
    // Phase 5: Winner checks
    // ========================================

    let a_flag = ledger.check_winner(BIDDER_A, auction);
    let b_flag = ledger.check_winner(BIDDER_B, auction);
    let c_flag = ledger.check_winner(BIDDER_C, auction);

    assert_eq!(ledger.reveal(BIDDER_A, a_flag), 1);
    assert_eq!(ledger.reveal(BIDDER_B, b_flag), 0);
    assert_eq!(ledger.reveal(BIDDER_C, c_flag), 0);

    // The organizer can read every flag
    assert_eq!(ledger.reveal(ORGANIZER, a_flag), 1);
    assert_eq!(ledger.reveal(ORGANIZER, c_flag), 0);

    println!("Winner: bidder A (earliest of the tied bids)");
}

/// Test Vickrey bookkeeping of the second-highest bid.
#[test]
fn test_vickrey_auction() {
    let mut ledger = Ledger::new(ModuleConfig::default());
    for bidder in [BIDDER_A, BIDDER_B, BIDDER_C] {
        ledger.fund(bidder, 1_000);
    }

    let auction = ledger.create(2, AuctionKind::Vickrey, 10, START);
    ledger.bid(auction, BIDDER_A, 20).unwrap();
    ledger.bid(auction, BIDDER_B, 35).unwrap();
    ledger.bid(auction, BIDDER_C, 80).unwrap();

    let record = ledger.runtime.module.get_auction(&auction).unwrap().clone();
    assert_eq!(ledger.reveal(ORGANIZER, record.highest_bid_handle), 80);
    let second = record.second_highest_bid_handle.expect("second-highest tracked");
    assert_eq!(ledger.reveal(ORGANIZER, second), 35);

    ledger.runtime.set_timestamp(END);
    ledger.close(ORGANIZER, auction).unwrap();
    let c_flag = ledger.check_winner(BIDDER_C, auction);
    assert_eq!(ledger.reveal(BIDDER_C, c_flag), 1);

    println!("Vickrey: winner bid 80, pays 35");
}

/// Winner flags do not depend on the reserve.
#[test]
fn test_reserve_not_met() {
    let mut ledger = Ledger::new(ModuleConfig::default());
    ledger.fund(BIDDER_A, 1_000);

    let auction = ledger.create(3, AuctionKind::FirstPrice, 500, START);
    ledger.bid(auction, BIDDER_A, 100).unwrap();

    ledger.runtime.set_timestamp(END);
    ledger.close(ORGANIZER, auction).unwrap();

    let record = ledger.runtime.module.get_auction(&auction).unwrap().clone();
    assert_eq!(ledger.reveal(ORGANIZER, record.reserve_met_handle), 0);

    let flag = ledger.check_winner(BIDDER_A, auction);
    assert_eq!(ledger.reveal(BIDDER_A, flag), 1);
}

#[test]
fn test_close_rules() {
    let mut ledger = Ledger::new(ModuleConfig::default());
    let auction = ledger.create(4, AuctionKind::FirstPrice, 0, START);

    // Too early
    assert_eq!(ledger.close(ORGANIZER, auction), Err(ErrorKind::Timing));

    ledger.runtime.set_timestamp(END);

    // Only the organizer may close
    assert_eq!(ledger.close(OUTSIDER, auction), Err(ErrorKind::Authorization));
    assert_eq!(
        ledger.runtime.module.get_auction(&auction).unwrap().status,
        AuctionStatus::Open
    );

    ledger.close(ORGANIZER, auction).unwrap();
    assert_eq!(ledger.close(ORGANIZER, auction), Err(ErrorKind::State));
}

#[test]
fn test_bidding_window() {
    let mut ledger = Ledger::new(ModuleConfig::default());
    ledger.fund(BIDDER_A, 1_000);

    let auction = ledger.create(5, AuctionKind::FirstPrice, 0, 1_500);
    assert_eq!(ledger.bid(auction, BIDDER_A, 10), Err(ErrorKind::Timing));

    ledger.runtime.set_timestamp(END);
    assert_eq!(ledger.bid(auction, BIDDER_A, 10), Err(ErrorKind::Timing));
    assert_eq!(ledger.bid_count(&auction), 0);
}

#[test]
fn test_check_winner_requires_closed_auction() {
    let mut ledger = Ledger::new(ModuleConfig::default());
    ledger.fund(BIDDER_A, 1_000);
    let auction = ledger.create(6, AuctionKind::FirstPrice, 0, START);
    ledger.bid(auction, BIDDER_A, 10).unwrap();

    let call = AuctionCall::CheckWinner {
        auction,
        input_type: InputType::CIPHERTEXT,
    };
    let err = protocol::submit(&mut ledger.runtime, BIDDER_A, call).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);

    // A non-bidder has no entry to check
    ledger.runtime.set_timestamp(END);
    ledger.close(ORGANIZER, auction).unwrap();
    let call = AuctionCall::CheckWinner {
        auction,
        input_type: InputType::CIPHERTEXT,
    };
    let err = protocol::submit(&mut ledger.runtime, OUTSIDER, call).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
}

/// A plan made before another bid landed must not commit.
#[test]
fn test_stale_plan_rejected() {
    let mut ledger = Ledger::new(ModuleConfig::default());
    ledger.fund(BIDDER_A, 1_000);
    ledger.fund(BIDDER_B, 1_000);
    let auction = ledger.create(7, AuctionKind::FirstPrice, 0, START);

    let call = ledger.bid_call(auction, &BIDDER_A, 50);
    let predicted = protocol::plan(&ledger.runtime, BIDDER_A, &call).unwrap();

    ledger.bid(auction, BIDDER_B, 70).unwrap();
    let before = ledger.runtime.module.clone();

    let err = protocol::commit(&mut ledger.runtime, BIDDER_A, call.clone(), &predicted).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(ledger.runtime.module.auctions, before.auctions);
    assert!(ledger.runtime.module.get_bid(&auction, &BIDDER_A).is_none());

    // A fresh plan goes through
    let predicted = protocol::plan(&ledger.runtime, BIDDER_A, &call).unwrap();
    protocol::commit(&mut ledger.runtime, BIDDER_A, call, &predicted).unwrap();
    assert_eq!(ledger.bid_count(&auction), 2);
}

#[test]
fn test_duplicate_bid_rejected() {
    let mut ledger = Ledger::new(ModuleConfig::default());
    ledger.fund(BIDDER_A, 1_000);
    let auction = ledger.create(8, AuctionKind::FirstPrice, 0, START);

    ledger.bid(auction, BIDDER_A, 30).unwrap();
    assert_eq!(ledger.bid(auction, BIDDER_A, 20), Err(ErrorKind::State));
    assert_eq!(ledger.bid_count(&auction), 1);
}

#[test]
fn test_duplicate_bid_top_up() {
    let config = ModuleConfig {
        duplicate_bid_policy: DuplicateBidPolicy::TopUp,
        ..ModuleConfig::default()
    };
    let mut ledger = Ledger::new(config);
    ledger.fund(BIDDER_A, 1_000);
    let auction = ledger.create(9, AuctionKind::Vickrey, 0, START);

    ledger.bid(auction, BIDDER_A, 30).unwrap();
    ledger.runtime.advance_block();
    ledger.bid(auction, BIDDER_A, 20).unwrap();
    assert_eq!(ledger.bid_count(&auction), 2);

    let amount = ledger
        .runtime
        .module
        .get_bid(&auction, &BIDDER_A)
        .unwrap()
        .amount_handle;
    assert_eq!(ledger.reveal(BIDDER_A, amount), 50);

    // One bidder, two bids: still no second place
    let record = ledger.runtime.module.get_auction(&auction).unwrap().clone();
    assert_eq!(ledger.reveal(ORGANIZER, record.highest_bid_handle), 50);
    assert_eq!(record.second_highest_bid_handle, None);

    ledger.fund(BIDDER_B, 1_000);
    ledger.bid(auction, BIDDER_B, 45).unwrap();
    let record = ledger.runtime.module.get_auction(&auction).unwrap().clone();
    let second = record.second_highest_bid_handle.expect("second-highest tracked");
    assert_eq!(ledger.reveal(ORGANIZER, second), 45);

    ledger.runtime.set_timestamp(END);
    ledger.close(ORGANIZER, auction).unwrap();
    let a_flag = ledger.check_winner(BIDDER_A, auction);
    let b_flag = ledger.check_winner(BIDDER_B, auction);
    assert_eq!(ledger.reveal(BIDDER_A, a_flag), 1);
    assert_eq!(ledger.reveal(BIDDER_B, b_flag), 0);
}

/// Equal bids within the same block still have a single winner.
#[test]
fn test_same_block_tie_has_one_winner() {
    let mut ledger = Ledger::new(ModuleConfig::default());
    for bidder in [BIDDER_A, BIDDER_B, BIDDER_C] {
        ledger.fund(bidder, 1_000);
    }
    let auction = ledger.create(13, AuctionKind::FirstPrice, 0, START);

    ledger.bid(auction, BIDDER_A, 200).unwrap();
    ledger.bid(auction, BIDDER_B, 200).unwrap();
    ledger.bid(auction, BIDDER_C, 200).unwrap();

    ledger.runtime.set_timestamp(END);
    ledger.close(ORGANIZER, auction).unwrap();

    let flags: Vec<u128> = [BIDDER_A, BIDDER_B, BIDDER_C]
        .into_iter()
        .map(|bidder| {
            let flag = ledger.check_winner(bidder, auction);
            ledger.reveal(bidder, flag)
        })
        .collect();
    assert_eq!(flags, vec![1, 0, 0]);
}

/// The module accepts zero-valued envelopes; a sole zero bid wins.
#[test]
fn test_zero_bid_sole_bidder_wins() {
    let mut ledger = Ledger::new(ModuleConfig::default());
    ledger.fund(BIDDER_A, 1_000);
    ledger.fund(BIDDER_B, 1_000);
    let auction = ledger.create(14, AuctionKind::FirstPrice, 0, START);

    let sealed = |bidder: &Address| envelope::seal(&NETWORK_KEY, bidder, 0, &mut OsRng).unwrap();
    for bidder in [BIDDER_A, BIDDER_B] {
        let call = AuctionCall::PlaceBid {
            auction,
            ciphertext: sealed(&bidder),
            input_type: InputType::CIPHERTEXT,
        };
        protocol::submit(&mut ledger.runtime, bidder, call).unwrap();
    }

    ledger.runtime.set_timestamp(END);
    ledger.close(ORGANIZER, auction).unwrap();

    let a_flag = ledger.check_winner(BIDDER_A, auction);
    let b_flag = ledger.check_winner(BIDDER_B, auction);
    assert_eq!(ledger.reveal(BIDDER_A, a_flag), 1);
    assert_eq!(ledger.reveal(BIDDER_B, b_flag), 0);
}

#[test]
fn test_insufficient_balance() {
    let mut ledger = Ledger::new(ModuleConfig::default());
    ledger.fund(BIDDER_A, 50);
    let auction = ledger.create(10, AuctionKind::FirstPrice, 0, START);

    assert_eq!(ledger.bid(auction, BIDDER_A, 100), Err(ErrorKind::Balance));
    assert_eq!(ledger.bid_count(&auction), 0);
    assert!(ledger.runtime.module.get_bid(&auction, &BIDDER_A).is_none());

    // Unfunded bidders have no account at all
    assert!(ledger.bid(auction, BIDDER_B, 10).is_err());
}

#[test]
fn test_decryption_rejections() {
    let mut ledger = Ledger::new(ModuleConfig::default());
    ledger.fund(BIDDER_A, 1_000);
    let auction = ledger.create(11, AuctionKind::FirstPrice, 0, START);
    ledger.bid(auction, BIDDER_A, 40).unwrap();

    let highest = ledger
        .runtime
        .module
        .get_auction(&auction)
        .unwrap()
        .highest_bid_handle;

    let err = ledger
        .decryption
        .decrypt(&ledger.runtime.ext.compute, OUTSIDER, vec![highest])
        .unwrap_err();
    assert_eq!(err.compute_error(), Some(&ComputeError::NotAllowed(highest)));

    let missing = Handle(0xdead_beef);
    let err = ledger
        .decryption
        .decrypt(&ledger.runtime.ext.compute, ORGANIZER, vec![highest, missing])
        .unwrap_err();
    assert_eq!(
        err.compute_error(),
        Some(&ComputeError::CiphertextNotFound(missing))
    );

    assert_eq!(
        ledger
            .decryption
            .decrypt(&ledger.runtime.ext.compute, ORGANIZER, Vec::new())
            .unwrap_err(),
        DecryptionError::EmptyRequest
    );
}

#[test]
fn test_start_time_in_past_rejected() {
    let mut ledger = Ledger::new(ModuleConfig::default());
    let call = AuctionCall::CreateAuction {
        auction_id: 12,
        asset: ASSET,
        bid_mint: MINT,
        start_time: START - 1,
        end_time: END,
        reserve_price: 0,
        kind: AuctionKind::FirstPrice,
        quantity: 1,
    };
    let err = protocol::submit(&mut ledger.runtime, ORGANIZER, call).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timing);
    assert_eq!(ledger.runtime.ext.assets.balance(&ORGANIZER, &ASSET), 5);
}

fn hex_short(address: &Address) -> String {
    address[..4].iter().map(|b| format!("{b:02x}")).collect()
}
