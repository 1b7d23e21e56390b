//! Execution environment for the auction module.
//!
//! The runtime bundles the module state with the external programs the
//! handlers call into (compute, confidential tokens, asset custody) and the
//! ledger clock. Calls are atomic: a call runs against a copy and the copy
//! replaces the live state only when the handler returns `Ok`.

use tracing::{info, warn};

use cbid_compute::ConfidentialCompute;
use cbid_token::{AssetLedger, ConfidentialTokenLedger};
use cbid_types::{Address, AllowanceInput, Handle};

use crate::call::AuctionCall;
use crate::config::ModuleConfig;
use crate::handlers::{self, CallContext, HandlerResult};
use crate::state::ModuleState;

/// Seconds added to the clock per block.
pub const BLOCK_TIME_SECS: u64 = 6;

/// Programs the auction module calls into.
#[derive(Clone, Debug)]
pub struct Externals<C> {
    pub compute: C,
    pub tokens: ConfidentialTokenLedger,
    pub assets: AssetLedger,
}

/// What a successful call produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallOutcome {
    AuctionCreated { auction: Address },
    BidPlaced { bid: Address },
    AuctionClosed { auction: Address },
    WinnerChecked { bid: Address, is_winner: Handle },
}

impl CallOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            CallOutcome::AuctionCreated { .. } => "auction_created",
            CallOutcome::BidPlaced { .. } => "bid_placed",
            CallOutcome::AuctionClosed { .. } => "auction_closed",
            CallOutcome::WinnerChecked { .. } => "winner_checked",
        }
    }

    /// Record address the outcome refers to.
    pub fn address(&self) -> Address {
        match self {
            CallOutcome::AuctionCreated { auction } | CallOutcome::AuctionClosed { auction } => {
                *auction
            }
            CallOutcome::BidPlaced { bid } | CallOutcome::WinnerChecked { bid, .. } => *bid,
        }
    }
}

/// Result of a discovery run: the outcome and the post-execution image.
#[derive(Clone, Debug)]
pub struct Simulation<C> {
    pub outcome: CallOutcome,
    pub image: Runtime<C>,
}

/// Ledger runtime hosting the auction module.
#[derive(Clone, Debug)]
pub struct Runtime<C> {
    pub module: ModuleState,
    pub ext: Externals<C>,
    pub block_height: u64,
    pub timestamp: u64,
}

impl<C: ConfidentialCompute + Clone> Runtime<C> {
    pub fn new(config: ModuleConfig, compute: C) -> Self {
        Self {
            module: ModuleState::new(config),
            ext: Externals {
                compute,
                tokens: ConfidentialTokenLedger::new(),
                assets: AssetLedger::new(),
            },
            block_height: 1,
            timestamp: 0,
        }
    }

    pub fn context(&self, sender: Address) -> CallContext {
        CallContext {
            sender,
            block_height: self.block_height,
            timestamp: self.timestamp,
        }
    }

    pub fn advance_block(&mut self) {
        self.block_height += 1;
        self.timestamp += BLOCK_TIME_SECS;
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    /// Execute a call atomically.
    pub fn dispatch(
        &mut self,
        sender: Address,
        call: AuctionCall,
        allowances: &[AllowanceInput],
    ) -> HandlerResult<CallOutcome> {
        let name = call.name();
        let mut next = self.clone();
        match next.apply(sender, call, allowances) {
            Ok(outcome) => {
                *self = next;
                info!(call = name, sender = %hex::encode(sender), "Call committed");
                Ok(outcome)
            }
            Err(e) => {
                warn!(call = name, sender = %hex::encode(sender), error = %e, "Call rejected");
                Err(e)
            }
        }
    }

    /// Execute a call against a copy, without allowance inputs.
    pub fn simulate(&self, sender: Address, call: AuctionCall) -> HandlerResult<Simulation<C>> {
        let mut image = self.clone();
        let outcome = image.apply(sender, call, &[])?;
        Ok(Simulation { outcome, image })
    }

    fn apply(
        &mut self,
        sender: Address,
        call: AuctionCall,
        allowances: &[AllowanceInput],
    ) -> HandlerResult<CallOutcome> {
        let ctx = self.context(sender);
        let state = &mut self.module;
        let ext = &mut self.ext;

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
            } => handlers::handle_create_auction(
                state,
                ext,
                &ctx,
                auction_id,
                asset,
                bid_mint,
                start_time,
                end_time,
                reserve_price,
                kind,
                quantity,
            )
            .map(|auction| CallOutcome::AuctionCreated { auction }),

            AuctionCall::PlaceBid {
                auction,
                ciphertext,
                input_type,
            } => handlers::handle_place_bid(
                state,
                ext,
                &ctx,
                auction,
                &ciphertext,
                input_type,
                allowances,
            )
            .map(|bid| CallOutcome::BidPlaced { bid }),

            AuctionCall::CheckWinner {
                auction,
                input_type,
            } => {
                let is_winner =
                    handlers::handle_check_winner(state, ext, &ctx, auction, input_type, allowances)?;
                let bid = cbid_types::derive_bid_address(&auction, &sender);
                Ok(CallOutcome::WinnerChecked { bid, is_winner })
            }

            AuctionCall::CloseAuction { auction } => {
                handlers::handle_close_auction(state, &ctx, auction)
                    .map(|()| CallOutcome::AuctionClosed { auction })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuctionError;
    use cbid_compute::{Coprocessor, NetworkKey};
    use cbid_types::{derive_auction_address, AuctionKind};

    const ORGANIZER: Address = [1u8; 32];

    fn runtime() -> Runtime<Coprocessor> {
        let mut rt = Runtime::new(ModuleConfig::default(), Coprocessor::new(NetworkKey([1u8; 32])));
        rt.ext.tokens.create_mint([20u8; 32], ORGANIZER, 6).unwrap();
        rt.ext.assets.deposit(ORGANIZER, [21u8; 32], 1);
        rt
    }

    fn create_call(start_time: u64, quantity: u64) -> AuctionCall {
        AuctionCall::CreateAuction {
            auction_id: 3,
            asset: [21u8; 32],
            bid_mint: [20u8; 32],
            start_time,
            end_time: start_time + 60,
            reserve_price: 0,
            kind: AuctionKind::FirstPrice,
            quantity,
        }
    }

    #[test]
    fn test_advance_block() {
        let mut rt = runtime();
        rt.set_timestamp(100);
        rt.advance_block();
        assert_eq!(rt.block_height, 2);
        assert_eq!(rt.timestamp, 100 + BLOCK_TIME_SECS);
    }

    #[test]
    fn test_dispatch_commits_on_success() {
        let mut rt = runtime();
        let outcome = rt.dispatch(ORGANIZER, create_call(0, 1), &[]).unwrap();

        let expected = derive_auction_address(&ORGANIZER, 3);
        assert_eq!(outcome, CallOutcome::AuctionCreated { auction: expected });
        assert_eq!(outcome.address(), expected);
        assert!(rt.module.get_auction(&expected).is_some());
    }

    #[test]
    fn test_dispatch_rolls_back_on_failure() {
        let mut rt = runtime();
        let err = rt.dispatch(ORGANIZER, create_call(0, 2), &[]).unwrap_err();

        assert!(matches!(err, AuctionError::InsufficientAssetBalance { .. }));
        assert!(rt.module.auctions.is_empty());
        assert!(rt.module.events.is_empty());
        assert_eq!(rt.ext.assets.balance(&ORGANIZER, &[21u8; 32]), 1);
    }

    #[test]
    fn test_simulate_leaves_runtime_untouched() {
        let rt = runtime();
        let simulation = rt.simulate(ORGANIZER, create_call(0, 1)).unwrap();

        assert_eq!(simulation.outcome.name(), "auction_created");
        assert_eq!(simulation.image.module.auctions.len(), 1);
        assert!(rt.module.auctions.is_empty());
    }
}
