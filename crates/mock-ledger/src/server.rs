//! RPC surface of the mock ledger.

use std::fmt::Display;
use std::sync::Arc;

use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::ErrorObjectOwned;
use parking_lot::RwLock;
use tracing::{debug, info};

use cbid_compute::{ConfidentialCompute, Coprocessor, NetworkKey};
use cbid_decryption_service::DecryptionService;
use cbid_module::{protocol, queries, AuctionCall, AuctionError, CallOutcome, ModuleConfig, Runtime};
use cbid_types::rpc::{
    parse_address, parse_handle, AuctionRecordRpc, BidRecordRpc, BlockInfo, DecryptParams,
    DecryptResponseRpc, PredictedHandleRpc, SimulateParams, SubmitParams, SubmitResultRpc,
};
use cbid_types::{derive_token_account_address, AllowanceInput, Handle};

/// Shared ledger state.
pub struct ChainState {
    pub runtime: Runtime<Coprocessor>,
    pub decryption: DecryptionService,
}

impl ChainState {
    pub fn new(config: ModuleConfig, network_key: NetworkKey, timestamp: u64) -> Self {
        let mut runtime = Runtime::new(config, Coprocessor::new(network_key));
        runtime.set_timestamp(timestamp);
        Self {
            runtime,
            decryption: DecryptionService::new(),
        }
    }

    fn block_info(&self) -> BlockInfo {
        BlockInfo {
            height: self.runtime.block_height,
            timestamp: self.runtime.timestamp,
        }
    }
}

/// RPC API definition for the mock ledger.
#[rpc(server)]
pub trait MockLedgerApi {
    // ============ Admin Methods ============

    /// Advance the ledger by one block.
    #[method(name = "admin_advanceBlock")]
    async fn admin_advance_block(&self) -> Result<BlockInfo, ErrorObjectOwned>;

    /// Set the current timestamp (for testing time-dependent logic).
    #[method(name = "admin_setTimestamp")]
    async fn admin_set_timestamp(&self, timestamp: u64) -> Result<bool, ErrorObjectOwned>;

    // ============ External Programs ============

    #[method(name = "token_createMint")]
    async fn token_create_mint(
        &self,
        mint: String,
        authority: String,
        decimals: u8,
    ) -> Result<bool, ErrorObjectOwned>;

    /// Create the owner's account for a mint; returns its address.
    #[method(name = "token_createAccount")]
    async fn token_create_account(
        &self,
        owner: String,
        mint: String,
    ) -> Result<String, ErrorObjectOwned>;

    /// Mint to the owner's account; returns the new balance handle.
    #[method(name = "token_mint")]
    async fn token_mint(
        &self,
        authority: String,
        owner: String,
        mint: String,
        amount: u64,
    ) -> Result<String, ErrorObjectOwned>;

    /// Credit an asset balance; returns the new balance.
    #[method(name = "asset_deposit")]
    async fn asset_deposit(
        &self,
        holder: String,
        asset: String,
        quantity: u64,
    ) -> Result<u64, ErrorObjectOwned>;

    // ============ Auction Program ============

    /// Phase 1: execute without committing and report produced handles.
    #[method(name = "ledger_simulate")]
    async fn ledger_simulate(
        &self,
        params: SimulateParams,
    ) -> Result<Vec<PredictedHandleRpc>, ErrorObjectOwned>;

    /// Phase 2: execute with allowance inputs.
    #[method(name = "ledger_submit")]
    async fn ledger_submit(&self, params: SubmitParams) -> Result<SubmitResultRpc, ErrorObjectOwned>;

    // ============ Query Methods ============

    #[method(name = "chain_getBlockInfo")]
    async fn chain_get_block_info(&self) -> Result<BlockInfo, ErrorObjectOwned>;

    #[method(name = "query_getAuction")]
    async fn query_get_auction(
        &self,
        auction: String,
    ) -> Result<Option<AuctionRecordRpc>, ErrorObjectOwned>;

    #[method(name = "query_listAuctions")]
    async fn query_list_auctions(&self) -> Result<Vec<AuctionRecordRpc>, ErrorObjectOwned>;

    /// Auctions accepting bids at the current timestamp.
    #[method(name = "query_getOpenAuctions")]
    async fn query_get_open_auctions(&self) -> Result<Vec<AuctionRecordRpc>, ErrorObjectOwned>;

    #[method(name = "query_getBid")]
    async fn query_get_bid(
        &self,
        auction: String,
        bidder: String,
    ) -> Result<Option<BidRecordRpc>, ErrorObjectOwned>;

    #[method(name = "query_getAuctionBids")]
    async fn query_get_auction_bids(
        &self,
        auction: String,
    ) -> Result<Vec<BidRecordRpc>, ErrorObjectOwned>;

    // ============ Decryption ============

    #[method(name = "decrypt_request")]
    async fn decrypt_request(
        &self,
        params: DecryptParams,
    ) -> Result<DecryptResponseRpc, ErrorObjectOwned>;
}

/// Implementation of the mock ledger RPC server.
pub struct MockLedgerServer {
    state: Arc<RwLock<ChainState>>,
}

impl MockLedgerServer {
    pub fn new(state: ChainState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    fn rpc_error(msg: impl Display) -> ErrorObjectOwned {
        ErrorObjectOwned::owned(-32000, msg.to_string(), None::<()>)
    }

    /// Auction errors carry their category as error data.
    fn auction_error(e: AuctionError) -> ErrorObjectOwned {
        ErrorObjectOwned::owned(-32000, e.to_string(), Some(format!("{:?}", e.kind())))
    }

    fn parse_call(call: cbid_types::rpc::CallRpc) -> Result<AuctionCall, ErrorObjectOwned> {
        AuctionCall::try_from(call).map_err(Self::rpc_error)
    }
}

fn outcome_rpc(outcome: &CallOutcome) -> SubmitResultRpc {
    let handle = match outcome {
        CallOutcome::WinnerChecked { is_winner, .. } => Some(is_winner.to_string()),
        _ => None,
    };
    SubmitResultRpc {
        outcome: outcome.name().to_string(),
        address: Some(hex::encode(outcome.address())),
        handle,
    }
}

#[async_trait]
impl MockLedgerApiServer for MockLedgerServer {
    async fn admin_advance_block(&self) -> Result<BlockInfo, ErrorObjectOwned> {
        let mut state = self.state.write();
        state.runtime.advance_block();
        Ok(state.block_info())
    }

    async fn admin_set_timestamp(&self, timestamp: u64) -> Result<bool, ErrorObjectOwned> {
        let mut state = self.state.write();
        state.runtime.set_timestamp(timestamp);
        info!(timestamp, "Timestamp set");
        Ok(true)
    }

    async fn token_create_mint(
        &self,
        mint: String,
        authority: String,
        decimals: u8,
    ) -> Result<bool, ErrorObjectOwned> {
        let mint = parse_address("mint", &mint).map_err(Self::rpc_error)?;
        let authority = parse_address("authority", &authority).map_err(Self::rpc_error)?;

        let mut state = self.state.write();
        state
            .runtime
            .ext
            .tokens
            .create_mint(mint, authority, decimals)
            .map_err(Self::rpc_error)?;
        info!(mint = %hex::encode(mint), "Mint created");
        Ok(true)
    }

    async fn token_create_account(
        &self,
        owner: String,
        mint: String,
    ) -> Result<String, ErrorObjectOwned> {
        let owner = parse_address("owner", &owner).map_err(Self::rpc_error)?;
        let mint = parse_address("mint", &mint).map_err(Self::rpc_error)?;

        let mut state = self.state.write();
        let ext = &mut state.runtime.ext;
        let account = ext
            .tokens
            .create_account(&mut ext.compute, owner, mint)
            .map_err(Self::rpc_error)?;
        Ok(hex::encode(account))
    }

    async fn token_mint(
        &self,
        authority: String,
        owner: String,
        mint: String,
        amount: u64,
    ) -> Result<String, ErrorObjectOwned> {
        let authority = parse_address("authority", &authority).map_err(Self::rpc_error)?;
        let owner = parse_address("owner", &owner).map_err(Self::rpc_error)?;
        let mint = parse_address("mint", &mint).map_err(Self::rpc_error)?;
        let account = derive_token_account_address(&owner, &mint);

        let mut state = self.state.write();
        let ext = &mut state.runtime.ext;
        let amount = ext.compute.as_encrypted(u128::from(amount));
        let balance = ext
            .tokens
            .mint_to(&mut ext.compute, &authority, &account, amount)
            .map_err(Self::rpc_error)?;

        // The owner may always read their own balance
        let grant = AllowanceInput::for_handle(balance, owner);
        ext.compute
            .grant(&grant.allowance_address, balance, &owner)
            .map_err(Self::rpc_error)?;
        Ok(balance.to_string())
    }

    async fn asset_deposit(
        &self,
        holder: String,
        asset: String,
        quantity: u64,
    ) -> Result<u64, ErrorObjectOwned> {
        let holder = parse_address("holder", &holder).map_err(Self::rpc_error)?;
        let asset = parse_address("asset", &asset).map_err(Self::rpc_error)?;

        let mut state = self.state.write();
        state.runtime.ext.assets.deposit(holder, asset, quantity);
        Ok(state.runtime.ext.assets.balance(&holder, &asset))
    }

    async fn ledger_simulate(
        &self,
        params: SimulateParams,
    ) -> Result<Vec<PredictedHandleRpc>, ErrorObjectOwned> {
        let sender = parse_address("sender", &params.sender).map_err(Self::rpc_error)?;
        let call = Self::parse_call(params.call)?;

        let state = self.state.read();
        let predicted =
            protocol::plan(&state.runtime, sender, &call).map_err(Self::auction_error)?;
        debug!(call = call.name(), handles = predicted.len(), "Simulated");
        Ok(predicted.iter().map(PredictedHandleRpc::from).collect())
    }

    async fn ledger_submit(&self, params: SubmitParams) -> Result<SubmitResultRpc, ErrorObjectOwned> {
        let sender = parse_address("sender", &params.sender).map_err(Self::rpc_error)?;
        let call = Self::parse_call(params.call)?;
        let allowances = params
            .allowances
            .iter()
            .map(|a| {
                Ok(AllowanceInput {
                    allowance_address: parse_address("allowance_address", &a.allowance_address)?,
                    grantee: parse_address("grantee", &a.grantee)?,
                })
            })
            .collect::<Result<Vec<_>, cbid_types::rpc::WireError>>()
            .map_err(Self::rpc_error)?;

        if call.produces_handles() && allowances.is_empty() {
            return Err(Self::auction_error(AuctionError::MissingPrediction));
        }

        let mut state = self.state.write();
        let outcome = state
            .runtime
            .dispatch(sender, call, &allowances)
            .map_err(Self::auction_error)?;
        Ok(outcome_rpc(&outcome))
    }

    async fn chain_get_block_info(&self) -> Result<BlockInfo, ErrorObjectOwned> {
        Ok(self.state.read().block_info())
    }

    async fn query_get_auction(
        &self,
        auction: String,
    ) -> Result<Option<AuctionRecordRpc>, ErrorObjectOwned> {
        let auction = parse_address("auction", &auction).map_err(Self::rpc_error)?;
        let state = self.state.read();
        Ok(state
            .runtime
            .module
            .get_auction(&auction)
            .map(AuctionRecordRpc::from))
    }

    async fn query_list_auctions(&self) -> Result<Vec<AuctionRecordRpc>, ErrorObjectOwned> {
        let state = self.state.read();
        let module = &state.runtime.module;
        Ok(queries::get_auction_summaries(module, 0, usize::MAX)
            .iter()
            .filter_map(|s| module.get_auction(&s.address))
            .map(AuctionRecordRpc::from)
            .collect())
    }

    async fn query_get_open_auctions(&self) -> Result<Vec<AuctionRecordRpc>, ErrorObjectOwned> {
        let state = self.state.read();
        let module = &state.runtime.module;
        Ok(queries::get_active_auctions(module, state.runtime.timestamp)
            .iter()
            .filter_map(|s| module.get_auction(&s.address))
            .map(AuctionRecordRpc::from)
            .collect())
    }

    async fn query_get_bid(
        &self,
        auction: String,
        bidder: String,
    ) -> Result<Option<BidRecordRpc>, ErrorObjectOwned> {
        let auction = parse_address("auction", &auction).map_err(Self::rpc_error)?;
        let bidder = parse_address("bidder", &bidder).map_err(Self::rpc_error)?;
        let state = self.state.read();
        Ok(state
            .runtime
            .module
            .get_bid(&auction, &bidder)
            .map(BidRecordRpc::from))
    }

    async fn query_get_auction_bids(
        &self,
        auction: String,
    ) -> Result<Vec<BidRecordRpc>, ErrorObjectOwned> {
        let auction = parse_address("auction", &auction).map_err(Self::rpc_error)?;
        let state = self.state.read();
        Ok(state
            .runtime
            .module
            .get_auction_bids(&auction)
            .into_iter()
            .map(BidRecordRpc::from)
            .collect())
    }

    async fn decrypt_request(
        &self,
        params: DecryptParams,
    ) -> Result<DecryptResponseRpc, ErrorObjectOwned> {
        let requester = parse_address("requester", &params.requester).map_err(Self::rpc_error)?;
        let handles = params
            .handles
            .iter()
            .map(|h| parse_handle(h))
            .collect::<Result<Vec<Handle>, _>>()
            .map_err(Self::rpc_error)?;

        let mut state = self.state.write();
        let ChainState {
            runtime,
            decryption,
        } = &mut *state;
        let response = decryption
            .decrypt(&runtime.ext.compute, requester, handles)
            .map_err(Self::rpc_error)?;
        Ok(DecryptResponseRpc::from(&response))
    }
}
