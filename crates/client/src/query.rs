//! Query functions for auction state.

use anyhow::Result;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::HttpClient;

use cbid_types::rpc::{
    AuctionRecordRpc, BidRecordRpc, BlockInfo, DecryptParams, DecryptResponseRpc,
};

/// Read-only access to a ledger endpoint.
pub struct QueryClient<'a> {
    client: &'a HttpClient,
}

impl<'a> QueryClient<'a> {
    pub fn new(client: &'a HttpClient) -> Self {
        Self { client }
    }

    pub async fn block_info(&self) -> Result<BlockInfo> {
        Ok(self
            .client
            .request("chain_getBlockInfo", Vec::<()>::new())
            .await?)
    }

    pub async fn get_auction(&self, auction: &str) -> Result<Option<AuctionRecordRpc>> {
        Ok(self
            .client
            .request("query_getAuction", vec![auction])
            .await?)
    }

    pub async fn list_auctions(&self) -> Result<Vec<AuctionRecordRpc>> {
        Ok(self
            .client
            .request("query_listAuctions", Vec::<()>::new())
            .await?)
    }

    /// Auctions accepting bids at the ledger's current time.
    pub async fn open_auctions(&self) -> Result<Vec<AuctionRecordRpc>> {
        Ok(self
            .client
            .request("query_getOpenAuctions", Vec::<()>::new())
            .await?)
    }

    pub async fn get_bid(&self, auction: &str, bidder: &str) -> Result<Option<BidRecordRpc>> {
        Ok(self
            .client
            .request("query_getBid", (auction, bidder))
            .await?)
    }

    pub async fn get_auction_bids(&self, auction: &str) -> Result<Vec<BidRecordRpc>> {
        Ok(self
            .client
            .request("query_getAuctionBids", vec![auction])
            .await?)
    }

    /// Request plaintext for handles the requester has been granted.
    pub async fn decrypt(&self, requester: &str, handles: Vec<String>) -> Result<DecryptResponseRpc> {
        let params = DecryptParams {
            requester: requester.to_string(),
            handles,
        };
        Ok(self.client.request("decrypt_request", vec![params]).await?)
    }
}
