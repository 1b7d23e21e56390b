//! CLI for interacting with confidential sealed-bid auctions.
//!
//! This binary provides commands for:
//! - Creating and closing auctions
//! - Submitting encrypted bids
//! - Checking winners and decrypting granted handles
//! - Querying auction status
//! - Driving the mock ledger (clock, mints, accounts, assets)

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use rand::rngs::OsRng;
use tracing::info;

use cbid_client::{create_bid, QueryClient, TwoPhaseSubmitter};
use cbid_compute::{NetworkKey, DEV_NETWORK_KEY};
use cbid_types::rpc::{parse_address, BlockInfo, CallRpc, SubmitResultRpc};
use cbid_types::InputType;

#[derive(Parser)]
#[command(name = "cbid-cli")]
#[command(about = "CLI for confidential sealed-bid auctions")]
struct Cli {
    /// Mock ledger RPC endpoint
    #[arg(long, default_value = "http://127.0.0.1:9944")]
    rpc: String,

    /// Coprocessor network key (hex); defaults to the development key
    #[arg(long)]
    network_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new auction
    CreateAuction {
        /// Organizer address (hex)
        #[arg(long)]
        sender: String,

        /// Organizer-chosen auction id
        #[arg(long)]
        auction_id: u64,

        /// Asset descriptor (hex)
        #[arg(long)]
        asset: String,

        /// Quantity of the asset to escrow
        #[arg(long, default_value = "1")]
        quantity: u64,

        /// Confidential mint bids are paid in (hex)
        #[arg(long)]
        bid_mint: String,

        /// Start time (unix timestamp)
        #[arg(long)]
        start_time: u64,

        /// End time (unix timestamp)
        #[arg(long)]
        end_time: u64,

        /// Reserve price
        #[arg(long, default_value = "0")]
        reserve_price: u64,

        /// Auction kind: first_price or vickrey
        #[arg(long, default_value = "first_price")]
        kind: String,
    },

    /// Submit an encrypted bid
    Bid {
        /// Bidder address (hex)
        #[arg(long)]
        sender: String,

        /// Auction address (hex)
        #[arg(long)]
        auction: String,

        /// Bid amount (will be encrypted)
        #[arg(long)]
        amount: u128,
    },

    /// Close an auction (organizer only)
    Close {
        #[arg(long)]
        sender: String,

        #[arg(long)]
        auction: String,
    },

    /// Compute the sender's winner flag and decrypt it
    CheckWinner {
        #[arg(long)]
        sender: String,

        #[arg(long)]
        auction: String,
    },

    /// Decrypt handles granted to the requester
    Decrypt {
        #[arg(long)]
        requester: String,

        /// Handles (decimal)
        #[arg(long, num_args = 1.., required = true)]
        handles: Vec<String>,
    },

    /// Get auction details
    GetAuction {
        #[arg(long)]
        auction: String,
    },

    /// List all auctions
    ListAuctions,

    /// List auctions accepting bids now
    OpenAuctions,

    /// Get bids for an auction
    GetBids {
        #[arg(long)]
        auction: String,
    },

    /// Register a confidential mint (mock ledger)
    CreateMint {
        #[arg(long)]
        mint: String,

        #[arg(long)]
        authority: String,

        #[arg(long, default_value = "6")]
        decimals: u8,
    },

    /// Create a confidential token account (mock ledger)
    CreateAccount {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        mint: String,
    },

    /// Mint confidential tokens to an owner's account (mock ledger)
    Mint {
        #[arg(long)]
        authority: String,

        #[arg(long)]
        owner: String,

        #[arg(long)]
        mint: String,

        #[arg(long)]
        amount: u64,
    },

    /// Credit an asset balance (mock ledger)
    DepositAsset {
        #[arg(long)]
        holder: String,

        #[arg(long)]
        asset: String,

        #[arg(long)]
        quantity: u64,
    },

    /// Advance ledger time by one block
    AdvanceBlock,

    /// Set ledger timestamp
    SetTimestamp {
        #[arg(long)]
        timestamp: u64,
    },

    /// Show current block
    BlockInfo,
}

fn print_result(result: &SubmitResultRpc) {
    println!("Outcome: {}", result.outcome);
    if let Some(address) = &result.address {
        println!("  Address: {}", address);
    }
    if let Some(handle) = &result.handle {
        println!("  Handle: {}", handle);
    }
}

async fn bid_cmd(
    client: &HttpClient,
    network_key: &NetworkKey,
    sender: &str,
    auction: &str,
    amount: u128,
) -> Result<()> {
    let bidder = parse_address("sender", sender)?;
    let auction_address = parse_address("auction", auction)?;

    let prepared = create_bid(network_key, &bidder, amount, &mut OsRng)?;
    let result = TwoPhaseSubmitter::new(client)
        .submit(sender, prepared.to_call(&auction_address))
        .await?;

    info!(auction, "Bid submitted");
    println!("Bid submitted (amount encrypted)");
    print_result(&result);
    Ok(())
}

async fn check_winner_cmd(client: &HttpClient, sender: &str, auction: &str) -> Result<()> {
    let call = CallRpc::CheckWinner {
        auction: auction.to_string(),
        input_type: InputType::CIPHERTEXT,
    };
    let result = TwoPhaseSubmitter::new(client).submit(sender, call).await?;
    let handle = result
        .handle
        .clone()
        .ok_or_else(|| anyhow!("Ledger returned no winner handle"))?;

    let response = QueryClient::new(client).decrypt(sender, vec![handle]).await?;
    let is_winner = response.plaintexts.first().map(|p| p == "1").unwrap_or(false);
    println!("Winner: {}", is_winner);
    Ok(())
}

async fn get_auction_cmd(client: &HttpClient, auction: &str) -> Result<()> {
    match QueryClient::new(client).get_auction(auction).await? {
        Some(a) => {
            println!("Auction {}:", a.address);
            println!("  Organizer: {}", a.organizer);
            println!("  Id: {}", a.auction_id);
            println!("  Kind: {}", a.kind);
            println!("  Status: {}", a.status);
            println!("  Start: {}", a.start_time);
            println!("  End: {}", a.end_time);
            println!("  Reserve: {}", a.reserve_price);
            println!("  Bids: {}", a.bid_count);
            println!("  Highest bid handle: {}", a.highest_bid_handle);
            if let Some(second) = a.second_highest_bid_handle {
                println!("  Second-highest handle: {}", second);
            }
            println!("  Reserve-met handle: {}", a.reserve_met_handle);
        }
        None => {
            println!("Auction {} not found", auction);
        }
    }
    Ok(())
}

async fn list_auctions_cmd(client: &HttpClient, open_only: bool) -> Result<()> {
    let query = QueryClient::new(client);
    let auctions = if open_only {
        query.open_auctions().await?
    } else {
        query.list_auctions().await?
    };

    if auctions.is_empty() {
        println!("No auctions found");
    } else {
        println!("Auctions:");
        for a in auctions {
            println!(
                "  [{}] {} - {} ({} bids)",
                a.address, a.kind, a.status, a.bid_count
            );
        }
    }
    Ok(())
}

async fn get_bids_cmd(client: &HttpClient, auction: &str) -> Result<()> {
    let bids = QueryClient::new(client).get_auction_bids(auction).await?;

    if bids.is_empty() {
        println!("No bids for auction {}", auction);
    } else {
        println!("Bids for auction {}:", auction);
        for (i, bid) in bids.iter().enumerate() {
            println!("  [{}] Bidder: {}", i, bid.bidder);
            println!("      Amount handle: {}", bid.amount_handle);
            println!("      Submitted at: {}", bid.submitted_at);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cbid_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let client = HttpClientBuilder::default().build(&cli.rpc)?;
    let network_key = match &cli.network_key {
        Some(hex_key) => NetworkKey(parse_address("network_key", hex_key)?),
        None => DEV_NETWORK_KEY,
    };

    match cli.command {
        Commands::CreateAuction {
            sender,
            auction_id,
            asset,
            quantity,
            bid_mint,
            start_time,
            end_time,
            reserve_price,
            kind,
        } => {
            let call = CallRpc::CreateAuction {
                auction_id,
                asset,
                bid_mint,
                start_time,
                end_time,
                reserve_price,
                kind,
                quantity,
            };
            let result = TwoPhaseSubmitter::new(&client).submit(&sender, call).await?;
            print_result(&result);
        }

        Commands::Bid {
            sender,
            auction,
            amount,
        } => {
            bid_cmd(&client, &network_key, &sender, &auction, amount).await?;
        }

        Commands::Close { sender, auction } => {
            let call = CallRpc::CloseAuction { auction };
            let result = TwoPhaseSubmitter::new(&client).submit(&sender, call).await?;
            print_result(&result);
        }

        Commands::CheckWinner { sender, auction } => {
            check_winner_cmd(&client, &sender, &auction).await?;
        }

        Commands::Decrypt { requester, handles } => {
            let response = QueryClient::new(&client).decrypt(&requester, handles).await?;
            println!("Request {}:", response.request_id);
            for (plaintext, attestation) in response.plaintexts.iter().zip(&response.attestations) {
                println!("  {} (attestation {})", plaintext, attestation);
            }
        }

        Commands::GetAuction { auction } => {
            get_auction_cmd(&client, &auction).await?;
        }

        Commands::ListAuctions => {
            list_auctions_cmd(&client, false).await?;
        }

        Commands::OpenAuctions => {
            list_auctions_cmd(&client, true).await?;
        }

        Commands::GetBids { auction } => {
            get_bids_cmd(&client, &auction).await?;
        }

        Commands::CreateMint {
            mint,
            authority,
            decimals,
        } => {
            let _: bool = client
                .request("token_createMint", (mint.as_str(), authority.as_str(), decimals))
                .await?;
            println!("Mint {} created", mint);
        }

        Commands::CreateAccount { owner, mint } => {
            let account: String = client
                .request("token_createAccount", (owner.as_str(), mint.as_str()))
                .await?;
            println!("Account: {}", account);
        }

        Commands::Mint {
            authority,
            owner,
            mint,
            amount,
        } => {
            let balance: String = client
                .request(
                    "token_mint",
                    (authority.as_str(), owner.as_str(), mint.as_str(), amount),
                )
                .await?;
            println!("Minted; balance handle {}", balance);
        }

        Commands::DepositAsset {
            holder,
            asset,
            quantity,
        } => {
            let balance: u64 = client
                .request("asset_deposit", (holder.as_str(), asset.as_str(), quantity))
                .await?;
            println!("Asset balance: {}", balance);
        }

        Commands::AdvanceBlock => {
            let info: BlockInfo = client.request("admin_advanceBlock", Vec::<()>::new()).await?;
            println!("Block advanced: height={}, timestamp={}", info.height, info.timestamp);
        }

        Commands::SetTimestamp { timestamp } => {
            let _: bool = client.request("admin_setTimestamp", vec![timestamp]).await?;
            println!("Timestamp set to {}", timestamp);
        }

        Commands::BlockInfo => {
            let info = QueryClient::new(&client).block_info().await?;
            println!("height={}, timestamp={}", info.height, info.timestamp);
        }
    }

    Ok(())
}
