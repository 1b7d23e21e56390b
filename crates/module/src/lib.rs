//! Confidential sealed-bid auction program.
//!
//! Bids are submitted as encrypted amounts and stay encrypted for the life
//! of the auction. The program tracks the highest bid (and, for Vickrey
//! auctions, the second-highest) through the confidential-compute layer and
//! only ever holds handles.
//!
//! - Auction creation with asset escrow into a program-owned vault
//! - Encrypted bid submission, debited from a confidential token account
//! - Organizer-only close after the bidding window
//! - Per-bidder encrypted winner flags
//! - Allowance grants so each party can decrypt exactly what it should
//!
//! # Architecture
//!
//! - `call`: Message types for state-changing operations
//! - `handlers`: Business logic for processing calls
//! - `engine`: Encrypted max/second-max bookkeeping
//! - `protocol`: Two-phase (discover, commit) submission and grant plans
//! - `runtime`: Atomic execution over module state and external programs
//! - `queries`: Read-only state access
//! - `state`: Ledger state structures
//! - `config`: Module configuration
//! - `events`: Emitted events
//! - `error`: Error types
//!
//! # Example
//!
//! ```ignore
//! use cbid_module::{protocol, AuctionCall, ModuleConfig, Runtime};
//!
//! let mut runtime = Runtime::new(ModuleConfig::default(), coprocessor);
//!
//! // Discover the handles a bid will produce, then commit with allowances
//! let predicted = protocol::plan(&runtime, bidder, &call)?;
//! protocol::commit(&mut runtime, bidder, call, &predicted)?;
//! ```

pub mod call;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod handlers;
pub mod protocol;
pub mod queries;
pub mod runtime;
pub mod state;

pub use call::AuctionCall;
pub use config::{ConfigError, DuplicateBidPolicy, ModuleConfig};
pub use error::{AuctionError, ErrorKind};
pub use events::AuctionEvent;
pub use handlers::{CallContext, HandlerResult};
pub use protocol::{HandleSlot, PredictedHandle, PredictedHandles};
pub use queries::{AuctionQuery, AuctionQueryResponse, AuctionSummary};
pub use runtime::{CallOutcome, Externals, Runtime, Simulation};
pub use state::ModuleState;
