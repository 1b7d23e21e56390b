//! Confidential-compute layer for sealed-bid auctions.
//!
//! The auction program never sees plaintext. Every comparison, addition and
//! decryption is a call into this layer, which hands back opaque [`Handle`]s.
//!
//! # Overview
//!
//! 1. **Ingestion**: clients seal a value into an envelope
//!    ([`envelope::seal`]); the coprocessor opens it and issues a handle.
//! 2. **Evaluation**: programs combine handles (`compare_max`, `select`, ...)
//!    and receive new handles. Existing handles are never mutated.
//! 3. **Allowances**: a program writes an [`AllowanceGrant`] at the address
//!    derived from (handle, grantee).
//! 4. **Decryption**: the layer releases plaintext only to a grantee.
//!
//! [`AllowanceGrant`]: cbid_types::AllowanceGrant

pub mod allowance;
pub mod coprocessor;
pub mod envelope;
pub mod error;

use cbid_types::{Address, Handle};

pub use allowance::AllowanceRegistry;
pub use coprocessor::Coprocessor;
pub use envelope::{open, seal, NetworkKey, DEV_NETWORK_KEY, ENVELOPE_LEN};
pub use error::ComputeError;

/// Result type for compute operations.
pub type ComputeResult<T> = Result<T, ComputeError>;

/// Operations the auction program consumes from the compute layer.
pub trait ConfidentialCompute {
    /// Ingest a client ciphertext submitted by `signer`.
    fn new_encrypted(
        &mut self,
        ciphertext: &[u8],
        input_type: u8,
        signer: &Address,
    ) -> ComputeResult<Handle>;

    /// Trivially encrypt a public value.
    fn as_encrypted(&mut self, value: u128) -> Handle;

    fn add(&mut self, a: Handle, b: Handle) -> ComputeResult<Handle>;

    /// Subtract, failing with [`ComputeError::Underflow`] instead of wrapping.
    fn checked_sub(&mut self, a: Handle, b: Handle) -> ComputeResult<Handle>;

    /// Encrypted maximum. On equal values the first operand wins.
    fn compare_max(&mut self, a: Handle, b: Handle) -> ComputeResult<Handle>;

    fn compare_min(&mut self, a: Handle, b: Handle) -> ComputeResult<Handle>;

    /// Encrypted boolean `a == b`.
    fn compare_eq(&mut self, a: Handle, b: Handle) -> ComputeResult<Handle>;

    /// Encrypted boolean `a >= b`.
    fn compare_ge(&mut self, a: Handle, b: Handle) -> ComputeResult<Handle>;

    /// Encrypted boolean `a > b`.
    fn compare_gt(&mut self, a: Handle, b: Handle) -> ComputeResult<Handle>;

    fn and(&mut self, a: Handle, b: Handle) -> ComputeResult<Handle>;

    fn select(&mut self, condition: Handle, if_true: Handle, if_false: Handle)
        -> ComputeResult<Handle>;

    /// Write an allowance for `grantee` at `allowance_address`.
    fn grant(
        &mut self,
        allowance_address: &Address,
        handle: Handle,
        grantee: &Address,
    ) -> ComputeResult<()>;

    fn is_allowed(&self, handle: Handle, grantee: &Address) -> bool;

    /// Release plaintext to an allowed requester.
    fn decrypt(&self, handle: Handle, requester: &Address) -> ComputeResult<u128>;
}
