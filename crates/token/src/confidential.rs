//! Confidential token ledger.
//!
//! Balances are handles. Transfers are evaluated by the compute layer, which
//! refuses an encrypted subtraction that would go negative; that refusal
//! surfaces here as [`TokenError::InsufficientBalance`].

use std::collections::HashMap;

use tracing::debug;

use cbid_compute::{ComputeError, ConfidentialCompute};
use cbid_types::{derive_token_account_address, Address, Handle};

use crate::error::TokenError;
use crate::TokenResult;

/// A confidential mint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfidentialMint {
    pub authority: Address,
    pub decimals: u8,
}

/// A confidential token account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfidentialAccount {
    pub owner: Address,
    pub mint: Address,
    pub balance: Handle,
}

/// Mints and accounts of the confidential token program.
#[derive(Clone, Debug, Default)]
pub struct ConfidentialTokenLedger {
    mints: HashMap<Address, ConfidentialMint>,
    accounts: HashMap<Address, ConfidentialAccount>,
}

impl ConfidentialTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mint at `mint`.
    pub fn create_mint(&mut self, mint: Address, authority: Address, decimals: u8) -> TokenResult<()> {
        if self.mints.contains_key(&mint) {
            return Err(TokenError::MintExists(hex::encode(mint)));
        }
        self.mints.insert(mint, ConfidentialMint { authority, decimals });
        Ok(())
    }

    pub fn mint(&self, mint: &Address) -> Option<&ConfidentialMint> {
        self.mints.get(mint)
    }

    pub fn is_mint(&self, mint: &Address) -> bool {
        self.mints.contains_key(mint)
    }

    /// Create the owner's account for `mint` at its derived address.
    ///
    /// Idempotent: an existing account is returned unchanged.
    pub fn create_account<C: ConfidentialCompute>(
        &mut self,
        compute: &mut C,
        owner: Address,
        mint: Address,
    ) -> TokenResult<Address> {
        let address = derive_token_account_address(&owner, &mint);
        self.create_account_at(compute, address, owner, mint)?;
        Ok(address)
    }

    /// Create an account at an explicit address, e.g. a program-derived vault.
    pub fn create_account_at<C: ConfidentialCompute>(
        &mut self,
        compute: &mut C,
        address: Address,
        owner: Address,
        mint: Address,
    ) -> TokenResult<()> {
        if !self.mints.contains_key(&mint) {
            return Err(TokenError::MintNotFound(hex::encode(mint)));
        }
        if let Some(existing) = self.accounts.get(&address) {
            if existing.mint != mint {
                return Err(TokenError::MintMismatch);
            }
            if existing.owner != owner {
                return Err(TokenError::OwnerMismatch);
            }
            return Ok(());
        }

        let balance = compute.as_encrypted(0);
        self.accounts.insert(address, ConfidentialAccount { owner, mint, balance });
        debug!(account = %hex::encode(address), "Created confidential account");
        Ok(())
    }

    pub fn account(&self, address: &Address) -> TokenResult<&ConfidentialAccount> {
        self.accounts
            .get(address)
            .ok_or_else(|| TokenError::AccountNotFound(hex::encode(address)))
    }

    /// Current balance handle of an account.
    pub fn account_handle(&self, address: &Address) -> TokenResult<Handle> {
        Ok(self.account(address)?.balance)
    }

    /// Credit an encrypted amount, signed by the mint authority.
    pub fn mint_to<C: ConfidentialCompute>(
        &mut self,
        compute: &mut C,
        authority: &Address,
        account: &Address,
        amount: Handle,
    ) -> TokenResult<Handle> {
        let target = self.account(account)?.clone();
        let mint = self
            .mints
            .get(&target.mint)
            .ok_or_else(|| TokenError::MintNotFound(hex::encode(target.mint)))?;
        if mint.authority != *authority {
            return Err(TokenError::NotMintAuthority);
        }

        let balance = compute.add(target.balance, amount)?;
        self.set_balance(account, balance);
        Ok(balance)
    }

    /// Move an encrypted amount from `source` to `destination`.
    ///
    /// `authority` must own the source account. Returns the new source balance.
    pub fn debit<C: ConfidentialCompute>(
        &mut self,
        compute: &mut C,
        authority: &Address,
        source: &Address,
        destination: &Address,
        amount: Handle,
    ) -> TokenResult<Handle> {
        let from = self.account(source)?.clone();
        let to = self.account(destination)?.clone();

        if from.owner != *authority {
            return Err(TokenError::OwnerMismatch);
        }
        if from.mint != to.mint {
            return Err(TokenError::MintMismatch);
        }

        let new_source = compute
            .checked_sub(from.balance, amount)
            .map_err(|e| match e {
                ComputeError::Underflow => TokenError::InsufficientBalance,
                other => TokenError::Compute(other),
            })?;
        let new_destination = compute.add(to.balance, amount)?;

        self.set_balance(source, new_source);
        self.set_balance(destination, new_destination);
        Ok(new_source)
    }

    fn set_balance(&mut self, address: &Address, balance: Handle) {
        if let Some(account) = self.accounts.get_mut(address) {
            account.balance = balance;
        }
    }
}
