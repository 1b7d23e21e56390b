//! Plaintext custody of auctioned assets.

use std::collections::HashMap;

use cbid_types::Address;

use crate::error::TokenError;
use crate::TokenResult;

/// Asset holdings: (holder, asset) -> quantity.
#[derive(Clone, Debug, Default)]
pub struct AssetLedger {
    holdings: HashMap<(Address, Address), u64>,
}

impl AssetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, holder: &Address, asset: &Address) -> u64 {
        self.holdings.get(&(*holder, *asset)).copied().unwrap_or(0)
    }

    /// Credit `quantity` of `asset` to `holder`.
    pub fn deposit(&mut self, holder: Address, asset: Address, quantity: u64) {
        *self.holdings.entry((holder, asset)).or_insert(0) += quantity;
    }

    /// Move `quantity` of `asset` between holders. Nothing changes on failure.
    pub fn transfer(
        &mut self,
        asset: &Address,
        from: &Address,
        to: &Address,
        quantity: u64,
    ) -> TokenResult<()> {
        if quantity == 0 {
            return Err(TokenError::ZeroAmount);
        }

        let available = self.balance(from, asset);
        if available < quantity {
            return Err(TokenError::InsufficientAssetBalance {
                required: quantity,
                available,
            });
        }

        self.holdings.insert((*from, *asset), available - quantity);
        self.deposit(*to, *asset, quantity);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_transfer() {
        let mut ledger = AssetLedger::new();
        let asset = [5u8; 32];
        let alice = [1u8; 32];
        let vault = [2u8; 32];

        assert_eq!(ledger.balance(&alice, &asset), 0);

        ledger.deposit(alice, asset, 3);
        ledger.transfer(&asset, &alice, &vault, 1).unwrap();
        assert_eq!(ledger.balance(&alice, &asset), 2);
        assert_eq!(ledger.balance(&vault, &asset), 1);
    }

    #[test]
    fn test_asset_transfer_insufficient() {
        let mut ledger = AssetLedger::new();
        let asset = [5u8; 32];
        ledger.deposit([1u8; 32], asset, 1);

        assert_eq!(
            ledger.transfer(&asset, &[1u8; 32], &[2u8; 32], 2),
            Err(TokenError::InsufficientAssetBalance {
                required: 2,
                available: 1
            })
        );
        assert_eq!(ledger.balance(&[1u8; 32], &asset), 1);
    }

    #[test]
    fn test_zero_transfer_rejected() {
        let mut ledger = AssetLedger::new();
        assert_eq!(
            ledger.transfer(&[5u8; 32], &[1u8; 32], &[2u8; 32], 0),
            Err(TokenError::ZeroAmount)
        );
    }
}
