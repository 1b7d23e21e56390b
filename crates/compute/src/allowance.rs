//! Append-only allowance registry.

use std::collections::HashMap;

use cbid_types::{derive_allowance_address, Address, AllowanceGrant, Handle};

use crate::error::ComputeError;

/// Grants keyed by their derived storage address.
#[derive(Clone, Debug, Default)]
pub struct AllowanceRegistry {
    grants: HashMap<Address, AllowanceGrant>,
}

impl AllowanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `grantee` may decrypt `handle`.
    ///
    /// The supplied address must be the one derived from (handle, grantee).
    /// Re-granting the same pair is a no-op.
    pub fn grant(
        &mut self,
        allowance_address: &Address,
        handle: Handle,
        grantee: &Address,
    ) -> Result<(), ComputeError> {
        if derive_allowance_address(handle, grantee) != *allowance_address {
            return Err(ComputeError::AllowanceAddressMismatch);
        }

        self.grants.entry(*allowance_address).or_insert(AllowanceGrant {
            handle,
            grantee: *grantee,
        });
        Ok(())
    }

    pub fn is_allowed(&self, handle: Handle, grantee: &Address) -> bool {
        self.grants
            .get(&derive_allowance_address(handle, grantee))
            .map(|grant| grant.handle == handle && grant.grantee == *grantee)
            .unwrap_or(false)
    }

    pub fn get(&self, allowance_address: &Address) -> Option<&AllowanceGrant> {
        self.grants.get(allowance_address)
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_and_check() {
        let mut registry = AllowanceRegistry::new();
        let handle = Handle(77);
        let alice = [1u8; 32];

        assert!(!registry.is_allowed(handle, &alice));

        registry
            .grant(&derive_allowance_address(handle, &alice), handle, &alice)
            .unwrap();
        assert!(registry.is_allowed(handle, &alice));
        assert!(!registry.is_allowed(handle, &[2u8; 32]));
    }

    #[test]
    fn test_grant_rejects_wrong_address() {
        let mut registry = AllowanceRegistry::new();
        let handle = Handle(77);
        let alice = [1u8; 32];
        let wrong = derive_allowance_address(Handle(78), &alice);

        assert_eq!(
            registry.grant(&wrong, handle, &alice),
            Err(ComputeError::AllowanceAddressMismatch)
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_regrant_is_idempotent() {
        let mut registry = AllowanceRegistry::new();
        let handle = Handle(5);
        let alice = [1u8; 32];
        let addr = derive_allowance_address(handle, &alice);

        registry.grant(&addr, handle, &alice).unwrap();
        registry.grant(&addr, handle, &alice).unwrap();
        assert_eq!(registry.len(), 1);
    }
}
