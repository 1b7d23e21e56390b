//! In-memory coprocessor.
//!
//! Holds the plaintext behind every handle it has issued and evaluates
//! operations on request. Result handles are a hash of the operation and its
//! operand handles, so replaying the same computation against the same inputs
//! yields the same handle. The two-phase submission protocol depends on that.

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use cbid_types::{Address, Handle, InputType};

use crate::allowance::AllowanceRegistry;
use crate::envelope::{self, NetworkKey};
use crate::error::ComputeError;
use crate::{ComputeResult, ConfidentialCompute};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ValueKind {
    Uint,
    Bool,
}

#[derive(Clone, Copy, Debug)]
struct Value {
    plaintext: u128,
    kind: ValueKind,
}

/// Coprocessor state: issued ciphertexts and allowances.
#[derive(Clone, Debug)]
pub struct Coprocessor {
    network_key: NetworkKey,
    values: HashMap<Handle, Value>,
    allowances: AllowanceRegistry,
}

impl Coprocessor {
    pub fn new(network_key: NetworkKey) -> Self {
        Self {
            network_key,
            values: HashMap::new(),
            allowances: AllowanceRegistry::new(),
        }
    }

    pub fn network_key(&self) -> &NetworkKey {
        &self.network_key
    }

    pub fn allowances(&self) -> &AllowanceRegistry {
        &self.allowances
    }

    /// Number of ciphertexts held.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.values.contains_key(&handle)
    }

    fn derive_handle(op: &[u8], operands: &[&[u8]]) -> Handle {
        let mut hasher = Sha256::new();
        hasher.update(b"CBID_HANDLE_V1:");
        hasher.update(op);
        for operand in operands {
            hasher.update(operand);
        }
        Handle::from_digest(&hasher.finalize().into())
    }

    fn load(&self, handle: Handle) -> ComputeResult<Value> {
        self.values
            .get(&handle)
            .copied()
            .ok_or(ComputeError::CiphertextNotFound(handle))
    }

    fn load_bool(&self, handle: Handle) -> ComputeResult<bool> {
        let value = self.load(handle)?;
        if value.kind != ValueKind::Bool {
            return Err(ComputeError::NotABoolean(handle));
        }
        Ok(value.plaintext != 0)
    }

    fn store(&mut self, handle: Handle, plaintext: u128, kind: ValueKind) -> Handle {
        self.values.insert(handle, Value { plaintext, kind });
        handle
    }

    fn binary(
        &mut self,
        op: &'static str,
        a: Handle,
        b: Handle,
        kind: ValueKind,
        f: impl FnOnce(u128, u128) -> ComputeResult<u128>,
    ) -> ComputeResult<Handle> {
        let lhs = self.load(a)?.plaintext;
        let rhs = self.load(b)?.plaintext;
        let result = f(lhs, rhs)?;
        let handle = Self::derive_handle(op.as_bytes(), &[&a.to_le_bytes(), &b.to_le_bytes()]);
        trace!(op, %a, %b, %handle, "Evaluated");
        Ok(self.store(handle, result, kind))
    }
}

impl ConfidentialCompute for Coprocessor {
    fn new_encrypted(
        &mut self,
        ciphertext: &[u8],
        input_type: u8,
        signer: &Address,
    ) -> ComputeResult<Handle> {
        match InputType::from_u8(input_type) {
            Some(InputType::Ciphertext) => {}
            None => return Err(ComputeError::UnsupportedInputType(input_type)),
        }

        let plaintext = envelope::open(&self.network_key, signer, ciphertext)?;
        let digest = Sha256::digest(ciphertext);
        let handle = Self::derive_handle(b"input", &[&[input_type], signer, &digest]);
        debug!(%handle, signer = %hex::encode(signer), "Ingested ciphertext");
        Ok(self.store(handle, plaintext, ValueKind::Uint))
    }

    fn as_encrypted(&mut self, value: u128) -> Handle {
        let handle = Self::derive_handle(b"trivial", &[&value.to_le_bytes()]);
        self.store(handle, value, ValueKind::Uint)
    }

    fn add(&mut self, a: Handle, b: Handle) -> ComputeResult<Handle> {
        self.binary("add", a, b, ValueKind::Uint, |x, y| {
            x.checked_add(y).ok_or(ComputeError::Overflow)
        })
    }

    fn checked_sub(&mut self, a: Handle, b: Handle) -> ComputeResult<Handle> {
        self.binary("sub", a, b, ValueKind::Uint, |x, y| {
            x.checked_sub(y).ok_or(ComputeError::Underflow)
        })
    }

    fn compare_max(&mut self, a: Handle, b: Handle) -> ComputeResult<Handle> {
        // Ties resolve to the first operand.
        self.binary("max", a, b, ValueKind::Uint, |x, y| Ok(if x >= y { x } else { y }))
    }

    fn compare_min(&mut self, a: Handle, b: Handle) -> ComputeResult<Handle> {
        self.binary("min", a, b, ValueKind::Uint, |x, y| Ok(if x <= y { x } else { y }))
    }

    fn compare_eq(&mut self, a: Handle, b: Handle) -> ComputeResult<Handle> {
        self.binary("eq", a, b, ValueKind::Bool, |x, y| Ok((x == y) as u128))
    }

    fn compare_ge(&mut self, a: Handle, b: Handle) -> ComputeResult<Handle> {
        self.binary("ge", a, b, ValueKind::Bool, |x, y| Ok((x >= y) as u128))
    }

    fn compare_gt(&mut self, a: Handle, b: Handle) -> ComputeResult<Handle> {
        self.binary("gt", a, b, ValueKind::Bool, |x, y| Ok((x > y) as u128))
    }

    fn and(&mut self, a: Handle, b: Handle) -> ComputeResult<Handle> {
        let lhs = self.load_bool(a)?;
        let rhs = self.load_bool(b)?;
        let handle = Self::derive_handle(b"and", &[&a.to_le_bytes(), &b.to_le_bytes()]);
        Ok(self.store(handle, (lhs && rhs) as u128, ValueKind::Bool))
    }

    fn select(&mut self, condition: Handle, if_true: Handle, if_false: Handle) -> ComputeResult<Handle> {
        let cond = self.load_bool(condition)?;
        let on_true = self.load(if_true)?;
        let on_false = self.load(if_false)?;
        let chosen = if cond { on_true } else { on_false };
        let handle = Self::derive_handle(
            b"select",
            &[
                &condition.to_le_bytes(),
                &if_true.to_le_bytes(),
                &if_false.to_le_bytes(),
            ],
        );
        Ok(self.store(handle, chosen.plaintext, chosen.kind))
    }

    fn grant(
        &mut self,
        allowance_address: &Address,
        handle: Handle,
        grantee: &Address,
    ) -> ComputeResult<()> {
        self.load(handle)?;
        self.allowances.grant(allowance_address, handle, grantee)?;
        debug!(%handle, grantee = %hex::encode(grantee), "Granted allowance");
        Ok(())
    }

    fn is_allowed(&self, handle: Handle, grantee: &Address) -> bool {
        self.allowances.is_allowed(handle, grantee)
    }

    fn decrypt(&self, handle: Handle, requester: &Address) -> ComputeResult<u128> {
        let value = self.load(handle)?;
        if !self.allowances.is_allowed(handle, requester) {
            return Err(ComputeError::NotAllowed(handle));
        }
        Ok(value.plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbid_types::derive_allowance_address;
    use rand::rngs::OsRng;

    fn coprocessor() -> Coprocessor {
        Coprocessor::new(NetworkKey([9u8; 32]))
    }

    fn allow(cp: &mut Coprocessor, handle: Handle, who: &Address) {
        cp.grant(&derive_allowance_address(handle, who), handle, who)
            .unwrap();
    }

    #[test]
    fn test_ingest_and_decrypt() {
        let mut cp = coprocessor();
        let bidder = [1u8; 32];
        let envelope = envelope::seal(cp.network_key(), &bidder, 250, &mut OsRng).unwrap();

        let handle = cp.new_encrypted(&envelope, InputType::CIPHERTEXT, &bidder).unwrap();
        assert_eq!(cp.decrypt(handle, &bidder), Err(ComputeError::NotAllowed(handle)));

        allow(&mut cp, handle, &bidder);
        assert_eq!(cp.decrypt(handle, &bidder).unwrap(), 250);
    }

    #[test]
    fn test_unknown_input_type() {
        let mut cp = coprocessor();
        assert_eq!(
            cp.new_encrypted(&[0u8; 44], 7, &[1u8; 32]),
            Err(ComputeError::UnsupportedInputType(7))
        );
    }

    #[test]
    fn test_handles_are_deterministic() {
        let mut a = coprocessor();
        let mut b = coprocessor();

        let (x1, y1) = (a.as_encrypted(10), a.as_encrypted(20));
        let (x2, y2) = (b.as_encrypted(10), b.as_encrypted(20));
        assert_eq!(x1, x2);

        let max_a = a.compare_max(x1, y1).unwrap();
        let max_b = b.compare_max(x2, y2).unwrap();
        assert_eq!(max_a, max_b);
        assert_ne!(max_a, y1);
    }

    #[test]
    fn test_arithmetic_and_comparisons() {
        let mut cp = coprocessor();
        let me = [4u8; 32];
        let ten = cp.as_encrypted(10);
        let three = cp.as_encrypted(3);

        let results = [
            (cp.compare_max(ten, three).unwrap(), 10),
            (cp.compare_min(ten, three).unwrap(), 3),
            (cp.compare_gt(ten, three).unwrap(), 1),
            (cp.compare_ge(three, ten).unwrap(), 0),
            (cp.compare_eq(ten, ten).unwrap(), 1),
            (cp.add(ten, three).unwrap(), 13),
            (cp.checked_sub(ten, three).unwrap(), 7),
        ];

        for (handle, expected) in results {
            allow(&mut cp, handle, &me);
            assert_eq!(cp.decrypt(handle, &me).unwrap(), expected);
        }
    }

    #[test]
    fn test_checked_sub_underflow() {
        let mut cp = coprocessor();
        let small = cp.as_encrypted(1);
        let big = cp.as_encrypted(2);
        assert_eq!(cp.checked_sub(small, big), Err(ComputeError::Underflow));
    }

    #[test]
    fn test_select_requires_boolean() {
        let mut cp = coprocessor();
        let me = [4u8; 32];
        let a = cp.as_encrypted(1);
        let b = cp.as_encrypted(2);

        assert_eq!(cp.select(a, a, b), Err(ComputeError::NotABoolean(a)));

        let cond = cp.compare_gt(b, a).unwrap();
        let picked = cp.select(cond, b, a).unwrap();
        allow(&mut cp, picked, &me);
        assert_eq!(cp.decrypt(picked, &me).unwrap(), 2);
    }

    #[test]
    fn test_decrypt_missing_handle() {
        let cp = coprocessor();
        assert_eq!(
            cp.decrypt(Handle(1), &[0u8; 32]),
            Err(ComputeError::CiphertextNotFound(Handle(1)))
        );
    }

    #[test]
    fn test_grant_unknown_handle_fails() {
        let mut cp = coprocessor();
        let who = [1u8; 32];
        let handle = Handle(99);
        assert_eq!(
            cp.grant(&derive_allowance_address(handle, &who), handle, &who),
            Err(ComputeError::CiphertextNotFound(handle))
        );
    }
}
