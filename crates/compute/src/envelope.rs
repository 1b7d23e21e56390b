//! Bid envelopes: client-side encryption of a value to the coprocessor.
//!
//! # Format
//!
//! `nonce (12) || AES-256-GCM(value as u128 LE) || tag (16)`
//!
//! The key is derived from the network key with HKDF-SHA256 and the
//! submitting address is bound as associated data, so an envelope lifted
//! from one bidder's transaction cannot be replayed by another.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::Sha256;

use cbid_types::Address;

use crate::error::ComputeError;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const VALUE_LEN: usize = 16;

/// Length of a well-formed envelope.
pub const ENVELOPE_LEN: usize = NONCE_LEN + VALUE_LEN + TAG_LEN;

/// Key shared by clients and the coprocessor network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkKey(pub [u8; 32]);

/// Well-known key for local development ledgers.
pub const DEV_NETWORK_KEY: NetworkKey = NetworkKey([0x42; 32]);

impl NetworkKey {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    fn envelope_key(&self) -> Result<[u8; 32], ComputeError> {
        let hk = Hkdf::<Sha256>::new(Some(b"CBID_ENVELOPE_V1"), &self.0);
        let mut key = [0u8; 32];
        hk.expand(b"bid-envelope", &mut key)
            .map_err(|_| ComputeError::KeyDerivationFailed)?;
        Ok(key)
    }
}

/// Encrypt `value` for submission by `signer`.
pub fn seal<R: RngCore + CryptoRng>(
    key: &NetworkKey,
    signer: &Address,
    value: u128,
    rng: &mut R,
) -> Result<Vec<u8>, ComputeError> {
    let cipher = Aes256Gcm::new_from_slice(&key.envelope_key()?)
        .map_err(|_| ComputeError::KeyDerivationFailed)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce_bytes);

    let sealed = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: &value.to_le_bytes(),
                aad: signer,
            },
        )
        .map_err(|_| ComputeError::MalformedCiphertext("encryption failed".into()))?;

    let mut envelope = Vec::with_capacity(ENVELOPE_LEN);
    envelope.extend_from_slice(&nonce_bytes);
    envelope.extend_from_slice(&sealed);
    Ok(envelope)
}

/// Decrypt an envelope submitted by `signer`.
pub fn open(key: &NetworkKey, signer: &Address, envelope: &[u8]) -> Result<u128, ComputeError> {
    if envelope.len() != ENVELOPE_LEN {
        return Err(ComputeError::MalformedCiphertext(format!(
            "expected {} bytes, got {}",
            ENVELOPE_LEN,
            envelope.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(&key.envelope_key()?)
        .map_err(|_| ComputeError::KeyDerivationFailed)?;
    let (nonce, sealed) = envelope.split_at(NONCE_LEN);

    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: sealed,
                aad: signer,
            },
        )
        .map_err(|_| ComputeError::AuthenticationFailed)?;

    let bytes: [u8; VALUE_LEN] = plaintext
        .as_slice()
        .try_into()
        .map_err(|_| ComputeError::MalformedCiphertext("bad value width".into()))?;
    Ok(u128::from_le_bytes(bytes))
}
