//! Bid creation and encryption.

use rand::{CryptoRng, RngCore};
use thiserror::Error;

use cbid_compute::{envelope, NetworkKey};
use cbid_types::rpc::CallRpc;
use cbid_types::{Address, InputType};

/// Errors that can occur during bid creation.
#[derive(Debug, Error)]
pub enum BidError {
    #[error("Bid amount must be greater than zero")]
    ZeroAmount,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
}

/// A prepared bid ready for submission.
#[derive(Debug, Clone)]
pub struct PreparedBid {
    /// Sealed envelope, bound to the bidder's address
    pub ciphertext: Vec<u8>,
    pub input_type: u8,
    /// Original bid value (keep secret)
    pub bid_value: u128,
}

impl PreparedBid {
    /// Wire form of a place-bid call carrying this bid.
    pub fn to_call(&self, auction: &Address) -> CallRpc {
        CallRpc::PlaceBid {
            auction: hex::encode(auction),
            ciphertext: hex::encode(&self.ciphertext),
            input_type: self.input_type,
        }
    }
}

/// Seal `bid_value` for submission by `bidder`.
///
/// The envelope only opens for the same signer, so it must be submitted
/// from `bidder`'s address.
pub fn create_bid<R: RngCore + CryptoRng>(
    network_key: &NetworkKey,
    bidder: &Address,
    bid_value: u128,
    rng: &mut R,
) -> Result<PreparedBid, BidError> {
    if bid_value == 0 {
        return Err(BidError::ZeroAmount);
    }

    let ciphertext = envelope::seal(network_key, bidder, bid_value, rng)
        .map_err(|e| BidError::EncryptionFailed(e.to_string()))?;

    Ok(PreparedBid {
        ciphertext,
        input_type: InputType::CIPHERTEXT,
        bid_value,
    })
}

/// Builder for creating bids with additional options.
pub struct BidBuilder {
    network_key: NetworkKey,
    bidder: Address,
    bid_value: u128,
}

impl BidBuilder {
    pub fn new(network_key: NetworkKey, bidder: Address) -> Self {
        Self {
            network_key,
            bidder,
            bid_value: 0,
        }
    }

    /// Set the bid value.
    pub fn bid_value(mut self, value: u128) -> Self {
        self.bid_value = value;
        self
    }

    /// Build the prepared bid.
    pub fn build<R: RngCore + CryptoRng>(self, rng: &mut R) -> Result<PreparedBid, BidError> {
        create_bid(&self.network_key, &self.bidder, self.bid_value, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbid_compute::ENVELOPE_LEN;
    use rand::rngs::OsRng;

    #[test]
    fn test_create_bid() {
        let key = NetworkKey::generate(&mut OsRng);
        let bidder = [1u8; 32];

        let prepared = create_bid(&key, &bidder, 1000, &mut OsRng).unwrap();
        assert_eq!(prepared.bid_value, 1000);
        assert_eq!(prepared.ciphertext.len(), ENVELOPE_LEN);
        assert_eq!(envelope::open(&key, &bidder, &prepared.ciphertext).unwrap(), 1000);
    }

    #[test]
    fn test_bid_builder() {
        let key = NetworkKey::generate(&mut OsRng);
        let bid = BidBuilder::new(key, [1u8; 32])
            .bid_value(500)
            .build(&mut OsRng)
            .unwrap();
        assert_eq!(bid.bid_value, 500);
    }

    #[test]
    fn test_zero_bid_rejected() {
        let key = NetworkKey::generate(&mut OsRng);
        assert!(matches!(
            BidBuilder::new(key, [1u8; 32]).build(&mut OsRng),
            Err(BidError::ZeroAmount)
        ));
    }

    #[test]
    fn test_to_call() {
        let key = NetworkKey::generate(&mut OsRng);
        let bid = create_bid(&key, &[1u8; 32], 9, &mut OsRng).unwrap();

        match bid.to_call(&[4u8; 32]) {
            CallRpc::PlaceBid {
                auction,
                ciphertext,
                input_type,
            } => {
                assert_eq!(auction, hex::encode([4u8; 32]));
                assert_eq!(ciphertext, hex::encode(&bid.ciphertext));
                assert_eq!(input_type, InputType::CIPHERTEXT);
            }
            other => panic!("unexpected call {other:?}"),
        }
    }
}
