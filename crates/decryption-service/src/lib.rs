//! Decryption Service
//!
//! Front-end through which parties read plaintext behind handles:
//! 1. Registering a request for a batch of handles on behalf of a requester
//! 2. Checking that an allowance exists for every (handle, requester) pair
//! 3. Releasing the plaintexts together with an attestation per value
//!
//! A request is all-or-nothing: if any handle is missing or not allowed,
//! no plaintext from the batch is released.

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use cbid_compute::{ComputeError, ConfidentialCompute};
use cbid_types::rpc::DecryptResponseRpc;
use cbid_types::{Address, Handle};

/// Errors that can occur while servicing a decryption request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptionError {
    #[error("Decryption request contains no handles")]
    EmptyRequest,

    #[error("Handle {handle} rejected: {source}")]
    Rejected {
        handle: Handle,
        #[source]
        source: ComputeError,
    },

    #[error("Unknown request {0}")]
    UnknownRequest(String),
}

impl DecryptionError {
    /// Underlying compute error, if the request was rejected by the compute layer.
    pub fn compute_error(&self) -> Option<&ComputeError> {
        match self {
            DecryptionError::Rejected { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// State of a decryption request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptionState {
    /// Plaintexts released
    Completed,
    /// Rejected by the compute layer
    Failed(String),
}

/// A single decryption request.
#[derive(Debug, Clone)]
pub struct DecryptionRequest {
    /// Unique identifier for this request
    pub request_id: [u8; 32],
    pub requester: Address,
    pub handles: Vec<Handle>,
    pub state: DecryptionState,
}

impl DecryptionRequest {
    fn new(sequence: u64, requester: Address, handles: Vec<Handle>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"CBID_DECRYPT_REQUEST_V1:");
        hasher.update(sequence.to_le_bytes());
        hasher.update(requester);
        for handle in &handles {
            hasher.update(handle.to_le_bytes());
        }
        let request_id: [u8; 32] = hasher.finalize().into();

        Self {
            request_id,
            requester,
            handles,
            state: DecryptionState::Completed,
        }
    }
}

/// Plaintexts released for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionResponse {
    pub request_id: [u8; 32],
    /// One plaintext per requested handle, in request order
    pub plaintexts: Vec<u128>,
    /// One attestation per plaintext
    pub attestations: Vec<[u8; 32]>,
}

impl From<&DecryptionResponse> for DecryptResponseRpc {
    fn from(r: &DecryptionResponse) -> Self {
        Self {
            request_id: hex::encode(r.request_id),
            plaintexts: r.plaintexts.iter().map(u128::to_string).collect(),
            attestations: r.attestations.iter().map(hex::encode).collect(),
        }
    }
}

/// Binding of a released plaintext to its handle, requester and request.
pub fn attest(request_id: &[u8; 32], handle: Handle, plaintext: u128, requester: &Address) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"CBID_ATTESTATION_V1:");
    hasher.update(request_id);
    hasher.update(handle.to_le_bytes());
    hasher.update(plaintext.to_le_bytes());
    hasher.update(requester);
    hasher.finalize().into()
}

/// Decryption service bookkeeping.
#[derive(Debug, Default)]
pub struct DecryptionService {
    requests: HashMap<[u8; 32], DecryptionRequest>,
    sequence: u64,
}

impl DecryptionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decrypt `handles` for `requester`.
    pub fn decrypt<C: ConfidentialCompute>(
        &mut self,
        compute: &C,
        requester: Address,
        handles: Vec<Handle>,
    ) -> Result<DecryptionResponse, DecryptionError> {
        if handles.is_empty() {
            return Err(DecryptionError::EmptyRequest);
        }

        self.sequence += 1;
        let mut request = DecryptionRequest::new(self.sequence, requester, handles);
        let request_id = request.request_id;

        debug!(
            request_id = hex::encode(request_id),
            requester = hex::encode(requester),
            handles = request.handles.len(),
            "Started decryption request"
        );

        let mut plaintexts = Vec::with_capacity(request.handles.len());
        for handle in &request.handles {
            match compute.decrypt(*handle, &requester) {
                Ok(plaintext) => plaintexts.push(plaintext),
                Err(source) => {
                    warn!(
                        request_id = hex::encode(request_id),
                        %handle,
                        error = %source,
                        "Decryption rejected"
                    );
                    request.state = DecryptionState::Failed(source.to_string());
                    let handle = *handle;
                    self.requests.insert(request_id, request);
                    return Err(DecryptionError::Rejected { handle, source });
                }
            }
        }

        let attestations = request
            .handles
            .iter()
            .zip(&plaintexts)
            .map(|(handle, plaintext)| attest(&request_id, *handle, *plaintext, &requester))
            .collect();

        info!(
            request_id = hex::encode(request_id),
            handles = request.handles.len(),
            "Decryption completed"
        );
        self.requests.insert(request_id, request);

        Ok(DecryptionResponse {
            request_id,
            plaintexts,
            attestations,
        })
    }

    /// Get the state of a decryption request.
    pub fn get_state(&self, request_id: &[u8; 32]) -> Option<DecryptionState> {
        self.requests.get(request_id).map(|r| r.state.clone())
    }

    /// Check a response against the request it claims to answer.
    pub fn verify(&self, response: &DecryptionResponse) -> Result<bool, DecryptionError> {
        let request = self
            .requests
            .get(&response.request_id)
            .ok_or_else(|| DecryptionError::UnknownRequest(hex::encode(response.request_id)))?;

        if request.handles.len() != response.plaintexts.len()
            || response.plaintexts.len() != response.attestations.len()
        {
            return Ok(false);
        }

        Ok(request
            .handles
            .iter()
            .zip(&response.plaintexts)
            .zip(&response.attestations)
            .all(|((handle, plaintext), attestation)| {
                attest(&request.request_id, *handle, *plaintext, &request.requester) == *attestation
            }))
    }

    /// Remove a finished request.
    pub fn remove_request(&mut self, request_id: &[u8; 32]) -> Option<DecryptionRequest> {
        self.requests.remove(request_id)
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }
}
