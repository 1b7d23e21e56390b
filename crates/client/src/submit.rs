//! Two-phase submission over JSON-RPC.
//!
//! `ledger_simulate` runs the call without committing and reports the
//! handles it would produce; the submitter derives one allowance input per
//! handle and sends the same call to `ledger_submit`. If the ledger moved in
//! between, the submit fails and the caller decides whether to retry.

use anyhow::Result;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::HttpClient;
use tracing::{debug, info};

use cbid_types::rpc::{
    parse_address, parse_handle, AllowanceInputRpc, CallRpc, PredictedHandleRpc, SimulateParams,
    SubmitParams, SubmitResultRpc, WireError,
};
use cbid_types::AllowanceInput;

/// Derive allowance inputs, in order, from a discovery result.
pub fn allowances_for(predicted: &[PredictedHandleRpc]) -> Result<Vec<AllowanceInputRpc>, WireError> {
    predicted
        .iter()
        .map(|p| {
            let handle = parse_handle(&p.handle)?;
            let grantee = parse_address("grantee", &p.grantee)?;
            let input = AllowanceInput::for_handle(handle, grantee);
            Ok(AllowanceInputRpc {
                allowance_address: hex::encode(input.allowance_address),
                grantee: hex::encode(input.grantee),
            })
        })
        .collect()
}

/// Drives the simulate-then-submit sequence against a ledger endpoint.
pub struct TwoPhaseSubmitter<'a> {
    client: &'a HttpClient,
}

impl<'a> TwoPhaseSubmitter<'a> {
    pub fn new(client: &'a HttpClient) -> Self {
        Self { client }
    }

    /// Phase 1.
    pub async fn simulate(&self, sender: &str, call: &CallRpc) -> Result<Vec<PredictedHandleRpc>> {
        let params = SimulateParams {
            sender: sender.to_string(),
            call: call.clone(),
        };
        let predicted: Vec<PredictedHandleRpc> =
            self.client.request("ledger_simulate", vec![params]).await?;
        debug!(handles = predicted.len(), "Simulation returned");
        Ok(predicted)
    }

    /// Phase 2, with allowances derived from `predicted`.
    pub async fn commit(
        &self,
        sender: &str,
        call: CallRpc,
        predicted: &[PredictedHandleRpc],
    ) -> Result<SubmitResultRpc> {
        let params = SubmitParams {
            sender: sender.to_string(),
            call,
            allowances: allowances_for(predicted)?,
        };
        let result: SubmitResultRpc = self.client.request("ledger_submit", vec![params]).await?;
        info!(outcome = %result.outcome, "Call committed");
        Ok(result)
    }

    /// Both phases.
    pub async fn submit(&self, sender: &str, call: CallRpc) -> Result<SubmitResultRpc> {
        let predicted = self.simulate(sender, &call).await?;
        self.commit(sender, call, &predicted).await
    }
}
