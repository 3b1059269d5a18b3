use std::path::Path;

use alloy_primitives::{TxHash, U256};
use anyhow::Context;
use futures::future::join_all;
use tracing::Instrument;

use gbc_deposit_reconciler_shared::payload::{assemble_transfer_calldata, TransferCalldata};
use gbc_deposit_reconciler_shared::validation::FundingContext;

use crate::consts::NetworkInfo;
use crate::eth_client::ContractError;
use crate::scripts::prelude::PipelineRuntime;
use crate::scripts::shared as shared_logic;

#[derive(Debug, Default)]
pub struct Flags {
    pub dry_run: bool,
}

/// What the flow did with the validated batch.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Whole batch went out in one transferAndCall
    Batched(TxHash),
    /// One transferAndCall per deposit; order matches the validated set
    PerDeposit(Vec<Result<TxHash, ContractError>>),
    /// Validation passed, nothing was sent
    DryRun,
}

pub async fn run(
    runtime: &PipelineRuntime,
    deposit_data_file: &Path,
    flags: &Flags,
) -> anyhow::Result<SubmitOutcome> {
    let span = tracing::info_span!("span:submit", deposit_data_file = ?deposit_data_file);
    run_with_span(runtime, deposit_data_file, flags).instrument(span).await
}

async fn run_with_span(
    runtime: &PipelineRuntime,
    deposit_data_file: &Path,
    flags: &Flags,
) -> anyhow::Result<SubmitOutcome> {
    tracing::info!(
        "Submitting deposits for network {:?} from {:?}",
        runtime.network().as_str(),
        deposit_data_file
    );

    let records = shared_logic::load_deposit_file(deposit_data_file)?;
    let known_deposits = shared_logic::reconcile_history(runtime).await?;

    let balance = runtime
        .deposit_infra
        .token_contract
        .balance_of(runtime.eth_infra.operator)
        .await?;
    let funding = FundingContext {
        available: balance,
        cost_per_deposit: runtime.settings.token_cost_per_deposit,
    };

    let batch = shared_logic::validate_records(runtime, &records, &known_deposits, None, Some(&funding))?;
    let calldata = assemble_transfer_calldata(&batch)?;

    if flags.dry_run || runtime.is_dry_run() {
        tracing::info!(
            deposits = batch.deposits.len(),
            "Dry run mode enabled, skipping submission"
        );
        return Ok(SubmitOutcome::DryRun);
    }

    let token = &runtime.deposit_infra.token_contract;
    let deposit_contract_address = runtime.settings.deposit_contract_address;
    let cost = runtime.settings.token_cost_per_deposit;

    match calldata {
        TransferCalldata::Batched(data) => {
            let total = cost * U256::from(batch.deposits.len());
            tracing::info!(
                deposits = batch.deposits.len(),
                "Sending batched deposit transaction"
            );
            let tx_hash = token
                .transfer_and_call(deposit_contract_address, total, data)
                .await
                .context("Failed to submit batched deposit")?;
            Ok(SubmitOutcome::Batched(tx_hash))
        }
        TransferCalldata::PerDeposit(calls) => {
            tracing::info!(deposits = calls.len(), "Sending one deposit transaction per record");
            // Outcomes are independent: a rejected transfer must not block
            // or roll back the others.
            let results = join_all(
                calls
                    .into_iter()
                    .map(|data| token.transfer_and_call(deposit_contract_address, cost, data)),
            )
            .await;
            let failed = results.iter().filter(|result| result.is_err()).count();
            if failed > 0 {
                tracing::error!(failed, total = results.len(), "Some deposit transactions failed");
            }
            Ok(SubmitOutcome::PerDeposit(results))
        }
    }
}
