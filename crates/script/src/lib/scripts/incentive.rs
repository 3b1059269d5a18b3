use std::path::Path;

use alloy_primitives::TxHash;
use anyhow::Context;
use tracing::Instrument;

use gbc_deposit_reconciler_shared::payload::assemble_pending_deposits;

use crate::consts::NetworkInfo;
use crate::scripts::prelude::PipelineRuntime;
use crate::scripts::shared as shared_logic;

#[derive(Debug, Default)]
pub struct Flags {
    pub dry_run: bool,
}

#[derive(Debug)]
pub enum ClaimOutcome {
    Submitted(TxHash),
    DryRun,
}

/// Claims the caller's pending incentive deposits: the registry decides how
/// many keys are expected and which safe they must commit to.
pub async fn run(
    runtime: &PipelineRuntime,
    deposit_data_file: &Path,
    flags: &Flags,
) -> anyhow::Result<ClaimOutcome> {
    let span = tracing::info_span!("span:incentive_claim", deposit_data_file = ?deposit_data_file);
    run_with_span(runtime, deposit_data_file, flags).instrument(span).await
}

async fn run_with_span(
    runtime: &PipelineRuntime,
    deposit_data_file: &Path,
    flags: &Flags,
) -> anyhow::Result<ClaimOutcome> {
    let incentive = runtime
        .deposit_infra
        .incentive_contract
        .as_ref()
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Network {} has no incentive registry deployed",
                runtime.network().as_str()
            )
        })?;

    let records = shared_logic::load_deposit_file(deposit_data_file)?;

    let registration = incentive
        .users(runtime.eth_infra.operator)
        .await
        .context("Failed to read owner registration")?;
    tracing::info!(
        safe = ?registration.safe,
        expected = registration.expected_deposit_count,
        "Loaded owner registration"
    );

    let known_deposits = shared_logic::reconcile_history(runtime).await?;
    let batch = shared_logic::validate_records(runtime, &records, &known_deposits, Some(&registration), None)?;
    let calldata = assemble_pending_deposits(&batch)?;

    if flags.dry_run || runtime.is_dry_run() {
        tracing::info!(
            deposits = batch.deposits.len(),
            "Dry run mode enabled, skipping submission"
        );
        return Ok(ClaimOutcome::DryRun);
    }

    let tx_hash = incentive
        .submit_pending_deposits(&calldata)
        .await
        .context("Failed to submit pending deposits")?;
    Ok(ClaimOutcome::Submitted(tx_hash))
}
