use std::path::Path;

use anyhow::Context;

use gbc_deposit_reconciler_shared::deposit_data::{parse_deposit_data, DepositRecord};
use gbc_deposit_reconciler_shared::reconciled::ReconciledSet;
use gbc_deposit_reconciler_shared::validation::{
    DepositValidator, FundingContext, LogValidationObserver, OwnerRegistration, ValidatedBatch, ValidationError,
};

use crate::reconciler::{HistoryFetchError, HistoryReconciler};
use crate::scripts::prelude::PipelineRuntime;

/// Reads and parses a deposit-data file; parse failures surface verbatim.
pub fn load_deposit_file(path: &Path) -> anyhow::Result<Vec<DepositRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read deposit data file {path:?}"))?;
    let records = parse_deposit_data(&text)?;
    tracing::info!(records = records.len(), "Parsed deposit data file {path:?}");
    Ok(records)
}

pub async fn reconcile_history(runtime: &PipelineRuntime) -> Result<ReconciledSet, HistoryFetchError> {
    let reconciler = HistoryReconciler::new(
        &runtime.deposit_infra.cache_reader,
        runtime.event_source(),
        &runtime.metrics.reconciliation,
    );
    reconciler
        .reconcile(
            runtime.settings.requirements.chain_id,
            runtime.settings.deposit_start_block,
        )
        .await
}

pub fn validate_records(
    runtime: &PipelineRuntime,
    records: &[DepositRecord],
    known_deposits: &ReconciledSet,
    registration: Option<&OwnerRegistration>,
    funding: Option<&FundingContext>,
) -> Result<ValidatedBatch, ValidationError> {
    let validator = DepositValidator::new(&runtime.settings.requirements, &LogValidationObserver {});
    let batch = validator.validate(records, known_deposits, registration, funding)?;
    if batch.has_duplicates {
        tracing::warn!(
            submitted = records.len(),
            new = batch.deposits.len(),
            "Some records were already deposited and were dropped"
        );
    }
    Ok(batch)
}
