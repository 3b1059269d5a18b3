use alloy_primitives::{Bytes, B256};
use thiserror::Error;

use crate::deposit_data::{CREDENTIALS_BYTES, PUBKEY_BYTES, ROOT_BYTES, SIGNATURE_BYTES};
use crate::validation::{SubmissionKind, ValidatedBatch};

/// `pubkey || signature || deposit_data_root`
pub const DEPOSIT_CHUNK_BYTES: usize = PUBKEY_BYTES + SIGNATURE_BYTES + ROOT_BYTES;
/// `withdrawal_credentials || pubkey || signature || deposit_data_root`
pub const SINGLE_CALL_BYTES: usize = CREDENTIALS_BYTES + DEPOSIT_CHUNK_BYTES;

/// Assembly cannot fail for a batch that passed validation; hitting one of
/// these means an upstream check is broken and the payload must not be sent.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Cannot assemble a payload from an empty batch")]
    EmptyBatch,

    #[error("Assembled {what} is {actual} bytes, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        actual: usize,
        expected: usize,
    },
}

/// Calldata for the aggregated claim call: one contiguous buffer per field,
/// plus the data roots as an ordered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDepositsCalldata {
    pub pubkeys: Bytes,
    pub signatures: Bytes,
    pub deposit_data_roots: Vec<B256>,
}

/// Payload(s) for the token-transfer hook on the deposit contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferCalldata {
    /// One call carrying every deposit: the credentials once, then
    /// `pubkey || signature || deposit_data_root` per deposit
    Batched(Bytes),
    /// One independent call per deposit, input order preserved
    PerDeposit(Vec<Bytes>),
}

/// Field-width concatenation for the claim call. The receiver splits the
/// buffers back by fixed widths, so the lengths are asserted here rather
/// than trusted.
pub fn assemble_pending_deposits(
    batch: &ValidatedBatch,
) -> Result<PendingDepositsCalldata, AssemblyError> {
    if batch.deposits.is_empty() {
        return Err(AssemblyError::EmptyBatch);
    }
    let count = batch.deposits.len();
    let mut pubkeys = Vec::with_capacity(count * PUBKEY_BYTES);
    let mut signatures = Vec::with_capacity(count * SIGNATURE_BYTES);
    let mut deposit_data_roots = Vec::with_capacity(count);
    for deposit in &batch.deposits {
        pubkeys.extend_from_slice(deposit.pubkey.as_slice());
        signatures.extend_from_slice(deposit.signature.as_slice());
        deposit_data_roots.push(deposit.deposit_data_root);
    }
    ensure_len("pubkeys", pubkeys.len(), count * PUBKEY_BYTES)?;
    ensure_len("signatures", signatures.len(), count * SIGNATURE_BYTES)?;

    Ok(PendingDepositsCalldata {
        pubkeys: pubkeys.into(),
        signatures: signatures.into(),
        deposit_data_roots,
    })
}

pub fn assemble_transfer_calldata(
    batch: &ValidatedBatch,
) -> Result<TransferCalldata, AssemblyError> {
    if batch.deposits.is_empty() {
        return Err(AssemblyError::EmptyBatch);
    }
    match batch.kind {
        SubmissionKind::Batch => {
            let expected = CREDENTIALS_BYTES + batch.deposits.len() * DEPOSIT_CHUNK_BYTES;
            let mut data = Vec::with_capacity(expected);
            data.extend_from_slice(batch.deposits[0].withdrawal_credentials.as_slice());
            for deposit in &batch.deposits {
                data.extend_from_slice(deposit.pubkey.as_slice());
                data.extend_from_slice(deposit.signature.as_slice());
                data.extend_from_slice(deposit.deposit_data_root.as_slice());
            }
            ensure_len("batched transfer data", data.len(), expected)?;
            Ok(TransferCalldata::Batched(data.into()))
        }
        SubmissionKind::Single => {
            let mut calls = Vec::with_capacity(batch.deposits.len());
            for deposit in &batch.deposits {
                let mut data = Vec::with_capacity(SINGLE_CALL_BYTES);
                data.extend_from_slice(deposit.withdrawal_credentials.as_slice());
                data.extend_from_slice(deposit.pubkey.as_slice());
                data.extend_from_slice(deposit.signature.as_slice());
                data.extend_from_slice(deposit.deposit_data_root.as_slice());
                ensure_len("transfer data", data.len(), SINGLE_CALL_BYTES)?;
                calls.push(data.into());
            }
            Ok(TransferCalldata::PerDeposit(calls))
        }
    }
}

fn ensure_len(what: &'static str, actual: usize, expected: usize) -> Result<(), AssemblyError> {
    if actual != expected {
        return Err(AssemblyError::LengthMismatch {
            what,
            actual,
            expected,
        });
    }
    Ok(())
}
