use std::collections::HashSet;

use alloy_primitives::{Address, B256, U256};

use crate::deposit_data::{DepositRecord, ForkVersion, Pubkey};
use crate::reconciled::ReconciledSet;

/// How a validated record set must be shaped for submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    /// One call per record
    Single,
    /// One aggregated call for the whole set
    Batch,
}

impl SubmissionKind {
    /// Credential type `0x00` (legacy BLS) cannot go through the aggregated
    /// call; every other credential type can.
    pub fn for_credentials(withdrawal_credentials: &B256) -> Self {
        if withdrawal_credentials[0] == 0x00 {
            Self::Single
        } else {
            Self::Batch
        }
    }
}

/// The execution-layer address committed to by the credentials, i.e. the
/// credentials with their type/padding prefix stripped.
pub fn credentials_address(withdrawal_credentials: &B256) -> Address {
    Address::from_slice(&withdrawal_credentials[12..])
}

/// Protocol parameters for the active network. Injected by the caller;
/// nothing here is read from ambient state.
#[derive(Debug, Clone)]
pub struct DepositRequirements {
    pub chain_id: u64,
    pub fork_version: ForkVersion,
    pub deposit_amount_gwei: u64,
    pub max_batch_size: usize,
}

/// Registration entry of the claiming account, as reported by the
/// incentive registry.
#[derive(Debug, Clone)]
pub struct OwnerRegistration {
    pub safe: Address,
    pub status: u8,
    pub expected_deposit_count: u16,
    pub total_stake_amount: U256,
}

/// Funding-account context for token-funded deposits.
#[derive(Debug, Clone)]
pub struct FundingContext {
    /// Token balance of the funding account, in wei
    pub available: U256,
    /// Token cost of a single deposit, in wei
    pub cost_per_deposit: U256,
}

/// The records that survived validation, ready for payload assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBatch {
    pub deposits: Vec<DepositRecord>,
    /// True iff some input records were dropped as already deposited
    pub has_duplicates: bool,
    pub kind: SubmissionKind,
}

impl ValidatedBatch {
    pub fn is_batch(&self) -> bool {
        self.kind == SubmissionKind::Batch
    }
}

pub mod stages {
    pub const NETWORK: &str = "network";
    pub const OWNERSHIP: &str = "ownership";
    pub const COUNT: &str = "count";
    pub const DEDUPLICATION: &str = "deduplication";
    pub const BATCH_SIZE: &str = "batch_size";
    pub const AMOUNT: &str = "amount";
    pub const UNIQUE_KEYS: &str = "unique_keys";
    pub const FUNDING: &str = "funding";
}

/// Receives a callback for every validation stage outcome.
pub trait ValidationObserver {
    fn stage_passed(&self, stage: &'static str);
    fn stage_failed(&self, stage: &'static str, error: &ValidationError);
}

pub struct NoopValidationObserver {}

impl ValidationObserver for NoopValidationObserver {
    fn stage_passed(&self, _stage: &'static str) {}
    fn stage_failed(&self, _stage: &'static str, _error: &ValidationError) {}
}

pub struct LogValidationObserver {}

impl ValidationObserver for LogValidationObserver {
    fn stage_passed(&self, stage: &'static str) {
        tracing::debug!("Passed {stage}")
    }
    fn stage_failed(&self, stage: &'static str, error: &ValidationError) {
        tracing::warn!("Failed {stage}: {error}")
    }
}

#[derive(derive_more::Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Deposit data was generated for fork {fork_version:?}, chain {chain_id} expects {expected:?}")]
    NetworkMismatch {
        #[debug("0x{}", hex::encode(fork_version))]
        fork_version: ForkVersion,
        #[debug("0x{}", hex::encode(expected))]
        expected: ForkVersion,
        chain_id: u64,
    },

    #[error("Record {index}: withdrawal credentials do not commit to the registered safe address {owner}")]
    OwnershipMismatch { index: usize, owner: Address },

    #[error("Wrong number of records: registry expects {expected} pending deposits, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Deposits have already been made for every key in this set")]
    AllDuplicates,

    #[error("{count} deposits exceed the maximum batch size of {max}")]
    BatchSizeExceeded { count: usize, max: usize },

    #[error("Record {index}: amount must be exactly {expected} gwei, got {actual}")]
    AmountMismatch {
        index: usize,
        expected: u64,
        actual: u64,
    },

    #[error("Public key appears more than once in the set: {pubkey:?}")]
    DuplicateKey {
        #[debug("0x{}", hex::encode(pubkey))]
        pubkey: Pubkey,
    },

    #[error(
        "Insufficient balance: {} tokens required, {} available",
        fmt_tokens(.required),
        fmt_tokens(.available)
    )]
    InsufficientBalance { required: U256, available: U256 },
}

// Whole-token rendering for user-facing messages; the token has 18 decimals.
fn fmt_tokens(wei: &U256) -> String {
    let unit = U256::from(10).pow(U256::from(18));
    let whole = *wei / unit;
    let frac = *wei % unit;
    if frac.is_zero() {
        whole.to_string()
    } else {
        let frac = format!("{:0>18}", frac.to_string());
        format!("{whole}.{}", frac.trim_end_matches('0'))
    }
}

pub struct DepositValidator<'a, Obs: ValidationObserver> {
    requirements: &'a DepositRequirements,
    observer: &'a Obs,
}

impl<'a, Obs: ValidationObserver> DepositValidator<'a, Obs> {
    pub fn new(requirements: &'a DepositRequirements, observer: &'a Obs) -> Self {
        Self {
            requirements,
            observer,
        }
    }

    /// Runs every constraint in order, short-circuiting on the first failure.
    ///
    /// Pure with respect to its inputs: the same records against the same
    /// reconciled set always produce the same outcome, and nothing caller
    /// visible is touched on failure.
    pub fn validate(
        &self,
        records: &[DepositRecord],
        known_deposits: &ReconciledSet,
        registration: Option<&OwnerRegistration>,
        funding: Option<&FundingContext>,
    ) -> Result<ValidatedBatch, ValidationError> {
        self.check(stages::NETWORK, self.check_network(records))?;

        if let Some(registration) = registration {
            self.check(stages::OWNERSHIP, Self::check_ownership(records, registration))?;
            self.check(stages::COUNT, Self::check_count(records, registration))?;
        }

        let deposits: Vec<DepositRecord> = records
            .iter()
            .filter(|record| !known_deposits.contains(&record.pubkey))
            .cloned()
            .collect();
        let has_duplicates = deposits.len() != records.len();
        if deposits.is_empty() {
            let error = ValidationError::AllDuplicates;
            self.observer.stage_failed(stages::DEDUPLICATION, &error);
            return Err(error);
        }
        self.observer.stage_passed(stages::DEDUPLICATION);

        let kind = SubmissionKind::for_credentials(&deposits[0].withdrawal_credentials);

        self.check(stages::BATCH_SIZE, self.check_batch_size(&deposits, kind))?;
        self.check(stages::AMOUNT, self.check_amounts(&deposits))?;
        self.check(stages::UNIQUE_KEYS, Self::check_unique_keys(&deposits))?;

        if let Some(funding) = funding {
            self.check(stages::FUNDING, Self::check_funding(&deposits, funding))?;
        }

        Ok(ValidatedBatch {
            deposits,
            has_duplicates,
            kind,
        })
    }

    fn check(
        &self,
        stage: &'static str,
        result: Result<(), ValidationError>,
    ) -> Result<(), ValidationError> {
        match &result {
            Ok(()) => self.observer.stage_passed(stage),
            Err(error) => self.observer.stage_failed(stage, error),
        }
        result
    }

    fn check_network(&self, records: &[DepositRecord]) -> Result<(), ValidationError> {
        match records
            .iter()
            .find(|record| record.fork_version != self.requirements.fork_version)
        {
            None => Ok(()),
            Some(record) => Err(ValidationError::NetworkMismatch {
                fork_version: record.fork_version,
                expected: self.requirements.fork_version,
                chain_id: self.requirements.chain_id,
            }),
        }
    }

    fn check_ownership(
        records: &[DepositRecord],
        registration: &OwnerRegistration,
    ) -> Result<(), ValidationError> {
        for (index, record) in records.iter().enumerate() {
            if credentials_address(&record.withdrawal_credentials) != registration.safe {
                return Err(ValidationError::OwnershipMismatch {
                    index,
                    owner: registration.safe,
                });
            }
        }
        Ok(())
    }

    fn check_count(
        records: &[DepositRecord],
        registration: &OwnerRegistration,
    ) -> Result<(), ValidationError> {
        let expected = registration.expected_deposit_count as usize;
        if records.len() != expected {
            return Err(ValidationError::CountMismatch {
                expected,
                actual: records.len(),
            });
        }
        Ok(())
    }

    fn check_batch_size(
        &self,
        deposits: &[DepositRecord],
        kind: SubmissionKind,
    ) -> Result<(), ValidationError> {
        if kind == SubmissionKind::Batch && deposits.len() > self.requirements.max_batch_size {
            return Err(ValidationError::BatchSizeExceeded {
                count: deposits.len(),
                max: self.requirements.max_batch_size,
            });
        }
        Ok(())
    }

    fn check_amounts(&self, deposits: &[DepositRecord]) -> Result<(), ValidationError> {
        let expected = self.requirements.deposit_amount_gwei;
        for (index, record) in deposits.iter().enumerate() {
            if record.amount != expected {
                return Err(ValidationError::AmountMismatch {
                    index,
                    expected,
                    actual: record.amount,
                });
            }
        }
        Ok(())
    }

    fn check_unique_keys(deposits: &[DepositRecord]) -> Result<(), ValidationError> {
        let mut seen: HashSet<Pubkey> = HashSet::with_capacity(deposits.len());
        for record in deposits {
            if !seen.insert(record.pubkey) {
                return Err(ValidationError::DuplicateKey {
                    pubkey: record.pubkey,
                });
            }
        }
        Ok(())
    }

    fn check_funding(
        deposits: &[DepositRecord],
        funding: &FundingContext,
    ) -> Result<(), ValidationError> {
        let required = funding.cost_per_deposit * U256::from(deposits.len());
        if funding.available < required {
            return Err(ValidationError::InsufficientBalance {
                required,
                available: funding.available,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deposit_data::{PUBKEY_BYTES, SIGNATURE_BYTES};
    use hex_literal::hex;

    const DEPOSIT_AMOUNT_GWEI: u64 = 32_000_000_000;
    const OWNER: [u8; 20] = hex!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");

    fn requirements() -> DepositRequirements {
        DepositRequirements {
            chain_id: 100,
            fork_version: ForkVersion::from([0, 0, 0, 0x64]),
            deposit_amount_gwei: DEPOSIT_AMOUNT_GWEI,
            max_batch_size: 128,
        }
    }

    fn credentials(type_byte: u8) -> B256 {
        let mut wc = [0u8; 32];
        wc[0] = type_byte;
        wc[12..].copy_from_slice(&OWNER);
        B256::from(wc)
    }

    fn record(seed: u8) -> DepositRecord {
        DepositRecord {
            pubkey: Pubkey::from([seed; PUBKEY_BYTES]),
            withdrawal_credentials: credentials(0x01),
            amount: DEPOSIT_AMOUNT_GWEI,
            signature: crate::deposit_data::Signature::from([seed; SIGNATURE_BYTES]),
            deposit_message_root: B256::from([seed; 32]),
            deposit_data_root: B256::from([seed; 32]),
            fork_version: ForkVersion::from([0, 0, 0, 0x64]),
        }
    }

    fn bls_record(seed: u8) -> DepositRecord {
        DepositRecord {
            withdrawal_credentials: credentials(0x00),
            ..record(seed)
        }
    }

    fn registration(expected: u16) -> OwnerRegistration {
        OwnerRegistration {
            safe: Address::from(OWNER),
            status: 1,
            expected_deposit_count: expected,
            total_stake_amount: U256::ZERO,
        }
    }

    fn validate(
        records: &[DepositRecord],
        known: &ReconciledSet,
    ) -> Result<ValidatedBatch, ValidationError> {
        let requirements = requirements();
        DepositValidator::new(&requirements, &NoopValidationObserver {}).validate(
            records,
            known,
            None,
            None,
        )
    }

    #[test]
    fn removes_exactly_the_known_keys_and_flags_duplicates() {
        let records = vec![record(1), record(2), record(3)];
        let known = ReconciledSet::from_keys([records[1].pubkey]);
        let batch = validate(&records, &known).expect("Failed to validate");
        assert_eq!(batch.deposits, vec![record(1), record(3)]);
        assert!(batch.has_duplicates);
    }

    #[test]
    fn no_duplicates_flag_when_nothing_was_removed() {
        let records = vec![record(1), record(2)];
        let batch = validate(&records, &ReconciledSet::new()).expect("Failed to validate");
        assert_eq!(batch.deposits.len(), 2);
        assert!(!batch.has_duplicates);
    }

    #[test]
    fn all_previously_deposited_records_are_rejected() {
        let records = vec![record(1), record(2), record(3)];
        let known = ReconciledSet::from_keys(records.iter().map(|r| r.pubkey));
        let result = validate(&records, &known);
        assert!(matches!(result, Err(ValidationError::AllDuplicates)));
    }

    #[test]
    fn fork_version_mismatch_reports_offender_and_chain() {
        let mut records = vec![record(1), record(2)];
        records[1].fork_version = ForkVersion::from([0, 0, 0, 0x6f]);
        let result = validate(&records, &ReconciledSet::new());
        match result {
            Err(ValidationError::NetworkMismatch {
                fork_version,
                chain_id,
                ..
            }) => {
                assert_eq!(fork_version, ForkVersion::from([0, 0, 0, 0x6f]));
                assert_eq!(chain_id, 100);
            }
            other => panic!("Expected NetworkMismatch, got {other:?}"),
        }
    }

    #[test]
    fn legacy_credentials_force_single_submission() {
        // Second record has batchable credentials, but only the first
        // survivor's prefix decides
        let records = vec![bls_record(1), record(2)];
        let batch = validate(&records, &ReconciledSet::new()).expect("Failed to validate");
        assert_eq!(batch.kind, SubmissionKind::Single);
        assert!(!batch.is_batch());
    }

    #[test]
    fn classification_looks_at_the_first_surviving_record() {
        let records = vec![bls_record(1), record(2)];
        let known = ReconciledSet::from_keys([records[0].pubkey]);
        let batch = validate(&records, &known).expect("Failed to validate");
        assert_eq!(batch.kind, SubmissionKind::Batch);
    }

    #[test]
    fn batch_of_128_is_accepted() {
        let records: Vec<_> = (0..128).map(|i| record(i as u8)).collect();
        let batch = validate(&records, &ReconciledSet::new()).expect("Failed to validate");
        assert_eq!(batch.deposits.len(), 128);
        assert!(batch.is_batch());
    }

    #[test]
    fn batch_of_130_exceeds_the_ceiling() {
        let records: Vec<_> = (0..130)
            .map(|i| {
                let mut r = record(0);
                r.pubkey = Pubkey::from({
                    let mut key = [0u8; PUBKEY_BYTES];
                    key[0] = (i / 256) as u8;
                    key[1] = (i % 256) as u8;
                    key
                });
                r
            })
            .collect();
        let result = validate(&records, &ReconciledSet::new());
        assert!(matches!(
            result,
            Err(ValidationError::BatchSizeExceeded { count: 130, max: 128 })
        ));
    }

    #[test]
    fn oversized_single_kind_set_is_not_capped() {
        let records: Vec<_> = (0..130)
            .map(|i| {
                let mut r = bls_record(0);
                r.pubkey = Pubkey::from({
                    let mut key = [0u8; PUBKEY_BYTES];
                    key[0] = (i / 256) as u8;
                    key[1] = (i % 256) as u8;
                    key
                });
                r
            })
            .collect();
        let batch = validate(&records, &ReconciledSet::new()).expect("Failed to validate");
        assert_eq!(batch.kind, SubmissionKind::Single);
        assert_eq!(batch.deposits.len(), 130);
    }

    #[test]
    fn wrong_amount_is_rejected() {
        let mut records = vec![record(1)];
        records[0].amount = 16_000_000_000;
        let result = validate(&records, &ReconciledSet::new());
        assert!(matches!(
            result,
            Err(ValidationError::AmountMismatch {
                index: 0,
                expected: DEPOSIT_AMOUNT_GWEI,
                actual: 16_000_000_000,
            })
        ));
    }

    #[test]
    fn repeated_pubkey_within_the_upload_is_rejected() {
        let records = vec![record(1), record(1)];
        let result = validate(&records, &ReconciledSet::new());
        assert!(matches!(result, Err(ValidationError::DuplicateKey { .. })));
    }

    #[test]
    fn ownership_mismatch_is_rejected() {
        let requirements = requirements();
        let validator = DepositValidator::new(&requirements, &NoopValidationObserver {});
        let mut records = vec![record(1), record(2)];
        let mut wc = records[1].withdrawal_credentials.0;
        wc[31] ^= 0xff;
        records[1].withdrawal_credentials = B256::from(wc);
        let result = validator.validate(
            &records,
            &ReconciledSet::new(),
            Some(&registration(2)),
            None,
        );
        assert!(matches!(
            result,
            Err(ValidationError::OwnershipMismatch { index: 1, .. })
        ));
    }

    #[test]
    fn count_mismatch_reports_both_counts() {
        let requirements = requirements();
        let validator = DepositValidator::new(&requirements, &NoopValidationObserver {});
        let records = vec![record(1), record(2)];
        let result = validator.validate(
            &records,
            &ReconciledSet::new(),
            Some(&registration(3)),
            None,
        );
        assert!(matches!(
            result,
            Err(ValidationError::CountMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn funding_shortfall_is_rejected() {
        let requirements = requirements();
        let validator = DepositValidator::new(&requirements, &NoopValidationObserver {});
        let records = vec![record(1), record(2)];
        let funding = FundingContext {
            available: U256::from(10).pow(U256::from(18)),
            cost_per_deposit: U256::from(10).pow(U256::from(18)),
        };
        let result = validator.validate(&records, &ReconciledSet::new(), None, Some(&funding));
        match result {
            Err(ValidationError::InsufficientBalance { required, available }) => {
                assert_eq!(required, funding.cost_per_deposit * U256::from(2));
                assert_eq!(available, funding.available);
            }
            other => panic!("Expected InsufficientBalance, got {other:?}"),
        }
    }

    #[test]
    fn funding_error_message_uses_token_units() {
        let error = ValidationError::InsufficientBalance {
            required: U256::from(10).pow(U256::from(18)) * U256::from(3),
            available: U256::from(10).pow(U256::from(18)) / U256::from(2),
        };
        assert_eq!(
            error.to_string(),
            "Insufficient balance: 3 tokens required, 0.5 available"
        );
    }

    #[test]
    fn validation_is_idempotent() {
        let records = vec![record(1), record(2), record(3)];
        let known = ReconciledSet::from_keys([records[2].pubkey]);
        let first = validate(&records, &known).expect("Failed to validate");
        let second = validate(&records, &known).expect("Failed to validate");
        assert_eq!(first, second);
    }
}
