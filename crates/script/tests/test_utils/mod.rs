#![allow(dead_code)]
use std::sync::Mutex;

use gbc_deposit_reconciler_shared::deposit_data::{Pubkey, PUBKEY_BYTES};
use gbc_deposit_scripts::deposit_cache::{CachedDeposits, DepositCacheReader};
use gbc_deposit_scripts::eth_client::{DepositEventSource, EventSourceError};

pub fn pubkey(seed: u8) -> Pubkey {
    Pubkey::from([seed; PUBKEY_BYTES])
}

pub struct MockDepositCache {
    pub public_keys: Vec<Pubkey>,
    pub last_block: u64,
}

impl DepositCacheReader for MockDepositCache {
    async fn load_cached_deposits(&self, _chain_id: u64, _start_block: u64) -> anyhow::Result<CachedDeposits> {
        Ok(CachedDeposits {
            public_keys: self.public_keys.clone(),
            last_block: self.last_block,
        })
    }
}

pub struct FailingDepositCache {}

impl DepositCacheReader for FailingDepositCache {
    async fn load_cached_deposits(&self, _chain_id: u64, _start_block: u64) -> anyhow::Result<CachedDeposits> {
        anyhow::bail!("cache store unavailable")
    }
}

/// Event source that refuses ranges wider than `max_span` blocks and records
/// every range it was asked for.
pub struct MockEventSource {
    pub head: u64,
    pub events: Vec<(u64, Pubkey)>,
    pub max_span: u64,
    queried_ranges: Mutex<Vec<(u64, u64)>>,
}

impl MockEventSource {
    pub fn new(head: u64, events: Vec<(u64, Pubkey)>, max_span: u64) -> Self {
        Self {
            head,
            events,
            max_span,
            queried_ranges: Mutex::new(Vec::new()),
        }
    }

    pub fn queried(&self) -> Vec<(u64, u64)> {
        self.queried_ranges.lock().unwrap().clone()
    }
}

impl DepositEventSource for MockEventSource {
    async fn deposit_events(&self, from_block: u64, to_block: u64) -> Result<Vec<Pubkey>, EventSourceError> {
        self.queried_ranges.lock().unwrap().push((from_block, to_block));
        if to_block - from_block > self.max_span {
            return Err(EventSourceError::RangeRejected {
                from_block,
                to_block,
                reason: "query returned more than 10000 results".to_string(),
            });
        }
        Ok(self
            .events
            .iter()
            .filter(|(block, _)| *block >= from_block && *block <= to_block)
            .map(|(_, key)| *key)
            .collect())
    }

    async fn current_block(&self) -> Result<u64, EventSourceError> {
        Ok(self.head)
    }
}

/// Event source whose every range query fails, splittable or not.
pub struct AlwaysRejectingSource {
    pub head: u64,
    queried_ranges: Mutex<Vec<(u64, u64)>>,
}

impl AlwaysRejectingSource {
    pub fn new(head: u64) -> Self {
        Self {
            head,
            queried_ranges: Mutex::new(Vec::new()),
        }
    }

    pub fn queried(&self) -> Vec<(u64, u64)> {
        self.queried_ranges.lock().unwrap().clone()
    }
}

impl DepositEventSource for AlwaysRejectingSource {
    async fn deposit_events(&self, from_block: u64, to_block: u64) -> Result<Vec<Pubkey>, EventSourceError> {
        self.queried_ranges.lock().unwrap().push((from_block, to_block));
        Err(EventSourceError::RangeRejected {
            from_block,
            to_block,
            reason: "timeout".to_string(),
        })
    }

    async fn current_block(&self) -> Result<u64, EventSourceError> {
        Ok(self.head)
    }
}
