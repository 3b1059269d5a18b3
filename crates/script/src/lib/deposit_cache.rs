use std::future::Future;

use serde::{Deserialize, Serialize};

use gbc_deposit_reconciler_shared::deposit_data::{Pubkey, PUBKEY_BYTES};

pub mod file;
pub mod reqwest;

#[derive(Debug, thiserror::Error)]
pub enum InitializationError {
    #[error("Failed to initialize deposit cache due to io error {0:?}")]
    IoError(#[from] std::io::Error),
}

/// One pre-generated snapshot chunk. Chunks are laid out consecutively:
/// a chunk stored under block N covers blocks N through `last_block`, and
/// the next chunk is stored under `last_block + 1`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheChunk {
    pub public_keys: Vec<String>,
    pub last_block: u64,
}

/// Everything the cache knows for a chain: the deposited public keys and
/// the last block they are complete up to.
#[derive(Debug, Default)]
pub struct CachedDeposits {
    pub public_keys: Vec<Pubkey>,
    pub last_block: u64,
}

pub trait DepositCacheReader {
    /// Loads the cached deposit history for `chain_id`, walking chunks from
    /// `start_block` (the deposit contract's deployment block). How many
    /// chunks get visited is internal to the implementation.
    fn load_cached_deposits(
        &self,
        chain_id: u64,
        start_block: u64,
    ) -> impl Future<Output = anyhow::Result<CachedDeposits>> + Send;
}

pub(crate) fn chunk_file_name(block: u64) -> String {
    format!("deposit-{block}.json")
}

pub(crate) fn parse_chunk_keys(chunk: &CacheChunk) -> anyhow::Result<Vec<Pubkey>> {
    chunk
        .public_keys
        .iter()
        .map(|raw| {
            let stripped = raw.strip_prefix("0x").unwrap_or(raw);
            let mut bytes = [0u8; PUBKEY_BYTES];
            hex::decode_to_slice(stripped, &mut bytes)
                .map_err(|e| anyhow::anyhow!("Invalid cached public key {raw}: {e:?}"))?;
            Ok(Pubkey::from(bytes))
        })
        .collect()
}
