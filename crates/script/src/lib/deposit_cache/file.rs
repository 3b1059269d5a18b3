use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{env, fs};

use crate::prometheus_metrics;
use crate::utils::read_json;

use super::{chunk_file_name, parse_chunk_keys, CacheChunk, CachedDeposits, DepositCacheReader, InitializationError};

pub struct FileDepositCacheStore {
    pub store_location: PathBuf,
}

impl FileDepositCacheStore {
    pub fn new(store_location: &Path) -> Result<Self, InitializationError> {
        let store_location = Self::abs_path(store_location.to_path_buf())?;
        Ok(Self { store_location })
    }

    fn abs_path(path: PathBuf) -> io::Result<PathBuf> {
        if path.is_absolute() {
            Ok(path)
        } else {
            Ok(env::current_dir()?.join(path))
        }
    }

    pub fn chunk_path(&self, chain_id: u64, block: u64) -> PathBuf {
        self.store_location
            .join(chain_id.to_string())
            .join(chunk_file_name(block))
    }

    pub fn exists(path: &Path) -> bool {
        let result = Path::exists(path);
        if !result {
            tracing::debug!("Path does not exist ({:?})", path);
        }
        result
    }

    pub fn ensure_exists(&self) -> io::Result<()> {
        fs::create_dir_all(self.store_location.clone())
    }
}

pub struct FileDepositCache {
    store: FileDepositCacheStore,
    metrics_reporter: Arc<prometheus_metrics::Service>,
}

impl FileDepositCache {
    pub fn new(
        store_location: &Path,
        metrics_reporter: Arc<prometheus_metrics::Service>,
    ) -> Result<Self, InitializationError> {
        Ok(Self {
            store: FileDepositCacheStore::new(store_location)?,
            metrics_reporter,
        })
    }

    async fn load_cached_deposits_impl(&self, chain_id: u64, start_block: u64) -> anyhow::Result<CachedDeposits> {
        let mut result = CachedDeposits {
            public_keys: Vec::new(),
            last_block: start_block,
        };
        let mut block = start_block;
        loop {
            let chunk_path = self.store.chunk_path(chain_id, block);
            if !FileDepositCacheStore::exists(&chunk_path) {
                break;
            }
            let chunk: CacheChunk = read_json(&chunk_path)?;
            if chunk.last_block < block {
                anyhow::bail!(
                    "Cache chunk {chunk_path:?} does not advance past block {block}"
                );
            }
            result.public_keys.extend(parse_chunk_keys(&chunk)?);
            result.last_block = chunk.last_block;
            block = chunk.last_block + 1;
        }
        tracing::info!(
            chain_id,
            keys = result.public_keys.len(),
            last_block = result.last_block,
            "Loaded cached deposits from {:?}",
            self.store.store_location
        );
        Ok(result)
    }
}

impl DepositCacheReader for FileDepositCache {
    async fn load_cached_deposits(&self, chain_id: u64, start_block: u64) -> anyhow::Result<CachedDeposits> {
        self.metrics_reporter
            .run_with_metrics_and_logs_async(prometheus_metrics::services::deposit_cache::LOAD_CACHED_DEPOSITS, || {
                self.load_cached_deposits_impl(chain_id, start_block)
            })
            .await
    }
}
