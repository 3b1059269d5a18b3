use std::sync::Arc;
use std::time::Duration;

use reqwest::{header::ACCEPT, Client, ClientBuilder, StatusCode};

use crate::prometheus_metrics;

use super::{chunk_file_name, parse_chunk_keys, CacheChunk, CachedDeposits, DepositCacheReader};

/// Reads the pre-generated deposit snapshots published over HTTP, one
/// directory per chain id.
pub struct ReqwestDepositCache {
    base_uri: String,
    client: Client,
    metrics_reporter: Arc<prometheus_metrics::Service>,
}

impl ReqwestDepositCache {
    fn normalize_url(base_url: &str) -> String {
        base_url.strip_suffix('/').unwrap_or(base_url).to_owned()
    }

    pub fn new(base_uri: &str, metrics_reporter: Arc<prometheus_metrics::Service>) -> Self {
        let client = ClientBuilder::new()
            .timeout(Duration::new(300, 0))
            .build()
            .expect("Failed to create http client");

        Self {
            base_uri: Self::normalize_url(base_uri),
            client,
            metrics_reporter,
        }
    }

    fn chunk_url(&self, chain_id: u64, block: u64) -> String {
        format!("{}/{}/{}", self.base_uri, chain_id, chunk_file_name(block))
    }

    async fn fetch_chunk(&self, chain_id: u64, block: u64) -> anyhow::Result<Option<CacheChunk>> {
        let url = self.chunk_url(chain_id, block);
        tracing::debug!(url, "Fetching deposit cache chunk");
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        // A missing chunk is the end-of-cache marker, not an error
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let chunk = response.error_for_status()?.json::<CacheChunk>().await?;
        Ok(Some(chunk))
    }

    async fn load_cached_deposits_impl(&self, chain_id: u64, start_block: u64) -> anyhow::Result<CachedDeposits> {
        let mut result = CachedDeposits {
            public_keys: Vec::new(),
            last_block: start_block,
        };
        let mut block = start_block;
        while let Some(chunk) = self.fetch_chunk(chain_id, block).await? {
            if chunk.last_block < block {
                anyhow::bail!(
                    "Cache chunk for block {block} of chain {chain_id} does not advance past it"
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
            "Loaded cached deposits from {}",
            self.base_uri
        );
        Ok(result)
    }
}

impl DepositCacheReader for ReqwestDepositCache {
    async fn load_cached_deposits(&self, chain_id: u64, start_block: u64) -> anyhow::Result<CachedDeposits> {
        self.metrics_reporter
            .run_with_metrics_and_logs_async(prometheus_metrics::services::deposit_cache::LOAD_CACHED_DEPOSITS, || {
                self.load_cached_deposits_impl(chain_id, start_block)
            })
            .await
    }
}
