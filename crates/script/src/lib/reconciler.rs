use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::Instrument;

use gbc_deposit_reconciler_shared::deposit_data::Pubkey;
use gbc_deposit_reconciler_shared::reconciled::ReconciledSet;

use crate::deposit_cache::DepositCacheReader;
use crate::eth_client::{DepositEventSource, EventSourceError};
use crate::prometheus_metrics;

#[derive(Debug, thiserror::Error)]
pub enum HistoryFetchError {
    #[error("Failed to load cached deposits: {0:#}")]
    Cache(anyhow::Error),

    #[error("Failed to fetch deposit events: {0}")]
    Events(#[from] EventSourceError),
}

/// Fetches deposit public keys for an inclusive block range, bisecting the
/// range whenever the provider rejects it as too wide.
///
/// Each rejection triggers exactly one split of the rejected range; the two
/// halves are fetched independently and may split further on their own.
/// Recursion bottoms out at single-block ranges, so a provider that keeps
/// rejecting eventually surfaces its error instead of looping.
pub fn fetch_deposit_keys_in_range<'a, Events>(
    events: &'a Events,
    from_block: u64,
    to_block: u64,
) -> BoxFuture<'a, Result<Vec<Pubkey>, EventSourceError>>
where
    Events: DepositEventSource + Sync,
{
    async move {
        match events.deposit_events(from_block, to_block).await {
            Ok(keys) => Ok(keys),
            Err(EventSourceError::RangeRejected { reason, .. }) if from_block < to_block => {
                let middle = from_block + (to_block - from_block) / 2;
                tracing::debug!(
                    from_block,
                    to_block,
                    middle,
                    "Provider rejected range ({reason}), bisecting"
                );
                let mut keys = fetch_deposit_keys_in_range(events, from_block, middle).await?;
                keys.extend(fetch_deposit_keys_in_range(events, middle + 1, to_block).await?);
                Ok(keys)
            }
            Err(error) => Err(error),
        }
    }
    .boxed()
}

/// Merges the cached deposit history with events fetched past the cache's
/// checkpoint into the authoritative set of already-deposited keys.
pub struct HistoryReconciler<'a, Cache, Events> {
    cache: &'a Cache,
    events: &'a Events,
    metrics: &'a prometheus_metrics::Reconciliation,
}

impl<'a, Cache, Events> HistoryReconciler<'a, Cache, Events>
where
    Cache: DepositCacheReader,
    Events: DepositEventSource + Sync,
{
    pub fn new(cache: &'a Cache, events: &'a Events, metrics: &'a prometheus_metrics::Reconciliation) -> Self {
        Self {
            cache,
            events,
            metrics,
        }
    }

    pub async fn reconcile(&self, chain_id: u64, deposit_start_block: u64) -> Result<ReconciledSet, HistoryFetchError> {
        let span = tracing::info_span!("span:reconcile", chain_id, deposit_start_block);
        self.reconcile_impl(chain_id, deposit_start_block).instrument(span).await
    }

    async fn reconcile_impl(
        &self,
        chain_id: u64,
        deposit_start_block: u64,
    ) -> Result<ReconciledSet, HistoryFetchError> {
        let cached = self
            .cache
            .load_cached_deposits(chain_id, deposit_start_block)
            .await
            .map_err(HistoryFetchError::Cache)?;
        self.metrics.cached_keys.set(cached.public_keys.len() as f64);
        tracing::info!(
            cached = cached.public_keys.len(),
            last_block = cached.last_block,
            "Loaded cached deposit history"
        );

        let head = self.events.current_block().await?;
        let mut known = ReconciledSet::from_keys(cached.public_keys);

        // The cache is complete through last_block; anything newer has to
        // come from the chain itself.
        if cached.last_block < head {
            let fetched = fetch_deposit_keys_in_range(self.events, cached.last_block + 1, head).await?;
            self.metrics.fetched_events.set(fetched.len() as f64);
            tracing::info!(
                fetched = fetched.len(),
                from_block = cached.last_block + 1,
                to_block = head,
                "Fetched deposit events past the cache checkpoint"
            );
            known.extend(fetched);
        }

        self.metrics.known_keys.set(known.len() as f64);
        self.metrics.checkpoint_block.set(head as f64);
        tracing::info!(known = known.len(), "Reconciled deposit history up to block {head}");
        Ok(known)
    }
}
