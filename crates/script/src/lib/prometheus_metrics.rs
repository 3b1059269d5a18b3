use std::future::Future;
use std::sync::Arc;

use anyhow;
use prometheus::{Counter, Gauge, GaugeVec, Histogram, HistogramOpts, Opts, Registry};

pub trait Registar {
    fn register_on(&self, registry: &Registry) -> anyhow::Result<()>;
}

pub struct Metrics {
    pub metadata: Metadata,
    pub reconciliation: Reconciliation,
    pub services: Services,
}

impl Registar for Metrics {
    fn register_on(&self, registry: &Registry) -> anyhow::Result<()> {
        self.metadata.register_on(registry)?;
        self.reconciliation.register_on(registry)?;
        self.services.register_on(registry)?;
        Ok(())
    }
}

pub struct Metadata {
    pub network_chain: GaugeVec,
}

impl Registar for Metadata {
    fn register_on(&self, registry: &Registry) -> anyhow::Result<()> {
        registry.register(Box::new(self.network_chain.clone()))?;
        Ok(())
    }
}

pub struct Reconciliation {
    pub cached_keys: Gauge,
    pub fetched_events: Gauge,
    pub known_keys: Gauge,
    pub checkpoint_block: Gauge,
}

impl Registar for Reconciliation {
    fn register_on(&self, registry: &Registry) -> anyhow::Result<()> {
        registry.register(Box::new(self.cached_keys.clone()))?;
        registry.register(Box::new(self.fetched_events.clone()))?;
        registry.register(Box::new(self.known_keys.clone()))?;
        registry.register(Box::new(self.checkpoint_block.clone()))?;
        Ok(())
    }
}

pub struct Service {
    pub call_count: Counter,
    pub error_count: Counter,
    pub execution_time_seconds: Histogram,
}

impl Registar for Service {
    fn register_on(&self, registry: &Registry) -> anyhow::Result<()> {
        registry.register(Box::new(self.call_count.clone()))?;
        registry.register(Box::new(self.error_count.clone()))?;
        registry.register(Box::new(self.execution_time_seconds.clone()))?;
        Ok(())
    }
}

impl Service {
    pub async fn run_with_metrics_and_logs_async<T, E, OpFn, Fut>(&self, operation: &'static str, op: OpFn) -> Result<T, E>
    where
        OpFn: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Debug,
    {
        self.call_count.inc();
        let timer = self.execution_time_seconds.start_timer();
        let result = op().await;
        timer.observe_duration();
        if let Err(error) = &result {
            self.error_count.inc();
            tracing::debug!("{operation} failed: {error:?}");
        }
        result
    }
}

pub struct Services {
    pub deposit_contract: Arc<Service>,
    pub deposit_cache: Arc<Service>,
    pub token: Arc<Service>,
    pub incentive: Arc<Service>,
}

impl Registar for Services {
    fn register_on(&self, registry: &Registry) -> anyhow::Result<()> {
        self.deposit_contract.register_on(registry)?;
        self.deposit_cache.register_on(registry)?;
        self.token.register_on(registry)?;
        self.incentive.register_on(registry)?;
        Ok(())
    }
}

pub mod services {
    pub mod deposit_contract {
        pub const GET_DEPOSIT_EVENTS: &str = "get_deposit_events";
        pub const GET_BLOCK_NUMBER: &str = "get_block_number";
    }
    pub mod deposit_cache {
        pub const LOAD_CACHED_DEPOSITS: &str = "load_cached_deposits";
    }
    pub mod token {
        pub const BALANCE_OF: &str = "balance_of";
        pub const TRANSFER_AND_CALL: &str = "transfer_and_call";
    }
    pub mod incentive {
        pub const GET_USER: &str = "get_user";
        pub const SUBMIT_PENDING_DEPOSITS: &str = "submit_pending_deposits";
    }
}

pub fn register_counter(namespace: &str, name: &str, help: &str) -> Counter {
    let opts = Opts::new(name, help).namespace(namespace.to_string());
    Counter::with_opts(opts).unwrap()
}

pub fn register_gauge(namespace: &str, name: &str, help: &str) -> Gauge {
    let opts = Opts::new(name, help).namespace(namespace.to_string());
    Gauge::with_opts(opts).unwrap()
}

pub fn register_gauge_vec(namespace: &str, name: &str, help: &str, labels: &[&str]) -> GaugeVec {
    let opts = Opts::new(name, help).namespace(namespace.to_string());
    GaugeVec::new(opts, labels).unwrap()
}

pub fn register_histogram(namespace: &str, name: &str, help: &str) -> Histogram {
    let opts = HistogramOpts::new(name, help).namespace(namespace.to_string());
    Histogram::with_opts(opts).unwrap()
}

impl Metrics {
    pub fn new(namespace: &str) -> Self {
        let metadata = Metadata {
            network_chain: register_gauge_vec(
                namespace,
                "metadata__network_chain",
                "Network Chain ID",
                &["chain_name"],
            ),
        };

        let reconciliation = Reconciliation {
            cached_keys: register_gauge(
                namespace,
                "reconciliation__cached_keys",
                "Public keys loaded from the deposit cache",
            ),
            fetched_events: register_gauge(
                namespace,
                "reconciliation__fetched_events",
                "Deposit events fetched past the cache checkpoint",
            ),
            known_keys: register_gauge(
                namespace,
                "reconciliation__known_keys",
                "Total reconciled deposit keys",
            ),
            checkpoint_block: register_gauge(
                namespace,
                "reconciliation__checkpoint_block",
                "Chain head the reconciled set is complete up to",
            ),
        };

        fn build_service_metrics(namespace: &str, component: &str) -> Arc<Service> {
            Arc::new(Service {
                call_count: register_counter(
                    namespace,
                    &format!("external__{component}__call_count"),
                    "Total call count",
                ),
                error_count: register_counter(
                    namespace,
                    &format!("external__{component}__error_count"),
                    "Failed call count",
                ),
                execution_time_seconds: register_histogram(
                    namespace,
                    &format!("{component}_execution_time_seconds"),
                    "Execution time in seconds",
                ),
            })
        }

        let services = Services {
            deposit_contract: build_service_metrics(namespace, "deposit_contract"),
            deposit_cache: build_service_metrics(namespace, "deposit_cache"),
            token: build_service_metrics(namespace, "token"),
            incentive: build_service_metrics(namespace, "incentive"),
        };

        Metrics {
            metadata,
            reconciliation,
            services,
        }
    }
}
