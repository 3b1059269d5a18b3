use std::env::{self, VarError};
use std::path::PathBuf;
use std::sync::Arc;

use alloy::transports::http::reqwest::Url;
use alloy_primitives::{Address, U256};
use thiserror::Error;

use crate::consts::{self, NetworkInfo, WrappedNetwork, TOKEN_COST_PER_DEPOSIT_WEI};
use crate::deposit_cache::file::FileDepositCache;
use crate::deposit_cache::reqwest::ReqwestDepositCache;
use crate::deposit_cache::{CachedDeposits, DepositCacheReader, InitializationError};
use crate::eth_client::{
    DefaultProvider, DepositContract, DepositContractClient, IncentiveContract, IncentiveContractWrapper,
    ProviderError, ProviderFactory, TokenContract, TokenContractWrapper,
};
use crate::prometheus_metrics;
use crate::utils::read_env;
use gbc_deposit_reconciler_shared::validation::DepositRequirements;

const DEFAULT_DRY_RUN: bool = true; // Fail close

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read env var {0:?}")]
    FailedToReadEnvVar(VarError),

    #[error("Failed to read network from env var: {0:?}")]
    FailedToParseNetwork(#[from] consts::NetworkParseError),

    #[error("Failed to create deposit cache reader: {0:?}")]
    FailedToCreateCacheReader(#[from] InitializationError),

    #[error("Failed to prepare provider: {0:?}")]
    Provider(#[from] ProviderError),

    #[error("Setting {name}: unknown value {value}")]
    UnknownSetting { name: String, value: String },
}

impl From<VarError> for Error {
    fn from(err: VarError) -> Self {
        Error::FailedToReadEnvVar(err)
    }
}

pub enum DepositCacheReaderEnum {
    File(FileDepositCache),
    Http(ReqwestDepositCache),
}

impl DepositCacheReaderEnum {
    pub fn new_from_env(
        metrics_reporter: Arc<prometheus_metrics::Service>,
    ) -> Result<DepositCacheReaderEnum, Error> {
        let cache_mode_var = env::var("DEPOSIT_CACHE_MODE")?;

        match cache_mode_var.to_lowercase().as_str() {
            "file" => {
                let store_location = env::var("DEPOSIT_CACHE_DIR")?;
                let file_reader = FileDepositCache::new(&PathBuf::from(store_location), metrics_reporter)?;
                Ok(DepositCacheReaderEnum::File(file_reader))
            }
            "http" => {
                let base_uri = env::var("DEPOSIT_CACHE_URL")?;
                let http_reader = ReqwestDepositCache::new(&base_uri, metrics_reporter);
                Ok(DepositCacheReaderEnum::Http(http_reader))
            }
            unknown_value => Err(Error::UnknownSetting {
                name: "DEPOSIT_CACHE_MODE".to_string(),
                value: unknown_value.to_string(),
            }),
        }
    }
}

impl DepositCacheReader for DepositCacheReaderEnum {
    async fn load_cached_deposits(&self, chain_id: u64, start_block: u64) -> anyhow::Result<CachedDeposits> {
        match self {
            Self::File(reader) => reader.load_cached_deposits(chain_id, start_block).await,
            Self::Http(reader) => reader.load_cached_deposits(chain_id, start_block).await,
        }
    }
}

pub mod env_vars {
    use std::env;
    use std::fmt::Debug;

    #[derive(Clone)]
    pub struct EnvVarValue<TVal> {
        pub name: &'static str,
        pub sensitive: bool,
        pub value: TVal,
    }

    impl<TVal: Debug> Debug for EnvVarValue<TVal> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            let value_print = if self.sensitive {
                "***".to_string()
            } else {
                format!("{:?}", self.value)
            };
            f.debug_struct("EnvVarValue")
                .field("name", &self.name)
                .field("value", &value_print)
                .finish()
        }
    }

    #[derive(Debug, Clone)]
    pub struct EnvVars {
        pub evm_chain: EnvVarValue<String>,
        pub execution_layer_rpc: EnvVarValue<String>,
        pub deposit_cache_mode: EnvVarValue<String>,
        pub dry_run: EnvVarValue<Option<String>>,
        // sensitive
        pub private_key: EnvVarValue<String>,
    }

    impl EnvVars {
        fn optional(key: &'static str, sensitive: bool) -> EnvVarValue<Option<String>> {
            let value = match env::var(key) {
                Ok(value) => Some(value),
                Err(_) => None,
            };
            EnvVarValue {
                name: key,
                sensitive,
                value,
            }
        }

        fn required(key: &'static str, sensitive: bool) -> EnvVarValue<String> {
            let value = env::var(key).unwrap_or_else(|e| panic!("Failed to read env var {key}: {e:?}"));
            EnvVarValue {
                name: key,
                sensitive,
                value,
            }
        }

        pub fn init_from_env() -> Self {
            Self {
                evm_chain: Self::required("EVM_CHAIN", false),
                execution_layer_rpc: Self::required("EXECUTION_LAYER_RPC", true),
                deposit_cache_mode: Self::required("DEPOSIT_CACHE_MODE", false),
                dry_run: Self::optional("DRY_RUN", false),
                private_key: Self::required("PRIVATE_KEY", true),
            }
        }
    }
}

pub struct DepositSettings {
    pub deposit_contract_address: Address,
    pub token_contract_address: Address,
    pub incentive_contract_address: Option<Address>,
    pub deposit_start_block: u64,
    pub requirements: DepositRequirements,
    pub token_cost_per_deposit: U256,
}

pub struct EthInfrastructure {
    pub network: WrappedNetwork,
    pub provider: Arc<DefaultProvider>,
    /// Address the submitting account signs with
    pub operator: Address,
    pub deposit_contract: DepositContract,
}

pub struct DepositInfrastructure {
    pub token_contract: TokenContract,
    pub incentive_contract: Option<IncentiveContract>,
    pub cache_reader: DepositCacheReaderEnum,
}

pub struct PipelineRuntime {
    pub eth_infra: EthInfrastructure,
    pub deposit_infra: DepositInfrastructure,
    pub settings: DepositSettings,
    pub metrics: Arc<prometheus_metrics::Metrics>,
    pub env_vars: Option<env_vars::EnvVars>,
}

impl PipelineRuntime {
    pub fn new(
        eth_infra: EthInfrastructure,
        deposit_infra: DepositInfrastructure,
        settings: DepositSettings,
        metrics: Arc<prometheus_metrics::Metrics>,
        env_vars: Option<env_vars::EnvVars>,
    ) -> Self {
        Self {
            eth_infra,
            deposit_infra,
            settings,
            metrics,
            env_vars,
        }
    }

    pub fn init(env_vars: env_vars::EnvVars) -> Result<Self, Error> {
        let endpoint: Url = env_vars
            .execution_layer_rpc
            .value
            .clone()
            .parse()
            .expect("Couldn't parse endpoint URL");
        let network = env_vars.evm_chain.value.clone().parse::<WrappedNetwork>()?;
        let config = network.get_config();

        let namespace = read_env("PROMETHEUS_NAMESPACE", "gbc_deposit".to_string());
        let metrics = Arc::new(prometheus_metrics::Metrics::new(&namespace));
        let chain_name = network.as_str();
        metrics
            .metadata
            .network_chain
            .with_label_values(&[chain_name.as_str()])
            .set(config.chain_id as f64);

        let key = ProviderFactory::decode_key(&env_vars.private_key.value)?;
        let operator = ProviderFactory::signer_address(&key);
        let provider = Arc::new(ProviderFactory::create_provider(key, endpoint));

        let deposit_contract = DepositContractClient::new(
            Arc::clone(&provider),
            config.deposit_contract,
            Arc::clone(&metrics.services.deposit_contract),
        );
        let token_contract = TokenContractWrapper::new(
            Arc::clone(&provider),
            config.token_contract,
            Arc::clone(&metrics.services.token),
        );
        let incentive_contract = config.incentive_contract.map(|address| {
            IncentiveContractWrapper::new(Arc::clone(&provider), address, Arc::clone(&metrics.services.incentive))
        });
        let cache_reader = DepositCacheReaderEnum::new_from_env(Arc::clone(&metrics.services.deposit_cache))?;

        let settings = DepositSettings {
            deposit_contract_address: config.deposit_contract,
            token_contract_address: config.token_contract,
            incentive_contract_address: config.incentive_contract,
            deposit_start_block: config.deposit_start_block,
            requirements: config.deposit_requirements(),
            token_cost_per_deposit: U256::from(TOKEN_COST_PER_DEPOSIT_WEI),
        };

        Ok(Self::new(
            EthInfrastructure {
                network,
                provider,
                operator,
                deposit_contract,
            },
            DepositInfrastructure {
                token_contract,
                incentive_contract,
                cache_reader,
            },
            settings,
            metrics,
            Some(env_vars),
        ))
    }

    pub fn init_from_env() -> Result<Self, Error> {
        let env_vars = env_vars::EnvVars::init_from_env();
        Self::init(env_vars)
    }

    pub fn cache_reader(&self) -> &impl DepositCacheReader {
        &self.deposit_infra.cache_reader
    }

    pub fn event_source(&self) -> &DepositContract {
        &self.eth_infra.deposit_contract
    }

    pub fn network(&self) -> &impl NetworkInfo {
        &self.eth_infra.network
    }

    pub fn is_dry_run(&self) -> bool {
        if let Some(env_vars) = &self.env_vars {
            match &env_vars.dry_run.value {
                Some(v) => v
                    .parse()
                    .unwrap_or_else(|e| panic!("Couldn't parse DRY_RUN value {v}: {e:?}")),
                None => DEFAULT_DRY_RUN,
            }
        } else {
            DEFAULT_DRY_RUN
        }
    }
}
