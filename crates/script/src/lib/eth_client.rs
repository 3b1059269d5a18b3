use alloy::network::{Ethereum, EthereumWallet};
use alloy::providers::fillers::RecommendedFillers;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::transports::http::reqwest::Url;
use alloy_primitives::{Address, Bytes, TxHash, U256};

use std::future::Future;
use std::sync::Arc;

use gbc_deposit_reconciler_shared::deposit_data::{Pubkey, PUBKEY_BYTES};
use gbc_deposit_reconciler_shared::payload::PendingDepositsCalldata;
use gbc_deposit_reconciler_shared::validation::OwnerRegistration;
use thiserror::Error;
use tracing::Instrument;

use crate::prometheus_metrics;

sol! {
    #[sol(rpc)]
    interface IDepositContract {
        event DepositEvent(
            bytes pubkey,
            bytes withdrawal_credentials,
            bytes amount,
            bytes signature,
            bytes index
        );
    }
}

sol! {
    #[sol(rpc)]
    interface IERC677 {
        function balanceOf(address holder) external view returns (uint256);
        function transferAndCall(address to, uint256 value, bytes calldata data) external returns (bool);
    }
}

sol! {
    #[sol(rpc)]
    interface IIncentiveRegistry {
        #[derive(Debug)]
        function users(address account) external view returns (
            address safe,
            uint8 status,
            uint16 expectedDepositCount,
            uint256 totalStakeAmount
        );

        function submitPendingDeposits(
            bytes calldata pubkeys,
            bytes calldata signatures,
            bytes32[] calldata deposit_data_roots
        ) external;
    }
}

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("Contract rejected: {0}")]
    Rejection(String),

    #[error("Other alloy error {0:#?}")]
    OtherAlloyError(alloy::contract::Error),

    #[error("Transaction error {0:#?}")]
    TransactionError(#[from] alloy::providers::PendingTransactionError),
}

impl From<alloy::contract::Error> for ContractError {
    fn from(error: alloy::contract::Error) -> Self {
        if let alloy::contract::Error::TransportError(alloy::transports::RpcError::ErrorResp(ref error_payload)) = error
        {
            if error_payload.message.contains("execution reverted") {
                return ContractError::Rejection(error_payload.message.to_string());
            }
        }
        ContractError::OtherAlloyError(error)
    }
}

#[derive(Debug, Error)]
pub enum EventSourceError {
    /// The provider refused the range as a whole; a narrower range may pass.
    #[error("Provider rejected block range {from_block}..={to_block}: {reason}")]
    RangeRejected {
        from_block: u64,
        to_block: u64,
        reason: String,
    },

    #[error("Deposit event carried a {actual}-byte public key, expected {expected}")]
    MalformedEventKey { actual: usize, expected: usize },

    #[error("Contract query failed: {0:#?}")]
    Query(alloy::contract::Error),

    #[error(transparent)]
    Rpc(#[from] alloy::transports::RpcError<alloy::transports::TransportErrorKind>),
}

// Providers cap both result size and execution time of a single getLogs
// call; either rejection is recoverable by narrowing the range.
fn classify_filter_error(from_block: u64, to_block: u64, error: alloy::contract::Error) -> EventSourceError {
    let message = error.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("query returned more than") || lowered.contains("timeout") || lowered.contains("timed out") {
        EventSourceError::RangeRejected {
            from_block,
            to_block,
            reason: message,
        }
    } else {
        EventSourceError::Query(error)
    }
}

/// Range-scoped access to the deposit contract's event log.
pub trait DepositEventSource {
    fn deposit_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> impl Future<Output = Result<Vec<Pubkey>, EventSourceError>> + Send;

    fn current_block(&self) -> impl Future<Output = Result<u64, EventSourceError>> + Send;
}

pub struct DepositContractClient<P>
where
    P: Provider<Ethereum> + Clone,
{
    contract: IDepositContract::IDepositContractInstance<Arc<P>>,
    metric_reporter: Arc<prometheus_metrics::Service>,
}

impl<P> DepositContractClient<P>
where
    P: Provider<Ethereum> + Clone,
{
    pub fn new(provider: Arc<P>, contract_address: Address, metric_reporter: Arc<prometheus_metrics::Service>) -> Self {
        let contract = IDepositContract::new(contract_address, Arc::clone(&provider));
        Self {
            contract,
            metric_reporter,
        }
    }

    pub fn address(&self) -> &Address {
        self.contract.address()
    }

    async fn deposit_events_impl(&self, from_block: u64, to_block: u64) -> Result<Vec<Pubkey>, EventSourceError> {
        tracing::debug!(from_block, to_block, "Querying deposit events");
        let events = self
            .contract
            .DepositEvent_filter()
            .from_block(from_block)
            .to_block(to_block)
            .query()
            .await
            .map_err(|e| classify_filter_error(from_block, to_block, e))?;

        events
            .into_iter()
            .map(|(event, _log)| {
                Pubkey::try_from(event.pubkey.as_ref()).map_err(|_| EventSourceError::MalformedEventKey {
                    actual: event.pubkey.len(),
                    expected: PUBKEY_BYTES,
                })
            })
            .collect()
    }
}

impl<P> DepositEventSource for DepositContractClient<P>
where
    P: Provider<Ethereum> + Clone,
{
    async fn deposit_events(&self, from_block: u64, to_block: u64) -> Result<Vec<Pubkey>, EventSourceError> {
        self.metric_reporter
            .run_with_metrics_and_logs_async(prometheus_metrics::services::deposit_contract::GET_DEPOSIT_EVENTS, || {
                self.deposit_events_impl(from_block, to_block)
            })
            .await
    }

    async fn current_block(&self) -> Result<u64, EventSourceError> {
        self.metric_reporter
            .run_with_metrics_and_logs_async(prometheus_metrics::services::deposit_contract::GET_BLOCK_NUMBER, || async {
                Ok(self.contract.provider().get_block_number().await?)
            })
            .await
    }
}

pub struct TokenContractWrapper<P>
where
    P: Provider<Ethereum> + Clone,
{
    contract: IERC677::IERC677Instance<Arc<P>>,
    metric_reporter: Arc<prometheus_metrics::Service>,
}

impl<P> TokenContractWrapper<P>
where
    P: Provider<Ethereum> + Clone,
{
    pub fn new(provider: Arc<P>, contract_address: Address, metric_reporter: Arc<prometheus_metrics::Service>) -> Self {
        let contract = IERC677::new(contract_address, Arc::clone(&provider));
        Self {
            contract,
            metric_reporter,
        }
    }

    pub fn address(&self) -> &Address {
        self.contract.address()
    }

    pub async fn balance_of(&self, holder: Address) -> Result<U256, ContractError> {
        self.metric_reporter
            .run_with_metrics_and_logs_async(prometheus_metrics::services::token::BALANCE_OF, || async {
                let balance = self
                    .contract
                    .balanceOf(holder)
                    .call()
                    .await
                    .inspect(|balance| tracing::debug!(holder = ?holder, "Token balance is {balance}"))
                    .inspect_err(|err| tracing::error!(holder = ?holder, "Failed to read token balance {err:?}"))?;
                Ok(balance)
            })
            .await
    }

    async fn transfer_and_call_impl(&self, to: Address, value: U256, data: Bytes) -> Result<TxHash, ContractError> {
        let tx_builder = self.contract.transferAndCall(to, value, data);

        // Preflight mirrors what will be sent, so a revert fails fast with
        // the contract's reason instead of a burned transaction.
        if let Err(err) = tx_builder.call().await {
            tracing::error!("Preflight call for transferAndCall reverted: {err:?}");
            return Err(err.into());
        }

        let pending = tx_builder
            .send()
            .instrument(tracing::info_span!("send_tx"))
            .await
            .inspect(|tx| tracing::info!("Submitted transfer transaction {}", tx.tx_hash()))
            .inspect_err(|err| tracing::error!("Failed to submit transfer transaction {err:?}"))?;
        Ok(*pending.tx_hash())
    }

    /// Sends `value` tokens to the deposit contract with the deposit payload
    /// attached, returning the transaction hash as the handle. Confirmation
    /// is the caller's concern.
    pub async fn transfer_and_call(&self, to: Address, value: U256, data: Bytes) -> Result<TxHash, ContractError> {
        let span = tracing::info_span!("transfer_and_call", to = ?to, value = ?value);
        self.metric_reporter
            .run_with_metrics_and_logs_async(prometheus_metrics::services::token::TRANSFER_AND_CALL, || {
                self.transfer_and_call_impl(to, value, data).instrument(span)
            })
            .await
    }
}

pub struct IncentiveContractWrapper<P>
where
    P: Provider<Ethereum> + Clone,
{
    contract: IIncentiveRegistry::IIncentiveRegistryInstance<Arc<P>>,
    metric_reporter: Arc<prometheus_metrics::Service>,
}

impl<P> IncentiveContractWrapper<P>
where
    P: Provider<Ethereum> + Clone,
{
    pub fn new(provider: Arc<P>, contract_address: Address, metric_reporter: Arc<prometheus_metrics::Service>) -> Self {
        let contract = IIncentiveRegistry::new(contract_address, Arc::clone(&provider));
        Self {
            contract,
            metric_reporter,
        }
    }

    pub fn address(&self) -> &Address {
        self.contract.address()
    }

    pub async fn users(&self, account: Address) -> Result<OwnerRegistration, ContractError> {
        self.metric_reporter
            .run_with_metrics_and_logs_async(prometheus_metrics::services::incentive::GET_USER, || async {
                let response = self
                    .contract
                    .users(account)
                    .call()
                    .await
                    .inspect(|val| tracing::debug!(account = ?account, "Obtained registration {val:?}"))
                    .inspect_err(|err| tracing::error!(account = ?account, "Failed to read registration {err:?}"))?;
                Ok(OwnerRegistration {
                    safe: response.safe,
                    status: response.status,
                    expected_deposit_count: response.expectedDepositCount,
                    total_stake_amount: response.totalStakeAmount,
                })
            })
            .await
    }

    async fn submit_pending_deposits_impl(&self, calldata: &PendingDepositsCalldata) -> Result<TxHash, ContractError> {
        let tx_builder = self.contract.submitPendingDeposits(
            calldata.pubkeys.clone(),
            calldata.signatures.clone(),
            calldata.deposit_data_roots.clone(),
        );

        if let Err(err) = tx_builder.call().await {
            tracing::error!("Preflight call for submitPendingDeposits reverted: {err:?}");
            return Err(err.into());
        }

        tracing::info!(
            deposits = calldata.deposit_data_roots.len(),
            "Submitting pending deposits"
        );
        let pending = tx_builder
            .send()
            .instrument(tracing::info_span!("send_tx"))
            .await
            .inspect(|tx| tracing::info!("Submitted claim transaction {}", tx.tx_hash()))
            .inspect_err(|err| tracing::error!("Failed to submit claim transaction {err:?}"))?;
        Ok(*pending.tx_hash())
    }

    pub async fn submit_pending_deposits(&self, calldata: &PendingDepositsCalldata) -> Result<TxHash, ContractError> {
        let span = tracing::info_span!("submit_pending_deposits", deposits = calldata.deposit_data_roots.len());
        self.metric_reporter
            .run_with_metrics_and_logs_async(prometheus_metrics::services::incentive::SUBMIT_PENDING_DEPOSITS, || {
                self.submit_pending_deposits_impl(calldata).instrument(span)
            })
            .await
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Failed to convert string to hex")]
    FromHexError,
    #[error("Failed to parse private key")]
    ParsePrivateKeyError,
    #[error("Failed to deserialize private key")]
    DeserializePrivateKeyError,
}

pub type DefaultProvider = alloy::providers::fillers::FillProvider<
    alloy::providers::fillers::JoinFill<
        alloy::providers::fillers::JoinFill<
            alloy::providers::Identity,
            <Ethereum as RecommendedFillers>::RecommendedFillers,
        >,
        alloy::providers::fillers::WalletFiller<EthereumWallet>,
    >,
    alloy::providers::RootProvider,
>;

pub type DepositContract = DepositContractClient<DefaultProvider>;
pub type TokenContract = TokenContractWrapper<DefaultProvider>;
pub type IncentiveContract = IncentiveContractWrapper<DefaultProvider>;

pub struct ProviderFactory {}

impl ProviderFactory {
    pub fn decode_key(private_key_raw: &str) -> Result<k256::SecretKey, ProviderError> {
        let key_str = private_key_raw
            .split("0x")
            .last()
            .ok_or(ProviderError::ParsePrivateKeyError)?
            .trim();
        let key_hex = hex::decode(key_str).map_err(|_e| ProviderError::FromHexError)?;
        let key = k256::SecretKey::from_bytes((&key_hex[..]).into())
            .map_err(|_e| ProviderError::DeserializePrivateKeyError)?;
        Ok(key)
    }

    pub fn signer_address(key: &k256::SecretKey) -> Address {
        PrivateKeySigner::from(key.clone()).address()
    }

    pub fn create_provider(key: k256::SecretKey, endpoint: Url) -> DefaultProvider {
        let signer: PrivateKeySigner = PrivateKeySigner::from(key);
        let wallet: EthereumWallet = EthereumWallet::from(signer);
        ProviderBuilder::new().wallet(wallet).connect_http(endpoint)
    }
}
