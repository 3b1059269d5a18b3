use std::str::FromStr;

use alloy_primitives::Address;
use gbc_deposit_reconciler_shared::deposit_data::ForkVersion;
use gbc_deposit_reconciler_shared::validation::DepositRequirements;

/// Canonical per-validator deposit amount, in gwei of staked token units.
pub const DEPOSIT_AMOUNT_GWEI: u64 = 32_000_000_000;

/// Token cost of a single deposit, in wei.
pub const TOKEN_COST_PER_DEPOSIT_WEI: u128 = 1_000_000_000_000_000_000;

/// Maximum number of deposits aggregatable into one batch call.
pub const MAX_BATCH_SIZE: usize = 128;

pub struct NetworkConfig {
    pub chain_id: u64,
    pub fork_version: ForkVersion,
    pub deposit_contract: Address,
    pub token_contract: Address,
    /// Deployed on mainnet only
    pub incentive_contract: Option<Address>,
    /// Block the deposit contract was deployed at; cached history starts here
    pub deposit_start_block: u64,
}

impl NetworkConfig {
    pub fn deposit_requirements(&self) -> DepositRequirements {
        DepositRequirements {
            chain_id: self.chain_id,
            fork_version: self.fork_version,
            deposit_amount_gwei: DEPOSIT_AMOUNT_GWEI,
            max_batch_size: MAX_BATCH_SIZE,
        }
    }
}

pub trait NetworkInfo {
    fn as_str(&self) -> String;
    fn get_config(&self) -> NetworkConfig;
}

#[derive(Debug, Clone)]
pub enum Network {
    Gnosis,
    Chiado,
}

impl NetworkInfo for Network {
    fn as_str(&self) -> String {
        let val = match self {
            Self::Gnosis => "gnosis",
            Self::Chiado => "chiado",
        };
        val.to_owned()
    }

    fn get_config(&self) -> NetworkConfig {
        match self {
            Self::Gnosis => NetworkConfig {
                chain_id: 100,
                fork_version: fork_versions::GNOSIS,
                deposit_contract: deposit_contracts::GNOSIS,
                token_contract: token_contracts::GNOSIS,
                incentive_contract: Some(incentive_contracts::GNOSIS),
                deposit_start_block: 19_469_076,
            },
            Self::Chiado => NetworkConfig {
                chain_id: 10200,
                fork_version: fork_versions::CHIADO,
                deposit_contract: deposit_contracts::CHIADO,
                token_contract: token_contracts::CHIADO,
                incentive_contract: None,
                deposit_start_block: 155_530,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum WrappedNetwork {
    Anvil(Network),
    Id(Network),
}

impl NetworkInfo for WrappedNetwork {
    fn as_str(&self) -> String {
        match self {
            Self::Anvil(fork) => format!("anvil-{}", fork.as_str()),
            Self::Id(network) => network.as_str().to_owned(),
        }
    }

    fn get_config(&self) -> NetworkConfig {
        match self {
            Self::Id(network) => network.get_config(),
            Self::Anvil(fork) => {
                let mut fork_config = fork.get_config();
                fork_config.chain_id = 31337;
                fork_config
            }
        }
    }
}

pub mod fork_versions {
    use super::ForkVersion;
    use hex_literal::hex;
    pub const GNOSIS: ForkVersion = ForkVersion::new(hex!("00000064"));
    pub const CHIADO: ForkVersion = ForkVersion::new(hex!("0000006f"));
}

pub mod deposit_contracts {
    use super::Address;
    use hex_literal::hex;
    pub const GNOSIS: Address = Address::new(hex!("0B98057eA310F4d31F2a452B414647007d1645d9"));
    pub const CHIADO: Address = Address::new(hex!("b97036A26259B7147018913bD58a774cf91acf25"));
}

pub mod token_contracts {
    use super::Address;
    use hex_literal::hex;
    pub const GNOSIS: Address = Address::new(hex!("9C58BAcC331c9aa871AFD802DB6379a98e80CEdb"));
    pub const CHIADO: Address = Address::new(hex!("19C653Da7c37c66208fbfbE8908A5051B57b4C70"));
}

pub mod incentive_contracts {
    use super::Address;
    use hex_literal::hex;
    pub const GNOSIS: Address = Address::new(hex!("6C68322cf55f5f025F2aebd93a28761182d077c3"));
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown network {0}")]
pub struct NetworkParseError(String);

impl FromStr for Network {
    type Err = NetworkParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "gnosis" => Ok(Network::Gnosis),
            "chiado" => Ok(Network::Chiado),
            other => Err(NetworkParseError(other.to_owned())),
        }
    }
}

impl FromStr for WrappedNetwork {
    type Err = NetworkParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.strip_prefix("anvil-") {
            Some(fork) => Ok(WrappedNetwork::Anvil(fork.parse()?)),
            None => Ok(WrappedNetwork::Id(value.parse()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_roundtrip() {
        let network: WrappedNetwork = "gnosis".parse().expect("Failed to parse");
        assert_eq!(network.as_str(), "gnosis");
        assert_eq!(network.get_config().chain_id, 100);

        let anvil: WrappedNetwork = "anvil-chiado".parse().expect("Failed to parse");
        assert_eq!(anvil.as_str(), "anvil-chiado");
        assert_eq!(anvil.get_config().chain_id, 31337);
        assert_eq!(anvil.get_config().fork_version, fork_versions::CHIADO);
    }

    #[test]
    fn unknown_network_is_rejected() {
        assert!("goerli".parse::<WrappedNetwork>().is_err());
    }
}
