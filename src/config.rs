//! Bridge network configuration.
//!
//! One [`ChainConfig`] per domain participating in the bridge. The token list
//! carried by each chain is what backs the cross-domain destination-token
//! lookup consumed by the address resolver.

use primitive_types::{H160, H256};
use serde::Deserialize;

use crate::error::ResolutionError;

/// Complete bridge deployment: every chain the bridge spans.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    pub chains: Vec<ChainConfig>,
}

/// One chain (domain) participating in the bridge.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub domain_id: u8,
    pub name: String,
    pub bridge_address: H160,
    pub erc20_handler_address: H160,
    /// Block the bridge contract was deployed at. Default starting block for
    /// an ingestion run.
    pub deployed_block_number: u64,
    /// Decimal precision used to rescale raw deposit amounts.
    pub decimals: u32,
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

/// A token registered on a chain, keyed by its bridge resource id.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub address: String,
    pub resource_id: H256,
}

impl BridgeConfig {
    pub fn chain(&self, domain_id: u8) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.domain_id == domain_id)
    }

    /// Network name for a domain id.
    pub fn network_name(&self, domain_id: u8) -> Result<&str, ResolutionError> {
        self.chain(domain_id)
            .map(|c| c.name.as_str())
            .ok_or(ResolutionError::UnknownDomain(domain_id))
    }

    /// Token contract address for a resource id on the given destination
    /// domain. This is a pure configuration lookup, no chain call involved.
    pub fn destination_token_address(
        &self,
        resource_id: H256,
        domain_id: u8,
    ) -> Result<String, ResolutionError> {
        let chain = self
            .chain(domain_id)
            .ok_or(ResolutionError::UnknownDomain(domain_id))?;

        chain
            .tokens
            .iter()
            .find(|t| t.resource_id == resource_id)
            .map(|t| t.address.clone())
            .ok_or_else(|| ResolutionError::UnknownResource {
                resource_id: format!("{resource_id:#x}"),
                domain_id,
            })
    }
}
