//! Resource-to-token address resolution with memoization.
//!
//! Source-token lookups go through the handler contract collaborator (a chain
//! read call); destination-token lookups go through the cross-domain bridge
//! configuration. Both are memoized in a shared time-bounded cache.

use async_trait::async_trait;
use primitive_types::H256;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::config::BridgeConfig;
use crate::error::ResolutionError;

/// Default lifetime of a cache entry.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(15);

/// Handler contract read surface. `token_contract_address` maps a resource id
/// to the token contract registered on the handler's own chain
/// (`_resourceIDToTokenContractAddress`).
#[async_trait]
pub trait TokenRegistry: Send + Sync {
    async fn token_contract_address(&self, resource_id: H256) -> anyhow::Result<String>;
}

/// Composite cache key. The two variants keep the source and destination key
/// spaces disjoint even for identical (resource, domain) pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    SourceToken { resource_id: H256, domain_id: u8 },
    DestinationToken { resource_id: H256, domain_id: u8 },
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// Time-bounded memoization of resolved token addresses.
///
/// Entries are immutable once written until they expire; a hit is never
/// served past its expiry, and a stale miss leads the resolver to refresh
/// the entry with a fresh lookup.
pub struct ResolutionCache {
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cached value, or `None` if absent or expired.
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: CacheKey, value: String) {
        let expires_at = Instant::now() + self.ttl;
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, CacheEntry { value, expires_at });
    }
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps a resource id to its source-chain and destination-chain token
/// contract addresses, consulting the cache first on both paths.
pub struct AddressResolver {
    registry: Arc<dyn TokenRegistry>,
    config: Arc<BridgeConfig>,
    cache: Arc<ResolutionCache>,
}

impl AddressResolver {
    pub fn new(
        registry: Arc<dyn TokenRegistry>,
        config: Arc<BridgeConfig>,
        cache: Arc<ResolutionCache>,
    ) -> Self {
        Self {
            registry,
            config,
            cache,
        }
    }

    /// Source-chain token contract address for a resource id.
    ///
    /// Cache miss performs the handler contract read call. Failed lookups are
    /// never cached.
    pub async fn resolve_source_token(
        &self,
        resource_id: H256,
        source_domain_id: u8,
    ) -> Result<String, ResolutionError> {
        let key = CacheKey::SourceToken {
            resource_id,
            domain_id: source_domain_id,
        };
        if let Some(address) = self.cache.get(&key) {
            tracing::debug!(
                target: "chainbridge::resolver",
                resource_id = %format!("{resource_id:#x}"),
                domain_id = source_domain_id,
                "source token cache hit"
            );
            return Ok(address);
        }

        let address = self
            .registry
            .token_contract_address(resource_id)
            .await
            .map_err(ResolutionError::ContractCall)?;
        self.cache.insert(key, address.clone());
        Ok(address)
    }

    /// Destination-chain token contract address for a resource id, from the
    /// cross-domain configuration.
    pub async fn resolve_destination_token(
        &self,
        resource_id: H256,
        destination_domain_id: u8,
    ) -> Result<String, ResolutionError> {
        let key = CacheKey::DestinationToken {
            resource_id,
            domain_id: destination_domain_id,
        };
        if let Some(address) = self.cache.get(&key) {
            tracing::debug!(
                target: "chainbridge::resolver",
                resource_id = %format!("{resource_id:#x}"),
                domain_id = destination_domain_id,
                "destination token cache hit"
            );
            return Ok(address);
        }

        let address = self
            .config
            .destination_token_address(resource_id, destination_domain_id)?;
        self.cache.insert(key, address.clone());
        Ok(address)
    }
}
