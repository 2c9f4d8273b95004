//! In-memory collaborators for tests and local pipeline runs.
//!
//! The static provider and registry stand in for the chain RPC and the
//! handler contract, serving canned data while preserving the real
//! collaborators' contracts (ordering, error behavior).

use async_trait::async_trait;
use primitive_types::{H160, H256, U256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::ingest::event::{deposit_topic, DepositEvent, RawLog};
use crate::ingest::fetcher::{BridgeProvider, LogFilter};
use crate::ingest::resolver::TokenRegistry;

/// ABI-encode a [`DepositEvent`] back into a raw log, the inverse of
/// [`decode_deposit_log`](crate::ingest::event::decode_deposit_log).
pub fn encode_deposit_log(
    bridge: H160,
    event: &DepositEvent,
    block_number: u64,
    transaction_hash: H256,
) -> RawLog {
    let mut data = Vec::new();

    // Head: three value words plus two offset words.
    data.extend_from_slice(&U256::from(event.destination_domain_id).to_big_endian());
    data.extend_from_slice(event.resource_id.as_bytes());
    data.extend_from_slice(&U256::from(event.deposit_nonce).to_big_endian());

    let data_offset = 5 * 32;
    let handler_offset = data_offset + 32 + padded_len(event.data.len());
    data.extend_from_slice(&U256::from(data_offset as u64).to_big_endian());
    data.extend_from_slice(&U256::from(handler_offset as u64).to_big_endian());

    append_dynamic_bytes(&mut data, &event.data);
    append_dynamic_bytes(&mut data, &event.handler_response);

    let mut sender_topic = [0u8; 32];
    sender_topic[12..].copy_from_slice(event.sender.as_bytes());

    RawLog {
        address: bridge,
        topics: vec![deposit_topic(), H256::from(sender_topic)],
        data,
        block_number,
        transaction_hash,
    }
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(32) * 32
}

fn append_dynamic_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&U256::from(bytes.len() as u64).to_big_endian());
    out.extend_from_slice(bytes);
    out.resize(out.len() + padded_len(bytes.len()) - bytes.len(), 0);
}

/// Canned chain RPC: serves logs and block timestamps from memory.
pub struct StaticBridgeProvider {
    logs: Vec<RawLog>,
    timestamps: HashMap<u64, i64>,
    fail: bool,
}

impl StaticBridgeProvider {
    pub fn new(logs: Vec<RawLog>, timestamps: HashMap<u64, i64>) -> Self {
        Self {
            logs,
            timestamps,
            fail: false,
        }
    }

    /// Provider whose every call fails, for fatal-path tests.
    pub fn failing() -> Self {
        Self {
            logs: Vec::new(),
            timestamps: HashMap::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl BridgeProvider for StaticBridgeProvider {
    async fn get_logs(&self, filter: &LogFilter) -> anyhow::Result<Vec<RawLog>> {
        if self.fail {
            anyhow::bail!("rpc unavailable");
        }
        Ok(self
            .logs
            .iter()
            .filter(|log| {
                log.address == filter.address
                    && log.topics.first() == Some(&filter.topic0)
                    && log.block_number >= filter.from_block
            })
            .cloned()
            .collect())
    }

    async fn block_timestamp(&self, block_number: u64) -> anyhow::Result<i64> {
        if self.fail {
            anyhow::bail!("rpc unavailable");
        }
        self.timestamps
            .get(&block_number)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("unknown block {block_number}"))
    }
}

/// Canned handler contract with a call counter, so tests can assert how many
/// lookups actually reached the chain.
pub struct StaticTokenRegistry {
    tokens: HashMap<H256, String>,
    calls: AtomicU32,
}

impl StaticTokenRegistry {
    pub fn new(tokens: HashMap<H256, String>) -> Self {
        Self {
            tokens,
            calls: AtomicU32::new(0),
        }
    }

    /// Number of lookups that reached this registry.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRegistry for StaticTokenRegistry {
    async fn token_contract_address(&self, resource_id: H256) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens
            .get(&resource_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown resource {resource_id:#x}"))
    }
}
