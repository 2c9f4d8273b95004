//! Canonical transfer record and the per-event assembly draft.

use bigdecimal::BigDecimal;
use primitive_types::H256;
use serde::{Deserialize, Serialize};

/// Normalize an address string to the canonical stored case: lowercase,
/// `0x`-prefixed hex.
pub fn normalize_address(address: &str) -> String {
    let lower = address.to_ascii_lowercase();
    if lower.starts_with("0x") {
        lower
    } else {
        format!("0x{lower}")
    }
}

/// Persisted transfer record, keyed by deposit nonce.
///
/// Exactly one record exists per nonce; re-ingesting the same nonce
/// overwrites every field with the freshly computed values. All addresses are
/// normalized with [`normalize_address`] before assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub deposit_nonce: u64,
    pub from_address: String,
    pub from_domain_id: u8,
    pub from_network_name: String,
    pub to_domain_id: u8,
    pub to_network_name: String,
    pub to_address: String,
    pub source_token_address: String,
    pub destination_token_address: String,
    pub amount: BigDecimal,
    pub resource_id: H256,
    pub handler_response: Vec<u8>,
    pub block_number: u64,
    pub transaction_hash: H256,
    /// Block timestamp, unix seconds.
    pub timestamp: i64,
}

/// Field-by-field accumulator for an in-flight record.
///
/// The pipeline stages every computed field here as it goes, so whatever
/// partial state existed at failure time is well-defined and lands in the
/// failure report instead of being lost.
#[derive(Debug, Clone, Default)]
pub struct TransferDraft {
    pub deposit_nonce: Option<u64>,
    pub from_address: Option<String>,
    pub from_domain_id: Option<u8>,
    pub from_network_name: Option<String>,
    pub to_domain_id: Option<u8>,
    pub to_network_name: Option<String>,
    pub to_address: Option<String>,
    pub source_token_address: Option<String>,
    pub destination_token_address: Option<String>,
    pub amount: Option<BigDecimal>,
    pub resource_id: Option<H256>,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<H256>,
    pub timestamp: Option<i64>,
}
