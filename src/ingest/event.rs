//! Deposit event decoder.
//!
//! Interprets a raw log entry against the bridge contract's event schema:
//!
//! ```text
//! Deposit(uint8 destinationDomainID, bytes32 resourceID, uint64 depositNonce,
//!         address indexed user, bytes data, bytes handlerResponse)
//! ```
//!
//! The sender sits in `topics[1]`; the remaining fields follow the standard
//! ABI head/tail layout in the log data, with `data` and `handlerResponse`
//! as offset-addressed dynamic bytes.

use primitive_types::{H160, H256, U256};
use sha3::{Digest, Keccak256};

use crate::error::DecodeError;

/// Solidity signature of the bridge Deposit event.
pub const DEPOSIT_SIGNATURE: &str = "Deposit(uint8,bytes32,uint64,address,bytes,bytes)";

/// Number of 32-byte head words in the Deposit event data.
const HEAD_WORDS: usize = 5;

/// `topics[0]` value of a Deposit log: keccak256 of the event signature.
pub fn deposit_topic() -> H256 {
    H256::from_slice(&Keccak256::digest(DEPOSIT_SIGNATURE.as_bytes()))
}

/// Raw log entry as returned by the chain RPC collaborator.
#[derive(Debug, Clone)]
pub struct RawLog {
    pub address: H160,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
    pub block_number: u64,
    pub transaction_hash: H256,
}

/// Decoded Deposit event. Ephemeral: enriched and persisted as a
/// [`TransferRecord`](crate::ingest::record::TransferRecord), never stored
/// as-is.
#[derive(Debug, Clone)]
pub struct DepositEvent {
    pub destination_domain_id: u8,
    pub resource_id: H256,
    /// Monotonic per source domain. External correlation key.
    pub deposit_nonce: u64,
    pub sender: H160,
    /// Opaque payload, decoded separately against the handler's layout.
    pub data: Vec<u8>,
    pub handler_response: Vec<u8>,
}

/// Decode one raw log entry into a [`DepositEvent`].
///
/// Fails with [`DecodeError::EventShape`] if the log does not match the
/// expected event shape. Callers isolate such a failure to the single entry.
pub fn decode_deposit_log(log: &RawLog) -> Result<DepositEvent, DecodeError> {
    if log.topics.first() != Some(&deposit_topic()) {
        return Err(DecodeError::EventShape(
            "topics[0] is not the Deposit signature".to_string(),
        ));
    }
    let sender_topic = log
        .topics
        .get(1)
        .ok_or_else(|| DecodeError::EventShape("missing indexed sender topic".to_string()))?;

    if log.data.len() < HEAD_WORDS * 32 {
        return Err(DecodeError::EventShape(format!(
            "data holds {} bytes, head needs {}",
            log.data.len(),
            HEAD_WORDS * 32
        )));
    }

    let destination_domain_id = decode_u8_word(&word(&log.data, 0))?;
    let resource_id = H256::from_slice(&word(&log.data, 1));
    let deposit_nonce = decode_u64_word(&word(&log.data, 2))?;
    let sender = H160::from_slice(&sender_topic.as_bytes()[12..]);

    let data = read_dynamic_bytes(&log.data, &word(&log.data, 3))?;
    let handler_response = read_dynamic_bytes(&log.data, &word(&log.data, 4))?;

    Ok(DepositEvent {
        destination_domain_id,
        resource_id,
        deposit_nonce,
        sender,
        data,
        handler_response,
    })
}

fn word(data: &[u8], index: usize) -> [u8; 32] {
    let mut w = [0u8; 32];
    w.copy_from_slice(&data[index * 32..(index + 1) * 32]);
    w
}

fn decode_u8_word(w: &[u8; 32]) -> Result<u8, DecodeError> {
    if w[..31].iter().any(|b| *b != 0) {
        return Err(DecodeError::EventShape("uint8 word overflows".to_string()));
    }
    Ok(w[31])
}

fn decode_u64_word(w: &[u8; 32]) -> Result<u64, DecodeError> {
    if w[..24].iter().any(|b| *b != 0) {
        return Err(DecodeError::EventShape("uint64 word overflows".to_string()));
    }
    let mut n = [0u8; 8];
    n.copy_from_slice(&w[24..32]);
    Ok(u64::from_be_bytes(n))
}

/// Read a dynamic `bytes` field addressed by an offset word: a length word at
/// the offset, followed by the content.
fn read_dynamic_bytes(data: &[u8], offset_word: &[u8; 32]) -> Result<Vec<u8>, DecodeError> {
    let offset = usize::try_from(U256::from_big_endian(offset_word)).unwrap_or(usize::MAX);
    let len_end = offset
        .checked_add(32)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| DecodeError::EventShape(format!("bytes offset {offset} out of range")))?;

    let mut len_word = [0u8; 32];
    len_word.copy_from_slice(&data[offset..len_end]);
    let len = usize::try_from(U256::from_big_endian(&len_word)).unwrap_or(usize::MAX);

    let content_end = len_end
        .checked_add(len)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| DecodeError::EventShape(format!("bytes length {len} out of range")))?;

    Ok(data[len_end..content_end].to_vec())
}
