//! Deposit payload decoder.
//!
//! The handler packs the ERC20 deposit payload as a fixed binary layout:
//!
//! ```text
//! bytes  0..32   amount (big-endian uint256)
//! bytes 32..64   recipient length (big-endian uint256)
//! bytes 64..     recipient address (recipient-length bytes)
//! ```
//!
//! The amount is rescaled by the source token's decimal precision before it
//! is treated as the canonical transfer amount.

use bigdecimal::num_bigint::{BigInt, Sign};
use bigdecimal::BigDecimal;
use primitive_types::U256;

use crate::error::DecodeError;

/// Amount word plus recipient-length word.
pub const MIN_PAYLOAD_LEN: usize = 64;

/// Recipient and rescaled amount extracted from a deposit payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPayload {
    /// Destination recipient, lowercase `0x`-prefixed hex. Length depends on
    /// the destination chain's address format.
    pub recipient: String,
    /// Canonical transfer amount: raw uint256 divided by 10^decimals.
    pub amount: BigDecimal,
}

/// Decode a deposit payload, rescaling the amount by `decimals`.
pub fn decode_payload(data: &[u8], decimals: u32) -> Result<DecodedPayload, DecodeError> {
    if data.len() < MIN_PAYLOAD_LEN {
        return Err(DecodeError::PayloadTooShort {
            got: data.len(),
            need: MIN_PAYLOAD_LEN,
        });
    }

    let len_word = U256::from_big_endian(&data[32..64]);
    let len = usize::try_from(len_word).unwrap_or(usize::MAX);
    if len > data.len() - MIN_PAYLOAD_LEN {
        return Err(DecodeError::RecipientOutOfBounds {
            len,
            size: data.len(),
        });
    }

    let recipient = format!(
        "0x{}",
        hex::encode(&data[MIN_PAYLOAD_LEN..MIN_PAYLOAD_LEN + len])
    );

    let raw = BigInt::from_bytes_be(Sign::Plus, &data[..32]);
    let amount = BigDecimal::new(raw, i64::from(decimals)).normalized();

    Ok(DecodedPayload { recipient, amount })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn payload(amount: U256, recipient: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&amount.to_big_endian());
        data.extend_from_slice(&U256::from(recipient.len() as u64).to_big_endian());
        data.extend_from_slice(recipient);
        data
    }

    #[test]
    fn rescales_amount_by_decimals() {
        let data = payload(U256::from(1_000_000u64), &[0x11; 20]);
        let decoded = decode_payload(&data, 6).unwrap();
        assert_eq!(decoded.amount, BigDecimal::from(1));
    }

    #[test]
    fn keeps_fractional_amounts_exact() {
        let data = payload(U256::from(1_500_000_000_000_000_000u64), &[0x22; 20]);
        let decoded = decode_payload(&data, 18).unwrap();
        assert_eq!(decoded.amount, BigDecimal::from_str("1.5").unwrap());
    }

    #[test]
    fn amount_survives_256_bit_values() {
        let raw = U256::MAX;
        let data = payload(raw, &[0x33; 20]);
        let decoded = decode_payload(&data, 0).unwrap();
        assert_eq!(decoded.amount, BigDecimal::from_str(&raw.to_string()).unwrap());
    }

    #[test]
    fn extracts_recipient_hex() {
        let recipient = [0xABu8; 20];
        let data = payload(U256::one(), &recipient);
        let decoded = decode_payload(&data, 0).unwrap();
        assert_eq!(decoded.recipient, format!("0x{}", "ab".repeat(20)));
    }

    #[test]
    fn accepts_non_evm_recipient_lengths() {
        // Substrate-style 32-byte recipient.
        let recipient = [0x01u8; 32];
        let data = payload(U256::one(), &recipient);
        let decoded = decode_payload(&data, 0).unwrap();
        assert_eq!(decoded.recipient.len(), 2 + 64);
    }

    #[test]
    fn rejects_undersized_payload() {
        assert!(matches!(
            decode_payload(&[0u8; 63], 6),
            Err(DecodeError::PayloadTooShort { got: 63, need: 64 })
        ));
    }

    #[test]
    fn rejects_recipient_length_past_end() {
        let mut data = payload(U256::one(), &[0x11; 20]);
        // Claim a recipient longer than the remaining bytes.
        data[32..64].copy_from_slice(&U256::from(21u64).to_big_endian());
        let len = data.len();
        data.truncate(len - 1);
        assert!(matches!(
            decode_payload(&data, 6),
            Err(DecodeError::RecipientOutOfBounds { .. })
        ));
    }
}
