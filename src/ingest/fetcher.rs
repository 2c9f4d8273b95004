//! Deposit log retrieval from the chain RPC collaborator.

use async_trait::async_trait;
use primitive_types::{H160, H256};
use std::sync::Arc;

use crate::error::IngestError;
use crate::ingest::event::{deposit_topic, RawLog};

/// Log query filter passed to the RPC collaborator.
#[derive(Debug, Clone)]
pub struct LogFilter {
    /// Emitting contract address.
    pub address: H160,
    /// Required `topics[0]` value.
    pub topic0: H256,
    pub from_block: u64,
}

/// Chain RPC surface consumed by the pipeline. Network transport, retries and
/// backoff live behind this trait, not in the core.
#[async_trait]
pub trait BridgeProvider: Send + Sync {
    /// Matching logs from `filter.from_block` to the current chain head, in
    /// on-chain emission order.
    async fn get_logs(&self, filter: &LogFilter) -> anyhow::Result<Vec<RawLog>>;

    /// Block timestamp in unix seconds.
    async fn block_timestamp(&self, block_number: u64) -> anyhow::Result<i64>;
}

/// Retrieves all Deposit logs for one source chain's bridge contract.
pub struct DepositLogFetcher {
    provider: Arc<dyn BridgeProvider>,
    bridge_address: H160,
}

impl DepositLogFetcher {
    pub fn new(provider: Arc<dyn BridgeProvider>, bridge_address: H160) -> Self {
        Self {
            provider,
            bridge_address,
        }
    }

    /// Ordered Deposit logs from `from_block` to the chain head. No upper
    /// bound is applied to the range.
    ///
    /// A provider failure here is fatal to the run and surfaces as
    /// [`IngestError::Fetch`].
    pub async fn fetch_from(&self, from_block: u64) -> Result<Vec<RawLog>, IngestError> {
        let filter = LogFilter {
            address: self.bridge_address,
            topic0: deposit_topic(),
            from_block,
        };

        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(IngestError::Fetch)?;

        tracing::debug!(
            target: "chainbridge::fetch",
            bridge = %format!("{:#x}", self.bridge_address),
            from_block,
            count = logs.len(),
            "fetched deposit logs"
        );

        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::event::DepositEvent;
    use crate::ingest::sample::{encode_deposit_log, StaticBridgeProvider};

    fn event(nonce: u64) -> DepositEvent {
        DepositEvent {
            destination_domain_id: 2,
            resource_id: H256::from_low_u64_be(7),
            deposit_nonce: nonce,
            sender: H160::from_low_u64_be(0xabc),
            data: Vec::new(),
            handler_response: Vec::new(),
        }
    }

    #[tokio::test]
    async fn fetches_only_bridge_logs_from_start_block() {
        let bridge = H160::from_low_u64_be(0x100);
        let other = H160::from_low_u64_be(0x999);

        let provider = Arc::new(StaticBridgeProvider::new(
            vec![
                encode_deposit_log(bridge, &event(1), 10, H256::from_low_u64_be(1)),
                encode_deposit_log(other, &event(2), 11, H256::from_low_u64_be(2)),
                encode_deposit_log(bridge, &event(3), 12, H256::from_low_u64_be(3)),
                encode_deposit_log(bridge, &event(4), 5, H256::from_low_u64_be(4)),
            ],
            [(10, 100), (11, 110), (12, 120), (5, 50)].into(),
        ));

        let fetcher = DepositLogFetcher::new(provider, bridge);
        let logs = fetcher.fetch_from(10).await.unwrap();

        // The other contract's log and the pre-range log are filtered out.
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].block_number, 10);
        assert_eq!(logs[1].block_number, 12);
    }

    #[tokio::test]
    async fn provider_failure_is_fatal() {
        let provider = Arc::new(StaticBridgeProvider::failing());
        let fetcher = DepositLogFetcher::new(provider, H160::zero());

        assert!(matches!(
            fetcher.fetch_from(0).await,
            Err(IngestError::Fetch(_))
        ));
    }
}
