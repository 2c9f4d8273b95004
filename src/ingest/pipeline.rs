//! Single-pass ingestion pipeline with per-event fault isolation.
//!
//! One [`DepositIndexer`] covers one source chain. A run fetches every
//! Deposit log from the starting block, then processes the logs strictly in
//! fetch order: decode, resolve token addresses, assemble the record, upsert.
//! Each event's resolve/assemble/upsert segment sits inside a fault boundary;
//! a failure there is recorded in the run report and the loop moves on, so a
//! single bad event never aborts the batch. Only the initial log fetch is
//! fatal.

use primitive_types::H256;
use std::sync::Arc;

use crate::config::{BridgeConfig, ChainConfig};
use crate::error::IngestError;
use crate::ingest::event::{decode_deposit_log, RawLog};
use crate::ingest::fetcher::{BridgeProvider, DepositLogFetcher};
use crate::ingest::payload::decode_payload;
use crate::ingest::record::{normalize_address, TransferDraft, TransferRecord};
use crate::ingest::resolver::{AddressResolver, ResolutionCache, TokenRegistry};
use crate::ingest::store::TransferStore;

/// Where in the per-event pipeline a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decoding,
    Resolving,
    Assembling,
    Upserting,
}

/// One isolated event failure: the stage it failed at, the nonce if it was
/// decodable, and whatever partial record state had been staged by then.
#[derive(Debug)]
pub struct EventFailure {
    pub stage: Stage,
    pub deposit_nonce: Option<u64>,
    pub transaction_hash: H256,
    pub error: IngestError,
    pub draft: TransferDraft,
}

/// Outcome of one ingestion run.
#[derive(Debug)]
pub struct RunReport {
    pub network: String,
    /// Logs returned by the fetcher.
    pub fetched: usize,
    /// Records successfully upserted.
    pub stored: usize,
    pub failures: Vec<EventFailure>,
}

/// Ingestion pipeline for one source chain.
///
/// All dependencies are injected; independent chains can run concurrently,
/// sharing at most the resolution cache and the backing store.
pub struct DepositIndexer {
    chain: ChainConfig,
    config: Arc<BridgeConfig>,
    provider: Arc<dyn BridgeProvider>,
    fetcher: DepositLogFetcher,
    resolver: AddressResolver,
    store: Arc<dyn TransferStore>,
}

impl DepositIndexer {
    pub fn new(
        chain: ChainConfig,
        config: Arc<BridgeConfig>,
        provider: Arc<dyn BridgeProvider>,
        registry: Arc<dyn TokenRegistry>,
        cache: Arc<ResolutionCache>,
        store: Arc<dyn TransferStore>,
    ) -> Self {
        let fetcher = DepositLogFetcher::new(provider.clone(), chain.bridge_address);
        let resolver = AddressResolver::new(registry, config.clone(), cache);
        Self {
            chain,
            config,
            provider,
            fetcher,
            resolver,
            store,
        }
    }

    /// Run from the chain's configured deployment block.
    pub async fn run(&self) -> Result<RunReport, IngestError> {
        self.run_from(self.chain.deployed_block_number).await
    }

    /// Run from an explicit starting block. Fails only if the log fetch
    /// itself fails; per-event errors land in the report.
    pub async fn run_from(&self, from_block: u64) -> Result<RunReport, IngestError> {
        let logs = self.fetcher.fetch_from(from_block).await?;

        tracing::info!(
            target: "chainbridge::ingest",
            network = %self.chain.name,
            from_block,
            count = logs.len(),
            "starting ingestion run"
        );

        let mut report = RunReport {
            network: self.chain.name.clone(),
            fetched: logs.len(),
            stored: 0,
            failures: Vec::new(),
        };

        for log in &logs {
            match self.process_log(log).await {
                Ok(()) => report.stored += 1,
                Err(failure) => {
                    tracing::warn!(
                        target: "chainbridge::ingest",
                        network = %self.chain.name,
                        stage = ?failure.stage,
                        deposit_nonce = ?failure.deposit_nonce,
                        tx_hash = %format!("{:#x}", failure.transaction_hash),
                        error = %failure.error,
                        "event isolated after failure"
                    );
                    report.failures.push(failure);
                }
            }
        }

        tracing::info!(
            target: "chainbridge::ingest",
            network = %self.chain.name,
            stored = report.stored,
            failed = report.failures.len(),
            "ingestion run complete"
        );

        Ok(report)
    }

    async fn process_log(&self, log: &RawLog) -> Result<(), EventFailure> {
        let mut draft = TransferDraft {
            block_number: Some(log.block_number),
            transaction_hash: Some(log.transaction_hash),
            ..TransferDraft::default()
        };

        let event = decode_deposit_log(log)
            .map_err(|e| fail(Stage::Decoding, &draft, log, e.into()))?;

        draft.deposit_nonce = Some(event.deposit_nonce);
        draft.from_address = Some(normalize_address(&format!("{:#x}", event.sender)));
        draft.from_domain_id = Some(self.chain.domain_id);
        draft.from_network_name = Some(self.chain.name.clone());
        draft.to_domain_id = Some(event.destination_domain_id);
        draft.resource_id = Some(event.resource_id);

        let payload = decode_payload(&event.data, self.chain.decimals)
            .map_err(|e| fail(Stage::Decoding, &draft, log, e.into()))?;
        draft.to_address = Some(normalize_address(&payload.recipient));
        draft.amount = Some(payload.amount.clone());

        let to_network_name = self
            .config
            .network_name(event.destination_domain_id)
            .map_err(|e| fail(Stage::Resolving, &draft, log, e.into()))?
            .to_string();
        draft.to_network_name = Some(to_network_name.clone());

        let source_token = self
            .resolver
            .resolve_source_token(event.resource_id, self.chain.domain_id)
            .await
            .map_err(|e| fail(Stage::Resolving, &draft, log, e.into()))?;
        let source_token = normalize_address(&source_token);
        draft.source_token_address = Some(source_token.clone());

        let destination_token = self
            .resolver
            .resolve_destination_token(event.resource_id, event.destination_domain_id)
            .await
            .map_err(|e| fail(Stage::Resolving, &draft, log, e.into()))?;
        let destination_token = normalize_address(&destination_token);
        draft.destination_token_address = Some(destination_token.clone());

        let timestamp = self
            .provider
            .block_timestamp(log.block_number)
            .await
            .map_err(|e| {
                let error = IngestError::BlockLookup {
                    block_number: log.block_number,
                    source: e,
                };
                fail(Stage::Assembling, &draft, log, error)
            })?;
        draft.timestamp = Some(timestamp);

        let record = TransferRecord {
            deposit_nonce: event.deposit_nonce,
            from_address: normalize_address(&format!("{:#x}", event.sender)),
            from_domain_id: self.chain.domain_id,
            from_network_name: self.chain.name.clone(),
            to_domain_id: event.destination_domain_id,
            to_network_name,
            to_address: normalize_address(&payload.recipient),
            source_token_address: source_token,
            destination_token_address: destination_token,
            amount: payload.amount,
            resource_id: event.resource_id,
            handler_response: event.handler_response,
            block_number: log.block_number,
            transaction_hash: log.transaction_hash,
            timestamp,
        };

        self.store
            .upsert(&record)
            .await
            .map_err(|e| fail(Stage::Upserting, &draft, log, IngestError::Persistence(e)))?;

        tracing::debug!(
            target: "chainbridge::ingest",
            deposit_nonce = record.deposit_nonce,
            block_number = record.block_number,
            "transfer upserted"
        );

        Ok(())
    }
}

fn fail(stage: Stage, draft: &TransferDraft, log: &RawLog, error: IngestError) -> EventFailure {
    EventFailure {
        stage,
        deposit_nonce: draft.deposit_nonce,
        transaction_hash: log.transaction_hash,
        error,
        draft: draft.clone(),
    }
}
