//! ChainBridge deposit indexer.
//!
//! Ingests Deposit events emitted by a bridge contract, enriches each event
//! with resolved token-address metadata, and persists the result as a
//! deduplicated transfer record keyed by deposit nonce. The chain RPC and
//! handler contract sit behind collaborator traits; the stored schema backs
//! an external HTTP query layer that is out of scope here.

pub mod config;
pub mod error;
pub mod ingest;

// Re-export for external collaborator implementations.
pub use async_trait::async_trait;

pub use config::{BridgeConfig, ChainConfig, TokenConfig};
pub use error::{DecodeError, IngestError, ResolutionError};
pub use ingest::{DepositIndexer, ResolutionCache, RunReport, SqliteTransferStore};
