//! Error taxonomy for the ingestion pipeline.
//!
//! Only [`IngestError::Fetch`] aborts a run. Everything else is caught at the
//! per-event boundary, reported through the run report, and the loop continues.

use thiserror::Error;

/// A log or payload that does not match the expected binary shape.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("log does not match the Deposit event shape: {0}")]
    EventShape(String),

    #[error("payload too short: got {got} bytes, need at least {need}")]
    PayloadTooShort { got: usize, need: usize },

    #[error("recipient length {len} out of bounds for {size}-byte payload")]
    RecipientOutOfBounds { len: usize, size: usize },
}

/// A resource or domain that cannot be mapped to a token contract address.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("no token configured for resource {resource_id} on domain {domain_id}")]
    UnknownResource { resource_id: String, domain_id: u8 },

    #[error("unknown domain {0}")]
    UnknownDomain(u8),

    #[error("handler contract call failed")]
    ContractCall(#[source] anyhow::Error),
}

/// Run-level error classification.
#[derive(Debug, Error)]
pub enum IngestError {
    /// RPC failure retrieving the log batch. Fatal to the run: no partial
    /// fetch recovery is attempted.
    #[error("failed to retrieve deposit logs")]
    Fetch(#[source] anyhow::Error),

    /// Transient RPC failure looking up a block timestamp. Isolated to the
    /// event being assembled.
    #[error("failed to retrieve block {block_number}")]
    BlockLookup {
        block_number: u64,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("failed to persist transfer record")]
    Persistence(#[source] anyhow::Error),
}
