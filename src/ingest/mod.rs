pub mod event;
pub mod fetcher;
pub mod payload;
pub mod pipeline;
pub mod record;
pub mod resolver;
pub mod sample;
pub mod store;

pub use event::{decode_deposit_log, deposit_topic, DepositEvent, RawLog};
pub use fetcher::{BridgeProvider, DepositLogFetcher, LogFilter};
pub use payload::{decode_payload, DecodedPayload};
pub use pipeline::{DepositIndexer, EventFailure, RunReport, Stage};
pub use record::{normalize_address, TransferDraft, TransferRecord};
pub use resolver::{AddressResolver, CacheKey, ResolutionCache, TokenRegistry};
pub use store::{SqliteTransferStore, TransferFilter, TransferStore};
