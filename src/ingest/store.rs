//! SQLite persistence for transfer records.
//!
//! `deposit_nonce` is the primary key and idempotency anchor: the upsert
//! creates a row on first sight of a nonce and overwrites every field on
//! re-ingestion, atomically per record. Secondary indexes back the read
//! surface consumed by the HTTP query layer.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use primitive_types::H256;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use crate::ingest::record::TransferRecord;

/// Write surface used by the pipeline.
#[async_trait]
pub trait TransferStore: Send + Sync {
    /// Create or overwrite the record for its deposit nonce.
    async fn upsert(&self, record: &TransferRecord) -> Result<()>;

    async fn get(&self, deposit_nonce: u64) -> Result<Option<TransferRecord>>;

    async fn count(&self) -> Result<u64>;
}

/// Filters for the read surface. All present filters are ANDed together.
#[derive(Debug, Clone, Default)]
pub struct TransferFilter {
    pub sender: Option<String>,
    pub resource_id: Option<H256>,
    pub from_domain_id: Option<u8>,
    pub to_domain_id: Option<u8>,
    /// Transfers touching this domain on either side.
    pub domain_id: Option<u8>,
}

/// SQLite-backed store.
pub struct SqliteTransferStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTransferStore {
    /// Create or open the database at `db_path`.
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        // WAL mode: readers don't block the ingesting writer.
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=5000;",
        )?;

        Self::initialize(&conn)?;
        tracing::info!(target: "chainbridge::store", db_path = %db_path, "database initialized");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, private to this store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn initialize(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS transfers (
                deposit_nonce INTEGER PRIMARY KEY,
                from_address TEXT NOT NULL,
                from_domain_id INTEGER NOT NULL,
                from_network_name TEXT NOT NULL,
                to_domain_id INTEGER NOT NULL,
                to_network_name TEXT NOT NULL,
                to_address TEXT NOT NULL,
                source_token_address TEXT NOT NULL,
                destination_token_address TEXT NOT NULL,
                amount TEXT NOT NULL,
                resource_id TEXT NOT NULL,
                handler_response BLOB NOT NULL,
                block_number INTEGER NOT NULL,
                transaction_hash TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transfers_sender ON transfers(from_address)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transfers_resource ON transfers(resource_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transfers_tx_hash ON transfers(transaction_hash)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transfers_domains
             ON transfers(from_domain_id, to_domain_id)",
            [],
        )?;

        Ok(())
    }

    /// Record for a transaction hash, if any.
    pub fn get_by_transaction_hash(&self, transaction_hash: H256) -> Result<Option<TransferRecord>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare_cached(
            "SELECT deposit_nonce, from_address, from_domain_id, from_network_name,
                    to_domain_id, to_network_name, to_address, source_token_address,
                    destination_token_address, amount, resource_id, handler_response,
                    block_number, transaction_hash, timestamp
             FROM transfers WHERE transaction_hash = ?1",
        )?;
        let mut rows = stmt.query_map(params![h256_to_hex(transaction_hash)], row_to_record)?;
        rows.next().transpose().context("reading transfer row")
    }

    /// Filtered records, newest first, with limit/offset pagination.
    pub fn get_transfers_filtered(
        &self,
        filter: &TransferFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<TransferRecord>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());

        let mut query = String::from(
            "SELECT deposit_nonce, from_address, from_domain_id, from_network_name,
                    to_domain_id, to_network_name, to_address, source_token_address,
                    destination_token_address, amount, resource_id, handler_response,
                    block_number, transaction_hash, timestamp
             FROM transfers WHERE 1=1",
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref sender) = filter.sender {
            query.push_str(" AND from_address = ?");
            params_vec.push(Box::new(sender.to_ascii_lowercase()));
        }
        if let Some(resource_id) = filter.resource_id {
            query.push_str(" AND resource_id = ?");
            params_vec.push(Box::new(h256_to_hex(resource_id)));
        }
        if let Some(from_domain) = filter.from_domain_id {
            query.push_str(" AND from_domain_id = ?");
            params_vec.push(Box::new(i64::from(from_domain)));
        }
        if let Some(to_domain) = filter.to_domain_id {
            query.push_str(" AND to_domain_id = ?");
            params_vec.push(Box::new(i64::from(to_domain)));
        }
        if let Some(domain) = filter.domain_id {
            query.push_str(" AND (from_domain_id = ? OR to_domain_id = ?)");
            params_vec.push(Box::new(i64::from(domain)));
            params_vec.push(Box::new(i64::from(domain)));
        }

        query.push_str(" ORDER BY block_number DESC, deposit_nonce DESC LIMIT ? OFFSET ?");
        params_vec.push(Box::new(i64::from(limit)));
        params_vec.push(Box::new(i64::from(offset)));

        let mut stmt = conn.prepare(&query)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), row_to_record)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .context("reading transfer rows")
    }
}

#[async_trait]
impl TransferStore for SqliteTransferStore {
    async fn upsert(&self, record: &TransferRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare_cached(
            "INSERT INTO transfers (
                deposit_nonce, from_address, from_domain_id, from_network_name,
                to_domain_id, to_network_name, to_address, source_token_address,
                destination_token_address, amount, resource_id, handler_response,
                block_number, transaction_hash, timestamp
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             ON CONFLICT(deposit_nonce) DO UPDATE SET
                from_address = excluded.from_address,
                from_domain_id = excluded.from_domain_id,
                from_network_name = excluded.from_network_name,
                to_domain_id = excluded.to_domain_id,
                to_network_name = excluded.to_network_name,
                to_address = excluded.to_address,
                source_token_address = excluded.source_token_address,
                destination_token_address = excluded.destination_token_address,
                amount = excluded.amount,
                resource_id = excluded.resource_id,
                handler_response = excluded.handler_response,
                block_number = excluded.block_number,
                transaction_hash = excluded.transaction_hash,
                timestamp = excluded.timestamp",
        )?;

        stmt.execute(params![
            record.deposit_nonce as i64,
            record.from_address,
            i64::from(record.from_domain_id),
            record.from_network_name,
            i64::from(record.to_domain_id),
            record.to_network_name,
            record.to_address,
            record.source_token_address,
            record.destination_token_address,
            record.amount.normalized().to_string(),
            h256_to_hex(record.resource_id),
            record.handler_response,
            record.block_number as i64,
            h256_to_hex(record.transaction_hash),
            record.timestamp,
        ])?;

        Ok(())
    }

    async fn get(&self, deposit_nonce: u64) -> Result<Option<TransferRecord>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare_cached(
            "SELECT deposit_nonce, from_address, from_domain_id, from_network_name,
                    to_domain_id, to_network_name, to_address, source_token_address,
                    destination_token_address, amount, resource_id, handler_response,
                    block_number, transaction_hash, timestamp
             FROM transfers WHERE deposit_nonce = ?1",
        )?;
        let mut rows = stmt.query_map(params![deposit_nonce as i64], row_to_record)?;
        rows.next().transpose().context("reading transfer row")
    }

    async fn count(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM transfers", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn h256_to_hex(value: H256) -> String {
    format!("{value:#x}")
}

fn h256_from_hex(column: usize, value: &str) -> rusqlite::Result<H256> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(stripped).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e))
    })?;
    if bytes.len() != 32 {
        return Err(rusqlite::Error::FromSqlConversionFailure(
            column,
            Type::Text,
            format!("expected 32 bytes, got {}", bytes.len()).into(),
        ));
    }
    Ok(H256::from_slice(&bytes))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<TransferRecord> {
    let amount_text: String = row.get(9)?;
    let amount = BigDecimal::from_str(&amount_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e))
    })?;
    let resource_text: String = row.get(10)?;
    let tx_hash_text: String = row.get(13)?;

    Ok(TransferRecord {
        deposit_nonce: row.get::<_, i64>(0)? as u64,
        from_address: row.get(1)?,
        from_domain_id: row.get::<_, i64>(2)? as u8,
        from_network_name: row.get(3)?,
        to_domain_id: row.get::<_, i64>(4)? as u8,
        to_network_name: row.get(5)?,
        to_address: row.get(6)?,
        source_token_address: row.get(7)?,
        destination_token_address: row.get(8)?,
        amount,
        resource_id: h256_from_hex(10, &resource_text)?,
        handler_response: row.get(11)?,
        block_number: row.get::<_, i64>(12)? as u64,
        transaction_hash: h256_from_hex(13, &tx_hash_text)?,
        timestamp: row.get(14)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(nonce: u64) -> TransferRecord {
        TransferRecord {
            deposit_nonce: nonce,
            from_address: "0xaaaa000000000000000000000000000000000001".to_string(),
            from_domain_id: 1,
            from_network_name: "ethereum".to_string(),
            to_domain_id: 2,
            to_network_name: "avalanche".to_string(),
            to_address: "0xbbbb000000000000000000000000000000000002".to_string(),
            source_token_address: "0xcccc000000000000000000000000000000000003".to_string(),
            destination_token_address: "0xdddd000000000000000000000000000000000004".to_string(),
            amount: BigDecimal::from(5),
            resource_id: H256::from_low_u64_be(7),
            handler_response: vec![1, 2],
            block_number: 100,
            transaction_hash: H256::from_low_u64_be(0xdead),
            timestamp: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn upsert_creates_then_overwrites() {
        let store = SqliteTransferStore::open_in_memory().unwrap();
        let first = record(1);
        store.upsert(&first).await.unwrap();
        assert_eq!(store.get(1).await.unwrap().unwrap(), first);

        let mut second = record(1);
        second.to_address = "0xeeee000000000000000000000000000000000005".to_string();
        second.amount = BigDecimal::from(9);
        store.upsert(&second).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.get(1).await.unwrap().unwrap(), second);
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = SqliteTransferStore::open_in_memory().unwrap();
        let rec = record(3);
        store.upsert(&rec).await.unwrap();
        store.upsert(&rec).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.get(3).await.unwrap().unwrap(), rec);
    }

    #[tokio::test]
    async fn distinct_nonces_get_distinct_rows() {
        let store = SqliteTransferStore::open_in_memory().unwrap();
        store.upsert(&record(1)).await.unwrap();
        store.upsert(&record(2)).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn lookup_by_transaction_hash() {
        let store = SqliteTransferStore::open_in_memory().unwrap();
        store.upsert(&record(4)).await.unwrap();

        let found = store
            .get_by_transaction_hash(H256::from_low_u64_be(0xdead))
            .unwrap();
        assert_eq!(found.unwrap().deposit_nonce, 4);
        assert!(store
            .get_by_transaction_hash(H256::from_low_u64_be(0xbeef))
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn filtered_queries_combine() {
        let store = SqliteTransferStore::open_in_memory().unwrap();
        store.upsert(&record(1)).await.unwrap();

        let mut other = record(2);
        other.from_address = "0x9999000000000000000000000000000000000009".to_string();
        other.resource_id = H256::from_low_u64_be(8);
        other.to_domain_id = 3;
        store.upsert(&other).await.unwrap();

        let by_sender = store
            .get_transfers_filtered(
                &TransferFilter {
                    sender: Some("0xAAAA000000000000000000000000000000000001".to_string()),
                    ..TransferFilter::default()
                },
                10,
                0,
            )
            .unwrap();
        assert_eq!(by_sender.len(), 1);
        assert_eq!(by_sender[0].deposit_nonce, 1);

        let by_route = store
            .get_transfers_filtered(
                &TransferFilter {
                    resource_id: Some(H256::from_low_u64_be(8)),
                    from_domain_id: Some(1),
                    to_domain_id: Some(3),
                    ..TransferFilter::default()
                },
                10,
                0,
            )
            .unwrap();
        assert_eq!(by_route.len(), 1);
        assert_eq!(by_route[0].deposit_nonce, 2);
    }

    #[tokio::test]
    async fn domain_filter_matches_either_side() {
        let store = SqliteTransferStore::open_in_memory().unwrap();
        // domain 2 as destination.
        store.upsert(&record(1)).await.unwrap();

        // domain 2 as source.
        let mut outbound = record(2);
        outbound.from_domain_id = 2;
        outbound.to_domain_id = 3;
        store.upsert(&outbound).await.unwrap();

        // domain 2 not involved.
        let mut unrelated = record(3);
        unrelated.from_domain_id = 4;
        unrelated.to_domain_id = 5;
        store.upsert(&unrelated).await.unwrap();

        let touching = store
            .get_transfers_filtered(
                &TransferFilter {
                    domain_id: Some(2),
                    ..TransferFilter::default()
                },
                10,
                0,
            )
            .unwrap();
        let nonces: Vec<u64> = touching.iter().map(|r| r.deposit_nonce).collect();
        assert_eq!(nonces, vec![2, 1]);
    }

    #[tokio::test]
    async fn pagination_is_newest_first() {
        let store = SqliteTransferStore::open_in_memory().unwrap();
        for nonce in 1..=5 {
            let mut rec = record(nonce);
            rec.block_number = 100 + nonce;
            store.upsert(&rec).await.unwrap();
        }

        let page = store
            .get_transfers_filtered(&TransferFilter::default(), 2, 0)
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].deposit_nonce, 5);
        assert_eq!(page[1].deposit_nonce, 4);

        let next = store
            .get_transfers_filtered(&TransferFilter::default(), 2, 2)
            .unwrap();
        assert_eq!(next[0].deposit_nonce, 3);
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transfers.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteTransferStore::new(path).unwrap();
            store.upsert(&record(1)).await.unwrap();
        }

        let store = SqliteTransferStore::new(path).unwrap();
        assert_eq!(store.get(1).await.unwrap().unwrap(), record(1));
    }
}
