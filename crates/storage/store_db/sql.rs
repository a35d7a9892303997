use std::{fmt::Debug, panic::RefUnwindSafe, path::Path, sync::Arc, time::Duration};
use tokio::sync::Mutex;

use crate::{EventFilter, UpdateBatch, api::StoreEngine, error::StoreError};
use azimuth_common::{
    Address, Bytes, H256,
    types::{
        AuditEntry, Diff, DiffOperation, Dominion, Point, PointNumber, ProxySlot, RawEvent,
    },
};

use libsql::{Builder, Connection, Row, Rows, Transaction, Value, params::Params};

/// ### SQLStore
/// - `read_conn`: a connection to the database to be used for read only statements
/// - `write_conn`: a connection to the database to be used for writing, protected by a Mutex to enforce a maximum of 1 writer.
///   If writes are done using the read only connection `SQLite failure: database is locked` problems will arise
pub struct SQLStore {
    read_conn: Connection,
    write_conn: Arc<Mutex<Connection>>,
}

impl Debug for SQLStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SQLStore")
    }
}

impl RefUnwindSafe for SQLStore {}

// Change version if the DB_SCHEMA changes
pub const MIGRATION_VERSION: u64 = 1;
const DB_SCHEMA: [&str; 7] = [
    "CREATE TABLE events (id INTEGER PRIMARY KEY, block_number INT NOT NULL, block_hash BLOB NOT NULL, tx_hash BLOB NOT NULL, log_index INT NOT NULL, contract_address BLOB NOT NULL, topics BLOB NOT NULL, data BLOB NOT NULL, is_processed INT NOT NULL DEFAULT 0, UNIQUE (block_number, log_index))",
    "CREATE INDEX events_unprocessed ON events (is_processed, block_number, log_index)",
    "CREATE TABLE points (number INT PRIMARY KEY, owner_address BLOB NOT NULL, owner_nonce INT NOT NULL, spawn_address BLOB NOT NULL, spawn_nonce INT NOT NULL, management_address BLOB NOT NULL, management_nonce INT NOT NULL, voting_address BLOB NOT NULL, voting_nonce INT NOT NULL, transfer_address BLOB NOT NULL, transfer_nonce INT NOT NULL, dominion INT NOT NULL, is_active INT NOT NULL, rift INT NOT NULL, life INT NOT NULL, encryption_key BLOB NOT NULL, auth_key BLOB NOT NULL, crypto_suite_version INT NOT NULL, has_sponsor INT NOT NULL, sponsor INT NOT NULL, is_escape_requested INT NOT NULL, escape_target INT NOT NULL)",
    "CREATE TABLE diffs (id INTEGER PRIMARY KEY, source_event_id INT NOT NULL, intra_batch_index INT NOT NULL, point INT NOT NULL, operation INT NOT NULL, data BLOB NOT NULL)",
    "CREATE INDEX diffs_by_point ON diffs (point, id)",
    "CREATE TABLE migrations (version INT PRIMARY KEY)",
    "INSERT INTO migrations VALUES (1)",
];

const EVENT_COLUMNS: &str = "id, block_number, block_hash, tx_hash, log_index, contract_address, topics, data, is_processed";
const POINT_COLUMNS: &str = "number, owner_address, owner_nonce, spawn_address, spawn_nonce, management_address, management_nonce, voting_address, voting_nonce, transfer_address, transfer_nonce, dominion, is_active, rift, life, encryption_key, auth_key, crypto_suite_version, has_sponsor, sponsor, is_escape_requested, escape_target";

impl SQLStore {
    pub fn new(path: &str) -> Result<Self, StoreError> {
        futures::executor::block_on(async {
            let db = Builder::new_local(path).build().await?;
            let write_conn = db.connect()?;
            // From libsql documentation:
            // Newly created connections currently have a default busy timeout of
            // 5000ms, but this may be subject to change.
            write_conn.busy_timeout(Duration::from_millis(5000))?;
            let store = SQLStore {
                read_conn: db.connect()?,
                write_conn: Arc::new(Mutex::new(write_conn)),
            };

            store.init_db().await?;

            let current_version = store.get_version().await?;
            if current_version != MIGRATION_VERSION {
                return Err(StoreError::VersionMismatch {
                    current: current_version,
                    expected: MIGRATION_VERSION,
                });
            }
            Ok(store)
        })
    }

    async fn query(&self, sql: &str, params: Params) -> Result<Rows, StoreError> {
        Ok(self.read_conn.query(sql, params).await?)
    }

    async fn init_db(&self) -> Result<(), StoreError> {
        // We use WAL for better concurrency
        // "readers do not block writers and a writer does not block readers. Reading and writing can proceed concurrently"
        // https://sqlite.org/wal.html#concurrency
        // still a limit of only 1 writer is imposed by sqlite databases
        self.query("PRAGMA journal_mode=WAL;", Params::None).await?;
        let mut rows = self
            .query(
                "SELECT name FROM sqlite_schema WHERE type='table' AND name='events'",
                Params::None,
            )
            .await?;
        if rows.next().await?.is_none() {
            let queries = DB_SCHEMA.iter().map(|v| (*v, Params::None)).collect();
            self.execute_in_tx(queries, None).await?;
        }
        Ok(())
    }

    /// Executes a set of queries in a SQL transaction
    /// if the db_tx parameter is Some then it uses that transaction and does not commit to the DB after execution
    /// if the db_tx parameter is None then it creates a transaction and commits to the DB after execution
    async fn execute_in_tx(
        &self,
        queries: Vec<(&str, Params)>,
        db_tx: Option<&Transaction>,
    ) -> Result<(), StoreError> {
        if let Some(existing_tx) = db_tx {
            for (query, params) in queries {
                existing_tx.execute(query, params).await?;
            }
        } else {
            let conn = self.write_conn.lock().await;
            let tx = conn.transaction().await?;
            for (query, params) in queries {
                tx.execute(query, params).await?;
            }
            tx.commit().await?;
        }
        Ok(())
    }

    async fn get_version(&self) -> Result<u64, StoreError> {
        let mut rows = self
            .query("SELECT MAX(version) FROM migrations", Params::None)
            .await?;
        rows.next()
            .await?
            .map(|row| read_from_row_int(&row, 0))
            .ok_or(StoreError::Custom(
                "Migration version not found".to_string(),
            ))?
    }
}

fn int_value(value: u64) -> Result<Value, StoreError> {
    Ok(Value::Integer(i64::try_from(value)?))
}

fn blob_value(bytes: &[u8]) -> Value {
    Value::Blob(bytes.to_vec())
}

fn point_params(point: &Point) -> Params {
    let slot = |slot: &ProxySlot| {
        [
            blob_value(slot.address.as_bytes()),
            Value::Integer(i64::from(slot.nonce)),
        ]
    };
    let mut values = vec![Value::Integer(i64::from(point.number))];
    values.extend(slot(&point.owner));
    values.extend(slot(&point.spawn_proxy));
    values.extend(slot(&point.management_proxy));
    values.extend(slot(&point.voting_proxy));
    values.extend(slot(&point.transfer_proxy));
    values.extend([
        Value::Integer(i64::from(point.dominion as u8)),
        Value::Integer(i64::from(point.active)),
        Value::Integer(i64::from(point.rift)),
        Value::Integer(i64::from(point.life)),
        blob_value(point.encryption_key.as_bytes()),
        blob_value(point.auth_key.as_bytes()),
        Value::Integer(i64::from(point.crypto_suite_version)),
        Value::Integer(i64::from(point.has_sponsor)),
        Value::Integer(i64::from(point.sponsor)),
        Value::Integer(i64::from(point.escape_requested)),
        Value::Integer(i64::from(point.escape_target)),
    ]);
    Params::Positional(values)
}

fn diff_params(diff: &Diff) -> Result<Params, StoreError> {
    Ok(Params::Positional(vec![
        int_value(diff.source_event_id)?,
        int_value(diff.intra_batch_index)?,
        Value::Integer(i64::from(diff.point)),
        Value::Integer(i64::from(diff.operation as u8)),
        blob_value(&diff.data),
    ]))
}

fn read_from_row_int(row: &Row, index: i32) -> Result<u64, StoreError> {
    match row.get_value(index)? {
        Value::Integer(i) => {
            let val = i
                .try_into()
                .map_err(|e| StoreError::Custom(format!("conversion error: {e}")))?;
            Ok(val)
        }
        _ => Err(StoreError::SQLInvalidTypeError),
    }
}

fn read_from_row_u32(row: &Row, index: i32) -> Result<u32, StoreError> {
    Ok(u32::try_from(read_from_row_int(row, index)?)?)
}

fn read_from_row_bool(row: &Row, index: i32) -> Result<bool, StoreError> {
    Ok(read_from_row_int(row, index)? != 0)
}

fn read_from_row_blob(row: &Row, index: i32) -> Result<Vec<u8>, StoreError> {
    match row.get_value(index)? {
        Value::Blob(vec) => Ok(vec),
        // zero-length blobs may come back as NULL
        Value::Null => Ok(Vec::new()),
        _ => Err(StoreError::SQLInvalidTypeError),
    }
}

fn read_from_row_h256(row: &Row, index: i32) -> Result<H256, StoreError> {
    let vec = read_from_row_blob(row, index)?;
    if vec.len() != 32 {
        return Err(StoreError::DecodeError(format!(
            "expected a 32 byte hash, found {} bytes",
            vec.len()
        )));
    }
    Ok(H256::from_slice(&vec))
}

fn read_from_row_address(row: &Row, index: i32) -> Result<Address, StoreError> {
    let vec = read_from_row_blob(row, index)?;
    if vec.len() != 20 {
        return Err(StoreError::DecodeError(format!(
            "expected a 20 byte address, found {} bytes",
            vec.len()
        )));
    }
    Ok(Address::from_slice(&vec))
}

/// Reads a row selected with `EVENT_COLUMNS`.
fn read_event(row: &Row) -> Result<RawEvent, StoreError> {
    let topics = read_from_row_blob(row, 6)?;
    if topics.len() % 32 != 0 {
        return Err(StoreError::DecodeError(format!(
            "topics blob of {} bytes is not a multiple of 32",
            topics.len()
        )));
    }
    Ok(RawEvent {
        id: read_from_row_int(row, 0)?,
        block_number: read_from_row_int(row, 1)?,
        block_hash: read_from_row_h256(row, 2)?,
        tx_hash: read_from_row_h256(row, 3)?,
        log_index: read_from_row_int(row, 4)?,
        contract_address: read_from_row_address(row, 5)?,
        topics: topics.chunks_exact(32).map(H256::from_slice).collect(),
        data: Bytes::from(read_from_row_blob(row, 7)?),
        processed: read_from_row_bool(row, 8)?,
    })
}

/// Reads a row selected with `POINT_COLUMNS`.
fn read_point(row: &Row) -> Result<Point, StoreError> {
    let slot = |index: i32| -> Result<ProxySlot, StoreError> {
        Ok(ProxySlot {
            address: read_from_row_address(row, index)?,
            nonce: read_from_row_u32(row, index + 1)?,
        })
    };
    let dominion = u8::try_from(read_from_row_int(row, 11)?)?;
    Ok(Point {
        number: read_from_row_u32(row, 0)?,
        owner: slot(1)?,
        spawn_proxy: slot(3)?,
        management_proxy: slot(5)?,
        voting_proxy: slot(7)?,
        transfer_proxy: slot(9)?,
        dominion: Dominion::try_from(dominion)?,
        active: read_from_row_bool(row, 12)?,
        rift: read_from_row_u32(row, 13)?,
        life: read_from_row_u32(row, 14)?,
        encryption_key: read_from_row_h256(row, 15)?,
        auth_key: read_from_row_h256(row, 16)?,
        crypto_suite_version: read_from_row_u32(row, 17)?,
        has_sponsor: read_from_row_bool(row, 18)?,
        sponsor: read_from_row_u32(row, 19)?,
        escape_requested: read_from_row_bool(row, 20)?,
        escape_target: read_from_row_u32(row, 21)?,
    })
}

#[async_trait::async_trait]
impl StoreEngine for SQLStore {
    async fn add_event(&self, event: RawEvent) -> Result<u64, StoreError> {
        let topics: Vec<u8> = event
            .topics
            .iter()
            .flat_map(|topic| topic.to_fixed_bytes())
            .collect();
        let conn = self.write_conn.lock().await;
        conn.execute(
            "INSERT INTO events (block_number, block_hash, tx_hash, log_index, contract_address, topics, data, is_processed) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) ON CONFLICT (block_number, log_index) DO NOTHING",
            Params::Positional(vec![
                int_value(event.block_number)?,
                blob_value(event.block_hash.as_bytes()),
                blob_value(event.tx_hash.as_bytes()),
                int_value(event.log_index)?,
                blob_value(event.contract_address.as_bytes()),
                Value::Blob(topics),
                blob_value(&event.data),
                Value::Integer(i64::from(event.processed)),
            ]),
        )
        .await?;
        let mut rows = conn
            .query(
                "SELECT id FROM events WHERE block_number = ?1 AND log_index = ?2",
                Params::Positional(vec![
                    int_value(event.block_number)?,
                    int_value(event.log_index)?,
                ]),
            )
            .await?;
        rows.next()
            .await?
            .map(|row| read_from_row_int(&row, 0))
            .ok_or(StoreError::EventNotFound {
                block_number: event.block_number,
                log_index: event.log_index,
            })?
    }

    async fn set_event_data(
        &self,
        block_number: u64,
        log_index: u64,
        data: Bytes,
    ) -> Result<(), StoreError> {
        let conn = self.write_conn.lock().await;
        let updated = conn
            .execute(
                "UPDATE events SET data = ?1 WHERE block_number = ?2 AND log_index = ?3",
                Params::Positional(vec![
                    blob_value(&data),
                    int_value(block_number)?,
                    int_value(log_index)?,
                ]),
            )
            .await?;
        if updated != 1 {
            return Err(StoreError::EventNotFound {
                block_number,
                log_index,
            });
        }
        Ok(())
    }

    async fn get_event(&self, id: u64) -> Result<Option<RawEvent>, StoreError> {
        let mut rows = self
            .query(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
                Params::Positional(vec![int_value(id)?]),
            )
            .await?;
        rows.next().await?.map(|row| read_event(&row)).transpose()
    }

    async fn get_unprocessed_events(
        &self,
        filter: EventFilter,
    ) -> Result<Vec<RawEvent>, StoreError> {
        let mut sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE is_processed = 0");
        let mut values = Vec::new();
        if let Some(contract) = filter.contract {
            values.push(blob_value(contract.as_bytes()));
            sql.push_str(&format!(" AND contract_address = ?{}", values.len()));
        }
        if let Some(block) = filter.before_block {
            values.push(int_value(block)?);
            sql.push_str(&format!(" AND block_number < ?{}", values.len()));
        }
        sql.push_str(" ORDER BY block_number ASC, log_index ASC");
        if let Some(limit) = filter.limit {
            values.push(int_value(limit)?);
            sql.push_str(&format!(" LIMIT ?{}", values.len()));
        }

        let mut rows = self.query(&sql, Params::Positional(values)).await?;
        let mut events = Vec::new();
        while let Some(row) = rows.next().await? {
            events.push(read_event(&row)?);
        }
        Ok(events)
    }

    async fn get_point(&self, number: PointNumber) -> Result<Option<Point>, StoreError> {
        let mut rows = self
            .query(
                &format!("SELECT {POINT_COLUMNS} FROM points WHERE number = ?1"),
                Params::Positional(vec![Value::Integer(i64::from(number))]),
            )
            .await?;
        rows.next().await?.map(|row| read_point(&row)).transpose()
    }

    async fn get_points(&self) -> Result<Vec<Point>, StoreError> {
        let mut rows = self
            .query(
                &format!("SELECT {POINT_COLUMNS} FROM points ORDER BY number ASC"),
                Params::None,
            )
            .await?;
        let mut points = Vec::new();
        while let Some(row) = rows.next().await? {
            points.push(read_point(&row)?);
        }
        Ok(points)
    }

    async fn get_diffs_for_point(
        &self,
        number: PointNumber,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        let mut rows = self
            .query(
                "SELECT d.id, d.source_event_id, d.intra_batch_index, d.point, d.operation, d.data, e.tx_hash, e.contract_address FROM diffs d LEFT JOIN events e ON e.id = d.source_event_id WHERE d.point = ?1 ORDER BY d.id ASC",
                Params::Positional(vec![Value::Integer(i64::from(number))]),
            )
            .await?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            let operation = u8::try_from(read_from_row_int(&row, 4)?)?;
            let tx_hash = match row.get_value(6)? {
                Value::Null => H256::zero(),
                _ => read_from_row_h256(&row, 6)?,
            };
            let contract_address = match row.get_value(7)? {
                Value::Null => Address::zero(),
                _ => read_from_row_address(&row, 7)?,
            };
            entries.push(AuditEntry {
                id: read_from_row_int(&row, 0)?,
                tx_hash,
                contract_address,
                diff: Diff {
                    source_event_id: read_from_row_int(&row, 1)?,
                    intra_batch_index: read_from_row_int(&row, 2)?,
                    point: read_from_row_u32(&row, 3)?,
                    operation: DiffOperation::try_from(operation)?,
                    data: Bytes::from(read_from_row_blob(&row, 5)?),
                },
            });
        }
        Ok(entries)
    }

    async fn apply_updates(&self, update_batch: UpdateBatch) -> Result<(), StoreError> {
        let point_sql = format!(
            "INSERT OR REPLACE INTO points ({POINT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)"
        );
        let mut queries = Vec::new();
        for point in &update_batch.points {
            queries.push((point_sql.as_str(), point_params(point)));
        }
        for diff in &update_batch.diffs {
            queries.push((
                "INSERT INTO diffs (source_event_id, intra_batch_index, point, operation, data) VALUES (?1, ?2, ?3, ?4, ?5)",
                diff_params(diff)?,
            ));
        }

        let conn = self.write_conn.lock().await;
        let transaction = conn.transaction().await?;
        self.execute_in_tx(queries, Some(&transaction)).await?;
        for id in &update_batch.processed_events {
            let updated = transaction
                .execute(
                    "UPDATE events SET is_processed = 1 WHERE id = ?1",
                    Params::Positional(vec![int_value(*id)?]),
                )
                .await?;
            if updated != 1 {
                // Dropping the transaction rolls it back
                return Err(StoreError::Custom(format!("Unknown event id {id}")));
            }
        }
        transaction.commit().await.map_err(StoreError::from)
    }

    async fn checkpoint(&self, path: &Path) -> Result<(), StoreError> {
        let conn = self.write_conn.lock().await;
        conn.execute(
            "VACUUM INTO ?1",
            Params::Positional(vec![Value::Text(path.display().to_string())]),
        )
        .await?;
        Ok(())
    }
}
