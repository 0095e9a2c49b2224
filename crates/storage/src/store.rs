//! SQLite event store implementation.

use crate::{Error, Event, Result, TxId};
use chrono::{DateTime, Utc};
use policy::Address;
use rusqlite::{Connection, Row, params};
use std::path::Path;

/// SQLite-backed audit store.
pub struct EventStore {
    conn: Connection,
}

/// Summary of one committed transaction.
#[derive(Debug, Clone)]
pub struct TransactionSummary {
    pub id: TxId,
    pub block: u64,
    pub timestamp: DateTime<Utc>,
    pub event_count: usize,
}

impl EventStore {
    /// Open or create an event store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory event store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                tx_id TEXT NOT NULL,
                emitter TEXT NOT NULL,
                block INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                kind TEXT NOT NULL,
                data TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_tx
                ON events(tx_id);
            CREATE INDEX IF NOT EXISTS idx_events_emitter
                ON events(emitter, kind);
            "#,
        )?;
        Ok(())
    }

    /// Append an event to the store.
    pub fn append(&self, event: &Event) -> Result<()> {
        insert(&self.conn, event)
    }

    /// Append the records of one transaction atomically.
    pub fn append_all(&self, events: &[Event]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for event in events {
            insert(&tx, event)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Load all events of a transaction, in emission order.
    pub fn load_transaction(&self, tx_id: TxId) -> Result<Vec<Event>> {
        self.load_events(tx_id, None)
    }

    /// Load the events of a transaction, optionally only one kind.
    pub fn load_events(&self, tx_id: TxId, kind: Option<&str>) -> Result<Vec<Event>> {
        self.query(
            "SELECT id, tx_id, emitter, block, timestamp, data FROM events
             WHERE tx_id = ?1 AND (?2 IS NULL OR kind = ?2) ORDER BY rowid",
            params![tx_id.to_string(), kind],
        )
    }

    /// Load everything an emitter recorded, optionally only one kind.
    pub fn load_emitted(&self, emitter: Address, kind: Option<&str>) -> Result<Vec<Event>> {
        self.query(
            "SELECT id, tx_id, emitter, block, timestamp, data FROM events
             WHERE emitter = ?1 AND (?2 IS NULL OR kind = ?2) ORDER BY rowid",
            params![emitter.to_string(), kind],
        )
    }

    /// List transactions that left audit records, newest first.
    pub fn list_transactions(&self) -> Result<Vec<TransactionSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT tx_id, MIN(block), MIN(timestamp), COUNT(*) FROM events
             GROUP BY tx_id ORDER BY MIN(rowid) DESC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let block: i64 = row.get(1)?;
                let timestamp: String = row.get(2)?;
                let count: i64 = row.get(3)?;
                Ok((id, block, timestamp, count))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, block, timestamp, count)| {
                Ok(TransactionSummary {
                    id: TxId(id.parse().map_err(|e| corrupt(&id, e))?),
                    block: block as u64,
                    timestamp: timestamp.parse().map_err(|e| corrupt(&id, e))?,
                    event_count: count as usize,
                })
            })
            .collect()
    }

    fn query(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(args, RawEvent::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RawEvent::decode).collect()
    }
}

fn insert(conn: &Connection, event: &Event) -> Result<()> {
    conn.execute(
        "INSERT INTO events (id, tx_id, emitter, block, timestamp, kind, data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.id.to_string(),
            event.tx_id.to_string(),
            event.emitter.to_string(),
            event.block as i64,
            event.timestamp.to_rfc3339(),
            event.kind.name(),
            serde_json::to_string(&event.kind)?,
        ],
    )?;
    Ok(())
}

struct RawEvent {
    id: String,
    tx_id: String,
    emitter: String,
    block: i64,
    timestamp: String,
    data: String,
}

impl RawEvent {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            tx_id: row.get(1)?,
            emitter: row.get(2)?,
            block: row.get(3)?,
            timestamp: row.get(4)?,
            data: row.get(5)?,
        })
    }

    fn decode(self) -> Result<Event> {
        let id = &self.id;
        Ok(Event {
            id: id.parse().map_err(|e| corrupt(id, e))?,
            tx_id: TxId(self.tx_id.parse().map_err(|e| corrupt(id, e))?),
            emitter: self.emitter.parse().map_err(|e| corrupt(id, e))?,
            block: self.block as u64,
            timestamp: self.timestamp.parse().map_err(|e| corrupt(id, e))?,
            kind: serde_json::from_str(&self.data)?,
        })
    }
}

fn corrupt(id: &str, reason: impl std::fmt::Display) -> Error {
    Error::Corrupt {
        id: id.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventKind;
    use policy::{RoleId, Word};
    use pretty_assertions::assert_eq;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn sample(tx: TxId, emitter: Address, block: u64, kind: EventKind) -> Event {
        Event::new(tx, emitter, block, at(1_700_000_000 + block as i64), kind)
    }

    #[test]
    fn append_and_load_in_order() {
        let store = EventStore::in_memory().unwrap();
        let tx = TxId::new();
        let kernel = Address::from_low_u64(1);
        let events = vec![
            sample(
                tx,
                kernel,
                1,
                EventKind::EntrySet {
                    namespace: Word::hash("ns"),
                    app_id: Word::hash("app"),
                    implementation: Address::from_low_u64(2),
                },
            ),
            sample(
                tx,
                kernel,
                1,
                EventKind::ScriptResult {
                    executor: Address::from_low_u64(3),
                    script: vec![0, 0, 0, 1],
                    input: vec![],
                    output: vec![0xab],
                },
            ),
        ];
        store.append_all(&events).unwrap();

        let loaded = store.load_transaction(tx).unwrap();
        assert_eq!(loaded, events);

        let scripts = store.load_events(tx, Some("script_result")).unwrap();
        assert_eq!(scripts.len(), 1);
        assert!(store.load_transaction(TxId::new()).unwrap().is_empty());
    }

    #[test]
    fn filter_by_emitter() {
        let store = EventStore::in_memory().unwrap();
        let acl = Address::from_low_u64(10);
        let registry = Address::from_low_u64(11);
        let tx = TxId::new();
        store
            .append(&sample(
                tx,
                acl,
                2,
                EventKind::PermissionFrozen {
                    target: registry,
                    role: RoleId::named("R"),
                },
            ))
            .unwrap();
        store
            .append(&sample(
                tx,
                registry,
                2,
                EventKind::ExecutorRegistered {
                    index: 1,
                    executor: Address::from_low_u64(12),
                },
            ))
            .unwrap();

        assert_eq!(store.load_emitted(acl, None).unwrap().len(), 1);
        assert_eq!(
            store
                .load_emitted(registry, Some("executor_registered"))
                .unwrap()
                .len(),
            1
        );
        assert!(store.load_emitted(registry, Some("executor_enabled")).unwrap().is_empty());
    }

    #[test]
    fn list_transactions_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.db");
        let first = TxId::new();
        let second = TxId::new();
        {
            let store = EventStore::open(&path).unwrap();
            let kind = EventKind::ExecutorDisabled {
                index: 1,
                executor: Address::from_low_u64(5),
            };
            store.append(&sample(first, Address::ZERO, 1, kind.clone())).unwrap();
            store.append(&sample(second, Address::ZERO, 2, kind.clone())).unwrap();
            store.append(&sample(second, Address::ZERO, 2, kind)).unwrap();
        }

        let store = EventStore::open(&path).unwrap();
        let txs = store.list_transactions().unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].id, second);
        assert_eq!(txs[0].event_count, 2);
        assert_eq!(txs[0].block, 2);
        assert_eq!(txs[1].id, first);
    }
}
