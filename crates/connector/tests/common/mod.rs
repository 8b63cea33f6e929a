//! Shared fixtures: a three-node ring, an in-memory store and a topology
//! client with failure injection.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use connector::{
    ColumnValue, Error, Row, RowWriter, SinglePartitionQuery, StoreError, StoreSession,
    TokenRingClient, TopologySnapshot,
};
use corelib::node::NodeAddress;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

pub const A: &str = "10.0.0.1";
pub const B: &str = "10.0.0.2";
pub const C: &str = "10.0.0.3";

pub fn addr(s: &str) -> NodeAddress {
    s.parse().unwrap()
}

/// Nodes A < B < C with one token each, keyspace `ks` at RF 2 and table
/// `t(pk int, val text)`.
pub fn snapshot(version: u64) -> TopologySnapshot {
    serde_json::from_value(serde_json::json!({
        "version": version,
        "nodes": [
            {"address": A, "datacenter": "dc1", "rack": "r1", "tokens": [-6148914691236517206i64]},
            {"address": B, "datacenter": "dc1", "rack": "r1", "tokens": [0]},
            {"address": C, "datacenter": "dc1", "rack": "r1", "tokens": [6148914691236517205i64]}
        ],
        "keyspaces": [{
            "name": "ks",
            "replication": {"class": "SimpleStrategy", "replication_factor": 2},
            "tables": [{
                "name": "t",
                "partition_key": [{"name": "pk", "type": "int"}],
                "regular_columns": [{"name": "val", "type": "text"}]
            }]
        }]
    }))
    .unwrap()
}

/// Exposes an `i32` record as the `pk` column.
pub struct IntWriter {
    columns: Vec<String>,
}

impl IntWriter {
    pub fn new() -> Arc<dyn RowWriter<i32>> {
        Arc::new(Self {
            columns: vec!["pk".to_string()],
        })
    }
}

impl RowWriter<i32> for IntWriter {
    fn column_names(&self) -> &[String] {
        &self.columns
    }

    fn column_value(&self, record: &i32, column: &str) -> Option<ColumnValue> {
        (column == "pk").then_some(ColumnValue::Int(*record))
    }
}

/// Claims to write `pk` but hands out text, which the table rejects.
pub struct TextKeyWriter {
    columns: Vec<String>,
}

impl TextKeyWriter {
    pub fn new() -> Arc<dyn RowWriter<i32>> {
        Arc::new(Self {
            columns: vec!["pk".to_string()],
        })
    }
}

impl RowWriter<i32> for TextKeyWriter {
    fn column_names(&self) -> &[String] {
        &self.columns
    }

    fn column_value(&self, record: &i32, column: &str) -> Option<ColumnValue> {
        (column == "pk").then(|| ColumnValue::Text(record.to_string()))
    }
}

pub fn read_val(row: &Row) -> connector::Result<String> {
    match row.get("val") {
        Some(ColumnValue::Text(val)) => Ok(val.clone()),
        other => Err(Error::Configuration(format!("unexpected val {other:?}"))),
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// `t(pk int, val text)` held in memory.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<String, Vec<Row>>>,
    calls: AtomicU32,
    fail_next: AtomicU32,
    rejected: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
    hang: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn with_rows(rows: &[(i32, &str)]) -> Arc<Self> {
        let store = Self::default();
        for (pk, val) in rows {
            store
                .rows
                .lock()
                .entry(pk.to_string())
                .or_default()
                .push(Row::new().with("pk", *pk).with("val", *val));
        }
        Arc::new(store)
    }

    /// The next `n` requests fail with a retryable error.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Requests for `pk` fail with a non-retryable error.
    pub fn reject(&self, pk: i32) {
        self.rejected.lock().insert(pk.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Requests never complete.
    pub fn hang(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreSession for MemoryStore {
    async fn fetch_partition(&self, query: &SinglePartitionQuery) -> Result<Vec<Row>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Unavailable("injected failure".into()));
        }

        let key: Vec<String> = query.bound_values().map(|v| v.to_string()).collect();
        let key = key.join(",");
        if self.rejected.lock().contains(&key) {
            return Err(StoreError::InvalidRequest(format!("bad key {key}")));
        }
        let rows = self.rows.lock().get(&key).cloned().unwrap_or_default();
        Ok(rows.iter().map(|row| row.project(&query.columns)).collect())
    }
}

/// Topology client that fails a configurable number of times and can be
/// held mid-fetch.
pub struct FlakyRingClient {
    snapshot: Mutex<TopologySnapshot>,
    failures: AtomicU32,
    calls: AtomicU32,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl FlakyRingClient {
    pub fn new(snapshot: TopologySnapshot, failures: u32) -> Arc<Self> {
        Arc::new(Self {
            snapshot: Mutex::new(snapshot),
            failures: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
            gate: Mutex::new(None),
        })
    }

    pub fn set_snapshot(&self, snapshot: TopologySnapshot) {
        *self.snapshot.lock() = snapshot;
    }

    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Blocks fetches until permits are added to the returned semaphore.
    pub fn hold(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRingClient for FlakyRingClient {
    async fn fetch_topology(&self) -> Result<TopologySnapshot, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(self.snapshot.lock().clone())
    }
}
