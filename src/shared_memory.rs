//! # SharedMemory — process-local versioned key/value store
//!
//! The only designed shared-mutable resource in multi-agent runs: every
//! operation is serialized under a single logical mutex so concurrent
//! workers observe a linear history. Built on `tokio::sync::Mutex`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// One stored value plus its write provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// The stored value.
    pub value: Value,
    /// Strictly-increasing per-key version, starting at 1 on first write.
    pub version: u64,
    /// Id of the writer that produced the current value.
    pub written_by: String,
    /// When the current value was written, in milliseconds since the Unix epoch.
    pub written_at: i64,
    /// Optional caller-supplied metadata attached to the write.
    pub meta: Option<Value>,
}

/// One entry in the access log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLogEntry {
    /// The operation name (`"write"`, `"read"`, `"delete"`, `"cas"`, `"append"`, `"increment"`).
    pub op: String,
    /// The key operated on.
    pub key: String,
    /// Id of the agent performing the operation.
    pub actor: String,
    /// When the operation happened, in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

/// Operation counters surfaced by [`SharedMemory::export`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Statistics {
    /// Total successful writes.
    pub writes: u64,
    /// Total reads.
    pub reads: u64,
    /// Total deletes that actually removed an entry.
    pub deletes: u64,
    /// Total compare-and-swap attempts, successful or not.
    pub cas_attempts: u64,
    /// Total successful compare-and-swap operations.
    pub cas_successes: u64,
    /// Total appends.
    pub appends: u64,
    /// Total increments.
    pub increments: u64,
}

/// A snapshot of the whole store, as returned by [`SharedMemory::export`] and
/// accepted by [`SharedMemory::import`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportedState {
    /// All key/value entries.
    pub data: HashMap<String, Entry>,
    /// Free-form store-level metadata, distinct from per-entry `meta`.
    pub metadata: HashMap<String, Value>,
    /// The full access log, in operation order.
    pub access_log: Vec<AccessLogEntry>,
    /// Operation counters.
    pub statistics: Statistics,
}

struct Store {
    data: HashMap<String, Entry>,
    metadata: HashMap<String, Value>,
    access_log: Vec<AccessLogEntry>,
    statistics: Statistics,
    access_log_enabled: bool,
}

/// A process-local, versioned key/value store shared across agents.
///
/// All operations acquire the same internal mutex, so a sequence of calls
/// from any number of concurrent callers observes a single linear history.
pub struct SharedMemory {
    store: Mutex<Store>,
}

impl Default for SharedMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedMemory {
    /// Create an empty store with the access log enabled.
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store {
                data: HashMap::new(),
                metadata: HashMap::new(),
                access_log: Vec::new(),
                statistics: Statistics::default(),
                access_log_enabled: true,
            }),
        }
    }

    /// Create an empty store with the access log disabled.
    pub fn without_access_log() -> Self {
        Self {
            store: Mutex::new(Store {
                data: HashMap::new(),
                metadata: HashMap::new(),
                access_log: Vec::new(),
                statistics: Statistics::default(),
                access_log_enabled: false,
            }),
        }
    }

    fn log(store: &mut Store, op: &str, key: &str, actor: &str, now_ms: i64) {
        if store.access_log_enabled {
            store.access_log.push(AccessLogEntry {
                op: op.to_string(),
                key: key.to_string(),
                actor: actor.to_string(),
                timestamp_ms: now_ms,
            });
        }
    }

    /// Set `key` to `value`, incrementing its version (starting at 1 on first
    /// write). Returns the new version.
    pub async fn write(
        &self,
        key: &str,
        value: Value,
        writer_id: &str,
        meta: Option<Value>,
        now_ms: i64,
    ) -> u64 {
        let mut store = self.store.lock().await;
        let version = store.data.get(key).map(|e| e.version + 1).unwrap_or(1);
        store.data.insert(
            key.to_string(),
            Entry {
                value,
                version,
                written_by: writer_id.to_string(),
                written_at: now_ms,
                meta,
            },
        );
        store.statistics.writes += 1;
        Self::log(&mut store, "write", key, writer_id, now_ms);
        version
    }

    /// Read `key`, returning `default` if absent.
    pub async fn read(&self, key: &str, reader_id: &str, default: Option<Value>, now_ms: i64) -> Option<Value> {
        let mut store = self.store.lock().await;
        let result = store.data.get(key).map(|e| e.value.clone()).or(default);
        store.statistics.reads += 1;
        Self::log(&mut store, "read", key, reader_id, now_ms);
        result
    }

    /// Remove `key`. Returns whether an entry was actually removed.
    pub async fn delete(&self, key: &str, deleter_id: &str, now_ms: i64) -> bool {
        let mut store = self.store.lock().await;
        let removed = store.data.remove(key).is_some();
        if removed {
            store.statistics.deletes += 1;
        }
        Self::log(&mut store, "delete", key, deleter_id, now_ms);
        removed
    }

    /// Atomically replace `key`'s value with `new` iff it currently equals
    /// `expected` and the key exists. Returns whether the swap happened.
    pub async fn compare_and_swap(
        &self,
        key: &str,
        expected: &Value,
        new: Value,
        writer_id: &str,
        now_ms: i64,
    ) -> bool {
        let mut store = self.store.lock().await;
        store.statistics.cas_attempts += 1;
        let matches = store.data.get(key).is_some_and(|e| &e.value == expected);
        if matches {
            let version = store.data.get(key).map(|e| e.version + 1).unwrap_or(1);
            store.data.insert(
                key.to_string(),
                Entry {
                    value: new,
                    version,
                    written_by: writer_id.to_string(),
                    written_at: now_ms,
                    meta: None,
                },
            );
            store.statistics.cas_successes += 1;
        }
        Self::log(&mut store, "cas", key, writer_id, now_ms);
        matches
    }

    /// Append `item` to the list at `key`. If absent, creates a one-element
    /// list. If the current value is a scalar, replaces it with `[old, item]`.
    /// Returns the resulting list.
    pub async fn append(&self, key: &str, item: Value, writer_id: &str, now_ms: i64) -> Value {
        let mut store = self.store.lock().await;
        let new_value = match store.data.get(key) {
            Some(entry) => match &entry.value {
                Value::Array(items) => {
                    let mut items = items.clone();
                    items.push(item);
                    Value::Array(items)
                }
                other => Value::Array(vec![other.clone(), item]),
            },
            None => Value::Array(vec![item]),
        };
        let version = store.data.get(key).map(|e| e.version + 1).unwrap_or(1);
        store.data.insert(
            key.to_string(),
            Entry {
                value: new_value.clone(),
                version,
                written_by: writer_id.to_string(),
                written_at: now_ms,
                meta: None,
            },
        );
        store.statistics.appends += 1;
        Self::log(&mut store, "append", key, writer_id, now_ms);
        new_value
    }

    /// Add `delta` to the numeric value at `key` (absent key becomes `delta`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the current value is not numeric.
    pub async fn increment(&self, key: &str, writer_id: &str, delta: f64, now_ms: i64) -> Result<f64> {
        let mut store = self.store.lock().await;
        let current = match store.data.get(key) {
            Some(entry) => entry
                .value
                .as_f64()
                .ok_or_else(|| Error::validation(format!("value at '{key}' is not numeric")))?,
            None => 0.0,
        };
        let new_value = current + delta;
        let version = store.data.get(key).map(|e| e.version + 1).unwrap_or(1);
        store.data.insert(
            key.to_string(),
            Entry {
                value: serde_json::json!(new_value),
                version,
                written_by: writer_id.to_string(),
                written_at: now_ms,
                meta: None,
            },
        );
        store.statistics.increments += 1;
        Self::log(&mut store, "increment", key, writer_id, now_ms);
        Ok(new_value)
    }

    /// Set a store-level metadata value (distinct from per-entry `meta`).
    pub async fn set_metadata(&self, key: &str, value: Value) {
        let mut store = self.store.lock().await;
        store.metadata.insert(key.to_string(), value);
    }

    /// Snapshot the entire store.
    pub async fn export(&self) -> ExportedState {
        let store = self.store.lock().await;
        ExportedState {
            data: store.data.clone(),
            metadata: store.metadata.clone(),
            access_log: store.access_log.clone(),
            statistics: store.statistics,
        }
    }

    /// Restore a previously exported snapshot, replacing all current state.
    pub async fn import(&self, state: ExportedState) {
        let mut store = self.store.lock().await;
        store.data = state.data;
        store.metadata = state.metadata;
        store.access_log = state.access_log;
        store.statistics = state.statistics;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_versions_start_at_one_and_increase() {
        let memory = SharedMemory::new();
        let v1 = memory.write("k", serde_json::json!(1), "a", None, 0).await;
        let v2 = memory.write("k", serde_json::json!(2), "a", None, 1).await;
        assert_eq!(v1, 1);
        assert_eq!(v2, 2);
    }

    #[tokio::test]
    async fn test_read_returns_default_when_missing() {
        let memory = SharedMemory::new();
        let value = memory.read("missing", "r", Some(serde_json::json!("fallback")), 0).await;
        assert_eq!(value, Some(serde_json::json!("fallback")));
    }

    #[tokio::test]
    async fn test_delete_reports_whether_anything_removed() {
        let memory = SharedMemory::new();
        memory.write("k", serde_json::json!(1), "a", None, 0).await;
        assert!(memory.delete("k", "a", 1).await);
        assert!(!memory.delete("k", "a", 2).await);
    }

    #[tokio::test]
    async fn test_cas_fails_on_missing_key_and_does_not_create_it() {
        let memory = SharedMemory::new();
        let ok = memory
            .compare_and_swap("missing", &serde_json::json!(1), serde_json::json!(2), "a", 0)
            .await;
        assert!(!ok);
        assert_eq!(memory.read("missing", "a", None, 0).await, None);
    }

    #[tokio::test]
    async fn test_cas_succeeds_only_when_value_matches() {
        let memory = SharedMemory::new();
        memory.write("k", serde_json::json!("old"), "a", None, 0).await;
        assert!(
            !memory
                .compare_and_swap("k", &serde_json::json!("wrong"), serde_json::json!("new"), "a", 1)
                .await
        );
        assert!(
            memory
                .compare_and_swap("k", &serde_json::json!("old"), serde_json::json!("new"), "a", 2)
                .await
        );
        assert_eq!(memory.read("k", "a", None, 0).await, Some(serde_json::json!("new")));
    }

    #[tokio::test]
    async fn test_append_creates_grows_and_promotes_scalar_to_list() {
        let memory = SharedMemory::new();
        let first = memory.append("list", serde_json::json!("a"), "w", 0).await;
        assert_eq!(first, serde_json::json!(["a"]));

        memory.write("scalar", serde_json::json!("x"), "w", None, 1).await;
        let promoted = memory.append("scalar", serde_json::json!("y"), "w", 2).await;
        assert_eq!(promoted, serde_json::json!(["x", "y"]));
    }

    #[tokio::test]
    async fn test_increment_absent_key_becomes_delta() {
        let memory = SharedMemory::new();
        let value = memory.increment("counter", "w", 5.0, 0).await.unwrap();
        assert_eq!(value, 5.0);
        let value = memory.increment("counter", "w", 2.0, 1).await.unwrap();
        assert_eq!(value, 7.0);
    }

    #[tokio::test]
    async fn test_increment_fails_on_non_numeric_current_value() {
        let memory = SharedMemory::new();
        memory.write("k", serde_json::json!("not a number"), "w", None, 0).await;
        assert!(memory.increment("k", "w", 1.0, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_export_then_import_round_trips_identical_reads() {
        let memory = SharedMemory::new();
        memory.write("a", serde_json::json!(1), "w", None, 0).await;
        memory.write("b", serde_json::json!("x"), "w", None, 1).await;
        memory.read("a", "r", None, 2).await;

        let state = memory.export().await;
        let fresh = SharedMemory::new();
        fresh.import(state).await;

        assert_eq!(fresh.read("a", "r", None, 0).await, Some(serde_json::json!(1)));
        assert_eq!(fresh.read("b", "r", None, 0).await, Some(serde_json::json!("x")));
    }

    #[tokio::test]
    async fn test_access_log_records_operations_in_order() {
        let memory = SharedMemory::new();
        memory.write("k", serde_json::json!(1), "w", None, 0).await;
        memory.read("k", "r", None, 1).await;
        memory.delete("k", "d", 2).await;

        let state = memory.export().await;
        let ops: Vec<&str> = state.access_log.iter().map(|e| e.op.as_str()).collect();
        assert_eq!(ops, vec!["write", "read", "delete"]);
    }
}
