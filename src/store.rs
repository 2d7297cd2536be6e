/// Relay store: the pending slot and the game history, persisted to extension storage
use crate::config::{RelayConfig, Settings};
use crate::error::{RelayError, Result};
use crate::history::{HistoryEntry, PendingTransfer};
use crate::wait::Timer;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cell::RefCell;

pub const PENDING_KEY: &str = "pendingTransfer";
pub const HISTORY_KEY: &str = "gameHistory";
pub const SETTINGS_KEY: &str = "settings";

/// Durable key-value substrate (chrome.storage.local in the extension)
#[async_trait(?Send)]
pub trait StorageBackend {
    async fn load(&self, key: &str) -> Result<Option<Value>>;
    async fn save(&self, key: &str, value: Value) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Everything the relay persists, held in memory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelayState {
    pub pending: Option<PendingTransfer>,
    pub history: Vec<HistoryEntry>,
    pub settings: Settings,
}

impl RelayState {
    pub fn new() -> Self {
        RelayState::default()
    }

    /// Last write wins
    pub fn set_pending(&mut self, payload: String, now: f64) {
        self.pending = Some(PendingTransfer::new(payload, now));
    }

    pub fn take_pending(&mut self) -> Option<PendingTransfer> {
        self.pending.take()
    }

    /// Drop the slot if it is stale. Returns the dropped transfer.
    pub fn expire_pending(&mut self, now: f64, ttl_ms: f64) -> Option<PendingTransfer> {
        if self.pending.as_ref().is_some_and(|p| p.is_expired(now, ttl_ms)) {
            self.pending.take()
        } else {
            None
        }
    }

    /// Insert at the head, evicting the oldest entries beyond `cap`
    pub fn append_history(&mut self, entry: HistoryEntry, cap: usize) {
        self.history.insert(0, entry);
        self.history.truncate(cap);
    }

    pub fn delete_history_entry(&mut self, id: u64) -> bool {
        let original_len = self.history.len();
        self.history.retain(|e| e.id != id);
        self.history.len() < original_len
    }

    pub fn get_history_entry(&self, id: u64) -> Option<&HistoryEntry> {
        self.history.iter().find(|e| e.id == id)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// A timestamp id that is strictly greater than every id in history
    pub fn next_history_id(&self, now: f64) -> u64 {
        let candidate = now.max(0.0) as u64;
        match self.history.iter().map(|e| e.id).max() {
            Some(last) if last >= candidate => last + 1,
            _ => candidate,
        }
    }
}

/// Async facade over a [`StorageBackend`] with an in-memory mirror
///
/// Every read-modify-write happens on the mirror with no await in between,
/// then the affected key is written back before the call returns. A failed
/// write restores the previous mirror value unless another call has replaced
/// it in the meantime.
pub struct RelayStore<B, T> {
    backend: B,
    timer: T,
    config: RelayConfig,
    state: RefCell<Option<RelayState>>,
}

impl<B: StorageBackend, T: Timer> RelayStore<B, T> {
    pub fn new(backend: B, timer: T, config: RelayConfig) -> Self {
        RelayStore {
            backend,
            timer,
            config,
            state: RefCell::new(None),
        }
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn set_pending(&self, payload: String) -> Result<()> {
        self.hydrate().await?;
        let now = self.timer.now_ms();
        let previous = self.mutate(|s| {
            let previous = s.pending.clone();
            s.set_pending(payload, now);
            previous
        });
        self.persist_pending(previous).await
    }

    pub async fn get_pending(&self) -> Result<Option<PendingTransfer>> {
        self.hydrate().await?;
        Ok(self.read(|s| s.pending.clone()))
    }

    /// Read and delete the slot in one step
    pub async fn consume_pending(&self) -> Result<Option<PendingTransfer>> {
        self.hydrate().await?;
        let taken = self.mutate(RelayState::take_pending);
        if taken.is_some() {
            self.persist_pending(taken.clone()).await?;
        }
        Ok(taken)
    }

    pub async fn clear_pending(&self) -> Result<()> {
        self.hydrate().await?;
        let previous = self.mutate(RelayState::take_pending);
        self.persist_pending(previous).await
    }

    /// Clear the slot if it has outlived the TTL
    pub async fn expire_pending(&self) -> Result<Option<PendingTransfer>> {
        self.hydrate().await?;
        let now = self.timer.now_ms();
        let ttl = self.config.pending_ttl_ms;
        let expired = self.mutate(|s| s.expire_pending(now, ttl));
        if expired.is_some() {
            self.persist_pending(expired.clone()).await?;
        }
        Ok(expired)
    }

    pub async fn append_history(&self, entry: HistoryEntry) -> Result<()> {
        self.hydrate().await?;
        let cap = self.config.history_cap;
        let previous = self.mutate(|s| {
            let previous = s.history.clone();
            s.append_history(entry, cap);
            previous
        });
        self.persist_history(previous).await
    }

    /// Append a freshly captured game under a unique, monotonic id. Returns the id used.
    pub async fn record_game(&self, mut entry: HistoryEntry) -> Result<u64> {
        self.hydrate().await?;
        let now = self.timer.now_ms().max(entry.id as f64);
        let cap = self.config.history_cap;
        let (id, previous) = self.mutate(|s| {
            let previous = s.history.clone();
            entry.id = s.next_history_id(now);
            let id = entry.id;
            s.append_history(entry, cap);
            (id, previous)
        });
        self.persist_history(previous).await?;
        Ok(id)
    }

    pub async fn list_history(&self) -> Result<Vec<HistoryEntry>> {
        self.hydrate().await?;
        Ok(self.read(|s| s.history.clone()))
    }

    /// No-op when the id is absent
    pub async fn delete_history_entry(&self, id: u64) -> Result<()> {
        self.hydrate().await?;
        let previous = self.read(|s| s.history.clone());
        if self.mutate(|s| s.delete_history_entry(id)) {
            self.persist_history(previous).await?;
        }
        Ok(())
    }

    pub async fn clear_history(&self) -> Result<()> {
        self.hydrate().await?;
        let previous = self.mutate(|s| std::mem::take(&mut s.history));
        self.persist_history(previous).await
    }

    pub async fn settings(&self) -> Result<Settings> {
        self.hydrate().await?;
        Ok(self.read(|s| s.settings))
    }

    pub async fn save_settings(&self, settings: Settings) -> Result<()> {
        self.hydrate().await?;
        let previous = self.mutate(|s| std::mem::replace(&mut s.settings, settings));
        if let Err(e) = self.backend.save(SETTINGS_KEY, to_json(&settings)?).await {
            self.mutate(|s| {
                if s.settings == settings {
                    s.settings = previous;
                }
            });
            return Err(e);
        }
        Ok(())
    }

    /// Seed history and settings on first install, keeping anything already stored
    pub async fn initialize_defaults(&self) -> Result<()> {
        if self.backend.load(HISTORY_KEY).await?.is_none() {
            self.backend.save(HISTORY_KEY, Value::Array(Vec::new())).await?;
        }
        if self.backend.load(SETTINGS_KEY).await?.is_none() {
            self.backend.save(SETTINGS_KEY, to_json(&Settings::default())?).await?;
        }
        Ok(())
    }

    /// Load the mirror from the backend once. A key that does not parse starts empty.
    async fn hydrate(&self) -> Result<()> {
        if self.state.borrow().is_some() {
            return Ok(());
        }

        let pending = from_json(self.backend.load(PENDING_KEY).await?, PENDING_KEY);
        let history = from_json(self.backend.load(HISTORY_KEY).await?, HISTORY_KEY);
        let settings = from_json(self.backend.load(SETTINGS_KEY).await?, SETTINGS_KEY);

        let mut state = self.state.borrow_mut();
        // Another caller may have hydrated and mutated while we were loading
        if state.is_none() {
            *state = Some(RelayState {
                pending,
                history: history.unwrap_or_default(),
                settings: settings.unwrap_or_default(),
            });
            log::debug!("Relay store hydrated");
        }
        Ok(())
    }

    fn read<R>(&self, f: impl FnOnce(&RelayState) -> R) -> R {
        let state = self.state.borrow();
        match state.as_ref() {
            Some(s) => f(s),
            None => f(&RelayState::default()),
        }
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut RelayState) -> R) -> R {
        let mut state = self.state.borrow_mut();
        f(state.get_or_insert_with(RelayState::new))
    }

    async fn persist_pending(&self, previous: Option<PendingTransfer>) -> Result<()> {
        let current = self.read(|s| s.pending.clone());
        let written = match &current {
            Some(pending) => self.backend.save(PENDING_KEY, to_json(pending)?).await,
            None => self.backend.remove(PENDING_KEY).await,
        };
        if written.is_err() {
            self.mutate(|s| {
                if s.pending == current {
                    s.pending = previous;
                }
            });
        }
        written
    }

    async fn persist_history(&self, previous: Vec<HistoryEntry>) -> Result<()> {
        let current = self.read(|s| s.history.clone());
        let written = self.backend.save(HISTORY_KEY, to_json(&current)?).await;
        if written.is_err() {
            self.mutate(|s| {
                if s.history == current {
                    s.history = previous;
                }
            });
        }
        written
    }
}

fn to_json<V: Serialize>(value: &V) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| RelayError::StorageUnavailable(format!("Failed to serialize: {}", e)))
}

fn from_json<V: DeserializeOwned>(value: Option<Value>, key: &str) -> Option<V> {
    match value {
        None | Some(Value::Null) => None,
        Some(v) => match serde_json::from_value(v) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                log::warn!("Ignoring unreadable {}: {}", key, e);
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualTimer, MemoryBackend, sample_entry};
    use futures::executor::block_on;

    fn store_at(now: f64) -> RelayStore<MemoryBackend, ManualTimer> {
        RelayStore::new(MemoryBackend::new(), ManualTimer::at(now), RelayConfig::default())
    }

    #[test]
    fn test_relay_state_new() {
        let state = RelayState::new();
        assert!(state.pending.is_none());
        assert_eq!(state.history.len(), 0);
        assert_eq!(state.settings, Settings::default());
    }

    #[test]
    fn test_append_history_newest_first() {
        let mut state = RelayState::new();
        state.append_history(sample_entry(1), 50);
        state.append_history(sample_entry(2), 50);

        assert_eq!(state.history[0].id, 2);
        assert_eq!(state.history[1].id, 1);
    }

    #[test]
    fn test_append_history_caps_at_fifty() {
        let mut state = RelayState::new();
        for id in 1..=120 {
            state.append_history(sample_entry(id), 50);
            assert!(state.history.len() <= 50);
        }

        let ids: Vec<u64> = state.history.iter().map(|e| e.id).collect();
        let expected: Vec<u64> = (71..=120).rev().collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_delete_nonexistent_entry() {
        let mut state = RelayState::new();
        state.append_history(sample_entry(1), 50);
        let before = state.history.clone();

        let removed = state.delete_history_entry(999);

        assert!(!removed);
        assert_eq!(state.history, before);
    }

    #[test]
    fn test_append_then_delete_round_trip() {
        let mut state = RelayState::new();
        state.append_history(sample_entry(1), 50);
        state.append_history(sample_entry(2), 50);
        let before = state.history.clone();

        state.append_history(sample_entry(3), 50);
        assert!(state.delete_history_entry(3));

        assert_eq!(state.history, before);
        assert!(state.get_history_entry(3).is_none());
    }

    #[test]
    fn test_next_history_id_is_monotonic() {
        let mut state = RelayState::new();
        assert_eq!(state.next_history_id(1000.0), 1000);

        state.append_history(sample_entry(1000), 50);
        assert_eq!(state.next_history_id(1000.0), 1001);
        assert_eq!(state.next_history_id(5000.0), 5000);
    }

    #[test]
    fn test_expire_pending_only_when_stale() {
        let mut state = RelayState::new();
        state.set_pending("pgn".to_string(), 0.0);

        assert!(state.expire_pending(60_000.0, 60_000.0).is_none());
        assert!(state.pending.is_some());
        assert!(state.expire_pending(60_001.0, 60_000.0).is_some());
        assert!(state.pending.is_none());
    }

    #[test]
    fn test_consume_returns_payload_once() {
        let store = store_at(0.0);
        block_on(async {
            store.set_pending("[Event \"Test\"]".to_string()).await.unwrap();

            let first = store.consume_pending().await.unwrap();
            let second = store.consume_pending().await.unwrap();

            assert_eq!(first.unwrap().payload, "[Event \"Test\"]");
            assert!(second.is_none());
        });
    }

    #[test]
    fn test_set_pending_last_write_wins() {
        let store = store_at(10.0);
        block_on(async {
            store.set_pending("first".to_string()).await.unwrap();
            store.timer().advance(5.0);
            store.set_pending("second".to_string()).await.unwrap();

            let pending = store.get_pending().await.unwrap().unwrap();
            assert_eq!(pending.payload, "second");
            assert_eq!(pending.created_at, 15.0);
        });
    }

    #[test]
    fn test_mutations_reach_backend() {
        let store = store_at(42.0);
        block_on(async {
            store.set_pending("pgn".to_string()).await.unwrap();
            store.append_history(sample_entry(1)).await.unwrap();
        });

        let backend = &store.backend;
        assert_eq!(backend.get(PENDING_KEY).unwrap()["payload"], "pgn");
        assert_eq!(backend.get(PENDING_KEY).unwrap()["createdAt"], 42.0);
        assert_eq!(backend.get(HISTORY_KEY).unwrap().as_array().unwrap().len(), 1);

        block_on(store.consume_pending()).unwrap();
        assert!(store.backend.get(PENDING_KEY).is_none());
    }

    #[test]
    fn test_hydrates_from_existing_storage() {
        let backend = MemoryBackend::new();
        backend.put(PENDING_KEY, serde_json::json!({"payload": "saved", "createdAt": 1.0}));
        backend.put(HISTORY_KEY, serde_json::to_value(vec![sample_entry(9)]).unwrap());
        backend.put(SETTINGS_KEY, serde_json::json!({"autoAnalyse": false}));
        let store = RelayStore::new(backend, ManualTimer::at(2.0), RelayConfig::default());

        block_on(async {
            assert_eq!(store.get_pending().await.unwrap().unwrap().payload, "saved");
            assert_eq!(store.list_history().await.unwrap()[0].id, 9);
            assert!(!store.settings().await.unwrap().auto_analyse);
        });
    }

    #[test]
    fn test_failed_write_reports_storage_unavailable() {
        let store = store_at(0.0);
        block_on(async {
            store.append_history(sample_entry(1)).await.unwrap();
            store.backend.fail_writes(true);

            let err = store.append_history(sample_entry(2)).await.unwrap_err();
            assert!(matches!(err, RelayError::StorageUnavailable(_)));

            store.backend.fail_writes(false);
            let ids: Vec<u64> = store.list_history().await.unwrap().iter().map(|e| e.id).collect();
            assert_eq!(ids, vec![1]);
        });
    }

    #[test]
    fn test_failed_consume_keeps_slot() {
        let store = store_at(0.0);
        block_on(async {
            store.set_pending("pgn".to_string()).await.unwrap();
            store.backend.fail_writes(true);

            assert!(store.consume_pending().await.is_err());

            store.backend.fail_writes(false);
            assert_eq!(store.consume_pending().await.unwrap().unwrap().payload, "pgn");
        });
    }

    #[test]
    fn test_corrupt_key_starts_empty() {
        let backend = MemoryBackend::new();
        backend.put(HISTORY_KEY, serde_json::json!({"not": "a list"}));
        backend.put(SETTINGS_KEY, serde_json::json!({"autoAnalyse": false}));
        let store = RelayStore::new(backend, ManualTimer::at(0.0), RelayConfig::default());

        block_on(async {
            assert!(store.list_history().await.unwrap().is_empty());
            // The other keys are unaffected
            assert!(!store.settings().await.unwrap().auto_analyse);

            store.set_pending("pgn".to_string()).await.unwrap();
            assert_eq!(store.consume_pending().await.unwrap().unwrap().payload, "pgn");

            store.append_history(sample_entry(1)).await.unwrap();
        });
        assert_eq!(store.backend.get(HISTORY_KEY).unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_pending_slot_reads_as_empty() {
        let backend = MemoryBackend::new();
        backend.put(PENDING_KEY, serde_json::json!("not a transfer"));
        let store = RelayStore::new(backend, ManualTimer::at(0.0), RelayConfig::default());

        assert!(block_on(store.consume_pending()).unwrap().is_none());
    }

    #[test]
    fn test_failed_write_keeps_concurrent_pending() {
        let store = store_at(0.0);
        block_on(store.get_pending()).unwrap();
        store.backend.yield_on_write(true);
        store.backend.fail_next_write();

        let (first, second) = block_on(async {
            futures::join!(store.set_pending("a".to_string()), store.set_pending("b".to_string()))
        });

        assert!(matches!(first, Err(RelayError::StorageUnavailable(_))));
        assert!(second.is_ok());
        assert_eq!(block_on(store.get_pending()).unwrap().unwrap().payload, "b");
        assert_eq!(store.backend.get(PENDING_KEY).unwrap()["payload"], "b");
    }

    #[test]
    fn test_failed_write_keeps_concurrent_history() {
        let store = store_at(0.0);
        block_on(store.list_history()).unwrap();
        store.backend.yield_on_write(true);
        store.backend.fail_next_write();

        let (first, second) = block_on(async {
            futures::join!(store.append_history(sample_entry(1)), store.append_history(sample_entry(2)))
        });

        assert!(first.is_err());
        assert!(second.is_ok());
        let ids: Vec<u64> = block_on(store.list_history()).unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(store.backend.get(HISTORY_KEY).unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_delete_missing_id_leaves_storage_untouched() {
        let store = store_at(0.0);
        block_on(async {
            store.append_history(sample_entry(1)).await.unwrap();
            store.backend.fail_writes(true);

            // Nothing to delete, so nothing is written
            store.delete_history_entry(404).await.unwrap();
            assert_eq!(store.list_history().await.unwrap().len(), 1);
        });
    }

    #[test]
    fn test_initialize_defaults_keeps_existing_history() {
        let backend = MemoryBackend::new();
        backend.put(HISTORY_KEY, serde_json::to_value(vec![sample_entry(3)]).unwrap());
        let store = RelayStore::new(backend, ManualTimer::at(0.0), RelayConfig::default());

        block_on(store.initialize_defaults()).unwrap();

        assert_eq!(store.backend.get(HISTORY_KEY).unwrap().as_array().unwrap().len(), 1);
        assert_eq!(store.backend.get(SETTINGS_KEY).unwrap()["autoAnalyse"], true);
    }

    #[test]
    fn test_record_game_assigns_unique_ids() {
        let store = store_at(5_000.0);
        block_on(async {
            let first = store.record_game(sample_entry(0)).await.unwrap();
            let second = store.record_game(sample_entry(0)).await.unwrap();

            assert_eq!(first, 5_000);
            assert_eq!(second, 5_001);
            let ids: Vec<u64> = store.list_history().await.unwrap().iter().map(|e| e.id).collect();
            assert_eq!(ids, vec![5_001, 5_000]);
        });
    }

    #[test]
    fn test_clear_history() {
        let store = store_at(0.0);
        block_on(async {
            store.append_history(sample_entry(1)).await.unwrap();
            store.append_history(sample_entry(2)).await.unwrap();
            store.clear_history().await.unwrap();

            assert!(store.list_history().await.unwrap().is_empty());
        });
        assert_eq!(store.backend.get(HISTORY_KEY).unwrap(), serde_json::json!([]));
    }
}
