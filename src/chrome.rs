/// Extension API bindings: storage, tabs, alarms and runtime messaging
use crate::coordinator::Navigator;
use crate::error::{RelayError, Result};
use crate::messages::{RelayChannel, Reply, Request};
use crate::store::StorageBackend;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use wasm_bindgen::prelude::*;

// Import JS bridge functions
#[wasm_bindgen(module = "/js/bridge.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn storageGet(key: &str) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn storageSet(key: &str, value: JsValue) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn storageRemove(key: &str) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn createTab(url: &str, active: bool) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn sendMessage(message: JsValue) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn scheduleAlarm(name: &str, period_in_minutes: f64) -> std::result::Result<(), JsValue>;
}

/// JSON-compatible conversion so maps come out as plain objects
pub fn to_js<T: Serialize>(value: &T) -> std::result::Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
}

pub fn from_js<T: DeserializeOwned>(value: JsValue) -> std::result::Result<T, serde_wasm_bindgen::Error> {
    serde_wasm_bindgen::from_value(value)
}

fn storage_error(context: &str, e: impl std::fmt::Debug) -> RelayError {
    RelayError::StorageUnavailable(format!("{}: {:?}", context, e))
}

fn channel_error(context: &str, e: impl std::fmt::Debug) -> RelayError {
    RelayError::Channel(format!("{}: {:?}", context, e))
}

/// `chrome.storage.local`
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeStorage;

#[async_trait(?Send)]
impl StorageBackend for ChromeStorage {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let raw = storageGet(key)
            .await
            .map_err(|e| storage_error("Failed to get storage", e))?;
        if raw.is_null() || raw.is_undefined() {
            return Ok(None);
        }
        from_js(raw)
            .map(Some)
            .map_err(|e| storage_error("Failed to parse storage", e))
    }

    async fn save(&self, key: &str, value: Value) -> Result<()> {
        let raw = to_js(&value).map_err(|e| storage_error("Failed to serialize", e))?;
        storageSet(key, raw)
            .await
            .map_err(|e| storage_error("Failed to save storage", e))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        storageRemove(key)
            .await
            .map_err(|e| storage_error("Failed to remove from storage", e))
    }
}

/// `chrome.tabs.create`, always focused
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeTabs;

#[async_trait(?Send)]
impl Navigator for ChromeTabs {
    async fn open_tab(&self, url: &str) -> Result<()> {
        createTab(url, true)
            .await
            .map_err(|e| channel_error("Failed to open tab", e))
    }
}

/// Create a repeating `chrome.alarms` alarm unless one with that name already exists
pub async fn schedule_alarm(name: &str, period_in_minutes: f64) -> Result<()> {
    scheduleAlarm(name, period_in_minutes)
        .await
        .map_err(|e| channel_error("Failed to schedule alarm", e))
}

/// `chrome.runtime.sendMessage` to the background coordinator
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeChannel;

#[async_trait(?Send)]
impl RelayChannel for RuntimeChannel {
    async fn send(&self, request: Request) -> Result<Reply> {
        let message = to_js(&request).map_err(|e| channel_error("Failed to serialize request", e))?;
        let raw = sendMessage(message)
            .await
            .map_err(|e| channel_error("Message not delivered", e))?;
        if raw.is_null() || raw.is_undefined() {
            return Err(RelayError::Channel("No reply from background".to_string()));
        }
        from_js(raw).map_err(|e| channel_error("Failed to parse reply", e))
    }
}
