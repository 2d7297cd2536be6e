/// Background coordinator: sole owner of the relay store
///
/// Content scripts and the popup never touch storage directly. They send a
/// [`Request`] and the coordinator applies it to the store, so every
/// read-modify-write is serialized in one place.
use crate::error::{RelayError, Result};
use crate::messages::{RelayChannel, Reply, Request};
use crate::store::{RelayStore, StorageBackend};
use crate::wait::Timer;
use async_trait::async_trait;
use serde_json::Value;

/// Name of the periodic alarm that drives [`Coordinator::sweep`]
pub const SWEEP_ALARM: &str = "pgn-relay-sweep";

/// Opens the destination site in a new tab
#[async_trait(?Send)]
pub trait Navigator {
    async fn open_tab(&self, url: &str) -> Result<()>;
}

/// What a sweep pass did to the pending slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Empty,
    Live,
    Cleared,
    Failed,
}

pub struct Coordinator<B, T, N> {
    store: RelayStore<B, T>,
    navigator: N,
}

impl<B: StorageBackend, T: Timer, N: Navigator> Coordinator<B, T, N> {
    pub fn new(store: RelayStore<B, T>, navigator: N) -> Self {
        Coordinator { store, navigator }
    }

    pub fn store(&self) -> &RelayStore<B, T> {
        &self.store
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// Decode a raw runtime message and apply it
    pub async fn handle_value(&self, message: Value) -> Reply {
        match serde_json::from_value::<Request>(message) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                log::warn!("Malformed request: {}", e);
                Reply::failure(RelayError::Channel(format!("Malformed request: {}", e)))
            }
        }
    }

    /// Apply one request. Failures become a reply, never a panic.
    pub async fn handle(&self, request: Request) -> Reply {
        log::debug!("Handling {}", request_name(&request));
        match self.dispatch(request).await {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!("Request failed: {}", e);
                Reply::failure(e)
            }
        }
    }

    async fn dispatch(&self, request: Request) -> Result<Reply> {
        match request {
            Request::OpenDestination { payload } | Request::ExportGame { payload } => {
                self.relay(payload).await?;
                Ok(Reply::ok())
            }
            Request::GetHistory => Ok(Reply {
                history: Some(self.store.list_history().await?),
                ..Reply::ok()
            }),
            Request::ClearHistory => {
                self.store.clear_history().await?;
                Ok(Reply::ok())
            }
            Request::DeleteGame { id } => {
                self.store.delete_history_entry(id).await?;
                Ok(Reply::ok())
            }
            Request::RecordGame { entry } => {
                let id = self.store.record_game(entry).await?;
                log::info!("Saved game {} to history", id);
                Ok(Reply::ok())
            }
            Request::ConsumePending => Ok(Reply {
                pending: self.store.consume_pending().await?,
                ..Reply::ok()
            }),
            Request::GetSettings => Ok(Reply {
                settings: Some(self.store.settings().await?),
                ..Reply::ok()
            }),
            Request::SaveSettings { settings } => {
                self.store.save_settings(settings).await?;
                Ok(Reply::ok())
            }
        }
    }

    /// Stash the payload, then open the destination page
    async fn relay(&self, payload: String) -> Result<()> {
        log::info!("Relaying PGN ({} chars)", payload.len());
        self.store.set_pending(payload).await?;
        self.navigator.open_tab(&self.store.config().destination_url).await
    }

    /// Drop a stale pending slot nobody came to collect
    pub async fn sweep(&self) -> SweepOutcome {
        match self.store.expire_pending().await {
            Ok(Some(expired)) => {
                log::info!(
                    "Discarded pending PGN after {} ms",
                    expired.age_ms(self.store.timer().now_ms())
                );
                SweepOutcome::Cleared
            }
            Ok(None) => match self.store.get_pending().await {
                Ok(Some(_)) => SweepOutcome::Live,
                Ok(None) => SweepOutcome::Empty,
                Err(e) => {
                    log::warn!("Sweep could not read storage: {}", e);
                    SweepOutcome::Failed
                }
            },
            Err(e) => {
                log::warn!("Sweep failed: {}", e);
                SweepOutcome::Failed
            }
        }
    }

    /// Sweep when the named alarm is ours, ignore anything else
    pub async fn on_alarm(&self, name: &str) -> Option<SweepOutcome> {
        if name != SWEEP_ALARM {
            log::debug!("Ignoring alarm {}", name);
            return None;
        }
        Some(self.sweep().await)
    }

    /// Seed storage on a fresh install only; updates keep what the user has
    pub async fn on_install_reason(&self, reason: &str) -> Result<bool> {
        if reason != "install" {
            return Ok(false);
        }
        self.on_installed().await?;
        Ok(true)
    }

    pub async fn on_installed(&self) -> Result<()> {
        log::info!("Extension installed, seeding storage");
        self.store.initialize_defaults().await
    }
}

/// Lets other in-process components talk to the coordinator directly
#[async_trait(?Send)]
impl<B: StorageBackend, T: Timer, N: Navigator> RelayChannel for Coordinator<B, T, N> {
    async fn send(&self, request: Request) -> Result<Reply> {
        Ok(self.handle(request).await)
    }
}

fn request_name(request: &Request) -> &'static str {
    match request {
        Request::OpenDestination { .. } => "openDestination",
        Request::GetHistory => "getHistory",
        Request::ClearHistory => "clearHistory",
        Request::DeleteGame { .. } => "deleteGame",
        Request::ExportGame { .. } => "exportGame",
        Request::RecordGame { .. } => "recordGame",
        Request::ConsumePending => "consumePending",
        Request::GetSettings => "getSettings",
        Request::SaveSettings { .. } => "saveSettings",
    }
}
