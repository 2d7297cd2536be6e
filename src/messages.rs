/// Messages between the content scripts, the popup and the background coordinator
use crate::config::Settings;
use crate::error::{RelayError, Result};
use crate::history::{HistoryEntry, PendingTransfer};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// Stash the payload and open the destination page
    OpenDestination { payload: String },
    GetHistory,
    ClearHistory,
    DeleteGame { id: u64 },
    /// Re-run the relay for a game picked from history
    ExportGame { payload: String },
    RecordGame { entry: HistoryEntry },
    ConsumePending,
    GetSettings,
    SaveSettings { settings: Settings },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Reply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingTransfer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RelayError>,
}

impl Reply {
    pub fn ok() -> Reply {
        Reply {
            success: true,
            ..Reply::default()
        }
    }

    pub fn failure(error: RelayError) -> Reply {
        Reply {
            success: false,
            error: Some(error),
            ..Reply::default()
        }
    }

    pub fn into_result(self) -> Result<Reply> {
        if self.success {
            Ok(self)
        } else {
            Err(self
                .error
                .unwrap_or_else(|| RelayError::Channel("Request refused".to_string())))
        }
    }
}

/// Request/response transport to the background coordinator
#[async_trait(?Send)]
pub trait RelayChannel {
    async fn send(&self, request: Request) -> Result<Reply>;

    async fn open_destination(&self, payload: String) -> Result<()> {
        self.send(Request::OpenDestination { payload }).await?.into_result()?;
        Ok(())
    }

    async fn export_game(&self, payload: String) -> Result<()> {
        self.send(Request::ExportGame { payload }).await?.into_result()?;
        Ok(())
    }

    async fn record_game(&self, entry: HistoryEntry) -> Result<()> {
        self.send(Request::RecordGame { entry }).await?.into_result()?;
        Ok(())
    }

    async fn history(&self) -> Result<Vec<HistoryEntry>> {
        let reply = self.send(Request::GetHistory).await?.into_result()?;
        Ok(reply.history.unwrap_or_default())
    }

    async fn delete_game(&self, id: u64) -> Result<()> {
        self.send(Request::DeleteGame { id }).await?.into_result()?;
        Ok(())
    }

    async fn clear_history(&self) -> Result<()> {
        self.send(Request::ClearHistory).await?.into_result()?;
        Ok(())
    }

    async fn consume_pending(&self) -> Result<Option<PendingTransfer>> {
        let reply = self.send(Request::ConsumePending).await?.into_result()?;
        Ok(reply.pending)
    }

    async fn settings(&self) -> Result<Settings> {
        let reply = self.send(Request::GetSettings).await?.into_result()?;
        Ok(reply.settings.unwrap_or_default())
    }

    async fn save_settings(&self, settings: Settings) -> Result<()> {
        self.send(Request::SaveSettings { settings }).await?.into_result()?;
        Ok(())
    }
}
