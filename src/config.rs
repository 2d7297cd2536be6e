/// Relay configuration: compile-time defaults plus the persisted user settings
use serde::{Deserialize, Serialize};

/// Age after which a pending transfer is stale
pub const PENDING_TTL_MS: f64 = 60_000.0;

/// Maximum number of games kept in history
pub const HISTORY_CAP: usize = 50;

pub const DESTINATION_URL: &str = "https://lichess.org/paste";
pub const SOURCE_LABEL: &str = "Chess.com";

/// Tunables shared by every entry point
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub pending_ttl_ms: f64,
    pub history_cap: usize,
    pub sweep_interval_ms: u32,
    pub field_poll_ms: u32,
    pub field_wait_budget_ms: u32,
    /// Wait after the import field shows up, before reading the slot
    pub field_settle_ms: u32,
    /// Wait between clearing and filling the import field
    pub field_clear_ms: u32,
    pub submit_settle_ms: u32,
    pub share_settle_ms: u32,
    pub tab_settle_ms: u32,
    pub button_poll_ms: u32,
    /// The backup button poll stops after this long without a visibility change
    pub button_idle_cutoff_ms: f64,
    pub destination_url: String,
    pub source_label: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            pending_ttl_ms: PENDING_TTL_MS,
            history_cap: HISTORY_CAP,
            sweep_interval_ms: 5 * 60 * 1000,
            field_poll_ms: 100,
            field_wait_budget_ms: 15_000,
            field_settle_ms: 300,
            field_clear_ms: 50,
            submit_settle_ms: 300,
            share_settle_ms: 500,
            tab_settle_ms: 300,
            button_poll_ms: 1000,
            button_idle_cutoff_ms: 60_000.0,
            destination_url: DESTINATION_URL.to_string(),
            source_label: SOURCE_LABEL.to_string(),
        }
    }
}

impl RelayConfig {
    /// Sweep interval in the unit `chrome.alarms` takes
    pub fn sweep_period_minutes(&self) -> f64 {
        f64::from(self.sweep_interval_ms) / 60_000.0
    }
}

/// User settings persisted under the `settings` key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub auto_analyse: bool,
    pub show_notifications: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            auto_analyse: true,
            show_notifications: true,
        }
    }
}
