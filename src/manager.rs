/// Popup-side history management and its presentation helpers
use crate::error::{RelayError, Result};
use crate::history::HistoryEntry;
use crate::messages::RelayChannel;
use crate::pgn::{GameResult, UNKNOWN_PLAYER};
use crate::wait::Timer;
use async_trait::async_trait;
use std::rc::Rc;
use wasm_bindgen_futures::JsFuture;

pub const NAME_DISPLAY_LIMIT: usize = 15;

const MINUTE_MS: f64 = 60_000.0;
const HOUR_MS: f64 = 3_600_000.0;
const DAY_MS: f64 = 86_400_000.0;
const WEEK_MS: f64 = 7.0 * DAY_MS;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[async_trait(?Send)]
pub trait Clipboard {
    async fn write_text(&self, text: &str) -> Result<()>;
}

/// `navigator.clipboard`
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserClipboard;

#[async_trait(?Send)]
impl Clipboard for BrowserClipboard {
    async fn write_text(&self, text: &str) -> Result<()> {
        let window = web_sys::window().ok_or_else(|| RelayError::Channel("no window".to_string()))?;
        let promise = window.navigator().clipboard().write_text(text);
        JsFuture::from(promise)
            .await
            .map(|_| ())
            .map_err(|e| RelayError::Channel(format!("clipboard write failed: {:?}", e)))
    }
}

/// History operations as the popup sees them, all routed through the coordinator
pub struct HistoryManager<C: ?Sized, K: ?Sized> {
    channel: Rc<C>,
    clipboard: Rc<K>,
}

impl<C: ?Sized, K: ?Sized> Clone for HistoryManager<C, K> {
    fn clone(&self) -> Self {
        HistoryManager {
            channel: Rc::clone(&self.channel),
            clipboard: Rc::clone(&self.clipboard),
        }
    }
}

impl<C, K> HistoryManager<C, K>
where
    C: RelayChannel + ?Sized,
    K: Clipboard + ?Sized,
{
    pub fn new(channel: Rc<C>, clipboard: Rc<K>) -> Self {
        HistoryManager { channel, clipboard }
    }

    /// Newest first
    pub async fn list(&self) -> Result<Vec<HistoryEntry>> {
        self.channel.history().await
    }

    pub async fn delete(&self, id: u64) -> Result<()> {
        log::debug!("Deleting game {}", id);
        self.channel.delete_game(id).await
    }

    pub async fn clear(&self) -> Result<()> {
        log::info!("Clearing history");
        self.channel.clear_history().await
    }

    /// Send a stored game to the destination again
    pub async fn re_export(&self, entry: &HistoryEntry) -> Result<()> {
        log::info!("Re-exporting game {}", entry.id);
        self.channel.export_game(entry.payload.clone()).await
    }

    pub async fn copy(&self, entry: &HistoryEntry) -> Result<()> {
        self.clipboard.write_text(&entry.payload).await
    }
}

/// Shorten a player name for the list, `"Unknown"` when empty
pub fn truncate_name(name: &str, max: usize) -> String {
    let name = name.trim();
    if name.is_empty() {
        return UNKNOWN_PLAYER.to_string();
    }
    if name.chars().count() > max {
        let head: String = name.chars().take(max).collect();
        format!("{}...", head)
    } else {
        name.to_string()
    }
}

pub fn result_indicator(result: GameResult) -> Option<&'static str> {
    match result {
        GameResult::WhiteWins => Some("⚪"),
        GameResult::BlackWins => Some("⚫"),
        GameResult::Draw => Some("◐"),
        GameResult::Unfinished => None,
    }
}

/// Result text with its indicator in front, e.g. `"⚪ 1-0"`
pub fn result_label(result: GameResult) -> String {
    match result_indicator(result) {
        Some(indicator) => format!("{} {}", indicator, result.as_str()),
        None => result.as_str().to_string(),
    }
}

/// Relative age of a history entry, falling back to the local date (`"Mar 1"`) after a week
pub fn describe_date<T: Timer + ?Sized>(timer: &T, now_ms: f64, created_ms: f64) -> String {
    let age = (now_ms - created_ms).max(0.0);

    if age < HOUR_MS {
        let minutes = (age / MINUTE_MS).floor() as u64;
        return if minutes <= 1 {
            "Just now".to_string()
        } else {
            format!("{} min ago", minutes)
        };
    }
    if age < DAY_MS {
        return format!("{}h ago", (age / HOUR_MS).floor() as u64);
    }
    if age < WEEK_MS {
        let days = (age / DAY_MS).floor() as u64;
        return if days == 1 {
            "Yesterday".to_string()
        } else {
            format!("{}d ago", days)
        };
    }

    let (month, day) = timer.local_month_day(created_ms);
    match MONTHS.get(month.saturating_sub(1) as usize) {
        Some(name) => format!("{} {}", name, day),
        None => timer.iso_string(created_ms),
    }
}
