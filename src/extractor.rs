/// PGN extraction from the origin site's game pages
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::history::HistoryEntry;
use crate::locate::{Locator, Page, PageNode, locate, locate_map, readable_text};
use crate::messages::RelayChannel;
use crate::pgn::{looks_like_full_pgn, looks_like_pgn, normalize};
use crate::wait::{Cancellation, Timer, settle};

/// Places the share dialog keeps its PGN text, best first
pub const PGN_LOCATORS: &[Locator] = &[
    Locator::Css("textarea.share-menu-tab-pgn-textarea"),
    Locator::Css("textarea[name=\"pgn\"]"),
    Locator::Css("textarea[aria-label=\"PGN\"]"),
    Locator::Css(".share-menu-tab-pgn-textarea"),
    Locator::Css("textarea.cc-textarea-component"),
];

/// Last resort: any text area on the page
const ANY_TEXTAREA: &[Locator] = &[Locator::Css("textarea")];

pub const SHARE_LOCATORS: &[Locator] = &[
    Locator::Text {
        selector: "button",
        needles: &["share", "partager"],
        ignore_case: true,
    },
    Locator::Css(".share-game-button"),
    Locator::Css("[data-cy=\"share-button\"]"),
    Locator::Css("button[aria-label*=\"Share\"]"),
    Locator::Css("button[aria-label*=\"Partager\"]"),
    Locator::Css(".game-over-share-button"),
    Locator::Css(".share-button-component"),
];

const TAB_SELECTOR: &str = "button, [role=\"tab\"], .share-menu-tab-selector-component";

pub const PGN_TAB_LOCATORS: &[Locator] = &[
    Locator::Text {
        selector: TAB_SELECTOR,
        needles: &["PGN"],
        ignore_case: false,
    },
    Locator::Attr {
        selector: TAB_SELECTOR,
        name: "data-tab",
        value: "pgn",
    },
    Locator::Css(".share-menu-tab-selector-component[data-tab=\"pgn\"]"),
    Locator::Css("[data-cy=\"share-tab-pgn\"]"),
    Locator::Css(".share-menu-tab-selector-pgn"),
];

/// Look for PGN text already present in the page
pub fn probe_pgn<P: Page>(page: &P) -> Option<String> {
    let found = locate_map(page, PGN_LOCATORS, |node| {
        Some(readable_text(node)).filter(|text| looks_like_pgn(text))
    })
    .or_else(|| {
        locate_map(page, ANY_TEXTAREA, |node| {
            // Live value or value attribute only; text areas echo chat and notes too
            node.value()
                .filter(|v| !v.is_empty())
                .or_else(|| node.attr("value"))
                .filter(|text| looks_like_full_pgn(text))
        })
    });
    found.map(|raw| normalize(&raw))
}

/// Walks the share dialog until a PGN shows up
pub struct PgnExtractor<'a, P, T: ?Sized> {
    page: &'a P,
    timer: &'a T,
    cancel: &'a Cancellation,
    config: &'a RelayConfig,
}

impl<'a, P: Page, T: Timer + ?Sized> PgnExtractor<'a, P, T> {
    pub fn new(page: &'a P, timer: &'a T, cancel: &'a Cancellation, config: &'a RelayConfig) -> Self {
        PgnExtractor {
            page,
            timer,
            cancel,
            config,
        }
    }

    pub async fn extract(&self) -> Result<String> {
        if let Some(pgn) = probe_pgn(self.page) {
            log::info!("PGN found directly");
            return Ok(pgn);
        }

        // The share menu may already be open on another tab
        if self.select_pgn_tab().await? {
            if let Some(pgn) = probe_pgn(self.page) {
                log::info!("PGN found after switching tab");
                return Ok(pgn);
            }
        }

        self.open_share_menu().await?;
        settle(self.timer, self.cancel, self.config.tab_settle_ms).await?;
        self.select_pgn_tab().await?;
        settle(self.timer, self.cancel, self.config.tab_settle_ms).await?;

        probe_pgn(self.page).ok_or(RelayError::ExtractionFailed)
    }

    async fn open_share_menu(&self) -> Result<bool> {
        match locate(self.page, SHARE_LOCATORS) {
            Some(button) => {
                log::debug!("Opening share menu");
                button.click();
                settle(self.timer, self.cancel, self.config.share_settle_ms).await?;
                Ok(true)
            }
            None => {
                log::debug!("Share button not found");
                Ok(false)
            }
        }
    }

    async fn select_pgn_tab(&self) -> Result<bool> {
        match locate(self.page, PGN_TAB_LOCATORS) {
            Some(tab) => {
                log::debug!("Selecting PGN tab");
                tab.click();
                settle(self.timer, self.cancel, self.config.tab_settle_ms).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Extract the current game, save it to history and hand it to the destination
pub async fn export_current_game<P, T, C>(
    page: &P,
    timer: &T,
    cancel: &Cancellation,
    channel: &C,
    config: &RelayConfig,
) -> Result<HistoryEntry>
where
    P: Page,
    T: Timer + ?Sized,
    C: RelayChannel + ?Sized,
{
    let pgn = PgnExtractor::new(page, timer, cancel, config).extract().await?;
    log::info!("PGN extracted, length: {}", pgn.len());

    let now = timer.now_ms();
    let entry = HistoryEntry::from_pgn(
        now as u64,
        timer.iso_string(now),
        pgn.clone(),
        &config.source_label,
        &page.url(),
    );

    channel.record_game(entry.clone()).await?;
    channel.open_destination(pgn).await?;
    Ok(entry)
}
