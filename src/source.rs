/// Source side: the floating "Analyze on Lichess" button on chess.com
use crate::chrome::RuntimeChannel;
use crate::config::{RelayConfig, Settings};
use crate::dom::DomPage;
use crate::error::RelayError;
use crate::extractor::{export_current_game, probe_pgn};
use crate::locate::Page;
use crate::messages::RelayChannel;
use crate::notify::{NoticeKind, Notifier, Quiet, ToastNotifier};
use crate::wait::{BrowserTimer, Cancellation, Timer};
use std::rc::Rc;
use url::Url;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{HtmlButtonElement, MutationObserver, MutationObserverInit};

/// Anything matching these means the game is over and shareable
const GAME_OVER_INDICATORS: &[&str] = &[
    ".game-over-modal",
    ".game-over-modal-content",
    ".game-over-buttons",
    ".game-review-buttons",
    "[class*=\"game-over\"]",
    ".share-menu-component",
];

const BUTTON_ID: &str = "pgn-relay-export-button";
const BUTTON_LABEL: &str = "Analyze on Lichess";
const FEEDBACK_MS: u32 = 2000;

/// Whether the page currently has a game worth exporting
pub fn should_offer_export<P: Page>(page: &P) -> bool {
    let href = page.url();
    let path = Url::parse(&href)
        .map(|url| url.path().to_string())
        .unwrap_or(href);

    if path.contains("/game/") {
        if GAME_OVER_INDICATORS.iter().any(|selector| page.exists(selector)) {
            return true;
        }
        if probe_pgn(page).is_some() {
            return true;
        }
    }

    path.contains("/analysis/")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    Show,
    Hide,
    Keep,
}

pub fn plan(present: bool, wanted: bool) -> ButtonAction {
    match (present, wanted) {
        (false, true) => ButtonAction::Show,
        (true, false) => ButtonAction::Hide,
        _ => ButtonAction::Keep,
    }
}

/// Tracks how long the backup poll has gone without seeing a change
#[derive(Debug, Clone, Copy)]
pub struct IdlePoll {
    last_change_ms: f64,
    cutoff_ms: f64,
}

impl IdlePoll {
    pub fn new(now_ms: f64, cutoff_ms: f64) -> Self {
        IdlePoll {
            last_change_ms: now_ms,
            cutoff_ms,
        }
    }

    pub fn touch(&mut self, now_ms: f64) {
        self.last_change_ms = now_ms;
    }

    pub fn is_exhausted(&self, now_ms: f64) -> bool {
        now_ms - self.last_change_ms >= self.cutoff_ms
    }
}

/// Re-run `tick` every `interval_ms` until it has reported no change for
/// `idle_cutoff_ms`, or the page goes away. Returns the number of ticks.
pub async fn run_backup_poll<T, F>(
    timer: &T,
    cancel: &Cancellation,
    interval_ms: u32,
    idle_cutoff_ms: f64,
    mut tick: F,
) -> u32
where
    T: Timer + ?Sized,
    F: FnMut() -> bool,
{
    let mut idle = IdlePoll::new(timer.now_ms(), idle_cutoff_ms);
    let mut ticks = 0;
    loop {
        timer.sleep(interval_ms).await;
        if cancel.is_cancelled() {
            return ticks;
        }
        ticks += 1;
        let now = timer.now_ms();
        if tick() {
            idle.touch(now);
        }
        if idle.is_exhausted(now) {
            log::debug!("Backup poll stopped after {} ticks", ticks);
            return ticks;
        }
    }
}

/// The button as it lives in the chess.com document
pub struct ExportButton {
    page: DomPage,
    config: Rc<RelayConfig>,
    cancel: Cancellation,
}

impl ExportButton {
    pub fn new(page: DomPage, config: Rc<RelayConfig>, cancel: Cancellation) -> Rc<Self> {
        Rc::new(ExportButton { page, config, cancel })
    }

    fn element(&self) -> Option<HtmlButtonElement> {
        self.page
            .document()
            .get_element_by_id(BUTTON_ID)
            .and_then(|element| element.dyn_into::<HtmlButtonElement>().ok())
    }

    /// Show or hide the button to match the page. Returns whether anything changed.
    pub fn reconcile(self: &Rc<Self>) -> bool {
        match plan(self.element().is_some(), should_offer_export(&self.page)) {
            ButtonAction::Show => match self.create() {
                Ok(()) => {
                    log::info!("Export button created");
                    true
                }
                Err(e) => {
                    log::warn!("Could not create export button: {:?}", e);
                    false
                }
            },
            ButtonAction::Hide => {
                if let Some(button) = self.element() {
                    button.remove();
                    log::info!("Export button removed");
                }
                true
            }
            ButtonAction::Keep => false,
        }
    }

    fn create(self: &Rc<Self>) -> Result<(), JsValue> {
        let document = self.page.document();
        let button = document
            .create_element("button")?
            .dyn_into::<HtmlButtonElement>()?;
        button.set_id(BUTTON_ID);
        button.set_text_content(Some(BUTTON_LABEL));

        let style = button.style();
        for (property, value) in [
            ("position", "fixed"),
            ("bottom", "24px"),
            ("right", "24px"),
            ("padding", "10px 18px"),
            ("border", "none"),
            ("border-radius", "6px"),
            ("background-color", "#629924"),
            ("color", "white"),
            ("font-family", "system-ui, -apple-system, sans-serif"),
            ("font-size", "14px"),
            ("font-weight", "600"),
            ("cursor", "pointer"),
            ("box-shadow", "0 4px 12px rgba(0,0,0,0.3)"),
            ("z-index", "999999"),
        ] {
            style.set_property(property, value)?;
        }

        let this = Rc::clone(self);
        let on_click = Closure::<dyn FnMut(web_sys::Event)>::new(move |event: web_sys::Event| {
            event.prevent_default();
            event.stop_immediate_propagation();
            this.export();
        });
        // Capture phase so the host page's handlers never see the click
        button.add_event_listener_with_callback_and_bool(
            "click",
            on_click.as_ref().unchecked_ref(),
            true,
        )?;
        on_click.forget();

        document
            .body()
            .ok_or_else(|| JsValue::from_str("document has no body"))?
            .append_child(&button)?;
        Ok(())
    }

    fn export(self: &Rc<Self>) {
        let Some(button) = self.element() else {
            return;
        };
        if button.disabled() {
            return;
        }
        button.set_disabled(true);
        button.set_text_content(Some("Extracting..."));

        let this = Rc::clone(self);
        spawn_local(async move {
            let timer = BrowserTimer;
            let result =
                export_current_game(&this.page, &timer, &this.cancel, &RuntimeChannel, &this.config).await;

            let label = match &result {
                Ok(entry) => {
                    log::info!("Exported game {}", entry.id);
                    "✓ Exported!"
                }
                Err(RelayError::Cancelled) => return,
                Err(e) => {
                    log::warn!("Export failed: {}", e);
                    let notifier = ToastNotifier::new(this.page.document().clone());
                    report_export_error(&RuntimeChannel, &notifier, e).await;
                    "✗ Error"
                }
            };
            button.set_text_content(Some(label));

            timer.sleep(FEEDBACK_MS).await;
            button.set_text_content(Some(BUTTON_LABEL));
            button.set_disabled(false);
        });
    }
}

/// Toast a failed export unless the user turned notifications off
pub async fn report_export_error<C, N>(channel: &C, notifier: &N, error: &RelayError)
where
    C: RelayChannel + ?Sized,
    N: Notifier + ?Sized,
{
    let settings = channel.settings().await.unwrap_or_else(|e| {
        log::debug!("Using default settings: {}", e);
        Settings::default()
    });
    let notifier = Quiet {
        inner: notifier,
        enabled: settings.show_notifications,
    };
    notifier.notify(&format!("Error: {}", error), NoticeKind::Error);
}

/// Wire the button to DOM mutations and to the bounded backup poll
pub fn watch(button: Rc<ExportButton>) -> Result<MutationObserver, JsValue> {
    button.reconcile();

    let observed = Rc::clone(&button);
    let on_mutation = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
        move |_records: js_sys::Array, _observer: MutationObserver| {
            observed.reconcile();
        },
    );
    let observer = MutationObserver::new(on_mutation.as_ref().unchecked_ref())?;
    on_mutation.forget();

    let init = MutationObserverInit::new();
    init.set_child_list(true);
    init.set_subtree(true);
    init.set_attributes(true);
    let filter = js_sys::Array::of2(&JsValue::from_str("class"), &JsValue::from_str("style"));
    init.set_attribute_filter(&filter);

    let body = button
        .page
        .document()
        .body()
        .ok_or_else(|| JsValue::from_str("document has no body"))?;
    observer.observe_with_options(&body, &init)?;

    let polled = Rc::clone(&button);
    spawn_local(async move {
        let interval = polled.config.button_poll_ms;
        let cutoff = polled.config.button_idle_cutoff_ms;
        let cancel = polled.cancel.clone();
        run_backup_poll(&BrowserTimer, &cancel, interval, cutoff, || polled.reconcile()).await;
    });

    Ok(observer)
}
