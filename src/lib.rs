/// PGN Relay - sends finished Chess.com games to Lichess analysis
/// Built with Rust + WASM + Yew

pub mod chrome;
pub mod config;
pub mod coordinator;
pub mod dom;
pub mod error;
pub mod extractor;
pub mod history;
pub mod injector;
pub mod locate;
pub mod manager;
pub mod messages;
pub mod notify;
pub mod pgn;
pub mod source;
pub mod store;
pub mod ui;
pub mod wait;

#[cfg(test)]
mod testing;

use crate::chrome::{ChromeStorage, ChromeTabs, RuntimeChannel};
use crate::config::RelayConfig;
use crate::coordinator::{Coordinator, SWEEP_ALARM};
use crate::dom::DomPage;
use crate::error::RelayError;
use crate::injector::Injector;
use crate::messages::Reply;
use crate::notify::ToastNotifier;
use crate::source::ExportButton;
use crate::store::RelayStore;
use crate::wait::{BrowserTimer, Cancellation};
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Start the Yew app for the popup
#[wasm_bindgen]
pub fn start_popup() {
    yew::Renderer::<ui::popup::App>::new().render();
}

type BackgroundCoordinator = Coordinator<ChromeStorage, BrowserTimer, ChromeTabs>;

thread_local! {
    static COORDINATOR: Rc<BackgroundCoordinator> =
        Rc::new(Coordinator::new(RelayStore::new(ChromeStorage, BrowserTimer, RelayConfig::default()), ChromeTabs));
}

fn coordinator() -> Rc<BackgroundCoordinator> {
    COORDINATOR.with(Rc::clone)
}

/// Background service worker: runs once the wasm module is loaded on each wake
#[wasm_bindgen]
pub fn start_background() {
    let coordinator = coordinator();
    spawn_local(async move {
        let minutes = coordinator.store().config().sweep_period_minutes();
        if let Err(e) = chrome::schedule_alarm(SWEEP_ALARM, minutes).await {
            log::warn!("Pending sweep not scheduled: {}", e);
        }
    });
    log::info!("Background coordinator started");
}

/// `runtime.onMessage` endpoint, resolves to the serialized [`messages::Reply`]
#[wasm_bindgen]
pub fn handle_message(message: JsValue) -> js_sys::Promise {
    let coordinator = coordinator();
    future_to_promise(async move {
        let reply = match chrome::from_js::<serde_json::Value>(message) {
            Ok(value) => coordinator.handle_value(value).await,
            Err(e) => Reply::failure(RelayError::Channel(format!("Malformed request: {}", e))),
        };
        chrome::to_js(&reply).map_err(JsValue::from)
    })
}

/// `runtime.onInstalled` endpoint
#[wasm_bindgen]
pub fn handle_install(reason: String) -> js_sys::Promise {
    let coordinator = coordinator();
    future_to_promise(async move {
        if let Err(e) = coordinator.on_install_reason(&reason).await {
            log::warn!("Could not seed storage: {}", e);
        }
        Ok(JsValue::UNDEFINED)
    })
}

/// `alarms.onAlarm` endpoint
#[wasm_bindgen]
pub fn handle_alarm(name: String) -> js_sys::Promise {
    let coordinator = coordinator();
    future_to_promise(async move {
        if let Some(outcome) = coordinator.on_alarm(&name).await {
            log::debug!("Sweep finished: {:?}", outcome);
        }
        Ok(JsValue::UNDEFINED)
    })
}

/// Content script for chess.com
#[wasm_bindgen]
pub fn start_source_page() {
    let Some(page) = DomPage::current() else {
        log::warn!("No document, export button disabled");
        return;
    };
    let cancel = cancel_on_pagehide();
    let button = ExportButton::new(page, Rc::new(RelayConfig::default()), cancel);
    if let Err(e) = source::watch(button) {
        log::warn!("Could not watch the page: {:?}", e);
    }
    log::info!("Export button watcher started");
}

/// Content script for lichess.org/paste
#[wasm_bindgen]
pub fn start_destination_page() {
    let Some(page) = DomPage::current() else {
        log::warn!("No document, nothing to import into");
        return;
    };
    let cancel = cancel_on_pagehide();
    let notifier = ToastNotifier::new(page.document().clone());

    spawn_local(async move {
        let config = RelayConfig::default();
        let injector = Injector::new(&page, &BrowserTimer, &RuntimeChannel, &cancel, &config);
        match injector.run_and_report(&notifier).await {
            Ok(outcome) => log::info!("Import finished: {:?}", outcome),
            Err(e) => log::warn!("Import failed: {}", e),
        }
    });
}

/// A cancellation raised when the page is unloaded or put in the back-forward cache
fn cancel_on_pagehide() -> Cancellation {
    let cancel = Cancellation::new();
    let Some(window) = web_sys::window() else {
        return cancel;
    };

    let hook = cancel.clone();
    let on_pagehide = Closure::<dyn FnMut(web_sys::Event)>::new(move |_: web_sys::Event| {
        hook.cancel();
    });
    if let Err(e) = window.add_event_listener_with_callback("pagehide", on_pagehide.as_ref().unchecked_ref()) {
        log::debug!("pagehide listener not installed: {:?}", e);
    }
    on_pagehide.forget();
    cancel
}
