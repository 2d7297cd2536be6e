/// Popup UI: game history and settings
use crate::chrome::RuntimeChannel;
use crate::config::Settings;
use crate::history::HistoryEntry;
use crate::manager::{BrowserClipboard, HistoryManager};
use crate::messages::RelayChannel;
use crate::notify::NoticeKind;
use crate::ui::components::{HistoryItem, SettingToggle, Toast};
use crate::wait::{BrowserTimer, Timer};
use patternfly_yew::prelude::*;
use std::rc::Rc;
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

type PopupManager = HistoryManager<RuntimeChannel, BrowserClipboard>;

const TOAST_MS: u32 = 2500;

#[derive(Clone, PartialEq)]
enum AppState {
    Loading,
    Ready,
    Error(String),
}

#[derive(Clone, PartialEq)]
enum ActiveTab {
    History,
    Settings,
}

#[function_component(App)]
pub fn app() -> Html {
    let manager = use_memo((), |_| {
        HistoryManager::new(Rc::new(RuntimeChannel), Rc::new(BrowserClipboard))
    });
    let state = use_state(|| AppState::Loading);
    let history = use_state(Vec::<HistoryEntry>::new);
    let settings = use_state(Settings::default);
    let toast = use_state(|| None::<(String, NoticeKind)>);
    let active_tab = use_state(|| ActiveTab::History);
    let now_ms = use_state(js_sys::Date::now);

    let show_toast = {
        let toast = toast.clone();
        Callback::from(move |(message, kind): (String, NoticeKind)| {
            toast.set(Some((message, kind)));
            let toast = toast.clone();
            spawn_local(async move {
                BrowserTimer.sleep(TOAST_MS).await;
                toast.set(None);
            });
        })
    };

    let reload = {
        let manager = manager.clone();
        let state = state.clone();
        let history = history.clone();
        let now_ms = now_ms.clone();
        Callback::from(move |_: ()| {
            let manager: PopupManager = (*manager).clone();
            let state = state.clone();
            let history = history.clone();
            let now_ms = now_ms.clone();
            spawn_local(async move {
                match manager.list().await {
                    Ok(entries) => {
                        now_ms.set(js_sys::Date::now());
                        history.set(entries);
                        state.set(AppState::Ready);
                    }
                    Err(e) => {
                        log::warn!("History loading error: {}", e);
                        state.set(AppState::Error(format!("Loading error: {}", e)));
                    }
                }
            });
        })
    };

    // Load history and settings on mount
    {
        let reload = reload.clone();
        let settings = settings.clone();
        use_effect_with((), move |_| {
            reload.emit(());
            spawn_local(async move {
                match RuntimeChannel.settings().await {
                    Ok(loaded) => settings.set(loaded),
                    Err(e) => log::warn!("Using default settings: {}", e),
                }
            });
            || ()
        });
    }

    let on_analyse = {
        let manager = manager.clone();
        let show_toast = show_toast.clone();
        Callback::from(move |entry: HistoryEntry| {
            let manager: PopupManager = (*manager).clone();
            let show_toast = show_toast.clone();
            spawn_local(async move {
                match manager.re_export(&entry).await {
                    Ok(()) => show_toast.emit(("Opening Lichess...".to_string(), NoticeKind::Success)),
                    Err(e) => show_toast.emit((format!("Error: {}", e), NoticeKind::Error)),
                }
            });
        })
    };

    let on_copy = {
        let manager = manager.clone();
        let show_toast = show_toast.clone();
        Callback::from(move |entry: HistoryEntry| {
            let manager: PopupManager = (*manager).clone();
            let show_toast = show_toast.clone();
            spawn_local(async move {
                match manager.copy(&entry).await {
                    Ok(()) => show_toast.emit(("PGN copied!".to_string(), NoticeKind::Success)),
                    Err(e) => {
                        log::warn!("Copy error: {}", e);
                        show_toast.emit(("Copy error".to_string(), NoticeKind::Error));
                    }
                }
            });
        })
    };

    let on_delete = {
        let manager = manager.clone();
        let show_toast = show_toast.clone();
        let reload = reload.clone();
        Callback::from(move |id: u64| {
            let manager: PopupManager = (*manager).clone();
            let show_toast = show_toast.clone();
            let reload = reload.clone();
            spawn_local(async move {
                match manager.delete(id).await {
                    Ok(()) => show_toast.emit(("Game deleted".to_string(), NoticeKind::Success)),
                    Err(e) => show_toast.emit((format!("Error: {}", e), NoticeKind::Error)),
                }
                reload.emit(());
            });
        })
    };

    let on_clear = {
        let manager = manager.clone();
        let show_toast = show_toast.clone();
        let reload = reload.clone();
        Callback::from(move |_| {
            let confirmed = web_sys::window()
                .and_then(|window| {
                    window
                        .confirm_with_message("Do you really want to clear all history?")
                        .ok()
                })
                .unwrap_or(false);
            if !confirmed {
                return;
            }
            let manager: PopupManager = (*manager).clone();
            let show_toast = show_toast.clone();
            let reload = reload.clone();
            spawn_local(async move {
                match manager.clear().await {
                    Ok(()) => show_toast.emit(("History cleared".to_string(), NoticeKind::Success)),
                    Err(e) => show_toast.emit((format!("Error: {}", e), NoticeKind::Error)),
                }
                reload.emit(());
            });
        })
    };

    let save_settings = {
        let settings = settings.clone();
        let show_toast = show_toast.clone();
        move |update: fn(&mut Settings, bool)| {
            let settings = settings.clone();
            let show_toast = show_toast.clone();
            Callback::from(move |value: bool| {
                let mut next = *settings;
                update(&mut next, value);
                settings.set(next);
                let show_toast = show_toast.clone();
                spawn_local(async move {
                    if let Err(e) = RuntimeChannel.save_settings(next).await {
                        show_toast.emit((format!("Error: {}", e), NoticeKind::Error));
                    }
                });
            })
        }
    };
    let on_auto_analyse = save_settings(|settings, value| settings.auto_analyse = value);
    let on_show_notifications = save_settings(|settings, value| settings.show_notifications = value);

    let on_tab_click = {
        let active_tab = active_tab.clone();
        move |tab: ActiveTab| {
            let active_tab = active_tab.clone();
            Callback::from(move |_| {
                active_tab.set(tab.clone());
            })
        }
    };

    let tab_class = |tab: ActiveTab| {
        if *active_tab == tab {
            "pf-v5-c-tabs__item pf-m-current"
        } else {
            "pf-v5-c-tabs__item"
        }
    };

    html! {
        <div class="padding-20">
            <h1 class="popup-title">{"PGN Relay"}</h1>

            <div class="pf-v5-c-tabs tabs-nav">
                <ul class="pf-v5-c-tabs__list">
                    <li class={tab_class(ActiveTab::History)}>
                        <button class="pf-v5-c-tabs__link" onclick={on_tab_click(ActiveTab::History)}>
                            <span class="pf-v5-c-tabs__item-text">{"History"}</span>
                        </button>
                    </li>
                    <li class={tab_class(ActiveTab::Settings)}>
                        <button class="pf-v5-c-tabs__link" onclick={on_tab_click(ActiveTab::Settings)}>
                            <span class="pf-v5-c-tabs__item-text">{"Settings"}</span>
                        </button>
                    </li>
                </ul>
            </div>

            <div class="tab-pane-content">
                {match &*active_tab {
                    ActiveTab::History => match &*state {
                        AppState::Loading => html! {
                            <div class="loading-text-center">
                                <Spinner />
                            </div>
                        },
                        AppState::Error(err) => html! {
                            <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                                {err.clone()}
                            </Alert>
                        },
                        AppState::Ready if history.is_empty() => html! {
                            <div class="empty-state">
                                <p>{"No games yet."}</p>
                                <p class="hint">{"Use \"Analyze on Lichess\" on a finished Chess.com game."}</p>
                            </div>
                        },
                        AppState::Ready => html! {
                            <div class="flex-column-gap">
                                <div class="history-list">
                                    {for history.iter().map(|entry| html! {
                                        <HistoryItem
                                            key={entry.id.to_string()}
                                            entry={entry.clone()}
                                            now_ms={*now_ms}
                                            on_analyse={on_analyse.clone()}
                                            on_copy={on_copy.clone()}
                                            on_delete={on_delete.clone()}
                                        />
                                    })}
                                </div>
                                <Button onclick={on_clear} variant={ButtonVariant::Danger} block={true}>
                                    {"Clear history"}
                                </Button>
                            </div>
                        },
                    },
                    ActiveTab::Settings => html! {
                        <div class="flex-column-gap">
                            <SettingToggle
                                id="auto-analyse"
                                label="Start analysis automatically"
                                checked={settings.auto_analyse}
                                onchange={on_auto_analyse}
                            />
                            <SettingToggle
                                id="show-notifications"
                                label="Show notifications"
                                checked={settings.show_notifications}
                                onchange={on_show_notifications}
                            />
                        </div>
                    },
                }}
            </div>

            if let Some((message, kind)) = (*toast).clone() {
                <Toast {message} {kind} />
            }

            <p class="footer-popup">
                {concat!("PGN Relay v", env!("CARGO_PKG_VERSION"))}
            </p>
        </div>
    }
}
