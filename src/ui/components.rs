/// Reusable UI components
use crate::history::HistoryEntry;
use crate::manager::{NAME_DISPLAY_LIMIT, describe_date, result_label, truncate_name};
use crate::notify::NoticeKind;
use crate::wait::BrowserTimer;
use patternfly_yew::prelude::*;
use yew::prelude::*;

#[derive(Properties, PartialEq)]
pub struct HistoryItemProps {
    pub entry: HistoryEntry,
    pub now_ms: f64,
    pub on_analyse: Callback<HistoryEntry>,
    pub on_copy: Callback<HistoryEntry>,
    pub on_delete: Callback<u64>,
}

#[function_component(HistoryItem)]
pub fn history_item(props: &HistoryItemProps) -> Html {
    let entry = &props.entry;
    let created_ms = js_sys::Date::parse(&entry.created_at);
    let date = if created_ms.is_nan() {
        entry.created_at.clone()
    } else {
        describe_date(&BrowserTimer, props.now_ms, created_ms)
    };

    let on_analyse = {
        let entry = entry.clone();
        let callback = props.on_analyse.clone();
        Callback::from(move |_| callback.emit(entry.clone()))
    };
    let on_copy = {
        let entry = entry.clone();
        let callback = props.on_copy.clone();
        Callback::from(move |_| callback.emit(entry.clone()))
    };
    let on_delete = {
        let id = entry.id;
        let callback = props.on_delete.clone();
        Callback::from(move |_| callback.emit(id))
    };

    html! {
        <div class="history-item" data-id={entry.id.to_string()}>
            <div class="players">
                <span class="white-player">{truncate_name(&entry.players.white, NAME_DISPLAY_LIMIT)}</span>
                <span class="versus">{" vs "}</span>
                <span class="black-player">{truncate_name(&entry.players.black, NAME_DISPLAY_LIMIT)}</span>
            </div>
            <div class="meta">
                <span class="result">{result_label(entry.result)}</span>
                <span class="date" title={entry.event.clone()}>{date}</span>
            </div>
            <div class="actions">
                <Button onclick={on_analyse} variant={ButtonVariant::Primary}>{"Analyse"}</Button>
                <Button onclick={on_copy} variant={ButtonVariant::Secondary}>{"Copy"}</Button>
                <Button onclick={on_delete} variant={ButtonVariant::Plain}>{"✕"}</Button>
            </div>
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct ToastProps {
    pub message: String,
    #[prop_or(NoticeKind::Info)]
    pub kind: NoticeKind,
}

#[function_component(Toast)]
pub fn toast(props: &ToastProps) -> Html {
    let class = match props.kind {
        NoticeKind::Success => "toast success",
        NoticeKind::Error => "toast error",
        NoticeKind::Info => "toast info",
    };

    html! {
        <div class={class}>{&props.message}</div>
    }
}

#[derive(Properties, PartialEq)]
pub struct SettingToggleProps {
    pub id: AttrValue,
    pub label: AttrValue,
    pub checked: bool,
    pub onchange: Callback<bool>,
}

#[function_component(SettingToggle)]
pub fn setting_toggle(props: &SettingToggleProps) -> Html {
    let onchange = {
        let callback = props.onchange.clone();
        Callback::from(move |event: Event| {
            let input: web_sys::HtmlInputElement = event.target_unchecked_into();
            callback.emit(input.checked());
        })
    };

    html! {
        <div class="pf-v5-c-check setting-toggle">
            <input
                class="pf-v5-c-check__input"
                type="checkbox"
                id={props.id.clone()}
                checked={props.checked}
                {onchange}
            />
            <label class="pf-v5-c-check__label" for={props.id.clone()}>{props.label.clone()}</label>
        </div>
    }
}
