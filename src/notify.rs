/// Transient on-page notifications
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

impl NoticeKind {
    fn color(&self) -> &'static str {
        match self {
            NoticeKind::Success => "#629924",
            NoticeKind::Error => "#cc3333",
            NoticeKind::Info => "#3893e8",
        }
    }

    fn class(&self) -> &'static str {
        match self {
            NoticeKind::Success => "success",
            NoticeKind::Error => "error",
            NoticeKind::Info => "info",
        }
    }
}

pub trait Notifier {
    fn notify(&self, message: &str, kind: NoticeKind);
}

/// Swallows notices when the user turned notifications off
pub struct Quiet<'a, N: Notifier + ?Sized> {
    pub inner: &'a N,
    pub enabled: bool,
}

impl<N: Notifier + ?Sized> Notifier for Quiet<'_, N> {
    fn notify(&self, message: &str, kind: NoticeKind) {
        if self.enabled {
            self.inner.notify(message, kind);
        } else {
            log::debug!("Notification suppressed: {}", message);
        }
    }
}

const TOAST_CLASS: &str = "pgn-relay-notification";
const TOAST_LIFETIME_MS: i32 = 5000;

/// Fixed-position toast injected into the host page
pub struct ToastNotifier {
    document: web_sys::Document,
}

impl ToastNotifier {
    pub fn new(document: web_sys::Document) -> Self {
        ToastNotifier { document }
    }

    fn show(&self, message: &str, kind: NoticeKind) -> Result<(), JsValue> {
        if let Some(existing) = self.document.query_selector(&format!(".{}", TOAST_CLASS))? {
            existing.remove();
        }

        let toast = self
            .document
            .create_element("div")?
            .dyn_into::<web_sys::HtmlElement>()?;
        toast.set_class_name(&format!("{} {}", TOAST_CLASS, kind.class()));
        toast.set_text_content(Some(message));

        let style = toast.style();
        for (property, value) in [
            ("position", "fixed"),
            ("top", "60px"),
            ("left", "50%"),
            ("transform", "translateX(-50%)"),
            ("padding", "12px 24px"),
            ("border-radius", "4px"),
            ("background-color", kind.color()),
            ("color", "white"),
            ("font-family", "system-ui, -apple-system, sans-serif"),
            ("font-size", "14px"),
            ("font-weight", "500"),
            ("box-shadow", "0 4px 12px rgba(0,0,0,0.3)"),
            ("z-index", "999999"),
        ] {
            style.set_property(property, value)?;
        }

        let body = self
            .document
            .body()
            .ok_or_else(|| JsValue::from_str("document has no body"))?;
        body.append_child(&toast)?;

        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let dismiss = Closure::once_into_js(move || toast.remove());
        window.set_timeout_with_callback_and_timeout_and_arguments_0(
            dismiss.unchecked_ref(),
            TOAST_LIFETIME_MS,
        )?;
        Ok(())
    }
}

impl Notifier for ToastNotifier {
    fn notify(&self, message: &str, kind: NoticeKind) {
        if let Err(e) = self.show(message, kind) {
            log::warn!("Could not show notification {:?}: {:?}", message, e);
        }
    }
}
