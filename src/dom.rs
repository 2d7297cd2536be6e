/// `Page` over the live document
use crate::locate::{DomEvent, Page, PageNode};
use wasm_bindgen::JsCast;
use web_sys::{
    Document, Element, Event, EventInit, HtmlElement, HtmlInputElement, HtmlTextAreaElement,
    KeyboardEvent, KeyboardEventInit,
};

#[derive(Debug, Clone)]
pub struct DomNode(Element);

impl DomNode {
    pub fn element(&self) -> &Element {
        &self.0
    }

    fn fire(&self, event: DomEvent) -> Result<bool, wasm_bindgen::JsValue> {
        let event: Event = match event {
            DomEvent::KeyUp => {
                let init = KeyboardEventInit::new();
                init.set_bubbles(true);
                KeyboardEvent::new_with_keyboard_event_init_dict(event.name(), &init)?.into()
            }
            DomEvent::Input | DomEvent::Change => {
                let init = EventInit::new();
                init.set_bubbles(true);
                init.set_cancelable(true);
                Event::new_with_event_init_dict(event.name(), &init)?
            }
        };
        self.0.dispatch_event(&event)
    }
}

impl PageNode for DomNode {
    fn text(&self) -> String {
        self.0.text_content().unwrap_or_default()
    }

    fn value(&self) -> Option<String> {
        if let Some(area) = self.0.dyn_ref::<HtmlTextAreaElement>() {
            Some(area.value())
        } else {
            self.0.dyn_ref::<HtmlInputElement>().map(|input| input.value())
        }
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.0.get_attribute(name)
    }

    fn is_checked(&self) -> bool {
        self.0
            .dyn_ref::<HtmlInputElement>()
            .is_some_and(|input| input.checked())
    }

    fn click(&self) {
        match self.0.dyn_ref::<HtmlElement>() {
            Some(element) => element.click(),
            None => log::warn!("Cannot click <{}>", self.0.tag_name()),
        }
    }

    fn focus(&self) {
        if let Some(element) = self.0.dyn_ref::<HtmlElement>() {
            if let Err(e) = element.focus() {
                log::debug!("Focus failed: {:?}", e);
            }
        }
    }

    fn set_value(&self, value: &str) {
        if let Some(area) = self.0.dyn_ref::<HtmlTextAreaElement>() {
            area.set_value(value);
        } else if let Some(input) = self.0.dyn_ref::<HtmlInputElement>() {
            input.set_value(value);
        } else {
            log::warn!("<{}> has no value to set", self.0.tag_name());
        }
    }

    fn dispatch(&self, event: DomEvent) {
        if let Err(e) = self.fire(event) {
            log::warn!("Could not dispatch {}: {:?}", event.name(), e);
        }
    }
}

#[derive(Debug, Clone)]
pub struct DomPage {
    document: Document,
}

impl DomPage {
    pub fn new(document: Document) -> Self {
        DomPage { document }
    }

    /// The page this script runs in, if it has a document
    pub fn current() -> Option<Self> {
        web_sys::window()?.document().map(DomPage::new)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

impl Page for DomPage {
    type Node = DomNode;

    fn query_all(&self, selector: &str) -> Vec<DomNode> {
        let list = match self.document.query_selector_all(selector) {
            Ok(list) => list,
            Err(e) => {
                log::debug!("Selector {:?} rejected: {:?}", selector, e);
                return Vec::new();
            }
        };
        (0..list.length())
            .filter_map(|i| list.get(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .map(DomNode)
            .collect()
    }

    fn url(&self) -> String {
        self.document
            .location()
            .and_then(|location| location.href().ok())
            .unwrap_or_default()
    }
}
