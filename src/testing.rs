/// In-memory stand-ins for the browser collaborators, used by unit tests
use crate::coordinator::Navigator;
use crate::error::{RelayError, Result};
use crate::history::HistoryEntry;
use crate::locate::{DomEvent, Page, PageNode};
use crate::manager::Clipboard;
use crate::notify::{NoticeKind, Notifier};
use crate::wait::Timer;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, Offset, SecondsFormat, Utc};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

pub fn sample_entry(id: u64) -> HistoryEntry {
    HistoryEntry::from_pgn(
        id,
        "2024-03-01T12:00:00.000Z".to_string(),
        format!("[Event \"Game {}\"]\n[White \"Alice\"]\n[Black \"Bob\"]\n[Result \"1-0\"]\n\n1. e4 1-0", id),
        "Chess.com",
        "https://www.chess.com/game/live/1",
    )
}

#[derive(Default)]
pub struct MemoryBackend {
    values: RefCell<HashMap<String, Value>>,
    fail_writes: Cell<bool>,
    fail_next_write: Cell<bool>,
    yield_on_write: Cell<bool>,
}

/// Returns `Pending` once so concurrent writers interleave under `join!`
struct YieldOnce(bool);

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            return Poll::Ready(());
        }
        self.0 = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.borrow().get(key).cloned()
    }

    pub fn put(&self, key: &str, value: Value) {
        self.values.borrow_mut().insert(key.to_string(), value);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Refuse only the next write
    pub fn fail_next_write(&self) {
        self.fail_next_write.set(true);
    }

    /// Suspend every write once before it lands
    pub fn yield_on_write(&self, enabled: bool) {
        self.yield_on_write.set(enabled);
    }

    async fn check_writable(&self) -> Result<()> {
        if self.yield_on_write.get() {
            YieldOnce(false).await;
        }
        if self.fail_writes.get() || self.fail_next_write.replace(false) {
            Err(RelayError::StorageUnavailable("write refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait(?Send)]
impl crate::store::StorageBackend for MemoryBackend {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.get(key))
    }

    async fn save(&self, key: &str, value: Value) -> Result<()> {
        self.check_writable().await?;
        self.put(key, value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check_writable().await?;
        self.values.borrow_mut().remove(key);
        Ok(())
    }
}

type Scheduled = (f64, Box<dyn FnOnce()>);

/// Clock that only moves when something sleeps or the test advances it
pub struct ManualTimer {
    now: Cell<f64>,
    utc_offset_secs: Cell<i32>,
    scheduled: RefCell<Vec<Scheduled>>,
}

impl ManualTimer {
    pub fn at(now: f64) -> Self {
        ManualTimer {
            now: Cell::new(now),
            utc_offset_secs: Cell::new(0),
            scheduled: RefCell::new(Vec::new()),
        }
    }

    /// Pretend the user's time zone is `hours` east of UTC
    pub fn with_utc_offset(self, hours: i32) -> Self {
        self.utc_offset_secs.set(hours * 3600);
        self
    }

    fn local(&self, ms: f64) -> DateTime<FixedOffset> {
        let offset = FixedOffset::east_opt(self.utc_offset_secs.get()).unwrap_or(Utc.fix());
        DateTime::from_timestamp_millis(ms as i64)
            .unwrap_or_default()
            .with_timezone(&offset)
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
        self.run_due();
    }

    /// Run `action` the first time the clock reaches `at`
    pub fn schedule(&self, at: f64, action: impl FnOnce() + 'static) {
        self.scheduled.borrow_mut().push((at, Box::new(action)));
    }

    fn run_due(&self) {
        let now = self.now.get();
        let due: Vec<Scheduled> = {
            let mut scheduled = self.scheduled.borrow_mut();
            let (due, later) = scheduled.drain(..).partition(|(at, _)| *at <= now);
            *scheduled = later;
            due
        };
        for (_, action) in due {
            action();
        }
    }
}

#[async_trait(?Send)]
impl Timer for ManualTimer {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }

    fn iso_string(&self, ms: f64) -> String {
        self.local(ms).with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn local_month_day(&self, ms: f64) -> (u32, u32) {
        let date = self.local(ms);
        (date.month(), date.day())
    }

    async fn sleep(&self, ms: u32) {
        self.advance(ms as f64);
    }
}

#[derive(Default)]
struct NodeState {
    text: String,
    value: Option<String>,
    attrs: HashMap<String, String>,
    checked: bool,
    clicks: usize,
    focused: bool,
    events: Vec<DomEvent>,
    writes: Vec<String>,
    on_click: Option<Rc<dyn Fn()>>,
}

#[derive(Clone, Default)]
pub struct FakeNode(Rc<RefCell<NodeState>>);

impl FakeNode {
    pub fn new() -> Self {
        FakeNode::default()
    }

    pub fn with_text(self, text: &str) -> Self {
        self.0.borrow_mut().text = text.to_string();
        self
    }

    pub fn with_value(self, value: &str) -> Self {
        self.0.borrow_mut().value = Some(value.to_string());
        self
    }

    pub fn with_attr(self, name: &str, value: &str) -> Self {
        self.0.borrow_mut().attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn checkbox(self, checked: bool) -> Self {
        self.0.borrow_mut().checked = checked;
        self.with_attr("type", "checkbox")
    }

    pub fn on_click(self, action: impl Fn() + 'static) -> Self {
        self.0.borrow_mut().on_click = Some(Rc::new(action));
        self
    }

    pub fn clicks(&self) -> usize {
        self.0.borrow().clicks
    }

    pub fn events(&self) -> Vec<DomEvent> {
        self.0.borrow().events.clone()
    }

    pub fn writes(&self) -> Vec<String> {
        self.0.borrow().writes.clone()
    }

    pub fn is_focused(&self) -> bool {
        self.0.borrow().focused
    }
}

impl PageNode for FakeNode {
    fn text(&self) -> String {
        self.0.borrow().text.clone()
    }

    fn value(&self) -> Option<String> {
        self.0.borrow().value.clone()
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.0.borrow().attrs.get(name).cloned()
    }

    fn is_checked(&self) -> bool {
        self.0.borrow().checked
    }

    fn click(&self) {
        let action = {
            let mut state = self.0.borrow_mut();
            state.clicks += 1;
            if state.attrs.get("type").map(String::as_str) == Some("checkbox") {
                state.checked = !state.checked;
            }
            state.on_click.clone()
        };
        if let Some(action) = action {
            action();
        }
    }

    fn focus(&self) {
        self.0.borrow_mut().focused = true;
    }

    fn set_value(&self, value: &str) {
        let mut state = self.0.borrow_mut();
        state.value = Some(value.to_string());
        state.writes.push(value.to_string());
    }

    fn dispatch(&self, event: DomEvent) {
        self.0.borrow_mut().events.push(event);
    }
}

/// Page whose "selectors" are plain keys; a node answers every key it was added under
#[derive(Clone)]
pub struct FakePage {
    url: String,
    nodes: Rc<RefCell<Vec<(String, FakeNode)>>>,
}

impl FakePage {
    pub fn new(url: &str) -> Self {
        FakePage {
            url: url.to_string(),
            nodes: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn add(&self, selector: &str, node: FakeNode) -> FakeNode {
        self.nodes.borrow_mut().push((selector.to_string(), node.clone()));
        node
    }
}

impl Page for FakePage {
    type Node = FakeNode;

    fn query_all(&self, selector: &str) -> Vec<FakeNode> {
        self.nodes
            .borrow()
            .iter()
            .filter(|(s, _)| s == selector)
            .map(|(_, node)| node.clone())
            .collect()
    }

    fn url(&self) -> String {
        self.url.clone()
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    opened: RefCell<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        RecordingNavigator::default()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Navigator for RecordingNavigator {
    async fn open_tab(&self, url: &str) -> Result<()> {
        self.opened.borrow_mut().push(url.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: RefCell<Vec<(String, NoticeKind)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        RecordingNotifier::default()
    }

    pub fn notices(&self) -> Vec<(String, NoticeKind)> {
        self.notices.borrow().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, kind: NoticeKind) {
        self.notices.borrow_mut().push((message.to_string(), kind));
    }
}

#[derive(Default)]
pub struct RecordingClipboard {
    copied: RefCell<Vec<String>>,
    fail: Cell<bool>,
}

impl RecordingClipboard {
    pub fn new() -> Self {
        RecordingClipboard::default()
    }

    pub fn failing() -> Self {
        let clipboard = RecordingClipboard::default();
        clipboard.fail.set(true);
        clipboard
    }

    pub fn copied(&self) -> Vec<String> {
        self.copied.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Clipboard for RecordingClipboard {
    async fn write_text(&self, text: &str) -> Result<()> {
        if self.fail.get() {
            return Err(RelayError::Channel("clipboard denied".to_string()));
        }
        self.copied.borrow_mut().push(text.to_string());
        Ok(())
    }
}
