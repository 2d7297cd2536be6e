/// Cooperative waiting: clocks, settle delays and condition polling
use crate::error::{RelayError, Result};
use async_trait::async_trait;
use std::cell::Cell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

/// Time source and sleeper
#[async_trait(?Send)]
pub trait Timer {
    /// Milliseconds since the epoch
    fn now_ms(&self) -> f64;

    /// ISO-8601 rendering of an epoch timestamp
    fn iso_string(&self, ms: f64) -> String;

    /// Month (1-12) and day of the month of an epoch timestamp, in the user's time zone
    fn local_month_day(&self, ms: f64) -> (u32, u32);

    async fn sleep(&self, ms: u32);
}

/// Timer backed by `Date.now()` and `setTimeout`
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserTimer;

#[async_trait(?Send)]
impl Timer for BrowserTimer {
    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }

    fn iso_string(&self, ms: f64) -> String {
        js_sys::Date::new(&JsValue::from_f64(ms)).to_iso_string().into()
    }

    fn local_month_day(&self, ms: f64) -> (u32, u32) {
        let date = js_sys::Date::new(&JsValue::from_f64(ms));
        (date.get_month() + 1, date.get_date())
    }

    async fn sleep(&self, ms: u32) {
        let promise = js_sys::Promise::new(&mut |resolve, _reject| {
            if let Err(e) = set_timeout(&resolve, ms as i32) {
                log::warn!("setTimeout failed: {:?}", e);
                let _ = resolve.call0(&JsValue::UNDEFINED);
            }
        });
        let _ = JsFuture::from(promise).await;
    }
}

// Works in both window and service worker scopes
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_name = setTimeout)]
    fn set_timeout(handler: &js_sys::Function, timeout: i32) -> std::result::Result<JsValue, JsValue>;
}

/// Raised when the hosting page goes away; waits observe it between polls
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Rc<Cell<bool>>);

impl Cancellation {
    pub fn new() -> Self {
        Cancellation::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }

    /// Fails with [`RelayError::Cancelled`] once cancelled
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(RelayError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Poll `predicate` every `interval_ms` until it holds or `timeout_ms` elapses
///
/// Returns `true` as soon as the predicate holds, `false` on timeout or
/// cancellation.
pub async fn await_condition<T, F>(
    timer: &T,
    cancel: &Cancellation,
    mut predicate: F,
    interval_ms: u32,
    timeout_ms: u32,
) -> bool
where
    T: Timer + ?Sized,
    F: FnMut() -> bool,
{
    let deadline = timer.now_ms() + timeout_ms as f64;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        if predicate() {
            return true;
        }
        if timer.now_ms() >= deadline {
            return false;
        }
        timer.sleep(interval_ms.max(1)).await;
    }
}

/// Sleep for a settle delay, then report whether the page is still alive
pub async fn settle<T: Timer + ?Sized>(timer: &T, cancel: &Cancellation, ms: u32) -> Result<()> {
    cancel.check()?;
    timer.sleep(ms).await;
    cancel.check()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ManualTimer;
    use futures::executor::block_on;

    #[test]
    fn test_condition_already_true() {
        let timer = ManualTimer::at(0.0);
        let ready = block_on(await_condition(&timer, &Cancellation::new(), || true, 100, 1000));

        assert!(ready);
        assert_eq!(timer.now_ms(), 0.0);
    }

    #[test]
    fn test_condition_becomes_true() {
        let timer = ManualTimer::at(0.0);
        let polls = Cell::new(0);
        let ready = block_on(await_condition(
            &timer,
            &Cancellation::new(),
            || {
                polls.set(polls.get() + 1);
                polls.get() == 4
            },
            100,
            1000,
        ));

        assert!(ready);
        assert_eq!(timer.now_ms(), 300.0);
    }

    #[test]
    fn test_condition_times_out() {
        let timer = ManualTimer::at(0.0);
        let ready = block_on(await_condition(&timer, &Cancellation::new(), || false, 100, 1000));

        assert!(!ready);
        assert_eq!(timer.now_ms(), 1000.0);
    }

    #[test]
    fn test_cancelled_wait_gives_up() {
        let timer = ManualTimer::at(0.0);
        let cancel = Cancellation::new();
        let polls = Cell::new(0);
        let ready = block_on(await_condition(
            &timer,
            &cancel,
            || {
                polls.set(polls.get() + 1);
                if polls.get() == 2 {
                    cancel.cancel();
                }
                false
            },
            100,
            10_000,
        ));

        assert!(!ready);
        assert_eq!(polls.get(), 2);
    }

    #[test]
    fn test_settle_reports_cancellation() {
        let timer = ManualTimer::at(0.0);
        let cancel = Cancellation::new();

        assert_eq!(block_on(settle(&timer, &cancel, 300)), Ok(()));
        assert_eq!(timer.now_ms(), 300.0);

        cancel.cancel();
        assert_eq!(block_on(settle(&timer, &cancel, 300)), Err(RelayError::Cancelled));
    }
}
