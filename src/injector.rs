/// Destination side of the relay: fill the import form with the pending PGN
use crate::config::{RelayConfig, Settings};
use crate::error::{RelayError, Result};
use crate::locate::{DomEvent, Locator, Page, PageNode, locate};
use crate::messages::RelayChannel;
use crate::notify::{NoticeKind, Notifier, Quiet};
use crate::wait::{Cancellation, Timer, await_condition, settle};
use std::cell::Cell;

/// The import field exists once one of these matches
const FIELD_READY: &[Locator] = &[Locator::Css("#form3-pgn"), Locator::Css("textarea[name=\"pgn\"]")];

const FIELD_LOCATORS: &[Locator] = &[
    Locator::Css("#form3-pgn"),
    Locator::Css("textarea[name=\"pgn\"]"),
    Locator::Css("textarea.form-control"),
];

const ANALYSE_LOCATORS: &[Locator] = &[
    Locator::Css("#form3-analyse"),
    Locator::Css("input[name=\"analyse\"]"),
];

const SUBMIT_LOCATORS: &[Locator] = &[
    Locator::Css("button.submit"),
    Locator::Css("button[type=\"submit\"]"),
    Locator::Css(".form-actions button"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionState {
    Idle,
    WaitingForField,
    Delivered,
    Expired,
    NoPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionOutcome {
    /// `submitted` is false when no submit control was found
    Delivered { submitted: bool },
    Expired,
    NoPending,
}

impl InjectionOutcome {
    fn state(&self) -> InjectionState {
        match self {
            InjectionOutcome::Delivered { .. } => InjectionState::Delivered,
            InjectionOutcome::Expired => InjectionState::Expired,
            InjectionOutcome::NoPending => InjectionState::NoPending,
        }
    }
}

/// One injection attempt for one page load
pub struct Injector<'a, P, T: ?Sized, C: ?Sized> {
    page: &'a P,
    timer: &'a T,
    channel: &'a C,
    cancel: &'a Cancellation,
    config: &'a RelayConfig,
    state: Cell<InjectionState>,
    outcome: Cell<Option<InjectionOutcome>>,
    settings: Cell<Settings>,
}

impl<'a, P, T, C> Injector<'a, P, T, C>
where
    P: Page,
    T: Timer + ?Sized,
    C: RelayChannel + ?Sized,
{
    pub fn new(
        page: &'a P,
        timer: &'a T,
        channel: &'a C,
        cancel: &'a Cancellation,
        config: &'a RelayConfig,
    ) -> Self {
        Injector {
            page,
            timer,
            channel,
            cancel,
            config,
            state: Cell::new(InjectionState::Idle),
            outcome: Cell::new(None),
            settings: Cell::new(Settings::default()),
        }
    }

    pub fn state(&self) -> InjectionState {
        self.state.get()
    }

    /// Deliver the pending PGN, if any. Later calls return the first outcome.
    pub async fn run(&self) -> Result<InjectionOutcome> {
        if let Some(outcome) = self.outcome.get() {
            return Ok(outcome);
        }
        if self.state.get() != InjectionState::Idle {
            log::debug!("Injection already in progress");
            return Err(RelayError::Cancelled);
        }

        let outcome = self.inject().await?;
        self.state.set(outcome.state());
        self.outcome.set(Some(outcome));
        Ok(outcome)
    }

    async fn inject(&self) -> Result<InjectionOutcome> {
        // Every notice, failures included, is gated on these
        let settings = match self.channel.settings().await {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Using default settings: {}", e);
                Settings::default()
            }
        };
        self.settings.set(settings);

        self.state.set(InjectionState::WaitingForField);
        let ready = await_condition(
            self.timer,
            self.cancel,
            || locate(self.page, FIELD_READY).is_some(),
            self.config.field_poll_ms,
            self.config.field_wait_budget_ms,
        )
        .await;
        if !ready {
            self.cancel.check()?;
            return Err(RelayError::FieldNotFound);
        }
        log::debug!("Import field found");

        settle(self.timer, self.cancel, self.config.field_settle_ms).await?;

        let Some(pending) = self.channel.consume_pending().await? else {
            log::info!("No pending PGN");
            return Ok(InjectionOutcome::NoPending);
        };

        let now = self.timer.now_ms();
        if pending.is_expired(now, self.config.pending_ttl_ms) {
            log::info!("Pending PGN expired ({} ms old)", pending.age_ms(now));
            return Ok(InjectionOutcome::Expired);
        }
        log::info!("Pending PGN found, age: {} s", (pending.age_ms(now) / 1000.0).round());

        let submitted = self.fill_form(&pending.payload, settings).await?;
        Ok(InjectionOutcome::Delivered { submitted })
    }

    /// Write the payload the way a paste would look to the page's own scripts
    async fn fill_form(&self, payload: &str, settings: Settings) -> Result<bool> {
        let field = locate(self.page, FIELD_LOCATORS).ok_or(RelayError::FieldNotFound)?;

        field.set_value("");
        settle(self.timer, self.cancel, self.config.field_clear_ms).await?;
        field.set_value(payload);
        field.focus();
        for event in [DomEvent::Input, DomEvent::Change, DomEvent::KeyUp] {
            field.dispatch(event);
        }
        log::info!("PGN pasted, length: {}", payload.len());

        if settings.auto_analyse {
            if let Some(checkbox) = locate(self.page, ANALYSE_LOCATORS) {
                if !checkbox.is_checked() {
                    checkbox.click();
                    log::debug!("Analysis checkbox checked");
                }
            }
        }

        settle(self.timer, self.cancel, self.config.submit_settle_ms).await?;

        match locate(self.page, SUBMIT_LOCATORS) {
            Some(submit) => {
                submit.click();
                log::info!("Import submitted");
                Ok(true)
            }
            None => {
                log::warn!("Submit button not found");
                Ok(false)
            }
        }
    }

    /// Run and tell the user how it went. Expiry and "nothing pending" stay silent.
    pub async fn run_and_report<N: Notifier + ?Sized>(&self, notifier: &N) -> Result<InjectionOutcome> {
        let result = self.run().await;
        let notifier = Quiet {
            inner: notifier,
            enabled: self.settings.get().show_notifications,
        };
        match &result {
            Ok(InjectionOutcome::Delivered { submitted: true }) => notifier.notify(
                "PGN imported and analysis started automatically!",
                NoticeKind::Success,
            ),
            Ok(InjectionOutcome::Delivered { submitted: false }) => notifier.notify(
                "PGN imported from Chess.com! Click \"Import\" to analyze.",
                NoticeKind::Success,
            ),
            Ok(_) | Err(RelayError::Cancelled) => {}
            Err(RelayError::FieldNotFound) => {
                notifier.notify("Error: Text area not found", NoticeKind::Error)
            }
            Err(e) => notifier.notify(&format!("Error: {}", e), NoticeKind::Error),
        }
        result
    }
}
