//! Test doubles for the driver and capture seams

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::driver::traits::{BrowserDriver, ElementHandle};
use crate::error::{MacroError, Result};
use crate::model::Locator;
use crate::recorder::capture::{CaptureListener, RawEvent};
use crate::runner::CancelToken;

/// Driver request as observed by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Navigate(String),
    Click(String),
    SetValue(String, String),
    SelectOption(String, String),
    SetChecked(String, bool),
}

/// Element living on the fake page
#[derive(Debug, Clone)]
pub struct FakeElement {
    pub handle: String,
    pub locators: Vec<Locator>,
    pub enabled: bool,
    pub checked: bool,
    pub options: Vec<String>,
    /// Lookups that miss before the element shows up
    pub appears_after: usize,
    /// Dispatches that fail as stale before the element settles
    pub stale_dispatches: usize,
    /// Leaves the page when a dispatch goes stale
    pub vanish_on_stale: bool,
    lookups: usize,
}

impl FakeElement {
    pub fn new(handle: &str, locators: Vec<Locator>) -> Self {
        Self {
            handle: handle.to_string(),
            locators,
            enabled: true,
            checked: false,
            options: Vec::new(),
            appears_after: 0,
            stale_dispatches: 0,
            vanish_on_stale: false,
            lookups: 0,
        }
    }

    /// Element found by `#id`
    pub fn with_id(id: &str) -> Self {
        Self::new(id, vec![Locator::Id(id.to_string())])
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| o.to_string()).collect();
        self
    }

    pub fn appears_after(mut self, lookups: usize) -> Self {
        self.appears_after = lookups;
        self
    }

    pub fn stale_dispatches(mut self, count: usize) -> Self {
        self.stale_dispatches = count;
        self
    }

    pub fn vanishes_when_stale(mut self) -> Self {
        self.vanish_on_stale = true;
        self
    }
}

#[derive(Debug, Default)]
struct FakePage {
    elements: Vec<FakeElement>,
    calls: Vec<DriverCall>,
    lookups: Vec<Locator>,
    session_lost: bool,
    cancel_after_dispatches: Option<(usize, CancelToken)>,
}

/// In-memory browser driver that records every state-changing request
#[derive(Debug, Default)]
pub struct FakeDriver {
    page: Mutex<FakePage>,
}

impl FakeDriver {
    pub fn new(elements: Vec<FakeElement>) -> Self {
        Self {
            page: Mutex::new(FakePage {
                elements,
                ..Default::default()
            }),
        }
    }

    /// Request cancellation from inside the `count`-th dispatch
    pub fn cancel_after_dispatches(self, count: usize, token: CancelToken) -> Self {
        self.page().cancel_after_dispatches = Some((count, token));
        self
    }

    pub fn lose_session(&self) {
        self.page().session_lost = true;
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.page().calls.clone()
    }

    /// State-changing calls, navigation excluded
    pub fn dispatches(&self) -> Vec<DriverCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, DriverCall::Navigate(_)))
            .collect()
    }

    pub fn lookups(&self) -> Vec<Locator> {
        self.page().lookups.clone()
    }

    pub fn is_checked(&self, handle: &str) -> bool {
        self.page()
            .elements
            .iter()
            .any(|e| e.handle == handle && e.checked)
    }

    fn page(&self) -> MutexGuard<'_, FakePage> {
        self.page.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against a live element, applying session loss and staleness
    fn with_element<T>(
        &self,
        handle: &ElementHandle,
        f: impl FnOnce(&mut FakeElement) -> Result<T>,
    ) -> Result<T> {
        let mut page = self.page();
        if page.session_lost {
            return Err(MacroError::DriverSession("browser closed".to_string()));
        }
        let element = page
            .elements
            .iter_mut()
            .find(|e| e.handle == handle.as_str())
            .ok_or(MacroError::StaleReference)?;
        f(element)
    }

    fn dispatch(&self, handle: &ElementHandle, call: DriverCall) -> Result<()> {
        self.with_element(handle, |element| {
            if element.stale_dispatches > 0 {
                element.stale_dispatches -= 1;
                if element.vanish_on_stale {
                    element.locators.clear();
                }
                return Err(MacroError::StaleReference);
            }
            if let DriverCall::SetChecked(_, checked) = &call {
                element.checked = *checked;
            }
            Ok(())
        })?;

        let mut page = self.page();
        page.calls.push(call);
        let dispatched = page
            .calls
            .iter()
            .filter(|c| !matches!(c, DriverCall::Navigate(_)))
            .count();
        if let Some((count, token)) = &page.cancel_after_dispatches {
            if dispatched >= *count {
                token.cancel();
            }
        }
        Ok(())
    }

    fn check_session(&self) -> Result<()> {
        if self.page().session_lost {
            return Err(MacroError::DriverSession("browser closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    fn name(&self) -> &str {
        "fake"
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.check_session()?;
        self.page().calls.push(DriverCall::Navigate(url.to_string()));
        Ok(())
    }

    async fn find_candidates(&self, locator: &Locator) -> Result<Vec<ElementHandle>> {
        self.check_session()?;
        let mut page = self.page();
        page.lookups.push(locator.clone());

        let mut found = Vec::new();
        for element in page.elements.iter_mut() {
            if !element.locators.contains(locator) {
                continue;
            }
            element.lookups += 1;
            if element.lookups > element.appears_after {
                found.push(ElementHandle::new(element.handle.clone()));
            }
        }
        Ok(found)
    }

    async fn click(&self, handle: &ElementHandle) -> Result<()> {
        self.dispatch(handle, DriverCall::Click(handle.to_string()))
    }

    async fn set_value(&self, handle: &ElementHandle, text: &str) -> Result<()> {
        self.dispatch(
            handle,
            DriverCall::SetValue(handle.to_string(), text.to_string()),
        )
    }

    async fn select_option(&self, handle: &ElementHandle, option_id: &str) -> Result<()> {
        self.dispatch(
            handle,
            DriverCall::SelectOption(handle.to_string(), option_id.to_string()),
        )
    }

    async fn list_options(&self, handle: &ElementHandle) -> Result<Vec<String>> {
        self.with_element(handle, |e| Ok(e.options.clone()))
    }

    async fn is_enabled(&self, handle: &ElementHandle) -> Result<bool> {
        self.with_element(handle, |e| Ok(e.enabled))
    }

    async fn get_checked_state(&self, handle: &ElementHandle) -> Result<bool> {
        self.with_element(handle, |e| Ok(e.checked))
    }

    async fn set_checked_state(&self, handle: &ElementHandle, checked: bool) -> Result<()> {
        self.dispatch(handle, DriverCall::SetChecked(handle.to_string(), checked))
    }
}

/// Capture listener that replays prepared batches
#[derive(Debug, Default)]
pub struct ScriptedListener {
    batches: VecDeque<Vec<RawEvent>>,
    polls: usize,
    disconnect_after: Option<usize>,
}

impl ScriptedListener {
    pub fn new(batches: Vec<Vec<RawEvent>>) -> Self {
        Self {
            batches: batches.into(),
            ..Default::default()
        }
    }

    /// Fail every poll after the first `polls`
    pub fn disconnect_after(mut self, polls: usize) -> Self {
        self.disconnect_after = Some(polls);
        self
    }
}

#[async_trait]
impl CaptureListener for ScriptedListener {
    async fn poll_events(&mut self) -> Result<Vec<RawEvent>> {
        if self.disconnect_after.is_some_and(|limit| self.polls >= limit) {
            return Err(MacroError::Capture("page closed".to_string()));
        }
        self.polls += 1;
        Ok(self.batches.pop_front().unwrap_or_default())
    }
}
