//! Step Recorder
//!
//! Turns the raw event stream of a capture listener into an ordered list
//! of steps. Consecutive text edits on one element are coalesced into a
//! single `input` step holding the last value seen before focus left the
//! element or another element was used.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use super::capture::{CaptureListener, ElementDescriptor, RawEvent, RawEventKind};
use super::selector_scorer::SelectorScorer;
use crate::error::{MacroError, Result};
use crate::model::{Locator, Macro, Step, StepKind};

/// Text edit waiting for its element to lose focus
#[derive(Debug, Clone)]
struct PendingInput {
    element: ElementDescriptor,
    step: Step,
}

/// State of the active recording
#[derive(Debug)]
struct RecordingSession {
    start_url: String,
    started_at: DateTime<Utc>,
    steps: Vec<Step>,
    pending: Option<PendingInput>,
}

impl RecordingSession {
    fn flush_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!("recorded {}", pending.step.describe());
            self.steps.push(pending.step);
        }
    }
}

/// Recorder that owns the in-progress macro until `stop`
#[derive(Debug, Default)]
pub struct StepRecorder {
    session: Option<RecordingSession>,
    scorer: SelectorScorer,
}

impl StepRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a recording session for `start_url`
    pub fn start(&mut self, start_url: &str) -> Result<()> {
        if self.session.is_some() {
            return Err(MacroError::AlreadyRecording);
        }
        info!("recording started at {}", start_url);
        self.session = Some(RecordingSession {
            start_url: start_url.to_string(),
            started_at: Utc::now(),
            steps: Vec::new(),
            pending: None,
        });
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Steps captured so far, a pending text edit included
    pub fn step_count(&self) -> usize {
        self.session
            .as_ref()
            .map(|s| s.steps.len() + usize::from(s.pending.is_some()))
            .unwrap_or(0)
    }

    /// When the active session started
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.session.as_ref().map(|s| s.started_at)
    }

    /// Pull one batch of events from `listener`
    ///
    /// A listener failure is fatal to the session: the partial steps are
    /// discarded and the recorder becomes free again.
    ///
    /// # Returns
    /// Number of events consumed
    pub async fn drain(&mut self, listener: &mut dyn CaptureListener) -> Result<usize> {
        if self.session.is_none() {
            return Err(MacroError::NotRecording);
        }

        let events = match listener.poll_events().await {
            Ok(events) => events,
            Err(e) => {
                warn!("capture failed, discarding recording: {}", e);
                self.abort();
                return Err(match e {
                    MacroError::Capture(_) => e,
                    other => MacroError::Capture(other.to_string()),
                });
            }
        };

        let count = events.len();
        for event in events {
            self.on_event(event)?;
        }
        Ok(count)
    }

    /// Intake for a single raw event
    pub(crate) fn on_event(&mut self, event: RawEvent) -> Result<()> {
        let session = self.session.as_mut().ok_or(MacroError::NotRecording)?;
        let target = &event.target;

        match event.kind {
            RawEventKind::Click => {
                session.flush_pending();
                // Selects and checkables produce their step from `change`
                if target.is_select() || target.is_checkable() {
                    return Ok(());
                }
                if let Some(step) = step_for(&self.scorer, target, Step::click) {
                    session.steps.push(step);
                }
            }
            RawEventKind::Change if target.is_select() => {
                session.flush_pending();
                let Some(option) = event.value.clone() else {
                    warn!("select change without a value ignored");
                    return Ok(());
                };
                if let Some(step) = step_for(&self.scorer, target, |t| Step::select(t, option)) {
                    session.steps.push(step);
                }
            }
            RawEventKind::Change if target.is_checkable() => {
                session.flush_pending();
                let Some(checked) = event.checked else {
                    warn!("checkbox change without a checked state ignored");
                    return Ok(());
                };
                if let Some(step) = step_for(&self.scorer, target, |t| Step::checkbox(t, checked)) {
                    session.steps.push(step);
                }
            }
            RawEventKind::Keyup if !target.is_text_entry() => {
                // Arrow keys on selects, space on checkboxes, Enter on buttons
                debug!("keyup on non-text element ignored");
            }
            RawEventKind::Change if !target.is_text_entry() => {
                debug!("change on non-text element ignored");
            }
            RawEventKind::Change | RawEventKind::Keyup => {
                // Keys pressed outside editable elements carry no value
                let Some(text) = event.value.clone() else {
                    return Ok(());
                };
                let same_element = session
                    .pending
                    .as_ref()
                    .is_some_and(|p| p.element.same_element(target));
                if same_element {
                    if let Some(pending) = session.pending.as_mut() {
                        pending.step.value = Some(text);
                    }
                } else {
                    session.flush_pending();
                    if let Some(step) = step_for(&self.scorer, target, |t| Step::input(t, text)) {
                        session.pending = Some(PendingInput {
                            element: target.clone(),
                            step,
                        });
                    }
                }
            }
            RawEventKind::Blur => {
                let leaves_pending = session
                    .pending
                    .as_ref()
                    .is_some_and(|p| p.element.same_element(target));
                if leaves_pending {
                    session.flush_pending();
                }
            }
        }
        Ok(())
    }

    /// Finish the session and hand over the finalized macro
    ///
    /// The session ends even when no step was captured.
    pub fn stop(&mut self, name: &str) -> Result<Macro> {
        let mut session = self.session.take().ok_or(MacroError::NotRecording)?;
        session.flush_pending();

        if session.steps.is_empty() {
            info!("recording stopped with no steps");
            return Err(MacroError::EmptyMacro);
        }

        let recorded = Macro::new(name, session.start_url, session.steps);
        info!(
            "recording '{}' finalized with {} step(s)",
            recorded.name,
            recorded.steps.len()
        );
        Ok(recorded)
    }

    /// Drop the active session and everything it captured
    pub fn abort(&mut self) {
        if let Some(session) = self.session.take() {
            info!(
                "recording at {} aborted, {} step(s) discarded",
                session.start_url,
                session.steps.len()
            );
        }
    }
}

/// Build a step for `target`, or drop the event when nothing can locate it
fn step_for(
    scorer: &SelectorScorer,
    target: &ElementDescriptor,
    build: impl FnOnce(Vec<Locator>) -> Step,
) -> Option<Step> {
    let locators = scorer.locators_for(target);
    if locators.is_empty() {
        warn!("event target has no usable locator, ignored: {:?}", target);
        return None;
    }
    let step = build(locators);
    if step.kind != StepKind::Input {
        debug!("recorded {}", step.describe());
    }
    Some(step)
}
