use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

use super::events::{EventEmitter, ReplayEvent};
use super::resolver::{LocatorResolver, ResolverConfig};
use super::state::{ReplayFailure, ReplayRun, ReplayStatus, StepState};
use super::CancelToken;
use crate::driver::traits::{BrowserDriver, ElementHandle};
use crate::error::{MacroError, Result};
use crate::model::{Macro, Step, StepKind};

/// Walks a macro's steps against the live page, one at a time
pub struct ReplayExecutor {
    driver: Arc<dyn BrowserDriver>,
    resolver: LocatorResolver,
    emitter: EventEmitter,
    status: ReplayStatus,
    step_delay: Duration,
}

impl ReplayExecutor {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        resolver_config: ResolverConfig,
        step_delay: Duration,
    ) -> Self {
        Self {
            driver,
            resolver: LocatorResolver::new(resolver_config),
            emitter: EventEmitter::default(),
            status: ReplayStatus::Idle,
            step_delay,
        }
    }

    /// Broadcast through `emitter` instead of a private channel
    pub fn with_emitter(mut self, emitter: EventEmitter) -> Self {
        self.emitter = emitter;
        self
    }

    /// Subscribe to replay events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ReplayEvent> {
        self.emitter.subscribe()
    }

    /// Status of the last (or current) replay
    pub fn status(&self) -> ReplayStatus {
        self.status
    }

    /// Replay `macro_` from its start URL
    ///
    /// Returns `Err` only when the macro is invalid. Every outcome after
    /// that, failure included, comes back as a `ReplayRun` in a terminal
    /// status. The `&mut` receiver keeps one replay per executor; callers
    /// sharing a driver across executors go through `MacroStudio`.
    pub async fn play(&mut self, macro_: &Macro, cancel: &CancelToken) -> Result<ReplayRun> {
        macro_.validate()?;

        let steps = macro_.ordered_steps();
        let mut run = ReplayRun::new(
            macro_.id,
            &macro_.name,
            steps.iter().map(|s| StepState::new(s)).collect(),
        );

        self.status = ReplayStatus::Running;
        run.start();
        info!("Replaying '{}' ({} steps)", macro_.name, steps.len());
        self.emitter.emit(ReplayEvent::ReplayStarted {
            macro_name: macro_.name.clone(),
            start_url: macro_.start_url.clone(),
            step_count: steps.len(),
        });

        if let Err(e) = self.driver.navigate(&macro_.start_url).await {
            warn!("Navigation to {} failed: {}", macro_.start_url, e);
            run.fail(ReplayFailure::before_steps(e));
            return Ok(self.finish(run));
        }

        for (i, step) in steps.iter().enumerate() {
            if cancel.is_cancelled() {
                info!("Replay cancelled after {} step(s)", run.completed);
                run.cancel();
                break;
            }

            if let Some(state) = run.steps.get_mut(i) {
                state.start();
            }
            self.emitter.emit(ReplayEvent::StepStarted {
                sequence: step.sequence,
                display: step.describe(),
            });

            match self.execute_step(step).await {
                Ok(()) => {
                    run.step_passed(i);
                    let duration_ms = run.steps.get(i).and_then(|s| s.duration_ms).unwrap_or(0);
                    self.emitter.emit(ReplayEvent::StepPassed {
                        sequence: step.sequence,
                        duration_ms,
                    });
                    if !self.step_delay.is_zero() {
                        tokio::time::sleep(self.step_delay).await;
                    }
                }
                Err(e) => {
                    warn!("Step {} ({}) failed: {}", step.sequence, step.kind, e);
                    let error = e.to_string();
                    run.fail(ReplayFailure::at_step(step, e));
                    let duration_ms = run.steps.get(i).and_then(|s| s.duration_ms).unwrap_or(0);
                    self.emitter.emit(ReplayEvent::StepFailed {
                        sequence: step.sequence,
                        error,
                        duration_ms,
                    });
                    break;
                }
            }
        }

        if run.status == ReplayStatus::Running {
            run.complete();
        }
        Ok(self.finish(run))
    }

    fn finish(&mut self, run: ReplayRun) -> ReplayRun {
        for state in run.steps.iter().filter(|s| s.status.is_skipped()) {
            self.emitter.emit(ReplayEvent::StepSkipped {
                sequence: state.sequence,
                reason: state.status.skip_reason().unwrap_or_default().to_string(),
            });
        }
        self.status = run.status;
        self.emitter.emit(ReplayEvent::ReplayFinished {
            macro_name: run.macro_name.clone(),
            status: run.status,
            completed: run.completed,
            duration_ms: run.total_duration_ms,
        });
        run
    }

    /// Resolve and dispatch one step, re-resolving once on a stale handle
    ///
    /// A handle that goes stale again after the fresh resolution means the
    /// target cannot be held, reported as `LocatorNotFound`.
    async fn execute_step(&self, step: &Step) -> Result<()> {
        let handle = self.resolver.resolve(self.driver.as_ref(), &step.target).await?;
        match self.dispatch(step, &handle).await {
            Err(MacroError::StaleReference) => {
                debug!("Step {} went stale, resolving again", step.sequence);
                self.emitter.emit(ReplayEvent::StepRetrying {
                    sequence: step.sequence,
                });
                let handle = self.resolver.resolve(self.driver.as_ref(), &step.target).await?;
                match self.dispatch(step, &handle).await {
                    Err(MacroError::StaleReference) => {
                        warn!("Step {} went stale again after re-resolution", step.sequence);
                        Err(MacroError::LocatorNotFound {
                            candidates: step.target.clone(),
                            attempts: self.resolver.config().max_attempts.max(1),
                        })
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    async fn dispatch(&self, step: &Step, handle: &ElementHandle) -> Result<()> {
        let driver = self.driver.as_ref();
        match step.kind {
            StepKind::Click => {
                if !driver.is_enabled(handle).await? {
                    return Err(MacroError::ElementDisabled);
                }
                driver.click(handle).await
            }
            StepKind::Input => {
                let text = step.value.as_deref().unwrap_or_default();
                driver.set_value(handle, text).await
            }
            StepKind::Select => {
                let option = step.value.as_deref().unwrap_or_default();
                let available = driver.list_options(handle).await?;
                if !available.iter().any(|o| o == option) {
                    return Err(MacroError::OptionNotFound {
                        option: option.to_string(),
                        available,
                    });
                }
                driver.select_option(handle, option).await
            }
            StepKind::CheckboxToggle => {
                let wanted = step.checked.unwrap_or(true);
                if driver.get_checked_state(handle).await? == wanted {
                    debug!("Step {} already checked={}, nothing to do", step.sequence, wanted);
                    return Ok(());
                }
                driver.set_checked_state(handle, wanted).await
            }
        }
    }
}
