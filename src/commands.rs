//! Caller-facing command surface
//!
//! `MacroStudio` ties the recorder, the replay executor and a repository to
//! one browser driver session. At most one of recording and replay holds the
//! session at a time; a second request fails fast instead of queuing.

use log::info;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::driver::traits::BrowserDriver;
use crate::error::{MacroError, Result};
use crate::model::{Macro, MacroRef, MacroSummary};
use crate::recorder::{CaptureListener, StepRecorder};
use crate::runner::{CancelToken, EventEmitter, ReplayEvent, ReplayExecutor, ReplayRun};
use crate::storage::{MacroRepository, SaveMode};
use crate::utils::Config;

const IDLE: u8 = 0;
const RECORDING: u8 = 1;
const REPLAYING: u8 = 2;

/// Exclusive claim on the driver session
#[derive(Debug, Default)]
struct SessionLease {
    holder: AtomicU8,
}

impl SessionLease {
    fn acquire(&self, mode: u8) -> Result<()> {
        self.holder
            .compare_exchange(IDLE, mode, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|held| match held {
                RECORDING => MacroError::AlreadyRecording,
                _ => MacroError::AlreadyRunning,
            })
    }

    fn release(&self, mode: u8) {
        let _ = self
            .holder
            .compare_exchange(mode, IDLE, Ordering::SeqCst, Ordering::SeqCst);
    }

    fn is_held_by(&self, mode: u8) -> bool {
        self.holder.load(Ordering::SeqCst) == mode
    }
}

/// Releases a replay lease on every exit path
struct ReplayLease<'a>(&'a SessionLease);

impl<'a> ReplayLease<'a> {
    fn acquire(lease: &'a SessionLease) -> Result<Self> {
        lease.acquire(REPLAYING)?;
        Ok(Self(lease))
    }
}

impl Drop for ReplayLease<'_> {
    fn drop(&mut self) {
        self.0.release(REPLAYING);
    }
}

pub struct MacroStudio {
    driver: Arc<dyn BrowserDriver>,
    repository: Arc<dyn MacroRepository>,
    lease: SessionLease,
    recorder: Mutex<StepRecorder>,
    executor: Mutex<ReplayExecutor>,
    emitter: EventEmitter,
    cancel: CancelToken,
}

impl MacroStudio {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        repository: Arc<dyn MacroRepository>,
        config: &Config,
    ) -> Self {
        let emitter = EventEmitter::default();
        let executor = ReplayExecutor::new(
            driver.clone(),
            config.resolver_config(),
            config.step_delay(),
        )
        .with_emitter(emitter.clone());

        Self {
            driver,
            repository,
            lease: SessionLease::default(),
            recorder: Mutex::new(StepRecorder::new()),
            executor: Mutex::new(executor),
            emitter,
            cancel: CancelToken::new(),
        }
    }

    /// Subscribe to replay events
    pub fn subscribe(&self) -> broadcast::Receiver<ReplayEvent> {
        self.emitter.subscribe()
    }

    /// Handle that cancels the running replay, for signal handlers
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_recording(&self) -> bool {
        self.lease.is_held_by(RECORDING)
    }

    pub fn is_replaying(&self) -> bool {
        self.lease.is_held_by(REPLAYING)
    }

    /// Open `url` and begin recording
    pub async fn start_recording(&self, url: &str) -> Result<()> {
        self.lease.acquire(RECORDING)?;

        let started = async {
            self.driver.navigate(url).await?;
            self.recorder.lock().await.start(url)
        }
        .await;

        if started.is_err() {
            self.lease.release(RECORDING);
        }
        started
    }

    /// Pump one batch of captured events into the recorder
    ///
    /// A listener failure discards the recording and frees the session.
    pub async fn capture(&self, listener: &mut dyn CaptureListener) -> Result<usize> {
        let mut recorder = self.recorder.lock().await;
        let result = recorder.drain(listener).await;
        if result.is_err() && !recorder.is_recording() {
            self.lease.release(RECORDING);
        }
        result
    }

    /// Steps captured so far in the active recording
    pub async fn recorded_steps(&self) -> usize {
        self.recorder.lock().await.step_count()
    }

    /// Finish the recording as an unsaved macro named `name`
    ///
    /// The session ends even when nothing was captured.
    pub async fn stop_recording(&self, name: &str) -> Result<Macro> {
        let mut recorder = self.recorder.lock().await;
        if !recorder.is_recording() {
            return Err(MacroError::NotRecording);
        }
        let result = recorder.stop(name);
        self.lease.release(RECORDING);
        result
    }

    /// Drop the active recording without producing a macro
    pub async fn abort_recording(&self) -> Result<()> {
        let mut recorder = self.recorder.lock().await;
        if !recorder.is_recording() {
            return Err(MacroError::NotRecording);
        }
        recorder.abort();
        self.lease.release(RECORDING);
        Ok(())
    }

    pub fn save_macro(&self, macro_: &Macro, mode: SaveMode) -> Result<()> {
        self.repository.save(macro_, mode)
    }

    /// Stored macros, newest first
    pub fn list_macros(&self) -> Result<Vec<MacroSummary>> {
        let mut summaries: Vec<MacroSummary> = self.repository.list()?.collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    pub fn load_macro(&self, reference: &MacroRef) -> Result<Macro> {
        self.repository.load(reference)
    }

    /// Replay a stored macro
    pub async fn play_macro(&self, reference: &MacroRef) -> Result<ReplayRun> {
        let _lease = self.begin_replay()?;
        let macro_ = self.repository.load(reference)?;
        self.run(&macro_).await
    }

    /// One-shot replay of a macro that was never saved
    pub async fn play_unsaved(&self, macro_: &Macro) -> Result<ReplayRun> {
        let _lease = self.begin_replay()?;
        self.run(macro_).await
    }

    /// Clear any stale cancel request, then take the replay lease
    ///
    /// Cancels accepted once the lease is held are never wiped.
    fn begin_replay(&self) -> Result<ReplayLease<'_>> {
        if self.is_replaying() {
            return Err(MacroError::AlreadyRunning);
        }
        self.cancel.reset();
        ReplayLease::acquire(&self.lease)
    }

    async fn run(&self, macro_: &Macro) -> Result<ReplayRun> {
        let mut executor = self.executor.lock().await;
        let run = executor.play(macro_, &self.cancel).await?;
        info!(
            "Replay of '{}' ended {:?} after {} step(s)",
            macro_.name, run.status, run.completed
        );
        Ok(run)
    }

    pub fn delete_macro(&self, id: Uuid) -> Result<()> {
        self.repository.delete(id)
    }

    /// Ask the running replay to stop before its next step
    ///
    /// # Returns
    /// `false` when no replay is running
    pub fn cancel_replay(&self) -> bool {
        if !self.is_replaying() {
            return false;
        }
        self.cancel.cancel();
        true
    }
}
