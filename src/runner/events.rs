use super::state::ReplayStatus;
use tokio::sync::broadcast;

/// Replay events for real-time updates
#[derive(Debug, Clone)]
pub enum ReplayEvent {
    // Run events
    ReplayStarted {
        macro_name: String,
        start_url: String,
        step_count: usize,
    },
    ReplayFinished {
        macro_name: String,
        status: ReplayStatus,
        completed: usize,
        duration_ms: Option<u64>,
    },

    // Step events
    StepStarted {
        sequence: usize,
        display: String,
    },
    StepPassed {
        sequence: usize,
        duration_ms: u64,
    },
    StepFailed {
        sequence: usize,
        error: String,
        duration_ms: u64,
    },
    /// Element went stale mid-dispatch and is being resolved again
    StepRetrying {
        sequence: usize,
    },
    StepSkipped {
        sequence: usize,
        reason: String,
    },
}

/// Event emitter for broadcasting replay events
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<ReplayEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<ReplayEvent>) {
        let (sender, receiver) = broadcast::channel(100);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: ReplayEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReplayEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }
}

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration as StdDuration;

/// Console event listener for printing real-time updates
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<ReplayEvent>) {
        use colored::Colorize;
        use indicatif::ProgressDrawTarget;
        use std::io::IsTerminal;

        // Hidden draw target when piped, so no escape codes leak into logs
        let multi = if std::io::stdout().is_terminal() {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        let mut spinner: Option<ProgressBar> = None;
        let mut step_text = String::new();

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                ReplayEvent::ReplayStarted {
                    macro_name,
                    start_url,
                    step_count,
                } => {
                    println!(
                        "\n{} Replaying {} ({} steps) from {}",
                        "▶".green().bold(),
                        macro_name.white().bold(),
                        step_count,
                        start_url.cyan()
                    );
                }

                ReplayEvent::ReplayFinished {
                    macro_name,
                    status,
                    completed,
                    duration_ms,
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish();
                    }
                    let status_str = match status {
                        ReplayStatus::Completed => "COMPLETED".green().bold(),
                        ReplayStatus::Failed => "FAILED".red().bold(),
                        ReplayStatus::Cancelled => "CANCELLED".yellow().bold(),
                        _ => "UNKNOWN".white().bold(),
                    };
                    println!(
                        "{} Macro {} [{}] {} step(s) completed",
                        "■".blue().bold(),
                        macro_name,
                        status_str,
                        completed
                    );
                    if let Some(duration) = duration_ms {
                        println!("  Duration: {}ms", duration);
                    }
                }

                ReplayEvent::StepStarted { sequence, display } => {
                    let pb = multi.add(ProgressBar::new_spinner());
                    let style = ProgressStyle::default_spinner()
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .template("    {spinner} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner());
                    pb.set_style(style);

                    step_text = format!("[{}] {}... ", sequence, display.dimmed());
                    pb.set_message(step_text.clone());
                    pb.enable_steady_tick(StdDuration::from_millis(100));
                    spinner = Some(pb);
                }

                ReplayEvent::StepPassed { duration_ms, .. } => {
                    let done_msg = format!("    {} {}({}ms)", "✓".green(), step_text, duration_ms);
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("{}", done_msg);
                }

                ReplayEvent::StepFailed {
                    error, duration_ms, ..
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("    {} {}({}ms)", "✗".red(), step_text, duration_ms);
                    println!("      {}", error.red());
                }

                ReplayEvent::StepRetrying { .. } => {
                    if let Some(pb) = &spinner {
                        pb.set_message(format!("{} {}", step_text, "↻ re-resolving".yellow()));
                    }
                }

                ReplayEvent::StepSkipped { sequence, reason } => {
                    multi
                        .println(format!("    {} [{}] {}", "○".yellow(), sequence, reason.dimmed()))
                        .ok();
                }
            }
        }
    }
}
