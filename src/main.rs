use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use lumi_macro::driver::web::{WebDriver, WebDriverConfig};
use lumi_macro::runner::{ConsoleEventListener, ReplayStatus};
use lumi_macro::storage::{JsonMacroRepository, MacroRepository, SaveMode};
use lumi_macro::utils::Config;
use lumi_macro::{MacroError, MacroRef, MacroStudio};

#[derive(Parser)]
#[command(name = "lumi-macro")]
#[command(version = "0.1.0")]
#[command(about = "Record browser interactions as macros and replay them", long_about = None)]
struct Cli {
    /// Config file (YAML); defaults to ~/.lumi-macro/config.yaml when present
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a page and record interactions until Ctrl+C
    Record {
        /// Page to start recording on
        #[arg(short, long)]
        url: String,

        /// Name to save the macro under
        #[arg(short, long)]
        name: String,

        /// Replace a stored macro with the same name
        #[arg(long, default_value = "false")]
        overwrite: bool,
    },

    /// List stored macros, newest first
    List,

    /// Replay a stored macro
    Play {
        /// Macro id or name (a UUID-shaped name is found when no id matches)
        reference: String,

        /// Write a JSON report of the run
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Delete a stored macro
    Delete {
        /// Macro id
        id: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let repository = Arc::new(JsonMacroRepository::new(config.store_path.clone()));

    match cli.command {
        Commands::Record {
            url,
            name,
            overwrite,
        } => {
            // Fail before the browser opens rather than after the recording
            if !overwrite {
                duplicate_hint(repository.ensure_name_free(&name))?;
            }

            let driver = Arc::new(launch(&config).await?);
            let studio = MacroStudio::new(driver.clone(), repository.clone(), &config);
            let mut listener = driver.capture_listener();

            println!("{} Recording on {}", "🔴".red().bold(), url.cyan());
            studio.start_recording(&url).await?;

            let stop_flag = Arc::new(AtomicBool::new(false));
            let stop_flag_handler = stop_flag.clone();
            ctrlc::set_handler(move || {
                println!("\n{} Stopping recording...", "⏹".yellow());
                stop_flag_handler.store(true, Ordering::SeqCst);
            })?;
            println!("   Interact with the page. Press Ctrl+C when done.\n");

            let mut reported = 0;
            while !stop_flag.load(Ordering::SeqCst) {
                studio.capture(&mut listener).await?;
                let steps = studio.recorded_steps().await;
                if steps != reported {
                    println!("  {} {} step(s) captured", "•".blue(), steps);
                    reported = steps;
                }
                tokio::time::sleep(config.capture_poll()).await;
            }
            // Events queued between the last poll and Ctrl+C
            studio.capture(&mut listener).await?;

            let recorded = studio.stop_recording(&name).await?;
            let mode = if overwrite {
                SaveMode::Overwrite
            } else {
                SaveMode::CreateOnly
            };
            duplicate_hint(studio.save_macro(&recorded, mode))?;

            println!(
                "\n{} Saved '{}' ({} steps) as {}",
                "✅".green().bold(),
                recorded.name,
                recorded.steps.len(),
                recorded.id.to_string().cyan()
            );
            driver.close().await.ok();
        }

        Commands::List => {
            let mut summaries: Vec<_> = repository.list()?.collect();
            summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

            if summaries.is_empty() {
                println!("{} No macros stored in {}", "ℹ".blue(), repository.path().display());
            }
            for summary in summaries {
                println!(
                    "{}  {}  {} steps  {}  {}",
                    summary.id.to_string().dimmed(),
                    summary.name.white().bold(),
                    summary.step_count,
                    summary.start_url.cyan(),
                    summary.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }

        Commands::Play { reference, report } => {
            let reference: MacroRef = reference.parse()?;
            let driver = Arc::new(launch(&config).await?);
            let studio = MacroStudio::new(driver.clone(), repository.clone(), &config);
            let console = tokio::spawn(ConsoleEventListener::listen(studio.subscribe()));

            let cancel = studio.cancel_token();
            ctrlc::set_handler(move || {
                println!("\n{} Cancelling after the current step...", "⏹".yellow());
                cancel.cancel();
            })?;

            let run = studio.play_macro(&reference).await?;
            drop(studio);
            console.await.ok();

            if let Some(path) = report {
                let json = serde_json::to_string_pretty(&run.to_report())?;
                std::fs::write(&path, json)
                    .with_context(|| format!("Failed to write report {}", path.display()))?;
                println!("Report saved to: {}", path.display());
            }
            driver.close().await.ok();

            match run.status {
                ReplayStatus::Completed => {}
                ReplayStatus::Cancelled => {
                    println!(
                        "{} Cancelled after {} completed step(s)",
                        "⚠".yellow(),
                        run.completed
                    );
                }
                _ => {
                    if let Some(failure) = &run.failure {
                        let at = failure
                            .step
                            .map(|s| format!("step {}", s))
                            .unwrap_or_else(|| "start".to_string());
                        let kind = failure.kind.map(|k| k.to_string()).unwrap_or_default();
                        println!("{} Failed at {} {}: {}", "✗".red(), at, kind, failure.error);
                        for candidate in &failure.candidates {
                            println!("    tried {}", candidate);
                        }
                    }
                    anyhow::bail!("Replay of {} failed", reference);
                }
            }
        }

        Commands::Delete { id } => {
            repository.delete(id)?;
            println!("{} Deleted {}", "🗑".blue(), id);
        }
    }

    Ok(())
}

fn duplicate_hint(result: lumi_macro::Result<()>) -> anyhow::Result<()> {
    match result {
        Err(MacroError::DuplicateName(existing)) => anyhow::bail!(
            "A macro named '{}' already exists; re-run with --overwrite to replace it",
            existing
        ),
        other => Ok(other?),
    }
}

async fn launch(config: &Config) -> anyhow::Result<WebDriver> {
    let web_config = WebDriverConfig {
        browser_type: config.browser,
        headless: config.headless,
        ..WebDriverConfig::default()
    };
    WebDriver::new(web_config)
        .await
        .context("Failed to launch browser")
}
