//! Arguments and scenarios of the `progrich-demo` binary.

use crate::bar::ProgressBar;
use crate::config::ProgressConfig;
use crate::spinner::Spinner;
use crate::theme::Theme;
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use progrich_core::Manager;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Demonstrates concurrent progress bars and spinners in one live region.
#[derive(Parser, Debug)]
#[command(name = "progrich-demo", version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to $PROGRICH_CONFIG or ~/.config/progrich/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Show finished widgets above running ones
    #[arg(long, global = true)]
    pub completed_on_top: bool,

    /// Keep finished widgets on screen
    #[arg(long, global = true)]
    pub persist: bool,

    /// Pause between steps, in milliseconds
    #[arg(long, global = true, default_value_t = 30)]
    pub delay_ms: u64,

    /// Scenario to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Demo scenarios.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Several bars advanced from their own threads
    Bars {
        /// Number of bars
        #[arg(short = 'n', long, default_value_t = 3)]
        count: usize,

        /// Steps per bar
        #[arg(short, long, default_value_t = 50)]
        total: u64,

        /// Render all bars as one aligned block
        #[arg(long)]
        shared_group: bool,
    },

    /// A spinner that changes its text and ends with a status line
    Spinner {
        /// End with a failure mark instead of a success mark
        #[arg(long)]
        fail: bool,
    },

    /// An outer scope spanning several short-lived widgets
    Nested {
        /// Number of epochs
        #[arg(short, long, default_value_t = 3)]
        epochs: u64,

        /// Steps per epoch
        #[arg(short, long, default_value_t = 20)]
        steps: u64,
    },
}

/// Settings shared by every scenario.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Manager every widget registers with.
    pub manager: Arc<Manager>,
    /// Look of the widgets.
    pub theme: Theme,
    /// Keep finished widgets on screen.
    pub persist: bool,
    /// Pause between steps.
    pub delay: Duration,
}

impl Scenario {
    fn pause(&self) {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
    }
}

/// Resolve the configuration and run the chosen scenario.
///
/// # Errors
///
/// Fails on invalid configuration or when a widget operation fails.
pub fn run(cli: Cli) -> Result<()> {
    let mut config = ProgressConfig::discover(cli.config.as_deref())
        .context("Failed to load config")?
        .apply_env()
        .context("Invalid PROGRICH_* environment")?;
    if cli.completed_on_top {
        config.completed_on_top = true;
    }
    tracing::debug!(?config, "resolved configuration");

    progrich_core::terminal::install_panic_hook(&config.terminal_options()?);
    let ctx = Scenario {
        manager: config.build_manager()?,
        theme: config.theme()?,
        persist: cli.persist,
        delay: Duration::from_millis(cli.delay_ms),
    };
    // Widgets built without a manager draw on the same region
    Manager::set_global(ctx.manager.clone());
    let _default = Manager::global_guard();

    let result = match cli.command {
        Commands::Bars {
            count,
            total,
            shared_group,
        } => bars(&ctx, count, total, shared_group),
        Commands::Spinner { fail } => spinner(&ctx, fail),
        Commands::Nested { epochs, steps } => nested(&ctx, epochs, steps),
    };
    let closed = ctx.manager.shutdown().context("Failed to release the terminal");
    result.and(closed)
}

/// Advance `count` bars concurrently, one thread each.
///
/// # Errors
///
/// Fails if a bar operation fails or a worker panics.
pub fn bars(ctx: &Scenario, count: usize, total: u64, shared_group: bool) -> Result<()> {
    let mut bars: Vec<ProgressBar> = Vec::with_capacity(count);
    for i in 0..count {
        let mut builder = ProgressBar::builder(format!("Task {}", i + 1), total)
            .persist(ctx.persist)
            .theme(ctx.theme.clone())
            .manager(ctx.manager.clone());
        if shared_group {
            if let Some(first) = bars.first() {
                builder = builder.group(first);
            }
        }
        bars.push(builder.build()?);
    }

    thread::scope(|s| {
        let workers: Vec<_> = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| {
                s.spawn(move || -> Result<()> {
                    bar.start(false)?;
                    for _ in 0..total {
                        ctx.pause();
                        bar.advance(1)?;
                    }
                    bar.stop()?;
                    tracing::info!(bar = i, state = %bar.state(), "bar finished");
                    Ok(())
                })
            })
            .collect();
        workers.into_iter().try_for_each(|worker| {
            worker
                .join()
                .map_err(|_| anyhow!("bar worker panicked"))?
        })
    })
}

/// Spin through a few steps, then end with ✔ or ✖.
///
/// # Errors
///
/// Fails if a spinner operation fails.
pub fn spinner(ctx: &Scenario, fail: bool) -> Result<()> {
    let spinner = Spinner::builder("Connecting")
        .persist(ctx.persist)
        .theme(ctx.theme.clone())
        .manager(ctx.manager.clone())
        .build()?;
    spinner.start()?;
    for step in ["Connecting", "Downloading", "Verifying"] {
        spinner.set_text(format!("{step}..."))?;
        for _ in 0..10 {
            ctx.pause();
        }
    }
    if fail {
        spinner.fail(Some("Verification failed"))?;
    } else {
        spinner.success(Some("Verified"))?;
    }
    Ok(())
}

/// One outer scope spanning an epoch bar, a bar per epoch and a spinner per
/// checkpoint. The display stays attached from the first epoch to the last.
///
/// # Errors
///
/// Fails if a widget operation fails.
pub fn nested(ctx: &Scenario, epochs: u64, steps: u64) -> Result<()> {
    let _outer = ctx.manager.scope()?;
    let epoch_bar = ProgressBar::builder("Epochs", epochs)
        .persist(true)
        .theme(ctx.theme.clone())
        .manager(ctx.manager.clone())
        .build()?;
    epoch_bar.start(false)?;

    for epoch in 1..=epochs {
        let train = ProgressBar::builder(format!("Epoch {epoch} - Train"), steps)
            .persist(ctx.persist)
            .group(&epoch_bar)
            .manager(ctx.manager.clone())
            .build()?;
        {
            let _run = train.scope()?;
            for _ in 0..steps {
                ctx.pause();
                train.advance(1)?;
            }
        }

        let save = Spinner::builder(format!("Saving checkpoint {epoch}"))
            .theme(ctx.theme.clone())
            .manager(ctx.manager.clone())
            .build()?;
        save.start()?;
        ctx.pause();
        save.success(Some(&format!("Saved checkpoint {epoch}")))?;

        epoch_bar.advance(1)?;
    }
    epoch_bar.stop()?;
    Ok(())
}
