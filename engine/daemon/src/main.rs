//! Ethereal Daemon - Headless Sprite Engine Host
//!
//! Runs the sprite engine without a window: collaborator events arrive as
//! JSON lines, rendered frames and sound cues are logged.
//!
//! # Usage
//!
//! ```bash
//! # Events from stdin
//! telemetry-producer | ethereal-daemon
//!
//! # Replay a recorded session
//! ethereal-daemon --input session.jsonl
//!
//! # Custom sprites, muted
//! ethereal-daemon --sprite-path ~/skins/pixel-cat --mute
//!
//! # Verbose logging
//! RUST_LOG=debug ethereal-daemon
//! ```
//!
//! # Input
//!
//! ```json
//! {"type": "hardware", "temperature": 91.0, "state": "Overheating", "mood": "Angry"}
//! {"type": "chat_message", "text": "Let me look at that"}
//! {"type": "chat_response", "text": "Your GPU is at 91C"}
//! {"type": "chat_message", "text": null}
//! ```
//!
//! The daemon stops at end of input or on Ctrl-C.

mod audio;
mod input;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use ethereal_core::config::{default_config_path, load_config_from_path, ConfigOverrides};
use ethereal_core::persistence::default_state_path;
use ethereal_core::{
    AnimatorOutput, Engine, FrameView, FsImageProbe, JsonFileStore, KeyValueStore, MemoryStore,
};

use audio::FsAudioBackend;

/// How often time-based engine transitions (chat auto-hide) are checked
const TIMER_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Renderer channel capacity; updates beyond this are dropped
const RENDER_CHANNEL_CAPACITY: usize = 64;

/// Ethereal Daemon - headless host for the sprite engine
#[derive(Parser, Debug)]
#[command(name = "ethereal-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "ETHEREAL_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Read events from this file instead of stdin
    #[arg(short = 'i', long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Persisted state file
    #[arg(long, env = "ETHEREAL_STATE_FILE", value_name = "FILE")]
    state_file: Option<PathBuf>,

    /// Custom sprite directory
    #[arg(long, value_name = "DIR")]
    sprite_path: Option<String>,

    /// Directory bundled sprites and sounds are served from
    #[arg(long, value_name = "DIR")]
    asset_dir: Option<PathBuf>,

    /// Disable sound cues
    #[arg(long)]
    mute: bool,

    /// Sound volume (0.0-1.0)
    #[arg(long)]
    volume: Option<f32>,

    /// Animation ticker period in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "ETHEREAL_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(path) = &self.sprite_path {
            overrides = overrides.with_sprite_path(path.clone());
        }
        if let Some(dir) = &self.asset_dir {
            overrides = overrides.with_asset_dir(dir.clone());
        }
        if self.mute {
            overrides = overrides.with_sound_enabled(false);
        }
        if let Some(volume) = self.volume {
            overrides = overrides.with_volume(volume);
        }
        if let Some(ms) = self.tick_ms {
            overrides = overrides.with_tick_ms(ms);
        }
        overrides
    }
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "ethereal_daemon={level},ethereal_core={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Open the persisted state file, falling back to memory if it is unusable
async fn open_persistence(path: Option<PathBuf>) -> Arc<dyn KeyValueStore> {
    let Some(path) = path else {
        warn!("No data directory available, click-through will not persist");
        return Arc::new(MemoryStore::new());
    };

    match JsonFileStore::open(&path).await {
        Ok(store) => {
            info!(path = ?path, "State file");
            Arc::new(store)
        }
        Err(e) => {
            warn!(error = %e, "Failed to open state file, click-through will not persist");
            Arc::new(MemoryStore::new())
        }
    }
}

/// Log what the animator would draw
async fn log_frames(mut rx: mpsc::Receiver<AnimatorOutput>) {
    while let Some(update) = rx.recv().await {
        match update {
            AnimatorOutput::View(FrameView::Frame { index, url }) => {
                debug!(index, url = %url, "Frame");
            }
            AnimatorOutput::View(FrameView::Loading) => info!("Loading sprites"),
            AnimatorOutput::View(FrameView::Empty) => info!("Nothing to draw"),
            AnimatorOutput::Ended => info!("Animation ended"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!("Ethereal Daemon starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Configuration: file, then environment, then CLI
    let config_path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(config_path).context("Failed to load configuration")?;
    args.overrides()
        .apply(&mut config)
        .context("Invalid command-line override")?;
    info!(source = %config.source(), asset_dir = ?config.asset_dir, "Configuration loaded");

    let persistence = open_persistence(args.state_file.clone().or_else(default_state_path)).await;
    let probe = FsImageProbe::new(&config.asset_dir).with_bundled_root(config.bundled_root.clone());
    let audio = FsAudioBackend::new(&config.asset_dir, config.sound_root.clone());

    let engine = Engine::from_config(
        &config,
        Arc::clone(&persistence),
        Arc::new(probe),
        Arc::new(audio),
    );
    info!(
        state = %engine.store().state(),
        click_through = engine.store().is_click_through(),
        "Engine ready"
    );

    let (frames_tx, frames_rx) = mpsc::channel(RENDER_CHANNEL_CAPACITY);
    let renderer = tokio::spawn(log_frames(frames_rx));
    let animator = engine.mount(config.tick_interval, frames_tx);
    let sound = engine.start_sound();

    let mut lines = input::open(args.input.as_deref()).await?;
    let mut line_number = 0usize;

    let mut timers = tokio::time::interval(TIMER_POLL_INTERVAL);
    timers.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let result: Result<()> = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C, initiating shutdown");
                break Ok(());
            }

            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    line_number += 1;
                    if let Some(event) = input::parse_line(line_number, &line) {
                        engine.dispatch(event);
                    }
                }
                Ok(None) => {
                    info!(lines = line_number, "End of input");
                    break Ok(());
                }
                Err(e) => break Err(e).context("Failed to read input"),
            },

            _ = timers.tick() => engine.poll_timers(Instant::now()),
        }
    };

    // Cleanup
    info!("Shutting down...");
    animator.unmount().await;
    sound.shutdown().await;
    if let Err(e) = renderer.await {
        warn!(error = %e, "Renderer task did not exit cleanly");
    }
    if let Err(e) = persistence.flush().await {
        warn!(error = %e, "Failed to save engine state");
    }

    match result {
        Ok(()) => {
            info!("Ethereal daemon stopped cleanly");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Daemon stopped with error");
            Err(e)
        }
    }
}
