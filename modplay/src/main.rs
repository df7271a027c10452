//! modplay - command-line tracker module player
//!
//! Plays a module on the audio device, or renders it to a WAV file with
//! `--output`. Exit status: 0 on success, 2 for usage or configuration
//! errors, 1 for load, device or write failures.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use modplay::{CancelToken, Error, LiveDevice, PlaybackOverrides, PlaybackSettings};
use modplay_common::config::PlayerDefaults;
use modplay_common::Interpolation;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ", ",
    env!("BUILD_PROFILE"),
    ")"
);

/// Command-line arguments for modplay
#[derive(Parser, Debug)]
#[command(name = "modplay")]
#[command(about = "Play tracker music modules")]
#[command(version, long_version = LONG_VERSION)]
struct Args {
    /// Module file to play
    #[arg(required_unless_present = "list_devices")]
    file: Option<PathBuf>,

    /// Output channels (1 or 2) [default: 2]
    #[arg(
        short,
        long,
        value_name = "1|2",
        env = "MODPLAY_CHANNELS",
        value_parser = clap::value_parser!(u16).range(1..=2)
    )]
    channels: Option<u16>,

    /// Fade out over this many seconds after the last loop [default: 0]
    #[arg(short, long, value_name = "SECONDS", env = "MODPLAY_FADEOUT")]
    fadeout: Option<f32>,

    /// Resampling quality [default: cubic]
    #[arg(short, long, value_enum, env = "MODPLAY_INTERPOLATION")]
    interpolation: Option<Interpolation>,

    /// Number of times to play the song loop; zero or less stops at the first [default: 1]
    #[arg(short, long, allow_negative_numbers = true, env = "MODPLAY_LOOPS")]
    loops: Option<i32>,

    /// Render to this WAV file instead of playing
    #[arg(short, long, value_name = "PATH", env = "MODPLAY_OUTPUT")]
    output: Option<PathBuf>,

    /// Initial volume, greater than zero [default: 1.0]
    #[arg(short, long, env = "MODPLAY_VOLUME")]
    volume: Option<f32>,

    /// Order position to start playing from [default: 0]
    #[arg(short, long, value_name = "ORDER", env = "MODPLAY_START")]
    start: Option<usize>,

    /// Output device name (falls back to the default device)
    #[arg(short, long, env = "MODPLAY_DEVICE")]
    device: Option<String>,

    /// Print the available output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Playback defaults file (TOML, `[playback]` table)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> PlaybackOverrides {
        PlaybackOverrides {
            channels: self.channels,
            fadeout: self.fadeout,
            interpolation: self.interpolation,
            loops: self.loops,
            volume: self.volume,
            start: self.start,
            device: self.device.clone(),
            output: self.output.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Diagnostics go to stderr so stdout stays clean for --list-devices
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "modplay=warn,modplay_tracker=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<Error>() {
            // Player errors already carry their cause in the message
            Some(player_err) => {
                eprintln!("modplay: {}", player_err);
                ExitCode::from(player_err.exit_code())
            }
            None => {
                eprintln!("modplay: {:#}", err);
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    if args.list_devices {
        for name in LiveDevice::list_devices()? {
            println!("{}", name);
        }
        return Ok(());
    }

    let file = args
        .file
        .clone()
        .ok_or_else(|| Error::Usage("missing module file".to_string()))?;
    let defaults = PlayerDefaults::load(args.config.as_deref()).map_err(Error::from)?;
    let settings = PlaybackSettings::resolve(args.overrides(), &defaults)?;

    info!(
        "Playing {}: {}, interpolation={}, loops={}, fadeout={}s, volume={}",
        file.display(),
        settings.layout,
        settings.interpolation,
        settings.loops,
        settings.fadeout,
        settings.volume
    );

    let cancel = CancelToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    // The device stream may not be Send, so the whole session lives on one
    // blocking thread
    let report = tokio::task::spawn_blocking(move || modplay::play(&file, &settings, cancel))
        .await
        .context("playback task failed")??;

    if report.cancelled {
        info!("Stopped after {:.2} s", report.sink.seconds());
    }
    Ok(())
}

/// Trip `cancel` on Ctrl+C or SIGTERM.
async fn cancel_on_signal(cancel: CancelToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping playback");
        },
        _ = terminate => {
            info!("Received terminate signal, stopping playback");
        },
    }
    cancel.cancel();
}
