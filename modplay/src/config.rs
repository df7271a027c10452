//! Playback settings resolution and validation
//!
//! Values resolve in priority order: command line (clap also folds in the
//! `MODPLAY_*` environment variables), then the `[playback]` table of the
//! defaults file, then compiled defaults.

use crate::error::{Error, Result};
use modplay_common::config::PlayerDefaults;
use modplay_common::{ChannelLayout, Interpolation};
use std::path::PathBuf;

pub const DEFAULT_CHANNELS: u16 = 2;
pub const DEFAULT_FADEOUT: f32 = 0.0;
pub const DEFAULT_LOOPS: i32 = 1;
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Values supplied on the command line or through the environment.
///
/// `None` means "not given" and falls through to the defaults file.
#[derive(Debug, Clone, Default)]
pub struct PlaybackOverrides {
    pub channels: Option<u16>,
    pub fadeout: Option<f32>,
    pub interpolation: Option<Interpolation>,
    pub loops: Option<i32>,
    pub volume: Option<f32>,
    pub start: Option<usize>,
    pub device: Option<String>,
    pub output: Option<PathBuf>,
}

/// Validated playback configuration, immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSettings {
    pub layout: ChannelLayout,
    /// Seconds to fade out after the loop budget is spent; 0 stops at once.
    pub fadeout: f32,
    pub interpolation: Interpolation,
    /// Loop boundaries to play through; zero or negative ends at the first.
    pub loops: i32,
    /// Initial volume, strictly positive.
    pub volume: f32,
    /// Order position playback starts from.
    pub start: usize,
    pub device: Option<String>,
    /// Render to this WAV file instead of the audio device.
    pub output: Option<PathBuf>,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            layout: ChannelLayout::Stereo,
            fadeout: DEFAULT_FADEOUT,
            interpolation: Interpolation::default(),
            loops: DEFAULT_LOOPS,
            volume: DEFAULT_VOLUME,
            start: 0,
            device: None,
            output: None,
        }
    }
}

impl PlaybackSettings {
    /// Merge overrides over file defaults over compiled defaults, then
    /// validate.
    ///
    /// # Errors
    /// `Error::Usage` when the channel count is not 1 or 2, the fadeout is
    /// negative, or the volume is not strictly positive.
    pub fn resolve(overrides: PlaybackOverrides, defaults: &PlayerDefaults) -> Result<Self> {
        let channels = overrides
            .channels
            .or(defaults.channels)
            .unwrap_or(DEFAULT_CHANNELS);
        let layout = ChannelLayout::try_from(channels)?;

        let fadeout = overrides.fadeout.or(defaults.fadeout).unwrap_or(DEFAULT_FADEOUT);
        if !fadeout.is_finite() || fadeout < 0.0 {
            return Err(Error::Usage(format!(
                "fadeout must be zero or more seconds, got {}",
                fadeout
            )));
        }

        let volume = overrides.volume.or(defaults.volume).unwrap_or(DEFAULT_VOLUME);
        if !volume.is_finite() || volume <= 0.0 {
            return Err(Error::Usage(format!(
                "volume must be greater than zero, got {}",
                volume
            )));
        }

        Ok(Self {
            layout,
            fadeout,
            interpolation: overrides
                .interpolation
                .or(defaults.interpolation)
                .unwrap_or_default(),
            loops: overrides.loops.or(defaults.loops).unwrap_or(DEFAULT_LOOPS),
            volume,
            start: overrides.start.unwrap_or(0),
            device: overrides.device.or_else(|| defaults.device.clone()),
            output: overrides.output,
        })
    }
}
