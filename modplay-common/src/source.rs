//! Module Source contract
//!
//! A Module Source is a decoder session for one loaded tracker module. The
//! player never looks inside it: it asks for blocks of 16-bit PCM at a given
//! volume and delta, and observes the loop / speed-zero events raised while
//! the block was being rendered.

use serde::Deserialize;
use std::fmt;

use crate::{Error, Result};

/// Output channel layout requested from the Module Source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Mono,
    Stereo,
}

impl ChannelLayout {
    /// Number of interleaved samples per frame.
    pub fn count(self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }
}

impl Default for ChannelLayout {
    fn default() -> Self {
        ChannelLayout::Stereo
    }
}

impl TryFrom<u16> for ChannelLayout {
    type Error = Error;

    fn try_from(channels: u16) -> Result<Self> {
        match channels {
            1 => Ok(ChannelLayout::Mono),
            2 => Ok(ChannelLayout::Stereo),
            other => Err(Error::InvalidInput(format!(
                "channel count must be 1 or 2, got {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelLayout::Mono => write!(f, "mono"),
            ChannelLayout::Stereo => write!(f, "stereo"),
        }
    }
}

/// Resampling quality used by the Module Source when mixing instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Nearest sample (aliasing)
    None,
    /// Two-point linear interpolation
    Linear,
    /// Four-point cubic interpolation
    #[default]
    Cubic,
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interpolation::None => write!(f, "none"),
            Interpolation::Linear => write!(f, "linear"),
            Interpolation::Cubic => write!(f, "cubic"),
        }
    }
}

/// Fixed-point step the decoder advances its playback clock by per output
/// frame: 65536 units per second of module time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResamplerDelta(f32);

impl ResamplerDelta {
    /// Units of module time per second.
    pub const UNITS_PER_SECOND: f32 = 65536.0;

    /// Delta for an output stream running at `sample_rate` Hz.
    pub fn from_sample_rate(sample_rate: u32) -> Self {
        Self(Self::UNITS_PER_SECOND / sample_rate as f32)
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Output sample rate implied by this delta, rounded to the nearest Hz.
    pub fn output_rate(self) -> u32 {
        (Self::UNITS_PER_SECOND / self.0).round() as u32
    }
}

/// Signals raised by the Module Source while rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleEvent {
    /// Playback order wrapped back to a loop point.
    Loop,
    /// Pattern speed reached zero; playback can no longer advance.
    SpeedZero,
}

/// Parameters of one render call. Constructed per call, never retained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub frame_count: usize,
    pub layout: ChannelLayout,
    pub volume: f32,
    pub delta: ResamplerDelta,
}

impl RenderRequest {
    /// Interleaved sample count this request fills.
    pub fn sample_count(&self) -> usize {
        self.frame_count * self.layout.count()
    }
}

/// An opened, playable module.
///
/// Dropping the source ends the render session and releases the module.
pub trait ModuleSource: Send {
    /// Number of channels the module mixes internally.
    fn mixed_channels(&self) -> usize;

    /// Render up to `request.frame_count` frames of signed 16-bit interleaved
    /// PCM into `out`, scaled by `request.volume`.
    ///
    /// `out` holds at least `request.sample_count()` samples. Events raised
    /// during the call are passed to `events` in the order they occur.
    /// Returns the number of frames produced; fewer than requested means the
    /// module has ended.
    fn render(
        &mut self,
        request: &RenderRequest,
        out: &mut [i16],
        events: &mut dyn FnMut(ModuleEvent),
    ) -> usize;
}
