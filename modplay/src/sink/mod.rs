//! Output sinks
//!
//! A sink consumes the render pipeline: `LiveDevice` pulls blocks from the
//! audio backend's callback thread, `FileWriter` pushes blocks into a WAV
//! file. Both render through the same `render_block`, so equal block cadence
//! yields equal samples.

pub mod device;
pub mod file;
pub mod wav;

use crate::error::Result;
use crate::playback::PipelineBuilder;

pub use device::{DeviceFeed, FeedStatus, LiveDevice};
pub use file::FileWriter;
pub use wav::WavHeader;

/// Frames rendered per block when writing to a file.
pub const BLOCK_FRAMES: usize = 512;

/// Sample rate of rendered files.
pub const FILE_SAMPLE_RATE: u32 = 44100;

/// Destination for rendered audio.
///
/// Lifecycle: `start` once, `poll` while `is_active`, then `stop`.
pub trait Sink {
    /// Acquire the output and build the pipeline at the output's sample rate.
    fn start(&mut self, pipeline: PipelineBuilder) -> Result<()>;

    /// Make progress: write one block, or wait for the device.
    fn poll(&mut self) -> Result<()>;

    /// False once the final block has been delivered.
    fn is_active(&self) -> bool;

    /// Release the output. Safe to call after a failed `poll`.
    fn stop(&mut self) -> Result<SinkReport>;
}

/// What a sink delivered during one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkReport {
    /// Frames produced by the Module Source.
    pub frames: u64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Sample bytes written (0 for a live device).
    pub data_bytes: u64,
}

impl SinkReport {
    /// Rendered audio length.
    pub fn seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / self.sample_rate as f64
    }
}
